//! # vitalwatch
//!
//! A terminal dashboard and library for live vital-sign monitoring.
//!
//! vitalwatch connects to a sensor gateway over WebSocket, identifies the
//! logged-in user, starts and stops measurements, and renders the incoming
//! heart rate, SpO2, temperature, blood pressure and ECG readings as live
//! charts. Alerts, sensor status and medical-record notices are collected
//! alongside.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Application                             │
//! │  ┌─────────┐    ┌───────────┐    ┌─────────┐    ┌──────────┐     │
//! │  │   app   │───▶│  session  │───▶│   ui    │───▶│ Terminal │     │
//! │  │ (state) │    │(Dashboard)│    │(render) │    │          │     │
//! │  └─────────┘    └─────┬─────┘    └─────────┘    └──────────┘     │
//! │                       │ commands ▲ inbound                       │
//! │                       ▼          │                               │
//! │                 ┌─────────────────────┐     ┌────────────┐       │
//! │                 │       gateway       │◀───▶│ WebSocket  │       │
//! │                 │ (ConnectionManager) │     │  gateway   │       │
//! │                 └─────────────────────┘     └────────────┘       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`identity`]**: who is monitored, resolved from the logged-in [`User`]
//! - **[`auth`]**: access to the cached user record and bearer token
//! - **[`gateway`]**: connection lifecycle with bounded retries, wire codec
//!   and the [`Connector`] seam
//! - **[`session`]**: the [`Dashboard`] that routes messages, aggregates
//!   series, dispatches commands and guards the commit window
//! - **[`data`]**: bounded time series and the [`Aggregator`]
//! - **[`ui`]**: ratatui views for vitals, alerts and records
//! - **[`config`]**: layered [`Settings`]
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Use the session file written by the web login
//! vitalwatch --session session.json --api-base http://127.0.0.1:8000
//!
//! # Doctors list the patients they can pick from
//! vitalwatch --patient 7 --patient 12
//! ```
//!
//! ### As a library
//!
//! ```
//! use std::sync::Arc;
//! use vitalwatch::{
//!     ConnectionManager, Dashboard, DashboardOptions, ExitLock, ReconnectPolicy, Role,
//!     StaticAuth, SubjectId, User, WsConnector,
//! };
//!
//! let user = User {
//!     id: Some(SubjectId(7)),
//!     name: "Ana".into(),
//!     lastname: "Pérez".into(),
//!     email: "ana@example.com".into(),
//!     role: Role::Patient,
//!     access_token: None,
//! };
//! let auth = Arc::new(StaticAuth::new(Some(user.clone())));
//! let (connection, inbound) = ConnectionManager::new(
//!     "ws://127.0.0.1:8000/ws/sensores",
//!     Arc::new(WsConnector),
//!     auth,
//!     ReconnectPolicy::default(),
//! );
//!
//! let dashboard = Dashboard::new(
//!     user,
//!     connection,
//!     inbound,
//!     DashboardOptions::default(),
//!     Box::new(ExitLock::new()),
//! )
//! .unwrap();
//! assert_eq!(dashboard.target(), Some(SubjectId(7)));
//! ```
//!
//! ### Following the connection
//!
//! ```no_run
//! use std::sync::Arc;
//! use vitalwatch::{ConnectionManager, ReconnectPolicy, StaticAuth, WsConnector};
//!
//! # tokio_test::block_on(async {
//! let (mut connection, _inbound) = ConnectionManager::new(
//!     "ws://127.0.0.1:8000/ws/sensores",
//!     Arc::new(WsConnector),
//!     Arc::new(StaticAuth::default()),
//!     ReconnectPolicy::default(),
//! );
//! let mut status = connection.subscribe();
//! connection.connect();
//! while status.changed().await.is_ok() {
//!     println!("{:?}", *status.borrow());
//! }
//! # });
//! ```

pub mod app;
pub mod auth;
pub mod config;
pub mod data;
pub mod events;
pub mod gateway;
pub mod identity;
pub mod session;
pub mod ui;

// Re-export main types for convenience
pub use app::{App, View};
pub use auth::{AuthProvider, FileAuthStore, StaticAuth};
pub use config::Settings;
pub use data::{Aggregator, MetricSeries, Point, SeriesKey, SeriesSnapshot};
pub use gateway::{
    Command, ConnectionManager, ConnectionState, ConnectionStatus, Connector, GatewayError,
    InboundMessage, Link, ReconnectPolicy, WsConnector,
};
pub use identity::{MonitoringMode, Role, SubjectId, User};
pub use session::{
    CommitGuard, Dashboard, DashboardOptions, ExitInterceptor, ExitLock, Notice, SessionError,
    SessionState,
};
