//! Terminal rendering.
//!
//! - [`common`]: header, tabs, status bar and overlays
//! - [`vitals`]: live charts
//! - [`alerts`]: alert table
//! - [`records`]: record notices and sensor status
//! - [`theme`]: colors, with light/dark detection

pub mod alerts;
pub mod common;
pub mod records;
pub mod theme;
pub mod vitals;

pub use theme::Theme;
