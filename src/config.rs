//! Layered settings.
//!
//! Built-in defaults, then an optional TOML file, then `VITALWATCH_*`
//! environment variables (`__` separates nesting, e.g.
//! `VITALWATCH_GATEWAY__MAX_RETRIES=3`). Command-line flags are applied on
//! top by the binary.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::data::duration::parse_duration;
use crate::data::DEFAULT_CAPACITY;
use crate::gateway::{self, ReconnectPolicy, DEFAULT_MAX_RETRIES};
use crate::identity::SubjectId;
use crate::session::DashboardOptions;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gateway: GatewaySettings,
    pub session: SessionSettings,
    pub auth: AuthSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// REST API base; the WebSocket URL is derived from it.
    pub api_base: String,
    pub path: String,
    pub max_retries: u32,
    pub retry_delay: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:8000".to_string(),
            path: "/ws/sensores".to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: "2s".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Points kept per series.
    pub capacity: usize,
    pub commit_window: String,
    /// Patients a supervising user can cycle through.
    pub patients: Vec<SubjectId>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            commit_window: "60s".to_string(),
            patients: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// JSON subject record written by a previous login.
    pub session_file: PathBuf,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_file: PathBuf::from("session.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub file: PathBuf,
    /// `tracing` filter directive; `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            file: PathBuf::from("vitalwatch.log"),
            filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from defaults, `path` (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(
                Environment::with_prefix("VITALWATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read settings")?;

        let settings: Settings = config
            .try_deserialize()
            .context("Invalid settings")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that parse but make no sense.
    pub fn validate(&self) -> Result<()> {
        self.gateway_url()?;
        self.reconnect_policy()?;
        self.dashboard_options()?;
        Ok(())
    }

    pub fn gateway_url(&self) -> Result<String> {
        Ok(gateway::gateway_url(&self.gateway.api_base, &self.gateway.path)?)
    }

    pub fn reconnect_policy(&self) -> Result<ReconnectPolicy> {
        let delay = parse_duration(&self.gateway.retry_delay)
            .with_context(|| format!("gateway.retry_delay = {:?}", self.gateway.retry_delay))?;
        Ok(ReconnectPolicy {
            max_retries: self.gateway.max_retries,
            delay,
        })
    }

    pub fn dashboard_options(&self) -> Result<DashboardOptions> {
        let capacity = NonZeroUsize::new(self.session.capacity)
            .ok_or_else(|| anyhow!("session.capacity must be greater than zero"))?;
        let commit_window = parse_duration(&self.session.commit_window)
            .with_context(|| format!("session.commit_window = {:?}", self.session.commit_window))?;
        Ok(DashboardOptions {
            capacity,
            commit_window,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use super::*;

    fn toml_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.gateway_url().unwrap(), "ws://127.0.0.1:8000/ws/sensores");

        let policy = settings.reconnect_policy().unwrap();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.delay, Duration::from_secs(2));

        let options = settings.dashboard_options().unwrap();
        assert_eq!(options.capacity.get(), 20);
        assert_eq!(options.commit_window, Duration::from_secs(60));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = toml_file(
            r#"
            [gateway]
            api_base = "https://vitals.example.com/"
            retry_delay = "500ms"

            [session]
            capacity = 50
            patients = [7, 8]
            "#,
        );

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.gateway_url().unwrap(), "wss://vitals.example.com/ws/sensores");
        assert_eq!(settings.reconnect_policy().unwrap().delay, Duration::from_millis(500));
        assert_eq!(settings.reconnect_policy().unwrap().max_retries, 5);
        assert_eq!(settings.dashboard_options().unwrap().capacity.get(), 50);
        assert_eq!(settings.session.patients, vec![SubjectId(7), SubjectId(8)]);
        assert_eq!(settings.log.filter, "info");
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let file = toml_file("[session]\ncapacity = 0\n");
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn test_bad_api_base_is_rejected() {
        let file = toml_file("[gateway]\napi_base = \"ftp://example.com\"\n");
        assert!(Settings::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
