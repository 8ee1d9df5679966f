//! Configuration, read from `odzen.toml` and `ODZEN_*` environment variables.

use crate::error::OdResult;
use crate::validate::DEFAULT_ATTACHMENT_MAX_MB;
use config::Config;
use serde::Deserialize;
use std::time::Duration;

/// The name of the configuration file, without extension.
pub const CONFIG_NAME: &str = "odzen";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Path of the `sqlite3` database.
    pub database_url: String,
    /// How long a write waits on a locked database before giving up.
    pub busy_timeout_ms: u64,
    /// Largest OD attachment accepted, in megabytes.
    pub attachment_max_mb: usize,
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "odzen.sqlite3".to_string(),
            busy_timeout_ms: 5000,
            attachment_max_mb: DEFAULT_ATTACHMENT_MAX_MB,
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Loads `odzen.toml` from the working directory, if there is one, with
    /// environment variables (and a `.env` file) taking precedence.
    pub fn load() -> OdResult<Self> {
        dotenvy::dotenv().ok();
        Self::load_from(CONFIG_NAME)
    }

    /// Like [`Settings::load`], but reads the given configuration file and skips `.env`.
    pub fn load_from(path: &str) -> OdResult<Self> {
        let settings = Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("ODZEN"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odzen.toml");
        fs::write(
            &path,
            "database_url = \"/tmp/od.sqlite3\"\nattachment_max_mb = 2\n",
        )
        .unwrap();

        let settings = Settings::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(settings.database_url, "/tmp/od.sqlite3");
        assert_eq!(settings.attachment_max_mb, 2);
        assert_eq!(settings.busy_timeout(), Duration::from_millis(5000));
        assert_eq!(settings.log_filter, "info");
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");
        let settings = Settings::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "busy_timeout_ms = \"soon\"\n").unwrap();

        assert!(Settings::load_from(path.to_str().unwrap()).is_err());
    }
}
