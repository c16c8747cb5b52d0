//! Service configuration
//!
//! Sources, later ones winning: built-in defaults, an optional
//! `driver-watch.{toml,yaml,json}` file, then `DRIVER_WATCH__*` environment
//! variables (e.g. `DRIVER_WATCH__MONITORING__HOLD_MS=3000`).

use alerting::CommandAlarmConfig;
use config::{Config, ConfigError, Environment, File};
use dms::DmsConfig;
use notify::NotifierConfig;
use serde::{Deserialize, Serialize};
use storage::StorageConfig;

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Cabin alarm device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmKind {
    /// Log only
    #[default]
    Silent,
    /// External audio player
    Command,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmSettings {
    pub kind: AlarmKind,
    pub command: CommandAlarmConfig,
    /// Write the siren file at startup when it does not exist
    pub generate_tone: bool,
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub monitoring: DmsConfig,
    pub storage: StorageConfig,
    pub notifier: NotifierConfig,
    pub alarm: AlarmSettings,
}

impl Settings {
    /// Load from `driver-watch.*` in the working directory and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("driver-watch")
    }

    /// Load using `file_stem` as the optional configuration file
    pub fn load_from(file_stem: &str) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::with_name(file_stem).required(false))
            .add_source(
                Environment::with_prefix("DRIVER_WATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings
            .monitoring
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_sources() {
        let settings = Settings::load_from("/nonexistent/driver-watch").unwrap();
        assert_eq!(settings.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(settings.monitoring, DmsConfig::default());
        assert_eq!(settings.storage, StorageConfig::Memory);
        assert!(matches!(settings.notifier, NotifierConfig::Log));
        assert_eq!(settings.alarm.kind, AlarmKind::Silent);
    }

    #[test]
    fn test_file_overrides() {
        let dir = std::env::temp_dir().join(format!("driver-watch-settings-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("driver-watch.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[monitoring]
hold_ms = 2500
notify_threshold_ms = 6000

[storage]
backend = "sqlite"
url = "sqlite://trips.db"

[alarm]
kind = "command"
generate_tone = true
"#
        )
        .unwrap();

        let stem = dir.join("driver-watch");
        let settings = Settings::load_from(stem.to_str().unwrap()).unwrap();
        assert_eq!(settings.monitoring.hold_ms, 2500);
        assert_eq!(settings.monitoring.notify_threshold_ms, 6000);
        assert_eq!(settings.monitoring.alert_period_ms, 4000);
        assert_eq!(
            settings.storage,
            StorageConfig::Sqlite {
                url: "sqlite://trips.db".to_string()
            }
        );
        assert_eq!(settings.alarm.kind, AlarmKind::Command);
        assert_eq!(settings.alarm.command.player, "aplay");

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_invalid_monitoring_rejected() {
        let dir = std::env::temp_dir().join(format!("driver-watch-invalid-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("driver-watch.toml"), "[monitoring]\nalert_period_ms = 0\n").unwrap();

        let stem = dir.join("driver-watch");
        assert!(Settings::load_from(stem.to_str().unwrap()).is_err());

        let _ = std::fs::remove_dir_all(dir);
    }
}
