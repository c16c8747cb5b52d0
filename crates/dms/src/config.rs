//! DMS configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::DmsError;

/// Monitoring thresholds shared by every channel of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Continuous detection required before the first audible alert (milliseconds)
    pub hold_ms: u64,

    /// Interval between audible alert re-fires while a run persists (milliseconds)
    pub alert_period_ms: u64,

    /// Run length after which the manager is notified (milliseconds)
    pub notify_threshold_ms: u64,

    /// How long the alarm sound plays before it is stopped (milliseconds)
    pub alarm_duration_ms: u64,

    /// Upper bound on a single notification dispatch (milliseconds)
    pub notify_timeout_ms: u64,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            hold_ms: 4000,
            alert_period_ms: 4000,
            notify_threshold_ms: 5000,
            alarm_duration_ms: 3000,
            notify_timeout_ms: 2000,
        }
    }
}

impl DmsConfig {
    /// Create strict config (lower thresholds)
    pub fn strict() -> Self {
        Self {
            hold_ms: 2000,
            alert_period_ms: 3000,
            notify_threshold_ms: 3000,
            ..Default::default()
        }
    }

    /// Create lenient config (higher thresholds)
    pub fn lenient() -> Self {
        Self {
            hold_ms: 6000,
            alert_period_ms: 8000,
            notify_threshold_ms: 10000,
            ..Default::default()
        }
    }

    /// Reject settings that would make the escalation loop meaningless
    pub fn validate(&self) -> Result<(), DmsError> {
        if self.alert_period_ms == 0 {
            return Err(DmsError::Config("alert_period_ms must be positive".into()));
        }
        if self.alarm_duration_ms == 0 {
            return Err(DmsError::Config("alarm_duration_ms must be positive".into()));
        }
        if self.notify_timeout_ms == 0 {
            return Err(DmsError::Config("notify_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn hold(&self) -> chrono::Duration {
        millis(self.hold_ms)
    }

    pub fn alert_period(&self) -> chrono::Duration {
        millis(self.alert_period_ms)
    }

    pub fn notify_threshold(&self) -> chrono::Duration {
        millis(self.notify_threshold_ms)
    }

    pub fn alarm_duration(&self) -> Duration {
        Duration::from_millis(self.alarm_duration_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }
}

fn millis(ms: u64) -> chrono::Duration {
    chrono::Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = DmsConfig::default();
        assert_eq!(config.hold(), chrono::Duration::seconds(4));
        assert_eq!(config.alert_period(), chrono::Duration::seconds(4));
        assert_eq!(config.notify_threshold(), chrono::Duration::seconds(5));
        assert_eq!(config.alarm_duration(), Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(DmsConfig::strict().validate().is_ok());
        assert!(DmsConfig::lenient().validate().is_ok());
        assert!(DmsConfig::strict().hold_ms < DmsConfig::lenient().hold_ms);
    }

    #[test]
    fn test_zero_period_rejected() {
        let config = DmsConfig {
            alert_period_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DmsError::Config(_))));
    }
}
