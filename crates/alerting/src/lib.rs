//! Alerting System
//!
//! Escalates sustained detections: periodic audible alarms, a single
//! manager notification per run, and a continuous event trail.

mod alarm;
mod escalation;
mod monitor;
mod session;
mod sink;
pub mod tone;

pub use alarm::AlarmScheduler;
pub use escalation::{
    alert_message, AlertOutcome, ChannelOutcome, EventOutcome, Escalator, NotificationOutcome,
    TickReport,
};
pub use monitor::{Monitor, MonitorError};
pub use session::{MonitoringSession, SessionRegistry};
pub use sink::{AudibleAlert, CommandAlarm, CommandAlarmConfig, SilentAlarm, SinkError};
