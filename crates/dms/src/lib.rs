//! Driver Monitoring System (DMS)
//!
//! Turns per-tick classifier output into sustained-detection state:
//! - Detection channels (drowsiness, yawning, phone use)
//! - Per-channel run timers with hold and re-fire periods
//! - One-shot notification bookkeeping per run
//! - Tick/signal types produced by the signal source

pub mod channel;
pub mod config;
pub mod signal;
pub mod state;

pub use channel::Channel;
pub use config::DmsConfig;
pub use signal::{ChannelSignal, Tick};
pub use state::{ChannelTimer, ChannelTimers, Observation};

use thiserror::Error;

/// DMS error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DmsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Channel {0} reported more than once in a single tick")]
    DuplicateChannel(Channel),
}
