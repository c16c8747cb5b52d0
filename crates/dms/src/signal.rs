//! Per-tick detection signals from the signal source

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Channel, DmsError};

/// Raw classifier output for one channel on one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSignal {
    pub channel: Channel,

    /// Whether the anomaly is present in this frame
    pub detected: bool,

    /// Value that triggered the detection (e.g. eye-aspect ratio)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement: Option<f64>,

    /// Free-form classifier details; falls back to [`Channel::default_details`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ChannelSignal {
    /// Anomaly present on this tick
    pub fn detected(channel: Channel) -> Self {
        Self {
            channel,
            detected: true,
            measurement: None,
            details: None,
        }
    }

    /// Anomaly absent on this tick
    pub fn clear(channel: Channel) -> Self {
        Self {
            channel,
            detected: false,
            measurement: None,
            details: None,
        }
    }

    pub fn with_measurement(mut self, value: f64) -> Self {
        self.measurement = Some(value);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Details text to store with an event for this signal
    pub fn event_details(&self) -> String {
        match &self.details {
            Some(details) => details.clone(),
            None => match (self.channel, self.measurement) {
                (Channel::Drowsiness, Some(ear)) => format!("EAR: {:.3}", ear),
                (channel, _) => channel.default_details().to_string(),
            },
        }
    }
}

/// All channel signals observed at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub now: DateTime<Utc>,
    pub signals: Vec<ChannelSignal>,
}

impl Tick {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            signals: Vec::with_capacity(Channel::COUNT),
        }
    }

    /// Add a channel signal (builder style)
    pub fn with(mut self, signal: ChannelSignal) -> Self {
        self.signals.push(signal);
        self
    }

    /// A tick carries at most one update per channel
    pub fn validate(&self) -> Result<(), DmsError> {
        let mut seen = [false; Channel::COUNT];
        for signal in &self.signals {
            let slot = &mut seen[signal.channel.index()];
            if *slot {
                return Err(DmsError::DuplicateChannel(signal.channel));
            }
            *slot = true;
        }
        Ok(())
    }
}
