//! Per-channel run tracking

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::{Channel, DmsConfig};

/// What the debouncer concluded for one channel on one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Observation {
    /// Time since the run started; `None` when the channel is clear
    pub run_elapsed: Option<Duration>,

    /// This tick opened a new run
    pub run_started: bool,

    /// The audible alert should fire (first fire or periodic re-fire)
    pub fire: bool,

    /// The run has reached the notification threshold and nobody was told yet
    pub notify_due: bool,
}

impl Observation {
    /// Whether the channel is inside a run
    pub fn is_active(&self) -> bool {
        self.run_elapsed.is_some()
    }
}

/// Escalation state of one channel within a monitoring session.
///
/// Two clocks are kept apart: the run start (`first_detected_at`) drives the
/// first fire and the notification threshold, while `last_fired_at` drives
/// periodic re-fires. Firing never moves the run start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelTimer {
    first_detected_at: Option<DateTime<Utc>>,
    last_fired_at: Option<DateTime<Utc>>,
    alert_fired: bool,
    notified: bool,
}

impl ChannelTimer {
    pub fn first_detected_at(&self) -> Option<DateTime<Utc>> {
        self.first_detected_at
    }

    pub fn last_fired_at(&self) -> Option<DateTime<Utc>> {
        self.last_fired_at
    }

    pub fn alert_fired(&self) -> bool {
        self.alert_fired
    }

    pub fn notified(&self) -> bool {
        self.notified
    }

    /// Whether a run is in progress
    pub fn is_active(&self) -> bool {
        self.first_detected_at.is_some()
    }

    /// Feed one raw detection and advance the run state
    pub fn observe(&mut self, detected: bool, now: DateTime<Utc>, config: &DmsConfig) -> Observation {
        if !detected {
            if self.is_active() {
                debug!("Run cleared (alert_fired: {}, notified: {})", self.alert_fired, self.notified);
            }
            self.reset();
            return Observation::default();
        }

        let Some(started) = self.first_detected_at else {
            self.first_detected_at = Some(now);
            return Observation {
                run_elapsed: Some(Duration::zero()),
                run_started: true,
                ..Default::default()
            };
        };

        // Out-of-order ticks must not produce a negative run length
        let elapsed = (now - started).max(Duration::zero());

        let fire = match self.last_fired_at {
            None => elapsed >= config.hold(),
            Some(last) => now - last >= config.alert_period(),
        };
        if fire {
            self.alert_fired = true;
            self.last_fired_at = Some(now);
        }

        Observation {
            run_elapsed: Some(elapsed),
            run_started: false,
            fire,
            notify_due: !self.notified && elapsed >= config.notify_threshold(),
        }
    }

    /// Record a successful notification for the current run
    pub fn mark_notified(&mut self) {
        if self.is_active() {
            self.notified = true;
        } else {
            debug!("Ignoring notification mark on an inactive channel");
        }
    }

    /// Clear the run entirely
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The fixed set of channel timers owned by one monitoring session
#[derive(Debug, Clone, Default)]
pub struct ChannelTimers {
    timers: [ChannelTimer; Channel::COUNT],
}

impl ChannelTimers {
    pub fn get(&self, channel: Channel) -> &ChannelTimer {
        &self.timers[channel.index()]
    }

    pub fn get_mut(&mut self, channel: Channel) -> &mut ChannelTimer {
        &mut self.timers[channel.index()]
    }

    /// Channels with a run in progress
    pub fn active_channels(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|c| self.get(*c).is_active())
            .collect()
    }

    /// Reset state (on trip end or driver change)
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
