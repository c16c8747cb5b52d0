//! Escalation Policy Implementation

use crate::MonitoringSession;
use chrono::{DateTime, Utc};
use directory::ManagerDirectory;
use dms::{Channel, ChannelSignal, DmsConfig, DmsError, Tick};
use metrics::counter;
use notify::Notifier;
use serde::Serialize;
use std::sync::Arc;
use storage::{EventId, EventLog, NewEvent};
use tracing::{debug, info, warn};

/// Result of the audible-alert step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum AlertOutcome {
    /// No fire due this tick
    Idle,
    Played,
    Failed(String),
}

/// Result of the event-log step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EventOutcome {
    /// Channel clear; nothing to record
    NotRecorded,
    Recorded { id: EventId },
    Failed { error: String },
}

/// Result of the remote-notification step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationOutcome {
    /// Threshold not reached, or already notified this run
    NotDue,
    Sent { to: String },
    /// No manager or no e-mail on file
    Skipped,
    /// Dispatch failed or timed out; retried on the next qualifying tick
    Failed { error: String },
}

/// What happened to one channel on one tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelOutcome {
    pub channel: Channel,
    pub detected: bool,
    /// Run length so far, when a run is active
    pub run_elapsed_ms: Option<i64>,
    pub alert: AlertOutcome,
    pub event: EventOutcome,
    pub notification: NotificationOutcome,
}

/// Per-tick escalation summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub driver_id: String,
    pub now: DateTime<Utc>,
    pub channels: Vec<ChannelOutcome>,
}

impl TickReport {
    pub fn outcome(&self, channel: Channel) -> Option<&ChannelOutcome> {
        self.channels.iter().find(|c| c.channel == channel)
    }

    pub fn alerts_played(&self) -> usize {
        self.channels
            .iter()
            .filter(|c| c.alert == AlertOutcome::Played)
            .count()
    }

    pub fn notifications_sent(&self) -> usize {
        self.channels
            .iter()
            .filter(|c| matches!(c.notification, NotificationOutcome::Sent { .. }))
            .count()
    }
}

/// Subject and body of the manager notification
pub fn alert_message(channel: Channel, driver_id: &str) -> (String, String) {
    let name = channel.alert_name();
    let mut chars = name.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };

    let subject = format!("ALERT: {} detected for driver {}", capitalized, driver_id);
    let body = format!(
        "Continuous {} detected for driver {} during trip. Please check the dashboard for details.",
        name, driver_id
    );
    (subject, body)
}

/// Applies the escalation policy to monitoring sessions
pub struct Escalator<L, D, N> {
    config: DmsConfig,
    events: Arc<L>,
    directory: Arc<D>,
    notifier: Arc<N>,
}

impl<L, D, N> Escalator<L, D, N>
where
    L: EventLog,
    D: ManagerDirectory,
    N: Notifier,
{
    pub fn new(config: DmsConfig, events: Arc<L>, directory: Arc<D>, notifier: Arc<N>) -> Self {
        info!("Creating escalator with config: {:?}", config);
        Self {
            config,
            events,
            directory,
            notifier,
        }
    }

    pub fn config(&self) -> &DmsConfig {
        &self.config
    }

    /// Run one tick through debouncing and escalation.
    ///
    /// Only a malformed tick is an error; sink and storage failures are
    /// reported per channel in the returned [`TickReport`].
    pub async fn process_tick(
        &self,
        session: &mut MonitoringSession,
        tick: &Tick,
    ) -> Result<TickReport, DmsError> {
        tick.validate()?;

        let mut channels = Vec::with_capacity(tick.signals.len());
        for signal in &tick.signals {
            channels.push(self.process_signal(session, signal, tick.now).await);
        }

        Ok(TickReport {
            driver_id: session.driver_id.clone(),
            now: tick.now,
            channels,
        })
    }

    async fn process_signal(
        &self,
        session: &mut MonitoringSession,
        signal: &ChannelSignal,
        now: DateTime<Utc>,
    ) -> ChannelOutcome {
        let channel = signal.channel;
        let observation = session
            .timers
            .get_mut(channel)
            .observe(signal.detected, now, &self.config);
        if observation.run_started {
            debug!("{} run started for {}", channel, session.driver_id);
        }

        let event = if signal.detected {
            self.record_event(session, signal, now).await
        } else {
            EventOutcome::NotRecorded
        };

        let alert = if observation.fire {
            self.sound_alarm(session, channel)
        } else {
            AlertOutcome::Idle
        };

        let notification = if observation.notify_due {
            let outcome = self.notify(&session.driver_id, channel).await;
            if matches!(outcome, NotificationOutcome::Sent { .. }) {
                session.timers.get_mut(channel).mark_notified();
            }
            outcome
        } else {
            NotificationOutcome::NotDue
        };

        ChannelOutcome {
            channel,
            detected: signal.detected,
            run_elapsed_ms: observation.run_elapsed.map(|d| d.num_milliseconds()),
            alert,
            event,
            notification,
        }
    }

    async fn record_event(
        &self,
        session: &MonitoringSession,
        signal: &ChannelSignal,
        now: DateTime<Utc>,
    ) -> EventOutcome {
        let event = NewEvent::from_signal(signal, &session.driver_id, session.trip_id, now);
        match self.events.record(event).await {
            Ok(id) => {
                counter!("dms_events_recorded_total", "channel" => signal.channel.as_str()).increment(1);
                EventOutcome::Recorded { id }
            }
            Err(e) => {
                warn!("Failed to record {} event for {}: {}", signal.channel, session.driver_id, e);
                counter!("dms_sink_failures_total", "sink" => "event_log").increment(1);
                EventOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    fn sound_alarm(&self, session: &MonitoringSession, channel: Channel) -> AlertOutcome {
        match session.alarm.trigger() {
            Ok(()) => {
                info!("{} alert for {}", channel.label(), session.driver_id);
                counter!("dms_alerts_fired_total", "channel" => channel.as_str()).increment(1);
                AlertOutcome::Played
            }
            Err(e) => {
                warn!("Error playing alert sound for {}: {}", session.driver_id, e);
                counter!("dms_sink_failures_total", "sink" => "alarm").increment(1);
                AlertOutcome::Failed(e.to_string())
            }
        }
    }

    async fn notify(&self, driver_id: &str, channel: Channel) -> NotificationOutcome {
        let Some(to) = self.directory.resolve_manager_email(driver_id) else {
            debug!("No manager e-mail for {}; skipping {} notification", driver_id, channel);
            counter!("dms_notifications_total", "channel" => channel.as_str(), "outcome" => "skipped")
                .increment(1);
            return NotificationOutcome::Skipped;
        };

        let (subject, body) = alert_message(channel, driver_id);
        let timeout = self.config.notify_timeout();
        let result = tokio::time::timeout(timeout, self.notifier.send(&to, &subject, &body)).await;

        let error = match result {
            Ok(Ok(())) => {
                info!("Notified {} about {} for {}", to, channel, driver_id);
                counter!("dms_notifications_total", "channel" => channel.as_str(), "outcome" => "sent")
                    .increment(1);
                return NotificationOutcome::Sent { to };
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {}ms", timeout.as_millis()),
        };

        warn!("Notification to {} for {} failed: {}", to, driver_id, error);
        counter!("dms_notifications_total", "channel" => channel.as_str(), "outcome" => "failed")
            .increment(1);
        NotificationOutcome::Failed { error }
    }
}
