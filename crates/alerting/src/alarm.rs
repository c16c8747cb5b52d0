//! Bounded-duration alarm playback

use crate::{AudibleAlert, SinkError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

/// Plays the alarm and stops it after a fixed duration.
///
/// Each fire schedules one stop task; a new fire aborts the pending stop
/// so an older timer never cuts a fresh alarm short.
pub struct AlarmScheduler {
    sink: Arc<dyn AudibleAlert>,
    duration: Duration,
    pending_stop: Mutex<Option<JoinHandle<()>>>,
}

impl AlarmScheduler {
    pub fn new(sink: Arc<dyn AudibleAlert>, duration: Duration) -> Self {
        Self {
            sink,
            duration,
            pending_stop: Mutex::new(None),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    fn cancel_pending(&self) {
        if let Ok(mut pending) = self.pending_stop.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
    }

    /// Start the alarm; must be called inside a tokio runtime.
    ///
    /// A failed play keeps any pending stop, so an alarm that is already
    /// sounding still goes quiet on schedule.
    pub fn trigger(&self) -> Result<(), SinkError> {
        self.sink.play()?;

        let sink = Arc::clone(&self.sink);
        let duration = self.duration;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Err(e) = sink.stop() {
                warn!("Failed to stop alarm: {}", e);
            }
        });

        if let Ok(mut pending) = self.pending_stop.lock() {
            if let Some(stale) = pending.replace(handle) {
                stale.abort();
            }
        }
        Ok(())
    }

    /// Silence immediately (session end)
    pub fn stop_now(&self) -> Result<(), SinkError> {
        self.cancel_pending();
        self.sink.stop()
    }
}

impl Drop for AlarmScheduler {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
