//! Monitoring sessions

use crate::AlarmScheduler;
use chrono::{DateTime, Utc};
use dms::ChannelTimers;
use std::collections::HashMap;
use std::sync::Arc;
use storage::TripId;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// Everything one driver's monitoring owns between trip start and end
pub struct MonitoringSession {
    pub driver_id: String,
    /// Trip events are attributed to; `None` records trip-less events
    pub trip_id: Option<TripId>,
    pub started_at: DateTime<Utc>,
    pub timers: ChannelTimers,
    pub alarm: AlarmScheduler,
}

impl MonitoringSession {
    pub fn new(
        driver_id: impl Into<String>,
        trip_id: Option<TripId>,
        started_at: DateTime<Utc>,
        alarm: AlarmScheduler,
    ) -> Self {
        Self {
            driver_id: driver_id.into(),
            trip_id,
            started_at,
            timers: ChannelTimers::default(),
            alarm,
        }
    }

    /// Silence the alarm and forget all runs
    pub fn shutdown(&mut self) {
        if let Err(e) = self.alarm.stop_now() {
            warn!("Failed to stop alarm for {}: {}", self.driver_id, e);
        }
        self.timers.reset();
    }
}

pub type SharedSession = Arc<Mutex<MonitoringSession>>;

/// Active sessions keyed by driver.
///
/// Each session sits behind its own mutex, so ticks for one driver are
/// applied one at a time while different drivers proceed in parallel.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SharedSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session, replacing (and shutting down) any previous one for the driver
    pub async fn open(&self, session: MonitoringSession) -> SharedSession {
        let driver_id = session.driver_id.clone();
        let shared = Arc::new(Mutex::new(session));

        let previous = self
            .sessions
            .write()
            .await
            .insert(driver_id.clone(), Arc::clone(&shared));
        if let Some(previous) = previous {
            warn!("Replacing stale monitoring session for {}", driver_id);
            previous.lock().await.shutdown();
        }

        info!("Monitoring session opened for {}", driver_id);
        shared
    }

    pub async fn get(&self, driver_id: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(driver_id).cloned()
    }

    /// Remove and shut down a driver's session
    pub async fn close(&self, driver_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(driver_id);
        match removed {
            Some(session) => {
                session.lock().await.shutdown();
                info!("Monitoring session closed for {}", driver_id);
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::tests::CountingAlarm;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn session(driver: &str, sink: Arc<CountingAlarm>) -> MonitoringSession {
        MonitoringSession::new(
            driver,
            None,
            Utc::now(),
            AlarmScheduler::new(sink, Duration::from_secs(3)),
        )
    }

    #[tokio::test]
    async fn test_open_get_close() {
        let registry = SessionRegistry::new();
        let sink = Arc::new(CountingAlarm::default());

        registry.open(session("alice", sink.clone())).await;
        assert_eq!(registry.len().await, 1);
        assert!(registry.get("alice").await.is_some());
        assert!(registry.get("bob").await.is_none());

        assert!(registry.close("alice").await);
        assert!(!registry.close("alice").await);
        assert!(registry.is_empty().await);
        assert_eq!(sink.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reopen_replaces_session() {
        let registry = SessionRegistry::new();
        let first = Arc::new(CountingAlarm::default());
        let second = Arc::new(CountingAlarm::default());

        registry.open(session("alice", first.clone())).await;
        registry.open(session("alice", second.clone())).await;

        assert_eq!(registry.len().await, 1);
        assert_eq!(first.stops.load(Ordering::SeqCst), 1);
        assert_eq!(second.stops.load(Ordering::SeqCst), 0);
    }
}
