//! Trip-scoped monitoring facade used by the hosting application

use crate::{AlarmScheduler, AudibleAlert, Escalator, MonitoringSession, SessionRegistry, TickReport};
use chrono::{DateTime, Utc};
use directory::ManagerDirectory;
use dms::{DmsConfig, DmsError, Tick};
use notify::Notifier;
use std::sync::Arc;
use storage::{EventLog, LedgerError, StorageError, Trip, TripId, TripLedger};
use thiserror::Error;
use tracing::info;

/// Monitor error types
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Tick(#[from] DmsError),

    #[error("No active monitoring session for driver {0}")]
    NoSession(String),
}

/// Ties trip lifecycle to monitoring sessions
pub struct Monitor<R, D, N> {
    escalator: Escalator<R, D, N>,
    store: Arc<R>,
    registry: SessionRegistry,
    alarm_sink: Arc<dyn AudibleAlert>,
}

impl<R, D, N> Monitor<R, D, N>
where
    R: EventLog + TripLedger,
    D: ManagerDirectory,
    N: Notifier,
{
    pub fn new(
        config: DmsConfig,
        store: Arc<R>,
        directory: Arc<D>,
        notifier: Arc<N>,
        alarm_sink: Arc<dyn AudibleAlert>,
    ) -> Self {
        Self {
            escalator: Escalator::new(config, Arc::clone(&store), directory, notifier),
            store,
            registry: SessionRegistry::new(),
            alarm_sink,
        }
    }

    pub fn store(&self) -> &Arc<R> {
        &self.store
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.registry
    }

    fn new_session(&self, driver_id: &str, trip_id: Option<TripId>, now: DateTime<Utc>) -> MonitoringSession {
        let alarm = AlarmScheduler::new(
            Arc::clone(&self.alarm_sink),
            self.escalator.config().alarm_duration(),
        );
        MonitoringSession::new(driver_id, trip_id, now, alarm)
    }

    /// Open a trip and start monitoring it
    pub async fn start_trip(
        &self,
        driver_id: &str,
        start_point: &str,
        destination: &str,
        now: DateTime<Utc>,
    ) -> Result<TripId, MonitorError> {
        let trip_id = self.store.start(driver_id, start_point, destination, now).await?;
        self.registry
            .open(self.new_session(driver_id, Some(trip_id), now))
            .await;
        Ok(trip_id)
    }

    /// Resume monitoring a driver, attaching to their open trip if there is one
    pub async fn resume(&self, driver_id: &str, now: DateTime<Utc>) -> Result<Option<TripId>, MonitorError> {
        let trip_id = self.store.open_trip(driver_id).await?.map(|t| t.id);
        if trip_id.is_none() {
            info!("Monitoring {} without an open trip", driver_id);
        }
        self.registry.open(self.new_session(driver_id, trip_id, now)).await;
        Ok(trip_id)
    }

    /// Close a trip and tear down its session
    pub async fn end_trip(&self, trip_id: TripId, now: DateTime<Utc>) -> Result<Trip, MonitorError> {
        let trip = self.store.end(trip_id, now).await?;
        self.registry.close(&trip.driver_id).await;
        Ok(trip)
    }

    /// Feed one tick into the driver's session
    pub async fn ingest(&self, driver_id: &str, tick: &Tick) -> Result<TickReport, MonitorError> {
        let session = self
            .registry
            .get(driver_id)
            .await
            .ok_or_else(|| MonitorError::NoSession(driver_id.to_string()))?;
        let mut session = session.lock().await;
        Ok(self.escalator.process_tick(&mut session, tick).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::tests::CountingAlarm;
    use directory::{User, UserDirectory};
    use dms::{Channel, ChannelSignal};
    use notify::LogNotifier;
    use storage::Repository;

    fn monitor() -> Monitor<Repository, UserDirectory, LogNotifier> {
        let dir = UserDirectory::new();
        dir.register(User::driver("alice")).unwrap();
        Monitor::new(
            DmsConfig::default(),
            Arc::new(Repository::new()),
            Arc::new(dir),
            Arc::new(LogNotifier),
            Arc::new(CountingAlarm::default()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_trip_scoped_session() {
        let monitor = monitor();
        let now = Utc::now();

        let trip_id = monitor.start_trip("alice", "Depot", "Harbour", now).await.unwrap();
        let tick = Tick::new(now).with(ChannelSignal::detected(Channel::PhoneUse));
        let report = monitor.ingest("alice", &tick).await.unwrap();
        assert_eq!(report.channels.len(), 1);

        let events = monitor.store().query_by_trip(trip_id).await.unwrap();
        assert_eq!(events.len(), 1);

        let trip = monitor.end_trip(trip_id, now).await.unwrap();
        assert!(!trip.is_open());
        assert!(matches!(
            monitor.ingest("alice", &tick).await,
            Err(MonitorError::NoSession(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invariant_violations_leave_sessions_alone() {
        let monitor = monitor();
        let now = Utc::now();
        let trip_id = monitor.start_trip("alice", "A", "B", now).await.unwrap();

        let err = monitor.start_trip("alice", "C", "D", now).await.unwrap_err();
        assert!(matches!(err, MonitorError::Ledger(LedgerError::TripAlreadyOpen { .. })));
        assert_eq!(monitor.sessions().len().await, 1);

        monitor.end_trip(trip_id, now).await.unwrap();
        let err = monitor.end_trip(trip_id, now).await.unwrap_err();
        assert!(matches!(err, MonitorError::Ledger(LedgerError::TripAlreadyClosed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_without_trip_records_tripless_events() {
        let monitor = monitor();
        let now = Utc::now();

        assert_eq!(monitor.resume("alice", now).await.unwrap(), None);
        let tick = Tick::new(now).with(ChannelSignal::detected(Channel::Yawning));
        monitor.ingest("alice", &tick).await.unwrap();

        let events = monitor.store().query_by_driver("alice").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].trip_id, None);
    }
}
