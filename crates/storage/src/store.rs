//! Backend selection

use crate::{Event, EventId, EventLog, LedgerError, NewEvent, Repository, SqliteRepository, StorageError, Trip, TripId, TripLedger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which backend to persist into
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Process memory; lost on restart
    #[default]
    Memory,
    Sqlite { url: String },
}

/// Runtime-selected repository
pub enum Store {
    Memory(Repository),
    Sqlite(SqliteRepository),
}

impl Store {
    pub async fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        match config {
            StorageConfig::Memory => Ok(Store::Memory(Repository::new())),
            StorageConfig::Sqlite { url } => Ok(Store::Sqlite(SqliteRepository::connect(url).await?)),
        }
    }

    /// Release database connections; later calls fail with a storage error
    pub async fn close(&self) {
        if let Store::Sqlite(r) = self {
            r.close().await;
        }
    }
}

impl EventLog for Store {
    async fn record(&self, event: NewEvent) -> Result<EventId, StorageError> {
        match self {
            Store::Memory(r) => r.record(event).await,
            Store::Sqlite(r) => r.record(event).await,
        }
    }

    async fn query_by_driver(&self, driver_id: &str) -> Result<Vec<Event>, StorageError> {
        match self {
            Store::Memory(r) => r.query_by_driver(driver_id).await,
            Store::Sqlite(r) => r.query_by_driver(driver_id).await,
        }
    }

    async fn query_by_trip(&self, trip_id: TripId) -> Result<Vec<Event>, StorageError> {
        match self {
            Store::Memory(r) => r.query_by_trip(trip_id).await,
            Store::Sqlite(r) => r.query_by_trip(trip_id).await,
        }
    }
}

impl TripLedger for Store {
    async fn start(
        &self,
        driver_id: &str,
        start_point: &str,
        destination: &str,
        now: DateTime<Utc>,
    ) -> Result<TripId, LedgerError> {
        match self {
            Store::Memory(r) => r.start(driver_id, start_point, destination, now).await,
            Store::Sqlite(r) => r.start(driver_id, start_point, destination, now).await,
        }
    }

    async fn end(&self, trip_id: TripId, now: DateTime<Utc>) -> Result<Trip, LedgerError> {
        match self {
            Store::Memory(r) => r.end(trip_id, now).await,
            Store::Sqlite(r) => r.end(trip_id, now).await,
        }
    }

    async fn get(&self, trip_id: TripId) -> Result<Option<Trip>, StorageError> {
        match self {
            Store::Memory(r) => r.get(trip_id).await,
            Store::Sqlite(r) => r.get(trip_id).await,
        }
    }

    async fn open_trip(&self, driver_id: &str) -> Result<Option<Trip>, StorageError> {
        match self {
            Store::Memory(r) => r.open_trip(driver_id).await,
            Store::Sqlite(r) => r.open_trip(driver_id).await,
        }
    }

    async fn trips_for_driver(&self, driver_id: &str) -> Result<Vec<Trip>, StorageError> {
        match self {
            Store::Memory(r) => r.trips_for_driver(driver_id).await,
            Store::Sqlite(r) => r.trips_for_driver(driver_id).await,
        }
    }
}
