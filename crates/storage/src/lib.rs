//! Storage Layer
//!
//! Append-only event log and trip ledger, with an in-memory repository
//! and a SQLite-backed one sharing the same traits.

mod model;
mod repository;
mod sqlite;
mod store;

pub use model::{Event, EventId, NewEvent, Trip, TripId, TripSummary};
pub use repository::Repository;
pub use sqlite::SqliteRepository;
pub use store::{Store, StorageConfig};

use chrono::{DateTime, Utc};
use std::future::Future;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Record not found")]
    NotFound,
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound,
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StorageError::SerializationError(err.to_string())
            }
            other => StorageError::DatabaseError(other.to_string()),
        }
    }
}

/// Trip lifecycle violations and the storage failures behind them
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Driver {driver_id} already has open trip {trip_id}")]
    TripAlreadyOpen { driver_id: String, trip_id: TripId },

    #[error("Trip {0} not found")]
    TripNotFound(TripId),

    #[error("Trip {0} is already closed")]
    TripAlreadyClosed(TripId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Append-only store of detection events
pub trait EventLog: Send + Sync {
    /// Persist an event and return its id
    fn record(&self, event: NewEvent) -> impl Future<Output = Result<EventId, StorageError>> + Send;

    /// Events of a driver in recording order, trip-less ones included
    fn query_by_driver(
        &self,
        driver_id: &str,
    ) -> impl Future<Output = Result<Vec<Event>, StorageError>> + Send;

    /// Events attributed to a trip in recording order
    fn query_by_trip(
        &self,
        trip_id: TripId,
    ) -> impl Future<Output = Result<Vec<Event>, StorageError>> + Send;
}

/// Trip lifecycle store: open once, close once, never reopen
pub trait TripLedger: Send + Sync {
    /// Open a trip; fails if the driver already has one open
    fn start(
        &self,
        driver_id: &str,
        start_point: &str,
        destination: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<TripId, LedgerError>> + Send;

    /// Close an open trip and return its final state
    fn end(
        &self,
        trip_id: TripId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Trip, LedgerError>> + Send;

    fn get(&self, trip_id: TripId) -> impl Future<Output = Result<Option<Trip>, StorageError>> + Send;

    /// The driver's open trip, if any
    fn open_trip(
        &self,
        driver_id: &str,
    ) -> impl Future<Output = Result<Option<Trip>, StorageError>> + Send;

    /// All trips of a driver, oldest first
    fn trips_for_driver(
        &self,
        driver_id: &str,
    ) -> impl Future<Output = Result<Vec<Trip>, StorageError>> + Send;
}
