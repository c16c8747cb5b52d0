//! In-memory Repository Implementation

use crate::{Event, EventId, EventLog, LedgerError, NewEvent, StorageError, Trip, TripId, TripLedger};
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Repository for events and trips held in process memory
pub struct Repository {
    /// Event records, append-only
    events: Mutex<Vec<Event>>,
    /// Trip records
    trips: Mutex<Vec<Trip>>,
    /// Next event ID
    next_event_id: Mutex<EventId>,
}

impl Repository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        info!("Creating in-memory repository");
        Self {
            events: Mutex::new(Vec::with_capacity(1000)),
            trips: Mutex::new(Vec::new()),
            next_event_id: Mutex::new(1),
        }
    }

    /// Get total event count
    pub fn event_count(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Get total trip count
    pub fn trip_count(&self) -> usize {
        self.trips.lock().map(|t| t.len()).unwrap_or(0)
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))
}

impl EventLog for Repository {
    async fn record(&self, event: NewEvent) -> Result<EventId, StorageError> {
        let mut events = lock(&self.events)?;
        let mut id = lock(&self.next_event_id)?;

        let record = event.with_id(*id);
        *id += 1;

        debug!("Recorded {} event {} for {}", record.channel, record.id, record.driver_id);
        let returned_id = record.id;
        events.push(record);
        Ok(returned_id)
    }

    async fn query_by_driver(&self, driver_id: &str) -> Result<Vec<Event>, StorageError> {
        let events = lock(&self.events)?;
        Ok(events.iter().filter(|e| e.driver_id == driver_id).cloned().collect())
    }

    async fn query_by_trip(&self, trip_id: TripId) -> Result<Vec<Event>, StorageError> {
        let events = lock(&self.events)?;
        Ok(events.iter().filter(|e| e.trip_id == Some(trip_id)).cloned().collect())
    }
}

impl TripLedger for Repository {
    async fn start(
        &self,
        driver_id: &str,
        start_point: &str,
        destination: &str,
        now: DateTime<Utc>,
    ) -> Result<TripId, LedgerError> {
        let mut trips = lock(&self.trips)?;

        if let Some(open) = trips.iter().find(|t| t.driver_id == driver_id && t.is_open()) {
            return Err(LedgerError::TripAlreadyOpen {
                driver_id: driver_id.to_string(),
                trip_id: open.id,
            });
        }

        let trip = Trip {
            id: TripId::new(),
            driver_id: driver_id.to_string(),
            start_point: start_point.to_string(),
            destination: destination.to_string(),
            start_time: now,
            end_time: None,
        };
        let id = trip.id;
        trips.push(trip);

        info!("Trip {} started for {} ({} -> {})", id, driver_id, start_point, destination);
        Ok(id)
    }

    async fn end(&self, trip_id: TripId, now: DateTime<Utc>) -> Result<Trip, LedgerError> {
        let mut trips = lock(&self.trips)?;

        let trip = trips
            .iter_mut()
            .find(|t| t.id == trip_id)
            .ok_or(LedgerError::TripNotFound(trip_id))?;
        if !trip.is_open() {
            return Err(LedgerError::TripAlreadyClosed(trip_id));
        }

        trip.end_time = Some(now);
        info!("Trip {} ended for {}", trip_id, trip.driver_id);
        Ok(trip.clone())
    }

    async fn get(&self, trip_id: TripId) -> Result<Option<Trip>, StorageError> {
        let trips = lock(&self.trips)?;
        Ok(trips.iter().find(|t| t.id == trip_id).cloned())
    }

    async fn open_trip(&self, driver_id: &str) -> Result<Option<Trip>, StorageError> {
        let trips = lock(&self.trips)?;
        Ok(trips
            .iter()
            .find(|t| t.driver_id == driver_id && t.is_open())
            .cloned())
    }

    async fn trips_for_driver(&self, driver_id: &str) -> Result<Vec<Trip>, StorageError> {
        let trips = lock(&self.trips)?;
        Ok(trips.iter().filter(|t| t.driver_id == driver_id).cloned().collect())
    }
}
