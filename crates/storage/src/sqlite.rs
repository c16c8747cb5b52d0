//! SQLite-backed repository

use crate::{Event, EventId, EventLog, LedgerError, NewEvent, StorageError, Trip, TripId, TripLedger};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS trips (
    id TEXT PRIMARY KEY NOT NULL,
    driver_id TEXT NOT NULL,
    start_point TEXT NOT NULL,
    destination TEXT NOT NULL,
    start_time_ns INTEGER NOT NULL,
    end_time_ns INTEGER
);
"#,
    r#"
CREATE UNIQUE INDEX IF NOT EXISTS trips_open_per_driver
ON trips (driver_id) WHERE end_time_ns IS NULL;
"#,
    r#"
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp_ns INTEGER NOT NULL,
    channel TEXT NOT NULL,
    driver_id TEXT NOT NULL,
    trip_id TEXT,
    details TEXT NOT NULL,
    measurement REAL
);
"#,
    "CREATE INDEX IF NOT EXISTS events_by_driver ON events (driver_id);",
    "CREATE INDEX IF NOT EXISTS events_by_trip ON events (trip_id);",
];

const INSERT_EVENT: &str = r#"
INSERT INTO events (timestamp_ns, channel, driver_id, trip_id, details, measurement)
VALUES ($1, $2, $3, $4, $5, $6);
"#;

const SELECT_EVENTS_BY_DRIVER: &str = r#"
SELECT id, timestamp_ns, channel, driver_id, trip_id, details, measurement
FROM events WHERE driver_id = $1 ORDER BY id;
"#;

const SELECT_EVENTS_BY_TRIP: &str = r#"
SELECT id, timestamp_ns, channel, driver_id, trip_id, details, measurement
FROM events WHERE trip_id = $1 ORDER BY id;
"#;

const INSERT_TRIP: &str = r#"
INSERT INTO trips (id, driver_id, start_point, destination, start_time_ns)
VALUES ($1, $2, $3, $4, $5);
"#;

const UPDATE_TRIP_END: &str = r#"
UPDATE trips SET end_time_ns = $1 WHERE id = $2 AND end_time_ns IS NULL;
"#;

const SELECT_TRIP: &str = r#"
SELECT id, driver_id, start_point, destination, start_time_ns, end_time_ns
FROM trips WHERE id = $1;
"#;

const SELECT_OPEN_TRIP: &str = r#"
SELECT id, driver_id, start_point, destination, start_time_ns, end_time_ns
FROM trips WHERE driver_id = $1 AND end_time_ns IS NULL LIMIT 1;
"#;

const SELECT_TRIPS_BY_DRIVER: &str = r#"
SELECT id, driver_id, start_point, destination, start_time_ns, end_time_ns
FROM trips WHERE driver_id = $1 ORDER BY start_time_ns;
"#;

/// Durable repository on a SQLite database
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Open (creating if needed) the database at `url` and apply the schema
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory database lives and dies with its single connection
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let repo = Self { pool };
        repo.migrate().await?;
        info!("SQLite repository ready at {}", url);
        Ok(repo)
    }

    /// Private in-memory database
    pub async fn in_memory() -> Result<Self, StorageError> {
        Self::connect("sqlite::memory:").await
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn to_nanos(ts: DateTime<Utc>) -> Result<i64, StorageError> {
    ts.timestamp_nanos_opt()
        .ok_or_else(|| StorageError::SerializationError(format!("Timestamp out of range: {}", ts)))
}

fn from_nanos(ns: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(ns)
}

fn parse_trip_id(raw: &str) -> Result<TripId, StorageError> {
    raw.parse()
        .map_err(|e| StorageError::SerializationError(format!("Invalid trip id {}: {}", raw, e)))
}

fn event_from_row(row: &SqliteRow) -> Result<Event, StorageError> {
    let channel: String = row.try_get("channel")?;
    let trip_id: Option<String> = row.try_get("trip_id")?;

    Ok(Event {
        id: row.try_get("id")?,
        timestamp: from_nanos(row.try_get("timestamp_ns")?),
        channel: channel
            .parse()
            .map_err(|e: dms::DmsError| StorageError::SerializationError(e.to_string()))?,
        driver_id: row.try_get("driver_id")?,
        trip_id: trip_id.as_deref().map(parse_trip_id).transpose()?,
        details: row.try_get("details")?,
        measurement: row.try_get("measurement")?,
    })
}

fn trip_from_row(row: &SqliteRow) -> Result<Trip, StorageError> {
    let id: String = row.try_get("id")?;
    let end_time_ns: Option<i64> = row.try_get("end_time_ns")?;

    Ok(Trip {
        id: parse_trip_id(&id)?,
        driver_id: row.try_get("driver_id")?,
        start_point: row.try_get("start_point")?,
        destination: row.try_get("destination")?,
        start_time: from_nanos(row.try_get("start_time_ns")?),
        end_time: end_time_ns.map(from_nanos),
    })
}

impl EventLog for SqliteRepository {
    async fn record(&self, event: NewEvent) -> Result<EventId, StorageError> {
        let result = sqlx::query(INSERT_EVENT)
            .bind(to_nanos(event.timestamp)?)
            .bind(event.channel.as_str())
            .bind(&event.driver_id)
            .bind(event.trip_id.map(|t| t.to_string()))
            .bind(&event.details)
            .bind(event.measurement)
            .execute(&self.pool)
            .await?;

        let id = result.last_insert_rowid();
        debug!("Recorded {} event {} for {}", event.channel, id, event.driver_id);
        Ok(id)
    }

    async fn query_by_driver(&self, driver_id: &str) -> Result<Vec<Event>, StorageError> {
        let rows = sqlx::query(SELECT_EVENTS_BY_DRIVER)
            .bind(driver_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(event_from_row).collect()
    }

    async fn query_by_trip(&self, trip_id: TripId) -> Result<Vec<Event>, StorageError> {
        let rows = sqlx::query(SELECT_EVENTS_BY_TRIP)
            .bind(trip_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(event_from_row).collect()
    }
}

impl TripLedger for SqliteRepository {
    async fn start(
        &self,
        driver_id: &str,
        start_point: &str,
        destination: &str,
        now: DateTime<Utc>,
    ) -> Result<TripId, LedgerError> {
        if let Some(open) = self.open_trip(driver_id).await? {
            return Err(LedgerError::TripAlreadyOpen {
                driver_id: driver_id.to_string(),
                trip_id: open.id,
            });
        }

        let id = TripId::new();
        let inserted = sqlx::query(INSERT_TRIP)
            .bind(id.to_string())
            .bind(driver_id)
            .bind(start_point)
            .bind(destination)
            .bind(to_nanos(now)?)
            .execute(&self.pool)
            .await;

        match inserted {
            Ok(_) => {
                info!("Trip {} started for {} ({} -> {})", id, driver_id, start_point, destination);
                Ok(id)
            }
            // Lost a race against a concurrent start for the same driver
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                let open = self.open_trip(driver_id).await?.ok_or(StorageError::NotFound)?;
                Err(LedgerError::TripAlreadyOpen {
                    driver_id: driver_id.to_string(),
                    trip_id: open.id,
                })
            }
            Err(e) => Err(StorageError::from(e).into()),
        }
    }

    async fn end(&self, trip_id: TripId, now: DateTime<Utc>) -> Result<Trip, LedgerError> {
        let result = sqlx::query(UPDATE_TRIP_END)
            .bind(to_nanos(now)?)
            .bind(trip_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let trip = self.get(trip_id).await?.ok_or(LedgerError::TripNotFound(trip_id))?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::TripAlreadyClosed(trip_id));
        }

        info!("Trip {} ended for {}", trip_id, trip.driver_id);
        Ok(trip)
    }

    async fn get(&self, trip_id: TripId) -> Result<Option<Trip>, StorageError> {
        let row = sqlx::query(SELECT_TRIP)
            .bind(trip_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(trip_from_row).transpose()
    }

    async fn open_trip(&self, driver_id: &str) -> Result<Option<Trip>, StorageError> {
        let row = sqlx::query(SELECT_OPEN_TRIP)
            .bind(driver_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(trip_from_row).transpose()
    }

    async fn trips_for_driver(&self, driver_id: &str) -> Result<Vec<Trip>, StorageError> {
        let rows = sqlx::query(SELECT_TRIPS_BY_DRIVER)
            .bind(driver_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(trip_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::Channel;

    async fn repo() -> SqliteRepository {
        SqliteRepository::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_event_round_trip_is_lossless() {
        let repo = repo().await;
        let trip_id = repo.start("alice", "Depot", "Harbour", Utc::now()).await.unwrap();

        let event = NewEvent {
            timestamp: Utc.timestamp_nanos(1_700_000_123_456_789_012),
            channel: Channel::Drowsiness,
            driver_id: "alice".to_string(),
            trip_id: Some(trip_id),
            details: "EAR: 0.153".to_string(),
            measurement: Some(0.153_456_789_012_345_6),
        };
        let id = repo.record(event.clone()).await.unwrap();

        let stored = repo.query_by_trip(trip_id).await.unwrap();
        assert_eq!(stored, vec![event.with_id(id)]);
    }

    #[tokio::test]
    async fn test_tripless_event_not_in_trip_query() {
        let repo = repo().await;
        let trip_id = repo.start("alice", "A", "B", Utc::now()).await.unwrap();

        let mut event = NewEvent {
            timestamp: Utc::now(),
            channel: Channel::PhoneUse,
            driver_id: "alice".to_string(),
            trip_id: None,
            details: Channel::PhoneUse.default_details().to_string(),
            measurement: None,
        };
        repo.record(event.clone()).await.unwrap();
        event.trip_id = Some(trip_id);
        repo.record(event).await.unwrap();

        let by_driver = repo.query_by_driver("alice").await.unwrap();
        assert_eq!(by_driver.len(), 2);
        assert_eq!(by_driver[0].trip_id, None);
        assert_eq!(repo.query_by_trip(trip_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_trip_lifecycle() {
        let repo = repo().await;
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let id = repo.start("alice", "A", "B", start).await.unwrap();

        let err = repo.start("alice", "C", "D", start).await.unwrap_err();
        assert!(matches!(err, LedgerError::TripAlreadyOpen { trip_id, .. } if trip_id == id));
        assert_eq!(repo.trips_for_driver("alice").await.unwrap().len(), 1);

        let end = start + chrono::Duration::minutes(45);
        let closed = repo.end(id, end).await.unwrap();
        assert_eq!(closed.end_time, Some(end));
        assert_eq!(closed.start_time, start);

        let err = repo.end(id, end).await.unwrap_err();
        assert!(matches!(err, LedgerError::TripAlreadyClosed(t) if t == id));

        let missing = TripId::new();
        let err = repo.end(missing, end).await.unwrap_err();
        assert!(matches!(err, LedgerError::TripNotFound(t) if t == missing));

        assert!(repo.open_trip("alice").await.unwrap().is_none());
    }
}
