//! Event and trip records

use chrono::{DateTime, Utc};
use dms::{Channel, ChannelSignal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Sequential event identifier assigned by the store
pub type EventId = i64;

/// Trip identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripId(pub Uuid);

impl TripId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TripId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TripId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(TripId)
    }
}

/// Event as handed to the log, before an id is assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub timestamp: DateTime<Utc>,
    pub channel: Channel,
    pub driver_id: String,
    pub trip_id: Option<TripId>,
    pub details: String,
    pub measurement: Option<f64>,
}

impl NewEvent {
    /// Build the event for a positive detection
    pub fn from_signal(
        signal: &ChannelSignal,
        driver_id: &str,
        trip_id: Option<TripId>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            channel: signal.channel,
            driver_id: driver_id.to_string(),
            trip_id,
            details: signal.event_details(),
            measurement: signal.measurement,
        }
    }

    pub(crate) fn with_id(self, id: EventId) -> Event {
        Event {
            id,
            timestamp: self.timestamp,
            channel: self.channel,
            driver_id: self.driver_id,
            trip_id: self.trip_id,
            details: self.details,
            measurement: self.measurement,
        }
    }
}

/// Immutable detection event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub channel: Channel,
    pub driver_id: String,
    pub trip_id: Option<TripId>,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement: Option<f64>,
}

/// Bounded driving session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub driver_id: String,
    pub start_point: String,
    pub destination: String,
    pub start_time: DateTime<Utc>,
    /// Absent while the trip is open
    pub end_time: Option<DateTime<Utc>>,
}

impl Trip {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Aggregated view of a trip for reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSummary {
    pub trip: Trip,
    pub total_events: usize,
    pub events_by_channel: BTreeMap<Channel, usize>,
    /// Trip length in seconds, once closed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
}

impl TripSummary {
    pub fn from_events(trip: Trip, events: &[Event]) -> Self {
        let mut events_by_channel: BTreeMap<Channel, usize> =
            Channel::ALL.iter().map(|c| (*c, 0)).collect();
        for event in events.iter().filter(|e| e.trip_id == Some(trip.id)) {
            *events_by_channel.entry(event.channel).or_default() += 1;
        }

        Self {
            total_events: events_by_channel.values().sum(),
            duration_secs: trip.end_time.map(|end| (end - trip.start_time).num_seconds()),
            events_by_channel,
            trip,
        }
    }
}
