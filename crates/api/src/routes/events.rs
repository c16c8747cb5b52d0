//! Event Routes

use axum::{
    extract::{Path, Query, State},
    Json,
};
use dms::Channel;
use serde::{Deserialize, Serialize};
use storage::{Event, EventLog, TripLedger};

use super::parse_trip_id;
use crate::{ApiError, SharedState};

/// Query parameters for event listings
#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    /// Filter by channel
    pub channel: Option<Channel>,
}

/// Response for event listings
#[derive(Debug, Serialize)]
pub struct EventList {
    pub data: Vec<Event>,
    pub count: usize,
}

impl EventList {
    fn filtered(events: Vec<Event>, query: &EventQuery) -> Self {
        let data: Vec<Event> = match query.channel {
            Some(channel) => events.into_iter().filter(|e| e.channel == channel).collect(),
            None => events,
        };
        Self {
            count: data.len(),
            data,
        }
    }
}

/// Events logged for a driver, oldest first
pub async fn driver_events(
    State(state): State<SharedState>,
    Path(driver_id): Path<String>,
    Query(query): Query<EventQuery>,
) -> Result<Json<EventList>, ApiError> {
    let events = state.monitor.store().query_by_driver(&driver_id).await?;
    Ok(Json(EventList::filtered(events, &query)))
}

/// Events logged during a trip, oldest first
pub async fn trip_events(
    State(state): State<SharedState>,
    Path(trip_id): Path<String>,
    Query(query): Query<EventQuery>,
) -> Result<Json<EventList>, ApiError> {
    let trip_id = parse_trip_id(&trip_id)?;
    let store = state.monitor.store();
    if store.get(trip_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Trip {} not found", trip_id)));
    }
    let events = store.query_by_trip(trip_id).await?;
    Ok(Json(EventList::filtered(events, &query)))
}
