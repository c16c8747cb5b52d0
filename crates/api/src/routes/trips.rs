//! Trip Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storage::{EventLog, Trip, TripId, TripLedger, TripSummary};

use super::{parse_trip_id, require_driver, require_field};
use crate::{ApiError, SharedState};

/// Trip start request
#[derive(Debug, Deserialize)]
pub struct StartTripRequest {
    pub driver_id: String,
    pub start_point: String,
    pub destination: String,
}

#[derive(Debug, Serialize)]
pub struct StartTripResponse {
    pub trip_id: TripId,
    pub driver_id: String,
    pub start_time: DateTime<Utc>,
}

/// A driver's trip history
#[derive(Debug, Serialize)]
pub struct TripList {
    pub data: Vec<Trip>,
    pub count: usize,
    pub completed_count: usize,
}

/// Start a trip and begin monitoring the driver
pub async fn start_trip(
    State(state): State<SharedState>,
    Json(req): Json<StartTripRequest>,
) -> Result<(StatusCode, Json<StartTripResponse>), ApiError> {
    require_field("driver_id", &req.driver_id)?;
    require_field("start_point", &req.start_point)?;
    require_field("destination", &req.destination)?;
    require_driver(&state, &req.driver_id)?;

    let now = Utc::now();
    let trip_id = state
        .monitor
        .start_trip(&req.driver_id, req.start_point.trim(), req.destination.trim(), now)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(StartTripResponse {
            trip_id,
            driver_id: req.driver_id,
            start_time: now,
        }),
    ))
}

/// End a trip and stop monitoring
pub async fn end_trip(
    State(state): State<SharedState>,
    Path(trip_id): Path<String>,
) -> Result<Json<Trip>, ApiError> {
    let trip_id = parse_trip_id(&trip_id)?;
    let trip = state.monitor.end_trip(trip_id, Utc::now()).await?;
    Ok(Json(trip))
}

/// Event counts for one trip
pub async fn trip_summary(
    State(state): State<SharedState>,
    Path(trip_id): Path<String>,
) -> Result<Json<TripSummary>, ApiError> {
    let trip_id = parse_trip_id(&trip_id)?;
    let store = state.monitor.store();
    let trip = store
        .get(trip_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Trip {} not found", trip_id)))?;
    let events = store.query_by_trip(trip_id).await?;
    Ok(Json(TripSummary::from_events(trip, &events)))
}

/// All trips of a driver
pub async fn driver_trips(
    State(state): State<SharedState>,
    Path(driver_id): Path<String>,
) -> Result<Json<TripList>, ApiError> {
    let trips = state.monitor.store().trips_for_driver(&driver_id).await?;
    Ok(Json(TripList {
        count: trips.len(),
        completed_count: trips.iter().filter(|t| !t.is_open()).count(),
        data: trips,
    }))
}

#[cfg(test)]
mod tests {
    use crate::create_router;
    use crate::tests::{send, test_state};
    use axum::http::StatusCode;
    use serde_json::json;

    fn trip_request(driver: &str) -> serde_json::Value {
        json!({"driver_id": driver, "start_point": "Depot", "destination": "Harbour"})
    }

    async fn register(app: &axum::Router, username: &str, role: &str) {
        let (status, _) = send(
            app.clone(),
            "POST",
            "/api/v1/users",
            Some(json!({"username": username, "role": role})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_trip_lifecycle() {
        let state = test_state().await;
        let app = create_router(state.clone());
        register(&app, "alice", "driver").await;

        let (status, body) = send(app.clone(), "POST", "/api/v1/trips", Some(trip_request("alice"))).await;
        assert_eq!(status, StatusCode::CREATED);
        let trip_id = body["trip_id"].as_str().unwrap().to_string();
        assert!(state.monitor.sessions().get("alice").await.is_some());

        let (status, _) = send(app.clone(), "POST", "/api/v1/trips", Some(trip_request("alice"))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let uri = format!("/api/v1/trips/{}/end", trip_id);
        let (status, body) = send(app.clone(), "POST", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["end_time"].is_string());
        assert!(state.monitor.sessions().get("alice").await.is_none());

        let (status, _) = send(app.clone(), "POST", &uri, None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(app, "GET", "/api/v1/drivers/alice/trips", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["completed_count"], 1);
    }

    #[tokio::test]
    async fn test_start_requires_route() {
        let app = create_router(test_state().await);
        let (status, body) = send(
            app,
            "POST",
            "/api/v1/trips",
            Some(json!({"driver_id": "alice", "start_point": "", "destination": "Harbour"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "start_point must not be empty");
    }

    #[tokio::test]
    async fn test_start_requires_registered_driver() {
        let state = test_state().await;
        let app = create_router(state.clone());

        let (status, body) = send(app.clone(), "POST", "/api/v1/trips", Some(trip_request("ghost"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Driver ghost is not registered");
        assert!(state.monitor.sessions().get("ghost").await.is_none());

        register(&app, "carol", "manager").await;
        let (status, _) = send(app.clone(), "POST", "/api/v1/trips", Some(trip_request("carol"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(app, "GET", "/api/v1/drivers/ghost/trips", None).await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_unknown_trip() {
        let app = create_router(test_state().await);
        let missing = storage::TripId::new();

        let (status, _) = send(app.clone(), "POST", &format!("/api/v1/trips/{}/end", missing), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(app.clone(), "GET", &format!("/api/v1/trips/{}/summary", missing), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(app, "GET", "/api/v1/trips/not-a-trip/summary", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
