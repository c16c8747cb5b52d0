//! Tick Ingestion Routes

use alerting::TickReport;
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use dms::{Channel, ChannelSignal, Tick};
use serde::{Deserialize, Serialize};
use storage::TripId;

use super::require_driver;
use crate::{ApiError, SharedState};

/// One batch of classifier outputs
#[derive(Debug, Deserialize)]
pub struct TickRequest {
    /// Observation time, defaults to the time of receipt
    pub now: Option<DateTime<Utc>>,
    pub signals: Vec<ChannelSignal>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub driver_id: String,
    /// Open trip the session attached to, if any
    pub trip_id: Option<TripId>,
}

/// Live view of a driver's session
#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub driver_id: String,
    pub trip_id: Option<TripId>,
    pub started_at: DateTime<Utc>,
    /// Channels with a detection run in progress
    pub active_channels: Vec<Channel>,
}

/// Open a fresh monitoring session for a driver
pub async fn resume_session(
    State(state): State<SharedState>,
    Path(driver_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    require_driver(&state, &driver_id)?;
    let trip_id = state.monitor.resume(&driver_id, Utc::now()).await?;
    Ok(Json(SessionResponse { driver_id, trip_id }))
}

/// Current session of a driver
pub async fn session_status(
    State(state): State<SharedState>,
    Path(driver_id): Path<String>,
) -> Result<Json<SessionStatus>, ApiError> {
    let session = state
        .monitor
        .sessions()
        .get(&driver_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("No active monitoring session for driver {}", driver_id)))?;
    let session = session.lock().await;

    Ok(Json(SessionStatus {
        driver_id,
        trip_id: session.trip_id,
        started_at: session.started_at,
        active_channels: session.timers.active_channels(),
    }))
}

/// Feed one tick into the driver's session
pub async fn ingest_tick(
    State(state): State<SharedState>,
    Path(driver_id): Path<String>,
    Json(req): Json<TickRequest>,
) -> Result<Json<TickReport>, ApiError> {
    let tick = Tick {
        now: req.now.unwrap_or_else(Utc::now),
        signals: req.signals,
    };
    let report = state.monitor.ingest(&driver_id, &tick).await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use crate::create_router;
    use crate::tests::{send, test_state};
    use axum::{http::StatusCode, Router};
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::{json, Value};

    async fn setup(app: &Router) -> String {
        for user in [
            json!({"username": "carol", "role": "manager", "email": "carol@fleet.example"}),
            json!({"username": "alice", "role": "driver"}),
        ] {
            send(app.clone(), "POST", "/api/v1/users", Some(user)).await;
        }
        send(
            app.clone(),
            "POST",
            "/api/v1/drivers/alice/manager",
            Some(json!({"manager": "carol"})),
        )
        .await;

        let (_, body) = send(
            app.clone(),
            "POST",
            "/api/v1/trips",
            Some(json!({"driver_id": "alice", "start_point": "Depot", "destination": "Harbour"})),
        )
        .await;
        body["trip_id"].as_str().unwrap().to_string()
    }

    async fn tick(app: &Router, secs: i64, drowsy: bool) -> Value {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs);
        let (status, body) = send(
            app.clone(),
            "POST",
            "/api/v1/drivers/alice/ticks",
            Some(json!({
                "now": now,
                "signals": [
                    {"channel": "drowsiness", "detected": drowsy, "measurement": 0.182},
                    {"channel": "phone_use", "detected": false},
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    #[tokio::test]
    async fn test_sustained_drowsiness_escalates() {
        let app = create_router(test_state().await);
        let trip_id = setup(&app).await;

        let mut reports = Vec::new();
        for secs in 0..=5 {
            reports.push(tick(&app, secs, true).await);
        }

        for (secs, report) in reports.iter().enumerate() {
            let drowsiness = &report["channels"][0];
            let expected_alert = if secs == 4 { "played" } else { "idle" };
            assert_eq!(drowsiness["alert"]["status"], expected_alert, "tick {}", secs);
            assert_eq!(drowsiness["event"]["status"], "recorded");
            assert_eq!(report["channels"][1]["event"]["status"], "not_recorded");
        }
        let notification = &reports[5]["channels"][0]["notification"];
        assert_eq!(notification["status"], "sent");
        assert_eq!(notification["to"], "carol@fleet.example");

        let (_, events) = send(app.clone(), "GET", &format!("/api/v1/trips/{}/events", trip_id), None).await;
        assert_eq!(events["count"], 6);
        assert_eq!(events["data"][0]["details"], "EAR: 0.182");

        let (_, summary) = send(app.clone(), "GET", &format!("/api/v1/trips/{}/summary", trip_id), None).await;
        assert_eq!(summary["total_events"], 6);
        assert_eq!(summary["events_by_channel"]["drowsiness"], 6);
        assert_eq!(summary["events_by_channel"]["phone_use"], 0);

        let (_, events) = send(app, "GET", "/api/v1/drivers/alice/events?channel=phone_use", None).await;
        assert_eq!(events["count"], 0);
    }

    #[tokio::test]
    async fn test_clear_tick_restarts_run() {
        let app = create_router(test_state().await);
        setup(&app).await;

        for secs in 0..3 {
            tick(&app, secs, true).await;
        }
        let cleared = tick(&app, 3, false).await;
        assert_eq!(cleared["channels"][0]["run_elapsed_ms"], Value::Null);

        let restarted = tick(&app, 4, true).await;
        assert_eq!(restarted["channels"][0]["alert"]["status"], "idle");
        assert_eq!(restarted["channels"][0]["run_elapsed_ms"], 0);
    }

    #[tokio::test]
    async fn test_tick_requires_session() {
        let app = create_router(test_state().await);
        send(
            app.clone(),
            "POST",
            "/api/v1/users",
            Some(json!({"username": "bob", "role": "driver"})),
        )
        .await;

        let (status, body) = send(
            app.clone(),
            "POST",
            "/api/v1/drivers/bob/ticks",
            Some(json!({"signals": [{"channel": "yawning", "detected": true}]})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("bob"));

        let (status, body) = send(app.clone(), "POST", "/api/v1/drivers/bob/sessions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["trip_id"], Value::Null);

        let (status, body) = send(
            app.clone(),
            "POST",
            "/api/v1/drivers/bob/ticks",
            Some(json!({"signals": [{"channel": "yawning", "detected": true}]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["channels"][0]["event"]["status"], "recorded");

        let (status, body) = send(app.clone(), "GET", "/api/v1/drivers/bob/sessions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active_channels"], json!(["yawning"]));
        assert!(body["started_at"].is_string());

        let (status, _) = send(app, "POST", "/api/v1/drivers/nobody/sessions", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_duplicate_channel_rejected() {
        let app = create_router(test_state().await);
        setup(&app).await;

        let (status, _) = send(
            app,
            "POST",
            "/api/v1/drivers/alice/ticks",
            Some(json!({"signals": [
                {"channel": "yawning", "detected": true},
                {"channel": "yawning", "detected": false},
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
