//! HTTP error mapping

use alerting::MonitorError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use directory::DirectoryError;
use dms::DmsError;
use serde_json::json;
use storage::{LedgerError, StorageError};
use thiserror::Error;
use tracing::error;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => ApiError::NotFound(err.to_string()),
            other => ApiError::Unavailable(other.to_string()),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::TripAlreadyOpen { .. } | LedgerError::TripAlreadyClosed(_) => {
                ApiError::Conflict(err.to_string())
            }
            LedgerError::TripNotFound(_) => ApiError::NotFound(err.to_string()),
            LedgerError::Storage(e) => e.into(),
        }
    }
}

impl From<DmsError> for ApiError {
    fn from(err: DmsError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::AlreadyExists(_) => ApiError::Conflict(err.to_string()),
            DirectoryError::NotFound(_) => ApiError::NotFound(err.to_string()),
            DirectoryError::WrongRole { .. } => ApiError::BadRequest(err.to_string()),
            DirectoryError::Unavailable(_) => ApiError::Unavailable(err.to_string()),
        }
    }
}

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        match err {
            MonitorError::Ledger(e) => e.into(),
            MonitorError::Storage(e) => e.into(),
            MonitorError::Tick(e) => e.into(),
            MonitorError::NoSession(_) => ApiError::Conflict(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::TripId;

    #[test]
    fn test_ledger_violations_map_to_client_errors() {
        let id = TripId::new();
        assert_eq!(
            ApiError::from(LedgerError::TripAlreadyClosed(id)).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(LedgerError::TripNotFound(id)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(LedgerError::Storage(StorageError::DatabaseError("down".into()))).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_missing_session_is_conflict() {
        let err = ApiError::from(MonitorError::NoSession("alice".into()));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "No active monitoring session for driver alice");
    }
}
