//! Route handlers

pub mod events;
pub mod ticks;
pub mod trips;
pub mod users;

use crate::{ApiError, AppState};
use directory::Role;
use storage::TripId;

fn parse_trip_id(raw: &str) -> Result<TripId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid trip id: {}", raw)))
}

fn require_field(name: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{} must not be empty", name)));
    }
    Ok(())
}

/// Monitoring is only opened for registered drivers, so escalation can reach their manager
fn require_driver(state: &AppState, driver_id: &str) -> Result<(), ApiError> {
    match state.directory.get(driver_id)? {
        Some(user) if user.role == Role::Driver => Ok(()),
        Some(_) => Err(ApiError::BadRequest(format!("User {} is not a driver", driver_id))),
        None => Err(ApiError::NotFound(format!("Driver {} is not registered", driver_id))),
    }
}
