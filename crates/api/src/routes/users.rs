//! User Directory Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use directory::{Role, User};
use serde::{Deserialize, Serialize};

use super::require_field;
use crate::{ApiError, SharedState};

/// Registration request
#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub username: String,
    pub role: Role,
    pub email: Option<String>,
}

/// E-mail update request; `null` or blank clears the address
#[derive(Debug, Deserialize)]
pub struct UpdateEmailRequest {
    pub email: Option<String>,
}

/// Query parameters for user listings
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    /// Filter by role
    pub role: Option<Role>,
}

/// Manager assignment request
#[derive(Debug, Deserialize)]
pub struct AssignManagerRequest {
    pub manager: String,
}

#[derive(Debug, Serialize)]
pub struct AssignmentResponse {
    pub driver: String,
    pub manager: String,
}

/// List of users
#[derive(Debug, Serialize)]
pub struct UserList {
    pub data: Vec<User>,
    pub count: usize,
}

impl From<Vec<User>> for UserList {
    fn from(data: Vec<User>) -> Self {
        Self {
            count: data.len(),
            data,
        }
    }
}

/// Register a driver or manager
pub async fn register_user(
    State(state): State<SharedState>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    require_field("username", &req.username)?;
    let user = User::new(req.username.trim(), req.role, req.email);
    state.directory.register(user.clone())?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// List users, optionally by role
pub async fn list_users(
    State(state): State<SharedState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<UserList>, ApiError> {
    let users = match query.role {
        Some(Role::Driver) => state.directory.all_drivers()?,
        Some(Role::Manager) => state.directory.all_managers()?,
        None => {
            let mut users = state.directory.all_managers()?;
            users.extend(state.directory.all_drivers()?);
            users
        }
    };
    Ok(Json(users.into()))
}

/// Change a user's notification address
pub async fn update_email(
    State(state): State<SharedState>,
    Path(username): Path<String>,
    Json(req): Json<UpdateEmailRequest>,
) -> Result<Json<User>, ApiError> {
    state.directory.set_email(&username, req.email)?;
    let user = state
        .directory
        .get(&username)?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", username)))?;
    Ok(Json(user))
}

/// Assign a driver to a manager
pub async fn assign_manager(
    State(state): State<SharedState>,
    Path(driver_id): Path<String>,
    Json(req): Json<AssignManagerRequest>,
) -> Result<Json<AssignmentResponse>, ApiError> {
    state.directory.assign_driver_to_manager(&driver_id, &req.manager)?;
    Ok(Json(AssignmentResponse {
        driver: driver_id,
        manager: req.manager,
    }))
}

/// Drivers managed by a manager
pub async fn drivers_for_manager(
    State(state): State<SharedState>,
    Path(manager_id): Path<String>,
) -> Result<Json<UserList>, ApiError> {
    match state.directory.get(&manager_id)? {
        Some(user) if user.role == Role::Manager => {}
        Some(_) => return Err(ApiError::BadRequest(format!("User {} is not a manager", manager_id))),
        None => return Err(ApiError::NotFound(format!("User {} not found", manager_id))),
    }
    Ok(Json(state.directory.drivers_for_manager(&manager_id)?.into()))
}

/// Drivers without a manager
pub async fn unassigned_drivers(State(state): State<SharedState>) -> Result<Json<UserList>, ApiError> {
    Ok(Json(state.directory.unassigned_drivers()?.into()))
}
