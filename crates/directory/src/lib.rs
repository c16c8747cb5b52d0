//! Fleet Directory Module
//!
//! Users of the monitoring service and who manages whom:
//! - Driver and manager registration
//! - Driver to manager assignment (at most one manager per driver)
//! - Manager e-mail resolution for escalation notifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Directory error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("User {0} already exists")]
    AlreadyExists(String),

    #[error("User {0} not found")]
    NotFound(String),

    #[error("User {username} is not a {expected:?}")]
    WrongRole { username: String, expected: Role },

    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Driver,
    Manager,
}

/// Directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub email: Option<String>,
    /// Assigned fleet manager (drivers only)
    pub fleet_manager: Option<String>,
    pub registered_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, role: Role, email: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            role,
            // Blank addresses count as "no email on file"
            email: email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()),
            fleet_manager: None,
            registered_at: Utc::now(),
        }
    }

    pub fn driver(username: impl Into<String>) -> Self {
        Self::new(username, Role::Driver, None)
    }

    pub fn manager(username: impl Into<String>, email: Option<String>) -> Self {
        Self::new(username, Role::Manager, email)
    }
}

/// Lookup used by escalation to find who to notify about a driver
pub trait ManagerDirectory: Send + Sync {
    /// E-mail of the driver's assigned manager, if both exist
    fn resolve_manager_email(&self, driver_id: &str) -> Option<String>;
}

/// In-memory user directory
pub struct UserDirectory {
    users: RwLock<HashMap<String, User>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, User>>, DirectoryError> {
        self.users
            .read()
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, User>>, DirectoryError> {
        self.users
            .write()
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))
    }

    /// Register a new user
    pub fn register(&self, user: User) -> Result<(), DirectoryError> {
        let mut users = self.write()?;
        if users.contains_key(&user.username) {
            return Err(DirectoryError::AlreadyExists(user.username));
        }
        info!("Registered {:?} {}", user.role, user.username);
        users.insert(user.username.clone(), user);
        Ok(())
    }

    pub fn get(&self, username: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self.read()?.get(username).cloned())
    }

    /// Update a user's e-mail address
    pub fn set_email(&self, username: &str, email: Option<String>) -> Result<(), DirectoryError> {
        let mut users = self.write()?;
        let user = users
            .get_mut(username)
            .ok_or_else(|| DirectoryError::NotFound(username.to_string()))?;
        user.email = email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
        Ok(())
    }

    /// Assign a driver to a manager, replacing any previous assignment
    pub fn assign_driver_to_manager(&self, driver: &str, manager: &str) -> Result<(), DirectoryError> {
        let mut users = self.write()?;

        match users.get(manager) {
            Some(u) if u.role == Role::Manager => {}
            Some(_) => {
                return Err(DirectoryError::WrongRole {
                    username: manager.to_string(),
                    expected: Role::Manager,
                })
            }
            None => return Err(DirectoryError::NotFound(manager.to_string())),
        }

        let entry = users
            .get_mut(driver)
            .ok_or_else(|| DirectoryError::NotFound(driver.to_string()))?;
        if entry.role != Role::Driver {
            return Err(DirectoryError::WrongRole {
                username: driver.to_string(),
                expected: Role::Driver,
            });
        }

        if let Some(previous) = entry.fleet_manager.replace(manager.to_string()) {
            debug!("Driver {} moved from manager {}", driver, previous);
        }
        info!("Driver {} assigned to manager {}", driver, manager);
        Ok(())
    }

    /// Drivers assigned to a manager
    pub fn drivers_for_manager(&self, manager: &str) -> Result<Vec<User>, DirectoryError> {
        self.filter(|u| u.role == Role::Driver && u.fleet_manager.as_deref() == Some(manager))
    }

    /// Drivers with no manager
    pub fn unassigned_drivers(&self) -> Result<Vec<User>, DirectoryError> {
        self.filter(|u| u.role == Role::Driver && u.fleet_manager.is_none())
    }

    pub fn all_drivers(&self) -> Result<Vec<User>, DirectoryError> {
        self.filter(|u| u.role == Role::Driver)
    }

    pub fn all_managers(&self) -> Result<Vec<User>, DirectoryError> {
        self.filter(|u| u.role == Role::Manager)
    }

    fn filter(&self, predicate: impl Fn(&User) -> bool) -> Result<Vec<User>, DirectoryError> {
        let mut found: Vec<User> = self.read()?.values().filter(|u| predicate(u)).cloned().collect();
        found.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(found)
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerDirectory for UserDirectory {
    fn resolve_manager_email(&self, driver_id: &str) -> Option<String> {
        let users = self.read().ok()?;
        let manager = users.get(driver_id)?.fleet_manager.as_ref()?;
        users.get(manager)?.email.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> UserDirectory {
        let dir = UserDirectory::new();
        dir.register(User::driver("alice")).unwrap();
        dir.register(User::driver("bob")).unwrap();
        dir.register(User::manager("carol", Some("carol@fleet.example".into()))).unwrap();
        dir.register(User::manager("dave", None)).unwrap();
        dir
    }

    #[test]
    fn test_resolve_manager_email() {
        let dir = directory();
        assert_eq!(dir.resolve_manager_email("alice"), None);

        dir.assign_driver_to_manager("alice", "carol").unwrap();
        assert_eq!(dir.resolve_manager_email("alice").as_deref(), Some("carol@fleet.example"));

        // Manager without an address resolves to nothing
        dir.assign_driver_to_manager("bob", "dave").unwrap();
        assert_eq!(dir.resolve_manager_email("bob"), None);

        assert_eq!(dir.resolve_manager_email("nobody"), None);
    }

    #[test]
    fn test_reassignment_replaces_manager() {
        let dir = directory();
        dir.assign_driver_to_manager("alice", "carol").unwrap();
        dir.assign_driver_to_manager("alice", "dave").unwrap();

        assert!(dir.drivers_for_manager("carol").unwrap().is_empty());
        assert_eq!(dir.drivers_for_manager("dave").unwrap()[0].username, "alice");
        assert_eq!(dir.unassigned_drivers().unwrap().len(), 1);
    }

    #[test]
    fn test_assignment_checks_roles() {
        let dir = directory();
        assert_eq!(
            dir.assign_driver_to_manager("alice", "bob"),
            Err(DirectoryError::WrongRole {
                username: "bob".into(),
                expected: Role::Manager
            })
        );
        assert_eq!(
            dir.assign_driver_to_manager("carol", "dave"),
            Err(DirectoryError::WrongRole {
                username: "carol".into(),
                expected: Role::Driver
            })
        );
        assert_eq!(
            dir.assign_driver_to_manager("zed", "carol"),
            Err(DirectoryError::NotFound("zed".into()))
        );
    }

    #[test]
    fn test_duplicate_registration() {
        let dir = directory();
        assert_eq!(
            dir.register(User::driver("alice")),
            Err(DirectoryError::AlreadyExists("alice".into()))
        );
        assert_eq!(dir.all_drivers().unwrap().len(), 2);
        assert_eq!(dir.all_managers().unwrap().len(), 2);
    }

    #[test]
    fn test_blank_email_is_absent() {
        let dir = directory();
        dir.assign_driver_to_manager("alice", "carol").unwrap();
        dir.set_email("carol", Some("   ".into())).unwrap();
        assert_eq!(dir.resolve_manager_email("alice"), None);
    }
}
