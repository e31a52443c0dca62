// Copyright (c) 2024-2025 Peter Szrnka
// Licensed under the MIT License. See LICENSE file for details.

//! Canonical types shared across the console core.
//!
//! Field names are serialized in camelCase to match the GMS backend wire
//! format.

use serde::{Deserialize, Serialize};

/// Role granted to administrators.
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";

/// Sentinel authentication mode published when the backend is unreachable.
pub const AUTH_MODE_NA: &str = "N/A";

/// Probe status value meaning the system is fully operational.
pub const STATUS_OK: &str = "OK";

/// Probe status value meaning no admin user exists yet.
pub const STATUS_NEED_SETUP: &str = "NEED_SETUP";

/// The authenticated identity held by the session coordinator.
///
/// UI components only ever receive clones of this through the user
/// broadcast channel; the coordinator owns the cached value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Backend user id, absent until the identity is fully resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl User {
    pub fn new(username: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            user_id: None,
            username: username.into(),
            roles,
            name: None,
            email: None,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ROLE_ADMIN)
    }
}

/// Raw answer of the readiness probe (`GET system/status`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    /// "OK", "NEED_SETUP", or another backend-defined value.
    pub status: String,
    /// "db", "ldap", "keycloak-sso", ...
    pub auth_mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_host_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automatic_logout_time_in_minutes: Option<u32>,
}

/// Payload of the system-readiness broadcast channel.
///
/// `status` is 200 whenever the probe completed, regardless of the probe's
/// own verdict, and the 0 sentinel when the backend could not be reached
/// at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemReadyData {
    pub ready: bool,
    pub status: u16,
    pub auth_mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automatic_logout_time_in_minutes: Option<u32>,
}

impl SystemReadyData {
    /// The value published when the readiness probe fails at transport
    /// level. The underlying error's status code is deliberately not
    /// forwarded.
    pub fn unreachable() -> Self {
        Self {
            ready: false,
            status: 0,
            auth_mode: AUTH_MODE_NA.to_string(),
            automatic_logout_time_in_minutes: None,
        }
    }
}

/// Outcome phase of an authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticationPhase {
    /// Credentials accepted, session established.
    Completed,
    /// Credentials accepted, second factor still pending.
    MfaRequired,
    /// Account is blocked; no session established.
    Blocked,
    /// Credentials rejected.
    Failed,
}

/// Login request body (`POST authenticate`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Login {
    pub username: String,
    pub credential: String,
}

impl Login {
    pub fn new(username: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            credential: credential.into(),
        }
    }
}

/// Login response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user: Option<User>,
    pub phase: AuthenticationPhase,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_helpers() {
        let admin = User::new("alice", vec![ROLE_ADMIN.to_string()]);
        assert!(admin.is_admin());
        assert!(admin.has_role(ROLE_ADMIN));

        let viewer = User::new("bob", vec!["ROLE_VIEWER".to_string()]);
        assert!(!viewer.is_admin());
        assert!(viewer.has_role("ROLE_VIEWER"));
    }

    #[test]
    fn test_system_status_wire_format() {
        let json = r#"{
            "status": "OK",
            "authMode": "db",
            "version": "1.0.0",
            "built": "2024-04-09T12:34:56.000Z",
            "containerId": "1234567",
            "containerHostType": "DOCKER",
            "automaticLogoutTimeInMinutes": 15
        }"#;

        let status: SystemStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.status, STATUS_OK);
        assert_eq!(status.auth_mode, "db");
        assert_eq!(status.automatic_logout_time_in_minutes, Some(15));
    }

    #[test]
    fn test_system_status_minimal_fields() {
        let json = r#"{"status": "NEED_SETUP", "authMode": "db"}"#;
        let status: SystemStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.status, STATUS_NEED_SETUP);
        assert!(status.version.is_none());
    }

    #[test]
    fn test_unreachable_sentinel() {
        let data = SystemReadyData::unreachable();
        assert!(!data.ready);
        assert_eq!(data.status, 0);
        assert_eq!(data.auth_mode, AUTH_MODE_NA);
    }

    #[test]
    fn test_authentication_phase_wire_format() {
        let json = r#"{"currentUser": {"username": "test", "roles": []}, "phase": "MFA_REQUIRED"}"#;
        let response: LoginResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.phase, AuthenticationPhase::MfaRequired);
        assert_eq!(response.current_user.unwrap().username, "test");
    }
}
