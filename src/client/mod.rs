// Copyright (c) 2024-2025 Peter Szrnka
// Licensed under the MIT License. See LICENSE file for details.

//! GMS backend integration.
//!
//! The session coordinator consumes the backend through the
//! [`SessionBackend`] trait; [`GmsClient`] is the reqwest implementation
//! speaking the real HTTP contracts. The backend issues its session as
//! JWT cookies, so the client keeps a cookie store.
//!
//! # Example
//!
//! ```no_run
//! use gms_console::client::GmsClient;
//! use gms_console::client::SessionBackend;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = GmsClient::with_base_url("https://gms.example.com");
//! let status = client.check_ready().await?;
//! println!("auth mode: {}", status.auth_mode);
//! # Ok(())
//! # }
//! ```

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::types::{Login, LoginResponse, SystemStatus, User};

/// Default backend URL for a locally running GMS instance.
const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Environment variable overriding the backend URL.
const BASE_URL_ENV: &str = "GMS_BASE_URL";

/// Default timeout for API requests (in seconds).
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Readiness probe path.
const SYSTEM_STATUS_PATH: &str = "system/status";

/// Login path.
const LOGIN_PATH: &str = "authenticate";

/// Logout path.
const LOGOUT_PATH: &str = "logoutUser";

/// Current-identity path.
const USER_INFO_PATH: &str = "info/me";

/// Error types specific to GMS backend operations.
#[derive(Debug, Clone)]
pub enum GmsApiError {
    /// Could not reach the backend at all.
    NetworkError(String),
    /// Credentials rejected or session expired.
    AuthFailed(String),
    /// The backend answered with an unexpected status or body.
    ApiError(String),
}

impl std::fmt::Display for GmsApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkError(msg) => write!(f, "GMS backend unreachable: {}", msg),
            Self::AuthFailed(msg) => write!(f, "Authentication failed: {}", msg),
            Self::ApiError(msg) => write!(f, "GMS API error: {}", msg),
        }
    }
}

impl std::error::Error for GmsApiError {}

/// The backend contracts the session coordinator orchestrates.
///
/// Implementations carry their own session affinity (cookies for the real
/// backend). `user_info` reports "not logged in" as `Ok(None)`, never as an
/// error; an `Err` from it means the backend itself misbehaved.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Readiness probe. Transport failures surface as `Err`; the caller
    /// decides how to absorb them.
    async fn check_ready(&self) -> Result<SystemStatus>;

    /// Authenticate with username/credential.
    async fn login(&self, credentials: &Login) -> Result<LoginResponse>;

    /// Terminate the server-side session.
    async fn logout(&self) -> Result<()>;

    /// Fetch the identity bound to the current session, if any.
    async fn user_info(&self) -> Result<Option<User>>;
}

/// Client for communicating with a GMS backend.
#[derive(Debug, Clone)]
pub struct GmsClient {
    /// Base URL of the backend, without trailing slash.
    base_url: String,
    /// HTTP client with cookie store and configured timeout.
    client: reqwest::Client,
    /// Request timeout.
    timeout: Duration,
}

impl Default for GmsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GmsClient {
    /// Create a client for the URL in `GMS_BASE_URL`, falling back to the
    /// local default.
    pub fn new() -> Self {
        let base_url =
            std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::with_base_url(base_url)
    }

    /// Create a client for a specific backend URL.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built. This should only happen if
    /// the system's TLS stack is fundamentally broken, which is acceptable
    /// for initialization code.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client for the GMS backend (TLS failure)");

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Self {
            base_url,
            client,
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl SessionBackend for GmsClient {
    async fn check_ready(&self) -> Result<SystemStatus> {
        let response = self
            .client
            .get(self.url(SYSTEM_STATUS_PATH))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| anyhow!(GmsApiError::NetworkError(e.to_string())))?;

        if !response.status().is_success() {
            return Err(anyhow!(GmsApiError::ApiError(format!(
                "Readiness probe answered HTTP {}",
                response.status()
            ))));
        }

        response
            .json::<SystemStatus>()
            .await
            .context("Failed to parse system status response")
    }

    async fn login(&self, credentials: &Login) -> Result<LoginResponse> {
        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .json(credentials)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| anyhow!(GmsApiError::NetworkError(e.to_string())))?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(anyhow!(GmsApiError::AuthFailed(
                "Invalid username or credential".to_string()
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(GmsApiError::ApiError(format!(
                "Login answered HTTP {} - {}",
                status, body
            ))));
        }

        response
            .json::<LoginResponse>()
            .await
            .context("Failed to parse login response")
    }

    async fn logout(&self) -> Result<()> {
        let response = self
            .client
            .post(self.url(LOGOUT_PATH))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| anyhow!(GmsApiError::NetworkError(e.to_string())))?;

        if !response.status().is_success() {
            return Err(anyhow!(GmsApiError::ApiError(format!(
                "Logout answered HTTP {}",
                response.status()
            ))));
        }

        Ok(())
    }

    async fn user_info(&self) -> Result<Option<User>> {
        let response = self
            .client
            .get(self.url(USER_INFO_PATH))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| anyhow!(GmsApiError::NetworkError(e.to_string())))?;

        let status = response.status();

        // No session / unknown identity is a normal answer, not an error.
        if matches!(status.as_u16(), 401 | 403 | 404) {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(anyhow!(GmsApiError::ApiError(format!(
                "User info answered HTTP {}",
                status
            ))));
        }

        let user = response
            .json::<User>()
            .await
            .context("Failed to parse user info response")?;
        Ok(Some(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalization() {
        let client = GmsClient::with_base_url("https://gms.example.com///");
        assert_eq!(client.base_url(), "https://gms.example.com");
        assert_eq!(
            client.url(SYSTEM_STATUS_PATH),
            "https://gms.example.com/system/status"
        );
    }

    #[test]
    fn test_error_display() {
        let err = GmsApiError::NetworkError("connection refused".to_string());
        assert!(err.to_string().contains("unreachable"));

        let err = GmsApiError::AuthFailed("bad credentials".to_string());
        assert!(err.to_string().contains("Authentication failed"));
    }
}
