// Copyright (c) 2024-2025 Peter Szrnka
// Licensed under the MIT License. See LICENSE file for details.

//! The session state coordinator.
//!
//! Single-writer discipline: only the coordinator's own methods mutate the
//! cached session fields. Screens read through broadcasts or the accessor
//! methods, never directly. The cached fields are guarded by a mutex that
//! is never held across an await point; in-flight backend calls are not
//! cancelled, so a stale response may still be applied after a newer state
//! change (last-write-wins on the cached fields).

use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::broadcast::ReplaySubject;
use crate::client::SessionBackend;
use crate::session::RouteTracker;
use crate::types::{AuthenticationPhase, Login, LoginResponse, SystemReadyData, User, STATUS_OK};

/// Readiness of the backend, established by the probe once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Probe not attempted yet.
    Unknown,
    /// Probe in flight.
    Probing,
    /// Probe completed with status "OK".
    Ready,
    /// Probe completed with another status (e.g. "NEED_SETUP").
    NotReady,
    /// Probe failed at transport level.
    Unreachable,
}

impl std::fmt::Display for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Readiness::Unknown => write!(f, "UNKNOWN"),
            Readiness::Probing => write!(f, "PROBING"),
            Readiness::Ready => write!(f, "READY"),
            Readiness::NotReady => write!(f, "NOT_READY"),
            Readiness::Unreachable => write!(f, "UNREACHABLE"),
        }
    }
}

/// Cached session fields, mutated only by the coordinator.
struct SessionFields {
    current_user: Option<User>,
    readiness: Readiness,
    system_ready: Option<SystemReadyData>,
    /// Idle-period baseline in epoch millis; set at most once per window.
    start_time: Option<i64>,
}

/// Shared session state and login/logout orchestration.
pub struct SessionCoordinator {
    backend: Arc<dyn SessionBackend>,
    routes: Arc<RouteTracker>,
    fields: Mutex<SessionFields>,
    user_subject: ReplaySubject<Option<User>>,
    system_ready_subject: ReplaySubject<SystemReadyData>,
    auth_mode_subject: ReplaySubject<String>,
    reset_timer_subject: ReplaySubject<Option<i64>>,
}

impl SessionCoordinator {
    pub fn new(backend: Arc<dyn SessionBackend>, routes: Arc<RouteTracker>) -> Self {
        Self {
            backend,
            routes,
            fields: Mutex::new(SessionFields {
                current_user: None,
                readiness: Readiness::Unknown,
                system_ready: None,
                start_time: None,
            }),
            user_subject: ReplaySubject::new(),
            system_ready_subject: ReplaySubject::new(),
            auth_mode_subject: ReplaySubject::new(),
            reset_timer_subject: ReplaySubject::new(),
        }
    }

    // ------------------------------------------------------------------
    // Broadcast channels
    // ------------------------------------------------------------------

    /// Current-user changes. Replays the latest value to late subscribers.
    pub fn user_updates(&self) -> &ReplaySubject<Option<User>> {
        &self.user_subject
    }

    /// System-readiness changes.
    pub fn system_ready_updates(&self) -> &ReplaySubject<SystemReadyData> {
        &self.system_ready_subject
    }

    /// Authentication-mode changes (published on successful probes only).
    pub fn auth_mode_updates(&self) -> &ReplaySubject<String> {
        &self.auth_mode_subject
    }

    /// Idle-timer reset signals, carrying the baseline that was in effect.
    pub fn timer_reset_updates(&self) -> &ReplaySubject<Option<i64>> {
        &self.reset_timer_subject
    }

    // ------------------------------------------------------------------
    // Readiness
    // ------------------------------------------------------------------

    /// Probe the backend once per session.
    ///
    /// Idempotent: only the first call (readiness `Unknown`) triggers the
    /// probe; later calls return immediately whatever the cached verdict
    /// is. Use [`reset_readiness`](Self::reset_readiness) to force a new
    /// probe.
    pub async fn check(&self) {
        {
            let mut fields = self.fields.lock().expect("session lock poisoned");
            if fields.readiness != Readiness::Unknown {
                return;
            }
            fields.readiness = Readiness::Probing;
        }

        self.check_system_ready().await;
    }

    /// Probe the backend unconditionally and publish the verdict.
    ///
    /// A transport failure of any kind maps to the sentinel
    /// `{ready: false, status: 0, auth_mode: "N/A"}`; it is never surfaced
    /// as an error.
    pub async fn check_system_ready(&self) {
        {
            let mut fields = self.fields.lock().expect("session lock poisoned");
            fields.readiness = Readiness::Probing;
        }

        match self.backend.check_ready().await {
            Ok(status) => {
                let ready = status.status == STATUS_OK;
                let data = SystemReadyData {
                    ready,
                    // The probe completed; 200 regardless of the probe's
                    // own verdict, 0 is reserved for transport failures.
                    status: 200,
                    auth_mode: status.auth_mode.clone(),
                    automatic_logout_time_in_minutes: status.automatic_logout_time_in_minutes,
                };

                let readiness = if ready {
                    Readiness::Ready
                } else {
                    Readiness::NotReady
                };
                {
                    let mut fields = self.fields.lock().expect("session lock poisoned");
                    fields.readiness = readiness;
                    fields.system_ready = Some(data.clone());
                }

                tracing::info!(
                    "SYSTEM_READY | readiness={} auth_mode={} status={}",
                    readiness,
                    status.auth_mode,
                    status.status
                );

                self.auth_mode_subject.publish(status.auth_mode);
                self.system_ready_subject.publish(data);
                self.refresh_current_user_info().await;
            }
            Err(e) => {
                tracing::warn!("SYSTEM_UNREACHABLE | {}", e);

                let data = SystemReadyData::unreachable();
                {
                    let mut fields = self.fields.lock().expect("session lock poisoned");
                    fields.readiness = Readiness::Unreachable;
                    fields.system_ready = Some(data.clone());
                }

                self.system_ready_subject.publish(data);
            }
        }
    }

    /// Forget the cached readiness verdict so the next [`check`](Self::check)
    /// probes again.
    pub fn reset_readiness(&self) {
        let mut fields = self.fields.lock().expect("session lock poisoned");
        fields.readiness = Readiness::Unknown;
        fields.system_ready = None;
    }

    pub fn readiness(&self) -> Readiness {
        self.fields.lock().expect("session lock poisoned").readiness
    }

    /// The cached readiness broadcast payload, if a probe has completed.
    pub fn system_ready_data(&self) -> Option<SystemReadyData> {
        self.fields
            .lock()
            .expect("session lock poisoned")
            .system_ready
            .clone()
    }

    // ------------------------------------------------------------------
    // Current user
    // ------------------------------------------------------------------

    /// Ask the backend for the current identity and publish the result,
    /// overwriting any previous value. "No identity" and backend failures
    /// both publish `None`.
    pub async fn refresh_current_user_info(&self) {
        let user = match self.backend.user_info().await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!("USER_INFO_FAILED | {}", e);
                None
            }
        };

        {
            let mut fields = self.fields.lock().expect("session lock poisoned");
            fields.current_user = user.clone();
        }
        self.user_subject.publish(user);
    }

    /// The current user, fetching it from the backend at most once.
    ///
    /// Returns the cached identity when one is known; otherwise performs a
    /// single fetch, caches and publishes the result. The cached-result
    /// check is what upholds the at-most-one-fetch-per-session guarantee.
    pub async fn get_user_info(&self) -> Option<User> {
        {
            let fields = self.fields.lock().expect("session lock poisoned");
            if fields.current_user.is_some() {
                return fields.current_user.clone();
            }
        }

        let user = match self.backend.user_info().await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!("USER_INFO_FAILED | {}", e);
                None
            }
        };

        {
            let mut fields = self.fields.lock().expect("session lock poisoned");
            fields.current_user = user.clone();
        }
        self.user_subject.publish(user.clone());
        user
    }

    pub fn current_user(&self) -> Option<User> {
        self.fields
            .lock()
            .expect("session lock poisoned")
            .current_user
            .clone()
    }

    // ------------------------------------------------------------------
    // Login / logout
    // ------------------------------------------------------------------

    /// Authenticate against the backend.
    ///
    /// A `Completed` phase refreshes the current user; `MfaRequired` and
    /// `Blocked` are returned untouched for the caller to act on. Endpoint
    /// failures propagate: the user must see that login failed.
    pub async fn login(&self, credentials: &Login) -> Result<LoginResponse> {
        let response = self.backend.login(credentials).await?;

        tracing::info!(
            "LOGIN | user={} phase={:?}",
            credentials.username,
            response.phase
        );

        if response.phase == AuthenticationPhase::Completed {
            self.refresh_current_user_info().await;
        }

        Ok(response)
    }

    /// Terminate the session.
    ///
    /// No-op while the login route is active (prevents redundant logout
    /// cascades). Otherwise calls the logout endpoint and, on success,
    /// clears all session state. Endpoint failures propagate and leave the
    /// cached state untouched.
    pub async fn logout(&self) -> Result<()> {
        if self.routes.is_login_route() {
            return Ok(());
        }

        self.backend.logout().await?;

        tracing::info!("LOGOUT | session cleared");
        self.clear_data();
        Ok(())
    }

    /// Immediately clear the idle baseline and the current user, and
    /// publish the cleared user. Does not touch the server-side session.
    pub fn clear_data(&self) {
        {
            let mut fields = self.fields.lock().expect("session lock poisoned");
            fields.start_time = None;
            fields.current_user = None;
        }
        self.user_subject.publish(None);
    }

    // ------------------------------------------------------------------
    // Idle timer baseline
    // ------------------------------------------------------------------

    /// Record the idle-period start, first write wins.
    ///
    /// Ignored while a baseline is already recorded, so bursty activity
    /// ticks cannot silently rebase the elapsed-idle computation.
    pub fn set_start_time(&self, timestamp_millis: i64) {
        let mut fields = self.fields.lock().expect("session lock poisoned");
        if fields.start_time.is_none() {
            fields.start_time = Some(timestamp_millis);
        }
    }

    /// Publish the current baseline on the reset channel, then optionally
    /// clear it so the next [`set_start_time`](Self::set_start_time) opens
    /// a fresh idle window.
    pub fn reset_automatic_logout_timer(&self, clear_start_time: bool) {
        let start = self
            .fields
            .lock()
            .expect("session lock poisoned")
            .start_time;

        self.reset_timer_subject.publish(start);

        if clear_start_time {
            let mut fields = self.fields.lock().expect("session lock poisoned");
            fields.start_time = None;
        }
    }

    pub fn start_time(&self) -> Option<i64> {
        self.fields
            .lock()
            .expect("session lock poisoned")
            .start_time
    }
}
