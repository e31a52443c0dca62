// Copyright (c) 2024-2025 Peter Szrnka
// Licensed under the MIT License. See LICENSE file for details.

//! Session state coordination.
//!
//! The [`SessionCoordinator`] owns the current authenticated user, the
//! cached system-readiness verdict, and the idle-timer baseline, and
//! broadcasts every change so screens can react without polling. The
//! [`AutoLogoutMonitor`] drives the idle-logout policy on top of it.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use gms_console::client::GmsClient;
//! use gms_console::session::{RouteTracker, SessionCoordinator};
//!
//! # async fn example() {
//! let backend = Arc::new(GmsClient::new());
//! let routes = Arc::new(RouteTracker::new());
//! let coordinator = Arc::new(SessionCoordinator::new(backend, Arc::clone(&routes)));
//!
//! let _sub = coordinator.user_updates().subscribe(|user| {
//!     println!("current user: {:?}", user);
//! });
//!
//! coordinator.check().await;
//! # }
//! ```

pub mod coordinator;
pub mod idle;

pub use coordinator::{Readiness, SessionCoordinator};
pub use idle::AutoLogoutMonitor;

use std::sync::Mutex;

/// Route of the login screen; `logout()` is a no-op while it is active.
pub const LOGIN_ROUTE: &str = "/login";

/// Tracks the currently active route.
///
/// The host shell updates this on every navigation; the coordinator only
/// reads it to suppress redundant logout cascades from the login screen.
pub struct RouteTracker {
    current: Mutex<String>,
}

impl RouteTracker {
    pub fn new() -> Self {
        Self {
            current: Mutex::new("/".to_string()),
        }
    }

    pub fn set_current(&self, route: impl Into<String>) {
        *self.current.lock().expect("route lock poisoned") = route.into();
    }

    pub fn current(&self) -> String {
        self.current.lock().expect("route lock poisoned").clone()
    }

    pub fn is_login_route(&self) -> bool {
        self.current() == LOGIN_ROUTE
    }
}

impl Default for RouteTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_tracker_defaults_to_root() {
        let routes = RouteTracker::new();
        assert_eq!(routes.current(), "/");
        assert!(!routes.is_login_route());
    }

    #[test]
    fn test_route_tracker_updates() {
        let routes = RouteTracker::new();
        routes.set_current(LOGIN_ROUTE);
        assert!(routes.is_login_route());

        routes.set_current("/secret/list");
        assert!(!routes.is_login_route());
    }
}
