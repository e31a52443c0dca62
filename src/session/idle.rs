// Copyright (c) 2024-2025 Peter Szrnka
// Licensed under the MIT License. See LICENSE file for details.

//! Idle/auto-logout monitoring.
//!
//! The monitor measures elapsed idle time against the coordinator's
//! baseline and logs out through the coordinator when the configured
//! window is exceeded. Hosts wire `record_activity` to their activity
//! events and either call [`AutoLogoutMonitor::tick`] from their own loop
//! or let [`AutoLogoutMonitor::run`] poll on a tokio interval until
//! [`AutoLogoutMonitor::stop`] is called.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::session::SessionCoordinator;

/// Default polling cadence for the built-in loop.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Watches the idle baseline and triggers logout after the configured
/// inactivity window.
pub struct AutoLogoutMonitor {
    coordinator: Arc<SessionCoordinator>,
    timeout: Duration,
    shutdown: AtomicBool,
}

impl AutoLogoutMonitor {
    /// Create a monitor with the auto-logout window in minutes, as
    /// reported by the readiness probe.
    pub fn new(coordinator: Arc<SessionCoordinator>, timeout_minutes: u32) -> Self {
        Self {
            coordinator,
            timeout: Duration::from_secs(u64::from(timeout_minutes) * 60),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Record user activity: publish the old baseline on the reset channel,
    /// clear it, and open a fresh idle window starting now.
    pub fn record_activity(&self, now_millis: i64) {
        self.coordinator.reset_automatic_logout_timer(true);
        self.coordinator.set_start_time(now_millis);
    }

    /// Evaluate the idle window once.
    ///
    /// Seeds the baseline when none is recorded yet (the window starts
    /// when monitoring starts, not at some unknown earlier point).
    /// Returns `true` when the window was exceeded and logout was
    /// triggered.
    pub async fn tick(&self, now_millis: i64) -> bool {
        let Some(start) = self.coordinator.start_time() else {
            self.coordinator.set_start_time(now_millis);
            return false;
        };

        let elapsed = now_millis.saturating_sub(start);
        if elapsed < self.timeout.as_millis() as i64 {
            return false;
        }

        tracing::info!(
            "IDLE_LOGOUT | elapsed={}ms window={}ms",
            elapsed,
            self.timeout.as_millis()
        );

        self.coordinator.reset_automatic_logout_timer(true);
        if let Err(e) = self.coordinator.logout().await {
            // State stays intact; the next tick retries.
            tracing::warn!("IDLE_LOGOUT_FAILED | {}", e);
            return false;
        }

        true
    }

    /// Poll the idle window until [`stop`](Self::stop) is called.
    pub async fn run(self: Arc<Self>) {
        self.run_with_interval(DEFAULT_POLL_INTERVAL).await;
    }

    pub async fn run_with_interval(self: Arc<Self>, poll_interval: Duration) {
        let mut interval = tokio::time::interval(poll_interval);
        loop {
            interval.tick().await;
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            self.tick(Utc::now().timestamp_millis()).await;
        }
    }

    /// Stop the polling loop after its current iteration.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}
