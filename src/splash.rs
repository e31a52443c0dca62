// Copyright (c) 2024-2025 Peter Szrnka
// Licensed under the MIT License. See LICENSE file for details.

//! Splash screen state.
//!
//! Long-running actions (login, setup, bulk saves) raise the splash
//! overlay; the shell subscribes once and reacts to the broadcast. The
//! replay-latest semantics mean a shell mounted mid-action still sees the
//! overlay.

use crate::broadcast::ReplaySubject;

pub struct SplashScreenState {
    subject: ReplaySubject<bool>,
}

impl SplashScreenState {
    pub fn new() -> Self {
        Self {
            subject: ReplaySubject::new(),
        }
    }

    /// Show the splash overlay.
    pub fn start(&self) {
        self.subject.publish(true);
    }

    /// Hide the splash overlay.
    pub fn stop(&self) {
        self.subject.publish(false);
    }

    pub fn updates(&self) -> &ReplaySubject<bool> {
        &self.subject
    }

    pub fn is_visible(&self) -> bool {
        self.subject.last_value().unwrap_or(false)
    }
}

impl Default for SplashScreenState {
    fn default() -> Self {
        Self::new()
    }
}
