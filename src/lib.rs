// Copyright (c) 2024-2025 Peter Szrnka
// Licensed under the MIT License. See LICENSE file for details.

//! gms-console - session core for the GMS administration console
//!
//! GMS is a secrets/credential management system; this crate is the
//! client-side core its console screens are built on: shared session
//! state, automatic idle logout, and encrypted local persistence of small
//! convenience values.
//!
//! # Core Modules
//!
//! - [`session`] - Session state coordinator, route tracking, auto-logout
//! - [`broadcast`] - Replay-latest broadcast channels
//! - [`client`] - GMS backend HTTP contracts and reqwest client
//! - [`storage`] - AES-256-GCM encrypted local key/value store
//! - [`splash`] - Splash screen state shared with the shell
//! - [`types`] - Canonical wire/data model

pub mod broadcast;
pub mod client;
pub mod session;
pub mod splash;
pub mod storage;
pub mod types;

// Re-export the types most hosts need
pub use broadcast::{ReplaySubject, Subscription};
pub use client::{GmsApiError, GmsClient, SessionBackend};
pub use session::{AutoLogoutMonitor, Readiness, RouteTracker, SessionCoordinator, LOGIN_ROUTE};
pub use splash::SplashScreenState;
pub use storage::SecureStorage;
pub use types::{
    AuthenticationPhase, Login, LoginResponse, SystemReadyData, SystemStatus, User,
};
