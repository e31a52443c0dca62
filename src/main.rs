// Copyright (c) 2024-2025 Peter Szrnka
// Licensed under the MIT License. See LICENSE file for details.

//! Diagnostic CLI for a GMS backend.
//!
//! Exercises the same session core the console screens use: probe the
//! backend, log in (including the MFA/blocked phases), inspect the current
//! identity, log out.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;

use gms_console::session::{RouteTracker, SessionCoordinator};
use gms_console::types::{AuthenticationPhase, Login};
use gms_console::{GmsClient, Readiness, SecureStorage};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit codes following sysexits.h conventions
mod exit_codes {
    /// Success - operation completed successfully
    pub const SUCCESS: i32 = 0;
    /// General error - unspecified error
    pub const ERROR: i32 = 1;
    /// Service unavailable - backend not reachable
    pub const SERVICE_UNAVAILABLE: i32 = 69;
    /// Permission denied - authentication failed
    pub const NO_PERM: i32 = 77;
}

#[derive(Parser)]
#[command(name = "gms-console", version = VERSION, about = "GMS console session diagnostics")]
struct Cli {
    /// Backend base URL (defaults to $GMS_BASE_URL or http://localhost:8080)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe backend readiness and show the auth mode
    Status,
    /// Authenticate and show the resulting session
    Login {
        /// Username to authenticate as; prompted when omitted, defaulting
        /// to the last remembered one
        #[arg(short, long)]
        username: Option<String>,
        /// Credential; prompted with masked input when omitted
        #[arg(short, long)]
        credential: Option<String>,
    },
    /// Show the identity bound to the current session
    Whoami,
    /// Terminate the current session
    Logout,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let client = match &cli.base_url {
        Some(url) => GmsClient::with_base_url(url),
        None => GmsClient::new(),
    };

    let code = match run(client, cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            exit_codes::ERROR
        }
    };
    std::process::exit(code);
}

async fn run(client: GmsClient, command: Command) -> Result<i32> {
    let backend = Arc::new(client);
    let routes = Arc::new(RouteTracker::new());
    let coordinator = SessionCoordinator::new(backend, routes);

    match command {
        Command::Status => {
            coordinator.check().await;

            match coordinator.readiness() {
                Readiness::Ready => {
                    println!("{} backend is ready", "[ok]".green().bold());
                    if let Some(data) = coordinator.system_ready_data() {
                        println!("  auth mode: {}", data.auth_mode.cyan());
                        if let Some(minutes) = data.automatic_logout_time_in_minutes {
                            println!("  auto logout: {} min", minutes);
                        }
                    }
                    Ok(exit_codes::SUCCESS)
                }
                Readiness::NotReady => {
                    println!("{} backend needs setup", "[!]".yellow().bold());
                    Ok(exit_codes::SUCCESS)
                }
                _ => {
                    println!("{} backend unreachable", "[x]".red().bold());
                    Ok(exit_codes::SERVICE_UNAVAILABLE)
                }
            }
        }
        Command::Login {
            username,
            credential,
        } => {
            // Convenience data only; a broken local store must not block login.
            let mut store = match SecureStorage::open_default() {
                Ok(store) => Some(store),
                Err(e) => {
                    tracing::warn!("Local store unavailable: {}", e);
                    None
                }
            };

            let username = match username {
                Some(u) => u,
                None => {
                    let remembered = store.as_ref().map(|s| s.last_username());
                    prompt_username(remembered.unwrap_or_default())?
                }
            };
            let credential = match credential {
                Some(c) => c,
                None => prompt_credential()?,
            };

            let response = coordinator
                .login(&Login::new(username.clone(), credential))
                .await?;
            match response.phase {
                AuthenticationPhase::Completed => {
                    if let Some(store) = store.as_mut() {
                        if let Err(e) = store.set_last_username(&username) {
                            tracing::warn!("Failed to remember username: {}", e);
                        }
                    }
                    let name = coordinator
                        .current_user()
                        .map(|u| u.username)
                        .unwrap_or_else(|| "?".to_string());
                    println!("{} logged in as {}", "[ok]".green().bold(), name.cyan());
                    Ok(exit_codes::SUCCESS)
                }
                AuthenticationPhase::MfaRequired => {
                    println!("{} second factor required", "[!]".yellow().bold());
                    Ok(exit_codes::SUCCESS)
                }
                AuthenticationPhase::Blocked => {
                    println!("{} account is blocked", "[x]".red().bold());
                    Ok(exit_codes::NO_PERM)
                }
                AuthenticationPhase::Failed => {
                    println!("{} login failed", "[x]".red().bold());
                    Ok(exit_codes::NO_PERM)
                }
            }
        }
        Command::Whoami => match coordinator.get_user_info().await {
            Some(user) => {
                println!("{}", user.username.cyan().bold());
                if !user.roles.is_empty() {
                    println!("  roles: {}", user.roles.join(", "));
                }
                Ok(exit_codes::SUCCESS)
            }
            None => {
                println!("{} not logged in", "[x]".red().bold());
                Ok(exit_codes::NO_PERM)
            }
        },
        Command::Logout => {
            coordinator.logout().await?;
            println!("{} logged out", "[ok]".green().bold());
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn prompt_username(remembered: String) -> Result<String> {
    let mut prompt = inquire::Text::new("Username:");
    if !remembered.is_empty() {
        prompt = prompt.with_default(&remembered);
    }
    Ok(prompt.prompt()?)
}

fn prompt_credential() -> Result<String> {
    let credential = inquire::Password::new("Credential:")
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;
    Ok(credential)
}
