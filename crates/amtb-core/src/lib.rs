//! Core domain + application logic for the Alertmanager Telegram bot.
//!
//! This crate is intentionally framework-agnostic. Telegram, Alertmanager and
//! Prometheus live behind ports (traits) implemented in adapter crates.

pub mod bot;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod ingress;
pub mod logging;
pub mod menu;
pub mod messaging;
pub mod model;
pub mod ports;
pub mod security;
pub mod session;
pub mod templating;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};

/// Version reported by `/help`, `/status` and in created silences.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Program name used in `createdBy` of silences and in log lines.
pub const PROGRAM_NAME: &str = "amtb";
