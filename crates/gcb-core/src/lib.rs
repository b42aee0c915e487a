//! Core domain + application logic for the geocache code relay bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the geocaching data
//! provider live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod intake;
pub mod logging;
pub mod matcher;
pub mod messaging;
pub mod provider;
pub mod resolver;
pub mod templates;

#[cfg(test)]
mod testing;

pub use errors::{Error, Result};
