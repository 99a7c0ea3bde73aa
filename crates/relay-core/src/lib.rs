//! Core domain + relay logic for the Telegram message-relay bridge.
//!
//! This crate is intentionally framework-agnostic. The platform client and the
//! webhook server live behind [`messaging::port::RelayPort`] in adapter crates.

pub mod config;
pub mod directory;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod fanout;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod store;

#[cfg(test)]
mod testing;

pub use errors::{Error, Result};
