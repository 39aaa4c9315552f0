//! Core domain + application logic for alivebot.
//!
//! This crate is intentionally messenger-agnostic. Telegram lives behind a
//! port (trait) implemented in the adapter crate, so everything here runs in
//! tests with in-memory fakes.

pub mod access;
pub mod audit;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod heartbeat;
pub mod logging;
pub mod messaging;
pub mod roster;
pub mod router;
pub mod runtime;
pub mod texts;

pub use errors::{Error, Result};
