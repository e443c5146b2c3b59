//! Core domain + application logic for aibird, a chat bot in front of a
//! text/image generation service.
//!
//! This crate is intentionally framework-agnostic. The chat transport, the
//! generation service and the key-value store live behind ports (traits)
//! implemented in adapter crates or in `history::store`.

pub mod chunker;
pub mod config;
pub mod cost;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod history;
pub mod image;
pub mod logging;
pub mod messaging;
pub mod model;
pub mod ports;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
