//! Generation service port and request/response types.

pub mod client;
pub mod types;
