//! Hexagonal ports the core depends on.
//!
//! Chat delivery, generation and key-value persistence have their own modules;
//! they are re-exported here so adapter crates have one import path.

use std::path::Path;

use async_trait::async_trait;

use crate::Result;

pub use crate::history::store::KvStore;
pub use crate::messaging::port::MessagingPort;
pub use crate::model::client::GenerationClient;

/// Moves generated images from the service to a public host.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// Fetch `url` and write it to `dest`.
    async fn download(&self, url: &str, dest: &Path) -> Result<()>;

    /// Upload `file` to the hosting endpoint at `base_url`; returns the public reference.
    async fn upload(&self, base_url: &str, file: &Path) -> Result<String>;
}
