use async_trait::async_trait;

use crate::Result;

use super::types::*;

/// Generation service used by the command handlers.
///
/// Errors come back as `Error::Service` holding the upstream message text; the
/// handlers show it to the user as-is and only pattern-match it for quota
/// exhaustion (`errors::classify_error`). Implementations must not retry.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn create_completion(&self, req: CompletionRequest) -> Result<Completion>;

    async fn create_chat_completion(&self, req: ChatRequest) -> Result<ChatCompletion>;

    async fn create_image(&self, req: ImageRequest) -> Result<GeneratedImage>;
}
