use crate::domain::{ChatId, MessageContext, UserId};

/// Plain text message received from the chat transport.
#[derive(Clone, Debug)]
pub struct IncomingText {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub text: String,
}

impl IncomingText {
    /// Users without a handle are addressed as `user<id>`. The name is for
    /// display only; conversation keys use the numeric user id.
    pub fn context(&self) -> MessageContext {
        let username = self
            .username
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("user{}", self.user_id.0));

        MessageContext {
            chat_id: self.chat_id,
            user_id: self.user_id,
            username,
        }
    }
}

/// Capabilities / limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub max_message_len: usize,
}
