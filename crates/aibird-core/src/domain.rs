use std::fmt;

/// Chat user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Chat id (numeric). A channel, group or private conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a sent message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Identifies one ongoing multi-turn conversation: one participant, in one
/// channel, talking to one bot identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub bot: String,
    pub channel: String,
    pub participant: String,
}

impl ConversationKey {
    pub fn new(bot: impl Into<String>, channel: ChatId, participant: impl Into<String>) -> Self {
        Self {
            bot: bot.into(),
            channel: channel.0.to_string(),
            participant: participant.into(),
        }
    }

    /// Key for the sender of a message. The participant is the numeric user id:
    /// handles can be renamed, and a handle may look like another user's fallback name.
    pub fn for_context(bot: impl Into<String>, ctx: &MessageContext) -> Self {
        Self::new(bot, ctx.chat_id, ctx.user_id.0.to_string())
    }

    /// Serialized form used as the key-value store key.
    pub fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_chats_cache_gpt_{}",
            self.bot, self.channel, self.participant
        )
    }
}

/// Who sent a message and where to answer it.
#[derive(Clone, Debug)]
pub struct MessageContext {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_scoped_per_participant_and_channel() {
        let a = ConversationKey::new("bird", ChatId(-100), "alice");
        let b = ConversationKey::new("bird", ChatId(-100), "bob");
        let c = ConversationKey::new("bird", ChatId(42), "alice");
        assert_ne!(a.storage_key(), b.storage_key());
        assert_ne!(a.storage_key(), c.storage_key());
        assert_eq!(a.storage_key(), "bird_-100_chats_cache_gpt_alice");
    }

    #[test]
    fn context_key_uses_the_user_id_not_the_handle() {
        // Handle `user42` next to user 42 who has no handle.
        let handle_lookalike = MessageContext {
            chat_id: ChatId(-5),
            user_id: UserId(7),
            username: "user42".to_string(),
        };
        let no_handle = MessageContext {
            chat_id: ChatId(-5),
            user_id: UserId(42),
            username: "user42".to_string(),
        };

        let a = ConversationKey::for_context("bird", &handle_lookalike);
        let b = ConversationKey::for_context("bird", &no_handle);
        assert_ne!(a.storage_key(), b.storage_key());
        assert_eq!(b.storage_key(), "bird_-5_chats_cache_gpt_42");
    }

    #[test]
    fn renamed_handle_keeps_the_same_key() {
        let before = MessageContext {
            chat_id: ChatId(3),
            user_id: UserId(9),
            username: "old_name".to_string(),
        };
        let after = MessageContext {
            username: "new_name".to_string(),
            ..before.clone()
        };
        assert_eq!(
            ConversationKey::for_context("bird", &before),
            ConversationKey::for_context("bird", &after)
        );
    }
}
