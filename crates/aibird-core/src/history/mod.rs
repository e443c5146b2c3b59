//! Rolling per-conversation history used as context for multi-turn chat.
//!
//! A record is stored as newline-separated `ROLE: text` lines, oldest first, so
//! appending is the natural write order. In memory a `HistoryRecord` is held
//! newest first. `HistoryRecord::decode` is the only place the order flips.

pub mod store;

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    domain::ConversationKey,
    model::types::{ChatMessage, Role},
    Result,
};

use store::KvStore;

/// One role-tagged line of conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    /// Line breaks are flattened: a turn must stay on one stored line.
    pub fn new(role: Role, text: &str) -> Self {
        Self {
            role,
            text: text.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }

    pub fn user(text: &str) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: &str) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn to_line(&self) -> String {
        format!("{}: {}", self.role.tag(), self.text)
    }

    /// Lines without a known role tag are kept as user text.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if let Some((tag, text)) = line.split_once(':') {
            if let Some(role) = Role::from_tag(tag.trim()) {
                return Some(Self::new(role, text));
            }
        }
        Some(Self::new(Role::User, line))
    }

    pub fn to_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.text.clone(),
        }
    }
}

/// Decoded history for one conversation, newest turn first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryRecord {
    turns: Vec<Turn>,
}

impl HistoryRecord {
    /// Read stored bytes (oldest line first) into newest-first order.
    pub fn decode(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        let oldest_first: Vec<Turn> = text.lines().filter_map(Turn::parse_line).collect();
        Self::from_oldest_first(oldest_first)
    }

    fn from_oldest_first(mut turns: Vec<Turn>) -> Self {
        turns.reverse();
        Self { turns }
    }

    /// Stored form: one line per turn, oldest first.
    pub fn encode(&self) -> Vec<u8> {
        self.chronological()
            .map(Turn::to_line)
            .collect::<Vec<_>>()
            .join("\n")
            .into_bytes()
    }

    /// Trim the oldest turns so there is room, then make `turn` the newest.
    ///
    /// Afterwards `len() <= max_turns`.
    pub fn push_newest(&mut self, turn: Turn, max_turns: usize) {
        if max_turns == 0 {
            self.turns.clear();
            return;
        }
        self.turns.truncate(max_turns - 1);
        self.turns.insert(0, turn);
    }

    pub fn newest(&self) -> Option<&Turn> {
        self.turns.first()
    }

    /// Newest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Oldest first, the order a prompt replays them in.
    pub fn chronological(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Conversation history over a `KvStore`.
///
/// Updates for the same key are serialized (read, trim, prepend, write under a
/// per-key lock) so two quick messages from one person can't drop a turn.
/// Different keys never wait on each other. A key's lock only lives while an
/// update for it is running or waiting.
pub struct ConversationHistory {
    store: Arc<dyn KvStore>,
    max_turns: usize,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationHistory {
    pub fn new(store: Arc<dyn KvStore>, max_turns: usize) -> Self {
        Self {
            store,
            max_turns,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Current record; a key that was never written is an empty record.
    pub async fn load(&self, key: &ConversationKey) -> Result<HistoryRecord> {
        let bytes = self.store.get(&key.storage_key()).await?;
        Ok(bytes
            .map(|b| HistoryRecord::decode(&b))
            .unwrap_or_default())
    }

    /// Fold `turns` into the record in order (the last one ends up newest) and
    /// persist it with a single put. On error nothing is written.
    pub async fn record(&self, key: &ConversationKey, turns: Vec<Turn>) -> Result<HistoryRecord> {
        let storage_key = key.storage_key();
        let lock = self.key_lock(&storage_key).await;

        let result = {
            let _guard = lock.lock().await;
            self.fold_and_store(key, &storage_key, turns).await
        };

        drop(lock);
        self.release_key_lock(&storage_key).await;
        result
    }

    async fn fold_and_store(
        &self,
        key: &ConversationKey,
        storage_key: &str,
        turns: Vec<Turn>,
    ) -> Result<HistoryRecord> {
        let mut record = self.load(key).await?;
        for turn in turns {
            record.push_newest(turn, self.max_turns);
        }
        self.store.put(storage_key, record.encode()).await?;
        Ok(record)
    }

    async fn key_lock(&self, storage_key: &str) -> Arc<Mutex<()>> {
        let mut map = self.locks.lock().await;
        map.entry(storage_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the key's lock once nobody else holds or waits on it. Clones are
    /// only taken under the map lock, so a count of 1 means the map is the
    /// last owner.
    async fn release_key_lock(&self, storage_key: &str) {
        let mut map = self.locks.lock().await;
        if map
            .get(storage_key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(storage_key);
        }
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.locks.lock().await.len()
    }
}
