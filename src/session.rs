//! Per-conversation history store
//!
//! Each record holds the message history of one conversation key plus the
//! flow that created it. Records idle for longer than the conversation TTL
//! are removed by `sweep_expired`.

pub mod trimmer;

use crate::gemini::{Message, Part, Role};
use crate::store::KeyedStore;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use trimmer::{trim_to, MAX_MESSAGES};
use uuid::Uuid;

/// Flow a conversation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Generate,
    Edit,
    Reference,
    Merge,
    Analysis,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionKind::Generate => "generate",
            SessionKind::Edit => "edit",
            SessionKind::Reference => "reference",
            SessionKind::Merge => "merge",
            SessionKind::Analysis => "analysis",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRecord {
    pub key: String,
    pub kind: SessionKind,
    /// Opaque id carried across resets that preserve it
    pub conversation_id: String,
    pub messages: Vec<Message>,
    pub last_activity: Instant,
}

impl ConversationRecord {
    fn new(key: &str, kind: SessionKind, conversation_id: String, now: Instant) -> Self {
        Self {
            key: key.to_string(),
            kind,
            conversation_id,
            messages: Vec::new(),
            last_activity: now,
        }
    }

    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) > ttl
    }
}

fn new_conversation_id() -> String {
    Uuid::new_v4().to_string()
}

pub struct SessionStore {
    records: KeyedStore<String, ConversationRecord>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: KeyedStore::new(),
            ttl,
        }
    }

    /// Replace the record with an empty one of `kind`.
    pub async fn create_or_reset(&self, key: &str, kind: SessionKind, preserve_id: bool, now: Instant) {
        let key_owned = key.to_string();
        self.records
            .with_or_insert(
                &key_owned,
                || ConversationRecord::new(key, kind, new_conversation_id(), now),
                |record| {
                    let conversation_id = if preserve_id {
                        std::mem::take(&mut record.conversation_id)
                    } else {
                        new_conversation_id()
                    };
                    *record = ConversationRecord::new(key, kind, conversation_id, now);
                },
            )
            .await;
        tracing::debug!(conversation = %key, kind = %kind, preserve_id, "Conversation reset");
    }

    /// Append a message and trim. A missing record is created as `Generate`.
    /// Returns the message list after trimming.
    pub async fn append(&self, key: &str, role: Role, parts: Vec<Part>, now: Instant) -> Vec<Message> {
        let key_owned = key.to_string();
        let (messages, dropped) = self
            .records
            .with_or_insert(
                &key_owned,
                || ConversationRecord::new(key, SessionKind::Generate, new_conversation_id(), now),
                |record| {
                    record.messages.push(Message::new(role, parts));
                    record.last_activity = now;
                    let dropped = trim_to(&mut record.messages, MAX_MESSAGES);
                    (record.messages.clone(), dropped)
                },
            )
            .await;
        if dropped > 0 {
            tracing::debug!(conversation = %key, dropped, "Trimmed conversation history");
        }
        messages
    }

    pub async fn get(&self, key: &str) -> Option<ConversationRecord> {
        self.records.get(&key.to_string()).await
    }

    pub async fn history(&self, key: &str) -> Vec<Message> {
        self.records
            .with(&key.to_string(), |record| record.messages.clone())
            .await
            .unwrap_or_default()
    }

    pub async fn kind(&self, key: &str) -> Option<SessionKind> {
        self.records.with(&key.to_string(), |record| record.kind).await
    }

    /// Explicit end of conversation. Returns whether a record existed.
    pub async fn end(&self, key: &str) -> bool {
        self.records.remove(&key.to_string()).await
    }

    /// Keep only the current prompt, preserving kind and conversation id.
    /// Used when the history no longer fits in a request.
    pub async fn collapse_to_prompt(&self, key: &str, prompt: &str, now: Instant) {
        let found = self
            .records
            .with(&key.to_string(), |record| {
                record.messages = vec![Message::user_text(prompt)];
                record.last_activity = now;
            })
            .await;
        if found.is_some() {
            tracing::info!(conversation = %key, "Collapsed conversation to current prompt");
        }
    }

    /// Remove records idle for longer than the TTL. Returns how many went.
    pub async fn sweep_expired(&self, now: Instant) -> usize {
        let ttl = self.ttl;
        let removed = self
            .records
            .retain(|_, record| !record.is_expired(now, ttl))
            .await;
        if removed > 0 {
            tracing::info!(removed, "Swept expired conversations");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.records.len().await
    }
}
