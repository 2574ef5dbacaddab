use crate::error::{StoreError, ValidationError};
use crate::recipient::{ConversationKey, RecipientRef};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod memory;

/// A persisted chat message. Immutable once created; ordering within a
/// conversation is ascending `created_at`.
#[derive(Debug, Clone, Serialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub from: RecipientRef,
    pub to: RecipientRef,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    pub fn conversation_key(&self) -> ConversationKey {
        ConversationKey::new(&self.from, &self.to)
    }
}

/// Rejects blank content before it can reach the database.
pub fn validate_content(content: &str) -> Result<&str, ValidationError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    Ok(trimmed)
}

/// Durable record of messages plus live-update fanout.
///
/// Store failure aborts a send; it is never rolled into the notification
/// decision, which happens strictly after a successful append.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist one message and publish it to live subscribers. Returns the
    /// stored row with the server-assigned id and timestamp.
    async fn append(
        &self,
        from: &RecipientRef,
        to: &RecipientRef,
        content: &str,
    ) -> Result<StoredMessage, StoreError>;

    /// All messages of the unordered pair `{a,b}`, ascending by creation
    /// time. A materialized list, not a stream.
    async fn list_conversation(
        &self,
        a: &RecipientRef,
        b: &RecipientRef,
    ) -> Result<Vec<StoredMessage>, StoreError>;

    /// The other participant of the reference's most recent conversation.
    /// Routes bot-side replies to the chat the user last spoke in.
    async fn latest_partner(
        &self,
        participant: &RecipientRef,
    ) -> Result<Option<RecipientRef>, StoreError>;

    /// Live feed of newly appended messages for the pair. Dropping the feed
    /// unsubscribes it.
    fn subscribe(&self, a: &RecipientRef, b: &RecipientRef) -> ConversationFeed;
}

/// Broadcast fanout for live updates. Every appended message is published
/// once; feeds filter down to their own pair, mirroring a table-wide change
/// channel filtered client-side.
#[derive(Debug, Clone)]
pub struct MessageFanout {
    tx: broadcast::Sender<StoredMessage>,
}

impl MessageFanout {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, message: &StoredMessage) {
        // No subscribers is fine.
        let _ = self.tx.send(message.clone());
    }

    pub fn subscribe(&self, a: &RecipientRef, b: &RecipientRef) -> ConversationFeed {
        ConversationFeed {
            key: ConversationKey::new(a, b),
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for MessageFanout {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Receiver half of a conversation subscription.
pub struct ConversationFeed {
    key: ConversationKey,
    rx: broadcast::Receiver<StoredMessage>,
}

impl ConversationFeed {
    /// Next message for this pair. `None` once the store is gone. A lagged
    /// receiver skips what it missed; consumers de-duplicate by message id.
    pub async fn next(&mut self) -> Option<StoredMessage> {
        loop {
            match self.rx.recv().await {
                Ok(message) if message.conversation_key() == self.key => return Some(message),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_content_is_rejected() {
        assert_eq!(validate_content("   "), Err(ValidationError::EmptyContent));
        assert_eq!(validate_content(""), Err(ValidationError::EmptyContent));
    }

    #[test]
    fn content_is_trimmed() {
        assert_eq!(validate_content("  hi "), Ok("hi"));
    }
}
