use super::{validate_content, ConversationFeed, MessageFanout, MessageStore, StoredMessage};
use crate::error::StoreError;
use crate::recipient::{ConversationKey, RecipientRef};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use uuid::Uuid;

/// In-memory `MessageStore`. Backs unit tests and local experiments; the
/// production store lives in the app crate on top of sea-orm.
#[derive(Default)]
pub struct MemoryMessageStore {
    messages: Mutex<Vec<StoredMessage>>,
    fanout: MessageFanout,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append(
        &self,
        from: &RecipientRef,
        to: &RecipientRef,
        content: &str,
    ) -> Result<StoredMessage, StoreError> {
        let content = validate_content(content)?;
        let message = StoredMessage {
            id: Uuid::now_v7(),
            from: from.clone(),
            to: to.clone(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.messages
            .lock()
            .expect("message store lock poisoned")
            .push(message.clone());
        self.fanout.publish(&message);
        Ok(message)
    }

    async fn list_conversation(
        &self,
        a: &RecipientRef,
        b: &RecipientRef,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let key = ConversationKey::new(a, b);
        Ok(self
            .messages
            .lock()
            .expect("message store lock poisoned")
            .iter()
            .filter(|m| m.conversation_key() == key)
            .cloned()
            .collect())
    }

    async fn latest_partner(
        &self,
        participant: &RecipientRef,
    ) -> Result<Option<RecipientRef>, StoreError> {
        Ok(self
            .messages
            .lock()
            .expect("message store lock poisoned")
            .iter()
            .rev()
            .find_map(|m| {
                if m.from == *participant {
                    Some(m.to.clone())
                } else if m.to == *participant {
                    Some(m.from.clone())
                } else {
                    None
                }
            }))
    }

    fn subscribe(&self, a: &RecipientRef, b: &RecipientRef) -> ConversationFeed {
        self.fanout.subscribe(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    fn numeric(id: i64) -> RecipientRef {
        RecipientRef::Telegram(id)
    }

    fn internal(id: &str) -> RecipientRef {
        RecipientRef::Internal(id.to_string())
    }

    #[tokio::test]
    async fn appended_message_appears_once_in_both_orderings() {
        let store = MemoryMessageStore::new();
        let (a, b) = (internal("u1"), numeric(555));
        store.append(&a, &b, "hello").await.unwrap();

        let forward = store.list_conversation(&a, &b).await.unwrap();
        let backward = store.list_conversation(&b, &a).await.unwrap();
        assert_eq!(forward.len(), 1);
        assert_eq!(backward.len(), 1);
        assert_eq!(forward[0].id, backward[0].id);
        assert_eq!(forward[0].content, "hello");
    }

    #[tokio::test]
    async fn other_conversations_are_not_listed() {
        let store = MemoryMessageStore::new();
        store.append(&internal("u1"), &numeric(555), "one").await.unwrap();
        store.append(&internal("u1"), &numeric(777), "two").await.unwrap();

        let listed = store
            .list_conversation(&numeric(555), &internal("u1"))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].content, "one");
    }

    #[tokio::test]
    async fn blank_append_never_reaches_the_store() {
        let store = MemoryMessageStore::new();
        let err = store
            .append(&internal("u1"), &numeric(555), "  ")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::EmptyContent)
        ));
        assert!(store
            .list_conversation(&internal("u1"), &numeric(555))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn subscription_sees_only_its_pair() {
        let store = MemoryMessageStore::new();
        let mut feed = store.subscribe(&internal("u1"), &numeric(555));

        store.append(&internal("u2"), &numeric(555), "other").await.unwrap();
        store.append(&numeric(555), &internal("u1"), "mine").await.unwrap();

        let seen = feed.next().await.unwrap();
        assert_eq!(seen.content, "mine");
    }

    #[tokio::test]
    async fn latest_partner_is_the_most_recent_conversation() {
        let store = MemoryMessageStore::new();
        store.append(&internal("u1"), &numeric(555), "first").await.unwrap();
        store.append(&numeric(777), &internal("u1"), "second").await.unwrap();

        let partner = store.latest_partner(&internal("u1")).await.unwrap();
        assert_eq!(partner, Some(numeric(777)));
        assert_eq!(store.latest_partner(&internal("nobody")).await.unwrap(), None);
    }
}
