use crate::recipient::ConversationKey;
use moka::sync::Cache;
use serde::Serialize;

/// Why pushes stopped for a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    /// The recipient is on the injected deny-list.
    Denied,
    /// No Telegram chat id could be resolved for the recipient.
    Unresolvable,
    /// Telegram reported the chat as gone or the bot as blocked.
    ChatNotFound,
    DeliveryFailed,
}

/// Session-scoped record of conversations whose Telegram notifications are
/// disabled. An entry is sticky until the conversation is reloaded; nothing
/// here is persisted, so a process restart re-arms every conversation.
#[derive(Clone)]
pub struct SuppressionCache {
    inner: Cache<ConversationKey, SuppressionReason>,
}

impl SuppressionCache {
    pub fn new() -> Self {
        Self {
            inner: Cache::builder().max_capacity(10_000).build(),
        }
    }

    pub fn suppress(&self, key: ConversationKey, reason: SuppressionReason) {
        self.inner.insert(key, reason);
    }

    pub fn get(&self, key: &ConversationKey) -> Option<SuppressionReason> {
        self.inner.get(key)
    }

    pub fn is_suppressed(&self, key: &ConversationKey) -> bool {
        self.inner.contains_key(key)
    }

    /// Reload semantics: fetching a conversation's history re-arms delivery.
    pub fn reset(&self, key: &ConversationKey) {
        self.inner.invalidate(key);
    }
}

impl Default for SuppressionCache {
    fn default() -> Self {
        Self::new()
    }
}
