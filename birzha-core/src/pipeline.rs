use crate::error::StoreError;
use crate::gate::NotificationGate;
use crate::recipient::{ConversationKey, RecipientRef};
use crate::relay::{ChatNotification, DeliveryStatus, NotificationRelay};
use crate::resolver::{Resolution, UserDirectory};
use crate::store::{validate_content, MessageStore, StoredMessage};
use crate::suppression::{SuppressionCache, SuppressionReason};
use std::sync::Arc;
use tracing::{info, warn};

/// In-band error for gate-denied recipients.
pub const DENIED_ERROR: &str = "Notification skipped for problematic ID";
/// In-band error when no chat id can be resolved.
pub const UNRESOLVABLE_ERROR: &str = "Telegram ID not found";
/// In-band error when the process runs without a bot credential.
pub const NO_BOT_ERROR: &str = "Bot token not configured";

/// End-to-end send path: validate, persist, then decide whether the stored
/// message also becomes a Telegram push.
///
/// Persistence and notification are independent steps. A store failure
/// aborts the send; a notification failure flips the conversation's
/// suppression entry and nothing else.
pub struct SendPipeline {
    store: Arc<dyn MessageStore>,
    directory: Arc<dyn UserDirectory>,
    relay: Option<Arc<dyn NotificationRelay>>,
    gate: NotificationGate,
    suppression: SuppressionCache,
}

/// What happened to the push for one stored message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Delivered,
    /// The conversation was already marked undeliverable this session; no
    /// resolution or relay work was done.
    AlreadySuppressed(SuppressionReason),
    /// This attempt marked the conversation undeliverable.
    Suppressed {
        reason: SuppressionReason,
        error: String,
    },
}

impl NotificationOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, NotificationOutcome::Delivered)
    }

    /// In-band error text for the notify endpoint's response body.
    pub fn error_message(&self) -> Option<String> {
        match self {
            NotificationOutcome::Delivered => None,
            NotificationOutcome::AlreadySuppressed(_) => {
                Some("Notifications disabled for this conversation".to_string())
            }
            NotificationOutcome::Suppressed { error, .. } => Some(error.clone()),
        }
    }
}

impl SendPipeline {
    pub fn new(
        store: Arc<dyn MessageStore>,
        directory: Arc<dyn UserDirectory>,
        relay: Option<Arc<dyn NotificationRelay>>,
        gate: NotificationGate,
    ) -> Self {
        Self {
            store,
            directory,
            relay,
            gate,
            suppression: SuppressionCache::new(),
        }
    }

    pub fn suppression(&self) -> &SuppressionCache {
        &self.suppression
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    pub fn directory(&self) -> &Arc<dyn UserDirectory> {
        &self.directory
    }

    /// Persist a message. Nothing notification-related happens here, so a
    /// failure means the message was not stored and must not be shown as
    /// sent.
    pub async fn append(
        &self,
        from: &RecipientRef,
        to: &RecipientRef,
        content: &str,
    ) -> Result<StoredMessage, StoreError> {
        let content = validate_content(content)?;
        self.store.append(from, to, content).await
    }

    /// Validate, persist, then attempt the push, in that order. The HTTP
    /// send handler uses `append` plus a spawned `notify` instead, so the
    /// send path never waits on the push API.
    pub async fn send(
        &self,
        from: &RecipientRef,
        to: &RecipientRef,
        content: &str,
        source: &str,
    ) -> Result<(StoredMessage, NotificationOutcome), StoreError> {
        let message = self.append(from, to, content).await?;
        let outcome = self.notify(from, to, &message.content, source).await;
        Ok((message, outcome))
    }

    /// Decide and attempt the Telegram push for an already-stored message.
    ///
    /// Infallible by design: every failure mode folds into the returned
    /// outcome, and any outcome other than `Delivered` flips the
    /// conversation's suppression entry. No retries.
    pub async fn notify(
        &self,
        from: &RecipientRef,
        to: &RecipientRef,
        content: &str,
        source: &str,
    ) -> NotificationOutcome {
        let key = ConversationKey::new(from, to);
        if let Some(reason) = self.suppression.get(&key) {
            info!(recipient = %to, ?reason, "notifications disabled for conversation, skipping");
            return NotificationOutcome::AlreadySuppressed(reason);
        }

        if !self.gate.should_attempt(to) {
            info!(recipient = %to, "recipient is deny-listed, skipping notification");
            return self.suppress(key, SuppressionReason::Denied, DENIED_ERROR.to_string());
        }

        let Some(relay) = self.relay.as_ref() else {
            warn!("no bot credential configured, cannot notify");
            return self.suppress(
                key,
                SuppressionReason::DeliveryFailed,
                NO_BOT_ERROR.to_string(),
            );
        };

        let chat_id = match self.directory.resolve(to).await {
            Ok(Resolution::Chat(chat_id)) => chat_id,
            Ok(Resolution::Unresolvable) => {
                warn!(recipient = %to, "recipient has no Telegram id");
                return self.suppress(
                    key,
                    SuppressionReason::Unresolvable,
                    UNRESOLVABLE_ERROR.to_string(),
                );
            }
            Err(e) => {
                warn!(recipient = %to, error = %e, "recipient lookup failed");
                return self.suppress(
                    key,
                    SuppressionReason::Unresolvable,
                    UNRESOLVABLE_ERROR.to_string(),
                );
            }
        };

        let notification = ChatNotification {
            sender_label: self.sender_label(from).await,
            body: content.to_string(),
            source: source.to_string(),
            reply_to: from.clone(),
        };

        match relay.send_notification(chat_id, &notification).await {
            Ok(DeliveryStatus::Delivered) => {
                info!(chat_id, "chat notification delivered");
                NotificationOutcome::Delivered
            }
            Ok(DeliveryStatus::ChatNotFound) => {
                warn!(chat_id, "chat not found, disabling notifications");
                self.suppress(
                    key,
                    SuppressionReason::ChatNotFound,
                    "Telegram notification failed: chat not found".to_string(),
                )
            }
            Ok(DeliveryStatus::Failed(description)) => {
                warn!(chat_id, error = %description, "telegram rejected the notification");
                self.suppress(
                    key,
                    SuppressionReason::DeliveryFailed,
                    format!("Telegram notification failed: {description}"),
                )
            }
            Err(e) => {
                warn!(chat_id, error = %e, "notification transport fault");
                self.suppress(key, SuppressionReason::DeliveryFailed, e.to_string())
            }
        }
    }

    /// Conversation history with reload semantics: fetching it resets the
    /// pair's suppression entry, allowing one more attempt on the next send.
    pub async fn reload_conversation(
        &self,
        a: &RecipientRef,
        b: &RecipientRef,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        self.suppression.reset(&ConversationKey::new(a, b));
        self.store.list_conversation(a, b).await
    }

    async fn sender_label(&self, from: &RecipientRef) -> String {
        match self.directory.display_name(from).await {
            Ok(Some(name)) => name,
            Ok(None) => "a user".to_string(),
            Err(e) => {
                warn!(sender = %from, error = %e, "sender lookup failed");
                "a user".to_string()
            }
        }
    }

    fn suppress(
        &self,
        key: ConversationKey,
        reason: SuppressionReason,
        error: String,
    ) -> NotificationOutcome {
        self.suppression.suppress(key, reason);
        NotificationOutcome::Suppressed { reason, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RelayError, ValidationError};
    use crate::store::memory::MemoryMessageStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const BAD_ID: &str = "2c63b8fb-48a5-409f-b51b-e32037ce93b1";

    #[derive(Default)]
    struct StaticDirectory {
        telegram_ids: HashMap<String, Option<i64>>,
        names: HashMap<String, String>,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl UserDirectory for StaticDirectory {
        async fn telegram_id_for(&self, internal_id: &str) -> Result<Option<i64>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.telegram_ids.get(internal_id).copied().flatten())
        }

        async fn display_name(
            &self,
            recipient: &RecipientRef,
        ) -> Result<Option<String>, StoreError> {
            Ok(self.names.get(&recipient.to_string()).cloned())
        }
    }

    struct RecordingRelay {
        calls: Mutex<Vec<(i64, String)>>,
        result: DeliveryStatus,
    }

    impl RecordingRelay {
        fn returning(result: DeliveryStatus) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(vec![]),
                result,
            })
        }

        fn calls(&self) -> Vec<(i64, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationRelay for RecordingRelay {
        async fn send_notification(
            &self,
            chat_id: i64,
            notification: &ChatNotification,
        ) -> Result<DeliveryStatus, RelayError> {
            self.calls
                .lock()
                .unwrap()
                .push((chat_id, notification.to_text()));
            Ok(self.result.clone())
        }

        async fn send_plain(
            &self,
            chat_id: i64,
            text: &str,
        ) -> Result<DeliveryStatus, RelayError> {
            self.calls.lock().unwrap().push((chat_id, text.to_string()));
            Ok(self.result.clone())
        }
    }

    fn pipeline(
        directory: StaticDirectory,
        relay: Option<Arc<RecordingRelay>>,
        deny: &[&str],
    ) -> SendPipeline {
        SendPipeline::new(
            Arc::new(MemoryMessageStore::new()),
            Arc::new(directory),
            relay.map(|r| r as Arc<dyn NotificationRelay>),
            NotificationGate::new(deny.iter().map(|s| s.to_string())),
        )
    }

    fn internal(id: &str) -> RecipientRef {
        RecipientRef::Internal(id.to_string())
    }

    #[tokio::test]
    async fn numeric_recipient_is_notified_with_the_message_body() {
        let relay = RecordingRelay::returning(DeliveryStatus::Delivered);
        let pipeline = pipeline(StaticDirectory::default(), Some(relay.clone()), &[]);

        let (message, outcome) = pipeline
            .send(&internal("u1"), &RecipientRef::Telegram(555), "hi", "chat")
            .await
            .unwrap();

        assert_eq!(message.content, "hi");
        assert!(outcome.is_delivered());
        let calls = relay.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, 555);
        assert!(calls[0].1.contains("\"hi\""));
    }

    #[tokio::test]
    async fn deny_listed_recipient_skips_resolution_and_relay() {
        let relay = RecordingRelay::returning(DeliveryStatus::Delivered);
        let directory = Arc::new(StaticDirectory::default());
        let pipeline = SendPipeline::new(
            Arc::new(MemoryMessageStore::new()),
            directory.clone(),
            Some(relay.clone() as Arc<dyn NotificationRelay>),
            NotificationGate::new([BAD_ID.to_string()]),
        );

        let (_, outcome) = pipeline
            .send(&internal("u1"), &internal(BAD_ID), "hi", "chat")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            NotificationOutcome::Suppressed {
                reason: SuppressionReason::Denied,
                error: DENIED_ERROR.to_string(),
            }
        );
        assert!(relay.calls().is_empty());
        assert_eq!(directory.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unresolvable_recipient_is_suppressed_but_the_message_is_stored() {
        let relay = RecordingRelay::returning(DeliveryStatus::Delivered);
        let directory = StaticDirectory {
            telegram_ids: HashMap::from([("u2".to_string(), None)]),
            ..Default::default()
        };
        let pipeline = pipeline(directory, Some(relay.clone()), &[]);

        let (_, outcome) = pipeline
            .send(&internal("u1"), &internal("u2"), "hi", "chat")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            NotificationOutcome::Suppressed {
                reason: SuppressionReason::Unresolvable,
                error: UNRESOLVABLE_ERROR.to_string(),
            }
        );
        assert!(relay.calls().is_empty());

        let stored = pipeline
            .store()
            .list_conversation(&internal("u1"), &internal("u2"))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "hi");
    }

    #[tokio::test]
    async fn suppression_is_sticky_within_the_session() {
        let relay = RecordingRelay::returning(DeliveryStatus::ChatNotFound);
        let pipeline = pipeline(StaticDirectory::default(), Some(relay.clone()), &[]);
        let (from, to) = (internal("u1"), RecipientRef::Telegram(555));

        let (_, first) = pipeline.send(&from, &to, "one", "chat").await.unwrap();
        assert_eq!(
            first,
            NotificationOutcome::Suppressed {
                reason: SuppressionReason::ChatNotFound,
                error: "Telegram notification failed: chat not found".to_string(),
            }
        );

        let (_, second) = pipeline.send(&from, &to, "two", "chat").await.unwrap();
        assert_eq!(
            second,
            NotificationOutcome::AlreadySuppressed(SuppressionReason::ChatNotFound)
        );

        // Only the first send reached the relay; both messages were stored.
        assert_eq!(relay.calls().len(), 1);
        assert_eq!(
            pipeline
                .store()
                .list_conversation(&from, &to)
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn reloading_the_conversation_rearms_delivery() {
        let relay = RecordingRelay::returning(DeliveryStatus::ChatNotFound);
        let pipeline = pipeline(StaticDirectory::default(), Some(relay.clone()), &[]);
        let (from, to) = (internal("u1"), RecipientRef::Telegram(555));

        pipeline.send(&from, &to, "one", "chat").await.unwrap();
        pipeline.reload_conversation(&from, &to).await.unwrap();
        pipeline.send(&from, &to, "two", "chat").await.unwrap();

        assert_eq!(relay.calls().len(), 2);
    }

    #[tokio::test]
    async fn blank_content_fails_validation_before_the_store() {
        let relay = RecordingRelay::returning(DeliveryStatus::Delivered);
        let pipeline = pipeline(StaticDirectory::default(), Some(relay.clone()), &[]);
        let (from, to) = (internal("u1"), RecipientRef::Telegram(555));

        let err = pipeline.send(&from, &to, "   ", "chat").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::EmptyContent)
        ));
        assert!(pipeline
            .store()
            .list_conversation(&from, &to)
            .await
            .unwrap()
            .is_empty());
        assert!(relay.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_bot_credential_fails_in_band() {
        let pipeline = pipeline(StaticDirectory::default(), None, &[]);
        let (from, to) = (internal("u1"), RecipientRef::Telegram(555));

        let (_, outcome) = pipeline.send(&from, &to, "hi", "chat").await.unwrap();
        assert_eq!(
            outcome,
            NotificationOutcome::Suppressed {
                reason: SuppressionReason::DeliveryFailed,
                error: NO_BOT_ERROR.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn sender_label_prefers_the_directory_name() {
        let relay = RecordingRelay::returning(DeliveryStatus::Delivered);
        let directory = StaticDirectory {
            names: HashMap::from([("u1".to_string(), "@ann".to_string())]),
            ..Default::default()
        };
        let pipeline = pipeline(directory, Some(relay.clone()), &[]);

        pipeline
            .send(&internal("u1"), &RecipientRef::Telegram(555), "hi", "chat")
            .await
            .unwrap();

        assert!(relay.calls()[0].1.contains("@ann"));
    }
}
