use crate::error::RelayError;
use crate::recipient::RecipientRef;
use async_trait::async_trait;

/// Payload of a chat push notification: who wrote, what they wrote, and
/// where the conversation lives so the transport can attach a reply link.
#[derive(Debug, Clone)]
pub struct ChatNotification {
    pub sender_label: String,
    pub body: String,
    /// Originating surface, e.g. "chat" or an order reference.
    pub source: String,
    /// The participant the recipient would reply to, i.e. the sender.
    pub reply_to: RecipientRef,
}

impl ChatNotification {
    /// Rendered message text. The actionable link travels separately as a
    /// keyboard button.
    pub fn to_text(&self) -> String {
        format!(
            "💬 New message from {}:\n\n\"{}\"\n\n📍 Source: {}\n\n👆 Reply in the web app",
            self.sender_label, self.body, self.source
        )
    }
}

/// How the push API judged a delivery attempt. API-level rejections are
/// values, never errors; only transport faults surface as `RelayError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    /// The recipient blocked the bot or the chat does not exist.
    ChatNotFound,
    Failed(String),
}

#[async_trait]
pub trait NotificationRelay: Send + Sync {
    /// Push a chat notification to a resolved chat id.
    async fn send_notification(
        &self,
        chat_id: i64,
        notification: &ChatNotification,
    ) -> Result<DeliveryStatus, RelayError>;

    /// Push a bare text message without chat framing.
    async fn send_plain(&self, chat_id: i64, text: &str) -> Result<DeliveryStatus, RelayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_text_quotes_the_body_and_names_the_source() {
        let notification = ChatNotification {
            sender_label: "@ann".to_string(),
            body: "hi".to_string(),
            source: "chat".to_string(),
            reply_to: RecipientRef::Telegram(555),
        };
        let text = notification.to_text();
        assert!(text.contains("@ann"));
        assert!(text.contains("\"hi\""));
        assert!(text.contains("Source: chat"));
    }
}
