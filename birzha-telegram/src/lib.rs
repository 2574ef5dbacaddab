use async_trait::async_trait;
use birzha_core::error::RelayError;
use birzha_core::recipient::RecipientRef;
use birzha_core::relay::{ChatNotification, DeliveryStatus, NotificationRelay};
use teloxide::payloads::{AnswerCallbackQuerySetters, SendMessageSetters, SetWebhookSetters};
use teloxide::prelude::Requester;
use teloxide::types::{
    AllowedUpdate, CallbackQuery, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, WebAppInfo,
};
use teloxide::{ApiError, Bot, RequestError};
use tracing::debug;
use url::Url;

pub mod webhook;

/// Telegram transport: pushes chat notifications through the Bot API and
/// performs the webhook-side bot interactions.
pub struct TelegramRelay {
    bot: Bot,
    webapp_url: Url,
}

impl TelegramRelay {
    pub fn new(token: &str, webapp_url: Url) -> Self {
        Self {
            bot: Bot::new(token),
            webapp_url,
        }
    }

    /// `{webapp}/chat/{partner}?source={source}` — the web-chat view of the
    /// conversation the notification came from.
    fn chat_link(&self, partner: &RecipientRef, source: &str) -> Url {
        let partner = partner.to_string();
        let mut url = self.webapp_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["chat", partner.as_str()]);
        }
        url.query_pairs_mut().clear().append_pair("source", source);
        url
    }

    fn open_chat_keyboard(&self, notification: &ChatNotification) -> InlineKeyboardMarkup {
        let link = self.chat_link(&notification.reply_to, &notification.source);
        InlineKeyboardMarkup::new([[InlineKeyboardButton::web_app(
            "💬 Open chat",
            WebAppInfo { url: link },
        )]])
    }

    /// `/start` greeting with the web-app entry button.
    pub async fn send_welcome(&self, chat: ChatId, first_name: &str) -> Result<(), RelayError> {
        let text = format!(
            "🚀 Welcome, {first_name}!\n\n\
             This is an order exchange where:\n\
             👨‍💻 executors find work\n\
             🧑‍💼 employers find specialists\n\n\
             Tap the button below to open the app:"
        );
        let keyboard = InlineKeyboardMarkup::new([
            vec![InlineKeyboardButton::web_app(
                "🚀 Open the exchange",
                WebAppInfo {
                    url: self.webapp_url.clone(),
                },
            )],
            vec![
                InlineKeyboardButton::callback("📊 My profile", "profile"),
                InlineKeyboardButton::callback("💬 Support", "support"),
            ],
        ]);
        self.bot
            .send_message(chat, text)
            .reply_markup(keyboard)
            .await
            .map_err(transport)?;
        Ok(())
    }

    /// Acknowledge an inline keyboard press.
    pub async fn answer_callback(&self, query: &CallbackQuery) -> Result<(), RelayError> {
        self.bot
            .answer_callback_query(query.id.clone())
            .text("✅")
            .await
            .map_err(transport)?;
        Ok(())
    }

    /// Ask the user to type their reply as the next plain message.
    pub async fn prompt_reply(&self, chat: ChatId) -> Result<(), RelayError> {
        self.bot
            .send_message(chat, "💬 Type your reply as your next message:")
            .await
            .map_err(transport)?;
        Ok(())
    }

    /// Confirm that a bot-side reply landed in the web chat.
    pub async fn confirm_relayed(&self, chat: ChatId) -> Result<(), RelayError> {
        self.bot
            .send_message(chat, "✅ Message sent!")
            .await
            .map_err(transport)?;
        Ok(())
    }

    /// Point Telegram's webhook at our intake endpoint. Only `message` and
    /// `callback_query` updates are requested.
    pub async fn register_webhook(&self, endpoint: Url) -> Result<(), RelayError> {
        debug!(%endpoint, "registering Telegram webhook");
        self.bot
            .set_webhook(endpoint)
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery])
            .await
            .map_err(transport)?;
        Ok(())
    }
}

#[async_trait]
impl NotificationRelay for TelegramRelay {
    async fn send_notification(
        &self,
        chat_id: i64,
        notification: &ChatNotification,
    ) -> Result<DeliveryStatus, RelayError> {
        let request = self
            .bot
            .send_message(ChatId(chat_id), notification.to_text())
            .reply_markup(self.open_chat_keyboard(notification));
        match request.await {
            Ok(_) => Ok(DeliveryStatus::Delivered),
            Err(e) => classify(e),
        }
    }

    async fn send_plain(&self, chat_id: i64, text: &str) -> Result<DeliveryStatus, RelayError> {
        match self.bot.send_message(ChatId(chat_id), text).await {
            Ok(_) => Ok(DeliveryStatus::Delivered),
            Err(e) => classify(e),
        }
    }
}

/// API-level rejections become `DeliveryStatus` values; anything the Bot API
/// never saw (network, serialization) is a transport fault.
fn classify(error: RequestError) -> Result<DeliveryStatus, RelayError> {
    match error {
        RequestError::Api(ApiError::ChatNotFound) => Ok(DeliveryStatus::ChatNotFound),
        RequestError::Api(api) => Ok(DeliveryStatus::Failed(api.to_string())),
        other => Err(transport(other)),
    }
}

fn transport(error: RequestError) -> RelayError {
    RelayError::Transport(Box::new(error))
}

/// Severity prefix for generic announcements.
pub fn announcement_emoji(kind: &str) -> &'static str {
    match kind {
        "info" => "ℹ️",
        "success" => "✅",
        "warning" => "⚠️",
        "error" => "❌",
        _ => "📢",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay() -> TelegramRelay {
        TelegramRelay::new("12345:TEST", Url::parse("https://app.example.com").unwrap())
    }

    #[test]
    fn chat_not_found_is_a_status_not_an_error() {
        let status = classify(RequestError::Api(ApiError::ChatNotFound)).unwrap();
        assert_eq!(status, DeliveryStatus::ChatNotFound);
    }

    #[test]
    fn other_api_rejections_are_failed_with_the_description() {
        let status = classify(RequestError::Api(ApiError::BotBlocked)).unwrap();
        assert!(matches!(status, DeliveryStatus::Failed(_)));
    }

    #[test]
    fn chat_link_points_back_into_the_conversation() {
        let link = relay().chat_link(&RecipientRef::Telegram(555), "chat");
        assert_eq!(link.as_str(), "https://app.example.com/chat/555?source=chat");
    }

    #[test]
    fn chat_link_keeps_a_base_path() {
        let relay = TelegramRelay::new(
            "12345:TEST",
            Url::parse("https://example.com/app/").unwrap(),
        );
        let link = relay.chat_link(&RecipientRef::Internal("u1".to_string()), "order");
        assert_eq!(link.as_str(), "https://example.com/app/chat/u1?source=order");
    }

    #[test]
    fn unknown_announcement_kind_gets_the_megaphone() {
        assert_eq!(announcement_emoji("info"), "ℹ️");
        assert_eq!(announcement_emoji("weird"), "📢");
    }
}
