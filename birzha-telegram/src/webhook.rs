use teloxide::types::{CallbackQuery, ChatId, Update, UpdateKind};

/// One inbound Telegram update, classified once at the intake boundary.
/// Update kinds the bot does not react to classify to `None`.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    /// `/command`, leading slash stripped, arguments and `@botname` dropped.
    Command {
        chat: ChatId,
        first_name: Option<String>,
        command: String,
    },
    /// Ordinary text, relayed into the sender's active web chat.
    PlainMessage { chat: ChatId, text: String },
    /// Inline keyboard press. The raw query is kept for the acknowledgement
    /// call; `callback_chat`/`callback_data` read the interesting parts.
    Callback(Box<CallbackQuery>),
}

impl WebhookEvent {
    pub fn classify(update: &Update) -> Option<Self> {
        match &update.kind {
            UpdateKind::Message(message) => {
                let text = message.text()?.trim();
                if text.is_empty() {
                    return None;
                }
                match text.strip_prefix('/') {
                    Some(rest) => {
                        let command = rest
                            .split_whitespace()
                            .next()
                            .unwrap_or_default()
                            .split('@')
                            .next()
                            .unwrap_or_default();
                        Some(WebhookEvent::Command {
                            chat: message.chat.id,
                            first_name: message.chat.first_name().map(str::to_owned),
                            command: command.to_string(),
                        })
                    }
                    None => Some(WebhookEvent::PlainMessage {
                        chat: message.chat.id,
                        text: text.to_string(),
                    }),
                }
            }
            UpdateKind::CallbackQuery(query) => {
                Some(WebhookEvent::Callback(Box::new(query.clone())))
            }
            _ => None,
        }
    }
}

/// The private chat to answer a callback in. Button presses always come
/// from a user, so their own chat is the reply target.
pub fn callback_chat(query: &CallbackQuery) -> ChatId {
    ChatId(query.from.id.0 as i64)
}

pub fn callback_data(query: &CallbackQuery) -> &str {
    query.data.as_deref().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(value: serde_json::Value) -> Update {
        // Route through `from_str`: teloxide's custom `Update` deserializer
        // mis-handles `serde_json::from_value` (folding the real kind into its
        // `Error` catch-all), whereas the webhook's production path deserializes
        // from the raw request bytes just like this.
        serde_json::from_str(&value.to_string()).expect("valid Telegram update")
    }

    fn message_update(text: &str) -> Update {
        update(serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "date": 1700000000,
                "chat": {"id": 555, "type": "private", "first_name": "Ann"},
                "from": {"id": 555, "is_bot": false, "first_name": "Ann"},
                "text": text
            }
        }))
    }

    #[test]
    fn start_command_is_a_command_event() {
        match WebhookEvent::classify(&message_update("/start")) {
            Some(WebhookEvent::Command {
                chat,
                first_name,
                command,
            }) => {
                assert_eq!(chat, ChatId(555));
                assert_eq!(first_name.as_deref(), Some("Ann"));
                assert_eq!(command, "start");
            }
            other => panic!("expected a command event, got {other:?}"),
        }
    }

    #[test]
    fn command_arguments_and_bot_suffix_are_dropped() {
        match WebhookEvent::classify(&message_update("/start@birzha_bot deep-link")) {
            Some(WebhookEvent::Command { command, .. }) => assert_eq!(command, "start"),
            other => panic!("expected a command event, got {other:?}"),
        }
    }

    #[test]
    fn ordinary_text_is_a_plain_message() {
        match WebhookEvent::classify(&message_update("  hello there ")) {
            Some(WebhookEvent::PlainMessage { chat, text }) => {
                assert_eq!(chat, ChatId(555));
                assert_eq!(text, "hello there");
            }
            other => panic!("expected a plain message, got {other:?}"),
        }
    }

    #[test]
    fn callback_presses_carry_their_data() {
        let update = update(serde_json::json!({
            "update_id": 2,
            "callback_query": {
                "id": "cb1",
                "from": {"id": 777, "is_bot": false, "first_name": "Bob"},
                "chat_instance": "ci-1",
                "data": "profile"
            }
        }));
        match WebhookEvent::classify(&update) {
            Some(WebhookEvent::Callback(query)) => {
                assert_eq!(callback_data(&query), "profile");
                assert_eq!(callback_chat(&query), ChatId(777));
            }
            other => panic!("expected a callback event, got {other:?}"),
        }
    }

    #[test]
    fn non_text_updates_are_ignored() {
        let update = update(serde_json::json!({
            "update_id": 3,
            "message": {
                "message_id": 11,
                "date": 1700000000,
                "chat": {"id": 555, "type": "private", "first_name": "Ann"},
                "from": {"id": 555, "is_bot": false, "first_name": "Ann"},
                "photo": [{"file_id": "f", "file_unique_id": "fu", "width": 1, "height": 1}]
            }
        }));
        assert!(WebhookEvent::classify(&update).is_none());
    }
}
