use super::HttpExtensions;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Extension, Json, Router};
use birzha_core::error::RelayError;
use birzha_core::pipeline::NO_BOT_ERROR;
use birzha_core::recipient::RecipientRef;
use birzha_core::relay::NotificationRelay;
use birzha_core::store::MessageStore;
use birzha_telegram::webhook::{callback_chat, callback_data, WebhookEvent};
use birzha_telegram::TelegramRelay;
use serde::Serialize;
use teloxide::types::{ChatId, Update};
use tracing::{debug, error, warn};

pub(crate) fn get_router() -> Router {
    Router::new()
        .route("/v1/bot/webhook", post(intake))
        .route("/v1/bot/setup", post(setup))
}

#[derive(Serialize)]
struct WebhookResponse {
    ok: bool,
}

/// Telegram update intake. Telegram retries on non-200, so every internal
/// outcome acknowledges; the one exception is a missing bot credential,
/// which is a configuration fault for this request only.
async fn intake(
    Extension(ext): Extension<HttpExtensions>,
    Json(update): Json<serde_json::Value>,
) -> (StatusCode, Json<WebhookResponse>) {
    let Some(relay) = ext.relay.clone() else {
        error!("webhook update received but no bot token is configured");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(WebhookResponse { ok: false }),
        );
    };

    let update: Update = match serde_json::from_value(update) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, "undecodable webhook update");
            return (StatusCode::OK, Json(WebhookResponse { ok: true }));
        }
    };

    if let Some(event) = WebhookEvent::classify(&update) {
        if let Err(e) = handle_event(&ext, &relay, event).await {
            warn!(error = %e, "webhook handling failed");
        }
    }
    (StatusCode::OK, Json(WebhookResponse { ok: true }))
}

async fn handle_event(
    ext: &HttpExtensions,
    relay: &TelegramRelay,
    event: WebhookEvent,
) -> Result<(), RelayError> {
    match event {
        WebhookEvent::Command {
            chat,
            first_name,
            command,
        } => {
            if command == "start" {
                relay
                    .send_welcome(chat, first_name.as_deref().unwrap_or("there"))
                    .await?;
            }
            Ok(())
        }
        WebhookEvent::Callback(query) => {
            let chat = callback_chat(&query);
            let data = callback_data(&query).to_string();
            relay.answer_callback(&query).await?;
            if data.starts_with("reply_") {
                // The actual reply arrives as the user's next plain message.
                relay.prompt_reply(chat).await?;
                return Ok(());
            }
            let response = match data.as_str() {
                "profile" => "👤 Your profile is available in the web app",
                "support" => "💬 For support, message the administrator",
                _ => "Unknown command",
            };
            relay.send_plain(chat.0, response).await?;
            Ok(())
        }
        WebhookEvent::PlainMessage { chat, text } => {
            relay_into_web_chat(ext, relay, chat, &text).await
        }
    }
}

/// A plain bot message is a reply into the sender's most recent web
/// conversation. No Telegram push goes back out for it; the web side picks
/// it up from the live feed.
async fn relay_into_web_chat(
    ext: &HttpExtensions,
    relay: &TelegramRelay,
    chat: ChatId,
    text: &str,
) -> Result<(), RelayError> {
    let sender = RecipientRef::Telegram(chat.0);

    let partner = match ext.pipeline.store().latest_partner(&sender).await {
        Ok(Some(partner)) => partner,
        Ok(None) => {
            debug!(sender = %sender, "no active conversation for bot reply");
            return Ok(());
        }
        Err(e) => {
            warn!(sender = %sender, error = %e, "active-conversation lookup failed");
            return Ok(());
        }
    };

    match ext.pipeline.append(&sender, &partner, text).await {
        Ok(_) => relay.confirm_relayed(chat).await,
        Err(e) => {
            warn!(sender = %sender, error = %e, "failed to store bot-relayed message");
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct SetupResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    webhook_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Registers this service's intake endpoint with Telegram.
async fn setup(Extension(ext): Extension<HttpExtensions>) -> Json<SetupResponse> {
    let Some(relay) = ext.relay.clone() else {
        return Json(SetupResponse {
            success: false,
            webhook_url: None,
            error: Some(NO_BOT_ERROR.to_string()),
        });
    };
    let Some(public_url) = ext.public_url.clone() else {
        return Json(SetupResponse {
            success: false,
            webhook_url: None,
            error: Some("Public URL not configured".to_string()),
        });
    };

    let endpoint = match public_url.join("v1/bot/webhook") {
        Ok(endpoint) => endpoint,
        Err(e) => {
            return Json(SetupResponse {
                success: false,
                webhook_url: None,
                error: Some(e.to_string()),
            })
        }
    };

    match relay.register_webhook(endpoint.clone()).await {
        Ok(()) => Json(SetupResponse {
            success: true,
            webhook_url: Some(endpoint.to_string()),
            error: None,
        }),
        Err(e) => Json(SetupResponse {
            success: false,
            webhook_url: None,
            error: Some(e.to_string()),
        }),
    }
}
