use super::HttpExtensions;
use axum::routing::post;
use axum::{Extension, Json, Router};
use birzha_core::pipeline::NO_BOT_ERROR;
use birzha_core::recipient::RecipientRef;
use birzha_core::relay::{DeliveryStatus, NotificationRelay};
use birzha_core::resolver::{Resolution, UserDirectory};
use birzha_telegram::announcement_emoji;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub(crate) fn get_router() -> Router {
    Router::new()
        .route("/v1/notify", post(notify))
        .route("/v1/announce", post(announce))
}

/// Notify endpoints always answer 200; "notification not sent" and "request
/// malformed" are both in-band so the chat UI can degrade without branching
/// on the HTTP status.
#[derive(Serialize)]
struct NotifyResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl NotifyResponse {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotifyRequest {
    to_id: String,
    from_id: String,
    message: String,
    #[serde(default)]
    source: Option<String>,
}

/// Chat relay trigger: gate, resolve, push, suppress on anything but a
/// delivered outcome. The stored message (if any) is none of this
/// endpoint's business.
async fn notify(
    Extension(ext): Extension<HttpExtensions>,
    Json(payload): Json<NotifyRequest>,
) -> Json<NotifyResponse> {
    let to: RecipientRef = match payload.to_id.parse() {
        Ok(to) => to,
        Err(e) => return Json(NotifyResponse::err(e.to_string())),
    };
    let from: RecipientRef = match payload.from_id.parse() {
        Ok(from) => from,
        Err(e) => return Json(NotifyResponse::err(e.to_string())),
    };
    let source = payload.source.unwrap_or_else(|| "chat".to_string());

    let outcome = ext
        .pipeline
        .notify(&from, &to, &payload.message, &source)
        .await;
    match outcome.error_message() {
        None => Json(NotifyResponse::ok()),
        Some(error) => Json(NotifyResponse::err(error)),
    }
}

#[derive(Deserialize)]
struct AnnounceRequest {
    user_id: String,
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// Generic one-off announcement with a severity emoji, outside the chat
/// suppression machinery.
async fn announce(
    Extension(ext): Extension<HttpExtensions>,
    Json(payload): Json<AnnounceRequest>,
) -> Json<NotifyResponse> {
    let Some(relay) = ext.relay.clone() else {
        return Json(NotifyResponse::err(NO_BOT_ERROR));
    };

    let recipient: RecipientRef = match payload.user_id.parse() {
        Ok(recipient) => recipient,
        Err(e) => return Json(NotifyResponse::err(e.to_string())),
    };
    let chat_id = match ext.pipeline.directory().resolve(&recipient).await {
        Ok(Resolution::Chat(chat_id)) => chat_id,
        Ok(Resolution::Unresolvable) => {
            return Json(NotifyResponse::err("Telegram ID not found"))
        }
        Err(e) => return Json(NotifyResponse::err(e.to_string())),
    };

    let kind = payload.kind.as_deref().unwrap_or_default();
    let text = format!("{} {}", announcement_emoji(kind), payload.message);
    match relay.send_plain(chat_id, &text).await {
        Ok(DeliveryStatus::Delivered) => Json(NotifyResponse::ok()),
        Ok(DeliveryStatus::ChatNotFound) => {
            Json(NotifyResponse::err("Telegram notification failed: chat not found"))
        }
        Ok(DeliveryStatus::Failed(description)) => {
            Json(NotifyResponse::err(format!("Telegram notification failed: {description}")))
        }
        Err(e) => {
            warn!(chat_id, error = %e, "announcement transport fault");
            Json(NotifyResponse::err(e.to_string()))
        }
    }
}
