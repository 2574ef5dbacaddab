use super::{ApiError, HttpExtensions};
use axum::extract::Query;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use birzha_core::recipient::{ConversationKey, RecipientRef};
use birzha_core::store::{MessageStore, StoredMessage};
use birzha_core::suppression::SuppressionReason;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

pub(crate) fn get_router() -> Router {
    Router::new()
        .route("/v1/chat/send", post(send))
        .route("/v1/chat/messages", get(messages))
        .route("/v1/chat/events", get(events))
}

#[derive(Deserialize)]
struct SendRequest {
    from: String,
    to: String,
    content: String,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Serialize)]
struct SendResponse {
    message: StoredMessage,
    /// Present when pushes for this conversation are currently disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    notifications_disabled: Option<SuppressionReason>,
}

/// Store first, then decide on the push without blocking the response.
/// A store failure is the only way this endpoint fails.
async fn send(
    Extension(ext): Extension<HttpExtensions>,
    Json(payload): Json<SendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let from: RecipientRef = parse_ref(&payload.from)?;
    let to: RecipientRef = parse_ref(&payload.to)?;
    let source = payload.source.unwrap_or_else(|| "chat".to_string());

    let message = ext.pipeline.append(&from, &to, &payload.content).await?;

    let pipeline = ext.pipeline.clone();
    let content = message.content.clone();
    let (task_from, task_to) = (from.clone(), to.clone());
    tokio::spawn(async move {
        pipeline
            .notify(&task_from, &task_to, &content, &source)
            .await;
    });

    let key = ConversationKey::new(&from, &to);
    Ok(Json(SendResponse {
        message,
        notifications_disabled: ext.pipeline.suppression().get(&key),
    }))
}

#[derive(Deserialize)]
struct PairQuery {
    a: String,
    b: String,
}

/// Conversation history. Fetching it counts as a reload and re-arms
/// notifications for the pair.
async fn messages(
    Extension(ext): Extension<HttpExtensions>,
    Query(query): Query<PairQuery>,
) -> Result<Json<Vec<StoredMessage>>, ApiError> {
    let a = parse_ref(&query.a)?;
    let b = parse_ref(&query.b)?;
    Ok(Json(ext.pipeline.reload_conversation(&a, &b).await?))
}

/// Live feed of newly appended messages for the pair, as server-sent
/// events. The subscription dies with the connection.
async fn events(
    Extension(ext): Extension<HttpExtensions>,
    Query(query): Query<PairQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let a = parse_ref(&query.a)?;
    let b = parse_ref(&query.b)?;

    let feed = ext.pipeline.store().subscribe(&a, &b);
    let stream = futures::stream::unfold(feed, |mut feed| async move {
        let message = feed.next().await?;
        let event = Event::default().json_data(&message).ok()?;
        Some((Ok::<_, Infallible>(event), feed))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn parse_ref(raw: &str) -> Result<RecipientRef, ApiError> {
    raw.parse().map_err(|e| ApiError::BadRequest(format!("{e}")))
}
