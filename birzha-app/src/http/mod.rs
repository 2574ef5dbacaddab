pub(crate) mod chat;
pub(crate) mod notify;
pub(crate) mod users;
pub(crate) mod webhook;

use crate::controllers::user::UserDbController;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json, Router};
use birzha_core::error::StoreError;
use birzha_core::pipeline::SendPipeline;
use birzha_telegram::TelegramRelay;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use url::Url;

#[derive(Clone)]
pub(crate) struct HttpExtensions {
    pub pipeline: Arc<SendPipeline>,
    pub users: Arc<UserDbController>,
    pub relay: Option<Arc<TelegramRelay>>,
    /// Externally reachable base URL of this service, for webhook setup.
    pub public_url: Option<Url>,
}

pub(crate) async fn start(bind: SocketAddr, ext: HttpExtensions) {
    // Bind everything now to catch any errors before spinning up the coroutines
    let listener = TcpListener::bind(bind).await.unwrap();

    let app = Router::new()
        .merge(chat::get_router())
        .merge(notify::get_router())
        .merge(users::get_router())
        .merge(webhook::get_router())
        .layer(Extension(ext));

    tokio::spawn(async { axum::serve(listener, app).await.unwrap() });
}

/// Errors for the chat and user endpoints. The notify and webhook endpoints
/// answer in-band instead and never use this type.
#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    NotFound,
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation(e) => ApiError::BadRequest(e.to_string()),
            StoreError::Db(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(error) => (StatusCode::BAD_REQUEST, error),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            ApiError::Internal(error) => (StatusCode::INTERNAL_SERVER_ERROR, error),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}
