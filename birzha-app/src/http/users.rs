use super::{ApiError, HttpExtensions};
use crate::entity::user;
use axum::extract::Path;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use birzha_core::recipient::RecipientRef;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub(crate) fn get_router() -> Router {
    Router::new()
        .route("/v1/users/launch", post(launch))
        .route("/v1/users/{ref}", get(get_user))
}

#[derive(Deserialize)]
struct LaunchRequest {
    tg_id: i64,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Serialize)]
struct UserResponse {
    id: Uuid,
    tg_id: Option<i64>,
    username: Option<String>,
}

impl From<user::Model> for UserResponse {
    fn from(value: user::Model) -> Self {
        UserResponse {
            id: value.id,
            tg_id: value.tg_id,
            username: value.username,
        }
    }
}

/// First Mini-App launch: trust the Telegram-supplied identity payload and
/// upsert the user row keyed by its numeric id.
async fn launch(
    Extension(ext): Extension<HttpExtensions>,
    Json(payload): Json<LaunchRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let model = ext
        .users
        .register_launch(payload.tg_id, payload.username.as_deref())
        .await?;
    Ok(Json(model.into()))
}

/// Partner lookup for the chat header: by `tg_id` for numeric references,
/// by internal id otherwise.
async fn get_user(
    Extension(ext): Extension<HttpExtensions>,
    Path(raw): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let recipient: RecipientRef = raw
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    match ext.users.find_by_ref(&recipient).await? {
        Some(model) => Ok(Json(model.into())),
        None => Err(ApiError::NotFound),
    }
}
