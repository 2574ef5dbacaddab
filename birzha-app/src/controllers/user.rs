use crate::entity::prelude::User;
use crate::entity::user;
use async_trait::async_trait;
use birzha_core::error::StoreError;
use birzha_core::recipient::RecipientRef;
use birzha_core::resolver::UserDirectory;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::info;
use uuid::Uuid;

pub struct UserDbController {
    db: DatabaseConnection,
}

impl UserDbController {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// First-launch upsert keyed by the immutable Telegram id. The username
    /// is refreshed on every launch.
    pub async fn register_launch(
        &self,
        tg_id: i64,
        username: Option<&str>,
    ) -> Result<user::Model, StoreError> {
        let existing = User::find()
            .filter(user::Column::TgId.eq(tg_id))
            .one(&self.db)
            .await?;

        match existing {
            Some(model) => {
                if model.username.as_deref() == username {
                    return Ok(model);
                }
                let mut am = user::ActiveModel::from(model);
                am.username = Set(username.map(str::to_owned));
                Ok(am.update(&self.db).await?)
            }
            None => {
                info!(tg_id, "registering user on first launch");
                let am = user::ActiveModel {
                    id: Set(Uuid::now_v7()),
                    tg_id: Set(Some(tg_id)),
                    username: Set(username.map(str::to_owned)),
                    created_at: Set(Utc::now().naive_utc()),
                };
                Ok(am.insert(&self.db).await?)
            }
        }
    }

    /// Partner lookup: numeric references match `tg_id`, opaque ones the
    /// internal id. A non-UUID opaque reference cannot match a row.
    pub async fn find_by_ref(
        &self,
        recipient: &RecipientRef,
    ) -> Result<Option<user::Model>, StoreError> {
        Ok(match recipient {
            RecipientRef::Telegram(tg_id) => {
                User::find()
                    .filter(user::Column::TgId.eq(*tg_id))
                    .one(&self.db)
                    .await?
            }
            RecipientRef::Internal(id) => match Uuid::parse_str(id) {
                Ok(id) => User::find_by_id(id).one(&self.db).await?,
                Err(_) => None,
            },
        })
    }
}

#[async_trait]
impl UserDirectory for UserDbController {
    async fn telegram_id_for(&self, internal_id: &str) -> Result<Option<i64>, StoreError> {
        let Ok(id) = Uuid::parse_str(internal_id) else {
            return Ok(None);
        };
        Ok(User::find_by_id(id)
            .one(&self.db)
            .await?
            .and_then(|u| u.tg_id))
    }

    async fn display_name(&self, recipient: &RecipientRef) -> Result<Option<String>, StoreError> {
        Ok(self
            .find_by_ref(recipient)
            .await?
            .and_then(|u| u.username)
            .map(|name| format!("@{name}")))
    }
}
