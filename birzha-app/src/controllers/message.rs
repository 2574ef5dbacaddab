use crate::entity::message;
use crate::entity::prelude::Message;
use async_trait::async_trait;
use birzha_core::error::StoreError;
use birzha_core::recipient::RecipientRef;
use birzha_core::store::{
    validate_content, ConversationFeed, MessageFanout, MessageStore, StoredMessage,
};
use chrono::{TimeZone, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};
use uuid::Uuid;

/// sea-orm `MessageStore`. Appends are single atomic inserts; no multi-row
/// invariant spans the table.
pub struct MessageDbController {
    db: DatabaseConnection,
    fanout: MessageFanout,
}

impl MessageDbController {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            fanout: MessageFanout::default(),
        }
    }

    fn pair_condition(a: &RecipientRef, b: &RecipientRef) -> Condition {
        let (a, b) = (a.to_string(), b.to_string());
        Condition::any()
            .add(
                Condition::all()
                    .add(message::Column::FromRef.eq(a.clone()))
                    .add(message::Column::ToRef.eq(b.clone())),
            )
            .add(
                Condition::all()
                    .add(message::Column::FromRef.eq(b))
                    .add(message::Column::ToRef.eq(a)),
            )
    }
}

fn to_stored(model: message::Model) -> StoredMessage {
    StoredMessage {
        id: model.id,
        from: model.from_ref.parse().unwrap(),
        to: model.to_ref.parse().unwrap(),
        content: model.content,
        created_at: Utc.from_utc_datetime(&model.created_at),
    }
}

#[async_trait]
impl MessageStore for MessageDbController {
    async fn append(
        &self,
        from: &RecipientRef,
        to: &RecipientRef,
        content: &str,
    ) -> Result<StoredMessage, StoreError> {
        let content = validate_content(content)?;
        let model = message::ActiveModel {
            id: Set(Uuid::now_v7()),
            from_ref: Set(from.to_string()),
            to_ref: Set(to.to_string()),
            content: Set(content.to_string()),
            created_at: Set(Utc::now().naive_utc()),
        };
        let stored = to_stored(model.insert(&self.db).await?);
        self.fanout.publish(&stored);
        Ok(stored)
    }

    async fn list_conversation(
        &self,
        a: &RecipientRef,
        b: &RecipientRef,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        Ok(Message::find()
            .filter(Self::pair_condition(a, b))
            .order_by_asc(message::Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(to_stored)
            .collect())
    }

    async fn latest_partner(
        &self,
        participant: &RecipientRef,
    ) -> Result<Option<RecipientRef>, StoreError> {
        let raw = participant.to_string();
        let latest = Message::find()
            .filter(
                Condition::any()
                    .add(message::Column::FromRef.eq(raw.clone()))
                    .add(message::Column::ToRef.eq(raw.clone())),
            )
            .order_by_desc(message::Column::CreatedAt)
            .one(&self.db)
            .await?;

        Ok(latest.map(|m| {
            if m.from_ref == raw {
                m.to_ref.parse().unwrap()
            } else {
                m.from_ref.parse().unwrap()
            }
        }))
    }

    fn subscribe(&self, a: &RecipientRef, b: &RecipientRef) -> ConversationFeed {
        self.fanout.subscribe(a, b)
    }
}
