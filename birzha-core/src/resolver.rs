use crate::error::StoreError;
use crate::recipient::RecipientRef;
use async_trait::async_trait;

/// Outcome of mapping a recipient reference to a Telegram chat id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Chat(i64),
    /// No user, or the user never attached a Telegram id.
    Unresolvable,
}

/// Lookup surface over the user table.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Telegram id stored for an opaque internal user id, if any.
    async fn telegram_id_for(&self, internal_id: &str) -> Result<Option<i64>, StoreError>;

    /// Display label for a participant, e.g. `@username`.
    async fn display_name(&self, recipient: &RecipientRef) -> Result<Option<String>, StoreError>;

    /// Numeric references are already chat ids and resolve without touching
    /// the store; opaque references cost exactly one lookup.
    async fn resolve(&self, recipient: &RecipientRef) -> Result<Resolution, StoreError> {
        match recipient {
            RecipientRef::Telegram(id) => Ok(Resolution::Chat(*id)),
            RecipientRef::Internal(id) => Ok(match self.telegram_id_for(id).await? {
                Some(tg_id) => Resolution::Chat(tg_id),
                None => Resolution::Unresolvable,
            }),
        }
    }
}
