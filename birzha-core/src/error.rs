use sea_orm::DbErr;
use thiserror::Error;

/// Rejected before any persistence or network work happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("message content must not be empty")]
    EmptyContent,
    #[error("malformed recipient reference: {0:?}")]
    MalformedReference(String),
}

/// Persistence-layer failure. Fatal for the send that hit it: the message
/// was not stored and the caller must not report it as sent.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Db(#[from] DbErr),
}

/// Transport-level relay fault. API-level rejections are returned as
/// `DeliveryStatus` values, never through this type.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}
