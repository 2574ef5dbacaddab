use crate::error::ValidationError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A message participant as it appears on the wire: either a numeric Telegram
/// chat id or an opaque internal user id.
///
/// Numeric parse wins: a positive decimal string is always a Telegram id,
/// even if it coincidentally matches a stored internal id. Internal ids are
/// UUIDs in practice and never look numeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecipientRef {
    Telegram(i64),
    Internal(String),
}

impl FromStr for RecipientRef {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::MalformedReference(s.to_string()));
        }
        match s.parse::<i64>() {
            Ok(id) if id > 0 => Ok(RecipientRef::Telegram(id)),
            _ => Ok(RecipientRef::Internal(s.to_string())),
        }
    }
}

impl fmt::Display for RecipientRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipientRef::Telegram(id) => write!(f, "{id}"),
            RecipientRef::Internal(id) => f.write_str(id),
        }
    }
}

impl Serialize for RecipientRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecipientRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// Order-independent key for a participant pair. `{a,b}` and `{b,a}` name
/// the same conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey(String, String);

impl ConversationKey {
    pub fn new(a: &RecipientRef, b: &RecipientRef) -> Self {
        let (a, b) = (a.to_string(), b.to_string());
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}
