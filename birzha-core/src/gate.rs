use crate::recipient::RecipientRef;
use std::collections::HashSet;

/// Short-circuits the relay for recipients known to be undeliverable.
///
/// The deny-list is injected at construction and matched against the literal
/// string form of the reference. The check runs before any resolution or
/// network work.
#[derive(Debug, Clone, Default)]
pub struct NotificationGate {
    deny: HashSet<String>,
}

impl NotificationGate {
    pub fn new(deny: impl IntoIterator<Item = String>) -> Self {
        Self {
            deny: deny.into_iter().collect(),
        }
    }

    pub fn should_attempt(&self, recipient: &RecipientRef) -> bool {
        !self.deny.contains(&recipient.to_string())
    }
}
