//! Per-conversation state: which free-text answer the bot is waiting for.

use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::types::{ChatId, UserId};

/// A value the user was asked to type in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingInput {
    ClientId,
    ApiKey,
    CommissionPercent,
    PurchasePrice { group: String },
}

/// Pending inputs keyed by `(user, chat)`. Owned by the dispatcher.
#[derive(Debug, Default)]
pub struct ConversationStore {
    pending: Mutex<HashMap<(UserId, ChatId), PendingInput>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever was pending for this conversation.
    pub async fn expect(&self, user_id: UserId, chat_id: ChatId, input: PendingInput) {
        self.pending.lock().await.insert((user_id, chat_id), input);
    }

    pub async fn pending(&self, user_id: UserId, chat_id: ChatId) -> Option<PendingInput> {
        self.pending.lock().await.get(&(user_id, chat_id)).cloned()
    }

    pub async fn clear(&self, user_id: UserId, chat_id: ChatId) -> Option<PendingInput> {
        self.pending.lock().await.remove(&(user_id, chat_id))
    }
}
