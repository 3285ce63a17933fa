//! Append-only conversation log with placeholder resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use colloquy_common::new_id;

/// Fixed id of the provisional assistant entry shown while a reply is in
/// flight.
pub const PLACEHOLDER_ID: &str = "thinking";
pub const PLACEHOLDER_CONTENT: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One turn in the conversation. Role and timestamp are fixed at creation;
/// content is replaced at most once (placeholder resolution).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Locally-synthesized failure turn (send failed, link dropped).
    #[serde(default)]
    pub error: bool,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            error: false,
        }
    }
}

/// Ordered message log, mutated only through the transitions below and only
/// from the session task. Messages are never reordered or deleted.
pub struct Conversation {
    messages: Vec<Message>,
    /// Index of the unresolved placeholder, if any. At most one exists.
    pending: Option<usize>,
    snapshot_tx: watch::Sender<Vec<Message>>,
}

impl Conversation {
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(Vec::new());
        Self {
            messages: Vec::new(),
            pending: None,
            snapshot_tx,
        }
    }

    /// Append the user's submitted text. Returns the new message id.
    pub fn append_user(&mut self, content: impl Into<String>) -> String {
        let message = Message::new(Role::User, content);
        let id = message.id.clone();
        self.messages.push(message);
        self.publish();
        id
    }

    /// Append the sentinel assistant entry used for immediate feedback while
    /// a reply is pending. If one is already pending, its id is returned and
    /// nothing changes.
    pub fn append_placeholder(&mut self) -> String {
        if let Some(index) = self.pending {
            return self.messages[index].id.clone();
        }
        let message = Message {
            id: PLACEHOLDER_ID.into(),
            role: Role::Assistant,
            content: PLACEHOLDER_CONTENT.into(),
            timestamp: Utc::now(),
            error: false,
        };
        self.pending = Some(self.messages.len());
        self.messages.push(message);
        self.publish();
        PLACEHOLDER_ID.into()
    }

    /// Record a completed assistant turn. Resolves the pending placeholder in
    /// place (content replaced, id and position retained) when one exists,
    /// otherwise appends a new entry.
    pub fn append_assistant(&mut self, content: impl Into<String>) -> String {
        self.resolve_or_append(content, false)
    }

    /// Record a locally-synthesized failure, shaped like an assistant turn
    /// but flagged so renderers can distinguish it.
    pub fn append_error(&mut self, content: impl Into<String>) -> String {
        self.resolve_or_append(content, true)
    }

    fn resolve_or_append(&mut self, content: impl Into<String>, error: bool) -> String {
        let id = match self.pending.take() {
            Some(index) => {
                let slot = &mut self.messages[index];
                slot.content = content.into();
                slot.error = error;
                slot.id.clone()
            }
            None => {
                let mut message = Message::new(Role::Assistant, content);
                message.error = error;
                let id = message.id.clone();
                self.messages.push(message);
                id
            }
        };
        self.publish();
        id
    }

    pub fn has_pending_reply(&self) -> bool {
        self.pending.is_some()
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Message>> {
        self.snapshot_tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn publish(&self) {
        let _ = self.snapshot_tx.send(self.messages.clone());
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
