//! Ordered conversation transcript with write-through persistence.

use thiserror::Error;

use super::message::{Message, MessagePatch};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Message not found: {0}")]
    UnknownMessage(String),

    #[error("Message {0} is final and cannot be changed")]
    Frozen(String),

    #[error("Invalid conversation id: {0}")]
    InvalidId(String),

    /// The backend holds `len` messages and cannot store one at `position`.
    #[error("Cannot save message at position {position}: backend holds {len}")]
    PositionGap { position: usize, len: usize },
}

/// Durable home for a transcript (database, local cache, ...).
pub trait TranscriptBackend {
    /// Short label for logs.
    fn name(&self) -> &'static str;

    /// Insert or replace the message at `position`.
    fn save(&self, conversation_id: &str, position: usize, message: &Message)
        -> Result<(), StoreError>;

    /// Messages in order; empty if the conversation is unknown.
    fn load(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError>;

    fn clear(&self, conversation_id: &str) -> Result<(), StoreError>;
}

/// In-memory transcript for one conversation.
///
/// Mutations are applied in memory first, then written through to every
/// backend. A backend failure is logged and does not undo the in-memory
/// change, so the cache can keep working while the database is unreachable
/// and vice versa.
pub struct TranscriptStore<'a> {
    conversation_id: String,
    messages: Vec<Message>,
    backends: Vec<Box<dyn TranscriptBackend + 'a>>,
}

impl<'a> TranscriptStore<'a> {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            messages: Vec::new(),
            backends: Vec::new(),
        }
    }

    pub fn with_backend(mut self, backend: impl TranscriptBackend + 'a) -> Self {
        self.backends.push(Box::new(backend));
        self
    }

    /// Restore from the first backend that has this conversation.
    pub fn restore(&mut self) -> Result<usize, StoreError> {
        let mut last_err = None;
        for backend in &self.backends {
            match backend.load(&self.conversation_id) {
                Ok(messages) if !messages.is_empty() => {
                    tracing::debug!(
                        backend = backend.name(),
                        count = messages.len(),
                        "Restored transcript"
                    );
                    self.messages = messages;
                    return Ok(self.messages.len());
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(backend = backend.name(), error = %e, "Failed to load transcript");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) if self.messages.is_empty() => Err(e),
            _ => Ok(self.messages.len()),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    fn persist(&self, position: usize) {
        let message = &self.messages[position];
        for backend in &self.backends {
            let result = match backend.save(&self.conversation_id, position, message) {
                Err(StoreError::PositionGap { len, .. }) => {
                    tracing::debug!(
                        backend = backend.name(),
                        from = len,
                        to = position,
                        "Backfilling missing messages"
                    );
                    self.backfill(backend.as_ref(), len, position)
                }
                other => other,
            };
            if let Err(e) = result {
                tracing::warn!(
                    backend = backend.name(),
                    message_id = %message.id,
                    error = %e,
                    "Failed to persist message"
                );
            }
        }
    }

    /// Write positions `from..=to` so the backend matches memory again.
    fn backfill(
        &self,
        backend: &dyn TranscriptBackend,
        from: usize,
        to: usize,
    ) -> Result<(), StoreError> {
        for (position, message) in self.messages.iter().enumerate().take(to + 1).skip(from) {
            backend.save(&self.conversation_id, position, message)?;
        }
        Ok(())
    }

    /// Append at the end. Returns the message id.
    pub fn append(&mut self, message: Message) -> String {
        let id = message.id.clone();
        self.messages.push(message);
        self.persist(self.messages.len() - 1);
        id
    }

    /// Patch a message in place.
    pub fn update(&mut self, id: &str, patch: MessagePatch) -> Result<&Message, StoreError> {
        let position = self
            .messages
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| StoreError::UnknownMessage(id.to_string()))?;

        let message = &mut self.messages[position];
        if message.is_frozen() {
            return Err(StoreError::Frozen(id.to_string()));
        }
        patch.apply_to(message);
        self.persist(position);
        Ok(&self.messages[position])
    }

    /// Drop the whole conversation.
    pub fn clear(&mut self) {
        self.messages.clear();
        for backend in &self.backends {
            if let Err(e) = backend.clear(&self.conversation_id) {
                tracing::warn!(backend = backend.name(), error = %e, "Failed to clear transcript");
            }
        }
    }
}
