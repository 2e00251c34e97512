//! Chat message types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stream::{Citation, ToolCallRecord};

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Where an assistant message stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageMarker {
    Complete,
    /// Paused on the feedback gate.
    AwaitingFeedback,
    /// Cancelled by the user.
    Interrupted,
    /// Replaced by fallback text after an error.
    Failed,
}

impl MessageMarker {
    /// Frozen messages reject further updates.
    pub fn is_final(&self) -> bool {
        !matches!(self, MessageMarker::AwaitingFeedback)
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<MessageMarker>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feedback_options: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            chunks: vec![],
            agent: None,
            marker: None,
            feedback_options: vec![],
            tool_calls: vec![],
            citations: vec![],
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::User, content.into());
        msg.marker = Some(MessageMarker::Complete);
        msg
    }

    /// Empty assistant placeholder, filled in when the stream ends.
    pub fn assistant_placeholder() -> Self {
        Self::new(Role::Assistant, String::new())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Assistant, content.into());
        msg.marker = Some(MessageMarker::Complete);
        msg
    }

    /// Still being streamed into.
    pub fn is_pending(&self) -> bool {
        self.marker.is_none()
    }

    pub fn is_frozen(&self) -> bool {
        self.marker.map(|m| m.is_final()).unwrap_or(false)
    }
}

/// Partial update applied by [`TranscriptStore::update`](super::TranscriptStore::update).
#[derive(Debug, Clone, Default)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub chunks: Option<Vec<String>>,
    pub agent: Option<String>,
    pub marker: Option<MessageMarker>,
    pub feedback_options: Option<Vec<String>>,
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    pub citations: Option<Vec<Citation>>,
}

impl MessagePatch {
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn marker(mut self, marker: MessageMarker) -> Self {
        self.marker = Some(marker);
        self
    }

    pub(crate) fn apply_to(self, msg: &mut Message) {
        if let Some(content) = self.content {
            msg.content = content;
        }
        if let Some(chunks) = self.chunks {
            msg.chunks = chunks;
        }
        if self.agent.is_some() {
            msg.agent = self.agent;
        }
        if self.marker.is_some() {
            msg.marker = self.marker;
        }
        if let Some(options) = self.feedback_options {
            msg.feedback_options = options;
        }
        if let Some(calls) = self.tool_calls {
            msg.tool_calls = calls;
        }
        if let Some(citations) = self.citations {
            msg.citations = citations;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_is_frozen() {
        let msg = Message::user("Is a cat cafe viable in Oslo?");
        assert_eq!(msg.role, Role::User);
        assert!(msg.is_frozen());
        assert!(!msg.is_pending());
    }

    #[test]
    fn test_placeholder_is_pending() {
        let msg = Message::assistant_placeholder();
        assert!(msg.is_pending());
        assert!(!msg.is_frozen());
        assert!(msg.content.is_empty());
    }

    #[test]
    fn test_awaiting_feedback_is_not_final() {
        assert!(!MessageMarker::AwaitingFeedback.is_final());
        assert!(MessageMarker::Interrupted.is_final());
    }

    #[test]
    fn test_role_round_trip_via_str() {
        assert_eq!("Assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert_eq!(Role::User.to_string(), "user");
        assert!("system".parse::<Role>().is_err());
    }

    #[test]
    fn test_patch_only_touches_set_fields() {
        let mut msg = Message::assistant_placeholder();
        msg.agent = Some("analyst".to_string());

        MessagePatch::default()
            .content("Final answer")
            .marker(MessageMarker::Complete)
            .apply_to(&mut msg);

        assert_eq!(msg.content, "Final answer");
        assert_eq!(msg.agent.as_deref(), Some("analyst"));
        assert_eq!(msg.marker, Some(MessageMarker::Complete));
    }

    #[test]
    fn test_serialization_skips_empty_optionals() {
        let msg = Message::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["marker"], "complete");
        assert!(json.get("citations").is_none());
        assert!(json.get("agent").is_none());
    }
}
