//! UI-agnostic render events.

use serde::{Deserialize, Serialize};

use crate::stream::{Citation, ThoughtStep, ToolCallRecord};

/// Message severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

/// Plain status line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub level: Level,
    pub text: String,
}

/// How a turn ended, as shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnEnd {
    Completed {
        citations: Vec<Citation>,
    },
    Failed {
        message: String,
        fallback: String,
        recoverable: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_after: Option<u64>,
    },
    Interrupted,
}

/// Events published by a conversation for renderers to consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    Notice(Notice),
    /// A user message was added to the transcript.
    UserMessage { id: String, content: String },
    /// The assistant placeholder was created and the query sent.
    TurnStarted { message_id: String },
    TextDelta { text: String },
    Progress { percent: u8, detail: String },
    // Struct variants: the payloads carry their own `type` fields.
    Citation { citation: Citation },
    Thought { step: ThoughtStep },
    ToolCall { call: ToolCallRecord },
    FeedbackRequested {
        options: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
    },
    FeedbackSent { choice: String },
    TurnEnded { message_id: String, end: TurnEnd },
}

impl UiEvent {
    pub fn info(text: impl Into<String>) -> Self {
        Self::Notice(Notice {
            level: Level::Info,
            text: text.into(),
        })
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::Notice(Notice {
            level: Level::Success,
            text: text.into(),
        })
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::Notice(Notice {
            level: Level::Warning,
            text: text.into(),
        })
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::Notice(Notice {
            level: Level::Error,
            text: text.into(),
        })
    }

    pub fn text_delta(text: &str) -> Self {
        Self::TextDelta {
            text: text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_constructors() {
        match UiEvent::warning("careful") {
            UiEvent::Notice(n) => {
                assert_eq!(n.level, Level::Warning);
                assert_eq!(n.text, "careful");
            }
            other => panic!("Expected Notice, got {:?}", other),
        }
    }

    #[test]
    fn test_serialize_tagged() {
        let json = serde_json::to_value(UiEvent::text_delta("Hi")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "text_delta", "text": "Hi"}));

        let json = serde_json::to_value(UiEvent::TurnEnded {
            message_id: "m1".to_string(),
            end: TurnEnd::Interrupted,
        })
        .unwrap();
        assert_eq!(json["end"]["outcome"], "interrupted");
    }
}
