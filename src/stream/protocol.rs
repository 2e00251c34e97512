//! Wire protocol for the research socket.
//!
//! Outbound frames are small serde structs. Inbound frames are JSON objects
//! discriminated by `type` (or `event`), with a payload that is either inline
//! or nested under `data`/`payload`. The research service has shipped a few
//! spellings of each kind over time, so decoding accepts aliases and
//! normalizes `camelCase`/`kebab-case` discriminators to `snake_case`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::StreamError;

/// Options offered when a feedback request carries none.
pub const DEFAULT_FEEDBACK_OPTIONS: [&str; 2] = ["approve", "reject"];

/// A named external reference attached to a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub name: String,
    pub url: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Citation {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

/// A labeled intermediate reasoning note from the research agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThoughtStep {
    #[serde(rename = "type")]
    pub step_type: String,
    pub content: String,
}

/// A tool invocation reported by the research agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// Payload of a server-emitted error event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental assistant text.
    Chunk { text: String, agent: Option<String> },
    /// Overall progress, clamped to 0..=100.
    Progress { percent: u8, detail: String },
    Citation(Citation),
    Thought(ThoughtStep),
    ToolCall(ToolCallRecord),
    /// The agent is paused until the user picks one of `options`.
    FeedbackRequest {
        options: Vec<String>,
        prompt: Option<String>,
    },
    /// End of the response. Some deployments resend the full text and the
    /// final source list here.
    Complete {
        citations: Vec<Citation>,
        final_text: Option<String>,
    },
    Error(RemoteError),
}

impl StreamEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::Progress { .. } => "progress",
            Self::Citation(_) => "citation",
            Self::Thought(_) => "thought",
            Self::ToolCall(_) => "tool_call",
            Self::FeedbackRequest { .. } => "feedback_request",
            Self::Complete { .. } => "complete",
            Self::Error(_) => "error",
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error(_))
    }
}

/// First frame sent on a fresh connection.
#[derive(Debug, Clone, Serialize)]
pub struct QueryFrame {
    pub query: String,
    pub context: QueryContext,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryContext {
    pub session_id: String,
}

impl QueryFrame {
    pub fn new(query: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            context: QueryContext {
                session_id: session_id.into(),
            },
        }
    }
}

/// Reply to a feedback request.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackFrame {
    pub feedback: String,
}

/// Kinds that keep the connection alive but carry nothing to display.
const KEEPALIVE_KINDS: &[&str] = &["ping", "pong", "heartbeat", "keepalive", "connected"];

fn is_known_kind(kind: &str) -> bool {
    matches!(
        kind,
        "chunk"
            | "content"
            | "text"
            | "text_delta"
            | "delta"
            | "token"
            | "progress"
            | "citation"
            | "source"
            | "thought"
            | "thought_step"
            | "step"
            | "tool_call"
            | "feedback_request"
            | "awaiting_feedback"
            | "interrupt"
            | "complete"
            | "completion"
            | "done"
            | "end"
            | "error"
    ) || KEEPALIVE_KINDS.contains(&kind)
}

/// Lowercase and snake_case a discriminator (`feedbackRequest`,
/// `feedback-request` and `FEEDBACK_REQUEST` all become `feedback_request`).
fn normalize_kind(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    let mut prev_lower = false;
    for ch in raw.trim().chars() {
        if ch == '-' || ch == ' ' || ch == '.' {
            out.push('_');
            prev_lower = false;
        } else if ch.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = false;
        } else {
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
            out.push(ch);
        }
    }
    out
}

/// Which field carried the discriminator. When `event` was used, `type` is
/// free to mean something else (e.g. a citation's type tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagField {
    Type,
    Event,
}

fn discriminator(frame: &Map<String, Value>) -> Option<(String, TagField)> {
    let by_type = frame.get("type").and_then(Value::as_str).map(normalize_kind);
    let by_event = frame.get("event").and_then(Value::as_str).map(normalize_kind);

    match (by_type, by_event) {
        (Some(t), _) if is_known_kind(&t) => Some((t, TagField::Type)),
        (_, Some(e)) => Some((e, TagField::Event)),
        (Some(t), None) => Some((t, TagField::Type)),
        (None, None) => None,
    }
}

fn nested<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Map<String, Value>> {
    keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_object))
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

fn number_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_f64))
}

fn clamp_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

fn citation_from(obj: &Map<String, Value>, type_is_free: bool) -> Option<Citation> {
    let url = string_field(obj, &["url", "link", "href"])?;
    let name = string_field(obj, &["name", "title", "label"]).unwrap_or_else(|| url.clone());
    let mut kind_keys = vec!["source_type", "citation_type", "kind"];
    if type_is_free {
        kind_keys.insert(0, "type");
    }
    Some(Citation {
        name,
        url,
        kind: string_field(obj, &kind_keys),
    })
}

fn citation_list(obj: &Map<String, Value>) -> Vec<Citation> {
    ["citations", "sources"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_array))
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|o| citation_from(o, true))
                .collect()
        })
        .unwrap_or_default()
}

fn feedback_options(obj: &Map<String, Value>) -> Vec<String> {
    let options: Vec<String> = obj
        .get("options")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(o) => string_field(o, &["value", "id", "label"]),
                    _ => None,
                })
                .filter(|s| !s.trim().is_empty())
                .collect()
        })
        .unwrap_or_default();

    if options.is_empty() {
        DEFAULT_FEEDBACK_OPTIONS
            .iter()
            .map(|s| s.to_string())
            .collect()
    } else {
        options
    }
}

fn remote_error(obj: &Map<String, Value>) -> RemoteError {
    let inner = nested(obj, &["error"]).unwrap_or(obj);
    let message = string_field(inner, &["message", "detail"])
        .or_else(|| string_field(obj, &["error", "message", "detail"]))
        .unwrap_or_else(|| "Unknown error".to_string());
    let code = string_field(inner, &["code", "error_code"]).or_else(|| {
        inner
            .get("code")
            .and_then(Value::as_i64)
            .map(|c| c.to_string())
    });
    let retry_after = ["retryAfter", "retry_after"]
        .iter()
        .find_map(|k| inner.get(*k).or_else(|| obj.get(*k)))
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0).ceil() as u64)));

    RemoteError {
        message,
        code,
        retry_after,
    }
}

/// Decode one inbound frame.
///
/// Returns `Ok(None)` for keepalives and kinds this client does not render.
pub fn decode_frame(raw: &str) -> Result<Option<StreamEvent>, StreamError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| StreamError::Malformed(e.to_string()))?;
    let Value::Object(frame) = value else {
        return Err(StreamError::Malformed("expected a JSON object".to_string()));
    };
    let (kind, tag) = discriminator(&frame)
        .ok_or_else(|| StreamError::Malformed("missing type/event discriminator".to_string()))?;

    let payload = nested(&frame, &["data", "payload"]).unwrap_or(&frame);
    // Inline payloads share their object with the discriminator.
    let type_is_free = !std::ptr::eq(payload, &frame) || tag == TagField::Event;

    let event = match kind.as_str() {
        "chunk" | "content" | "text" | "text_delta" | "delta" | "token" => {
            let text = frame
                .get("data")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| string_field(payload, &["content", "text", "chunk", "delta", "token"]))
                .unwrap_or_default();
            StreamEvent::Chunk {
                text,
                agent: string_field(payload, &["agent", "agent_name"]),
            }
        }
        "progress" => StreamEvent::Progress {
            percent: number_field(payload, &["progress", "percent", "percentage", "value"])
                .map(clamp_percent)
                .unwrap_or(0),
            detail: string_field(payload, &["detail", "message", "status", "step"])
                .unwrap_or_default(),
        },
        "citation" | "source" => {
            let (obj, free) = match nested(payload, &["citation", "source"]) {
                Some(inner) => (inner, true),
                None => (payload, type_is_free),
            };
            match citation_from(obj, free) {
                Some(citation) => StreamEvent::Citation(citation),
                None => {
                    return Err(StreamError::Malformed(
                        "citation frame without a url".to_string(),
                    ))
                }
            }
        }
        "thought" | "thought_step" | "step" => {
            let obj = nested(payload, &["thought", "step"]).unwrap_or(payload);
            let mut type_keys = vec!["step_type", "phase", "kind"];
            if type_is_free || !std::ptr::eq(obj, payload) {
                type_keys.insert(0, "type");
            }
            StreamEvent::Thought(ThoughtStep {
                step_type: string_field(obj, &type_keys).unwrap_or_else(|| "thought".to_string()),
                content: string_field(obj, &["content", "text", "thought", "message"])
                    .unwrap_or_default(),
            })
        }
        "tool_call" => {
            let obj = nested(payload, &["tool_call", "tool"]).unwrap_or(payload);
            let Some(name) = string_field(obj, &["name", "tool_name", "tool"]) else {
                return Err(StreamError::Malformed(
                    "tool_call frame without a name".to_string(),
                ));
            };
            StreamEvent::ToolCall(ToolCallRecord {
                name,
                arguments: ["arguments", "args", "input"]
                    .iter()
                    .find_map(|k| obj.get(*k))
                    .cloned(),
                result: string_field(obj, &["result", "output"]),
            })
        }
        "feedback_request" | "awaiting_feedback" | "interrupt" => StreamEvent::FeedbackRequest {
            options: feedback_options(payload),
            prompt: string_field(payload, &["message", "prompt", "question"]),
        },
        "complete" | "completion" | "done" | "end" => StreamEvent::Complete {
            citations: citation_list(payload),
            final_text: string_field(payload, &["content", "text", "final"]),
        },
        "error" => StreamEvent::Error(remote_error(payload)),
        k if KEEPALIVE_KINDS.contains(&k) => return Ok(None),
        other => {
            tracing::debug!(kind = other, "Skipping unrecognized frame kind");
            return Ok(None);
        }
    };

    Ok(Some(event))
}
