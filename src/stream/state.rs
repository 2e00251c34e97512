//! Display state accumulated from stream events.

use super::feedback::{FeedbackError, FeedbackGate, FeedbackReply};
use super::protocol::{Citation, StreamEvent, ThoughtStep, ToolCallRecord};
use super::StreamError;

/// What [`StreamingState::apply`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Updated,
    /// Event arrived after the stream was frozen, or was a duplicate.
    Ignored,
    /// The server is waiting on the feedback gate.
    AwaitingFeedback,
    Completed,
    Failed,
}

/// Transient, per-query view of the response being streamed.
///
/// Displayed text only ever grows while streaming. A completion or error
/// freezes every field until the next [`begin`](Self::begin).
#[derive(Debug, Default)]
pub struct StreamingState {
    streaming: bool,
    complete: bool,
    frozen: bool,
    text: String,
    chunks: Vec<String>,
    agent: Option<String>,
    citations: Vec<Citation>,
    progress: u8,
    progress_detail: String,
    thoughts: Vec<ThoughtStep>,
    tool_calls: Vec<ToolCallRecord>,
    gate: FeedbackGate,
    error: Option<StreamError>,
}

impl StreamingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a fresh query and mark it as streaming.
    pub fn begin(&mut self) {
        *self = Self {
            streaming: true,
            ..Self::default()
        };
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_waiting_for_feedback(&self) -> bool {
        self.gate.is_awaiting()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Chunk payloads in arrival order.
    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    /// Last agent that tagged a chunk.
    pub fn agent(&self) -> Option<&str> {
        self.agent.as_deref()
    }

    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn progress_detail(&self) -> &str {
        &self.progress_detail
    }

    pub fn thoughts(&self) -> &[ThoughtStep] {
        &self.thoughts
    }

    pub fn tool_calls(&self) -> &[ToolCallRecord] {
        &self.tool_calls
    }

    pub fn gate(&self) -> &FeedbackGate {
        &self.gate
    }

    pub(crate) fn gate_mut(&mut self) -> &mut FeedbackGate {
        &mut self.gate
    }

    pub fn feedback_options(&self) -> &[String] {
        self.gate.options()
    }

    pub fn error(&self) -> Option<&StreamError> {
        self.error.as_ref()
    }

    /// Append a citation unless one with the same URL is already present.
    fn push_citation(&mut self, citation: Citation) -> bool {
        if self.citations.iter().any(|c| c.url == citation.url) {
            return false;
        }
        self.citations.push(citation);
        true
    }

    /// Fold one event into the state.
    pub fn apply(&mut self, event: &StreamEvent) -> Applied {
        if self.frozen {
            tracing::debug!(kind = event.kind(), "Ignoring event after stream ended");
            return Applied::Ignored;
        }

        match event {
            StreamEvent::Chunk { text, agent } => {
                self.text.push_str(text);
                self.chunks.push(text.clone());
                if agent.is_some() {
                    self.agent = agent.clone();
                }
                Applied::Updated
            }
            StreamEvent::Progress { percent, detail } => {
                self.progress = (*percent).min(100);
                self.progress_detail = detail.clone();
                Applied::Updated
            }
            StreamEvent::Citation(citation) => {
                if self.push_citation(citation.clone()) {
                    Applied::Updated
                } else {
                    tracing::debug!(url = %citation.url, "Dropping duplicate citation");
                    Applied::Ignored
                }
            }
            StreamEvent::Thought(step) => {
                self.thoughts.push(step.clone());
                Applied::Updated
            }
            StreamEvent::ToolCall(call) => {
                self.tool_calls.push(call.clone());
                Applied::Updated
            }
            StreamEvent::FeedbackRequest { options, prompt } => {
                self.gate.request(options.clone(), prompt.clone());
                Applied::AwaitingFeedback
            }
            StreamEvent::Complete {
                citations,
                final_text,
            } => {
                for citation in citations {
                    self.push_citation(citation.clone());
                }
                if self.text.is_empty() {
                    if let Some(full) = final_text {
                        self.text.push_str(full);
                    }
                }
                self.streaming = false;
                self.complete = true;
                self.frozen = true;
                self.gate.reset();
                Applied::Completed
            }
            StreamEvent::Error(err) => {
                self.fail(StreamError::remote(
                    err.message.clone(),
                    err.code.clone(),
                    err.retry_after,
                ));
                Applied::Failed
            }
        }
    }

    /// Answer the pending feedback request.
    pub fn reply_feedback(&mut self, choice: &str) -> Result<FeedbackReply, FeedbackError> {
        self.gate.reply(choice)
    }

    /// End the stream with an error. Accumulated text is kept as-is.
    pub fn fail(&mut self, error: StreamError) {
        if self.frozen {
            tracing::debug!(%error, "Stream already ended; dropping late error");
            return;
        }
        self.streaming = false;
        self.frozen = true;
        self.gate.reset();
        self.error = Some(error);
    }

    /// End the stream because the caller cancelled it.
    pub fn interrupt(&mut self) {
        if self.frozen {
            return;
        }
        self.streaming = false;
        self.frozen = true;
        self.gate.reset();
    }

    /// Whether the stream has ended, by any path.
    pub fn is_finished(&self) -> bool {
        self.frozen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::protocol::RemoteError;

    fn chunk(text: &str) -> StreamEvent {
        StreamEvent::Chunk {
            text: text.to_string(),
            agent: None,
        }
    }

    fn complete() -> StreamEvent {
        StreamEvent::Complete {
            citations: vec![],
            final_text: None,
        }
    }

    fn started() -> StreamingState {
        let mut state = StreamingState::new();
        state.begin();
        state
    }

    #[test]
    fn test_chunks_concatenate_in_order() {
        let mut state = started();
        let parts = ["The ", "market ", "is ", "crowded."];
        let mut last_len = 0;
        for part in parts {
            assert_eq!(state.apply(&chunk(part)), Applied::Updated);
            assert!(state.text().len() >= last_len);
            last_len = state.text().len();
        }
        assert_eq!(state.text(), parts.concat());
        assert_eq!(state.chunks().len(), 4);
    }

    #[test]
    fn test_hello_scenario() {
        let mut state = started();
        state.apply(&chunk("Hi"));
        state.apply(&chunk(" there"));
        assert_eq!(state.apply(&complete()), Applied::Completed);

        assert_eq!(state.text(), "Hi there");
        assert!(!state.is_streaming());
        assert!(state.is_complete());
    }

    #[test]
    fn test_completion_freezes_text() {
        let mut state = started();
        state.apply(&chunk("done"));
        state.apply(&complete());

        assert_eq!(state.apply(&chunk(" more")), Applied::Ignored);
        assert_eq!(
            state.apply(&StreamEvent::Citation(Citation::new("late", "https://late"))),
            Applied::Ignored
        );
        assert_eq!(state.text(), "done");
        assert!(state.citations().is_empty());
    }

    #[test]
    fn test_duplicate_citation_urls_are_dropped() {
        let mut state = started();
        let first = Citation::new("Census", "https://census.gov");
        let again = Citation::new("US Census Bureau", "https://census.gov");

        assert_eq!(state.apply(&StreamEvent::Citation(first)), Applied::Updated);
        assert_eq!(state.apply(&StreamEvent::Citation(again)), Applied::Ignored);
        assert_eq!(state.citations().len(), 1);
        assert_eq!(state.citations()[0].name, "Census");
    }

    #[test]
    fn test_completion_citations_are_merged_and_deduplicated() {
        let mut state = started();
        state.apply(&StreamEvent::Citation(Citation::new("A", "https://a")));
        state.apply(&StreamEvent::Complete {
            citations: vec![Citation::new("A again", "https://a"), Citation::new("B", "https://b")],
            final_text: None,
        });
        let urls: Vec<&str> = state.citations().iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a", "https://b"]);
    }

    #[test]
    fn test_final_text_only_fills_empty_transcript() {
        let mut state = started();
        state.apply(&StreamEvent::Complete {
            citations: vec![],
            final_text: Some("Full answer".to_string()),
        });
        assert_eq!(state.text(), "Full answer");

        let mut state = started();
        state.apply(&chunk("Streamed"));
        state.apply(&StreamEvent::Complete {
            citations: vec![],
            final_text: Some("Different".to_string()),
        });
        assert_eq!(state.text(), "Streamed");
    }

    #[test]
    fn test_progress_and_thoughts() {
        let mut state = started();
        state.apply(&StreamEvent::Progress {
            percent: 40,
            detail: "Analyzing competitors".to_string(),
        });
        state.apply(&StreamEvent::Thought(ThoughtStep {
            step_type: "plan".to_string(),
            content: "Check demand".to_string(),
        }));
        state.apply(&StreamEvent::Thought(ThoughtStep {
            step_type: "search".to_string(),
            content: "Query trends".to_string(),
        }));

        assert_eq!(state.progress(), 40);
        assert_eq!(state.progress_detail(), "Analyzing competitors");
        let kinds: Vec<&str> = state.thoughts().iter().map(|t| t.step_type.as_str()).collect();
        assert_eq!(kinds, vec!["plan", "search"]);
    }

    #[test]
    fn test_waiting_flag_tracks_gate() {
        let mut state = started();
        assert!(!state.is_waiting_for_feedback());

        let applied = state.apply(&StreamEvent::FeedbackRequest {
            options: vec!["approve".to_string(), "reject".to_string()],
            prompt: None,
        });
        assert_eq!(applied, Applied::AwaitingFeedback);
        assert!(state.is_waiting_for_feedback());
        assert_eq!(state.feedback_options(), &["approve".to_string(), "reject".to_string()]);

        state.reply_feedback("approve").unwrap();
        assert!(!state.is_waiting_for_feedback());
        assert!(state.is_streaming());
    }

    #[test]
    fn test_completion_clears_waiting_flag() {
        let mut state = started();
        state.apply(&StreamEvent::FeedbackRequest {
            options: vec!["ok".to_string()],
            prompt: None,
        });
        state.apply(&complete());
        assert!(!state.is_waiting_for_feedback());
    }

    #[test]
    fn test_error_event_freezes_with_error() {
        let mut state = started();
        state.apply(&chunk("partial"));
        let applied = state.apply(&StreamEvent::Error(RemoteError {
            message: "timeout".to_string(),
            code: Some("NETWORK_ERROR".to_string()),
            retry_after: None,
        }));

        assert_eq!(applied, Applied::Failed);
        assert!(!state.is_streaming());
        assert!(!state.is_complete());
        assert_eq!(state.text(), "partial");
        assert_eq!(state.error().and_then(|e| e.code()), Some("NETWORK_ERROR"));
        assert_eq!(state.apply(&chunk("x")), Applied::Ignored);
    }

    #[test]
    fn test_begin_resets_everything() {
        let mut state = started();
        state.apply(&chunk("old"));
        state.apply(&complete());

        state.begin();
        assert!(state.is_streaming());
        assert!(!state.is_complete());
        assert!(state.text().is_empty());
        assert!(state.error().is_none());
    }

    #[test]
    fn test_interrupt_stops_streaming() {
        let mut state = started();
        state.apply(&chunk("half"));
        state.interrupt();
        assert!(!state.is_streaming());
        assert!(state.is_finished());
        assert!(state.error().is_none());
    }
}
