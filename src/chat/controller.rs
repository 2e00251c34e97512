//! Conversation controller.
//!
//! Owns one conversation: its transcript, the streaming state of the
//! response in flight, and the feedback gate inside it. At most one
//! response streams at a time.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

use super::message::{Message, MessageMarker, MessagePatch};
use super::store::{StoreError, TranscriptStore};
use crate::messaging::{EventSender, TurnEnd, UiEvent};
use crate::stream::{
    Applied, ErrorClass, FeedbackError, ResearchClient, StreamError, StreamEvent, StreamSession,
    StreamingState,
};

pub const NETWORK_FALLBACK: &str =
    "I couldn't reach the research service. Check your connection and try again.";
pub const GENERIC_FALLBACK: &str =
    "Sorry, something went wrong while generating a response. Please try again.";

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Query must not be empty")]
    EmptyQuery,
    #[error("A response is already streaming")]
    Busy,
    #[error("No response is streaming")]
    Idle,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Feedback(#[from] FeedbackError),
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed {
        message_id: String,
    },
    Failed {
        message_id: String,
        class: ErrorClass,
        message: String,
        retry_after: Option<u64>,
        recoverable: bool,
    },
    Interrupted {
        message_id: String,
    },
}

impl TurnOutcome {
    pub fn message_id(&self) -> &str {
        match self {
            Self::Completed { message_id }
            | Self::Failed { message_id, .. }
            | Self::Interrupted { message_id } => message_id,
        }
    }
}

/// Result of a single [`Conversation::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Updated,
    /// The gate is open; answer with [`Conversation::reply_feedback`].
    AwaitingFeedback(Vec<String>),
    Finished(TurnOutcome),
}

/// Decides how to answer a feedback request. `None` cancels the turn.
#[async_trait]
pub trait FeedbackHandler: Send {
    async fn decide(&mut self, prompt: Option<&str>, options: &[String]) -> Option<String>;
}

/// Apology text shown in place of a failed response.
pub fn fallback_text(error: &StreamError) -> String {
    let network_code = error
        .code()
        .map(|c| c.eq_ignore_ascii_case("NETWORK_ERROR"))
        .unwrap_or(false);
    if network_code {
        return NETWORK_FALLBACK.to_string();
    }
    match error.class() {
        ErrorClass::ConnectionFailure => NETWORK_FALLBACK.to_string(),
        ErrorClass::RateLimited => match error.retry_after() {
            Some(secs) => format!(
                "The research service is busy right now. Please try again in {} seconds.",
                secs
            ),
            None => "The research service is busy right now. Please try again in a moment."
                .to_string(),
        },
        ErrorClass::MidStream | ErrorClass::Application => GENERIC_FALLBACK.to_string(),
    }
}

/// Everything needed to close out a failed turn, detached from the error.
struct Failure {
    class: ErrorClass,
    message: String,
    retry_after: Option<u64>,
    recoverable: bool,
    fallback: String,
}

impl From<&StreamError> for Failure {
    fn from(error: &StreamError) -> Self {
        Self {
            class: error.class(),
            message: error.to_string(),
            retry_after: error.retry_after(),
            recoverable: error.is_recoverable(),
            fallback: fallback_text(error),
        }
    }
}

pub struct Conversation<'a> {
    client: ResearchClient,
    store: TranscriptStore<'a>,
    state: StreamingState,
    events: Option<EventSender>,
    feedback_timeout: Option<Duration>,
    session: Option<StreamSession>,
    /// Assistant message being streamed into.
    pending_id: Option<String>,
    /// Outcome decided outside `step` (failed connect, failed reply).
    outcome: Option<TurnOutcome>,
}

impl<'a> Conversation<'a> {
    pub fn new(client: ResearchClient, store: TranscriptStore<'a>) -> Self {
        Self {
            client,
            store,
            state: StreamingState::new(),
            events: None,
            feedback_timeout: None,
            session: None,
            pending_id: None,
            outcome: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_feedback_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.feedback_timeout = timeout;
        self
    }

    pub fn conversation_id(&self) -> &str {
        self.store.conversation_id()
    }

    pub fn transcript(&self) -> &TranscriptStore<'a> {
        &self.store
    }

    pub fn state(&self) -> &StreamingState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        self.pending_id.is_some()
    }

    /// Load earlier messages from the store's backends.
    pub fn restore(&mut self) -> Result<usize, ControllerError> {
        Ok(self.store.restore()?)
    }

    pub fn clear(&mut self) -> Result<(), ControllerError> {
        if self.is_busy() {
            return Err(ControllerError::Busy);
        }
        self.store.clear();
        self.state = StreamingState::new();
        Ok(())
    }

    fn emit(&self, event: UiEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }

    /// Record the user's query and open a stream for the answer.
    ///
    /// Returns the id of the assistant placeholder. A failure to connect is
    /// not an error here: it ends the turn and is reported by the next
    /// [`step`](Self::step).
    pub async fn submit(&mut self, query: &str) -> Result<String, ControllerError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ControllerError::EmptyQuery);
        }
        if self.is_busy() || self.state.is_streaming() {
            return Err(ControllerError::Busy);
        }
        // An unread outcome belongs to the previous turn.
        if let Some(stale) = self.outcome.take() {
            tracing::debug!(message_id = %stale.message_id(), "Dropping unread turn outcome");
        }

        let user_id = self.store.append(Message::user(query));
        self.emit(UiEvent::UserMessage {
            id: user_id,
            content: query.to_string(),
        });

        let message_id = self.store.append(Message::assistant_placeholder());
        self.pending_id = Some(message_id.clone());
        self.state.begin();
        self.emit(UiEvent::TurnStarted {
            message_id: message_id.clone(),
        });

        let session_id = self.store.conversation_id().to_string();
        match self.client.start(query, &session_id).await {
            Ok(session) => {
                tracing::info!(conversation = %session_id, "Research stream opened");
                self.session = Some(session);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to open research stream");
                let failure = Failure::from(&e);
                self.state.fail(e);
                let outcome = self.finish_failed(failure)?;
                self.outcome = Some(outcome);
            }
        }
        Ok(message_id)
    }

    /// Read and apply the next event of the response in flight.
    pub async fn step(&mut self) -> Result<Step, ControllerError> {
        if let Some(outcome) = self.outcome.take() {
            return Ok(Step::Finished(outcome));
        }
        let deadline = self.feedback_timeout.and_then(|timeout| {
            self.state
                .gate()
                .remaining(timeout, Instant::now())
                .map(|left| (timeout, left))
        });
        let Some(session) = self.session.as_mut() else {
            return Err(ControllerError::Idle);
        };

        let next = match deadline {
            Some((timeout, left)) => {
                let read = tokio::time::timeout(left, session.next_event()).await;
                match read {
                    Ok(next) => next,
                    Err(_) => {
                        let outcome = self.expire_feedback(timeout).await?;
                        return Ok(Step::Finished(outcome));
                    }
                }
            }
            None => session.next_event().await,
        };

        let event = match next {
            Some(Ok(event)) => event,
            Some(Err(e)) => return self.fail(e).await.map(Step::Finished),
            None => return self.fail(StreamError::ConnectionClosed).await.map(Step::Finished),
        };

        match self.state.apply(&event) {
            Applied::Ignored => Ok(Step::Updated),
            Applied::Updated => {
                if let Some(ui) = ui_event_for(&event) {
                    self.emit(ui);
                }
                Ok(Step::Updated)
            }
            Applied::AwaitingFeedback => {
                let options = self.state.feedback_options().to_vec();
                self.pause_for_feedback(options.clone())?;
                Ok(Step::AwaitingFeedback(options))
            }
            Applied::Completed => self.finish_completed().map(Step::Finished),
            Applied::Failed => {
                let failure = match self.state.error() {
                    Some(error) => Failure::from(error),
                    None => Failure::from(&StreamError::ConnectionClosed),
                };
                self.close_session().await;
                self.finish_failed(failure).map(Step::Finished)
            }
        }
    }

    /// Answer the open feedback request on the same socket.
    pub async fn reply_feedback(&mut self, choice: &str) -> Result<(), ControllerError> {
        if self.session.is_none() {
            return Err(FeedbackError::NotAwaiting.into());
        }
        let reply = self.state.reply_feedback(choice)?;

        if let Some(id) = self.pending_id.clone() {
            self.store.update(
                &id,
                MessagePatch {
                    feedback_options: Some(Vec::new()),
                    ..Default::default()
                },
            )?;
        }

        let sent = match self.session.as_mut() {
            Some(session) => session.send_feedback(&reply.choice).await,
            None => Err(StreamError::ConnectionClosed),
        };
        match sent {
            Ok(()) => {
                tracing::info!(choice = %reply.choice, "Feedback sent");
                self.emit(UiEvent::FeedbackSent {
                    choice: reply.choice,
                });
            }
            Err(e) => {
                let outcome = self.fail(e).await?;
                self.outcome = Some(outcome);
            }
        }
        Ok(())
    }

    /// Abort the response in flight. `None` when nothing is streaming.
    pub async fn cancel(&mut self) -> Result<Option<TurnOutcome>, ControllerError> {
        if let Some(outcome) = self.outcome.take() {
            return Ok(Some(outcome));
        }
        let Some(id) = self.pending_id.take() else {
            return Ok(None);
        };
        if let Some(session) = self.session.take() {
            session.cancel().await;
        }
        self.state.interrupt();
        self.store.update(&id, self.snapshot_patch(MessageMarker::Interrupted))?;
        self.emit(UiEvent::TurnEnded {
            message_id: id.clone(),
            end: TurnEnd::Interrupted,
        });
        Ok(Some(TurnOutcome::Interrupted { message_id: id }))
    }

    /// Submit a query and drive it to the end, asking `handler` whenever
    /// the research agent waits for approval.
    pub async fn ask(
        &mut self,
        query: &str,
        handler: &mut dyn FeedbackHandler,
    ) -> Result<TurnOutcome, ControllerError> {
        self.submit(query).await?;
        loop {
            match self.step().await? {
                Step::Updated => {}
                Step::AwaitingFeedback(options) => {
                    let prompt = self.state.gate().prompt().map(str::to_string);
                    let decision = match self.feedback_timeout {
                        Some(timeout) => {
                            match tokio::time::timeout(
                                timeout,
                                handler.decide(prompt.as_deref(), &options),
                            )
                            .await
                            {
                                Ok(decision) => decision,
                                Err(_) => return self.expire_feedback(timeout).await,
                            }
                        }
                        None => handler.decide(prompt.as_deref(), &options).await,
                    };
                    match decision {
                        Some(choice) => self.reply_feedback(&choice).await?,
                        None => {
                            return match self.cancel().await? {
                                Some(outcome) => Ok(outcome),
                                None => Err(ControllerError::Idle),
                            }
                        }
                    }
                }
                Step::Finished(outcome) => return Ok(outcome),
            }
        }
    }

    fn pause_for_feedback(&mut self, options: Vec<String>) -> Result<(), ControllerError> {
        let Some(id) = self.pending_id.clone() else {
            return Ok(());
        };
        let mut patch = self.snapshot_patch(MessageMarker::AwaitingFeedback);
        patch.feedback_options = Some(options.clone());
        self.store.update(&id, patch)?;
        self.emit(UiEvent::FeedbackRequested {
            options,
            prompt: self.state.gate().prompt().map(str::to_string),
        });
        Ok(())
    }

    /// Current streamed content as a patch with the given marker.
    fn snapshot_patch(&self, marker: MessageMarker) -> MessagePatch {
        MessagePatch {
            content: Some(self.state.text().to_string()),
            chunks: Some(self.state.chunks().to_vec()),
            agent: self.state.agent().map(str::to_string),
            marker: Some(marker),
            feedback_options: None,
            tool_calls: Some(self.state.tool_calls().to_vec()),
            citations: Some(self.state.citations().to_vec()),
        }
    }

    async fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            if !session.is_finished() {
                session.cancel().await;
            }
        }
    }

    async fn fail(&mut self, error: StreamError) -> Result<TurnOutcome, ControllerError> {
        tracing::warn!(error = %error, class = ?error.class(), "Research stream failed");
        let failure = Failure::from(&error);
        self.state.fail(error);
        self.close_session().await;
        self.finish_failed(failure)
    }

    async fn expire_feedback(&mut self, timeout: Duration) -> Result<TurnOutcome, ControllerError> {
        self.state.gate_mut().expire_if_due(timeout, Instant::now());
        self.fail(StreamError::FeedbackExpired(timeout)).await
    }

    fn finish_completed(&mut self) -> Result<TurnOutcome, ControllerError> {
        self.session = None;
        let Some(id) = self.pending_id.take() else {
            return Err(ControllerError::Idle);
        };
        let mut patch = self.snapshot_patch(MessageMarker::Complete);
        patch.feedback_options = Some(Vec::new());
        self.store.update(&id, patch)?;

        self.emit(UiEvent::TurnEnded {
            message_id: id.clone(),
            end: TurnEnd::Completed {
                citations: self.state.citations().to_vec(),
            },
        });
        Ok(TurnOutcome::Completed { message_id: id })
    }

    fn finish_failed(&mut self, failure: Failure) -> Result<TurnOutcome, ControllerError> {
        let Some(id) = self.pending_id.take() else {
            return Err(ControllerError::Idle);
        };
        self.store.update(
            &id,
            MessagePatch {
                content: Some(failure.fallback.clone()),
                chunks: Some(self.state.chunks().to_vec()),
                marker: Some(MessageMarker::Failed),
                feedback_options: Some(Vec::new()),
                ..Default::default()
            },
        )?;

        self.emit(UiEvent::TurnEnded {
            message_id: id.clone(),
            end: TurnEnd::Failed {
                message: failure.message.clone(),
                fallback: failure.fallback,
                recoverable: failure.recoverable,
                retry_after: failure.retry_after,
            },
        });
        Ok(TurnOutcome::Failed {
            message_id: id,
            class: failure.class,
            message: failure.message,
            retry_after: failure.retry_after,
            recoverable: failure.recoverable,
        })
    }
}

fn ui_event_for(event: &StreamEvent) -> Option<UiEvent> {
    match event {
        StreamEvent::Chunk { text, .. } => Some(UiEvent::text_delta(text)),
        StreamEvent::Progress { percent, detail } => Some(UiEvent::Progress {
            percent: (*percent).min(100),
            detail: detail.clone(),
        }),
        StreamEvent::Citation(citation) => Some(UiEvent::Citation {
            citation: citation.clone(),
        }),
        StreamEvent::Thought(step) => Some(UiEvent::Thought { step: step.clone() }),
        StreamEvent::ToolCall(call) => Some(UiEvent::ToolCall { call: call.clone() }),
        StreamEvent::FeedbackRequest { .. } | StreamEvent::Complete { .. } | StreamEvent::Error(_) => {
            None
        }
    }
}
