//! Approval checkpoint the research agent can request mid-stream.
//!
//! `Idle → AwaitingApproval → Idle`. The gate is entered only by a feedback
//! request from the server and left only by [`FeedbackGate::reply`] (or by
//! expiry/reset when the stream ends).

use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedbackError {
    #[error("No feedback has been requested")]
    NotAwaiting,
    #[error("'{choice}' is not one of the offered options: {options:?}")]
    UnknownOption {
        choice: String,
        options: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Idle,
    AwaitingApproval {
        options: Vec<String>,
        prompt: Option<String>,
        since: Instant,
    },
}

/// The user's answer, ready to be sent back on the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackReply {
    pub choice: String,
}

#[derive(Debug, Clone)]
pub struct FeedbackGate {
    state: GateState,
    last_reply: Option<String>,
}

impl Default for FeedbackGate {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Idle,
            last_reply: None,
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self.state, GateState::AwaitingApproval { .. })
    }

    /// Options the server offered, empty while idle.
    pub fn options(&self) -> &[String] {
        match &self.state {
            GateState::AwaitingApproval { options, .. } => options,
            GateState::Idle => &[],
        }
    }

    pub fn prompt(&self) -> Option<&str> {
        match &self.state {
            GateState::AwaitingApproval { prompt, .. } => prompt.as_deref(),
            GateState::Idle => None,
        }
    }

    /// The most recent choice sent back to the server.
    pub fn last_reply(&self) -> Option<&str> {
        self.last_reply.as_deref()
    }

    /// Enter `AwaitingApproval`. A repeated request replaces the options.
    pub fn request(&mut self, options: Vec<String>, prompt: Option<String>) {
        if self.is_awaiting() {
            tracing::debug!("Feedback re-requested while already awaiting; replacing options");
        }
        self.state = GateState::AwaitingApproval {
            options,
            prompt,
            since: Instant::now(),
        };
    }

    /// Record the user's choice and return to `Idle`.
    pub fn reply(&mut self, choice: &str) -> Result<FeedbackReply, FeedbackError> {
        let GateState::AwaitingApproval { options, .. } = &self.state else {
            return Err(FeedbackError::NotAwaiting);
        };
        if !options.iter().any(|o| o == choice) {
            return Err(FeedbackError::UnknownOption {
                choice: choice.to_string(),
                options: options.clone(),
            });
        }

        self.state = GateState::Idle;
        self.last_reply = Some(choice.to_string());
        Ok(FeedbackReply {
            choice: choice.to_string(),
        })
    }

    /// Time left before a pending request expires under `timeout`.
    ///
    /// `None` while idle.
    pub fn remaining(&self, timeout: Duration, now: Instant) -> Option<Duration> {
        match &self.state {
            GateState::AwaitingApproval { since, .. } => {
                Some(timeout.saturating_sub(now.saturating_duration_since(*since)))
            }
            GateState::Idle => None,
        }
    }

    /// Drop a pending request that has been open longer than `timeout`.
    pub fn expire_if_due(&mut self, timeout: Duration, now: Instant) -> bool {
        if self.remaining(timeout, now) == Some(Duration::ZERO) {
            tracing::info!(?timeout, "Feedback request expired");
            self.state = GateState::Idle;
            true
        } else {
            false
        }
    }

    /// Return to `Idle` without a reply (stream finished or was cancelled).
    pub fn reset(&mut self) {
        self.state = GateState::Idle;
    }
}
