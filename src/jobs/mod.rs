//! Status tracking for server-side file jobs.
//!
//! Uploaded files go through two asynchronous backend jobs: text extraction
//! and embedding. The server reports a status string for each; the client
//! only displays it and offers a manual trigger or retry.
//!
//! ```text
//!   extraction:  not_extracted ─▶ extracting ─▶ content_ready
//!                                           └─▶ failed
//!   embedding:   pending ─▶ processing ─▶ completed | partial | error
//! ```

mod status;

pub use status::{EmbeddingStatus, ExtractionStatus, JobStatus};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("Unknown {kind} status '{value}'")]
    UnknownStatus { kind: &'static str, value: String },
    #[error("Illegal {kind} transition: {from} -> {to}")]
    IllegalTransition {
        kind: &'static str,
        from: String,
        to: String,
    },
    #[error("Cannot {action} {kind} while {status}")]
    NotAllowed {
        kind: &'static str,
        action: &'static str,
        status: String,
    },
}

/// Tracks one job's status through server reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTracker<S: JobStatus> {
    status: S,
    last_error: Option<String>,
}

pub type ExtractionTracker = JobTracker<ExtractionStatus>;
pub type EmbeddingTracker = JobTracker<EmbeddingStatus>;

impl<S: JobStatus> Default for JobTracker<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: JobStatus> JobTracker<S> {
    pub fn new() -> Self {
        Self::at(S::initial())
    }

    /// Resume from a previously stored status.
    pub fn at(status: S) -> Self {
        Self {
            status,
            last_error: None,
        }
    }

    /// Resume from a stored status string.
    pub fn parse(raw: &str) -> Result<Self, JobError> {
        Ok(Self::at(raw.parse()?))
    }

    pub fn status(&self) -> S {
        self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether `from → to` is allowed.
    ///
    /// Repeating the current status is a no-op. Reports may skip ahead
    /// (a poll can miss the in-progress phase) but never move backwards,
    /// and a terminal status is only left through [`retry`](Self::retry).
    pub fn can_transition(from: S, to: S) -> bool {
        if from == to {
            return true;
        }
        if from.is_terminal() {
            return false;
        }
        to.rank() > from.rank()
    }

    /// Apply a status string reported by the server.
    pub fn report(&mut self, raw: &str) -> Result<S, JobError> {
        let next: S = raw.parse()?;
        self.transition(next)
    }

    pub fn transition(&mut self, next: S) -> Result<S, JobError> {
        if !Self::can_transition(self.status, next) {
            return Err(JobError::IllegalTransition {
                kind: S::KIND,
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        if next != self.status {
            tracing::debug!(kind = S::KIND, from = %self.status, to = %next, "Job status changed");
        }
        if !next.is_failure() {
            self.last_error = None;
        }
        self.status = next;
        Ok(next)
    }

    /// Mark the job failed with a reason.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<S, JobError> {
        let status = self.transition(S::failure())?;
        self.last_error = Some(reason.into());
        Ok(status)
    }

    /// Start the job from its initial state, or re-run it after a failure.
    pub fn trigger(&mut self) -> Result<S, JobError> {
        if self.status == S::initial() || self.status.is_failure() {
            self.enter_in_progress();
            Ok(self.status)
        } else {
            Err(JobError::NotAllowed {
                kind: S::KIND,
                action: "start",
                status: self.status.to_string(),
            })
        }
    }

    /// Re-enter the in-progress state from a terminal failure state.
    pub fn retry(&mut self) -> Result<S, JobError> {
        if !self.status.is_failure() {
            return Err(JobError::NotAllowed {
                kind: S::KIND,
                action: "retry",
                status: self.status.to_string(),
            });
        }
        tracing::info!(kind = S::KIND, from = %self.status, "Retrying job");
        self.enter_in_progress();
        Ok(self.status)
    }

    fn enter_in_progress(&mut self) {
        self.status = S::in_progress();
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Extraction
    // =========================================================================

    #[test]
    fn test_extraction_happy_path() {
        let mut job = ExtractionTracker::new();
        assert_eq!(job.status(), ExtractionStatus::NotExtracted);
        job.report("extracting").unwrap();
        assert_eq!(job.report("content-ready").unwrap(), ExtractionStatus::ContentReady);
    }

    #[test]
    fn test_extraction_may_skip_in_progress() {
        let mut job = ExtractionTracker::new();
        assert_eq!(job.report("failed").unwrap(), ExtractionStatus::Failed);
    }

    #[test]
    fn test_extraction_rejects_backwards_and_terminal_exits() {
        let mut job = ExtractionTracker::new();
        job.report("extracting").unwrap();
        assert!(matches!(
            job.report("not_extracted"),
            Err(JobError::IllegalTransition { .. })
        ));

        job.report("content_ready").unwrap();
        let err = job.report("failed").unwrap_err();
        assert_eq!(
            err,
            JobError::IllegalTransition {
                kind: "extraction",
                from: "content_ready".to_string(),
                to: "failed".to_string(),
            }
        );
        assert_eq!(job.status(), ExtractionStatus::ContentReady);
    }

    #[test]
    fn test_repeated_report_is_noop() {
        let mut job = ExtractionTracker::new();
        job.report("extracting").unwrap();
        job.report("EXTRACTING").unwrap();
        assert_eq!(job.status(), ExtractionStatus::Extracting);
    }

    #[test]
    fn test_unknown_status() {
        let mut job = ExtractionTracker::new();
        assert!(matches!(
            job.report("teleporting"),
            Err(JobError::UnknownStatus { .. })
        ));
    }

    #[test]
    fn test_retry_only_from_failure() {
        let mut job = ExtractionTracker::new();
        assert!(matches!(job.retry(), Err(JobError::NotAllowed { .. })));

        job.fail("corrupt pdf").unwrap();
        assert_eq!(job.last_error(), Some("corrupt pdf"));
        assert_eq!(job.retry().unwrap(), ExtractionStatus::Extracting);
        assert!(job.last_error().is_none());

        job.report("content_ready").unwrap();
        assert!(matches!(job.retry(), Err(JobError::NotAllowed { .. })));
    }

    #[test]
    fn test_trigger_from_initial_or_failure() {
        let mut job = ExtractionTracker::new();
        assert_eq!(job.trigger().unwrap(), ExtractionStatus::Extracting);
        assert!(job.trigger().is_err());

        job.report("failed").unwrap();
        assert_eq!(job.trigger().unwrap(), ExtractionStatus::Extracting);
    }

    // =========================================================================
    // Embedding
    // =========================================================================

    #[test]
    fn test_embedding_terminal_states() {
        for (raw, expected) in [
            ("completed", EmbeddingStatus::Completed),
            ("partial", EmbeddingStatus::Partial),
            ("error", EmbeddingStatus::Error),
        ] {
            let mut job = EmbeddingTracker::new();
            job.report("processing").unwrap();
            assert_eq!(job.report(raw).unwrap(), expected);
            assert!(job.status().is_terminal());
        }
    }

    #[test]
    fn test_embedding_retry_from_error_and_partial() {
        let mut job = EmbeddingTracker::parse("error").unwrap();
        assert_eq!(job.retry().unwrap(), EmbeddingStatus::Processing);

        let mut job = EmbeddingTracker::parse("partial").unwrap();
        assert_eq!(job.retry().unwrap(), EmbeddingStatus::Processing);

        let mut job = EmbeddingTracker::parse("completed").unwrap();
        assert!(job.retry().is_err());
    }

    #[test]
    fn test_embedding_cannot_return_to_pending() {
        let mut job = EmbeddingTracker::new();
        job.report("processing").unwrap();
        assert!(job.report("pending").is_err());
    }
}
