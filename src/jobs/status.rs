//! Extraction and embedding status values.

use std::fmt;
use std::str::FromStr;

use super::JobError;

/// A job status reported by the server.
pub trait JobStatus: Copy + Eq + fmt::Debug + fmt::Display + FromStr<Err = JobError> {
    /// Name used in errors and logs.
    const KIND: &'static str;

    fn initial() -> Self;
    fn in_progress() -> Self;
    /// Status recorded by [`JobTracker::fail`](super::JobTracker::fail).
    fn failure() -> Self;

    /// 0 = not started, 1 = running, 2 = finished.
    fn rank(&self) -> u8;

    /// Finished without full success; eligible for retry.
    fn is_failure(&self) -> bool;

    fn as_str(&self) -> &'static str;

    fn is_terminal(&self) -> bool {
        self.rank() == 2
    }
}

/// `"Content-Ready"` → `"content_ready"`.
fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionStatus {
    NotExtracted,
    Extracting,
    ContentReady,
    Failed,
}

impl JobStatus for ExtractionStatus {
    const KIND: &'static str = "extraction";

    fn initial() -> Self {
        Self::NotExtracted
    }

    fn in_progress() -> Self {
        Self::Extracting
    }

    fn failure() -> Self {
        Self::Failed
    }

    fn rank(&self) -> u8 {
        match self {
            Self::NotExtracted => 0,
            Self::Extracting => 1,
            Self::ContentReady | Self::Failed => 2,
        }
    }

    fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::NotExtracted => "not_extracted",
            Self::Extracting => "extracting",
            Self::ContentReady => "content_ready",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for ExtractionStatus {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "not_extracted" | "none" | "pending" | "" => Ok(Self::NotExtracted),
            "extracting" | "processing" | "in_progress" => Ok(Self::Extracting),
            "content_ready" | "ready" | "extracted" | "completed" | "success" => {
                Ok(Self::ContentReady)
            }
            "failed" | "error" | "failure" => Ok(Self::Failed),
            _ => Err(JobError::UnknownStatus {
                kind: Self::KIND,
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbeddingStatus {
    Pending,
    Processing,
    Completed,
    /// Some chunks were embedded, some were not.
    Partial,
    Error,
}

impl JobStatus for EmbeddingStatus {
    const KIND: &'static str = "embedding";

    fn initial() -> Self {
        Self::Pending
    }

    fn in_progress() -> Self {
        Self::Processing
    }

    fn failure() -> Self {
        Self::Error
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Completed | Self::Partial | Self::Error => 2,
        }
    }

    fn is_failure(&self) -> bool {
        matches!(self, Self::Partial | Self::Error)
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Error => "error",
        }
    }
}

impl FromStr for EmbeddingStatus {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "pending" | "not_started" | "queued" | "" => Ok(Self::Pending),
            "processing" | "embedding" | "in_progress" => Ok(Self::Processing),
            "completed" | "complete" | "done" | "success" => Ok(Self::Completed),
            "partial" | "partially_completed" => Ok(Self::Partial),
            "error" | "failed" | "failure" => Ok(Self::Error),
            _ => Err(JobError::UnknownStatus {
                kind: Self::KIND,
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for EmbeddingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("Content-Ready".parse::<ExtractionStatus>().unwrap(), ExtractionStatus::ContentReady);
        assert_eq!("not extracted".parse::<ExtractionStatus>().unwrap(), ExtractionStatus::NotExtracted);
        assert_eq!("in-progress".parse::<EmbeddingStatus>().unwrap(), EmbeddingStatus::Processing);
        assert_eq!("DONE".parse::<EmbeddingStatus>().unwrap(), EmbeddingStatus::Completed);
    }

    #[test]
    fn test_display_round_trips() {
        for status in [
            ExtractionStatus::NotExtracted,
            ExtractionStatus::Extracting,
            ExtractionStatus::ContentReady,
            ExtractionStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<ExtractionStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_failure_states() {
        assert!(ExtractionStatus::Failed.is_failure());
        assert!(!ExtractionStatus::ContentReady.is_failure());
        assert!(EmbeddingStatus::Partial.is_failure());
        assert!(EmbeddingStatus::Partial.is_terminal());
        assert!(!EmbeddingStatus::Processing.is_terminal());
    }
}
