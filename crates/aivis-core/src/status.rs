//! Status enums stored as text columns.
//!
//! Each enum round-trips through `as_str` / `FromStr` so the database layer
//! can bind and read plain strings.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Collection status of a `collector_results` row.
///
/// Transitions are monotonic: `pending → running → completed | failed_retry | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    Pending,
    Running,
    Completed,
    FailedRetry,
    Failed,
}

impl CollectionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionStatus::Pending => "pending",
            CollectionStatus::Running => "running",
            CollectionStatus::Completed => "completed",
            CollectionStatus::FailedRetry => "failed_retry",
            CollectionStatus::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CollectionStatus::Completed | CollectionStatus::FailedRetry | CollectionStatus::Failed
        )
    }

    /// Returns `true` if `self → next` is a legal forward transition.
    ///
    /// A terminal status may be entered directly from `pending` (a collector
    /// that fails before it ever starts), but never left.
    #[must_use]
    pub fn can_transition_to(self, next: CollectionStatus) -> bool {
        match self {
            CollectionStatus::Pending => next != CollectionStatus::Pending,
            CollectionStatus::Running => next.is_terminal(),
            CollectionStatus::Completed
            | CollectionStatus::FailedRetry
            | CollectionStatus::Failed => false,
        }
    }

    /// Every status from which `next` may legally be entered.
    #[must_use]
    pub fn allowed_predecessors(next: CollectionStatus) -> Vec<&'static str> {
        [
            CollectionStatus::Pending,
            CollectionStatus::Running,
            CollectionStatus::Completed,
            CollectionStatus::FailedRetry,
            CollectionStatus::Failed,
        ]
        .into_iter()
        .filter(|from| from.can_transition_to(next))
        .map(CollectionStatus::as_str)
        .collect()
    }
}

impl std::fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CollectionStatus::Pending),
            "running" => Ok(CollectionStatus::Running),
            "completed" => Ok(CollectionStatus::Completed),
            "failed_retry" => Ok(CollectionStatus::FailedRetry),
            "failed" => Ok(CollectionStatus::Failed),
            other => Err(CoreError::UnknownCollectionStatus(other.to_string())),
        }
    }
}

/// Scoring status of a `collector_results` row, independent of collection status.
///
/// `NULL` in the database is treated the same as [`ScoringStatus::Pending`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl ScoringStatus {
    /// Stored states a worker may claim from, besides `NULL`.
    pub const CLAIMABLE: [ScoringStatus; 2] = [ScoringStatus::Pending, ScoringStatus::Error];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScoringStatus::Pending => "pending",
            ScoringStatus::Processing => "processing",
            ScoringStatus::Completed => "completed",
            ScoringStatus::Error => "error",
        }
    }

    /// Rows in these states may be claimed by a worker.
    #[must_use]
    pub fn is_claimable(status: Option<ScoringStatus>) -> bool {
        status.map_or(true, |s| Self::CLAIMABLE.contains(&s))
    }
}

impl std::fmt::Display for ScoringStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoringStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScoringStatus::Pending),
            "processing" => Ok(ScoringStatus::Processing),
            "completed" => Ok(ScoringStatus::Completed),
            "error" => Ok(ScoringStatus::Error),
            other => Err(CoreError::UnknownScoringStatus(other.to_string())),
        }
    }
}

/// Status of a `query_executions` tracking row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Queued,
    Running,
    Completed,
    Partial,
    Failed,
}

impl ExecutionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Queued => "queued",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Partial => "partial",
            ExecutionStatus::Failed => "failed",
        }
    }

    /// Overall status for an execution given how many collectors succeeded.
    #[must_use]
    pub fn from_outcomes(succeeded: usize, total: usize) -> Self {
        if total > 0 && succeeded == total {
            ExecutionStatus::Completed
        } else if succeeded == 0 {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Partial
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(ExecutionStatus::Queued),
            "running" => Ok(ExecutionStatus::Running),
            "completed" => Ok(ExecutionStatus::Completed),
            "partial" => Ok(ExecutionStatus::Partial),
            "failed" => Ok(ExecutionStatus::Failed),
            other => Err(CoreError::UnknownExecutionStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    /// Scores above this magnitude are labelled positive or negative.
    pub const THRESHOLD: f32 = 0.1;

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }

    #[must_use]
    pub fn from_score(score: f32) -> Self {
        if score > Self::THRESHOLD {
            SentimentLabel::Positive
        } else if score < -Self::THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SentimentLabel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "positive" => Ok(SentimentLabel::Positive),
            "negative" => Ok(SentimentLabel::Negative),
            "neutral" => Ok(SentimentLabel::Neutral),
            other => Err(CoreError::UnknownSentimentLabel(other.to_string())),
        }
    }
}
