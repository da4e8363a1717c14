use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::config::OrchestratorPolicy;

/// Where a submission is in the analysis pipeline.
///
/// ```text
/// Grading -> Stage1Pending -> Stage1Done -> Stage2Pending -> Stage2Done ----> Finalized
///                          \                             \-> Stage2Skipped -/
///                           \-> Stage1Failed ---------------------------------/
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Grading,
    Stage1Pending,
    Stage1Done,
    Stage1Failed,
    Stage2Pending,
    Stage2Done,
    Stage2Skipped,
    Finalized { recommendation_ready: bool },
}

impl StageState {
    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(self, Self::Finalized { .. })
    }

    /// Delay before the UI moves on once finalized; `None` before that.
    #[must_use]
    pub fn grace_window(self, policy: &OrchestratorPolicy) -> Option<Duration> {
        match self {
            Self::Finalized { recommendation_ready: true } => Some(policy.success_grace),
            Self::Finalized { recommendation_ready: false } => Some(policy.failure_grace),
            _ => None,
        }
    }

    /// Apply `event`, returning the next state.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` if `event` is not valid in this state.
    pub fn apply(self, event: StageEvent) -> Result<Self, TransitionError> {
        use StageEvent as E;
        use StageState as S;

        let next = match (self, event) {
            (S::Grading, E::Graded) => S::Stage1Pending,
            (S::Stage1Pending, E::FeedbackSucceeded) => S::Stage1Done,
            (S::Stage1Pending, E::FeedbackFailed) => S::Stage1Failed,
            (S::Stage1Done, E::RecommendationRequested) => S::Stage2Pending,
            (S::Stage2Pending, E::RecommendationSucceeded) => S::Stage2Done,
            (S::Stage2Pending, E::RecommendationFailed) => S::Stage2Skipped,
            (S::Stage2Done, E::Finalize) => S::Finalized { recommendation_ready: true },
            (S::Stage1Failed | S::Stage2Skipped, E::Finalize) => {
                S::Finalized { recommendation_ready: false }
            }
            (from, event) => return Err(TransitionError { from, event }),
        };
        Ok(next)
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Grading => "grading",
            Self::Stage1Pending => "stage1_pending",
            Self::Stage1Done => "stage1_done",
            Self::Stage1Failed => "stage1_failed",
            Self::Stage2Pending => "stage2_pending",
            Self::Stage2Done => "stage2_done",
            Self::Stage2Skipped => "stage2_skipped",
            Self::Finalized { .. } => "finalized",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent {
    Graded,
    FeedbackSucceeded,
    FeedbackFailed,
    RecommendationRequested,
    RecommendationSucceeded,
    RecommendationFailed,
    Finalize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event {event:?} is not valid in state {from}")]
pub struct TransitionError {
    pub from: StageState,
    pub event: StageEvent,
}

/// Outcome of one stage as seen by the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Pending,
    Completed(T),
    /// The stage ran and failed; the reason is for logs and notices only.
    Degraded(String),
    Skipped,
}

impl<T> StageOutcome<T> {
    #[must_use]
    pub fn completed(&self) -> Option<&T> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}
