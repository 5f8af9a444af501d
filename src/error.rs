//! Reviewer-facing error types.
//!
//! Extraction and matching problems never surface here — they degrade to
//! "no suggestion" inside the pipeline. Review-time errors are always
//! surfaced to the human caller: they represent a real state conflict the
//! UI should refresh and show.

use thiserror::Error;

use crate::db::DbError;
use crate::suggestion::SuggestionStatus;

#[derive(Debug, Error)]
pub enum ReviewError {
    /// The suggestion was not in the expected source state. Carries the
    /// actual current status so the caller can show the reviewer what
    /// changed under them.
    #[error("invalid transition for suggestion {suggestion_id}: expected {expected}, found {actual}")]
    InvalidTransition {
        suggestion_id: String,
        expected: SuggestionStatus,
        actual: SuggestionStatus,
    },

    #[error("suggestion not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl std::fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ReviewError {
    /// True for errors caused by the suggestion's state, not by the system —
    /// the 4xx-style class a review UI reports back to the person.
    pub fn is_state_conflict(&self) -> bool {
        matches!(
            self,
            ReviewError::InvalidTransition { .. } | ReviewError::NotFound(_)
        )
    }
}
