//! Suggestion status state machine.
//!
//! Status is a tagged variant with a single allowed-transition table so
//! "invalid transition" checks live in exactly one place. Legal paths:
//!
//! ```text
//! pending --approve--> approved --apply--> applied --revert--> reverted
//! pending --deny--> denied (terminal)
//! ```

use serde::{Deserialize, Serialize};

/// Lifecycle status of a suggestion. Monotonic except via explicit revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Approved,
    Denied,
    Applied,
    Reverted,
}

impl SuggestionStatus {
    /// String label for SQL storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Approved => "approved",
            SuggestionStatus::Denied => "denied",
            SuggestionStatus::Applied => "applied",
            SuggestionStatus::Reverted => "reverted",
        }
    }

    /// Parse from SQL string. Unknown values fall back to Pending.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "approved" => SuggestionStatus::Approved,
            "denied" => SuggestionStatus::Denied,
            "applied" => SuggestionStatus::Applied,
            "reverted" => SuggestionStatus::Reverted,
            _ => SuggestionStatus::Pending,
        }
    }

    /// The allowed-transition table. Every status mutation in the crate
    /// goes through this check.
    pub fn can_transition_to(self, next: SuggestionStatus) -> bool {
        use SuggestionStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Denied) | (Approved, Applied) | (Applied, Reverted)
        )
    }

    /// Terminal states accept no further decisions.
    pub fn is_terminal(self) -> bool {
        matches!(self, SuggestionStatus::Denied | SuggestionStatus::Reverted)
    }
}

/// A reviewer's decision on a pending suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Deny,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Deny => "deny",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SuggestionStatus::*;

    #[test]
    fn test_legal_transitions() {
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Denied));
        assert!(Approved.can_transition_to(Applied));
        assert!(Applied.can_transition_to(Reverted));
    }

    #[test]
    fn test_illegal_transitions() {
        // No backward moves
        assert!(!Approved.can_transition_to(Pending));
        assert!(!Applied.can_transition_to(Pending));
        assert!(!Denied.can_transition_to(Approved));
        assert!(!Reverted.can_transition_to(Applied));
        // No skipping
        assert!(!Pending.can_transition_to(Applied));
        assert!(!Pending.can_transition_to(Reverted));
        // Self-loops are not transitions
        for s in [Pending, Approved, Denied, Applied, Reverted] {
            assert!(!s.can_transition_to(s));
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(Denied.is_terminal());
        assert!(Reverted.is_terminal());
        assert!(!Pending.is_terminal());
        assert!(!Applied.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [Pending, Approved, Denied, Applied, Reverted] {
            assert_eq!(SuggestionStatus::from_str_lossy(status.as_str()), status);
        }
        assert_eq!(SuggestionStatus::from_str_lossy("garbage"), Pending);
    }
}
