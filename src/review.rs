//! Review gateway: the only path by which suggestions change status.
//!
//! Approving a suggestion creates the durable link and records the human
//! decision in the feedback log, all inside one transaction, so a crash
//! can never leave an approved suggestion without its link. Denial is a
//! terminal state that still feeds the learner. Reverting undoes an
//! applied suggestion's link using the rollback data captured at approval
//! time.

use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbSuggestion, LinkDb};
use crate::error::ReviewError;
use crate::feedback::record_decision;
use crate::suggestion::{Decision, SuggestionStatus};

/// Everything needed to undo an approval, captured when the link is made.
#[derive(Debug, Serialize, Deserialize)]
pub struct RollbackData {
    pub link_id: String,
    pub email_id: String,
    pub entity_id: String,
    pub linked_at: String,
}

/// Result of a revert. `link_removed` is false when the link was already
/// gone (or rollback data was missing); the suggestion is still marked
/// reverted so the audit trail reflects the reviewer's intent.
#[derive(Debug, Serialize)]
pub struct RevertOutcome {
    pub suggestion_id: String,
    pub link_removed: bool,
}

/// Per-item result of a batch decision. Batch processing is independent
/// per suggestion; one failure never aborts the rest.
#[derive(Debug, Serialize)]
pub struct BatchItemOutcome {
    pub suggestion_id: String,
    pub ok: bool,
    pub error: Option<String>,
}

/// Apply a reviewer's decision to a pending suggestion.
///
/// Approve runs pending -> approved -> applied, creating the link in
/// between; deny runs pending -> denied. Both append a labeled example.
/// A suggestion not in `pending` yields `InvalidTransition` carrying its
/// actual status so the caller can refresh their view.
pub fn decide(
    db: &LinkDb,
    suggestion_id: &str,
    decision: Decision,
    reviewer: &str,
    notes: Option<&str>,
) -> Result<DbSuggestion, ReviewError> {
    let suggestion = db
        .get_suggestion(suggestion_id)?
        .ok_or_else(|| ReviewError::NotFound(suggestion_id.to_string()))?;

    if suggestion.status != SuggestionStatus::Pending {
        return Err(ReviewError::InvalidTransition {
            suggestion_id: suggestion_id.to_string(),
            expected: SuggestionStatus::Pending,
            actual: suggestion.status,
        });
    }

    match decision {
        Decision::Approve => approve(db, &suggestion, reviewer, notes),
        Decision::Deny => deny(db, &suggestion, reviewer, notes),
    }
}

fn approve(
    db: &LinkDb,
    suggestion: &DbSuggestion,
    reviewer: &str,
    notes: Option<&str>,
) -> Result<DbSuggestion, ReviewError> {
    let applied = db.with_transaction(|tx| {
        let moved = tx.transition_suggestion(
            &suggestion.id,
            SuggestionStatus::Pending,
            SuggestionStatus::Approved,
            Some(reviewer),
            notes,
            None,
        )?;
        if !moved {
            // Lost the race to another reviewer; report via the re-read below.
            return Ok(None);
        }

        let link = tx.insert_link_for_suggestion(
            &suggestion.email_id,
            &suggestion.entity_id,
            &suggestion.id,
        )?;
        let rollback = RollbackData {
            link_id: link.id.clone(),
            email_id: link.email_id.clone(),
            entity_id: link.entity_id.clone(),
            linked_at: link.created_at.clone(),
        };
        let rollback_json = serde_json::to_string(&rollback).map_err(DbError::from)?;

        tx.transition_suggestion(
            &suggestion.id,
            SuggestionStatus::Approved,
            SuggestionStatus::Applied,
            None,
            None,
            Some(&rollback_json),
        )?;

        record_decision(tx, suggestion, Decision::Approve, reviewer)?;
        Ok(Some(()))
    })?;

    reread_after_decision(db, &suggestion.id, applied.is_some())
}

fn deny(
    db: &LinkDb,
    suggestion: &DbSuggestion,
    reviewer: &str,
    notes: Option<&str>,
) -> Result<DbSuggestion, ReviewError> {
    let moved = db.with_transaction(|tx| {
        let moved = tx.transition_suggestion(
            &suggestion.id,
            SuggestionStatus::Pending,
            SuggestionStatus::Denied,
            Some(reviewer),
            notes,
            None,
        )?;
        if moved {
            record_decision(tx, suggestion, Decision::Deny, reviewer)?;
        }
        Ok(moved)
    })?;

    reread_after_decision(db, &suggestion.id, moved)
}

/// Re-read the suggestion after a decision attempt. When the transition
/// lost a race, the current row tells us what the winner did and we report
/// it as an InvalidTransition.
fn reread_after_decision(
    db: &LinkDb,
    suggestion_id: &str,
    moved: bool,
) -> Result<DbSuggestion, ReviewError> {
    let current = db
        .get_suggestion(suggestion_id)?
        .ok_or_else(|| ReviewError::NotFound(suggestion_id.to_string()))?;
    if moved {
        Ok(current)
    } else {
        Err(ReviewError::InvalidTransition {
            suggestion_id: suggestion_id.to_string(),
            expected: SuggestionStatus::Pending,
            actual: current.status,
        })
    }
}

/// Apply one decision to many suggestions. Items are processed
/// independently and in order; the result vector has one entry per input
/// id, success or failure.
pub fn decide_batch(
    db: &LinkDb,
    suggestion_ids: &[String],
    decision: Decision,
    reviewer: &str,
) -> Vec<BatchItemOutcome> {
    suggestion_ids
        .iter()
        .map(|id| match decide(db, id, decision, reviewer, None) {
            Ok(_) => BatchItemOutcome {
                suggestion_id: id.clone(),
                ok: true,
                error: None,
            },
            Err(e) => BatchItemOutcome {
                suggestion_id: id.clone(),
                ok: false,
                error: Some(e.to_string()),
            },
        })
        .collect()
}

/// Undo an applied suggestion: remove its link and mark it reverted.
///
/// Reverting an already-reverted suggestion is an idempotent no-op. A
/// missing link (removed manually, or rollback data lost) still marks the
/// suggestion reverted with `link_removed: false` and a warning, so the
/// reviewer's intent always lands in the audit trail.
pub fn revert(db: &LinkDb, suggestion_id: &str, reviewer: &str) -> Result<RevertOutcome, ReviewError> {
    let suggestion = db
        .get_suggestion(suggestion_id)?
        .ok_or_else(|| ReviewError::NotFound(suggestion_id.to_string()))?;

    if suggestion.status == SuggestionStatus::Reverted {
        return Ok(RevertOutcome {
            suggestion_id: suggestion_id.to_string(),
            link_removed: false,
        });
    }
    if suggestion.status != SuggestionStatus::Applied {
        return Err(ReviewError::InvalidTransition {
            suggestion_id: suggestion_id.to_string(),
            expected: SuggestionStatus::Applied,
            actual: suggestion.status,
        });
    }

    db.with_transaction(|tx| {
        let link_removed = match parse_rollback(&suggestion) {
            Some(rollback) => {
                let removed = tx.remove_link(&rollback.link_id)?;
                if !removed {
                    log::warn!(
                        "revert of suggestion {}: link {} already gone",
                        suggestion.id,
                        rollback.link_id
                    );
                }
                removed
            }
            None => {
                log::warn!(
                    "revert of suggestion {}: no usable rollback data, nothing to remove",
                    suggestion.id
                );
                false
            }
        };

        tx.transition_suggestion(
            &suggestion.id,
            SuggestionStatus::Applied,
            SuggestionStatus::Reverted,
            Some(reviewer),
            None,
            None,
        )?;

        Ok(RevertOutcome {
            suggestion_id: suggestion.id.clone(),
            link_removed,
        })
    })
    .map_err(ReviewError::from)
}

fn parse_rollback(suggestion: &DbSuggestion) -> Option<RollbackData> {
    let raw = suggestion.rollback_data.as_deref()?;
    match serde_json::from_str(raw) {
        Ok(data) => Some(data),
        Err(e) => {
            log::warn!("suggestion {} has malformed rollback data: {e}", suggestion.id);
            None
        }
    }
}
