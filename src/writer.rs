//! Suggestion writer: persists gated candidates as pending suggestions.
//!
//! Applies the minimum-confidence gate, keeps near-tie candidates so a
//! human can disambiguate, and enforces the at-most-one-pending-per-
//! (email, entity) invariant via lookup-then-insert with the partial
//! UNIQUE index as the backstop. A race losing to a concurrent writer is
//! resolved as "already suggested", never an error.

use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::db::{DbEmail, DbError, DbSuggestion, LinkDb};
use crate::extract::EvidenceSet;
use crate::matcher::Candidate;
use crate::suggestion::SuggestionStatus;

/// Outcome of one candidate passing through the writer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// A new pending suggestion was persisted.
    Created { suggestion_id: String, entity_id: String },
    /// A pending suggestion for this pair already existed (idempotent).
    AlreadyPending { suggestion_id: String, entity_id: String },
    /// Candidate fell below the confidence gate or outside the tie window.
    Discarded { entity_id: String, confidence: f64 },
}

/// Persist suggestions for the ranked candidates of one email.
///
/// Candidates survive the gate when they are at or above `min_confidence`
/// and within `tie_epsilon` of the top score — near-identical top scores
/// are all surfaced rather than silently picking one.
pub fn write_suggestions(
    db: &LinkDb,
    email: &DbEmail,
    candidates: &[Candidate],
    evidence: &EvidenceSet,
    config: &Config,
) -> Result<Vec<WriteOutcome>, DbError> {
    let Some(top) = candidates.first() else {
        return Ok(Vec::new());
    };

    let pattern_key = evidence.pattern_key();
    let snippet = evidence.best_snippet();
    let mut outcomes = Vec::new();

    for candidate in candidates {
        let below_gate = candidate.confidence < config.min_confidence;
        let outside_tie = top.confidence - candidate.confidence > config.tie_epsilon;
        if below_gate || outside_tie {
            outcomes.push(WriteOutcome::Discarded {
                entity_id: candidate.entity_id.clone(),
                confidence: candidate.confidence,
            });
            continue;
        }

        outcomes.push(write_one(db, email, candidate, &pattern_key, &snippet)?);
    }

    Ok(outcomes)
}

fn write_one(
    db: &LinkDb,
    email: &DbEmail,
    candidate: &Candidate,
    pattern_key: &str,
    snippet: &str,
) -> Result<WriteOutcome, DbError> {
    // Lookup first: the common case for re-runs.
    if let Some(existing) = db.get_pending_suggestion_for_pair(&email.email_id, &candidate.entity_id)? {
        return Ok(WriteOutcome::AlreadyPending {
            suggestion_id: existing.id,
            entity_id: candidate.entity_id.clone(),
        });
    }

    let suggestion = DbSuggestion {
        id: format!("sug-{}", Uuid::new_v4()),
        email_id: email.email_id.clone(),
        entity_id: candidate.entity_id.clone(),
        confidence: candidate.confidence,
        evidence_snippet: snippet.to_string(),
        reasoning: candidate.reasons.join("; "),
        pattern_key: pattern_key.to_string(),
        status: SuggestionStatus::Pending,
        reviewed_by: None,
        reviewed_at: None,
        review_notes: None,
        rollback_data: None,
        created_at: String::new(),
        updated_at: String::new(),
    };

    match db.insert_suggestion(&suggestion) {
        Ok(()) => Ok(WriteOutcome::Created {
            suggestion_id: suggestion.id,
            entity_id: candidate.entity_id.clone(),
        }),
        // Race backstop: a concurrent writer inserted the pending row
        // between our lookup and insert. The existing row is the outcome.
        Err(e) if e.is_constraint_violation() => {
            log::debug!(
                "pending suggestion race on ({}, {}); using existing row",
                email.email_id,
                candidate.entity_id
            );
            match db.get_pending_suggestion_for_pair(&email.email_id, &candidate.entity_id)? {
                Some(existing) => Ok(WriteOutcome::AlreadyPending {
                    suggestion_id: existing.id,
                    entity_id: candidate.entity_id.clone(),
                }),
                // Pending row vanished between the conflict and re-read
                // (reviewed that quickly); nothing left to write.
                None => Ok(WriteOutcome::Discarded {
                    entity_id: candidate.entity_id.clone(),
                    confidence: candidate.confidence,
                }),
            }
        }
        Err(e) => Err(e),
    }
}
