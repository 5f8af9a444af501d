//! Feedback loop: labeled examples and the learned scoring adjustment.
//!
//! Every terminal human decision (approve or deny) is appended to the
//! `labeled_examples` log together with the evidence that was presented.
//! The log is never edited or pruned. The matcher's learned adjustment is
//! computed at query time as an aggregation over the log, so there is no
//! hidden mutable model state and the behavior is reproducible from the
//! stored rows.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::db::{DbError, DbLabeledExample, DbSuggestion, LinkDb};
use crate::matcher::LabeledHistory;
use crate::suggestion::Decision;

/// Append a labeled example for a suggestion that just reached a terminal
/// human decision. The evidence snippet and pattern key are copied verbatim
/// from the suggestion so the training history stays faithful even if
/// extraction changes later.
pub fn record_decision(
    db: &LinkDb,
    suggestion: &DbSuggestion,
    decision: Decision,
    decided_by: &str,
) -> Result<DbLabeledExample, DbError> {
    let example = DbLabeledExample {
        id: format!("lx-{}", Uuid::new_v4()),
        suggestion_id: suggestion.id.clone(),
        email_id: suggestion.email_id.clone(),
        entity_id: suggestion.entity_id.clone(),
        pattern_key: suggestion.pattern_key.clone(),
        evidence_snippet: suggestion.evidence_snippet.clone(),
        decision: decision.as_str().to_string(),
        decided_by: decided_by.to_string(),
        created_at: Utc::now().to_rfc3339(),
    };
    db.conn_ref().execute(
        "INSERT INTO labeled_examples (
            id, suggestion_id, email_id, entity_id, pattern_key,
            evidence_snippet, decision, decided_by, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            example.id,
            example.suggestion_id,
            example.email_id,
            example.entity_id,
            example.pattern_key,
            example.evidence_snippet,
            example.decision,
            example.decided_by,
            example.created_at,
        ],
    )?;
    Ok(example)
}

impl LinkDb {
    /// Count (approvals, denials) for an (entity, evidence pattern) pair.
    pub fn decision_counts(
        &self,
        entity_id: &str,
        pattern_key: &str,
    ) -> Result<(i64, i64), DbError> {
        self.conn_ref()
            .query_row(
                "SELECT
                    COALESCE(SUM(CASE WHEN decision = 'approve' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN decision = 'deny' THEN 1 ELSE 0 END), 0)
                 FROM labeled_examples
                 WHERE entity_id = ?1 AND pattern_key = ?2",
                params![entity_id, pattern_key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(DbError::from)
    }
}

impl LabeledHistory for LinkDb {
    /// Learned adjustment in `[-cap, +cap]`: the Laplace-smoothed approval
    /// rate for this (entity, pattern) pair, recentered around zero. No
    /// history means no adjustment.
    fn adjustment(&self, entity_id: &str, pattern_key: &str, cap: f64) -> Result<f64, DbError> {
        let (approvals, denials) = self.decision_counts(entity_id, pattern_key)?;
        if approvals + denials == 0 {
            return Ok(0.0);
        }
        let rate = (approvals as f64 + 1.0) / ((approvals + denials) as f64 + 2.0);
        Ok((rate - 0.5) * 2.0 * cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use crate::db::suggestions::test_fixtures::sample_suggestion;

    #[test]
    fn test_record_decision_appends_row() {
        let db = test_db();
        let suggestion = sample_suggestion("s1", "e1", "ent-1");

        let example =
            record_decision(&db, &suggestion, Decision::Approve, "dana").expect("record");
        assert_eq!(example.decision, "approve");
        assert_eq!(example.pattern_key, suggestion.pattern_key);

        let count: i32 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM labeled_examples", [], |r| r.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_no_history_means_zero_adjustment() {
        let db = test_db();
        let adj = db.adjustment("ent-1", "code:bk-033", 0.15).expect("adjustment");
        assert_eq!(adj, 0.0);
    }

    #[test]
    fn test_approvals_bump_denials_drop() {
        let db = test_db();
        let suggestion = sample_suggestion("s1", "e1", "ent-1");

        record_decision(&db, &suggestion, Decision::Approve, "dana").expect("approve");
        let up = db
            .adjustment("ent-1", &suggestion.pattern_key, 0.15)
            .expect("adjustment");
        assert!(up > 0.0, "approval should bias upward: {up}");
        assert!(up <= 0.15);

        record_decision(&db, &suggestion, Decision::Deny, "dana").expect("deny");
        record_decision(&db, &suggestion, Decision::Deny, "dana").expect("deny");
        let down = db
            .adjustment("ent-1", &suggestion.pattern_key, 0.15)
            .expect("adjustment");
        assert!(down < 0.0, "majority denials should bias downward: {down}");
        assert!(down >= -0.15);
    }

    #[test]
    fn test_adjustment_scoped_to_entity_and_pattern() {
        let db = test_db();
        let suggestion = sample_suggestion("s1", "e1", "ent-1");
        record_decision(&db, &suggestion, Decision::Deny, "dana").expect("deny");

        let other_entity = db.adjustment("ent-2", &suggestion.pattern_key, 0.15).unwrap();
        assert_eq!(other_entity, 0.0);

        let other_pattern = db.adjustment("ent-1", "client:someone", 0.15).unwrap();
        assert_eq!(other_pattern, 0.0);
    }
}
