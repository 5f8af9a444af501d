use chrono::Utc;
use rusqlite::params;

use super::*;
use crate::suggestion::SuggestionStatus;

impl LinkDb {
    // =========================================================================
    // Suggestions
    // =========================================================================

    /// Insert a new suggestion row. Callers are expected to have checked for
    /// an existing pending row first; the partial UNIQUE index on
    /// (email_id, entity_id) WHERE status='pending' is the race backstop,
    /// and a constraint violation here is resolved by the writer, not
    /// surfaced to its caller.
    pub fn insert_suggestion(&self, suggestion: &DbSuggestion) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO suggestions (
                id, email_id, entity_id, confidence, evidence_snippet, reasoning,
                pattern_key, status, reviewed_by, reviewed_at, review_notes,
                rollback_data, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, NULL, NULL, NULL, ?9, ?9)",
            params![
                suggestion.id,
                suggestion.email_id,
                suggestion.entity_id,
                suggestion.confidence,
                suggestion.evidence_snippet,
                suggestion.reasoning,
                suggestion.pattern_key,
                suggestion.status.as_str(),
                now,
            ],
        )?;
        Ok(())
    }

    /// Get a single suggestion by id.
    pub fn get_suggestion(&self, id: &str) -> Result<Option<DbSuggestion>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SUGGESTION_COLUMNS} FROM suggestions WHERE id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![id], map_suggestion_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Get the outstanding pending suggestion for an (email, entity) pair,
    /// if one exists. The pending-pair invariant means there is at most one.
    pub fn get_pending_suggestion_for_pair(
        &self,
        email_id: &str,
        entity_id: &str,
    ) -> Result<Option<DbSuggestion>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SUGGESTION_COLUMNS} FROM suggestions
             WHERE email_id = ?1 AND entity_id = ?2 AND status = 'pending'"
        ))?;
        let mut rows = stmt.query_map(params![email_id, entity_id], map_suggestion_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// List suggestions by status for the review surface, newest first.
    pub fn get_suggestions_by_status(
        &self,
        status: SuggestionStatus,
    ) -> Result<Vec<DbSuggestion>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SUGGESTION_COLUMNS} FROM suggestions
             WHERE status = ?1
             ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(params![status.as_str()], map_suggestion_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Transition a suggestion between statuses, enforcing the allowed-
    /// transition table and re-checking the source status inside the UPDATE
    /// so a concurrent transition cannot slip through.
    ///
    /// Returns true if the row moved; false means the suggestion was not in
    /// `from` when the UPDATE ran (the caller decides how to report that).
    pub fn transition_suggestion(
        &self,
        id: &str,
        from: SuggestionStatus,
        to: SuggestionStatus,
        reviewed_by: Option<&str>,
        review_notes: Option<&str>,
        rollback_data: Option<&str>,
    ) -> Result<bool, DbError> {
        if !from.can_transition_to(to) {
            // Programmer error — all call sites pass table-legal pairs.
            return Ok(false);
        }
        let now = Utc::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE suggestions SET
                status = ?1,
                reviewed_by = COALESCE(?2, reviewed_by),
                reviewed_at = CASE WHEN ?2 IS NOT NULL THEN ?3 ELSE reviewed_at END,
                review_notes = COALESCE(?4, review_notes),
                rollback_data = COALESCE(?5, rollback_data),
                updated_at = ?3
             WHERE id = ?6 AND status = ?7",
            params![
                to.as_str(),
                reviewed_by,
                now,
                review_notes,
                rollback_data,
                id,
                from.as_str(),
            ],
        )?;
        Ok(rows == 1)
    }
}

const SUGGESTION_COLUMNS: &str = "id, email_id, entity_id, confidence, evidence_snippet, \
     reasoning, pattern_key, status, reviewed_by, reviewed_at, review_notes, rollback_data, \
     created_at, updated_at";

/// Row mapper for suggestions SELECT queries (14 columns).
fn map_suggestion_row(row: &rusqlite::Row) -> rusqlite::Result<DbSuggestion> {
    Ok(DbSuggestion {
        id: row.get(0)?,
        email_id: row.get(1)?,
        entity_id: row.get(2)?,
        confidence: row.get(3)?,
        evidence_snippet: row.get(4)?,
        reasoning: row.get(5)?,
        pattern_key: row.get(6)?,
        status: SuggestionStatus::from_str_lossy(&row.get::<_, String>(7)?),
        reviewed_by: row.get(8)?,
        reviewed_at: row.get(9)?,
        review_notes: row.get(10)?,
        rollback_data: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}
