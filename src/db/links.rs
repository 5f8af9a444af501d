use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use super::*;

/// Provenance tag for links created by the suggestion flow.
pub const PROVENANCE_SUGGESTION: &str = "suggestion";
/// Provenance tag for links created directly by a human, outside the flow.
pub const PROVENANCE_MANUAL: &str = "manual";

impl LinkDb {
    // =========================================================================
    // Links (durable email-entity associations)
    // =========================================================================

    /// Create the link for an approved suggestion. Returns the new link row.
    pub fn insert_link_for_suggestion(
        &self,
        email_id: &str,
        entity_id: &str,
        suggestion_id: &str,
    ) -> Result<DbLink, DbError> {
        self.insert_link(email_id, entity_id, Some(suggestion_id), PROVENANCE_SUGGESTION)
    }

    /// Create a manual link. Manual links are visible to reviewers but are
    /// excluded from suggestion-duplicate checks by their provenance tag.
    pub fn insert_manual_link(&self, email_id: &str, entity_id: &str) -> Result<DbLink, DbError> {
        self.insert_link(email_id, entity_id, None, PROVENANCE_MANUAL)
    }

    fn insert_link(
        &self,
        email_id: &str,
        entity_id: &str,
        suggestion_id: Option<&str>,
        provenance: &str,
    ) -> Result<DbLink, DbError> {
        let link = DbLink {
            id: format!("lnk-{}", Uuid::new_v4()),
            email_id: email_id.to_string(),
            entity_id: entity_id.to_string(),
            suggestion_id: suggestion_id.map(str::to_string),
            provenance: provenance.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };
        self.conn.execute(
            "INSERT INTO links (id, email_id, entity_id, suggestion_id, provenance, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                link.id,
                link.email_id,
                link.entity_id,
                link.suggestion_id,
                link.provenance,
                link.created_at,
            ],
        )?;
        Ok(link)
    }

    /// Remove a link by id. Returns true if a row was deleted; false means
    /// another actor already removed it.
    pub fn remove_link(&self, link_id: &str) -> Result<bool, DbError> {
        let rows = self
            .conn
            .execute("DELETE FROM links WHERE id = ?1", params![link_id])?;
        Ok(rows > 0)
    }

    /// Get a link by id.
    pub fn get_link(&self, link_id: &str) -> Result<Option<DbLink>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email_id, entity_id, suggestion_id, provenance, created_at
             FROM links WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![link_id], map_link_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Get all links for an email, suggestion-made and manual alike.
    pub fn get_links_for_email(&self, email_id: &str) -> Result<Vec<DbLink>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email_id, entity_id, suggestion_id, provenance, created_at
             FROM links WHERE email_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![email_id], map_link_row)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

/// Row mapper for links SELECT queries.
fn map_link_row(row: &rusqlite::Row) -> rusqlite::Result<DbLink> {
    Ok(DbLink {
        id: row.get(0)?,
        email_id: row.get(1)?,
        entity_id: row.get(2)?,
        suggestion_id: row.get(3)?,
        provenance: row.get(4)?,
        created_at: row.get(5)?,
    })
}
