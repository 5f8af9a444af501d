use chrono::Utc;
use rusqlite::params;

use super::*;

impl LinkDb {
    // =========================================================================
    // Emails
    // =========================================================================

    /// Insert an email record if it doesn't already exist.
    ///
    /// Emails are immutable once stored: re-ingesting the same id is a no-op
    /// so a re-run never clobbers `processed_at` or the original text.
    /// Returns true if a row was inserted.
    pub fn insert_email(&self, email: &DbEmail) -> Result<bool, DbError> {
        let now = Utc::now().to_rfc3339();
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO emails (
                email_id, sender_email, sender_name, subject, body,
                received_at, attachments, processed_at, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8)",
            params![
                email.email_id,
                email.sender_email,
                email.sender_name,
                email.subject,
                email.body,
                email.received_at,
                email.attachments,
                now,
            ],
        )?;
        Ok(rows > 0)
    }

    /// Get emails the pipeline has not yet considered, oldest first.
    pub fn get_unprocessed_emails(&self, limit: usize) -> Result<Vec<DbEmail>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT email_id, sender_email, sender_name, subject, body,
                    received_at, attachments, processed_at, created_at
             FROM emails
             WHERE processed_at IS NULL
             ORDER BY received_at
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], map_email_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Get a single email by id.
    pub fn get_email(&self, email_id: &str) -> Result<Option<DbEmail>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT email_id, sender_email, sender_name, subject, body,
                    received_at, attachments, processed_at, created_at
             FROM emails WHERE email_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![email_id], map_email_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Mark an email as processed by a batch run.
    pub fn mark_email_processed(&self, email_id: &str) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE emails SET processed_at = ?1 WHERE email_id = ?2",
            params![now, email_id],
        )?;
        Ok(())
    }
}

/// Row mapper for emails SELECT queries.
fn map_email_row(row: &rusqlite::Row) -> rusqlite::Result<DbEmail> {
    Ok(DbEmail {
        email_id: row.get(0)?,
        sender_email: row.get(1)?,
        sender_name: row.get(2)?,
        subject: row.get(3)?,
        body: row.get(4)?,
        received_at: row.get(5)?,
        attachments: row.get(6)?,
        processed_at: row.get(7)?,
        created_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;

    pub fn sample_email(id: &str, sender: &str, subject: &str, body: &str) -> DbEmail {
        DbEmail {
            email_id: id.to_string(),
            sender_email: sender.to_string(),
            sender_name: None,
            subject: subject.to_string(),
            body: body.to_string(),
            received_at: Utc::now().to_rfc3339(),
            attachments: None,
            processed_at: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_insert_and_get_email() {
        let db = test_db();
        let email = sample_email("e1", "amy@client.com", "Re: BK-033", "See attached.");
        assert!(db.insert_email(&email).expect("insert"));

        let stored = db.get_email("e1").expect("get").expect("exists");
        assert_eq!(stored.sender_email, "amy@client.com");
        assert_eq!(stored.subject, "Re: BK-033");
        assert!(stored.processed_at.is_none());
    }

    #[test]
    fn test_insert_email_is_immutable() {
        let db = test_db();
        let email = sample_email("e1", "amy@client.com", "Original", "body");
        assert!(db.insert_email(&email).expect("first insert"));
        db.mark_email_processed("e1").expect("mark processed");

        // Re-ingesting the same id must not touch the stored row
        let mut again = email.clone();
        again.subject = "Rewritten".to_string();
        assert!(!db.insert_email(&again).expect("second insert is a no-op"));

        let stored = db.get_email("e1").expect("get").expect("exists");
        assert_eq!(stored.subject, "Original");
        assert!(stored.processed_at.is_some(), "processed_at survives re-ingest");
    }

    #[test]
    fn test_unprocessed_excludes_processed() {
        let db = test_db();
        db.insert_email(&sample_email("e1", "a@b.com", "s1", "b")).unwrap();
        db.insert_email(&sample_email("e2", "a@b.com", "s2", "b")).unwrap();
        db.mark_email_processed("e1").expect("mark");

        let pending = db.get_unprocessed_emails(10).expect("query");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].email_id, "e2");
    }
}
