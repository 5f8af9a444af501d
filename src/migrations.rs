//! Schema migration framework.
//!
//! Numbered SQL migrations are embedded at compile time via `include_str!`.
//! Each migration runs exactly once, tracked by the `schema_version` table.

use rusqlite::Connection;

struct Migration {
    version: i32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("migrations/001_baseline.sql"),
}];

/// Create the `schema_version` table if it doesn't exist.
fn ensure_schema_version_table(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("Failed to create schema_version table: {}", e))
}

/// Return the highest applied migration version, or 0 if none.
fn current_version(conn: &Connection) -> Result<i32, String> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| format!("Failed to read schema version: {}", e))
}

/// Run all pending migrations.
///
/// Returns the number of migrations applied (0 if already up-to-date).
///
/// Forward-compat guard: if the database has a higher version than the highest
/// known migration, returns an error telling the user to update studiolink.
pub fn run_migrations(conn: &Connection) -> Result<usize, String> {
    ensure_schema_version_table(conn)?;

    let current = current_version(conn)?;
    let max_known = MIGRATIONS.last().map(|m| m.version).unwrap_or(0);

    if current > max_known {
        return Err(format!(
            "Database schema version ({}) is newer than this version of studiolink supports ({}). \
             Please update studiolink to the latest version.",
            current, max_known
        ));
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        return Ok(0);
    }

    for migration in &pending {
        conn.execute_batch(migration.sql)
            .map_err(|e| format!("Migration v{} failed: {}", migration.version, e))?;

        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [migration.version],
        )
        .map_err(|e| format!("Failed to record migration v{}: {}", migration.version, e))?;

        log::info!("Applied migration v{}", migration.version);
    }

    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn mem_db() -> Connection {
        Connection::open_in_memory().expect("in-memory db")
    }

    #[test]
    fn test_fresh_db_applies_baseline() {
        let conn = mem_db();
        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, 1, "should apply exactly 1 migration (baseline)");

        let version = current_version(&conn).expect("version query");
        assert_eq!(version, 1);

        // Verify key tables exist with correct columns
        conn.execute(
            "INSERT INTO emails (email_id, sender_email, subject, body, received_at, created_at)
             VALUES ('e1', 'amy@client.com', 'Re: BK-033', 'body', '2026-01-01', '2026-01-01')",
            [],
        )
        .expect("emails table should exist");

        conn.execute(
            "INSERT INTO entities (id, code, name, entity_type, client_name, value, status,
             last_activity_at, created_at)
             VALUES ('ent-1', 'BK-033', 'Bakery rebrand', 'proposal', 'Crumb & Co', 12000.0,
             'pending', '2026-01-01', '2026-01-01')",
            [],
        )
        .expect("entities table should exist");

        conn.execute(
            "INSERT INTO suggestions (id, email_id, entity_id, confidence, evidence_snippet,
             reasoning, pattern_key, status, created_at, updated_at)
             VALUES ('s1', 'e1', 'ent-1', 0.6, 'BK-033', 'code match', 'code:bk-033',
             'pending', '2026-01-01', '2026-01-01')",
            [],
        )
        .expect("suggestions table should exist");

        conn.execute(
            "INSERT INTO labeled_examples (id, suggestion_id, email_id, entity_id, pattern_key,
             evidence_snippet, decision, decided_by, created_at)
             VALUES ('lx1', 's1', 'e1', 'ent-1', 'code:bk-033', 'BK-033', 'approve', 'dana',
             '2026-01-01')",
            [],
        )
        .expect("labeled_examples table should exist");
    }

    #[test]
    fn test_pending_unique_index() {
        let conn = mem_db();
        run_migrations(&conn).expect("migrations");

        conn.execute(
            "INSERT INTO emails (email_id, sender_email, subject, body, received_at, created_at)
             VALUES ('e1', 'amy@client.com', 'Re: BK-033', 'body', '2026-01-01', '2026-01-01')",
            [],
        )
        .expect("email fixture");

        conn.execute(
            "INSERT INTO entities (id, code, name, entity_type, client_name, value, status,
             last_activity_at, created_at)
             VALUES ('ent-1', 'BK-033', 'Bakery rebrand', 'proposal', 'Crumb & Co', 12000.0,
             'pending', '2026-01-01', '2026-01-01')",
            [],
        )
        .expect("entity fixture");

        conn.execute(
            "INSERT INTO suggestions (id, email_id, entity_id, confidence, evidence_snippet,
             reasoning, pattern_key, status, created_at, updated_at)
             VALUES ('s1', 'e1', 'ent-1', 0.6, 'x', 'x', 'k', 'pending', '2026-01-01', '2026-01-01')",
            [],
        )
        .expect("first pending insert");

        // Second pending row for the same pair must violate the partial index
        let dup = conn.execute(
            "INSERT INTO suggestions (id, email_id, entity_id, confidence, evidence_snippet,
             reasoning, pattern_key, status, created_at, updated_at)
             VALUES ('s2', 'e1', 'ent-1', 0.7, 'x', 'x', 'k', 'pending', '2026-01-01', '2026-01-01')",
            [],
        );
        assert!(dup.is_err(), "duplicate pending pair should be rejected");

        // A non-pending row for the same pair is allowed (audit trail)
        conn.execute(
            "INSERT INTO suggestions (id, email_id, entity_id, confidence, evidence_snippet,
             reasoning, pattern_key, status, created_at, updated_at)
             VALUES ('s3', 'e1', 'ent-1', 0.7, 'x', 'x', 'k', 'denied', '2026-01-01', '2026-01-01')",
            [],
        )
        .expect("non-pending duplicate pair is allowed");
    }

    #[test]
    fn test_forward_compat_guard() {
        let conn = mem_db();

        ensure_schema_version_table(&conn).unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (999)", [])
            .unwrap();

        let result = run_migrations(&conn);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(
            err.contains("newer than this version"),
            "error should mention version mismatch: {}",
            err
        );
    }

    #[test]
    fn test_idempotency() {
        let conn = mem_db();

        let first = run_migrations(&conn).expect("first run");
        assert_eq!(first, 1);

        let second = run_migrations(&conn).expect("second run");
        assert_eq!(second, 0, "second run should apply no migrations");

        let version = current_version(&conn).expect("version query");
        assert_eq!(version, 1);
    }
}
