use chrono::Utc;
use rusqlite::params;

use super::*;
use crate::entity::{EntityStatus, EntityType};

impl LinkDb {
    // =========================================================================
    // Entities (proposals / projects)
    // =========================================================================

    /// Insert or update an entity record. Entities are owned by the
    /// business-data layer; this is the import path, not pipeline state.
    pub fn upsert_entity(&self, entity: &DbEntity) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO entities (
                id, code, name, entity_type, client_name, value, status,
                contact_emails, last_activity_at, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                code = excluded.code,
                name = excluded.name,
                entity_type = excluded.entity_type,
                client_name = excluded.client_name,
                value = excluded.value,
                status = excluded.status,
                contact_emails = excluded.contact_emails,
                last_activity_at = excluded.last_activity_at",
            params![
                entity.id,
                entity.code,
                entity.name,
                entity.entity_type.as_str(),
                entity.client_name,
                entity.value,
                entity.status.as_str(),
                entity.contact_emails,
                entity.last_activity_at,
                now,
            ],
        )?;
        Ok(())
    }

    /// Get a single entity by id.
    pub fn get_entity(&self, id: &str) -> Result<Option<DbEntity>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, code, name, entity_type, client_name, value, status,
                    contact_emails, last_activity_at, created_at
             FROM entities WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], map_entity_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Get all entities, most recently active first. The matcher relies on
    /// this ordering for its tie-break.
    pub fn get_all_entities(&self) -> Result<Vec<DbEntity>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, code, name, entity_type, client_name, value, status,
                    contact_emails, last_activity_at, created_at
             FROM entities
             ORDER BY last_activity_at DESC",
        )?;

        let rows = stmt.query_map([], map_entity_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

/// Row mapper for entities SELECT queries.
fn map_entity_row(row: &rusqlite::Row) -> rusqlite::Result<DbEntity> {
    Ok(DbEntity {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        entity_type: EntityType::from_str_lossy(&row.get::<_, String>(3)?),
        client_name: row.get(4)?,
        value: row.get(5)?,
        status: EntityStatus::from_str_lossy(&row.get::<_, String>(6)?),
        contact_emails: row.get(7)?,
        last_activity_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;

    pub fn sample_entity(id: &str, code: &str, name: &str, client: &str) -> DbEntity {
        DbEntity {
            id: id.to_string(),
            code: code.to_string(),
            name: name.to_string(),
            entity_type: EntityType::Proposal,
            client_name: Some(client.to_string()),
            value: Some(12_000.0),
            status: EntityStatus::Pending,
            contact_emails: None,
            last_activity_at: Utc::now().to_rfc3339(),
            created_at: String::new(),
        }
    }

    #[test]
    fn test_upsert_and_get_entity() {
        let db = test_db();
        let entity = sample_entity("ent-1", "BK-033", "Bakery rebrand", "Crumb & Co");
        db.upsert_entity(&entity).expect("upsert");

        let stored = db.get_entity("ent-1").expect("get").expect("exists");
        assert_eq!(stored.code, "BK-033");
        assert_eq!(stored.client_name, Some("Crumb & Co".to_string()));
        assert_eq!(stored.entity_type, EntityType::Proposal);
        assert_eq!(stored.status, EntityStatus::Pending);

        assert!(db.get_entity("nonexistent").expect("get").is_none());
    }

    #[test]
    fn test_upsert_updates_existing() {
        let db = test_db();
        let mut entity = sample_entity("ent-1", "BK-033", "Bakery rebrand", "Crumb & Co");
        db.upsert_entity(&entity).expect("first upsert");

        entity.status = EntityStatus::Won;
        entity.value = Some(15_000.0);
        db.upsert_entity(&entity).expect("second upsert");

        let stored = db.get_entity("ent-1").expect("get").expect("exists");
        assert_eq!(stored.status, EntityStatus::Won);
        assert_eq!(stored.value, Some(15_000.0));
    }

    #[test]
    fn test_get_all_entities_ordered_by_activity() {
        let db = test_db();
        let mut old = sample_entity("ent-old", "AA-001", "Old", "A");
        old.last_activity_at = "2020-01-01T00:00:00Z".to_string();
        let recent = sample_entity("ent-new", "BB-002", "New", "B");
        db.upsert_entity(&old).unwrap();
        db.upsert_entity(&recent).unwrap();

        let all = db.get_all_entities().expect("query");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "ent-new");
    }

    #[test]
    fn test_contacts_parses_json() {
        let mut entity = sample_entity("ent-1", "BK-033", "Bakery", "Crumb");
        entity.contact_emails =
            Some(r#"["Amy@Client.com", "  bo@client.com ", "not-an-email"]"#.to_string());
        let contacts = entity.contacts();
        assert_eq!(contacts, vec!["amy@client.com", "bo@client.com"]);

        entity.contact_emails = Some("not json".to_string());
        assert!(entity.contacts().is_empty());
        entity.contact_emails = None;
        assert!(entity.contacts().is_empty());
    }
}
