//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::{EntityStatus, EntityType};
use crate::suggestion::SuggestionStatus;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    /// True when the underlying SQLite error is a uniqueness-constraint
    /// violation. The suggestion writer uses this to resolve races on the
    /// pending-pair index as "already exists" rather than failure.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}

/// A row from the `emails` table. Immutable once stored except
/// `processed_at`, which the batch pipeline sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbEmail {
    pub email_id: String,
    pub sender_email: String,
    pub sender_name: Option<String>,
    pub subject: String,
    pub body: String,
    pub received_at: String,
    /// JSON array of attachment metadata, as supplied by ingestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<String>,
    #[serde(default)]
    pub processed_at: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

/// A row from the `entities` table (a proposal or project).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbEntity {
    pub id: String,
    pub code: String,
    pub name: String,
    pub entity_type: EntityType,
    pub client_name: Option<String>,
    pub value: Option<f64>,
    pub status: EntityStatus,
    /// JSON array of known contact addresses for this entity's client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_emails: Option<String>,
    pub last_activity_at: String,
    #[serde(default)]
    pub created_at: String,
}

impl DbEntity {
    /// Parse the contact_emails JSON column into lowercase addresses.
    pub fn contacts(&self) -> Vec<String> {
        self.contact_emails
            .as_deref()
            .and_then(|json| serde_json::from_str::<Vec<String>>(json).ok())
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| c.contains('@'))
            .collect()
    }
}

/// A row from the `suggestions` table — the audit-trail record of the core.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbSuggestion {
    pub id: String,
    pub email_id: String,
    pub entity_id: String,
    pub confidence: f64,
    pub evidence_snippet: String,
    pub reasoning: String,
    pub pattern_key: String,
    pub status: SuggestionStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub review_notes: Option<String>,
    /// JSON snapshot sufficient to undo the applied link.
    pub rollback_data: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `links` table — the durable email-entity association.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbLink {
    pub id: String,
    pub email_id: String,
    pub entity_id: String,
    pub suggestion_id: Option<String>,
    pub provenance: String,
    pub created_at: String,
}

/// A row from the append-only `labeled_examples` table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbLabeledExample {
    pub id: String,
    pub suggestion_id: String,
    pub email_id: String,
    pub entity_id: String,
    pub pattern_key: String,
    pub evidence_snippet: String,
    pub decision: String,
    pub decided_by: String,
    pub created_at: String,
}
