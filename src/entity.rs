//! Business-entity vocabulary for the linking pipeline.
//!
//! Entities are proposals and projects owned by the business-data layer.
//! The pipeline reads them to build its reference index and to attribute
//! suggestions; it never mutates them.

use serde::{Deserialize, Serialize};

/// The kind of business record an email can be linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Proposal,
    Project,
}

impl EntityType {
    /// String label for SQL storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Proposal => "proposal",
            EntityType::Project => "project",
        }
    }

    /// Parse from SQL string. Unknown values fall back to Proposal.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "project" => EntityType::Project,
            _ => EntityType::Proposal,
        }
    }
}

/// Lifecycle status of a proposal or project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Pending,
    Active,
    Won,
    Lost,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Pending => "pending",
            EntityStatus::Active => "active",
            EntityStatus::Won => "won",
            EntityStatus::Lost => "lost",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "active" => EntityStatus::Active,
            "won" => EntityStatus::Won,
            "lost" => EntityStatus::Lost,
            _ => EntityStatus::Pending,
        }
    }
}
