//! Confidence-scored candidate matching.
//!
//! Each known entity is scored against the extracted evidence by a small
//! ordered list of scoring rules — code match, client-name match, contact
//! match, amount proximity — each a pure function from evidence to a
//! partial score. Rule contributions plus a learned adjustment from the
//! feedback store are summed and clamped to [0, 1]. Rules can be added,
//! removed, or re-weighted without touching control flow.

use serde::{Deserialize, Serialize};

use crate::db::{DbEntity, DbError};
use crate::extract::EvidenceSet;

/// Relative amount difference treated as a close match.
const AMOUNT_NEAR: f64 = 0.05;
/// Relative amount difference still worth half credit.
const AMOUNT_LOOSE: f64 = 0.15;
/// Jaro-Winkler floor for tolerating client-name typos in evidence.
const FUZZY_CLIENT_THRESHOLD: f64 = 0.92;

/// Signal weights for the scoring rules. Exact code match dominates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoreWeights {
    pub code: f64,
    pub client: f64,
    pub contact: f64,
    pub amount: f64,
    /// Cap on the learned adjustment, in both directions.
    pub learned: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            code: 0.6,
            client: 0.25,
            contact: 0.2,
            amount: 0.15,
            learned: 0.15,
        }
    }
}

/// One ranked match: an entity, its confidence, and the reasons behind it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub entity_id: String,
    pub confidence: f64,
    pub reasons: Vec<String>,
}

/// Read side of the feedback store, as seen by the matcher. The store is
/// consulted per (entity, evidence pattern) pair; failures degrade to a
/// zero adjustment so matching keeps working without learned history.
pub trait LabeledHistory {
    fn adjustment(&self, entity_id: &str, pattern_key: &str, cap: f64) -> Result<f64, DbError>;
}

/// A scoring rule: partial score plus a human-readable reason, or None
/// when the rule has nothing to say about this entity.
type ScoreRule = fn(&EvidenceSet, &DbEntity, &ScoreWeights) -> Option<(f64, String)>;

/// The heuristic rule set, in reporting order.
const RULES: &[ScoreRule] = &[
    rule_code_match,
    rule_client_match,
    rule_contact_match,
    rule_amount_proximity,
];

/// Score every entity against the evidence and return candidates sorted by
/// confidence descending, ties broken by most recent entity activity.
/// Entities with no matching signal at all are omitted.
pub fn rank_candidates(
    evidence: &EvidenceSet,
    entities: &[DbEntity],
    history: Option<&dyn LabeledHistory>,
    weights: &ScoreWeights,
) -> Vec<Candidate> {
    if evidence.is_empty() {
        return Vec::new();
    }

    let pattern_key = evidence.pattern_key();
    let mut scored: Vec<(Candidate, String)> = Vec::new();

    for entity in entities {
        let mut total = 0.0;
        let mut reasons = Vec::new();
        for rule in RULES {
            if let Some((score, reason)) = rule(evidence, entity, weights) {
                total += score;
                reasons.push(reason);
            }
        }
        if reasons.is_empty() {
            continue;
        }

        if let Some(history) = history {
            match history.adjustment(&entity.id, &pattern_key, weights.learned) {
                Ok(adj) if adj != 0.0 => {
                    total += adj;
                    reasons.push(format!("learned adjustment {adj:+.2} from past reviews"));
                }
                Ok(_) => {}
                Err(e) => {
                    // Degrade to pure heuristic scoring.
                    log::warn!(
                        "labeled-history store unavailable for {}: {e}; scoring without learned adjustment",
                        entity.id
                    );
                }
            }
        }

        scored.push((
            Candidate {
                entity_id: entity.id.clone(),
                confidence: total.clamp(0.0, 1.0),
                reasons,
            },
            entity.last_activity_at.clone(),
        ));
    }

    scored.sort_by(|(a, a_activity), (b, b_activity)| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b_activity.cmp(a_activity))
    });

    scored.into_iter().map(|(candidate, _)| candidate).collect()
}

// ---------------------------------------------------------------------------
// Scoring rules
// ---------------------------------------------------------------------------

/// Exact project-code mention. Highest-weight signal.
fn rule_code_match(
    evidence: &EvidenceSet,
    entity: &DbEntity,
    weights: &ScoreWeights,
) -> Option<(f64, String)> {
    let code = entity.code.to_uppercase();
    evidence
        .codes()
        .iter()
        .find(|c| c.to_uppercase() == code)
        .map(|_| (weights.code, format!("project code {} mentioned", entity.code)))
}

/// Client-name mention, with a fuzzy fallback for near-miss spellings.
fn rule_client_match(
    evidence: &EvidenceSet,
    entity: &DbEntity,
    weights: &ScoreWeights,
) -> Option<(f64, String)> {
    let client = entity.client_name.as_deref()?.trim().to_lowercase();
    if client.is_empty() {
        return None;
    }
    for name in evidence.client_names() {
        if name == client {
            return Some((
                weights.client,
                format!("client name \"{}\" mentioned", entity.client_name.as_deref().unwrap_or("")),
            ));
        }
        if strsim::jaro_winkler(name, &client) >= FUZZY_CLIENT_THRESHOLD {
            return Some((
                weights.client * 0.8,
                format!("client name close to \"{name}\""),
            ));
        }
    }
    None
}

/// Sender or mentioned address appears in the entity's known contacts.
fn rule_contact_match(
    evidence: &EvidenceSet,
    entity: &DbEntity,
    weights: &ScoreWeights,
) -> Option<(f64, String)> {
    let contacts = entity.contacts();
    if contacts.is_empty() {
        return None;
    }
    evidence
        .contacts()
        .iter()
        .find(|c| contacts.iter().any(|known| known == *c))
        .map(|c| (weights.contact, format!("known contact {c}")))
}

/// A mentioned amount close to the entity's value. Full credit within 5%,
/// half credit within 15%.
fn rule_amount_proximity(
    evidence: &EvidenceSet,
    entity: &DbEntity,
    weights: &ScoreWeights,
) -> Option<(f64, String)> {
    let value = entity.value?;
    if value <= 0.0 {
        return None;
    }
    let mut best: Option<(f64, f64)> = None; // (relative diff, amount)
    for amount in evidence.amounts() {
        let rel = (amount - value).abs() / value;
        if best.map(|(b, _)| rel < b).unwrap_or(true) {
            best = Some((rel, amount));
        }
    }
    let (rel, amount) = best?;
    if rel <= AMOUNT_NEAR {
        Some((weights.amount, format!("amount {amount:.2} matches entity value")))
    } else if rel <= AMOUNT_LOOSE {
        Some((
            weights.amount * 0.5,
            format!("amount {amount:.2} near entity value"),
        ))
    } else {
        None
    }
}
