//! Evidence extraction from inbound email.
//!
//! `extract` is a pure function of the email plus a read-only reference
//! index built from the live entity table. It never fails: malformed or
//! empty bodies yield an empty evidence set. Candidate identifiers:
//! project codes, client names, currency amounts, known contact addresses.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::db::{DbEmail, DbEntity};

/// Client names shorter than this never match; common words like "the" or
/// "art" would otherwise light up on arbitrary prose.
const MIN_CLIENT_NAME_LEN: usize = 4;

/// Characters of context kept on each side of a matched substring when
/// excerpting the evidence snippet for reviewers.
const SNIPPET_CONTEXT: usize = 60;

fn code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Alphanumeric prefix + dash + digits, e.g. BK-033. Candidates are
    // validated against the live entity code set before becoming evidence.
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z]{2,5}-\d{2,5})\b").unwrap())
}

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\$|€|£|USD|EUR|GBP)\s?([0-9][0-9,]*(?:\.[0-9]{1,2})?)\b").unwrap()
    })
}

/// A single typed evidence item. `offset` is a byte offset into the
/// `subject + "\n" + body` haystack the set was extracted from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    ProjectCode {
        code: String,
        offset: usize,
    },
    ClientName {
        name: String,
        offset: usize,
    },
    Amount {
        raw: String,
        value: f64,
        currency: Option<String>,
        offset: usize,
    },
    Contact {
        email: String,
        offset: usize,
    },
}

impl Evidence {
    /// Stable token used to build the evidence pattern signature.
    pub fn pattern_token(&self) -> String {
        match self {
            Evidence::ProjectCode { code, .. } => format!("code:{}", code.to_lowercase()),
            Evidence::ClientName { name, .. } => format!("client:{}", name.to_lowercase()),
            Evidence::Amount { value, .. } => format!("amount:{value:.2}"),
            Evidence::Contact { email, .. } => format!("contact:{email}"),
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            Evidence::ProjectCode { offset, .. }
            | Evidence::ClientName { offset, .. }
            | Evidence::Amount { offset, .. }
            | Evidence::Contact { offset, .. } => *offset,
        }
    }
}

/// The evidence extracted from one email, plus the haystack offsets refer to.
#[derive(Debug, Clone, Default)]
pub struct EvidenceSet {
    pub items: Vec<Evidence>,
    haystack: String,
}

impl EvidenceSet {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn codes(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|e| match e {
                Evidence::ProjectCode { code, .. } => Some(code.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn client_names(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|e| match e {
                Evidence::ClientName { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn amounts(&self) -> Vec<f64> {
        self.items
            .iter()
            .filter_map(|e| match e {
                Evidence::Amount { value, .. } => Some(*value),
                _ => None,
            })
            .collect()
    }

    pub fn contacts(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|e| match e {
                Evidence::Contact { email, .. } => Some(email.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Order-independent signature of the evidence kinds and values.
    /// Stored on suggestions and labeled examples so the feedback loop can
    /// aggregate decisions per (entity, pattern) pair.
    pub fn pattern_key(&self) -> String {
        let tokens: BTreeSet<String> = self.items.iter().map(Evidence::pattern_token).collect();
        tokens.into_iter().collect::<Vec<_>>().join("|")
    }

    /// Text excerpt around the strongest evidence item, for the reviewer.
    /// Priority mirrors the matcher's weights: code, contact, client, amount.
    pub fn best_snippet(&self) -> String {
        let best = self
            .items
            .iter()
            .min_by_key(|e| match e {
                Evidence::ProjectCode { .. } => 0,
                Evidence::Contact { .. } => 1,
                Evidence::ClientName { .. } => 2,
                Evidence::Amount { .. } => 3,
            });
        match best {
            Some(evidence) => self.snippet_around(evidence.offset()),
            None => String::new(),
        }
    }

    fn snippet_around(&self, offset: usize) -> String {
        let start = offset.saturating_sub(SNIPPET_CONTEXT);
        let end = (offset + SNIPPET_CONTEXT).min(self.haystack.len());
        // Snap to char boundaries so multi-byte text can't split a char
        let start = floor_char_boundary(&self.haystack, start);
        let end = floor_char_boundary(&self.haystack, end);
        self.haystack[start..end].trim().replace('\n', " ")
    }
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Read-only dictionary of known codes, client names, and contacts built
/// from the live entity table. Rebuilt once per batch run.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    /// Uppercased entity codes.
    codes: HashSet<String>,
    /// Lowercased client names passing the minimum-length guard.
    clients: HashSet<String>,
    /// Lowercased contact address -> entity ids that list it.
    contacts: HashMap<String, Vec<String>>,
}

impl ReferenceIndex {
    pub fn from_entities(entities: &[DbEntity]) -> Self {
        let mut index = ReferenceIndex::default();
        for entity in entities {
            let code = entity.code.trim().to_uppercase();
            if !code.is_empty() {
                index.codes.insert(code);
            }
            if let Some(client) = &entity.client_name {
                let client = client.trim().to_lowercase();
                if client.len() >= MIN_CLIENT_NAME_LEN {
                    index.clients.insert(client);
                }
            }
            for contact in entity.contacts() {
                index
                    .contacts
                    .entry(contact)
                    .or_default()
                    .push(entity.id.clone());
            }
        }
        index
    }

    pub fn is_known_code(&self, code: &str) -> bool {
        self.codes.contains(&code.to_uppercase())
    }

    pub fn is_known_contact(&self, email: &str) -> bool {
        self.contacts.contains_key(&email.to_lowercase())
    }
}

/// Extract typed evidence from an email. Absence of evidence yields an
/// empty set, not an error.
pub fn extract(email: &DbEmail, index: &ReferenceIndex) -> EvidenceSet {
    let haystack = format!("{}\n{}", email.subject, email.body);
    let mut items = Vec::new();

    // Project codes, validated against the live entity table to avoid
    // false positives on arbitrary CODE-123 shaped text.
    let mut seen_codes = HashSet::new();
    for caps in code_re().captures_iter(&haystack) {
        let Some(m) = caps.get(1) else { continue };
        let code = m.as_str().to_uppercase();
        if index.is_known_code(&code) && seen_codes.insert(code.clone()) {
            items.push(Evidence::ProjectCode {
                code,
                offset: m.start(),
            });
        }
    }

    // Client names: case-insensitive substring over known names.
    let lower = haystack.to_lowercase();
    for client in &index.clients {
        if let Some(offset) = lower.find(client.as_str()) {
            items.push(Evidence::ClientName {
                name: client.clone(),
                offset,
            });
        }
    }

    // Currency amounts, normalized to decimal values.
    for caps in amount_re().captures_iter(&haystack) {
        let (Some(sym), Some(num)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let sym = sym.as_str();
        let Ok(value) = num.as_str().replace(',', "").parse::<f64>() else {
            continue;
        };
        items.push(Evidence::Amount {
            raw: format!("{}{}", sym, num.as_str()),
            value,
            currency: infer_currency(sym),
            offset: num.start(),
        });
    }

    // Known contacts: the sender plus any known address mentioned in the text.
    let sender = email.sender_email.trim().to_lowercase();
    let mut seen_contacts = HashSet::new();
    if index.is_known_contact(&sender) && seen_contacts.insert(sender.clone()) {
        items.push(Evidence::Contact {
            email: sender,
            offset: 0,
        });
    }
    for (contact, _) in index.contacts.iter() {
        if seen_contacts.contains(contact) {
            continue;
        }
        if let Some(offset) = lower.find(contact.as_str()) {
            seen_contacts.insert(contact.clone());
            items.push(Evidence::Contact {
                email: contact.clone(),
                offset,
            });
        }
    }

    EvidenceSet { items, haystack }
}

fn infer_currency(symbol: &str) -> Option<String> {
    let code = match symbol.to_uppercase().as_str() {
        "$" | "USD" => "USD",
        "€" | "EUR" => "EUR",
        "£" | "GBP" => "GBP",
        _ => return None,
    };
    Some(code.to_string())
}
