//! Draft data model — the mutable per-visit work record.
//!
//! One draft per visit, created lazily on first open. Mutations happen only
//! while `open`; `done` and `cancelled` are terminal and immutable except
//! for being read by the export packager.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod completion;
pub mod repo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    Open,
    Done,
    Cancelled,
}

impl DraftStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DraftStatus::Done | DraftStatus::Cancelled)
    }
}

/// An answer to a single question. Untagged on the wire: the JSON shape
/// discriminates the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Multi(Vec<String>),
    #[serde(rename_all = "camelCase")]
    Photos { photo_ids: Vec<String> },
}

impl AnswerValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnswerValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AnswerValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_multi(&self) -> Option<&[String]> {
        match self {
            AnswerValue::Multi(v) => Some(v),
            _ => None,
        }
    }

    pub fn photo_ids(&self) -> Option<&[String]> {
        match self {
            AnswerValue::Photos { photo_ids } => Some(photo_ids),
            _ => None,
        }
    }
}

/// One atypical-furniture observation inside a triggered sub-form.
/// Exclusively owned by its parent draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FurnitureObservation {
    pub id: String,
    #[serde(default)]
    pub atyp_label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub photo_ids: Vec<String>,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub visit_id: String,
    pub sap_id: String,
    pub template_id: String,
    pub status: DraftStatus,
    #[serde(default)]
    pub answers: BTreeMap<String, AnswerValue>,
    #[serde(default)]
    pub furniture_observations: Vec<FurnitureObservation>,
    pub started_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    // Denormalized at creation time so exports stay stable even if a later
    // pack changes store or template metadata.
    pub store_name: String,
    pub retailer_id: String,
    pub template_version: u64,
    pub date: String,
}

impl Draft {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn answer(&self, key: &str) -> Option<&AnswerValue> {
        self.answers.get(key)
    }

    /// All photo ids referenced by this draft's answers and observations,
    /// deduplicated, in first-reference order.
    pub fn referenced_photo_ids(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();

        for value in self.answers.values() {
            if let Some(ids) = value.photo_ids() {
                for id in ids {
                    if seen.insert(id.clone()) {
                        out.push(id.clone());
                    }
                }
            }
        }
        for obs in &self.furniture_observations {
            for id in &obs.photo_ids {
                if seen.insert(id.clone()) {
                    out.push(id.clone());
                }
            }
        }

        out
    }
}
