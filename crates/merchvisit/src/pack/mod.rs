//! Job-pack data model.
//!
//! A job pack is the immutable reference bundle imported before fieldwork:
//! stores, checklist templates, and scheduled visits. Once imported it is
//! read-only; a newly imported pack fully replaces the previous one.

use serde::{Deserialize, Serialize};

pub mod loader;
pub mod validator;

use crate::condition::DependsOn;

/// Expected top-level schema tag of an importable pack.
pub const PACK_SCHEMA: &str = "merch.pack";
/// Supported pack schema version.
pub const PACK_SCHEMA_VERSION: u64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPack {
    pub schema: String,
    pub schema_version: u64,
    pub pack_id: String,
    pub created_at: String,
    pub merch: Merch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub stores: Vec<StoreSite>,
    pub templates: Vec<Template>,
    pub visits: Vec<Visit>,
}

impl JobPack {
    pub fn store_by_sap(&self, sap_id: &str) -> Option<&StoreSite> {
        self.stores.iter().find(|s| s.sap_id == sap_id)
    }

    pub fn template_by_id(&self, template_id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.template_id == template_id)
    }

    pub fn visit_by_id(&self, visit_id: &str) -> Option<&Visit> {
        self.visits.iter().find(|v| v.visit_id == visit_id)
    }
}

/// The merchandiser this pack was issued to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Merch {
    pub id: String,
}

/// A retail store, identified by its stable external SAP id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSite {
    pub sap_id: String,
    pub name: String,
    pub retailer_id: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// A checklist template: ordered blocks of questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub template_id: String,
    #[serde(default = "default_version")]
    pub version: u64,
    pub blocks: Vec<Block>,
}

fn default_version() -> u64 {
    1
}

impl Template {
    /// Iterates questions across all blocks in template order.
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.blocks.iter().flat_map(|b| b.questions.iter())
    }

    pub fn question_by_key(&self, key: &str) -> Option<&Question> {
        self.questions().find(|q| q.key == key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub block_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub questions: Vec<Question>,
}

/// One checklist question. Common fields plus a closed tagged variant
/// carrying type-specific payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Non-empty list restricts visibility to these retailers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partner_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<DependsOn>,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl Question {
    /// Label for user-facing messages, falling back to the key.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum QuestionKind {
    /// Tri-state: unset / true / false.
    Checkbox,
    Text,
    Number {
        /// Presentation hint: render as an incrementing counter.
        #[serde(default)]
        counter: bool,
    },
    Select {
        options: Vec<String>,
        #[serde(default)]
        multi: bool,
    },
    Photo {
        photos_min: u32,
        photos_max: u32,
    },
    FurnitureTrigger {
        trigger: FurnitureTriggerSpec,
    },
}

/// Configuration of a gated furniture sub-form: a single-choice gate that,
/// when answered with `when_value`, opens a repeatable observation list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FurnitureTriggerSpec {
    pub kind: String,
    pub gate_options: Vec<String>,
    pub when_value: String,
    pub photos_min: u32,
    pub photos_max: u32,
    #[serde(default)]
    pub require_description: bool,
    #[serde(default)]
    pub allow_multiple: bool,
}

/// A scheduled visit from the pack. Scheduling data only; the mutable work
/// record is the draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub visit_id: String,
    pub sap_id: String,
    pub template_id: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// Pack-level lifecycle override; `planned` is implicit (absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<VisitStatus>,
}

impl Visit {
    /// True when the pack itself marks this visit as cancelled; no fieldwork
    /// can start on it.
    pub fn is_cancelled(&self) -> bool {
        self.status == Some(VisitStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitStatus {
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_tagged_by_type() {
        let json = r#"{
            "key": "fridge_count",
            "label": "Fridges on floor",
            "type": "number",
            "counter": true,
            "required": true
        }"#;

        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.key, "fridge_count");
        assert!(q.required);
        assert!(matches!(q.kind, QuestionKind::Number { counter: true }));
    }

    #[test]
    fn test_select_question_options() {
        let json = r#"{
            "key": "placement",
            "type": "select",
            "options": ["shelf", "endcap", "pallet"],
            "multi": true
        }"#;

        let q: Question = serde_json::from_str(json).unwrap();
        match q.kind {
            QuestionKind::Select { options, multi } => {
                assert_eq!(options.len(), 3);
                assert!(multi);
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_furniture_trigger_camel_case_fields() {
        let json = r#"{
            "key": "atyp",
            "type": "furniture_trigger",
            "trigger": {
                "kind": "furniture",
                "gateOptions": ["ANO", "NE"],
                "whenValue": "ANO",
                "photosMin": 1,
                "photosMax": 4,
                "requireDescription": true,
                "allowMultiple": true
            }
        }"#;

        let q: Question = serde_json::from_str(json).unwrap();
        match q.kind {
            QuestionKind::FurnitureTrigger { trigger } => {
                assert_eq!(trigger.when_value, "ANO");
                assert_eq!(trigger.gate_options, vec!["ANO", "NE"]);
                assert!(trigger.require_description);
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_photo_question_roundtrip() {
        let q = Question {
            key: "shelf_photo".to_string(),
            label: None,
            required: true,
            partner_ids: vec![],
            depends_on: None,
            kind: QuestionKind::Photo {
                photos_min: 2,
                photos_max: 2,
            },
        };

        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["type"], "photo");
        assert_eq!(json["photosMin"], 2);

        let back: Question = serde_json::from_value(json).unwrap();
        assert!(matches!(
            back.kind,
            QuestionKind::Photo {
                photos_min: 2,
                photos_max: 2
            }
        ));
    }

    #[test]
    fn test_store_active_defaults_true() {
        let json = r#"{"sapId": "S1", "name": "Praha 4", "retailerId": "tesco"}"#;
        let s: StoreSite = serde_json::from_str(json).unwrap();
        assert!(s.active);
    }
}
