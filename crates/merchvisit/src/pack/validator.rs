//! Structural validation of an imported job pack.
//!
//! Operates on the raw parsed JSON so that a document failing the
//! schema/version gate is rejected before any typed deserialization.
//! Returns human-readable error strings; an empty list means accepted.

use std::collections::HashSet;

use serde_json::Value;

use super::{PACK_SCHEMA, PACK_SCHEMA_VERSION};

/// Validates a parsed pack document. Pure function; the loader decides what
/// to do with the result.
///
/// The schema/version gate short-circuits: on mismatch exactly one error is
/// returned and no structural checks run. All other checks collect.
pub fn validate_pack(doc: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    // Schema/version gate. Everything below assumes this passed.
    let schema = doc.get("schema").and_then(Value::as_str).unwrap_or("");
    let version = doc.get("schemaVersion").and_then(Value::as_u64).unwrap_or(0);
    if schema != PACK_SCHEMA || version != PACK_SCHEMA_VERSION {
        return vec![format!(
            "Unsupported pack schema '{}' v{} (expected '{}' v{})",
            schema, version, PACK_SCHEMA, PACK_SCHEMA_VERSION
        )];
    }

    check_presence(doc, &mut errors);
    let store_ids = collect_string_set(doc, "stores", "sapId");
    let template_ids = collect_string_set(doc, "templates", "templateId");
    check_visits(doc, &store_ids, &template_ids, &mut errors);
    check_templates(doc, &mut errors);

    errors
}

fn check_presence(doc: &Value, errors: &mut Vec<String>) {
    for field in ["packId", "createdAt"] {
        if doc.get(field).and_then(Value::as_str).unwrap_or("").is_empty() {
            errors.push(format!("Pack: {} is required", field));
        }
    }

    if doc
        .pointer("/merch/id")
        .and_then(Value::as_str)
        .unwrap_or("")
        .is_empty()
    {
        errors.push("Pack: merch.id is required".to_string());
    }

    for field in ["stores", "templates", "visits"] {
        let non_empty = doc
            .get(field)
            .and_then(Value::as_array)
            .map(|a| !a.is_empty())
            .unwrap_or(false);
        if !non_empty {
            errors.push(format!("Pack: {} must be a non-empty array", field));
        }
    }
}

fn collect_string_set<'a>(doc: &'a Value, array: &str, field: &str) -> HashSet<&'a str> {
    doc.get(array)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.get(field).and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

fn check_visits(
    doc: &Value,
    store_ids: &HashSet<&str>,
    template_ids: &HashSet<&str>,
    errors: &mut Vec<String>,
) {
    let visits = match doc.get("visits").and_then(Value::as_array) {
        Some(v) => v,
        None => return,
    };

    for (i, visit) in visits.iter().enumerate() {
        let visit_id = visit.get("visitId").and_then(Value::as_str).unwrap_or("");
        let label = if visit_id.is_empty() {
            format!("Visit #{}", i + 1)
        } else {
            format!("Visit '{}'", visit_id)
        };

        for field in ["visitId", "sapId", "templateId", "date"] {
            if visit.get(field).and_then(Value::as_str).unwrap_or("").is_empty() {
                errors.push(format!("{}: {} is required", label, field));
            }
        }

        if let Some(sap_id) = visit.get("sapId").and_then(Value::as_str) {
            if !sap_id.is_empty() && !store_ids.contains(sap_id) {
                errors.push(format!("{}: unknown store '{}'", label, sap_id));
            }
        }
        if let Some(template_id) = visit.get("templateId").and_then(Value::as_str) {
            if !template_id.is_empty() && !template_ids.contains(template_id) {
                errors.push(format!("{}: unknown template '{}'", label, template_id));
            }
        }
    }
}

fn check_templates(doc: &Value, errors: &mut Vec<String>) {
    let templates = match doc.get("templates").and_then(Value::as_array) {
        Some(t) => t,
        None => return,
    };

    for (i, template) in templates.iter().enumerate() {
        let template_id = template
            .get("templateId")
            .and_then(Value::as_str)
            .unwrap_or("");
        let label = if template_id.is_empty() {
            errors.push(format!("Template #{}: templateId is required", i + 1));
            format!("Template #{}", i + 1)
        } else {
            format!("Template '{}'", template_id)
        };

        let mut seen: HashSet<&str> = HashSet::new();
        let mut duplicates: Vec<&str> = Vec::new();

        let blocks = template
            .get("blocks")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for block in &blocks {
            let questions = match block.get("questions").and_then(Value::as_array) {
                Some(q) => q,
                None => continue,
            };
            for question in questions {
                check_question(question, &label, errors);

                if let Some(key) = question.get("key").and_then(Value::as_str) {
                    if !key.is_empty() && !seen.insert(key) && !duplicates.contains(&key) {
                        duplicates.push(key);
                    }
                }
            }
        }

        // One aggregated error per template, naming every duplicate key.
        if !duplicates.is_empty() {
            errors.push(format!(
                "{}: duplicate question keys: {}",
                label,
                duplicates.join(", ")
            ));
        }
    }
}

fn check_question(question: &Value, template_label: &str, errors: &mut Vec<String>) {
    let key = question.get("key").and_then(Value::as_str).unwrap_or("");
    let kind = question.get("type").and_then(Value::as_str).unwrap_or("");

    if key.is_empty() {
        errors.push(format!("{}: question without a key", template_label));
    }
    if kind.is_empty() {
        errors.push(format!(
            "{}: question '{}' has no type",
            template_label, key
        ));
        return;
    }

    match kind {
        "select" => {
            let has_options = question
                .get("options")
                .and_then(Value::as_array)
                .map(|o| !o.is_empty())
                .unwrap_or(false);
            if !has_options {
                errors.push(format!(
                    "{}: select question '{}' must declare a non-empty options list",
                    template_label, key
                ));
            }
        }
        "furniture_trigger" => check_trigger(question, template_label, key, errors),
        _ => {}
    }
}

fn check_trigger(question: &Value, template_label: &str, key: &str, errors: &mut Vec<String>) {
    let trigger = match question.get("trigger") {
        Some(Value::Object(_)) => &question["trigger"],
        _ => {
            errors.push(format!(
                "{}: furniture_trigger question '{}' must declare a trigger object",
                template_label, key
            ));
            return;
        }
    };

    if trigger.get("kind").and_then(Value::as_str) != Some("furniture") {
        errors.push(format!(
            "{}: question '{}' trigger.kind must be \"furniture\"",
            template_label, key
        ));
    }

    let gate_count = trigger
        .get("gateOptions")
        .and_then(Value::as_array)
        .map(|a| a.len())
        .unwrap_or(0);
    if gate_count != 2 {
        errors.push(format!(
            "{}: question '{}' must declare exactly two gateOptions (found {})",
            template_label, key, gate_count
        ));
    }

    if trigger
        .get("whenValue")
        .and_then(Value::as_str)
        .unwrap_or("")
        .is_empty()
    {
        errors.push(format!(
            "{}: question '{}' trigger.whenValue is required",
            template_label, key
        ));
    }

    for field in ["photosMin", "photosMax"] {
        if trigger.get(field).map(|v| !v.is_u64()).unwrap_or(true) {
            errors.push(format!(
                "{}: question '{}' trigger.{} must be a number",
                template_label, key, field
            ));
        }
    }
}
