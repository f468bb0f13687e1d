//! Conditional-question evaluation.
//!
//! A question with no `dependsOn` is always active. `dependsOn` is either a
//! single condition, `{all: [...]}` (conjunction), or `{any: [...]}`
//! (disjunction). Conditions compare a referenced question's current answer
//! against a literal value. Unknown operators evaluate as active so that
//! packs authored for a newer client degrade gracefully instead of hiding
//! questions.
//!
//! Partner visibility (`partnerIds`) is a second, independent gate applied
//! before and regardless of `dependsOn`; both must pass.

use serde::Serialize;
use serde_json::Value;

use crate::draft::{AnswerValue, Draft};
use crate::pack::Question;

/// A visibility predicate over other questions' answers.
#[derive(Debug, Clone)]
pub enum DependsOn {
    Single(Condition),
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

/// Custom serialization mirroring the deserializer: a bare condition object
/// for `Single`, `{all: [...]}` / `{any: [...]}` for the compounds, so a
/// persisted pack round-trips.
impl Serialize for DependsOn {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        match self {
            DependsOn::Single(c) => c.serialize(serializer),
            DependsOn::All(cs) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("all", cs)?;
                map.end()
            }
            DependsOn::Any(cs) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("any", cs)?;
                map.end()
            }
        }
    }
}

/// Custom deserialization: compound shapes are keyed by the presence of
/// `all`/`any`; everything else is a single condition object.
impl<'de> serde::Deserialize<'de> for DependsOn {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let value = Value::deserialize(deserializer)?;

        if let Value::Object(map) = &value {
            if let Some(all) = map.get("all") {
                let conditions: Vec<Condition> = serde_json::from_value(all.clone())
                    .map_err(|e| D::Error::custom(format!("Invalid 'all' conditions: {}", e)))?;
                return Ok(DependsOn::All(conditions));
            }
            if let Some(any) = map.get("any") {
                let conditions: Vec<Condition> = serde_json::from_value(any.clone())
                    .map_err(|e| D::Error::custom(format!("Invalid 'any' conditions: {}", e)))?;
                return Ok(DependsOn::Any(conditions));
            }
            let single: Condition = serde_json::from_value(value)
                .map_err(|e| D::Error::custom(format!("Invalid condition: {}", e)))?;
            return Ok(DependsOn::Single(single));
        }

        Err(D::Error::custom("dependsOn must be an object"))
    }
}

/// One comparison against the answer stored under `key`.
///
/// The operator is kept as the raw pack string so that unknown operators
/// survive a persist/reload round trip; it is parsed at evaluation time.
#[derive(Debug, Clone, Serialize)]
pub struct Condition {
    pub key: String,
    pub op: String,
    #[serde(default)]
    pub value: Value,
}

/// Custom deserialization normalizing the legacy shorthand forms
/// `{key, equals: v}` and `{key, notEquals: v}` into `{key, op, value}`.
impl<'de> serde::Deserialize<'de> for Condition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let value = Value::deserialize(deserializer)?;
        let map = match &value {
            Value::Object(map) => map,
            _ => return Err(D::Error::custom("condition must be an object")),
        };

        let key = map
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| D::Error::custom("condition requires a string 'key'"))?
            .to_string();

        if let Some(v) = map.get("equals") {
            return Ok(Condition {
                key,
                op: "eq".to_string(),
                value: v.clone(),
            });
        }
        if let Some(v) = map.get("notEquals") {
            return Ok(Condition {
                key,
                op: "neq".to_string(),
                value: v.clone(),
            });
        }

        let op = map
            .get("op")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let value = map.get("value").cloned().unwrap_or(Value::Null);

        Ok(Condition { key, op, value })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOp {
    Eq,
    Neq,
    In,
    Truthy,
    Falsy,
    Unknown,
}

impl ConditionOp {
    pub fn parse(op: &str) -> Self {
        match op {
            "eq" => ConditionOp::Eq,
            "neq" => ConditionOp::Neq,
            "in" => ConditionOp::In,
            "truthy" => ConditionOp::Truthy,
            "falsy" => ConditionOp::Falsy,
            _ => ConditionOp::Unknown,
        }
    }
}

/// True when the question is visible for the draft's retailer: an empty
/// `partnerIds` list means no restriction.
pub fn is_visible_for_partner(draft: &Draft, question: &Question) -> bool {
    question.partner_ids.is_empty()
        || question
            .partner_ids
            .iter()
            .any(|p| p == &draft.retailer_id)
}

/// True when the question's `dependsOn` predicate holds against the draft's
/// current answers. A question with no predicate is always active.
pub fn is_active(draft: &Draft, question: &Question) -> bool {
    match &question.depends_on {
        None => true,
        Some(DependsOn::Single(c)) => eval_condition(draft, c),
        Some(DependsOn::All(cs)) => cs.iter().all(|c| eval_condition(draft, c)),
        Some(DependsOn::Any(cs)) => cs.iter().any(|c| eval_condition(draft, c)),
    }
}

fn eval_condition(draft: &Draft, condition: &Condition) -> bool {
    let answer = draft.answer(&condition.key);

    match ConditionOp::parse(&condition.op) {
        ConditionOp::Eq => eq_test(answer, &condition.value),
        ConditionOp::Neq => !eq_test(answer, &condition.value),
        ConditionOp::In => in_test(answer, &condition.value),
        ConditionOp::Truthy => answer.map(is_truthy).unwrap_or(false),
        ConditionOp::Falsy => !answer.map(is_truthy).unwrap_or(false),
        // Fail open: an operator this client does not know must not hide
        // questions authored for a newer one.
        ConditionOp::Unknown => {
            log::debug!(
                "Unknown condition operator '{}' on key '{}'; treating as active",
                condition.op,
                condition.key
            );
            true
        }
    }
}

/// Maps a literal yes/no token onto a boolean. Packs authored against
/// checkbox answers often carry the original Czech tokens. Only applied when
/// the answer side is a boolean; string answers compare by identity.
fn yes_no_token(s: &str) -> Option<bool> {
    let t = s.trim();
    if t.eq_ignore_ascii_case("yes") || t.eq_ignore_ascii_case("ano") {
        return Some(true);
    }
    if t.eq_ignore_ascii_case("no") || t.eq_ignore_ascii_case("ne") {
        return Some(false);
    }
    None
}

/// `eq` semantics: array answers test membership, scalars test equality.
fn eq_test(answer: Option<&AnswerValue>, value: &Value) -> bool {
    match answer {
        None => false,
        Some(AnswerValue::Multi(items)) => match value {
            Value::String(s) => items.iter().any(|i| i == s),
            _ => false,
        },
        Some(scalar) => scalar_eq(scalar, value),
    }
}

/// `in` semantics: the condition value must be an array; array answers test
/// intersection, scalars test membership. A non-array value never matches.
fn in_test(answer: Option<&AnswerValue>, value: &Value) -> bool {
    let candidates = match value {
        Value::Array(items) => items,
        _ => {
            log::debug!("'in' condition value is not an array; evaluating false");
            return false;
        }
    };

    match answer {
        None => false,
        Some(AnswerValue::Multi(items)) => candidates
            .iter()
            .filter_map(Value::as_str)
            .any(|c| items.iter().any(|i| i == c)),
        Some(scalar) => candidates.iter().any(|c| scalar_eq(scalar, c)),
    }
}

fn scalar_eq(answer: &AnswerValue, value: &Value) -> bool {
    match (answer, value) {
        (AnswerValue::Bool(a), Value::Bool(b)) => a == b,
        (AnswerValue::Bool(a), Value::String(s)) => {
            yes_no_token(s).map(|b| *a == b).unwrap_or(false)
        }
        (AnswerValue::Text(a), Value::String(b)) => a == b,
        (AnswerValue::Number(a), Value::Number(b)) => b.as_f64().map(|b| *a == b).unwrap_or(false),
        // Photo objects and cross-type comparisons never compare equal.
        _ => false,
    }
}

/// Per-shape truthiness: arrays are truthy when non-empty, strings when
/// non-blank, photo answers when they reference at least one photo.
/// `falsy` is the exact complement of this test for every shape.
pub fn is_truthy(value: &AnswerValue) -> bool {
    match value {
        AnswerValue::Bool(b) => *b,
        AnswerValue::Number(n) => *n != 0.0 && !n.is_nan(),
        AnswerValue::Text(s) => !s.trim().is_empty(),
        AnswerValue::Multi(items) => !items.is_empty(),
        AnswerValue::Photos { photo_ids } => !photo_ids.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::DraftStatus;
    use crate::pack::QuestionKind;
    use std::collections::BTreeMap;

    fn draft_with(answers: Vec<(&str, AnswerValue)>) -> Draft {
        Draft {
            visit_id: "v1".to_string(),
            sap_id: "S1".to_string(),
            template_id: "t1".to_string(),
            status: DraftStatus::Open,
            answers: answers
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
            furniture_observations: vec![],
            started_at: "2024-01-10T08:00:00Z".to_string(),
            updated_at: "2024-01-10T08:00:00Z".to_string(),
            submitted_at: None,
            cancel_reason: None,
            store_name: "Praha 4".to_string(),
            retailer_id: "tesco".to_string(),
            template_version: 1,
            date: "2024-01-10".to_string(),
        }
    }

    fn question(depends_on: Option<DependsOn>) -> Question {
        Question {
            key: "q".to_string(),
            label: None,
            required: false,
            partner_ids: vec![],
            depends_on,
            kind: QuestionKind::Text,
        }
    }

    fn cond(key: &str, op: &str, value: Value) -> Condition {
        Condition {
            key: key.to_string(),
            op: op.to_string(),
            value,
        }
    }

    #[test]
    fn test_no_depends_on_is_always_active() {
        let draft = draft_with(vec![]);
        assert!(is_active(&draft, &question(None)));
    }

    #[test]
    fn test_gate_equality_flips_with_answer() {
        let q = question(Some(DependsOn::Single(cond(
            "gate",
            "eq",
            Value::String("ANO".to_string()),
        ))));

        let yes = draft_with(vec![("gate", AnswerValue::Text("ANO".to_string()))]);
        assert!(is_active(&yes, &q));

        let no = draft_with(vec![("gate", AnswerValue::Text("NE".to_string()))]);
        assert!(!is_active(&no, &q));
    }

    #[test]
    fn test_eq_on_array_answer_tests_membership() {
        let q = question(Some(DependsOn::Single(cond(
            "placement",
            "eq",
            Value::String("endcap".to_string()),
        ))));

        let draft = draft_with(vec![(
            "placement",
            AnswerValue::Multi(vec!["shelf".to_string(), "endcap".to_string()]),
        )]);
        assert!(is_active(&draft, &q));
    }

    #[test]
    fn test_neq_negates_eq_including_missing_answer() {
        let q = question(Some(DependsOn::Single(cond(
            "gate",
            "neq",
            Value::String("ANO".to_string()),
        ))));

        // Missing answer: eq is false, so neq is true.
        let empty = draft_with(vec![]);
        assert!(is_active(&empty, &q));

        let yes = draft_with(vec![("gate", AnswerValue::Text("ANO".to_string()))]);
        assert!(!is_active(&yes, &q));
    }

    #[test]
    fn test_in_intersects_arrays_and_tests_scalars() {
        let value = serde_json::json!(["a", "b"]);
        let q = question(Some(DependsOn::Single(cond("k", "in", value))));

        let scalar = draft_with(vec![("k", AnswerValue::Text("b".to_string()))]);
        assert!(is_active(&scalar, &q));

        let multi = draft_with(vec![(
            "k",
            AnswerValue::Multi(vec!["x".to_string(), "a".to_string()]),
        )]);
        assert!(is_active(&multi, &q));

        let miss = draft_with(vec![("k", AnswerValue::Text("z".to_string()))]);
        assert!(!is_active(&miss, &q));
    }

    #[test]
    fn test_in_with_non_array_value_is_false() {
        let q = question(Some(DependsOn::Single(cond(
            "k",
            "in",
            Value::String("a".to_string()),
        ))));
        let draft = draft_with(vec![("k", AnswerValue::Text("a".to_string()))]);
        assert!(!is_active(&draft, &q));
    }

    #[test]
    fn test_truthy_falsy_are_exact_complements() {
        let shapes = vec![
            AnswerValue::Bool(true),
            AnswerValue::Bool(false),
            AnswerValue::Number(0.0),
            AnswerValue::Number(2.0),
            AnswerValue::Text(String::new()),
            AnswerValue::Text("  ".to_string()),
            AnswerValue::Text("x".to_string()),
            AnswerValue::Multi(vec![]),
            AnswerValue::Multi(vec!["a".to_string()]),
            AnswerValue::Photos { photo_ids: vec![] },
            AnswerValue::Photos {
                photo_ids: vec!["p1".to_string()],
            },
        ];

        for shape in shapes {
            let truthy_q = question(Some(DependsOn::Single(cond("k", "truthy", Value::Null))));
            let falsy_q = question(Some(DependsOn::Single(cond("k", "falsy", Value::Null))));
            let draft = draft_with(vec![("k", shape.clone())]);

            let t = is_active(&draft, &truthy_q);
            let f = is_active(&draft, &falsy_q);
            assert!(t != f, "truthy/falsy not complementary for {:?}", shape);
        }
    }

    #[test]
    fn test_unknown_operator_fails_open() {
        let q = question(Some(DependsOn::Single(cond(
            "k",
            "startsWith",
            Value::String("x".to_string()),
        ))));
        let draft = draft_with(vec![]);
        assert!(is_active(&draft, &q));
    }

    #[test]
    fn test_all_and_any_combinators() {
        let a = cond("a", "truthy", Value::Null);
        let b = cond("b", "truthy", Value::Null);

        let all_q = question(Some(DependsOn::All(vec![a.clone(), b.clone()])));
        let any_q = question(Some(DependsOn::Any(vec![a, b])));

        let only_a = draft_with(vec![("a", AnswerValue::Bool(true))]);
        assert!(!is_active(&only_a, &all_q));
        assert!(is_active(&only_a, &any_q));

        let both = draft_with(vec![
            ("a", AnswerValue::Bool(true)),
            ("b", AnswerValue::Bool(true)),
        ]);
        assert!(is_active(&both, &all_q));
    }

    #[test]
    fn test_token_values_match_both_string_and_checkbox_answers() {
        let q = question(Some(DependsOn::Single(cond(
            "gate",
            "eq",
            Value::String("ANO".to_string()),
        ))));

        // A text/select gate holding the literal token matches by identity.
        let text = draft_with(vec![("gate", AnswerValue::Text("ANO".to_string()))]);
        assert!(is_active(&text, &q));
        let text_off = draft_with(vec![("gate", AnswerValue::Text("NE".to_string()))]);
        assert!(!is_active(&text_off, &q));

        // A checkbox against the same condition coerces the token instead.
        let checked = draft_with(vec![("gate", AnswerValue::Bool(true))]);
        assert!(is_active(&checked, &q));
        let unchecked = draft_with(vec![("gate", AnswerValue::Bool(false))]);
        assert!(!is_active(&unchecked, &q));
    }

    #[test]
    fn test_yes_no_tokens_normalize_to_booleans() {
        let q = question(Some(DependsOn::Single(cond(
            "chk",
            "eq",
            Value::String("ANO".to_string()),
        ))));
        let draft = draft_with(vec![("chk", AnswerValue::Bool(true))]);
        assert!(is_active(&draft, &q));

        let q_no = question(Some(DependsOn::Single(cond(
            "chk",
            "eq",
            Value::String("no".to_string()),
        ))));
        let draft_false = draft_with(vec![("chk", AnswerValue::Bool(false))]);
        assert!(is_active(&draft_false, &q_no));
    }

    #[test]
    fn test_partner_visibility_gate() {
        let mut q = question(None);
        q.partner_ids = vec!["albert".to_string(), "billa".to_string()];

        let draft = draft_with(vec![]); // retailer_id = tesco
        assert!(!is_visible_for_partner(&draft, &q));

        q.partner_ids = vec!["tesco".to_string()];
        assert!(is_visible_for_partner(&draft, &q));

        q.partner_ids = vec![];
        assert!(is_visible_for_partner(&draft, &q));
    }

    #[test]
    fn test_depends_on_deserializes_compound_and_shorthand() {
        let single: DependsOn =
            serde_json::from_str(r#"{"key": "gate", "equals": "ANO"}"#).unwrap();
        match single {
            DependsOn::Single(c) => {
                assert_eq!(c.op, "eq");
                assert_eq!(c.value, Value::String("ANO".to_string()));
            }
            other => panic!("unexpected: {:?}", other),
        }

        let all: DependsOn = serde_json::from_str(
            r#"{"all": [{"key": "a", "op": "truthy"}, {"key": "b", "notEquals": 3}]}"#,
        )
        .unwrap();
        match all {
            DependsOn::All(cs) => {
                assert_eq!(cs.len(), 2);
                assert_eq!(cs[1].op, "neq");
            }
            other => panic!("unexpected: {:?}", other),
        }

        let any: DependsOn =
            serde_json::from_str(r#"{"any": [{"key": "a", "op": "eq", "value": 1}]}"#).unwrap();
        assert!(matches!(any, DependsOn::Any(ref cs) if cs.len() == 1));
    }
}
