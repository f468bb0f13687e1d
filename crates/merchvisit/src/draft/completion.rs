//! Completion validation: the gate between `open` and `done`.
//!
//! Walks every question of the draft's template in block order, skips
//! inactive ones (partner visibility and `dependsOn`), and applies a
//! type-specific required/bounds check. All applicable errors are collected;
//! the repository surfaces the first and logs the rest.

use crate::condition::{is_active, is_visible_for_partner};
use crate::draft::{AnswerValue, Draft};
use crate::pack::{JobPack, Question, QuestionKind};

/// Validates a draft against its template. A draft whose template cannot be
/// resolved is a fatal pack/draft inconsistency and fails fast with a single
/// error.
pub fn validate_draft(pack: &JobPack, draft: &Draft) -> Vec<String> {
    let template = match pack.template_by_id(&draft.template_id) {
        Some(t) => t,
        None => {
            return vec![format!(
                "Template '{}' for visit '{}' is not in the current pack",
                draft.template_id, draft.visit_id
            )]
        }
    };

    let mut errors = Vec::new();
    for question in template.questions() {
        if !is_visible_for_partner(draft, question) || !is_active(draft, question) {
            continue;
        }
        check_question(draft, question, &mut errors);
    }
    errors
}

fn check_question(draft: &Draft, question: &Question, errors: &mut Vec<String>) {
    let label = question.display_label();
    let answer = draft.answer(&question.key);

    match &question.kind {
        QuestionKind::Checkbox => {
            if question.required && !matches!(answer, Some(AnswerValue::Bool(_))) {
                errors.push(format!("'{}' must be answered yes or no", label));
            }
        }
        QuestionKind::Text => {
            if question.required {
                let filled = answer
                    .and_then(AnswerValue::as_str)
                    .map(|s| !s.trim().is_empty())
                    .unwrap_or(false);
                if !filled {
                    errors.push(format!("'{}' must not be empty", label));
                }
            }
        }
        QuestionKind::Number { .. } => {
            if question.required {
                let filled = answer
                    .and_then(AnswerValue::as_number)
                    .map(|n| n.is_finite())
                    .unwrap_or(false);
                if !filled {
                    errors.push(format!("'{}' requires a number", label));
                }
            }
        }
        QuestionKind::Select { multi, .. } => {
            if question.required {
                let filled = if *multi {
                    answer
                        .and_then(AnswerValue::as_multi)
                        .map(|v| !v.is_empty())
                        .unwrap_or(false)
                } else {
                    answer
                        .and_then(AnswerValue::as_str)
                        .map(|s| !s.is_empty())
                        .unwrap_or(false)
                };
                if !filled {
                    errors.push(format!("'{}' requires a selection", label));
                }
            }
        }
        QuestionKind::Photo {
            photos_min,
            photos_max,
        } => {
            let count = answer
                .and_then(AnswerValue::photo_ids)
                .map(|ids| ids.len() as u32)
                .unwrap_or(0);

            if question.required && count < *photos_min {
                errors.push(format!(
                    "'{}' requires at least {} photo(s), {} attached",
                    label, photos_min, count
                ));
            }
            // Upper bound holds regardless of `required` (defense in depth;
            // the repository already refuses over-max attachments).
            if count > *photos_max {
                errors.push(format!(
                    "'{}' allows at most {} photo(s), {} attached",
                    label, photos_max, count
                ));
            }
        }
        QuestionKind::FurnitureTrigger { trigger } => {
            let gate = answer.and_then(AnswerValue::as_str).unwrap_or("");

            if question.required && gate.is_empty() {
                errors.push(format!("'{}' must be answered", label));
            }

            if gate == trigger.when_value {
                check_observations(draft, label, trigger, errors);
            }
        }
    }
}

fn check_observations(
    draft: &Draft,
    label: &str,
    trigger: &crate::pack::FurnitureTriggerSpec,
    errors: &mut Vec<String>,
) {
    if draft.furniture_observations.is_empty() {
        errors.push(format!("'{}': must add at least one record", label));
        return;
    }

    for (i, obs) in draft.furniture_observations.iter().enumerate() {
        let n = i + 1;
        let count = obs.photo_ids.len() as u32;

        if count < trigger.photos_min || count > trigger.photos_max {
            errors.push(format!(
                "'{}' record #{}: needs {}-{} photo(s), {} attached",
                label, n, trigger.photos_min, trigger.photos_max, count
            ));
        }

        if trigger.require_description
            && obs.description.trim().is_empty()
            && obs.atyp_label.trim().is_empty()
        {
            errors.push(format!(
                "'{}' record #{}: a description or label is required",
                label, n
            ));
        }

        if trigger.allow_multiple && obs.quantity < 1 {
            errors.push(format!(
                "'{}' record #{}: quantity must be at least 1",
                label, n
            ));
        }
    }
}
