//! Completion predicate for request exam instances
//!
//! Stateless: recompute from current fields and values on every call.

use crate::aggregate::AggregatedField;
use crate::ids::FieldId;
use crate::instance::RequestExamInstance;
use crate::result_value::ResultValue;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReport {
    pub complete: bool,
    /// Required fields still lacking a non-empty value
    pub missing_fields: Vec<FieldId>,
    /// True when completion was decided by the legacy free-text result
    pub legacy: bool,
}

/// Evaluate completion of `instance` given its aggregated fields and values.
///
/// An exam without any aggregated fields is complete when the instance
/// carries a non-empty legacy result. Otherwise every required field must
/// have a non-empty value; optional fields are ignored.
pub fn evaluate(
    instance: &RequestExamInstance,
    fields: &[AggregatedField],
    values: &[ResultValue],
) -> CompletionReport {
    if fields.is_empty() {
        return CompletionReport {
            complete: instance.has_legacy_result(),
            missing_fields: Vec::new(),
            legacy: true,
        };
    }

    let answered: HashSet<FieldId> = values
        .iter()
        .filter(|v| v.instance_id == instance.id && v.has_value())
        .map(|v| v.field_id)
        .collect();

    let missing_fields: Vec<FieldId> = fields
        .iter()
        .filter(|f| f.required && !answered.contains(&f.field_id))
        .map(|f| f.field_id)
        .collect();

    CompletionReport {
        complete: missing_fields.is_empty(),
        missing_fields,
        legacy: false,
    }
}

pub fn is_complete(
    instance: &RequestExamInstance,
    fields: &[AggregatedField],
    values: &[ResultValue],
) -> bool {
    evaluate(instance, fields, values).complete
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ValueType;
    use crate::ids::{ExamId, InstanceId, SlotId};
    use crate::instance::InstanceStatus;
    use chrono::Utc;

    fn instance(legacy: Option<&str>) -> RequestExamInstance {
        RequestExamInstance {
            id: InstanceId(1),
            request_ref: "REQ-7".to_string(),
            exam_id: ExamId(1),
            status: InstanceStatus::InProcess,
            legacy_result: legacy.map(str::to_string),
            completed_at: None,
            recorded_by: None,
            created_at: Utc::now(),
        }
    }

    fn field(id: i64, required: bool) -> AggregatedField {
        AggregatedField {
            field_id: FieldId(id),
            slot_id: SlotId(id),
            name: format!("F{}", id),
            value_type: ValueType::Number,
            unit: None,
            reference_expression: None,
            required,
            options: Vec::new(),
            order: 0,
            section: "General".to_string(),
            is_own_field: true,
            origin_exam_id: ExamId(1),
            origin_exam_name: "E".to_string(),
            version: 1,
            active: true,
        }
    }

    fn value(field_id: i64, value: &str) -> ResultValue {
        ResultValue {
            instance_id: InstanceId(1),
            field_id: FieldId(field_id),
            value: value.to_string(),
            observation: None,
            out_of_range: false,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_required_fields_must_have_values() {
        let fields = vec![field(1, true), field(2, true), field(3, false)];
        let report = evaluate(&instance(None), &fields, &[value(1, "7")]);
        assert!(!report.complete);
        assert_eq!(report.missing_fields, vec![FieldId(2)]);

        assert!(is_complete(&instance(None), &fields, &[value(1, "7"), value(2, "normal")]));
    }

    #[test]
    fn test_blank_value_does_not_count() {
        let fields = vec![field(1, true)];
        assert!(!is_complete(&instance(None), &fields, &[value(1, "  ")]));
    }

    #[test]
    fn test_values_of_other_instances_ignored() {
        let fields = vec![field(1, true)];
        let mut foreign = value(1, "7");
        foreign.instance_id = InstanceId(2);
        assert!(!is_complete(&instance(None), &fields, &[foreign]));
    }

    #[test]
    fn test_no_required_fields_is_complete() {
        let fields = vec![field(1, false)];
        assert!(is_complete(&instance(None), &fields, &[]));
    }

    #[test]
    fn test_legacy_exam_uses_free_text_result() {
        let report = evaluate(&instance(None), &[], &[]);
        assert!(report.legacy);
        assert!(!report.complete);
        assert!(is_complete(&instance(Some("Negative")), &[], &[]));
        assert!(!is_complete(&instance(Some(" ")), &[], &[]));
    }
}
