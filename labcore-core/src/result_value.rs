//! Recorded result values and write-time value checks

use crate::diagnostic::Diagnostic;
use crate::error::{LabError, Result};
use crate::field::{FieldDefinition, ValueType};
use crate::ids::{FieldId, InstanceId};
use crate::reference_range::{self, parse_numeric};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single recorded answer for one (instance, field) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultValue {
    pub instance_id: InstanceId,
    pub field_id: FieldId,
    pub value: String,
    pub observation: Option<String>,
    /// Derived at write time, never supplied by the caller
    pub out_of_range: bool,
    pub updated_at: DateTime<Utc>,
}

impl ResultValue {
    pub fn has_value(&self) -> bool {
        !self.value.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSubmission {
    pub field_id: FieldId,
    pub value: String,
    #[serde(default)]
    pub observation: Option<String>,
}

impl ValueSubmission {
    pub fn new(field_id: FieldId, value: impl Into<String>) -> Self {
        Self {
            field_id,
            value: value.into(),
            observation: None,
        }
    }

    pub fn with_observation(mut self, observation: impl Into<String>) -> Self {
        self.observation = Some(observation.into());
        self
    }
}

/// Rejection detail for one item of a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionError {
    pub code: String,
    pub message: String,
}

impl From<&LabError> for SubmissionError {
    fn from(err: &LabError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub field_id: FieldId,
    pub accepted: bool,
    pub out_of_range: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SubmissionError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
}

impl SubmissionOutcome {
    pub fn accepted(field_id: FieldId, checked: &CheckedValue) -> Self {
        Self {
            field_id,
            accepted: true,
            out_of_range: checked.out_of_range,
            error: None,
            diagnostic: checked.diagnostic.clone(),
        }
    }

    pub fn rejected(field_id: FieldId, err: &LabError) -> Self {
        Self {
            field_id,
            accepted: false,
            out_of_range: false,
            error: Some(err.into()),
            diagnostic: None,
        }
    }
}

/// A submitted value after type checks, ready to persist
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedValue {
    pub value: String,
    pub out_of_range: bool,
    pub diagnostic: Option<Diagnostic>,
}

/// Check `raw` against `field` and derive its out-of-range flag.
///
/// Empty input is accepted for every type and clears the answer. Numeric
/// fields reject non-numeric input; select fields with options reject values
/// outside the list; boolean fields accept `true`/`false` only.
pub fn check_value(field: &FieldDefinition, raw: &str) -> Result<CheckedValue> {
    let attributes = &field.attributes;
    let trimmed = raw.trim();

    let value = if trimmed.is_empty() {
        String::new()
    } else {
        match attributes.value_type {
            ValueType::Number => {
                if parse_numeric(trimmed).is_none() {
                    return Err(LabError::InvalidValue {
                        field_id: field.id,
                        reason: format!("{:?} is not a number", trimmed),
                    });
                }
                trimmed.to_string()
            }
            ValueType::Select => {
                if !attributes.options.is_empty()
                    && !attributes.options.iter().any(|o| o.trim() == trimmed)
                {
                    return Err(LabError::InvalidValue {
                        field_id: field.id,
                        reason: format!("{:?} is not one of the allowed options", trimmed),
                    });
                }
                trimmed.to_string()
            }
            ValueType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                v @ ("true" | "false") => v.to_string(),
                _ => {
                    return Err(LabError::InvalidValue {
                        field_id: field.id,
                        reason: format!("{:?} is not true or false", trimmed),
                    });
                }
            },
            ValueType::Text => trimmed.to_string(),
            ValueType::LongText => raw.to_string(),
        }
    };

    let check = reference_range::evaluate(
        field.reference_expression(),
        attributes.value_type,
        &value,
    );

    Ok(CheckedValue {
        value,
        out_of_range: check.out_of_range(),
        diagnostic: check.diagnostic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticCode;
    use crate::field::FieldAttributes;
    use crate::ids::{ExamId, SlotId};

    fn field(attributes: FieldAttributes) -> FieldDefinition {
        FieldDefinition {
            id: FieldId(1),
            exam_id: ExamId(1),
            slot_id: SlotId(1),
            attributes,
            active: true,
            version: 1,
            retired_at: None,
            retirement_reason: None,
        }
    }

    #[test]
    fn test_numeric_value_flags() {
        let f1 = field(FieldAttributes::new("F1", ValueType::Number).with_reference("4-10"));
        let checked = check_value(&f1, " 7 ").unwrap();
        assert_eq!(checked.value, "7");
        assert!(!checked.out_of_range);
        assert!(check_value(&f1, "11").unwrap().out_of_range);
    }

    #[test]
    fn test_numeric_rejects_text() {
        let f1 = field(FieldAttributes::new("F1", ValueType::Number));
        let err = check_value(&f1, "positive").unwrap_err();
        assert_eq!(err.code(), "invalid-value");
    }

    #[test]
    fn test_empty_value_clears() {
        let f1 = field(FieldAttributes::new("F1", ValueType::Number).with_reference("4-10"));
        let checked = check_value(&f1, "   ").unwrap();
        assert_eq!(checked.value, "");
        assert!(!checked.out_of_range);
    }

    #[test]
    fn test_select_options() {
        let f = field(
            FieldAttributes::new("Color", ValueType::Select).with_options(["Yellow", "Amber"]),
        );
        assert_eq!(check_value(&f, "Amber").unwrap().value, "Amber");
        assert!(check_value(&f, "Purple").is_err());

        let open = field(FieldAttributes::new("Aspect", ValueType::Select));
        assert!(check_value(&open, "Cloudy").is_ok());
    }

    #[test]
    fn test_boolean_normalized() {
        let f = field(FieldAttributes::new("Fasting", ValueType::Boolean));
        assert_eq!(check_value(&f, "TRUE").unwrap().value, "true");
        assert!(check_value(&f, "maybe").is_err());
    }

    #[test]
    fn test_malformed_reference_surfaces_diagnostic() {
        let f = field(FieldAttributes::new("F", ValueType::Number).with_reference("see notes"));
        let checked = check_value(&f, "3").unwrap();
        assert!(!checked.out_of_range);
        assert_eq!(
            checked.diagnostic.map(|d| d.code),
            Some(DiagnosticCode::MalformedReferenceExpression)
        );
    }

    #[test]
    fn test_text_ignores_reference() {
        let f = field(FieldAttributes::new("Comment", ValueType::Text).with_reference("4-10"));
        assert!(!check_value(&f, "500").unwrap().out_of_range);
    }
}
