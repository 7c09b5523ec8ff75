//! Versioned field definitions
//!
//! A field slot is an append-only chain of definition rows. Revising a field
//! retires the head and appends a new row; superseded rows stay addressable
//! so historical result values keep resolving.

use crate::ids::{ExamId, FieldId, SlotId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Section name used when a field carries no section label
pub const DEFAULT_SECTION: &str = "General";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Number,
    Text,
    Select,
    Boolean,
    #[serde(rename = "long-text", alias = "long_text")]
    LongText,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Number => "number",
            ValueType::Text => "text",
            ValueType::Select => "select",
            ValueType::Boolean => "boolean",
            ValueType::LongText => "long-text",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Number)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "number" | "numeric" => Ok(ValueType::Number),
            "text" => Ok(ValueType::Text),
            "select" => Ok(ValueType::Select),
            "boolean" | "bool" => Ok(ValueType::Boolean),
            "long_text" | "long-text" | "textarea" => Ok(ValueType::LongText),
            other => Err(format!("Unknown value type: {}", other)),
        }
    }
}

/// Editable attributes of a field definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldAttributes {
    pub name: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub reference_expression: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub section: Option<String>,
}

impl FieldAttributes {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            unit: None,
            reference_expression: None,
            options: Vec::new(),
            required: false,
            order: 0,
            section: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_reference(mut self, expression: impl Into<String>) -> Self {
        self.reference_expression = Some(expression.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn in_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }
}

/// One version of a field slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: FieldId,
    pub exam_id: ExamId,
    pub slot_id: SlotId,
    #[serde(flatten)]
    pub attributes: FieldAttributes,
    pub active: bool,
    pub version: i32,
    pub retired_at: Option<DateTime<Utc>>,
    pub retirement_reason: Option<String>,
}

impl FieldDefinition {
    /// Section label, falling back to the default section
    pub fn section_name(&self) -> &str {
        self.attributes
            .section
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SECTION)
    }

    pub fn is_required(&self) -> bool {
        self.attributes.required
    }

    pub fn reference_expression(&self) -> &str {
        self.attributes.reference_expression.as_deref().unwrap_or("")
    }
}

/// Successor row produced by a revision, before it is persisted
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRevision {
    pub exam_id: ExamId,
    pub slot_id: SlotId,
    pub version: i32,
    pub attributes: FieldAttributes,
}

impl FieldRevision {
    /// Plan the next version of `current`.
    ///
    /// Only the active head of a slot can be revised.
    pub fn plan(current: &FieldDefinition, attributes: FieldAttributes) -> Option<Self> {
        if !current.active {
            return None;
        }
        Some(Self {
            exam_id: current.exam_id,
            slot_id: current.slot_id,
            version: current.version + 1,
            attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_text_wire_names() {
        let parsed: ValueType = serde_json::from_str("\"long-text\"").unwrap();
        assert_eq!(parsed, ValueType::LongText);
        let legacy: ValueType = serde_json::from_str("\"long_text\"").unwrap();
        assert_eq!(legacy, ValueType::LongText);
        assert_eq!(serde_json::to_string(&ValueType::LongText).unwrap(), "\"long-text\"");
        assert_eq!("long-text".parse::<ValueType>(), Ok(ValueType::LongText));
        assert_eq!(ValueType::LongText.to_string(), "long-text");
    }

    fn definition(active: bool) -> FieldDefinition {
        FieldDefinition {
            id: FieldId(10),
            exam_id: ExamId(1),
            slot_id: SlotId(10),
            attributes: FieldAttributes::new("Glucose", ValueType::Number)
                .with_unit("mg/dL")
                .with_reference("70-110"),
            active,
            version: 1,
            retired_at: None,
            retirement_reason: None,
        }
    }

    #[test]
    fn test_section_defaults_to_general() {
        let mut field = definition(true);
        assert_eq!(field.section_name(), DEFAULT_SECTION);
        field.attributes.section = Some("  ".to_string());
        assert_eq!(field.section_name(), DEFAULT_SECTION);
        field.attributes.section = Some("Chemistry".to_string());
        assert_eq!(field.section_name(), "Chemistry");
    }

    #[test]
    fn test_value_type_parse() {
        assert_eq!("long-text".parse::<ValueType>().unwrap(), ValueType::LongText);
        assert_eq!("Number".parse::<ValueType>().unwrap(), ValueType::Number);
        assert!("date".parse::<ValueType>().is_err());
    }

    #[test]
    fn test_revision_plan_bumps_version_and_keeps_slot() {
        let current = definition(true);
        let revision = FieldRevision::plan(
            &current,
            FieldAttributes::new("Fasting glucose", ValueType::Number),
        )
        .unwrap();
        assert_eq!(revision.version, 2);
        assert_eq!(revision.slot_id, current.slot_id);
        assert_eq!(revision.exam_id, current.exam_id);
    }

    #[test]
    fn test_retired_field_cannot_be_revised() {
        let retired = definition(false);
        assert!(FieldRevision::plan(&retired, retired.attributes.clone()).is_none());
    }

    #[test]
    fn test_attributes_serialize_camel_case() {
        let json = serde_json::to_value(FieldAttributes::new("K", ValueType::LongText)).unwrap();
        assert_eq!(json["valueType"], "long_text");
        assert!(json.get("referenceExpression").is_some());
    }
}
