//! Field aggregation across exam composition
//!
//! Builds the ordered, section-grouped list of fields that apply to an exam:
//! its own fields, the directly-owned fields of its active components, or
//! both, depending on the exam kind. Composition is one level deep; a
//! component that is itself a panel contributes only the fields it owns.

use crate::catalog::{Exam, ExamKind};
use crate::field::{FieldDefinition, ValueType};
use crate::ids::{ExamId, FieldId, SlotId};
use serde::{Deserialize, Serialize};

/// Read access to the catalog needed by the aggregator
pub trait CatalogView {
    type Error;

    /// Active field definitions owned by `exam_id`
    fn own_active_fields(&self, exam_id: ExamId) -> Result<Vec<FieldDefinition>, Self::Error>;

    /// Component exams of `exam_id` through active links, in link order
    fn active_components(&self, exam_id: ExamId) -> Result<Vec<Exam>, Self::Error>;
}

/// A field as seen from one exam, tagged with the exam it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedField {
    pub field_id: FieldId,
    pub slot_id: SlotId,
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub unit: Option<String>,
    pub reference_expression: Option<String>,
    pub required: bool,
    pub options: Vec<String>,
    pub order: i32,
    pub section: String,
    pub is_own_field: bool,
    pub origin_exam_id: ExamId,
    pub origin_exam_name: String,
    pub version: i32,
    /// False for a retired definition shown only because a value exists
    pub active: bool,
}

impl AggregatedField {
    pub fn from_definition(definition: &FieldDefinition, origin: &Exam, is_own_field: bool) -> Self {
        let attributes = &definition.attributes;
        Self {
            field_id: definition.id,
            slot_id: definition.slot_id,
            name: attributes.name.clone(),
            value_type: attributes.value_type,
            unit: attributes.unit.clone(),
            reference_expression: attributes.reference_expression.clone(),
            required: attributes.required,
            options: attributes.options.clone(),
            order: attributes.order,
            section: definition.section_name().to_string(),
            is_own_field,
            origin_exam_id: origin.id,
            origin_exam_name: origin.name.clone(),
            version: definition.version,
            active: definition.active,
        }
    }

    pub fn is_historical(&self) -> bool {
        !self.active
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSection {
    pub section_name: String,
    pub fields: Vec<AggregatedField>,
}

/// Every field that applies to `exam`, stably ordered by display order.
///
/// Links on a simple exam and own fields on a composite exam are ignored,
/// since catalog data may have been edited out of band.
pub fn all_fields_for<C: CatalogView>(
    catalog: &C,
    exam: &Exam,
) -> Result<Vec<AggregatedField>, C::Error> {
    let (include_own, include_components) = match exam.kind {
        ExamKind::Simple => (true, false),
        ExamKind::Composite => (false, true),
        ExamKind::Hybrid => (true, true),
    };

    let mut fields = Vec::new();

    if include_own {
        for definition in catalog.own_active_fields(exam.id)? {
            fields.push(AggregatedField::from_definition(&definition, exam, true));
        }
    }

    if include_components {
        for component in catalog.active_components(exam.id)? {
            for definition in catalog.own_active_fields(component.id)? {
                fields.push(AggregatedField::from_definition(&definition, &component, false));
            }
        }
    }

    sort_by_order(&mut fields);
    Ok(fields)
}

/// Stable sort by display order; ties keep insertion order
pub fn sort_by_order(fields: &mut [AggregatedField]) {
    fields.sort_by_key(|f| f.order);
}

/// Append historical fields to an aggregated list and restore display order.
///
/// Fields already present (by id) are skipped. On equal order, current
/// fields come before historical ones.
pub fn merge_historical(
    mut fields: Vec<AggregatedField>,
    historical: Vec<AggregatedField>,
) -> Vec<AggregatedField> {
    for field in historical {
        if !fields.iter().any(|f| f.field_id == field.field_id) {
            fields.push(field);
        }
    }
    sort_by_order(&mut fields);
    fields
}

/// Group items by section name, keeping first-seen section order
pub fn group_by_section<T>(items: Vec<T>, section_of: impl Fn(&T) -> &str) -> Vec<(String, Vec<T>)> {
    let mut groups: Vec<(String, Vec<T>)> = Vec::new();
    for item in items {
        let section = section_of(&item).to_string();
        match groups.iter_mut().find(|(name, _)| *name == section) {
            Some((_, members)) => members.push(item),
            None => groups.push((section, vec![item])),
        }
    }
    groups
}

pub fn into_sections(fields: Vec<AggregatedField>) -> Vec<FieldSection> {
    group_by_section(fields, |f| f.section.as_str())
        .into_iter()
        .map(|(section_name, fields)| FieldSection {
            section_name,
            fields,
        })
        .collect()
}
