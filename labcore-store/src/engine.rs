//! Read and write boundary of the exam engine over a `LabStore`
//!
//! The core algorithms (aggregation, range checks, completion) are pure; this
//! module feeds them rows from SQLite and logs the diagnostics they return.

use crate::error::{Result, StoreError};
use crate::repository::{catalog, components, fields, instances, values};
use crate::sqlite_store::LabStore;
use chrono::Utc;
use labcore_core::aggregate::{self, group_by_section, into_sections, merge_historical};
use labcore_core::completion;
use labcore_core::result_value::check_value;
use labcore_core::{
    AggregatedField, CatalogView, CompletionReport, Exam, ExamId, FieldDefinition, FieldSection,
    InstanceId, LabError, RequestExamInstance, ResultValue, SubmissionOutcome, ValueSubmission,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// `CatalogView` over a borrowed connection, usable inside a transaction
pub struct SqlCatalog<'c> {
    conn: &'c Connection,
}

impl<'c> SqlCatalog<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl CatalogView for SqlCatalog<'_> {
    type Error = StoreError;

    fn own_active_fields(&self, exam_id: ExamId) -> Result<Vec<FieldDefinition>> {
        fields::list_active(self.conn, exam_id)
    }

    fn active_components(&self, exam_id: ExamId) -> Result<Vec<Exam>> {
        components::list_active_children(self.conn, exam_id)
    }
}

/// One field of an instance with its recorded value, if any
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceValue {
    #[serde(flatten)]
    pub field: AggregatedField,
    pub value: Option<String>,
    pub observation: Option<String>,
    pub out_of_range: bool,
    /// Recorded against a definition outside the exam's current field set
    pub historical: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceValueSection {
    pub section_name: String,
    pub values: Vec<InstanceValue>,
}

pub struct ExamEngine<'a> {
    store: &'a LabStore,
}

#[allow(clippy::result_large_err)]
impl<'a> ExamEngine<'a> {
    pub fn new(store: &'a LabStore) -> Self {
        Self { store }
    }

    /// Section-grouped fields that apply to an exam
    pub fn get_fields_for_exam(&self, exam_id: ExamId) -> Result<Vec<FieldSection>> {
        self.store.read(|conn| {
            let exam = catalog::require_exam(conn, exam_id)?;
            let fields = aggregate::all_fields_for(&SqlCatalog::new(conn), &exam)?;
            Ok(into_sections(fields))
        })
    }

    /// Every field of the instance's exam with its value, plus values recorded
    /// against definitions that have since left the field set.
    pub fn get_values_for_instance(
        &self,
        instance_id: InstanceId,
    ) -> Result<Vec<InstanceValueSection>> {
        self.store.read(|conn| {
            let instance = instances::require_instance(conn, instance_id)?;
            let exam = catalog::require_exam(conn, instance.exam_id)?;
            let current = aggregate::all_fields_for(&SqlCatalog::new(conn), &exam)?;
            let current_ids: HashSet<_> = current.iter().map(|f| f.field_id).collect();

            let mut historical = Vec::new();
            for definition in fields::list_recorded_for_instance(conn, instance_id)? {
                if current_ids.contains(&definition.id) {
                    continue;
                }
                let origin = if definition.exam_id == exam.id {
                    exam.clone()
                } else {
                    catalog::require_exam(conn, definition.exam_id)?
                };
                let is_own = origin.id == exam.id;
                historical.push(AggregatedField::from_definition(&definition, &origin, is_own));
            }

            let mut recorded: HashMap<_, ResultValue> = values::list_values(conn, instance_id)?
                .into_iter()
                .map(|v| (v.field_id, v))
                .collect();

            let rows: Vec<InstanceValue> = merge_historical(current, historical)
                .into_iter()
                .map(|field| {
                    let value = recorded.remove(&field.field_id);
                    InstanceValue {
                        historical: !current_ids.contains(&field.field_id),
                        value: value.as_ref().map(|v| v.value.clone()),
                        observation: value.as_ref().and_then(|v| v.observation.clone()),
                        out_of_range: value.as_ref().is_some_and(|v| v.out_of_range),
                        field,
                    }
                })
                .collect();

            Ok(group_by_section(rows, |v| v.field.section.as_str())
                .into_iter()
                .map(|(section_name, values)| InstanceValueSection {
                    section_name,
                    values,
                })
                .collect())
        })
    }

    pub fn completion_report(&self, instance_id: InstanceId) -> Result<CompletionReport> {
        self.store.read(|conn| {
            let instance = instances::require_instance(conn, instance_id)?;
            evaluate_completion(conn, &instance)
        })
    }

    /// Recomputed from current fields and values on every call
    pub fn is_instance_complete(&self, instance_id: InstanceId) -> Result<bool> {
        Ok(self.completion_report(instance_id)?.complete)
    }

    /// Record one value. The out-of-range flag is derived from the field's
    /// own reference expression at write time.
    pub fn submit_value(
        &self,
        instance_id: InstanceId,
        submission: &ValueSubmission,
    ) -> Result<SubmissionOutcome> {
        let field_id = submission.field_id;
        let checked = self.store.in_transaction(|tx| {
            let instance = instances::require_instance(tx, instance_id)?;
            ensure_open(&instance)?;

            let field = resolve_field(tx, &instance, submission)?;
            let checked = check_value(&field, &submission.value)?;
            values::upsert_value(
                tx,
                instance_id,
                field_id,
                &checked,
                submission.observation.as_deref(),
                Utc::now(),
            )?;
            Ok(checked)
        })?;

        if let Some(diagnostic) = &checked.diagnostic {
            tracing::warn!(
                instance_id = %instance_id,
                field_id = %field_id,
                code = ?diagnostic.code,
                input = diagnostic.input.as_deref().unwrap_or_default(),
                "{}",
                diagnostic.message
            );
        }
        tracing::debug!(
            instance_id = %instance_id,
            field_id = %field_id,
            out_of_range = checked.out_of_range,
            "Value recorded"
        );

        Ok(SubmissionOutcome::accepted(field_id, &checked))
    }

    /// Record several values; each item succeeds or fails on its own.
    ///
    /// A missing or closed instance fails the whole batch.
    pub fn submit_values_batch(
        &self,
        instance_id: InstanceId,
        submissions: &[ValueSubmission],
    ) -> Result<Vec<SubmissionOutcome>> {
        let instance = self.store.require_instance(instance_id)?;
        ensure_open(&instance)?;

        let mut outcomes = Vec::with_capacity(submissions.len());
        for submission in submissions {
            let outcome = match self.submit_value(instance_id, submission) {
                Ok(outcome) => outcome,
                Err(StoreError::Lab(err)) => SubmissionOutcome::rejected(submission.field_id, &err),
                Err(err) => {
                    tracing::error!(
                        instance_id = %instance_id,
                        field_id = %submission.field_id,
                        error = %err,
                        "Value write failed"
                    );
                    SubmissionOutcome::rejected(
                        submission.field_id,
                        &LabError::Storage(err.to_string()),
                    )
                }
            };
            outcomes.push(outcome);
        }

        let accepted = outcomes.iter().filter(|o| o.accepted).count();
        tracing::info!(
            instance_id = %instance_id,
            submitted = submissions.len(),
            accepted = accepted,
            "Batch submission processed"
        );
        Ok(outcomes)
    }
}

fn ensure_open(instance: &RequestExamInstance) -> Result<()> {
    if instance.accepts_values() {
        return Ok(());
    }
    Err(LabError::InstanceClosed {
        instance_id: instance.id,
        status: instance.status.to_string(),
    }
    .into())
}

/// A field belongs to an instance when it is in the exam's aggregated active
/// set, or already carries a value on that instance.
fn resolve_field(
    conn: &Connection,
    instance: &RequestExamInstance,
    submission: &ValueSubmission,
) -> Result<FieldDefinition> {
    let unknown = || -> StoreError {
        LabError::UnknownField {
            instance_id: instance.id,
            field_id: submission.field_id,
        }
        .into()
    };

    let field = fields::get_field(conn, submission.field_id)?.ok_or_else(unknown)?;

    if values::get_value(conn, instance.id, field.id)?.is_some() {
        return Ok(field);
    }

    let exam = catalog::require_exam(conn, instance.exam_id)?;
    let aggregated = aggregate::all_fields_for(&SqlCatalog::new(conn), &exam)?;
    if aggregated.iter().any(|f| f.field_id == field.id) {
        Ok(field)
    } else {
        Err(unknown())
    }
}

fn evaluate_completion(conn: &Connection, instance: &RequestExamInstance) -> Result<CompletionReport> {
    let exam = catalog::require_exam(conn, instance.exam_id)?;
    let fields = aggregate::all_fields_for(&SqlCatalog::new(conn), &exam)?;
    let recorded = values::list_values(conn, instance.id)?;
    Ok(completion::evaluate(instance, &fields, &recorded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use labcore_core::{
        ExamKind, FieldAttributes, FieldId, InstanceStatus, NewExam, NewInstance, ValueType,
    };

    struct Fixture {
        store: LabStore,
        exam: Exam,
        f1: FieldDefinition,
        f2: FieldDefinition,
        instance: RequestExamInstance,
    }

    /// Hybrid exam E owning F1 (number, required, 4-10) with one component C
    /// owning F2 (text, required).
    fn hybrid_fixture() -> Fixture {
        let store = LabStore::open(":memory:").unwrap();
        let exam = store
            .create_exam(&NewExam::new("E", "E", ExamKind::Hybrid))
            .unwrap();
        let component = store
            .create_exam(&NewExam::new("C", "C", ExamKind::Simple))
            .unwrap();
        let f1 = store
            .add_field(
                exam.id,
                &FieldAttributes::new("F1", ValueType::Number)
                    .required()
                    .with_reference("4-10")
                    .with_order(1),
            )
            .unwrap();
        let f2 = store
            .add_field(
                component.id,
                &FieldAttributes::new("F2", ValueType::Text).required().with_order(2),
            )
            .unwrap();
        store.add_link(exam.id, component.id, 0).unwrap();
        let instance = store
            .create_instance(&NewInstance {
                request_ref: "REQ-1".to_string(),
                exam_id: exam.id,
            })
            .unwrap();
        Fixture {
            store,
            exam,
            f1,
            f2,
            instance,
        }
    }

    fn all_values(sections: &[InstanceValueSection]) -> Vec<&InstanceValue> {
        sections.iter().flat_map(|s| s.values.iter()).collect()
    }

    #[test]
    fn test_hybrid_fields_and_completion() {
        let fx = hybrid_fixture();
        let engine = ExamEngine::new(&fx.store);

        let sections = engine.get_fields_for_exam(fx.exam.id).unwrap();
        assert_eq!(sections.len(), 1);
        let fields = &sections[0].fields;
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "F1");
        assert!(fields[0].is_own_field);
        assert_eq!(fields[1].name, "F2");
        assert!(!fields[1].is_own_field);
        assert_eq!(fields[1].origin_exam_name, "C");

        assert!(!engine.is_instance_complete(fx.instance.id).unwrap());

        let outcome = engine
            .submit_value(fx.instance.id, &ValueSubmission::new(fx.f1.id, "7"))
            .unwrap();
        assert!(outcome.accepted);
        assert!(!outcome.out_of_range);
        assert!(!engine.is_instance_complete(fx.instance.id).unwrap());

        engine
            .submit_value(fx.instance.id, &ValueSubmission::new(fx.f2.id, "normal"))
            .unwrap();
        assert!(engine.is_instance_complete(fx.instance.id).unwrap());

        let outcome = engine
            .submit_value(fx.instance.id, &ValueSubmission::new(fx.f1.id, "11"))
            .unwrap();
        assert!(outcome.out_of_range);
        assert!(engine.is_instance_complete(fx.instance.id).unwrap());

        let stored = fx.store.list_values(fx.instance.id).unwrap();
        let f1_value = stored.iter().find(|v| v.field_id == fx.f1.id).unwrap();
        assert_eq!(f1_value.value, "11");
        assert!(f1_value.out_of_range);
    }

    #[test]
    fn test_clearing_required_value_reopens_completion() {
        let fx = hybrid_fixture();
        let engine = ExamEngine::new(&fx.store);
        engine
            .submit_value(fx.instance.id, &ValueSubmission::new(fx.f1.id, "5"))
            .unwrap();
        engine
            .submit_value(fx.instance.id, &ValueSubmission::new(fx.f2.id, "ok"))
            .unwrap();
        assert!(engine.is_instance_complete(fx.instance.id).unwrap());

        engine
            .submit_value(fx.instance.id, &ValueSubmission::new(fx.f2.id, "  "))
            .unwrap();
        let report = engine.completion_report(fx.instance.id).unwrap();
        assert!(!report.complete);
        assert_eq!(report.missing_fields, vec![fx.f2.id]);
    }

    #[test]
    fn test_revision_keeps_historical_value_visible() {
        let fx = hybrid_fixture();
        let engine = ExamEngine::new(&fx.store);
        engine
            .submit_value(
                fx.instance.id,
                &ValueSubmission::new(fx.f1.id, "8").with_observation("fasting"),
            )
            .unwrap();

        let revised = fx
            .store
            .revise_field(
                fx.f1.id,
                &FieldAttributes::new("F1 renamed", ValueType::Number)
                    .required()
                    .with_reference("4-12")
                    .with_order(1),
                "renamed",
            )
            .unwrap();
        assert_eq!(revised.version, 2);

        let old = fx.store.get_field(fx.f1.id).unwrap().unwrap();
        assert!(!old.active);
        assert_eq!(old.retirement_reason.as_deref(), Some("renamed"));

        let sections = engine.get_values_for_instance(fx.instance.id).unwrap();
        let values = all_values(&sections);

        let historical = values.iter().find(|v| v.field.field_id == fx.f1.id).unwrap();
        assert!(historical.historical);
        assert!(!historical.field.active);
        assert_eq!(historical.field.name, "F1");
        assert_eq!(historical.value.as_deref(), Some("8"));
        assert_eq!(historical.observation.as_deref(), Some("fasting"));

        let current = values.iter().find(|v| v.field.field_id == revised.id).unwrap();
        assert!(!current.historical);
        assert_eq!(current.value, None);

        // The stored value still points at the old definition
        let stored = fx.store.list_values(fx.instance.id).unwrap();
        assert!(stored.iter().any(|v| v.field_id == fx.f1.id && v.value == "8"));

        // The revised field needs its own value before the instance is complete
        engine
            .submit_value(fx.instance.id, &ValueSubmission::new(fx.f2.id, "normal"))
            .unwrap();
        assert!(!engine.is_instance_complete(fx.instance.id).unwrap());
        engine
            .submit_value(fx.instance.id, &ValueSubmission::new(revised.id, "9"))
            .unwrap();
        assert!(engine.is_instance_complete(fx.instance.id).unwrap());
    }

    #[test]
    fn test_historical_field_with_value_still_accepts_updates() {
        let fx = hybrid_fixture();
        let engine = ExamEngine::new(&fx.store);
        engine
            .submit_value(fx.instance.id, &ValueSubmission::new(fx.f1.id, "8"))
            .unwrap();
        fx.store.retire_field(fx.f1.id, "obsolete").unwrap();

        let outcome = engine
            .submit_value(fx.instance.id, &ValueSubmission::new(fx.f1.id, "12"))
            .unwrap();
        assert!(outcome.out_of_range);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let fx = hybrid_fixture();
        let engine = ExamEngine::new(&fx.store);
        let other = fx
            .store
            .create_exam(&NewExam::new("X", "Unrelated", ExamKind::Simple))
            .unwrap();
        let foreign = fx
            .store
            .add_field(other.id, &FieldAttributes::new("Foreign", ValueType::Number))
            .unwrap();

        let err = engine
            .submit_value(fx.instance.id, &ValueSubmission::new(foreign.id, "1"))
            .unwrap_err();
        assert_eq!(err.code(), "unknown-field");

        let err = engine
            .submit_value(fx.instance.id, &ValueSubmission::new(FieldId(9999), "1"))
            .unwrap_err();
        assert_eq!(err.code(), "unknown-field");

        // A retired field without a value on this instance is not reachable
        fx.store.retire_field(fx.f1.id, "obsolete").unwrap();
        let err = engine
            .submit_value(fx.instance.id, &ValueSubmission::new(fx.f1.id, "5"))
            .unwrap_err();
        assert_eq!(err.code(), "unknown-field");
    }

    #[test]
    fn test_batch_partial_success() {
        let fx = hybrid_fixture();
        let engine = ExamEngine::new(&fx.store);

        let outcomes = engine
            .submit_values_batch(
                fx.instance.id,
                &[
                    ValueSubmission::new(fx.f1.id, "abc"),
                    ValueSubmission::new(fx.f2.id, "normal"),
                    ValueSubmission::new(FieldId(424242), "x"),
                ],
            )
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(!outcomes[0].accepted);
        assert_eq!(outcomes[0].error.as_ref().unwrap().code, "invalid-value");
        assert!(outcomes[1].accepted);
        assert!(!outcomes[2].accepted);
        assert_eq!(outcomes[2].error.as_ref().unwrap().code, "unknown-field");

        let stored = fx.store.list_values(fx.instance.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].field_id, fx.f2.id);
    }

    #[test]
    fn test_batch_on_missing_instance_fails() {
        let fx = hybrid_fixture();
        let engine = ExamEngine::new(&fx.store);
        let err = engine
            .submit_values_batch(InstanceId(777), &[ValueSubmission::new(fx.f1.id, "5")])
            .unwrap_err();
        assert_eq!(err.code(), "not-found");
    }

    #[test]
    fn test_closed_instance_rejects_values() {
        let fx = hybrid_fixture();
        let engine = ExamEngine::new(&fx.store);
        fx.store
            .transition_instance(fx.instance.id, InstanceStatus::Cancelled, None)
            .unwrap();
        let err = engine
            .submit_value(fx.instance.id, &ValueSubmission::new(fx.f1.id, "5"))
            .unwrap_err();
        assert_eq!(err.code(), "instance-closed");
    }

    #[test]
    fn test_malformed_reference_fails_open_with_diagnostic() {
        let store = LabStore::open(":memory:").unwrap();
        let exam = store
            .create_exam(&NewExam::new("K", "Potassium", ExamKind::Simple))
            .unwrap();
        let field = store
            .add_field(
                exam.id,
                &FieldAttributes::new("K", ValueType::Number).with_reference("see notes"),
            )
            .unwrap();
        let instance = store
            .create_instance(&NewInstance {
                request_ref: "REQ-2".to_string(),
                exam_id: exam.id,
            })
            .unwrap();

        let outcome = ExamEngine::new(&store)
            .submit_value(instance.id, &ValueSubmission::new(field.id, "99"))
            .unwrap();
        assert!(outcome.accepted);
        assert!(!outcome.out_of_range);
        assert!(outcome.diagnostic.is_some());
    }

    #[test]
    fn test_exam_without_fields_uses_legacy_result() {
        let store = LabStore::open(":memory:").unwrap();
        let exam = store
            .create_exam(&NewExam::new("VDRL", "VDRL", ExamKind::Simple))
            .unwrap();
        let instance = store
            .create_instance(&NewInstance {
                request_ref: "REQ-3".to_string(),
                exam_id: exam.id,
            })
            .unwrap();
        let engine = ExamEngine::new(&store);

        let report = engine.completion_report(instance.id).unwrap();
        assert!(report.legacy);
        assert!(!report.complete);

        store
            .set_legacy_result(instance.id, Some("non-reactive"))
            .unwrap();
        assert!(engine.is_instance_complete(instance.id).unwrap());
        assert!(engine.get_values_for_instance(instance.id).unwrap().is_empty());
    }
}
