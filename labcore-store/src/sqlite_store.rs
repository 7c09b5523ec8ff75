//! SQLite-backed laboratory catalog and results store
//!
//! Schema:
//!   - categories, exams: catalog reference data
//!   - exam_fields: field definition versions (slot_id groups versions)
//!   - exam_components: composition links (parent -> child)
//!   - request_exams: request exam instances
//!   - result_values: one value per (instance, field)

use crate::error::{Result, StoreError};
use crate::repository::{catalog, components, fields, instances, values};
use chrono::Utc;
use labcore_core::composition::check_new_link;
use labcore_core::{
    Category, CompositionLink, Exam, ExamFilter, ExamId, ExamKind, FieldAttributes,
    FieldDefinition, FieldId, FieldRevision, InstanceId, InstanceStatus, LabError, NewExam,
    NewInstance, RequestExamInstance, ResultValue, SlotId,
};
use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS exams (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    category_id INTEGER REFERENCES categories(id),
    kind TEXT NOT NULL,
    is_profile INTEGER NOT NULL DEFAULT 0,
    sampling_instructions TEXT,
    method TEXT,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS exam_fields (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    exam_id INTEGER NOT NULL REFERENCES exams(id),
    slot_id INTEGER,
    name TEXT NOT NULL,
    value_type TEXT NOT NULL,
    unit TEXT,
    reference_expression TEXT,
    options TEXT NOT NULL DEFAULT '[]',
    required INTEGER NOT NULL DEFAULT 0,
    display_order INTEGER NOT NULL DEFAULT 0,
    section TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    version INTEGER NOT NULL DEFAULT 1,
    retired_at TEXT,
    retirement_reason TEXT
);

CREATE INDEX IF NOT EXISTS idx_fields_exam ON exam_fields(exam_id, active);
CREATE UNIQUE INDEX IF NOT EXISTS idx_fields_slot_version ON exam_fields(slot_id, version);
CREATE UNIQUE INDEX IF NOT EXISTS idx_fields_slot_active ON exam_fields(slot_id) WHERE active = 1;

CREATE TABLE IF NOT EXISTS exam_components (
    parent_id INTEGER NOT NULL REFERENCES exams(id),
    child_id INTEGER NOT NULL REFERENCES exams(id),
    display_order INTEGER NOT NULL DEFAULT 0,
    active INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (parent_id, child_id)
);

CREATE TABLE IF NOT EXISTS request_exams (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    request_ref TEXT NOT NULL,
    exam_id INTEGER NOT NULL REFERENCES exams(id),
    status TEXT NOT NULL DEFAULT 'pending',
    legacy_result TEXT,
    completed_at TEXT,
    recorded_by TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_request_exams_ref ON request_exams(request_ref);

CREATE TABLE IF NOT EXISTS result_values (
    instance_id INTEGER NOT NULL REFERENCES request_exams(id),
    field_id INTEGER NOT NULL REFERENCES exam_fields(id),
    value TEXT NOT NULL,
    observation TEXT,
    out_of_range INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (instance_id, field_id)
);
"#;

/// SQLite-based catalog and results store.
///
/// A single connection behind a mutex: every operation, including the cycle
/// check and insert of a composition link, runs while holding it.
pub struct LabStore {
    conn: Mutex<Connection>,
}

#[allow(clippy::result_large_err)]
impl LabStore {
    /// Open the store (create if not exists)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for read-write concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Other("store connection lock poisoned".to_string()))
    }

    /// Run read-only or single-statement work against the connection
    pub fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Execute multiple operations atomically within an SQLite transaction
    pub fn in_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    // --- Exam catalog ---

    pub fn create_category(&self, name: &str) -> Result<Category> {
        self.read(|conn| catalog::insert_category(conn, name))
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        self.read(catalog::list_categories)
    }

    pub fn create_exam(&self, exam: &NewExam) -> Result<Exam> {
        let exam = self.in_transaction(|tx| catalog::insert_exam(tx, exam))?;
        tracing::info!(exam_id = %exam.id, code = %exam.code, kind = %exam.kind, "Exam created");
        Ok(exam)
    }

    pub fn get_exam(&self, id: ExamId) -> Result<Option<Exam>> {
        self.read(|conn| catalog::get_exam(conn, id))
    }

    pub fn require_exam(&self, id: ExamId) -> Result<Exam> {
        self.read(|conn| catalog::require_exam(conn, id))
    }

    pub fn list_exams(&self, filter: &ExamFilter) -> Result<Vec<Exam>> {
        self.read(|conn| catalog::list_exams(conn, filter))
    }

    /// Non-profile, active simple exams usable as panel components
    pub fn list_building_blocks(&self) -> Result<Vec<Exam>> {
        self.list_exams(&ExamFilter {
            building_blocks: true,
            ..Default::default()
        })
    }

    /// Change an exam's kind, refusing changes that contradict its current
    /// fields or components.
    pub fn change_exam_kind(&self, id: ExamId, kind: ExamKind) -> Result<Exam> {
        self.in_transaction(|tx| {
            let exam = catalog::require_exam(tx, id)?;
            if !kind.permits_components() && components::count_active_children(tx, id)? > 0 {
                return Err(LabError::InvalidKindForOperation {
                    exam_id: id,
                    reason: format!("exam still has active components and cannot become {}", kind),
                }
                .into());
            }
            if !kind.permits_own_fields() && fields::count_active(tx, id)? > 0 {
                return Err(LabError::InvalidKindForOperation {
                    exam_id: id,
                    reason: format!("exam still owns active fields and cannot become {}", kind),
                }
                .into());
            }
            if exam.kind != kind {
                catalog::update_exam_kind(tx, id, kind)?;
                tracing::info!(exam_id = %id, from = %exam.kind, to = %kind, "Exam kind changed");
            }
            catalog::require_exam(tx, id)
        })
    }

    pub fn deactivate_exam(&self, id: ExamId) -> Result<Exam> {
        self.in_transaction(|tx| {
            catalog::require_exam(tx, id)?;
            if catalog::deactivate_exam(tx, id)? {
                tracing::info!(exam_id = %id, "Exam deactivated");
            }
            catalog::require_exam(tx, id)
        })
    }

    // --- Field definitions ---

    /// Create version 1 of a new field owned by `exam_id`
    pub fn add_field(&self, exam_id: ExamId, attributes: &FieldAttributes) -> Result<FieldDefinition> {
        validate_attributes(attributes)?;
        let field = self.in_transaction(|tx| {
            let exam = catalog::require_exam(tx, exam_id)?;
            if !exam.kind.permits_own_fields() {
                return Err(LabError::InvalidKindForOperation {
                    exam_id,
                    reason: format!("a {} exam cannot own fields", exam.kind),
                }
                .into());
            }
            fields::insert_field(tx, exam_id, attributes)
        })?;
        tracing::info!(exam_id = %exam_id, field_id = %field.id, name = %field.attributes.name, "Field added");
        Ok(field)
    }

    pub fn get_field(&self, id: FieldId) -> Result<Option<FieldDefinition>> {
        self.read(|conn| fields::get_field(conn, id))
    }

    pub fn list_active_fields(&self, exam_id: ExamId) -> Result<Vec<FieldDefinition>> {
        self.read(|conn| fields::list_active(conn, exam_id))
    }

    /// Retire a field definition. Retiring twice is a no-op.
    pub fn retire_field(&self, id: FieldId, reason: &str) -> Result<FieldDefinition> {
        let field = self.in_transaction(|tx| fields::retire(tx, id, reason, Utc::now()))?;
        tracing::info!(field_id = %id, reason = reason, "Field retired");
        Ok(field)
    }

    /// Retire the active head of a slot and append its successor.
    ///
    /// Recorded values keep pointing at the retired row.
    pub fn revise_field(
        &self,
        id: FieldId,
        attributes: &FieldAttributes,
        reason: &str,
    ) -> Result<FieldDefinition> {
        validate_attributes(attributes)?;
        let (revised, recorded) = self.in_transaction(|tx| {
            let current = fields::require_field(tx, id)?;
            let revision = FieldRevision::plan(&current, attributes.clone())
                .ok_or(LabError::FieldRetired { field_id: id })?;
            fields::retire(tx, id, reason, Utc::now())?;
            let revised = fields::insert_revision(tx, &revision)?;
            Ok((revised, values::count_for_field(tx, id)?))
        })?;
        tracing::info!(
            field_id = %id,
            new_field_id = %revised.id,
            version = revised.version,
            recorded_values = recorded,
            reason = reason,
            "Field revised"
        );
        Ok(revised)
    }

    pub fn list_visible_for_instance(
        &self,
        exam_id: ExamId,
        instance_id: InstanceId,
    ) -> Result<Vec<FieldDefinition>> {
        self.read(|conn| fields::list_visible_for_instance(conn, exam_id, instance_id))
    }

    pub fn slot_history(&self, slot_id: SlotId) -> Result<Vec<FieldDefinition>> {
        self.read(|conn| fields::slot_history(conn, slot_id))
    }

    // --- Composition graph ---

    /// Add `child` as a component of `parent`.
    ///
    /// The cycle check and the insert share one transaction under the store
    /// lock, so concurrent additions cannot jointly close a cycle.
    pub fn add_link(&self, parent: ExamId, child: ExamId, order: i32) -> Result<CompositionLink> {
        let link = self.in_transaction(|tx| {
            let parent_exam = catalog::require_exam(tx, parent)?;
            if !parent_exam.kind.permits_components() {
                return Err(LabError::InvalidKindForOperation {
                    exam_id: parent,
                    reason: format!("a {} exam cannot have components", parent_exam.kind),
                }
                .into());
            }
            let child_exam = catalog::require_exam(tx, child)?;
            if !child_exam.active {
                return Err(LabError::InvalidCompositionLink {
                    parent,
                    child,
                    reason: "the component exam is inactive".to_string(),
                }
                .into());
            }

            let links = components::list_active_links(tx)?;
            check_new_link(&links, parent, child).map_err(|rejection| {
                LabError::InvalidCompositionLink {
                    parent,
                    child,
                    reason: rejection.describe().to_string(),
                }
            })?;

            components::upsert_link(tx, parent, child, order)
        })?;
        tracing::info!(parent = %parent, child = %child, order = order, "Component linked");
        Ok(link)
    }

    pub fn deactivate_link(&self, parent: ExamId, child: ExamId) -> Result<bool> {
        let removed = self.in_transaction(|tx| components::deactivate_link(tx, parent, child))?;
        if removed {
            tracing::info!(parent = %parent, child = %child, "Component unlinked");
        }
        Ok(removed)
    }

    pub fn list_active_children(&self, exam_id: ExamId) -> Result<Vec<Exam>> {
        self.read(|conn| components::list_active_children(conn, exam_id))
    }

    pub fn list_links(&self, parent: ExamId) -> Result<Vec<CompositionLink>> {
        self.read(|conn| components::list_links(conn, parent))
    }

    // --- Request exam instances ---

    pub fn create_instance(&self, new: &NewInstance) -> Result<RequestExamInstance> {
        if new.request_ref.trim().is_empty() {
            return Err(LabError::InvalidDefinition("request reference must not be empty".into()).into());
        }
        self.in_transaction(|tx| {
            let exam = catalog::require_exam(tx, new.exam_id)?;
            if !exam.active {
                return Err(LabError::Conflict(format!("Exam {} is inactive", exam.code)).into());
            }
            instances::insert_instance(tx, &new.request_ref, new.exam_id, Utc::now())
        })
    }

    pub fn get_instance(&self, id: InstanceId) -> Result<Option<RequestExamInstance>> {
        self.read(|conn| instances::get_instance(conn, id))
    }

    pub fn require_instance(&self, id: InstanceId) -> Result<RequestExamInstance> {
        self.read(|conn| instances::require_instance(conn, id))
    }

    pub fn list_request(&self, request_ref: &str) -> Result<Vec<RequestExamInstance>> {
        self.read(|conn| instances::list_for_request(conn, request_ref))
    }

    /// Move an instance along its status machine.
    ///
    /// Whether an instance may be completed is the caller's decision; this
    /// only enforces the allowed transitions.
    pub fn transition_instance(
        &self,
        id: InstanceId,
        status: InstanceStatus,
        recorded_by: Option<&str>,
    ) -> Result<RequestExamInstance> {
        let instance = self.in_transaction(|tx| {
            let instance = instances::require_instance(tx, id)?;
            if !instance.status.can_transition_to(status) {
                return Err(LabError::InvalidStatusTransition {
                    instance_id: id,
                    from: instance.status.to_string(),
                    to: status.to_string(),
                }
                .into());
            }
            let completed_at = (status == InstanceStatus::Completed).then(Utc::now);
            instances::update_status(tx, id, status, recorded_by, completed_at)?;
            instances::require_instance(tx, id)
        })?;
        tracing::info!(instance_id = %id, status = %instance.status, "Instance status changed");
        Ok(instance)
    }

    /// Set or clear the single free-text result of an exam without fields
    pub fn set_legacy_result(
        &self,
        id: InstanceId,
        legacy_result: Option<&str>,
    ) -> Result<RequestExamInstance> {
        self.in_transaction(|tx| {
            let instance = instances::require_instance(tx, id)?;
            if !instance.accepts_values() {
                return Err(LabError::InstanceClosed {
                    instance_id: id,
                    status: instance.status.to_string(),
                }
                .into());
            }
            instances::update_legacy_result(tx, id, legacy_result)?;
            instances::require_instance(tx, id)
        })
    }

    pub fn list_values(&self, instance_id: InstanceId) -> Result<Vec<ResultValue>> {
        self.read(|conn| values::list_values(conn, instance_id))
    }
}

pub(crate) fn validate_attributes(attributes: &FieldAttributes) -> Result<()> {
    if attributes.name.trim().is_empty() {
        return Err(LabError::InvalidDefinition("field name must not be empty".to_string()).into());
    }
    Ok(())
}
