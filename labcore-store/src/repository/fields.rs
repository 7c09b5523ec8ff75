//! Field definition rows and their version chains
//!
//! `slot_id` groups the versions of one logical field. A partial unique index
//! keeps at most one active row per slot.

use chrono::{DateTime, Utc};
use labcore_core::{
    ExamId, FieldAttributes, FieldDefinition, FieldId, FieldRevision, InstanceId, LabError, SlotId,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{json_column, parse_column};
use crate::error::Result;

const FIELD_COLUMNS: &str = "f.id, f.exam_id, f.slot_id, f.name, f.value_type, f.unit, \
     f.reference_expression, f.options, f.required, f.display_order, f.section, \
     f.active, f.version, f.retired_at, f.retirement_reason";

fn field_from_row(row: &Row<'_>) -> rusqlite::Result<FieldDefinition> {
    Ok(FieldDefinition {
        id: FieldId(row.get(0)?),
        exam_id: ExamId(row.get(1)?),
        slot_id: SlotId(row.get(2)?),
        attributes: FieldAttributes {
            name: row.get(3)?,
            value_type: parse_column(row, 4)?,
            unit: row.get(5)?,
            reference_expression: row.get(6)?,
            options: json_column(row, 7)?,
            required: row.get(8)?,
            order: row.get(9)?,
            section: row.get(10)?,
        },
        active: row.get(11)?,
        version: row.get(12)?,
        retired_at: row.get(13)?,
        retirement_reason: row.get(14)?,
    })
}

fn query_fields<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<FieldDefinition>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, field_from_row)?;

    let mut fields = Vec::new();
    for row in rows {
        fields.push(row?);
    }
    Ok(fields)
}

fn insert_row(
    conn: &Connection,
    exam_id: ExamId,
    slot_id: Option<SlotId>,
    version: i32,
    attributes: &FieldAttributes,
) -> Result<FieldId> {
    let options = serde_json::to_string(&attributes.options)?;
    conn.execute(
        "INSERT INTO exam_fields
         (exam_id, slot_id, name, value_type, unit, reference_expression, options,
          required, display_order, section, active, version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11)",
        params![
            exam_id.0,
            slot_id.map(|s| s.0),
            attributes.name.trim(),
            attributes.value_type.as_str(),
            attributes.unit,
            attributes.reference_expression,
            options,
            attributes.required,
            attributes.order,
            attributes.section,
            version,
        ],
    )?;
    Ok(FieldId(conn.last_insert_rowid()))
}

/// Insert version 1 of a new field slot. The slot id is the row's own id.
pub fn insert_field(
    conn: &Connection,
    exam_id: ExamId,
    attributes: &FieldAttributes,
) -> Result<FieldDefinition> {
    let id = insert_row(conn, exam_id, None, 1, attributes)?;
    conn.execute(
        "UPDATE exam_fields SET slot_id = id WHERE id = ?1",
        params![id.0],
    )?;
    require_field(conn, id)
}

/// Append the next version of a slot
pub fn insert_revision(conn: &Connection, revision: &FieldRevision) -> Result<FieldDefinition> {
    let id = insert_row(
        conn,
        revision.exam_id,
        Some(revision.slot_id),
        revision.version,
        &revision.attributes,
    )?;
    require_field(conn, id)
}

pub fn get_field(conn: &Connection, id: FieldId) -> Result<Option<FieldDefinition>> {
    let sql = format!("SELECT {} FROM exam_fields f WHERE f.id = ?1", FIELD_COLUMNS);
    let field = conn
        .query_row(&sql, params![id.0], field_from_row)
        .optional()?;
    Ok(field)
}

pub fn require_field(conn: &Connection, id: FieldId) -> Result<FieldDefinition> {
    get_field(conn, id)?.ok_or_else(|| LabError::field_not_found(id).into())
}

/// Active definitions owned by an exam, in display order
pub fn list_active(conn: &Connection, exam_id: ExamId) -> Result<Vec<FieldDefinition>> {
    let sql = format!(
        "SELECT {} FROM exam_fields f
         WHERE f.exam_id = ?1 AND f.active = 1
         ORDER BY f.display_order, f.id",
        FIELD_COLUMNS
    );
    query_fields(conn, &sql, params![exam_id.0])
}

pub fn count_active(conn: &Connection, exam_id: ExamId) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM exam_fields WHERE exam_id = ?1 AND active = 1",
        params![exam_id.0],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Mark a definition retired. Retiring an already retired row changes nothing.
pub fn retire(
    conn: &Connection,
    id: FieldId,
    reason: &str,
    at: DateTime<Utc>,
) -> Result<FieldDefinition> {
    let field = require_field(conn, id)?;
    if field.active {
        conn.execute(
            "UPDATE exam_fields
             SET active = 0, retired_at = ?1, retirement_reason = ?2
             WHERE id = ?3 AND active = 1",
            params![at, reason, id.0],
        )?;
        return require_field(conn, id);
    }
    Ok(field)
}

/// Own definitions of `exam_id` visible for one instance: the active ones
/// plus retired ones that hold a value recorded on that instance.
pub fn list_visible_for_instance(
    conn: &Connection,
    exam_id: ExamId,
    instance_id: InstanceId,
) -> Result<Vec<FieldDefinition>> {
    let sql = format!(
        "SELECT {} FROM exam_fields f
         WHERE f.exam_id = ?1
           AND (f.active = 1 OR EXISTS (
                SELECT 1 FROM result_values v
                WHERE v.field_id = f.id AND v.instance_id = ?2))
         ORDER BY f.display_order, f.id",
        FIELD_COLUMNS
    );
    query_fields(conn, &sql, params![exam_id.0, instance_id.0])
}

/// Every definition, from any exam, holding a value on the instance
pub fn list_recorded_for_instance(
    conn: &Connection,
    instance_id: InstanceId,
) -> Result<Vec<FieldDefinition>> {
    let sql = format!(
        "SELECT {} FROM exam_fields f
         JOIN result_values v ON v.field_id = f.id
         WHERE v.instance_id = ?1
         ORDER BY f.display_order, f.id",
        FIELD_COLUMNS
    );
    query_fields(conn, &sql, params![instance_id.0])
}

/// All versions of a slot, oldest first
pub fn slot_history(conn: &Connection, slot_id: SlotId) -> Result<Vec<FieldDefinition>> {
    let sql = format!(
        "SELECT {} FROM exam_fields f WHERE f.slot_id = ?1 ORDER BY f.version",
        FIELD_COLUMNS
    );
    query_fields(conn, &sql, params![slot_id.0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::catalog::insert_exam;
    use crate::LabStore;
    use labcore_core::{ExamKind, NewExam, ValueType};

    #[test]
    fn test_insert_field_starts_new_slot() {
        let store = LabStore::open(":memory:").unwrap();
        store
            .read(|conn| {
                let exam = insert_exam(conn, &NewExam::new("GLU", "Glucose", ExamKind::Simple))?;
                let field = insert_field(
                    conn,
                    exam.id,
                    &FieldAttributes::new("Glucose", ValueType::Number).with_reference("70-110"),
                )?;
                assert_eq!(field.slot_id.0, field.id.0);
                assert_eq!(field.version, 1);
                assert!(field.active);
                assert_eq!(field.reference_expression(), "70-110");
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_retire_is_idempotent() {
        let store = LabStore::open(":memory:").unwrap();
        store
            .read(|conn| {
                let exam = insert_exam(conn, &NewExam::new("GLU", "Glucose", ExamKind::Simple))?;
                let field = insert_field(conn, exam.id, &FieldAttributes::new("G", ValueType::Number))?;

                let first = retire(conn, field.id, "obsolete", Utc::now())?;
                assert!(!first.active);
                assert_eq!(first.retirement_reason.as_deref(), Some("obsolete"));

                let second = retire(conn, field.id, "again", Utc::now())?;
                assert_eq!(second.retired_at, first.retired_at);
                assert_eq!(second.retirement_reason.as_deref(), Some("obsolete"));
                assert!(list_active(conn, exam.id)?.is_empty());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_one_active_row_per_slot() {
        let store = LabStore::open(":memory:").unwrap();
        let result = store.read(|conn| {
            let exam = insert_exam(conn, &NewExam::new("GLU", "Glucose", ExamKind::Simple))?;
            let field = insert_field(conn, exam.id, &FieldAttributes::new("G", ValueType::Number))?;
            let revision = FieldRevision {
                exam_id: exam.id,
                slot_id: field.slot_id,
                version: 2,
                attributes: field.attributes.clone(),
            };
            insert_revision(conn, &revision)
        });
        assert!(matches!(result, Err(crate::StoreError::Sqlite(_))));
    }
}
