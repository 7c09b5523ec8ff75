use chrono::{DateTime, Utc};
use labcore_core::{ExamId, InstanceId, InstanceStatus, LabError, RequestExamInstance};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::parse_column;
use crate::error::Result;

const INSTANCE_COLUMNS: &str =
    "id, request_ref, exam_id, status, legacy_result, completed_at, recorded_by, created_at";

fn instance_from_row(row: &Row<'_>) -> rusqlite::Result<RequestExamInstance> {
    Ok(RequestExamInstance {
        id: InstanceId(row.get(0)?),
        request_ref: row.get(1)?,
        exam_id: ExamId(row.get(2)?),
        status: parse_column(row, 3)?,
        legacy_result: row.get(4)?,
        completed_at: row.get(5)?,
        recorded_by: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn insert_instance(
    conn: &Connection,
    request_ref: &str,
    exam_id: ExamId,
    at: DateTime<Utc>,
) -> Result<RequestExamInstance> {
    conn.execute(
        "INSERT INTO request_exams (request_ref, exam_id, status, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            request_ref.trim(),
            exam_id.0,
            InstanceStatus::Pending.as_str(),
            at
        ],
    )?;
    require_instance(conn, InstanceId(conn.last_insert_rowid()))
}

pub fn get_instance(conn: &Connection, id: InstanceId) -> Result<Option<RequestExamInstance>> {
    let sql = format!("SELECT {} FROM request_exams WHERE id = ?1", INSTANCE_COLUMNS);
    let instance = conn
        .query_row(&sql, params![id.0], instance_from_row)
        .optional()?;
    Ok(instance)
}

pub fn require_instance(conn: &Connection, id: InstanceId) -> Result<RequestExamInstance> {
    get_instance(conn, id)?.ok_or_else(|| LabError::instance_not_found(id).into())
}

/// Instances belonging to one patient request, in creation order
pub fn list_for_request(conn: &Connection, request_ref: &str) -> Result<Vec<RequestExamInstance>> {
    let sql = format!(
        "SELECT {} FROM request_exams WHERE request_ref = ?1 ORDER BY id",
        INSTANCE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![request_ref.trim()], instance_from_row)?;

    let mut instances = Vec::new();
    for row in rows {
        instances.push(row?);
    }
    Ok(instances)
}

pub fn update_status(
    conn: &Connection,
    id: InstanceId,
    status: InstanceStatus,
    recorded_by: Option<&str>,
    completed_at: Option<DateTime<Utc>>,
) -> Result<()> {
    conn.execute(
        "UPDATE request_exams
         SET status = ?1,
             recorded_by = COALESCE(?2, recorded_by),
             completed_at = COALESCE(?3, completed_at)
         WHERE id = ?4",
        params![status.as_str(), recorded_by, completed_at, id.0],
    )?;
    Ok(())
}

pub fn update_legacy_result(
    conn: &Connection,
    id: InstanceId,
    legacy_result: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE request_exams SET legacy_result = ?1 WHERE id = ?2",
        params![legacy_result, id.0],
    )?;
    Ok(())
}
