use labcore_core::{CompositionLink, Exam, ExamId};
use rusqlite::{params, Connection, Row};

use crate::error::Result;

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<CompositionLink> {
    Ok(CompositionLink {
        parent_id: ExamId(row.get(0)?),
        child_id: ExamId(row.get(1)?),
        order: row.get(2)?,
        active: row.get(3)?,
    })
}

/// Every active link in the catalog
pub fn list_active_links(conn: &Connection) -> Result<Vec<CompositionLink>> {
    let mut stmt = conn.prepare(
        "SELECT parent_id, child_id, display_order, active
         FROM exam_components WHERE active = 1",
    )?;
    let rows = stmt.query_map([], link_from_row)?;

    let mut links = Vec::new();
    for row in rows {
        links.push(row?);
    }
    Ok(links)
}

/// Links of one parent, active or not, in display order
pub fn list_links(conn: &Connection, parent_id: ExamId) -> Result<Vec<CompositionLink>> {
    let mut stmt = conn.prepare(
        "SELECT parent_id, child_id, display_order, active
         FROM exam_components WHERE parent_id = ?1
         ORDER BY display_order, child_id",
    )?;
    let rows = stmt.query_map(params![parent_id.0], link_from_row)?;

    let mut links = Vec::new();
    for row in rows {
        links.push(row?);
    }
    Ok(links)
}

/// Insert a link, or reactivate an existing one with a new order
pub fn upsert_link(
    conn: &Connection,
    parent_id: ExamId,
    child_id: ExamId,
    order: i32,
) -> Result<CompositionLink> {
    conn.execute(
        "INSERT INTO exam_components (parent_id, child_id, display_order, active)
         VALUES (?1, ?2, ?3, 1)
         ON CONFLICT(parent_id, child_id)
         DO UPDATE SET display_order = excluded.display_order, active = 1",
        params![parent_id.0, child_id.0, order],
    )?;
    Ok(CompositionLink {
        parent_id,
        child_id,
        order,
        active: true,
    })
}

/// Soft-remove a component. Returns false if no active link existed.
pub fn deactivate_link(conn: &Connection, parent_id: ExamId, child_id: ExamId) -> Result<bool> {
    let rows = conn.execute(
        "UPDATE exam_components SET active = 0
         WHERE parent_id = ?1 AND child_id = ?2 AND active = 1",
        params![parent_id.0, child_id.0],
    )?;
    Ok(rows > 0)
}

/// Component exams through active links, in link order
pub fn list_active_children(conn: &Connection, parent_id: ExamId) -> Result<Vec<Exam>> {
    let mut stmt = conn.prepare(
        "SELECT child_id FROM exam_components
         WHERE parent_id = ?1 AND active = 1
         ORDER BY display_order, child_id",
    )?;
    let ids = stmt.query_map(params![parent_id.0], |row| row.get::<_, i64>(0))?;

    let mut children = Vec::new();
    for id in ids {
        children.push(super::catalog::require_exam(conn, ExamId(id?))?);
    }
    Ok(children)
}

pub fn count_active_children(conn: &Connection, parent_id: ExamId) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM exam_components WHERE parent_id = ?1 AND active = 1",
        params![parent_id.0],
        |row| row.get(0),
    )?;
    Ok(count)
}
