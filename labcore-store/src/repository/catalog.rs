use labcore_core::{Category, CategoryId, Exam, ExamFilter, ExamId, ExamKind, LabError, NewExam};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::parse_column;
use crate::error::Result;

const EXAM_COLUMNS: &str =
    "id, code, name, category_id, kind, is_profile, sampling_instructions, method, active";

fn exam_from_row(row: &Row<'_>) -> rusqlite::Result<Exam> {
    Ok(Exam {
        id: ExamId(row.get(0)?),
        code: row.get(1)?,
        name: row.get(2)?,
        category_id: row.get::<_, Option<i64>>(3)?.map(CategoryId),
        kind: parse_column(row, 4)?,
        is_profile: row.get(5)?,
        sampling_instructions: row.get(6)?,
        method: row.get(7)?,
        active: row.get(8)?,
    })
}

pub fn insert_category(conn: &Connection, name: &str) -> Result<Category> {
    let name = name.trim();
    if find_category_by_name(conn, name)?.is_some() {
        return Err(LabError::Conflict(format!("Category already exists: {}", name)).into());
    }
    conn.execute("INSERT INTO categories (name) VALUES (?1)", params![name])?;
    Ok(Category {
        id: CategoryId(conn.last_insert_rowid()),
        name: name.to_string(),
    })
}

pub fn find_category_by_name(conn: &Connection, name: &str) -> Result<Option<Category>> {
    let category = conn
        .query_row(
            "SELECT id, name FROM categories WHERE name = ?1",
            params![name.trim()],
            |row| {
                Ok(Category {
                    id: CategoryId(row.get(0)?),
                    name: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(category)
}

pub fn list_categories(conn: &Connection) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok(Category {
            id: CategoryId(row.get(0)?),
            name: row.get(1)?,
        })
    })?;

    let mut categories = Vec::new();
    for row in rows {
        categories.push(row?);
    }
    Ok(categories)
}

fn category_exists(conn: &Connection, id: CategoryId) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM categories WHERE id = ?1",
        params![id.0],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn insert_exam(conn: &Connection, exam: &NewExam) -> Result<Exam> {
    let code = exam.code.trim();
    if code.is_empty() {
        return Err(LabError::InvalidDefinition("Exam code must not be empty".to_string()).into());
    }
    if find_exam_by_code(conn, code)?.is_some() {
        return Err(LabError::Conflict(format!("Exam code already in use: {}", code)).into());
    }
    if let Some(category_id) = exam.category_id
        && !category_exists(conn, category_id)?
    {
        return Err(LabError::NotFound {
            entity: "Category",
            id: category_id.0,
        }
        .into());
    }

    conn.execute(
        "INSERT INTO exams (code, name, category_id, kind, is_profile, sampling_instructions, method, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)",
        params![
            code,
            exam.name,
            exam.category_id.map(|c| c.0),
            exam.kind.as_str(),
            exam.is_profile,
            exam.sampling_instructions,
            exam.method,
        ],
    )?;

    require_exam(conn, ExamId(conn.last_insert_rowid()))
}

pub fn get_exam(conn: &Connection, id: ExamId) -> Result<Option<Exam>> {
    let sql = format!("SELECT {} FROM exams WHERE id = ?1", EXAM_COLUMNS);
    let exam = conn
        .query_row(&sql, params![id.0], exam_from_row)
        .optional()?;
    Ok(exam)
}

pub fn require_exam(conn: &Connection, id: ExamId) -> Result<Exam> {
    get_exam(conn, id)?.ok_or_else(|| LabError::exam_not_found(id).into())
}

pub fn find_exam_by_code(conn: &Connection, code: &str) -> Result<Option<Exam>> {
    let sql = format!("SELECT {} FROM exams WHERE code = ?1", EXAM_COLUMNS);
    let exam = conn
        .query_row(&sql, params![code.trim()], exam_from_row)
        .optional()?;
    Ok(exam)
}

/// Catalog listing ordered by name
pub fn list_exams(conn: &Connection, filter: &ExamFilter) -> Result<Vec<Exam>> {
    let sql = format!("SELECT {} FROM exams ORDER BY name, id", EXAM_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], exam_from_row)?;

    let mut exams = Vec::new();
    for row in rows {
        let exam = row?;
        if filter.matches(&exam) {
            exams.push(exam);
        }
    }
    Ok(exams)
}

pub fn update_exam_kind(conn: &Connection, id: ExamId, kind: ExamKind) -> Result<()> {
    conn.execute(
        "UPDATE exams SET kind = ?1 WHERE id = ?2",
        params![kind.as_str(), id.0],
    )?;
    Ok(())
}

/// Soft-deactivate an exam. Returns false if it was already inactive.
pub fn deactivate_exam(conn: &Connection, id: ExamId) -> Result<bool> {
    let rows = conn.execute(
        "UPDATE exams SET active = 0 WHERE id = ?1 AND active = 1",
        params![id.0],
    )?;
    Ok(rows > 0)
}
