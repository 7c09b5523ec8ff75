use chrono::{DateTime, Utc};
use labcore_core::{CheckedValue, FieldId, InstanceId, ResultValue};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::Result;

fn value_from_row(row: &Row<'_>) -> rusqlite::Result<ResultValue> {
    Ok(ResultValue {
        instance_id: InstanceId(row.get(0)?),
        field_id: FieldId(row.get(1)?),
        value: row.get(2)?,
        observation: row.get(3)?,
        out_of_range: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Write or replace the single value of (instance, field) in one statement
pub fn upsert_value(
    conn: &Connection,
    instance_id: InstanceId,
    field_id: FieldId,
    checked: &CheckedValue,
    observation: Option<&str>,
    at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO result_values (instance_id, field_id, value, observation, out_of_range, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(instance_id, field_id) DO UPDATE SET
             value = excluded.value,
             observation = excluded.observation,
             out_of_range = excluded.out_of_range,
             updated_at = excluded.updated_at",
        params![
            instance_id.0,
            field_id.0,
            checked.value,
            observation,
            checked.out_of_range,
            at
        ],
    )?;
    Ok(())
}

pub fn get_value(
    conn: &Connection,
    instance_id: InstanceId,
    field_id: FieldId,
) -> Result<Option<ResultValue>> {
    let value = conn
        .query_row(
            "SELECT instance_id, field_id, value, observation, out_of_range, updated_at
             FROM result_values WHERE instance_id = ?1 AND field_id = ?2",
            params![instance_id.0, field_id.0],
            value_from_row,
        )
        .optional()?;
    Ok(value)
}

pub fn list_values(conn: &Connection, instance_id: InstanceId) -> Result<Vec<ResultValue>> {
    let mut stmt = conn.prepare(
        "SELECT instance_id, field_id, value, observation, out_of_range, updated_at
         FROM result_values WHERE instance_id = ?1 ORDER BY field_id",
    )?;
    let rows = stmt.query_map(params![instance_id.0], value_from_row)?;

    let mut values = Vec::new();
    for row in rows {
        values.push(row?);
    }
    Ok(values)
}

pub fn count_for_field(conn: &Connection, field_id: FieldId) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM result_values WHERE field_id = ?1",
        params![field_id.0],
        |row| row.get(0),
    )?;
    Ok(count)
}
