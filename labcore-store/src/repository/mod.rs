//! Row-level queries over a borrowed connection
//!
//! Every function takes a `&Connection` so it composes inside a transaction
//! (`Transaction` derefs to `Connection`).

pub mod catalog;
pub mod components;
pub mod fields;
pub mod instances;
pub mod values;

use rusqlite::types::Type;
use rusqlite::Row;
use std::str::FromStr;

/// Read a text column and parse it into a domain enum
pub(crate) fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let text: String = row.get(idx)?;
    text.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Read a JSON-encoded text column
pub(crate) fn json_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
