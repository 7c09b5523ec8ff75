//! SQLite-based audit log
//!
//! Kept in its own file, apart from the catalog and results store.

use crate::error::Result;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;

/// Audited operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Deactivate,
    Retire,
    Revise,
    Link,
    Unlink,
    Submit,
    Transition,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Deactivate => "deactivate",
            Operation::Retire => "retire",
            Operation::Revise => "revise",
            Operation::Link => "link",
            Operation::Unlink => "unlink",
            Operation::Submit => "submit",
            Operation::Transition => "transition",
        }
    }
}

/// One row of the audit log
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: String,
    pub operation: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub actor: Option<String>,
    pub result: String,
    pub detail: Option<String>,
}

/// What was done to which entity, by whom
#[derive(Debug, Clone, Copy)]
pub struct AuditRecord<'a> {
    pub operation: Operation,
    pub entity_type: &'a str,
    pub entity_id: Option<&'a str>,
    pub actor: Option<&'a str>,
    pub client_ip: Option<&'a str>,
}

impl<'a> AuditRecord<'a> {
    pub fn new(operation: Operation, entity_type: &'a str) -> Self {
        Self {
            operation,
            entity_type,
            entity_id: None,
            actor: None,
            client_ip: None,
        }
    }

    pub fn entity(mut self, id: &'a str) -> Self {
        self.entity_id = Some(id);
        self
    }

    pub fn actor(mut self, actor: Option<&'a str>) -> Self {
        self.actor = actor;
        self
    }

    pub fn client_ip(mut self, ip: Option<&'a str>) -> Self {
        self.client_ip = ip;
        self
    }
}

/// Audit log
pub struct AuditLog {
    conn: Connection,
}

#[allow(clippy::result_large_err)]
impl AuditLog {
    /// Open the audit log (create if not exists)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let audit = Self { conn };
        audit.initialize()?;
        Ok(audit)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL DEFAULT (datetime('now')),
                operation TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id TEXT,
                actor TEXT,
                client_ip TEXT,
                result TEXT NOT NULL,
                detail TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            CREATE INDEX IF NOT EXISTS idx_audit_entity ON audit_log(entity_type, entity_id);
            "#,
        )?;
        Ok(())
    }

    fn insert(&self, record: &AuditRecord<'_>, success: bool, detail: Option<&str>) -> Result<()> {
        let result = if success { "success" } else { "error" };
        self.conn.execute(
            "INSERT INTO audit_log
             (operation, entity_type, entity_id, actor, client_ip, result, detail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.operation.as_str(),
                record.entity_type,
                record.entity_id,
                record.actor,
                record.client_ip,
                result,
                detail,
            ],
        )?;
        Ok(())
    }

    pub fn log_success(&self, record: &AuditRecord<'_>) -> Result<()> {
        self.insert(record, true, None)
    }

    pub fn log_error(&self, record: &AuditRecord<'_>, error: &str) -> Result<()> {
        self.insert(record, false, Some(error))
    }

    /// Most recent entries first
    pub fn recent_entries(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, operation, entity_type, entity_id, actor, result, detail
             FROM audit_log ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(AuditEntry {
                timestamp: row.get(0)?,
                operation: row.get(1)?,
                entity_type: row.get(2)?,
                entity_id: row.get(3)?,
                actor: row.get(4)?,
                result: row.get(5)?,
                detail: row.get(6)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_log() {
        let audit = AuditLog::open(":memory:").unwrap();

        audit
            .log_success(
                &AuditRecord::new(Operation::Create, "Exam")
                    .entity("12")
                    .actor(Some("admin"))
                    .client_ip(Some("127.0.0.1")),
            )
            .unwrap();
        audit
            .log_error(
                &AuditRecord::new(Operation::Link, "Exam").entity("12"),
                "cycle",
            )
            .unwrap();

        let count: i32 = audit
            .conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_recent_entries() {
        let audit = AuditLog::open(":memory:").unwrap();

        audit
            .log_success(&AuditRecord::new(Operation::Create, "Exam").entity("1"))
            .unwrap();
        audit
            .log_success(&AuditRecord::new(Operation::Submit, "Instance").entity("4"))
            .unwrap();
        audit
            .log_error(
                &AuditRecord::new(Operation::Revise, "Field").entity("9"),
                "Field 9 is retired and cannot be revised",
            )
            .unwrap();

        let entries = audit.recent_entries(10).unwrap();
        assert_eq!(entries.len(), 3);
        // Most recent first
        assert_eq!(entries[0].operation, "revise");
        assert_eq!(entries[0].result, "error");
        assert_eq!(entries[0].entity_id.as_deref(), Some("9"));
        assert_eq!(entries[2].entity_type, "Exam");
    }
}
