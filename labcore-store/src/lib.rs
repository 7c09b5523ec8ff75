pub mod engine;
pub mod error;
pub mod repository;
pub mod seed;
pub mod sqlite_audit;
pub mod sqlite_store;

pub use engine::{ExamEngine, InstanceValue, InstanceValueSection, SqlCatalog};
pub use error::{Result, StoreError};
pub use seed::SeedSummary;
pub use sqlite_audit::{AuditEntry, AuditLog, AuditRecord, Operation};
pub use sqlite_store::LabStore;
