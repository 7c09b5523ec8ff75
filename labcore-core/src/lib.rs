//! labcore-core - exam definitions, reference ranges and result validation
//!
//! Pure domain logic. Persistence lives in `labcore-store`.

pub mod aggregate;
pub mod catalog;
pub mod catalog_seed;
pub mod completion;
pub mod composition;
pub mod diagnostic;
pub mod error;
pub mod field;
pub mod ids;
pub mod instance;
pub mod reference_range;
pub mod result_value;

pub use aggregate::{AggregatedField, CatalogView, FieldSection};
pub use catalog::{Category, Exam, ExamFilter, ExamKind, NewExam};
pub use catalog_seed::{CatalogSeed, CatalogSeedLoader, SeedExam};
pub use completion::CompletionReport;
pub use composition::{CompositionLink, LinkRejection};
pub use diagnostic::{Diagnostic, DiagnosticCode, Severity};
pub use error::{LabError, Result};
pub use field::{FieldAttributes, FieldDefinition, FieldRevision, ValueType, DEFAULT_SECTION};
pub use ids::{CategoryId, ExamId, FieldId, InstanceId, SlotId};
pub use instance::{InstanceStatus, NewInstance, RequestExamInstance};
pub use reference_range::{RangeCheck, ReferenceRange};
pub use result_value::{
    CheckedValue, ResultValue, SubmissionError, SubmissionOutcome, ValueSubmission,
};
