use crate::ids::{ExamId, FieldId, InstanceId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LabError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Invalid composition link {parent} -> {child}: {reason}")]
    InvalidCompositionLink {
        parent: ExamId,
        child: ExamId,
        reason: String,
    },

    #[error("Operation not allowed for exam {exam_id}: {reason}")]
    InvalidKindForOperation { exam_id: ExamId, reason: String },

    #[error("Field {field_id} does not belong to instance {instance_id}")]
    UnknownField {
        instance_id: InstanceId,
        field_id: FieldId,
    },

    #[error("Invalid value for field {field_id}: {reason}")]
    InvalidValue { field_id: FieldId, reason: String },

    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("Field {field_id} is retired and cannot be revised")]
    FieldRetired { field_id: FieldId },

    #[error("Invalid status transition for instance {instance_id}: {from} -> {to}")]
    InvalidStatusTransition {
        instance_id: InstanceId,
        from: String,
        to: String,
    },

    #[error("Instance {instance_id} is {status} and no longer accepts values")]
    InstanceClosed {
        instance_id: InstanceId,
        status: String,
    },

    #[error("Instance {instance_id} is missing required values")]
    Incomplete { instance_id: InstanceId },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl LabError {
    /// Stable machine-readable code for boundary layers
    pub fn code(&self) -> &'static str {
        match self {
            LabError::NotFound { .. } => "not-found",
            LabError::InvalidCompositionLink { .. } => "invalid-composition-link",
            LabError::InvalidKindForOperation { .. } => "invalid-kind-for-operation",
            LabError::UnknownField { .. } => "unknown-field",
            LabError::InvalidValue { .. } => "invalid-value",
            LabError::InvalidDefinition(_) => "invalid-definition",
            LabError::FieldRetired { .. } => "field-retired",
            LabError::InvalidStatusTransition { .. } => "invalid-status-transition",
            LabError::InstanceClosed { .. } => "instance-closed",
            LabError::Incomplete { .. } => "incomplete",
            LabError::Conflict(_) => "conflict",
            LabError::Storage(_) => "storage",
        }
    }

    pub fn exam_not_found(id: ExamId) -> Self {
        LabError::NotFound {
            entity: "Exam",
            id: id.0,
        }
    }

    pub fn field_not_found(id: FieldId) -> Self {
        LabError::NotFound {
            entity: "Field",
            id: id.0,
        }
    }

    pub fn instance_not_found(id: InstanceId) -> Self {
        LabError::NotFound {
            entity: "Instance",
            id: id.0,
        }
    }
}

pub type Result<T> = std::result::Result<T, LabError>;
