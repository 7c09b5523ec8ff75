//! Request exam instances ("details") and their status machine

use crate::ids::{ExamId, InstanceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `pending -> in_process -> completed`, with `cancelled` reachable from
/// either non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    InProcess,
    Completed,
    Cancelled,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Pending => "pending",
            InstanceStatus::InProcess => "in_process",
            InstanceStatus::Completed => "completed",
            InstanceStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InstanceStatus::Completed | InstanceStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: InstanceStatus) -> bool {
        use InstanceStatus::*;
        matches!(
            (self, next),
            (Pending, InProcess)
                | (InProcess, Completed)
                | (Pending, Cancelled)
                | (InProcess, Cancelled)
        )
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(InstanceStatus::Pending),
            "in_process" | "in-process" => Ok(InstanceStatus::InProcess),
            "completed" => Ok(InstanceStatus::Completed),
            "cancelled" | "canceled" => Ok(InstanceStatus::Cancelled),
            other => Err(format!("Unknown instance status: {}", other)),
        }
    }
}

/// One exam ordered within a patient request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestExamInstance {
    pub id: InstanceId,
    /// Identifier of the owning patient request
    pub request_ref: String,
    pub exam_id: ExamId,
    pub status: InstanceStatus,
    /// Single free-text result used by exams without field definitions
    pub legacy_result: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub recorded_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RequestExamInstance {
    pub fn accepts_values(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn has_legacy_result(&self) -> bool {
        self.legacy_result
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInstance {
    pub request_ref: String,
    pub exam_id: ExamId,
}
