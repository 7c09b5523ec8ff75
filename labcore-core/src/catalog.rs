//! Exam catalog reference data

use crate::ids::{CategoryId, ExamId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Structural kind of an exam.
///
/// Decides whether an exam owns fields, references component exams, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamKind {
    Simple,
    Composite,
    Hybrid,
}

impl ExamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamKind::Simple => "simple",
            ExamKind::Composite => "composite",
            ExamKind::Hybrid => "hybrid",
        }
    }

    /// Whether the exam may own field definitions
    pub fn permits_own_fields(&self) -> bool {
        match self {
            ExamKind::Simple | ExamKind::Hybrid => true,
            ExamKind::Composite => false,
        }
    }

    /// Whether the exam may reference component exams
    pub fn permits_components(&self) -> bool {
        match self {
            ExamKind::Composite | ExamKind::Hybrid => true,
            ExamKind::Simple => false,
        }
    }
}

impl fmt::Display for ExamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExamKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(ExamKind::Simple),
            "composite" => Ok(ExamKind::Composite),
            "hybrid" => Ok(ExamKind::Hybrid),
            other => Err(format!("Unknown exam kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// Exam catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: ExamId,
    pub code: String,
    pub name: String,
    pub category_id: Option<CategoryId>,
    pub kind: ExamKind,
    pub is_profile: bool,
    pub sampling_instructions: Option<String>,
    pub method: Option<String>,
    pub active: bool,
}

impl Exam {
    /// Non-profile simple exams can be reused as components of panels
    pub fn is_building_block(&self) -> bool {
        self.active && !self.is_profile && self.kind == ExamKind::Simple
    }
}

/// Attributes for a new catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExam {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    pub kind: ExamKind,
    #[serde(default)]
    pub is_profile: bool,
    #[serde(default)]
    pub sampling_instructions: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
}

impl NewExam {
    pub fn new(code: impl Into<String>, name: impl Into<String>, kind: ExamKind) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            category_id: None,
            kind,
            is_profile: false,
            sampling_instructions: None,
            method: None,
        }
    }

    pub fn with_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn profile(mut self) -> Self {
        self.is_profile = true;
        self
    }
}

/// Catalog listing filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamFilter {
    pub kind: Option<ExamKind>,
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub building_blocks: bool,
    #[serde(default)]
    pub include_inactive: bool,
}

impl ExamFilter {
    pub fn matches(&self, exam: &Exam) -> bool {
        if !self.include_inactive && !exam.active {
            return false;
        }
        if let Some(kind) = self.kind
            && exam.kind != kind
        {
            return false;
        }
        if let Some(category_id) = self.category_id
            && exam.category_id != Some(category_id)
        {
            return false;
        }
        !self.building_blocks || exam.is_building_block()
    }
}
