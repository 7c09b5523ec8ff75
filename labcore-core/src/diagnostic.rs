//! Structured data-quality diagnostics
//!
//! Validation code returns these alongside its result instead of logging, so
//! the caller decides where they go.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Information,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticCode {
    /// Reference expression matched none of the recognized shapes
    MalformedReferenceExpression,
    /// Numeric field received a value that is not a number
    UnparseableValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    /// Offending input text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
}

impl Diagnostic {
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            input: None,
        }
    }

    pub fn malformed_reference(expression: &str) -> Self {
        Self::warning(
            DiagnosticCode::MalformedReferenceExpression,
            format!("Unrecognized reference expression: {:?}", expression),
        )
        .with_input(expression)
    }

    pub fn unparseable_value(value: &str) -> Self {
        Self::warning(
            DiagnosticCode::UnparseableValue,
            format!("Value is not a number: {:?}", value),
        )
        .with_input(value)
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_serialization() {
        let diagnostic = Diagnostic::malformed_reference("normal");
        let json = serde_json::to_string(&diagnostic).unwrap();
        assert!(json.contains("malformed-reference-expression"));
        assert!(json.contains("warning"));
        assert!(json.contains("\"input\":\"normal\""));
    }

    #[test]
    fn test_unparseable_value_helper() {
        let diagnostic = Diagnostic::unparseable_value("abc");
        assert_eq!(diagnostic.severity, Severity::Warning);
        assert_eq!(diagnostic.code, DiagnosticCode::UnparseableValue);
        assert_eq!(diagnostic.input.as_deref(), Some("abc"));
    }
}
