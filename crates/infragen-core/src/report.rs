//! Compliance validation reports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a compliance finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub rule_id: String,
    pub message: String,
    /// Terraform address of the offending resource, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

impl Finding {
    pub fn new(severity: Severity, rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            rule_id: rule_id.into(),
            message: message.into(),
            resource: None,
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.rule_id, self.message)?;
        if let Some(resource) = &self.resource {
            write!(f, " ({})", resource)?;
        }
        Ok(())
    }
}

/// Ordered findings plus the overall verdict.
///
/// `passed` is derived from the findings and kept in sync by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    findings: Vec<Finding>,
    passed: bool,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            findings: Vec::new(),
            passed: true,
        }
    }

    pub fn from_findings(findings: Vec<Finding>) -> Self {
        let passed = !findings.iter().any(Finding::is_error);
        Self { findings, passed }
    }

    pub fn push(&mut self, finding: Finding) {
        if finding.is_error() {
            self.passed = false;
        }
        self.findings.push(finding);
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// One-line summary of the error findings, used in failure messages.
    pub fn error_summary(&self) -> String {
        self.errors()
            .map(|f| f.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}
