//! Compliance validator composing the rule phases.
//!
//! Rules run in a fixed order so reports are stable:
//!
//! 1. **Tags** - required tags on every taggable resource
//! 2. **Naming** - primary resource names against the naming pattern
//! 3. **Security** - per-type security rules
//! 4. **Structure** - versioning and node group scaling

use crate::document::TerraformDocument;
use crate::error::ValidationError;
use crate::findings::Findings;
use crate::hcl::{self, Body};
use crate::rules;
use infragen_core::config::PolicyRuleSet;
use infragen_core::{Environment, RenderedBundle, ValidationReport};

/// What to validate.
#[derive(Debug, Clone, Copy)]
pub enum ValidationInput<'a> {
    /// A freshly rendered bundle. Its environment is known.
    Bundle(&'a RenderedBundle),
    /// Terraform text from anywhere else.
    Text(&'a str),
}

/// Validates Terraform against a policy rule set.
pub struct ComplianceValidator<'a> {
    policy: &'a PolicyRuleSet,
}

impl<'a> ComplianceValidator<'a> {
    pub fn new(policy: &'a PolicyRuleSet) -> Self {
        Self { policy }
    }

    pub fn validate(&self, input: ValidationInput<'_>) -> Result<ValidationReport, ValidationError> {
        match input {
            ValidationInput::Bundle(bundle) => self.validate_bundle(bundle),
            ValidationInput::Text(text) => self.validate_text(text),
        }
    }

    /// Validate every file of a bundle as one configuration.
    pub fn validate_bundle(&self, bundle: &RenderedBundle) -> Result<ValidationReport, ValidationError> {
        let mut body = Body::default();
        for (file_name, contents) in bundle.iter_files() {
            let file = hcl::parse(contents).map_err(|e| ValidationError::Parse {
                line: e.line,
                message: format!("{}: {}", file_name, e.message),
            })?;
            body.attributes.extend(file.attributes);
            body.blocks.extend(file.blocks);
        }
        let document = TerraformDocument::from_body(body);
        self.validate_document(&document, Some(bundle.environment))
    }

    pub fn validate_text(&self, text: &str) -> Result<ValidationReport, ValidationError> {
        let document = TerraformDocument::parse(text)?;
        self.validate_document(&document, None)
    }

    /// Run every rule phase over a parsed document.
    pub fn validate_document(
        &self,
        document: &TerraformDocument,
        environment: Option<Environment>,
    ) -> Result<ValidationReport, ValidationError> {
        let mut findings = Findings::new(self.policy);

        rules::required_tags(document, self.policy, &mut findings);
        rules::naming(document, self.policy, environment, &mut findings)?;
        rules::security(document, self.policy, &mut findings);
        rules::structure(document, self.policy, &mut findings);

        let report = findings.finish();
        tracing::info!(
            resources = document.resources().len(),
            errors = report.error_count(),
            warnings = report.warning_count(),
            passed = report.passed(),
            "compliance validation finished"
        );
        Ok(report)
    }
}
