//! Compliance validation for infragen.
//!
//! Reads Terraform with a small HCL reader and checks it against a
//! [`PolicyRuleSet`]. Violations become [`Finding`](infragen_core::Finding)s
//! whose severity follows the policy's enforcement level; only unreadable
//! input is an error.

pub mod document;
pub mod error;
pub mod findings;
pub mod hcl;
pub mod rules;
pub mod validator;

pub use document::TerraformDocument;
pub use error::ValidationError;
pub use findings::rule_ids;
pub use validator::{ComplianceValidator, ValidationInput};

use infragen_core::ValidationReport;
use infragen_core::config::PolicyRuleSet;

/// Validate a bundle or Terraform text against `policy`.
pub fn validate(
    input: ValidationInput<'_>,
    policy: &PolicyRuleSet,
) -> Result<ValidationReport, ValidationError> {
    ComplianceValidator::new(policy).validate(input)
}
