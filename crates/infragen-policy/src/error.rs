//! Validation errors.
//!
//! Rule violations are findings, not errors. An error means the input could
//! not be checked at all.

use crate::hcl::ParseError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The Terraform text is not readable HCL.
    #[error("unreadable Terraform at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The naming pattern does not translate into a regex.
    #[error("naming pattern '{pattern}' is not usable: {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl From<ParseError> for ValidationError {
    fn from(err: ParseError) -> Self {
        ValidationError::Parse {
            line: err.line,
            message: err.message,
        }
    }
}
