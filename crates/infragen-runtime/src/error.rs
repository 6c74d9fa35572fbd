//! Orchestration errors.

use crate::parser::ParseError;
use crate::store::StoreError;
use crate::vcs::VcsError;
use infragen_core::RequestId;
use infragen_render::RenderError;
use thiserror::Error;

/// Broad class of an [`OrchestratorError`], used for status code mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    NotFound,
    ExternalService,
    Timeout,
    Internal,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid request: {0}")]
    Input(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("{stage} failed: {message}")]
    ExternalService { stage: &'static str, message: String },

    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    #[error("request {0} not found")]
    NotFound(RequestId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    pub fn vcs(stage: &'static str, err: VcsError) -> Self {
        OrchestratorError::ExternalService {
            stage,
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::Input(_) | OrchestratorError::Render(_) => ErrorKind::Input,
            OrchestratorError::Parse(e) if e.is_input_error() => ErrorKind::Input,
            OrchestratorError::Parse(_) | OrchestratorError::ExternalService { .. } => {
                ErrorKind::ExternalService
            }
            OrchestratorError::Timeout { .. } => ErrorKind::Timeout,
            OrchestratorError::NotFound(_) | OrchestratorError::Store(StoreError::NotFound(_)) => {
                ErrorKind::NotFound
            }
            OrchestratorError::Store(_) | OrchestratorError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_input(&self) -> bool {
        self.kind() == ErrorKind::Input
    }
}
