//! Request processing for infragen.
//!
//! Everything with side effects lives here: the parsers that turn request
//! text into a spec, the version control clients, the request store, and the
//! [`Orchestrator`] that strings them together with the renderer and the
//! compliance validator.

pub mod error;
pub mod orchestrator;
pub mod parser;
pub mod pull_request;
pub mod service;
pub mod store;
pub mod tracker;
pub mod vcs;

pub use error::{ErrorKind, OrchestratorError};
pub use orchestrator::{DryRunOutcome, Orchestrator};
pub use parser::{ParseError, ResourceParser};
pub use pull_request::PullRequestPlan;
pub use service::ProvisionService;
pub use store::{InMemoryRequestStore, RequestCursor, RequestFilter, RequestStore, StoreError};
pub use tracker::RequestTracker;
pub use vcs::{OpenedPullRequest, PullRequestDraft, VcsClient, VcsError};
