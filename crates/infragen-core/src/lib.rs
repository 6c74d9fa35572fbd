//! Shared data model for infragen.
//!
//! Every other crate speaks in these types: [`ResourceSpec`] goes into the
//! renderer, [`RenderedBundle`] comes out, [`ValidationReport`] carries the
//! compliance verdict, and [`ProvisionRequest`] tracks one request end to end.

pub mod bundle;
pub mod config;
pub mod report;
pub mod request;
pub mod resource;

pub use bundle::{BundleFile, RenderedBundle};
pub use config::{ConfigError, InfragenConfig, PolicyRuleSet, SecurityRules};
pub use report::{Finding, Severity, ValidationReport};
pub use request::{
    LifecycleError, ProvisionRequest, PullRequestResult, RequestId, RequestMetadata,
    RequestStatus, StatusChange, Transition,
};
pub use resource::{Attributes, Environment, ResourceSpec, ResourceType, SpecError};
