//! Terraform bundle rendering for infragen.
//!
//! Expands a [`ResourceSpec`] plus the organization's [`PolicyRuleSet`] into
//! the five canonical files of a [`RenderedBundle`]:
//!
//! 1. The canonical name is derived from the policy naming pattern
//! 2. Policy default tags are merged under the spec's explicit tags
//! 3. Policy security defaults fill attributes the spec left out
//! 4. The registered [`ResourceTemplate`] renders `main.tf`, `variables.tf`
//!    and `outputs.tf`; `provider.tf` and `backend.tf` are shared
//!
//! Rendering never reads the clock or any randomness, so identical inputs
//! produce byte-identical bundles.

pub mod context;
pub mod error;
pub mod hcl;
pub mod registry;
pub mod templates;

pub use context::{RenderContext, canonical_name, effective_attributes, merge_tags};
pub use error::RenderError;
pub use registry::{ResourceTemplate, TemplateRegistry};

use infragen_core::config::PolicyRuleSet;
use infragen_core::{RenderedBundle, ResourceSpec};

/// Render a spec with the built-in templates.
pub fn render(spec: &ResourceSpec, policy: &PolicyRuleSet) -> Result<RenderedBundle, RenderError> {
    TemplateRegistry::builtin().render(spec, policy)
}
