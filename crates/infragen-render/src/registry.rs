//! Template registry.
//!
//! Maps each [`ResourceType`] to the [`ResourceTemplate`] that renders it.
//! The registry is populated once at startup and read-only afterwards; new
//! resource types are supported by registering another template.

use crate::context::RenderContext;
use crate::error::RenderError;
use crate::templates;
use infragen_core::config::PolicyRuleSet;
use infragen_core::{BundleFile, RenderedBundle, ResourceSpec, ResourceType};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Renders the resource-specific files of a bundle.
///
/// `provider.tf` and `backend.tf` are shared by every resource type and are
/// produced by the registry itself.
pub trait ResourceTemplate: Send + Sync {
    /// The resource type this template renders.
    fn resource_type(&self) -> ResourceType;

    /// Attributes that must be present once policy defaults are applied.
    fn required_attributes(&self) -> &'static [&'static str] {
        &[]
    }

    fn main(&self, ctx: &RenderContext<'_>) -> Result<String, RenderError>;

    fn variables(&self, ctx: &RenderContext<'_>) -> Result<String, RenderError>;

    fn outputs(&self, ctx: &RenderContext<'_>) -> Result<String, RenderError>;
}

/// Registry of resource templates.
#[derive(Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<ResourceType, Arc<dyn ResourceTemplate>>,
}

impl std::fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRegistry")
            .field("resource_types", &self.resource_types())
            .finish()
    }
}

impl TemplateRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the object storage, relational database and container
    /// cluster templates.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for template in templates::builtin() {
            registry.templates.insert(template.resource_type(), template);
        }
        registry
    }

    /// Register a template for a resource type that has none yet.
    pub fn register(&mut self, template: Arc<dyn ResourceTemplate>) -> Result<(), RenderError> {
        let resource_type = template.resource_type();
        if self.templates.contains_key(&resource_type) {
            return Err(RenderError::DuplicateTemplate(resource_type));
        }
        tracing::debug!(resource_type = %resource_type, "registered resource template");
        self.templates.insert(resource_type, template);
        Ok(())
    }

    pub fn get(&self, resource_type: &ResourceType) -> Option<&Arc<dyn ResourceTemplate>> {
        self.templates.get(resource_type)
    }

    pub fn supports(&self, resource_type: &ResourceType) -> bool {
        self.templates.contains_key(resource_type)
    }

    /// Registered resource types, sorted.
    pub fn resource_types(&self) -> Vec<ResourceType> {
        let mut types: Vec<_> = self.templates.keys().cloned().collect();
        types.sort();
        types
    }

    /// Render the five-file bundle for a spec.
    ///
    /// Rendering is a pure function of `spec` and `policy`: the same inputs
    /// always produce byte-identical files.
    pub fn render(
        &self,
        spec: &ResourceSpec,
        policy: &PolicyRuleSet,
    ) -> Result<RenderedBundle, RenderError> {
        let template = self
            .get(spec.resource_type())
            .ok_or_else(|| RenderError::UnsupportedResourceType(spec.resource_type().clone()))?;

        let ctx = RenderContext::new(spec, policy);
        for attribute in template.required_attributes() {
            if !ctx.has(attribute) {
                return Err(ctx.missing(attribute));
            }
        }

        let mut files = BTreeMap::new();
        files.insert(BundleFile::Main, template.main(&ctx)?);
        files.insert(BundleFile::Variables, template.variables(&ctx)?);
        files.insert(BundleFile::Outputs, template.outputs(&ctx)?);
        files.insert(BundleFile::Provider, templates::common::provider(&ctx));
        files.insert(BundleFile::Backend, templates::common::backend(&ctx));

        tracing::debug!(
            resource_type = %spec.resource_type(),
            canonical_name = %ctx.canonical_name(),
            "rendered bundle"
        );

        Ok(RenderedBundle {
            resource_type: spec.resource_type().clone(),
            resource_name: spec.resource_name().to_string(),
            environment: spec.environment(),
            canonical_name: ctx.canonical_name().to_string(),
            tags: ctx.tags().clone(),
            directory_path: ctx.directory_path(),
            files,
        })
    }
}
