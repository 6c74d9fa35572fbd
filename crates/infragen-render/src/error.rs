//! Rendering errors.

use infragen_core::ResourceType;

/// Error type for bundle rendering.
///
/// All variants describe bad input; rendering itself cannot fail otherwise.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("unsupported resource type '{0}'")]
    UnsupportedResourceType(ResourceType),

    #[error("resource type '{resource_type}' requires attribute '{attribute}'")]
    MissingRequiredAttribute {
        resource_type: ResourceType,
        attribute: String,
    },

    #[error("attribute '{attribute}' of '{resource_type}' must be {expected}")]
    InvalidAttribute {
        resource_type: ResourceType,
        attribute: String,
        expected: &'static str,
    },

    #[error("a template for '{0}' is already registered")]
    DuplicateTemplate(ResourceType),
}
