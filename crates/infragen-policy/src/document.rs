//! Terraform-level view over a parsed HCL body.
//!
//! Maps AWS resource blocks to infragen resource types and links companion
//! resources (versioning, encryption, node groups) to their primary resource.

use crate::hcl::{self, Body, ParseError, Value};
use infragen_core::ResourceType;
use std::collections::BTreeMap;

/// Primary Terraform resource per resource type, with its name attribute.
const PRIMARY_RESOURCES: &[(&str, &str, &str)] = &[
    ("aws_s3_bucket", ResourceType::OBJECT_STORAGE, "bucket"),
    ("aws_db_instance", ResourceType::RELATIONAL_DATABASE, "identifier"),
    ("aws_eks_cluster", ResourceType::CONTAINER_CLUSTER, "name"),
];

/// Resources that carry tags and are checked for required tags.
const TAGGABLE_RESOURCES: &[&str] = &[
    "aws_s3_bucket",
    "aws_db_instance",
    "aws_eks_cluster",
    "aws_eks_node_group",
];

/// A `resource "<kind>" "<name>" { ... }` block.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceBlock {
    pub kind: String,
    pub name: String,
    pub body: Body,
    pub line: usize,
}

impl ResourceBlock {
    /// Terraform address, e.g. `aws_s3_bucket.logs`.
    pub fn address(&self) -> String {
        format!("{}.{}", self.kind, self.name)
    }

    /// Whether an attribute of this block references `target`.
    fn references(&self, key: &str, target: &ResourceBlock) -> bool {
        match self.body.attr(key) {
            Some(Value::Expression(expr)) => {
                let prefix = format!("{}.", target.address());
                expr.starts_with(&prefix)
            }
            Some(Value::Template(template)) => {
                let prefix = format!("${{{}.", target.address());
                template.starts_with(&prefix)
            }
            Some(Value::String(literal)) => {
                let name_attr = PRIMARY_RESOURCES
                    .iter()
                    .find(|(kind, _, _)| *kind == target.kind)
                    .map(|(_, _, attr)| *attr);
                name_attr
                    .and_then(|attr| target.body.attr(attr))
                    .and_then(Value::as_str)
                    .is_some_and(|name| name == literal)
            }
            _ => false,
        }
    }
}

/// A primary resource together with its resource type.
#[derive(Debug, Clone, Copy)]
pub struct Primary<'a> {
    pub resource_type: &'a str,
    pub name_attribute: &'static str,
    pub block: &'a ResourceBlock,
}

/// Tags a resource ends up with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tags {
    Known(BTreeMap<String, String>),
    /// The resource's `tags` are not a literal map. The provider defaults
    /// that are known are kept.
    Unresolved(BTreeMap<String, String>),
}

impl Tags {
    /// Whether `key` is present with a non-empty value.
    pub fn has(&self, key: &str) -> bool {
        let map = match self {
            Tags::Known(map) | Tags::Unresolved(map) => map,
        };
        map.get(key).is_some_and(|v| !v.trim().is_empty())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match self {
            Tags::Known(map) | Tags::Unresolved(map) => map.get(key).map(String::as_str),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Tags::Known(_))
    }
}

/// All resources of a Terraform configuration.
#[derive(Debug, Clone, Default)]
pub struct TerraformDocument {
    resources: Vec<ResourceBlock>,
    default_tags: Option<Value>,
}

impl TerraformDocument {
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        Ok(Self::from_body(hcl::parse(source)?))
    }

    pub fn from_body(body: Body) -> Self {
        let mut document = Self::default();
        for block in body.blocks {
            match block.kind.as_str() {
                "resource" if block.labels.len() == 2 => {
                    let mut labels = block.labels.into_iter();
                    let kind = labels.next().unwrap_or_default();
                    let name = labels.next().unwrap_or_default();
                    document.resources.push(ResourceBlock {
                        kind,
                        name,
                        body: block.body,
                        line: block.line,
                    });
                }
                "provider" if block.labels.first().is_some_and(|l| l == "aws") => {
                    if let Some(tags) = block.body.nested_attr(&["default_tags"], "tags") {
                        document.default_tags = Some(tags.clone());
                    }
                }
                _ => {}
            }
        }
        document
    }

    pub fn resources(&self) -> &[ResourceBlock] {
        &self.resources
    }

    pub fn resources_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a ResourceBlock> + 'a {
        self.resources.iter().filter(move |r| r.kind == kind)
    }

    /// Primary resources in document order.
    pub fn primaries(&self) -> Vec<Primary<'_>> {
        self.resources
            .iter()
            .filter_map(|block| {
                PRIMARY_RESOURCES
                    .iter()
                    .find(|(kind, _, _)| *kind == block.kind)
                    .map(|&(_, resource_type, name_attribute)| Primary {
                        resource_type,
                        name_attribute,
                        block,
                    })
            })
            .collect()
    }

    /// Resources subject to the required-tags rule, in document order.
    pub fn taggable(&self) -> impl Iterator<Item = &ResourceBlock> {
        self.resources
            .iter()
            .filter(|r| TAGGABLE_RESOURCES.contains(&r.kind.as_str()))
    }

    /// Companion resources of `kind` whose `key` attribute points at `primary`.
    pub fn companions<'a>(
        &'a self,
        kind: &'a str,
        key: &'a str,
        primary: &'a ResourceBlock,
    ) -> impl Iterator<Item = &'a ResourceBlock> + 'a {
        self.resources_of(kind)
            .filter(move |candidate| candidate.references(key, primary))
    }

    pub fn companion<'a>(
        &'a self,
        kind: &'a str,
        key: &'a str,
        primary: &'a ResourceBlock,
    ) -> Option<&'a ResourceBlock> {
        self.companions(kind, key, primary).next()
    }

    /// Provider default tags merged with the resource's own tags.
    pub fn effective_tags(&self, resource: &ResourceBlock) -> Tags {
        let mut tags = BTreeMap::new();
        let mut resolved = true;

        if let Some(value) = &self.default_tags {
            resolved &= collect_tags(value, &mut tags);
        }
        if let Some(value) = resource.body.attr("tags") {
            resolved &= collect_tags(value, &mut tags);
        }

        if resolved {
            Tags::Known(tags)
        } else {
            Tags::Unresolved(tags)
        }
    }
}

/// Copy literal tags into `into`; returns false when the value is not a
/// literal map. Non-literal values of individual tags count as present.
fn collect_tags(value: &Value, into: &mut BTreeMap<String, String>) -> bool {
    let Some(entries) = value.as_object() else {
        return matches!(value, Value::Null);
    };
    for (key, value) in entries {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Expression(expr) | Value::Template(expr) => expr.clone(),
            Value::Null | Value::List(_) | Value::Object(_) => String::new(),
        };
        into.insert(key.clone(), text);
    }
    true
}
