//! Rendered Terraform bundles.

use crate::resource::{Environment, ResourceType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One of the five files every bundle contains.
///
/// Variant order is the canonical file order, so a `BTreeMap` keyed by
/// `BundleFile` iterates main, variables, outputs, provider, backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BundleFile {
    #[serde(rename = "main.tf")]
    Main,
    #[serde(rename = "variables.tf")]
    Variables,
    #[serde(rename = "outputs.tf")]
    Outputs,
    #[serde(rename = "provider.tf")]
    Provider,
    #[serde(rename = "backend.tf")]
    Backend,
}

impl BundleFile {
    pub const ALL: [BundleFile; 5] = [
        BundleFile::Main,
        BundleFile::Variables,
        BundleFile::Outputs,
        BundleFile::Provider,
        BundleFile::Backend,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            BundleFile::Main => "main.tf",
            BundleFile::Variables => "variables.tf",
            BundleFile::Outputs => "outputs.tf",
            BundleFile::Provider => "provider.tf",
            BundleFile::Backend => "backend.tf",
        }
    }
}

impl fmt::Display for BundleFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// The output of rendering one resource spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedBundle {
    pub resource_type: ResourceType,
    pub resource_name: String,
    pub environment: Environment,
    /// Resource name after applying the policy naming pattern.
    pub canonical_name: String,
    /// Effective tags after merging policy defaults and explicit tags.
    pub tags: BTreeMap<String, String>,
    /// `{environment}/{resource_type}/{canonical_name}`.
    pub directory_path: String,
    pub files: BTreeMap<BundleFile, String>,
}

impl RenderedBundle {
    /// Directory a bundle is placed in, relative to the repository root dir.
    pub fn directory_for(
        environment: Environment,
        resource_type: &ResourceType,
        canonical_name: &str,
    ) -> String {
        format!("{}/{}/{}", environment, resource_type, canonical_name)
    }

    pub fn file(&self, file: BundleFile) -> Option<&str> {
        self.files.get(&file).map(String::as_str)
    }

    /// Iterate files in canonical order as `(file name, contents)`.
    pub fn iter_files(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.files
            .iter()
            .map(|(file, contents)| (file.file_name(), contents.as_str()))
    }

    /// All files joined in canonical order, as a single HCL document.
    pub fn combined_text(&self) -> String {
        self.files.values().map(String::as_str).collect::<Vec<_>>().join("\n")
    }

    /// Files keyed by their repository path under `root_dir`.
    pub fn repository_paths(&self, root_dir: &str) -> BTreeMap<String, String> {
        let root = root_dir.trim_matches('/');
        self.files
            .iter()
            .map(|(file, contents)| {
                let path = if root.is_empty() {
                    format!("{}/{}", self.directory_path, file.file_name())
                } else {
                    format!("{}/{}/{}", root, self.directory_path, file.file_name())
                };
                (path, contents.clone())
            })
            .collect()
    }
}
