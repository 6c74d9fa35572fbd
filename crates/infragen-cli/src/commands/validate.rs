//! `infragen validate`: check existing Terraform against the policy.

use anyhow::{Context, Result};
use infragen_core::ValidationReport;
use infragen_core::config::PolicyRuleSet;
use infragen_policy::ComplianceValidator;
use std::fs;
use std::path::{Path, PathBuf};

/// `.tf` files in a directory, sorted, or the single file given.
pub fn terraform_files(target: &Path) -> Result<Vec<PathBuf>> {
    if !target.is_dir() {
        return Ok(vec![target.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(target).with_context(|| format!("Failed to read {}", target.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "tf") {
            files.push(path);
        }
    }
    files.sort();
    if files.is_empty() {
        anyhow::bail!("No .tf files found in {}", target.display());
    }
    Ok(files)
}

pub fn check(policy: &PolicyRuleSet, target: &Path) -> Result<ValidationReport> {
    let mut text = String::new();
    for file in terraform_files(target)? {
        let contents = fs::read_to_string(&file).with_context(|| format!("Failed to read {}", file.display()))?;
        text.push_str(&contents);
        text.push('\n');
    }
    ComplianceValidator::new(policy)
        .validate_text(&text)
        .with_context(|| format!("Failed to read Terraform in {}", target.display()))
}

pub fn run(policy: &PolicyRuleSet, target: &Path) -> Result<()> {
    println!("🔍 Validating {}...", target.display());
    let report = check(policy, target)?;
    super::print_report(&report);
    if !report.passed() {
        anyhow::bail!("Policy validation failed with {} error(s).", report.error_count());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use infragen_core::{Attributes, Environment, ResourceSpec, ResourceType};

    fn strict_policy() -> PolicyRuleSet {
        PolicyRuleSet::from_yaml("organization: acme\ntags:\n  required: [Environment, CostCenter]\n").unwrap()
    }

    #[test]
    fn test_directory_of_rendered_files() {
        let spec = ResourceSpec::new(
            ResourceType::object_storage(),
            "logs",
            Environment::Dev,
            Attributes::new(),
        )
        .unwrap();
        let bundle = infragen_render::render(&spec, &PolicyRuleSet::default()).unwrap();
        let out = tempfile::tempdir().unwrap();
        let dir = super::super::write_bundle(&bundle, out.path()).unwrap();
        fs::write(dir.join("README.md"), "not terraform").unwrap();

        assert_eq!(terraform_files(&dir).unwrap().len(), 5);
        assert!(check(&PolicyRuleSet::default(), &dir).unwrap().passed());

        let report = check(&strict_policy(), &dir).unwrap();
        assert!(!report.passed());
        assert!(run(&strict_policy(), &dir).is_err());
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(terraform_files(dir.path()).is_err());
    }
}
