//! CLI command implementations for infragen.

pub mod dry_run;
pub mod policy;
pub mod provision;
pub mod render;
pub mod validate;

use anyhow::{Context, Result};
use infragen_core::config::PolicyRuleSet;
use infragen_core::{InfragenConfig, RenderedBundle, ValidationReport};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "infragen.yaml";

/// Load `infragen.yaml` and apply a `--policy` override.
///
/// Without an explicit path the working directory's `infragen.yaml` is used
/// when present, otherwise the built-in defaults.
pub fn load_config(config: Option<&Path>, policy: Option<&Path>) -> Result<InfragenConfig> {
    let mut loaded = match config {
        Some(path) => InfragenConfig::load_with_context(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            InfragenConfig::load_with_context(DEFAULT_CONFIG_FILE)
                .with_context(|| format!("Failed to load {}", DEFAULT_CONFIG_FILE))?
        }
        None => InfragenConfig::default(),
    };

    if let Some(path) = policy {
        loaded.policy = PolicyRuleSet::from_file(path)
            .with_context(|| format!("Failed to load policy {}", path.display()))?;
    }
    Ok(loaded)
}

/// Request text from the argument, or stdin for `-`.
pub fn request_text(arg: &str) -> Result<String> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read request from stdin")?;
    Ok(text)
}

pub fn print_report(report: &ValidationReport) {
    println!("{}", "─".repeat(60));
    if report.findings().is_empty() {
        println!("✅ All policy checks passed");
        return;
    }
    for finding in report.findings() {
        let marker = if finding.is_error() { "✗" } else { "!" };
        println!("  {} {}", marker, finding);
    }
    println!();
    if report.passed() {
        println!("✅ Passed with {} warning(s)", report.warning_count());
    } else {
        println!(
            "❌ {} error(s), {} warning(s)",
            report.error_count(),
            report.warning_count()
        );
    }
}

pub fn print_bundle(bundle: &RenderedBundle) {
    println!("📦 {} ({})", bundle.canonical_name, bundle.resource_type);
    println!("   Directory: {}", bundle.directory_path);
    for (name, contents) in bundle.iter_files() {
        println!("   - {} ({} lines)", name, contents.lines().count());
    }
}

/// Write a bundle under `out/{directory_path}` and return that directory.
pub fn write_bundle(bundle: &RenderedBundle, out: &Path) -> Result<PathBuf> {
    let dir = out.join(&bundle.directory_path);
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    for (name, contents) in bundle.iter_files() {
        let path = dir.join(name);
        fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(dir)
}
