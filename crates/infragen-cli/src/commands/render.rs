//! `infragen render`: render a structured spec file.

use anyhow::{Context, Result};
use infragen_core::{InfragenConfig, ResourceSpec};
use infragen_runtime::Orchestrator;
use infragen_runtime::parser::StructuredParser;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Read a YAML or JSON spec file.
pub fn read_spec(path: &Path) -> Result<ResourceSpec> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("Invalid resource spec in {}", path.display()))
}

pub fn run(config: InfragenConfig, spec_file: &Path, out: Option<&Path>) -> Result<()> {
    let spec = read_spec(spec_file)?;
    let orchestrator = Orchestrator::new(config.policy, Arc::new(StructuredParser::new()));
    let outcome = orchestrator.render_spec(spec)?;

    super::print_bundle(&outcome.bundle);
    if let Some(out) = out {
        let dir = super::write_bundle(&outcome.bundle, out)?;
        println!("   Written to {}", dir.display());
    }
    super::print_report(&outcome.report);
    Ok(())
}
