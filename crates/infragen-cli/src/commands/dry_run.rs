//! `infragen dry-run`: parse, render and validate without version control.

use anyhow::Result;
use infragen_core::{Environment, InfragenConfig};
use infragen_runtime::Orchestrator;
use std::path::Path;

pub async fn run(
    config: InfragenConfig,
    text: &str,
    environment: Option<Environment>,
    out: Option<&Path>,
) -> Result<()> {
    let text = super::request_text(text)?;
    let orchestrator = Orchestrator::from_config(&config)?;

    println!("🔍 Parsing request with the {} parser...", orchestrator.parser_kind());
    let outcome = orchestrator.dry_run(&text, environment).await?;

    println!(
        "   {} {} in {}",
        outcome.spec.resource_type(),
        outcome.spec.resource_name(),
        outcome.spec.environment()
    );
    println!();
    super::print_bundle(&outcome.bundle);
    if let Some(out) = out {
        let dir = super::write_bundle(&outcome.bundle, out)?;
        println!("   Written to {}", dir.display());
    }
    super::print_report(&outcome.report);
    Ok(())
}
