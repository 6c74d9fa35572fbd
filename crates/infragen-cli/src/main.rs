mod commands;

use clap::{Parser, Subcommand};
use infragen_core::{Environment, RequestMetadata};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "infragen", version, about = "Terraform from plain-language infrastructure requests")]
struct Cli {
    /// Project configuration (infragen.yaml)
    #[arg(long, global = true, env = "INFRAGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Policy file, overriding the one named in the configuration
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render and validate a structured resource spec (YAML or JSON).
    Render {
        spec_file: PathBuf,

        /// Write the bundle under this directory
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Parse, render and validate a request without touching version control.
    DryRun {
        /// Request text, or "-" to read stdin
        text: String,

        #[arg(long)]
        environment: Option<Environment>,

        /// Write the bundle under this directory
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Queue a provisioning request and follow it until it finishes.
    Provision {
        /// Request text, or "-" to read stdin
        text: String,

        #[arg(long)]
        requester: String,

        #[arg(long)]
        team: Option<String>,

        #[arg(long)]
        service: Option<String>,

        /// Override the environment named in the request
        #[arg(long)]
        environment: Option<Environment>,

        /// Stop after validation instead of opening a pull request
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Return once the request is queued (requires --server)
        #[arg(long, default_value_t = false)]
        no_wait: bool,

        /// Base URL of a running infragen-server
        #[arg(long, env = "INFRAGEN_SERVER")]
        server: Option<String>,
    },

    /// Validate existing Terraform files; fails when the policy is violated.
    Validate {
        /// A .tf file or a directory of them
        target: PathBuf,
    },

    /// Print the effective policy.
    Policy {
        /// Dump the full policy as YAML
        #[arg(long, default_value_t = false)]
        yaml: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref(), cli.policy.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Render { spec_file, out } => {
            commands::render::run(config, &spec_file, out.as_deref())?
        }

        Command::DryRun {
            text,
            environment,
            out,
        } => commands::dry_run::run(config, &text, environment, out.as_deref()).await?,

        Command::Provision {
            text,
            requester,
            team,
            service,
            environment,
            dry_run,
            no_wait,
            server,
        } => {
            let metadata = RequestMetadata {
                requester,
                team,
                service,
                environment,
                dry_run,
            };
            let args = commands::provision::ProvisionArgs {
                text,
                metadata,
                no_wait,
                server,
            };
            commands::provision::run(config, args).await?
        }

        Command::Validate { target } => commands::validate::run(&config.policy, &target)?,

        Command::Policy { yaml } => commands::policy::run(&config.policy, yaml)?,
    }

    Ok(())
}
