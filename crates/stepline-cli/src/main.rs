//! Stepline command line tool.
//!
//! Runs declarative YAML workflows locally.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use stepline_engine::bundle::ManifestBundleLoader;
use stepline_engine::{create_default_registry, HandlerRegistry, WorkflowDriver};

#[derive(Parser)]
#[command(name = "stepline")]
#[command(version, about = "Stepline - declarative YAML workflow runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow file
    ///
    /// Examples:
    ///     stepline run ./workflow.yaml
    ///     stepline run ./workflow.yaml --env region=eu --env user=ada
    #[command(verbatim_doc_comment)]
    Run {
        /// Path to the workflow YAML file
        workflow: PathBuf,

        /// Override workflow variables (format: KEY=VALUE), can be repeated
        #[arg(short, long = "env", value_name = "KEY=VALUE")]
        env: Vec<String>,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List registered actions (built-ins and bundles)
    Actions,

    /// List configured bundle identifiers
    Bundles,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Run { verbose: true, .. });
    init_tracing(verbose);

    dotenvy::dotenv().ok();

    let config = Config::load()?;

    match cli.command {
        Commands::Run { workflow, env, .. } => {
            let overrides = parse_overrides(&env)?;
            let registry = build_registry(&config);
            let driver = WorkflowDriver::new(Arc::new(registry));

            let run = driver
                .run_file(&workflow, &overrides)
                .await
                .with_context(|| format!("Failed to run workflow: {}", workflow.display()))?;

            println!(
                "Workflow finished: {} ({} executed, {} skipped, {} failed)",
                run.status(),
                run.executed(),
                run.skipped(),
                run.failed()
            );
            Ok(if run.status().is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Commands::Actions => {
            let registry = build_registry(&config);
            for action in registry.actions() {
                println!("{}", action);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Bundles => {
            if config.bundles.is_empty() {
                println!("No bundles configured");
            }
            for bundle in &config.bundles {
                println!("{}", bundle);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Built-ins first, then configured bundles.
fn build_registry(config: &Config) -> HandlerRegistry {
    let mut registry = create_default_registry();
    if !config.bundles.is_empty() {
        let loader = ManifestBundleLoader::with_base_dir(config.bundle_base());
        let added = registry.load_external(&loader, config.bundles.as_slice());
        tracing::debug!(added, "external bundles registered");
    }
    registry
}

/// Parse `KEY=VALUE` overrides, splitting on the first `=`.
fn parse_overrides(pairs: &[String]) -> Result<HashMap<String, Value>> {
    let mut vars = HashMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Invalid variable format: {}. Expected KEY=VALUE", pair))?;
        vars.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(vars)
}
