use anyhow::{Context, Result};
use containerize::cli::commands::{RunCommand, ScanCommand, ValidateCommand};
use containerize::cli::output::*;
use containerize::cli::{Cli, Command};
use containerize::core::config::{ConfigOverrides, RunConfig};
use containerize::core::manifest::discover_manifests;
use containerize::execution::{ContainerizeEngine, ExecutionEvent};
use containerize::tooling::FileTreeScanner;
use std::path::Path;
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Exit code for a run that did not converge
const EXIT_FAILED: i32 = 1;

/// Exit code for a run stopped by Ctrl-C
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; stdout is reserved for reports
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run(cmd, cli.config.as_deref()).await?,
        Command::Validate(cmd) => validate(cmd, cli.config.as_deref())?,
        Command::Scan(cmd) => scan(cmd, cli.config.as_deref())?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>, overrides: ConfigOverrides) -> Result<RunConfig> {
    let mut config = match path {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("Failed to load run config {}", path.display()))?,
        None => RunConfig::default(),
    };
    config
        .apply_overrides(overrides)
        .context("Invalid command-line options")?;
    Ok(config)
}

async fn run(cmd: &RunCommand, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path, cmd.overrides())?;
    let mut engine = ContainerizeEngine::from_config(config);

    // Set up event handler for console output
    let spinner = (!cmd.json).then(create_spinner);
    if let Some(spinner) = spinner.clone() {
        engine.add_event_handler(move |event| {
            if let ExecutionEvent::IterationStarted { name, iteration } = &event {
                spinner.set_message(format!("{} iteration {}", name, iteration + 1));
            }
            spinner.println(format_execution_event(&event));
        });
    }

    let interrupt = engine.interrupt_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received; abandoning the current step (press Ctrl-C again to exit now)");
        interrupt.trigger();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Second interrupt received; exiting");
            std::process::exit(EXIT_CANCELLED);
        }
    });

    let result = engine.run().await;
    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            println!("{} {}", CROSS, style(&e).red());
            error!("{}", e);
            std::process::exit(EXIT_FAILED);
        }
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n{}", format_report(&report));
    }

    if report.is_cancelled() {
        std::process::exit(EXIT_CANCELLED);
    }
    if !report.is_success() {
        std::process::exit(EXIT_FAILED);
    }
    Ok(())
}

fn validate(cmd: &ValidateCommand, config_path: Option<&Path>) -> Result<()> {
    println!("{} Validating configuration...", INFO);

    let result = load_config(config_path, cmd.target.overrides()).and_then(|config| {
        let manifests = discover_manifests(&config.manifest_dir())?;
        Ok((config, manifests))
    });

    match result {
        Ok((config, manifests)) => {
            println!("{} Configuration is valid!", CHECK);
            println!("  Repository: {}", style(config.repository.display()).bold());
            println!("  Image: {}", style(config.image_ref()).cyan());
            let dockerfile = config.dockerfile_path();
            let dockerfile_note = if dockerfile.exists() { "" } else { " (will be drafted)" };
            println!("  Dockerfile: {}{}", style(dockerfile.display()).dim(), dockerfile_note);
            println!("  Manifests: {}", style(manifests.len()).cyan());
            for manifest in manifests.values() {
                let kind = manifest
                    .resource
                    .as_ref()
                    .map(|r| r.qualified_name())
                    .unwrap_or_else(|| "unnamed".to_string());
                println!("    {} {}", style(&manifest.name).bold(), style(kind).dim());
            }

            if cmd.json {
                let data = serde_json::json!({
                    "config": config,
                    "manifests": manifests.values().map(|m| serde_json::json!({
                        "name": m.name,
                        "path": m.path,
                        "resource": m.resource,
                        "workload": m.is_deployment_type,
                    })).collect::<Vec<_>>(),
                });
                println!("\n{}", serde_json::to_string_pretty(&data)?);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(EXIT_FAILED);
        }
    }
}

fn scan(cmd: &ScanCommand, config_path: Option<&Path>) -> Result<()> {
    let overrides = ConfigOverrides {
        repository: cmd.repo.clone(),
        ..Default::default()
    };
    let config = load_config(config_path, overrides)?;
    let tree = FileTreeScanner::default()
        .describe(&config.repository)
        .context("Failed to scan repository")?;
    println!("{}", tree);
    Ok(())
}
