//! Command handlers for CLI subcommands.

use std::sync::Arc;

use sailing_process::TokioProcessLauncher;
use sailing_release::{Release, TargetKind, TeardownReport, ToolConfig};
use tracing::{info, warn};

use crate::cli::{Commands, ContextArgs, ForwardSpec};

/// Result type for command operations.
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Execute a CLI command.
pub async fn execute(command: Commands, tools: ToolConfig) -> Result<()> {
    match command {
        Commands::Attach {
            release,
            context,
            services,
            pods,
        } => cmd_attach(&release, &context, services, pods, tools).await,
        Commands::Uninstall { release, context } => cmd_uninstall(&release, &context, tools).await,
    }
}

fn bind_release(name: &str, context: &ContextArgs, tools: ToolConfig) -> Release {
    Release::with_config(
        name,
        Arc::new(TokioProcessLauncher::new()),
        context.to_context(),
        tools,
    )
}

async fn cmd_attach(
    name: &str,
    context: &ContextArgs,
    services: Vec<ForwardSpec>,
    pods: Vec<ForwardSpec>,
    tools: ToolConfig,
) -> Result<()> {
    let release = bind_release(name, context, tools);

    let targets = services
        .into_iter()
        .map(|s| s.into_target(TargetKind::Service))
        .chain(pods.into_iter().map(|p| p.into_target(TargetKind::Pod)));

    // Tunnels must not outlive the release, so a start error still tears down.
    let mut start_error = None;
    for target in targets {
        let label = target.to_string();
        match release.start_tunnel(target).await {
            Ok(0) => println!("  {} -> failed to establish", label),
            Ok(port) => println!("  {} -> localhost:{}", label, port),
            Err(e) => {
                start_error = Some(e);
                break;
            }
        }
    }

    if start_error.is_none() {
        println!(
            "{} tunnel(s) open into '{}'. Press Ctrl-C to uninstall.",
            release.tunnel_count().await,
            release.deployment_name()
        );
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C, tearing down");
        }
    }

    info!(release = %name, "uninstalling release");
    let report = release.tear_down().await?;
    print_report(name, &report);

    match start_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

async fn cmd_uninstall(name: &str, context: &ContextArgs, tools: ToolConfig) -> Result<()> {
    let report = bind_release(name, context, tools).tear_down().await?;
    print_report(name, &report);
    Ok(())
}

fn print_report(name: &str, report: &TeardownReport) {
    println!(
        "Uninstalled '{}' after closing {} tunnel(s)",
        name, report.cancelled
    );
    for failure in &report.failures {
        eprintln!("  warning: {} did not close cleanly: {}", failure.tunnel, failure.error);
    }
}
