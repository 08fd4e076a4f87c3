mod cli;
mod output;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use probescope::network::{expand_targets, parse_ports};
use probescope::{Engine, EngineConfig, ScanTask};

use crate::cli::Cli;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(path) = &cli.stats {
        config.stats_path = Some(path.clone());
    }
    if cli.no_stats {
        config.stats_path = None;
    }
    if let Some(concurrency) = cli.concurrency {
        config.max_concurrency = concurrency;
    }
    if let Some(timeout) = cli.timeout {
        config.connect_timeout_ms = timeout;
    }

    let targets = expand_targets(&cli.targets.join(","))?;
    let ports = parse_ports(cli.ports.as_deref().unwrap_or("default"))?;

    let engine = Engine::new(config)?;
    let mut task = ScanTask::new(
        format!("scan-{}", Utc::now().format("%Y%m%dT%H%M%S")),
        targets,
        ports,
    )
    .with_timeout(engine.config().connect_timeout());
    if cli.deep {
        task = task.deep(cli.depth);
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, waiting for in-flight probes");
                cancel.cancel();
            }
        });
    }
    let shutdown = CancellationToken::new();
    let autosave = engine.start_autosave(shutdown.clone());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.bright_magenta} [{elapsed_precise}] {msg}")?,
    );
    spinner.set_message(format!(
        "probing {} targets x {} ports{}",
        task.targets.len(),
        task.ports.len(),
        if task.enable_deep_fingerprint { " (deep)" } else { "" }
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let results = engine.execute(&task, &cancel).await;
    spinner.finish_and_clear();

    shutdown.cancel();
    if let Some(handle) = autosave {
        let _ = handle.await;
    }
    if let Err(e) = engine.statistics().save() {
        warn!(error = %e, "could not save probe statistics");
    }
    info!(task = %task.id, targets = results.len(), "scan finished");

    let writer = OutputWriter::new(cli.output_format, cli.output_file);
    writer.write(&results)?;
    if cli.stats_report {
        writer.write_statistics(&engine.statistics().ranked())?;
    }

    Ok(())
}
