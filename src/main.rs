//! formdispatch - deliver a form submission to each of its email destinations.

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use formdispatch::cli::{Cli, LogFormat};
use formdispatch::config::{Config, RuntimeConfig};
use formdispatch::{
    Dispatcher, FsTemplateStore, SmtpMailClient, SubmissionPayload, register_metric_descriptions,
};

/// Initialize the tracing subscriber with the specified log format.
///
/// Logs go to stderr; stdout carries the batch report only.
fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    match format {
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
                .with_env_filter(filter)
                .init();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_format);
    register_metric_descriptions();

    info!(config_path = %cli.config.display(), "Loading configuration");

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, path = %cli.config.display(), "Failed to load configuration");
            std::process::exit(1);
        }
    };

    info!("Validating configuration");
    if let Err(errors) = config.validate() {
        for e in &errors {
            error!(error = %e, "Configuration validation error");
        }
        error!(
            error_count = errors.len(),
            "Configuration validation failed"
        );
        std::process::exit(1);
    }

    let runtime_config = config.compile(&cli.config)?;

    if cli.validate {
        println!("Configuration is valid: {}", cli.config.display());
        println!(
            "  SMTP: {}:{} ({:?})",
            runtime_config.smtp.host, runtime_config.smtp.port, runtime_config.smtp.tls
        );
        println!("  From: {}", runtime_config.from);
        println!("  Templates: {}", runtime_config.templates_dir.display());
        println!(
            "  Delay between sends: {:?}",
            runtime_config.dispatch.delay
        );
        println!(
            "  Credentials: {}",
            if runtime_config.credentials.is_complete() {
                "present"
            } else {
                "MISSING (every batch will be refused)"
            }
        );
        return Ok(());
    }

    let payload = read_payload(&cli)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let delivered = runtime.block_on(run(runtime_config, payload))?;
    if !delivered {
        std::process::exit(1);
    }
    Ok(())
}

fn read_payload(cli: &Cli) -> Result<SubmissionPayload> {
    let raw = if cli.payload_from_stdin() {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read payload from stdin")?;
        buf
    } else {
        std::fs::read_to_string(&cli.payload)
            .with_context(|| format!("failed to read payload {}", cli.payload.display()))?
    };

    serde_json::from_str(&raw).context("invalid submission payload")
}

/// Dispatch one submission and print the report. Returns whether the batch ran.
async fn run(runtime_config: RuntimeConfig, payload: SubmissionPayload) -> Result<bool> {
    let client = SmtpMailClient::from_config(
        &runtime_config.smtp,
        &runtime_config.from,
        &runtime_config.credentials,
    )?;
    let store = FsTemplateStore::new(runtime_config.templates_dir.clone());
    if !store.dir().is_dir() {
        tracing::warn!(
            dir = %store.dir().display(),
            "Template directory not found, every submission will use the built-in template"
        );
    }

    let dispatcher = Dispatcher::from_runtime(&runtime_config, Arc::new(client), Arc::new(store));

    info!(
        submission_id = %payload.submission_id,
        destinations = payload.destinations.len(),
        "formdispatch starting"
    );

    let report = dispatcher.send_to_destinations(&payload).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(report.is_success())
}
