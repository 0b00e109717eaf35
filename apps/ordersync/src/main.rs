//! ordersync CLI - runs one extraction and reconciliation cycle.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use ordersync::config::{AppConfig, LogFormat};
use ordersync::logging::init_logging;
use ordersync::notify::{LogNotifier, Notifier, WebhookNotifier};
use ordersync::{AppError, AppResult, Pipeline};

/// Order extraction and reconciliation run
#[derive(Parser)]
#[command(name = "ordersync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Comma-separated markets, overriding MARKETS_TO_PROCESS
    #[arg(long, value_delimiter = ',')]
    markets: Option<Vec<String>>,

    /// Environment file loaded before reading configuration
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Exit with code 2 when reconciliation partially failed
    #[arg(long)]
    fail_on_partial: bool,

    /// Log output format (json or pretty)
    #[arg(long)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(path) = &cli.env_file {
        if let Err(e) = dotenvy::from_path(path) {
            eprintln!("FATAL: Failed to load {}: {e}", path.display());
            return ExitCode::from(1);
        }
    }

    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e}");
            return ExitCode::from(1);
        }
    };
    apply_overrides(&mut config, cli);

    init_logging(&config.log_filter, config.log_format);

    match run(config).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %e, "CRITICAL: run aborted");
            ExitCode::from(1)
        }
    }
}

fn apply_overrides(config: &mut AppConfig, cli: Cli) {
    if let Some(markets) = cli.markets {
        let markets: Vec<String> = markets
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if !markets.is_empty() {
            config.markets = markets;
        }
    }
    if cli.fail_on_partial {
        config.fail_on_partial = true;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
}

async fn run(config: AppConfig) -> AppResult<u8> {
    info!(
        markets = ?config.markets,
        table = %config.database.table,
        "Starting run"
    );

    let notifier: Box<dyn Notifier> = match &config.notify.webhook_url {
        Some(url) => Box::new(WebhookNotifier::new(url.clone())?),
        None => Box::new(LogNotifier),
    };

    let fail_on_partial = config.fail_on_partial;
    let outcome = Pipeline::new(config, notifier).run().await.inspect_err(|e| {
        if matches!(e, AppError::Connector(inner) if inner.is_credential_failure()) {
            error!("CRITICAL: could not authenticate with the order API");
        }
    })?;

    Ok(outcome.exit_code(fail_on_partial))
}
