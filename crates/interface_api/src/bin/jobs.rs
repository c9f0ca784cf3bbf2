//! Accumulation batch jobs
//!
//! ```bash
//! accumulation-jobs source --payer ANTHEM [--date 2025-01-01]
//! accumulation-jobs reconcile --payer ANTHEM --file ANTHEM_20250101
//! accumulation-jobs keygen --payer ANTHEM
//! ```
//!
//! Exits non-zero when the run fails: a report marked FAILURE, a security
//! error, or a store error.

use std::process::ExitCode;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use domain_accumulation::PayerCode;
use interface_api::config::JobsConfig;
use interface_api::jobs::{generate_payer_keys, JobRunner};
use interface_api::telemetry::init_tracing;

#[derive(Debug, Parser)]
#[command(name = "accumulation-jobs", version, about = "Payer claims-accumulation batch jobs")]
struct Cli {
    /// Configuration file stem (TOML), overridden by ACCUM_* variables
    #[arg(long, env = "ACCUM_CONFIG", default_value = interface_api::config::JOBS_CONFIG_FILE)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate and submit the outbound batch for a payer
    Source {
        #[arg(long)]
        payer: String,
        /// Report date, YYYY-MM-DD; defaults to today in the business timezone
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Reconcile a payer response file
    Reconcile {
        #[arg(long)]
        payer: String,
        #[arg(long)]
        file: String,
    },
    /// Create the exchange key pair for a payer
    Keygen {
        #[arg(long)]
        payer: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match JobsConfig::load_from(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log_level, &config.log_format);

    match run(cli.command, &config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Job aborted");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the job succeeded
async fn run(command: Command, config: &JobsConfig) -> anyhow::Result<bool> {
    match command {
        Command::Source { payer, date } => {
            let payer = PayerCode::new(&payer)?;
            let report_date = match date {
                Some(date) => date,
                None => config.default_report_date().map_err(anyhow::Error::msg)?,
            };
            let runner = JobRunner::connect(config, &payer).await.context("preparing sourcing job")?;
            let summary = runner.source(&payer, report_date).await?;
            Ok(!summary.is_failure())
        }
        Command::Reconcile { payer, file } => {
            let payer = PayerCode::new(&payer)?;
            let runner = JobRunner::connect(config, &payer).await.context("preparing reconciliation job")?;
            runner.reconcile(&payer, &file).await?;
            Ok(true)
        }
        Command::Keygen { payer } => {
            let code = PayerCode::new(&payer)?;
            let payer_config = config
                .payer(code.as_str())
                .with_context(|| format!("no exchange settings for payer {code}"))?;
            let fingerprint = generate_payer_keys(&code, payer_config).await?;
            println!("{fingerprint}");
            Ok(true)
        }
    }
}
