use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use time::Date;
use tokio_util::sync::CancellationToken;

use snyk_compliance_rs::report::local_today;
use snyk_compliance_rs::retry::TokioSleeper;
use snyk_compliance_rs::{pipeline, ApiClient, Config};

/// snyk-compliance — reconcile tracked Snyk targets against their latest scan dates.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "snyk-compliance",
    version,
    about = "Reconcile tracked Snyk targets against their latest scan dates and write a compliance CSV.",
    long_about = None
)]
struct Cli {
    /// Directory the dated CSV report is written into.
    #[arg(long = "output-dir", default_value = ".")]
    output_dir: PathBuf,

    /// Dotenv file with SNYK_TOKEN / SNYK_ORG_ID (defaults to ./.env when present).
    #[arg(long = "env-file")]
    env_file: Option<PathBuf>,

    /// Override COMPLIANCE_THRESHOLD_DAYS.
    #[arg(long = "threshold-days")]
    threshold_days: Option<u32>,
}

fn main() -> ExitCode {
    // Resolve the local date while the process is still single-threaded.
    let report_date = local_today();
    let cli = Cli::parse();
    init_tracing();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("\n[ERROR] failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli, report_date)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\n[ERROR] {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, report_date: Date) -> Result<()> {
    let mut config =
        Config::from_env(cli.env_file.as_deref()).context("failed to load configuration")?;
    if let Some(days) = cli.threshold_days {
        config.threshold_days = days;
    }

    println!("snyk-compliance configuration:");
    println!("  org_id         : {}", config.org_id);
    println!("  threshold_days : {}", config.threshold_days);
    println!("  api_url        : {}", config.api_url);
    println!("  output_dir     : {}", cli.output_dir.display());

    // Ctrl-C aborts any pending backoff or poll wait.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_ctrlc.cancel();
    });

    let client = ApiClient::new(&config, TokioSleeper::new(cancel))?;
    pipeline::run_report(&client, &config, &cli.output_dir, report_date).await?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error")),
        )
        .with_writer(std::io::stderr)
        .init();
}
