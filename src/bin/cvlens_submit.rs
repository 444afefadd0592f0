//! Command-line client: ingest a CV from disk and analyze it through a running gateway.
//!
//! Progress updates are written to stderr; the `results` payload is pretty-printed to stdout.
//! Ctrl-C cancels a pending read, gateway call, or retry wait.
use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use cvlens::{
    cancel::cancellation,
    gateway::{DEFAULT_GATEWAY_TIMEOUT, HttpGatewayClient},
    ingest::load_document,
    logging,
    orchestrator::{AnalysisStatus, DEFAULT_MAX_RETRY_DELAY, Orchestrator, RetryPolicy},
};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(
    name = "cvlens-submit",
    about = "Submit a CV (pdf, docx, or text) for analysis through a cvlens gateway"
)]
struct Cli {
    /// Path of the document to analyze.
    file: PathBuf,
    /// Base URL of the running gateway.
    #[arg(long, env = "CVLENS_GATEWAY_URL", default_value = "http://127.0.0.1:4200")]
    gateway_url: String,
    /// Declared MIME type; guessed from the file extension when omitted.
    #[arg(long, default_value = "")]
    mime: String,
    /// Ceiling, in seconds, on any honored retry-after hint.
    #[arg(long, default_value_t = DEFAULT_MAX_RETRY_DELAY.as_secs())]
    max_retry_delay_secs: u64,
    /// Per-attempt timeout, in seconds, for calls to the gateway.
    #[arg(
        long,
        default_value_t = DEFAULT_GATEWAY_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_cli_tracing();

    let (cancel_handle, cancel) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling...");
            cancel_handle.cancel();
        }
    });

    let document = load_document(&cli.file, &cli.mime, &cancel)
        .await
        .with_context(|| format!("failed to load {}", cli.file.display()))?;

    let timeout = Duration::from_secs(cli.timeout_secs);
    let client = HttpGatewayClient::with_timeout(&cli.gateway_url, timeout)
        .context("failed to construct gateway HTTP client")?;
    tracing::debug!(endpoint = client.endpoint(), "Using gateway");
    let orchestrator = Orchestrator::new(Arc::new(client)).with_policy(
        RetryPolicy::default().with_max_delay(Duration::from_secs(cli.max_retry_delay_secs)),
    );

    let (updates, mut receiver) = mpsc::unbounded_channel::<AnalysisStatus>();
    let printer = tokio::spawn(async move {
        while let Some(status) = receiver.recv().await {
            eprintln!("{}", status.message());
        }
    });

    let outcome = orchestrator.submit(document, Some(&updates), &cancel).await;
    drop(updates);
    let _ = printer.await;

    let result = outcome.map_err(|error| match error.details() {
        Some(details) => anyhow!("{error}\ndetails: {details}"),
        None => anyhow!("{error}"),
    })?;
    let rendered = serde_json::to_string_pretty(result.as_value())
        .context("failed to render analysis results")?;
    println!("{rendered}");
    Ok(())
}
