//! pinpad-cli - run one request against the attached payment terminals.
//!
//! ```text
//! pinpad-cli --config dal.json --request get-status.json
//! ```
//!
//! Logging honours `RUST_LOG` (default `info`).

use anyhow::{Context, Result, bail};
use clap::Parser;
use pinpad_core::{DalConfiguration, LinkRequest};
use pinpad_workflow::{ChannelPublisher, DalSession, WorkflowContext};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Run a single device request through the abstraction layer.
#[derive(Parser)]
#[command(name = "pinpad-cli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Request envelope to process (JSON)
    #[arg(short, long)]
    request: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let configuration = DalConfiguration::from_json_file(&cli.config)
        .with_context(|| format!("loading configuration {}", cli.config.display()))?;
    let json = std::fs::read_to_string(&cli.request)
        .with_context(|| format!("reading request {}", cli.request.display()))?;
    let request = LinkRequest::from_json(&json)
        .with_context(|| format!("parsing request {}", cli.request.display()))?;

    let (publisher, mut responses) = ChannelPublisher::new();
    let context = WorkflowContext::builder(configuration)
        .with_publisher(Arc::new(publisher))
        .build();
    let session = DalSession::new(context);

    let outcome = run(&session, request).await;
    session.shutdown().await;

    while let Ok(response) = responses.try_recv() {
        println!("{response}");
    }
    outcome
}

async fn run(session: &DalSession, request: LinkRequest) -> Result<()> {
    let discovery = session.start().await.context("device discovery failed")?;
    for device in &discovery.accepted {
        tracing::info!(device = %device.identifier(), "target device");
    }

    let report = session
        .process(request)
        .await
        .context("request processing failed")?;

    if !report.is_success() {
        let messages: Vec<String> = report
            .exceptions
            .iter()
            .map(|e| e.to_string())
            .collect();
        bail!("request {} did not complete: {}", report.final_state, messages.join("; "));
    }
    Ok(())
}
