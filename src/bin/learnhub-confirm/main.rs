//! learnhub-confirm CLI entry point.
//!
//! Runs one checkout confirmation session headless: verify the payment
//! session, poll the access/enrollment predicate, report the terminal phase.
//! Used for support diagnostics when a customer's confirmation page stalls.

mod cli;

use clap::Parser;
use cli::Cli;
use learnhub_client::verification::Phase;
use learnhub_client::{AccessClient, AuthStore, HttpGateway, PaymentGateway, Verifier};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("learnhub-confirm v{}", env!("CARGO_PKG_VERSION"));

    let (config, session_token, target) = cli.into_parts()?;

    let mut gateway = HttpGateway::new(&config.gateway)?;
    if let Some(session) = AuthStore::hydrate(&config.data_dir).session() {
        gateway = gateway.with_bearer_token(session.access_token);
    }

    let gateway = Arc::new(gateway);
    let payment: Arc<dyn PaymentGateway> = gateway.clone();
    let access: Arc<dyn AccessClient> = gateway;
    let verifier = Verifier::new(payment, access, config.verification.clone());

    info!("Confirming {target}");
    let outcome = verifier.start(session_token, target).outcome().await;

    Ok(match outcome {
        Phase::Succeeded => {
            println!("confirmed");
            ExitCode::SUCCESS
        }
        Phase::Exhausted => {
            println!("still processing, check back shortly");
            ExitCode::from(2)
        }
        Phase::Failed(reason) => {
            println!("failed: {reason}");
            ExitCode::FAILURE
        }
        phase => {
            println!("stopped in non-terminal phase: {phase:?}");
            ExitCode::FAILURE
        }
    })
}
