//! Bitcoin fee rate estimator - polls a node and reports fee rates per cycle

use anyhow::{anyhow, Context, Result};
use bitcoin_feerate_estimator::{EstimateResult, EstimatorEvent, FeeEstimator};
use bitcoin_feerate_estimator_cli::{
    bitcoin::BitcoinRpcClient,
    cli::Cli,
    config::AppConfig,
    server::{create_app, run_server},
};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "bitcoin_feerate_estimator=info,bitcoin_feerate_estimator_cli=info";
const DEBUG_LOG_FILTER: &str = "bitcoin_feerate_estimator=debug,bitcoin_feerate_estimator_cli=debug";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing to stderr
    let default_filter = match (&cli.log_filter, cli.debug) {
        (Some(filter), _) => filter.clone(),
        (None, true) => DEBUG_LOG_FILTER.to_string(),
        (None, false) => DEFAULT_LOG_FILTER.to_string(),
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();

    // Load configuration
    let mut config =
        AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply(&mut config);

    info!("Configuration loaded:");
    info!("  Bitcoin RPC: {} ({})", config.rpc.url(), config.rpc.network);
    info!("  Mode: {}", config.estimator.mode);
    info!("  Refresh: {}s", config.estimator.refresh_seconds);

    let credentials = config.rpc.credentials().context("Invalid RPC credentials")?;
    let client = BitcoinRpcClient::new(config.rpc.client_config(credentials))
        .context("Failed to create RPC client")?;

    let (estimator, mut events) = FeeEstimator::spawn(client, config.estimator.clone())
        .context("Failed to start fee estimator")?;

    let shutdown = CancellationToken::new();
    let server = config.http.listen.clone().map(|addr| {
        let app = create_app(estimator.subscribe());
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = run_server(app, &addr, shutdown).await {
                error!("HTTP server error: {}", e);
            }
        })
    });

    let outcome = tokio::select! {
        outcome = consume(&mut events, cli.json) => outcome,
        _ = shutdown_signal() => {
            info!("Received shutdown signal, shutting down gracefully...");
            Ok(())
        }
    };

    estimator.stop();
    estimator.join().await;
    shutdown.cancel();
    if let Some(server) = server {
        if let Err(e) = server.await {
            error!("HTTP server task failed: {}", e);
        }
    }

    info!("Fee estimator shut down");
    outcome
}

/// Reports results until the estimator stops; fails on a fatal estimator error.
async fn consume(
    events: &mut tokio::sync::mpsc::Receiver<EstimatorEvent>,
    json: bool,
) -> Result<()> {
    while let Some(event) = events.recv().await {
        match event {
            EstimatorEvent::Estimate(result) => report(&result, json)?,
            EstimatorEvent::Failed(err) => {
                error!("{}", err);
                return Err(anyhow!(err).context("Fee estimator failed"));
            }
        }
    }
    Ok(())
}

fn report(result: &EstimateResult, json: bool) -> Result<()> {
    if !result.ready {
        warn!("Bitcoind mempool not fully loaded, fees are unreliable");
    }
    if let Some(block) = &result.last_block {
        let mined_at = block
            .timestamp()
            .map(|time| time.to_rfc3339())
            .unwrap_or_default();
        debug!("Last block {} ({}) mined at {}", block.height, block.hash, mined_at);
    }
    info!("Recommended fees are {}", result.fees);

    if json {
        let line = serde_json::to_string(result).context("Failed to serialize result")?;
        println!("{line}");
    }
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
