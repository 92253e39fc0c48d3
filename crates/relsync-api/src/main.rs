//! relsync binary
//!
//! Synchronizes business-service resource events into a relationship-based
//! authorization store and answers batched access checks on behalf of the
//! platform.
//!
//! # Usage
//!
//! ```bash
//! # With config file
//! relsync --config config.yaml
//!
//! # With environment variables only
//! RELSYNC_STORE__STORE_ID=01HXYZSTORE relsync
//! ```

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use relsync_api::dispatch::Dispatcher;
use relsync_api::nats::{self, JetStreamBucket};
use relsync_api::observability::{
    describe_metrics, init_logging, init_metrics, parse_log_level, serve_metrics, LoggingConfig,
};
use relsync_api::openfga::OpenFgaClient;
use relsync_server::ServiceConfig;
use relsync_storage::StoreAdapter;

/// Authorization relationship synchronizer
#[derive(Parser, Debug)]
#[command(name = "relsync")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = if let Some(config_path) = args.config {
        ServiceConfig::load(&config_path)?
    } else {
        ServiceConfig::from_env()?
    };

    init_logging(LoggingConfig {
        json_format: config.logging.json,
        default_level: parse_log_level(&config.logging.level),
    })?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting relsync");

    let metrics_handle = init_metrics()?;
    describe_metrics();
    if config.metrics.enabled {
        let listen = config.metrics.listen.clone();
        tokio::spawn(async move {
            if let Err(err) = serve_metrics(&listen, metrics_handle).await {
                error!(error = %err, "metrics listener failed");
            }
        });
    }

    info!(url = %config.bus.url, "connecting to bus");
    let client = async_nats::connect(&config.bus.url).await?;
    let jetstream = async_nats::jetstream::new(client.clone());
    let bucket = Arc::new(
        JetStreamBucket::open_or_create(&jetstream, &config.bus.cache_bucket).await?,
    );

    info!(api_url = %config.store.api_url, "connecting to relationship store");
    let store_client = Arc::new(OpenFgaClient::from_settings(&config.store)?);

    let adapter = Arc::new(StoreAdapter::new(store_client, bucket));
    let dispatcher = Arc::new(Dispatcher::new(adapter));

    tokio::select! {
        result = nats::run(client, dispatcher, &config.bus) => {
            result?;
            info!("bus connection closed");
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}
