use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use clap::Parser;
use clap_serde_derive::ClapSerde;
use tracing::{error, info};

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::inference::workers_ai::WorkersAiClient;
use crate::telemetry::{init_telemetry, shutdown_telemetry};

#[macro_export]
macro_rules! exit_err {
    ($code:expr, $fmt:expr $(, $arg:expr)*) => {
        {
            tracing::error!($fmt $(, $arg)*);
            std::process::exit($code);
        }
    };
}

mod config;
mod dispatcher;
mod error;
mod inference;
mod routes;
mod task;
mod telemetry;

#[cfg(unix)]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

const DEFAULT_CONFIG_FILE: &str = "MangaGateway.toml";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env, default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,

    /// Configuration options
    #[command(flatten)]
    pub opt_config: <Config as ClapSerde>::Opt,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = match Config::opt_from_toml(&args.config_file) {
        Ok(opt) => Config::from(opt).merge(args.opt_config),
        Err(err) => {
            if args.config_file == DEFAULT_CONFIG_FILE {
                Config::default().merge(args.opt_config)
            } else {
                eprintln!(
                    "Failed to read configuration file {} with error: {}",
                    args.config_file, err
                );
                std::process::exit(1);
            }
        }
    };

    init_telemetry(config.otel_endpoint.as_deref())?;

    let (account_id, api_token) = match config.credentials() {
        Ok(credentials) => credentials,
        Err(err) => exit_err!(1, "{}", err),
    };
    let client = WorkersAiClient::new(&config.api_base, account_id, api_token)?;
    let dispatcher = Dispatcher::new(Arc::new(client), &config.model, config.inference_timeout());
    info!("Dispatching to model {}", dispatcher.model());

    let router = routes::router(Arc::new(dispatcher), config.body_limit);

    let addr: SocketAddr = format!("{}:{}", config.address, config.port)
        .parse()
        .context("Invalid listen address")?;
    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    match config.tls_paths()? {
        Some((cert, key)) => {
            let tls = RustlsConfig::from_pem_file(cert, key)
                .await
                .context("Failed to load TLS certificate")?;
            info!("Listening on https://{}", addr);
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(router.into_make_service())
                .await?;
        }
        None => {
            info!("Listening on http://{}", addr);
            axum_server::bind(addr)
                .handle(handle)
                .serve(router.into_make_service())
                .await?;
        }
    }

    shutdown_telemetry();
    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down..."),
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
    }
    handle.graceful_shutdown(Some(Duration::from_secs(30)));
}
