use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;

use qrserve::config::{ServiceConfig, SizingKind};
use qrserve::params::PayloadPolicy;
use qrserve::server::{self, AppState};

/// Serve QR code images over HTTP.
#[derive(Debug, Parser)]
#[command(name = "qrserve", version, about)]
struct Cli {
    /// TOML config file; flags below override its values.
    #[arg(short, long, env = "QRSERVE_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, e.g. 127.0.0.1:8080.
    #[arg(short, long, env = "QRSERVE_BIND")]
    bind: Option<String>,

    /// What to do when `data` is missing or blank.
    #[arg(long, value_enum, env = "QRSERVE_PAYLOAD_POLICY")]
    payload_policy: Option<PayloadPolicy>,

    /// Payload substituted under the lenient policy.
    #[arg(long, env = "QRSERVE_DEFAULT_PAYLOAD")]
    default_payload: Option<String>,

    /// Raster sizing strategy.
    #[arg(long, value_enum, env = "QRSERVE_SIZING")]
    sizing: Option<SizingKind>,

    /// Block size in pixels for per-module sizing.
    #[arg(long, env = "QRSERVE_PIXELS_PER_MODULE")]
    pixels_per_module: Option<u32>,

    /// Largest raster image, in pixels.
    #[arg(long, env = "QRSERVE_MAX_PIXELS")]
    max_pixels: Option<u64>,

    /// Encode/render jobs allowed to run at once.
    #[arg(long, env = "QRSERVE_MAX_IN_FLIGHT")]
    max_in_flight: Option<u32>,

    /// Wall-clock budget per request, in milliseconds.
    #[arg(long, env = "QRSERVE_REQUEST_TIMEOUT_MS")]
    request_timeout_ms: Option<u64>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ServiceConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(policy) = self.payload_policy {
            config.payload_policy = policy;
        }
        if let Some(payload) = self.default_payload {
            config.default_payload = payload;
        }
        if let Some(sizing) = self.sizing {
            config.sizing = sizing;
        }
        if let Some(ppm) = self.pixels_per_module {
            config.pixels_per_module = ppm;
        }
        if let Some(max) = self.max_pixels {
            config.max_pixels = max;
        }
        if let Some(jobs) = self.max_in_flight {
            config.max_in_flight = jobs;
        }
        if let Some(ms) = self.request_timeout_ms {
            config.request_timeout_ms = ms;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Cli::parse().into_config()?;
    info!("effective configuration: {:?}", config);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!("QR code service listening on {}", listener.local_addr()?);

    axum::serve(listener, server::router(AppState::from_config(&config)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // no signal handler available; run until killed
        std::future::pending::<()>().await;
    }
}
