//! # subhub
//!
//! Subscription hub server binary: loads settings, seeds the identity
//! registry and serves the WebSocket endpoint until interrupted.

#![deny(unsafe_code)]

mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use subhub_core::Registry;
use subhub_server::{ServerConfig, SubhubServer};
use subhub_settings::SubhubSettings;
use tracing::{error, info, warn};

/// Subscription hub server.
#[derive(Parser, Debug)]
#[command(name = "subhub", about = "Real-time subscription hub over WebSocket")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.subhub/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

impl Cli {
    fn load_settings(&self) -> Result<SubhubSettings> {
        let path = self.settings.clone().unwrap_or_else(subhub_settings::settings_path);
        subhub_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))
    }

    fn server_config(&self, settings: &SubhubSettings) -> ServerConfig {
        let mut config = ServerConfig::from(&settings.server);
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.load_settings()?;
    logging::init(&settings.logging);

    let config = args.server_config(&settings);
    let registry = Arc::new(Registry::new(settings.identities.iter().cloned()));
    info!(
        identities = ?registry.identity_ids(),
        default_caller = %config.default_caller,
        pulse_ms = u64::try_from(config.pulse_interval.as_millis()).unwrap_or(u64::MAX),
        "identity registry seeded"
    );

    let server = SubhubServer::new(config, registry);
    let (addr, mut serve) = server
        .listen()
        .await
        .with_context(|| format!("Failed to bind {}:{}", server.config().host, server.config().port))?;
    info!(%addr, "ready");

    let stopped = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for ctrl-c, shutting down");
            }
            None
        }
        result = &mut serve => Some(result),
    };

    if let Some(result) = stopped {
        if let Err(e) = result {
            error!(error = %e, "server task failed");
        }
        bail!("server stopped unexpectedly");
    }

    info!("shutting down");
    server.shutdown().graceful_shutdown(vec![serve], None).await;
    info!("shutdown complete");
    Ok(())
}
