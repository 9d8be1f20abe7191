// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pushrelay: Web Push subscription registry with concurrent broadcast.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod push;
pub mod registry;
pub mod state;
pub mod subscription;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::push::client::WebPushTransport;
use crate::push::vapid::VapidCredentials;
use crate::state::RelayState;
use crate::transport::build_router;

/// Initialize tracing/logging from config.
///
/// Uses `try_init` so it's safe to call multiple times (e.g. from tests).
pub fn init_tracing(config: &RelayConfig) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

/// Load or generate the VAPID key pair. Failure here is fatal.
pub fn load_credentials(config: &RelayConfig) -> anyhow::Result<VapidCredentials> {
    let credentials = match config.vapid_keys {
        Some(ref path) => VapidCredentials::load_or_generate(path)?,
        None => VapidCredentials::generate()?,
    };
    Ok(credentials)
}

/// Run the relay server until shutdown.
pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    let credentials = Arc::new(load_credentials(&config)?);
    tracing::info!(public_key = %credentials.public_key(), "VAPID public key");

    let transport = Arc::new(WebPushTransport::from_config(&config));
    let state = Arc::new(RelayState::new(&config, credentials, transport));

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    match state.dispatcher.max_concurrent() {
        Some(limit) => tracing::info!("pushrelay listening on {addr} (max {limit} deliveries)"),
        None => tracing::info!("pushrelay listening on {addr}"),
    }

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("pushrelay stopped");
    Ok(())
}

/// Cancel `shutdown` on SIGTERM or SIGINT.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = signal(SignalKind::terminate()).ok();
            tokio::select! {
                _ = async {
                    if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
                } => tracing::info!("received SIGTERM"),
                _ = tokio::signal::ctrl_c() => tracing::info!("received SIGINT"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("received Ctrl-C");
        }
        shutdown.cancel();
    });
}
