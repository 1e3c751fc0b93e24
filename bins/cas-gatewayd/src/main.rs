// SPDX-License-Identifier: Apache-2.0
//! CAS gateway daemon: parses CLI flags into a [`Config`], starts the
//! backend health loop and metadata store, and serves the REST surface
//! until `SIGINT`/`SIGTERM`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cas_gateway_api::AppState;
use cas_gateway_balancer::BackendManager;
use cas_gateway_blob::BlobService;
use cas_gateway_core::{build_http_client, Config};
use cas_gateway_store::MetadataStore;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CAS gateway: a load-balancing HTTP front end over a fleet of CAS storage
/// backends.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// CAS backend base URLs, e.g. `http://10.0.0.1:8080`. Repeat the flag
    /// or pass a comma-separated list.
    #[arg(long = "backend", value_delimiter = ',', required = true)]
    backend_urls: Vec<String>,

    /// Address the gateway's HTTP API binds to.
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind_addr: SocketAddr,

    /// Optional separate bind address for a debug/metrics surface. Unused
    /// today — reserved for a future dashboard exposed on a second port.
    #[arg(long)]
    debug_bind_addr: Option<SocketAddr>,

    /// Path to the SQLite metadata database file.
    #[arg(long, default_value = "cas-gateway.db")]
    db_path: PathBuf,

    /// Maximum connector-error retries per outbound request.
    #[arg(long, default_value_t = 3)]
    retry_count: u32,

    /// Minimum exponential backoff wait between retries, in milliseconds.
    #[arg(long, default_value_t = 100)]
    retry_wait_min_ms: u64,

    /// Maximum exponential backoff wait between retries, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    retry_wait_max_ms: u64,

    /// Per-attempt timeout for outbound requests to a backend, in seconds.
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,

    /// Interval between periodic health probes, in seconds.
    #[arg(long, default_value_t = 5)]
    health_check_interval_secs: u64,

    /// Timeout for a single health probe, in seconds.
    #[arg(long, default_value_t = 5)]
    health_check_timeout_secs: u64,

    /// Grace period given to in-flight requests on shutdown, in seconds.
    #[arg(long, default_value_t = 10)]
    graceful_shutdown_timeout_secs: u64,
}

impl Args {
    fn into_config(self) -> Config {
        Config {
            backend_urls: self.backend_urls,
            bind_addr: self.bind_addr,
            debug_bind_addr: self.debug_bind_addr,
            db_path: self.db_path,
            retry_count: self.retry_count,
            retry_wait_min: Duration::from_millis(self.retry_wait_min_ms),
            retry_wait_max: Duration::from_millis(self.retry_wait_max_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            health_check_interval: Duration::from_secs(self.health_check_interval_secs),
            health_check_timeout: Duration::from_secs(self.health_check_timeout_secs),
            graceful_shutdown_timeout: Duration::from_secs(self.graceful_shutdown_timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Args::parse().into_config();
    config.validate().map_err(anyhow::Error::msg)?;

    info!(backends = ?config.backend_urls, bind_addr = %config.bind_addr, "starting cas-gatewayd");

    let client = build_http_client(config.retry_count, config.retry_wait_min, config.retry_wait_max);

    let manager = BackendManager::new(
        config.backend_urls.clone(),
        client.clone(),
        config.health_check_interval,
        config.health_check_timeout,
    );
    manager.start().await;

    let store = MetadataStore::open(&config.db_path)
        .await
        .context("failed to open metadata store")?;

    let store = Arc::new(store);
    let blob = BlobService::new(manager.clone(), client, config.request_timeout);
    let state = AppState::new(Arc::clone(&store), blob);
    let app = cas_gateway_api::build_router(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %listener.local_addr()?, "listening");

    // Per spec §5 "Shutdown": stop the health loop, close the metadata
    // store's pool, and only then let axum drain in-flight requests. The
    // signal task does the first two steps and notifies axum's graceful
    // shutdown hook once they're done.
    let drain_notify = Arc::new(tokio::sync::Notify::new());
    let drain_notify_signal = Arc::clone(&drain_notify);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received: stopping health loop");
        manager.stop().await;
        info!("closing metadata store");
        store.close().await;
        drain_notify_signal.notify_one();
    });

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        drain_notify.notified().await;
    });

    match tokio::time::timeout(config.graceful_shutdown_timeout, serve).await {
        Ok(result) => result.context("server error")?,
        Err(_) => tracing::warn!("graceful shutdown window elapsed before in-flight requests drained"),
    }

    Ok(())
}

/// Resolves on `SIGINT` or `SIGTERM`, whichever arrives first.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
