//! # AutoSync Binary
//!
//! The entry point that assembles the store, ledger, hub and engine, serves
//! them over HTTP, and wipes everything on the way out.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use as_api::{AppState, RouterOptions};
use as_core::{BroadcastHub, MessageLedger, SyncEngine, TransferStreamer};
use as_storage_local::LocalBlobStore;
use configs::{AppConfig, LogFormat};
use tracing_subscriber::EnvFilter;

/// How long a forced exit still waits for cleanup.
const FORCED_EXIT_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(&config);

    // 1. Core services
    let scratch_root = config.storage.effective_scratch_root();
    let store = Arc::new(LocalBlobStore::new(scratch_root.clone()));
    let ledger = Arc::new(MessageLedger::new());
    let hub = Arc::new(BroadcastHub::new(ledger.clone(), config.hub.subscriber_buffer));
    let engine = Arc::new(SyncEngine::new(ledger, store.clone(), hub.clone()));
    let streamer = Arc::new(TransferStreamer::with_chunk_size(store, config.storage.chunk_size));

    // 2. Transport
    let state = AppState {
        engine: engine.clone(),
        hub,
        streamer,
        scratch_root: scratch_root.clone(),
    };
    let app = as_api::router(
        state,
        RouterOptions {
            max_upload_bytes: config.limits.max_upload_bytes,
            static_dir: config.ui.static_dir.clone(),
        },
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("binding {}", config.bind_addr()))?;

    tracing::info!(addr = %config.bind_addr(), "AutoSync server starting");
    tracing::info!(root = %scratch_root.display(), "scratch directory");
    tracing::warn!("all shared files are deleted when the server stops");

    // 3. Serve until a signal arrives; the first signal tears down so live
    //    sessions close and graceful shutdown can finish.
    let shutdown_engine = engine.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(drain_on_signal(
        shutdown_engine,
        shutdown_signal,
        FORCED_EXIT_GRACE,
        || {
            std::process::exit(130);
        },
    ))
    .await
    .context("server error")?;

    engine.teardown().await;
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.filter));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Waits for the first signal, then tears the engine down. A second signal
/// arriving while teardown waits on in-flight writes gives cleanup `grace`
/// more time and then calls `abort`.
async fn drain_on_signal<S, F, A>(engine: Arc<SyncEngine>, mut signal: S, grace: Duration, abort: A)
where
    S: FnMut() -> F + Send + 'static,
    F: Future<Output = ()> + Send + 'static,
    A: FnOnce() + Send + 'static,
{
    signal().await;
    tracing::info!("shutdown signal received, cleaning up");

    // Armed before teardown so a stuck write cannot swallow the second signal.
    let second = signal();
    let watcher = engine.clone();
    tokio::spawn(async move {
        second.await;
        tracing::warn!("second signal received, exiting now");
        if tokio::time::timeout(grace, watcher.teardown()).await.is_err() {
            tracing::warn!("cleanup did not finish before exit");
        }
        abort();
    });

    engine.teardown().await;
}
