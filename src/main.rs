// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ssh_custody_server::{
    api::router,
    config::{LogFormat, ServerConfig, DEFAULT_LOG_FILTER},
    crypto::TransportKeyManager,
    provisioning::{self, DEFAULT_QUEUE_CAPACITY},
    state::AppState,
    storage::{CredentialStore, Database, InMemoryStore},
};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() {
    // Tracing first, so configuration warnings are not lost.
    init_tracing(LogFormat::from_env());
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        provision_dir = %config.provision_dir.display(),
        transport_key_bits = config.transport_key_bits,
        transport_key_ttl_secs = config.transport_key_ttl.num_seconds(),
        "Configuration loaded"
    );

    // Initialize storage
    let store: Arc<dyn CredentialStore> = match config.database_path() {
        Some(path) => {
            let db = Database::open(&path).expect("Failed to open credential database");
            tracing::info!(path = %path.display(), "Using persistent credential store");
            Arc::new(db)
        }
        None => {
            tracing::warn!("DATA_DIR not set, using in-memory store; all state is lost on restart");
            Arc::new(InMemoryStore::new())
        }
    };

    // Transport key is generated lazily on the first /get_rsa_key
    let transport = TransportKeyManager::new(config.transport_key_bits, config.transport_key_ttl);

    let shutdown = CancellationToken::new();
    let (queue, worker) = provisioning::channel(&config.provision_dir, DEFAULT_QUEUE_CAPACITY);
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    let app = router(AppState::new(store, transport, queue));

    let addr = config
        .bind_addr()
        .expect("Failed to parse bind address from HOST and PORT");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");

    tracing::info!(%addr, "SSH custody server listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("HTTP server failed");

    shutdown.cancel();
    if let Err(e) = worker_handle.await {
        tracing::error!(error = %e, "Provisioning worker did not stop cleanly");
    }
    tracing::info!("Server stopped");
}
