// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::env;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use bridge_relay::api::router;
use bridge_relay::config;
use bridge_relay::state::AppState;
use bridge_relay::store::{MemoryStore, RelayDatabase, RelayStore};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match env::var(config::LOG_FORMAT_ENV).as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    // Persistent store when a path is configured, in-memory otherwise.
    let store: Arc<dyn RelayStore> = match env::var(config::DB_PATH_ENV) {
        Ok(path) => {
            info!(path = %path, "Opening relay database");
            Arc::new(RelayDatabase::open(Path::new(&path)).expect("Failed to open relay database"))
        }
        Err(_) => {
            info!("No database path configured; using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(store);
    let app = router(state);

    let host = env::var(config::HOST_ENV).unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var(config::PORT_ENV)
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("Failed to parse bind address");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind relay address");
    info!(%addr, "Bridge relay listening (docs at /docs)");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install ctrl-c handler");
        info!("Shutdown signal received");
    })
    .await
    .expect("Relay server failed");
}
