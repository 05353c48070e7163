//! Plaza server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod hub;
pub mod ids;
pub mod registry;
pub mod routes;
pub mod ws;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, Semaphore};

use crate::broadcast::Dispatcher;
use crate::config::ServerConfig;
use crate::hub::{run_hub, HubCommand};
use crate::ws::AppState;

/// Spawn the hub and serve HTTP + WebSocket on `listener` until the server
/// stops.
pub async fn serve(listener: TcpListener, config: ServerConfig) -> std::io::Result<()> {
    let (hub_tx, hub_rx) = mpsc::channel::<HubCommand>(256);
    let dispatcher = Dispatcher::default();

    let app_state = AppState {
        hub_tx,
        dispatcher: dispatcher.clone(),
        connection_semaphore: Arc::new(Semaphore::new(config.max_connections)),
        max_message_bytes: config.max_message_bytes,
    };
    let app = routes::router(app_state, &config.public_dir);

    tokio::spawn(run_hub(hub_rx, dispatcher, config));

    axum::serve(listener, app).await
}
