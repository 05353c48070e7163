use std::path::Path;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::ws::{ws_handler, AppState};

/// Name of the HTML entry page inside the public directory.
pub const ENTRY_PAGE: &str = "main.html";

/// `/` upgrades to the position socket when asked to and serves the entry
/// page otherwise. `/ws` always upgrades. Every other path is looked up in
/// `public_dir`.
pub fn router(app_state: AppState, public_dir: &Path) -> Router {
    let entry_page = ServeFile::new(public_dir.join(ENTRY_PAGE));

    Router::new()
        .route(
            "/",
            get(
                move |ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
                      state: State<AppState>,
                      request: Request| {
                    root_handler(ws.ok(), state, request, entry_page.clone())
                },
            ),
        )
        .route("/ws", get(ws_handler))
        .fallback_service(ServeDir::new(public_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

async fn root_handler(
    ws: Option<WebSocketUpgrade>,
    state: State<AppState>,
    request: Request,
    entry_page: ServeFile,
) -> Response {
    match ws {
        Some(ws) => ws_handler(ws, state).await,
        None => entry_page.oneshot(request).await.into_response(),
    }
}
