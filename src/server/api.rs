use std::convert::Infallible;

use anyhow::Result;
use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Path, State},
    extract::ws::WebSocketUpgrade,
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::hub::BroadcastHub;

#[derive(Clone)]
pub struct AppState {
    pub hub: BroadcastHub,
}

pub fn router(hub: BroadcastHub) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(|| async { Json("OK") }))
        .route("/api/version", get(version))
        .route("/api/scripts/{name}/events", get(events))
        .route("/api/scripts/{name}/control", post(control))
        .route("/api/scripts/{name}/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { hub })
}

pub async fn serve(listener: TcpListener, hub: BroadcastHub) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "hub listening");
    }
    axum::serve(listener, router(hub)).await?;
    Ok(())
}

async fn version() -> Json<Value> {
    Json(json!({ "version": crate::VERSION }))
}

/// Long-lived SSE stream of control events for one script.
///
/// The subscription is dropped, and so unregistered, when hyper drops the
/// body after the client disconnects.
async fn events(State(state): State<AppState>, Path(name): Path<String>) -> impl IntoResponse {
    let subscription = state.hub.subscribe_events(&name);
    let body = Body::from_stream(subscription.map(Ok::<_, Infallible>));

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        body,
    )
}

/// Fire-and-forget publish; always answers `{"success": true}`.
///
/// The body is parsed as JSON whatever its `Content-Type`, so bare `curl -d`
/// and `fetch` callers work. A body that is not JSON gets a 400.
async fn control(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    let payload = match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::debug!(topic = %name, error = %err, "rejecting non-JSON control body");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": err.to_string() })),
            )
                .into_response();
        }
    };

    if let Err(err) = state.hub.control(&name, &payload) {
        tracing::warn!(topic = %name, error = %err, "control event not published");
    }
    Json(json!({ "success": true })).into_response()
}

async fn ws_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move { state.hub.serve_duplex(&name, socket).await })
}
