//! HTTP server setup and routing
//!
//! Serves the web UI from the web root, dispatches `/api/<name>` to the API
//! table and relays bus events over SSE.

use crate::app::WebRadio;
use crate::error::{Error, Result};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub app: Arc<WebRadio>,
}

/// Build the router for `app`
pub fn router(app: Arc<WebRadio>) -> Router {
    let web_root = app.config().web.web_root.clone();
    let ctx = AppContext { app };

    Router::new()
        // SSE event stream
        .route("/api/get_events", get(super::sse::event_stream))
        .route("/api/publish_state", post(publish_state))
        .route("/api/:api", get(process_api))
        // Web UI: index.html, css, js, images, webfonts
        .fallback_service(ServeDir::new(web_root))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Run the HTTP server until `shutdown` completes
pub async fn run<F>(app: Arc<WebRadio>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let web = &app.config().web;
    let addr = format!("{}:{}", web.host, web.port);
    info!("Using web root {}", web.web_root.display());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, router(app))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Web server finished");
    Ok(())
}

/// GET /api/:api - execute an API operation
async fn process_api(
    State(ctx): State<AppContext>,
    Path(api): Path<String>,
    Query(args): Query<HashMap<String, String>>,
) -> Response {
    if api.starts_with('_') {
        warn!("Illegal API call: {}", api);
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "msg": format!("illegal request /api/{}", api) })),
        )
            .into_response();
    }

    match ctx.app.exec(&api, args).await {
        Ok(value) => Json(value).into_response(),
        Err(e) => {
            warn!("/api/{} failed: {}", api, e);
            e.into_response()
        }
    }
}

/// POST /api/publish_state - redistribute a client's state document.
///
/// The body is parsed as JSON whatever its content type.
async fn publish_state(State(ctx): State<AppContext>, body: Bytes) -> Response {
    match serde_json::from_slice::<Value>(&body) {
        Ok(document) => {
            ctx.app.publish_client_state(document).await;
            StatusCode::OK.into_response()
        }
        Err(e) => {
            warn!("Invalid state document: {}", e);
            Error::BadRequest(format!("invalid state document: {}", e)).into_response()
        }
    }
}
