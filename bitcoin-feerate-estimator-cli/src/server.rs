use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bitcoin_feerate_estimator::EstimateResult;
use serde_json::json;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

/// Latest estimator result shared with the handlers
pub type LatestEstimate = watch::Receiver<Option<EstimateResult>>;

/// Create the Axum application router
pub fn create_app(latest: LatestEstimate) -> Router {
    Router::new()
        .route("/fees", get(get_fees))
        .route("/health", get(health_check))
        .with_state(latest)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Latest fee estimate, 503 until the first one is available
async fn get_fees(State(latest): State<LatestEstimate>) -> Response {
    // release the watch lock before serializing
    let result = latest.borrow().clone();
    match result {
        Some(result) => Json(result).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "no fee estimate available yet" })),
        )
            .into_response(),
    }
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Run the HTTP server until `shutdown` is cancelled
pub async fn run_server(
    app: Router,
    addr: &str,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("HTTP server listening on http://{}", listener.local_addr()?);
    info!("  GET /fees - Latest fee estimate");
    info!("  GET /health - Health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
