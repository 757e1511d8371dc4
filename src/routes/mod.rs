// HTTP routes

mod http;
mod metrics;

pub use metrics::OriginIp;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::writer::WriteDispatcher;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) dispatcher: WriteDispatcher,
}

pub fn app(dispatcher: WriteDispatcher) -> Router {
    let state = AppState { dispatcher };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/collector/metrics", post(metrics::ingest_handler)) // POST /collector/metrics
        .route("/collector/metrics/", post(metrics::ingest_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
