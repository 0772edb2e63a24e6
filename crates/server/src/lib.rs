pub mod error;
pub mod routes;
pub mod store;

use std::sync::Arc;

use axum::{
    http::Request,
    routing::{get, post},
    Router,
};
use fincat_classify::ClassificationEngine;
use fincat_storage::DbPool;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

pub use store::SqliteStore;

const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ClassificationEngine>,
    /// Reviewer writes go straight to the database.
    pub db: DbPool,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/classify", post(routes::classify))
        .route("/classify/batch", post(routes::classify_batch))
        .route(
            "/organizations/{organization_id}/patterns/invalidate",
            post(routes::invalidate_patterns),
        )
        .route(
            "/transactions/{transaction_id}/confirm",
            post(routes::confirm),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "http.request",
                    request_id = %uuid::Uuid::new_v4(),
                    method = %request.method(),
                    route = %request.uri().path(),
                )
            }),
        )
        .with_state(state)
}
