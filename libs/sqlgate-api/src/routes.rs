use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Extension, Router};

use crate::handlers;
use crate::service::QueryService;

/// Query, batch and health routes sharing one [`QueryService`].
#[must_use]
pub fn router(service: Arc<QueryService>) -> Router {
    Router::new()
        .route("/api/v1/query/{view}", post(handlers::run_query))
        .route("/api/v1/batch/{recipe}", post(handlers::run_batch))
        .route("/healthz", get(handlers::health))
        .layer(Extension(service))
}
