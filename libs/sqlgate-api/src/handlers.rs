use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path};
use serde_json::{Value, json};
use tracing::field::Empty;

use crate::envelope::{QueryData, QueryRequest, SuccessEnvelope};
use crate::error::ApiError;
use crate::service::QueryService;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// `POST /api/v1/query/{view}`
#[tracing::instrument(skip(svc, body), fields(view = %view, results = Empty))]
pub async fn run_query(
    Extension(svc): Extension<Arc<QueryService>>,
    Path(view): Path<String>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> ApiResult<SuccessEnvelope<QueryData>> {
    let Json(request) = body?;
    let outcome = svc.query(&view, &request.payload).await?;
    tracing::Span::current().record("results", outcome.rows.len());

    let meta = outcome.meta(svc.expose_sql());
    Ok(Json(SuccessEnvelope::new(
        "Data retrieved successfully",
        QueryData {
            results: outcome.rows,
            meta,
        },
    )))
}

/// `POST /api/v1/batch/{recipe}`
#[tracing::instrument(skip(svc, body), fields(recipe = %recipe, results = Empty))]
pub async fn run_batch(
    Extension(svc): Extension<Arc<QueryService>>,
    Path(recipe): Path<String>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> ApiResult<SuccessEnvelope<QueryData>> {
    let Json(request) = body?;
    let outcome = svc.batch(&recipe, &request.payload).await?;
    tracing::Span::current().record("results", outcome.rows.len());

    let meta = outcome.meta(svc.expose_sql());
    Ok(Json(SuccessEnvelope::new(
        "Batch loaded successfully",
        QueryData {
            results: outcome.rows,
            meta,
        },
    )))
}

/// `GET /healthz`
pub async fn health(
    Extension(svc): Extension<Arc<QueryService>>,
) -> ApiResult<SuccessEnvelope<Value>> {
    svc.health().await?;
    Ok(Json(SuccessEnvelope::new("ok", json!({ "status": "healthy" }))))
}
