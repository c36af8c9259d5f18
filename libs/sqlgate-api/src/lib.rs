#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! HTTP surface: request/response envelopes, error mapping and axum routes.

pub mod envelope;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod service;

pub use envelope::{
    EnvelopeMeta, ErrorCode, ErrorEnvelope, QueryData, QueryRequest, ResultMeta, SuccessEnvelope,
};
pub use error::ApiError;
pub use routes::router;
pub use service::{QueryOutcome, QueryService};
