// SPDX-License-Identifier: Apache-2.0
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// The gateway's HTTP-facing error taxonomy.
///
/// Every handler returns `Result<_, GatewayError>`; the `IntoResponse` impl
/// below is the single place that maps each kind to a status code and a
/// `{"error": "<message>"}` body.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Bad hash, bad bucket name, missing file field, etc. — rejected before
    /// any backend work is attempted.
    #[error("{0}")]
    InvalidInput(String),

    /// Bucket, object, or blob not found on any backend.
    #[error("{0}")]
    NotFound(String),

    /// Caller is not the owner and the resource is not public.
    #[error("access denied")]
    Forbidden,

    /// Bucket already exists, or delete was attempted on a non-empty bucket.
    #[error("{0}")]
    Conflict(String),

    /// No backend is online, or none has enough free space.
    #[error("{0}")]
    NoBackendAvailable(String),

    /// A backend responded with an HTTP status the gateway forwards verbatim.
    #[error("backend returned {status}")]
    BackendHttp {
        /// Status code reported by the backend.
        status: StatusCode,
        /// Content-Type to forward, if the backend supplied one.
        content_type: Option<String>,
        /// Raw response body to forward.
        body: Vec<u8>,
    },

    /// Every eligible backend failed with a connection/timeout-class error.
    #[error("all backends unreachable: {0}")]
    Upstream(String),

    /// Metadata store failure (wraps the store crate's own error kind as a
    /// string so this crate does not need to depend on `sqlx`).
    #[error("database error: {0}")]
    Database(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidInput(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            Self::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
            }
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "access denied" })),
            )
                .into_response(),
            Self::Conflict(msg) => {
                (StatusCode::CONFLICT, Json(json!({ "error": msg }))).into_response()
            }
            Self::NoBackendAvailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": msg })),
            )
                .into_response(),
            Self::BackendHttp {
                status,
                content_type,
                body,
            } => {
                let mut response = (status, body).into_response();
                if let Some(ct) = content_type {
                    if let Ok(value) = ct.parse() {
                        response.headers_mut().insert(http::header::CONTENT_TYPE, value);
                    }
                }
                response
            }
            Self::Upstream(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": msg })),
            )
                .into_response(),
            Self::Database(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": msg })),
            )
                .into_response(),
        }
    }
}
