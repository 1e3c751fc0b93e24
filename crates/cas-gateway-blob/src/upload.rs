// SPDX-License-Identifier: Apache-2.0
//! `POST /file/upload`.

use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use axum::Json;
use cas_gateway_core::GatewayError;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::state::BlobService;

/// Successful-upload response body. A backend 409 (file already present
/// under that hash) is treated as an idempotent success: if the backend's
/// 409 body lacks a hash, the gateway still has no hash to synthesize one
/// from at this layer (only the backend computes the content hash), so that
/// case surfaces `hash: null` rather than fabricating a value.
///
/// Reused by the bucket/object handlers, which need the hash to upsert the
/// object row rather than the raw HTTP response this crate's own handler
/// returns to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub hash: Option<String>,
}

/// Handle `POST /file/upload`.
pub async fn upload_handler(
    State(service): State<BlobService>,
    multipart: Multipart,
) -> Result<impl IntoResponse, GatewayError> {
    if !service.manager().has_online_backends().await {
        return Err(GatewayError::NoBackendAvailable(
            "no backends are online".to_string(),
        ));
    }

    let field = extract_file_field(multipart).await?;
    let file_size = field.bytes.len() as i64;

    let backend = service
        .manager()
        .get_backend_for_upload(file_size)
        .await
        .map_err(|_| GatewayError::NoBackendAvailable("no backend has enough space".to_string()))?;

    let result = upload_to_backend(&service, &backend, field).await?;
    Ok(Json(result))
}

/// A single extracted multipart field, buffered for forwarding.
///
/// Buffering (rather than a zero-copy pipe) is a deliberate simplification:
/// axum's `Field` is borrowed from the `Multipart` extractor for a lifetime
/// shorter than the `'static` a streamed `reqwest::Body` would need, and
/// threading that lifetime through a spawned task is not worth the
/// complexity this handler needs. See `DESIGN.md` for the full tradeoff.
pub struct UploadField {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: bytes::Bytes,
}

/// Pull the single required `file` field out of a multipart body. Public so
/// the bucket/object upload handlers can reuse the same extraction logic
/// instead of duplicating it.
pub async fn extract_file_field(mut multipart: Multipart) -> Result<UploadField, GatewayError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GatewayError::InvalidInput(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| GatewayError::InvalidInput(format!("failed reading file field: {e}")))?;
        return Ok(UploadField {
            filename,
            content_type,
            bytes,
        });
    }
    Err(GatewayError::InvalidInput(
        "missing required 'file' field".to_string(),
    ))
}

/// Send one already-extracted field to a chosen backend's `/file/upload`
/// and return the resulting hash. Shared by this crate's own upload
/// handler and by the bucket/object upload handlers in `cas-gateway-api`.
pub async fn upload_to_backend(
    service: &BlobService,
    backend: &str,
    field: UploadField,
) -> Result<UploadResponse, GatewayError> {
    let mut part = reqwest::multipart::Part::bytes(field.bytes.to_vec());
    if let Some(filename) = field.filename {
        part = part.file_name(filename);
    }
    if let Some(content_type) = field.content_type {
        part = part
            .mime_str(&content_type)
            .unwrap_or_else(|_| reqwest::multipart::Part::bytes(field.bytes.to_vec()));
    }
    let form = reqwest::multipart::Form::new().part("file", part);

    let url = format!("{backend}/file/upload");
    let response = service
        .client
        .post(&url)
        .timeout(service.request_timeout)
        .multipart(form)
        .send()
        .await;

    let response = match response {
        Ok(r) => r,
        Err(err) => {
            let msg = cas_gateway_core::describe_client_error(&err);
            if cas_gateway_balancer::is_timeout_or_connection_error(&msg) {
                service.manager().mark_backend_dead(backend, &msg).await;
            }
            warn!(backend, error = %msg, "upload failed");
            return Err(GatewayError::NoBackendAvailable(format!(
                "backend {backend} unreachable: {msg}"
            )));
        }
    };

    let status = response.status();
    let content_type = response
        .headers()
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response
        .bytes()
        .await
        .map_err(|e| GatewayError::Upstream(e.to_string()))?;

    // A 409 (already present under this hash) is a successful idempotent
    // upload, not an error.
    if status.is_success() || status == http::StatusCode::CONFLICT {
        let parsed: Option<Value> = serde_json::from_slice(&body).ok();
        let hash = parsed.and_then(|v| {
            v.get("hash")
                .and_then(Value::as_str)
                .map(str::to_string)
        });
        return Ok(UploadResponse { hash });
    }

    Err(GatewayError::BackendHttp {
        status,
        content_type,
        body: body.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use cas_gateway_balancer::BackendManager;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn manager_for(server: &MockServer) -> BackendManager {
        let client = cas_gateway_core::build_http_client(0, Duration::from_millis(1), Duration::from_millis(2));
        BackendManager::new(vec![server.uri()], client, Duration::from_secs(3600), Duration::from_secs(5))
    }

    fn field(bytes: &[u8]) -> UploadField {
        UploadField {
            filename: Some("f.bin".to_string()),
            content_type: Some("application/octet-stream".to_string()),
            bytes: bytes::Bytes::copy_from_slice(bytes),
        }
    }

    /// A backend 409 (already present under this hash) is an idempotent
    /// success, not an error, and its hash is forwarded.
    #[tokio::test]
    async fn backend_409_is_treated_as_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/file/upload"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({"hash": "a".repeat(64)})))
            .mount(&server)
            .await;

        let manager = manager_for(&server).await;
        let client = cas_gateway_core::build_http_client(0, Duration::from_millis(1), Duration::from_millis(2));
        let service = BlobService::new(manager, client, Duration::from_secs(5));

        let result = upload_to_backend(&service, &server.uri(), field(b"payload"))
            .await
            .expect("409 is a success");
        assert_eq!(result.hash, Some("a".repeat(64)));
    }

    #[tokio::test]
    async fn backend_5xx_is_forwarded_as_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/file/upload"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let manager = manager_for(&server).await;
        let client = cas_gateway_core::build_http_client(0, Duration::from_millis(1), Duration::from_millis(2));
        let service = BlobService::new(manager, client, Duration::from_secs(5));

        let err = upload_to_backend(&service, &server.uri(), field(b"payload"))
            .await
            .expect_err("5xx is not a success");
        assert!(matches!(err, GatewayError::BackendHttp { status, .. } if status == http::StatusCode::INTERNAL_SERVER_ERROR));
    }
}
