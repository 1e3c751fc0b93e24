// SPDX-License-Identifier: Apache-2.0
//! `GET /file/:hash/download`.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::response::Response;
use cas_gateway_balancer::{dispatch, is_timeout_or_connection_error, Outcome};
use cas_gateway_core::{is_valid_hash, GatewayError};
use futures_util::TryStreamExt;
use http::StatusCode;

use crate::state::BlobService;

/// Handle `GET /file/:hash/download`.
///
/// Fans the request out to every online backend with `cancel_on_success =
/// false`: the first 200 wins and its body is streamed straight to the
/// client, while siblings are left to run to completion rather than torn
/// down mid-transfer. Once this handler returns, the dispatcher's result
/// channel is simply dropped — the still-running sibling tasks' sends
/// against it are silently discarded, which is an equivalent drain without
/// an extra background task.
pub async fn download_handler(
    State(service): State<BlobService>,
    Path(hash): Path<String>,
) -> Result<Response, GatewayError> {
    download_hash(&service, &hash).await
}

/// The same download fan-out, reusable by the bucket/object handlers
/// (`GET /bucket/:name/object/*`), which already know the hash from the
/// object row and don't go through this crate's own route.
pub async fn download_hash(service: &BlobService, hash: &str) -> Result<Response, GatewayError> {
    if !is_valid_hash(hash) {
        return Err(GatewayError::InvalidInput(format!("invalid hash: {hash}")));
    }

    let urls = service.manager().get_online_backends().await;
    if urls.is_empty() {
        return Err(GatewayError::NoBackendAvailable(
            "no backends are online".to_string(),
        ));
    }
    let total = urls.len();

    let client = service.client.clone();
    let manager = service.manager().clone();
    let timeout = service.request_timeout;
    let hash = hash.to_string();

    let mut rx = dispatch(urls, timeout, false, move |_token, url| {
        let client = client.clone();
        let hash = hash.clone();
        async move {
            let resp = client
                .get(format!("{url}/file/{hash}/download"))
                .send()
                .await
                .map_err(|e| cas_gateway_core::describe_client_error(&e))?;
            let status = resp.status();
            Ok((resp, status))
        }
    });

    let mut not_found_count = 0usize;
    let mut saw_other_error = false;

    while let Some(result) = rx.recv().await {
        match result.outcome {
            Outcome::Success { data } => {
                let content_type = data.headers().get(http::header::CONTENT_TYPE).cloned();
                let stream = data.bytes_stream().map_err(std::io::Error::other);
                let mut response = Response::new(Body::from_stream(stream));
                *response.status_mut() = StatusCode::OK;
                let content_type = content_type.unwrap_or_else(|| {
                    http::HeaderValue::from_static("application/octet-stream")
                });
                response
                    .headers_mut()
                    .insert(http::header::CONTENT_TYPE, content_type);
                return Ok(response);
            }
            Outcome::HttpStatus { status, .. } if status == StatusCode::NOT_FOUND => {
                not_found_count += 1;
            }
            Outcome::HttpStatus { .. } => saw_other_error = true,
            Outcome::ConnectionError(msg) => {
                if is_timeout_or_connection_error(&msg) {
                    manager.mark_backend_dead(&result.url, &msg).await;
                }
                saw_other_error = true;
            }
            Outcome::Cancelled => {}
        }
    }

    if not_found_count == total && !saw_other_error {
        Err(GatewayError::NotFound(
            "no backend has a file under this hash".to_string(),
        ))
    } else {
        Err(GatewayError::Upstream(
            "all backends unreachable or erroring".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use cas_gateway_balancer::BackendManager;
    use std::time::Duration;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn node_info_body() -> serde_json::Value {
        serde_json::json!({
            "uptime": "1s", "uptime_seconds": 1,
            "load_averages": {"load1": 0.0, "load5": 0.0, "load15": 0.0},
            "memory": {"total": 1, "used": 1, "available": 1},
            "storage": {"total": 100, "used": 0, "available": 100}
        })
    }

    async fn online_backend() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex("^/node/info$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(node_info_body()))
            .mount(&server)
            .await;
        server
    }

    async fn service_with_backends(servers: &[&MockServer]) -> BlobService {
        let client = cas_gateway_core::build_http_client(0, Duration::from_millis(1), Duration::from_millis(2));
        let manager = BackendManager::new(
            servers.iter().map(|s| s.uri()).collect(),
            client.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(5),
        );
        manager.start().await;
        assert!(manager.has_online_backends().await, "all mock backends should be online");
        BlobService::new(manager, client, Duration::from_secs(5))
    }

    /// One backend 500s, one 404s, one returns 200 with a body — the
    /// client gets exactly that 200 body, and the other two don't
    /// poison the result.
    #[tokio::test]
    async fn download_falls_back_past_errors_and_404s_to_a_200() {
        let bad = online_backend().await;
        Mock::given(method("GET"))
            .and(path_regex("^/file/.+/download$"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&bad)
            .await;

        let missing = online_backend().await;
        Mock::given(method("GET"))
            .and(path_regex("^/file/.+/download$"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&missing)
            .await;

        let good = online_backend().await;
        Mock::given(method("GET"))
            .and(path_regex("^/file/.+/download$"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(b"payload".to_vec(), "text/plain"))
            .mount(&good)
            .await;

        let service = service_with_backends(&[&bad, &missing, &good]).await;
        let hash = "a".repeat(64);
        let response = download_hash(&service, &hash).await.expect("one backend succeeds");
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("collect body");
        assert_eq!(&body[..], &b"payload"[..]);
    }

    /// Every backend reports 404 → the gateway returns 404, not 503.
    #[tokio::test]
    async fn unanimous_404_yields_not_found() {
        let a = online_backend().await;
        let b = online_backend().await;
        for server in [&a, &b] {
            Mock::given(method("GET"))
                .and(path_regex("^/file/.+/download$"))
                .respond_with(ResponseTemplate::new(404))
                .mount(server)
                .await;
        }

        let service = service_with_backends(&[&a, &b]).await;
        let hash = "0".repeat(64);
        let err = download_hash(&service, &hash).await.expect_err("no backend has it");
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn rejects_malformed_hash_before_touching_any_backend() {
        let client = cas_gateway_core::build_http_client(0, Duration::from_millis(1), Duration::from_millis(2));
        let manager = BackendManager::new(Vec::new(), client.clone(), Duration::from_secs(3600), Duration::from_secs(5));
        let service = BlobService::new(manager, client, Duration::from_secs(5));
        let err = download_hash(&service, "not-a-hash").await.expect_err("invalid hash rejected");
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }
}
