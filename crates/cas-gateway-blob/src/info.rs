// SPDX-License-Identifier: Apache-2.0
//! `GET /file/:hash/info`.

use axum::extract::{Path, State};
use axum::Json;
use cas_gateway_balancer::{dispatch, is_timeout_or_connection_error, Outcome};
use cas_gateway_core::{is_valid_hash, GatewayError};
use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::state::BlobService;

/// Mirrors the backend's `FileInfo` wire shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileInfo {
    pub hash: String,
    pub size: i64,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_used: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_available: Option<i64>,
}

/// Handle `GET /file/:hash/info`.
///
/// Fans out with `cancel_on_success = true`: unlike download, there is no
/// body to keep alive past the winning response, so the first decodable 200
/// can cancel every sibling immediately.
pub async fn info_handler(
    State(service): State<BlobService>,
    Path(hash): Path<String>,
) -> Result<Json<FileInfo>, GatewayError> {
    if !is_valid_hash(&hash) {
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

    let mut rx = dispatch(urls, timeout, true, move |_token, url| {
        let client = client.clone();
        let hash = hash.clone();
        async move {
            let resp = client
                .get(format!("{url}/file/{hash}/info"))
                .send()
                .await
                .map_err(|e| cas_gateway_core::describe_client_error(&e))?;
            let status = resp.status();
            let body = resp.bytes().await.map_err(|e| e.to_string())?;
            Ok((body, status))
        }
    });

    let mut not_found_count = 0usize;
    let mut saw_other_error = false;

    while let Some(result) = rx.recv().await {
        match result.outcome {
            Outcome::Success { data } => {
                // A 200 with an undecodable body is not a usable success —
                // treat it like any other non-winning response and keep
                // waiting on the remaining siblings.
                if let Ok(info) = serde_json::from_slice::<FileInfo>(&data) {
                    return Ok(Json(info));
                }
                saw_other_error = true;
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
        assert!(manager.has_online_backends().await);
        BlobService::new(manager, client, Duration::from_secs(5))
    }

    /// First decodable 200 wins, even with a slower sibling still in flight
    /// (`cancel_on_success = true` tears that sibling down rather than
    /// waiting on it).
    #[tokio::test]
    async fn info_returns_first_decodable_success() {
        let missing = online_backend().await;
        Mock::given(method("GET"))
            .and(path_regex("^/file/.+/info$"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&missing)
            .await;

        let good = online_backend().await;
        Mock::given(method("GET"))
            .and(path_regex("^/file/.+/info$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hash": "a".repeat(64),
                "size": 7,
                "created_at": "2024-01-01T00:00:00Z",
            })))
            .mount(&good)
            .await;

        let service = service_with_backends(&[&missing, &good]).await;
        let hash = "a".repeat(64);
        let Json(info) = info_handler(State(service), Path(hash.clone())).await.expect("one backend has it");
        assert_eq!(info.hash, hash);
        assert_eq!(info.size, 7);
    }

    #[tokio::test]
    async fn info_returns_404_when_every_backend_lacks_the_file() {
        let a = online_backend().await;
        let b = online_backend().await;
        for server in [&a, &b] {
            Mock::given(method("GET"))
                .and(path_regex("^/file/.+/info$"))
                .respond_with(ResponseTemplate::new(404))
                .mount(server)
                .await;
        }

        let service = service_with_backends(&[&a, &b]).await;
        let hash = "0".repeat(64);
        let err = info_handler(State(service), Path(hash)).await.expect_err("nobody has it");
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn info_rejects_malformed_hash_before_touching_any_backend() {
        let client = cas_gateway_core::build_http_client(0, Duration::from_millis(1), Duration::from_millis(2));
        let manager = BackendManager::new(Vec::new(), client.clone(), Duration::from_secs(3600), Duration::from_secs(5));
        let service = BlobService::new(manager, client, Duration::from_secs(5));
        let err = info_handler(State(service), Path("not-a-hash".to_string()))
            .await
            .expect_err("invalid hash rejected");
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }
}
