// SPDX-License-Identifier: Apache-2.0
//! `DELETE /file/:hash/delete`.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use cas_gateway_balancer::{dispatch, is_timeout_or_connection_error, Outcome};
use cas_gateway_core::{is_valid_hash, GatewayError};
use http::StatusCode;
use serde_json::json;

use crate::state::BlobService;

/// Handle `DELETE /file/:hash/delete`.
///
/// Fans out with `cancel_on_success = false`: the blob may be replicated to
/// more than one backend, and this handler wants the delete to reach every
/// one of them rather than stopping at the first.
pub async fn delete_handler(
    State(service): State<BlobService>,
    Path(hash): Path<String>,
) -> Result<Response, GatewayError> {
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

    let hash_for_dispatch = hash.clone();
    let mut rx = dispatch(urls, timeout, false, move |_token, url| {
        let client = client.clone();
        let hash = hash_for_dispatch.clone();
        async move {
            let resp = client
                .delete(format!("{url}/file/{hash}/delete"))
                .send()
                .await
                .map_err(|e| cas_gateway_core::describe_client_error(&e))?;
            let status = resp.status();
            let body = resp.bytes().await.map_err(|e| e.to_string())?;
            Ok((body, status))
        }
    });

    let mut success_count = 0usize;
    let mut not_found_count = 0usize;
    let mut first_success_body: Option<Bytes> = None;

    while let Some(result) = rx.recv().await {
        match result.outcome {
            Outcome::Success { data } => {
                success_count += 1;
                if first_success_body.is_none() {
                    first_success_body = Some(data);
                }
            }
            Outcome::HttpStatus { status, .. } if status == StatusCode::NOT_FOUND => {
                not_found_count += 1;
            }
            Outcome::HttpStatus { .. } => {}
            Outcome::ConnectionError(msg) => {
                if is_timeout_or_connection_error(&msg) {
                    manager.mark_backend_dead(&result.url, &msg).await;
                }
            }
            Outcome::Cancelled => {}
        }
    }

    if success_count >= 1 {
        let body = first_success_body.filter(|b| !b.is_empty());
        return Ok(match body {
            Some(body) => match serde_json::from_slice::<serde_json::Value>(&body) {
                Ok(value) => (StatusCode::OK, Json(value)).into_response(),
                Err(_) => (StatusCode::OK, body.to_vec()).into_response(),
            },
            None => (
                StatusCode::OK,
                Json(json!({ "message": "deleted", "hash": hash })),
            )
                .into_response(),
        });
    }

    if not_found_count == total {
        Err(GatewayError::NotFound(
            "no backend has a file under this hash".to_string(),
        ))
    } else {
        Err(GatewayError::Upstream(
            "all backends unreachable or erroring".to_string(),
        ))
    }
}
