// SPDX-License-Identifier: Apache-2.0
//! Owner identity extraction from request headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use cas_gateway_core::GatewayError;

const OWNER_HEADER: &str = "X-Owner-ID";
const DEFAULT_OWNER: &str = "default";

/// The caller's opaque owner identifier, taken from `X-Owner-ID`. Absent or
/// non-UTF-8 falls back to `"default"` — there is no authentication layer
/// here, so this extractor never rejects a request.
pub struct OwnerId(pub String);

impl<S> FromRequestParts<S> for OwnerId
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let owner = parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_OWNER)
            .to_string();
        Ok(Self(owner))
    }
}
