// SPDX-License-Identifier: Apache-2.0
//! Shared configuration, error taxonomy, and HTTP client plumbing for the CAS
//! gateway workspace. Every other crate in this workspace depends on this one
//! for its `GatewayError` and the retryable `reqwest` client.

mod config;
mod error;
mod http_client;

pub use config::Config;
pub use error::GatewayError;
pub use http_client::{build_http_client, describe_client_error};

/// Returns `true` iff `hash` is exactly 64 lowercase hex characters.
///
/// SHA-256 digests are always 32 bytes, i.e. 64 hex characters; the gateway
/// never accepts uppercase or short/long hashes from callers or backends.
#[must_use]
pub fn is_valid_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
