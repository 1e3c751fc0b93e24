// SPDX-License-Identifier: Apache-2.0
use std::error::Error as _;
use std::time::Duration;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{
    policies::ExponentialBackoff, RetryTransientMiddleware, Retryable, RetryableStrategy,
};

/// Retry predicate: retry only on connector-level failures (no response was
/// received at all). An HTTP response — any status, 2xx through 5xx — is
/// never retried; idempotent handlers decide what to do with it, and
/// retrying a non-idempotent upload would risk double side effects on the
/// backend.
struct ConnectionErrorsOnly;

impl RetryableStrategy for ConnectionErrorsOnly {
    fn handle(
        &self,
        res: &Result<reqwest::Response, reqwest_middleware::Error>,
    ) -> Option<Retryable> {
        match res {
            Ok(_) => None,
            Err(reqwest_middleware::Error::Reqwest(err)) => {
                if err.is_connect() || err.is_timeout() {
                    Some(Retryable::Transient)
                } else {
                    Some(Retryable::Fatal)
                }
            }
            Err(reqwest_middleware::Error::Middleware(_)) => Some(Retryable::Fatal),
        }
    }
}

/// Render a `reqwest-middleware` error for logging and for
/// `cas_gateway_balancer::is_timeout_or_connection_error`-style
/// classification.
///
/// `reqwest::Error`'s `Display` only shows the top-level kind (e.g. `"error
/// sending request for url (..)"`) — the connector-level cause (connection
/// refused, DNS failure, timed out) lives behind `.is_connect()`/
/// `.is_timeout()` and in `.source()`, not in `Display`. This renders both,
/// so a real connector failure always produces a string a substring
/// classifier can recognize regardless of platform-specific OS error text.
#[must_use]
pub fn describe_client_error(err: &reqwest_middleware::Error) -> String {
    let reqwest_err = match err {
        reqwest_middleware::Error::Reqwest(err) => err,
        reqwest_middleware::Error::Middleware(err) => return err.to_string(),
    };

    let mut msg = String::new();
    if reqwest_err.is_timeout() {
        msg.push_str("timeout: ");
    }
    if reqwest_err.is_connect() {
        msg.push_str("connection error: ");
    }
    msg.push_str(&reqwest_err.to_string());

    let mut source = reqwest_err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

/// Build the shared retryable HTTP client used by every outbound call to a
/// CAS backend.
///
/// `max_retries` bounds the number of connector-error retries; `min_wait`/
/// `max_wait` bound the exponential backoff between attempts.
#[must_use]
pub fn build_http_client(
    max_retries: u32,
    min_wait: Duration,
    max_wait: Duration,
) -> ClientWithMiddleware {
    let backoff = ExponentialBackoff::builder()
        .retry_bounds(min_wait, max_wait)
        .build_with_max_retries(max_retries);

    let inner = reqwest::Client::builder()
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());

    ClientBuilder::new(inner)
        .with(RetryTransientMiddleware::new_with_policy_and_strategy(
            backoff,
            ConnectionErrorsOnly,
        ))
        .build()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    /// A real connector failure (nothing listening on the port) must render
    /// with a token a substring classifier recognizes — `Display` alone
    /// renders only `"error sending request for url (..)"`, which contains
    /// none of `cas_gateway_balancer::is_timeout_or_connection_error`'s
    /// needles.
    #[tokio::test]
    async fn describes_a_real_connect_failure_with_a_classifiable_token() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind a throwaway port");
        let addr = listener.local_addr().expect("local addr");
        drop(listener); // nothing is listening at `addr` anymore

        let client = build_http_client(0, Duration::from_millis(1), Duration::from_millis(2));
        let err = client
            .get(format!("http://{addr}"))
            .send()
            .await
            .expect_err("connecting to a closed port fails");

        let rendered = describe_client_error(&err);
        assert!(
            rendered.to_lowercase().contains("connection error") || rendered.to_lowercase().contains("connection refused"),
            "expected a recognizable connection-error token, got: {rendered}"
        );
    }
}
