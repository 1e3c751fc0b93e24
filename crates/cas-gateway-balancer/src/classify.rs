// SPDX-License-Identifier: Apache-2.0
//! Error classification for the health loop: distinguishes a connection- or
//! timeout-class failure from an application-level one.

/// Substrings that mark a `reqwest`/`reqwest-middleware` error as a
/// connection- or timeout-class failure rather than an application-level
/// one. Matched case-insensitively against the error's `Display` output,
/// mirroring the Go implementation's substring match over the error string.
const CONNECTION_ERROR_SUBSTRINGS: &[&str] = &[
    "timeout",
    "timed out",
    "deadline exceeded",
    "connection error",
    "connection refused",
    "no such host",
    "network is unreachable",
    "i/o timeout",
    "dial tcp",
    "dial udp",
];

/// Returns `true` if `err`'s message indicates a connection/timeout-class
/// failure that should count against a backend's `consecutive_failures`.
///
/// Intentional cancellation (a sibling request already succeeded and this
/// one's scope was cancelled) must **not** classify as a connection error.
/// The dispatcher enforces that structurally: a worker race-selected against
/// the shared `CancellationToken` never reaches this function at all when
/// cancellation wins the race, so no caller needs to special-case it here.
#[must_use]
pub fn is_timeout_or_connection_error(err: &str) -> bool {
    let lower = err.to_lowercase();
    CONNECTION_ERROR_SUBSTRINGS
        .iter()
        .any(|needle| lower.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::is_timeout_or_connection_error;

    #[test]
    fn matches_every_listed_substring() {
        for needle in super::CONNECTION_ERROR_SUBSTRINGS {
            let msg = format!("request failed: {needle} while dialing");
            assert!(
                is_timeout_or_connection_error(&msg),
                "expected {needle:?} to classify as a connection error"
            );
        }
    }

    #[test]
    fn matches_deadline_exceeded_case_insensitive() {
        assert!(is_timeout_or_connection_error("context DEADLINE EXCEEDED"));
    }

    #[test]
    fn does_not_match_unrelated_errors() {
        assert!(!is_timeout_or_connection_error("404 not found"));
        assert!(!is_timeout_or_connection_error("invalid json body"));
    }

    #[test]
    fn cancellation_is_not_a_connection_error() {
        assert!(!is_timeout_or_connection_error("operation cancelled"));
    }

    /// These are the tokens `describe_client_error` actually emits for a
    /// connect failure or a real `reqwest::Error::is_timeout()` — as
    /// opposed to `reqwest::Error`'s raw `Display`, which says neither.
    #[test]
    fn matches_the_tokens_describe_client_error_emits() {
        assert!(is_timeout_or_connection_error(
            "timeout: error sending request for url (http://x): operation timed out"
        ));
        assert!(is_timeout_or_connection_error(
            "connection error: error sending request for url (http://x): connection refused"
        ));
    }
}
