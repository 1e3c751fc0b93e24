// SPDX-License-Identifier: Apache-2.0
//! The parallel request dispatcher: a generic fan-out primitive that issues
//! the same request to many backends concurrently.

use std::future::Future;
use std::time::Duration;

use http::StatusCode;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What a single backend attempt produced.
#[derive(Debug)]
pub enum Outcome<T> {
    /// Exactly HTTP 200, decoded into `T`.
    Success {
        /// Response data.
        data: T,
    },
    /// Any non-200 HTTP response — still reachable, just not a "win".
    HttpStatus {
        /// The status the backend returned.
        status: StatusCode,
        /// Response data (e.g. the raw body).
        data: T,
    },
    /// A connection-/timeout-class failure, or a per-attempt timeout.
    ConnectionError(String),
    /// The shared context was cancelled (a sibling already won) before this
    /// attempt finished. Not a backend fault — never classify this as a
    /// connection error or feed it to [`crate::classify`].
    Cancelled,
}

/// One backend's result, as delivered on the dispatcher's result channel.
pub struct DispatchResult<T> {
    /// Which backend this result came from.
    pub url: String,
    /// What happened.
    pub outcome: Outcome<T>,
    /// Present for every `Success`, regardless of `cancel_on_success` —
    /// `dispatch` always hands the winning call's own token back rather than
    /// cancelling it along with its siblings. Ownership transfers to the
    /// consumer, who should cancel it once done; it is a no-op to cancel,
    /// since cancellation only ever signals siblings that are by definition
    /// no longer useful once one call wins. Gives streaming-body callers an
    /// explicit place to hang cleanup.
    pub cancel_handle: Option<CancellationToken>,
}

/// Fan out `request_fn` to every URL in `urls` concurrently.
///
/// `request_fn(token, url)` must resolve to `Ok((data, status))` on any
/// completed HTTP exchange (regardless of status) or `Err(message)` for a
/// connection-/timeout-class failure. The per-attempt `timeout` additionally
/// bounds each call; a caller-observed elapsed timeout is folded into
/// `Outcome::ConnectionError`.
///
/// If `cancel_on_success` is `true`, the first `Outcome::Success` cancels
/// every other in-flight attempt — callers that don't need to keep
/// consuming a streaming body from every backend should use this. Callers
/// streaming a winning response body must pass `false` so siblings run to
/// completion and are drained rather than torn down mid-stream.
///
/// The returned channel closes once every attempt has completed or been
/// cancelled. The dispatcher itself never inspects `Outcome` to decide a
/// verdict — that is entirely the calling handler's job.
pub fn dispatch<F, Fut, T>(
    urls: Vec<String>,
    timeout: Duration,
    cancel_on_success: bool,
    request_fn: F,
) -> mpsc::UnboundedReceiver<DispatchResult<T>>
where
    F: Fn(CancellationToken, String) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<(T, StatusCode), String>> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let parent_token = CancellationToken::new();

    for url in urls {
        let tx = tx.clone();
        let request_fn = request_fn.clone();
        let parent_token = parent_token.clone();
        let url_for_task = url.clone();

        tokio::spawn(async move {
            let child_token = parent_token.child_token();
            let fut = request_fn(child_token.clone(), url_for_task.clone());

            let outcome = tokio::select! {
                biased;
                () = child_token.cancelled() => Outcome::Cancelled,
                res = tokio::time::timeout(timeout, fut) => match res {
                    Err(_elapsed) => Outcome::ConnectionError(format!(
                        "timeout: request to {url_for_task} exceeded the per-attempt timeout"
                    )),
                    Ok(Err(message)) => Outcome::ConnectionError(message),
                    Ok(Ok((data, status))) if status == StatusCode::OK => Outcome::Success { data },
                    Ok(Ok((data, status))) => Outcome::HttpStatus { status, data },
                },
            };

            let cancel_handle = if matches!(outcome, Outcome::Success { .. }) {
                if cancel_on_success {
                    parent_token.cancel();
                }
                Some(child_token)
            } else {
                child_token.cancel();
                None
            };

            let _ = tx.send(DispatchResult {
                url: url_for_task,
                outcome,
                cancel_handle,
            });
        });
    }

    drop(tx);
    rx
}
