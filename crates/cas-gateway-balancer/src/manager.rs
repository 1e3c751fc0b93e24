// SPDX-License-Identifier: Apache-2.0
//! The backend fleet registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest_middleware::ClientWithMiddleware;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::backend::{Backend, BackendStatus};
use crate::classify::is_timeout_or_connection_error;
use crate::node_info::NodeInfo;

/// Returned by [`BackendManager::get_backend_for_upload`] and
/// [`BackendManager::get_online_backends`] when no backend qualifies.
#[derive(Debug, thiserror::Error)]
#[error("no backend available")]
pub struct NoBackendAvailable;

struct Inner {
    backends: RwLock<HashMap<String, Backend>>,
    client: ClientWithMiddleware,
    health_check_interval: Duration,
    health_check_timeout: Duration,
}

/// Concurrent registry of CAS backend endpoints with periodic health
/// probing, liveness state, and space-aware selection.
///
/// Cloning a `BackendManager` is cheap — it is an `Arc` handle over shared
/// state, the same pattern `AppState` uses throughout this workspace.
#[derive(Clone)]
pub struct BackendManager {
    inner: Arc<Inner>,
    health_task: Arc<RwLock<Option<JoinHandle<()>>>>,
    stop_tx: Arc<watch::Sender<bool>>,
}

impl BackendManager {
    /// Construct a manager for the given backend URLs. Backends start
    /// `online = true` — optimistic until the first probe completes.
    /// `health_check_interval`/`health_check_timeout` default to 5s each if
    /// not overridden by the caller.
    #[must_use]
    pub fn new(
        backend_urls: Vec<String>,
        client: ClientWithMiddleware,
        health_check_interval: Duration,
        health_check_timeout: Duration,
    ) -> Self {
        let backends = backend_urls
            .into_iter()
            .map(|url| (url.clone(), Backend::new(url)))
            .collect();

        let (stop_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                backends: RwLock::new(backends),
                client,
                health_check_interval,
                health_check_timeout,
            }),
            health_task: Arc::new(RwLock::new(None)),
            stop_tx: Arc::new(stop_tx),
        }
    }

    /// Run an initial synchronous probe of every backend, then launch the
    /// periodic health loop as a background task.
    pub async fn start(&self) {
        self.probe_all().await;

        let inner = Arc::clone(&self.inner);
        let mut stop_rx = self.stop_tx.subscribe();
        let manager = self.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.health_check_interval);
            ticker.tick().await; // consume the immediate first tick
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        manager.probe_all().await;
                    }
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        *self.health_task.write().await = Some(handle);
    }

    /// Signal the health loop to exit and wait for any in-flight probe round
    /// to finish.
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.health_task.write().await.take() {
            let _ = handle.await;
        }
    }

    async fn probe_all(&self) {
        let urls: Vec<String> = self.inner.backends.read().await.keys().cloned().collect();
        for url in urls {
            self.probe_one(&url).await;
        }
    }

    async fn probe_one(&self, url: &str) {
        let started = Instant::now();
        let probe_url = format!("{url}/node/info");
        let result = self
            .inner
            .client
            .get(&probe_url)
            .timeout(self.inner.health_check_timeout)
            .send()
            .await;

        let latency_ms: u64 = started.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        let mut backends = self.inner.backends.write().await;
        let Some(backend) = backends.get_mut(url) else {
            return;
        };
        let was_online = backend.online;

        match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<NodeInfo>().await {
                    Ok(info) => {
                        backend.record_success(latency_ms, info);
                        if !was_online {
                            info!(backend = url, "backend transitioned online");
                        }
                    }
                    Err(err) => {
                        // A non-JSON 200 is reachable but misbehaving; do not
                        // penalize liveness for a decode failure.
                        backend.record_failure(err.to_string(), false);
                    }
                }
            }
            Ok(response) => {
                // HTTP-status failures do not count against liveness.
                backend.record_failure(format!("status {}", response.status()), false);
            }
            Err(err) => {
                let msg = cas_gateway_core::describe_client_error(&err);
                let classified = is_timeout_or_connection_error(&msg);
                backend.record_failure(msg, classified);
                if classified && backend.online {
                    warn!(backend = url, error = %backend.last_error.clone().unwrap_or_default(), "backend probe failed");
                }
            }
        }
    }

    /// Force a backend offline immediately, short-circuiting the next health
    /// interval. Called by request handlers that observed a connection-class
    /// failure during a real request.
    pub async fn mark_backend_dead(&self, url: &str, err: &str) {
        let mut backends = self.inner.backends.write().await;
        if let Some(backend) = backends.get_mut(url) {
            backend.mark_dead(err.to_string());
            warn!(backend = url, error = err, "backend marked dead by handler");
        }
    }

    /// Snapshot of online backend URLs, ordered by
    /// `(available_space DESC, latency ASC)`.
    pub async fn get_online_backends(&self) -> Vec<String> {
        let backends = self.inner.backends.read().await;
        let mut online: Vec<&Backend> = backends.values().filter(|b| b.online).collect();
        online.sort_by(|a, b| {
            b.available_space
                .cmp(&a.available_space)
                .then_with(|| {
                    a.last_probe_latency_ms
                        .unwrap_or(u64::MAX)
                        .cmp(&b.last_probe_latency_ms.unwrap_or(u64::MAX))
                })
        });
        online.into_iter().map(|b| b.url.clone()).collect()
    }

    /// The online backend with the greatest available space `>= file_size`.
    /// If `file_size <= 0` the space check is skipped entirely.
    ///
    /// # Errors
    ///
    /// Returns [`NoBackendAvailable`] if no online backend qualifies.
    pub async fn get_backend_for_upload(&self, file_size: i64) -> Result<String, NoBackendAvailable> {
        let backends = self.inner.backends.read().await;
        let skip_space_check = file_size <= 0;
        let best = backends
            .values()
            .filter(|b| b.online)
            .filter(|b| skip_space_check || b.available_space >= file_size as u64)
            .max_by_key(|b| b.available_space);
        best.map(|b| b.url.clone()).ok_or(NoBackendAvailable)
    }

    /// Whether any backend is currently online.
    pub async fn has_online_backends(&self) -> bool {
        self.inner.backends.read().await.values().any(|b| b.online)
    }

    /// Total number of registered backends (online or not).
    pub async fn backend_count(&self) -> usize {
        self.inner.backends.read().await.len()
    }

    /// All registered backend URLs, regardless of liveness.
    pub async fn all_backend_urls(&self) -> Vec<String> {
        self.inner.backends.read().await.keys().cloned().collect()
    }

    /// Read-only snapshot of every registered backend's status.
    pub async fn get_all_backend_status(&self) -> Vec<BackendStatus> {
        self.inner
            .backends
            .read()
            .await
            .values()
            .map(BackendStatus::from)
            .collect()
    }

    /// Read-only snapshot of a single backend's status, if registered.
    pub async fn get_backend_status(&self, url: &str) -> Option<BackendStatus> {
        self.inner.backends.read().await.get(url).map(BackendStatus::from)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> ClientWithMiddleware {
        cas_gateway_core::build_http_client(0, Duration::from_millis(1), Duration::from_millis(2))
    }

    #[tokio::test]
    async fn health_liveness_three_failures_then_one_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/node/info"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/node/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "uptime": "1s", "uptime_seconds": 1,
                "load_averages": {"load1": 0.0, "load5": 0.0, "load15": 0.0},
                "memory": {"total": 1, "used": 1, "available": 1},
                "storage": {"total": 100, "used": 0, "available": 100}
            })))
            .mount(&server)
            .await;

        let manager = BackendManager::new(
            vec![server.uri()],
            client(),
            Duration::from_secs(3600),
            Duration::from_secs(1),
        );

        // 500 responses are HTTP-status failures — they must never flip the
        // backend offline no matter how many accumulate.
        manager.probe_all().await;
        manager.probe_all().await;
        manager.probe_all().await;
        assert!(manager.has_online_backends().await);

        // A connection-class failure via mark_backend_dead still behaves
        // like three classified failures would.
        manager.mark_backend_dead(&server.uri(), "connection refused").await;
        assert!(!manager.has_online_backends().await);

        manager.probe_all().await;
        assert!(manager.has_online_backends().await);
        let status = manager.get_backend_status(&server.uri()).await.unwrap();
        assert_eq!(status.consecutive_failures, 0);
        assert_eq!(status.available_space, 100);
    }

    #[tokio::test]
    async fn upload_selection_skips_backend_without_space() {
        let manager = BackendManager::new(
            vec!["http://a".to_string(), "http://b".to_string()],
            client(),
            Duration::from_secs(3600),
            Duration::from_secs(1),
        );
        {
            let mut backends = manager.inner.backends.write().await;
            backends.get_mut("http://a").unwrap().available_space = 100 * 1024 * 1024 * 1024;
            backends.get_mut("http://b").unwrap().available_space = 5 * 1024 * 1024 * 1024;
        }

        let chosen = manager.get_backend_for_upload(10 * 1024).await.unwrap();
        assert_eq!(chosen, "http://a");
    }

    #[tokio::test]
    async fn no_backend_available_when_none_online() {
        let manager = BackendManager::new(
            vec!["http://a".to_string()],
            client(),
            Duration::from_secs(3600),
            Duration::from_secs(1),
        );
        manager.mark_backend_dead("http://a", "connection refused").await;
        assert!(manager.get_backend_for_upload(1).await.is_err());
    }
}
