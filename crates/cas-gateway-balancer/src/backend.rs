// SPDX-License-Identifier: Apache-2.0
//! The backend entity.

use std::time::SystemTime;

use super::node_info::NodeInfo;

/// Maximum consecutive classified failures before a backend is marked
/// offline.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Mutable state the health loop and request handlers maintain for one
/// backend. Never added or removed after `BackendManager::new` — only its
/// fields mutate, guarded by the manager's `RwLock`.
#[derive(Debug, Clone)]
pub struct Backend {
    /// Stable identity — the backend's base URL.
    pub url: String,
    /// Whether the backend is currently considered reachable.
    pub online: bool,
    /// Consecutive classified (connection/timeout) probe failures.
    pub consecutive_failures: u32,
    /// Message from the most recent failure, if any.
    pub last_error: Option<String>,
    /// Wall-clock time of the most recent health check.
    pub last_check: Option<SystemTime>,
    /// Latency of the most recent successful probe, in milliseconds.
    pub last_probe_latency_ms: Option<u64>,
    /// Cached available storage, in bytes, from the most recent probe.
    pub available_space: u64,
    /// Cached full node-info snapshot from the most recent probe.
    pub node_info: Option<NodeInfo>,
}

impl Backend {
    /// Construct a backend entity at its initial, optimistic state: online,
    /// with zero recorded failures. Until the first probe completes,
    /// backends are assumed online.
    #[must_use]
    pub fn new(url: String) -> Self {
        Self {
            url,
            online: true,
            consecutive_failures: 0,
            last_error: None,
            last_check: None,
            last_probe_latency_ms: None,
            available_space: 0,
            node_info: None,
        }
    }

    /// Record a successful probe: reset the failure counter, mark online,
    /// and cache the fresh node info.
    pub fn record_success(&mut self, latency_ms: u64, info: NodeInfo) {
        self.online = true;
        self.consecutive_failures = 0;
        self.last_error = None;
        self.last_check = Some(SystemTime::now());
        self.last_probe_latency_ms = Some(latency_ms);
        self.available_space = info.storage.available;
        self.node_info = Some(info);
    }

    /// Record a failed probe. `classified` indicates whether the failure was
    /// a connection/timeout-class error — only those increment the counter,
    /// since an HTTP-status failure means the backend is reachable, just
    /// erroring.
    pub fn record_failure(&mut self, error: String, classified: bool) {
        self.last_error = Some(error);
        self.last_check = Some(SystemTime::now());
        if classified {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                self.online = false;
            }
        }
    }

    /// Force the backend offline immediately, as if it had just reached
    /// `MAX_CONSECUTIVE_FAILURES`.
    pub fn mark_dead(&mut self, error: String) {
        self.online = false;
        self.consecutive_failures = MAX_CONSECUTIVE_FAILURES;
        self.last_error = Some(error);
        self.last_check = Some(SystemTime::now());
    }
}

/// Read-only snapshot of a backend's state, returned by the manager's
/// introspection methods so callers cannot mutate live state through a
/// borrow.
#[derive(Debug, Clone)]
pub struct BackendStatus {
    /// The backend's base URL.
    pub url: String,
    /// Whether the backend is currently considered reachable.
    pub online: bool,
    /// Consecutive classified probe failures.
    pub consecutive_failures: u32,
    /// Message from the most recent failure, if any.
    pub last_error: Option<String>,
    /// Wall-clock time of the most recent health check.
    pub last_check: Option<SystemTime>,
    /// Latency of the most recent successful probe, in milliseconds.
    pub last_probe_latency_ms: Option<u64>,
    /// Cached available storage, in bytes.
    pub available_space: u64,
}

impl From<&Backend> for BackendStatus {
    fn from(b: &Backend) -> Self {
        Self {
            url: b.url.clone(),
            online: b.online,
            consecutive_failures: b.consecutive_failures,
            last_error: b.last_error.clone(),
            last_check: b.last_check,
            last_probe_latency_ms: b.last_probe_latency_ms,
            available_space: b.available_space,
        }
    }
}
