// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use cas_gateway_balancer::BackendManager;
use reqwest_middleware::ClientWithMiddleware;

/// Shared dependencies of every CAS blob handler: the backend registry and
/// the retryable HTTP client used to talk to backends.
#[derive(Clone)]
pub struct BlobService {
    pub(crate) manager: BackendManager,
    pub(crate) client: ClientWithMiddleware,
    pub(crate) request_timeout: Duration,
}

impl BlobService {
    /// Construct a blob service over an already-started [`BackendManager`].
    #[must_use]
    pub fn new(manager: BackendManager, client: ClientWithMiddleware, request_timeout: Duration) -> Self {
        Self {
            manager,
            client,
            request_timeout,
        }
    }

    /// The backend manager this service dispatches through — exposed so the
    /// bucket/object handlers can delegate blob I/O without duplicating
    /// backend selection.
    #[must_use]
    pub fn manager(&self) -> &BackendManager {
        &self.manager
    }
}
