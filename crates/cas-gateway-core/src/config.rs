// SPDX-License-Identifier: Apache-2.0
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Process-lifetime gateway configuration, assembled once at startup from
/// CLI flags (see `bins/cas-gatewayd`) and never reloaded. The gateway has
/// no use for persisted settings beyond the metadata database itself.
#[derive(Debug, Clone)]
pub struct Config {
    /// CAS backend base URLs, e.g. `http://10.0.0.1:8080`.
    pub backend_urls: Vec<String>,
    /// Address the gateway's HTTP API binds to.
    pub bind_addr: SocketAddr,
    /// Optional separate bind address for a debug/metrics surface.
    pub debug_bind_addr: Option<SocketAddr>,
    /// Path to the SQLite metadata database file.
    pub db_path: PathBuf,
    /// Maximum connector-error retries per outbound request.
    pub retry_count: u32,
    /// Minimum exponential backoff wait between retries.
    pub retry_wait_min: Duration,
    /// Maximum exponential backoff wait between retries.
    pub retry_wait_max: Duration,
    /// Per-attempt timeout for outbound requests to a backend.
    pub request_timeout: Duration,
    /// Interval between periodic health probes.
    pub health_check_interval: Duration,
    /// Timeout for a single health probe.
    pub health_check_timeout: Duration,
    /// Grace period given to in-flight requests on shutdown.
    pub graceful_shutdown_timeout: Duration,
}

impl Config {
    /// Validate invariants that CLI parsing alone cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error message if no backend URLs were supplied, or if any
    /// duration bound is nonsensical (e.g. `retry_wait_min > retry_wait_max`).
    pub fn validate(&self) -> Result<(), String> {
        if self.backend_urls.is_empty() {
            return Err("at least one backend URL is required".to_string());
        }
        if self.retry_wait_min > self.retry_wait_max {
            return Err("retry-wait-min must not exceed retry-wait-max".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use std::net::SocketAddr;
    use std::time::Duration;

    fn base_config() -> Config {
        Config {
            backend_urls: vec!["http://a".to_string()],
            bind_addr: "0.0.0.0:8080".parse::<SocketAddr>().unwrap_or_else(|_| {
                SocketAddr::from(([0, 0, 0, 0], 8080))
            }),
            debug_bind_addr: None,
            db_path: "cas-gateway.db".into(),
            retry_count: 3,
            retry_wait_min: Duration::from_millis(100),
            retry_wait_max: Duration::from_millis(2000),
            request_timeout: Duration::from_secs(30),
            health_check_interval: Duration::from_secs(5),
            health_check_timeout: Duration::from_secs(5),
            graceful_shutdown_timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn rejects_no_backends() {
        let mut config = base_config();
        config.backend_urls.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_retry_wait_bounds() {
        let mut config = base_config();
        config.retry_wait_min = Duration::from_secs(5);
        config.retry_wait_max = Duration::from_secs(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_a_well_formed_config() {
        assert!(base_config().validate().is_ok());
    }
}
