// SPDX-License-Identifier: Apache-2.0
//! Wire shape of `GET /node/info`, used for health probing and space-aware
//! backend selection.

use serde::Deserialize;

/// Deserialized body of a `GET {backend}/node/info` response.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeInfo {
    /// Human-readable uptime, e.g. `"3d2h"`.
    #[serde(default)]
    pub uptime: String,
    /// Uptime in seconds.
    #[serde(default)]
    pub uptime_seconds: u64,
    /// 1/5/15-minute load averages.
    #[serde(default)]
    pub load_averages: LoadAverages,
    /// Memory usage snapshot.
    #[serde(default)]
    pub memory: MemoryInfo,
    /// Storage usage snapshot.
    #[serde(default)]
    pub storage: StorageInfo,
}

/// `load_averages` sub-object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoadAverages {
    /// 1-minute load average.
    #[serde(default)]
    pub load1: f64,
    /// 5-minute load average.
    #[serde(default)]
    pub load5: f64,
    /// 15-minute load average.
    #[serde(default)]
    pub load15: f64,
}

/// `memory` sub-object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryInfo {
    /// Total memory in bytes.
    #[serde(default)]
    pub total: u64,
    /// Used memory in bytes.
    #[serde(default)]
    pub used: u64,
    /// Available memory in bytes.
    #[serde(default)]
    pub available: u64,
}

/// `storage` sub-object — the field the balancer actually cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageInfo {
    /// Total storage capacity in bytes.
    #[serde(default)]
    pub total: u64,
    /// Used storage in bytes.
    #[serde(default)]
    pub used: u64,
    /// Available (free) storage in bytes.
    #[serde(default)]
    pub available: u64,
}
