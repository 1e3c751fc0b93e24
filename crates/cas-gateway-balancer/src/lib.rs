// SPDX-License-Identifier: Apache-2.0
//! Backend fleet manager and parallel request dispatcher for the CAS
//! gateway — the hard part of the system.

mod backend;
mod classify;
mod dispatch;
mod manager;
mod node_info;

pub use backend::{Backend, BackendStatus, MAX_CONSECUTIVE_FAILURES};
pub use classify::is_timeout_or_connection_error;
pub use dispatch::{dispatch, DispatchResult, Outcome};
pub use manager::{BackendManager, NoBackendAvailable};
pub use node_info::{LoadAverages, MemoryInfo, NodeInfo, StorageInfo};
