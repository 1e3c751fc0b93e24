// SPDX-License-Identifier: Apache-2.0
//! The object entity.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// An object row: `(bucket, key) -> blob hash`, plus bookkeeping.
#[derive(Debug, Clone)]
pub struct Object {
    /// Internal numeric id.
    pub id: i64,
    /// Owning bucket's internal id.
    pub bucket_id: i64,
    /// Key, unique within the bucket.
    pub key: String,
    /// SHA-256 hash of the referenced CAS blob (64 lowercase hex chars).
    pub hash: String,
    /// Size in bytes.
    pub size: i64,
    /// Optional MIME content type.
    pub content_type: Option<String>,
    /// Optional free-form string metadata.
    pub metadata: Option<HashMap<String, String>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-updated timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Cursor-paginated listing result returned by `ListObjects`.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsResult {
    /// Matching object rows, ordered by internal id.
    pub objects: Vec<Object>,
    /// Common prefixes synthesized when `delimiter` was set.
    pub common_prefixes: Vec<String>,
    /// Whether more results exist beyond this page.
    pub is_truncated: bool,
    /// Opaque cursor for the next page, present iff `is_truncated`.
    pub next_cursor: Option<i64>,
}

/// Options accepted by `ListObjects`.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsOptions {
    /// Only keys starting with this prefix are considered.
    pub prefix: Option<String>,
    /// When set, group keys beneath the first delimiter after `prefix`.
    pub delimiter: Option<String>,
    /// Page size; default and hard cap is 1000.
    pub max_keys: Option<u32>,
    /// Opaque numeric cursor from a previous page (`id > cursor`).
    pub cursor: Option<i64>,
}

/// Default and maximum page size for `ListObjects`.
pub const MAX_KEYS_DEFAULT: u32 = 1000;
/// Hard cap on `max_keys`, matching `MAX_KEYS_DEFAULT`.
pub const MAX_KEYS_CAP: u32 = 1000;
