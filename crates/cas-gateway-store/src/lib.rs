// SPDX-License-Identifier: Apache-2.0
//! Transactional bucket/object metadata store for the CAS gateway: buckets,
//! objects, reference lookups, and access control over a SQLite-backed
//! relational schema.

mod bucket;
mod error;
mod object;
mod schema;
mod store;

pub use bucket::{is_valid_bucket_name, Bucket, CreateBucketOptions};
pub use error::{Result, StoreError};
pub use object::{ListObjectsOptions, ListObjectsResult, Object, MAX_KEYS_CAP, MAX_KEYS_DEFAULT};
pub use store::MetadataStore;
