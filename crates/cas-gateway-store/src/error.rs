// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Errors the metadata store can return.
///
/// This type knows nothing about HTTP — the binary/handler layer maps it
/// onto [`cas_gateway_core::GatewayError`], keeping this crate transport
/// agnostic.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `CreateBucket` with a name already in use.
    #[error("bucket already exists")]
    BucketExists,
    /// `DeleteBucket` on a bucket that still has object rows.
    #[error("bucket is not empty")]
    BucketNotEmpty,
    /// No bucket with the given name.
    #[error("bucket not found")]
    BucketNotFound,
    /// No object with the given key in the bucket.
    #[error("object not found")]
    ObjectNotFound,
    /// Caller is neither the owner nor the bucket public.
    #[error("access denied")]
    AccessDenied,
    /// Bucket name fails the naming predicate.
    #[error("invalid bucket name")]
    InvalidName,
    /// Hash is not exactly 64 lowercase hex characters.
    #[error("invalid hash")]
    InvalidHash,
    /// Underlying SQLite failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Convenience alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
