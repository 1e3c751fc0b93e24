// SPDX-License-Identifier: Apache-2.0
//! Maps the metadata store's transport-agnostic error taxonomy onto the
//! gateway's HTTP-facing one.

use cas_gateway_core::GatewayError;
use cas_gateway_store::StoreError;

pub(crate) fn map_store_error(err: StoreError) -> GatewayError {
    match err {
        StoreError::BucketExists => GatewayError::Conflict("bucket already exists".to_string()),
        StoreError::BucketNotEmpty => GatewayError::Conflict("bucket is not empty".to_string()),
        StoreError::BucketNotFound => GatewayError::NotFound("bucket not found".to_string()),
        StoreError::ObjectNotFound => GatewayError::NotFound("object not found".to_string()),
        StoreError::AccessDenied => GatewayError::Forbidden,
        StoreError::InvalidName => GatewayError::InvalidInput("invalid bucket name".to_string()),
        StoreError::InvalidHash => GatewayError::InvalidInput("invalid hash".to_string()),
        StoreError::Database(e) => GatewayError::Database(e.to_string()),
    }
}
