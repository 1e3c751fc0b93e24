// SPDX-License-Identifier: Apache-2.0
//! CAS blob handlers: upload, download, file-info, and delete, each built on
//! top of [`cas_gateway_balancer`]'s dispatcher with its own aggregation
//! rule.

mod delete;
mod download;
mod info;
mod state;
mod upload;

pub use delete::delete_handler;
pub use download::{download_handler, download_hash};
pub use info::{info_handler, FileInfo};
pub use state::BlobService;
pub use upload::{extract_file_field, upload_handler, upload_to_backend, UploadField, UploadResponse};
