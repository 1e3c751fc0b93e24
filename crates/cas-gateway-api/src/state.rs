// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use cas_gateway_blob::BlobService;
use cas_gateway_store::MetadataStore;

/// Shared dependencies of every route in this crate: blob I/O and bucket
/// metadata. Cloning is cheap — both fields are themselves `Arc`-backed or
/// wrapped in one here.
#[derive(Clone)]
pub struct AppState {
    store: Arc<MetadataStore>,
    blob: BlobService,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<MetadataStore>, blob: BlobService) -> Self {
        Self { store, blob }
    }

    #[must_use]
    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    #[must_use]
    pub fn blob(&self) -> &BlobService {
        &self.blob
    }
}

/// Lets the blob crate's own handlers (`State<BlobService>`) mount directly
/// onto a router whose state is [`AppState`], without this crate having to
/// re-wrap each one.
impl axum::extract::FromRef<AppState> for BlobService {
    fn from_ref(state: &AppState) -> Self {
        state.blob.clone()
    }
}
