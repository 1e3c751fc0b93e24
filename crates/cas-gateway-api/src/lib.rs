// SPDX-License-Identifier: Apache-2.0
//! The gateway's REST surface: bucket/object handlers layered over the CAS
//! blob handlers and the metadata store, plus the health endpoints every
//! service in this workspace exposes.

mod buckets;
mod error;
mod health;
mod owner;
mod state;

use axum::routing::{delete, get, post};
use axum::Router;
use cas_gateway_blob::{delete_handler, download_handler, info_handler, upload_handler};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Assemble the full gateway router: blob routes, bucket/object routes, and
/// health endpoints, all sharing one [`AppState`].
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/file/upload", post(upload_handler))
        .route("/file/:hash/download", get(download_handler))
        .route("/file/:hash/info", get(info_handler))
        .route("/file/:hash/delete", delete(delete_handler))
        .route("/buckets", get(buckets::list_buckets_handler))
        .route(
            "/bucket/:name",
            post(buckets::create_bucket_handler)
                .get(buckets::get_bucket_handler)
                .delete(buckets::delete_bucket_handler),
        )
        .route("/bucket/:name/upload", post(buckets::upload_to_bucket_handler))
        .route(
            "/bucket/:name/object/*key",
            get(buckets::get_object_handler)
                .head(buckets::head_object_handler)
                .put(buckets::put_object_handler)
                .delete(buckets::delete_object_handler),
        )
        .route("/bucket/:name/objects", get(buckets::list_objects_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
