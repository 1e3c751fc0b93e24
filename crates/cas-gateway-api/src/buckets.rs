// SPDX-License-Identifier: Apache-2.0
//! Bucket/object REST handlers: thin adapters over the metadata store and
//! the CAS blob handlers.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use cas_gateway_blob::{download_hash, extract_file_field, upload_to_backend};
use cas_gateway_core::GatewayError;
use cas_gateway_store::{Bucket, CreateBucketOptions, ListObjectsOptions, Object};
use serde::{Deserialize, Serialize};

use crate::error::map_store_error;
use crate::owner::OwnerId;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct BucketView {
    pub name: String,
    pub owner_id: String,
    pub public: bool,
    pub quota_bytes: i64,
    pub created_at: String,
    pub updated_at: String,
    pub object_count: i64,
    pub total_size: i64,
}

impl From<&Bucket> for BucketView {
    fn from(b: &Bucket) -> Self {
        Self {
            name: b.name.clone(),
            owner_id: b.owner_id.clone(),
            public: b.public,
            quota_bytes: b.quota_bytes,
            created_at: b.created_at.to_rfc3339(),
            updated_at: b.updated_at.to_rfc3339(),
            object_count: b.object_count,
            total_size: b.total_size,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ObjectView {
    pub key: String,
    pub hash: String,
    pub size: i64,
    pub content_type: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Object> for ObjectView {
    fn from(o: &Object) -> Self {
        Self {
            key: o.key.clone(),
            hash: o.hash.clone(),
            size: o.size,
            content_type: o.content_type.clone(),
            created_at: o.created_at.to_rfc3339(),
            updated_at: o.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct CreateBucketRequest {
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub quota_bytes: i64,
}

/// `POST /bucket/:name`.
pub async fn create_bucket_handler(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(name): Path<String>,
    body: Option<Json<CreateBucketRequest>>,
) -> Result<Json<BucketView>, GatewayError> {
    let opts = body.map(|Json(b)| CreateBucketOptions {
        public: b.public,
        quota_bytes: b.quota_bytes,
    });
    let bucket = state
        .store()
        .create_bucket(&name, &owner, opts.unwrap_or_default())
        .await
        .map_err(map_store_error)?;
    Ok(Json(BucketView::from(&bucket)))
}

/// `GET /bucket/:name`.
pub async fn get_bucket_handler(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(name): Path<String>,
) -> Result<Json<BucketView>, GatewayError> {
    let bucket = state.store().get_bucket(&name).await.map_err(map_store_error)?;
    require_read_access(&bucket, &owner)?;
    Ok(Json(BucketView::from(&bucket)))
}

/// `DELETE /bucket/:name`.
pub async fn delete_bucket_handler(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(name): Path<String>,
) -> Result<StatusCode, GatewayError> {
    let bucket = state.store().get_bucket(&name).await.map_err(map_store_error)?;
    require_owner(&bucket, &owner)?;
    state.store().delete_bucket(&name).await.map_err(map_store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /buckets`.
pub async fn list_buckets_handler(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
) -> Result<Json<Vec<BucketView>>, GatewayError> {
    let buckets = state.store().list_buckets(&owner).await.map_err(map_store_error)?;
    Ok(Json(buckets.iter().map(BucketView::from).collect()))
}

/// `POST /bucket/:name/upload`: the object key is carried as a multipart
/// field named `key` alongside `file` (the endpoint has no path segment for
/// it, unlike `PUT /bucket/:name/object/*`).
pub async fn upload_to_bucket_handler(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(bucket_name): Path<String>,
    multipart: Multipart,
) -> Result<Json<ObjectView>, GatewayError> {
    let bucket = state.store().get_bucket(&bucket_name).await.map_err(map_store_error)?;
    require_owner(&bucket, &owner)?;

    let (key, field) = extract_key_and_file(multipart).await?;
    put_object_via_cas(&state, &bucket_name, &key, field).await
}

/// `PUT /bucket/:name/object/*key`.
pub async fn put_object_handler(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path((bucket_name, key)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<Json<ObjectView>, GatewayError> {
    let bucket = state.store().get_bucket(&bucket_name).await.map_err(map_store_error)?;
    require_owner(&bucket, &owner)?;

    let field = extract_file_field(multipart).await?;
    put_object_via_cas(&state, &bucket_name, &key, field).await
}

async fn put_object_via_cas(
    state: &AppState,
    bucket_name: &str,
    key: &str,
    field: cas_gateway_blob::UploadField,
) -> Result<Json<ObjectView>, GatewayError> {
    let size = field.bytes.len() as i64;
    let content_type = field.content_type.clone();
    let backend = state
        .blob()
        .manager()
        .get_backend_for_upload(size)
        .await
        .map_err(|_| GatewayError::NoBackendAvailable("no backend has enough space".to_string()))?;

    let result = upload_to_backend(state.blob(), &backend, field).await?;
    let hash = result
        .hash
        .ok_or_else(|| GatewayError::Upstream("backend did not return a content hash".to_string()))?;

    let object = state
        .store()
        .put_object(bucket_name, key, &hash, size, content_type.as_deref(), None)
        .await
        .map_err(map_store_error)?;
    Ok(Json(ObjectView::from(&object)))
}

/// `GET /bucket/:name/object/*key`.
pub async fn get_object_handler(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path((bucket_name, key)): Path<(String, String)>,
) -> Result<Response, GatewayError> {
    let bucket = state.store().get_bucket(&bucket_name).await.map_err(map_store_error)?;
    require_read_access(&bucket, &owner)?;
    let object = state
        .store()
        .get_object(&bucket_name, &key)
        .await
        .map_err(map_store_error)?;
    download_hash(state.blob(), &object.hash).await
}

/// `HEAD /bucket/:name/object/*key`: headers only.
pub async fn head_object_handler(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path((bucket_name, key)): Path<(String, String)>,
) -> Result<Response, GatewayError> {
    let bucket = state.store().get_bucket(&bucket_name).await.map_err(map_store_error)?;
    require_read_access(&bucket, &owner)?;
    let object = state
        .store()
        .get_object(&bucket_name, &key)
        .await
        .map_err(map_store_error)?;

    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    insert_header(headers, "X-Object-Hash", &object.hash);
    insert_header(headers, "X-Object-Size", &object.size.to_string());
    insert_header(headers, "X-Object-Key", &object.key);
    insert_header(headers, "Last-Modified", &object.updated_at.to_rfc2822());
    Ok(response)
}

fn insert_header(headers: &mut axum::http::HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

/// `DELETE /bucket/:name/object/*key`: removes only the metadata row — the
/// CAS blob is left alone since other objects may still reference it.
pub async fn delete_object_handler(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path((bucket_name, key)): Path<(String, String)>,
) -> Result<StatusCode, GatewayError> {
    let bucket = state.store().get_bucket(&bucket_name).await.map_err(map_store_error)?;
    require_owner(&bucket, &owner)?;
    state
        .store()
        .delete_object(&bucket_name, &key)
        .await
        .map_err(map_store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ListObjectsQuery {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default, rename = "max-keys")]
    pub max_keys: Option<u32>,
    #[serde(default)]
    pub cursor: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListObjectsResponse {
    pub objects: Vec<ObjectView>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_cursor: Option<i64>,
}

/// `GET /bucket/:name/objects`.
pub async fn list_objects_handler(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(bucket_name): Path<String>,
    Query(query): Query<ListObjectsQuery>,
) -> Result<Json<ListObjectsResponse>, GatewayError> {
    let bucket = state.store().get_bucket(&bucket_name).await.map_err(map_store_error)?;
    require_read_access(&bucket, &owner)?;

    let result = state
        .store()
        .list_objects(
            &bucket_name,
            ListObjectsOptions {
                prefix: query.prefix,
                delimiter: query.delimiter,
                max_keys: query.max_keys,
                cursor: query.cursor,
            },
        )
        .await
        .map_err(map_store_error)?;

    Ok(Json(ListObjectsResponse {
        objects: result.objects.iter().map(ObjectView::from).collect(),
        common_prefixes: result.common_prefixes,
        is_truncated: result.is_truncated,
        next_cursor: result.next_cursor,
    }))
}

async fn extract_key_and_file(
    mut multipart: Multipart,
) -> Result<(String, cas_gateway_blob::UploadField), GatewayError> {
    let mut key: Option<String> = None;
    let mut file: Option<cas_gateway_blob::UploadField> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GatewayError::InvalidInput(format!("invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("key") => {
                key = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| GatewayError::InvalidInput(format!("invalid key field: {e}")))?,
                );
            }
            Some("file") => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| GatewayError::InvalidInput(format!("failed reading file field: {e}")))?;
                file = Some(cas_gateway_blob::UploadField {
                    filename,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    let key = key.ok_or_else(|| GatewayError::InvalidInput("missing required 'key' field".to_string()))?;
    let file = file.ok_or_else(|| GatewayError::InvalidInput("missing required 'file' field".to_string()))?;
    Ok((key, file))
}

fn require_owner(bucket: &Bucket, owner: &str) -> Result<(), GatewayError> {
    if bucket.owner_id == owner {
        Ok(())
    } else {
        Err(GatewayError::Forbidden)
    }
}

fn require_read_access(bucket: &Bucket, owner: &str) -> Result<(), GatewayError> {
    if bucket.owner_id == owner || bucket.public {
        Ok(())
    } else {
        Err(GatewayError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use cas_gateway_balancer::BackendManager;
    use std::time::Duration;

    async fn test_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("create tempdir");
        let db_path = dir.path().join("meta.db");
        let store = cas_gateway_store::MetadataStore::open(&db_path)
            .await
            .expect("open metadata store");

        let client = cas_gateway_core::build_http_client(0, Duration::from_millis(1), Duration::from_millis(2));
        let manager = BackendManager::new(Vec::new(), client.clone(), Duration::from_secs(3600), Duration::from_secs(5));
        let blob = cas_gateway_blob::BlobService::new(manager, client, Duration::from_secs(5));
        (AppState::new(std::sync::Arc::new(store), blob), dir)
    }

    /// S4 — creating a bucket twice conflicts on the second attempt.
    #[tokio::test]
    async fn create_then_duplicate_bucket_conflicts() {
        let (state, _dir) = test_state().await;
        create_bucket_handler(
            State(state.clone()),
            OwnerId("o1".to_string()),
            Path("my-bucket".to_string()),
            None,
        )
        .await
        .expect("first create succeeds");

        let err = create_bucket_handler(
            State(state),
            OwnerId("o2".to_string()),
            Path("my-bucket".to_string()),
            None,
        )
        .await
        .expect_err("duplicate create conflicts");
        assert!(matches!(err, GatewayError::Conflict(_)));
    }

    /// S5 — a public bucket is readable by anyone but only deletable by its
    /// owner.
    #[tokio::test]
    async fn public_bucket_read_open_write_owner_only() {
        let (state, _dir) = test_state().await;
        create_bucket_handler(
            State(state.clone()),
            OwnerId("o1".to_string()),
            Path("p".to_string()),
            Some(Json(CreateBucketRequest {
                public: true,
                quota_bytes: 0,
            })),
        )
        .await
        .expect("owner creates public bucket");

        get_bucket_handler(State(state.clone()), OwnerId("o2".to_string()), Path("p".to_string()))
            .await
            .expect("public bucket is readable by a non-owner");

        let err = delete_bucket_handler(State(state), OwnerId("o2".to_string()), Path("p".to_string()))
            .await
            .expect_err("non-owner cannot delete");
        assert!(matches!(err, GatewayError::Forbidden));
    }

    /// Deleting a non-empty bucket conflicts until its object is removed.
    #[tokio::test]
    async fn delete_bucket_fails_while_object_present() {
        let (state, _dir) = test_state().await;
        create_bucket_handler(
            State(state.clone()),
            OwnerId("o1".to_string()),
            Path("b".to_string()),
            None,
        )
        .await
        .expect("create succeeds");

        state
            .store()
            .put_object("b", "k", &"a".repeat(64), 3, None, None)
            .await
            .expect("seed object");

        let err = delete_bucket_handler(State(state.clone()), OwnerId("o1".to_string()), Path("b".to_string()))
            .await
            .expect_err("bucket still has an object");
        assert!(matches!(err, GatewayError::Conflict(_)));

        state.store().delete_object("b", "k").await.expect("remove object");
        delete_bucket_handler(State(state), OwnerId("o1".to_string()), Path("b".to_string()))
            .await
            .expect("now empty, delete succeeds");
    }
}
