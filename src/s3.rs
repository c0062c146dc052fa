//! Concrete [`BucketStore`] backed by `object_store`'s S3 client.
//!
//! Connection setup follows the builder pattern: bucket, region and static
//! credentials from config, with an optional custom endpoint for
//! S3-compatible stores (MinIO and friends need path-style requests and
//! plain HTTP). All transport errors are classified into [`StoreError`]
//! before they leave this module.

use crate::config::{AwsConfig, S3Config};
use crate::store::{BucketStore, RemoteObject, StoreError};
use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::path::Path;
use tracing::{debug, info};

pub struct S3BucketStore {
    inner: AmazonS3,
    bucket: String,
}

impl S3BucketStore {
    /// Builds the S3 client from validated configuration. No network traffic
    /// happens here; reachability is probed separately via
    /// [`BucketStore::bucket_reachable`].
    pub fn new(aws: &AwsConfig, s3: &S3Config) -> Result<Self, StoreError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&s3.bucket_name)
            .with_region(&aws.region)
            .with_access_key_id(&aws.access_key_id)
            .with_secret_access_key(&aws.secret_access_key);

        if let Some(endpoint) = &aws.endpoint {
            // S3-compatible stores require path-style URLs and often plain HTTP.
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(true)
                .with_virtual_hosted_style_request(false);
        }

        let inner = builder.build().map_err(classify)?;
        info!(bucket = %s3.bucket_name, region = %aws.region, "S3 store client constructed");
        Ok(Self {
            inner,
            bucket: s3.bucket_name.clone(),
        })
    }
}

#[async_trait]
impl BucketStore for S3BucketStore {
    async fn put_object(&self, local_path: &Path, key: &str) -> Result<(), StoreError> {
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|e| StoreError::Transport(format!("reading {}: {e}", local_path.display())))?;
        debug!(key, size = bytes.len(), "Uploading object");
        let location = ObjectPath::from(key);
        self.inner
            .put(&location, PutPayload::from(bytes))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn head_object(&self, key: &str) -> Result<RemoteObject, StoreError> {
        let location = ObjectPath::from(key);
        let meta = self.inner.head(&location).await.map_err(classify)?;
        Ok(RemoteObject {
            key: meta.location.to_string(),
            size: meta.size,
        })
    }

    async fn bucket_reachable(&self) -> Result<(), StoreError> {
        // A delimiter listing is the cheapest authenticated round-trip that
        // confirms both bucket existence and read permission.
        self.inner
            .list_with_delimiter(None)
            .await
            .map_err(classify)?;
        info!(bucket = %self.bucket, "Bucket access verified");
        Ok(())
    }

    async fn list_objects<'a>(&self, prefix: Option<&'a str>) -> Result<Vec<RemoteObject>, StoreError> {
        let prefix_path = prefix.filter(|p| !p.is_empty()).map(ObjectPath::from);
        let objects: Vec<RemoteObject> = self
            .inner
            .list(prefix_path.as_ref())
            .map_ok(|meta| RemoteObject {
                key: meta.location.to_string(),
                size: meta.size,
            })
            .try_collect()
            .await
            .map_err(classify)?;
        debug!(count = objects.len(), prefix = ?prefix, "Listed bucket objects");
        Ok(objects)
    }
}

fn classify(err: object_store::Error) -> StoreError {
    match err {
        object_store::Error::NotFound { path, .. } => StoreError::NotFound(path),
        e @ object_store::Error::Unauthenticated { .. } => StoreError::Auth(e.to_string()),
        e @ object_store::Error::PermissionDenied { .. } => StoreError::Permission(e.to_string()),
        other => StoreError::Transport(other.to_string()),
    }
}
