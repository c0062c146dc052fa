//! # store: capability boundary for the remote object store
//!
//! This module defines the single trait ([`BucketStore`]) the pipeline uses to
//! talk to the destination bucket, plus the classified error type every
//! implementation must map into. The concrete S3 client lives in [`crate::s3`];
//! tests use the generated `MockBucketStore`.
//!
//! ## Interface & Extensibility
//! - Implement [`BucketStore`] to add a new destination (another cloud,
//!   a local fixture, a test double).
//! - All methods are async and return [`StoreError`], so callers can
//!   distinguish authentication, permission, not-found and transport failures
//!   without string inspection.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`, exported behind the
//!   `test-export-mocks` feature so integration tests can build deterministic
//!   store doubles.

use async_trait::async_trait;
use mockall::automock;
use std::path::Path;
use thiserror::Error;

/// Classified store failure. Every transport-level error is mapped into one
/// of these variants before it reaches the pipeline.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The bucket or object does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Credentials are missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// Credentials are valid but access is denied.
    #[error("permission denied: {0}")]
    Permission(String),
    /// Network or service failure, including everything unclassified.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Metadata for an object in the bucket, as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    pub size: u64,
}

/// Capability the backup pipeline needs from the destination bucket:
/// put, head, an eager reachability probe and a prefix listing.
///
/// Implementations own connection setup, authentication and transfer; the
/// pipeline never sees the underlying client.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Upload the file at `local_path` to `key`, replacing any existing object.
    async fn put_object(&self, local_path: &Path, key: &str) -> Result<(), StoreError>;

    /// Fetch size metadata for the object at `key`.
    async fn head_object(&self, key: &str) -> Result<RemoteObject, StoreError>;

    /// Probe that the configured bucket exists and is accessible. Called once
    /// during pipeline initialization, before any file work begins.
    async fn bucket_reachable(&self) -> Result<(), StoreError>;

    /// List objects under `prefix` (the whole bucket when `None`).
    async fn list_objects<'a>(&self, prefix: Option<&'a str>) -> Result<Vec<RemoteObject>, StoreError>;
}
