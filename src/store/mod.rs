//! Object storage for encoded photos.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   PhotoPipeline / TributeService        │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             StorageRouter               │
//! │  (key naming, ACL capability cache,     │
//! │   public URLs, signing, deletes)        │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          ObjectStore Trait              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │   S3ObjectStore (AWS S3, MinIO, ...)    │
//! └─────────────────────────────────────────┘
//! ```

mod router;
mod s3;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;

pub use router::{
    extension_for_content_type, normalize_prefix, resolve_extension, AclCapabilities,
    StorageRouter, StoreSettings, StoredObject, UploadOptions, DEFAULT_CACHE_CONTROL,
    DEFAULT_PRESIGNED_TTL_SECS, DEFAULT_PUBLIC_ACL, DEFAULT_REQUEST_TIMEOUT_SECS,
};
pub use s3::{create_s3_client, S3ObjectStore};

/// A single object write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    pub body: Bytes,
    pub content_type: String,
    pub cache_control: Option<String>,
    /// Canned ACL; `None` sends no access-control parameter at all
    pub acl: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Minimal object-store contract used by the storage router.
///
/// Implementations must be thread-safe. Backends report an ACL rejection as
/// [`StoreError::AccessControlUnsupported`] and a missing object as
/// [`StoreError::NotFound`]; everything else is a request failure.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object.
    async fn put(&self, request: &PutObject) -> Result<(), StoreError>;

    /// Delete an object.
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError>;

    /// Generate a time-limited GET URL.
    async fn sign(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String, StoreError>;

    /// Identifies the endpoint this store talks to.
    ///
    /// Capability probes are remembered per endpoint.
    fn endpoint(&self) -> &str;
}
