//! Storage router: decides keys and talks to the object store.
//!
//! The router owns everything about *how* an encoded payload lands in object
//! storage: key naming, the access-control parameter, the one-time probe for
//! buckets that reject ACLs, public URL construction, signed links and
//! best-effort deletes.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ObjectStore, PutObject};
use crate::error::{StorageError, StoreError};

/// Cache-Control sent with every upload. Keys are never reused, so objects
/// are immutable.
pub const DEFAULT_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Canned ACL sent by default.
pub const DEFAULT_PUBLIC_ACL: &str = "public-read";

/// Default lifetime of signed links.
pub const DEFAULT_PRESIGNED_TTL_SECS: u64 = 300;

/// Default object-store operation timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const DEFAULT_REGION: &str = "us-east-1";

// =============================================================================
// Settings
// =============================================================================

/// Object-store settings consumed by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub bucket: String,
    /// Key namespace, normalised to `segment/` form (empty for none)
    pub prefix: String,
    /// Replaces the region-derived public URL template
    pub public_base_url: Option<String>,
    pub region: String,
    /// Canned ACL for uploads; `None` for owner-controlled buckets
    pub acl: Option<String>,
    pub presigned_ttl: Duration,
}

impl StoreSettings {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: String::new(),
            public_base_url: None,
            region: DEFAULT_REGION.to_string(),
            acl: Some(DEFAULT_PUBLIC_ACL.to_string()),
            presigned_ttl: Duration::from_secs(DEFAULT_PRESIGNED_TTL_SECS),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = normalize_prefix(prefix);
        self
    }

    pub fn with_public_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.public_base_url = (!base_url.trim().is_empty()).then_some(base_url);
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_acl(mut self, acl: Option<String>) -> Self {
        self.acl = acl.filter(|a| !a.trim().is_empty());
        self
    }

    /// Signed-link lifetime; zero falls back to the default.
    pub fn with_presigned_ttl(mut self, ttl: Duration) -> Self {
        self.presigned_ttl = if ttl.is_zero() {
            Duration::from_secs(DEFAULT_PRESIGNED_TTL_SECS)
        } else {
            ttl
        };
        self
    }
}

// =============================================================================
// Upload Options
// =============================================================================

/// Optional parameters of an upload.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Original filename, used for the key extension
    pub filename_hint: Option<String>,
    /// Explicit key; generated when absent
    pub object_key: Option<String>,
    pub cache_control: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl UploadOptions {
    pub fn with_filename_hint(mut self, filename: impl Into<String>) -> Self {
        self.filename_hint = Some(filename.into());
        self
    }

    pub fn with_object_key(mut self, key: impl Into<String>) -> Self {
        self.object_key = Some(key.into());
        self
    }

    pub fn with_metadata(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(name.into(), value.to_string());
        self
    }
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            filename_hint: None,
            object_key: None,
            cache_control: Some(DEFAULT_CACHE_CONTROL.to_string()),
            metadata: HashMap::new(),
        }
    }
}

/// Where an upload landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    /// Public URL derived from the key at upload time
    pub url: String,
}

// =============================================================================
// ACL Capability Cache
// =============================================================================

/// Remembers which endpoints reject access-control parameters.
///
/// Set once by the first upload that hits the rejection and read by every
/// upload after it, so the probe is not repeated per request.
#[derive(Debug, Default)]
pub struct AclCapabilities {
    omit_acl: RwLock<HashMap<String, bool>>,
}

impl AclCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether uploads to `endpoint` must omit the ACL parameter.
    pub async fn omits_acl(&self, endpoint: &str) -> bool {
        let map = self.omit_acl.read().await;
        map.get(endpoint).copied().unwrap_or(false)
    }

    /// Record that `endpoint` rejects ACL parameters.
    pub async fn mark_unsupported(&self, endpoint: &str) {
        let mut map = self.omit_acl.write().await;
        map.insert(endpoint.to_string(), true);
    }
}

// =============================================================================
// Storage Router
// =============================================================================

/// Routes encoded payloads to an object store.
///
/// # Example
///
/// ```ignore
/// use tribute_media::store::{create_s3_client, S3ObjectStore, StorageRouter, StoreSettings, UploadOptions};
///
/// let client = create_s3_client(None, "us-west-2", Duration::from_secs(30)).await;
/// let store = S3ObjectStore::new(client, "s3.us-west-2.amazonaws.com");
/// let router = StorageRouter::new(Arc::new(store), StoreSettings::new("tributes").with_region("us-west-2"));
///
/// let stored = router
///     .upload(payload, "image/webp", UploadOptions::default().with_filename_hint("photo.png"))
///     .await?;
/// ```
pub struct StorageRouter {
    store: Arc<dyn ObjectStore>,
    settings: StoreSettings,
    capabilities: Arc<AclCapabilities>,
}

impl StorageRouter {
    pub fn new(store: Arc<dyn ObjectStore>, settings: StoreSettings) -> Self {
        Self {
            store,
            settings,
            capabilities: Arc::new(AclCapabilities::new()),
        }
    }

    /// Share a capability cache between routers talking to the same endpoints.
    pub fn with_capabilities(mut self, capabilities: Arc<AclCapabilities>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn capabilities(&self) -> &Arc<AclCapabilities> {
        &self.capabilities
    }

    /// Lifetime of signed links produced by [`sign`](Self::sign).
    pub fn presigned_ttl(&self) -> Duration {
        self.settings.presigned_ttl
    }

    /// Upload a payload and return its key and public URL.
    ///
    /// The ACL parameter is sent unless the endpoint is already known to
    /// reject it. A rejection triggers exactly one retry without the
    /// parameter and is remembered for the endpoint.
    ///
    /// # Errors
    ///
    /// - [`StorageError::EmptyPayload`] for an empty payload
    /// - [`StorageError::InvalidKey`] for a blank explicit key
    /// - [`StorageError::Upload`] for any store failure
    pub async fn upload(
        &self,
        payload: Bytes,
        content_type: &str,
        options: UploadOptions,
    ) -> Result<StoredObject, StorageError> {
        if payload.is_empty() {
            return Err(StorageError::EmptyPayload);
        }

        let key = match options.object_key {
            Some(ref explicit) => {
                let key = explicit.trim_start_matches('/');
                if key.trim().is_empty() {
                    return Err(StorageError::InvalidKey);
                }
                key.to_string()
            }
            None => self.generate_key(options.filename_hint.as_deref(), content_type),
        };

        let endpoint = self.store.endpoint();
        let acl = if self.capabilities.omits_acl(endpoint).await {
            None
        } else {
            self.settings.acl.clone()
        };

        let mut request = PutObject {
            bucket: self.settings.bucket.clone(),
            key,
            body: payload,
            content_type: content_type.to_string(),
            cache_control: options.cache_control,
            acl,
            metadata: options.metadata,
        };

        match self.store.put(&request).await {
            Ok(()) => {}
            Err(StoreError::AccessControlUnsupported) if request.acl.is_some() => {
                warn!(
                    "Bucket {} rejects ACLs; retrying upload without ACL",
                    self.settings.bucket
                );
                self.capabilities.mark_unsupported(endpoint).await;
                request.acl = None;
                if let Err(source) = self.store.put(&request).await {
                    return Err(StorageError::Upload {
                        key: request.key,
                        source,
                    });
                }
            }
            Err(source) => {
                return Err(StorageError::Upload {
                    key: request.key,
                    source,
                })
            }
        }

        debug!(
            "Uploaded object to bucket {} at key {}",
            self.settings.bucket, request.key
        );

        let url = self.public_url(&request.key)?;
        Ok(StoredObject {
            key: request.key,
            url,
        })
    }

    /// Delete an object. Blank keys are a no-op.
    ///
    /// With `ignore_missing`, a missing object counts as deleted.
    pub async fn delete(&self, key: &str, ignore_missing: bool) -> Result<(), StorageError> {
        let key = key.trim_start_matches('/');
        if key.is_empty() {
            return Ok(());
        }

        match self.store.delete(&self.settings.bucket, key).await {
            Ok(()) => {
                debug!(
                    "Deleted object from bucket {} at key {}",
                    self.settings.bucket, key
                );
                Ok(())
            }
            Err(StoreError::NotFound(_)) if ignore_missing => {
                debug!("Object {} already absent", key);
                Ok(())
            }
            Err(source) => Err(StorageError::Delete {
                key: key.to_string(),
                source,
            }),
        }
    }

    /// Generate a time-limited GET URL.
    ///
    /// `ttl` of `None` or zero uses the configured presigned TTL.
    pub async fn sign(&self, key: &str, ttl: Option<Duration>) -> Result<String, StorageError> {
        let key = key.trim_start_matches('/');
        if key.is_empty() {
            return Err(StorageError::InvalidKey);
        }

        let ttl = ttl
            .filter(|t| !t.is_zero())
            .unwrap_or(self.settings.presigned_ttl);

        self.store
            .sign(&self.settings.bucket, key, ttl)
            .await
            .map_err(|source| StorageError::Sign {
                key: key.to_string(),
                source,
            })
    }

    /// Absolute public URL for a key.
    ///
    /// Uses the configured base URL when present (adding `https://` if it has
    /// no scheme), otherwise the virtual-hosted S3 URL for the bucket, with
    /// the region omitted for `us-east-1`.
    pub fn public_url(&self, key: &str) -> Result<String, StorageError> {
        let key = key.trim_start_matches('/');
        if key.is_empty() {
            return Err(StorageError::InvalidKey);
        }

        if let Some(ref base_url) = self.settings.public_base_url {
            let base = base_url.trim().trim_end_matches('/');
            let lower = base.to_ascii_lowercase();
            if lower.starts_with("https://") || lower.starts_with("http://") {
                return Ok(format!("{}/{}", base, key));
            }
            return Ok(format!("https://{}/{}", base, key));
        }

        let bucket = &self.settings.bucket;
        let region = self.settings.region.trim();
        if !region.is_empty() && region != DEFAULT_REGION {
            Ok(format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key))
        } else {
            Ok(format!("https://{}.s3.amazonaws.com/{}", bucket, key))
        }
    }

    /// `{prefix}{random hex}{extension}`
    fn generate_key(&self, filename_hint: Option<&str>, content_type: &str) -> String {
        let extension = resolve_extension(filename_hint, content_type);
        format!(
            "{}{}{}",
            self.settings.prefix,
            Uuid::new_v4().simple(),
            extension
        )
    }
}

// =============================================================================
// Key Helpers
// =============================================================================

/// Normalise a key prefix to `a/b/` form: backslashes become slashes,
/// leading slashes are dropped and a trailing slash is added.
pub fn normalize_prefix(prefix: &str) -> String {
    let prefix = prefix.trim().replace('\\', "/");
    let prefix = prefix.trim_start_matches('/');
    if prefix.is_empty() {
        return String::new();
    }
    if prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{}/", prefix)
    }
}

/// Key extension for an upload: the filename's own extension (lower-cased)
/// when it has one, else one derived from the content type.
pub fn resolve_extension(filename_hint: Option<&str>, content_type: &str) -> String {
    let from_filename = filename_hint
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty());

    match from_filename {
        Some(ext) => format!(".{}", ext.to_ascii_lowercase()),
        None => extension_for_content_type(content_type).unwrap_or_default(),
    }
}

/// Extension for a MIME type, with `image/jpeg` mapped to `.jpg`.
pub fn extension_for_content_type(content_type: &str) -> Option<String> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let known = match mime.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/avif" => Some("avif"),
        "image/heic" => Some("heic"),
        "image/heif" => Some("heif"),
        "image/bmp" => Some("bmp"),
        "image/tiff" => Some("tiff"),
        _ => None,
    };
    if let Some(ext) = known {
        return Some(format!(".{}", ext));
    }

    mime_guess::get_mime_extensions_str(&mime)
        .and_then(|exts| exts.first())
        .map(|ext| match *ext {
            "jpe" | "jpeg" | "jfif" => ".jpg".to_string(),
            other => format!(".{}", other),
        })
}

// =============================================================================
// Tests
// =============================================================================
