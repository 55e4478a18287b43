//! Photo source resolution.
//!
//! Turns a stored photo into exactly one renderable URI. Sources are tried
//! in a fixed order and every failure falls through to the next one:
//!
//! 1. object-store key → time-limited signed URL
//! 2. stored absolute URL
//! 3. inline payload → `data:{content type};base64,{payload}`
//!
//! Resolution never fails; a photo with no usable source resolves to `None`.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::warn;

use crate::error::StorageError;
use crate::model::{PhotoDescriptor, PhotoSource, SourceView, DEFAULT_CONTENT_TYPE};
use crate::store::StorageRouter;

/// Produces time-limited links for object-store keys.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    /// Signed GET URL for `key` using the signer's configured lifetime.
    async fn sign_url(&self, key: &str) -> Result<String, StorageError>;
}

#[async_trait]
impl UrlSigner for StorageRouter {
    async fn sign_url(&self, key: &str) -> Result<String, StorageError> {
        self.sign(key, None).await
    }
}

/// Resolves photos to display URIs.
#[derive(Clone, Default)]
pub struct PhotoResolver {
    signer: Option<Arc<dyn UrlSigner>>,
}

impl PhotoResolver {
    /// Resolver with no signing capability; keys are skipped.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signer(signer: Arc<dyn UrlSigner>) -> Self {
        Self {
            signer: Some(signer),
        }
    }

    /// Resolve a stored photo descriptor.
    pub async fn resolve_photo(&self, photo: &PhotoDescriptor) -> Option<String> {
        match &photo.source {
            PhotoSource::Remote { key, url } => match self.sign(key).await {
                Some(signed) => Some(signed),
                None => non_blank(url.as_deref()).map(str::to_string),
            },
            PhotoSource::External { url } => non_blank(Some(url)).map(str::to_string),
            PhotoSource::Inline { bytes } => inline_uri(bytes, Some(&photo.content_type)),
        }
    }

    /// Resolve a column-shaped view, as read from rows that may carry
    /// several populated sources.
    pub async fn resolve(&self, view: SourceView<'_>) -> Option<String> {
        if let Some(key) = view.key {
            if let Some(signed) = self.sign(key).await {
                return Some(signed);
            }
        }

        if let Some(url) = non_blank(view.url) {
            return Some(url.to_string());
        }

        view.inline
            .and_then(|bytes| inline_uri(bytes, view.content_type))
    }

    async fn sign(&self, key: &str) -> Option<String> {
        let key = non_blank(Some(key))?;
        match self.signer {
            Some(ref signer) => match signer.sign_url(key).await {
                Ok(url) if !url.is_empty() => return Some(url),
                Ok(_) => warn!("Signer returned an empty URL for {}", key),
                Err(e) => warn!("Failed to sign {}: {}", key, e),
            },
            None => warn!("No signer configured; cannot sign {}", key),
        }
        None
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn inline_uri(bytes: &[u8], content_type: Option<&str>) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    let content_type = non_blank(content_type).unwrap_or(DEFAULT_CONTENT_TYPE);
    Some(data_uri(content_type, bytes))
}

/// `data:{content_type};base64,{payload}`
pub fn data_uri(content_type: &str, payload: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, STANDARD.encode(payload))
}
