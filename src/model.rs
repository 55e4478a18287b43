//! Domain types for tribute records and their photos.
//!
//! A photo's storage form is a [`PhotoSource`]: inline bytes, an object-store
//! key, or an externally hosted URL. Exactly one form is authoritative. Rows
//! coming from older storage layouts may still carry several populated
//! columns; those are described with a borrowed [`SourceView`], which is
//! also what the resolver and the gallery de-duplication operate on.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Content type used when none was recorded.
pub const DEFAULT_CONTENT_TYPE: &str = "image/webp";

// =============================================================================
// Photo Source
// =============================================================================

/// Where the bytes of a stored photo live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoSource {
    /// Encoded payload embedded in the record
    Inline { bytes: Bytes },

    /// Object-store key, with the public URL generated at upload time kept as
    /// a hint. The key always wins over the hint when resolving.
    Remote { key: String, url: Option<String> },

    /// Absolute URL hosted elsewhere
    External { url: String },
}

impl PhotoSource {
    /// True when the authoritative variant carries no usable payload.
    ///
    /// Descriptors with an empty source are never persisted.
    pub fn is_empty(&self) -> bool {
        match self {
            PhotoSource::Inline { bytes } => bytes.is_empty(),
            PhotoSource::Remote { key, .. } => key.trim().is_empty(),
            PhotoSource::External { url } => url.trim().is_empty(),
        }
    }

    /// Object-store key, if this photo is stored remotely.
    pub fn remote_key(&self) -> Option<&str> {
        match self {
            PhotoSource::Remote { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Whether the payload is embedded in the record.
    pub fn is_inline(&self) -> bool {
        matches!(self, PhotoSource::Inline { .. })
    }
}

/// Borrowed, column-shaped view of a photo's sources.
///
/// Resolution priority is key, then URL, then inline payload; any subset may
/// be present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceView<'a> {
    pub key: Option<&'a str>,
    pub url: Option<&'a str>,
    pub inline: Option<&'a [u8]>,
    pub content_type: Option<&'a str>,
}

impl<'a> SourceView<'a> {
    pub fn with_key(mut self, key: &'a str) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_url(mut self, url: &'a str) -> Self {
        self.url = Some(url);
        self
    }

    pub fn with_inline(mut self, bytes: &'a [u8], content_type: &'a str) -> Self {
        self.inline = Some(bytes);
        self.content_type = Some(content_type);
        self
    }

    /// Stable identifier used to de-duplicate photos showing the same image.
    ///
    /// Prefers the object key, then the URL, then a SHA-256 digest of the
    /// inline payload. Blank values are ignored.
    pub fn identity(&self) -> Option<String> {
        if let Some(key) = non_blank(self.key) {
            return Some(format!("key:{}", key));
        }
        if let Some(url) = non_blank(self.url) {
            return Some(format!("url:{}", url));
        }
        match self.inline {
            Some(bytes) if !bytes.is_empty() => {
                Some(format!("sha256:{}", hex::encode(Sha256::digest(bytes))))
            }
            _ => None,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Photo Descriptor
// =============================================================================

/// One stored photo belonging to a tribute.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoDescriptor {
    pub id: u64,
    pub tribute_id: u64,
    pub source: PhotoSource,
    /// MIME type of the encoded payload
    pub content_type: String,
    pub display_order: i32,
    pub caption: Option<String>,
    /// Set when an inline payload was moved to the object store
    pub migrated_at: Option<DateTime<Utc>>,
}

impl PhotoDescriptor {
    /// Column-shaped view of this descriptor's source.
    pub fn view(&self) -> SourceView<'_> {
        let view = SourceView::default();
        match &self.source {
            PhotoSource::Inline { bytes } => view.with_inline(bytes, &self.content_type),
            PhotoSource::Remote { key, url } => {
                let view = view.with_key(key);
                match url {
                    Some(url) => view.with_url(url),
                    None => view,
                }
            }
            PhotoSource::External { url } => view.with_url(url),
        }
    }

    /// Replace the inline payload with its object-store location.
    pub fn mark_migrated(&mut self, key: String, url: String, at: DateTime<Utc>) {
        self.source = PhotoSource::Remote { key, url: Some(url) };
        self.migrated_at = Some(at);
    }
}

/// A photo ready to be persisted with a new tribute.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPhoto {
    pub source: PhotoSource,
    pub content_type: String,
    pub display_order: i32,
    pub caption: Option<String>,
}

impl NewPhoto {
    pub fn new(source: PhotoSource, content_type: impl Into<String>, display_order: i32) -> Self {
        let content_type = content_type.into();
        Self {
            source,
            content_type: if content_type.trim().is_empty() {
                DEFAULT_CONTENT_TYPE.to_string()
            } else {
                content_type
            },
            display_order,
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

// =============================================================================
// Tribute Record
// =============================================================================

/// A tribute and the photos it owns.
///
/// `extra_fields` holds optional contact details; they are never copied into
/// any view handed to presentation code.
#[derive(Debug, Clone, PartialEq)]
pub struct TributeRecord {
    pub id: u64,
    pub name: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub extra_fields: BTreeMap<String, String>,
    /// Ordered by `display_order`
    pub photos: Vec<PhotoDescriptor>,
}

/// Input for creating a tribute.
#[derive(Debug, Clone, Default)]
pub struct NewTribute {
    pub name: String,
    pub message: String,
    pub photos: Vec<NewPhoto>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub extra_fields: BTreeMap<String, String>,
}

/// A raw uploaded file.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

// =============================================================================
// Read Models
// =============================================================================

/// One resolved gallery image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryItem {
    pub photo_id: u64,
    pub src: String,
    pub alt: String,
}

/// Presentation snapshot of a photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoView {
    pub id: u64,
    /// `None` when no source could be resolved
    pub src: Option<String>,
    pub caption: Option<String>,
    pub display_order: i32,
}

/// Presentation snapshot of a tribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TributeView {
    pub id: u64,
    pub name: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub photos: Vec<PhotoView>,
}
