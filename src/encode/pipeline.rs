//! Upload preparation.
//!
//! Turns a batch of raw uploaded files into photo entries ready to be
//! persisted with a tribute. Every file is encoded under the byte budget and,
//! when object storage is configured, uploaded. Per-photo failures never
//! abort the batch; callers only learn whether *something* was rejected.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::EncodeError;
use crate::model::{NewPhoto, PhotoSource, UploadedFile};
use crate::store::{StorageRouter, UploadOptions};

use super::encoder::{EncodedPhoto, PhotoEncoder};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// What to do with an encoded photo whose upload failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum UploadFailurePolicy {
    /// Keep the encoded payload inline in the record
    #[default]
    Inline,
    /// Discard the photo and report a rejection
    Drop,
}

/// Result of preparing a batch of uploads.
#[derive(Debug, Clone, Default)]
pub struct PreparedBatch {
    /// Entries in upload order
    pub photos: Vec<NewPhoto>,
    /// At least one photo could not be kept
    pub had_rejections: bool,
}

/// Encodes uploaded files and routes them to storage.
#[derive(Clone)]
pub struct PhotoPipeline {
    encoder: Arc<PhotoEncoder>,
    router: Option<Arc<StorageRouter>>,
    policy: UploadFailurePolicy,
}

impl PhotoPipeline {
    /// Create an inline-only pipeline.
    pub fn new(encoder: PhotoEncoder) -> Self {
        Self {
            encoder: Arc::new(encoder),
            router: None,
            policy: UploadFailurePolicy::default(),
        }
    }

    /// Upload encoded photos through `router`.
    pub fn with_router(mut self, router: Arc<StorageRouter>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_failure_policy(mut self, policy: UploadFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn encoder(&self) -> &PhotoEncoder {
        &self.encoder
    }

    pub fn has_storage(&self) -> bool {
        self.router.is_some()
    }

    /// Encode and store a batch of uploaded files.
    ///
    /// A file's position in `files` becomes its display order. Files with an
    /// empty name or empty body are skipped silently; undecodable files are
    /// skipped with a warning. Files that cannot meet the byte budget, and
    /// failed uploads under [`UploadFailurePolicy::Drop`], set
    /// `had_rejections`.
    pub async fn prepare(&self, files: Vec<UploadedFile>) -> PreparedBatch {
        let mut batch = PreparedBatch::default();

        for (index, file) in files.into_iter().enumerate() {
            if file.filename.trim().is_empty() || file.bytes.is_empty() {
                continue;
            }
            let display_order = i32::try_from(index).unwrap_or(i32::MAX);

            let encoded = match self.encode(&file).await {
                Ok(encoded) => encoded,
                Err(EncodeError::SizeConstraint { smallest, limit }) => {
                    warn!(
                        "Rejected photo {}: smallest encoding is {:.2} MB, limit is {:.2} MB",
                        file.filename,
                        smallest.len() as f64 / BYTES_PER_MB,
                        limit as f64 / BYTES_PER_MB
                    );
                    batch.had_rejections = true;
                    continue;
                }
                Err(e) => {
                    warn!("Skipping photo {}: {}", file.filename, e);
                    continue;
                }
            };

            debug!(
                "Encoded {} at quality {} ({} bytes)",
                file.filename,
                encoded.quality,
                encoded.payload.len()
            );

            match self.store(&file, encoded, display_order).await {
                Some(photo) => batch.photos.push(photo),
                None => batch.had_rejections = true,
            }
        }

        batch
    }

    /// Run the encoder off the async worker threads.
    async fn encode(&self, file: &UploadedFile) -> Result<EncodedPhoto, EncodeError> {
        let encoder = Arc::clone(&self.encoder);
        let bytes = file.bytes.clone();
        tokio::task::spawn_blocking(move || encoder.encode(&bytes))
            .await
            .map_err(|e| EncodeError::Encode {
                message: e.to_string(),
            })?
    }

    /// Route an encoded photo. `None` means the photo was dropped.
    async fn store(
        &self,
        file: &UploadedFile,
        encoded: EncodedPhoto,
        display_order: i32,
    ) -> Option<NewPhoto> {
        let content_type = encoded.content_type;

        let Some(router) = self.router.as_ref() else {
            let source = PhotoSource::Inline {
                bytes: encoded.payload,
            };
            return Some(NewPhoto::new(source, content_type, display_order));
        };

        let options = UploadOptions::default()
            .with_filename_hint(file.filename.as_str())
            .with_metadata("display_order", display_order)
            .with_metadata("original_filename", file.filename.as_str());

        match router
            .upload(encoded.payload.clone(), content_type, options)
            .await
        {
            Ok(stored) => {
                let source = PhotoSource::Remote {
                    key: stored.key,
                    url: Some(stored.url),
                };
                Some(NewPhoto::new(source, content_type, display_order))
            }
            Err(e) => match self.policy {
                UploadFailurePolicy::Inline => {
                    warn!("Upload of {} failed, keeping it inline: {}", file.filename, e);
                    let source = PhotoSource::Inline {
                        bytes: encoded.payload,
                    };
                    Some(NewPhoto::new(source, content_type, display_order))
                }
                UploadFailurePolicy::Drop => {
                    warn!("Upload of {} failed, dropping it: {}", file.filename, e);
                    None
                }
            },
        }
    }
}
