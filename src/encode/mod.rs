//! Photo encoding and upload preparation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │   uploaded files (name + raw bytes)  │
//! └──────────────────┬───────────────────┘
//!                    │
//!                    ▼
//! ┌──────────────────────────────────────┐
//! │            PhotoPipeline             │
//! │  ┌────────────────────────────────┐  │
//! │  │  PhotoEncoder (spawn_blocking) │  │
//! │  │  decode → normalize → search   │  │
//! │  └───────────────┬────────────────┘  │
//! │                  ▼                   │
//! │  StorageRouter upload, or inline     │
//! └──────────────────┬───────────────────┘
//!                    │
//!                    ▼
//!           PreparedBatch { photos, had_rejections }
//! ```

mod encoder;
mod pipeline;

pub use encoder::{
    decode, normalize, quality_candidates, EncodedPhoto, EncoderSettings, OutputFormat,
    PhotoEncoder, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_MIN_QUALITY, DEFAULT_PHOTO_QUALITY,
    MAX_QUALITY,
};
pub use pipeline::{PhotoPipeline, PreparedBatch, UploadFailurePolicy};
