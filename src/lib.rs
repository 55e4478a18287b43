//! # Tribute Media
//!
//! Photo handling for a tribute wall: size-bounded encoding of user uploads,
//! object storage with inline fallback, display-URL resolution and cached
//! read paths.
//!
//! ## Features
//!
//! - **Size-bounded encoding**: Any decodable upload is re-encoded (WebP or JPEG) with a
//!   descending quality search until it fits the byte budget
//! - **Object storage**: Uploads to S3 or S3-compatible stores, remembering per endpoint
//!   whether the bucket rejects ACLs
//! - **Source resolution**: Signed link, stored URL or inline data URI, never an error
//! - **Cached reads**: Random gallery sample and first listing page, with lifetimes
//!   clamped below the signed-link lifetime and explicit invalidation on every mutation
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`encode`] - Photo encoder and upload preparation pipeline
//! - [`store`] - Object-store trait, S3 backend and storage router
//! - [`resolve`] - Photo source resolver
//! - [`cache`] - TTL cache and lifetime clamping
//! - [`pagination`] - Page windows
//! - [`records`] - Record persistence collaborator
//! - [`service`] - Tribute service tying it all together
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tribute_media::{
//!     MemoryRecordStore, NewTribute, PhotoEncoder, PhotoPipeline, ServiceSettings,
//!     TributeService, UploadedFile,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     // Inline-only: no object store configured
//!     let pipeline = PhotoPipeline::new(PhotoEncoder::default());
//!     let service = TributeService::new(
//!         Arc::new(MemoryRecordStore::new()),
//!         None,
//!         ServiceSettings::default(),
//!     );
//!
//!     let bytes = std::fs::read("photo.jpg").unwrap();
//!     let batch = pipeline.prepare(vec![UploadedFile::new("photo.jpg", bytes)]).await;
//!
//!     let record = service
//!         .create_tribute(NewTribute {
//!             name: "Ada".to_string(),
//!             message: "Always curious.".to_string(),
//!             photos: batch.photos,
//!             ..NewTribute::default()
//!         })
//!         .await
//!         .unwrap();
//!
//!     let page = service.list_tributes(None, None).await.unwrap();
//!     assert_eq!(page.items[0].id, record.id);
//! }
//! ```

pub mod cache;
pub mod config;
pub mod encode;
pub mod error;
pub mod model;
pub mod pagination;
pub mod records;
pub mod resolve;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use cache::{effective_ttl, TtlCache};
pub use config::{Cli, Command, Config, EncodeArgs};
pub use encode::{
    quality_candidates, EncodedPhoto, EncoderSettings, OutputFormat, PhotoEncoder, PhotoPipeline,
    PreparedBatch, UploadFailurePolicy,
};
pub use error::{EncodeError, MigrationError, RecordError, StorageError, StoreError};
pub use model::{
    GalleryItem, NewPhoto, NewTribute, PhotoDescriptor, PhotoSource, PhotoView, SourceView,
    TributeRecord, TributeView, UploadedFile,
};
pub use pagination::{Page, PageRequest, PageSettings};
pub use records::{MemoryRecordStore, RecordStore};
pub use resolve::{data_uri, PhotoResolver, UrlSigner};
pub use service::{
    CacheSettings, MigrationOptions, MigrationReport, ServiceSettings, TributeService,
};
pub use store::{
    create_s3_client, AclCapabilities, ObjectStore, PutObject, S3ObjectStore, StorageRouter,
    StoreSettings, StoredObject, UploadOptions,
};
