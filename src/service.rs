//! Tribute service.
//!
//! The service is the entry point used by the presentation layer. It
//! orchestrates:
//! - Record creation and deletion (with synchronous cache invalidation)
//! - The cached random gallery sample
//! - The cached chronological listing
//! - Moving inline photos into object storage
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        TributeService                            │
//! │                                                                  │
//! │  create / delete ──► RecordStore ──► invalidate() ──► return     │
//! │                                                                  │
//! │  gallery / list ──► TtlCache ──miss──► RecordStore               │
//! │                        │                   │                     │
//! │                        │                   ▼                     │
//! │                        │            PhotoResolver ──► signer     │
//! │                        ▼                                         │
//! │               Arc<snapshot> returned                             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{effective_ttl, TtlCache};
use crate::error::{MigrationError, RecordError, StorageError};
use crate::model::{
    GalleryItem, NewTribute, PhotoDescriptor, PhotoSource, PhotoView, TributeRecord, TributeView,
};
use crate::pagination::{Page, PageRequest, PageSettings};
use crate::records::RecordStore;
use crate::resolve::PhotoResolver;
use crate::store::{extension_for_content_type, StorageRouter, UploadOptions};

/// Default gallery cache lifetime in seconds.
pub const DEFAULT_GALLERY_CACHE_TTL_SECS: i64 = 60;

/// Default listing cache lifetime in seconds.
pub const DEFAULT_LISTING_CACHE_TTL_SECS: i64 = 30;

/// Default number of photos in the gallery sample.
pub const DEFAULT_GALLERY_SIZE: usize = 8;

/// Default migration batch size.
pub const DEFAULT_MIGRATION_BATCH_SIZE: usize = 100;

const GALLERY_OVERSAMPLE: usize = 3;
const MIGRATED_EXTENSION: &str = ".webp";

// =============================================================================
// Settings
// =============================================================================

/// Configured cache lifetimes in seconds; zero or negative disables a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub gallery_ttl_secs: i64,
    pub listing_ttl_secs: i64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            gallery_ttl_secs: DEFAULT_GALLERY_CACHE_TTL_SECS,
            listing_ttl_secs: DEFAULT_LISTING_CACHE_TTL_SECS,
        }
    }
}

/// Read-path settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    pub cache: CacheSettings,
    pub pages: PageSettings,
    pub gallery_size: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            pages: PageSettings::default(),
            gallery_size: DEFAULT_GALLERY_SIZE,
        }
    }
}

/// Parameters of a migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOptions {
    pub batch_size: usize,
    /// Stop after this many photos are migrated (or would be, in a dry run).
    /// Failed photos do not count.
    pub limit: Option<usize>,
    /// Only photos with an id above this
    pub min_id: u64,
    /// Sleep between batches
    pub pause: Option<Duration>,
    /// Report what would be migrated without uploading
    pub dry_run: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_MIGRATION_BATCH_SIZE,
            limit: None,
            min_id: 0,
            pause: None,
            dry_run: false,
        }
    }
}

/// Outcome of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Inline photos examined
    pub scanned: usize,
    pub migrated: usize,
    pub failed: usize,
    /// Highest photo id examined
    pub last_id: Option<u64>,
}

// =============================================================================
// Tribute Service
// =============================================================================

/// Service for creating, reading and deleting tributes.
///
/// # Type Parameters
///
/// * `R` - The record store (database-backed in production)
///
/// # Example
///
/// ```ignore
/// let records = Arc::new(MemoryRecordStore::new());
/// let service = TributeService::new(records, Some(router), ServiceSettings::default());
///
/// let record = service.create_tribute(tribute).await?;
/// let gallery = service.gallery(None).await?;
/// ```
pub struct TributeService<R: RecordStore> {
    records: Arc<R>,
    router: Option<Arc<StorageRouter>>,
    resolver: PhotoResolver,
    gallery_cache: TtlCache<usize, Vec<GalleryItem>>,
    listing_cache: TtlCache<PageRequest, Page<TributeView>>,
    settings: ServiceSettings,
}

impl<R: RecordStore> TributeService<R> {
    /// Create a service.
    ///
    /// Cache lifetimes are clamped below the router's signed-link lifetime.
    pub fn new(
        records: Arc<R>,
        router: Option<Arc<StorageRouter>>,
        settings: ServiceSettings,
    ) -> Self {
        let presigned_secs = router
            .as_ref()
            .map(|r| i64::try_from(r.presigned_ttl().as_secs()).unwrap_or(i64::MAX));

        let gallery_ttl = effective_ttl(settings.cache.gallery_ttl_secs, presigned_secs);
        let listing_ttl = effective_ttl(settings.cache.listing_ttl_secs, presigned_secs);
        debug!(
            "Cache lifetimes: gallery {:?}, listing {:?}",
            gallery_ttl, listing_ttl
        );

        let resolver = match router {
            Some(ref router) => PhotoResolver::with_signer(router.clone()),
            None => PhotoResolver::new(),
        };

        Self {
            records,
            router,
            resolver,
            gallery_cache: TtlCache::new(gallery_ttl),
            listing_cache: TtlCache::new(listing_ttl),
            settings,
        }
    }

    pub fn records(&self) -> &Arc<R> {
        &self.records
    }

    pub fn resolver(&self) -> &PhotoResolver {
        &self.resolver
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Effective gallery cache lifetime.
    pub fn gallery_ttl(&self) -> Option<Duration> {
        self.gallery_cache.ttl()
    }

    /// Effective listing cache lifetime.
    pub fn listing_ttl(&self) -> Option<Duration> {
        self.listing_cache.ttl()
    }

    /// Drop every cached snapshot.
    pub async fn invalidate(&self) {
        self.gallery_cache.invalidate().await;
        self.listing_cache.invalidate().await;
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Persist a new tribute.
    ///
    /// Name and message are trimmed; phone and e-mail are folded into the
    /// extra fields. Photos without a payload are dropped. Caches are
    /// invalidated before this returns.
    pub async fn create_tribute(&self, tribute: NewTribute) -> Result<TributeRecord, RecordError> {
        let NewTribute {
            name,
            message,
            photos,
            phone,
            email,
            mut extra_fields,
        } = tribute;

        if let Some(phone) = phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            extra_fields.insert("phone".to_string(), phone.to_string());
        }
        if let Some(email) = email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            extra_fields.insert("email".to_string(), email.to_lowercase());
        }

        let photos: Vec<_> = photos.into_iter().filter(|p| !p.source.is_empty()).collect();

        let record = self
            .records
            .insert_tribute(NewTribute {
                name: name.trim().to_string(),
                message: message.trim().to_string(),
                photos,
                phone: None,
                email: None,
                extra_fields,
            })
            .await?;

        info!(
            "Created tribute {} with {} photos",
            record.id,
            record.photos.len()
        );

        self.invalidate().await;
        Ok(record)
    }

    /// Delete a tribute and, best effort, its stored objects.
    ///
    /// Object deletion failures are logged and never undo the record
    /// deletion. Caches are invalidated before this returns.
    pub async fn delete_tribute(&self, id: u64) -> Result<TributeRecord, RecordError> {
        let record = self
            .records
            .delete_tribute(id)
            .await?
            .ok_or(RecordError::NotFound(id))?;

        for key in record.photos.iter().filter_map(|p| p.source.remote_key()) {
            match self.router {
                Some(ref router) => {
                    if let Err(e) = router.delete(key, true).await {
                        warn!("Failed to delete object for tribute {}: {}", id, e);
                    }
                }
                None => warn!(
                    "Object storage is not configured; leaving {} in place",
                    key
                ),
            }
        }

        info!("Deleted tribute {}", id);
        self.invalidate().await;
        Ok(record)
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Random sample of unique, resolvable photos.
    ///
    /// `limit` defaults to the configured gallery size. Snapshots are cached
    /// per limit.
    pub async fn gallery(&self, limit: Option<usize>) -> Result<Arc<Vec<GalleryItem>>, RecordError> {
        let limit = limit.unwrap_or(self.settings.gallery_size);
        if limit == 0 {
            return Ok(Arc::new(Vec::new()));
        }

        self.gallery_cache
            .get_or_try_insert_with(limit, || self.sample_gallery(limit))
            .await
    }

    async fn sample_gallery(&self, limit: usize) -> Result<Vec<GalleryItem>, RecordError> {
        let pool_size = limit.saturating_mul(GALLERY_OVERSAMPLE).max(limit);
        let pool = self.records.sample_photos(pool_size).await?;

        let mut seen = HashSet::new();
        let mut items = Vec::with_capacity(limit);
        for photo in pool {
            if items.len() >= limit {
                break;
            }

            let Some(identity) = photo.view().identity() else {
                continue;
            };
            if !seen.insert(identity) {
                continue;
            }

            let Some(src) = self.resolver.resolve_photo(&photo).await else {
                continue;
            };
            items.push(GalleryItem {
                photo_id: photo.id,
                src,
                alt: alt_text(&photo),
            });
        }

        debug!("Sampled {} gallery photos", items.len());
        Ok(items)
    }

    /// One page of tributes, newest first.
    ///
    /// Only the first page is cached.
    pub async fn list_tributes(
        &self,
        page: Option<u32>,
        per_page: Option<u32>,
    ) -> Result<Arc<Page<TributeView>>, RecordError> {
        let request = PageRequest::new(page, per_page, &self.settings.pages);

        if request.page == 1 {
            self.listing_cache
                .get_or_try_insert_with(request, || self.load_page(request))
                .await
        } else {
            self.load_page(request).await.map(Arc::new)
        }
    }

    async fn load_page(&self, request: PageRequest) -> Result<Page<TributeView>, RecordError> {
        let rows = self
            .records
            .list_tributes(request.offset(), request.fetch_limit())
            .await?;
        let page = Page::from_rows(request, rows);

        let mut views = Vec::with_capacity(page.items.len());
        for record in &page.items {
            views.push(self.tribute_view(record).await);
        }
        Ok(page.with_items(views))
    }

    /// Presentation snapshot of a record with every photo resolved.
    ///
    /// Contact fields are not included.
    pub async fn tribute_view(&self, record: &TributeRecord) -> TributeView {
        let mut photos = Vec::with_capacity(record.photos.len());
        for photo in &record.photos {
            photos.push(PhotoView {
                id: photo.id,
                src: self.resolver.resolve_photo(photo).await,
                caption: photo.caption.clone(),
                display_order: photo.display_order,
            });
        }

        TributeView {
            id: record.id,
            name: record.name.clone(),
            message: record.message.clone(),
            created_at: record.created_at,
            photos,
        }
    }

    // -------------------------------------------------------------------------
    // Migration
    // -------------------------------------------------------------------------

    /// Move inline photo payloads into object storage.
    ///
    /// Photos are processed in ascending id order. A failed photo is logged
    /// and counted; only record-store failures abort the run.
    pub async fn migrate_inline_photos(
        &self,
        options: MigrationOptions,
    ) -> Result<MigrationReport, MigrationError> {
        let router = self.router.as_ref().ok_or(StorageError::NotConfigured)?;
        let batch_size = options.batch_size.max(1);
        let mut report = MigrationReport::default();
        let mut after_id = options.min_id;

        loop {
            let counted = if options.dry_run {
                report.scanned
            } else {
                report.migrated
            };
            let remaining = match options.limit {
                Some(limit) => limit.saturating_sub(counted),
                None => batch_size,
            };
            if remaining == 0 {
                break;
            }

            let requested = batch_size.min(remaining);
            let batch = self.records.inline_photos_after(after_id, requested).await?;
            if batch.is_empty() {
                break;
            }
            let exhausted = batch.len() < requested;

            for photo in batch {
                after_id = photo.id;
                report.scanned += 1;
                report.last_id = Some(photo.id);

                if options.dry_run {
                    info!(
                        "Would migrate photo {} of tribute {}",
                        photo.id, photo.tribute_id
                    );
                    continue;
                }

                if self.migrate_photo(router, photo).await {
                    report.migrated += 1;
                } else {
                    report.failed += 1;
                }
            }

            info!(
                "Migration progress: {} migrated, {} failed, last id {}",
                report.migrated, report.failed, after_id
            );

            if exhausted {
                break;
            }
            if let Some(pause) = options.pause.filter(|p| !p.is_zero()) {
                tokio::time::sleep(pause).await;
            }
        }

        if report.migrated > 0 {
            self.invalidate().await;
        }
        Ok(report)
    }

    async fn migrate_photo(&self, router: &StorageRouter, mut photo: PhotoDescriptor) -> bool {
        let PhotoSource::Inline { ref bytes } = photo.source else {
            return false;
        };

        let extension = extension_for_content_type(&photo.content_type)
            .unwrap_or_else(|| MIGRATED_EXTENSION.to_string());
        let key = format!(
            "{}tributes/{}/{}{}",
            router.settings().prefix,
            photo.tribute_id,
            Uuid::new_v4().simple(),
            extension
        );
        let options = UploadOptions::default()
            .with_object_key(key)
            .with_metadata("photo_id", photo.id)
            .with_metadata("tribute_id", photo.tribute_id);

        let stored = match router
            .upload(bytes.clone(), &photo.content_type, options)
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Failed to migrate photo {}: {}", photo.id, e);
                return false;
            }
        };

        let key = stored.key.clone();
        photo.mark_migrated(stored.key, stored.url, Utc::now());
        if let Err(e) = self.records.update_photo(&photo).await {
            warn!("Failed to record migration of photo {}: {}", photo.id, e);
            if let Err(e) = router.delete(&key, true).await {
                warn!("Failed to remove orphaned object {}: {}", key, e);
            }
            return false;
        }

        debug!("Migrated photo {} to {}", photo.id, key);
        true
    }
}

/// Caption, or a generic label when there is none.
fn alt_text(photo: &PhotoDescriptor) -> String {
    photo
        .caption
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Tribute photo {}", photo.id))
}
