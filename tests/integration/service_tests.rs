//! Tribute service integration tests.
//!
//! These tests verify:
//! - Cached gallery sampling with de-duplication
//! - Listing pagination and first-page caching
//! - Synchronous invalidation on create and delete
//! - Cache lifetimes clamped below the signed-link lifetime
//! - Best-effort object deletion
//! - Inline to object-store migration

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tribute_media::model::PhotoSource;
use tribute_media::records::RecordStore;
use tribute_media::service::{
    CacheSettings, MigrationOptions, ServiceSettings, TributeService,
};
use tribute_media::store::StoreSettings;

use super::test_utils::{
    external_photo, inline_photo, mock_router, remote_photo, router_with, seed_tributes,
    tribute, CountingRecordStore, MockObjectStore,
};

fn service() -> (Arc<CountingRecordStore>, TributeService<CountingRecordStore>) {
    let records = Arc::new(CountingRecordStore::new());
    let service = TributeService::new(records.clone(), None, ServiceSettings::default());
    (records, service)
}

fn settings_with_ttls(gallery: i64, listing: i64) -> ServiceSettings {
    ServiceSettings {
        cache: CacheSettings {
            gallery_ttl_secs: gallery,
            listing_ttl_secs: listing,
        },
        ..ServiceSettings::default()
    }
}

/// One tribute holding `count` photos with distinct URLs.
async fn seed_photos(records: &CountingRecordStore, count: usize) {
    let photos = (0..count)
        .map(|i| external_photo(&format!("https://img.example.com/{}.webp", i), i as i32))
        .collect();
    records.insert_tribute(tribute("Gallery", photos)).await.unwrap();
}

// =============================================================================
// Gallery
// =============================================================================

#[tokio::test]
async fn test_gallery_caps_at_limit() {
    let (records, service) = service();
    seed_photos(&records, 10).await;

    let gallery = service.gallery(Some(8)).await.unwrap();
    assert_eq!(gallery.len(), 8);

    let unique: HashSet<_> = gallery.iter().map(|item| item.src.clone()).collect();
    assert_eq!(unique.len(), 8);
}

#[tokio::test]
async fn test_gallery_returns_what_exists() {
    let (records, service) = service();
    seed_photos(&records, 3).await;

    let gallery = service.gallery(Some(8)).await.unwrap();
    assert_eq!(gallery.len(), 3);

    let unique: HashSet<_> = gallery.iter().map(|item| item.photo_id).collect();
    assert_eq!(unique.len(), 3);
}

#[tokio::test]
async fn test_gallery_uses_default_size_and_alt_text() {
    let (records, service) = service();
    seed_photos(&records, 12).await;

    let gallery = service.gallery(None).await.unwrap();
    assert_eq!(gallery.len(), 8);
    for item in gallery.iter() {
        assert_eq!(item.alt, format!("Tribute photo {}", item.photo_id));
    }
}

#[tokio::test]
async fn test_gallery_deduplicates_same_image() {
    let (records, service) = service();
    let payload = b"same-bytes";
    records
        .insert_tribute(tribute(
            "Dupes",
            vec![
                inline_photo(payload, "image/webp", 0),
                inline_photo(payload, "image/png", 1),
                external_photo("https://img.example.com/x.webp", 2),
                external_photo("https://img.example.com/x.webp", 3),
                remote_photo("tributes/1/a.webp", 4),
                remote_photo("tributes/1/a.webp", 5),
            ],
        ))
        .await
        .unwrap();

    // Without a signer the remote key falls through to nothing
    let gallery = service.gallery(Some(8)).await.unwrap();
    assert_eq!(gallery.len(), 2);
    let sources: HashSet<_> = gallery.iter().map(|item| item.src.clone()).collect();
    assert_eq!(sources.len(), 2);
    assert!(sources.contains("https://img.example.com/x.webp"));
}

#[tokio::test]
async fn test_gallery_is_cached_per_limit() {
    let (records, service) = service();
    seed_photos(&records, 10).await;

    let first = service.gallery(Some(4)).await.unwrap();
    let second = service.gallery(Some(4)).await.unwrap();
    assert_eq!(records.sample_calls(), 1);
    assert_eq!(first, second);

    service.gallery(Some(5)).await.unwrap();
    assert_eq!(records.sample_calls(), 2);
}

#[tokio::test]
async fn test_disabled_gallery_cache_always_fetches() {
    let records = Arc::new(CountingRecordStore::new());
    let service = TributeService::new(records.clone(), None, settings_with_ttls(0, 30));
    seed_photos(&records, 3).await;

    service.gallery(None).await.unwrap();
    service.gallery(None).await.unwrap();
    assert_eq!(records.sample_calls(), 2);
    assert_eq!(service.gallery_ttl(), None);
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn test_listing_pagination() {
    let (records, service) = service();
    let ids = seed_tributes(records.inner(), 3).await;

    let page = service.list_tributes(Some(1), Some(2)).await.unwrap();
    let listed: Vec<u64> = page.items.iter().map(|t| t.id).collect();
    assert_eq!(listed, vec![ids[2], ids[1]]);
    assert!(page.has_next);
    assert!(!page.has_prev);
    assert_eq!(page.next_page, Some(2));
    assert_eq!(page.prev_page, None);

    let page = service.list_tributes(Some(2), Some(2)).await.unwrap();
    let listed: Vec<u64> = page.items.iter().map(|t| t.id).collect();
    assert_eq!(listed, vec![ids[0]]);
    assert!(!page.has_next);
    assert!(page.has_prev);
    assert_eq!(page.next_page, None);
    assert_eq!(page.prev_page, Some(1));
}

#[tokio::test]
async fn test_listing_clamps_page_size() {
    let (records, service) = service();
    seed_tributes(records.inner(), 40).await;

    let page = service.list_tributes(None, Some(1000)).await.unwrap();
    assert_eq!(page.per_page, 36);
    assert_eq!(page.items.len(), 36);
    assert!(page.has_next);

    let page = service.list_tributes(Some(0), Some(0)).await.unwrap();
    assert_eq!((page.page, page.per_page), (1, 1));
}

#[tokio::test]
async fn test_only_first_page_is_cached() {
    let (records, service) = service();
    seed_tributes(records.inner(), 5).await;

    service.list_tributes(Some(1), Some(2)).await.unwrap();
    service.list_tributes(Some(1), Some(2)).await.unwrap();
    assert_eq!(records.list_calls(), 1);

    service.list_tributes(Some(2), Some(2)).await.unwrap();
    service.list_tributes(Some(2), Some(2)).await.unwrap();
    assert_eq!(records.list_calls(), 3);
}

// =============================================================================
// Invalidation
// =============================================================================

#[tokio::test]
async fn test_invalidate_forces_recompute_within_ttl() {
    let (records, service) = service();
    seed_photos(&records, 5).await;
    seed_tributes(records.inner(), 2).await;

    service.gallery(None).await.unwrap();
    service.list_tributes(None, None).await.unwrap();
    service.gallery(None).await.unwrap();
    service.list_tributes(None, None).await.unwrap();
    assert_eq!(records.sample_calls(), 1);
    assert_eq!(records.list_calls(), 1);

    service.invalidate().await;

    service.gallery(None).await.unwrap();
    service.list_tributes(None, None).await.unwrap();
    assert_eq!(records.sample_calls(), 2);
    assert_eq!(records.list_calls(), 2);
}

#[tokio::test]
async fn test_create_is_visible_immediately() {
    let (records, service) = service();
    seed_tributes(records.inner(), 2).await;

    let before = service.list_tributes(None, None).await.unwrap();
    assert_eq!(before.items.len(), 2);

    let created = service
        .create_tribute(tribute("Newest", vec![external_photo("https://img/1.webp", 0)]))
        .await
        .unwrap();

    let after = service.list_tributes(None, None).await.unwrap();
    assert_eq!(after.items.len(), 3);
    assert_eq!(after.items[0].id, created.id);
    assert_eq!(records.list_calls(), 2);

    let gallery = service.gallery(None).await.unwrap();
    assert_eq!(gallery.len(), 1);
}

#[tokio::test]
async fn test_delete_is_visible_immediately() {
    let (records, service) = service();
    let ids = seed_tributes(records.inner(), 3).await;

    service.list_tributes(None, None).await.unwrap();
    service.delete_tribute(ids[2]).await.unwrap();

    let page = service.list_tributes(None, None).await.unwrap();
    assert_eq!(page.items.len(), 2);
    assert!(page.items.iter().all(|t| t.id != ids[2]));
}

#[tokio::test(start_paused = true)]
async fn test_snapshots_expire_after_ttl() {
    let records = Arc::new(CountingRecordStore::new());
    let service = TributeService::new(records.clone(), None, settings_with_ttls(60, 30));
    seed_tributes(records.inner(), 1).await;

    service.list_tributes(None, None).await.unwrap();
    tokio::time::advance(Duration::from_secs(29)).await;
    service.list_tributes(None, None).await.unwrap();
    assert_eq!(records.list_calls(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    service.list_tributes(None, None).await.unwrap();
    assert_eq!(records.list_calls(), 2);
}

// =============================================================================
// Signed Links
// =============================================================================

#[tokio::test]
async fn test_cache_ttl_clamped_below_signed_link_lifetime() {
    let store = Arc::new(MockObjectStore::new("mock://s3"));

    let router = router_with(
        &store,
        StoreSettings::new("photos").with_presigned_ttl(Duration::from_secs(90)),
    );
    let service = TributeService::new(
        Arc::new(CountingRecordStore::new()),
        Some(router),
        settings_with_ttls(200, 200),
    );
    assert_eq!(service.gallery_ttl(), Some(Duration::from_secs(75)));
    assert_eq!(service.listing_ttl(), Some(Duration::from_secs(75)));

    let router = router_with(
        &store,
        StoreSettings::new("photos").with_presigned_ttl(Duration::from_secs(20)),
    );
    let service = TributeService::new(
        Arc::new(CountingRecordStore::new()),
        Some(router),
        settings_with_ttls(200, 10),
    );
    assert_eq!(service.gallery_ttl(), Some(Duration::from_secs(15)));
    assert_eq!(service.listing_ttl(), Some(Duration::from_secs(10)));
}

#[tokio::test]
async fn test_listing_resolves_remote_photos_to_signed_links() {
    let (store, router) = mock_router();
    let records = Arc::new(CountingRecordStore::new());
    let service = TributeService::new(records.clone(), Some(router), ServiceSettings::default());

    service
        .create_tribute(tribute("Remote", vec![remote_photo("tributes/1/a.webp", 0)]))
        .await
        .unwrap();

    let page = service.list_tributes(None, None).await.unwrap();
    let src = page.items[0].photos[0].src.as_deref().unwrap();
    assert!(src.starts_with("https://signed.test/photos/tributes/1/a.webp"));

    // Cached snapshot: no new signing on a hit
    let signs = store.sign_count();
    service.list_tributes(None, None).await.unwrap();
    assert_eq!(store.sign_count(), signs);
}

// =============================================================================
// Deletion
// =============================================================================

#[tokio::test]
async fn test_delete_removes_stored_objects() {
    let (store, router) = mock_router();
    let records = Arc::new(CountingRecordStore::new());
    let service = TributeService::new(records.clone(), Some(router.clone()), ServiceSettings::default());

    let a = router
        .upload(bytes::Bytes::from_static(b"a"), "image/webp", Default::default())
        .await
        .unwrap();
    let record = service
        .create_tribute(tribute(
            "With objects",
            vec![
                remote_photo(&a.key, 0),
                remote_photo("tributes/already/gone.webp", 1),
                inline_photo(b"inline", "image/webp", 2),
            ],
        ))
        .await
        .unwrap();

    service.delete_tribute(record.id).await.unwrap();
    assert_eq!(store.object_count().await, 0);
    assert_eq!(store.delete_count(), 2);
    assert!(records.get_tribute(record.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_survives_object_store_failure() {
    let (store, router) = mock_router();
    let records = Arc::new(CountingRecordStore::new());
    let service = TributeService::new(records.clone(), Some(router), ServiceSettings::default());

    let record = service
        .create_tribute(tribute("Doomed", vec![remote_photo("tributes/1/a.webp", 0)]))
        .await
        .unwrap();

    store.set_fail_deletes(true);
    assert!(service.delete_tribute(record.id).await.is_ok());
    assert!(records.get_tribute(record.id).await.unwrap().is_none());
}

// =============================================================================
// Migration
// =============================================================================

#[tokio::test]
async fn test_migration_moves_inline_payloads() {
    let (store, router) = mock_router();
    let records = Arc::new(CountingRecordStore::new());
    let service = TributeService::new(records.clone(), Some(router), ServiceSettings::default());

    let record = service
        .create_tribute(tribute(
            "Legacy",
            vec![
                inline_photo(b"one", "image/jpeg", 0),
                inline_photo(b"two", "image/webp", 1),
                external_photo("https://img/x.webp", 2),
            ],
        ))
        .await
        .unwrap();

    let report = service
        .migrate_inline_photos(MigrationOptions {
            batch_size: 1,
            ..MigrationOptions::default()
        })
        .await
        .unwrap();

    assert_eq!(report.scanned, 2);
    assert_eq!(report.migrated, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.last_id, Some(record.photos[1].id));

    let migrated = records.get_tribute(record.id).await.unwrap().unwrap();
    for photo in &migrated.photos[..2] {
        let key = photo.source.remote_key().unwrap();
        assert!(key.starts_with(&format!("tributes/{}/", record.id)));
        assert!(photo.migrated_at.is_some());

        let object = store.object(key).await.unwrap();
        assert_eq!(object.metadata["photo_id"], photo.id.to_string());
        assert_eq!(object.metadata["tribute_id"], record.id.to_string());
    }
    assert!(migrated.photos[0].source.remote_key().unwrap().ends_with(".jpg"));
    assert!(migrated.photos[1].source.remote_key().unwrap().ends_with(".webp"));
    assert!(matches!(migrated.photos[2].source, PhotoSource::External { .. }));

    // Nothing left to migrate
    let again = service
        .migrate_inline_photos(MigrationOptions::default())
        .await
        .unwrap();
    assert_eq!(again.scanned, 0);
}

#[tokio::test]
async fn test_migration_dry_run_and_limit() {
    let (store, router) = mock_router();
    let records = Arc::new(CountingRecordStore::new());
    let service = TributeService::new(records.clone(), Some(router), ServiceSettings::default());

    service
        .create_tribute(tribute(
            "Legacy",
            (0..5).map(|i| inline_photo(&[i as u8 + 1], "image/webp", i)).collect(),
        ))
        .await
        .unwrap();

    let report = service
        .migrate_inline_photos(MigrationOptions {
            dry_run: true,
            limit: Some(3),
            batch_size: 2,
            ..MigrationOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(report.scanned, 3);
    assert_eq!(report.migrated, 0);
    assert_eq!(store.put_count(), 0);

    let report = service
        .migrate_inline_photos(MigrationOptions {
            min_id: 3,
            ..MigrationOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(report.migrated, 2);
    assert_eq!(report.last_id, Some(5));
}

#[tokio::test]
async fn test_migration_counts_upload_failures() {
    let (store, router) = mock_router();
    let records = Arc::new(CountingRecordStore::new());
    let service = TributeService::new(records.clone(), Some(router), ServiceSettings::default());

    let record = service
        .create_tribute(tribute("Legacy", vec![inline_photo(b"one", "image/webp", 0)]))
        .await
        .unwrap();

    store.set_fail_puts(true);
    let report = service
        .migrate_inline_photos(MigrationOptions::default())
        .await
        .unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.migrated, 0);

    let unchanged = records.get_tribute(record.id).await.unwrap().unwrap();
    assert!(unchanged.photos[0].source.is_inline());
}

#[tokio::test]
async fn test_migration_limit_counts_only_migrated_photos() {
    let (store, router) = mock_router();
    let records = Arc::new(CountingRecordStore::new());
    let service = TributeService::new(records.clone(), Some(router), ServiceSettings::default());

    service
        .create_tribute(tribute(
            "Legacy",
            (0..4).map(|i| inline_photo(&[i as u8 + 1], "image/webp", i)).collect(),
        ))
        .await
        .unwrap();

    store.fail_next_puts(1);
    let report = service
        .migrate_inline_photos(MigrationOptions {
            limit: Some(2),
            batch_size: 1,
            ..MigrationOptions::default()
        })
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.migrated, 2);
    assert_eq!(report.scanned, 3);
    assert_eq!(report.last_id, Some(3));
    assert_eq!(store.object_count().await, 2);
}
