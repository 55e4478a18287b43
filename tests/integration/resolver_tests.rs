//! Photo source resolver integration tests.

use std::sync::Arc;

use bytes::Bytes;

use tribute_media::model::{PhotoDescriptor, PhotoSource, SourceView};
use tribute_media::resolve::PhotoResolver;

use super::test_utils::mock_router;

const PAYLOAD: &[u8] = b"\x00\x01webp";
const PAYLOAD_B64: &str = "AAF3ZWJw";

fn all_sources() -> SourceView<'static> {
    SourceView::default()
        .with_key("tributes/1/a.webp")
        .with_url("https://cdn.example.com/a.webp")
        .with_inline(PAYLOAD, "image/png")
}

#[tokio::test]
async fn test_signed_url_wins_with_working_signer() {
    let (store, router) = mock_router();
    let resolver = PhotoResolver::with_signer(router);

    let src = resolver.resolve(all_sources()).await.unwrap();
    assert_eq!(src, "https://signed.test/photos/tributes/1/a.webp?expires=300");
    assert_eq!(store.sign_count(), 1);
}

#[tokio::test]
async fn test_signing_failure_falls_back_to_url() {
    let (store, router) = mock_router();
    store.set_fail_signing(true);
    let resolver = PhotoResolver::with_signer(router);

    let src = resolver.resolve(all_sources()).await.unwrap();
    assert_eq!(src, "https://cdn.example.com/a.webp");
}

#[tokio::test]
async fn test_signing_failure_without_url_falls_back_to_inline() {
    let (store, router) = mock_router();
    store.set_fail_signing(true);
    let resolver = PhotoResolver::with_signer(router);

    let view = SourceView::default()
        .with_key("tributes/1/a.webp")
        .with_inline(PAYLOAD, "image/png");
    let src = resolver.resolve(view).await.unwrap();
    assert_eq!(src, format!("data:image/png;base64,{}", PAYLOAD_B64));
}

#[tokio::test]
async fn test_remote_descriptor_prefers_key_over_stale_url() {
    let (_store, router) = mock_router();
    let resolver = PhotoResolver::with_signer(router);

    let photo = PhotoDescriptor {
        id: 9,
        tribute_id: 3,
        source: PhotoSource::Remote {
            key: "tributes/3/new.webp".into(),
            url: Some("https://old-bucket.example.com/stale.webp".into()),
        },
        content_type: "image/webp".into(),
        display_order: 0,
        caption: None,
        migrated_at: None,
    };

    let src = resolver.resolve_photo(&photo).await.unwrap();
    assert!(src.starts_with("https://signed.test/photos/tributes/3/new.webp"));
}

#[tokio::test]
async fn test_inline_descriptor() {
    let resolver = PhotoResolver::new();
    let photo = PhotoDescriptor {
        id: 1,
        tribute_id: 1,
        source: PhotoSource::Inline {
            bytes: Bytes::from_static(PAYLOAD),
        },
        content_type: "image/webp".into(),
        display_order: 0,
        caption: None,
        migrated_at: None,
    };

    let src = resolver.resolve_photo(&photo).await.unwrap();
    assert_eq!(src, format!("data:image/webp;base64,{}", PAYLOAD_B64));
}

#[tokio::test]
async fn test_concurrent_resolution() {
    let (store, router) = mock_router();
    let resolver = Arc::new(PhotoResolver::with_signer(router));

    let mut handles = Vec::new();
    for i in 0..16 {
        let resolver = resolver.clone();
        handles.push(tokio::spawn(async move {
            let key = format!("k/{}.webp", i);
            resolver.resolve(SourceView::default().with_key(&key)).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_some());
    }
    assert_eq!(store.sign_count(), 16);
}
