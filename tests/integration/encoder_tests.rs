//! Photo encoder integration tests.
//!
//! These tests cover the quality search under different byte budgets and the
//! supported input and output formats.

use image::{DynamicImage, ImageFormat};

use tribute_media::encode::{
    decode, normalize, quality_candidates, EncoderSettings, OutputFormat, PhotoEncoder,
};
use tribute_media::error::EncodeError;

use super::test_utils::{
    gradient_image, image_bytes, is_jpeg, is_webp, noisy_png_bytes, png_bytes, rgba_image,
};

/// Sizes produced at each candidate quality for `source`.
fn candidate_sizes(encoder: &PhotoEncoder, source: &[u8]) -> Vec<(u8, usize)> {
    let settings = encoder.settings();
    let image = normalize(decode(source).unwrap(), settings.format);
    quality_candidates(settings.quality, settings.min_quality)
        .into_iter()
        .map(|q| (q, encoder.encode_at(&image, q).unwrap().len()))
        .collect()
}

#[test]
fn test_candidate_sequence_shape() {
    for start in 1..=100u8 {
        for floor in 1..=100u8 {
            let levels = quality_candidates(start, floor);
            assert_eq!(*levels.last().unwrap(), floor);
            assert_eq!(levels[0], start.max(floor));
            assert!(levels.iter().all(|&q| q >= floor));
            for pair in levels.windows(2) {
                let step = pair[0] - pair[1];
                assert!(step > 0 && step <= 10);
                if pair[1] != floor {
                    assert_eq!(step, 10);
                }
            }
        }
    }
}

#[test]
fn test_unconstrained_budget_uses_initial_quality() {
    let source = png_bytes(64, 48);
    let encoder = PhotoEncoder::new(EncoderSettings::default().with_max_bytes(0));

    let encoded = encoder.encode(&source).unwrap();
    assert_eq!(encoded.quality, 85);
    assert!(is_webp(&encoded.payload));

    let image = normalize(decode(&source).unwrap(), OutputFormat::Webp);
    let expected = encoder.encode_at(&image, 85).unwrap();
    assert_eq!(encoded.payload, expected);
}

#[test]
fn test_returns_first_candidate_within_budget() {
    let source = noisy_png_bytes(96, 96);
    let probe = PhotoEncoder::new(EncoderSettings::default().with_max_bytes(0));
    let sizes = candidate_sizes(&probe, &source);

    // Budget that the top quality cannot meet but the floor can
    let (_, floor_size) = *sizes.last().unwrap();
    let (_, top_size) = sizes[0];
    assert!(floor_size < top_size);
    let budget = floor_size + (top_size - floor_size) / 2;

    let encoder = PhotoEncoder::new(EncoderSettings::default().with_max_bytes(budget));
    let encoded = encoder.encode(&source).unwrap();
    assert!(encoded.payload.len() <= budget);

    for &(quality, size) in &sizes {
        if quality == encoded.quality {
            assert_eq!(size, encoded.payload.len());
            break;
        }
        assert!(size > budget, "quality {} fit but was skipped", quality);
    }
}

#[test]
fn test_size_constraint_carries_smallest_payload() {
    let source = noisy_png_bytes(64, 64);
    let encoder = PhotoEncoder::new(EncoderSettings::default().with_max_bytes(16));

    match encoder.encode(&source) {
        Err(EncodeError::SizeConstraint { smallest, limit }) => {
            assert_eq!(limit, 16);
            assert!(!smallest.is_empty());
            assert!(smallest.len() > limit);

            let probe = PhotoEncoder::new(EncoderSettings::default().with_max_bytes(0));
            let min = candidate_sizes(&probe, &source)
                .into_iter()
                .map(|(_, size)| size)
                .min()
                .unwrap();
            assert_eq!(smallest.len(), min);
        }
        other => panic!("expected SizeConstraint, got {:?}", other.map(|e| e.quality)),
    }
}

#[test]
fn test_floor_only_search() {
    let source = png_bytes(32, 32);
    let settings = EncoderSettings::default()
        .with_quality(20, 40)
        .with_max_bytes(0);
    let encoded = PhotoEncoder::new(settings).encode(&source).unwrap();
    assert_eq!(encoded.quality, 40);
}

#[test]
fn test_jpeg_input_to_webp() {
    let jpeg = image_bytes(
        DynamicImage::ImageRgb8(gradient_image(40, 30)),
        ImageFormat::Jpeg,
    );
    let encoded = PhotoEncoder::default().encode(&jpeg).unwrap();
    assert!(is_webp(&encoded.payload));
    assert_eq!(encoded.content_type, "image/webp");
}

#[test]
fn test_bmp_and_tiff_inputs() {
    for format in [ImageFormat::Bmp, ImageFormat::Tiff] {
        let bytes = image_bytes(DynamicImage::ImageRgb8(gradient_image(16, 16)), format);
        assert!(PhotoEncoder::default().encode(&bytes).is_ok(), "{:?}", format);
    }
}

#[test]
fn test_alpha_input_to_jpeg() {
    let png = image_bytes(DynamicImage::ImageRgba8(rgba_image(24, 24)), ImageFormat::Png);
    let settings = EncoderSettings::default().with_format(OutputFormat::Jpeg);
    let encoded = PhotoEncoder::new(settings).encode(&png).unwrap();
    assert!(is_jpeg(&encoded.payload));
    assert_eq!(encoded.content_type, "image/jpeg");
}

#[test]
fn test_alpha_input_to_webp() {
    let png = image_bytes(DynamicImage::ImageRgba8(rgba_image(24, 24)), ImageFormat::Png);
    let encoded = PhotoEncoder::default().encode(&png).unwrap();
    assert!(is_webp(&encoded.payload));
}

#[test]
fn test_webp_dimension_limit_is_encode_error() {
    // libwebp caps each side at 16383 px
    let png = png_bytes(16_400, 1);
    let encoder = PhotoEncoder::new(EncoderSettings::default().with_max_bytes(0));

    match encoder.encode(&png) {
        Err(EncodeError::Encode { .. }) => {}
        other => panic!("Expected EncodeError, got {:?}", other),
    }

    let image = normalize(decode(&png).unwrap(), OutputFormat::Webp);
    assert!(matches!(
        encoder.encode_at(&image, 85),
        Err(EncodeError::Encode { .. })
    ));
}

#[test]
fn test_corrupt_input_is_decode_error() {
    let mut png = png_bytes(32, 32);
    png.truncate(png.len() / 3);
    assert!(matches!(
        PhotoEncoder::default().encode(&png),
        Err(EncodeError::Decode { .. })
    ));
    assert!(matches!(
        PhotoEncoder::default().encode(b"GIF89a but not really"),
        Err(EncodeError::Decode { .. })
    ));
}
