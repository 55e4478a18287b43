//! Size-bounded photo encoder.
//!
//! Decodes an uploaded image of any supported format and re-encodes it,
//! walking quality down from a starting level to a floor until the payload
//! fits the byte budget.
//!
//! # Design Decisions
//!
//! - **No resizing**: Images keep their native dimensions. Only the format and
//!   the quality level change.
//!
//! - **Deterministic search**: Candidate qualities step down by 10 and always
//!   finish exactly on the floor, so at most a handful of encodes run per
//!   photo.
//!
//! - **Smallest attempt is kept**: When nothing fits, the smallest payload is
//!   returned inside the error so the caller can say how close it came.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};

use crate::error::EncodeError;

/// Default starting quality.
pub const DEFAULT_PHOTO_QUALITY: u8 = 85;

/// Default quality floor.
pub const DEFAULT_MIN_QUALITY: u8 = 30;

/// Default byte budget for an encoded photo: 1 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 1024 * 1024;

/// Maximum quality level.
pub const MAX_QUALITY: u8 = 100;

const QUALITY_STEP: u8 = 10;

// =============================================================================
// Output Format
// =============================================================================

/// Compressed format produced by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Lossy WebP (keeps alpha)
    #[default]
    Webp,
    /// Baseline JPEG (alpha is flattened)
    Jpeg,
}

impl OutputFormat {
    /// MIME type of payloads in this format.
    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Webp => "image/webp",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Encoder constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    /// First quality level tried (clamped to 100)
    pub quality: u8,
    /// Lowest quality level ever tried
    pub min_quality: u8,
    /// Byte budget; `None` or `Some(0)` means unconstrained
    pub max_bytes: Option<usize>,
    pub format: OutputFormat,
}

impl EncoderSettings {
    /// Set the byte budget. Zero means unconstrained.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = (max_bytes > 0).then_some(max_bytes);
        self
    }

    pub fn with_quality(mut self, quality: u8, min_quality: u8) -> Self {
        self.quality = quality;
        self.min_quality = min_quality;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            quality: DEFAULT_PHOTO_QUALITY,
            min_quality: DEFAULT_MIN_QUALITY,
            max_bytes: Some(DEFAULT_MAX_UPLOAD_BYTES),
            format: OutputFormat::Webp,
        }
    }
}

/// Output of a successful encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPhoto {
    pub payload: Bytes,
    /// Quality level that produced `payload`
    pub quality: u8,
    pub content_type: &'static str,
}

// =============================================================================
// Photo Encoder
// =============================================================================

/// Decodes arbitrary images and re-encodes them under a byte budget.
///
/// # Example
///
/// ```ignore
/// use tribute_media::encode::{EncoderSettings, PhotoEncoder};
///
/// let encoder = PhotoEncoder::new(EncoderSettings::default().with_max_bytes(400_000));
/// let encoded = encoder.encode(&uploaded_bytes)?;
/// println!("quality {} -> {} bytes", encoded.quality, encoded.payload.len());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PhotoEncoder {
    settings: EncoderSettings,
}

impl PhotoEncoder {
    pub fn new(settings: EncoderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EncoderSettings {
        &self.settings
    }

    /// Decode `source` and encode it under the configured budget.
    ///
    /// # Errors
    ///
    /// - [`EncodeError::Decode`] if the bytes are not a recognised image
    /// - [`EncodeError::SizeConstraint`] if even the floor quality is too big
    /// - [`EncodeError::Encode`] if the codec fails at every quality level
    pub fn encode(&self, source: &[u8]) -> Result<EncodedPhoto, EncodeError> {
        let image = decode(source)?;
        self.encode_image(&normalize(image, self.settings.format))
    }

    /// Run the quality search over a decoded image.
    ///
    /// The image is expected in the layout produced by [`normalize`].
    pub fn encode_image(&self, image: &DynamicImage) -> Result<EncodedPhoto, EncodeError> {
        let settings = &self.settings;
        let max_bytes = settings.max_bytes.filter(|&max| max > 0);
        let mut smallest: Option<Bytes> = None;
        let mut last_error = None;

        for quality in quality_candidates(settings.quality, settings.min_quality) {
            let payload = match self.encode_at(image, quality) {
                Ok(payload) if !payload.is_empty() => payload,
                Ok(_) => continue,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };

            if smallest.as_ref().map_or(true, |s| payload.len() < s.len()) {
                smallest = Some(payload.clone());
            }

            let fits = max_bytes.map_or(true, |max| payload.len() <= max);
            if fits {
                return Ok(EncodedPhoto {
                    payload,
                    quality,
                    content_type: settings.format.content_type(),
                });
            }
        }

        match (smallest, max_bytes) {
            (Some(smallest), Some(limit)) => Err(EncodeError::SizeConstraint { smallest, limit }),
            _ => Err(last_error.unwrap_or_else(|| EncodeError::Encode {
                message: "encoder produced no output".to_string(),
            })),
        }
    }

    /// Encode at exactly one quality level.
    pub fn encode_at(&self, image: &DynamicImage, quality: u8) -> Result<Bytes, EncodeError> {
        let quality = quality.min(MAX_QUALITY);

        match self.settings.format {
            OutputFormat::Webp => {
                let width = image.width();
                let height = image.height();
                let encoder = match image {
                    DynamicImage::ImageRgba8(buf) => {
                        webp::Encoder::from_rgba(buf.as_raw(), width, height)
                    }
                    DynamicImage::ImageRgb8(buf) => {
                        webp::Encoder::from_rgb(buf.as_raw(), width, height)
                    }
                    other => {
                        return Err(EncodeError::Encode {
                            message: format!("unsupported color layout {:?}", other.color()),
                        })
                    }
                };
                let memory = encoder
                    .encode_simple(false, f32::from(quality))
                    .map_err(|e| EncodeError::Encode {
                        message: format!("webp encoding failed: {:?}", e),
                    })?;
                Ok(Bytes::copy_from_slice(&memory))
            }
            OutputFormat::Jpeg => {
                let mut output = Vec::new();
                let encoder = JpegEncoder::new_with_quality(&mut output, quality.max(1));
                image
                    .write_with_encoder(encoder)
                    .map_err(|e| EncodeError::Encode {
                        message: e.to_string(),
                    })?;
                Ok(Bytes::from(output))
            }
        }
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Decode bytes of any enabled image format.
pub fn decode(source: &[u8]) -> Result<DynamicImage, EncodeError> {
    let reader = ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(|e| EncodeError::Decode {
            message: e.to_string(),
        })?;

    if reader.format().is_none() {
        return Err(EncodeError::Decode {
            message: "unrecognised image format".to_string(),
        });
    }

    reader.decode().map_err(|e| EncodeError::Decode {
        message: e.to_string(),
    })
}

/// Convert to 8-bit RGBA when the image has alpha (and the format keeps it),
/// otherwise to 8-bit RGB.
pub fn normalize(image: DynamicImage, format: OutputFormat) -> DynamicImage {
    let keep_alpha = image.color().has_alpha() && format == OutputFormat::Webp;
    match image {
        DynamicImage::ImageRgba8(_) if keep_alpha => image,
        DynamicImage::ImageRgb8(_) if !keep_alpha => image,
        other if keep_alpha => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Descending quality levels from `start` to `floor`.
///
/// Steps down by 10 and always ends exactly on `floor`; a start at or below
/// the floor yields only the floor.
///
/// ```
/// use tribute_media::encode::quality_candidates;
///
/// assert_eq!(quality_candidates(85, 30), vec![85, 75, 65, 55, 45, 35, 30]);
/// assert_eq!(quality_candidates(20, 30), vec![30]);
/// ```
pub fn quality_candidates(start: u8, floor: u8) -> Vec<u8> {
    let start = start.min(MAX_QUALITY);
    let floor = floor.min(MAX_QUALITY);
    if start <= floor {
        return vec![floor];
    }

    let mut levels = Vec::new();
    let mut current = start;
    while current > floor {
        levels.push(current);
        current = current.saturating_sub(QUALITY_STEP).max(floor);
    }
    levels.push(floor);
    levels
}

// =============================================================================
// Tests
// =============================================================================
