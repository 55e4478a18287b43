//! Configuration management for Tribute Media.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `TRIBUTE_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use tribute_media::config::{Cli, Command};
//!
//! let cli = Cli::parse();
//! if let Command::Check(config) = cli.command {
//!     println!("Storage: {:?}", config.store_settings());
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `TRIBUTE_S3_BUCKET` - Bucket for photos (absent: inline-only mode)
//! - `TRIBUTE_S3_PREFIX` - Key namespace inside the bucket
//! - `TRIBUTE_S3_PUBLIC_BASE_URL` - Public URL base replacing the S3 URL template
//! - `TRIBUTE_S3_REGION` - AWS region (default: us-east-1)
//! - `TRIBUTE_S3_ENDPOINT` - Custom endpoint for S3-compatible services
//! - `TRIBUTE_S3_ACL` - Canned ACL sent with uploads (default: public-read)
//! - `TRIBUTE_S3_USE_OAC` - Never send an ACL (owner-controlled buckets)
//! - `TRIBUTE_PRESIGNED_TTL` - Signed-link lifetime in seconds (default: 300)
//! - `TRIBUTE_REQUEST_TIMEOUT` - Object-store operation timeout in seconds (default: 30)
//! - `TRIBUTE_MAX_UPLOAD_BYTES` - Encoded photo budget, 0 for none (default: 1 MiB)
//! - `TRIBUTE_PHOTO_QUALITY` / `TRIBUTE_MIN_QUALITY` - Quality search bounds (default: 85 / 30)
//! - `TRIBUTE_OUTPUT_FORMAT` - `webp` or `jpeg` (default: webp)
//! - `TRIBUTE_UPLOAD_FAILURE` - `inline` or `drop` (default: inline)
//! - `TRIBUTE_GALLERY_CACHE_TTL` / `TRIBUTE_LISTING_CACHE_TTL` - Cache lifetimes (default: 60 / 30)
//! - `TRIBUTE_GALLERY_SIZE` - Photos in the gallery sample (default: 8)
//! - `TRIBUTE_PAGE_SIZE` / `TRIBUTE_MAX_PAGE_SIZE` - Listing page bounds (default: 12 / 3x)

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::encode::{
    EncoderSettings, OutputFormat, UploadFailurePolicy, DEFAULT_MAX_UPLOAD_BYTES,
    DEFAULT_MIN_QUALITY, DEFAULT_PHOTO_QUALITY, MAX_QUALITY,
};
use crate::pagination::{PageSettings, DEFAULT_PAGE_SIZE};
use crate::service::{
    CacheSettings, ServiceSettings, DEFAULT_GALLERY_CACHE_TTL_SECS, DEFAULT_GALLERY_SIZE,
    DEFAULT_LISTING_CACHE_TTL_SECS,
};
use crate::store::{
    StoreSettings, DEFAULT_PRESIGNED_TTL_SECS, DEFAULT_PUBLIC_ACL, DEFAULT_REQUEST_TIMEOUT_SECS,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

// =============================================================================
// CLI Arguments
// =============================================================================

/// Tribute Media - photo encoding and storage for tribute walls.
#[derive(Parser, Debug, Clone)]
#[command(name = "tribute-media")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Validate configuration and probe the object store
    Check(Config),

    /// Encode a local image under the configured budget
    Encode(EncodeArgs),
}

/// Arguments of the `encode` command.
#[derive(Args, Debug, Clone)]
pub struct EncodeArgs {
    /// Image file to encode
    pub file: PathBuf,

    /// Upload the encoded payload to the configured bucket
    #[arg(long, default_value_t = false)]
    pub upload: bool,

    /// Print the result as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[command(flatten)]
    pub config: Config,
}

/// Shared configuration.
#[derive(Args, Debug, Clone)]
pub struct Config {
    // =========================================================================
    // S3 Configuration
    // =========================================================================
    /// S3 bucket for photos. Without one, photos are stored inline.
    #[arg(long, env = "TRIBUTE_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Key prefix inside the bucket.
    #[arg(long, default_value = "", env = "TRIBUTE_S3_PREFIX")]
    pub s3_prefix: String,

    /// Public base URL (e.g. a CDN) used instead of the S3 URL template.
    #[arg(long, env = "TRIBUTE_S3_PUBLIC_BASE_URL")]
    pub s3_public_base_url: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "TRIBUTE_S3_REGION")]
    pub s3_region: String,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "TRIBUTE_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// Canned ACL sent with uploads.
    #[arg(long, default_value = DEFAULT_PUBLIC_ACL, env = "TRIBUTE_S3_ACL")]
    pub s3_acl: String,

    /// Bucket is owner-controlled (origin access control); never send an ACL.
    #[arg(long, default_value_t = false, env = "TRIBUTE_S3_USE_OAC")]
    pub s3_use_oac: bool,

    /// Lifetime of signed links in seconds. Zero or negative uses the default.
    #[arg(
        long,
        default_value_t = DEFAULT_PRESIGNED_TTL_SECS as i64,
        env = "TRIBUTE_PRESIGNED_TTL",
        allow_hyphen_values = true
    )]
    pub presigned_ttl: i64,

    /// Object-store operation timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS, env = "TRIBUTE_REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    // =========================================================================
    // Encoder Configuration
    // =========================================================================
    /// Byte budget for an encoded photo. Zero disables the limit.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "TRIBUTE_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    /// Starting quality (1-100).
    #[arg(long, default_value_t = DEFAULT_PHOTO_QUALITY, env = "TRIBUTE_PHOTO_QUALITY")]
    pub photo_quality: u8,

    /// Lowest quality tried (1-100).
    #[arg(long, default_value_t = DEFAULT_MIN_QUALITY, env = "TRIBUTE_MIN_QUALITY")]
    pub min_quality: u8,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Webp, env = "TRIBUTE_OUTPUT_FORMAT")]
    pub output_format: OutputFormat,

    /// What to do with a photo whose upload failed.
    #[arg(
        long,
        value_enum,
        default_value_t = UploadFailurePolicy::Inline,
        env = "TRIBUTE_UPLOAD_FAILURE"
    )]
    pub upload_failure: UploadFailurePolicy,

    // =========================================================================
    // Read Path Configuration
    // =========================================================================
    /// Gallery cache lifetime in seconds. Zero or negative disables it.
    #[arg(
        long,
        default_value_t = DEFAULT_GALLERY_CACHE_TTL_SECS,
        env = "TRIBUTE_GALLERY_CACHE_TTL",
        allow_hyphen_values = true
    )]
    pub gallery_cache_ttl: i64,

    /// Listing cache lifetime in seconds. Zero or negative disables it.
    #[arg(
        long,
        default_value_t = DEFAULT_LISTING_CACHE_TTL_SECS,
        env = "TRIBUTE_LISTING_CACHE_TTL",
        allow_hyphen_values = true
    )]
    pub listing_cache_ttl: i64,

    /// Number of photos in the gallery sample.
    #[arg(long, default_value_t = DEFAULT_GALLERY_SIZE, env = "TRIBUTE_GALLERY_SIZE")]
    pub gallery_size: usize,

    /// Default listing page size.
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, env = "TRIBUTE_PAGE_SIZE")]
    pub page_size: u32,

    /// Largest page size a request may ask for (default: 3x page size).
    #[arg(long, env = "TRIBUTE_MAX_PAGE_SIZE")]
    pub max_page_size: Option<u32>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.photo_quality == 0 || self.photo_quality > MAX_QUALITY {
            return Err("photo_quality must be between 1 and 100".to_string());
        }
        if self.min_quality == 0 || self.min_quality > MAX_QUALITY {
            return Err("min_quality must be between 1 and 100".to_string());
        }
        if self.min_quality > self.photo_quality {
            return Err("min_quality must not exceed photo_quality".to_string());
        }

        if self.request_timeout == 0 {
            return Err("request_timeout must be greater than 0".to_string());
        }

        if self.page_size == 0 {
            return Err("page_size must be greater than 0".to_string());
        }
        if self.gallery_size == 0 {
            return Err("gallery_size must be greater than 0".to_string());
        }

        if let Some(ref bucket) = self.s3_bucket {
            if bucket.trim().is_empty() {
                return Err(
                    "S3 bucket name is empty. Unset TRIBUTE_S3_BUCKET for inline-only mode"
                        .to_string(),
                );
            }
        }

        if let Some(ref endpoint) = self.s3_endpoint {
            let parsed =
                url::Url::parse(endpoint).map_err(|e| format!("Invalid S3 endpoint: {}", e))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err("S3 endpoint must use http or https".to_string());
            }
        }

        if !self.s3_use_oac && self.s3_acl.trim().is_empty() {
            return Err(
                "s3_acl is empty. Use --s3-use-oac for buckets that reject ACLs".to_string(),
            );
        }

        Ok(())
    }

    /// Bucket name, if object storage is configured.
    pub fn bucket(&self) -> Option<&str> {
        self.s3_bucket
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
    }

    /// Canned ACL to send, `None` for owner-controlled buckets.
    pub fn acl(&self) -> Option<String> {
        if self.s3_use_oac {
            return None;
        }
        Some(self.s3_acl.trim().to_string()).filter(|a| !a.is_empty())
    }

    /// Signed-link lifetime.
    pub fn presigned_ttl(&self) -> Duration {
        match u64::try_from(self.presigned_ttl) {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => Duration::from_secs(DEFAULT_PRESIGNED_TTL_SECS),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Label identifying the object-store endpoint.
    pub fn endpoint_label(&self) -> String {
        match self.s3_endpoint {
            Some(ref endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("s3.{}.amazonaws.com", self.s3_region),
        }
    }

    /// Storage router settings, `None` in inline-only mode.
    pub fn store_settings(&self) -> Option<StoreSettings> {
        let bucket = self.bucket()?;
        let mut settings = StoreSettings::new(bucket)
            .with_prefix(&self.s3_prefix)
            .with_region(self.s3_region.clone())
            .with_acl(self.acl())
            .with_presigned_ttl(self.presigned_ttl());
        if let Some(ref base_url) = self.s3_public_base_url {
            settings = settings.with_public_base_url(base_url.clone());
        }
        Some(settings)
    }

    pub fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings::default()
            .with_quality(self.photo_quality, self.min_quality)
            .with_max_bytes(self.max_upload_bytes)
            .with_format(self.output_format)
    }

    pub fn page_settings(&self) -> PageSettings {
        let settings = PageSettings::new(self.page_size);
        match self.max_page_size {
            Some(max) => settings.with_max_size(max),
            None => settings,
        }
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            cache: CacheSettings {
                gallery_ttl_secs: self.gallery_cache_ttl,
                listing_ttl_secs: self.listing_cache_ttl,
            },
            pages: self.page_settings(),
            gallery_size: self.gallery_size,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
