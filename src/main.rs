//! Tribute Media - command-line tools.
//!
//! `check` validates configuration and object-store connectivity; `encode`
//! runs the photo encoder on a local file.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tribute_media::{
    config::{Cli, Command, Config, EncodeArgs},
    create_s3_client, EncodeError, PhotoEncoder, S3ObjectStore, StorageRouter, UploadOptions,
};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Check(config) => run_check(config).await,
        Command::Encode(args) => run_encode(args).await,
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "tribute_media=debug"
    } else {
        "tribute_media=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the storage router, `None` in inline-only mode.
async fn build_router(config: &Config) -> Option<StorageRouter> {
    let settings = config.store_settings()?;
    let client = create_s3_client(
        config.s3_endpoint.as_deref(),
        &config.s3_region,
        config.request_timeout(),
    )
    .await;
    let store = S3ObjectStore::new(client, config.endpoint_label());
    Some(StorageRouter::new(Arc::new(store), settings))
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: Config) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("Tribute Media Configuration Check");
    println!("═════════════════════════════════");
    println!();

    if let Err(e) = config.validate() {
        println!("✗ Configuration: {}", e);
        return ExitCode::FAILURE;
    }

    let encoder = config.encoder_settings();
    match encoder.max_bytes {
        Some(max) => println!(
            "✓ Encoder: {:?}, quality {}→{}, budget {:.2} MB",
            config.output_format,
            encoder.quality,
            encoder.min_quality,
            max as f64 / BYTES_PER_MB
        ),
        None => println!(
            "✓ Encoder: {:?}, quality {}→{}, no budget",
            config.output_format, encoder.quality, encoder.min_quality
        ),
    }

    let Some(bucket) = config.bucket() else {
        println!("✓ Storage: inline only (no bucket configured)");
        println!();
        println!("═════════════════════════════════");
        println!("✓ All checks passed!");
        return ExitCode::SUCCESS;
    };

    println!("✓ Bucket: {}", bucket);
    if let Some(ref endpoint) = config.s3_endpoint {
        println!("✓ Endpoint: {}", endpoint);
    }
    println!("✓ Region: {}", config.s3_region);
    match config.acl() {
        Some(acl) => println!("✓ ACL: {}", acl),
        None => println!("✓ ACL: none (owner-controlled bucket)"),
    }
    println!("✓ Signed links: {}s", config.presigned_ttl().as_secs());
    println!("✓ Upload failure policy: {:?}", config.upload_failure);
    println!();

    print!("Testing S3 connection... ");

    let client = create_s3_client(
        config.s3_endpoint.as_deref(),
        &config.s3_region,
        config.request_timeout(),
    )
    .await;

    match client.head_bucket().bucket(bucket).send().await {
        Ok(_) => {
            println!("✓ success");
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", aws_sdk_s3::error::DisplayErrorContext(&e));
            println!();
            println!("Please check:");
            println!("  - Your AWS credentials are configured correctly");
            println!("  - The bucket '{}' exists and is accessible", bucket);
            if config.s3_endpoint.is_some() {
                println!("  - The S3 endpoint is correct and reachable");
            }
            return ExitCode::FAILURE;
        }
    }

    println!();
    println!("═════════════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}

// =============================================================================
// Encode Command
// =============================================================================

async fn run_encode(args: EncodeArgs) -> ExitCode {
    let config = args.config;
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let source = match tokio::fs::read(&args.file).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to read {}: {}", args.file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let encoder = PhotoEncoder::new(config.encoder_settings());
    let encoded = match tokio::task::spawn_blocking(move || encoder.encode(&source)).await {
        Ok(Ok(encoded)) => encoded,
        Ok(Err(EncodeError::SizeConstraint { smallest, limit })) => {
            error!(
                "Cannot fit {} within {:.2} MB: smallest attempt was {:.2} MB",
                args.file.display(),
                limit as f64 / BYTES_PER_MB,
                smallest.len() as f64 / BYTES_PER_MB
            );
            return ExitCode::FAILURE;
        }
        Ok(Err(e)) => {
            error!("Failed to encode {}: {}", args.file.display(), e);
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!("Encoder task failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let size = encoded.payload.len();
    let mut stored = None;

    if args.upload {
        let Some(router) = build_router(&config).await else {
            error!("--upload needs a bucket. Set --s3-bucket or TRIBUTE_S3_BUCKET");
            return ExitCode::FAILURE;
        };

        let filename = args
            .file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let options = UploadOptions::default()
            .with_filename_hint(filename.as_str())
            .with_metadata("original_filename", filename.as_str());

        match router
            .upload(encoded.payload.clone(), encoded.content_type, options)
            .await
        {
            Ok(object) => stored = Some(object),
            Err(e) => {
                error!("Upload failed: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    if args.json {
        let json = serde_json::json!({
            "file": args.file.display().to_string(),
            "content_type": encoded.content_type,
            "quality": encoded.quality,
            "bytes": size,
            "key": stored.as_ref().map(|s| s.key.as_str()),
            "url": stored.as_ref().map(|s| s.url.as_str()),
        });
        match serde_json::to_string_pretty(&json) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                error!("Failed to render JSON: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("File: {}", args.file.display());
        println!("Content-Type: {}", encoded.content_type);
        println!("Quality: {}", encoded.quality);
        println!("Size: {:.2} MB ({} bytes)", size as f64 / BYTES_PER_MB, size);
        if let Some(ref object) = stored {
            println!("Key: {}", object.key);
            println!("URL: {}", object.url);
        }
    }

    ExitCode::SUCCESS
}
