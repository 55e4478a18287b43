use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;

use super::{ObjectStore, PutObject};
use crate::error::StoreError;

const ACL_NOT_SUPPORTED_CODE: &str = "AccessControlListNotSupported";

/// S3-backed implementation of [`ObjectStore`].
///
/// Works with AWS S3 and S3-compatible services (MinIO, R2, ...).
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    endpoint: String,
}

impl S3ObjectStore {
    /// Wrap a client.
    ///
    /// `endpoint` labels the service this client talks to, e.g. the custom
    /// endpoint URL or `s3.{region}.amazonaws.com`.
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Get the underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, request: &PutObject) -> Result<(), StoreError> {
        let mut put = self
            .client
            .put_object()
            .bucket(&request.bucket)
            .key(&request.key)
            .body(ByteStream::from(request.body.clone()))
            .content_type(&request.content_type);

        if let Some(ref cache_control) = request.cache_control {
            put = put.cache_control(cache_control);
        }
        if let Some(ref acl) = request.acl {
            put = put.acl(ObjectCannedAcl::from(acl.as_str()));
        }
        if !request.metadata.is_empty() {
            put = put.set_metadata(Some(request.metadata.clone()));
        }

        put.send().await.map(|_| ()).map_err(|e| classify(e, &request.key))
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify(e, key))
    }

    async fn sign(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String, StoreError> {
        let config =
            PresigningConfig::expires_in(ttl).map_err(|e| StoreError::Request(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| classify(e, key))?;

        Ok(presigned.uri().to_string())
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Map an SDK error onto the coarse store taxonomy.
fn classify<E>(err: SdkError<E, HttpResponse>, key: &str) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    if matches!(err, SdkError::TimeoutError(_)) {
        return StoreError::Timeout(format!("{}", DisplayErrorContext(&err)));
    }

    let code = err.as_service_error().and_then(|se| se.code());
    if code == Some(ACL_NOT_SUPPORTED_CODE) {
        return StoreError::AccessControlUnsupported;
    }
    if matches!(code, Some("NoSuchKey") | Some("NotFound")) {
        return StoreError::NotFound(key.to_string());
    }

    let status_is_404 = err
        .raw_response()
        .map(|r| r.status().as_u16() == 404)
        .unwrap_or(false);
    if status_is_404 {
        return StoreError::NotFound(key.to_string());
    }

    StoreError::Request(format!("{}", DisplayErrorContext(&err)))
}

/// Create an S3 client with optional custom endpoint, region and an
/// operation timeout.
///
/// Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1", Duration::from_secs(30)).await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str, timeout: Duration) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let timeouts = aws_config::timeout::TimeoutConfig::builder()
        .operation_timeout(timeout)
        .build();
    let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(region)
        .timeout_config(timeouts);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // For S3-compatible services, we often need to use path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
