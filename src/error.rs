use bytes::Bytes;
use thiserror::Error;

/// Errors produced while turning an uploaded image into a size-bounded payload.
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    /// Input bytes are not a recognised image or are corrupt
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// No quality level down to the floor fits the byte budget.
    ///
    /// Carries the smallest payload produced so callers can report how far
    /// off the budget the image was.
    #[error("Cannot fit within {limit} bytes: smallest attempt was {} bytes", smallest.len())]
    SizeConstraint { smallest: Bytes, limit: usize },

    /// The codec rejected the decoded pixels
    #[error("Encode error: {message}")]
    Encode { message: String },
}

/// Errors reported by an object-store backend.
///
/// These are deliberately coarse: the storage router only needs to tell the
/// ACL capability failure and missing objects apart from everything else.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The bucket rejects access-control parameters on writes
    #[error("Access control lists are not supported by this bucket")]
    AccessControlUnsupported,

    /// Object does not exist
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Request failed (network, auth, service error)
    #[error("Request failed: {0}")]
    Request(String),

    /// Request exceeded the configured operation timeout
    #[error("Request timed out: {0}")]
    Timeout(String),
}

/// Errors surfaced by the storage router to its callers.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// No object store is configured; callers treat this as inline-only mode
    #[error("Object storage is not configured")]
    NotConfigured,

    /// Storage settings are present but unusable
    #[error("Invalid storage configuration: {0}")]
    InvalidConfig(String),

    /// Refused to upload an empty payload
    #[error("Payload must be non-empty")]
    EmptyPayload,

    /// Object key is empty
    #[error("Object key must be provided")]
    InvalidKey,

    /// Upload failed after the single ACL capability retry
    #[error("Failed to upload object {key:?}: {source}")]
    Upload {
        key: String,
        #[source]
        source: StoreError,
    },

    /// Delete failed for a reason other than a missing object
    #[error("Failed to delete object {key:?}: {source}")]
    Delete {
        key: String,
        #[source]
        source: StoreError,
    },

    /// Signed URL generation failed
    #[error("Failed to sign object {key:?}: {source}")]
    Sign {
        key: String,
        #[source]
        source: StoreError,
    },
}

/// Errors from the record persistence collaborator.
#[derive(Debug, Clone, Error)]
pub enum RecordError {
    /// No record with the given identifier
    #[error("Tribute not found: {0}")]
    NotFound(u64),

    /// Persistence layer failure
    #[error("Record store error: {0}")]
    Backend(String),
}

/// Errors that abort an inline → object-store migration run.
///
/// Individual photo failures are counted in the report instead.
#[derive(Debug, Clone, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Records(#[from] RecordError),
}
