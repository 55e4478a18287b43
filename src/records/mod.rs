//! Record persistence collaborator.
//!
//! Tribute records and their photo descriptors live in an external store
//! (a relational database in production). This module defines the narrow
//! contract the service needs from it and ships an in-memory implementation
//! used by tests and the CLI.

mod memory;

use async_trait::async_trait;

use crate::error::RecordError;
use crate::model::{NewTribute, PhotoDescriptor, TributeRecord};

pub use memory::MemoryRecordStore;

/// Persistence operations used by the tribute service.
///
/// Implementations must be thread-safe and own their own transactions; the
/// service never spans a transaction across calls.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a tribute with its photos and assign identifiers.
    ///
    /// `phone`/`email` on the input are ignored; contact details arrive
    /// already folded into `extra_fields`.
    async fn insert_tribute(&self, tribute: NewTribute) -> Result<TributeRecord, RecordError>;

    /// Fetch a tribute by id.
    async fn get_tribute(&self, id: u64) -> Result<Option<TributeRecord>, RecordError>;

    /// Remove a tribute and its photos, returning what was removed.
    async fn delete_tribute(&self, id: u64) -> Result<Option<TributeRecord>, RecordError>;

    /// Tributes ordered by `created_at` descending, ties by id descending.
    async fn list_tributes(&self, offset: u64, limit: u32)
        -> Result<Vec<TributeRecord>, RecordError>;

    /// Up to `limit` photos with a non-empty source, in random order.
    async fn sample_photos(&self, limit: usize) -> Result<Vec<PhotoDescriptor>, RecordError>;

    /// Inline photos with `id > after_id`, ascending by id.
    async fn inline_photos_after(
        &self,
        after_id: u64,
        limit: usize,
    ) -> Result<Vec<PhotoDescriptor>, RecordError>;

    /// Replace a stored photo descriptor.
    async fn update_photo(&self, photo: &PhotoDescriptor) -> Result<(), RecordError>;
}
