use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use tokio::sync::RwLock;

use super::RecordStore;
use crate::error::RecordError;
use crate::model::{NewTribute, PhotoDescriptor, TributeRecord};

#[derive(Default)]
struct MemoryState {
    next_tribute_id: u64,
    next_photo_id: u64,
    tributes: BTreeMap<u64, TributeRecord>,
}

/// In-memory [`RecordStore`].
#[derive(Default)]
pub struct MemoryRecordStore {
    state: RwLock<MemoryState>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist a tribute with an explicit creation time.
    pub async fn insert_tribute_at(
        &self,
        tribute: NewTribute,
        created_at: DateTime<Utc>,
    ) -> TributeRecord {
        let mut state = self.state.write().await;
        state.next_tribute_id += 1;
        let id = state.next_tribute_id;

        let mut photos = Vec::with_capacity(tribute.photos.len());
        for photo in tribute.photos {
            state.next_photo_id += 1;
            photos.push(PhotoDescriptor {
                id: state.next_photo_id,
                tribute_id: id,
                source: photo.source,
                content_type: photo.content_type,
                display_order: photo.display_order,
                caption: photo.caption,
                migrated_at: None,
            });
        }
        photos.sort_by_key(|p| (p.display_order, p.id));

        let record = TributeRecord {
            id,
            name: tribute.name,
            message: tribute.message,
            created_at,
            extra_fields: tribute.extra_fields,
            photos,
        };
        state.tributes.insert(id, record.clone());
        record
    }

    /// Number of stored tributes.
    pub async fn len(&self) -> usize {
        self.state.read().await.tributes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_tribute(&self, tribute: NewTribute) -> Result<TributeRecord, RecordError> {
        Ok(self.insert_tribute_at(tribute, Utc::now()).await)
    }

    async fn get_tribute(&self, id: u64) -> Result<Option<TributeRecord>, RecordError> {
        Ok(self.state.read().await.tributes.get(&id).cloned())
    }

    async fn delete_tribute(&self, id: u64) -> Result<Option<TributeRecord>, RecordError> {
        Ok(self.state.write().await.tributes.remove(&id))
    }

    async fn list_tributes(
        &self,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<TributeRecord>, RecordError> {
        let state = self.state.read().await;
        let mut records: Vec<&TributeRecord> = state.tributes.values().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        Ok(records
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn sample_photos(&self, limit: usize) -> Result<Vec<PhotoDescriptor>, RecordError> {
        let state = self.state.read().await;
        let mut photos: Vec<&PhotoDescriptor> = state
            .tributes
            .values()
            .flat_map(|t| t.photos.iter())
            .filter(|p| !p.source.is_empty())
            .collect();
        photos.shuffle(&mut rand::thread_rng());
        photos.truncate(limit);
        Ok(photos.into_iter().cloned().collect())
    }

    async fn inline_photos_after(
        &self,
        after_id: u64,
        limit: usize,
    ) -> Result<Vec<PhotoDescriptor>, RecordError> {
        let state = self.state.read().await;
        let mut photos: Vec<&PhotoDescriptor> = state
            .tributes
            .values()
            .flat_map(|t| t.photos.iter())
            .filter(|p| p.id > after_id && p.source.is_inline() && !p.source.is_empty())
            .collect();
        photos.sort_by_key(|p| p.id);
        photos.truncate(limit);
        Ok(photos.into_iter().cloned().collect())
    }

    async fn update_photo(&self, photo: &PhotoDescriptor) -> Result<(), RecordError> {
        let mut state = self.state.write().await;
        let tribute = state
            .tributes
            .get_mut(&photo.tribute_id)
            .ok_or(RecordError::NotFound(photo.tribute_id))?;
        let slot = tribute
            .photos
            .iter_mut()
            .find(|p| p.id == photo.id)
            .ok_or_else(|| RecordError::Backend(format!("photo {} not found", photo.id)))?;
        *slot = photo.clone();
        Ok(())
    }
}
