// In-memory file storage standing in for the real upload target
use crate::application::ports::{FileStorage, StoredVideo};
use crate::domain::upload::UploadFile;
use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct InMemoryFileStorage {
    next_id: AtomicU64,
    stored: Mutex<HashMap<String, StoredVideo>>,
}

impl InMemoryFileStorage {
    pub fn stored_count(&self) -> usize {
        self.stored.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl FileStorage for InMemoryFileStorage {
    fn preview_ref(&self, file: &UploadFile) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        format!("blob:stiv/{}/{}", id, file.name)
    }

    fn store(&self, file: &UploadFile, preview_ref: &str) -> anyhow::Result<StoredVideo> {
        let mut stored = self
            .stored
            .lock()
            .map_err(|_| anyhow!("file storage lock poisoned"))?;

        // Storing the same preview twice yields the same reference.
        if let Some(existing) = stored.get(preview_ref) {
            return Ok(existing.clone());
        }

        let video = StoredVideo {
            reference: format!("stiv://videos/{}/{}", stored.len() + 1, file.name),
            name: file.name.clone(),
        };
        stored.insert(preview_ref.to_string(), video.clone());
        tracing::debug!("Stored {} as {}", preview_ref, video.reference);
        Ok(video)
    }
}
