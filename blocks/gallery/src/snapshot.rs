//! Recovery snapshot of the pending set.
//!
//! A crash/reload aid only: last writer wins, nothing is merged.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::PendingImage;

/// Key under which a project's pending images are mirrored
pub fn snapshot_key(project_id: &str) -> String {
    format!("pendingImages_project_{}", project_id)
}

#[async_trait]
pub trait RecoverySnapshot: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<Vec<PendingImage>>, String>;

    async fn save(&self, key: &str, images: &[PendingImage]) -> Result<(), String>;

    async fn clear(&self, key: &str) -> Result<(), String>;

    async fn contains(&self, key: &str) -> Result<bool, String>;
}

/// Process-local snapshot, stored as the same JSON the durable stores keep
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    slots: Mutex<HashMap<String, String>>,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw JSON held for `key`
    pub fn raw(&self, key: &str) -> Option<String> {
        self.slots.lock().ok()?.get(key).cloned()
    }
}

#[async_trait]
impl RecoverySnapshot for MemorySnapshot {
    async fn load(&self, key: &str) -> Result<Option<Vec<PendingImage>>, String> {
        let raw = {
            let slots = self.slots.lock().map_err(|e| format!("snapshot lock poisoned: {}", e))?;
            slots.get(key).cloned()
        };
        match raw {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| format!("Failed to parse snapshot {}: {}", key, e)),
            None => Ok(None),
        }
    }

    async fn save(&self, key: &str, images: &[PendingImage]) -> Result<(), String> {
        let json = serde_json::to_string(images).map_err(|e| format!("Failed to serialize snapshot: {}", e))?;
        self.slots
            .lock()
            .map_err(|e| format!("snapshot lock poisoned: {}", e))?
            .insert(key.to_string(), json);
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), String> {
        self.slots
            .lock()
            .map_err(|e| format!("snapshot lock poisoned: {}", e))?
            .remove(key);
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, String> {
        Ok(self
            .slots
            .lock()
            .map_err(|e| format!("snapshot lock poisoned: {}", e))?
            .contains_key(key))
    }
}
