use std::sync::Arc;

use crate::config::GalleryConfig;
use crate::error::{GalleryError, Result, ValidationError};
use crate::snapshot::{snapshot_key, RecoverySnapshot};
use crate::types::{PendingImage, SelectedFile};

/// Result of staging a batch of files
#[derive(Debug, Default)]
pub struct AddFilesOutcome {
    pub accepted: Vec<PendingImage>,
    pub rejected: Vec<ValidationError>,
}

/// How a list of provider URLs landed on the in-flight entries
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchResolution {
    /// `(local_id, url)` pairs that transitioned to uploaded
    pub resolved: Vec<(String, String)>,
    /// Entries still waiting for a URL
    pub unresolved: Vec<String>,
    /// URLs with no entry left to receive them
    pub unmatched: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedImage {
    pub image: PendingImage,
    /// Position in the provider queue if the file had not been uploaded yet
    pub queue_index: Option<usize>,
}

/// Reject anything that is not a non-empty image within the size limit
pub fn validate_file(file: &SelectedFile, config: &GalleryConfig) -> std::result::Result<(), ValidationError> {
    if file.bytes.is_empty() {
        return Err(ValidationError::EmptyFile {
            file_name: file.name.clone(),
        });
    }
    if file.size() > config.max_file_bytes {
        return Err(ValidationError::FileTooLarge {
            file_name: file.name.clone(),
            size: file.size(),
            max: config.max_file_bytes,
        });
    }

    let declared_ok = file.content_type.is_empty()
        || file.content_type == "application/octet-stream"
        || file.content_type.starts_with("image/");
    if !declared_ok || image::guess_format(&file.bytes).is_err() {
        return Err(ValidationError::NotAnImage {
            file_name: file.name.clone(),
        });
    }
    Ok(())
}

pub fn validate_caption(caption: &str, config: &GalleryConfig) -> std::result::Result<(), ValidationError> {
    let len = caption.chars().count();
    if len > config.max_caption_len {
        return Err(ValidationError::CaptionTooLong {
            len,
            max: config.max_caption_len,
        });
    }
    Ok(())
}

pub const MAX_DISPLAY_ORDER: i32 = 1_000_000;

pub fn validate_order(order: i32) -> std::result::Result<(), ValidationError> {
    if !(1..=MAX_DISPLAY_ORDER).contains(&order) {
        return Err(ValidationError::InvalidOrder(order));
    }
    Ok(())
}

/// Images staged in one editing session, mirrored to a recovery snapshot
/// after every mutation.
///
/// Entries keep insertion order; that order is also the provider's queue order
/// for entries that are still uploading.
pub struct PendingImageStore {
    key: String,
    images: Vec<PendingImage>,
    snapshot: Arc<dyn RecoverySnapshot>,
}

impl PendingImageStore {
    pub fn new(project_id: &str, snapshot: Arc<dyn RecoverySnapshot>) -> Self {
        Self {
            key: snapshot_key(project_id),
            images: Vec::new(),
            snapshot,
        }
    }

    /// Rebuild from the snapshot. Entries without an upload URL cannot be
    /// resumed (their bytes are gone) and are dropped.
    pub async fn restore(project_id: &str, snapshot: Arc<dyn RecoverySnapshot>) -> Self {
        let mut store = Self::new(project_id, snapshot);
        let restored = match store.snapshot.load(&store.key).await {
            Ok(Some(images)) => images,
            Ok(None) => return store,
            Err(e) => {
                tracing::warn!("Ignoring unreadable snapshot {}: {}", store.key, e);
                return store;
            }
        };

        let total = restored.len();
        store.images = restored.into_iter().filter(PendingImage::is_resolved).collect();
        if store.images.len() != total {
            tracing::warn!(
                "Dropped {} unfinished upload(s) from snapshot {}",
                total - store.images.len(),
                store.key
            );
            store.persist().await;
        }
        tracing::info!("Restored {} pending image(s) for {}", store.images.len(), store.key);
        store
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn images(&self) -> &[PendingImage] {
        &self.images
    }

    /// Direct access for the reconciler; call [`Self::persist`] afterwards
    pub fn images_mut(&mut self) -> &mut [PendingImage] {
        &mut self.images
    }

    pub fn get(&self, local_id: &str) -> Option<&PendingImage> {
        self.images.iter().find(|img| img.local_id == local_id)
    }

    pub fn contains(&self, local_id: &str) -> bool {
        self.get(local_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn in_flight_count(&self) -> usize {
        self.images.iter().filter(|img| !img.uploaded).count()
    }

    /// Stage files starting at `first_order`. Rejected files do not consume an
    /// order slot, and files past [`MAX_DISPLAY_ORDER`] are rejected. Returns
    /// the outcome and the accepted files, in the same order.
    pub async fn add_files(
        &mut self,
        files: Vec<SelectedFile>,
        first_order: Option<i32>,
        config: &GalleryConfig,
    ) -> (AddFilesOutcome, Vec<SelectedFile>) {
        let mut outcome = AddFilesOutcome::default();
        let mut accepted_files = Vec::new();

        for file in files {
            if let Err(e) = validate_file(&file, config) {
                tracing::warn!("Rejected {}: {}", file.name, e);
                outcome.rejected.push(e);
                continue;
            }
            let slot = i32::try_from(outcome.accepted.len())
                .ok()
                .zip(first_order)
                .and_then(|(taken, first)| first.checked_add(taken))
                .filter(|order| *order <= MAX_DISPLAY_ORDER);
            let Some(order) = slot else {
                let e = ValidationError::OrderExhausted { file_name: file.name.clone() };
                tracing::warn!("Rejected {}: {}", file.name, e);
                outcome.rejected.push(e);
                continue;
            };
            let image = PendingImage::new(&file.name, order);
            outcome.accepted.push(image.clone());
            self.images.push(image);
            accepted_files.push(file);
        }

        if !outcome.accepted.is_empty() {
            self.persist().await;
        }
        (outcome, accepted_files)
    }

    pub async fn resolve_upload(&mut self, local_id: &str, url: &str) -> Result<()> {
        let image = self
            .images
            .iter_mut()
            .find(|img| img.local_id == local_id)
            .ok_or_else(|| GalleryError::NotFound(local_id.to_string()))?;
        image.upload_url = Some(url.to_string());
        image.uploaded = true;
        self.persist().await;
        Ok(())
    }

    /// Match provider URLs, in order, against the entries still uploading
    pub async fn apply_upload_batch(&mut self, urls: &[String]) -> BatchResolution {
        let mut resolution = BatchResolution::default();
        let mut urls_iter = urls.iter();

        for image in self.images.iter_mut().filter(|img| !img.uploaded) {
            match urls_iter.next() {
                Some(url) => {
                    image.upload_url = Some(url.clone());
                    image.uploaded = true;
                    resolution.resolved.push((image.local_id.clone(), url.clone()));
                }
                None => resolution.unresolved.push(image.local_id.clone()),
            }
        }
        resolution.unmatched = urls_iter.cloned().collect();

        if !resolution.resolved.is_empty() {
            self.persist().await;
        }
        resolution
    }

    pub async fn update_caption(&mut self, local_id: &str, caption: &str) -> Result<()> {
        let image = self
            .images
            .iter_mut()
            .find(|img| img.local_id == local_id)
            .ok_or_else(|| GalleryError::NotFound(local_id.to_string()))?;
        image.caption = caption.to_string();
        self.persist().await;
        Ok(())
    }

    pub async fn update_order(&mut self, local_id: &str, order: i32) -> Result<()> {
        validate_order(order)?;
        let image = self
            .images
            .iter_mut()
            .find(|img| img.local_id == local_id)
            .ok_or_else(|| GalleryError::NotFound(local_id.to_string()))?;
        image.display_order = order;
        self.persist().await;
        Ok(())
    }

    /// Drop an entry. Feature repair across the whole gallery is the caller's job.
    pub async fn remove(&mut self, local_id: &str) -> Option<RemovedImage> {
        let idx = self.images.iter().position(|img| img.local_id == local_id)?;
        let queue_index = if self.images[idx].uploaded {
            None
        } else {
            Some(self.images[..idx].iter().filter(|img| !img.uploaded).count())
        };
        let image = self.images.remove(idx);
        self.persist().await;
        Some(RemovedImage { image, queue_index })
    }

    /// Clear the set and its snapshot slot. An absent slot is left untouched.
    pub async fn clear(&mut self) {
        self.images.clear();
        self.clear_snapshot().await;
    }

    /// Mirror the current set. An empty set removes the slot instead of
    /// writing an empty list. Failures are logged and otherwise ignored.
    pub async fn persist(&self) {
        if self.images.is_empty() {
            self.clear_snapshot().await;
            return;
        }
        if let Err(e) = self.snapshot.save(&self.key, &self.images).await {
            tracing::warn!("Failed to write snapshot {}: {}", self.key, e);
        }
    }

    async fn clear_snapshot(&self) {
        match self.snapshot.contains(&self.key).await {
            Ok(false) => {}
            Ok(true) => {
                if let Err(e) = self.snapshot.clear(&self.key).await {
                    tracing::warn!("Failed to clear snapshot {}: {}", self.key, e);
                }
            }
            Err(e) => tracing::warn!("Failed to check snapshot {}: {}", self.key, e),
        }
    }
}

impl std::fmt::Debug for PendingImageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingImageStore")
            .field("key", &self.key)
            .field("images", &self.images)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MemorySnapshot;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn png(name: &str) -> SelectedFile {
        SelectedFile::new(name, "image/png", PNG.to_vec())
    }

    fn store() -> (PendingImageStore, Arc<MemorySnapshot>) {
        let snapshot = Arc::new(MemorySnapshot::new());
        (PendingImageStore::new("p1", snapshot.clone()), snapshot)
    }

    #[test]
    fn validation_rejects_non_images() {
        let config = GalleryConfig::default();
        let pdf = SelectedFile::new("plans.pdf", "application/pdf", b"%PDF-1.7".to_vec());
        assert!(matches!(validate_file(&pdf, &config), Err(ValidationError::NotAnImage { .. })));

        let disguised = SelectedFile::new("fake.png", "image/png", b"not really".to_vec());
        assert!(matches!(validate_file(&disguised, &config), Err(ValidationError::NotAnImage { .. })));

        assert!(validate_file(&png("ok.png"), &config).is_ok());
    }

    #[test]
    fn validation_enforces_size_limit() {
        let config = GalleryConfig {
            max_file_bytes: 4,
            ..GalleryConfig::default()
        };
        assert!(matches!(
            validate_file(&png("big.png"), &config),
            Err(ValidationError::FileTooLarge { max: 4, .. })
        ));
    }

    #[tokio::test]
    async fn add_files_accepts_subset_with_consecutive_orders() {
        let (mut store, snapshot) = store();
        let files = vec![
            png("north-elevation.png"),
            SelectedFile::new("notes.txt", "text/plain", b"hello".to_vec()),
            png("south.png"),
        ];

        let (outcome, accepted_files) = store.add_files(files, Some(4), &GalleryConfig::default()).await;
        assert_eq!(outcome.accepted.len(), 2);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(accepted_files.len(), 2);
        assert_eq!(outcome.accepted[0].caption, "north-elevation");
        assert_eq!(outcome.accepted[0].display_order, 4);
        assert_eq!(outcome.accepted[1].display_order, 5);
        assert!(outcome.accepted.iter().all(|img| !img.uploaded));
        assert!(snapshot.contains(store.key()).await.unwrap());
    }

    #[tokio::test]
    async fn add_files_stops_at_the_order_ceiling() {
        let (mut store, _) = store();
        let (outcome, accepted_files) = store
            .add_files(vec![png("a.png"), png("b.png")], Some(MAX_DISPLAY_ORDER), &GalleryConfig::default())
            .await;
        assert_eq!(accepted_files.len(), 1);
        assert_eq!(outcome.accepted[0].display_order, MAX_DISPLAY_ORDER);
        assert_eq!(
            outcome.rejected,
            vec![ValidationError::OrderExhausted { file_name: "b.png".to_string() }]
        );

        let (outcome, _) = store.add_files(vec![png("c.png")], None, &GalleryConfig::default()).await;
        assert!(outcome.accepted.is_empty());
        assert_eq!(store.len(), 1);

        assert!(validate_order(MAX_DISPLAY_ORDER).is_ok());
        assert_eq!(validate_order(i32::MAX), Err(ValidationError::InvalidOrder(i32::MAX)));
    }

    #[tokio::test]
    async fn short_batch_resolves_prefix_only() {
        let (mut store, _) = store();
        store
            .add_files(vec![png("a.png"), png("b.png"), png("c.png")], Some(1), &GalleryConfig::default())
            .await;

        let resolution = store.apply_upload_batch(&["https://cdn/a".to_string()]).await;
        assert_eq!(resolution.resolved.len(), 1);
        assert_eq!(resolution.unresolved.len(), 2);
        assert_eq!(store.in_flight_count(), 2);
        assert_eq!(store.images()[0].upload_url.as_deref(), Some("https://cdn/a"));

        let resolution = store
            .apply_upload_batch(&["https://cdn/b".to_string(), "https://cdn/c".to_string(), "https://cdn/x".to_string()])
            .await;
        assert_eq!(resolution.resolved.len(), 2);
        assert_eq!(resolution.unmatched, vec!["https://cdn/x".to_string()]);
        assert_eq!(store.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn remove_reports_queue_position() {
        let (mut store, _) = store();
        store
            .add_files(vec![png("a.png"), png("b.png"), png("c.png")], Some(1), &GalleryConfig::default())
            .await;
        store.apply_upload_batch(&["https://cdn/a".to_string()]).await;
        let c = store.images()[2].local_id.clone();
        let a = store.images()[0].local_id.clone();

        let removed = store.remove(&c).await.unwrap();
        assert_eq!(removed.queue_index, Some(1));
        let removed = store.remove(&a).await.unwrap();
        assert_eq!(removed.queue_index, None);
        assert!(store.remove("missing").await.is_none());
    }

    #[tokio::test]
    async fn order_and_caption_edits() {
        let (mut store, _) = store();
        store.add_files(vec![png("a.png")], Some(1), &GalleryConfig::default()).await;
        let id = store.images()[0].local_id.clone();

        store.update_caption(&id, "Frame inspection").await.unwrap();
        store.update_order(&id, 7).await.unwrap();
        assert_eq!(store.images()[0].caption, "Frame inspection");
        assert_eq!(store.images()[0].display_order, 7);

        let err = store.update_order(&id, 0).await.unwrap_err();
        assert_eq!(err, GalleryError::Validation(ValidationError::InvalidOrder(0)));
    }

    #[tokio::test]
    async fn restore_drops_unfinished_uploads() {
        let snapshot = Arc::new(MemorySnapshot::new());
        let mut done = PendingImage::new("done.png", 1);
        done.upload_url = Some("https://cdn/done".to_string());
        done.uploaded = true;
        let waiting = PendingImage::new("waiting.png", 2);
        snapshot
            .save(&snapshot_key("p1"), &[done.clone(), waiting])
            .await
            .unwrap();

        let store = PendingImageStore::restore("p1", snapshot.clone()).await;
        assert_eq!(store.images(), &[done]);
        let mirrored = snapshot.load(&snapshot_key("p1")).await.unwrap().unwrap();
        assert_eq!(mirrored.len(), 1);
    }

    #[tokio::test]
    async fn emptying_the_set_removes_the_slot() {
        let (mut store, snapshot) = store();
        store.add_files(vec![png("a.png")], Some(1), &GalleryConfig::default()).await;
        let id = store.images()[0].local_id.clone();
        store.remove(&id).await;
        assert!(!snapshot.contains(store.key()).await.unwrap());
    }
}
