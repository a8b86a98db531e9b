#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gallery_block::{
    Collaborators, FileTracker, GalleryConfig, GalleryImage, GalleryImageChanges, GallerySession, GalleryStore,
    MemorySnapshot, NewGalleryImage, PendingImage, RecoverySnapshot, SelectedFile, SessionHooks, UploadProvider,
};

pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

pub fn png(name: &str) -> SelectedFile {
    SelectedFile::new(name, "image/png", PNG.to_vec())
}

pub fn saved(id: &str, order: i32, is_feature: bool) -> GalleryImage {
    GalleryImage {
        id: id.to_string(),
        project_id: "p1".to_string(),
        image_url: format!("https://cdn.test/saved/{}.png", id),
        caption: id.to_string(),
        display_order: order,
        is_feature,
        created_at: "2024-01-01T00:00:00Z".to_string(),
    }
}

// ========== UPLOAD PROVIDER ==========

/// Queue-backed provider. `truncate_to` limits how many URLs a call returns.
#[derive(Default)]
pub struct FakeUploads {
    pub queue: Mutex<Vec<SelectedFile>>,
    pub truncate_to: Mutex<Option<usize>>,
    pub fail_with: Mutex<Option<String>>,
    pub removed: Mutex<Vec<usize>>,
    pub clears: Mutex<Vec<bool>>,
    pub upload_calls: AtomicUsize,
    counter: AtomicUsize,
}

impl FakeUploads {
    pub fn truncate_to(&self, n: Option<usize>) {
        *self.truncate_to.lock().unwrap() = n;
    }

    pub fn fail_with(&self, reason: Option<&str>) {
        *self.fail_with.lock().unwrap() = reason.map(str::to_string);
    }

    pub fn queued_names(&self) -> Vec<String> {
        self.queue.lock().unwrap().iter().map(|f| f.name.clone()).collect()
    }
}

#[async_trait]
impl UploadProvider for FakeUploads {
    async fn add_files(&self, files: Vec<SelectedFile>) {
        self.queue.lock().unwrap().extend(files);
    }

    async fn upload(&self) -> Result<Vec<String>, String> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.fail_with.lock().unwrap().clone() {
            return Err(reason);
        }
        let mut queue = self.queue.lock().unwrap();
        let take = self.truncate_to.lock().unwrap().unwrap_or(queue.len()).min(queue.len());
        let sent: Vec<SelectedFile> = queue.drain(..take).collect();
        Ok(sent
            .iter()
            .map(|f| {
                let n = self.counter.fetch_add(1, Ordering::SeqCst);
                format!("https://cdn.test/uploads/{}-{}", n, f.name)
            })
            .collect())
    }

    async fn remove_file(&self, index: usize) {
        let mut queue = self.queue.lock().unwrap();
        if index < queue.len() {
            queue.remove(index);
        }
        self.removed.lock().unwrap().push(index);
    }

    async fn clear_files(&self, commit: bool) {
        self.queue.lock().unwrap().clear();
        self.clears.lock().unwrap().push(commit);
    }
}

// ========== GALLERY STORE ==========

/// In-memory gallery. `fail_on_add` fails the n-th add call (1-based).
#[derive(Default)]
pub struct FakeGallery {
    pub rows: Mutex<Vec<GalleryImage>>,
    pub fail_on_add: Mutex<Option<usize>>,
    pub fail_updates: Mutex<bool>,
    pub add_calls: AtomicUsize,
    pub deleted: Mutex<Vec<String>>,
    counter: AtomicUsize,
}

impl FakeGallery {
    pub fn with_rows(rows: Vec<GalleryImage>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    pub fn fail_on_add(&self, n: Option<usize>) {
        *self.fail_on_add.lock().unwrap() = n;
    }

    pub fn fail_updates(&self, fail: bool) {
        *self.fail_updates.lock().unwrap() = fail;
    }

    pub fn rows(&self) -> Vec<GalleryImage> {
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by_key(|r| r.display_order);
        rows
    }
}

#[async_trait]
impl GalleryStore for FakeGallery {
    async fn add_project_gallery_image(&self, record: NewGalleryImage) -> Result<GalleryImage, String> {
        let call = self.add_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_on_add.lock().unwrap() == Some(call) {
            return Err("DynamoDB PutItem error: throttled".to_string());
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let image = GalleryImage {
            id: format!("img-{}", n),
            project_id: record.project_id,
            image_url: record.image_url,
            caption: record.caption,
            display_order: record.display_order,
            is_feature: record.is_feature,
            created_at: "2024-06-01T00:00:00Z".to_string(),
        };
        self.rows.lock().unwrap().push(image.clone());
        Ok(image)
    }

    async fn update_project_gallery_image(
        &self,
        id: &str,
        changes: GalleryImageChanges,
    ) -> Result<GalleryImage, String> {
        if *self.fail_updates.lock().unwrap() {
            return Err("DynamoDB UpdateItem error: throttled".to_string());
        }
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| format!("Gallery image {} not found", id))?;
        if let Some(caption) = changes.caption {
            row.caption = caption;
        }
        if let Some(order) = changes.display_order {
            row.display_order = order;
        }
        if let Some(is_feature) = changes.is_feature {
            row.is_feature = is_feature;
        }
        Ok(row.clone())
    }

    async fn delete_project_gallery_image(&self, id: &str) -> Result<(), String> {
        self.rows.lock().unwrap().retain(|r| r.id != id);
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn get_project_gallery(&self, project_id: &str) -> Result<Vec<GalleryImage>, String> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect())
    }
}

// ========== FILE TRACKER ==========

#[derive(Default)]
pub struct FakeTracker {
    pub tracked: Mutex<HashMap<String, Vec<String>>>,
    /// `(session_id, urls removed)` per cleanup call
    pub cleanups: Mutex<Vec<(String, Vec<String>)>>,
    pub commits: Mutex<Vec<String>>,
    pub fail_cleanup: Mutex<bool>,
    pub track_calls: AtomicUsize,
}

impl FakeTracker {
    pub fn network_calls(&self) -> usize {
        self.track_calls.load(Ordering::SeqCst) + self.cleanups.lock().unwrap().len()
    }
}

#[async_trait]
impl FileTracker for FakeTracker {
    async fn track_file(&self, url: &str, session_id: &str) -> Result<(), String> {
        self.track_calls.fetch_add(1, Ordering::SeqCst);
        self.tracked
            .lock()
            .unwrap()
            .entry(session_id.to_string())
            .or_default()
            .push(url.to_string());
        Ok(())
    }

    async fn cleanup_files(&self, session_id: &str) -> Result<Vec<String>, String> {
        if *self.fail_cleanup.lock().unwrap() {
            self.cleanups.lock().unwrap().push((session_id.to_string(), Vec::new()));
            return Err("S3 DeleteObjects error: access denied".to_string());
        }
        let removed = self.tracked.lock().unwrap().remove(session_id).unwrap_or_default();
        self.cleanups
            .lock()
            .unwrap()
            .push((session_id.to_string(), removed.clone()));
        Ok(removed)
    }

    async fn commit_files(&self, session_id: &str) -> Result<(), String> {
        self.tracked.lock().unwrap().remove(session_id);
        self.commits.lock().unwrap().push(session_id.to_string());
        Ok(())
    }
}

// ========== SNAPSHOT ==========

/// Memory snapshot that counts writes and clears
#[derive(Default)]
pub struct CountingSnapshot {
    pub inner: MemorySnapshot,
    pub saves: AtomicUsize,
    pub clears: AtomicUsize,
}

impl CountingSnapshot {
    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecoverySnapshot for CountingSnapshot {
    async fn load(&self, key: &str) -> Result<Option<Vec<PendingImage>>, String> {
        self.inner.load(key).await
    }

    async fn save(&self, key: &str, images: &[PendingImage]) -> Result<(), String> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(key, images).await
    }

    async fn clear(&self, key: &str) -> Result<(), String> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear(key).await
    }

    async fn contains(&self, key: &str) -> Result<bool, String> {
        self.inner.contains(key).await
    }
}

// ========== HARNESS ==========

#[derive(Clone)]
pub struct Harness {
    pub uploads: Arc<FakeUploads>,
    pub gallery: Arc<FakeGallery>,
    pub files: Arc<FakeTracker>,
    pub snapshot: Arc<CountingSnapshot>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    pub fn with_rows(rows: Vec<GalleryImage>) -> Self {
        Self {
            uploads: Arc::new(FakeUploads::default()),
            gallery: Arc::new(FakeGallery::with_rows(rows)),
            files: Arc::new(FakeTracker::default()),
            snapshot: Arc::new(CountingSnapshot::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            uploads: self.uploads.clone(),
            gallery: self.gallery.clone(),
            files: self.files.clone(),
            snapshot: self.snapshot.clone(),
        }
    }

    pub async fn open(&self) -> GallerySession {
        self.open_with_hooks(SessionHooks::default()).await
    }

    pub async fn open_with_hooks(&self, hooks: SessionHooks) -> GallerySession {
        GallerySession::open("p1", self.collaborators(), GalleryConfig::default(), hooks)
            .await
            .unwrap()
    }
}

pub fn feature_count(session: &GallerySession) -> usize {
    session.persisted().iter().filter(|img| img.is_feature).count()
        + session.pending().iter().filter(|img| img.is_feature).count()
}
