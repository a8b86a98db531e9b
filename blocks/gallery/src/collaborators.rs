use async_trait::async_trait;

use crate::types::{GalleryImage, GalleryImageChanges, NewGalleryImage, SelectedFile};

/// Upload provider that turns staged files into public URLs.
///
/// The provider keeps a queue of files in the order they were added.
/// `upload` sends the whole queue and returns one URL per file, in queue
/// order. A partial failure returns a truncated list: the files that got a
/// URL leave the queue, the rest stay queued for the next call.
#[async_trait]
pub trait UploadProvider: Send + Sync {
    async fn add_files(&self, files: Vec<SelectedFile>);

    async fn upload(&self) -> Result<Vec<String>, String>;

    /// Drop the queued file at `index` (position in the current queue)
    async fn remove_file(&self, index: usize);

    /// Empty the queue. `commit = false` means anything produced by this
    /// provider instance is being discarded.
    async fn clear_files(&self, commit: bool);
}

/// Persistence layer for gallery records
#[async_trait]
pub trait GalleryStore: Send + Sync {
    async fn add_project_gallery_image(&self, record: NewGalleryImage) -> Result<GalleryImage, String>;

    async fn update_project_gallery_image(
        &self,
        id: &str,
        changes: GalleryImageChanges,
    ) -> Result<GalleryImage, String>;

    async fn delete_project_gallery_image(&self, id: &str) -> Result<(), String>;

    async fn get_project_gallery(&self, project_id: &str) -> Result<Vec<GalleryImage>, String>;
}

/// Tracks uploaded files per session so abandoned uploads can be reclaimed
#[async_trait]
pub trait FileTracker: Send + Sync {
    async fn track_file(&self, url: &str, session_id: &str) -> Result<(), String>;

    /// Delete every file tracked for the session; returns the URLs actually removed
    async fn cleanup_files(&self, session_id: &str) -> Result<Vec<String>, String>;

    /// Release tracking without deleting anything
    async fn commit_files(&self, session_id: &str) -> Result<(), String>;
}
