//! Editing session for one project's gallery.
//!
//! States: `Idle -> Saving -> {Committed, Failed}`, `Failed -> Saving` on
//! retry, and `Idle | Failed -> Cancelling -> Cancelled`. Every network call
//! is awaited one at a time; saves persist records strictly in sequence so a
//! failure leaves a deterministic committed prefix.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::collaborators::{FileTracker, GalleryStore, UploadProvider};
use crate::config::{GalleryConfig, Notice, SessionHooks};
use crate::error::{GalleryError, Result};
use crate::pending::{validate_caption, validate_order, AddFilesOutcome, PendingImageStore};
use crate::reconciler;
use crate::snapshot::RecoverySnapshot;
use crate::types::{GalleryEntry, GalleryImage, GalleryImageChanges, PendingImage, SelectedFile};
use crate::upload_session::UploadSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Saving,
    Committed,
    /// Save stopped after `saved` of `requested` records; retry with `save()`
    Failed { saved: usize, requested: usize },
    Cancelling,
    Cancelled,
}

/// External services a session talks to
#[derive(Clone)]
pub struct Collaborators {
    pub uploads: Arc<dyn UploadProvider>,
    pub gallery: Arc<dyn GalleryStore>,
    pub files: Arc<dyn FileTracker>,
    pub snapshot: Arc<dyn RecoverySnapshot>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub resolved: Vec<String>,
    pub unresolved: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub created: Vec<GalleryImage>,
    pub updated: Vec<GalleryImage>,
    /// Discarded uploads reclaimed as part of the save
    pub reclaimed: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CancelReport {
    pub removed: Vec<String>,
}

pub struct GallerySession {
    project_id: String,
    state: SessionState,
    persisted: Vec<GalleryImage>,
    /// Persisted rows edited locally and not yet written back
    dirty: BTreeSet<String>,
    pending: PendingImageStore,
    upload_session: UploadSession,
    collaborators: Collaborators,
    config: GalleryConfig,
    hooks: SessionHooks,
}

impl GallerySession {
    /// Load the persisted gallery and any recovered pending images
    pub async fn open(
        project_id: &str,
        collaborators: Collaborators,
        config: GalleryConfig,
        hooks: SessionHooks,
    ) -> Result<Self> {
        let mut persisted = collaborators
            .gallery
            .get_project_gallery(project_id)
            .await
            .map_err(GalleryError::Persistence)?;
        persisted.sort_by_key(|img| img.display_order);

        let mut dirty: BTreeSet<String> = reconciler::enforce_single_feature(&mut persisted).into_iter().collect();
        if !dirty.is_empty() {
            tracing::warn!("Repaired feature flag on {} row(s) of project {}", dirty.len(), project_id);
        }

        let mut pending = PendingImageStore::restore(project_id, collaborators.snapshot.clone()).await;
        if !pending.is_empty() {
            dirty.extend(reconciler::settle_feature(&mut persisted, pending.images_mut()));
            pending.persist().await;
        }

        let upload_session = UploadSession::new();
        tracing::info!(
            "Opened gallery session {} for project {}: {} saved, {} pending",
            upload_session.session_id(),
            project_id,
            persisted.len(),
            pending.len()
        );

        Ok(Self {
            project_id: project_id.to_string(),
            state: SessionState::Idle,
            persisted,
            dirty,
            pending,
            upload_session,
            collaborators,
            config,
            hooks,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn session_id(&self) -> &str {
        self.upload_session.session_id()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn persisted(&self) -> &[GalleryImage] {
        &self.persisted
    }

    pub fn pending(&self) -> &[PendingImage] {
        self.pending.images()
    }

    /// Saved and staged images as one ordered list
    pub fn entries(&self) -> Vec<GalleryEntry> {
        reconciler::merge_for_display(&self.persisted, self.pending.images())
    }

    pub fn next_display_order(&self) -> Option<i32> {
        reconciler::next_display_order(&self.persisted, self.pending.images())
    }

    pub fn has_unsaved_changes(&self) -> bool {
        !self.pending.is_empty() || !self.dirty.is_empty()
    }

    // ========== EDITING ==========

    /// Stage files. Rejections are reported per file; the rest are queued
    /// with the upload provider.
    pub async fn add_files(&mut self, files: Vec<SelectedFile>) -> Result<AddFilesOutcome> {
        self.ensure_editable()?;
        let first_order = self.next_display_order();
        let (outcome, accepted_files) = self.pending.add_files(files, first_order, &self.config).await;

        for rejection in &outcome.rejected {
            self.hooks.notice(Notice::error(rejection.to_string()));
        }
        if !accepted_files.is_empty() {
            self.collaborators.uploads.add_files(accepted_files).await;
            self.settle().await;
        }

        // hand back the settled flags
        let accepted = outcome
            .accepted
            .iter()
            .filter_map(|img| self.pending.get(&img.local_id).cloned())
            .collect();
        Ok(AddFilesOutcome {
            accepted,
            rejected: outcome.rejected,
        })
    }

    /// Upload everything still in flight
    pub async fn upload(&mut self) -> Result<UploadReport> {
        self.ensure_editable()?;
        self.upload_step().await
    }

    /// Attach a URL reported for a single staged file. The file leaves the
    /// provider queue so later batches stay aligned.
    pub async fn resolve_upload(&mut self, local_id: &str, url: &str) -> Result<()> {
        self.ensure_editable()?;
        if self.pending.get(local_id).is_some_and(|img| img.uploaded) {
            return Ok(());
        }
        let queue_index = self
            .pending
            .images()
            .iter()
            .take_while(|img| img.local_id != local_id)
            .filter(|img| !img.uploaded)
            .count();

        self.pending.resolve_upload(local_id, url).await?;
        self.collaborators.uploads.remove_file(queue_index).await;
        self.hooks.upload_complete(&[url.to_string()]);
        Ok(())
    }

    pub async fn set_feature(&mut self, id: &str) -> Result<()> {
        self.ensure_editable()?;
        let changed = reconciler::set_feature(&mut self.persisted, self.pending.images_mut(), id)?;
        self.dirty.extend(changed);
        self.pending.persist().await;
        Ok(())
    }

    pub async fn update_caption(&mut self, id: &str, caption: &str) -> Result<()> {
        self.ensure_editable()?;
        validate_caption(caption, &self.config)?;
        if self.pending.contains(id) {
            return self.pending.update_caption(id, caption).await;
        }
        let image = self.persisted_mut(id)?;
        image.caption = caption.to_string();
        self.dirty.insert(id.to_string());
        Ok(())
    }

    pub async fn update_order(&mut self, id: &str, order: i32) -> Result<()> {
        self.ensure_editable()?;
        validate_order(order)?;
        if self.pending.contains(id) {
            return self.pending.update_order(id, order).await;
        }
        let image = self.persisted_mut(id)?;
        image.display_order = order;
        self.dirty.insert(id.to_string());
        Ok(())
    }

    /// Renumber the gallery from a drag-and-drop result
    pub async fn reorder(&mut self, ids: &[String]) -> Result<()> {
        self.ensure_editable()?;
        let changed = reconciler::apply_ordering(&mut self.persisted, self.pending.images_mut(), ids)?;
        self.dirty.extend(changed);
        self.pending.persist().await;
        Ok(())
    }

    /// Remove a staged image locally, or delete a saved one through the
    /// persistence layer. Removing the feature promotes the first remaining
    /// image by display order.
    pub async fn remove_image(&mut self, id: &str) -> Result<()> {
        self.ensure_editable()?;

        if let Some(removed) = self.pending.remove(id).await {
            if let Some(index) = removed.queue_index {
                self.collaborators.uploads.remove_file(index).await;
            }
            if let Some(url) = removed.image.upload_url.as_deref() {
                // already uploaded: reclaimed on save or cancel
                self.upload_session.register(url);
            }
            self.settle().await;
            return Ok(());
        }

        if !self.persisted.iter().any(|img| img.id == id) {
            return Err(GalleryError::NotFound(id.to_string()));
        }
        self.collaborators
            .gallery
            .delete_project_gallery_image(id)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete gallery image {}: {}", id, e);
                GalleryError::Persistence(e)
            })?;
        self.persisted.retain(|img| img.id != id);
        self.dirty.remove(id);
        self.settle().await;
        self.hooks.gallery_changed(&self.persisted);
        Ok(())
    }

    // ========== COMMIT / ROLLBACK ==========

    /// Upload what is still in flight, then persist every pending image in
    /// display order, one request at a time.
    pub async fn save(&mut self) -> Result<SaveReport> {
        let resume_state = match self.state {
            SessionState::Committed | SessionState::Cancelled => return Err(GalleryError::SessionClosed),
            SessionState::Saving | SessionState::Cancelling => return Err(GalleryError::SaveInProgress),
            state => state,
        };

        self.state = SessionState::Saving;
        let result = self.run_save().await;
        match &result {
            Ok(_) => self.state = SessionState::Committed,
            Err(_) if self.state == SessionState::Saving => self.state = resume_state,
            Err(_) => {}
        }
        result
    }

    async fn run_save(&mut self) -> Result<SaveReport> {
        if self.pending.in_flight_count() > 0 {
            self.upload_step().await?;
        }

        self.settle().await;
        let items = reconciler::build_save_payload(&self.project_id, &self.persisted, self.pending.images())?;
        let requested = items.len();
        let mut report = SaveReport::default();

        for (idx, item) in items.into_iter().enumerate() {
            match self.collaborators.gallery.add_project_gallery_image(item.record).await {
                Ok(image) => {
                    self.pending.remove(&item.local_id).await;
                    self.persisted.push(image.clone());
                    report.created.push(image);
                }
                Err(e) => {
                    tracing::error!(
                        "Gallery save for project {} stopped at image {} of {}: {}",
                        self.project_id,
                        idx + 1,
                        requested,
                        e
                    );
                    return Err(self.fail_save(idx, requested, e, &report));
                }
            }
        }

        let dirty: Vec<String> = self.dirty.iter().cloned().collect();
        for id in dirty {
            let Some(image) = self.persisted.iter().find(|img| img.id == id) else {
                self.dirty.remove(&id);
                continue;
            };
            let changes = GalleryImageChanges::from_image(image);
            match self.collaborators.gallery.update_project_gallery_image(&id, changes).await {
                Ok(updated) => {
                    self.dirty.remove(&id);
                    if let Some(slot) = self.persisted.iter_mut().find(|img| img.id == id) {
                        *slot = updated.clone();
                    }
                    report.updated.push(updated);
                }
                Err(e) => {
                    tracing::error!("Failed to update gallery image {}: {}", id, e);
                    return Err(self.fail_update(e, &report));
                }
            }
        }

        if !self.upload_session.is_empty() {
            report.reclaimed = self.reclaim_owned().await;
        }

        self.pending.clear().await;
        if let Err(e) = self.collaborators.files.commit_files(self.upload_session.session_id()).await {
            tracing::warn!("Failed to commit upload session {}: {}", self.session_id(), e);
        }
        self.upload_session.commit();
        self.collaborators.uploads.clear_files(true).await;

        self.persisted.sort_by_key(|img| img.display_order);
        if !report.created.is_empty() || !report.updated.is_empty() {
            self.hooks.gallery_changed(&self.persisted);
        }
        self.hooks
            .notice(Notice::info(format!("Saved {} image(s)", report.created.len())));
        Ok(report)
    }

    fn fail_save(&mut self, saved: usize, requested: usize, reason: String, report: &SaveReport) -> GalleryError {
        self.state = SessionState::Failed { saved, requested };
        if !report.created.is_empty() || !report.updated.is_empty() {
            self.hooks.gallery_changed(&self.persisted);
        }
        self.hooks.notice(Notice::error(format!(
            "Saved {} of {} images. The rest are still pending, try saving again.",
            saved, requested
        )));
        GalleryError::PartialSave {
            saved,
            requested,
            reason,
        }
    }

    /// Every new image is saved but an edit to a saved row was not written.
    /// The unwritten rows stay dirty for the next `save()`.
    fn fail_update(&mut self, reason: String, report: &SaveReport) -> GalleryError {
        self.state = SessionState::Idle;
        if !report.created.is_empty() || !report.updated.is_empty() {
            self.hooks.gallery_changed(&self.persisted);
        }
        self.hooks.notice(Notice::error(format!(
            "Saved {} new image(s), but changes to {} saved image(s) were not stored. Try saving again.",
            report.created.len(),
            self.dirty.len()
        )));
        GalleryError::Persistence(reason)
    }

    /// Discard everything staged: uploaded files are handed to cleanup and the
    /// pending set and its snapshot are cleared. Cleanup failures are logged
    /// only.
    pub async fn cancel(&mut self) -> Result<CancelReport> {
        match self.state {
            SessionState::Cancelled => return Ok(CancelReport::default()),
            SessionState::Committed => return Err(GalleryError::SessionClosed),
            SessionState::Saving | SessionState::Cancelling => return Err(GalleryError::SaveInProgress),
            SessionState::Idle | SessionState::Failed { .. } => {}
        }
        self.state = SessionState::Cancelling;

        let had_pending = !self.pending.is_empty();
        for url in self.pending.images().iter().filter_map(|img| img.upload_url.as_deref()) {
            self.upload_session.register(url);
        }

        let removed = if self.upload_session.is_empty() {
            Vec::new()
        } else {
            self.reclaim_owned().await
        };

        if had_pending {
            self.collaborators.uploads.clear_files(false).await;
        }
        self.pending.clear().await;
        self.upload_session.release();
        self.state = SessionState::Cancelled;

        tracing::info!(
            "Cancelled gallery session {} for project {}: {} file(s) reclaimed",
            self.session_id(),
            self.project_id,
            removed.len()
        );
        self.hooks.cancelled(&removed);
        Ok(CancelReport { removed })
    }

    // ========== INTERNALS ==========

    async fn upload_step(&mut self) -> Result<UploadReport> {
        let in_flight = self.pending.in_flight_count();
        if in_flight == 0 {
            return Ok(UploadReport::default());
        }

        let urls = match self.collaborators.uploads.upload().await {
            Ok(urls) => urls,
            Err(e) => {
                tracing::error!("Upload of {} file(s) failed: {}", in_flight, e);
                let err = GalleryError::Upload(e);
                self.hooks.upload_error(&err);
                self.hooks.notice(Notice::error(err.to_string()));
                return Err(err);
            }
        };

        let batch = self.pending.apply_upload_batch(&urls).await;
        for url in &batch.unmatched {
            tracing::warn!("Upload returned unexpected URL {}, scheduling cleanup", url);
            self.upload_session.register(url);
        }

        let resolved: Vec<String> = batch.resolved.into_iter().map(|(_, url)| url).collect();
        if !resolved.is_empty() {
            self.hooks.upload_complete(&resolved);
        }

        if !batch.unresolved.is_empty() {
            let err = GalleryError::UploadIncomplete {
                resolved: resolved.len(),
                unresolved: batch.unresolved.len(),
            };
            self.hooks.upload_error(&err);
            self.hooks.notice(Notice::error(err.to_string()));
            return Err(err);
        }

        Ok(UploadReport {
            resolved,
            unresolved: 0,
        })
    }

    /// Track every owned URL under this session and ask for cleanup
    async fn reclaim_owned(&mut self) -> Vec<String> {
        let session_id = self.upload_session.session_id().to_string();
        let owned: Vec<String> = self.upload_session.owned().map(str::to_string).collect();

        for url in &owned {
            if let Err(e) = self.collaborators.files.track_file(url, &session_id).await {
                tracing::warn!("Failed to track {} for session {}: {}", url, session_id, e);
            }
        }
        let removed = match self.collaborators.files.cleanup_files(&session_id).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!("Cleanup for session {} failed: {}", session_id, e);
                Vec::new()
            }
        };
        self.upload_session.forget_all();
        removed
    }

    async fn settle(&mut self) {
        let changed = reconciler::settle_feature(&mut self.persisted, self.pending.images_mut());
        self.dirty.extend(changed);
        self.pending.persist().await;
    }

    fn persisted_mut(&mut self, id: &str) -> Result<&mut GalleryImage> {
        self.persisted
            .iter_mut()
            .find(|img| img.id == id)
            .ok_or_else(|| GalleryError::NotFound(id.to_string()))
    }

    fn ensure_editable(&self) -> Result<()> {
        match self.state {
            SessionState::Idle | SessionState::Failed { .. } => Ok(()),
            SessionState::Saving | SessionState::Cancelling => Err(GalleryError::SaveInProgress),
            SessionState::Committed | SessionState::Cancelled => Err(GalleryError::SessionClosed),
        }
    }
}

impl std::fmt::Debug for GallerySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GallerySession")
            .field("project_id", &self.project_id)
            .field("session_id", &self.session_id())
            .field("state", &self.state)
            .field("persisted", &self.persisted.len())
            .field("pending", &self.pending.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}
