use crate::error::GalleryError;
use crate::types::GalleryImage;

pub const DEFAULT_MAX_FILE_BYTES: usize = 8 * 1024 * 1024;
pub const DEFAULT_MAX_CAPTION_LEN: usize = 500;

/// Limits applied to files and edits entering a session
#[derive(Debug, Clone)]
pub struct GalleryConfig {
    pub max_file_bytes: usize,
    pub max_caption_len: usize,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_caption_len: DEFAULT_MAX_CAPTION_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// User-facing toast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Optional callbacks fired by the session. Every field is independent.
#[derive(Default)]
pub struct SessionHooks {
    /// URLs resolved by an upload step
    pub on_upload_complete: Option<Box<dyn Fn(&[String]) + Send + Sync>>,
    pub on_upload_error: Option<Box<dyn Fn(&GalleryError) + Send + Sync>>,
    /// Gallery rows changed server-side; invalidate cached queries
    pub on_gallery_changed: Option<Box<dyn Fn(&[GalleryImage]) + Send + Sync>>,
    /// URLs reclaimed by cancel
    pub on_cancelled: Option<Box<dyn Fn(&[String]) + Send + Sync>>,
    pub on_notice: Option<Box<dyn Fn(&Notice) + Send + Sync>>,
}

impl SessionHooks {
    pub(crate) fn upload_complete(&self, urls: &[String]) {
        if let Some(cb) = &self.on_upload_complete {
            cb(urls);
        }
    }

    pub(crate) fn upload_error(&self, err: &GalleryError) {
        if let Some(cb) = &self.on_upload_error {
            cb(err);
        }
    }

    pub(crate) fn gallery_changed(&self, images: &[GalleryImage]) {
        if let Some(cb) = &self.on_gallery_changed {
            cb(images);
        }
    }

    pub(crate) fn cancelled(&self, urls: &[String]) {
        if let Some(cb) = &self.on_cancelled {
            cb(urls);
        }
    }

    pub(crate) fn notice(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => tracing::info!("{}", notice.message),
            NoticeLevel::Error => tracing::warn!("{}", notice.message),
        }
        if let Some(cb) = &self.on_notice {
            cb(&notice);
        }
    }
}

impl std::fmt::Debug for SessionHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHooks")
            .field("on_upload_complete", &self.on_upload_complete.is_some())
            .field("on_upload_error", &self.on_upload_error.is_some())
            .field("on_gallery_changed", &self.on_gallery_changed.is_some())
            .field("on_cancelled", &self.on_cancelled.is_some())
            .field("on_notice", &self.on_notice.is_some())
            .finish()
    }
}
