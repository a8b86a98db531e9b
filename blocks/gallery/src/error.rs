//! Error types for the gallery editing session
//!
//! Validation errors are per-item and never abort a batch. Everything else is
//! a [`GalleryError`] returned by a session operation.

/// Rejected input, reported inline next to the offending file or field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{file_name} is not an image")]
    NotAnImage { file_name: String },

    #[error("{file_name} is {size} bytes, the limit is {max} bytes")]
    FileTooLarge {
        file_name: String,
        size: usize,
        max: usize,
    },

    #[error("{file_name} is empty")]
    EmptyFile { file_name: String },

    #[error("caption is {len} characters, the limit is {max}")]
    CaptionTooLong { len: usize, max: usize },

    #[error("display order must be between 1 and {max}, got {0}", max = crate::pending::MAX_DISPLAY_ORDER)]
    InvalidOrder(i32),

    /// The gallery already holds an image at the highest allowed order
    #[error("no display order left for {file_name}")]
    OrderExhausted { file_name: String },
}

/// Session-level failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GalleryError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Provider returned fewer URLs than files in flight
    #[error("{unresolved} image(s) failed to upload ({resolved} uploaded)")]
    UploadIncomplete { resolved: usize, unresolved: usize },

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("{count} image(s) still uploading")]
    StillUploading { count: usize },

    /// Sequential save stopped early; the first `saved` records are committed
    #[error("saved {saved} of {requested} images: {reason}")]
    PartialSave {
        saved: usize,
        requested: usize,
        reason: String,
    },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("image {0} not found in this gallery")]
    NotFound(String),

    #[error("editing session is closed")]
    SessionClosed,

    #[error("a save is already in progress")]
    SaveInProgress,
}

impl GalleryError {
    /// Session stays open and `save()` can be called again
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UploadIncomplete { .. }
                | Self::Upload(_)
                | Self::PartialSave { .. }
                | Self::Persistence(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GalleryError>;
