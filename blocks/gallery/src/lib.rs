//! Gallery image lifecycle: staging local files, uploading them, and
//! committing them to a project's gallery as a single editing session.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod pending;
pub mod reconciler;
pub mod session;
pub mod snapshot;
pub mod types;
pub mod upload_session;

pub use collaborators::{FileTracker, GalleryStore, UploadProvider};
pub use config::{GalleryConfig, Notice, NoticeLevel, SessionHooks};
pub use error::{GalleryError, Result, ValidationError};
pub use pending::{AddFilesOutcome, BatchResolution, PendingImageStore, MAX_DISPLAY_ORDER};
pub use session::{CancelReport, Collaborators, GallerySession, SaveReport, SessionState, UploadReport};
pub use snapshot::{snapshot_key, MemorySnapshot, RecoverySnapshot};
pub use types::{
    EntryStatus, GalleryEntry, GalleryImage, GalleryImageChanges, NewGalleryImage, PendingImage, SelectedFile,
};
pub use upload_session::{UploadSession, UploadSessionState};
