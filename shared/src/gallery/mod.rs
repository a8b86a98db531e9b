pub mod adapters;
pub mod handlers;

pub use adapters::{DynamoFileTracker, DynamoGalleryStore, DynamoSnapshot, S3UploadProvider};
pub use handlers::*;
