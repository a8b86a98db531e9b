pub mod model;
pub mod service;
pub mod http;

pub use model::{AssetLocation, SessionPayload, TrackFilePayload, TrackedFile};
pub use service::*;
pub use http::*;
