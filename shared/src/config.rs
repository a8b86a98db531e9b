use buildsite_atoms::uploads::AssetLocation;
use gallery_block::GalleryConfig;
use std::env;

const DEFAULT_TABLE_NAME: &str = "buildsite";
const DEFAULT_BUCKET_NAME: &str = "buildsite-assets";
const DEFAULT_FROM_EMAIL: &str = "no-reply@buildsite.example";
const DEFAULT_TO_EMAIL: &str = "office@buildsite.example";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub table_name: String,
    pub bucket_name: String,
    /// Public prefix for uploaded assets; `None` means plain S3 URLs
    pub asset_base_url: Option<String>,
    pub notify_from_email: String,
    pub notify_to_email: String,
    pub allowed_origins: Vec<String>,
    pub gallery: GalleryConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut gallery = GalleryConfig::default();
        if let Some(raw) = var("MAX_UPLOAD_BYTES") {
            match raw.parse::<usize>() {
                Ok(n) if n > 0 => gallery.max_file_bytes = n,
                _ => tracing::warn!("Ignoring invalid MAX_UPLOAD_BYTES={}", raw),
            }
        }

        Self {
            table_name: var("TABLE_NAME").unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
            bucket_name: var("S3_BUCKET_NAME").unwrap_or_else(|| DEFAULT_BUCKET_NAME.to_string()),
            asset_base_url: var("ASSET_BASE_URL").map(|v| v.trim_end_matches('/').to_string()),
            notify_from_email: var("NOTIFY_FROM_EMAIL").unwrap_or_else(|| DEFAULT_FROM_EMAIL.to_string()),
            notify_to_email: var("NOTIFY_TO_EMAIL").unwrap_or_else(|| DEFAULT_TO_EMAIL.to_string()),
            allowed_origins: var("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|o| o.trim().trim_end_matches('/').to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            gallery,
        }
    }

    pub fn asset_location(&self) -> AssetLocation {
        AssetLocation {
            bucket: self.bucket_name.clone(),
            base_url: self.asset_base_url.clone(),
        }
    }

    /// Origin to echo back in CORS headers. With no allow-list every origin
    /// gets `*`; otherwise unknown origins get the first allowed one.
    pub fn cors_origin(&self, request_origin: Option<&str>) -> String {
        if self.allowed_origins.is_empty() {
            return "*".to_string();
        }
        match request_origin {
            Some(origin) if self.allowed_origins.iter().any(|o| o == origin) => origin.to_string(),
            _ => self.allowed_origins[0].clone(),
        }
    }
}
