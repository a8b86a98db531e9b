use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const FILE_SK_PREFIX: &str = "FILE#";

pub fn session_pk(session_id: &str) -> String {
    format!("UPLOAD_SESSION#{}", session_id)
}

/// URLs can exceed key limits, so rows are keyed by digest
pub fn file_sk(url: &str) -> String {
    format!("{}{:x}", FILE_SK_PREFIX, Sha256::digest(url.as_bytes()))
}

/// A URL uploaded during an editing session and not yet committed
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrackedFile {
    pub url: String,
    pub session_id: String,
    pub tracked_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackFilePayload {
    pub url: String,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub session_id: String,
}

/// Where uploaded assets live, used to turn public URLs back into S3 keys
#[derive(Debug, Clone)]
pub struct AssetLocation {
    pub bucket: String,
    /// Public prefix such as a CDN domain; URLs under it map to `bucket`
    pub base_url: Option<String>,
}

impl AssetLocation {
    pub fn public_url(&self, key: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!("https://{}.s3.amazonaws.com/{}", self.bucket, key),
        }
    }

    /// Bucket and key of a gallery upload in the asset bucket. URLs in other
    /// buckets, or outside `projects/<pid>/gallery/`, map to `None`.
    pub fn locate(&self, url: &str) -> Option<(String, String)> {
        let under_base = self
            .base_url
            .as_deref()
            .and_then(|base| url.strip_prefix(base.trim_end_matches('/')))
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_string);
        let key = match under_base {
            Some(key) => key,
            None => {
                let (bucket, key) = parse_bucket_and_key(url)?;
                if bucket != self.bucket {
                    return None;
                }
                key
            }
        };
        gallery_key_project(&key)?;
        Some((self.bucket.clone(), key))
    }
}

pub fn gallery_key_prefix(project_id: &str) -> String {
    format!("projects/{}/gallery/", project_id)
}

/// Project id of a key shaped `projects/<pid>/gallery/<file>`
pub fn gallery_key_project(key: &str) -> Option<&str> {
    let parts: Vec<&str> = key.split('/').collect();
    match parts.as_slice() {
        ["projects", pid, "gallery", file] if !pid.is_empty() && !file.is_empty() => Some(pid),
        _ => None,
    }
}

// Parse bucket and key from an S3 URL like https://bucket.s3.amazonaws.com/key or https://s3.<region>.amazonaws.com/bucket/key
pub fn parse_bucket_and_key(url: &str) -> Option<(String, String)> {
    let no_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let (host, path) = no_scheme.split_once('/')?;
    if !host.contains(".amazonaws.com") || path.is_empty() {
        return None;
    }

    let (bucket, key) = if host.starts_with("s3.") || host.starts_with("s3-") {
        // s3.region.amazonaws.com/bucket/key
        let (bucket, key) = path.split_once('/')?;
        (bucket.to_string(), key.to_string())
    } else {
        // bucket.s3.amazonaws.com/key
        (host.split(".s3").next()?.to_string(), path.to_string())
    };

    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    Some((bucket, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_virtual_hosted_urls() {
        assert_eq!(
            parse_bucket_and_key("https://assets.s3.ap-southeast-2.amazonaws.com/projects/p1/gallery/a.jpg"),
            Some(("assets".to_string(), "projects/p1/gallery/a.jpg".to_string()))
        );
    }

    #[test]
    fn parses_path_style_urls() {
        assert_eq!(
            parse_bucket_and_key("https://s3.us-east-1.amazonaws.com/assets/x/y.png"),
            Some(("assets".to_string(), "x/y.png".to_string()))
        );
    }

    #[test]
    fn rejects_foreign_urls() {
        assert_eq!(parse_bucket_and_key("https://example.com/a.jpg"), None);
        assert_eq!(parse_bucket_and_key("https://assets.s3.amazonaws.com/"), None);
    }

    #[test]
    fn cdn_urls_map_to_the_asset_bucket() {
        let location = AssetLocation {
            bucket: "assets".to_string(),
            base_url: Some("https://cdn.example.com/".to_string()),
        };
        let url = location.public_url("projects/p1/gallery/a.jpg");
        assert_eq!(url, "https://cdn.example.com/projects/p1/gallery/a.jpg");
        assert_eq!(
            location.locate(&url),
            Some(("assets".to_string(), "projects/p1/gallery/a.jpg".to_string()))
        );
    }

    #[test]
    fn only_gallery_keys_in_the_asset_bucket_are_located() {
        let location = AssetLocation {
            bucket: "buildsite-assets".to_string(),
            base_url: None,
        };
        assert_eq!(location.locate("https://payroll-archive.s3.amazonaws.com/2024/ledger.xlsx"), None);
        assert_eq!(
            location.locate("https://payroll-archive.s3.amazonaws.com/projects/p1/gallery/a.jpg"),
            None
        );
        assert_eq!(location.locate("https://buildsite-assets.s3.amazonaws.com/contracts/p1.pdf"), None);
        assert_eq!(
            location.locate("https://buildsite-assets.s3.amazonaws.com/projects/p1/gallery/a.jpg"),
            Some(("buildsite-assets".to_string(), "projects/p1/gallery/a.jpg".to_string()))
        );
    }

    #[test]
    fn cdn_prefix_must_end_at_a_path_boundary() {
        let location = AssetLocation {
            bucket: "assets".to_string(),
            base_url: Some("https://cdn.example.com".to_string()),
        };
        assert_eq!(location.locate("https://cdn.example.com.evil.net/projects/p1/gallery/a.jpg"), None);
        assert_eq!(location.locate("https://cdn.example.com/projects/p1/other/a.jpg"), None);
    }

    #[test]
    fn gallery_keys_name_their_project() {
        assert_eq!(gallery_key_project("projects/p7/gallery/a.png"), Some("p7"));
        assert_eq!(gallery_key_project(&format!("{}x.jpg", gallery_key_prefix("p7"))), Some("p7"));
        assert_eq!(gallery_key_project("projects//gallery/a.png"), None);
        assert_eq!(gallery_key_project("projects/p7/gallery/nested/a.png"), None);
        assert_eq!(gallery_key_project("projects/p7/gallery/"), None);
    }

    #[test]
    fn file_keys_are_stable_digests() {
        let a = file_sk("https://cdn/a.jpg");
        assert_eq!(a, file_sk("https://cdn/a.jpg"));
        assert_ne!(a, file_sk("https://cdn/b.jpg"));
        assert_eq!(a.len(), FILE_SK_PREFIX.len() + 64);
    }
}
