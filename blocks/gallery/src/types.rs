use serde::{Deserialize, Serialize};

// ========== GALLERY IMAGE (persisted) ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    pub id: String,
    pub project_id: String,
    pub image_url: String,
    pub caption: String,
    pub display_order: i32,
    pub is_feature: bool,
    #[serde(default)]
    pub created_at: String,
}

/// Creation record sent to the persistence layer on save
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewGalleryImage {
    pub project_id: String,
    pub image_url: String,
    pub caption: String,
    pub display_order: i32,
    pub is_feature: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImageChanges {
    pub caption: Option<String>,
    pub display_order: Option<i32>,
    pub is_feature: Option<bool>,
}

impl GalleryImageChanges {
    pub fn is_empty(&self) -> bool {
        self.caption.is_none() && self.display_order.is_none() && self.is_feature.is_none()
    }

    /// Full overwrite of the mutable fields of `image`
    pub fn from_image(image: &GalleryImage) -> Self {
        Self {
            caption: Some(image.caption.clone()),
            display_order: Some(image.display_order),
            is_feature: Some(image.is_feature),
        }
    }
}

// ========== PENDING IMAGE (client-owned, not yet saved) ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingImage {
    pub local_id: String,
    #[serde(default)]
    pub upload_url: Option<String>,
    pub caption: String,
    pub display_order: i32,
    pub is_feature: bool,
    pub uploaded: bool,
    #[serde(default)]
    pub file_name: String,
}

impl PendingImage {
    pub fn new(file_name: &str, display_order: i32) -> Self {
        Self {
            local_id: format!("pending-{}", uuid::Uuid::new_v4()),
            upload_url: None,
            caption: provisional_caption(file_name),
            display_order,
            is_feature: false,
            uploaded: false,
            file_name: file_name.to_string(),
        }
    }

    /// URL is ready and the entry can be turned into a creation record
    pub fn is_resolved(&self) -> bool {
        self.uploaded && self.upload_url.is_some()
    }
}

/// Caption shown before the user types one: the filename without its extension
pub fn provisional_caption(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    match base.rfind('.') {
        Some(dot) if dot > 0 => base[..dot].to_string(),
        _ => base.to_string(),
    }
}

// ========== SELECTED FILE ==========
/// A file picked or dropped by the user. Bytes only travel to the upload provider.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn extension(&self) -> Option<&str> {
        let (_, ext) = self.name.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext)
        }
    }
}

impl std::fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

// ========== MERGED VIEW ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Saved,
    Uploaded,
    Uploading,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GalleryEntry {
    pub id: String,
    pub image_url: Option<String>,
    pub caption: String,
    pub display_order: i32,
    pub is_feature: bool,
    pub status: EntryStatus,
}

impl From<&GalleryImage> for GalleryEntry {
    fn from(image: &GalleryImage) -> Self {
        Self {
            id: image.id.clone(),
            image_url: Some(image.image_url.clone()),
            caption: image.caption.clone(),
            display_order: image.display_order,
            is_feature: image.is_feature,
            status: EntryStatus::Saved,
        }
    }
}

impl From<&PendingImage> for GalleryEntry {
    fn from(image: &PendingImage) -> Self {
        Self {
            id: image.local_id.clone(),
            image_url: image.upload_url.clone(),
            caption: image.caption.clone(),
            display_order: image.display_order,
            is_feature: image.is_feature,
            status: if image.is_resolved() {
                EntryStatus::Uploaded
            } else {
                EntryStatus::Uploading
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisional_caption_strips_extension_and_path() {
        assert_eq!(provisional_caption("site-visit.jpg"), "site-visit");
        assert_eq!(provisional_caption("uploads/slab.pour.png"), "slab.pour");
        assert_eq!(provisional_caption(".hidden"), ".hidden");
        assert_eq!(provisional_caption("noext"), "noext");
    }

    #[test]
    fn pending_image_serializes_camel_case() {
        let mut image = PendingImage::new("frame.jpg", 3);
        image.upload_url = Some("https://cdn.example.com/frame.jpg".to_string());
        image.uploaded = true;

        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["displayOrder"], 3);
        assert_eq!(json["uploadUrl"], "https://cdn.example.com/frame.jpg");
        assert!(json["localId"].as_str().unwrap().starts_with("pending-"));
    }

    #[test]
    fn selected_file_debug_hides_bytes() {
        let file = SelectedFile::new("a.png", "image/png", vec![1, 2, 3]);
        let printed = format!("{:?}", file);
        assert!(printed.contains("size: 3"));
        assert_eq!(file.extension(), Some("png"));
    }
}
