use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use gallery_block::pending::validate_order;
use gallery_block::reconciler::enforce_single_feature;
use gallery_block::{GalleryImage, GalleryImageChanges, NewGalleryImage};
use serde::Deserialize;

pub const GALLERY_SK_PREFIX: &str = "GALLERY#";

pub fn project_pk(project_id: &str) -> String {
    format!("PROJECT#{}", project_id)
}

pub fn gallery_sk(image_id: &str) -> String {
    format!("{}{}", GALLERY_SK_PREFIX, image_id)
}

/// POST /projects/{pid}/gallery body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGalleryImagePayload {
    pub image_url: String,
    #[serde(default)]
    pub caption: String,
    pub display_order: Option<i32>,
    #[serde(default)]
    pub is_feature: bool,
}

impl CreateGalleryImagePayload {
    pub fn validate(&self) -> Result<(), String> {
        if self.image_url.trim().is_empty() {
            return Err("imageUrl is required".to_string());
        }
        check_order(self.display_order)
    }

    pub fn into_record(self, project_id: &str, fallback_order: i32) -> NewGalleryImage {
        NewGalleryImage {
            project_id: project_id.to_string(),
            image_url: self.image_url,
            caption: self.caption,
            display_order: self.display_order.unwrap_or(fallback_order),
            is_feature: self.is_feature,
        }
    }
}

/// PATCH /projects/{pid}/gallery/{id} body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGalleryImagePayload {
    pub caption: Option<String>,
    pub display_order: Option<i32>,
    pub is_feature: Option<bool>,
}

impl UpdateGalleryImagePayload {
    pub fn validate(&self) -> Result<(), String> {
        check_order(self.display_order)
    }
}

fn check_order(order: Option<i32>) -> Result<(), String> {
    order.map_or(Ok(()), validate_order).map_err(|e| e.to_string())
}

impl From<UpdateGalleryImagePayload> for GalleryImageChanges {
    fn from(payload: UpdateGalleryImagePayload) -> Self {
        Self {
            caption: payload.caption,
            display_order: payload.display_order,
            is_feature: payload.is_feature,
        }
    }
}

/// Parse a gallery row. Returns `None` for rows that are not gallery images.
pub fn item_to_gallery_image(project_id: &str, item: &HashMap<String, AttributeValue>) -> Option<GalleryImage> {
    let sk = item.get("SK").and_then(|v| v.as_s().ok())?;
    let image_id = sk.strip_prefix(GALLERY_SK_PREFIX)?;

    Some(GalleryImage {
        id: image_id.to_string(),
        project_id: project_id.to_string(),
        image_url: item.get("image_url").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        caption: item.get("caption").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        display_order: item.get("display_order").and_then(|v| v.as_n().ok()).and_then(|n| n.parse().ok()).unwrap_or(0),
        is_feature: item.get("is_feature").and_then(|v| v.as_bool().ok()).copied().unwrap_or(false),
        created_at: item.get("created_at").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
    })
}

/// Row that should take the feature flag when none of `images` carries it
pub fn feature_to_promote(mut images: Vec<GalleryImage>) -> Option<String> {
    images.sort_by_key(|img| img.display_order);
    let changed = enforce_single_feature(&mut images);
    images
        .into_iter()
        .find(|img| img.is_feature && changed.contains(&img.id))
        .map(|img| img.id)
}
