//! AWS-backed implementations of the gallery session's collaborators.

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use buildsite_atoms::{gallery as gallery_atoms, uploads::{self, AssetLocation}};
use gallery_block::{
    Collaborators, FileTracker, GalleryImage, GalleryImageChanges, GalleryStore, NewGalleryImage, PendingImage,
    RecoverySnapshot, SelectedFile, UploadProvider,
};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::AppState;

const SNAPSHOT_PK: &str = "PENDING";

/// Wire a session for `project_id` to the Lambda's clients
pub fn collaborators(state: &AppState, project_id: &str) -> Collaborators {
    let table = state.config.table_name.clone();
    Collaborators {
        uploads: Arc::new(S3UploadProvider::new(
            state.s3_client.clone(),
            state.config.asset_location(),
            project_id,
        )),
        gallery: Arc::new(DynamoGalleryStore::new(state.dynamo_client.clone(), &table, project_id)),
        files: Arc::new(DynamoFileTracker::new(
            state.dynamo_client.clone(),
            state.s3_client.clone(),
            &table,
            state.config.asset_location(),
        )),
        snapshot: Arc::new(DynamoSnapshot::new(state.dynamo_client.clone(), &table)),
    }
}

// ========== GALLERY STORE ==========

/// Gallery rows of one project
pub struct DynamoGalleryStore {
    client: DynamoClient,
    table_name: String,
    project_id: String,
}

impl DynamoGalleryStore {
    pub fn new(client: DynamoClient, table_name: &str, project_id: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
            project_id: project_id.to_string(),
        }
    }
}

#[async_trait]
impl GalleryStore for DynamoGalleryStore {
    async fn add_project_gallery_image(&self, record: NewGalleryImage) -> Result<GalleryImage, String> {
        if record.project_id != self.project_id {
            return Err(format!(
                "Record for project {} sent to gallery of project {}",
                record.project_id, self.project_id
            ));
        }
        gallery_atoms::create_gallery_image(&self.client, &self.table_name, record).await
    }

    async fn update_project_gallery_image(
        &self,
        id: &str,
        changes: GalleryImageChanges,
    ) -> Result<GalleryImage, String> {
        gallery_atoms::update_gallery_image(&self.client, &self.table_name, &self.project_id, id, changes).await
    }

    async fn delete_project_gallery_image(&self, id: &str) -> Result<(), String> {
        match gallery_atoms::delete_gallery_image(&self.client, &self.table_name, &self.project_id, id).await {
            Ok(_) => Ok(()),
            Err(e) if e == gallery_atoms::IMAGE_NOT_FOUND => {
                tracing::warn!("Gallery image {} was already deleted", id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn get_project_gallery(&self, project_id: &str) -> Result<Vec<GalleryImage>, String> {
        gallery_atoms::list_gallery_images(&self.client, &self.table_name, project_id).await
    }
}

// ========== FILE TRACKER ==========

pub struct DynamoFileTracker {
    dynamo: DynamoClient,
    s3: S3Client,
    table_name: String,
    location: AssetLocation,
}

impl DynamoFileTracker {
    pub fn new(dynamo: DynamoClient, s3: S3Client, table_name: &str, location: AssetLocation) -> Self {
        Self {
            dynamo,
            s3,
            table_name: table_name.to_string(),
            location,
        }
    }
}

#[async_trait]
impl FileTracker for DynamoFileTracker {
    async fn track_file(&self, url: &str, session_id: &str) -> Result<(), String> {
        uploads::track_file(&self.dynamo, &self.table_name, url, session_id).await
    }

    async fn cleanup_files(&self, session_id: &str) -> Result<Vec<String>, String> {
        uploads::cleanup_files(&self.dynamo, &self.s3, &self.table_name, &self.location, session_id).await
    }

    async fn commit_files(&self, session_id: &str) -> Result<(), String> {
        uploads::commit_files(&self.dynamo, &self.table_name, session_id).await.map(|_| ())
    }
}

// ========== UPLOAD PROVIDER ==========

/// Object key for a new gallery upload
pub fn gallery_object_key(project_id: &str, file: &SelectedFile) -> String {
    let ext = file
        .extension()
        .map(|e| e.to_ascii_lowercase())
        .or_else(|| {
            image::guess_format(&file.bytes)
                .ok()
                .and_then(|f| f.extensions_str().first().map(|e| e.to_string()))
        })
        .unwrap_or_else(|| "bin".to_string());
    format!("{}{}.{}", uploads::model::gallery_key_prefix(project_id), uuid::Uuid::new_v4(), ext)
}

/// Uploads queued files to S3 one at a time, in queue order
pub struct S3UploadProvider {
    s3: S3Client,
    location: AssetLocation,
    project_id: String,
    queue: Mutex<Vec<SelectedFile>>,
}

impl S3UploadProvider {
    pub fn new(s3: S3Client, location: AssetLocation, project_id: &str) -> Self {
        Self {
            s3,
            location,
            project_id: project_id.to_string(),
            queue: Mutex::new(Vec::new()),
        }
    }

    async fn put(&self, file: &SelectedFile) -> Result<String, String> {
        let key = gallery_object_key(&self.project_id, file);
        let content_type = if file.content_type.is_empty() {
            "application/octet-stream"
        } else {
            file.content_type.as_str()
        };

        self.s3
            .put_object()
            .bucket(&self.location.bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(file.bytes.clone()))
            .send()
            .await
            .map_err(|e| format!("S3 put_object error for {}: {}", file.name, e))?;

        Ok(self.location.public_url(&key))
    }
}

#[async_trait]
impl UploadProvider for S3UploadProvider {
    async fn add_files(&self, files: Vec<SelectedFile>) {
        self.queue.lock().await.extend(files);
    }

    /// Stops at the first failed put. Uploaded files leave the queue and
    /// their URLs are returned; if nothing uploaded the error is returned.
    async fn upload(&self) -> Result<Vec<String>, String> {
        let mut queue = self.queue.lock().await;
        let mut urls = Vec::with_capacity(queue.len());
        let mut failure = None;

        for file in queue.iter() {
            match self.put(file).await {
                Ok(url) => urls.push(url),
                Err(e) => {
                    tracing::error!("{}", e);
                    failure = Some(e);
                    break;
                }
            }
        }

        queue.drain(..urls.len());
        match failure {
            Some(e) if urls.is_empty() => Err(e),
            _ => Ok(urls),
        }
    }

    async fn remove_file(&self, index: usize) {
        let mut queue = self.queue.lock().await;
        if index < queue.len() {
            let file = queue.remove(index);
            tracing::info!("Dropped {} from upload queue", file.name);
        }
    }

    async fn clear_files(&self, commit: bool) {
        let mut queue = self.queue.lock().await;
        if !commit && !queue.is_empty() {
            tracing::info!("Discarding {} queued upload(s) for project {}", queue.len(), self.project_id);
        }
        queue.clear();
    }
}

// ========== RECOVERY SNAPSHOT ==========

/// Pending sets stored as JSON under `PK = PENDING`
pub struct DynamoSnapshot {
    client: DynamoClient,
    table_name: String,
}

impl DynamoSnapshot {
    pub fn new(client: DynamoClient, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }
}

#[async_trait]
impl RecoverySnapshot for DynamoSnapshot {
    async fn load(&self, key: &str) -> Result<Option<Vec<PendingImage>>, String> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(SNAPSHOT_PK.to_string()))
            .key("SK", AttributeValue::S(key.to_string()))
            .send()
            .await
            .map_err(|e| format!("DynamoDB get_item error: {}", e))?;

        match result.item().and_then(|item| item.get("images")).and_then(|v| v.as_s().ok()) {
            Some(json) => serde_json::from_str(json)
                .map(Some)
                .map_err(|e| format!("Failed to parse snapshot {}: {}", key, e)),
            None => Ok(None),
        }
    }

    async fn save(&self, key: &str, images: &[PendingImage]) -> Result<(), String> {
        let json = serde_json::to_string(images).map_err(|e| format!("Failed to serialize snapshot: {}", e))?;
        self.client
            .put_item()
            .table_name(&self.table_name)
            .item("PK", AttributeValue::S(SNAPSHOT_PK.to_string()))
            .item("SK", AttributeValue::S(key.to_string()))
            .item("images", AttributeValue::S(json))
            .item("updated_at", AttributeValue::S(chrono::Utc::now().to_rfc3339()))
            .send()
            .await
            .map_err(|e| format!("DynamoDB put_item error: {}", e))?;
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), String> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(SNAPSHOT_PK.to_string()))
            .key("SK", AttributeValue::S(key.to_string()))
            .send()
            .await
            .map_err(|e| format!("DynamoDB delete_item error: {}", e))?;
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, String> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(SNAPSHOT_PK.to_string()))
            .key("SK", AttributeValue::S(key.to_string()))
            .projection_expression("SK")
            .send()
            .await
            .map_err(|e| format!("DynamoDB get_item error: {}", e))?;
        Ok(result.item().is_some())
    }
}
