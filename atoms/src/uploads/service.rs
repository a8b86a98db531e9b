use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_dynamodb::types::{AttributeValue, DeleteRequest, WriteRequest};
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Duration;
use tokio::time::sleep;

use super::model::{file_sk, gallery_key_project, session_pk, AssetLocation, TrackedFile, FILE_SK_PREFIX};
use crate::gallery::service::list_gallery_images;

/// Record `url` as owned by `session_id`. Tracking the same URL twice is a no-op.
pub async fn track_file(
    client: &DynamoClient,
    table_name: &str,
    url: &str,
    session_id: &str,
) -> Result<(), String> {
    client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(session_pk(session_id)))
        .item("SK", AttributeValue::S(file_sk(url)))
        .item("url", AttributeValue::S(url.to_string()))
        .item("session_id", AttributeValue::S(session_id.to_string()))
        .item("tracked_at", AttributeValue::S(chrono::Utc::now().to_rfc3339()))
        .send()
        .await
        .map_err(|e| format!("DynamoDB put_item error: {}", e))?;

    tracing::info!("Tracking {} for upload session {}", url, session_id);
    Ok(())
}

pub async fn list_tracked_files(
    client: &DynamoClient,
    table_name: &str,
    session_id: &str,
) -> Result<Vec<TrackedFile>, String> {
    let mut files = Vec::new();
    let mut last_key: Option<HashMap<String, AttributeValue>> = None;

    loop {
        let result = client
            .query()
            .table_name(table_name)
            .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
            .expression_attribute_values(":pk", AttributeValue::S(session_pk(session_id)))
            .expression_attribute_values(":sk_prefix", AttributeValue::S(FILE_SK_PREFIX.to_string()))
            .set_exclusive_start_key(last_key)
            .send()
            .await
            .map_err(|e| format!("DynamoDB query error: {}", e))?;

        for item in result.items() {
            if let Some(url) = item.get("url").and_then(|v| v.as_s().ok()) {
                files.push(TrackedFile {
                    url: url.to_string(),
                    session_id: session_id.to_string(),
                    tracked_at: item.get("tracked_at").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
                });
            }
        }

        last_key = result.last_evaluated_key().cloned();
        if last_key.is_none() {
            break;
        }
    }

    Ok(files)
}

/// Delete every object tracked for the session and drop the tracking rows.
///
/// Returns the URLs whose objects were actually removed. Rows for objects S3
/// refused to delete are kept so a later cleanup can retry them. Rows for URLs
/// that are not gallery uploads in the asset bucket, or that a saved gallery
/// image still uses, are dropped without touching S3.
pub async fn cleanup_files(
    dynamo: &DynamoClient,
    s3: &S3Client,
    table_name: &str,
    location: &AssetLocation,
    session_id: &str,
) -> Result<Vec<String>, String> {
    let files = list_tracked_files(dynamo, table_name, session_id).await?;
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let mut located = Vec::new();
    let mut settled = Vec::new();
    for file in files {
        match location.locate(&file.url) {
            Some((bucket, key)) => located.push((bucket, key, file.url)),
            None => {
                tracing::warn!("{} is not a gallery upload, dropping its tracking row", file.url);
                settled.push(file.url);
            }
        }
    }

    let saved = saved_gallery_keys(dynamo, table_name, location, located.iter().map(|(_, key, _)| key.as_str())).await?;
    let mut by_bucket: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for (bucket, key, url) in located {
        if saved.contains(&key) {
            tracing::warn!("{} belongs to a saved gallery image, dropping its tracking row", url);
            settled.push(url);
        } else {
            by_bucket.entry(bucket).or_default().push((key, url));
        }
    }

    let mut removed = Vec::new();
    for (bucket, objects) in &by_bucket {
        for chunk in objects.chunks(1000) {
            let failed = delete_objects(s3, bucket, chunk).await;
            for (key, url) in chunk {
                if !failed.contains(key) {
                    removed.push(url.clone());
                }
            }
        }
    }
    settled.extend(removed.iter().cloned());

    let keys: Vec<HashMap<String, AttributeValue>> = settled.iter().map(|url| tracking_key(session_id, url)).collect();
    batch_delete_items(dynamo, table_name, &keys).await?;

    tracing::info!(
        "Cleaned up upload session {}: {} object(s) removed",
        session_id,
        removed.len()
    );
    Ok(removed)
}

/// Object keys of saved gallery images in every project the keys belong to
async fn saved_gallery_keys<'a>(
    client: &DynamoClient,
    table_name: &str,
    location: &AssetLocation,
    keys: impl Iterator<Item = &'a str>,
) -> Result<HashSet<String>, String> {
    let projects: BTreeSet<&str> = keys.filter_map(gallery_key_project).collect();
    let mut saved = HashSet::new();
    for project_id in projects {
        for image in list_gallery_images(client, table_name, project_id).await? {
            if let Some((_, key)) = location.locate(&image.image_url) {
                saved.insert(key);
            }
        }
    }
    Ok(saved)
}

/// Release tracking for the session without deleting any objects
pub async fn commit_files(client: &DynamoClient, table_name: &str, session_id: &str) -> Result<usize, String> {
    let files = list_tracked_files(client, table_name, session_id).await?;
    let keys: Vec<HashMap<String, AttributeValue>> =
        files.iter().map(|file| tracking_key(session_id, &file.url)).collect();
    batch_delete_items(client, table_name, &keys).await?;

    tracing::info!("Committed upload session {} ({} tracked file(s))", session_id, keys.len());
    Ok(keys.len())
}

/// Delete one batch of keys; returns the keys S3 reported as failed
async fn delete_objects(s3: &S3Client, bucket: &str, objects: &[(String, String)]) -> HashSet<String> {
    let all_keys = || objects.iter().map(|(key, _)| key.clone()).collect::<HashSet<_>>();

    let identifiers: Vec<ObjectIdentifier> = objects
        .iter()
        .filter_map(|(key, _)| ObjectIdentifier::builder().key(key).build().ok())
        .collect();
    let delete = match Delete::builder().set_objects(Some(identifiers)).quiet(true).build() {
        Ok(d) => d,
        Err(e) => {
            tracing::error!("Failed to build S3 delete payload: {:?}", e);
            return all_keys();
        }
    };

    match s3.delete_objects().bucket(bucket).delete(delete).send().await {
        Ok(output) => {
            let failed: HashSet<String> = output.errors().iter().filter_map(|e| e.key().map(|k| k.to_string())).collect();
            for err in output.errors() {
                tracing::warn!(
                    "S3 refused to delete {}/{}: {}",
                    bucket,
                    err.key().unwrap_or_default(),
                    err.message().unwrap_or_default()
                );
            }
            failed
        }
        Err(e) => {
            tracing::error!("S3 delete_objects failed for bucket {}: {}", bucket, e);
            all_keys()
        }
    }
}

fn tracking_key(session_id: &str, url: &str) -> HashMap<String, AttributeValue> {
    let mut key = HashMap::new();
    key.insert("PK".to_string(), AttributeValue::S(session_pk(session_id)));
    key.insert("SK".to_string(), AttributeValue::S(file_sk(url)));
    key
}

/// Batch delete items from DynamoDB (25 items per request with retry logic)
async fn batch_delete_items(
    client: &DynamoClient,
    table_name: &str,
    delete_keys: &[HashMap<String, AttributeValue>],
) -> Result<(), String> {
    for chunk in delete_keys.chunks(25) {
        let write_reqs = chunk
            .iter()
            .map(|k| {
                DeleteRequest::builder()
                    .set_key(Some(k.clone()))
                    .build()
                    .map(|req| WriteRequest::builder().delete_request(req).build())
                    .map_err(|e| format!("Failed to build delete request: {}", e))
            })
            .collect::<Result<Vec<_>, String>>()?;

        let mut unprocessed = Some(write_reqs);
        let mut attempts = 0;
        while let Some(reqs) = unprocessed {
            attempts += 1;
            let result = client
                .batch_write_item()
                .request_items(table_name, reqs)
                .send()
                .await
                .map_err(|e| format!("DynamoDB batch_write_item error: {}", e))?;

            unprocessed = result
                .unprocessed_items()
                .and_then(|m| m.get(table_name))
                .filter(|reqs| !reqs.is_empty())
                .cloned();

            if unprocessed.is_some() && attempts < 5 {
                sleep(Duration::from_millis(100 * attempts)).await;
            } else {
                break;
            }
        }
    }

    Ok(())
}
