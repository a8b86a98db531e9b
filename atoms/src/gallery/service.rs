use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use gallery_block::{GalleryImage, GalleryImageChanges, NewGalleryImage};
use std::collections::HashMap;

use super::model::{feature_to_promote, gallery_sk, item_to_gallery_image, project_pk, GALLERY_SK_PREFIX};

pub const IMAGE_NOT_FOUND: &str = "Gallery image not found";

/// All gallery rows for a project, sorted by display order
pub async fn list_gallery_images(
    client: &DynamoClient,
    table_name: &str,
    project_id: &str,
) -> Result<Vec<GalleryImage>, String> {
    let mut images = Vec::new();
    let mut last_key: Option<HashMap<String, AttributeValue>> = None;

    loop {
        let result = client
            .query()
            .table_name(table_name)
            .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
            .expression_attribute_values(":pk", AttributeValue::S(project_pk(project_id)))
            .expression_attribute_values(":sk_prefix", AttributeValue::S(GALLERY_SK_PREFIX.to_string()))
            .set_exclusive_start_key(last_key)
            .send()
            .await
            .map_err(|e| format!("DynamoDB query error: {}", e))?;

        images.extend(result.items().iter().filter_map(|item| item_to_gallery_image(project_id, item)));

        last_key = result.last_evaluated_key().cloned();
        if last_key.is_none() {
            break;
        }
    }

    images.sort_by_key(|img| img.display_order);
    Ok(images)
}

pub async fn get_gallery_image(
    client: &DynamoClient,
    table_name: &str,
    project_id: &str,
    image_id: &str,
) -> Result<GalleryImage, String> {
    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(project_pk(project_id)))
        .key("SK", AttributeValue::S(gallery_sk(image_id)))
        .send()
        .await
        .map_err(|e| format!("DynamoDB get_item error: {}", e))?;

    result
        .item()
        .and_then(|item| item_to_gallery_image(project_id, item))
        .ok_or_else(|| IMAGE_NOT_FOUND.to_string())
}

/// Create a gallery row. A featured row clears the flag on every other row.
pub async fn create_gallery_image(
    client: &DynamoClient,
    table_name: &str,
    record: NewGalleryImage,
) -> Result<GalleryImage, String> {
    let image_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(project_pk(&record.project_id)))
        .item("SK", AttributeValue::S(gallery_sk(&image_id)))
        .item("image_url", AttributeValue::S(record.image_url.clone()))
        .item("caption", AttributeValue::S(record.caption.clone()))
        .item("display_order", AttributeValue::N(record.display_order.to_string()))
        .item("is_feature", AttributeValue::Bool(record.is_feature))
        .item("created_at", AttributeValue::S(now.clone()))
        .send()
        .await
        .map_err(|e| format!("DynamoDB put_item error: {}", e))?;

    if record.is_feature {
        clear_other_features(client, table_name, &record.project_id, &image_id).await?;
    }

    tracing::info!("Created gallery image {} for project {}", image_id, record.project_id);

    Ok(GalleryImage {
        id: image_id,
        project_id: record.project_id,
        image_url: record.image_url,
        caption: record.caption,
        display_order: record.display_order,
        is_feature: record.is_feature,
        created_at: now,
    })
}

/// Partial update; only the fields present in `changes` are written
pub async fn update_gallery_image(
    client: &DynamoClient,
    table_name: &str,
    project_id: &str,
    image_id: &str,
    changes: GalleryImageChanges,
) -> Result<GalleryImage, String> {
    let mut update_expr = vec![];
    let mut expr_values = HashMap::new();

    if let Some(caption) = &changes.caption {
        update_expr.push("caption = :caption");
        expr_values.insert(":caption".to_string(), AttributeValue::S(caption.clone()));
    }

    if let Some(order) = changes.display_order {
        update_expr.push("display_order = :display_order");
        expr_values.insert(":display_order".to_string(), AttributeValue::N(order.to_string()));
    }

    if let Some(is_feature) = changes.is_feature {
        update_expr.push("is_feature = :is_feature");
        expr_values.insert(":is_feature".to_string(), AttributeValue::Bool(is_feature));
    }

    if !update_expr.is_empty() {
        let update_expression = format!("SET {}", update_expr.join(", "));

        let mut builder = client
            .update_item()
            .table_name(table_name)
            .key("PK", AttributeValue::S(project_pk(project_id)))
            .key("SK", AttributeValue::S(gallery_sk(image_id)))
            .update_expression(update_expression)
            .condition_expression("attribute_exists(SK)");

        for (k, v) in expr_values {
            builder = builder.expression_attribute_values(k, v);
        }

        builder.send().await.map_err(|e| {
            if e.as_service_error().map(|se| se.is_conditional_check_failed_exception()) == Some(true) {
                IMAGE_NOT_FOUND.to_string()
            } else {
                format!("DynamoDB update_item error: {}", e)
            }
        })?;
    }

    if changes.is_feature == Some(true) {
        clear_other_features(client, table_name, project_id, image_id).await?;
    }

    get_gallery_image(client, table_name, project_id, image_id).await
}

/// Delete one row. When it carried the feature flag, the first remaining row
/// by display order takes it over; the promoted id is returned.
pub async fn delete_gallery_image(
    client: &DynamoClient,
    table_name: &str,
    project_id: &str,
    image_id: &str,
) -> Result<Option<String>, String> {
    let output = client
        .delete_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(project_pk(project_id)))
        .key("SK", AttributeValue::S(gallery_sk(image_id)))
        .return_values(ReturnValue::AllOld)
        .send()
        .await
        .map_err(|e| format!("DynamoDB delete_item error: {}", e))?;

    let old = output.attributes().ok_or_else(|| IMAGE_NOT_FOUND.to_string())?;
    tracing::info!("Deleted gallery image {} from project {}", image_id, project_id);

    let was_feature = old.get("is_feature").and_then(|v| v.as_bool().ok()).copied().unwrap_or(false);
    if !was_feature {
        return Ok(None);
    }
    repair_feature(client, table_name, project_id).await
}

/// Give the feature flag to the first row by display order when no row has it
pub async fn repair_feature(
    client: &DynamoClient,
    table_name: &str,
    project_id: &str,
) -> Result<Option<String>, String> {
    let images = list_gallery_images(client, table_name, project_id).await?;
    let Some(promoted) = feature_to_promote(images) else {
        return Ok(None);
    };

    client
        .update_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(project_pk(project_id)))
        .key("SK", AttributeValue::S(gallery_sk(&promoted)))
        .update_expression("SET is_feature = :true")
        .condition_expression("attribute_exists(PK)")
        .expression_attribute_values(":true", AttributeValue::Bool(true))
        .send()
        .await
        .map_err(|e| format!("DynamoDB update_item error: {}", e))?;

    tracing::info!("Promoted gallery image {} to feature in project {}", promoted, project_id);
    Ok(Some(promoted))
}

/// Unset `is_feature` on every row except `keep_id`
pub async fn clear_other_features(
    client: &DynamoClient,
    table_name: &str,
    project_id: &str,
    keep_id: &str,
) -> Result<Vec<String>, String> {
    let images = list_gallery_images(client, table_name, project_id).await?;
    let mut cleared = Vec::new();

    for image in images.iter().filter(|img| img.is_feature && img.id != keep_id) {
        client
            .update_item()
            .table_name(table_name)
            .key("PK", AttributeValue::S(project_pk(project_id)))
            .key("SK", AttributeValue::S(gallery_sk(&image.id)))
            .update_expression("SET is_feature = :false")
            .expression_attribute_values(":false", AttributeValue::Bool(false))
            .send()
            .await
            .map_err(|e| format!("DynamoDB update_item error: {}", e))?;
        cleared.push(image.id.clone());
    }

    if !cleared.is_empty() {
        tracing::info!("Cleared feature flag on {:?} in project {}", cleared, project_id);
    }
    Ok(cleared)
}
