use aws_sdk_dynamodb::Client as DynamoClient;
use gallery_block::reconciler::{enforce_single_feature_on_load, next_display_order};
use lambda_http::{Body, Error as LambdaError, Response, http::StatusCode};
use super::model::{CreateGalleryImagePayload, UpdateGalleryImagePayload};
use super::service::{
    create_gallery_image, delete_gallery_image, list_gallery_images, update_gallery_image, IMAGE_NOT_FOUND,
};

fn json_response(status: StatusCode, body: String) -> Result<Response<Body>, LambdaError> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(body.into())
        .map_err(Box::new)?)
}

fn error_response(status: StatusCode, message: &str) -> Result<Response<Body>, LambdaError> {
    json_response(status, serde_json::json!({"error": message}).to_string())
}

/// HTTP Handler: GET /projects/{pid}/gallery
///
/// Rows are returned in display order with exactly one feature when the
/// gallery is non-empty.
pub async fn list_gallery_handler(
    client: &DynamoClient,
    table_name: &str,
    project_id: &str,
) -> Result<Response<Body>, LambdaError> {
    match list_gallery_images(client, table_name, project_id).await {
        Ok(images) => json_response(StatusCode::OK, serde_json::to_string(&enforce_single_feature_on_load(images))?),
        Err(e) => {
            tracing::error!("Failed to list gallery for {}: {}", project_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e)
        }
    }
}

/// HTTP Handler: POST /projects/{pid}/gallery
pub async fn create_gallery_image_handler(
    client: &DynamoClient,
    table_name: &str,
    project_id: &str,
    body: &[u8],
) -> Result<Response<Body>, LambdaError> {
    let payload: CreateGalleryImagePayload = match serde_json::from_slice(body) {
        Ok(p) => p,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &format!("Invalid request body: {}", e)),
    };
    if let Err(e) = payload.validate() {
        return error_response(StatusCode::BAD_REQUEST, &e);
    }

    let fallback_order = match payload.display_order {
        Some(_) => 0,
        None => match list_gallery_images(client, table_name, project_id).await {
            Ok(existing) => match next_display_order(&existing, &[]) {
                Some(order) => order,
                None => return error_response(StatusCode::CONFLICT, "No display order left in this gallery"),
            },
            Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
        },
    };

    match create_gallery_image(client, table_name, payload.into_record(project_id, fallback_order)).await {
        Ok(image) => json_response(StatusCode::CREATED, serde_json::to_string(&image)?),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

/// HTTP Handler: PATCH /projects/{pid}/gallery/{id}
pub async fn update_gallery_image_handler(
    client: &DynamoClient,
    table_name: &str,
    project_id: &str,
    image_id: &str,
    body: &[u8],
) -> Result<Response<Body>, LambdaError> {
    let payload: UpdateGalleryImagePayload = match serde_json::from_slice(body) {
        Ok(p) => p,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &format!("Invalid request body: {}", e)),
    };
    if let Err(e) = payload.validate() {
        return error_response(StatusCode::BAD_REQUEST, &e);
    }

    match update_gallery_image(client, table_name, project_id, image_id, payload.into()).await {
        Ok(image) => json_response(StatusCode::OK, serde_json::to_string(&image)?),
        Err(e) if e == IMAGE_NOT_FOUND => error_response(StatusCode::NOT_FOUND, &e),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

/// HTTP Handler: DELETE /projects/{pid}/gallery/{id}
///
/// 404 for an unknown id. Deleting the feature promotes the next image.
pub async fn delete_gallery_image_handler(
    client: &DynamoClient,
    table_name: &str,
    project_id: &str,
    image_id: &str,
) -> Result<Response<Body>, LambdaError> {
    match delete_gallery_image(client, table_name, project_id, image_id).await {
        Ok(_) => Ok(Response::builder()
            .status(StatusCode::NO_CONTENT)
            .body(Body::Empty)
            .map_err(Box::new)?),
        Err(e) if e == IMAGE_NOT_FOUND => error_response(StatusCode::NOT_FOUND, &e),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}
