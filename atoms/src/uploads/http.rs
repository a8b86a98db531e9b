use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;
use lambda_http::{Body, Error as LambdaError, Response, http::StatusCode};
use super::model::{AssetLocation, SessionPayload, TrackFilePayload};
use super::service::{cleanup_files, commit_files, track_file};

fn json_response(status: StatusCode, body: serde_json::Value) -> Result<Response<Body>, LambdaError> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(body.to_string().into())
        .map_err(Box::new)?)
}

fn bad_request(e: serde_json::Error) -> Result<Response<Body>, LambdaError> {
    json_response(
        StatusCode::BAD_REQUEST,
        serde_json::json!({"error": format!("Invalid request body: {}", e)}),
    )
}

/// HTTP Handler: POST /uploads/track
pub async fn track_file_handler(
    client: &DynamoClient,
    table_name: &str,
    body: &[u8],
) -> Result<Response<Body>, LambdaError> {
    let payload: TrackFilePayload = match serde_json::from_slice(body) {
        Ok(p) => p,
        Err(e) => return bad_request(e),
    };

    match track_file(client, table_name, &payload.url, &payload.session_id).await {
        Ok(()) => json_response(StatusCode::OK, serde_json::json!({"tracked": payload.url})),
        Err(e) => json_response(StatusCode::INTERNAL_SERVER_ERROR, serde_json::json!({"error": e})),
    }
}

/// HTTP Handler: POST /uploads/cleanup
pub async fn cleanup_files_handler(
    dynamo: &DynamoClient,
    s3: &S3Client,
    table_name: &str,
    location: &AssetLocation,
    body: &[u8],
) -> Result<Response<Body>, LambdaError> {
    let payload: SessionPayload = match serde_json::from_slice(body) {
        Ok(p) => p,
        Err(e) => return bad_request(e),
    };

    match cleanup_files(dynamo, s3, table_name, location, &payload.session_id).await {
        Ok(removed) => json_response(StatusCode::OK, serde_json::json!({"removed": removed})),
        Err(e) => json_response(StatusCode::INTERNAL_SERVER_ERROR, serde_json::json!({"error": e})),
    }
}

/// HTTP Handler: POST /uploads/commit
pub async fn commit_files_handler(
    client: &DynamoClient,
    table_name: &str,
    body: &[u8],
) -> Result<Response<Body>, LambdaError> {
    let payload: SessionPayload = match serde_json::from_slice(body) {
        Ok(p) => p,
        Err(e) => return bad_request(e),
    };

    match commit_files(client, table_name, &payload.session_id).await {
        Ok(released) => json_response(StatusCode::OK, serde_json::json!({"released": released})),
        Err(e) => json_response(StatusCode::INTERNAL_SERVER_ERROR, serde_json::json!({"error": e})),
    }
}
