use base64::{engine::general_purpose::STANDARD, Engine as _};
use gallery_block::{
    snapshot_key, GalleryError, GalleryImage, GallerySession, Notice, NoticeLevel, RecoverySnapshot, SelectedFile, SessionHooks,
};
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use super::adapters::{collaborators, DynamoSnapshot};
use crate::AppState;

/// One file in an import request, bytes base64-encoded
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFile {
    pub name: String,
    #[serde(default)]
    pub content_type: String,
    pub data: String,
    pub caption: Option<String>,
    pub display_order: Option<i32>,
}

/// POST /projects/{pid}/gallery/import
///
/// An empty `files` list saves whatever a previous failed import left in the
/// recovery snapshot.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    #[serde(default)]
    pub files: Vec<ImportFile>,
    /// Index into `files` of the image to feature
    pub feature: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RejectedFile {
    name: String,
    reason: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NoticeBody {
    level: &'static str,
    message: String,
}

impl From<&Notice> for NoticeBody {
    fn from(notice: &Notice) -> Self {
        Self {
            level: match notice.level {
                NoticeLevel::Info => "info",
                NoticeLevel::Error => "error",
            },
            message: notice.message.clone(),
        }
    }
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(body.to_string().into())
        .map_err(Box::new)?)
}

pub fn error_status(err: &GalleryError) -> StatusCode {
    match err {
        GalleryError::Validation(_) => StatusCode::BAD_REQUEST,
        GalleryError::NotFound(_) => StatusCode::NOT_FOUND,
        GalleryError::SessionClosed | GalleryError::SaveInProgress => StatusCode::CONFLICT,
        GalleryError::UploadIncomplete { .. } | GalleryError::Upload(_) | GalleryError::StillUploading { .. } => {
            StatusCode::BAD_GATEWAY
        }
        GalleryError::PartialSave { .. } | GalleryError::Persistence(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn gallery_error_response(err: &GalleryError, notices: &[Notice]) -> Result<Response<Body>, Error> {
    let mut body = serde_json::json!({
        "error": err.to_string(),
        "retryable": err.is_retryable(),
        "notices": notices.iter().map(NoticeBody::from).collect::<Vec<_>>(),
    });
    if let GalleryError::PartialSave { saved, requested, .. } = err {
        body["saved"] = serde_json::json!(saved);
        body["requested"] = serde_json::json!(requested);
    }
    json_response(error_status(err), body)
}

/// Hooks that collect notices for the response body
fn collecting_hooks() -> (SessionHooks, Arc<Mutex<Vec<Notice>>>) {
    let notices = Arc::new(Mutex::new(Vec::new()));
    let sink = notices.clone();
    let hooks = SessionHooks {
        on_notice: Some(Box::new(move |notice: &Notice| {
            if let Ok(mut list) = sink.lock() {
                list.push(notice.clone());
            }
        })),
        on_gallery_changed: Some(Box::new(|images: &[GalleryImage]| {
            tracing::info!("Gallery now has {} image(s)", images.len());
        })),
        ..SessionHooks::default()
    };
    (hooks, notices)
}

fn drain(notices: &Arc<Mutex<Vec<Notice>>>) -> Vec<Notice> {
    notices.lock().map(|mut list| std::mem::take(&mut *list)).unwrap_or_default()
}

async fn open_session(state: &AppState, project_id: &str, hooks: SessionHooks) -> Result<GallerySession, GalleryError> {
    GallerySession::open(
        project_id,
        collaborators(state, project_id),
        state.config.gallery.clone(),
        hooks,
    )
    .await
}

/// Stage, upload and save a batch of images in one editing session
pub async fn import_gallery_images(state: &AppState, project_id: &str, body: &[u8]) -> Result<Response<Body>, Error> {
    let request: ImportRequest = if body.is_empty() {
        ImportRequest::default()
    } else {
        match serde_json::from_slice(body) {
            Ok(req) => req,
            Err(e) => {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    serde_json::json!({"error": format!("Invalid request body: {}", e)}),
                )
            }
        }
    };
    tracing::info!("Gallery import for project {}: {} file(s)", project_id, request.files.len());

    let (hooks, notices) = collecting_hooks();
    let mut session = match open_session(state, project_id, hooks).await {
        Ok(s) => s,
        Err(e) => return gallery_error_response(&e, &drain(&notices)),
    };

    match stage_and_save(&mut session, request).await {
        Ok((report, rejected)) => {
            let status = if report.created.is_empty() && !rejected.is_empty() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::CREATED
            };
            json_response(
                status,
                serde_json::json!({
                    "sessionId": session.session_id(),
                    "created": report.created,
                    "updated": report.updated,
                    "rejected": rejected,
                    "notices": drain(&notices).iter().map(NoticeBody::from).collect::<Vec<_>>(),
                }),
            )
        }
        Err(e) => {
            tracing::error!("Gallery import for project {} failed: {}", project_id, e);
            gallery_error_response(&e, &drain(&notices))
        }
    }
}

async fn stage_and_save(
    session: &mut GallerySession,
    request: ImportRequest,
) -> Result<(gallery_block::SaveReport, Vec<RejectedFile>), GalleryError> {
    let mut rejected = Vec::new();
    let mut feature_id = None;

    // one file at a time so captions and the feature index map to the right entry
    for (idx, file) in request.files.into_iter().enumerate() {
        let bytes = match STANDARD.decode(file.data.trim()) {
            Ok(b) => b,
            Err(e) => {
                rejected.push(RejectedFile {
                    name: file.name,
                    reason: format!("invalid base64: {}", e),
                });
                continue;
            }
        };

        let outcome = session
            .add_files(vec![SelectedFile::new(file.name.clone(), file.content_type, bytes)])
            .await?;
        let Some(staged) = outcome.accepted.first() else {
            rejected.extend(outcome.rejected.iter().map(|e| RejectedFile {
                name: file.name.clone(),
                reason: e.to_string(),
            }));
            continue;
        };

        if let Some(caption) = &file.caption {
            session.update_caption(&staged.local_id, caption).await?;
        }
        if let Some(order) = file.display_order {
            session.update_order(&staged.local_id, order).await?;
        }
        if request.feature == Some(idx) {
            feature_id = Some(staged.local_id.clone());
        }
    }

    if let Some(id) = feature_id {
        session.set_feature(&id).await?;
    }
    if session.pending().is_empty() && !rejected.is_empty() {
        return Ok((gallery_block::SaveReport::default(), rejected));
    }

    session.upload().await?;
    let report = session.save().await?;
    Ok((report, rejected))
}

/// GET /projects/{pid}/gallery/pending
pub async fn get_pending_images(state: &AppState, project_id: &str) -> Result<Response<Body>, Error> {
    let snapshot = DynamoSnapshot::new(state.dynamo_client.clone(), &state.config.table_name);
    match snapshot.load(&snapshot_key(project_id)).await {
        Ok(images) => json_response(StatusCode::OK, serde_json::to_value(images.unwrap_or_default())?),
        Err(e) => {
            tracing::error!("Failed to read pending images for {}: {}", project_id, e);
            json_response(StatusCode::INTERNAL_SERVER_ERROR, serde_json::json!({"error": e}))
        }
    }
}

/// DELETE /projects/{pid}/gallery/pending
///
/// Abandons unsaved uploads: tracked files are deleted and the snapshot is
/// cleared. Cleanup failures never fail the request.
pub async fn discard_pending_images(state: &AppState, project_id: &str) -> Result<Response<Body>, Error> {
    let (hooks, notices) = collecting_hooks();
    let mut session = match open_session(state, project_id, hooks).await {
        Ok(s) => s,
        Err(e) => return gallery_error_response(&e, &drain(&notices)),
    };

    match session.cancel().await {
        Ok(report) => json_response(
            StatusCode::OK,
            serde_json::json!({
                "sessionId": session.session_id(),
                "removed": report.removed,
            }),
        ),
        Err(e) => gallery_error_response(&e, &drain(&notices)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gallery_block::ValidationError;

    #[test]
    fn status_mapping() {
        assert_eq!(
            error_status(&GalleryError::Validation(ValidationError::InvalidOrder(0))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_status(&GalleryError::UploadIncomplete { resolved: 1, unresolved: 1 }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(error_status(&GalleryError::SessionClosed), StatusCode::CONFLICT);
        assert_eq!(
            error_status(&GalleryError::PartialSave {
                saved: 1,
                requested: 3,
                reason: "throttled".to_string()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn import_request_defaults() {
        let req: ImportRequest =
            serde_json::from_str(r#"{"files":[{"name":"a.png","data":"iVBORw0KGgo="}]}"#).unwrap();
        assert_eq!(req.files.len(), 1);
        assert!(req.files[0].content_type.is_empty());
        assert!(req.feature.is_none());
    }

    #[test]
    fn partial_save_body_reports_counts() {
        let err = GalleryError::PartialSave {
            saved: 2,
            requested: 5,
            reason: "throttled".to_string(),
        };
        let resp = gallery_error_response(&err, &[Notice::error("Saved 2 of 5 images")]).unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = match resp.body() {
            Body::Text(t) => serde_json::from_str(t).unwrap(),
            _ => panic!("expected text body"),
        };
        assert_eq!(body["saved"], 2);
        assert_eq!(body["requested"], 5);
        assert_eq!(body["retryable"], true);
        assert_eq!(body["notices"][0]["level"], "error");
    }
}
