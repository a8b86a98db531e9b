use buildsite_atoms as atoms;
use buildsite_shared::{contact, gallery, AppConfig, AppState};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, Response,
};
use std::sync::Arc;

use lambda_http::http::header::{HeaderValue, VARY};

fn with_cors_headers(mut resp: Response<Body>, config: &AppConfig, request_origin: Option<&str>) -> Response<Body> {
    let cors_origin = config.cors_origin(request_origin);

    let headers = resp.headers_mut();
    headers.insert(
        "Access-Control-Allow-Origin",
        HeaderValue::from_str(&cors_origin).unwrap_or_else(|_| HeaderValue::from_static("*")),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET,POST,PATCH,DELETE,OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type,Authorization"),
    );
    if cors_origin != "*" {
        headers.append(VARY, HeaderValue::from_static("Origin"));
    }

    resp
}

fn finalize_response(
    resp: Result<Response<Body>, Error>,
    config: &AppConfig,
    request_origin: Option<&str>,
) -> Result<Response<Body>, Error> {
    resp.map(|r| with_cors_headers(r, config, request_origin))
}

/// Main Lambda handler - routes public forms, gallery and upload endpoints
pub(crate) async fn function_handler(event: Request, state: Arc<AppState>) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    let body = event.body();
    let request_origin = event.headers().get("Origin").and_then(|v| v.to_str().ok());
    let config = &state.config;
    let table_name = config.table_name.as_str();
    tracing::info!("API Lambda invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == "OPTIONS" {
        let resp = Response::builder()
            .status(StatusCode::OK)
            .body(Body::Empty)
            .map_err(Box::new)?;
        return Ok(with_cors_headers(resp, config, request_origin));
    }

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let resp = match (method, parts.as_slice()) {
        // Public forms
        (&Method::POST, ["contact"]) => contact::handle_contact(&state.ses_client, config, body).await,
        (&Method::POST, ["registrations", "subcontractor"]) => {
            contact::handle_subcontractor_registration(&state.ses_client, config, body).await
        }
        (&Method::POST, ["registrations", "vendor"]) => {
            contact::handle_vendor_registration(&state.ses_client, config, body).await
        }

        // Project gallery
        (&Method::GET, ["projects", project_id, "gallery"]) => {
            atoms::gallery::list_gallery_handler(&state.dynamo_client, table_name, project_id).await
        }
        (&Method::POST, ["projects", project_id, "gallery"]) => {
            atoms::gallery::create_gallery_image_handler(&state.dynamo_client, table_name, project_id, body).await
        }
        (&Method::POST, ["projects", project_id, "gallery", "import"]) => {
            gallery::import_gallery_images(&state, project_id, body).await
        }
        (&Method::GET, ["projects", project_id, "gallery", "pending"]) => {
            gallery::get_pending_images(&state, project_id).await
        }
        (&Method::DELETE, ["projects", project_id, "gallery", "pending"]) => {
            gallery::discard_pending_images(&state, project_id).await
        }
        (&Method::PATCH, ["projects", project_id, "gallery", image_id]) => {
            atoms::gallery::update_gallery_image_handler(&state.dynamo_client, table_name, project_id, image_id, body)
                .await
        }
        (&Method::DELETE, ["projects", project_id, "gallery", image_id]) => {
            atoms::gallery::delete_gallery_image_handler(&state.dynamo_client, table_name, project_id, image_id).await
        }

        // Upload tracking
        (&Method::POST, ["uploads", "track"]) => {
            atoms::uploads::track_file_handler(&state.dynamo_client, table_name, body).await
        }
        (&Method::POST, ["uploads", "cleanup"]) => {
            atoms::uploads::cleanup_files_handler(
                &state.dynamo_client,
                &state.s3_client,
                table_name,
                &config.asset_location(),
                body,
            )
            .await
        }
        (&Method::POST, ["uploads", "commit"]) => {
            atoms::uploads::commit_files_handler(&state.dynamo_client, table_name, body).await
        }

        _ => {
            tracing::warn!("No route matched - Method: {} Path: {}", method, path);
            not_found()
        }
    };

    finalize_response(resp, config, request_origin)
}

fn not_found() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(serde_json::json!({"error": "Not found"}).to_string().into())
        .map_err(Box::new)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(origins: &str) -> AppConfig {
        let vars: HashMap<&str, &str> = [("ALLOWED_ORIGINS", origins)].into_iter().collect();
        AppConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn cors_headers_echo_allowed_origin() {
        let resp = with_cors_headers(not_found().unwrap(), &config("https://admin.example.com"), Some("https://admin.example.com"));
        assert_eq!(resp.headers()["Access-Control-Allow-Origin"], "https://admin.example.com");
        assert_eq!(resp.headers()[VARY], "Origin");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn cors_wildcard_without_allow_list() {
        let resp = with_cors_headers(not_found().unwrap(), &config(""), Some("https://x.example"));
        assert_eq!(resp.headers()["Access-Control-Allow-Origin"], "*");
        assert!(resp.headers().get(VARY).is_none());
    }
}
