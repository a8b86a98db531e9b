use aws_sdk_sesv2::Client as SesClient;
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::AppConfig;
use crate::email::send_notification;
use crate::notifications::{
    contact_notification, subcontractor_notification, vendor_notification, ContactRequest, Notification,
    SubcontractorRegistration, VendorRegistration,
};

#[derive(Serialize)]
struct ContactResponse {
    message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

fn respond<T: Serialize>(status: StatusCode, payload: &T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(serde_json::to_string(payload)?.into())
        .map_err(Box::new)?)
}

fn reject(error: &str, message: impl Into<String>) -> Result<Response<Body>, Error> {
    respond(
        StatusCode::BAD_REQUEST,
        &ErrorResponse {
            error: error.to_string(),
            message: message.into(),
        },
    )
}

fn body_text(body: &Body) -> &str {
    match body {
        Body::Text(text) => text,
        Body::Binary(bytes) => std::str::from_utf8(bytes).unwrap_or(""),
        Body::Empty => "",
    }
}

fn valid_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace),
        None => false,
    }
}

/// First problem with a submission, as `(error code, message)`
type Problem = (&'static str, &'static str);

trait FormSubmission: DeserializeOwned {
    const KIND: &'static str;

    fn validate(&self) -> Result<(), Problem>;

    fn render(&self) -> Notification;
}

impl FormSubmission for ContactRequest {
    const KIND: &'static str = "contact";

    fn validate(&self) -> Result<(), Problem> {
        if !valid_email(&self.email) {
            return Err(("InvalidEmail", "Please provide a valid email address"));
        }
        if self.message.trim().is_empty() {
            return Err(("InvalidMessage", "Please provide a message"));
        }
        Ok(())
    }

    fn render(&self) -> Notification {
        contact_notification(self)
    }
}

impl FormSubmission for SubcontractorRegistration {
    const KIND: &'static str = "subcontractor registration";

    fn validate(&self) -> Result<(), Problem> {
        if !valid_email(&self.email) {
            return Err(("InvalidEmail", "Please provide a valid email address"));
        }
        if self.company_name.trim().is_empty() || self.contact_name.trim().is_empty() {
            return Err(("MissingField", "Company and contact name are required"));
        }
        if self.trade.trim().is_empty() {
            return Err(("MissingField", "Please tell us your trade"));
        }
        Ok(())
    }

    fn render(&self) -> Notification {
        subcontractor_notification(self)
    }
}

impl FormSubmission for VendorRegistration {
    const KIND: &'static str = "vendor registration";

    fn validate(&self) -> Result<(), Problem> {
        if !valid_email(&self.email) {
            return Err(("InvalidEmail", "Please provide a valid email address"));
        }
        if self.company_name.trim().is_empty() || self.contact_name.trim().is_empty() {
            return Err(("MissingField", "Company and contact name are required"));
        }
        if self.products.trim().is_empty() {
            return Err(("MissingField", "Please describe the products you supply"));
        }
        Ok(())
    }

    fn render(&self) -> Notification {
        vendor_notification(self)
    }
}

async fn handle_submission<T: FormSubmission>(
    ses_client: &SesClient,
    config: &AppConfig,
    body: &Body,
) -> Result<Response<Body>, Error> {
    tracing::info!("{} submission received", T::KIND);

    let submission: T = match serde_json::from_str(body_text(body)) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!("Failed to parse {} request: {}", T::KIND, e);
            return reject("InvalidRequest", format!("Invalid request body: {}", e));
        }
    };

    if let Err((error, message)) = submission.validate() {
        return reject(error, message);
    }

    let notification = submission.render();
    match send_notification(ses_client, &config.notify_from_email, &config.notify_to_email, &notification).await {
        Ok(_) => {
            tracing::info!("{} email sent for {}", T::KIND, notification.reply_to);
            respond(
                StatusCode::OK,
                &ContactResponse {
                    message: "Message sent successfully".to_string(),
                },
            )
        }
        Err(e) => {
            tracing::error!("Failed to send {} email: {}", T::KIND, e);
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                &ErrorResponse {
                    error: "EmailFailed".to_string(),
                    message: "Failed to send message. Please try again later.".to_string(),
                },
            )
        }
    }
}

/// Handle contact form submission
pub async fn handle_contact(ses_client: &SesClient, config: &AppConfig, body: &Body) -> Result<Response<Body>, Error> {
    handle_submission::<ContactRequest>(ses_client, config, body).await
}

pub async fn handle_subcontractor_registration(
    ses_client: &SesClient,
    config: &AppConfig,
    body: &Body,
) -> Result<Response<Body>, Error> {
    handle_submission::<SubcontractorRegistration>(ses_client, config, body).await
}

pub async fn handle_vendor_registration(
    ses_client: &SesClient,
    config: &AppConfig,
    body: &Body,
) -> Result<Response<Body>, Error> {
    handle_submission::<VendorRegistration>(ses_client, config, body).await
}
