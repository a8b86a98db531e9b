use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client as SesClient;

use crate::notifications::Notification;

fn content(data: &str) -> Result<Content, String> {
    Content::builder()
        .data(data)
        .charset("UTF-8")
        .build()
        .map_err(|e| format!("Failed to build email content: {}", e))
}

/// Send a rendered notification through SES with reply-to set to the submitter
pub async fn send_notification(
    ses_client: &SesClient,
    from: &str,
    to: &str,
    notification: &Notification,
) -> Result<String, String> {
    let message = Message::builder()
        .subject(content(&notification.subject)?)
        .body(
            Body::builder()
                .text(content(&notification.text)?)
                .html(content(&notification.html)?)
                .build(),
        )
        .build();

    let mut request = ses_client
        .send_email()
        .from_email_address(from)
        .destination(Destination::builder().to_addresses(to).build())
        .content(EmailContent::builder().simple(message).build());
    if !notification.reply_to.is_empty() {
        request = request.reply_to_addresses(&notification.reply_to);
    }

    let output = request
        .send()
        .await
        .map_err(|e| format!("SES send_email error: {}", e))?;

    let message_id = output.message_id().unwrap_or_default().to_string();
    tracing::info!("Sent \"{}\" to {} ({})", notification.subject, to, message_id);
    Ok(message_id)
}
