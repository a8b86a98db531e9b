//! Email bodies for the public forms.
//!
//! Every submitted value is HTML-escaped in the HTML part; optional fields
//! that were left blank are left out of both parts.

use serde::Deserialize;

/// Rendered message ready for the mail transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub text: String,
    pub html: String,
    pub reply_to: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubcontractorRegistration {
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub trade: String,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub service_area: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorRegistration {
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub products: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Ordered label/value rows; blank optional values are skipped
struct Fields<'a>(Vec<(&'a str, &'a str)>);

impl<'a> Fields<'a> {
    fn new() -> Self {
        Self(Vec::new())
    }

    fn required(mut self, label: &'a str, value: &'a str) -> Self {
        self.0.push((label, value.trim()));
        self
    }

    fn optional(mut self, label: &'a str, value: Option<&'a str>) -> Self {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.0.push((label, v));
        }
        self
    }

    fn render(self, subject: String, heading: &str, reply_to: &str) -> Notification {
        let text = self
            .0
            .iter()
            .map(|(label, value)| format!("{}: {}", label, value))
            .collect::<Vec<_>>()
            .join("\n");

        let rows = self
            .0
            .iter()
            .map(|(label, value)| {
                format!(
                    "<tr><th align=\"left\">{}</th><td>{}</td></tr>",
                    escape_html(label),
                    escape_html(value).replace('\n', "<br>")
                )
            })
            .collect::<String>();
        let html = format!(
            "<html><body><h2>{}</h2><table>{}</table></body></html>",
            escape_html(heading),
            rows
        );

        Notification {
            subject,
            text,
            html,
            reply_to: reply_to.trim().to_string(),
        }
    }
}

pub fn contact_notification(req: &ContactRequest) -> Notification {
    let who = if req.name.trim().is_empty() { req.email.trim() } else { req.name.trim() };
    Fields::new()
        .optional("Name", Some(req.name.as_str()))
        .required("Email", &req.email)
        .optional("Phone", req.phone.as_deref())
        .required("Message", &req.message)
        .render(format!("New contact message from {}", who), "Contact form", &req.email)
}

pub fn subcontractor_notification(reg: &SubcontractorRegistration) -> Notification {
    Fields::new()
        .required("Company", &reg.company_name)
        .required("Contact", &reg.contact_name)
        .required("Email", &reg.email)
        .optional("Phone", reg.phone.as_deref())
        .required("Trade", &reg.trade)
        .optional("License number", reg.license_number.as_deref())
        .optional("Service area", reg.service_area.as_deref())
        .optional("Message", reg.message.as_deref())
        .render(
            format!("Subcontractor registration: {} ({})", reg.company_name.trim(), reg.trade.trim()),
            "Subcontractor registration",
            &reg.email,
        )
}

pub fn vendor_notification(reg: &VendorRegistration) -> Notification {
    Fields::new()
        .required("Company", &reg.company_name)
        .required("Contact", &reg.contact_name)
        .required("Email", &reg.email)
        .optional("Phone", reg.phone.as_deref())
        .required("Products", &reg.products)
        .optional("Website", reg.website.as_deref())
        .optional("Message", reg.message.as_deref())
        .render(
            format!("Vendor registration: {}", reg.company_name.trim()),
            "Vendor registration",
            &reg.email,
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<b>\"Tom\" & 'Co'</b>"), "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Co&#39;&lt;/b&gt;");
    }

    #[test]
    fn contact_renders_all_fields() {
        let req = ContactRequest {
            name: "Dana".to_string(),
            email: "dana@example.com".to_string(),
            phone: Some("0400 000 000".to_string()),
            message: "Quote for <deck>\nthanks".to_string(),
        };
        let n = contact_notification(&req);
        assert_eq!(n.subject, "New contact message from Dana");
        assert_eq!(n.reply_to, "dana@example.com");
        assert!(n.text.contains("Phone: 0400 000 000"));
        assert!(n.html.contains("Quote for &lt;deck&gt;<br>thanks"));
        assert!(!n.html.contains("<deck>"));
    }

    #[test]
    fn blank_optionals_are_omitted() {
        let reg = SubcontractorRegistration {
            company_name: "Acme Framing".to_string(),
            contact_name: "Lee".to_string(),
            email: "lee@acme.example".to_string(),
            phone: Some("   ".to_string()),
            trade: "Carpentry".to_string(),
            license_number: None,
            service_area: Some("North shore".to_string()),
            message: None,
        };
        let n = subcontractor_notification(&reg);
        assert_eq!(n.subject, "Subcontractor registration: Acme Framing (Carpentry)");
        assert!(!n.text.contains("Phone"));
        assert!(!n.text.contains("License"));
        assert!(n.text.contains("Service area: North shore"));
    }

    #[test]
    fn vendor_parses_camel_case() {
        let reg: VendorRegistration = serde_json::from_str(
            r#"{"companyName":"Stone & Co","contactName":"Ari","email":"ari@stone.example","products":"Pavers"}"#,
        )
        .unwrap();
        let n = vendor_notification(&reg);
        assert_eq!(n.subject, "Vendor registration: Stone & Co");
        assert!(n.html.contains("Stone &amp; Co"));
        assert!(!n.text.contains("Website"));
    }
}
