use async_trait::async_trait;
use serde::Serialize;

use crate::config::{AppEnvironment, MailConfig};

pub const CERTIFICATE_SUBJECT: &str = "Foxquilt Insurance - Certificate of Insurance";
pub const CERTIFICATE_FILENAME: &str = "certificate-of-insurance.pdf";

pub(crate) const FALLBACK_BODY: &str = "\
<h1>Good day.</h1>
<p>Please find attached a Certificate of Insurance that was requested by your company.</p>
<p>Thanks again for choosing Foxquilt!</p>
<p style=\"color: #46b2bb\">- The Foxquilt Team</p>
";

/// Whether messages are actually delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MailMode {
    /// Captured by a preview transport, never delivered to the recipient.
    Test,
    Live,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub sender: String,
    pub support_email: String,
    pub secondary_bcc: Option<String>,
    pub mode: MailMode,
}

impl MailSettings {
    pub fn from_config(config: &MailConfig, environment: AppEnvironment) -> Self {
        Self {
            sender: config.sender.clone(),
            support_email: config.support_email.clone(),
            secondary_bcc: config.secondary_bcc.clone(),
            mode: match environment {
                AppEnvironment::Production => MailMode::Live,
                AppEnvironment::Development | AppEnvironment::Test => MailMode::Test,
            },
        }
    }

    pub fn bcc(&self) -> Vec<String> {
        std::iter::once(self.support_email.clone())
            .chain(
                self.secondary_bcc
                    .iter()
                    .filter(|address| !address.trim().is_empty())
                    .cloned(),
            )
            .collect()
    }
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            sender: "noreply@foxquilt.com".to_string(),
            support_email: "support@foxquilt.com".to_string(),
            secondary_bcc: None,
            mode: MailMode::Test,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: mime::Mime,
    pub content: Vec<u8>,
}

impl Attachment {
    pub fn certificate(pdf: Vec<u8>) -> Self {
        Self {
            filename: CERTIFICATE_FILENAME.to_string(),
            content_type: mime::APPLICATION_PDF,
            content: pdf,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<Attachment>,
    pub mode: MailMode,
}

impl MailMessage {
    pub fn certificate(
        settings: &MailSettings,
        recipient: &str,
        html_body: String,
        pdf: Vec<u8>,
    ) -> Self {
        Self {
            from: settings.sender.clone(),
            to: vec![recipient.to_string()],
            bcc: settings.bcc(),
            subject: CERTIFICATE_SUBJECT.to_string(),
            html_body,
            attachments: vec![Attachment::certificate(pdf)],
            mode: settings.mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailReceipt {
    pub message_id: String,
    /// Where a test-mode message can be inspected.
    pub preview_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport failed: {0}")]
    Transport(String),
    #[error("mail rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<MailReceipt, MailError>;
}
