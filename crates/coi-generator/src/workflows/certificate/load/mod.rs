//! Render and send stage. Rendering engines and mail transports are collaborators
//! behind [`CertificateRenderer`] and [`Mailer`].

mod forms;
mod helpers;
mod mail;

pub use forms::{
    resolve_form_plan, FormEntry, FormFieldKind, FormFieldValue, FormPlan, FormsDescriptor,
};
pub use helpers::{format_currency, format_date, format_form_date, long_province_name};
pub use mail::{
    Attachment, MailError, MailMessage, MailMode, MailReceipt, MailSettings, Mailer,
    CERTIFICATE_FILENAME, CERTIFICATE_SUBJECT,
};

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::config::{CoiConfig, TemplateKind};
use super::domain::Geography;
use super::mapping::MappedFields;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("invalid forms descriptor: {0}")]
    InvalidFormsDescriptor(String),
    #[error("config for lob={0} uses a form template but has no forms descriptor")]
    MissingFormsDescriptor(String),
    #[error("failed to read asset {path}: {source}")]
    Asset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("renderer failed: {0}")]
    Renderer(String),
}

/// What the renderer fills in, by template kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RenderDocument {
    Acord25 {
        plan: FormPlan,
        signature_path: Option<PathBuf>,
    },
    Markup {
        /// Zone the template's date helper formats in.
        time_zone: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderJob {
    pub policy_foxden_id: String,
    pub lob: String,
    pub geography: Geography,
    pub carrier_partner: String,
    pub template_path: PathBuf,
    pub fields: MappedFields,
    pub document: RenderDocument,
}

#[async_trait]
pub trait CertificateRenderer: Send + Sync {
    /// Produces the certificate PDF bytes.
    async fn render(&self, job: &RenderJob) -> Result<Vec<u8>, RenderError>;
}

/// Per-request delivery details shared by every line of business.
#[derive(Debug, Clone)]
pub struct Delivery<'a> {
    pub policy_foxden_id: &'a str,
    pub carrier_partner: &'a str,
    pub recipient_email: &'a str,
    pub lob: &'a str,
    pub time_zone: &'a str,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReceipt {
    pub pdf_bytes: usize,
    pub message_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Renders one certificate then mails it to the policy owner.
pub struct CertificateLoader<R, M> {
    renderer: R,
    mailer: M,
    settings: MailSettings,
}

impl<R, M> CertificateLoader<R, M>
where
    R: CertificateRenderer,
    M: Mailer,
{
    pub fn new(renderer: R, mailer: M, settings: MailSettings) -> Self {
        Self {
            renderer,
            mailer,
            settings,
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    pub async fn load(
        &self,
        config: &CoiConfig,
        fields: MappedFields,
        delivery: &Delivery<'_>,
    ) -> Result<LoadReceipt, LoadError> {
        let job = build_render_job(config, fields, delivery).await?;
        debug!(lob = delivery.lob, template = ?config.template_kind, "rendering certificate");

        let pdf = self.renderer.render(&job).await?;
        let pdf_bytes = pdf.len();
        debug!(lob = delivery.lob, bytes = pdf_bytes, "certificate rendered");

        let html_body = email_body(&config.email_template_path).await;
        let message =
            MailMessage::certificate(&self.settings, delivery.recipient_email, html_body, pdf);
        let bcc = message.bcc.clone();
        let receipt = self.mailer.send(message).await?;

        match self.settings.mode {
            MailMode::Test => info!(
                lob = delivery.lob,
                to = delivery.recipient_email,
                ?bcc,
                preview_url = receipt.preview_url.as_deref().unwrap_or("-"),
                attachment_size = pdf_bytes,
                "certificate mail captured (test mode, not delivered)"
            ),
            MailMode::Live => debug!(
                lob = delivery.lob,
                message_id = %receipt.message_id,
                "certificate mail sent"
            ),
        }

        Ok(LoadReceipt {
            pdf_bytes,
            message_id: receipt.message_id,
        })
    }
}

async fn build_render_job(
    config: &CoiConfig,
    fields: MappedFields,
    delivery: &Delivery<'_>,
) -> Result<RenderJob, RenderError> {
    let document = match config.template_kind {
        TemplateKind::Acord25 => {
            let descriptor_path = config
                .forms_config_path
                .as_deref()
                .ok_or_else(|| RenderError::MissingFormsDescriptor(config.lob.clone()))?;
            let descriptor = FormsDescriptor::from_json(&read_asset(descriptor_path).await?)?;
            RenderDocument::Acord25 {
                plan: resolve_form_plan(&descriptor, &fields, delivery.now)?,
                signature_path: config.signature_path.clone(),
            }
        }
        TemplateKind::Markup => RenderDocument::Markup {
            time_zone: delivery.time_zone.to_string(),
        },
    };

    Ok(RenderJob {
        policy_foxden_id: delivery.policy_foxden_id.to_string(),
        lob: delivery.lob.to_string(),
        geography: config.geography,
        carrier_partner: delivery.carrier_partner.to_string(),
        template_path: config.template_path.clone(),
        fields,
        document,
    })
}

async fn read_asset(path: &Path) -> Result<String, RenderError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| RenderError::Asset {
            path: path.to_path_buf(),
            source,
        })
}

/// Email template contents, or the stock body when the template is unreadable.
async fn email_body(path: &Path) -> String {
    match tokio::fs::read_to_string(path).await {
        Ok(body) => body,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "email template unreadable, using stock body");
            mail::FALLBACK_BODY.to_string()
        }
    }
}
