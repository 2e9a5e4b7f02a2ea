use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use coi_generator::config::AppConfig;
use coi_generator::error::AppError;
use coi_generator::workflows::certificate::{
    CertificateRenderer, CoiConfigRegistry, CoiGenerator, Geography, InMemoryDocumentStore,
    MailError, MailMessage, MailMode, MailReceipt, MailSettings, Mailer, RenderError, RenderJob,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type ServiceGenerator =
    CoiGenerator<InMemoryDocumentStore, PreviewRenderer, LoggingMailer>;

/// Wires the document store, config registry and local collaborators from app config.
pub(crate) fn build_generator(config: &AppConfig) -> Result<ServiceGenerator, AppError> {
    let store = InMemoryDocumentStore::from_path(&config.storage.store_path)?;
    let registry = CoiConfigRegistry::standard(&config.storage.asset_root)?;
    info!(
        store = %config.storage.store_path.display(),
        configs = registry.entries().len(),
        "certificate generator initialised"
    );

    Ok(CoiGenerator::new(
        Arc::new(store),
        Arc::new(registry),
        PreviewRenderer::new(config.storage.output_dir.clone()),
        LoggingMailer::default(),
        MailSettings::from_config(&config.mail, config.environment),
    ))
}

/// Writes each render job as JSON next to a placeholder PDF instead of filling templates.
#[derive(Debug, Clone)]
pub(crate) struct PreviewRenderer {
    output_dir: PathBuf,
}

impl PreviewRenderer {
    pub(crate) fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

#[async_trait]
impl CertificateRenderer for PreviewRenderer {
    async fn render(&self, job: &RenderJob) -> Result<Vec<u8>, RenderError> {
        let stem = format!("{}-{}-{}", job.policy_foxden_id, job.geography, job.lob);
        let job_path = self.output_dir.join(format!("{stem}.json"));
        let pdf_path = self.output_dir.join(format!("{stem}.pdf"));

        let payload = serde_json::to_vec_pretty(job)
            .map_err(|err| RenderError::Renderer(format!("render job not serializable: {err}")))?;
        let pdf = placeholder_pdf(job).into_bytes();

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|err| RenderError::Renderer(format!("{}: {err}", self.output_dir.display())))?;
        tokio::fs::write(&job_path, payload)
            .await
            .map_err(|err| RenderError::Renderer(format!("{}: {err}", job_path.display())))?;
        tokio::fs::write(&pdf_path, &pdf)
            .await
            .map_err(|err| RenderError::Renderer(format!("{}: {err}", pdf_path.display())))?;

        info!(job = %job_path.display(), pdf = %pdf_path.display(), "certificate preview written");
        Ok(pdf)
    }
}

fn placeholder_pdf(job: &RenderJob) -> String {
    let market = match job.geography {
        Geography::Us => "ACORD 25",
        Geography::Canada => "Certificate of Insurance",
    };
    format!(
        "%PDF-1.7\n% {market} preview\n% policy {} lob {} carrier {}\n%%EOF\n",
        job.policy_foxden_id, job.lob, job.carrier_partner
    )
}

/// Logs outgoing certificate mail; nothing leaves the process.
#[derive(Debug, Default)]
pub(crate) struct LoggingMailer {
    sent: AtomicU64,
}

#[async_trait]
impl Mailer for LoggingMailer {
    async fn send(&self, message: MailMessage) -> Result<MailReceipt, MailError> {
        if message.to.iter().all(|recipient| recipient.trim().is_empty()) {
            return Err(MailError::Rejected("no recipient".to_string()));
        }

        let sequence = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        let message_id = format!("local-{sequence}");
        info!(
            %message_id,
            from = %message.from,
            to = ?message.to,
            bcc = ?message.bcc,
            subject = %message.subject,
            attachments = message.attachments.len(),
            mode = ?message.mode,
            "certificate mail logged"
        );

        Ok(MailReceipt {
            preview_url: (message.mode == MailMode::Test).then(|| format!("log://{message_id}")),
            message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coi_generator::workflows::certificate::load::RenderDocument;
    use coi_generator::workflows::certificate::MappedFields;

    fn job() -> RenderJob {
        RenderJob {
            policy_foxden_id: "FOX-1001".to_string(),
            lob: "GL".to_string(),
            geography: Geography::Canada,
            carrier_partner: "Foxquilt".to_string(),
            template_path: PathBuf::from("templates/html/certificate.html"),
            fields: MappedFields::default(),
            document: RenderDocument::Markup {
                time_zone: "America/Toronto".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn preview_renderer_writes_job_and_pdf() {
        let output_dir = std::env::temp_dir().join(format!("coi-preview-{}", std::process::id()));
        let renderer = PreviewRenderer::new(output_dir.clone());

        let pdf = renderer.render(&job()).await.expect("preview renders");

        assert!(pdf.starts_with(b"%PDF-1.7"));
        let written = tokio::fs::read_to_string(output_dir.join("FOX-1001-CA-GL.json"))
            .await
            .expect("job written");
        let written: serde_json::Value = serde_json::from_str(&written).expect("job is json");
        assert_eq!(written["document"]["kind"], "markup");
        assert_eq!(written["carrierPartner"], "Foxquilt");
        let _ = tokio::fs::remove_dir_all(output_dir).await;
    }

    #[tokio::test]
    async fn logging_mailer_numbers_messages() {
        let mailer = LoggingMailer::default();
        let message = MailMessage::certificate(
            &MailSettings::default(),
            "owner@acme.example",
            "<p>attached</p>".to_string(),
            b"%PDF".to_vec(),
        );

        let first = mailer.send(message.clone()).await.expect("sent");
        let second = mailer.send(message).await.expect("sent");

        assert_eq!(first.message_id, "local-1");
        assert_eq!(second.message_id, "local-2");
        assert_eq!(first.preview_url.as_deref(), Some("log://local-1"));
    }

    #[tokio::test]
    async fn logging_mailer_rejects_blank_recipient() {
        let mailer = LoggingMailer::default();
        let message = MailMessage::certificate(
            &MailSettings::default(),
            " ",
            String::new(),
            Vec::new(),
        );

        assert!(matches!(
            mailer.send(message).await,
            Err(MailError::Rejected(_))
        ));
    }
}
