//! Request orchestration: extract once, then config → transform → map → load per
//! line of business, settling every line before reporting.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::canonical::{Canonical, CanonicalBuilder, TransformError};
use super::config::{CoiConfig, CoiConfigRegistry, ConfigNotFound};
use super::domain::{CoiRequested, Geography};
use super::extract::{ExtractError, Extractor, RawPolicyData};
use super::load::{
    CertificateLoader, CertificateRenderer, Delivery, LoadError, MailError, MailSettings, Mailer,
    RenderError,
};
use super::mapping::{map_fields, MappedFields, MappingContext};
use super::policy_head::PolicyHeadError;
use super::store::{DocumentStore, StoreError};

/// Failure taxonomy shared by every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    SchemaDrift,
    ConsistencyViolation,
    ConfigurationMissing,
    /// Store, renderer or mail transport failure.
    Collaborator,
}

impl PolicyHeadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PolicyHeadError::Store(_) => ErrorKind::Collaborator,
            PolicyHeadError::SchemaDrift { .. } => ErrorKind::SchemaDrift,
            PolicyHeadError::Consistency(_) => ErrorKind::ConsistencyViolation,
        }
    }
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractError::PolicyNotFound(_) => ErrorKind::NotFound,
            ExtractError::PolicyHead(err) => err.kind(),
            ExtractError::Consistency(_) => ErrorKind::ConsistencyViolation,
        }
    }
}

impl TransformError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransformError::Consistency(_) => ErrorKind::ConsistencyViolation,
            TransformError::LineOfBusinessNotFound(_) => ErrorKind::NotFound,
        }
    }
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Collaborator
    }
}

/// Failure of one line of business. Never aborts sibling lines.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigNotFound),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Mail(#[from] MailError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Config(_) => ErrorKind::ConfigurationMissing,
            PipelineError::Transform(err) => err.kind(),
            PipelineError::Render(RenderError::InvalidFormsDescriptor(_))
            | PipelineError::Render(RenderError::MissingFormsDescriptor(_)) => {
                ErrorKind::ConfigurationMissing
            }
            PipelineError::Render(_) | PipelineError::Mail(_) => ErrorKind::Collaborator,
        }
    }
}

impl From<LoadError> for PipelineError {
    fn from(value: LoadError) -> Self {
        match value {
            LoadError::Render(err) => Self::Render(err),
            LoadError::Mail(err) => Self::Mail(err),
        }
    }
}

/// Canonical record and renderer inputs for one line of business, before loading.
#[derive(Debug, Clone)]
pub struct PreparedCertificate<'a> {
    pub config: &'a CoiConfig,
    pub canonical: Canonical,
    pub fields: MappedFields,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LobStatus {
    #[serde(rename_all = "camelCase")]
    Succeeded {
        policy_number: String,
        certificate_number: u32,
        pdf_bytes: usize,
        message_id: String,
    },
    Failed {
        kind: ErrorKind,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LobOutcome {
    pub lob: String,
    #[serde(flatten)]
    pub status: LobStatus,
}

impl LobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, LobStatus::Succeeded { .. })
    }
}

/// Per-request tally returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    pub policy_foxden_id: String,
    pub geography: Geography,
    pub succeeded: usize,
    pub failed: usize,
    /// Discovered lines of business without a matching config.
    pub skipped: Vec<String>,
    pub outcomes: Vec<LobOutcome>,
}

impl GenerationReport {
    fn new(policy_foxden_id: &str, geography: Geography) -> Self {
        Self {
            policy_foxden_id: policy_foxden_id.to_string(),
            geography,
            succeeded: 0,
            failed: 0,
            skipped: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    fn record(&mut self, outcome: LobOutcome) {
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }
}

/// Generates and delivers every eligible certificate for a request.
pub struct CoiGenerator<S: ?Sized, R, M> {
    extractor: Extractor<S>,
    builder: CanonicalBuilder<S>,
    registry: Arc<CoiConfigRegistry>,
    loader: CertificateLoader<R, M>,
}

impl<S, R, M> CoiGenerator<S, R, M>
where
    S: DocumentStore + ?Sized,
    R: CertificateRenderer,
    M: Mailer,
{
    pub fn new(
        store: Arc<S>,
        registry: Arc<CoiConfigRegistry>,
        renderer: R,
        mailer: M,
        mail_settings: MailSettings,
    ) -> Self {
        Self {
            extractor: Extractor::new(Arc::clone(&store)),
            builder: CanonicalBuilder::new(store),
            registry,
            loader: CertificateLoader::new(renderer, mailer, mail_settings),
        }
    }

    pub fn registry(&self) -> &CoiConfigRegistry {
        &self.registry
    }

    pub fn loader(&self) -> &CertificateLoader<R, M> {
        &self.loader
    }

    pub async fn generate(&self, request: &CoiRequested) -> Result<GenerationReport, ExtractError> {
        self.generate_at(request, Utc::now()).await
    }

    /// Extraction failures abort the request; per-LOB failures land in the report.
    pub async fn generate_at(
        &self,
        request: &CoiRequested,
        now: DateTime<Utc>,
    ) -> Result<GenerationReport, ExtractError> {
        let raw = self.extractor.extract(request).await.inspect_err(|err| {
            error!(
                policy_foxden_id = %request.policy_foxden_id,
                kind = ?err.kind(),
                error = %err,
                "policy extraction failed"
            );
        })?;
        let raw = &raw;

        let mut report = GenerationReport::new(&raw.policy_foxden_id, raw.geography());
        let (eligible, skipped): (Vec<&String>, Vec<&String>) = raw.lobs.iter().partition(|lob| {
            self.registry
                .has_config(lob, raw.geography(), &raw.carrier_partner)
        });
        report.skipped = skipped.into_iter().cloned().collect();

        if eligible.is_empty() {
            warn!(
                policy_foxden_id = %raw.policy_foxden_id,
                geography = %raw.geography(),
                carrier_partner = %raw.carrier_partner,
                discovered = ?raw.lobs,
                "no eligible lines of business"
            );
            return Ok(report);
        }

        let runs = eligible.iter().map(|lob| async move {
            let result = self.run_lob(raw, lob, now).await;
            (lob.to_string(), result)
        });

        for (lob, result) in join_all(runs).await {
            report.record(settle(raw, lob, result));
        }

        info!(
            policy_foxden_id = %report.policy_foxden_id,
            succeeded = report.succeeded,
            failed = report.failed,
            "certificate generation finished"
        );
        Ok(report)
    }

    /// Resolves config, builds the canonical record and maps it, without rendering.
    pub async fn prepare(
        &self,
        raw: &RawPolicyData,
        lob: &str,
        now: DateTime<Utc>,
    ) -> Result<PreparedCertificate<'_>, PipelineError> {
        let geography = raw.geography();
        let config = self
            .registry
            .resolve(lob, geography, &raw.carrier_partner)?;

        let canonical = self.builder.build(raw, lob, &config.overrides).await?;
        debug!(lob, "canonical built");

        let context = MappingContext {
            canonical: &canonical,
            lob,
            geography,
            carrier_partner: &raw.carrier_partner,
            time_zone: &raw.time_zone,
            now,
        };
        let fields = map_fields(&context, &config.field_mappings);
        debug!(lob, fields = ?fields.keys().collect::<Vec<_>>(), "fields mapped");

        Ok(PreparedCertificate {
            config,
            canonical,
            fields,
        })
    }

    async fn run_lob(
        &self,
        raw: &RawPolicyData,
        lob: &str,
        now: DateTime<Utc>,
    ) -> Result<LobStatus, PipelineError> {
        debug!(
            lob,
            geography = %raw.geography(),
            carrier_partner = %raw.carrier_partner,
            "running certificate pipeline"
        );

        let PreparedCertificate {
            config,
            canonical,
            fields,
        } = self.prepare(raw, lob, now).await?;

        let delivery = Delivery {
            policy_foxden_id: &raw.policy_foxden_id,
            carrier_partner: &raw.carrier_partner,
            recipient_email: &raw.recipient_email,
            lob,
            time_zone: &raw.time_zone,
            now,
        };
        let receipt = self.loader.load(config, fields, &delivery).await?;

        Ok(LobStatus::Succeeded {
            policy_number: canonical.policy_number,
            certificate_number: canonical.certificate_number,
            pdf_bytes: receipt.pdf_bytes,
            message_id: receipt.message_id,
        })
    }
}

fn settle(raw: &RawPolicyData, lob: String, result: Result<LobStatus, PipelineError>) -> LobOutcome {
    let status = match result {
        Ok(status) => {
            info!(lob = %lob, geography = %raw.geography(), "certificate generated");
            status
        }
        Err(err) => {
            error!(lob = %lob, kind = ?err.kind(), error = %err, "certificate generation failed");
            LobStatus::Failed {
                kind: err.kind(),
                error: err.to_string(),
            }
        }
    };
    LobOutcome { lob, status }
}
