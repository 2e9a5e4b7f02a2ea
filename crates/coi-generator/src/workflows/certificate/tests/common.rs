use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use crate::workflows::certificate::config::CoiConfigRegistry;
use crate::workflows::certificate::domain::{AdditionalInsured, Address, CoiRequested, Geography};
use crate::workflows::certificate::load::{
    CertificateRenderer, MailError, MailMessage, MailReceipt, MailSettings, Mailer, RenderError,
    RenderJob,
};
use crate::workflows::certificate::pipeline::CoiGenerator;
use crate::workflows::certificate::store::{
    DocumentCursor, DocumentStore, FieldFilter, InMemoryDocumentStore, StoreError,
};

pub(super) const POLICY_ID: &str = "FOX-1001";

pub(super) fn asset_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

pub(super) fn registry() -> Arc<CoiConfigRegistry> {
    Arc::new(CoiConfigRegistry::standard(&asset_root()).expect("built-in config is valid"))
}

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 16, 0, 0).unwrap()
}

pub(super) fn additional_insured() -> AdditionalInsured {
    AdditionalInsured {
        name: "Landlord Holdings LLC".to_string(),
        address: Address {
            street: "500 Congress Ave".to_string(),
            city: "Austin".to_string(),
            province: "TX".to_string(),
            postal_code: "78701".to_string(),
        },
    }
}

pub(super) fn request(geography: Geography) -> CoiRequested {
    CoiRequested {
        policy_foxden_id: POLICY_ID.to_string(),
        geography,
        additional_insured: additional_insured(),
    }
}

/// Document set for one active policy, shaped like the hosted collections.
#[derive(Debug, Clone)]
pub(super) struct PolicyFixture {
    pub(super) root_policy: bool,
    pub(super) answers_version: i64,
    pub(super) policy_version: i64,
    pub(super) quote_version: i64,
    pub(super) quote_present: bool,
    pub(super) quote_kind: &'static str,
    pub(super) rating_kind: &'static str,
    pub(super) rating_input: Value,
    pub(super) answers: Value,
    pub(super) time_zone: Option<&'static str>,
    pub(super) carrier_partner: Option<&'static str>,
    pub(super) sub_policies: Value,
    pub(super) coverage: Value,
    pub(super) owner_email: Option<&'static str>,
    pub(super) prior_certificates: Option<usize>,
}

impl PolicyFixture {
    pub(super) fn us() -> Self {
        Self {
            root_policy: false,
            answers_version: 7,
            policy_version: 6,
            quote_version: 9,
            quote_present: true,
            quote_kind: "Original",
            rating_kind: "US",
            rating_input: json!({
                "GL": {
                    "policyEffectiveDate": "2025-01-01T05:00:00.000Z",
                    "policyExpirationDate": "2026-01-01T05:00:00.000Z",
                    "occurrenceLimit": 1_000_000,
                    "premisesRentedToYouLimit": 100_000,
                    "medicalPaymentsLimit": 5_000,
                    "aggregateLimit": 2_000_000
                }
            }),
            answers: json!({
                "BusinessInformation_100_CompanyName_WORLD_EN": "Acme Corp",
                "BusinessInformation_100_DBAName_WORLD_EN": "Widget Store",
                "BusinessInformation_100_BusinessAddress_WORLD_EN": {
                    "street": "1 Main St",
                    "city": "Dallas",
                    "province": "TX",
                    "postalCode": "75201"
                },
                "professionLabelList": ["IT Consultant", "Software Developer"]
            }),
            time_zone: Some("America/Chicago"),
            carrier_partner: Some("StateNational"),
            sub_policies: json!([{ "kind": "GL", "policyId": "P-1" }]),
            coverage: Value::Null,
            owner_email: Some("owner@acme.example"),
            prior_certificates: Some(0),
        }
    }

    pub(super) fn canada() -> Self {
        Self {
            root_policy: true,
            rating_kind: "Canada",
            rating_input: canada_rating(true, false, false),
            answers: json!({
                "BusinessInformation_100_CompanyName_WORLD_EN": "Maple Design Inc.",
                "BusinessInformation_100_DBAName_WORLD_EN": "  ",
                "BusinessInformation_100_MailingAddress_WORLD_EN": {
                    "street": "1 King St W",
                    "city": "Toronto",
                    "province": "ON",
                    "postalCode": "M5H 1A1"
                },
                "BusinessInformation_100_Profession_WORLD_EN": "graphic_designer",
                "professionLabelList": ["Graphic Designer"]
            }),
            time_zone: None,
            carrier_partner: None,
            sub_policies: json!([]),
            coverage: json!({
                "effectiveDate": { "$date": "2025-02-01T05:00:00.000Z" },
                "expiryDate": "2026-02-01T05:00:00.000Z"
            }),
            prior_certificates: None,
            ..Self::us()
        }
    }

    pub(super) fn store(&self) -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new();
        self.insert_into(&store, POLICY_ID, "1");
        store
    }

    /// Inserts one complete policy head; `suffix` keeps object ids unique.
    pub(super) fn insert_into(&self, store: &InMemoryDocumentStore, policy_foxden_id: &str, suffix: &str) {
        let policy_object_id = format!("policy-{suffix}");
        let application_id = format!("app-{suffix}");
        let quote_object_id = format!("quote-{suffix}");

        let answers_record = json!({
            "_id": format!("answers-{suffix}"),
            "version": self.answers_version,
            "data": {
                "endorsementPolicyObjectId": policy_object_id,
                "applicationId": application_id,
                "answers": self.answers,
                "timeZone": self.time_zone
            }
        });

        let mut policy = json!({
            "_id": policy_object_id,
            "version": self.policy_version,
            "data": {
                "kind": if self.root_policy { "Root" } else { "Endorsement" },
                "policyId": format!("FQ-{suffix}"),
                "carrierPartner": self.carrier_partner,
                "coverage": self.coverage,
                "policies": self.sub_policies
            }
        });

        let insert = |collection: &str, document: Value| {
            store.insert(collection, document).expect("fixture insert");
        };

        if self.root_policy {
            policy["data"]["applicationAnswers"] = answers_record;
        } else {
            insert("ApplicationAnswers", answers_record);
        }
        insert("Policy", policy);
        insert(
            "ActivePolicy",
            json!({
                "_id": format!("active-{suffix}"),
                "data": { "policyFoxdenId": policy_foxden_id, "policyObjectId": policy_object_id }
            }),
        );
        insert(
            "PolicyQuote",
            json!({
                "_id": format!("policy-quote-{suffix}"),
                "data": { "policyObjectId": policy_object_id, "quoteObjectId": quote_object_id }
            }),
        );
        if self.quote_present {
            insert(
                "Quote",
                json!({
                    "_id": quote_object_id,
                    "version": self.quote_version,
                    "data": {
                        "kind": self.quote_kind,
                        "rating": { "kind": self.rating_kind, "input": self.rating_input }
                    }
                }),
            );
        }
        if let Some(email) = self.owner_email {
            insert(
                "ApplicationOwner",
                json!({
                    "_id": format!("owner-{suffix}"),
                    "data": { "applicationId": application_id, "authenticatedEmail": email }
                }),
            );
        }
        insert(
            "Application",
            json!({ "_id": application_id, "data": { "status": "Bound" } }),
        );

        if let Some(prior) = self.prior_certificates {
            let records = (0..prior)
                .map(|index| json!({ "_id": format!("coi-{index}"), "data": { "policyFoxdenId": "P-1" } }))
                .collect();
            store
                .insert_many("COIRecord", records)
                .expect("fixture insert");
        }
    }
}

pub(super) fn canada_rating(pollution: bool, aircraft: bool, eo: bool) -> Value {
    json!({
        "GL": {
            "aggregateLimit": 5_000_000,
            "occurrenceLimit": 2_000_000,
            "medicalPaymentsLimit": 2_500,
            "tenantLegalLiabilityLimit": 500_000,
            "deductible": 1_000,
            "limitedPollutionLiability": pollution,
            "limitedPollutionLiabilityOccurrenceLimit": 250_000,
            "limitedCoverageForUnmannedAircraft": aircraft,
            "limitedCoverageForUnmannedAircraftLimit": 100_000,
            "miscellaneousEO": eo,
            "miscellaneousEODeductible": 2_500,
            "miscellaneousEOAggregateLimit": 1_000_000,
            "miscellaneousEOOccurrenceLimit": 1_000_000
        }
    })
}

#[derive(Default, Clone)]
pub(super) struct RecordingRenderer {
    jobs: Arc<Mutex<Vec<RenderJob>>>,
    failing_lob: Option<&'static str>,
}

impl RecordingRenderer {
    pub(super) fn failing_for(lob: &'static str) -> Self {
        Self {
            failing_lob: Some(lob),
            ..Self::default()
        }
    }

    pub(super) fn jobs(&self) -> Vec<RenderJob> {
        self.jobs.lock().expect("renderer mutex poisoned").clone()
    }
}

#[async_trait]
impl CertificateRenderer for RecordingRenderer {
    async fn render(&self, job: &RenderJob) -> Result<Vec<u8>, RenderError> {
        if self.failing_lob == Some(job.lob.as_str()) {
            return Err(RenderError::Renderer("template engine offline".to_string()));
        }
        self.jobs
            .lock()
            .expect("renderer mutex poisoned")
            .push(job.clone());
        Ok(b"%PDF-1.7 certificate".to_vec())
    }
}

#[derive(Default, Clone)]
pub(super) struct RecordingMailer {
    messages: Arc<Mutex<Vec<MailMessage>>>,
}

impl RecordingMailer {
    pub(super) fn messages(&self) -> Vec<MailMessage> {
        self.messages.lock().expect("mailer mutex poisoned").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> Result<MailReceipt, MailError> {
        let mut messages = self.messages.lock().expect("mailer mutex poisoned");
        messages.push(message);
        Ok(MailReceipt {
            message_id: format!("msg-{}", messages.len()),
            preview_url: None,
        })
    }
}

pub(super) struct RejectingMailer;

#[async_trait]
impl Mailer for RejectingMailer {
    async fn send(&self, _message: MailMessage) -> Result<MailReceipt, MailError> {
        Err(MailError::Rejected("recipient mailbox unavailable".to_string()))
    }
}

/// Store whose every query fails, as when the database is unreachable.
pub(super) struct UnavailableStore;

#[async_trait]
impl DocumentStore for UnavailableStore {
    async fn find(
        &self,
        _collection: &str,
        _filter: &FieldFilter,
    ) -> Result<Box<dyn DocumentCursor>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn count(&self, _collection: &str, _filter: &FieldFilter) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

pub(super) type TestGenerator = CoiGenerator<InMemoryDocumentStore, RecordingRenderer, RecordingMailer>;

pub(super) fn generator(store: InMemoryDocumentStore) -> (Arc<InMemoryDocumentStore>, TestGenerator) {
    let store = Arc::new(store);
    let generator = CoiGenerator::new(
        Arc::clone(&store),
        registry(),
        RecordingRenderer::default(),
        RecordingMailer::default(),
        MailSettings::default(),
    );
    (store, generator)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}
