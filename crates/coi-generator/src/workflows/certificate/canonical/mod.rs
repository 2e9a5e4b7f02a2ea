//! Geography-agnostic certificate record and the transforms that build it.

mod canada;
mod us;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::config::CanonicalOverrides;
use super::domain::{generate_named_insured, AdditionalInsured, Address, Geography};
use super::extract::{RawPolicyData, RegionalPolicyData};
use super::store::DocumentStore;

pub const CANADA_INSURER: &str = "Certain Underwriters at Lloyd's of London";
pub const US_PLACEHOLDER_INSURER: &str = "State National Insurance Company";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Canonical {
    pub policy_foxden_id: String,
    pub policy_number: String,
    pub insurer: Insurer,
    pub insured: InsuredParty,
    pub additional_insured: AdditionalInsured,
    pub certificate_number: u32,
    pub dates: CoverageDates,
    pub limits: CoverageLimits,
    pub description: String,
    pub certificate_holder: AdditionalInsured,
    pub coverages: Coverages,
    pub producer: Producer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insurer {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsuredParty {
    /// `"{name}\n{street}\n{city}, {province}, {postalCode}"`
    pub block: String,
    pub name: String,
    pub address: Address,
}

impl InsuredParty {
    fn new(business_name: &str, dba_name: Option<&str>, address: Address) -> Self {
        let name = generate_named_insured(business_name, dba_name);
        Self {
            block: address.block(&name),
            name,
            address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageDates {
    pub effective_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageLimits {
    pub occurrence_limit: f64,
    pub premises_rented_to_you_limit: f64,
    pub medical_payments_limit: f64,
    pub aggregate_limit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageAmount {
    pub amount: f64,
    pub deductible: f64,
}

impl CoverageAmount {
    pub fn new(amount: f64, deductible: f64) -> Self {
        Self { amount, deductible }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlCoverage {
    pub general_aggregate: CoverageAmount,
    pub each_occurrence: CoverageAmount,
    pub product_and_completed_operations_aggregate: CoverageAmount,
    pub personal_and_advertising_injury_liability: CoverageAmount,
    pub medical_payments: CoverageAmount,
    pub tenant_legal_liability: CoverageAmount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pollution_liability_extension: Option<CoverageAmount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EoCoverage {
    pub deductible: f64,
    pub aggregate_amount: f64,
    pub occurrence_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedCoverage {
    pub name: String,
    pub limit: CoverageAmount,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coverages {
    pub gl: GlCoverage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eo: Option<EoCoverage>,
    pub others: Vec<NamedCoverage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Producer {
    pub name: String,
    pub phone: String,
    pub email: String,
}

impl Producer {
    pub fn for_geography(geography: Geography) -> Self {
        let (name, phone) = match geography {
            Geography::Canada => ("Foxquilt Insurance Services", "1-877-469-3569"),
            Geography::Us => ("Foxquilt Insurance Services LLC", "(888) 555-0100"),
        };
        Self {
            name: name.to_string(),
            phone: phone.to_string(),
            email: "support@foxquilt.com".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("inconsistent database: {0}")]
    Consistency(String),
    #[error("no policy found for line of business: {0}")]
    LineOfBusinessNotFound(String),
}

impl TransformError {
    pub(crate) fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency(message.into())
    }
}

/// Geography-specific fields shared by both transforms.
struct RegionalCanonical {
    policy_number: String,
    certificate_number: u32,
    insurer: Insurer,
    insured: InsuredParty,
    dates: CoverageDates,
    limits: CoverageLimits,
    coverages: Coverages,
    description: String,
}

pub struct CanonicalBuilder<S: ?Sized> {
    store: Arc<S>,
}

impl<S> CanonicalBuilder<S>
where
    S: DocumentStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn build(
        &self,
        raw: &RawPolicyData,
        lob: &str,
        overrides: &CanonicalOverrides,
    ) -> Result<Canonical, TransformError> {
        let geography = raw.geography();
        debug!(lob, %geography, policy_foxden_id = %raw.policy_foxden_id, "building canonical record");

        let regional = match &raw.regional {
            RegionalPolicyData::Canada(canada) => canada::transform(raw, canada)?,
            RegionalPolicyData::Us(us) => {
                us::transform(self.store.as_ref(), raw, us, lob, overrides).await?
            }
        };

        Ok(Canonical {
            policy_foxden_id: raw.policy_foxden_id.clone(),
            policy_number: regional.policy_number,
            insurer: regional.insurer,
            insured: regional.insured,
            additional_insured: raw.additional_insured.clone(),
            certificate_number: regional.certificate_number,
            dates: regional.dates,
            limits: regional.limits,
            description: regional.description,
            certificate_holder: raw.additional_insured.clone(),
            coverages: regional.coverages,
            producer: Producer::for_geography(geography),
        })
    }
}

fn business_name(raw: &RawPolicyData) -> Result<&str, TransformError> {
    raw.business_name
        .as_deref()
        .ok_or_else(|| TransformError::consistency("company name missing from application answers"))
}
