use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{
    business_name, CoverageAmount, CoverageDates, CoverageLimits, Coverages, GlCoverage,
    InsuredParty, Insurer, RegionalCanonical, TransformError, US_PLACEHOLDER_INSURER,
};
use crate::workflows::certificate::config::CanonicalOverrides;
use crate::workflows::certificate::domain::{Address, SubPolicy};
use crate::workflows::certificate::extract::{RawPolicyData, UsPolicyData};
use crate::workflows::certificate::normalizer::{coerce_date, coerce_limit};
use crate::workflows::certificate::store::{DocumentStore, FieldFilter, COI_RECORD};

pub(super) async fn transform<S>(
    store: &S,
    raw: &RawPolicyData,
    us: &UsPolicyData,
    lob: &str,
    overrides: &CanonicalOverrides,
) -> Result<RegionalCanonical, TransformError>
where
    S: DocumentStore + ?Sized,
{
    let rating_input = us
        .rating_input
        .as_ref()
        .ok_or_else(|| TransformError::consistency("US rating input missing for US path"))?;
    let address = us
        .business_address
        .as_ref()
        .ok_or_else(|| TransformError::consistency("business address missing for US path"))
        .and_then(|value| {
            Address::from_answer(value).ok_or_else(|| {
                TransformError::consistency("business address answer isn't an address")
            })
        })?;

    let rating = UsGlRating::parse(rating_input)?;
    let policy_number = policy_id_for_line_of_business(&raw.sub_policies, lob)?;
    let certificate_number = next_certificate_number(store, &policy_number).await;
    let deductible = overrides.deductible.unwrap_or(0.0);

    let gl = GlCoverage {
        general_aggregate: CoverageAmount::new(rating.aggregate_limit, deductible),
        each_occurrence: CoverageAmount::new(rating.occurrence_limit, deductible),
        product_and_completed_operations_aggregate: CoverageAmount::new(
            rating.aggregate_limit,
            deductible,
        ),
        personal_and_advertising_injury_liability: CoverageAmount::new(
            rating.occurrence_limit,
            deductible,
        ),
        medical_payments: CoverageAmount::new(rating.medical_payments_limit, deductible),
        tenant_legal_liability: CoverageAmount::new(
            rating.premises_rented_to_you_limit,
            deductible,
        ),
        pollution_liability_extension: None,
    };

    Ok(RegionalCanonical {
        policy_number,
        certificate_number,
        insurer: Insurer {
            name: overrides
                .insurer_name
                .clone()
                .unwrap_or_else(|| US_PLACEHOLDER_INSURER.to_string()),
        },
        insured: InsuredParty::new(business_name(raw)?, raw.dba_name.as_deref(), address),
        dates: rating.dates,
        limits: CoverageLimits {
            occurrence_limit: rating.occurrence_limit,
            premises_rented_to_you_limit: rating.premises_rented_to_you_limit,
            medical_payments_limit: rating.medical_payments_limit,
            aggregate_limit: rating.aggregate_limit,
        },
        coverages: Coverages {
            gl,
            eo: None,
            others: Vec::new(),
        },
        description: us.professions.join(", "),
    })
}

/// Policy id of the first sub-policy whose kind is `lob`.
pub(crate) fn policy_id_for_line_of_business(
    sub_policies: &[SubPolicy],
    lob: &str,
) -> Result<String, TransformError> {
    sub_policies
        .iter()
        .find(|sub_policy| sub_policy.kind == lob)
        .map(|sub_policy| sub_policy.policy_id.clone())
        .ok_or_else(|| TransformError::LineOfBusinessNotFound(lob.to_string()))
}

/// Prior certificates for the policy plus one. A failed count reads as zero prior certificates.
pub(crate) async fn next_certificate_number<S>(store: &S, policy_number: &str) -> u32
where
    S: DocumentStore + ?Sized,
{
    let filter = FieldFilter::eq("data.policyFoxdenId", policy_number);
    match store.count(COI_RECORD, &filter).await {
        Ok(prior) => {
            debug!(policy_number, prior, "counted prior certificates");
            u32::try_from(prior).unwrap_or(u32::MAX - 1) + 1
        }
        Err(err) => {
            warn!(policy_number, error = %err, "certificate count unavailable, numbering from 1");
            1
        }
    }
}

#[derive(Debug)]
struct UsGlRating {
    dates: CoverageDates,
    occurrence_limit: f64,
    premises_rented_to_you_limit: f64,
    medical_payments_limit: f64,
    aggregate_limit: f64,
}

impl UsGlRating {
    fn parse(rating_input: &Value) -> Result<Self, TransformError> {
        let gl = rating_input
            .get("GL")
            .and_then(Value::as_object)
            .ok_or_else(|| TransformError::consistency("US rating input has no GL block"))?;

        Ok(Self {
            dates: CoverageDates {
                effective_date: date(gl, "policyEffectiveDate")?,
                expiration_date: date(gl, "policyExpirationDate")?,
            },
            occurrence_limit: limit(gl, "occurrenceLimit")?,
            premises_rented_to_you_limit: limit(gl, "premisesRentedToYouLimit")?,
            medical_payments_limit: limit(gl, "medicalPaymentsLimit")?,
            aggregate_limit: limit(gl, "aggregateLimit")?,
        })
    }
}

fn date(gl: &Map<String, Value>, key: &str) -> Result<DateTime<Utc>, TransformError> {
    gl.get(key)
        .and_then(coerce_date)
        .ok_or_else(|| TransformError::consistency(format!("{key} isn't a date")))
}

fn limit(gl: &Map<String, Value>, key: &str) -> Result<f64, TransformError> {
    coerce_limit(gl.get(key)).ok_or_else(|| {
        TransformError::consistency(format!("{key} isn't a non-negative number"))
    })
}
