use serde_json::{Map, Value};

use super::{
    business_name, CoverageAmount, CoverageDates, CoverageLimits, Coverages, EoCoverage,
    GlCoverage, InsuredParty, Insurer, NamedCoverage, RegionalCanonical, TransformError,
    CANADA_INSURER,
};
use crate::workflows::certificate::domain::Address;
use crate::workflows::certificate::extract::{CanadaPolicyData, RawPolicyData};
use crate::workflows::certificate::normalizer::coerce_limit;

const UNMANNED_AIRCRAFT: &str = "Unmanned aircraft";

/// Canada issues one combined certificate, numbered by the policy identifier.
pub(super) fn transform(
    raw: &RawPolicyData,
    canada: &CanadaPolicyData,
) -> Result<RegionalCanonical, TransformError> {
    let rating_input = canada
        .rating_input
        .as_ref()
        .ok_or_else(|| TransformError::consistency("Canada rating input missing for CA path"))?;
    let address = canada
        .named_insured_address
        .as_ref()
        .ok_or_else(|| TransformError::consistency("named insured address missing for CA path"))
        .and_then(|value| {
            Address::from_answer(value).ok_or_else(|| {
                TransformError::consistency("named insured address is not an underwriting address")
            })
        })?;
    let (Some(effective_date), Some(expiration_date)) = (canada.effective_date, canada.expiry_date)
    else {
        return Err(TransformError::consistency(
            "effective or expiry date missing for CA path",
        ));
    };

    let rating = GlRating::parse(rating_input)?;
    let deductible = rating.deductible;
    let occurrence = rating.occurrence_limit;

    let gl = GlCoverage {
        general_aggregate: CoverageAmount::new(rating.aggregate_limit, deductible),
        each_occurrence: CoverageAmount::new(occurrence, deductible),
        product_and_completed_operations_aggregate: CoverageAmount::new(occurrence, deductible),
        personal_and_advertising_injury_liability: CoverageAmount::new(occurrence, deductible),
        medical_payments: CoverageAmount::new(rating.medical_payments_limit, deductible),
        tenant_legal_liability: CoverageAmount::new(rating.tenant_legal_liability_limit, deductible),
        pollution_liability_extension: rating
            .pollution_limit
            .map(|limit| CoverageAmount::new(limit, deductible)),
    };

    let others = rating
        .unmanned_aircraft_limit
        .map(|limit| NamedCoverage {
            name: UNMANNED_AIRCRAFT.to_string(),
            limit: CoverageAmount::new(limit, deductible),
        })
        .into_iter()
        .collect();

    Ok(RegionalCanonical {
        policy_number: raw.policy_foxden_id.clone(),
        certificate_number: 0,
        insurer: Insurer {
            name: CANADA_INSURER.to_string(),
        },
        insured: InsuredParty::new(business_name(raw)?, raw.dba_name.as_deref(), address),
        dates: CoverageDates {
            effective_date,
            expiration_date,
        },
        limits: CoverageLimits {
            occurrence_limit: occurrence,
            premises_rented_to_you_limit: 0.0,
            medical_payments_limit: rating.medical_payments_limit,
            aggregate_limit: rating.aggregate_limit,
        },
        coverages: Coverages {
            gl,
            eo: rating.eo,
            others,
        },
        description: canada.professions.join(", "),
    })
}

/// General-liability block of the Canada rating input.
///
/// Optional extensions are only read when their flag is set.
#[derive(Debug)]
struct GlRating {
    aggregate_limit: f64,
    occurrence_limit: f64,
    medical_payments_limit: f64,
    tenant_legal_liability_limit: f64,
    deductible: f64,
    pollution_limit: Option<f64>,
    unmanned_aircraft_limit: Option<f64>,
    eo: Option<EoCoverage>,
}

impl GlRating {
    fn parse(rating_input: &Value) -> Result<Self, TransformError> {
        let gl = rating_input
            .get("GL")
            .and_then(Value::as_object)
            .ok_or_else(|| TransformError::consistency("Canada rating input has no GL block"))?;

        let limited_pollution = flag(gl, "limitedPollutionLiability")?;
        let unmanned_aircraft = flag(gl, "limitedCoverageForUnmannedAircraft")?;
        let miscellaneous_eo = flag(gl, "miscellaneousEO")?;

        let eo = if miscellaneous_eo {
            Some(EoCoverage {
                deductible: limit(gl, "miscellaneousEODeductible")?,
                aggregate_amount: limit(gl, "miscellaneousEOAggregateLimit")?,
                occurrence_amount: limit(gl, "miscellaneousEOOccurrenceLimit")?,
            })
        } else {
            None
        };

        Ok(Self {
            aggregate_limit: limit(gl, "aggregateLimit")?,
            occurrence_limit: limit(gl, "occurrenceLimit")?,
            medical_payments_limit: limit(gl, "medicalPaymentsLimit")?,
            tenant_legal_liability_limit: limit(gl, "tenantLegalLiabilityLimit")?,
            deductible: limit(gl, "deductible")?,
            pollution_limit: limited_pollution
                .then(|| limit(gl, "limitedPollutionLiabilityOccurrenceLimit"))
                .transpose()?,
            unmanned_aircraft_limit: unmanned_aircraft
                .then(|| limit(gl, "limitedCoverageForUnmannedAircraftLimit"))
                .transpose()?,
            eo,
        })
    }
}

fn flag(gl: &Map<String, Value>, key: &str) -> Result<bool, TransformError> {
    gl.get(key)
        .and_then(Value::as_bool)
        .ok_or_else(|| TransformError::consistency(format!("{key} isn't a boolean")))
}

fn limit(gl: &Map<String, Value>, key: &str) -> Result<f64, TransformError> {
    coerce_limit(gl.get(key)).ok_or_else(|| {
        TransformError::consistency(format!("{key} isn't a non-negative number"))
    })
}
