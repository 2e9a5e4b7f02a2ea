use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, error, warn};

use super::domain::{AdditionalInsured, CoiRequested, Geography, SubPolicy};
use super::normalizer::{coerce_date, non_blank, string_list};
use super::policy_head::{PolicyHeadError, PolicyHeadResolver, PolicyView};
use super::store::DocumentStore;

pub const DEFAULT_CARRIER_PARTNER: &str = "Foxquilt";
pub const DEFAULT_TIME_ZONE: &str = "America/Toronto";

const COMPANY_NAME: &str = "BusinessInformation_100_CompanyName_WORLD_EN";
const DBA_NAME: &str = "BusinessInformation_100_DBAName_WORLD_EN";
const MAILING_ADDRESS: &str = "BusinessInformation_100_MailingAddress_WORLD_EN";
const BUSINESS_ADDRESS: &str = "BusinessInformation_100_BusinessAddress_WORLD_EN";
const PROFESSION: &str = "BusinessInformation_100_Profession_WORLD_EN";
const PROFESSION_LABELS: &str = "professionLabelList";

const CANADA_RATING_KIND: &str = "Canada";
const ORIGINAL_QUOTE_KIND: &str = "Original";

/// Everything the per-LOB pipeline needs, extracted once per request.
#[derive(Debug, Clone)]
pub struct RawPolicyData {
    pub policy_foxden_id: String,
    pub additional_insured: AdditionalInsured,
    pub lobs: Vec<String>,
    pub carrier_partner: String,
    pub time_zone: String,
    pub recipient_email: String,
    pub application_id: String,
    pub business_name: Option<String>,
    pub dba_name: Option<String>,
    pub sub_policies: Vec<SubPolicy>,
    pub regional: RegionalPolicyData,
}

impl RawPolicyData {
    pub fn geography(&self) -> Geography {
        match self.regional {
            RegionalPolicyData::Canada(_) => Geography::Canada,
            RegionalPolicyData::Us(_) => Geography::Us,
        }
    }
}

/// Geography-specific inputs; only the fields valid for that country exist.
#[derive(Debug, Clone)]
pub enum RegionalPolicyData {
    Canada(CanadaPolicyData),
    Us(UsPolicyData),
}

#[derive(Debug, Clone, Default)]
pub struct CanadaPolicyData {
    pub named_insured_address: Option<Value>,
    pub professions: Vec<String>,
    pub effective_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    /// Present only for original (non-endorsement) quotes.
    pub rating_input: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct UsPolicyData {
    pub business_address: Option<Value>,
    pub professions: Vec<String>,
    /// Present only for original (non-endorsement) quotes.
    pub rating_input: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("policy not found: policyFoxdenId={0}")]
    PolicyNotFound(String),
    #[error(transparent)]
    PolicyHead(#[from] PolicyHeadError),
    #[error("inconsistent database: {0}")]
    Consistency(String),
}

pub struct Extractor<S: ?Sized> {
    resolver: PolicyHeadResolver<S>,
}

impl<S> Extractor<S>
where
    S: DocumentStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            resolver: PolicyHeadResolver::new(store),
        }
    }

    pub async fn extract(&self, request: &CoiRequested) -> Result<RawPolicyData, ExtractError> {
        let CoiRequested {
            policy_foxden_id,
            geography,
            additional_insured,
        } = request;
        debug!(%policy_foxden_id, %geography, "extracting policy data");

        let view = self
            .resolver
            .resolve(policy_foxden_id)
            .await?
            .ok_or_else(|| ExtractError::PolicyNotFound(policy_foxden_id.clone()))?;

        let raw = build_raw(view, policy_foxden_id, *geography, additional_insured)?;
        debug!(lobs = ?raw.lobs, carrier_partner = %raw.carrier_partner, "discovered lines of business");
        Ok(raw)
    }
}

fn build_raw(
    view: PolicyView,
    policy_foxden_id: &str,
    geography: Geography,
    additional_insured: &AdditionalInsured,
) -> Result<RawPolicyData, ExtractError> {
    let PolicyView {
        application_answers,
        application_owner,
        quote,
        policy,
        ..
    } = view;

    let recipient_email = application_owner
        .map(|owner| owner.data.authenticated_email)
        .ok_or_else(|| {
            error!(policy_foxden_id, "application owner missing from policy head");
            ExtractError::Consistency("application owner missing".to_string())
        })?;

    let answers_data = application_answers.data;
    let answers = &answers_data.answers;
    let time_zone = answers_data
        .time_zone
        .filter(|zone| !zone.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TIME_ZONE.to_string());
    let carrier_partner = policy
        .data
        .carrier_partner
        .clone()
        .filter(|carrier| !carrier.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CARRIER_PARTNER.to_string());

    let sub_policies = policy.data.policies.clone();
    let lobs = discover_lobs(&sub_policies, geography);

    let rating_is_canada = quote.data.rating.kind == CANADA_RATING_KIND;
    let is_original = quote.data.kind == ORIGINAL_QUOTE_KIND;
    let rating_input = is_original.then(|| quote.data.rating.input.clone());

    let regional = match geography {
        Geography::Canada => {
            if !rating_is_canada {
                warn!(rating_kind = %quote.data.rating.kind, "geography=CA but rating kind is not Canada");
            }

            let labels = string_list(answers.get(PROFESSION_LABELS));
            let professions = if labels.is_empty() {
                string_list(answers.get(PROFESSION))
            } else {
                labels
            };
            let coverage = policy.data.coverage.unwrap_or_default();

            RegionalPolicyData::Canada(CanadaPolicyData {
                named_insured_address: answers.get(MAILING_ADDRESS).cloned(),
                professions,
                effective_date: coverage.effective_date.as_ref().and_then(coerce_date),
                expiry_date: coverage.expiry_date.as_ref().and_then(coerce_date),
                rating_input,
            })
        }
        Geography::Us => {
            if rating_is_canada {
                warn!(rating_kind = %quote.data.rating.kind, "geography=US but rating kind is Canada");
            }

            let professions = match answers.get(PROFESSION_LABELS) {
                Some(Value::Array(_)) => string_list(answers.get(PROFESSION_LABELS)),
                _ => Vec::new(),
            };

            RegionalPolicyData::Us(UsPolicyData {
                business_address: answers.get(BUSINESS_ADDRESS).cloned(),
                professions,
                rating_input,
            })
        }
    };

    Ok(RawPolicyData {
        policy_foxden_id: policy_foxden_id.to_string(),
        additional_insured: additional_insured.clone(),
        lobs,
        carrier_partner,
        time_zone,
        recipient_email,
        application_id: answers_data.application_id.clone(),
        business_name: answers
            .get(COMPANY_NAME)
            .and_then(Value::as_str)
            .map(str::to_string),
        dba_name: non_blank(answers.get(DBA_NAME)),
        sub_policies,
        regional,
    })
}

/// Lines of business from the sub-policy list, deduplicated in first-seen order.
///
/// Canada stores no sub-policies and issues one combined certificate, so an
/// empty list there means a single synthetic `GL`. An empty US list yields
/// nothing to generate.
pub(crate) fn discover_lobs(sub_policies: &[SubPolicy], geography: Geography) -> Vec<String> {
    if sub_policies.is_empty() {
        return match geography {
            Geography::Canada => vec!["GL".to_string()],
            Geography::Us => Vec::new(),
        };
    }

    let mut lobs: Vec<String> = Vec::new();
    for sub_policy in sub_policies {
        if !lobs.contains(&sub_policy.kind) {
            lobs.push(sub_policy.kind.clone());
        }
    }
    lobs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub_policy(kind: &str, policy_id: &str) -> SubPolicy {
        SubPolicy {
            kind: kind.to_string(),
            policy_id: policy_id.to_string(),
            munich_policy_id: None,
        }
    }

    #[test]
    fn canada_without_sub_policies_gets_one_general_liability_lob() {
        assert_eq!(discover_lobs(&[], Geography::Canada), vec!["GL"]);
        assert!(discover_lobs(&[], Geography::Us).is_empty());
    }

    #[test]
    fn duplicate_kinds_are_collapsed() {
        let sub_policies = vec![
            sub_policy("GL", "P-1"),
            sub_policy("EO", "P-2"),
            sub_policy("GL", "P-3"),
        ];
        assert_eq!(discover_lobs(&sub_policies, Geography::Us), vec!["GL", "EO"]);
    }
}
