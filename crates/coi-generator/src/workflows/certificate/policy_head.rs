//! Cross-collection "policy head" view of a single active policy.
//!
//! The join is anchored on the active-policy record and walks
//! policy → application answers → policy quote → quote → owner → application,
//! mirroring the aggregation the hosted store runs. Only the anchor lookup is
//! streamed; satellite lookups are drained eagerly.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error};

use super::domain::SubPolicy;
use super::store::{
    collect_all, lookup_path, DocumentCursor, DocumentStore, FieldFilter, StoreError,
    ACTIVE_POLICY, APPLICATION, APPLICATION_ANSWERS, APPLICATION_OWNER, POLICY, POLICY_QUOTE,
    QUOTE,
};

pub const APPLICATION_ANSWERS_VERSION: i64 = 7;
pub const POLICY_VERSION: i64 = 6;
pub const QUOTE_VERSION: i64 = 9;

const ROOT_POLICY_KIND: &str = "Root";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationAnswersRecord {
    pub version: i64,
    pub data: ApplicationAnswersData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationAnswersData {
    pub application_id: String,
    #[serde(default)]
    pub answers: Map<String, Value>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationOwnerRecord {
    pub data: ApplicationOwnerData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationOwnerData {
    pub authenticated_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub version: i64,
    pub data: QuoteData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteData {
    pub kind: String,
    pub rating: RatingData,
}

/// Rating payload; `input` keeps the carrier's shape until the transform reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingData {
    pub kind: String,
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub version: i64,
    pub data: PolicyData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyData {
    pub kind: String,
    #[serde(default)]
    pub policy_id: Option<String>,
    #[serde(default)]
    pub carrier_partner: Option<String>,
    #[serde(default)]
    pub coverage: Option<PolicyCoverage>,
    #[serde(default)]
    pub policies: Vec<SubPolicy>,
}

/// Coverage period; values stay raw because the store may hold several date encodings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyCoverage {
    #[serde(default)]
    pub effective_date: Option<Value>,
    #[serde(default)]
    pub expiry_date: Option<Value>,
}

/// Consistent joined snapshot of one policy. Rebuilt per request, never persisted.
#[derive(Debug, Clone)]
pub struct PolicyView {
    pub application: Option<Value>,
    pub application_answers: ApplicationAnswersRecord,
    pub application_owner: Option<ApplicationOwnerRecord>,
    pub quote: QuoteRecord,
    pub policy: PolicyRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionedRecord {
    ApplicationAnswers,
    Policy,
    Quote,
}

impl fmt::Display for VersionedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VersionedRecord::ApplicationAnswers => "application answers",
            VersionedRecord::Policy => "policy",
            VersionedRecord::Quote => "quote",
        };
        f.write_str(label)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyHeadError {
    #[error("policy head lookup failed: {0}")]
    Store(#[from] StoreError),
    #[error(
        "{record} data version changed: expected {expected}, found {}",
        found.map_or_else(|| "none".to_string(), |version| version.to_string())
    )]
    SchemaDrift {
        record: VersionedRecord,
        expected: i64,
        found: Option<i64>,
    },
    #[error("inconsistent database: {0}")]
    Consistency(String),
}

/// One row of the left-join chain before validation.
#[derive(Debug, Clone)]
struct PolicyHeadRow {
    policy: Value,
    application_answers: Option<Value>,
    quote: Option<Value>,
    application_owner: Option<Value>,
    application: Option<Value>,
}

pub struct PolicyHeadResolver<S: ?Sized> {
    store: Arc<S>,
}

impl<S> PolicyHeadResolver<S>
where
    S: DocumentStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns the single policy view for `policy_foxden_id`, or `None` when no
    /// active policy exists. The anchor cursor is closed on every path.
    pub async fn resolve(
        &self,
        policy_foxden_id: &str,
    ) -> Result<Option<PolicyView>, PolicyHeadError> {
        debug!(policy_foxden_id, "running policy head join");

        let anchors = self
            .store
            .find(
                ACTIVE_POLICY,
                &FieldFilter::eq("data.policyFoxdenId", policy_foxden_id),
            )
            .await?;
        let mut join = PolicyHeadJoin {
            store: self.store.as_ref(),
            anchors,
            pending: VecDeque::new(),
        };

        let outcome = read_single_row(&mut join).await;
        let closed = join.anchors.close().await;
        let row = outcome?;
        closed?;

        row.map(validate_row).transpose()
    }
}

async fn read_single_row<S>(
    join: &mut PolicyHeadJoin<'_, S>,
) -> Result<Option<PolicyHeadRow>, PolicyHeadError>
where
    S: DocumentStore + ?Sized,
{
    let Some(row) = join.next_row().await? else {
        return Ok(None);
    };

    if join.next_row().await?.is_some() {
        error!("policy head join returned more than one row");
        return Err(PolicyHeadError::Consistency(
            "multiple active policies".to_string(),
        ));
    }

    Ok(Some(row))
}

fn validate_row(row: PolicyHeadRow) -> Result<PolicyView, PolicyHeadError> {
    let answers = row.application_answers.ok_or_else(|| {
        PolicyHeadError::Consistency("application answers missing from policy head".to_string())
    })?;
    let quote = row.quote.ok_or_else(|| {
        PolicyHeadError::Consistency("quote missing from policy head".to_string())
    })?;

    check_version(
        &answers,
        VersionedRecord::ApplicationAnswers,
        APPLICATION_ANSWERS_VERSION,
    )?;
    check_version(&row.policy, VersionedRecord::Policy, POLICY_VERSION)?;
    check_version(&quote, VersionedRecord::Quote, QUOTE_VERSION)?;

    Ok(PolicyView {
        application: row.application,
        application_answers: decode(answers, "application answers")?,
        application_owner: row
            .application_owner
            .map(|owner| decode(owner, "application owner"))
            .transpose()?,
        quote: decode(quote, "quote")?,
        policy: decode(row.policy, "policy")?,
    })
}

fn check_version(
    record: &Value,
    kind: VersionedRecord,
    expected: i64,
) -> Result<(), PolicyHeadError> {
    let found = record.get("version").and_then(Value::as_i64);
    if found == Some(expected) {
        return Ok(());
    }

    error!(record = %kind, expected, ?found, "record data version changed");
    Err(PolicyHeadError::SchemaDrift {
        record: kind,
        expected,
        found,
    })
}

fn decode<T: serde::de::DeserializeOwned>(
    value: Value,
    label: &str,
) -> Result<T, PolicyHeadError> {
    serde_json::from_value(value)
        .map_err(|err| PolicyHeadError::Consistency(format!("{label} record malformed: {err}")))
}

struct PolicyHeadJoin<'a, S: ?Sized> {
    store: &'a S,
    anchors: Box<dyn DocumentCursor>,
    pending: VecDeque<PolicyHeadRow>,
}

impl<S> PolicyHeadJoin<'_, S>
where
    S: DocumentStore + ?Sized,
{
    async fn next_row(&mut self) -> Result<Option<PolicyHeadRow>, StoreError> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Ok(Some(row));
            }

            match self.anchors.next().await? {
                Some(active_policy) => {
                    let rows = self.expand(&active_policy).await?;
                    self.pending.extend(rows);
                }
                None => return Ok(None),
            }
        }
    }

    async fn expand(&self, active_policy: &Value) -> Result<Vec<PolicyHeadRow>, StoreError> {
        let mut rows = Vec::new();
        let policies = self
            .matching(POLICY, "_id", lookup_path(active_policy, "data.policyObjectId"))
            .await?;

        for policy in policies {
            let policy_ref = policy.get("_id");
            let answers = left(
                self.matching(
                    APPLICATION_ANSWERS,
                    "data.endorsementPolicyObjectId",
                    policy_ref,
                )
                .await?,
            );
            let policy_quotes = self
                .matching(POLICY_QUOTE, "data.policyObjectId", policy_ref)
                .await?;
            let is_root = lookup_path(&policy, "data.kind").and_then(Value::as_str)
                == Some(ROOT_POLICY_KIND);

            for endorsement_answers in &answers {
                for policy_quote in &policy_quotes {
                    let quotes = left(
                        self.matching(
                            QUOTE,
                            "_id",
                            lookup_path(policy_quote, "data.quoteObjectId"),
                        )
                        .await?,
                    );

                    for quote in quotes {
                        let application_answers = if is_root {
                            lookup_path(&policy, "data.applicationAnswers").cloned()
                        } else {
                            endorsement_answers.clone()
                        };
                        let application_id = application_answers
                            .as_ref()
                            .and_then(|answers| lookup_path(answers, "data.applicationId"))
                            .cloned();

                        let owners = left(
                            self.matching(
                                APPLICATION_OWNER,
                                "data.applicationId",
                                application_id.as_ref(),
                            )
                            .await?,
                        );
                        let applications = left(
                            self.matching(APPLICATION, "_id", application_id.as_ref())
                                .await?,
                        );

                        for owner in &owners {
                            for application in &applications {
                                rows.push(PolicyHeadRow {
                                    policy: policy.clone(),
                                    application_answers: application_answers.clone(),
                                    quote: quote.clone(),
                                    application_owner: owner.clone(),
                                    application: application.clone(),
                                });
                            }
                        }
                    }
                }
            }
        }

        Ok(rows)
    }

    /// Documents of `collection` whose `field` equals `local`; a missing local key matches nothing.
    async fn matching(
        &self,
        collection: &str,
        field: &str,
        local: Option<&Value>,
    ) -> Result<Vec<Value>, StoreError> {
        match local {
            Some(value) if !value.is_null() => {
                collect_all(self.store, collection, &FieldFilter::eq(field, value.clone())).await
            }
            _ => Ok(Vec::new()),
        }
    }
}

/// Left-join unwind: an empty match list still yields one row with no value.
fn left(matches: Vec<Value>) -> Vec<Option<Value>> {
    if matches.is_empty() {
        vec![None]
    } else {
        matches.into_iter().map(Some).collect()
    }
}
