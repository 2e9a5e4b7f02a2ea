use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Country the certificate is issued for. Drives every geography-specific rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Geography {
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "CA")]
    Canada,
}

impl Geography {
    pub fn code(self) -> &'static str {
        match self {
            Geography::Us => "US",
            Geography::Canada => "CA",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "US" => Some(Self::Us),
            "CA" => Some(Self::Canada),
            _ => None,
        }
    }
}

impl fmt::Display for Geography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Postal address as stored in application answers and in requests.
///
/// `province` carries the abbreviation (`ON`, `BC`, `TX`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
}

impl Address {
    /// Accepts a stored answer only when every component is a non-empty string.
    pub fn from_answer(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let component = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .filter(|text| !text.trim().is_empty())
                .map(str::to_string)
        };

        Some(Self {
            street: component("street")?,
            city: component("city")?,
            province: component("province")?,
            postal_code: component("postalCode")?,
        })
    }

    /// Multi-line block used for the insured and certificate-holder boxes.
    pub fn block(&self, name: &str) -> String {
        format!(
            "{name}\n{}\n{}, {}, {}",
            self.street, self.city, self.province, self.postal_code
        )
    }
}

/// Party the certificate is addressed to; also the certificate holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalInsured {
    pub name: String,
    pub address: Address,
}

/// Inbound event requesting certificates for every eligible line of business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoiRequested {
    pub policy_foxden_id: String,
    pub geography: Geography,
    pub additional_insured: AdditionalInsured,
}

/// Entry of the policy's embedded sub-policy list (one per line of business).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubPolicy {
    pub kind: String,
    pub policy_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub munich_policy_id: Option<String>,
}

/// Combines the company name with a DBA name when one is present.
///
/// Whitespace-only DBA names count as absent.
pub fn generate_named_insured(company_name: &str, dba_name: Option<&str>) -> String {
    match dba_name.filter(|dba| !dba.trim().is_empty()) {
        Some(dba) => format!("{company_name} DBA {dba}"),
        None => company_name.to_string(),
    }
}
