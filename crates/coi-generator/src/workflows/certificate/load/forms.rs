//! ACORD 25 form plan: which value goes into which named PDF field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::helpers::{format_currency, format_form_date};
use super::RenderError;
use crate::workflows::certificate::domain::AdditionalInsured;
use crate::workflows::certificate::mapping::{FieldValue, MappedFields};

const DEFAULT_FORM_TIME_ZONE: &str = "America/New_York";
const DEFAULT_US_EMAIL: &str = "support@foxquilt.com";
const DEFAULT_US_PHONE: &str = "(888) 555-0100";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFieldKind {
    Text,
    Checkbox,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormEntry {
    pub form_name: String,
    #[serde(rename = "type")]
    pub kind: FormFieldKind,
    #[serde(default)]
    pub form_variable: Option<String>,
    #[serde(default)]
    pub form_default_value: Option<String>,
    #[serde(default)]
    pub expected_value: Option<String>,
    #[serde(default)]
    pub is_digit: bool,
}

/// Carrier-specific description of the ACORD form fields, in fill order.
#[derive(Debug, Clone, Deserialize)]
pub struct FormsDescriptor {
    pub forms: Vec<FormEntry>,
}

impl FormsDescriptor {
    pub fn from_json(raw: &str) -> Result<Self, RenderError> {
        serde_json::from_str(raw).map_err(|err| RenderError::InvalidFormsDescriptor(err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormFieldValue {
    pub name: String,
    pub kind: FormFieldKind,
    pub text: String,
    pub checked: bool,
}

/// Resolved form fields plus the certificate-holder block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormPlan {
    pub fields: Vec<FormFieldValue>,
    pub certificate_holder: Option<String>,
}

pub fn resolve_form_plan(
    descriptor: &FormsDescriptor,
    mapped: &MappedFields,
    now: DateTime<Utc>,
) -> Result<FormPlan, RenderError> {
    let inputs = FormInputs::new(mapped, now);
    let fields = descriptor
        .forms
        .iter()
        .map(|entry| inputs.resolve(entry))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FormPlan {
        fields,
        certificate_holder: certificate_holder_block(mapped),
    })
}

/// Mapped fields enriched with the values every ACORD form expects.
struct FormInputs<'a> {
    mapped: &'a MappedFields,
    date_now: FieldValue,
    us_email: FieldValue,
    us_phone: FieldValue,
    time_zone: String,
}

impl<'a> FormInputs<'a> {
    fn new(mapped: &'a MappedFields, now: DateTime<Utc>) -> Self {
        let text_or = |field: &str, fallback: &str| {
            mapped
                .get(field)
                .and_then(FieldValue::as_text)
                .unwrap_or(fallback)
                .to_string()
        };

        Self {
            mapped,
            date_now: mapped
                .get("dateNow")
                .cloned()
                .unwrap_or(FieldValue::Date(now)),
            us_email: FieldValue::Text(text_or("producerEmail", DEFAULT_US_EMAIL)),
            us_phone: FieldValue::Text(text_or("producerPhone", DEFAULT_US_PHONE)),
            time_zone: text_or("timeZone", DEFAULT_FORM_TIME_ZONE),
        }
    }

    fn lookup(&self, variable: &str) -> Option<&FieldValue> {
        match variable {
            "dateNow" => Some(&self.date_now),
            "usEmail" => self.mapped.get(variable).or(Some(&self.us_email)),
            "usPhoneNumber" => self.mapped.get(variable).or(Some(&self.us_phone)),
            _ => self.mapped.get(variable),
        }
    }

    fn resolve(&self, entry: &FormEntry) -> Result<FormFieldValue, RenderError> {
        let text = match (&entry.form_default_value, &entry.form_variable) {
            (Some(default), _) => default.clone(),
            (None, Some(variable)) => self
                .lookup(variable)
                .map(|value| self.render(value, entry.is_digit))
                .unwrap_or_default(),
            (None, None) => {
                return Err(RenderError::InvalidFormsDescriptor(format!(
                    "neither formDefaultValue nor formVariable provided for field \"{}\"",
                    entry.form_name
                )))
            }
        };

        let checked = match (&entry.form_default_value, &entry.kind) {
            (Some(_), _) | (None, FormFieldKind::Checkbox) => {
                entry.expected_value.as_deref() == Some(text.as_str())
            }
            (None, FormFieldKind::Text) => false,
        };

        Ok(FormFieldValue {
            name: entry.form_name.clone(),
            kind: entry.kind.clone(),
            text,
            checked,
        })
    }

    fn render(&self, value: &FieldValue, is_digit: bool) -> String {
        match value {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Date(date) => format_form_date(*date, &self.time_zone),
            FieldValue::Number(number) if is_digit => plain_number(*number),
            FieldValue::Number(number) => format_currency(*number),
            FieldValue::Structured(Value::String(text)) => text.clone(),
            FieldValue::Structured(Value::Null) => String::new(),
            FieldValue::Structured(other) => other.to_string(),
        }
    }
}

fn plain_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

/// Holder block composed the same way as the insured block.
fn certificate_holder_block(mapped: &MappedFields) -> Option<String> {
    ["certificateHolder", "additionalInsured"]
        .iter()
        .filter_map(|field| mapped.get(field))
        .find_map(|value| serde_json::from_value::<AdditionalInsured>(value.to_json()).ok())
        .map(|holder| holder.address.block(&holder.name))
}
