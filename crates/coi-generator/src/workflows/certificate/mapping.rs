//! Projection of the canonical record into flat renderer inputs.
//!
//! Mapping tables hold dotted paths (`canonical.limits.occurrenceLimit`) that
//! are parsed and root-checked once, then resolved against a fixed, typed
//! context. Resolution never fails: a path that leads nowhere maps to `None`.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::canonical::{
    Canonical, CoverageAmount, CoverageDates, CoverageLimits, Coverages, EoCoverage, GlCoverage,
    InsuredParty, Insurer, NamedCoverage, Producer,
};
use super::domain::{AdditionalInsured, Address, Geography};

/// Segment of a dotted lookup path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl PathSegment {
    fn as_field(&self) -> Option<&str> {
        match self {
            PathSegment::Field(name) => Some(name),
            PathSegment::Index(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    pub raw: String,
    pub segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Splits on `.`; purely numeric segments (or `[n]`) address list items.
    pub fn from_dotted(path: &str) -> Self {
        let segments = path
            .split('.')
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                let index = segment
                    .strip_prefix('[')
                    .and_then(|inner| inner.strip_suffix(']'))
                    .unwrap_or(segment);
                match index.parse::<usize>() {
                    Ok(index) => PathSegment::Index(index),
                    Err(_) => PathSegment::Field(segment.to_string()),
                }
            })
            .collect();

        Self {
            raw: path.to_string(),
            segments,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Top-level keys of the mapping context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRoot {
    Canonical,
    Lob,
    Geography,
    CarrierPartner,
    TimeZone,
    Now,
}

impl ContextRoot {
    pub fn parse(segment: &str) -> Option<Self> {
        match segment {
            "canonical" => Some(Self::Canonical),
            "lob" => Some(Self::Lob),
            "geography" => Some(Self::Geography),
            "carrierPartner" => Some(Self::CarrierPartner),
            "timeZone" => Some(Self::TimeZone),
            "now" => Some(Self::Now),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MappingConfigError {
    #[error("mapping for '{field}' has an empty path")]
    EmptyPath { field: String },
    #[error("mapping for '{field}' starts at unknown context key in '{path}'")]
    UnknownRoot { field: String, path: String },
    #[error("output field '{0}' is mapped twice")]
    DuplicateField(String),
}

/// Ordered output field → lookup path table.
#[derive(Debug, Clone, Default)]
pub struct FieldMappingTable {
    entries: IndexMap<String, FieldPath>,
}

impl FieldMappingTable {
    pub fn parse(entries: &[(&str, &str)]) -> Result<Self, MappingConfigError> {
        let mut parsed = IndexMap::with_capacity(entries.len());
        for (field, raw_path) in entries {
            let path = FieldPath::from_dotted(raw_path);
            let root = match path.segments.first() {
                Some(segment) => segment.as_field(),
                None => {
                    return Err(MappingConfigError::EmptyPath {
                        field: field.to_string(),
                    })
                }
            };
            if root.and_then(ContextRoot::parse).is_none() {
                return Err(MappingConfigError::UnknownRoot {
                    field: field.to_string(),
                    path: raw_path.to_string(),
                });
            }
            if parsed.insert(field.to_string(), path).is_some() {
                return Err(MappingConfigError::DuplicateField(field.to_string()));
            }
        }
        Ok(Self { entries: parsed })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldPath)> {
        self.entries.iter().map(|(field, path)| (field.as_str(), path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Value handed to the renderer. Dates stay typed so renderers can localize them.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Date(DateTime<Utc>),
    Structured(Value),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Date(date) => Some(*date),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(text) => Value::String(text.clone()),
            FieldValue::Number(number) => serde_json::Number::from_f64(*number)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Date(date) => {
                Value::String(date.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            FieldValue::Structured(value) => value.clone(),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Flat renderer input; key order follows the mapping table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MappedFields(IndexMap<String, Option<FieldValue>>);

impl MappedFields {
    /// Resolved value for `field`; `None` when unmapped or unresolved.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field).and_then(Option::as_ref)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Option<FieldValue>) {
        self.0.insert(field.into(), value);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The only shape mapping paths are evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct MappingContext<'a> {
    pub canonical: &'a Canonical,
    pub lob: &'a str,
    pub geography: Geography,
    pub carrier_partner: &'a str,
    pub time_zone: &'a str,
    pub now: DateTime<Utc>,
}

pub fn map_fields(context: &MappingContext<'_>, table: &FieldMappingTable) -> MappedFields {
    let mut mapped = MappedFields::default();
    for (field, path) in table.iter() {
        mapped.insert(field, context.resolve(&path.segments));
    }
    mapped
}

/// Safe optional-path access over typed values.
pub trait Resolve {
    fn resolve(&self, path: &[PathSegment]) -> Option<FieldValue>;
}

impl Resolve for MappingContext<'_> {
    fn resolve(&self, path: &[PathSegment]) -> Option<FieldValue> {
        let (head, rest) = path.split_first()?;
        match ContextRoot::parse(head.as_field()?)? {
            ContextRoot::Canonical => self.canonical.resolve(rest),
            ContextRoot::Lob => self.lob.resolve(rest),
            ContextRoot::Geography => self.geography.resolve(rest),
            ContextRoot::CarrierPartner => self.carrier_partner.resolve(rest),
            ContextRoot::TimeZone => self.time_zone.resolve(rest),
            ContextRoot::Now => self.now.resolve(rest),
        }
    }
}

impl Resolve for str {
    fn resolve(&self, path: &[PathSegment]) -> Option<FieldValue> {
        path.is_empty().then(|| FieldValue::Text(self.to_string()))
    }
}

impl Resolve for &str {
    fn resolve(&self, path: &[PathSegment]) -> Option<FieldValue> {
        (**self).resolve(path)
    }
}

impl Resolve for String {
    fn resolve(&self, path: &[PathSegment]) -> Option<FieldValue> {
        self.as_str().resolve(path)
    }
}

impl Resolve for f64 {
    fn resolve(&self, path: &[PathSegment]) -> Option<FieldValue> {
        path.is_empty().then_some(FieldValue::Number(*self))
    }
}

impl Resolve for u32 {
    fn resolve(&self, path: &[PathSegment]) -> Option<FieldValue> {
        path.is_empty().then_some(FieldValue::Number(f64::from(*self)))
    }
}

impl Resolve for DateTime<Utc> {
    fn resolve(&self, path: &[PathSegment]) -> Option<FieldValue> {
        path.is_empty().then_some(FieldValue::Date(*self))
    }
}

impl Resolve for Geography {
    fn resolve(&self, path: &[PathSegment]) -> Option<FieldValue> {
        self.code().resolve(path)
    }
}

impl<T: Resolve> Resolve for Option<T> {
    fn resolve(&self, path: &[PathSegment]) -> Option<FieldValue> {
        self.as_ref()?.resolve(path)
    }
}

impl<T: Resolve + Serialize> Resolve for Vec<T> {
    fn resolve(&self, path: &[PathSegment]) -> Option<FieldValue> {
        let Some((head, rest)) = path.split_first() else {
            return structured(self);
        };
        match head {
            PathSegment::Index(index) => self.get(*index)?.resolve(rest),
            PathSegment::Field(_) => None,
        }
    }
}

fn structured<T: Serialize + ?Sized>(value: &T) -> Option<FieldValue> {
    serde_json::to_value(value).ok().map(FieldValue::Structured)
}

/// Implements `Resolve` for a record by listing its addressable keys.
/// Resolving the record itself yields its serialized form.
macro_rules! resolvable {
    ($ty:ty { $($key:literal => $field:ident),+ $(,)? }) => {
        impl Resolve for $ty {
            fn resolve(&self, path: &[PathSegment]) -> Option<FieldValue> {
                let Some((head, rest)) = path.split_first() else {
                    return structured(self);
                };
                match head.as_field()? {
                    $($key => self.$field.resolve(rest),)+
                    _ => None,
                }
            }
        }
    };
}

resolvable!(Address {
    "street" => street,
    "city" => city,
    "province" => province,
    "postalCode" => postal_code,
});

resolvable!(AdditionalInsured {
    "name" => name,
    "address" => address,
});

resolvable!(Insurer { "name" => name });

resolvable!(InsuredParty {
    "block" => block,
    "name" => name,
    "address" => address,
});

resolvable!(CoverageDates {
    "effectiveDate" => effective_date,
    "expirationDate" => expiration_date,
});

resolvable!(CoverageLimits {
    "occurrenceLimit" => occurrence_limit,
    "premisesRentedToYouLimit" => premises_rented_to_you_limit,
    "medicalPaymentsLimit" => medical_payments_limit,
    "aggregateLimit" => aggregate_limit,
});

resolvable!(CoverageAmount {
    "amount" => amount,
    "deductible" => deductible,
});

resolvable!(GlCoverage {
    "generalAggregate" => general_aggregate,
    "eachOccurrence" => each_occurrence,
    "productAndCompletedOperationsAggregate" => product_and_completed_operations_aggregate,
    "personalAndAdvertisingInjuryLiability" => personal_and_advertising_injury_liability,
    "medicalPayments" => medical_payments,
    "tenantLegalLiability" => tenant_legal_liability,
    "pollutionLiabilityExtension" => pollution_liability_extension,
});

resolvable!(EoCoverage {
    "deductible" => deductible,
    "aggregateAmount" => aggregate_amount,
    "occurrenceAmount" => occurrence_amount,
});

resolvable!(NamedCoverage {
    "name" => name,
    "limit" => limit,
});

resolvable!(Coverages {
    "gl" => gl,
    "eo" => eo,
    "others" => others,
});

resolvable!(Producer {
    "name" => name,
    "phone" => phone,
    "email" => email,
});

resolvable!(Canonical {
    "policyFoxdenId" => policy_foxden_id,
    "policyNumber" => policy_number,
    "insurer" => insurer,
    "insured" => insured,
    "additionalInsured" => additional_insured,
    "certificateNumber" => certificate_number,
    "dates" => dates,
    "limits" => limits,
    "description" => description,
    "certificateHolder" => certificate_holder,
    "coverages" => coverages,
    "producer" => producer,
});
