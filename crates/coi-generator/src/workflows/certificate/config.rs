use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::debug;

use super::domain::Geography;
use super::mapping::{FieldMappingTable, MappingConfigError};

/// How the certificate document is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateKind {
    /// ACORD 25 fillable PDF driven by a forms descriptor.
    Acord25,
    /// Markup template rendered to PDF with currency/date/province helpers.
    Markup,
}

/// Per-entry adjustments applied while building the canonical record.
///
/// Lets a carrier replace the placeholder insurer name or model a deductible
/// without a code change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalOverrides {
    pub insurer_name: Option<String>,
    pub deductible: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CoiConfig {
    pub lob: String,
    pub geography: Geography,
    pub carrier_partner: String,
    pub db_collection: String,
    pub template_kind: TemplateKind,
    pub template_path: PathBuf,
    pub forms_config_path: Option<PathBuf>,
    pub signature_path: Option<PathBuf>,
    pub email_template_path: PathBuf,
    pub field_mappings: FieldMappingTable,
    pub overrides: CanonicalOverrides,
}

impl CoiConfig {
    fn matches_geography(&self, lob: &str, geography: Geography) -> bool {
        self.lob == lob && self.geography == geography
    }

    fn matches_exactly(&self, lob: &str, geography: Geography, carrier_partner: &str) -> bool {
        self.matches_geography(lob, geography) && self.carrier_partner == carrier_partner
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("no COI config found for lob={lob} geography={geography} carrierPartner={carrier_partner}")]
pub struct ConfigNotFound {
    pub lob: String,
    pub geography: Geography,
    pub carrier_partner: String,
}

/// Static configuration matrix keyed by (line of business, geography, carrier).
#[derive(Debug, Clone, Default)]
pub struct CoiConfigRegistry {
    entries: Vec<CoiConfig>,
}

impl CoiConfigRegistry {
    pub fn new(entries: Vec<CoiConfig>) -> Self {
        Self { entries }
    }

    /// Built-in matrix with asset paths rooted at `asset_root`.
    pub fn standard(asset_root: &Path) -> Result<Self, MappingConfigError> {
        let us_mappings = FieldMappingTable::parse(US_FIELD_MAPPINGS)?;
        let ca_mappings = FieldMappingTable::parse(CA_FIELD_MAPPINGS)?;

        let entries = standard_entries()
            .iter()
            .map(|entry| {
                let asset = |relative: &str| asset_root.join(relative);
                let (field_mappings, template_path, email_template_path) = match entry.geography {
                    Geography::Us => (
                        us_mappings.clone(),
                        asset(ACORD25_TEMPLATE),
                        asset(US_EMAIL_TEMPLATE),
                    ),
                    Geography::Canada => (
                        ca_mappings.clone(),
                        asset(MARKUP_TEMPLATE),
                        asset(CA_EMAIL_TEMPLATE),
                    ),
                };

                CoiConfig {
                    lob: entry.lob.to_string(),
                    geography: entry.geography,
                    carrier_partner: entry.carrier_partner.to_string(),
                    db_collection: entry.db_collection.to_string(),
                    template_kind: entry.template_kind,
                    template_path,
                    forms_config_path: entry.forms_config.map(asset),
                    signature_path: entry.signature.map(asset),
                    email_template_path,
                    field_mappings,
                    overrides: CanonicalOverrides::default(),
                }
            })
            .collect();

        Ok(Self::new(entries))
    }

    /// Exact (lob, geography, carrier) match first, then any (lob, geography) entry.
    pub fn find(&self, lob: &str, geography: Geography, carrier_partner: &str) -> Option<&CoiConfig> {
        let exact = self
            .entries
            .iter()
            .find(|entry| entry.matches_exactly(lob, geography, carrier_partner));
        if exact.is_some() {
            return exact;
        }

        let fallback = self
            .entries
            .iter()
            .find(|entry| entry.matches_geography(lob, geography));
        if let Some(entry) = fallback {
            debug!(
                lob,
                %geography,
                carrier_partner,
                fallback_carrier = %entry.carrier_partner,
                "using geography-level COI config"
            );
        }
        fallback
    }

    pub fn resolve(
        &self,
        lob: &str,
        geography: Geography,
        carrier_partner: &str,
    ) -> Result<&CoiConfig, ConfigNotFound> {
        self.find(lob, geography, carrier_partner)
            .ok_or_else(|| ConfigNotFound {
                lob: lob.to_string(),
                geography,
                carrier_partner: carrier_partner.to_string(),
            })
    }

    pub fn has_config(&self, lob: &str, geography: Geography, carrier_partner: &str) -> bool {
        self.find(lob, geography, carrier_partner).is_some()
    }

    pub fn entries(&self) -> &[CoiConfig] {
        &self.entries
    }
}

const ACORD25_TEMPLATE: &str = "templates/acord25/acord_25_2016-03.pdf";
const MARKUP_TEMPLATE: &str = "templates/html/certificate.html";
const US_EMAIL_TEMPLATE: &str = "templates/email/us/emailBody.html";
const CA_EMAIL_TEMPLATE: &str = "templates/email/ca/emailBody.html";

const US_FIELD_MAPPINGS: &[(&str, &str)] = &[
    ("insured", "canonical.insured.block"),
    ("certificateNumber", "canonical.certificateNumber"),
    ("policyNumber", "canonical.policyNumber"),
    ("effectiveDate", "canonical.dates.effectiveDate"),
    ("expirationDate", "canonical.dates.expirationDate"),
    ("occurrenceLimit", "canonical.limits.occurrenceLimit"),
    ("premisesRentedToYouLimit", "canonical.limits.premisesRentedToYouLimit"),
    ("medicalPaymentsLimit", "canonical.limits.medicalPaymentsLimit"),
    ("aggregateLimit", "canonical.limits.aggregateLimit"),
    ("description", "canonical.description"),
    ("certificateHolder", "canonical.certificateHolder"),
    ("carrierPartner", "carrierPartner"),
    ("timeZone", "timeZone"),
    ("producerName", "canonical.producer.name"),
    ("producerPhone", "canonical.producer.phone"),
    ("producerEmail", "canonical.producer.email"),
    ("lob", "lob"),
];

const CA_FIELD_MAPPINGS: &[(&str, &str)] = &[
    ("policyFoxdenId", "canonical.policyNumber"),
    ("insuranceCompany", "canonical.insurer.name"),
    ("namedInsured", "canonical.insured"),
    ("additionalInsured", "canonical.additionalInsured"),
    ("effectiveDate", "canonical.dates.effectiveDate"),
    ("expiryDate", "canonical.dates.expirationDate"),
    ("coverages", "canonical.coverages"),
    ("descriptionOfOperations", "canonical.description"),
    ("dateNow", "now"),
    ("timeZone", "timeZone"),
];

struct StandardEntry {
    lob: &'static str,
    geography: Geography,
    carrier_partner: &'static str,
    db_collection: &'static str,
    template_kind: TemplateKind,
    forms_config: Option<&'static str>,
    signature: Option<&'static str>,
}

static STANDARD_ENTRIES: OnceLock<Vec<StandardEntry>> = OnceLock::new();

fn standard_entries() -> &'static [StandardEntry] {
    STANDARD_ENTRIES.get_or_init(|| {
        const US_CARRIERS: &[(&str, &str, &str)] = &[
            (
                "StateNational",
                "forms/UScoiFormsConfigs-StateNational.json",
                "assets/signatures/StateNationalPresidentSignature.png",
            ),
            (
                "Munich",
                "forms/UScoiFormsConfigs-Munich.json",
                "assets/signatures/MunichUSSignature.png",
            ),
        ];
        const US_LOBS: &[(&str, &str)] = &[
            ("GL", "general_liability_policies"),
            ("EO", "eo_policies"),
        ];
        const CA_CARRIERS: &[&str] = &["Foxquilt", "Greenlight"];

        let mut entries = Vec::new();
        for &(carrier_partner, forms_config, signature) in US_CARRIERS {
            for &(lob, db_collection) in US_LOBS {
                entries.push(StandardEntry {
                    lob,
                    geography: Geography::Us,
                    carrier_partner,
                    db_collection,
                    template_kind: TemplateKind::Acord25,
                    forms_config: Some(forms_config),
                    signature: Some(signature),
                });
            }
        }
        for &carrier_partner in CA_CARRIERS {
            entries.push(StandardEntry {
                lob: "GL",
                geography: Geography::Canada,
                carrier_partner,
                db_collection: "general_liability_policies",
                template_kind: TemplateKind::Markup,
                forms_config: None,
                signature: None,
            });
        }
        entries
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CoiConfigRegistry {
        CoiConfigRegistry::standard(Path::new("/srv/coi")).expect("built-in tables are valid")
    }

    #[test]
    fn standard_matrix_covers_both_geographies() {
        let registry = registry();
        assert_eq!(registry.entries().len(), 6);

        let munich_eo = registry
            .resolve("EO", Geography::Us, "Munich")
            .expect("exact match");
        assert_eq!(munich_eo.template_kind, TemplateKind::Acord25);
        assert_eq!(munich_eo.db_collection, "eo_policies");
        assert_eq!(
            munich_eo.forms_config_path.as_deref(),
            Some(Path::new("/srv/coi/forms/UScoiFormsConfigs-Munich.json"))
        );

        let greenlight = registry
            .resolve("GL", Geography::Canada, "Greenlight")
            .expect("exact match");
        assert_eq!(greenlight.template_kind, TemplateKind::Markup);
        assert!(greenlight.signature_path.is_none());
    }

    #[test]
    fn unknown_carrier_falls_back_to_geography_entry() {
        let registry = registry();
        let config = registry
            .resolve("GL", Geography::Us, "UnknownCarrier")
            .expect("geography-level fallback");
        assert_eq!(config.lob, "GL");
        assert_eq!(config.geography, Geography::Us);
        assert!(registry.has_config("GL", Geography::Us, "UnknownCarrier"));
    }

    #[test]
    fn missing_combination_is_reported_without_panicking() {
        let registry = registry();
        assert!(!registry.has_config("EO", Geography::Canada, "Foxquilt"));
        let err = registry
            .resolve("EO", Geography::Canada, "Foxquilt")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "no COI config found for lob=EO geography=CA carrierPartner=Foxquilt"
        );
    }
}
