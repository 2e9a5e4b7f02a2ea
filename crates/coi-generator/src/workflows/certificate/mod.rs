//! Certificate-of-insurance generation.
//!
//! A request names a policy and an additional insured. The policy head is
//! resolved and extracted once, then every line of business with a matching
//! config runs through transform, field mapping and the render/send stage.

pub mod canonical;
pub mod config;
pub mod domain;
pub mod extract;
pub mod load;
pub mod mapping;
mod normalizer;
pub mod pipeline;
pub mod policy_head;
pub mod router;
pub mod store;

#[cfg(test)]
mod tests;

pub use canonical::{Canonical, CanonicalBuilder, TransformError};
pub use config::{CanonicalOverrides, CoiConfig, CoiConfigRegistry, ConfigNotFound, TemplateKind};
pub use domain::{
    generate_named_insured, AdditionalInsured, Address, CoiRequested, Geography, SubPolicy,
};
pub use extract::{ExtractError, Extractor, RawPolicyData, RegionalPolicyData};
pub use load::{
    CertificateLoader, CertificateRenderer, MailError, MailMessage, MailMode, MailReceipt,
    MailSettings, Mailer, RenderError, RenderJob,
};
pub use mapping::{FieldMappingTable, FieldValue, MappedFields, MappingConfigError};
pub use pipeline::{
    CoiGenerator, ErrorKind, GenerationReport, LobOutcome, LobStatus, PipelineError,
};
pub use policy_head::{PolicyHeadError, PolicyHeadResolver, PolicyView};
pub use router::coi_router;
pub use store::{DocumentStore, FieldFilter, InMemoryDocumentStore, StoreError};
