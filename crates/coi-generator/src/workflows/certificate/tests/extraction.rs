use std::sync::Arc;

use serde_json::json;

use super::common::*;
use crate::workflows::certificate::domain::Geography;
use crate::workflows::certificate::extract::{
    ExtractError, Extractor, RegionalPolicyData, DEFAULT_CARRIER_PARTNER, DEFAULT_TIME_ZONE,
};
use crate::workflows::certificate::pipeline::ErrorKind;
use crate::workflows::certificate::store::InMemoryDocumentStore;

fn extractor(fixture: &PolicyFixture) -> Extractor<InMemoryDocumentStore> {
    Extractor::new(Arc::new(fixture.store()))
}

#[tokio::test]
async fn unknown_policy_is_not_found() {
    let extractor = extractor(&PolicyFixture::us());
    let mut missing = request(Geography::Us);
    missing.policy_foxden_id = "FOX-404".to_string();

    let err = extractor.extract(&missing).await.unwrap_err();

    assert!(matches!(&err, ExtractError::PolicyNotFound(id) if id == "FOX-404"));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn missing_owner_is_a_consistency_violation() {
    let fixture = PolicyFixture {
        owner_email: None,
        ..PolicyFixture::us()
    };

    let err = extractor(&fixture)
        .extract(&request(Geography::Us))
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractError::Consistency(_)));
    assert_eq!(err.kind(), ErrorKind::ConsistencyViolation);
}

#[tokio::test]
async fn us_extraction_reads_business_details() {
    let raw = extractor(&PolicyFixture::us())
        .extract(&request(Geography::Us))
        .await
        .expect("extracts");

    assert_eq!(raw.geography(), Geography::Us);
    assert_eq!(raw.lobs, vec!["GL".to_string()]);
    assert_eq!(raw.carrier_partner, "StateNational");
    assert_eq!(raw.time_zone, "America/Chicago");
    assert_eq!(raw.recipient_email, "owner@acme.example");
    assert_eq!(raw.business_name.as_deref(), Some("Acme Corp"));
    assert_eq!(raw.dba_name.as_deref(), Some("Widget Store"));
    assert_eq!(raw.additional_insured, additional_insured());

    let RegionalPolicyData::Us(us) = &raw.regional else {
        panic!("expected US data, got {:?}", raw.regional);
    };
    assert_eq!(us.professions, vec!["IT Consultant", "Software Developer"]);
    assert!(us.business_address.is_some());
    assert!(us.rating_input.is_some());
}

#[tokio::test]
async fn canada_defaults_carrier_time_zone_and_single_gl_line() {
    let raw = extractor(&PolicyFixture::canada())
        .extract(&request(Geography::Canada))
        .await
        .expect("extracts");

    assert_eq!(raw.geography(), Geography::Canada);
    assert_eq!(raw.lobs, vec!["GL".to_string()]);
    assert_eq!(raw.carrier_partner, DEFAULT_CARRIER_PARTNER);
    assert_eq!(raw.time_zone, DEFAULT_TIME_ZONE);
    assert_eq!(raw.dba_name, None, "blank DBA counts as absent");

    let RegionalPolicyData::Canada(canada) = &raw.regional else {
        panic!("expected Canada data, got {:?}", raw.regional);
    };
    assert_eq!(canada.professions, vec!["Graphic Designer"]);
    assert_eq!(
        canada.effective_date.map(|date| date.to_rfc3339()).as_deref(),
        Some("2025-02-01T05:00:00+00:00")
    );
    assert!(canada.expiry_date.is_some());
    assert!(canada.named_insured_address.is_some());
}

#[tokio::test]
async fn canada_falls_back_to_profession_answer_without_labels() {
    let mut fixture = PolicyFixture::canada();
    fixture.answers["professionLabelList"] = json!([]);

    let raw = extractor(&fixture)
        .extract(&request(Geography::Canada))
        .await
        .expect("extracts");

    let RegionalPolicyData::Canada(canada) = &raw.regional else {
        panic!("expected Canada data");
    };
    assert_eq!(canada.professions, vec!["graphic_designer"]);
}

#[tokio::test]
async fn endorsement_quotes_carry_no_rating_input() {
    let fixture = PolicyFixture {
        quote_kind: "Endorsement",
        ..PolicyFixture::us()
    };

    let raw = extractor(&fixture)
        .extract(&request(Geography::Us))
        .await
        .expect("extracts");

    let RegionalPolicyData::Us(us) = &raw.regional else {
        panic!("expected US data");
    };
    assert!(us.rating_input.is_none());
}

#[tokio::test]
async fn us_lines_are_deduplicated_in_order() {
    let fixture = PolicyFixture {
        sub_policies: json!([
            { "kind": "EO", "policyId": "P-2" },
            { "kind": "GL", "policyId": "P-1" },
            { "kind": "EO", "policyId": "P-3" }
        ]),
        ..PolicyFixture::us()
    };

    let raw = extractor(&fixture)
        .extract(&request(Geography::Us))
        .await
        .expect("extracts");

    assert_eq!(raw.lobs, vec!["EO".to_string(), "GL".to_string()]);
    assert_eq!(raw.sub_policies.len(), 3);
}
