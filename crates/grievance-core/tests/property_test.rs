//! Property tests for the wire-facing model: cluster id rendering and the
//! strict inbound report schema.

use grievance_core::errors::IngestError;
use grievance_core::{CausalRelation, ClusterId, RawReport};
use proptest::prelude::*;

// =============================================================================
// Strategy helpers
// =============================================================================

const REPORT_FIELDS: [&str; 6] = ["id", "text", "source_channel", "geo_tag", "submitted_at", "reporter_ref"];

fn extra_field() -> impl Strategy<Value = String> {
    "[a-z_]{2,12}".prop_filter("not a schema field", |name| !REPORT_FIELDS.contains(&name.as_str()))
}

fn relation() -> impl Strategy<Value = CausalRelation> {
    prop_oneof![
        Just(CausalRelation::Causes),
        Just(CausalRelation::LeadsTo),
        Just(CausalRelation::Mitigates),
    ]
}

fn report_json(text: &str, extra: Option<&str>) -> String {
    let mut value = serde_json::json!({
        "id": "r1",
        "text": text,
        "source_channel": "voice",
        "submitted_at": "2024-03-01T10:00:00Z",
    });
    if let (Some(name), Some(map)) = (extra, value.as_object_mut()) {
        map.insert(name.to_string(), serde_json::json!(true));
    }
    value.to_string()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn cluster_id_parses_its_own_rendering(seq in any::<u64>()) {
        let id = ClusterId::new(seq);
        let rendered = id.to_string();
        prop_assert!(rendered.starts_with(ClusterId::PREFIX));
        prop_assert_eq!(rendered.parse::<ClusterId>().unwrap(), id);
        let json = serde_json::to_string(&id).unwrap();
        prop_assert_eq!(serde_json::from_str::<ClusterId>(&json).unwrap(), id);
    }

    #[test]
    fn cluster_id_without_digits_is_rejected(name in "[a-z-]{0,10}") {
        prop_assert!(name.parse::<ClusterId>().is_err());
    }

    #[test]
    fn relation_names_match_their_serde_form(rel in relation()) {
        let json = serde_json::to_string(&rel).unwrap();
        prop_assert_eq!(json, format!("\"{}\"", rel.as_str()));
        prop_assert_eq!(CausalRelation::from_str_name(rel.as_str()), Some(rel));
    }

    #[test]
    fn any_report_text_survives_the_schema(text in "\\PC{0,200}") {
        let raw = RawReport::from_json(&report_json(&text, None)).unwrap();
        prop_assert_eq!(raw.text, text);
        prop_assert!(raw.geo_tag.is_none());
    }

    #[test]
    fn unknown_fields_are_malformed(name in extra_field()) {
        let err = RawReport::from_json(&report_json("ration shop closed", Some(&name))).unwrap_err();
        prop_assert!(matches!(err, IngestError::Malformed(_)), "{:?}", err);
    }

    #[test]
    fn non_json_input_is_malformed(input in "[^{\\[\"0-9tfn ]\\PC{0,40}") {
        let err = RawReport::from_json(&input).unwrap_err();
        prop_assert!(matches!(err, IngestError::Malformed(_)), "{:?}", err);
    }
}
