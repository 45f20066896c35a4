//! Property tests for target system records

use proptest::prelude::*;
use vcimport_core::one::{RecordValue, TargetRecord};

// ========== Strategies ==========

fn arb_key() -> impl Strategy<Value = String> {
    "[A-Z][A-Z0-9_]{0,15}"
}

/// Values with quotes, backslashes, brackets and line breaks
fn arb_value() -> impl Strategy<Value = String> {
    "[ -~\\n]{0,40}"
}

fn arb_record() -> impl Strategy<Value = TargetRecord> {
    prop::collection::vec(
        prop_oneof![
            (arb_key(), arb_value()).prop_map(|(k, v)| (k, RecordValue::Scalar(v))),
            (arb_key(), prop::collection::vec((arb_key(), arb_value()), 1..4))
                .prop_map(|(k, items)| (k, RecordValue::Vector(items))),
        ],
        0..8,
    )
    .prop_map(|entries| {
        let mut record = TargetRecord::new();
        for (key, value) in entries {
            match value {
                RecordValue::Scalar(v) => {
                    record.push(&key, v);
                }
                RecordValue::Vector(items) => {
                    record.push_vector(&key, items);
                }
            }
        }
        record
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: rendered records parse back to the same entries
    #[test]
    fn render_then_parse_is_identity(record in arb_record()) {
        let parsed = TargetRecord::parse(&record.render()).unwrap();
        prop_assert_eq!(parsed, record);
    }

    /// Property: the attribution triple survives a round trip
    #[test]
    fn attribution_survives(
        instance in "[a-f0-9-]{8,36}",
        ccr in "domain-c[0-9]{1,4}",
        ds in "(datastore|group-p)[0-9]{1,4}",
    ) {
        let record = TargetRecord::new()
            .with("NAME", "ds1 - Cluster1 (IMG)")
            .with("VCENTER_INSTANCE_ID", instance.as_str())
            .with("VCENTER_CCR_REF", ccr.as_str())
            .with("VCENTER_DS_REF", ds.as_str());
        let parsed = TargetRecord::parse(&record.render()).unwrap();
        prop_assert_eq!(parsed.get("VCENTER_INSTANCE_ID"), Some(instance.as_str()));
        prop_assert_eq!(parsed.get("VCENTER_CCR_REF"), Some(ccr.as_str()));
        prop_assert_eq!(parsed.get("VCENTER_DS_REF"), Some(ds.as_str()));
    }
}

#[test]
fn parses_unquoted_scalars() {
    let record = TargetRecord::parse("NAME = plain value\nTYPE=\"IMAGE_DS\"\n").unwrap();
    assert_eq!(record.get("NAME"), Some("plain value"));
    assert_eq!(record.get("TYPE"), Some("IMAGE_DS"));
}
