//! Property-based tests for payload normalization
//!
//! Uses proptest to generate random JSON values and verify properties

use fitsync::handlers::body_measurement::{extract_measurements, MEASUREMENT_FIELDS};
use fitsync::handlers::nutrition_goal::to_array;
use proptest::prelude::*;
use serde_json::{json, Value};

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z]{0,8}".prop_map(Value::String),
    ]
}

fn json_value() -> impl Strategy<Value = Value> {
    json_leaf().prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn test_to_array_is_idempotent(value in json_value()) {
        let once = to_array(value);
        let twice = to_array(Value::Array(once.clone()));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn test_to_array_keeps_non_array_values(value in json_value()) {
        let items = to_array(value.clone());
        match value {
            Value::Array(original) => prop_assert_eq!(items, original),
            Value::Null => prop_assert!(items.is_empty()),
            other => prop_assert_eq!(items, vec![other]),
        }
    }

    #[test]
    fn test_extracted_measurements_are_known_and_finite(
        values in prop::collection::btree_map("[a-zA-Z]{1,12}", -1.0e6f64..1.0e6, 0..20),
    ) {
        let data = Value::Object(values.iter().map(|(key, value)| (key.clone(), json!(value))).collect());
        let measurements = extract_measurements(&data);

        for (name, value) in &measurements {
            prop_assert!(MEASUREMENT_FIELDS.contains(&name.as_str()));
            prop_assert!(value.is_finite());
            prop_assert_eq!(Some(*value), values.get(name).copied());
        }
    }
}
