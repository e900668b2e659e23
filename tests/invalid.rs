use chrono::NaiveDate;
use docmerge::{self as dm, EvalError, Models, Value};
use serde_json::json;

// A numeric literal that is not a number: `[0-9.]+` lets `1.2.3` through the
// pattern, and decimal parsing then rejects it. This must never default to 0.
#[test]
fn test_malformed_number_literal() {
    let models = Models::single(json!({ "age": 10 }));
    let err = dm::resolve("age * 1.2.3", &models).unwrap_err();
    assert!(
        matches!(err, EvalError::Malformed { .. }),
        "Expected a malformed literal error, got: {err}"
    );
}

#[test]
fn test_division_by_zero_is_malformed() {
    let models = Models::single(json!({ "age": 10 }));
    assert!(matches!(dm::resolve("age / 0", &models), Err(EvalError::Malformed { .. })));
    assert!(matches!(dm::resolve("age % 0", &models), Err(EvalError::Malformed { .. })));
}

// The optional suffix hides misses, not authoring mistakes.
#[test]
fn test_optional_does_not_hide_malformed_literals() {
    let models = Models::single(json!({ "age": 10 }));
    assert!(matches!(dm::resolve("age / 0?", &models), Err(EvalError::Malformed { .. })));
}

// Hours can't be added to a plain date.
#[test]
fn test_temporal_unit_the_value_cannot_carry() {
    let models = Models::single(Value::from(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
    let err = dm::resolve("+3hour", &models).unwrap_err();
    assert!(matches!(err, EvalError::Malformed { .. }), "got: {err}");
}

// Arithmetic only applies to numbers; on text the segment is simply unresolved.
#[test]
fn test_operator_on_text_is_unresolved() {
    let models = Models::single(json!({ "name": "one" }));
    let err = dm::resolve("name + 1", &models).unwrap_err();
    assert!(err.is_unresolved(), "got: {err}");
}

#[test]
fn test_bad_method_argument_is_malformed() {
    use docmerge::model::{Described, Descriptor, ParamKind};
    use std::sync::OnceLock;

    struct Counter;
    impl Described for Counter {
        fn descriptor() -> &'static Descriptor<Self> {
            static TABLE: OnceLock<Descriptor<Counter>> = OnceLock::new();
            TABLE.get_or_init(|| {
                Descriptor::new("Counter").method("times", [ParamKind::Integer], |_: &Counter, a: &[Value]| {
                    a[0].clone()
                })
            })
        }
    }

    let models = Models::single(Value::object(Counter));
    assert_eq!(dm::resolve("times(3)", &models).unwrap(), Value::from(3));
    assert!(matches!(dm::resolve("times(three)", &models), Err(EvalError::Malformed { .. })));
}
