//! # YAML→JSON Value Normalization
//!
//! The pattern compiler, the native matcher, and the spot-check evaluator
//! all operate on `serde_json::Value`, while policy and resource documents
//! arrive as YAML. This module converts between the two value models:
//! non-string mapping keys are stringified, YAML tags are stripped, and
//! integral floats collapse to integers so that `replicas: 3` and
//! `replicas: 3.0` compare equal downstream.

use serde_json::Value;

/// Convert a `serde_yaml::Value` into a `serde_json::Value`.
///
/// Mapping key order is preserved (`serde_json`'s map keeps insertion order
/// only when the `preserve_order` feature is active; callers that care about
/// order — the pattern classifier — walk the YAML mapping directly instead).
pub fn yaml_to_json(yaml: serde_yaml::Value) -> Value {
    match yaml {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(serde_json::Number::from(i))
            } else if let Some(u) = n.as_u64() {
                Value::Number(serde_json::Number::from(u))
            } else if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64
                {
                    Value::Number(serde_json::Number::from(f as i64))
                } else {
                    serde_json::Number::from_f64(f)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
            } else {
                Value::Null
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(seq) => {
            Value::Array(seq.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(map) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    serde_yaml::Value::Null => "null".to_string(),
                    other => format!("{other:?}"),
                };
                obj.insert(key, yaml_to_json(v));
            }
            Value::Object(obj)
        }
        // Strip YAML tags and process the inner value.
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(input: &str) -> Value {
        let yaml: serde_yaml::Value = serde_yaml::from_str(input).unwrap();
        yaml_to_json(yaml)
    }

    #[test]
    fn scalars_map_directly() {
        assert_eq!(roundtrip("42"), serde_json::json!(42));
        assert_eq!(roundtrip("true"), serde_json::json!(true));
        assert_eq!(roundtrip("hello"), serde_json::json!("hello"));
        assert_eq!(roundtrip("null"), Value::Null);
    }

    #[test]
    fn integral_floats_collapse_to_integers() {
        assert_eq!(roundtrip("3.0"), serde_json::json!(3));
        assert_eq!(roundtrip("2.5"), serde_json::json!(2.5));
    }

    #[test]
    fn nested_structures_convert() {
        let v = roundtrip("spec:\n  containers:\n  - name: app\n    ports: [80, 443]\n");
        assert_eq!(
            v,
            serde_json::json!({
                "spec": {"containers": [{"name": "app", "ports": [80, 443]}]}
            })
        );
    }

    #[test]
    fn non_string_keys_are_stringified() {
        let v = roundtrip("80: http\n443: https\n");
        assert_eq!(v, serde_json::json!({"80": "http", "443": "https"}));
    }
}
