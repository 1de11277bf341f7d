//! # Native Pattern Matcher
//!
//! Direct evaluation of a classified [`Pattern`] against a
//! `serde_json::Value` resource, mirroring the compiled CEL semantics
//! field for field. The matcher exists to cross-check the compiler: for
//! any resource, `match_resource(p, r)` must agree with evaluating
//! `compile(p)` over `r` (the semantic-preservation property), and it
//! backs the CLI's offline policy check.

use regex::Regex;
use serde_json::Value;

use crate::cel::glob_to_regex;
use crate::pattern::{Anchor, CompareOp, Comparison, Pattern, Scalar};

/// Match a pattern against a resource document.
pub fn match_resource(pattern: &Pattern, resource: &Value) -> bool {
    match_value(pattern, Some(resource))
}

/// Match a pattern against a field value; `None` means the field is
/// absent from its parent.
fn match_value(pattern: &Pattern, value: Option<&Value>) -> bool {
    match pattern {
        Pattern::Absent | Pattern::WildcardAbsent => value.is_none(),
        // Bare `*` is a tautology, matching even an absent field.
        Pattern::Wildcard(glob) if glob == "*" => true,
        Pattern::WildcardExists => match value {
            Some(v) => *v != Value::String(String::new()),
            None => false,
        },
        Pattern::Wildcard(glob) => match value {
            Some(Value::String(s)) => glob_matches(glob, s),
            _ => false,
        },
        Pattern::Literal(scalar) => value.is_some_and(|v| scalar_eq(scalar, v)),
        Pattern::Conditions(alternatives) => {
            value.is_some_and(|v| alternatives.iter().any(|alt| compare(alt, v)))
        }
        Pattern::Map(entries) => match value {
            Some(Value::Object(obj)) => entries.iter().all(|entry| {
                let child = obj.get(&entry.key);
                match entry.anchor {
                    Anchor::Conditional => {
                        child.is_none() || match_value(&entry.pattern, child)
                    }
                    Anchor::Plain | Anchor::Equality | Anchor::AddIfAbsent => {
                        if entry.pattern.is_self_guarding() {
                            match_value(&entry.pattern, child)
                        } else {
                            child.is_some() && match_value(&entry.pattern, child)
                        }
                    }
                }
            }),
            _ => false,
        },
        Pattern::Array(subs) => match value {
            Some(Value::Array(items)) => match subs.as_slice() {
                [] => true,
                [sub] => items.iter().all(|item| match_value(sub, Some(item))),
                many => many
                    .iter()
                    .all(|sub| items.iter().any(|item| match_value(sub, Some(item)))),
            },
            _ => false,
        },
    }
}

fn glob_matches(glob: &str, s: &str) -> bool {
    match Regex::new(&glob_to_regex(glob)) {
        Ok(re) => re.is_match(s),
        Err(_) => false,
    }
}

fn compare(alt: &Comparison, value: &Value) -> bool {
    if let Scalar::Str(s) = &alt.value {
        if s.contains('*') || s.contains('?') {
            let matched = matches!(value, Value::String(v) if glob_matches(s, v));
            return match alt.op {
                CompareOp::Ne => !matched && value.is_string(),
                _ => matched,
            };
        }
    }
    match alt.op {
        CompareOp::Eq => scalar_eq(&alt.value, value),
        CompareOp::Ne => !scalar_eq(&alt.value, value),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            ordered(alt.op, &alt.value, value)
        }
    }
}

/// Heterogeneous equality: values of different kinds are unequal, numbers
/// compare numerically across int/float.
fn scalar_eq(scalar: &Scalar, value: &Value) -> bool {
    match (scalar, value) {
        (Scalar::Bool(a), Value::Bool(b)) => a == b,
        (Scalar::Str(a), Value::String(b)) => a == b,
        (Scalar::Int(a), Value::Number(b)) => {
            b.as_i64() == Some(*a) || b.as_f64() == Some(*a as f64)
        }
        (Scalar::Float(a), Value::Number(b)) => b.as_f64() == Some(*a),
        _ => false,
    }
}

/// Ordering over numeric pairs and string pairs only; a type mismatch is
/// a CEL evaluation error, which absorbs to `false` under the enclosing
/// presence guard.
fn ordered(op: CompareOp, operand: &Scalar, value: &Value) -> bool {
    let decide = |ordering: std::cmp::Ordering| match op {
        CompareOp::Lt => ordering.is_lt(),
        CompareOp::Le => ordering.is_le(),
        CompareOp::Gt => ordering.is_gt(),
        CompareOp::Ge => ordering.is_ge(),
        CompareOp::Eq | CompareOp::Ne => unreachable!("handled by compare()"),
    };
    match (value, operand) {
        (Value::Number(v), Scalar::Int(b)) => match v.as_f64().partial_cmp(&Some(*b as f64)) {
            Some(ordering) => decide(ordering),
            None => false,
        },
        (Value::Number(v), Scalar::Float(b)) => match v.as_f64().partial_cmp(&Some(*b)) {
            Some(ordering) => decide(ordering),
            None => false,
        },
        (Value::String(v), Scalar::Str(b)) => decide(v.as_str().cmp(b.as_str())),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::classify;
    use kyvert_core::FieldPath;
    use serde_json::json;

    fn pattern(yaml: &str) -> Pattern {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        classify(&value, &FieldPath::root()).unwrap()
    }

    #[test]
    fn exists_wildcard_requires_non_empty() {
        let p = pattern("metadata:\n  labels:\n    app: \"?*\"\n");
        assert!(match_resource(
            &p,
            &json!({"metadata": {"labels": {"app": "web"}}})
        ));
        assert!(!match_resource(
            &p,
            &json!({"metadata": {"labels": {"app": ""}}})
        ));
        assert!(!match_resource(&p, &json!({"metadata": {"labels": {}}})));
        assert!(!match_resource(&p, &json!({"metadata": {}})));
    }

    #[test]
    fn bare_star_matches_anything() {
        let p = pattern("spec:\n  runtimeClassName: \"*\"\n");
        assert!(match_resource(
            &p,
            &json!({"spec": {"runtimeClassName": "kata"}})
        ));
        // Tautology: matches even when the field is absent.
        assert!(match_resource(&p, &json!({"spec": {}})));
    }

    #[test]
    fn absence_patterns() {
        let p = pattern("spec:\n  hostPID: \"!*\"\n");
        assert!(match_resource(&p, &json!({"spec": {}})));
        assert!(!match_resource(&p, &json!({"spec": {"hostPID": true}})));
    }

    #[test]
    fn literal_and_numeric_equality() {
        let p = pattern("spec:\n  replicas: 3\n");
        assert!(match_resource(&p, &json!({"spec": {"replicas": 3}})));
        assert!(match_resource(&p, &json!({"spec": {"replicas": 3.0}})));
        assert!(!match_resource(&p, &json!({"spec": {"replicas": 4}})));
        assert!(!match_resource(&p, &json!({"spec": {"replicas": "3"}})));
    }

    #[test]
    fn conditional_anchor_skips_absent_fields() {
        let p = pattern("spec:\n  (livenessProbe):\n    periodSeconds: 10\n");
        assert!(match_resource(&p, &json!({"spec": {}})));
        assert!(match_resource(
            &p,
            &json!({"spec": {"livenessProbe": {"periodSeconds": 10}}})
        ));
        assert!(!match_resource(
            &p,
            &json!({"spec": {"livenessProbe": {"periodSeconds": 30}}})
        ));
    }

    #[test]
    fn glob_matching() {
        let p = pattern("image: \"nginx:*\"\n");
        assert!(match_resource(&p, &json!({"image": "nginx:1.27"})));
        assert!(!match_resource(&p, &json!({"image": "httpd:2"})));
        assert!(!match_resource(&p, &json!({"image": 7})));
    }

    #[test]
    fn comparison_alternatives() {
        let p = pattern("spec:\n  replicas: \"<1 | >10\"\n");
        assert!(match_resource(&p, &json!({"spec": {"replicas": 0}})));
        assert!(match_resource(&p, &json!({"spec": {"replicas": 11}})));
        assert!(!match_resource(&p, &json!({"spec": {"replicas": 5}})));
        assert!(!match_resource(&p, &json!({"spec": {}})));
    }

    #[test]
    fn negated_glob() {
        let p = pattern("image: \"!*:latest\"\n");
        assert!(match_resource(&p, &json!({"image": "nginx:1.27"})));
        assert!(!match_resource(&p, &json!({"image": "nginx:latest"})));
    }

    #[test]
    fn array_single_sub_pattern_is_universal() {
        let p = pattern("containers:\n  - name: \"?*\"\n");
        assert!(match_resource(
            &p,
            &json!({"containers": [{"name": "a"}, {"name": "b"}]})
        ));
        assert!(!match_resource(
            &p,
            &json!({"containers": [{"name": "a"}, {}]})
        ));
        assert!(match_resource(&p, &json!({"containers": []})));
    }

    #[test]
    fn array_multiple_sub_patterns_are_existential() {
        let p = pattern("ports:\n  - port: 80\n  - port: 443\n");
        assert!(match_resource(
            &p,
            &json!({"ports": [{"port": 443}, {"port": 80}, {"port": 8080}]})
        ));
        assert!(!match_resource(&p, &json!({"ports": [{"port": 80}]})));
    }
}
