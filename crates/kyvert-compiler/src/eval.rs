//! # CEL-Subset Evaluator
//!
//! Interprets a compiled [`CelExpression`] against JSON resource documents,
//! covering exactly the constructs the compiler emits: field access,
//! `has()`, `matches()`, comparisons, `in`, the logical combinators, and
//! `all`/`exists` quantifiers.
//!
//! Evaluation follows CEL's commutative error absorption: `false && error`
//! is `false`, `true || error` is `true`, and an error that survives to the
//! top is treated as a failed check. This lets compiled guards like
//! `has(p) && p.matches(...)` behave correctly on resources where `p` is
//! missing or not a string.
//!
//! The evaluator backs the offline policy check command and the
//! semantic-preservation tests; it is not an admission-time engine.

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;

use crate::cel::{BinaryOp, CelExpression, CelLiteral, CelPath, PathSeg, QuantifierKind};

/// Variable bindings for one evaluation: `object` plus any quantifier
/// loop variables in scope.
#[derive(Debug, Default, Clone)]
pub struct Bindings {
    vars: HashMap<String, Value>,
}

impl Bindings {
    /// Bindings with the resource bound as `object`.
    pub fn for_object(resource: &Value) -> Self {
        let mut bindings = Self::default();
        bindings.bind("object", resource.clone());
        bindings
    }

    pub fn bind(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

/// An evaluation error, absorbed by `&&`/`||` where CEL semantics allow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalError(pub String);

type EvalResult = Result<Value, EvalError>;

fn err(msg: impl Into<String>) -> EvalError {
    EvalError(msg.into())
}

/// Evaluate an expression to a boolean verdict; unresolved errors and
/// non-boolean results count as a failed check.
pub fn eval_bool(expr: &CelExpression, resource: &Value) -> bool {
    matches!(
        eval(expr, &Bindings::for_object(resource)),
        Ok(Value::Bool(true))
    )
}

/// Evaluate an expression under the given bindings.
pub fn eval(expr: &CelExpression, bindings: &Bindings) -> EvalResult {
    match expr {
        CelExpression::Literal(lit) => Ok(literal_value(lit)),
        CelExpression::FieldAccess(path) => access(path, bindings),
        CelExpression::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval(item, bindings)?);
            }
            Ok(Value::Array(out))
        }
        CelExpression::Binary { op, lhs, rhs } => {
            let lhs = eval(lhs, bindings)?;
            let rhs = eval(rhs, bindings)?;
            binary(*op, &lhs, &rhs)
        }
        CelExpression::Not(inner) => match eval(inner, bindings)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(err(format!("cannot negate {other}"))),
        },
        CelExpression::And(terms) => combine(terms, bindings, false),
        CelExpression::Or(terms) => combine(terms, bindings, true),
        CelExpression::Quantifier { kind, var, collection, predicate } => {
            quantify(*kind, var, collection, predicate, bindings)
        }
        CelExpression::IsMap(inner) => Ok(Value::Bool(matches!(
            eval(inner, bindings)?,
            Value::Object(_)
        ))),
        CelExpression::Call { receiver, function, args } => {
            call(receiver.as_deref(), function, args, bindings)
        }
    }
}

/// `&&`/`||` with commutative error absorption: the short-circuit value
/// (`false` for AND, `true` for OR) wins over an error in any operand.
fn combine(terms: &[CelExpression], bindings: &Bindings, short_circuit: bool) -> EvalResult {
    let mut pending: Option<EvalError> = None;
    for term in terms {
        match eval(term, bindings) {
            Ok(Value::Bool(b)) if b == short_circuit => return Ok(Value::Bool(short_circuit)),
            Ok(Value::Bool(_)) => {}
            Ok(other) => {
                pending.get_or_insert(err(format!("non-boolean operand {other}")));
            }
            Err(e) => {
                pending.get_or_insert(e);
            }
        }
    }
    match pending {
        Some(e) => Err(e),
        None => Ok(Value::Bool(!short_circuit)),
    }
}

fn quantify(
    kind: QuantifierKind,
    var: &str,
    collection: &CelExpression,
    predicate: &CelExpression,
    bindings: &Bindings,
) -> EvalResult {
    let Value::Array(items) = eval(collection, bindings)? else {
        return Err(err("quantifier over a non-list value"));
    };
    let short_circuit = matches!(kind, QuantifierKind::Exists);
    let mut pending: Option<EvalError> = None;
    for item in items {
        let mut scope = bindings.clone();
        scope.bind(var, item);
        match eval(predicate, &scope) {
            Ok(Value::Bool(b)) if b == short_circuit => return Ok(Value::Bool(short_circuit)),
            Ok(Value::Bool(_)) => {}
            Ok(other) => {
                pending.get_or_insert(err(format!("non-boolean predicate {other}")));
            }
            Err(e) => {
                pending.get_or_insert(e);
            }
        }
    }
    match pending {
        Some(e) => Err(e),
        None => Ok(Value::Bool(!short_circuit)),
    }
}

fn call(
    receiver: Option<&CelExpression>,
    function: &str,
    args: &[CelExpression],
    bindings: &Bindings,
) -> EvalResult {
    match (receiver, function) {
        (None, "has") => {
            let [CelExpression::FieldAccess(path)] = args else {
                return Err(err("has() takes one field access argument"));
            };
            Ok(Value::Bool(is_present(path, bindings)?))
        }
        (Some(receiver), "matches") => {
            let Value::String(subject) = eval(receiver, bindings)? else {
                return Err(err("matches() on a non-string value"));
            };
            let [pattern] = args else {
                return Err(err("matches() takes one argument"));
            };
            let Value::String(pattern) = eval(pattern, bindings)? else {
                return Err(err("matches() pattern is not a string"));
            };
            let re = Regex::new(&pattern).map_err(|e| err(format!("bad regex: {e}")))?;
            Ok(Value::Bool(re.is_match(&subject)))
        }
        _ => Err(err(format!("unknown function '{function}'"))),
    }
}

/// Walk a field access chain; missing keys and non-map traversal are
/// evaluation errors (absorbed by enclosing guards).
fn access(path: &CelPath, bindings: &Bindings) -> EvalResult {
    let (base, segments) = path_parts(path);
    let mut current = bindings
        .get(base)
        .ok_or_else(|| err(format!("unbound variable '{base}'")))?;
    for seg in segments {
        let key = seg_key(seg);
        match current {
            Value::Object(obj) => {
                current = obj
                    .get(key)
                    .ok_or_else(|| err(format!("no such key '{key}'")))?;
            }
            other => return Err(err(format!("cannot select '{key}' from {other}"))),
        }
    }
    Ok(current.clone())
}

/// Presence for `has()` guards: false on a missing leaf or a missing
/// intermediate, true when the key exists (even with null value).
/// Selecting through a present value that is not a map is an evaluation
/// error, same as plain field access over it.
fn is_present(path: &CelPath, bindings: &Bindings) -> Result<bool, EvalError> {
    let (base, segments) = path_parts(path);
    let Some(mut current) = bindings.get(base) else {
        return Ok(false);
    };
    for seg in segments {
        match current {
            Value::Object(obj) => match obj.get(seg_key(seg)) {
                Some(next) => current = next,
                None => return Ok(false),
            },
            other => {
                return Err(err(format!(
                    "cannot select '{}' from {other}",
                    seg_key(seg)
                )))
            }
        }
    }
    Ok(true)
}

fn path_parts(path: &CelPath) -> (&str, &[PathSeg]) {
    (path.base(), path.segments())
}

fn seg_key(seg: &PathSeg) -> &str {
    match seg {
        PathSeg::Ident(name) => name,
        PathSeg::Key(key) => key,
    }
}

fn literal_value(lit: &CelLiteral) -> Value {
    match lit {
        CelLiteral::Null => Value::Null,
        CelLiteral::Bool(b) => Value::Bool(*b),
        CelLiteral::Int(i) => Value::Number((*i).into()),
        CelLiteral::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        CelLiteral::Str(s) => Value::String(s.clone()),
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> EvalResult {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(value_eq(lhs, rhs))),
        BinaryOp::Ne => Ok(Value::Bool(!value_eq(lhs, rhs))),
        BinaryOp::In => membership(lhs, rhs),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = order(lhs, rhs)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::Ge => ordering.is_ge(),
                _ => unreachable!(),
            }))
        }
    }
}

/// Heterogeneous equality: different kinds are unequal, numbers compare
/// numerically across int/float.
fn value_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => lhs == rhs,
    }
}

fn membership(lhs: &Value, rhs: &Value) -> EvalResult {
    match rhs {
        Value::Array(items) => Ok(Value::Bool(items.iter().any(|item| value_eq(lhs, item)))),
        Value::Object(obj) => match lhs {
            Value::String(key) => Ok(Value::Bool(obj.contains_key(key))),
            other => Err(err(format!("non-string map key {other}"))),
        },
        other => Err(err(format!("'in' over {other}"))),
    }
}

fn order(lhs: &Value, rhs: &Value) -> Result<std::cmp::Ordering, EvalError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .ok_or_else(|| err("incomparable numbers")),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(err(format!("cannot order {lhs} against {rhs}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{compile, VarAlloc};
    use crate::pattern::classify;
    use kyvert_core::FieldPath;
    use serde_json::json;

    fn compiled(yaml: &str) -> CelExpression {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        let tree = classify(&value, &FieldPath::root()).unwrap();
        let mut vars = VarAlloc::new();
        compile(&tree, &CelPath::var("object"), &FieldPath::root(), &mut vars).unwrap()
    }

    #[test]
    fn guarded_access_on_absent_field_is_false_not_error() {
        let expr = compiled("spec:\n  replicas: 3\n");
        assert!(eval_bool(&expr, &json!({"spec": {"replicas": 3}})));
        assert!(!eval_bool(&expr, &json!({"spec": {}})));
        assert!(!eval_bool(&expr, &json!({})));
    }

    #[test]
    fn error_absorption_in_or() {
        // `true || error` must be true: the guard arm saves the erroring arm.
        let expr = compiled("spec:\n  (livenessProbe):\n    periodSeconds: 10\n");
        assert!(eval_bool(&expr, &json!({"spec": {}})));
    }

    #[test]
    fn matches_errors_on_non_string_absorb_under_guard() {
        let expr = compiled("image: \"nginx:*\"\n");
        assert!(eval_bool(&expr, &json!({"image": "nginx:1.27"})));
        // has(image) is true, matches() errors; the AND yields the error,
        // which counts as a failed check at the top.
        assert!(!eval_bool(&expr, &json!({"image": 12})));
        assert!(!eval_bool(&expr, &json!({})));
    }

    #[test]
    fn quoted_key_membership_guard() {
        let expr = compiled("metadata:\n  labels:\n    app.kubernetes.io/name: \"?*\"\n");
        assert!(eval_bool(
            &expr,
            &json!({"metadata": {"labels": {"app.kubernetes.io/name": "web"}}})
        ));
        assert!(!eval_bool(
            &expr,
            &json!({"metadata": {"labels": {"app.kubernetes.io/name": ""}}})
        ));
        assert!(!eval_bool(&expr, &json!({"metadata": {"labels": {}}})));
    }

    #[test]
    fn scalar_in_place_of_map_fails_the_check() {
        // A present-but-scalar intermediate must fail, not slip past the
        // guards: selecting through it is an evaluation error.
        let tautology = compiled("spec:\n  runtimeClassName: \"*\"\n");
        assert!(!eval_bool(&tautology, &json!({"spec": "oops"})));
        assert!(eval_bool(&tautology, &json!({"spec": {}})));

        let conditional = compiled("spec:\n  (livenessProbe):\n    periodSeconds: 10\n");
        assert!(!eval_bool(&conditional, &json!({"spec": 5})));

        let absent = compiled("spec:\n  hostPID: \"!*\"\n");
        assert!(!eval_bool(&absent, &json!({"spec": 5})));
    }

    #[test]
    fn has_treats_null_valued_keys_as_present() {
        let expr = compiled("spec:\n  nodeName: \"!*\"\n");
        assert!(eval_bool(&expr, &json!({"spec": {}})));
        assert!(!eval_bool(&expr, &json!({"spec": {"nodeName": null}})));
    }

    #[test]
    fn quantifier_all_and_exists() {
        let all = compiled("containers:\n  - name: \"?*\"\n");
        assert!(eval_bool(
            &all,
            &json!({"containers": [{"name": "a"}, {"name": "b"}]})
        ));
        assert!(!eval_bool(
            &all,
            &json!({"containers": [{"name": "a"}, {}]})
        ));

        let exists = compiled("ports:\n  - port: 80\n  - port: 443\n");
        assert!(eval_bool(
            &exists,
            &json!({"ports": [{"port": 443}, {"port": 80}]})
        ));
        assert!(!eval_bool(&exists, &json!({"ports": [{"port": 80}]})));
    }

    #[test]
    fn numeric_comparisons_cross_int_float() {
        let expr = compiled("spec:\n  replicas: \">= 2\"\n");
        assert!(eval_bool(&expr, &json!({"spec": {"replicas": 2}})));
        assert!(eval_bool(&expr, &json!({"spec": {"replicas": 2.5}})));
        assert!(!eval_bool(&expr, &json!({"spec": {"replicas": 1}})));
        // Ordering a string against a number errors, absorbed to false.
        assert!(!eval_bool(&expr, &json!({"spec": {"replicas": "2"}})));
    }
}
