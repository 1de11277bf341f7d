//! `kyvert check` — evaluate a legacy policy against a resource document
//! without a cluster.
//!
//! The policy is compiled through the same pipeline as `convert`, then each
//! rule's expression tree is evaluated against the resource with the
//! built-in interpreter. A resource admitted by every rule exits 0.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use serde_json::Value;

use kyvert_compiler::{compile_rule, eval_bool};
use kyvert_core::error::{ConvertError, ConvertResult};
use kyvert_core::path::FieldPath;
use kyvert_core::value::yaml_to_json;
use kyvert_policy::parse;

use crate::convert::render_error;

/// Arguments for `kyvert check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Legacy policy document to check against.
    pub policy: PathBuf,

    /// Resource document to evaluate.
    pub resource: PathBuf,
}

/// Result of evaluating one rule against the resource.
#[derive(Debug)]
pub struct RuleOutcome {
    /// Rule name from the source policy.
    pub rule: String,
    /// Whether the resource satisfies the rule's expression.
    pub passed: bool,
    /// The rule's validation message, shown on failure.
    pub message: Option<String>,
}

/// Compile every rule of `policy_yaml` and evaluate it against `resource`.
pub fn evaluate(policy_yaml: &str, resource: &Value) -> ConvertResult<Vec<RuleOutcome>> {
    let policy = parse(policy_yaml).map_err(ConvertError::from)?;

    let rules_path = FieldPath::root().key("spec").key("rules");
    let mut outcomes = Vec::with_capacity(policy.spec.rules.len());
    for (i, rule) in policy.spec.rules.iter().enumerate() {
        let expression = compile_rule(rule, &rules_path.index(i))?;
        outcomes.push(RuleOutcome {
            rule: rule.name.clone(),
            passed: eval_bool(&expression, resource),
            message: rule.validate.as_ref().and_then(|v| v.message.clone()),
        });
    }
    Ok(outcomes)
}

/// Check one resource file. Exit code 0 when every rule passes, 1 when at
/// least one rule fails, 2 when the policy itself cannot be compiled.
pub fn run_check(args: &CheckArgs) -> anyhow::Result<u8> {
    let policy_yaml = fs::read_to_string(&args.policy)
        .with_context(|| format!("reading {}", args.policy.display()))?;
    let resource_yaml = fs::read_to_string(&args.resource)
        .with_context(|| format!("reading {}", args.resource.display()))?;

    let resource: serde_yaml::Value = serde_yaml::from_str(&resource_yaml)
        .with_context(|| format!("parsing {}", args.resource.display()))?;
    let resource = yaml_to_json(resource);

    let outcomes = match evaluate(&policy_yaml, &resource) {
        Ok(outcomes) => outcomes,
        Err(err) => {
            eprintln!("{}", render_error(&err));
            return Ok(2);
        }
    };

    let mut failed = 0usize;
    for outcome in &outcomes {
        if outcome.passed {
            println!("PASS {}", outcome.rule);
        } else {
            failed += 1;
            match &outcome.message {
                Some(message) => println!("FAIL {}: {message}", outcome.rule),
                None => println!("FAIL {}", outcome.rule),
            }
        }
    }
    tracing::debug!(rules = outcomes.len(), failed, "check complete");

    Ok(if failed > 0 { 1 } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    const REQUIRE_LABELS: &str = r#"
apiVersion: kyverno.io/v1
kind: ClusterPolicy
metadata:
  name: require-labels
spec:
  rules:
    - name: check-for-labels
      match:
        any:
        - resources:
            kinds: [Pod]
      validate:
        message: "label 'app.kubernetes.io/name' is required"
        pattern:
          metadata:
            labels:
              app.kubernetes.io/name: "?*"
"#;

    #[test]
    fn labeled_resource_passes() {
        let resource = json!({
            "metadata": {"labels": {"app.kubernetes.io/name": "web"}}
        });
        let outcomes = evaluate(REQUIRE_LABELS, &resource).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].rule, "check-for-labels");
        assert!(outcomes[0].passed);
    }

    #[test]
    fn unlabeled_resource_fails_with_message() {
        let resource = json!({"metadata": {"name": "web"}});
        let outcomes = evaluate(REQUIRE_LABELS, &resource).unwrap();
        assert!(!outcomes[0].passed);
        assert_eq!(
            outcomes[0].message.as_deref(),
            Some("label 'app.kubernetes.io/name' is required")
        );
    }

    #[test]
    fn each_rule_reports_its_own_outcome() {
        let policy = r#"
apiVersion: kyverno.io/v1
kind: ClusterPolicy
metadata:
  name: two-rules
spec:
  rules:
    - name: require-name-label
      match:
        any:
        - resources:
            kinds: [Pod]
      validate:
        pattern:
          metadata:
            labels:
              app.kubernetes.io/name: "?*"
    - name: forbid-latest
      match:
        any:
        - resources:
            kinds: [Pod]
      validate:
        foreach:
          - list: request.object.spec.containers
            pattern:
              image: "!*:latest"
"#;
        let resource = json!({
            "metadata": {"labels": {"app.kubernetes.io/name": "web"}},
            "spec": {"containers": [{"image": "nginx:latest"}]}
        });
        let outcomes = evaluate(policy, &resource).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].passed);
        assert!(!outcomes[1].passed);
    }

    #[test]
    fn uncompilable_policy_is_an_error() {
        let policy = r#"
apiVersion: kyverno.io/v1
kind: ClusterPolicy
metadata:
  name: add-labels
spec:
  rules:
    - name: add-team-label
      match:
        any:
        - resources:
            kinds: [Pod]
      mutate:
        patchStrategicMerge:
          metadata: {}
"#;
        let err = evaluate(policy, &json!({})).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_CONSTRUCT");
    }
}
