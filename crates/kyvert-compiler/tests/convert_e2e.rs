//! End-to-end conversion tests over complete policy documents.

use kyvert_compiler::convert::{convert, convert_document};
use kyvert_policy::emit;
use kyvert_policy::target::ValidatingPolicy;

const REQUIRE_LABELS: &str = r#"
apiVersion: kyverno.io/v1
kind: ClusterPolicy
metadata:
  name: require-labels
spec:
  validationFailureAction: Audit
  background: true
  rules:
    - name: check-for-labels
      match:
        any:
        - resources:
            kinds:
            - Pod
      validate:
        message: "label 'app.kubernetes.io/name' is required"
        pattern:
          metadata:
            labels:
              app.kubernetes.io/name: "?*"
"#;

const DISALLOW_LATEST_TAG: &str = r#"
apiVersion: kyverno.io/v1
kind: ClusterPolicy
metadata:
  name: disallow-latest-tag
spec:
  validationFailureAction: Enforce
  rules:
    - name: require-image-tag
      match:
        any:
        - resources:
            kinds: [Pod]
      validate:
        message: "images must not use the latest tag"
        foreach:
          - list: request.object.spec.containers
            pattern:
              image: "!*:latest"
"#;

#[test]
fn require_labels_end_to_end() {
    let doc = convert_document(REQUIRE_LABELS).unwrap();

    assert_eq!(doc.metadata.name, "require-labels");
    assert_eq!(doc.spec.validation_actions, vec!["Audit"]);
    assert_eq!(doc.spec.background, Some(true));

    let rules = &doc.spec.match_constraints.resource_rules;
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].resources, vec!["pods"]);
    assert_eq!(rules[0].api_groups, vec![""]);

    assert_eq!(doc.spec.validations.len(), 1);
    let validation = &doc.spec.validations[0];
    assert_eq!(
        validation.message.as_deref(),
        Some("label 'app.kubernetes.io/name' is required")
    );
    assert_eq!(
        validation.expression,
        "has(object.metadata) && has(object.metadata.labels) && \
         'app.kubernetes.io/name' in object.metadata.labels && \
         object.metadata.labels['app.kubernetes.io/name'] != ''"
    );
}

#[test]
fn foreach_policy_end_to_end() {
    let doc = convert_document(DISALLOW_LATEST_TAG).unwrap();
    assert_eq!(doc.spec.validation_actions, vec!["Deny"]);
    assert_eq!(
        doc.spec.validations[0].expression,
        "!has(object.spec.containers) || object.spec.containers.all(element, \
         has(element.image) && !element.image.matches('^.*:latest$'))"
    );
}

#[test]
fn any_pattern_keeps_both_disjuncts() {
    let yaml = r#"
apiVersion: kyverno.io/v1
kind: ClusterPolicy
metadata:
  name: require-probes
spec:
  rules:
    - name: probes
      match:
        any:
        - resources:
            kinds: [Pod]
      validate:
        message: a liveness or readiness probe is required
        anyPattern:
          - spec:
              containers:
                - livenessProbe: "?*"
          - spec:
              containers:
                - readinessProbe: "?*"
"#;
    let doc = convert_document(yaml).unwrap();
    let expression = &doc.spec.validations[0].expression;
    let left = "object.spec.containers.all(element, has(element.livenessProbe) && \
                element.livenessProbe != '')";
    let right = "object.spec.containers.all(element, has(element.readinessProbe) && \
                 element.readinessProbe != '')";
    assert!(expression.contains(left), "{expression}");
    assert!(expression.contains(right), "{expression}");
    assert!(expression.contains(" || "), "{expression}");
}

#[test]
fn emitted_document_is_idempotent() {
    let first = convert(REQUIRE_LABELS).unwrap();
    let reparsed: ValidatingPolicy = serde_yaml::from_str(&first).unwrap();
    let second = emit(&reparsed).unwrap();
    assert_eq!(first, second);
}

#[test]
fn conversion_is_deterministic() {
    assert_eq!(
        convert(DISALLOW_LATEST_TAG).unwrap(),
        convert(DISALLOW_LATEST_TAG).unwrap()
    );
}

#[test]
fn mutation_policy_reports_unsupported_construct() {
    let yaml = r#"
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
          metadata:
            labels:
              team: platform
"#;
    let err = convert(yaml).unwrap_err();
    assert_eq!(err.code(), "UNSUPPORTED_CONSTRUCT");
    assert_eq!(
        err.field_path().map(ToString::to_string).as_deref(),
        Some("spec.rules[0].mutate")
    );
}

#[test]
fn unrecognized_document_reports_parse_error() {
    let err = convert("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: x\n").unwrap_err();
    assert_eq!(err.code(), "PARSE_ERROR");
}

#[test]
fn multi_rule_policy_yields_one_validation_per_rule() {
    let yaml = r#"
apiVersion: kyverno.io/v1
kind: ClusterPolicy
metadata:
  name: pod-hardening
spec:
  validationFailureAction: Enforce
  rules:
    - name: no-host-network
      match:
        any:
        - resources:
            kinds: [Pod]
      validate:
        message: host networking is forbidden
        pattern:
          spec:
            (hostNetwork): false
    - name: no-host-pid
      match:
        any:
        - resources:
            kinds: [Pod]
      validate:
        message: host PID namespace is forbidden
        pattern:
          spec:
            hostPID: "!*"
"#;
    let doc = convert_document(yaml).unwrap();
    assert_eq!(doc.spec.validations.len(), 2);
    assert_eq!(
        doc.spec.validations[0].message.as_deref(),
        Some("host networking is forbidden")
    );
    assert_eq!(
        doc.spec.validations[1].expression,
        "has(object.spec) && !has(object.spec.hostPID)"
    );
}
