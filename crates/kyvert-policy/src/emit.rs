//! YAML emission for converted policies. Thin wrapper over `serde_yaml`
//! kept as its own seam so the output format has exactly one owner.

use crate::target::ValidatingPolicy;

/// Render a converted policy as a YAML document.
///
/// Deterministic: field order follows the target model's declaration order
/// and metadata maps are sorted, so the same document always renders to the
/// same bytes.
pub fn emit(policy: &ValidatingPolicy) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::Metadata;
    use crate::target::{
        MatchConstraints, ResourceRule, Validation, ValidatingSpec, TARGET_API_VERSION, TARGET_KIND,
    };
    use std::collections::BTreeMap;

    fn sample() -> ValidatingPolicy {
        ValidatingPolicy {
            api_version: TARGET_API_VERSION.to_string(),
            kind: TARGET_KIND.to_string(),
            metadata: Metadata {
                name: "disallow-latest-tag".to_string(),
                labels: Some(BTreeMap::from([(
                    "app.kubernetes.io/managed-by".to_string(),
                    "kyvert".to_string(),
                )])),
                annotations: None,
            },
            spec: ValidatingSpec {
                validation_actions: vec!["Deny".to_string()],
                background: None,
                match_constraints: MatchConstraints {
                    resource_rules: vec![ResourceRule {
                        api_groups: vec![String::new()],
                        api_versions: vec!["v1".to_string()],
                        operations: vec!["CREATE".to_string(), "UPDATE".to_string()],
                        resources: vec!["pods".to_string()],
                    }],
                },
                exclude: None,
                validations: vec![Validation {
                    message: None,
                    expression: "!has(object.spec.tag)".to_string(),
                }],
            },
        }
    }

    #[test]
    fn emission_is_deterministic() {
        let doc = sample();
        let first = emit(&doc).unwrap();
        let second = emit(&doc).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn emitted_yaml_reparses_to_same_document() {
        let doc = sample();
        let yaml = emit(&doc).unwrap();
        let back: ValidatingPolicy = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, doc);
        assert_eq!(emit(&back).unwrap(), yaml);
    }
}
