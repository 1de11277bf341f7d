//! # Target Policy Document Model
//!
//! Typed tree for the converted `ValidatingPolicy`. Serialization order
//! follows struct declaration order, which together with sorted map keys in
//! [`crate::legacy::Metadata`] makes emission deterministic.

use serde::{Deserialize, Serialize};

use crate::legacy::Metadata;

/// apiVersion stamped on every converted policy.
pub const TARGET_API_VERSION: &str = "policies.kyverno.io/v1alpha1";
/// Kind stamped on every converted policy.
pub const TARGET_KIND: &str = "ValidatingPolicy";

/// A converted policy document, ready for [`crate::emit::emit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatingPolicy {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: ValidatingSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatingSpec {
    /// `Deny` for enforce policies, `Audit` otherwise.
    #[serde(rename = "validationActions")]
    pub validation_actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<bool>,
    #[serde(rename = "matchConstraints")]
    pub match_constraints: MatchConstraints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<MatchConstraints>,
    /// One entry per source rule, in source order.
    pub validations: Vec<Validation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchConstraints {
    #[serde(rename = "resourceRules")]
    pub resource_rules: Vec<ResourceRule>,
}

/// One resource selection rule in the admission match syntax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRule {
    #[serde(rename = "apiGroups")]
    pub api_groups: Vec<String>,
    #[serde(rename = "apiVersions")]
    pub api_versions: Vec<String>,
    pub operations: Vec<String>,
    /// Plural lowercase resource names (`pods`, `deployments`).
    pub resources: Vec<String>,
}

/// A compiled validation: the rule's message plus one CEL expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub expression: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ValidatingPolicy {
        ValidatingPolicy {
            api_version: TARGET_API_VERSION.to_string(),
            kind: TARGET_KIND.to_string(),
            metadata: Metadata {
                name: "require-labels".to_string(),
                labels: None,
                annotations: None,
            },
            spec: ValidatingSpec {
                validation_actions: vec!["Audit".to_string()],
                background: Some(true),
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
                    message: Some("label is required".to_string()),
                    expression: "has(object.metadata.labels)".to_string(),
                }],
            },
        }
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let yaml = serde_yaml::to_string(&sample()).unwrap();
        assert!(yaml.contains("apiVersion: policies.kyverno.io/v1alpha1"));
        assert!(yaml.contains("kind: ValidatingPolicy"));
        assert!(yaml.contains("validationActions:"));
        assert!(yaml.contains("matchConstraints:"));
        assert!(yaml.contains("resourceRules:"));
        assert!(yaml.contains("apiGroups:"));
        assert!(!yaml.contains("exclude:"));
        assert!(!yaml.contains("match_constraints"));
    }

    #[test]
    fn roundtrips_through_yaml() {
        let doc = sample();
        let yaml = serde_yaml::to_string(&doc).unwrap();
        let back: ValidatingPolicy = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, doc);
    }
}
