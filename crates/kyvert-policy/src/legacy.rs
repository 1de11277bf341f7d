//! # Legacy Policy Document Model
//!
//! Typed representation of a `kyverno.io/v1` `ClusterPolicy`/`Policy` and
//! the [`parse`] entry point. Parsing validates the structural invariants
//! the rest of the pipeline relies on:
//!
//! - the document is a recognized legacy policy kind,
//! - `metadata.name` and a non-empty `spec.rules` list are present,
//! - every rule is named and carries a `match` block,
//! - every validate block declares exactly one body
//!   (`pattern` | `anyPattern` | `foreach`),
//! - every foreach entry names its iteration `list` and exactly one body.
//!
//! Rule-level keys outside the validation vocabulary (`mutate`, `generate`,
//! `verifyImages`, `context`, ...) are captured verbatim in `extra` maps.
//! They are not parse errors — a mutation rule is a well-formed legacy
//! policy — but the compiler reports them as `UnsupportedConstruct` with
//! the exact field path.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use kyvert_core::{FieldPath, ParseError};

/// Legacy apiVersions this converter recognizes.
pub const LEGACY_API_VERSIONS: &[&str] = &["kyverno.io/v1", "kyverno.io/v2beta1"];
/// Legacy kinds this converter recognizes.
pub const LEGACY_KINDS: &[&str] = &["ClusterPolicy", "Policy"];

// ---------------------------------------------------------------------------
// Document tree
// ---------------------------------------------------------------------------

/// A parsed legacy policy document. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterPolicy {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: PolicySpec,
}

/// Object metadata carried over to the converted policy unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Global policy settings plus the ordered rule list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySpec {
    /// `enforce` or `audit` (case-insensitive). Absent means audit.
    #[serde(
        rename = "validationFailureAction",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub validation_failure_action: Option<String>,
    /// Whether the policy also applies to existing resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<bool>,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

/// One named validation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub name: String,
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_resources: Option<MatchBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<MatchBlock>,
    /// Rule-level preconditions, ANDed ahead of the compiled body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preconditions: Option<Preconditions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate: Option<ValidateBlock>,
    /// Anything else the rule declares (`mutate`, `generate`, `context`, ...).
    /// Surfaced by the compiler as `UnsupportedConstruct`.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Resource selection for a rule: `any`/`all` filter groups, or the old
/// single-block `resources` form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchBlock {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any: Vec<ResourceFilter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<ResourceFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceDescription>,
    /// Subject/role selectors the target schema cannot express.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl MatchBlock {
    /// Whether the block selects nothing at all.
    pub fn is_empty(&self) -> bool {
        self.any.is_empty() && self.all.is_empty() && self.resources.is_none()
    }
}

/// One filter inside an `any`/`all` group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceFilter {
    pub resources: ResourceDescription,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// The resource kinds (and optionally operations) a filter selects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescription {
    #[serde(default)]
    pub kinds: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<String>,
    /// Selectors, namespaces, names — not expressible in the target match
    /// syntax; the assembler rejects filters that use them.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// The validation body of a rule. Exactly one of `pattern`, `any_pattern`,
/// or `foreach` is present after [`parse`] succeeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidateBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Untyped pattern subtree; classified by the compiler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<serde_yaml::Value>,
    /// Ordered disjunction of pattern subtrees.
    #[serde(rename = "anyPattern", default, skip_serializing_if = "Option::is_none")]
    pub any_pattern: Option<Vec<serde_yaml::Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreach: Vec<ForeachBlock>,
    /// Validation types without a CEL equivalent (`deny`, `podSecurity`, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ValidateBlock {
    fn body_count(&self) -> usize {
        usize::from(self.pattern.is_some())
            + usize::from(self.any_pattern.is_some())
            + usize::from(!self.foreach.is_empty())
    }
}

/// One `foreach` entry: an iteration target plus a nested body evaluated
/// per element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForeachBlock {
    /// JMESPath-style field path yielding the list to iterate
    /// (e.g. `request.object.spec.containers`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<serde_yaml::Value>,
    #[serde(rename = "anyPattern", default, skip_serializing_if = "Option::is_none")]
    pub any_pattern: Option<Vec<serde_yaml::Value>>,
    /// Per-element preconditions; elements failing them are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preconditions: Option<Preconditions>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Precondition block: either the old bare list form or `{ any, all }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Preconditions {
    Grouped {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        any: Vec<Condition>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        all: Vec<Condition>,
    },
    Flat(Vec<Condition>),
}

/// A single precondition: `{{ key }}` operator value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub key: String,
    pub operator: String,
    #[serde(default)]
    pub value: serde_yaml::Value,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a legacy policy document.
///
/// Pure function over the input text. Fails with:
/// - [`ParseError::Malformed`] when the input is not YAML, does not fit the
///   legacy schema, or violates the one-body-per-rule invariant,
/// - [`ParseError::UnsupportedApiVersion`] when the document is not a
///   recognized legacy policy kind,
/// - [`ParseError::MissingRequiredField`] when a required field is absent
///   or empty, carrying the exact field path.
pub fn parse(input: &str) -> Result<ClusterPolicy, ParseError> {
    let doc: serde_yaml::Value =
        serde_yaml::from_str(input).map_err(|e| ParseError::Malformed(e.to_string()))?;
    if !doc.is_mapping() {
        return Err(ParseError::Malformed(
            "policy document is not a YAML mapping".to_string(),
        ));
    }

    check_policy_type(&doc)?;
    check_required_raw(&doc)?;

    let policy: ClusterPolicy =
        serde_yaml::from_value(doc).map_err(|e| ParseError::Malformed(e.to_string()))?;

    for (i, rule) in policy.spec.rules.iter().enumerate() {
        check_rule_bodies(rule, i)?;
    }

    Ok(policy)
}

/// Verify apiVersion/kind name a recognized legacy policy.
fn check_policy_type(doc: &serde_yaml::Value) -> Result<(), ParseError> {
    let api_version = doc
        .get("apiVersion")
        .and_then(serde_yaml::Value::as_str)
        .unwrap_or_default();
    let kind = doc
        .get("kind")
        .and_then(serde_yaml::Value::as_str)
        .unwrap_or_default();
    if !LEGACY_API_VERSIONS.contains(&api_version) || !LEGACY_KINDS.contains(&kind) {
        return Err(ParseError::UnsupportedApiVersion {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
        });
    }
    Ok(())
}

/// Required-field checks on the raw tree, so missing fields surface as
/// `MissingRequiredField` with a path rather than a serde shape error.
fn check_required_raw(doc: &serde_yaml::Value) -> Result<(), ParseError> {
    let name = doc
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(serde_yaml::Value::as_str)
        .unwrap_or_default();
    if name.is_empty() {
        return Err(ParseError::MissingRequiredField(
            FieldPath::root().key("metadata").key("name"),
        ));
    }

    let rules_path = FieldPath::root().key("spec").key("rules");
    let rules = doc
        .get("spec")
        .and_then(|s| s.get("rules"))
        .and_then(serde_yaml::Value::as_sequence)
        .ok_or_else(|| ParseError::MissingRequiredField(rules_path.clone()))?;
    if rules.is_empty() {
        return Err(ParseError::MissingRequiredField(rules_path));
    }

    for (i, rule) in rules.iter().enumerate() {
        let rule_path = rules_path.index(i);
        let rule_name = rule
            .get("name")
            .and_then(serde_yaml::Value::as_str)
            .unwrap_or_default();
        if rule_name.is_empty() {
            return Err(ParseError::MissingRequiredField(rule_path.key("name")));
        }
        if rule.get("match").is_none() {
            return Err(ParseError::MissingRequiredField(rule_path.key("match")));
        }
    }
    Ok(())
}

/// Enforce the one-body-per-rule invariant on the typed tree.
fn check_rule_bodies(rule: &PolicyRule, index: usize) -> Result<(), ParseError> {
    let rule_path = FieldPath::root().key("spec").key("rules").index(index);

    let Some(validate) = &rule.validate else {
        // Mutation-family rules parse fine; the compiler rejects them with
        // the precise construct path.
        let has_alternative = ["mutate", "generate", "verifyImages"]
            .iter()
            .any(|k| rule.extra.contains_key(*k));
        if has_alternative {
            return Ok(());
        }
        return Err(ParseError::MissingRequiredField(rule_path.key("validate")));
    };

    let validate_path = rule_path.key("validate");
    match validate.body_count() {
        0 => {
            return Err(ParseError::MissingRequiredField(
                validate_path.key("pattern"),
            ))
        }
        1 => {}
        _ => {
            return Err(ParseError::Malformed(format!(
                "rule '{}' declares more than one validation body \
                 (pattern/anyPattern/foreach are mutually exclusive)",
                rule.name
            )))
        }
    }

    if let Some(members) = &validate.any_pattern {
        if members.is_empty() {
            return Err(ParseError::MissingRequiredField(
                validate_path.key("anyPattern"),
            ));
        }
    }

    for (j, entry) in validate.foreach.iter().enumerate() {
        let entry_path = validate_path.key("foreach").index(j);
        if entry.list.as_deref().unwrap_or_default().is_empty() {
            return Err(ParseError::MissingRequiredField(entry_path.key("list")));
        }
        let bodies =
            usize::from(entry.pattern.is_some()) + usize::from(entry.any_pattern.is_some());
        match bodies {
            0 => {
                return Err(ParseError::MissingRequiredField(
                    entry_path.key("pattern"),
                ))
            }
            1 => {}
            _ => {
                return Err(ParseError::Malformed(format!(
                    "rule '{}' foreach entry {j} declares both pattern and anyPattern",
                    rule.name
                )))
            }
        }
    }

    Ok(())
}
