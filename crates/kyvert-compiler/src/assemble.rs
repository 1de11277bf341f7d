//! # Rule Assembly
//!
//! Combines compiled rule bodies with the structurally re-encoded match
//! constraints and failure-action settings into a complete
//! `ValidatingPolicy`. Match conversion is a re-encoding into the
//! admission match syntax, not a CEL compilation step: kinds become
//! plural lowercase resource names with a well-known apiGroup table, and
//! anything the target syntax cannot express (label selectors, subjects,
//! multi-filter `all` groups, rules that disagree on their match blocks)
//! fails with `ConvertError::Conversion`.

use kyvert_core::{ConvertError, ConvertResult, FieldPath};
use kyvert_policy::legacy::{ClusterPolicy, MatchBlock, ResourceDescription};
use kyvert_policy::target::{
    MatchConstraints, ResourceRule, Validation, ValidatingPolicy, ValidatingSpec,
    TARGET_API_VERSION, TARGET_KIND,
};

use crate::compile::compile_rule;

/// Default admission operations when the source names none.
const DEFAULT_OPERATIONS: &[&str] = &["CREATE", "UPDATE"];

/// Assemble a parsed legacy policy into a `ValidatingPolicy`.
pub fn assemble(policy: &ClusterPolicy) -> ConvertResult<ValidatingPolicy> {
    let rules = &policy.spec.rules;
    let Some(first) = rules.first() else {
        return Err(ConvertError::Conversion("policy has no rules".to_string()));
    };

    // The target schema has one match constraint per policy, so every rule
    // must select the same resources.
    for rule in &rules[1..] {
        if rule.match_resources != first.match_resources {
            return Err(ConvertError::Conversion(format!(
                "rules '{}' and '{}' disagree on their match blocks; the target \
                 schema has a single policy-wide match constraint",
                first.name, rule.name
            )));
        }
        if rule.exclude != first.exclude {
            return Err(ConvertError::Conversion(format!(
                "rules '{}' and '{}' disagree on their exclude blocks",
                first.name, rule.name
            )));
        }
    }

    let match_block = first.match_resources.as_ref().ok_or_else(|| {
        ConvertError::Conversion(format!("rule '{}' has no match block", first.name))
    })?;
    let match_constraints = convert_match(match_block)?;
    let exclude = first
        .exclude
        .as_ref()
        .map(convert_match)
        .transpose()?;

    let rules_path = FieldPath::root().key("spec").key("rules");
    let mut validations = Vec::with_capacity(rules.len());
    for (i, rule) in rules.iter().enumerate() {
        let expression = compile_rule(rule, &rules_path.index(i))?.render();
        let message = rule
            .validate
            .as_ref()
            .and_then(|v| v.message.clone());
        validations.push(Validation { message, expression });
    }

    let enforce = policy
        .spec
        .validation_failure_action
        .as_deref()
        .is_some_and(|action| action.eq_ignore_ascii_case("enforce"));

    Ok(ValidatingPolicy {
        api_version: TARGET_API_VERSION.to_string(),
        kind: TARGET_KIND.to_string(),
        metadata: policy.metadata.clone(),
        spec: ValidatingSpec {
            validation_actions: vec![if enforce { "Deny" } else { "Audit" }.to_string()],
            background: policy.spec.background,
            match_constraints,
            exclude,
            validations,
        },
    })
}

// ---------------------------------------------------------------------------
// Match constraint re-encoding
// ---------------------------------------------------------------------------

fn convert_match(block: &MatchBlock) -> ConvertResult<MatchConstraints> {
    if let Some(key) = block.extra.keys().next() {
        return Err(ConvertError::Conversion(format!(
            "match field '{key}' has no equivalent in the target match syntax"
        )));
    }

    let forms = usize::from(!block.any.is_empty())
        + usize::from(!block.all.is_empty())
        + usize::from(block.resources.is_some());
    if forms > 1 {
        return Err(ConvertError::Conversion(
            "match block mixes any/all/resources forms".to_string(),
        ));
    }

    let descriptions: Vec<&ResourceDescription> = if !block.any.is_empty() {
        let mut out = Vec::with_capacity(block.any.len());
        for filter in &block.any {
            if let Some(key) = filter.extra.keys().next() {
                return Err(ConvertError::Conversion(format!(
                    "match filter field '{key}' has no equivalent in the target match syntax"
                )));
            }
            out.push(&filter.resources);
        }
        out
    } else if !block.all.is_empty() {
        // `all` intersects filters; the target syntax only unions resource
        // rules, so only the degenerate single-filter case converts.
        if block.all.len() > 1 {
            return Err(ConvertError::Conversion(
                "match 'all' with multiple filters cannot be expressed as resource rules"
                    .to_string(),
            ));
        }
        if let Some(key) = block.all[0].extra.keys().next() {
            return Err(ConvertError::Conversion(format!(
                "match filter field '{key}' has no equivalent in the target match syntax"
            )));
        }
        vec![&block.all[0].resources]
    } else if let Some(resources) = &block.resources {
        vec![resources]
    } else {
        return Err(ConvertError::Conversion(
            "match block selects no resources".to_string(),
        ));
    };

    let mut resource_rules = Vec::new();
    for description in descriptions {
        convert_description(description, &mut resource_rules)?;
    }
    Ok(MatchConstraints { resource_rules })
}

fn convert_description(
    description: &ResourceDescription,
    out: &mut Vec<ResourceRule>,
) -> ConvertResult<()> {
    if let Some(key) = description.extra.keys().next() {
        return Err(ConvertError::Conversion(format!(
            "resource match field '{key}' has no equivalent in the target match syntax"
        )));
    }
    if description.kinds.is_empty() {
        return Err(ConvertError::Conversion(
            "resource match names no kinds".to_string(),
        ));
    }

    let operations: Vec<String> = if description.operations.is_empty() {
        DEFAULT_OPERATIONS.iter().map(|s| s.to_string()).collect()
    } else {
        description.operations.clone()
    };

    // One resource rule per apiGroup, kinds grouped in first-appearance
    // order.
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for kind in &description.kinds {
        let (group, resource) = group_and_resource(kind);
        match grouped.iter_mut().find(|(g, _)| *g == group) {
            Some((_, resources)) => {
                if !resources.contains(&resource) {
                    resources.push(resource);
                }
            }
            None => grouped.push((group, vec![resource])),
        }
    }

    for (group, resources) in grouped {
        out.push(ResourceRule {
            api_groups: vec![group],
            api_versions: vec!["v1".to_string()],
            operations: operations.clone(),
            resources,
        });
    }
    Ok(())
}

/// Resolve a legacy `kinds` entry to its apiGroup and plural resource
/// name. `group/Kind` entries carry their group explicitly; bare kinds
/// use the well-known built-in table.
fn group_and_resource(kind: &str) -> (String, String) {
    if let Some((group, bare)) = kind.rsplit_once('/') {
        return (group.to_string(), pluralize(bare));
    }
    (well_known_group(kind).to_string(), pluralize(kind))
}

fn well_known_group(kind: &str) -> &'static str {
    match kind {
        "Deployment" | "DaemonSet" | "StatefulSet" | "ReplicaSet" => "apps",
        "Job" | "CronJob" => "batch",
        "Ingress" | "NetworkPolicy" | "IngressClass" => "networking.k8s.io",
        "Role" | "RoleBinding" | "ClusterRole" | "ClusterRoleBinding" => {
            "rbac.authorization.k8s.io"
        }
        "HorizontalPodAutoscaler" => "autoscaling",
        "PodDisruptionBudget" => "policy",
        "CustomResourceDefinition" => "apiextensions.k8s.io",
        _ => "",
    }
}

/// Lowercase plural of a kind name (`Pod` → `pods`, `NetworkPolicy` →
/// `networkpolicies`, `Ingress` → `ingresses`).
fn pluralize(kind: &str) -> String {
    let lower = kind.to_ascii_lowercase();
    if let Some(stem) = lower.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{stem}ies");
        }
    }
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{lower}es");
    }
    format!("{lower}s")
}
