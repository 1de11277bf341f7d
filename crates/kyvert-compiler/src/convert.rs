//! # Conversion Orchestrator
//!
//! The single-call pipeline: parse → assemble (compiling every rule) →
//! emit, strictly in order. The first failing stage aborts with its typed
//! error and no partial output. Pure and stateless; concurrent callers
//! need no coordination.

use kyvert_core::{ConvertError, ConvertResult};
use kyvert_policy::target::ValidatingPolicy;
use kyvert_policy::{emit, parse};

use crate::assemble::assemble;

/// Convert a legacy policy document to its `ValidatingPolicy` YAML.
pub fn convert(input: &str) -> ConvertResult<String> {
    let target = convert_document(input)?;
    emit(&target).map_err(|e| ConvertError::Conversion(format!("emit failed: {e}")))
}

/// Convert to the typed target document, for callers that keep working
/// with the tree (the offline check command evaluates its expressions).
pub fn convert_document(input: &str) -> ConvertResult<ValidatingPolicy> {
    let policy = parse(input)?;
    tracing::debug!(
        policy = %policy.metadata.name,
        rules = policy.spec.rules.len(),
        "parsed legacy policy"
    );
    let target = assemble(&policy)?;
    tracing::debug!(
        policy = %target.metadata.name,
        validations = target.spec.validations.len(),
        "assembled validating policy"
    );
    Ok(target)
}
