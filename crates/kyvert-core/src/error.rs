//! # Conversion Error Hierarchy
//!
//! Structured errors for the conversion pipeline. All errors use `thiserror`
//! for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Every stage fails fast with a typed error; no stage attempts recovery
//!   or partial output. A silently-wrong policy is worse than a rejected one.
//! - Errors that point at a policy construct carry the offending
//!   [`FieldPath`] so the caller can handle the construct manually.
//! - [`ConvertError::code`] exposes the machine-readable code used by the
//!   HTTP error body and the CLI exit reporting.

use thiserror::Error;

use crate::path::FieldPath;

/// Errors raised while parsing the legacy policy document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The input is not well-formed YAML, or its shape does not fit the
    /// legacy policy schema.
    #[error("malformed policy document: {0}")]
    Malformed(String),

    /// The document is YAML but not a recognized legacy policy kind.
    #[error(
        "unsupported policy type {api_version}/{kind}: expected a kyverno.io/v1 \
         or kyverno.io/v2beta1 ClusterPolicy or Policy"
    )]
    UnsupportedApiVersion {
        /// The `apiVersion` found in the document.
        api_version: String,
        /// The `kind` found in the document.
        kind: String,
    },

    /// A field the legacy schema requires is absent or empty.
    #[error("missing required field: {0}")]
    MissingRequiredField(FieldPath),
}

/// Top-level error type for the conversion pipeline.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The input could not be parsed as a legacy policy.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A pattern or operator has no CEL-expressible equivalent. The path
    /// names the exact construct so the caller can translate it by hand.
    #[error("unsupported construct at {path}: {construct}")]
    UnsupportedConstruct {
        /// Location of the construct in the source document.
        path: FieldPath,
        /// Short description of the construct kind (e.g. `mutate rule`).
        construct: String,
    },

    /// Assembly-stage inconsistency: the parsed policy is valid but cannot
    /// be expressed in the target schema (e.g. per-rule match constraints
    /// that differ, or label selectors the target match syntax lacks).
    #[error("conversion error: {0}")]
    Conversion(String),
}

/// Result type alias for conversion operations.
pub type ConvertResult<T> = Result<T, ConvertError>;

impl ConvertError {
    /// Machine-readable error code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "PARSE_ERROR",
            Self::UnsupportedConstruct { .. } => "UNSUPPORTED_CONSTRUCT",
            Self::Conversion(_) => "CONVERSION_ERROR",
        }
    }

    /// The offending field path, where one applies.
    pub fn field_path(&self) -> Option<&FieldPath> {
        match self {
            Self::UnsupportedConstruct { path, .. } => Some(path),
            Self::Parse(ParseError::MissingRequiredField(path)) => Some(path),
            _ => None,
        }
    }
}
