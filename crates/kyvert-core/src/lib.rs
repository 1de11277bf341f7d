//! # kyvert-core — Foundational Types for the Kyvert Converter
//!
//! Shared building blocks for the legacy-policy-to-CEL conversion pipeline:
//!
//! - [`error`]: the structured error hierarchy. A conversion either fully
//!   succeeds or reports exactly one typed, actionable diagnostic — there is
//!   no partial or best-effort output anywhere in the stack.
//! - [`path`]: [`FieldPath`], the diagnostic location type. Every error that
//!   points at a policy construct carries the dotted/indexed path to it
//!   (e.g. `spec.rules[0].validate.pattern.metadata`).
//! - [`value`]: YAML→JSON value normalization, so the compiler and the
//!   spot-check evaluator operate on a single uniform value model.
//!
//! ## Crate Policy
//!
//! - No I/O, no shared mutable state: everything here is a pure function
//!   over immutable data.
//! - Sits at the bottom of the dependency DAG — depended on by every other
//!   kyvert crate, depends only on serde and thiserror.

pub mod error;
pub mod path;
pub mod value;

pub use error::{ConvertError, ConvertResult, ParseError};
pub use path::FieldPath;
pub use value::yaml_to_json;
