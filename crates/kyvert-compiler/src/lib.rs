//! # kyvert-compiler — Pattern → CEL Conversion Engine
//!
//! The engineering core of kyvert: translates legacy declarative
//! admission policies (structural patterns, `anyPattern` disjunctions,
//! `foreach` iteration) into CEL boolean expressions and assembles them
//! into `ValidatingPolicy` documents.
//!
//! ## Pipeline
//!
//! ```text
//! text ── parse ──► ClusterPolicy ── assemble ──► ValidatingPolicy ── emit ──► text
//!                        │
//!                        └─ per rule: classify ──► Pattern ── compile ──► CelExpression
//! ```
//!
//! - [`pattern`]: up-front shape classification of untyped pattern trees.
//! - [`cel`]: the immutable compiled expression tree and its renderer.
//! - [`compile`]: the recursive pattern compiler (maps, wildcards,
//!   comparison operators, arrays, anyPattern, foreach, preconditions).
//! - [`assemble`]: match-constraint re-encoding plus per-rule validations.
//! - [`convert`]: the all-or-nothing orchestrator.
//! - [`matcher`] / [`eval`]: native pattern matching and a CEL-subset
//!   interpreter, used to cross-check that compiled expressions preserve
//!   the source semantics.
//!
//! ## Crate Policy
//!
//! - Conversion is a pure function of its input; no caches, no shared
//!   mutable state, no I/O.
//! - Constructs without a CEL equivalent fail with a structured error
//!   naming the exact source path; nothing is approximated.

pub mod assemble;
pub mod cel;
pub mod compile;
pub mod convert;
pub mod eval;
pub mod matcher;
pub mod pattern;

pub use assemble::assemble;
pub use cel::{CelExpression, CelPath};
pub use compile::{compile, compile_rule, compile_validate, VarAlloc};
pub use convert::{convert, convert_document};
pub use eval::eval_bool;
pub use matcher::match_resource;
pub use pattern::{classify, Pattern};
