//! # kyvert-policy — Policy Document Models
//!
//! Typed trees for both ends of the conversion pipeline, independent of
//! textual syntax:
//!
//! - [`legacy`]: the source `ClusterPolicy`/`Policy` document model and
//!   [`legacy::parse`], which validates the structural invariants the
//!   compiler relies on (exactly one validation body per rule, named rules,
//!   non-empty rule list) and classifies failures as
//!   `Malformed`/`UnsupportedApiVersion`/`MissingRequiredField`.
//! - [`target`]: the `ValidatingPolicy` output model. Field order is fixed
//!   by struct declaration order, which is what makes [`emit::emit`]
//!   deterministic.
//! - [`emit`]: YAML rendering of an assembled target document; repeated
//!   emission of the same document is byte-identical.
//!
//! ## Crate Policy
//!
//! - Parsing is a pure function over the input text: no I/O, no caches.
//! - Pattern subtrees stay untyped (`serde_yaml::Value`) here; giving them
//!   meaning is the compiler's job (shape classification happens once, in
//!   `kyvert-compiler::pattern`, not ad hoc during parsing).

pub mod emit;
pub mod legacy;
pub mod target;

pub use emit::emit;
pub use legacy::{parse, ClusterPolicy, Metadata};
pub use target::{MatchConstraints, ResourceRule, Validation, ValidatingPolicy, ValidatingSpec};
