//! # Diagnostic Field Paths
//!
//! [`FieldPath`] identifies a location inside the source policy document for
//! error reporting: a sequence of mapping keys and sequence indices rendered
//! in the familiar dotted form (`spec.rules[0].validate.pattern.metadata`).
//!
//! Paths are cheap immutable values: `key()`/`index()` return extended
//! copies, so the compiler can thread the current location through its
//! recursion without any shared state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One step in a [`FieldPath`]: a mapping key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathSegment {
    /// A mapping key (`validate`, `app.kubernetes.io/name`, ...).
    Key(String),
    /// A zero-based sequence index (`rules[0]`).
    Index(usize),
}

/// Location of a construct inside the source policy document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// The document root (renders as `$`).
    pub fn root() -> Self {
        Self::default()
    }

    /// Extend the path with a mapping key.
    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Key(key.to_string()));
        Self { segments }
    }

    /// Extend the path with a sequence index.
    pub fn index(&self, idx: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Index(idx));
        Self { segments }
    }

    /// Whether this path is the document root.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "$");
        }
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                PathSegment::Key(k) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{k}")?;
                }
                PathSegment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}
