//! # Pattern Classification
//!
//! The legacy pattern grammar carries meaning by shape: nested maps mean
//! conjunction, scalar prefixes (`>`, `!`, `|`) mean comparison, magic
//! strings (`?*`, `*`, `!*`) mean presence checks, and parenthesized map
//! keys are anchors. This module performs a single up-front classification
//! pass turning an untyped YAML subtree into the explicit [`Pattern`]
//! variant tree the compiler walks, so meaning is derived exactly once.
//!
//! ## Grammar
//!
//! | Source shape                   | Variant                     |
//! |--------------------------------|-----------------------------|
//! | mapping                        | `Map` (AND of entries)      |
//! | sequence                       | `Array` (quantified)        |
//! | `"?*"`                         | `WildcardExists`            |
//! | `"!*"`                         | `WildcardAbsent`            |
//! | `null`                         | `Absent`                    |
//! | string with `*`/`?`            | `Wildcard` (glob)           |
//! | `>`, `<`, `>=`, `<=`, `!`, `\|`| `Conditions` (OR of alts)   |
//! | any other scalar               | `Literal`                   |
//!
//! Map keys may carry an anchor: `(key)` makes the entry conditional,
//! `=(key)` and `+(key)` behave like plain keys for validation purposes.
//! Other anchor forms (`X(key)`, `^(key)`, `<(key)`) have no CEL
//! equivalent and classify to `UnsupportedConstruct`.

use kyvert_core::{ConvertError, ConvertResult, FieldPath};

// ---------------------------------------------------------------------------
// Classified tree
// ---------------------------------------------------------------------------

/// A classified pattern node. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Nested map: AND of all entries, applied below the current path.
    Map(Vec<MapEntry>),
    /// List of sub-patterns, compiled to quantifiers over the target list.
    Array(Vec<Pattern>),
    /// Exact scalar match.
    Literal(Scalar),
    /// `?*`: field present and non-empty.
    WildcardExists,
    /// `!*`: field must not exist.
    WildcardAbsent,
    /// Explicit `null` pattern: field must not exist.
    Absent,
    /// Glob string containing `?`/`*`. The bare `"*"` is a tautology.
    Wildcard(String),
    /// `|`-separated comparison alternatives, OR semantics.
    Conditions(Vec<Comparison>),
}

impl Pattern {
    /// Whether the compiled form already accounts for field absence, so the
    /// compiler must not wrap it in a presence guard.
    pub fn is_self_guarding(&self) -> bool {
        match self {
            Self::WildcardExists | Self::WildcardAbsent | Self::Absent => true,
            Self::Wildcard(glob) => glob == "*",
            _ => false,
        }
    }
}

/// One map entry: the field key, its anchor, and the nested pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: String,
    pub anchor: Anchor,
    pub pattern: Pattern,
}

/// Map-key anchors recognized by the validation grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Bare key.
    Plain,
    /// `(key)`: check the nested pattern only when the field is present.
    Conditional,
    /// `=(key)`: equality anchor; validates like a plain key.
    Equality,
    /// `+(key)`: add-if-absent anchor; validates like a plain key.
    AddIfAbsent,
}

/// Scalar pattern operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Comparison operator in a `Conditions` alternative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// One alternative of a `Conditions` pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub op: CompareOp,
    pub value: Scalar,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classify an untyped pattern subtree.
///
/// `path` locates the subtree in the source document and is carried into
/// `UnsupportedConstruct` errors unchanged.
pub fn classify(value: &serde_yaml::Value, path: &FieldPath) -> ConvertResult<Pattern> {
    match value {
        serde_yaml::Value::Null => Ok(Pattern::Absent),
        serde_yaml::Value::Bool(b) => Ok(Pattern::Literal(Scalar::Bool(*b))),
        serde_yaml::Value::Number(n) => Ok(Pattern::Literal(classify_number(n, path)?)),
        serde_yaml::Value::String(s) => classify_string(s, path),
        serde_yaml::Value::Sequence(seq) => {
            let mut subs = Vec::with_capacity(seq.len());
            for (i, item) in seq.iter().enumerate() {
                subs.push(classify(item, &path.index(i))?);
            }
            Ok(Pattern::Array(subs))
        }
        serde_yaml::Value::Mapping(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (k, v) in map {
                let Some(raw_key) = k.as_str() else {
                    return Err(ConvertError::UnsupportedConstruct {
                        path: path.clone(),
                        construct: "non-string pattern key".to_string(),
                    });
                };
                let (key, anchor) = parse_key(raw_key, path)?;
                let pattern = classify(v, &path.key(&key))?;
                entries.push(MapEntry { key, anchor, pattern });
            }
            Ok(Pattern::Map(entries))
        }
        serde_yaml::Value::Tagged(tagged) => classify(&tagged.value, path),
    }
}

/// Numeric pattern operand. NaN and the infinities have no CEL literal
/// form, so they classify to `UnsupportedConstruct`.
fn classify_number(n: &serde_yaml::Number, path: &FieldPath) -> ConvertResult<Scalar> {
    if let Some(i) = n.as_i64() {
        return Ok(Scalar::Int(i));
    }
    if let Some(u) = n.as_u64() {
        // Beyond i64 range; compare as float.
        return Ok(Scalar::Float(u as f64));
    }
    match n.as_f64() {
        Some(f) if f.is_finite() => Ok(Scalar::Float(f)),
        _ => Err(ConvertError::UnsupportedConstruct {
            path: path.clone(),
            construct: format!("non-finite numeric pattern '{n}'"),
        }),
    }
}

/// Classify a scalar string by its prefix/wildcard syntax.
fn classify_string(s: &str, path: &FieldPath) -> ConvertResult<Pattern> {
    match s {
        "?*" => return Ok(Pattern::WildcardExists),
        "!*" => return Ok(Pattern::WildcardAbsent),
        "*" => return Ok(Pattern::Wildcard("*".to_string())),
        _ => {}
    }
    if s.contains('|') {
        let mut alts = Vec::new();
        for part in s.split('|') {
            alts.push(parse_alternative(part.trim(), path)?);
        }
        return Ok(Pattern::Conditions(alts));
    }
    if has_operator_prefix(s) {
        return Ok(Pattern::Conditions(vec![parse_alternative(s, path)?]));
    }
    if s.contains('*') || s.contains('?') {
        return Ok(Pattern::Wildcard(s.to_string()));
    }
    Ok(Pattern::Literal(Scalar::Str(s.to_string())))
}

fn has_operator_prefix(s: &str) -> bool {
    s.starts_with('>') || s.starts_with('<') || s.starts_with('!')
}

/// Parse one `|` alternative: an optional prefix operator plus an operand.
fn parse_alternative(part: &str, path: &FieldPath) -> ConvertResult<Comparison> {
    let (op, rest) = if let Some(rest) = part.strip_prefix(">=") {
        (CompareOp::Ge, rest)
    } else if let Some(rest) = part.strip_prefix("<=") {
        (CompareOp::Le, rest)
    } else if let Some(rest) = part.strip_prefix("!=") {
        (CompareOp::Ne, rest)
    } else if let Some(rest) = part.strip_prefix('>') {
        (CompareOp::Gt, rest)
    } else if let Some(rest) = part.strip_prefix('<') {
        (CompareOp::Lt, rest)
    } else if let Some(rest) = part.strip_prefix('!') {
        (CompareOp::Ne, rest)
    } else {
        (CompareOp::Eq, part)
    };
    Ok(Comparison {
        op,
        value: parse_operand(rest.trim(), path)?,
    })
}

/// Operand: numeric where it parses as a finite number, string otherwise.
/// Glob characters are kept in the string; the compiler turns glob
/// operands into match calls. `NaN`/`inf` spellings parse numerically but
/// cannot be written as CEL literals, so they are unsupported.
fn parse_operand(s: &str, path: &FieldPath) -> ConvertResult<Scalar> {
    if let Ok(i) = s.parse::<i64>() {
        return Ok(Scalar::Int(i));
    }
    if let Ok(f) = s.parse::<f64>() {
        if f.is_finite() {
            return Ok(Scalar::Float(f));
        }
        return Err(ConvertError::UnsupportedConstruct {
            path: path.clone(),
            construct: format!("non-finite numeric operand '{s}'"),
        });
    }
    Ok(Scalar::Str(s.to_string()))
}

/// Split a map key into `(field name, anchor)`.
fn parse_key(key: &str, path: &FieldPath) -> ConvertResult<(String, Anchor)> {
    let Some(open) = key.find('(') else {
        return Ok((key.to_string(), Anchor::Plain));
    };
    if !key.ends_with(')') {
        return Ok((key.to_string(), Anchor::Plain));
    }
    let prefix = &key[..open];
    let inner = key[open + 1..key.len() - 1].trim().to_string();
    let anchor = match prefix {
        "" => Anchor::Conditional,
        "=" => Anchor::Equality,
        "+" => Anchor::AddIfAbsent,
        _ => {
            return Err(ConvertError::UnsupportedConstruct {
                path: path.key(key),
                construct: format!("anchor '{prefix}()'"),
            })
        }
    };
    Ok((inner, anchor))
}
