//! # Pattern → CEL Compilation
//!
//! Recursive descent over a classified [`Pattern`] tree producing a
//! [`CelExpression`]. Pure: the only state is the fresh-variable counter
//! ([`VarAlloc`]), threaded explicitly through the recursion.
//!
//! ## Compilation rules
//!
//! - map → AND of entries; non-self-guarding sub-patterns get a presence
//!   guard; `(key)` conditional anchors compile to `!present || sub`; a
//!   map whose entries are all tautologies keeps a `type(...) == map`
//!   guard so a non-map value still fails the match
//! - literal → `path == value`
//! - `?*` → `present && path != ''`
//! - `!*` / `null` → `!present`
//! - bare `*` → constant `true` (tautology preserved exactly)
//! - glob → `path.matches('^...$')`, anchored both ends
//! - prefix comparisons → OR of `path <op> operand`; glob operands become
//!   (negated) match calls
//! - array → one sub-pattern quantifies universally (`all`), several
//!   quantify existentially (`exists`) and AND together
//! - anyPattern → OR, one disjunct per member, each compiled in a fresh
//!   variable scope
//! - foreach → AND of entries, each `!has(list) || list.all(var, body)`
//!   with a fresh loop variable; per-element preconditions filter via
//!   implication
//!
//! Constructs without a CEL equivalent fail with `UnsupportedConstruct`
//! carrying the exact source path; nothing is dropped or approximated.

use kyvert_core::{ConvertError, ConvertResult, FieldPath};
use kyvert_policy::legacy::{Condition, ForeachBlock, PolicyRule, Preconditions, ValidateBlock};

use crate::cel::{glob_to_regex, BinaryOp, CelExpression, CelLiteral, CelPath, QuantifierKind};
use crate::pattern::{classify, Anchor, CompareOp, Comparison, MapEntry, Pattern, Scalar};

/// Fresh loop-variable names: `element`, `element1`, `element2`, ...
///
/// One allocator per rule body, so quantifiers never shadow each other
/// across foreach entries or nested arrays.
#[derive(Debug, Default)]
pub struct VarAlloc {
    next: usize,
}

impl VarAlloc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> String {
        let n = self.next;
        self.next += 1;
        if n == 0 {
            "element".to_string()
        } else {
            format!("element{n}")
        }
    }
}

// ---------------------------------------------------------------------------
// Rule entry points
// ---------------------------------------------------------------------------

/// Compile a rule's full body: preconditions (if any) ANDed ahead of the
/// validate block. Rejects mutation-family rules and unknown rule fields.
pub fn compile_rule(rule: &PolicyRule, rule_path: &FieldPath) -> ConvertResult<CelExpression> {
    for key in ["mutate", "generate", "verifyImages"] {
        if rule.extra.contains_key(key) {
            return Err(ConvertError::UnsupportedConstruct {
                path: rule_path.key(key),
                construct: format!("{key} rule"),
            });
        }
    }
    if let Some(key) = rule.extra.keys().next() {
        return Err(ConvertError::UnsupportedConstruct {
            path: rule_path.key(key),
            construct: format!("rule field '{key}'"),
        });
    }

    let validate = rule.validate.as_ref().ok_or_else(|| {
        ConvertError::Conversion(format!("rule '{}' has no validate block", rule.name))
    })?;

    let body = compile_validate(validate, &rule_path.key("validate"))?;
    let mut terms = Vec::new();
    if let Some(pre) = &rule.preconditions {
        terms.push(compile_preconditions(
            pre,
            &rule_path.key("preconditions"),
            None,
        )?);
    }
    terms.push(body);
    Ok(CelExpression::and(terms))
}

/// Compile a validate block's single body (pattern | anyPattern | foreach).
pub fn compile_validate(
    validate: &ValidateBlock,
    path: &FieldPath,
) -> ConvertResult<CelExpression> {
    if let Some(key) = validate.extra.keys().next() {
        return Err(ConvertError::UnsupportedConstruct {
            path: path.key(key),
            construct: format!("'{key}' validation"),
        });
    }

    let mut vars = VarAlloc::new();

    if let Some(pattern) = &validate.pattern {
        let pattern_path = path.key("pattern");
        let tree = classify(pattern, &pattern_path)?;
        return compile(&tree, &CelPath::var("object"), &pattern_path, &mut vars);
    }

    if let Some(members) = &validate.any_pattern {
        return compile_any_pattern(members, &path.key("anyPattern"));
    }

    let mut terms = Vec::with_capacity(validate.foreach.len());
    for (i, entry) in validate.foreach.iter().enumerate() {
        terms.push(compile_foreach(
            entry,
            &path.key("foreach").index(i),
            &mut vars,
        )?);
    }
    Ok(CelExpression::and(terms))
}

/// Compile an anyPattern list to an OR, one disjunct per member.
///
/// Each member compiles in a fresh variable scope, so every disjunct is
/// structurally identical to the member's independent compilation.
fn compile_any_pattern(
    members: &[serde_yaml::Value],
    path: &FieldPath,
) -> ConvertResult<CelExpression> {
    let mut disjuncts = Vec::with_capacity(members.len());
    for (i, member) in members.iter().enumerate() {
        let member_path = path.index(i);
        let tree = classify(member, &member_path)?;
        let mut vars = VarAlloc::new();
        disjuncts.push(compile(
            &tree,
            &CelPath::var("object"),
            &member_path,
            &mut vars,
        )?);
    }
    Ok(CelExpression::or(disjuncts))
}

/// Compile one foreach entry to `!has(list) || list.all(var, body)`.
pub fn compile_foreach(
    entry: &ForeachBlock,
    path: &FieldPath,
    vars: &mut VarAlloc,
) -> ConvertResult<CelExpression> {
    if let Some(key) = entry.extra.keys().next() {
        return Err(ConvertError::UnsupportedConstruct {
            path: path.key(key),
            construct: format!("foreach field '{key}'"),
        });
    }

    let list = entry.list.as_deref().unwrap_or_default();
    let collection = list_path(list, &path.key("list"))?;

    let var = vars.fresh();
    let element = CelPath::var(var.clone());

    let mut body = if let Some(pattern) = &entry.pattern {
        let pattern_path = path.key("pattern");
        let tree = classify(pattern, &pattern_path)?;
        compile(&tree, &element, &pattern_path, vars)?
    } else if let Some(members) = &entry.any_pattern {
        // Loop-variable allocation stays shared here so nested quantifiers
        // cannot shadow the entry's own variable.
        let any_path = path.key("anyPattern");
        let mut disjuncts = Vec::with_capacity(members.len());
        for (i, member) in members.iter().enumerate() {
            let member_path = any_path.index(i);
            let tree = classify(member, &member_path)?;
            disjuncts.push(compile(&tree, &element, &member_path, vars)?);
        }
        CelExpression::or(disjuncts)
    } else {
        return Err(ConvertError::Conversion(format!(
            "foreach entry at {path} has no body"
        )));
    };

    if let Some(pre) = &entry.preconditions {
        let filter = compile_preconditions(pre, &path.key("preconditions"), Some(&var))?;
        body = CelExpression::Or(vec![CelExpression::not(filter), body]);
    }

    let quantifier = CelExpression::Quantifier {
        kind: QuantifierKind::All,
        var,
        collection: Box::new(CelExpression::FieldAccess(collection.clone())),
        predicate: Box::new(body),
    };
    Ok(CelExpression::Or(vec![
        CelExpression::not(collection.presence()),
        quantifier,
    ]))
}

/// Resolve a foreach `list` field path to a CEL path rooted at `object`.
///
/// Only plain dotted paths convert; JMESPath expressions (functions,
/// `{{...}}` substitutions, index filters) have no static CEL equivalent.
fn list_path(list: &str, path: &FieldPath) -> ConvertResult<CelPath> {
    if list.contains("{{") || list.contains('(') || list.contains('[') {
        return Err(ConvertError::UnsupportedConstruct {
            path: path.clone(),
            construct: format!("JMESPath expression '{list}'"),
        });
    }
    let segments: Vec<&str> = list.split('.').map(str::trim).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ConvertError::UnsupportedConstruct {
            path: path.clone(),
            construct: format!("malformed list path '{list}'"),
        });
    }
    let rest: &[&str] = match segments.as_slice() {
        ["request", "object", rest @ ..] => rest,
        ["object", rest @ ..] => rest,
        rest => rest,
    };
    let mut cel = CelPath::var("object");
    for seg in rest {
        cel = cel.field(seg);
    }
    if cel.is_var() {
        return Err(ConvertError::UnsupportedConstruct {
            path: path.clone(),
            construct: format!("foreach list '{list}' does not name a field"),
        });
    }
    Ok(cel)
}

// ---------------------------------------------------------------------------
// Pattern recursion
// ---------------------------------------------------------------------------

/// Compile a classified pattern applied at `loc`.
pub fn compile(
    pattern: &Pattern,
    loc: &CelPath,
    path: &FieldPath,
    vars: &mut VarAlloc,
) -> ConvertResult<CelExpression> {
    match pattern {
        Pattern::Map(entries) => compile_map(entries, loc, path, vars),
        Pattern::Array(subs) => compile_array(subs, loc, path, vars),
        Pattern::Literal(scalar) => Ok(CelExpression::Binary {
            op: BinaryOp::Eq,
            lhs: Box::new(CelExpression::FieldAccess(loc.clone())),
            rhs: Box::new(CelExpression::Literal(scalar_literal(scalar))),
        }),
        Pattern::WildcardExists => Ok(CelExpression::and(vec![
            loc.presence(),
            CelExpression::Binary {
                op: BinaryOp::Ne,
                lhs: Box::new(CelExpression::FieldAccess(loc.clone())),
                rhs: Box::new(CelExpression::Literal(CelLiteral::Str(String::new()))),
            },
        ])),
        Pattern::WildcardAbsent | Pattern::Absent => Ok(CelExpression::not(loc.presence())),
        Pattern::Wildcard(glob) if glob == "*" => Ok(CelExpression::bool_lit(true)),
        Pattern::Wildcard(glob) => Ok(CelExpression::matches(
            CelExpression::FieldAccess(loc.clone()),
            glob_to_regex(glob),
        )),
        Pattern::Conditions(alternatives) => Ok(compile_conditions(alternatives, loc)),
    }
}

fn compile_map(
    entries: &[MapEntry],
    loc: &CelPath,
    path: &FieldPath,
    vars: &mut VarAlloc,
) -> ConvertResult<CelExpression> {
    let mut terms = Vec::with_capacity(entries.len() + 1);
    if !entries.iter().any(entry_constrains_target) {
        // Every entry evaluates true on any value, but a map pattern still
        // requires a map; assert the shape explicitly.
        terms.push(CelExpression::is_map(CelExpression::FieldAccess(
            loc.clone(),
        )));
    }
    for entry in entries {
        let child_loc = loc.field(&entry.key);
        let child_path = path.key(&entry.key);
        let sub = compile(&entry.pattern, &child_loc, &child_path, vars)?;
        let term = match entry.anchor {
            Anchor::Conditional => {
                CelExpression::Or(vec![CelExpression::not(child_loc.presence()), sub])
            }
            Anchor::Plain | Anchor::Equality | Anchor::AddIfAbsent => {
                if entry.pattern.is_self_guarding() {
                    sub
                } else {
                    CelExpression::and(vec![child_loc.presence(), sub])
                }
            }
        };
        if term != CelExpression::bool_lit(true) {
            terms.push(term);
        }
    }
    Ok(CelExpression::and(terms))
}

/// Whether the entry's compiled conjunct can fail when the target value is
/// not a map. Tautology entries (`key: "*"`, or a conditional anchor over
/// a pattern that compiles to constant `true`) cannot, so they do not
/// anchor the map shape on their own.
fn entry_constrains_target(entry: &MapEntry) -> bool {
    match entry.anchor {
        Anchor::Conditional => !compiles_to_true(&entry.pattern),
        Anchor::Plain | Anchor::Equality | Anchor::AddIfAbsent => {
            !matches!(&entry.pattern, Pattern::Wildcard(glob) if glob == "*")
        }
    }
}

/// Patterns whose compilation is the constant `true`.
fn compiles_to_true(pattern: &Pattern) -> bool {
    match pattern {
        Pattern::Wildcard(glob) => glob == "*",
        Pattern::Array(subs) => subs.is_empty(),
        _ => false,
    }
}

fn compile_array(
    subs: &[Pattern],
    loc: &CelPath,
    path: &FieldPath,
    vars: &mut VarAlloc,
) -> ConvertResult<CelExpression> {
    let collection = CelExpression::FieldAccess(loc.clone());
    match subs {
        [] => Ok(CelExpression::bool_lit(true)),
        [sub] => {
            let var = vars.fresh();
            let predicate = compile(sub, &CelPath::var(var.clone()), &path.index(0), vars)?;
            Ok(CelExpression::Quantifier {
                kind: QuantifierKind::All,
                var,
                collection: Box::new(collection),
                predicate: Box::new(predicate),
            })
        }
        many => {
            let mut terms = Vec::with_capacity(many.len());
            for (i, sub) in many.iter().enumerate() {
                let var = vars.fresh();
                let predicate = compile(sub, &CelPath::var(var.clone()), &path.index(i), vars)?;
                terms.push(CelExpression::Quantifier {
                    kind: QuantifierKind::Exists,
                    var,
                    collection: Box::new(collection.clone()),
                    predicate: Box::new(predicate),
                });
            }
            Ok(CelExpression::and(terms))
        }
    }
}

fn compile_conditions(alternatives: &[Comparison], loc: &CelPath) -> CelExpression {
    let field = CelExpression::FieldAccess(loc.clone());
    let terms = alternatives
        .iter()
        .map(|alt| compile_comparison(alt, &field))
        .collect();
    CelExpression::or(terms)
}

fn compile_comparison(alt: &Comparison, field: &CelExpression) -> CelExpression {
    if let Scalar::Str(s) = &alt.value {
        if s.contains('*') || s.contains('?') {
            let matched = CelExpression::matches(field.clone(), glob_to_regex(s));
            return match alt.op {
                CompareOp::Ne => CelExpression::not(matched),
                _ => matched,
            };
        }
    }
    CelExpression::Binary {
        op: binary_op(alt.op),
        lhs: Box::new(field.clone()),
        rhs: Box::new(CelExpression::Literal(scalar_literal(&alt.value))),
    }
}

fn binary_op(op: CompareOp) -> BinaryOp {
    match op {
        CompareOp::Eq => BinaryOp::Eq,
        CompareOp::Ne => BinaryOp::Ne,
        CompareOp::Lt => BinaryOp::Lt,
        CompareOp::Le => BinaryOp::Le,
        CompareOp::Gt => BinaryOp::Gt,
        CompareOp::Ge => BinaryOp::Ge,
    }
}

fn scalar_literal(scalar: &Scalar) -> CelLiteral {
    match scalar {
        Scalar::Bool(b) => CelLiteral::Bool(*b),
        Scalar::Int(i) => CelLiteral::Int(*i),
        Scalar::Float(f) => CelLiteral::Float(*f),
        Scalar::Str(s) => CelLiteral::Str(s.clone()),
    }
}

// ---------------------------------------------------------------------------
// Preconditions
// ---------------------------------------------------------------------------

/// Compile a precondition block. `element_var` carries the loop variable
/// when compiling inside a foreach entry; `{{ element.* }}` keys resolve
/// against it.
pub fn compile_preconditions(
    pre: &Preconditions,
    path: &FieldPath,
    element_var: Option<&str>,
) -> ConvertResult<CelExpression> {
    match pre {
        Preconditions::Flat(conds) => {
            let mut terms = Vec::with_capacity(conds.len());
            for (i, cond) in conds.iter().enumerate() {
                terms.push(compile_condition(cond, &path.index(i), element_var)?);
            }
            Ok(CelExpression::and(terms))
        }
        Preconditions::Grouped { any, all } => {
            let mut terms = Vec::new();
            for (i, cond) in all.iter().enumerate() {
                terms.push(compile_condition(cond, &path.key("all").index(i), element_var)?);
            }
            if !any.is_empty() {
                let mut alts = Vec::with_capacity(any.len());
                for (i, cond) in any.iter().enumerate() {
                    alts.push(compile_condition(cond, &path.key("any").index(i), element_var)?);
                }
                terms.push(CelExpression::or(alts));
            }
            Ok(CelExpression::and(terms))
        }
    }
}

fn compile_condition(
    cond: &Condition,
    path: &FieldPath,
    element_var: Option<&str>,
) -> ConvertResult<CelExpression> {
    let lhs = CelExpression::FieldAccess(condition_key_path(&cond.key, path, element_var)?);
    let rhs = condition_value(&cond.value, path)?;

    let expr = match cond.operator.as_str() {
        "Equals" => binary(BinaryOp::Eq, lhs, rhs),
        "NotEquals" => binary(BinaryOp::Ne, lhs, rhs),
        "GreaterThan" => binary(BinaryOp::Gt, lhs, rhs),
        "GreaterThanOrEquals" => binary(BinaryOp::Ge, lhs, rhs),
        "LessThan" => binary(BinaryOp::Lt, lhs, rhs),
        "LessThanOrEquals" => binary(BinaryOp::Le, lhs, rhs),
        "In" => binary(BinaryOp::In, lhs, rhs),
        "NotIn" => CelExpression::not(binary(BinaryOp::In, lhs, rhs)),
        other => {
            return Err(ConvertError::UnsupportedConstruct {
                path: path.key("operator"),
                construct: format!("precondition operator '{other}'"),
            })
        }
    };
    Ok(expr)
}

fn binary(op: BinaryOp, lhs: CelExpression, rhs: CelExpression) -> CelExpression {
    CelExpression::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

/// Resolve a `{{ ... }}` precondition key to a CEL path. Only plain field
/// paths rooted at `request`, `request.object`, `object`, or (inside a
/// foreach) `element` convert.
fn condition_key_path(
    key: &str,
    path: &FieldPath,
    element_var: Option<&str>,
) -> ConvertResult<CelPath> {
    let trimmed = key.trim();
    let inner = trimmed
        .strip_prefix("{{")
        .and_then(|s| s.strip_suffix("}}"))
        .map(str::trim)
        .unwrap_or(trimmed);

    let unsupported = |construct: String| ConvertError::UnsupportedConstruct {
        path: path.key("key"),
        construct,
    };

    if inner.contains("{{") || inner.contains('(') || inner.contains('[') {
        return Err(unsupported(format!("JMESPath expression '{inner}'")));
    }

    let segments: Vec<&str> = inner.split('.').map(str::trim).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(unsupported(format!("malformed precondition key '{inner}'")));
    }

    let (base, rest): (String, &[&str]) = match segments.as_slice() {
        ["request", "object", rest @ ..] => ("object".to_string(), rest),
        ["object", rest @ ..] => ("object".to_string(), rest),
        ["request", rest @ ..] => ("request".to_string(), rest),
        ["element", rest @ ..] => match element_var {
            Some(var) => (var.to_string(), rest),
            None => {
                return Err(unsupported(
                    "element reference outside a foreach entry".to_string(),
                ))
            }
        },
        _ => return Err(unsupported(format!("precondition key '{inner}'"))),
    };

    let mut cel = CelPath::var(base);
    for seg in rest {
        cel = cel.field(seg);
    }
    Ok(cel)
}

fn condition_value(
    value: &serde_yaml::Value,
    path: &FieldPath,
) -> ConvertResult<CelExpression> {
    let unsupported = |construct: String| ConvertError::UnsupportedConstruct {
        path: path.key("value"),
        construct,
    };
    match value {
        serde_yaml::Value::Null => Ok(CelExpression::Literal(CelLiteral::Null)),
        serde_yaml::Value::Bool(b) => Ok(CelExpression::Literal(CelLiteral::Bool(*b))),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(CelExpression::Literal(CelLiteral::Int(i)));
            }
            match n.as_f64() {
                Some(f) if f.is_finite() => Ok(CelExpression::Literal(CelLiteral::Float(f))),
                _ => Err(unsupported(format!("non-finite numeric value '{n}'"))),
            }
        }
        serde_yaml::Value::String(s) => {
            if s.contains("{{") {
                return Err(unsupported(format!("JMESPath substitution '{s}'")));
            }
            Ok(CelExpression::Literal(CelLiteral::Str(s.clone())))
        }
        serde_yaml::Value::Sequence(seq) => {
            let mut items = Vec::with_capacity(seq.len());
            for item in seq {
                items.push(condition_value(item, path)?);
            }
            Ok(CelExpression::List(items))
        }
        serde_yaml::Value::Mapping(_) | serde_yaml::Value::Tagged(_) => {
            Err(unsupported("structured precondition value".to_string()))
        }
    }
}
