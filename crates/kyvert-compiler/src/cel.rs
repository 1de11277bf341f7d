//! # CEL Expression Tree
//!
//! The compiled output model: an immutable boolean expression tree rendered
//! to CEL source text by [`CelExpression::render`]. Rendering is
//! deterministic — the same tree always produces the same text — with
//! parenthesization driven by operator precedence.
//!
//! [`CelPath`] models a field access chain rooted at a variable (`object`
//! or a quantifier loop variable). Segments that are not valid CEL
//! identifiers (label keys like `app.kubernetes.io/name`) render as quoted
//! index accesses, and their presence checks use `in` on the parent map
//! instead of `has()`.

// ---------------------------------------------------------------------------
// Field paths
// ---------------------------------------------------------------------------

/// One step of a field access chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSeg {
    /// `.name` select; the segment is a valid CEL identifier.
    Ident(String),
    /// `['key']` index; the segment needs quoting.
    Key(String),
}

/// A variable-rooted field access chain (`object.spec.containers`,
/// `element.image`, `object.metadata.labels['app.kubernetes.io/name']`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CelPath {
    base: String,
    segments: Vec<PathSeg>,
}

impl CelPath {
    /// A bare variable reference.
    pub fn var(base: impl Into<String>) -> Self {
        Self { base: base.into(), segments: Vec::new() }
    }

    /// Extend the chain by one field, choosing select vs index form by
    /// whether the name is a CEL identifier.
    pub fn field(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        if is_cel_ident(name) {
            segments.push(PathSeg::Ident(name.to_string()));
        } else {
            segments.push(PathSeg::Key(name.to_string()));
        }
        Self { base: self.base.clone(), segments }
    }

    /// Whether the chain is a bare variable with no selects.
    pub fn is_var(&self) -> bool {
        self.segments.is_empty()
    }

    /// The root variable name.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The select/index segments after the root variable.
    pub fn segments(&self) -> &[PathSeg] {
        &self.segments
    }

    /// The parent chain, if any segment exists.
    fn parent(&self) -> Option<CelPath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            base: self.base.clone(),
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// A presence check for the field this chain names.
    ///
    /// `has(a.b.c)` for identifier leaves, `'key' in a.b` for quoted
    /// leaves, constant `true` for a bare variable (variables are always
    /// bound).
    pub fn presence(&self) -> CelExpression {
        let Some(parent) = self.parent() else {
            return CelExpression::Literal(CelLiteral::Bool(true));
        };
        match self.segments.last() {
            Some(PathSeg::Ident(_)) => CelExpression::Call {
                receiver: None,
                function: "has".to_string(),
                args: vec![CelExpression::FieldAccess(self.clone())],
            },
            Some(PathSeg::Key(key)) => CelExpression::Binary {
                op: BinaryOp::In,
                lhs: Box::new(CelExpression::Literal(CelLiteral::Str(key.clone()))),
                rhs: Box::new(CelExpression::FieldAccess(parent)),
            },
            None => unreachable!("parent() returned Some for empty segments"),
        }
    }

    fn render_into(&self, out: &mut String) {
        out.push_str(&self.base);
        for seg in &self.segments {
            match seg {
                PathSeg::Ident(name) => {
                    out.push('.');
                    out.push_str(name);
                }
                PathSeg::Key(key) => {
                    out.push('[');
                    render_str_literal(key, out);
                    out.push(']');
                }
            }
        }
    }
}

fn is_cel_ident(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// CEL literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum CelLiteral {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Binary operators the compiler emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
        }
    }
}

/// Quantifier kind over a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantifierKind {
    All,
    Exists,
}

impl QuantifierKind {
    fn method(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Exists => "exists",
        }
    }
}

/// The compiled expression tree. Never mutated after compilation, only
/// composed.
#[derive(Debug, Clone, PartialEq)]
pub enum CelExpression {
    Literal(CelLiteral),
    FieldAccess(CelPath),
    List(Vec<CelExpression>),
    Binary {
        op: BinaryOp,
        lhs: Box<CelExpression>,
        rhs: Box<CelExpression>,
    },
    Not(Box<CelExpression>),
    And(Vec<CelExpression>),
    Or(Vec<CelExpression>),
    Quantifier {
        kind: QuantifierKind,
        var: String,
        collection: Box<CelExpression>,
        predicate: Box<CelExpression>,
    },
    /// Structural check that a value is a map: `type(x) == map`.
    IsMap(Box<CelExpression>),
    Call {
        receiver: Option<Box<CelExpression>>,
        function: String,
        args: Vec<CelExpression>,
    },
}

impl CelExpression {
    /// Constant boolean.
    pub fn bool_lit(b: bool) -> Self {
        Self::Literal(CelLiteral::Bool(b))
    }

    /// Conjunction. Nested `And`s flatten; zero terms is `true`, one term
    /// is the term itself.
    pub fn and(terms: Vec<CelExpression>) -> Self {
        let mut flat = Vec::with_capacity(terms.len());
        for term in terms {
            match term {
                Self::And(children) => flat.extend(children),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Self::bool_lit(true),
            1 => flat.into_iter().next().unwrap_or_else(|| Self::bool_lit(true)),
            _ => Self::And(flat),
        }
    }

    /// Disjunction. Disjunct count and order are preserved (no
    /// flattening); zero terms is `false`, one term is the term itself.
    pub fn or(terms: Vec<CelExpression>) -> Self {
        match terms.len() {
            0 => Self::bool_lit(false),
            1 => terms.into_iter().next().unwrap_or_else(|| Self::bool_lit(false)),
            _ => Self::Or(terms),
        }
    }

    /// Logical negation.
    pub fn not(expr: CelExpression) -> Self {
        Self::Not(Box::new(expr))
    }

    /// `type(expr) == map`.
    pub fn is_map(expr: CelExpression) -> Self {
        Self::IsMap(Box::new(expr))
    }

    /// `receiver.matches('regex')`.
    pub fn matches(receiver: CelExpression, regex: String) -> Self {
        Self::Call {
            receiver: Some(Box::new(receiver)),
            function: "matches".to_string(),
            args: vec![Self::Literal(CelLiteral::Str(regex))],
        }
    }

    /// Render the tree to CEL source text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        match self {
            Self::Literal(lit) => render_literal(lit, out),
            Self::FieldAccess(path) => path.render_into(out),
            Self::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.render_into(out);
                }
                out.push(']');
            }
            Self::Binary { op, lhs, rhs } => {
                lhs.render_operand(out);
                out.push(' ');
                out.push_str(op.symbol());
                out.push(' ');
                rhs.render_operand(out);
            }
            Self::Not(inner) => {
                out.push('!');
                if inner.is_atom() {
                    inner.render_into(out);
                } else {
                    out.push('(');
                    inner.render_into(out);
                    out.push(')');
                }
            }
            Self::And(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" && ");
                    }
                    if matches!(term, Self::Or(_)) {
                        out.push('(');
                        term.render_into(out);
                        out.push(')');
                    } else {
                        term.render_into(out);
                    }
                }
            }
            Self::Or(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" || ");
                    }
                    if matches!(term, Self::And(_) | Self::Or(_)) {
                        out.push('(');
                        term.render_into(out);
                        out.push(')');
                    } else {
                        term.render_into(out);
                    }
                }
            }
            Self::Quantifier { kind, var, collection, predicate } => {
                collection.render_into(out);
                out.push('.');
                out.push_str(kind.method());
                out.push('(');
                out.push_str(var);
                out.push_str(", ");
                predicate.render_into(out);
                out.push(')');
            }
            Self::IsMap(inner) => {
                out.push_str("type(");
                inner.render_into(out);
                out.push_str(") == map");
            }
            Self::Call { receiver, function, args } => {
                if let Some(receiver) = receiver {
                    receiver.render_into(out);
                    out.push('.');
                }
                out.push_str(function);
                out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    arg.render_into(out);
                }
                out.push(')');
            }
        }
    }

    /// Render a binary operand, parenthesizing anything that binds looser
    /// than a comparison.
    fn render_operand(&self, out: &mut String) {
        if matches!(self, Self::And(_) | Self::Or(_) | Self::Binary { .. } | Self::IsMap(_)) {
            out.push('(');
            self.render_into(out);
            out.push(')');
        } else {
            self.render_into(out);
        }
    }

    /// Whether `!` can prefix this node without parentheses.
    fn is_atom(&self) -> bool {
        matches!(
            self,
            Self::Literal(_) | Self::FieldAccess(_) | Self::Call { .. } | Self::Quantifier { .. }
        )
    }
}

fn render_literal(lit: &CelLiteral, out: &mut String) {
    match lit {
        CelLiteral::Null => out.push_str("null"),
        CelLiteral::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        CelLiteral::Int(i) => out.push_str(&i.to_string()),
        CelLiteral::Float(f) => {
            let text = f.to_string();
            out.push_str(&text);
            // CEL requires a decimal point to lex a float.
            if !text.contains('.') && !text.contains('e') && !text.contains("inf") {
                out.push_str(".0");
            }
        }
        CelLiteral::Str(s) => render_str_literal(s, out),
    }
}

/// Single-quoted CEL string literal with minimal escaping.
fn render_str_literal(s: &str, out: &mut String) {
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('\'');
}

// ---------------------------------------------------------------------------
// Glob translation
// ---------------------------------------------------------------------------

/// Translate a legacy glob (`?` = one char, `*` = any run) into an
/// anchored regex for CEL's `matches()`.
pub fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 4);
    out.push('^');
    for c in glob.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out.push('$');
    out
}
