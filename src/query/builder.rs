use std::fmt;

use regex::Regex;

use super::catalog::{self, FieldDescriptor, FieldKind};
use super::QueryError;
use crate::record::Tag;

/// Binary comparison operators understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

impl Operator {
    /// Every operator, in declaration order.
    pub const ALL: [Operator; 6] = [
        Operator::Gt,
        Operator::Lt,
        Operator::Ge,
        Operator::Le,
        Operator::Eq,
        Operator::Ne,
    ];

    /// Operator token as written in expressions.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// How sibling conditions inside a scope are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Join {
    /// Every condition must hold.
    And,
    /// At least one condition must hold.
    Or,
}

impl Join {
    fn separator(self) -> &'static str {
        match self {
            Join::And => " and ",
            Join::Or => " or ",
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    /// Integer operand.
    Integer(i64),
    /// String operand, quoted on emission.
    String(String),
}

impl Literal {
    fn describe(&self) -> &'static str {
        match self {
            Literal::Integer(_) => "integer",
            Literal::String(_) => "string",
        }
    }

    fn render(&self) -> String {
        match self {
            Literal::Integer(value) => value.to_string(),
            Literal::String(value) => quote(value),
        }
    }
}

macro_rules! integer_literal {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Literal {
                fn from(value: $ty) -> Self {
                    Literal::Integer(i64::from(value))
                }
            }
        )*
    };
}

integer_literal!(i8, u8, i16, u16, i32, u32, i64);

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}

/// Single-quote a string literal, backslash-escaping embedded quotes.
pub(crate) fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "\\'"))
}

/// Render a regex as an engine regex literal (`/.../`).
fn regex_literal(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 2);
    out.push('/');
    let mut escaped = false;
    for c in pattern.chars() {
        if c == '/' && !escaped {
            out.push('\\');
        }
        escaped = c == '\\' && !escaped;
        out.push(c);
    }
    out.push('/');
    out
}

fn validate_pattern(subject: &str, pattern: &str) -> Result<(), QueryError> {
    Regex::new(pattern)
        .map(|_| ())
        .map_err(|err| QueryError::TypeMismatch {
            field: subject.to_string(),
            expected: "regular expression".to_string(),
            found: format!("invalid pattern ({err})"),
        })
}

/// Accumulates the conditions of one nesting level.
///
/// A fresh `Query` is handed to every predicate closure; conditions added
/// through its accessors are validated and rendered immediately.
#[derive(Debug, Default)]
pub struct Query {
    subexpressions: Vec<String>,
}

impl Query {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Accessor for a field looked up by name.
    pub fn field(&mut self, name: &str) -> Result<FieldRef<'_>, QueryError> {
        let field = catalog::lookup(name).ok_or_else(|| QueryError::UnknownField(name.to_string()))?;
        Ok(self.with_field(*field))
    }

    fn with_field(&mut self, field: FieldDescriptor) -> FieldRef<'_> {
        FieldRef { query: self, field }
    }

    /// `ref_id`
    pub fn ref_id(&mut self) -> FieldRef<'_> {
        self.with_field(catalog::REF_ID)
    }

    /// `mate_ref_id`
    pub fn mate_ref_id(&mut self) -> FieldRef<'_> {
        self.with_field(catalog::MATE_REF_ID)
    }

    /// `position`, compared with 1-based literals.
    pub fn position(&mut self) -> FieldRef<'_> {
        self.with_field(catalog::POSITION)
    }

    /// `mate_position`, compared with 1-based literals.
    pub fn mate_position(&mut self) -> FieldRef<'_> {
        self.with_field(catalog::MATE_POSITION)
    }

    /// `mapping_quality`
    pub fn mapping_quality(&mut self) -> FieldRef<'_> {
        self.with_field(catalog::MAPPING_QUALITY)
    }

    /// `sequence_length`
    pub fn sequence_length(&mut self) -> FieldRef<'_> {
        self.with_field(catalog::SEQUENCE_LENGTH)
    }

    /// `template_length`
    pub fn template_length(&mut self) -> FieldRef<'_> {
        self.with_field(catalog::TEMPLATE_LENGTH)
    }

    /// `read_name`
    pub fn read_name(&mut self) -> FieldRef<'_> {
        self.with_field(catalog::READ_NAME)
    }

    /// `sequence`
    pub fn sequence(&mut self) -> FieldRef<'_> {
        self.with_field(catalog::SEQUENCE)
    }

    /// `cigar`
    pub fn cigar(&mut self) -> FieldRef<'_> {
        self.with_field(catalog::CIGAR)
    }

    /// Require the named flag bit to be set.
    pub fn flag_is_set(&mut self, name: &str) -> Result<(), QueryError> {
        self.field(name)?.is_set()
    }

    /// Require the named flag bit to be clear.
    pub fn flag_is_unset(&mut self, name: &str) -> Result<(), QueryError> {
        self.field(name)?.is_unset()
    }

    /// Accessor for the auxiliary tag `code`.
    pub fn tag(&mut self, code: &str) -> Result<TagRef<'_>, QueryError> {
        let tag: Tag = code
            .parse()
            .map_err(|_| QueryError::InvalidTag(code.to_string()))?;
        Ok(TagRef {
            query: self,
            name: format!("[{tag}]"),
        })
    }

    /// Evaluate `block` in a nested scope and append its conditions joined by `join`.
    pub fn scope<F>(&mut self, join: Join, block: F) -> Result<(), QueryError>
    where
        F: FnOnce(&mut Query) -> Result<(), QueryError>,
    {
        let child = Self::nested(block)?;
        self.push(child.joined(join));
        Ok(())
    }

    /// Conditions inside `block` are combined with `or`.
    pub fn union<F>(&mut self, block: F) -> Result<(), QueryError>
    where
        F: FnOnce(&mut Query) -> Result<(), QueryError>,
    {
        self.scope(Join::Or, block)
    }

    /// Conditions inside `block` are combined with `and`.
    pub fn intersection<F>(&mut self, block: F) -> Result<(), QueryError>
    where
        F: FnOnce(&mut Query) -> Result<(), QueryError>,
    {
        self.scope(Join::And, block)
    }

    /// Conjunction of the conditions inside `block`, negated.
    pub fn negate<F>(&mut self, block: F) -> Result<(), QueryError>
    where
        F: FnOnce(&mut Query) -> Result<(), QueryError>,
    {
        let child = Self::nested(block)?;
        self.push(format!("not ({})", child.joined(Join::And)));
        Ok(())
    }

    /// Append a hand-written engine expression verbatim.
    pub fn raw(&mut self, expression: impl Into<String>) {
        self.push(expression.into());
    }

    /// Number of conditions at this level.
    pub fn len(&self) -> usize {
        self.subexpressions.len()
    }

    /// True if no condition has been added.
    pub fn is_empty(&self) -> bool {
        self.subexpressions.is_empty()
    }

    /// All top-level conditions joined with `and`.
    pub fn finalize(&self) -> String {
        self.joined(Join::And)
    }

    fn nested<F>(block: F) -> Result<Query, QueryError>
    where
        F: FnOnce(&mut Query) -> Result<(), QueryError>,
    {
        let mut child = Query::new();
        block(&mut child)?;
        if child.is_empty() {
            return Err(QueryError::EmptyScope);
        }
        Ok(child)
    }

    // A lone condition is emitted bare; siblings are each parenthesised.
    fn joined(&self, join: Join) -> String {
        match self.subexpressions.as_slice() {
            [single] => single.clone(),
            parts => parts
                .iter()
                .map(|part| format!("({part})"))
                .collect::<Vec<_>>()
                .join(join.separator()),
        }
    }

    fn push(&mut self, subexpression: String) {
        self.subexpressions.push(subexpression);
    }
}

/// Accessor for one catalog field inside a [`Query`].
#[derive(Debug)]
pub struct FieldRef<'a> {
    query: &'a mut Query,
    field: FieldDescriptor,
}

impl FieldRef<'_> {
    fn mismatch(&self, found: &str) -> QueryError {
        QueryError::TypeMismatch {
            field: self.field.name.to_string(),
            expected: self.field.kind.describe().to_string(),
            found: found.to_string(),
        }
    }

    /// Append `field <op> literal`.
    pub fn compare(self, op: Operator, literal: impl Into<Literal>) -> Result<(), QueryError> {
        let rendered = match (self.field.kind, literal.into()) {
            (FieldKind::Integer, Literal::Integer(value)) => {
                let value = if self.field.coordinate_shift {
                    value.saturating_sub(1)
                } else {
                    value
                };
                value.to_string()
            }
            (FieldKind::String, literal @ Literal::String(_)) => literal.render(),
            (_, literal) => return Err(self.mismatch(literal.describe())),
        };
        let expr = format!("{} {} {}", self.field.name, op, rendered);
        self.query.push(expr);
        Ok(())
    }

    /// `field > literal`
    pub fn gt(self, literal: impl Into<Literal>) -> Result<(), QueryError> {
        self.compare(Operator::Gt, literal)
    }

    /// `field < literal`
    pub fn lt(self, literal: impl Into<Literal>) -> Result<(), QueryError> {
        self.compare(Operator::Lt, literal)
    }

    /// `field >= literal`
    pub fn ge(self, literal: impl Into<Literal>) -> Result<(), QueryError> {
        self.compare(Operator::Ge, literal)
    }

    /// `field <= literal`
    pub fn le(self, literal: impl Into<Literal>) -> Result<(), QueryError> {
        self.compare(Operator::Le, literal)
    }

    /// `field == literal`
    pub fn eq(self, literal: impl Into<Literal>) -> Result<(), QueryError> {
        self.compare(Operator::Eq, literal)
    }

    /// `field != literal`
    pub fn ne(self, literal: impl Into<Literal>) -> Result<(), QueryError> {
        self.compare(Operator::Ne, literal)
    }

    /// `field =~ /pattern/`; string fields only.
    ///
    /// Patterns are checked with the `regex` crate before emission, so
    /// constructs it lacks (look-around, backreferences) are rejected as
    /// [`QueryError::TypeMismatch`] even where the engine would accept them.
    pub fn matches(self, pattern: &str) -> Result<(), QueryError> {
        if self.field.kind != FieldKind::String {
            return Err(self.mismatch("regular expression"));
        }
        validate_pattern(self.field.name, pattern)?;
        let expr = format!("{} =~ {}", self.field.name, regex_literal(pattern));
        self.query.push(expr);
        Ok(())
    }

    /// Flag bit is set.
    pub fn is_set(self) -> Result<(), QueryError> {
        if self.field.kind != FieldKind::FlagBit {
            return Err(self.mismatch("flag test"));
        }
        self.query.push(self.field.name.to_string());
        Ok(())
    }

    /// Flag bit is clear.
    pub fn is_unset(self) -> Result<(), QueryError> {
        if self.field.kind != FieldKind::FlagBit {
            return Err(self.mismatch("flag test"));
        }
        self.query.push(format!("not {}", self.field.name));
        Ok(())
    }

    /// Field holds the engine's "unknown" value.
    pub fn is_unknown(self) -> Result<(), QueryError> {
        let default = self
            .field
            .default
            .ok_or_else(|| QueryError::NoDefault(self.field.name.to_string()))?;
        self.query.push(format!("{} == {}", self.field.name, default));
        Ok(())
    }
}

/// Accessor for an auxiliary tag inside a [`Query`].
///
/// Tags are untyped, so both integer and string literals are accepted.
#[derive(Debug)]
pub struct TagRef<'a> {
    query: &'a mut Query,
    name: String,
}

impl TagRef<'_> {
    /// Append `[XX] <op> literal`.
    pub fn compare(self, op: Operator, literal: impl Into<Literal>) -> Result<(), QueryError> {
        let expr = format!("{} {} {}", self.name, op, literal.into().render());
        self.query.push(expr);
        Ok(())
    }

    /// `[XX] > literal`
    pub fn gt(self, literal: impl Into<Literal>) -> Result<(), QueryError> {
        self.compare(Operator::Gt, literal)
    }

    /// `[XX] < literal`
    pub fn lt(self, literal: impl Into<Literal>) -> Result<(), QueryError> {
        self.compare(Operator::Lt, literal)
    }

    /// `[XX] >= literal`
    pub fn ge(self, literal: impl Into<Literal>) -> Result<(), QueryError> {
        self.compare(Operator::Ge, literal)
    }

    /// `[XX] <= literal`
    pub fn le(self, literal: impl Into<Literal>) -> Result<(), QueryError> {
        self.compare(Operator::Le, literal)
    }

    /// `[XX] == literal`
    pub fn eq(self, literal: impl Into<Literal>) -> Result<(), QueryError> {
        self.compare(Operator::Eq, literal)
    }

    /// `[XX] != literal`
    pub fn ne(self, literal: impl Into<Literal>) -> Result<(), QueryError> {
        self.compare(Operator::Ne, literal)
    }

    /// `[XX] =~ /pattern/`
    ///
    /// Same pattern dialect restriction as [`FieldRef::matches`].
    pub fn matches(self, pattern: &str) -> Result<(), QueryError> {
        validate_pattern(&self.name, pattern)?;
        let expr = format!("{} =~ {}", self.name, regex_literal(pattern));
        self.query.push(expr);
        Ok(())
    }

    /// Tag is present on the record.
    pub fn exists(self) -> Result<(), QueryError> {
        self.query.push(format!("{} != null", self.name));
        Ok(())
    }

    /// Tag is absent from the record.
    pub fn is_absent(self) -> Result<(), QueryError> {
        self.query.push(format!("{} == null", self.name));
        Ok(())
    }
}
