//! Filter-expression compiler.
//!
//! Predicates are ordinary closures that receive a fresh [`Query`] and add
//! conditions through typed accessors. Every condition is validated and
//! rendered as it is added, so compilation is a single pass that yields the
//! text passed to the engine's `-F` flag.
//!
//! ```
//! use sambamba_stream::query::compile;
//!
//! let filter = compile(|q| {
//!     q.mapping_quality().ge(30)?;
//!     q.flag_is_unset("duplicate")?;
//!     q.union(|q| {
//!         q.tag("NM")?.eq(0)?;
//!         q.read_name().matches("^SRR")
//!     })
//! })?;
//!
//! assert_eq!(
//!     filter.as_str(),
//!     "(mapping_quality >= 30) and (not duplicate) and (([NM] == 0) or (read_name =~ /^SRR/))"
//! );
//! # Ok::<(), sambamba_stream::query::QueryError>(())
//! ```

mod builder;
pub mod catalog;

use std::fmt;

use thiserror::Error;

pub use builder::{FieldRef, Join, Literal, Operator, Query, TagRef};

/// Errors raised while compiling a predicate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Field name is not in the catalog.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// Operand does not fit the field's kind.
    #[error("type mismatch on {field}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Field or tag the condition was built for.
        field: String,
        /// What the field accepts.
        expected: String,
        /// What was supplied.
        found: String,
    },

    /// Tag code is not exactly two alphanumeric characters.
    #[error("tag name must be exactly two alphanumeric characters, got '{0}'")]
    InvalidTag(String),

    /// `is_unknown` on a field without an engine default.
    #[error("field '{0}' has no default value")]
    NoDefault(String),

    /// A nested scope added no conditions.
    #[error("nested scope contains no conditions")]
    EmptyScope,

    /// The predicate added no conditions at all.
    #[error("predicate produced an empty expression")]
    EmptyExpression,
}

/// Compiled filter expression, ready to hand to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Filter {
    expression: String,
}

impl Filter {
    /// Wrap a hand-written engine expression without validation.
    pub fn raw(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
        }
    }

    /// Expression text.
    pub fn as_str(&self) -> &str {
        &self.expression
    }

    /// Both filters must hold.
    pub fn and(self, other: Filter) -> Filter {
        Filter::raw(format!("({}) and ({})", self.expression, other.expression))
    }

    /// Either filter must hold.
    pub fn or(self, other: Filter) -> Filter {
        Filter::raw(format!("({}) or ({})", self.expression, other.expression))
    }

    /// Complement of this filter.
    pub fn negate(self) -> Filter {
        Filter::raw(format!("not ({})", self.expression))
    }

    /// Consume into the expression text.
    pub fn into_string(self) -> String {
        self.expression
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

impl AsRef<str> for Filter {
    fn as_ref(&self) -> &str {
        &self.expression
    }
}

/// Compile one predicate into a filter.
pub fn compile<F>(predicate: F) -> Result<Filter, QueryError>
where
    F: FnOnce(&mut Query) -> Result<(), QueryError>,
{
    let mut query = Query::new();
    predicate(&mut query)?;
    finish(&query)
}

/// Conjunction of independently written predicates.
pub fn all_of<I, F>(predicates: I) -> Result<Filter, QueryError>
where
    I: IntoIterator<Item = F>,
    F: FnOnce(&mut Query) -> Result<(), QueryError>,
{
    let mut query = Query::new();
    for predicate in predicates {
        query.intersection(predicate)?;
    }
    finish(&query)
}

/// Disjunction of independently written predicates.
pub fn any_of<I, F>(predicates: I) -> Result<Filter, QueryError>
where
    I: IntoIterator<Item = F>,
    F: FnOnce(&mut Query) -> Result<(), QueryError>,
{
    let mut predicates = predicates.into_iter().peekable();
    if predicates.peek().is_none() {
        return Err(QueryError::EmptyExpression);
    }

    let mut query = Query::new();
    query.union(|q| {
        for predicate in predicates {
            q.intersection(predicate)?;
        }
        Ok(())
    })?;
    finish(&query)
}

fn finish(query: &Query) -> Result<Filter, QueryError> {
    if query.is_empty() {
        return Err(QueryError::EmptyExpression);
    }
    Ok(Filter::raw(query.finalize()))
}
