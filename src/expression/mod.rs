//! Sandboxed password expressions.
//!
//! An expression sees exactly two names: `object`, the record the report is
//! printed for, and `time`, a clock exposing `time.strftime(format)` and
//! `time.time()`. The builtin `str(value)` converts any value to text.
//! Besides literals, attribute access and calls, the grammar knows string
//! indexing and slicing, `+`, `and`, `or`, unary `-` and parentheses;
//! everything else is a syntax error.

pub(crate) mod ast;
mod eval;
mod parser;

use crate::record::Record;
use crate::value::Value;
use chrono::{DateTime, FixedOffset, Local};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

pub use parser::{MAX_NESTING, MAX_SOURCE_LEN};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ExpressionError {
    #[error("invalid syntax at offset {offset} near {found:?}")]
    Syntax { offset: usize, found: String },
    #[error("expression is {length} bytes long; at most {limit} are allowed")]
    TooLong { length: usize, limit: usize },
    #[error("expression nests deeper than {limit} levels")]
    TooDeep { limit: usize },
    #[error("name '{0}' is not defined")]
    UnknownName(String),
    #[error("access to attribute '{0}' is not allowed")]
    ForbiddenAttribute(String),
    #[error("'{type_name}' object has no attribute '{name}'")]
    UnknownAttribute { type_name: String, name: String },
    #[error("'{0}' object is not callable")]
    NotCallable(String),
    #[error("{name}() takes {expected} argument(s) but {found} were given")]
    Arity {
        name: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{0}")]
    Type(String),
    #[error("string index out of range")]
    IndexOutOfRange,
    #[error("integer overflow")]
    Overflow,
    #[error("invalid time format {0:?}")]
    Format(String),
    /// The expression evaluated to something that can't serve as a password.
    #[error("expression evaluated to {0}, which is not a valid password")]
    InvalidValue(String),
}

/// Source of the current time for the `time` binding.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// The host's local time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Always returns the same instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// Bindings visible to an expression.
pub struct Scope<'a> {
    object: Option<Arc<dyn Record>>,
    clock: &'a dyn Clock,
}

impl<'a> Scope<'a> {
    pub fn new(object: Option<Arc<dyn Record>>, clock: &'a dyn Clock) -> Scope<'a> {
        Scope { object, clock }
    }

    pub(crate) fn object(&self) -> Value {
        self.object.clone().map_or(Value::None, Value::Record)
    }

    pub(crate) fn now(&self) -> DateTime<FixedOffset> {
        self.clock.now()
    }
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("object", &self.object).finish_non_exhaustive()
    }
}

/// A parsed password expression.
#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    source: String,
    ast: ast::Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Expression, ExpressionError> {
        let ast = parser::parse(source)?;
        Ok(Expression {
            source: source.to_string(),
            ast,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, scope: &Scope) -> Result<Value, ExpressionError> {
        eval::evaluate(&self.ast, scope)
    }
}

impl FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Expression::parse(source)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
