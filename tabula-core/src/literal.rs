use crate::{AsValue, Select, Value};
use std::fmt;

/// Raw SQL fragment, emitted as is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expr(pub String);

impl Expr {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Anything that can stand where SQL expects a value.
#[derive(Debug, Clone)]
pub enum Literal {
    /// Written verbatim.
    Expression(Expr),
    /// Bound as a parameter, or quoted when substituted into text.
    Scalar(Value),
    /// Always quoted as a string literal.
    Text(String),
    /// Rendered in parentheses.
    Select(Box<Select>),
}

impl Literal {
    pub fn is_expression(&self) -> bool {
        matches!(self, Literal::Expression(..))
    }
}

impl From<Expr> for Literal {
    fn from(value: Expr) -> Self {
        Literal::Expression(value)
    }
}

impl From<Select> for Literal {
    fn from(value: Select) -> Self {
        Literal::Select(value.into())
    }
}

impl From<Value> for Literal {
    fn from(value: Value) -> Self {
        Literal::Scalar(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Scalar(Value::Text(value.into()))
    }
}

impl<T: AsValue> From<T> for Literal {
    fn from(value: T) -> Self {
        Literal::Scalar(value.as_value())
    }
}
