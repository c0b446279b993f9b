//! Types of the host query engine's function-invocation contract.
//!
//! These shapes are owned by the query engine that embeds the registry;
//! luafn conforms to them rather than defining them. They are reproduced
//! here at their observable surface: a function is looked up by name,
//! handed the clause it appears in, and asked to produce the literal
//! values the engine should match against.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// A literal value produced by a query function.
///
/// The host engine only understands text and integer literals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryLiteral {
    /// A text literal.
    Text(String),
    /// An integer literal.
    Number(i64),
}

impl QueryLiteral {
    /// Creates a text literal.
    pub fn text(value: impl Into<String>) -> Self {
        QueryLiteral::Text(value.into())
    }

    /// Creates a number literal.
    pub fn number(value: i64) -> Self {
        QueryLiteral::Number(value)
    }
}

/// A function call as it appears inside a query clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionOperand {
    /// The function name as written in the query.
    pub name: String,
    /// Raw argument strings, in call order.
    pub args: Vec<String>,
}

impl FunctionOperand {
    /// Creates a new function operand.
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self { name: name.into(), args }
    }
}

/// The terminal clause a function operand is evaluated within.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalClause {
    /// The field the clause constrains.
    pub field: String,
    /// The comparison operator, as the engine spells it (e.g. `"in"`, `"="`).
    pub operator: String,
}

impl TerminalClause {
    /// Creates a new terminal clause.
    pub fn new(field: impl Into<String>, operator: impl Into<String>) -> Self {
        Self { field: field.into(), operator: operator.into() }
    }
}

/// Per-evaluation context supplied by the host engine.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    /// The key of the user the query runs as, if any.
    pub user: Option<String>,
    /// True when the engine evaluates with security checks overridden.
    pub security_overridden: bool,
}

impl QueryContext {
    /// Creates a context for the given user.
    pub fn for_user(user: impl Into<String>) -> Self {
        Self { user: Some(user.into()), security_overridden: false }
    }
}

/// The invocation surface the host query engine expects from a
/// value-producing function.
///
/// Implementations must be callable concurrently from multiple query
/// worker threads.
pub trait ValuesFunction: Send + Sync {
    /// Computes the literal values for `operand` within `clause`.
    fn values(
        &self,
        context: &QueryContext,
        operand: &FunctionOperand,
        clause: &TerminalClause,
    ) -> Result<Vec<QueryLiteral>>;
}
