//! Filter query language.
//!
//! Queries such as `from_user = '999%' AND (ua != 'friendly-scanner' OR status = 200)`
//! are compiled into the collector's smart-input filter dialect.

pub mod lexer;
pub mod parser;

use std::fmt;
use thiserror::Error;

pub use parser::parse;

/// Field vocabulary accepted by the query language and the collector column each maps to.
pub const FIELDS: &[(&str, &str)] = &[
    ("from_user", "data_header.from_user"),
    ("to_user", "data_header.to_user"),
    ("ruri_user", "data_header.ruri_user"),
    ("user_agent", "data_header.user_agent"),
    ("ua", "data_header.user_agent"),
    ("cseq", "data_header.cseq"),
    ("method", "method"),
    ("status", "status"),
    ("call_id", "sid"),
    ("sid", "sid"),
];

pub fn map_field(name: &str) -> Option<&'static str> {
    FIELDS
        .iter()
        .find(|(field, _)| *field == name)
        .map(|(_, column)| *column)
}

pub fn valid_fields() -> String {
    FIELDS
        .iter()
        .map(|(field, _)| *field)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("unterminated string starting at position {pos}")]
    UnterminatedString { pos: usize },
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("expected field name at position {pos}, found {found}")]
    ExpectedField { found: String, pos: usize },
    #[error("unknown field '{field}' at position {pos} (valid fields: {valid})")]
    UnknownField {
        field: String,
        pos: usize,
        valid: String,
    },
    #[error("expected operator '=' or '!=' at position {pos}, found {found}")]
    ExpectedOperator { found: String, pos: usize },
    #[error("expected value at position {pos}, found {found}")]
    InvalidValue { found: String, pos: usize },
    #[error("expected ')' to close '(' opened at position {open}, found {found} at position {pos}")]
    MissingCloseParen {
        open: usize,
        found: String,
        pos: usize,
    },
    #[error("unexpected {found} at position {pos} after complete expression")]
    TrailingTokens { found: String, pos: usize },
    #[error("quote character at position {pos} cannot appear in a literal value")]
    QuoteInValue { pos: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    pub fn as_str(&self) -> &'static str {
        match self {
            Connective::And => "AND",
            Connective::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Number(u64),
    Str(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "'{}'", s),
        }
    }
}

/// Compiled query tree.
///
/// A `Composite` always holds at least two children; the parser never builds an
/// empty or single-child composite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Leaf {
        field: &'static str,
        op: Operator,
        value: Value,
    },
    Composite {
        connective: Connective,
        children: Vec<Condition>,
    },
}

impl Condition {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Condition::Leaf {
                value: Value::Number(_),
                ..
            }
        )
    }

    /// Render in the collector's smart-input syntax.
    pub fn render(&self) -> String {
        match self {
            Condition::Leaf { field, op, value } => {
                format!("{} {} {}", field, op.as_str(), value)
            }
            Condition::Composite {
                connective,
                children,
            } => children
                .iter()
                .map(|child| match child {
                    Condition::Composite {
                        connective: inner, ..
                    } if inner != connective => format!("({})", child.render()),
                    _ => child.render(),
                })
                .collect::<Vec<_>>()
                .join(&format!(" {} ", connective.as_str())),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Compile query text into a smart-input filter string. Blank input yields "".
pub fn compile(text: &str) -> Result<String, CompileError> {
    Ok(parse(text)?.map(|c| c.render()).unwrap_or_default())
}

/// Raw equality expression for a top-level column, e.g. `sid = 'abc@host'`.
///
/// The filter syntax has no escape for `'`, so values containing one are rejected.
pub fn equality(column: &str, value: &str) -> Result<String, CompileError> {
    if let Some(pos) = value.chars().position(|c| c == '\'') {
        return Err(CompileError::QuoteInValue { pos });
    }
    Ok(format!("{} = '{}'", column, value))
}
