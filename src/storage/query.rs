//! Parser for the query shapes the storage understands:
//!
//! ```text
//! SELECT p FROM Person p
//! SELECT p FROM Person p WHERE p.name LIKE '%ann%'
//! SELECT p FROM Person p WHERE p.name = 'Ann'
//! ```

use crate::core::{FormError, Result};
use regex::Regex;
use serde_json::Value;

lazy_static::lazy_static! {
    static ref QUERY_SHAPE: Regex = Regex::new(
        r"(?is)^\s*SELECT\s+(\w+)\s+FROM\s+(\w+)\s+(\w+)(?:\s+WHERE\s+(\w+)\.(\w+)\s*(LIKE|=)\s*'((?:[^']|'')*)')?\s*;?\s*$"
    )
    .expect("query pattern is valid");
}

#[derive(Debug, Clone)]
pub enum Predicate {
    Equals(String),
    Like { pattern: String, matcher: Regex },
}

impl Predicate {
    pub fn like(pattern: &str) -> Result<Self> {
        let mut expr = String::from("(?s)^");
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            match c {
                '%' => expr.push_str(".*"),
                '_' => expr.push('.'),
                '\\' => match chars.next() {
                    Some(escaped) => expr.push_str(&regex::escape(&escaped.to_string())),
                    None => expr.push_str("\\\\"),
                },
                other => expr.push_str(&regex::escape(&other.to_string())),
            }
        }
        expr.push('$');
        let matcher = Regex::new(&expr)
            .map_err(|e| FormError::Query(format!("invalid LIKE pattern '{pattern}': {e}")))?;
        Ok(Self::Like {
            pattern: pattern.to_string(),
            matcher,
        })
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Equals(expected) => expected == text,
            Self::Like { matcher, .. } => matcher.is_match(text),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub predicate: Predicate,
}

impl Filter {
    /// Compares the field's scalar text; missing fields and nested values never match.
    pub fn matches(&self, record: &Value) -> bool {
        record
            .get(&self.field)
            .and_then(scalar_text)
            .is_some_and(|text| self.predicate.matches(&text))
    }
}

#[derive(Debug, Clone)]
pub struct ParsedQuery {
    pub alias: String,
    pub type_name: String,
    pub filter: Option<Filter>,
}

impl ParsedQuery {
    pub fn parse(text: &str) -> Result<Self> {
        let captures = QUERY_SHAPE
            .captures(text)
            .ok_or_else(|| FormError::Query(format!("unsupported query: {text}")))?;

        let selected = &captures[1];
        let type_name = captures[2].to_string();
        let alias = captures[3].to_string();
        if selected != alias {
            return Err(FormError::Query(format!(
                "selected alias '{selected}' does not match '{alias}'"
            )));
        }

        let filter = match (captures.get(4), captures.get(5), captures.get(6), captures.get(7)) {
            (Some(qualifier), Some(field), Some(op), Some(literal)) => {
                if qualifier.as_str() != alias {
                    return Err(FormError::Query(format!(
                        "unknown alias '{}' in WHERE clause",
                        qualifier.as_str()
                    )));
                }
                let value = literal.as_str().replace("''", "'");
                let predicate = if op.as_str().eq_ignore_ascii_case("LIKE") {
                    Predicate::like(&value)?
                } else {
                    Predicate::Equals(value)
                };
                Some(Filter {
                    field: field.as_str().to_string(),
                    predicate,
                })
            }
            _ => None,
        };

        Ok(Self {
            alias,
            type_name,
            filter,
        })
    }
}

pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
