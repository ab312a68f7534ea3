//! Composable WHERE-clause building for simple lookups.
//!
//! Anything beyond single-table filtering (joins, eager loads) is written as
//! explicit SQL at the call site; this module only covers the common
//! find-by-field cases.

use crate::value::{Params, Value};

/// A single comparison against a column.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Lt(Value),
    Like(String),
    In(Vec<Value>),
}

impl Condition {
    pub fn eq(value: impl Into<Value>) -> Self {
        Condition::Eq(value.into())
    }

    pub fn ne(value: impl Into<Value>) -> Self {
        Condition::Ne(value.into())
    }

    pub fn gt(value: impl Into<Value>) -> Self {
        Condition::Gt(value.into())
    }

    pub fn lt(value: impl Into<Value>) -> Self {
        Condition::Lt(value.into())
    }

    pub fn like(pattern: &str) -> Self {
        Condition::Like(pattern.to_string())
    }

    pub fn is_in(values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Condition::In(values.into_iter().map(Into::into).collect())
    }
}

/// Conditions joined with AND, in declaration order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Condition)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_condition(mut self, field: &str, condition: Condition) -> Self {
        self.conditions.push((field.to_string(), condition));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Render to a ` WHERE ...` clause (empty string when unfiltered) and the
    /// named parameters it binds. Parameter names are positional (`w0`,
    /// `w1`, ...) so the same field can be constrained twice.
    pub fn to_sql(&self) -> (String, Params) {
        if self.conditions.is_empty() {
            return (String::new(), Params::new());
        }
        let mut clauses = Vec::new();
        let mut params = Params::new();
        for (i, (field, condition)) in self.conditions.iter().enumerate() {
            let key = format!("w{i}");
            match condition {
                Condition::Eq(v) => {
                    clauses.push(format!("{field} = :{key}"));
                    params = params.with_value(&key, v.clone());
                }
                Condition::Ne(v) => {
                    clauses.push(format!("{field} <> :{key}"));
                    params = params.with_value(&key, v.clone());
                }
                Condition::Gt(v) => {
                    clauses.push(format!("{field} > :{key}"));
                    params = params.with_value(&key, v.clone());
                }
                Condition::Lt(v) => {
                    clauses.push(format!("{field} < :{key}"));
                    params = params.with_value(&key, v.clone());
                }
                Condition::Like(pattern) => {
                    clauses.push(format!("{field} LIKE :{key}"));
                    params = params.with_value(&key, pattern.as_str());
                }
                Condition::In(values) if values.is_empty() => {
                    // An empty IN list matches nothing.
                    clauses.push("1 = 0".to_string());
                }
                Condition::In(values) => {
                    let keys: Vec<String> =
                        (0..values.len()).map(|j| format!(":{key}_{j}")).collect();
                    clauses.push(format!("{field} IN ({})", keys.join(", ")));
                    for (j, v) in values.iter().enumerate() {
                        params = params.with_value(&format!("{key}_{j}"), v.clone());
                    }
                }
            }
        }
        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}
