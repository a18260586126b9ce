//! Seed data, raw SQL and dialect-only operations.

use serde::{Deserialize, Serialize};

use super::column::Literal;

/// Inserts rows; each entry of `values` is one row in `columns` order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InsertDataOperation {
    pub table: String,
    pub schema: Option<String>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Literal>>,
}

impl InsertDataOperation {
    #[must_use]
    pub fn new(table: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            table: table.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn row(mut self, values: Vec<Literal>) -> Self {
        self.values.push(values);
        self
    }
}

/// Updates rows identified by key values; row `i` of `values` applies to
/// row `i` of `key_values`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateDataOperation {
    pub table: String,
    pub schema: Option<String>,
    pub key_columns: Vec<String>,
    pub key_values: Vec<Vec<Literal>>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Literal>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteDataOperation {
    pub table: String,
    pub schema: Option<String>,
    pub key_columns: Vec<String>,
    pub key_values: Vec<Vec<Literal>>,
}

/// Raw SQL, split into batches by the dialect's batch separator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlOperation {
    pub sql: String,
    pub suppress_transaction: bool,
}

impl SqlOperation {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            suppress_transaction: false,
        }
    }
}

/// An operation only some dialects understand, handled by name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomOperation {
    pub name: String,
    pub payload: serde_json::Value,
}
