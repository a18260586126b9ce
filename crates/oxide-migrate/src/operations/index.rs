//! Index, key and constraint operations.

use serde::{Deserialize, Serialize};

use super::column::ReferentialAction;

fn owned(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| (*c).to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateIndexOperation {
    pub name: String,
    pub table: String,
    pub schema: Option<String>,
    pub columns: Vec<String>,
    pub unique: bool,
    /// Partial index predicate.
    pub filter: Option<String>,
    /// Non-key columns stored in the index leaf level.
    pub include: Vec<String>,
    pub clustered: Option<bool>,
}

impl CreateIndexOperation {
    #[must_use]
    pub fn new(name: impl Into<String>, table: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: owned(columns),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn include(mut self, columns: &[&str]) -> Self {
        self.include = owned(columns);
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Returns true when `column` is a key or included column.
    #[must_use]
    pub fn references_column(&self, column: &str) -> bool {
        self.columns.iter().chain(&self.include).any(|c| c == column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DropIndexOperation {
    pub name: String,
    pub table: Option<String>,
    pub schema: Option<String>,
}

impl DropIndexOperation {
    #[must_use]
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: Some(table.into()),
            schema: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameIndexOperation {
    pub name: String,
    pub table: Option<String>,
    pub schema: Option<String>,
    pub new_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AddPrimaryKeyOperation {
    pub name: String,
    pub table: String,
    pub schema: Option<String>,
    pub columns: Vec<String>,
    pub clustered: Option<bool>,
}

impl AddPrimaryKeyOperation {
    #[must_use]
    pub fn new(name: impl Into<String>, table: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: owned(columns),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DropPrimaryKeyOperation {
    pub name: String,
    pub table: String,
    pub schema: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AddForeignKeyOperation {
    pub name: String,
    pub table: String,
    pub schema: Option<String>,
    pub columns: Vec<String>,
    pub principal_table: String,
    pub principal_schema: Option<String>,
    pub principal_columns: Vec<String>,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

impl AddForeignKeyOperation {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        columns: &[&str],
        principal_table: impl Into<String>,
        principal_columns: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: owned(columns),
            principal_table: principal_table.into(),
            principal_columns: owned(principal_columns),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = action;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DropForeignKeyOperation {
    pub name: String,
    pub table: String,
    pub schema: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AddUniqueConstraintOperation {
    pub name: String,
    pub table: String,
    pub schema: Option<String>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DropUniqueConstraintOperation {
    pub name: String,
    pub table: String,
    pub schema: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateCheckConstraintOperation {
    pub name: String,
    pub table: String,
    pub schema: Option<String>,
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DropCheckConstraintOperation {
    pub name: String,
    pub table: String,
    pub schema: Option<String>,
}
