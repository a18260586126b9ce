//! Schema, table and column operations.

use serde::{Deserialize, Serialize};

use super::column::ColumnOperation;
use super::index::{
    AddForeignKeyOperation, AddPrimaryKeyOperation, AddUniqueConstraintOperation,
    CreateCheckConstraintOperation,
};

/// Creates a schema unless it already exists.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsureSchemaOperation {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DropSchemaOperation {
    pub name: String,
}

/// Creates a table with its columns and constraints in one statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateTableOperation {
    pub name: String,
    pub schema: Option<String>,
    pub columns: Vec<ColumnOperation>,
    pub primary_key: Option<AddPrimaryKeyOperation>,
    pub unique_constraints: Vec<AddUniqueConstraintOperation>,
    pub check_constraints: Vec<CreateCheckConstraintOperation>,
    pub foreign_keys: Vec<AddForeignKeyOperation>,
    /// SQL Server memory-optimized table.
    pub memory_optimized: bool,
    pub comment: Option<String>,
}

impl CreateTableOperation {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a column; its table is set to this table.
    #[must_use]
    pub fn column(mut self, mut column: ColumnOperation) -> Self {
        column.table.clone_from(&self.name);
        column.schema.clone_from(&self.schema);
        self.columns.push(column);
        self
    }

    /// Sets the primary key, named `PK_<Table>`.
    #[must_use]
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = Some(AddPrimaryKeyOperation::new(
            format!("PK_{}", self.name),
            self.name.clone(),
            columns,
        ));
        self
    }

    #[must_use]
    pub fn foreign_key(mut self, foreign_key: AddForeignKeyOperation) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    #[must_use]
    pub fn memory_optimized(mut self) -> Self {
        self.memory_optimized = true;
        self
    }

    #[must_use]
    pub fn find_column(&self, name: &str) -> Option<&ColumnOperation> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DropTableOperation {
    pub name: String,
    pub schema: Option<String>,
}

/// Renames a table and/or moves it to another schema.
///
/// For models authored before the schema-aware rename, a missing
/// `new_schema` means the schema is unchanged; afterwards it means the
/// default schema.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameTableOperation {
    pub name: String,
    pub schema: Option<String>,
    pub new_name: Option<String>,
    pub new_schema: Option<String>,
}

/// Changes table-level options.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlterTableOperation {
    pub name: String,
    pub schema: Option<String>,
    pub comment: Option<String>,
    pub old_comment: Option<String>,
    pub memory_optimized: bool,
    pub old_memory_optimized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DropColumnOperation {
    pub name: String,
    pub table: String,
    pub schema: Option<String>,
}

impl DropColumnOperation {
    #[must_use]
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            schema: None,
        }
    }
}

/// Changes a column definition. `old_column` is the definition being
/// replaced.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlterColumnOperation {
    pub column: ColumnOperation,
    pub old_column: ColumnOperation,
}

impl AlterColumnOperation {
    #[must_use]
    pub const fn new(column: ColumnOperation, old_column: ColumnOperation) -> Self {
        Self { column, old_column }
    }

    pub fn name(&self) -> &str {
        &self.column.name
    }

    pub fn table(&self) -> &str {
        &self.column.table
    }

    pub fn schema(&self) -> Option<&str> {
        self.column.schema.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameColumnOperation {
    pub name: String,
    pub table: String,
    pub schema: Option<String>,
    pub new_name: String,
}

impl RenameColumnOperation {
    #[must_use]
    pub fn new(table: impl Into<String>, name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            schema: None,
            new_name: new_name.into(),
        }
    }
}
