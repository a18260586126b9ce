//! Migration operations.
//!
//! Each operation is an abstract, dialect-independent description of one
//! schema change. Operations are immutable once built; their position in a
//! list matters, since a generator may look at the operations that follow the
//! one it is generating.

mod column;
mod data;
mod index;
mod sequence;
mod table;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MigrationError, Result};

pub use column::{ColumnOperation, Literal, ReferentialAction};
pub use data::{
    CustomOperation, DeleteDataOperation, InsertDataOperation, SqlOperation, UpdateDataOperation,
};
pub use index::{
    AddForeignKeyOperation, AddPrimaryKeyOperation, AddUniqueConstraintOperation,
    CreateCheckConstraintOperation, CreateIndexOperation, DropCheckConstraintOperation,
    DropForeignKeyOperation, DropIndexOperation, DropPrimaryKeyOperation,
    DropUniqueConstraintOperation, RenameIndexOperation,
};
pub use sequence::{
    AlterSequenceOperation, CreateSequenceOperation, DropSequenceOperation,
    RenameSequenceOperation, RestartSequenceOperation, SequenceOptions,
};
pub use table::{
    AlterColumnOperation, AlterTableOperation, CreateTableOperation, DropColumnOperation,
    DropSchemaOperation, DropTableOperation, EnsureSchemaOperation, RenameColumnOperation,
    RenameTableOperation,
};

macro_rules! operations {
    ($($(#[$doc:meta])* $variant:ident($payload:ty),)+) => {
        /// A single migration operation.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "type")]
        pub enum MigrationOperation {
            $($(#[$doc])* $variant($payload),)+
        }

        /// The type of a [`MigrationOperation`], used to key handler tables.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum OperationKind {
            $($variant,)+
        }

        impl OperationKind {
            /// Every operation kind, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)+
                }
            }
        }

        impl MigrationOperation {
            #[must_use]
            pub const fn kind(&self) -> OperationKind {
                match self {
                    $(Self::$variant(_) => OperationKind::$variant,)+
                }
            }
        }

        $(
            impl From<$payload> for MigrationOperation {
                fn from(op: $payload) -> Self {
                    Self::$variant(op)
                }
            }
        )+
    };
}

operations! {
    /// Create a schema if it does not exist.
    EnsureSchema(EnsureSchemaOperation),
    DropSchema(DropSchemaOperation),
    /// Create a table with columns and constraints.
    CreateTable(CreateTableOperation),
    DropTable(DropTableOperation),
    /// Rename a table or move it between schemas.
    RenameTable(RenameTableOperation),
    /// Change table-level options.
    AlterTable(AlterTableOperation),
    AddColumn(ColumnOperation),
    DropColumn(DropColumnOperation),
    /// Change a column definition.
    AlterColumn(AlterColumnOperation),
    RenameColumn(RenameColumnOperation),
    CreateIndex(CreateIndexOperation),
    DropIndex(DropIndexOperation),
    RenameIndex(RenameIndexOperation),
    AddPrimaryKey(AddPrimaryKeyOperation),
    DropPrimaryKey(DropPrimaryKeyOperation),
    AddForeignKey(AddForeignKeyOperation),
    DropForeignKey(DropForeignKeyOperation),
    AddUniqueConstraint(AddUniqueConstraintOperation),
    DropUniqueConstraint(DropUniqueConstraintOperation),
    CreateCheckConstraint(CreateCheckConstraintOperation),
    DropCheckConstraint(DropCheckConstraintOperation),
    CreateSequence(CreateSequenceOperation),
    AlterSequence(AlterSequenceOperation),
    DropSequence(DropSequenceOperation),
    RenameSequence(RenameSequenceOperation),
    RestartSequence(RestartSequenceOperation),
    /// Insert seed rows.
    InsertData(InsertDataOperation),
    UpdateData(UpdateDataOperation),
    DeleteData(DeleteDataOperation),
    /// Run raw SQL.
    Sql(SqlOperation),
    /// A named operation only some dialects handle.
    Custom(CustomOperation),
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn require(kind: OperationKind, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MigrationError::precondition(
            kind,
            format!("'{field}' must not be empty"),
        ));
    }
    if value.contains('\0') {
        return Err(MigrationError::precondition(
            kind,
            format!("'{field}' contains a NUL character"),
        ));
    }
    Ok(())
}

fn require_some(kind: OperationKind, field: &str, value: Option<&str>) -> Result<()> {
    value.map_or(Ok(()), |v| require(kind, field, v))
}

fn require_columns(kind: OperationKind, field: &str, columns: &[String]) -> Result<()> {
    if columns.is_empty() {
        return Err(MigrationError::precondition(
            kind,
            format!("'{field}' must name at least one column"),
        ));
    }
    columns.iter().try_for_each(|c| require(kind, field, c))
}

fn require_rows(
    kind: OperationKind,
    columns: &[String],
    rows: &[Vec<Literal>],
    field: &str,
) -> Result<()> {
    if let Some(row) = rows.iter().find(|row| row.len() != columns.len()) {
        return Err(MigrationError::precondition(
            kind,
            format!(
                "a row of '{field}' has {} values for {} columns",
                row.len(),
                columns.len()
            ),
        ));
    }
    Ok(())
}

fn require_column(kind: OperationKind, column: &ColumnOperation) -> Result<()> {
    require(kind, "name", &column.name)?;
    require(kind, "table", &column.table)
}

impl MigrationOperation {
    /// Checks the identifiers and shapes the operation needs.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Precondition`] for the first missing or
    /// malformed field.
    pub fn validate(&self) -> Result<()> {
        let kind = self.kind();
        match self {
            Self::EnsureSchema(op) => require(kind, "name", &op.name),
            Self::DropSchema(op) => require(kind, "name", &op.name),
            Self::CreateTable(op) => {
                require(kind, "name", &op.name)?;
                if op.columns.is_empty() {
                    return Err(MigrationError::precondition(
                        kind,
                        format!("table '{}' has no columns", op.name),
                    ));
                }
                op.columns
                    .iter()
                    .try_for_each(|c| require(kind, "column name", &c.name))?;
                if let Some(pk) = &op.primary_key {
                    require_columns(kind, "primary key", &pk.columns)?;
                }
                for fk in &op.foreign_keys {
                    require_foreign_key(kind, fk)?;
                }
                Ok(())
            }
            Self::DropTable(op) => require(kind, "name", &op.name),
            Self::RenameTable(op) => {
                require(kind, "name", &op.name)?;
                require_some(kind, "new_name", op.new_name.as_deref())
            }
            Self::AlterTable(op) => require(kind, "name", &op.name),
            Self::AddColumn(op) => require_column(kind, op),
            Self::DropColumn(op) => {
                require(kind, "name", &op.name)?;
                require(kind, "table", &op.table)
            }
            Self::AlterColumn(op) => require_column(kind, &op.column),
            Self::RenameColumn(op) => {
                require(kind, "name", &op.name)?;
                require(kind, "table", &op.table)?;
                require(kind, "new_name", &op.new_name)
            }
            Self::CreateIndex(op) => {
                require(kind, "name", &op.name)?;
                require(kind, "table", &op.table)?;
                require_columns(kind, "columns", &op.columns)
            }
            Self::DropIndex(op) => require(kind, "name", &op.name),
            Self::RenameIndex(op) => {
                require(kind, "name", &op.name)?;
                require(kind, "new_name", &op.new_name)
            }
            Self::AddPrimaryKey(op) => {
                require(kind, "name", &op.name)?;
                require(kind, "table", &op.table)?;
                require_columns(kind, "columns", &op.columns)
            }
            Self::DropPrimaryKey(op) => {
                require(kind, "name", &op.name)?;
                require(kind, "table", &op.table)
            }
            Self::AddForeignKey(op) => {
                require(kind, "table", &op.table)?;
                require_foreign_key(kind, op)
            }
            Self::DropForeignKey(op) => {
                require(kind, "name", &op.name)?;
                require(kind, "table", &op.table)
            }
            Self::AddUniqueConstraint(op) => {
                require(kind, "name", &op.name)?;
                require(kind, "table", &op.table)?;
                require_columns(kind, "columns", &op.columns)
            }
            Self::DropUniqueConstraint(op) => {
                require(kind, "name", &op.name)?;
                require(kind, "table", &op.table)
            }
            Self::CreateCheckConstraint(op) => {
                require(kind, "name", &op.name)?;
                require(kind, "table", &op.table)?;
                require(kind, "sql", &op.sql)
            }
            Self::DropCheckConstraint(op) => {
                require(kind, "name", &op.name)?;
                require(kind, "table", &op.table)
            }
            Self::CreateSequence(op) => {
                require(kind, "name", &op.name)?;
                require_increment(kind, &op.options)
            }
            Self::AlterSequence(op) => {
                require(kind, "name", &op.name)?;
                require_increment(kind, &op.options)
            }
            Self::DropSequence(op) => require(kind, "name", &op.name),
            Self::RenameSequence(op) => {
                require(kind, "name", &op.name)?;
                require_some(kind, "new_name", op.new_name.as_deref())
            }
            Self::RestartSequence(op) => require(kind, "name", &op.name),
            Self::InsertData(op) => {
                require(kind, "table", &op.table)?;
                require_columns(kind, "columns", &op.columns)?;
                require_rows(kind, &op.columns, &op.values, "values")
            }
            Self::UpdateData(op) => {
                require(kind, "table", &op.table)?;
                require_columns(kind, "key_columns", &op.key_columns)?;
                require_columns(kind, "columns", &op.columns)?;
                require_rows(kind, &op.key_columns, &op.key_values, "key_values")?;
                require_rows(kind, &op.columns, &op.values, "values")?;
                if op.key_values.len() != op.values.len() {
                    return Err(MigrationError::precondition(
                        kind,
                        format!(
                            "{} key rows for {} value rows",
                            op.key_values.len(),
                            op.values.len()
                        ),
                    ));
                }
                Ok(())
            }
            Self::DeleteData(op) => {
                require(kind, "table", &op.table)?;
                require_columns(kind, "key_columns", &op.key_columns)?;
                require_rows(kind, &op.key_columns, &op.key_values, "key_values")
            }
            Self::Sql(op) => require(kind, "sql", &op.sql),
            Self::Custom(op) => require(kind, "name", &op.name),
        }
    }

    /// Attempts to generate the reverse operation.
    ///
    /// Returns `None` if the operation is not reversible, usually because it
    /// drops something whose definition it does not carry.
    #[must_use]
    pub fn reverse(&self) -> Option<Self> {
        let reversed: Self = match self {
            Self::EnsureSchema(op) => DropSchemaOperation {
                name: op.name.clone(),
            }
            .into(),
            Self::DropSchema(op) => EnsureSchemaOperation {
                name: op.name.clone(),
            }
            .into(),
            Self::CreateTable(op) => DropTableOperation {
                name: op.name.clone(),
                schema: op.schema.clone(),
            }
            .into(),
            Self::RenameTable(op) => RenameTableOperation {
                name: op.new_name.clone().unwrap_or_else(|| op.name.clone()),
                schema: op.new_schema.clone(),
                new_name: Some(op.name.clone()),
                new_schema: op.schema.clone(),
            }
            .into(),
            Self::AlterTable(op) => AlterTableOperation {
                name: op.name.clone(),
                schema: op.schema.clone(),
                comment: op.old_comment.clone(),
                old_comment: op.comment.clone(),
                memory_optimized: op.old_memory_optimized,
                old_memory_optimized: op.memory_optimized,
            }
            .into(),
            Self::AddColumn(op) => DropColumnOperation {
                name: op.name.clone(),
                table: op.table.clone(),
                schema: op.schema.clone(),
            }
            .into(),
            Self::AlterColumn(op) => {
                AlterColumnOperation::new(op.old_column.clone(), op.column.clone()).into()
            }
            Self::RenameColumn(op) => RenameColumnOperation {
                name: op.new_name.clone(),
                table: op.table.clone(),
                schema: op.schema.clone(),
                new_name: op.name.clone(),
            }
            .into(),
            Self::CreateIndex(op) => DropIndexOperation {
                name: op.name.clone(),
                table: Some(op.table.clone()),
                schema: op.schema.clone(),
            }
            .into(),
            Self::RenameIndex(op) => RenameIndexOperation {
                name: op.new_name.clone(),
                table: op.table.clone(),
                schema: op.schema.clone(),
                new_name: op.name.clone(),
            }
            .into(),
            Self::AddPrimaryKey(op) => DropPrimaryKeyOperation {
                name: op.name.clone(),
                table: op.table.clone(),
                schema: op.schema.clone(),
            }
            .into(),
            Self::AddForeignKey(op) => DropForeignKeyOperation {
                name: op.name.clone(),
                table: op.table.clone(),
                schema: op.schema.clone(),
            }
            .into(),
            Self::AddUniqueConstraint(op) => DropUniqueConstraintOperation {
                name: op.name.clone(),
                table: op.table.clone(),
                schema: op.schema.clone(),
            }
            .into(),
            Self::CreateCheckConstraint(op) => DropCheckConstraintOperation {
                name: op.name.clone(),
                table: op.table.clone(),
                schema: op.schema.clone(),
            }
            .into(),
            Self::CreateSequence(op) => DropSequenceOperation {
                name: op.name.clone(),
                schema: op.schema.clone(),
            }
            .into(),
            Self::AlterSequence(op) => AlterSequenceOperation {
                name: op.name.clone(),
                schema: op.schema.clone(),
                options: op.old_options.clone(),
                old_options: op.options.clone(),
            }
            .into(),
            Self::RenameSequence(op) => RenameSequenceOperation {
                name: op.new_name.clone().unwrap_or_else(|| op.name.clone()),
                schema: op.new_schema.clone(),
                new_name: Some(op.name.clone()),
                new_schema: op.schema.clone(),
            }
            .into(),
            Self::InsertData(op) => DeleteDataOperation {
                table: op.table.clone(),
                schema: op.schema.clone(),
                key_columns: op.columns.clone(),
                key_values: op.values.clone(),
            }
            .into(),
            Self::DropTable(_)
            | Self::DropColumn(_)
            | Self::DropIndex(_)
            | Self::DropPrimaryKey(_)
            | Self::DropForeignKey(_)
            | Self::DropUniqueConstraint(_)
            | Self::DropCheckConstraint(_)
            | Self::DropSequence(_)
            | Self::RestartSequence(_)
            | Self::UpdateData(_)
            | Self::DeleteData(_)
            | Self::Sql(_)
            | Self::Custom(_) => return None,
        };
        Some(reversed)
    }

    /// Returns true if this operation can be reversed.
    #[must_use]
    pub fn is_reversible(&self) -> bool {
        self.reverse().is_some()
    }

    /// Returns a human-readable description of this operation.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::EnsureSchema(op) => format!("Ensure schema '{}'", op.name),
            Self::DropSchema(op) => format!("Drop schema '{}'", op.name),
            Self::CreateTable(op) => format!("Create table '{}'", op.name),
            Self::DropTable(op) => format!("Drop table '{}'", op.name),
            Self::RenameTable(op) => match (&op.new_name, &op.new_schema) {
                (Some(new_name), _) => format!("Rename table '{}' to '{new_name}'", op.name),
                (None, Some(schema)) => format!("Move table '{}' to schema '{schema}'", op.name),
                (None, None) => format!("Move table '{}' to the default schema", op.name),
            },
            Self::AlterTable(op) => format!("Alter table '{}'", op.name),
            Self::AddColumn(op) => format!("Add column '{}' to table '{}'", op.name, op.table),
            Self::DropColumn(op) => format!("Drop column '{}' from table '{}'", op.name, op.table),
            Self::AlterColumn(op) => {
                format!("Alter column '{}' in table '{}'", op.name(), op.table())
            }
            Self::RenameColumn(op) => format!(
                "Rename column '{}' to '{}' in table '{}'",
                op.name, op.new_name, op.table
            ),
            Self::CreateIndex(op) => format!("Create index '{}' on table '{}'", op.name, op.table),
            Self::DropIndex(op) => format!("Drop index '{}'", op.name),
            Self::RenameIndex(op) => format!("Rename index '{}' to '{}'", op.name, op.new_name),
            Self::AddPrimaryKey(op) => {
                format!("Add primary key '{}' to table '{}'", op.name, op.table)
            }
            Self::DropPrimaryKey(op) => {
                format!("Drop primary key '{}' from table '{}'", op.name, op.table)
            }
            Self::AddForeignKey(op) => {
                format!("Add foreign key '{}' to table '{}'", op.name, op.table)
            }
            Self::DropForeignKey(op) => {
                format!("Drop foreign key '{}' from table '{}'", op.name, op.table)
            }
            Self::AddUniqueConstraint(op) => {
                format!("Add unique constraint '{}' to table '{}'", op.name, op.table)
            }
            Self::DropUniqueConstraint(op) => {
                format!("Drop unique constraint '{}' from table '{}'", op.name, op.table)
            }
            Self::CreateCheckConstraint(op) => {
                format!("Add check constraint '{}' to table '{}'", op.name, op.table)
            }
            Self::DropCheckConstraint(op) => {
                format!("Drop check constraint '{}' from table '{}'", op.name, op.table)
            }
            Self::CreateSequence(op) => format!("Create sequence '{}'", op.name),
            Self::AlterSequence(op) => format!("Alter sequence '{}'", op.name),
            Self::DropSequence(op) => format!("Drop sequence '{}'", op.name),
            Self::RenameSequence(op) => format!("Rename sequence '{}'", op.name),
            Self::RestartSequence(op) => {
                format!("Restart sequence '{}' at {}", op.name, op.start_value)
            }
            Self::InsertData(op) => format!("Insert {} row(s) into '{}'", op.values.len(), op.table),
            Self::UpdateData(op) => format!("Update {} row(s) of '{}'", op.values.len(), op.table),
            Self::DeleteData(op) => {
                format!("Delete {} row(s) from '{}'", op.key_values.len(), op.table)
            }
            Self::Sql(_) => "Run custom SQL".to_string(),
            Self::Custom(op) => format!("Run custom operation '{}'", op.name),
        }
    }
}

fn require_foreign_key(kind: OperationKind, op: &AddForeignKeyOperation) -> Result<()> {
    require(kind, "name", &op.name)?;
    require(kind, "principal_table", &op.principal_table)?;
    require_columns(kind, "columns", &op.columns)?;
    if !op.principal_columns.is_empty() && op.principal_columns.len() != op.columns.len() {
        return Err(MigrationError::precondition(
            kind,
            format!(
                "foreign key '{}' has {} columns but {} principal columns",
                op.name,
                op.columns.len(),
                op.principal_columns.len()
            ),
        ));
    }
    Ok(())
}

fn require_increment(kind: OperationKind, options: &SequenceOptions) -> Result<()> {
    if options.increment_by == 0 {
        return Err(MigrationError::precondition(
            kind,
            "'increment_by' must not be zero",
        ));
    }
    Ok(())
}
