//! Migration SQL generation.
//!
//! [`MigrationsSqlGenerator`] turns an ordered list of operations into
//! [`MigrationCommand`]s. Dispatch goes through the dialect's
//! [`HandlerTable`]: each operation kind maps to one typed handler, and a
//! dialect replaces the handlers it generates differently.
//!
//! ```rust
//! use oxide_migrate::dialect::SqlServerDialect;
//! use oxide_migrate::generator::MigrationsSqlGenerator;
//! use oxide_migrate::operations::{DropColumnOperation, MigrationOperation};
//!
//! let generator = MigrationsSqlGenerator::new(SqlServerDialect::new());
//! let ops = vec![MigrationOperation::from(DropColumnOperation::new("Widgets", "Name"))];
//! let commands = generator.generate(&ops, None).unwrap();
//! assert_eq!(commands.len(), 1);
//! assert!(commands[0].sql().ends_with("ALTER TABLE [Widgets] DROP COLUMN [Name];\n"));
//! ```

pub mod ansi;
mod handlers;

use oxide_model::FrozenModel;
use tracing::{debug, info};

use crate::command::{MigrationCommand, MigrationCommandListBuilder};
use crate::dialect::Dialect;
use crate::error::{MigrationError, Result};
use crate::operations::{ColumnOperation, MigrationOperation, OperationKind};
use crate::version::Compatibility;

pub(crate) use handlers::handler;
pub use handlers::{Handler, HandlerFn, HandlerTable};

/// Generates migration commands for one dialect.
///
/// The generator holds no per-call state and can be reused.
#[derive(Debug)]
pub struct MigrationsSqlGenerator {
    dialect: Box<dyn Dialect>,
    handlers: HandlerTable,
    product_version: Option<String>,
}

impl MigrationsSqlGenerator {
    #[must_use]
    pub fn new(dialect: impl Dialect + 'static) -> Self {
        Self::from_boxed(Box::new(dialect))
    }

    /// Creates a generator for a dialect chosen at runtime.
    #[must_use]
    pub fn from_boxed(dialect: Box<dyn Dialect>) -> Self {
        let handlers = dialect.handlers();
        Self {
            dialect,
            handlers,
            product_version: None,
        }
    }

    /// Generates as the tooling of `version` did, whatever version the
    /// model records.
    #[must_use]
    pub fn with_product_version(mut self, version: impl Into<String>) -> Self {
        self.product_version = Some(version.into());
        self
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    /// Generates the commands for `operations`.
    ///
    /// `model` is the target model, used to infer store types of columns
    /// that carry none, to find the indexes a column change affects, and to
    /// read the product version that gates legacy behavior.
    ///
    /// # Errors
    ///
    /// Every operation is validated before any SQL is produced. Generation
    /// then stops at the first operation that has no handler, is not
    /// implemented, or is not supported by the dialect.
    pub fn generate(
        &self,
        operations: &[MigrationOperation],
        model: Option<&FrozenModel>,
    ) -> Result<Vec<MigrationCommand>> {
        let mut errors: Vec<_> = operations
            .iter()
            .filter_map(|op| op.validate().err())
            .collect();
        if errors.len() > 1 {
            return Err(MigrationError::Multiple(errors));
        }
        if let Some(error) = errors.pop() {
            return Err(error);
        }

        let version = self
            .product_version
            .as_deref()
            .or_else(|| model.and_then(FrozenModel::product_version));
        let mut generation = Generation {
            dialect: self.dialect.as_ref(),
            handlers: &self.handlers,
            model,
            operations,
            position: 0,
            variable_counter: 0,
            compatibility: Compatibility::for_version(version),
        };

        let mut builder = MigrationCommandListBuilder::new();
        for (position, operation) in operations.iter().enumerate() {
            generation.position = position;
            let mut scratch = builder.scratch();
            generation.generate(operation, &mut scratch)?;
            builder.merge(scratch);
        }

        let commands = builder.build();
        info!(
            dialect = self.dialect.name(),
            operations = operations.len(),
            commands = commands.len(),
            "Generated migration commands"
        );
        Ok(commands)
    }

    /// Joins commands into a script, each batch followed by the dialect's
    /// batch terminator when it has one.
    #[must_use]
    pub fn script(&self, commands: &[MigrationCommand]) -> String {
        let mut script = String::new();
        for command in commands {
            script.push_str(command.sql());
            if !command.sql().ends_with('\n') {
                script.push('\n');
            }
            if let Some(terminator) = self.dialect.batch_terminator() {
                script.push_str(terminator);
                script.push('\n');
            }
            script.push('\n');
        }
        script
    }
}

/// State of one [`MigrationsSqlGenerator::generate`] call, handed to every
/// handler.
#[derive(Debug)]
pub struct Generation<'a> {
    dialect: &'a dyn Dialect,
    handlers: &'a HandlerTable,
    model: Option<&'a FrozenModel>,
    operations: &'a [MigrationOperation],
    position: usize,
    variable_counter: usize,
    compatibility: Compatibility,
}

impl<'a> Generation<'a> {
    pub fn dialect(&self) -> &'a dyn Dialect {
        self.dialect
    }

    pub fn model(&self) -> Option<&'a FrozenModel> {
        self.model
    }

    pub const fn compatibility(&self) -> Compatibility {
        self.compatibility
    }

    /// The operations after the one being generated.
    pub fn remaining(&self) -> &'a [MigrationOperation] {
        self.operations.get(self.position + 1..).unwrap_or_default()
    }

    /// A fresh variable name for dynamic SQL, unique within this call.
    pub fn next_variable(&mut self) -> String {
        let name = format!("@var{}", self.variable_counter);
        self.variable_counter += 1;
        name
    }

    /// Dispatches `operation` through the dialect's handler table.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::UnknownOperation`] when the table has no
    /// handler for it, otherwise whatever the handler returns.
    pub fn generate(
        &mut self,
        operation: &MigrationOperation,
        builder: &mut MigrationCommandListBuilder,
    ) -> Result<()> {
        let Some(&handler) = self.handlers.resolve(operation) else {
            return Err(MigrationError::UnknownOperation {
                generator: self.dialect.name().to_string(),
                operation: operation_name(operation),
            });
        };
        debug!(
            operation = %operation.kind(),
            origin = handler.origin,
            "Generating operation"
        );
        (handler.func)(self, operation, builder)
    }

    /// The error a handler returns when it is registered for the wrong kind.
    #[must_use]
    pub fn mismatch(&self, operation: &MigrationOperation) -> MigrationError {
        MigrationError::UnknownOperation {
            generator: self.dialect.name().to_string(),
            operation: operation_name(operation),
        }
    }

    #[must_use]
    pub fn not_implemented(&self, operation: OperationKind) -> MigrationError {
        MigrationError::NotImplemented {
            generator: self.dialect.name().to_string(),
            operation,
        }
    }

    #[must_use]
    pub fn not_supported(&self, operation: OperationKind, reason: impl Into<String>) -> MigrationError {
        MigrationError::NotSupported {
            generator: self.dialect.name().to_string(),
            operation,
            reason: reason.into(),
        }
    }

    /// The store type of `column`: its explicit type, else the dialect's
    /// mapping of its value type, else the mapping of the model column it
    /// names.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Precondition`] when none of these exist.
    pub fn column_type(&self, column: &ColumnOperation) -> Result<String> {
        if let Some(column_type) = &column.column_type {
            return Ok(column_type.clone());
        }
        if let Some(clr_type) = column.clr_type {
            return Ok(self.dialect.store_type(clr_type, column));
        }
        if let Some(property) = self
            .model
            .and_then(|model| model.find_column(&column.table, &column.name))
        {
            return Ok(self.dialect.store_type(property.primitive, column));
        }
        Err(MigrationError::precondition(
            self.current_kind(),
            format!(
                "no store type for column '{}.{}' and the model does not map it",
                column.table, column.name
            ),
        ))
    }

    fn current_kind(&self) -> OperationKind {
        self.operations
            .get(self.position)
            .map_or(OperationKind::AddColumn, MigrationOperation::kind)
    }

    pub fn delimit(&self, identifier: &str) -> String {
        self.dialect.delimit_identifier(identifier)
    }

    pub fn qualified(&self, name: &str, schema: Option<&str>) -> String {
        self.dialect.delimit_qualified(name, schema)
    }

    /// Delimits and comma-joins `columns`.
    pub fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.dialect.delimit_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Ends the current statement without ending the command.
    pub fn terminate(&self, builder: &mut MigrationCommandListBuilder) {
        builder.append_line(self.dialect.statement_terminator());
    }

    /// Ends the current statement and the command holding it.
    pub fn end_statement(&self, builder: &mut MigrationCommandListBuilder, suppress_transaction: bool) {
        self.terminate(builder);
        builder.end_command(suppress_transaction);
    }
}

fn operation_name(operation: &MigrationOperation) -> String {
    match operation {
        MigrationOperation::Custom(custom) => format!("Custom({})", custom.name),
        other => other.kind().name().to_string(),
    }
}
