//! Dialect-aware SQL generation for migration operations.
//!
//! `oxide-migrate` maps an ordered list of abstract schema changes to the
//! SQL batches one database needs to apply them:
//!
//! - **Operations** - `CreateTable`, `AlterColumn`, `RenameIndex`, seed data,
//!   raw SQL... as plain serializable values, with reversal and validation
//! - **Generator** - a dispatch table from operation kind to handler, with
//!   per-call state for look-ahead over the remaining operations
//! - **Dialects** - ANSI base handlers plus SQL Server, PostgreSQL and SQLite
//!   overrides
//! - **Versions** - generation behaviors gated on the product version that
//!   authored the target model, so old migrations regenerate the same SQL
//!
//! # Example
//!
//! ```rust
//! use oxide_migrate::prelude::*;
//! use oxide_model::reflect::PrimitiveType;
//!
//! let table = CreateTableOperation::new("Widgets")
//!     .column(ColumnOperation::new("", "Id").of_type(PrimitiveType::Int32).identity())
//!     .column(ColumnOperation::new("", "Name").store_type("nvarchar(50)").nullable())
//!     .primary_key(&["Id"]);
//!
//! let generator = MigrationsSqlGenerator::new(SqlServerDialect::new());
//! let commands = generator.generate(&[table.into()], None).unwrap();
//! assert!(commands[0].sql().starts_with("CREATE TABLE [Widgets] ("));
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Script an operation file for SQL Server
//! oxide-migrate --input ops.json script
//!
//! # Reproduce the SQL a 1.x tool generated, for PostgreSQL
//! oxide-migrate --dialect postgresql --product-version 1.1.0 --input ops.json script
//!
//! # Show which dialect generates each operation
//! oxide-migrate --dialect sqlite handlers
//! ```

pub mod command;
pub mod dialect;
pub mod error;
pub mod file;
pub mod generator;
pub mod operations;
pub mod version;

pub use command::{MigrationCommand, MigrationCommandListBuilder};
pub use error::{MigrationError, Result};
pub use generator::MigrationsSqlGenerator;
pub use operations::{MigrationOperation, OperationKind};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::command::{MigrationCommand, MigrationCommandListBuilder};
    pub use crate::dialect::{AnsiDialect, Dialect, PostgresDialect, SqlServerDialect, SqliteDialect};
    pub use crate::error::{MigrationError, Result};
    pub use crate::generator::MigrationsSqlGenerator;
    pub use crate::operations::*;
}
