//! SQL dialects.
//!
//! A dialect supplies the small, syntax-level pieces of SQL (identifier
//! delimiting, literals, store types) and its [`HandlerTable`]: the base
//! handlers with the operations it generates differently swapped in.

mod ansi;
mod postgres;
mod sqlite;
mod sqlserver;

use std::fmt;

use oxide_model::reflect::PrimitiveType;

use crate::generator::HandlerTable;
use crate::operations::{ColumnOperation, Literal};

pub use ansi::AnsiDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;
pub use sqlserver::SqlServerDialect;

/// Dialect-specific SQL syntax for migration generation.
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// The operation handlers of this dialect.
    fn handlers(&self) -> HandlerTable {
        HandlerTable::ansi()
    }

    /// Delimits an identifier, escaping the delimiter.
    fn delimit_identifier(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    /// Delimits a possibly schema-qualified name.
    fn delimit_qualified(&self, name: &str, schema: Option<&str>) -> String {
        match schema {
            Some(schema) => format!(
                "{}.{}",
                self.delimit_identifier(schema),
                self.delimit_identifier(name)
            ),
            None => self.delimit_identifier(name),
        }
    }

    fn statement_terminator(&self) -> &'static str {
        ";"
    }

    /// The token separating batches in a script, if the dialect has one.
    fn batch_terminator(&self) -> Option<&'static str> {
        None
    }

    /// Maps a value type and the column's facets to a store type.
    fn store_type(&self, clr_type: PrimitiveType, column: &ColumnOperation) -> String;

    fn string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn bool_literal(&self, value: bool) -> String {
        if value { "TRUE" } else { "FALSE" }.to_string()
    }

    fn literal(&self, value: &Literal) -> String {
        match value {
            Literal::Null => "NULL".to_string(),
            Literal::Bool(b) => self.bool_literal(*b),
            Literal::Int(i) => i.to_string(),
            Literal::Float(f) => {
                let text = f.to_string();
                if text.contains(['.', 'e', 'E']) || !f.is_finite() {
                    text
                } else {
                    format!("{text}.0")
                }
            }
            Literal::Text(s) => self.string_literal(s),
        }
    }

    /// Text appended to the definition of an identity column.
    fn identity_clause(&self) -> Option<&'static str> {
        None
    }

    /// ` CLUSTERED` / ` NONCLUSTERED` style traits of keys and indexes,
    /// with a leading space, or nothing.
    fn clustering(&self, clustered: Option<bool>) -> &'static str {
        let _ = clustered;
        ""
    }
}

/// Looks a dialect up by name, as accepted on the command line.
#[must_use]
pub fn by_name(name: &str) -> Option<Box<dyn Dialect>> {
    match name.to_ascii_lowercase().as_str() {
        "ansi" => Some(Box::new(AnsiDialect::new())),
        "sqlserver" | "mssql" => Some(Box::new(SqlServerDialect::new())),
        "postgres" | "postgresql" => Some(Box::new(PostgresDialect::new())),
        "sqlite" => Some(Box::new(SqliteDialect::new())),
        _ => None,
    }
}

/// Names accepted by [`by_name`].
pub const DIALECT_NAMES: &[&str] = &["ansi", "sqlserver", "postgresql", "sqlite"];
