//! Error types for predicate rewriting and rendering.

/// Errors raised while rewriting or rendering an expression.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// A column the nullability provider does not map, in strict mode.
    #[error("Unknown column '{column}'{}", table.as_ref().map(|t| format!(" of table '{t}'")).unwrap_or_default())]
    UnknownColumn {
        /// The table the column was looked up in.
        table: Option<String>,
        /// The column name.
        column: String,
    },

    /// `IN` with an empty value list has no SQL form.
    #[error("IN list of '{0}' is empty")]
    EmptyInList(String),

    /// `CASE` needs at least one `WHEN` clause.
    #[error("CASE expression has no WHEN clause")]
    EmptyCase,
}

/// Result type for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;
