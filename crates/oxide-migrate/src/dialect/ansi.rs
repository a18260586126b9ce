//! Standard SQL.

use oxide_model::reflect::PrimitiveType;

use super::Dialect;
use crate::operations::ColumnOperation;

/// Standard SQL with `"..."` identifiers, used as the common base of the
/// other dialects and on its own for portable scripts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiDialect;

impl AnsiDialect {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for AnsiDialect {
    fn name(&self) -> &'static str {
        "ansi"
    }

    fn store_type(&self, clr_type: PrimitiveType, column: &ColumnOperation) -> String {
        match clr_type {
            PrimitiveType::Bool => "BOOLEAN".to_string(),
            PrimitiveType::Int16 => "SMALLINT".to_string(),
            PrimitiveType::Int32 => "INTEGER".to_string(),
            PrimitiveType::Int64 => "BIGINT".to_string(),
            PrimitiveType::Float32 => "REAL".to_string(),
            PrimitiveType::Float64 => "DOUBLE PRECISION".to_string(),
            PrimitiveType::Decimal => match (column.precision, column.scale) {
                (Some(p), Some(s)) => format!("DECIMAL({p}, {s})"),
                (Some(p), None) => format!("DECIMAL({p})"),
                _ => "DECIMAL".to_string(),
            },
            PrimitiveType::String => match (column.max_length, column.fixed_length) {
                (Some(n), true) => format!("CHAR({n})"),
                (Some(n), false) => format!("VARCHAR({n})"),
                (None, _) => "TEXT".to_string(),
            },
            PrimitiveType::Bytes => column
                .max_length
                .map_or_else(|| "BLOB".to_string(), |n| format!("VARBINARY({n})")),
            PrimitiveType::Guid => "CHAR(36)".to_string(),
            PrimitiveType::DateTime => "TIMESTAMP".to_string(),
            PrimitiveType::Date => "DATE".to_string(),
            PrimitiveType::Time => "TIME".to_string(),
        }
    }

    fn identity_clause(&self) -> Option<&'static str> {
        Some(" GENERATED BY DEFAULT AS IDENTITY")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::Literal;

    #[test]
    fn test_literals() {
        let dialect = AnsiDialect::new();
        assert_eq!(dialect.string_literal("it's"), "'it''s'");
        assert_eq!(dialect.literal(&Literal::Float(2.0)), "2.0");
        assert_eq!(dialect.literal(&Literal::Float(1.5)), "1.5");
        assert_eq!(dialect.delimit_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(
            dialect.delimit_qualified("Widgets", Some("sales")),
            "\"sales\".\"Widgets\""
        );
    }

    #[test]
    fn test_store_types_follow_facets() {
        let dialect = AnsiDialect::new();
        let column = ColumnOperation::new("t", "c").max_length(20);
        assert_eq!(dialect.store_type(PrimitiveType::String, &column), "VARCHAR(20)");
        let column = ColumnOperation::new("t", "c").precision(10, 2);
        assert_eq!(dialect.store_type(PrimitiveType::Decimal, &column), "DECIMAL(10, 2)");
    }
}
