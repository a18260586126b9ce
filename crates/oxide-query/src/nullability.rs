//! Column nullability facts.

use std::collections::BTreeMap;

use oxide_model::FrozenModel;

/// Answers whether a column may hold NULL.
pub trait NullabilityProvider {
    /// `Some(nullable)` for a mapped column, `None` when the column is
    /// unknown. Without a table, any table holding the column counts.
    fn is_nullable(&self, table: Option<&str>, column: &str) -> Option<bool>;
}

impl NullabilityProvider for FrozenModel {
    fn is_nullable(&self, table: Option<&str>, column: &str) -> Option<bool> {
        if let Some(table) = table {
            return self.find_column(table, column).map(|p| p.nullable);
        }
        // An unqualified name may be mapped by several tables; nullable in
        // any of them makes it nullable.
        self.tables()
            .into_iter()
            .filter_map(|table| self.find_column(table, column))
            .map(|p| p.nullable)
            .reduce(|a, b| a || b)
    }
}

/// Nullability facts listed by hand.
#[derive(Debug, Clone, Default)]
pub struct ColumnNullability {
    columns: BTreeMap<(String, String), bool>,
}

impl ColumnNullability {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn column(mut self, table: impl Into<String>, column: impl Into<String>, nullable: bool) -> Self {
        self.columns.insert((table.into(), column.into()), nullable);
        self
    }
}

impl NullabilityProvider for ColumnNullability {
    fn is_nullable(&self, table: Option<&str>, column: &str) -> Option<bool> {
        self.columns
            .iter()
            .filter(|((t, c), _)| c == column && table.map_or(true, |table| t == table))
            .map(|(_, nullable)| *nullable)
            .reduce(|a, b| a || b)
    }
}
