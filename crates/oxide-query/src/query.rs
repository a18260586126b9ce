//! Single-table queries carrying their own null semantics.

use tracing::debug;

use crate::error::Result;
use crate::expr::Expr;
use crate::nullability::NullabilityProvider;
use crate::render::SqlRenderer;
use crate::rewrite::{NullSemantics, NullSemanticsRewriter};

/// A `SELECT` over one table.
///
/// The filter is kept as written and rewritten for the query's
/// [`NullSemantics`] only when SQL is produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    columns: Vec<String>,
    filter: Option<Expr>,
    semantics: NullSemantics,
}

impl Query {
    /// Selects every column of `table`.
    #[must_use]
    pub fn from_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filter: None,
            semantics: NullSemantics::default(),
        }
    }

    /// Sets the projected columns.
    #[must_use]
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    /// Adds a filter, combined with AND with any earlier one.
    #[must_use]
    pub fn filter(mut self, predicate: Expr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    #[must_use]
    pub const fn null_semantics(mut self, semantics: NullSemantics) -> Self {
        self.semantics = semantics;
        self
    }

    /// Compares with the database's three-valued logic.
    #[must_use]
    pub const fn relational_nulls(self) -> Self {
        self.null_semantics(NullSemantics::Relational)
    }

    #[must_use]
    pub const fn semantics(&self) -> NullSemantics {
        self.semantics
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub const fn filter_expr(&self) -> Option<&Expr> {
        self.filter.as_ref()
    }

    /// Renders the query with double-quoted identifiers.
    ///
    /// # Errors
    ///
    /// Returns any rewriting or rendering error of the filter.
    pub fn to_sql(&self, provider: &dyn NullabilityProvider) -> Result<String> {
        self.to_sql_with(provider, &SqlRenderer::new())
    }

    /// Renders the query with `renderer`.
    ///
    /// # Errors
    ///
    /// Returns any rewriting or rendering error of the filter.
    pub fn to_sql_with(&self, provider: &dyn NullabilityProvider, renderer: &SqlRenderer) -> Result<String> {
        let projection = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|c| renderer.quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut sql = format!(
            "SELECT {projection} FROM {}",
            renderer.quote_identifier(&self.table)
        );

        if let Some(filter) = &self.filter {
            let rewriter = NullSemanticsRewriter::new(self.semantics, provider).with_table(self.table.as_str());
            let predicate = rewriter.rewrite_predicate(filter)?;
            sql.push_str(" WHERE ");
            sql.push_str(&renderer.render(&predicate)?);
        }

        debug!(table = %self.table, semantics = ?self.semantics, "Rendered query");
        Ok(sql)
    }
}
