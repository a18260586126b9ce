//! Predicates with selectable null semantics.
//!
//! `oxide-query` builds filter expressions the way application code thinks
//! about them and renders SQL that evaluates them faithfully:
//!
//! - **Expressions** - a small predicate/value tree with a fluent builder
//! - **Nullability** - column facts from a frozen model or listed by hand
//! - **Rewriting** - two-valued null semantics (NULL equals NULL, no unknown
//!   results) expanded into the null tests SQL needs, or relational semantics
//!   left untouched
//! - **Queries** - single-table `SELECT`s choosing their semantics per query
//!
//! # Example
//!
//! ```rust
//! use oxide_query::prelude::*;
//!
//! let facts = ColumnNullability::new()
//!     .column("Blogs", "Title", true)
//!     .column("Blogs", "Subtitle", true);
//!
//! let query = Query::from_table("Blogs")
//!     .filter(Expr::column("Title").eq(Expr::column("Subtitle")));
//!
//! assert_eq!(
//!     query.to_sql(&facts).unwrap(),
//!     "SELECT * FROM \"Blogs\" WHERE \"Title\" = \"Subtitle\" \
//!      OR (\"Title\" IS NULL AND \"Subtitle\" IS NULL)"
//! );
//!
//! assert_eq!(
//!     query.relational_nulls().to_sql(&facts).unwrap(),
//!     "SELECT * FROM \"Blogs\" WHERE \"Title\" = \"Subtitle\""
//! );
//! ```

pub mod error;
pub mod expr;
pub mod nullability;
pub mod query;
pub mod render;
pub mod rewrite;

pub use error::{QueryError, Result};
pub use expr::{BinaryOp, Expr, Literal, UnaryOp};
pub use nullability::{ColumnNullability, NullabilityProvider};
pub use query::Query;
pub use render::SqlRenderer;
pub use rewrite::{NullSemantics, NullSemanticsRewriter};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{QueryError, Result};
    pub use crate::expr::{BinaryOp, Expr, Literal, UnaryOp};
    pub use crate::nullability::{ColumnNullability, NullabilityProvider};
    pub use crate::query::Query;
    pub use crate::render::SqlRenderer;
    pub use crate::rewrite::{NullSemantics, NullSemanticsRewriter};
}
