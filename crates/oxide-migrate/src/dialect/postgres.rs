//! PostgreSQL.

use oxide_model::reflect::PrimitiveType;

use super::Dialect;
use crate::command::MigrationCommandListBuilder as Builder;
use crate::error::Result;
use crate::generator::{handler, Generation, HandlerTable};
use crate::operations::{
    AlterColumnOperation, AlterTableOperation, ColumnOperation, CreateIndexOperation,
    DropIndexOperation, EnsureSchemaOperation, OperationKind, RenameColumnOperation,
    RenameIndexOperation, RenameSequenceOperation, RenameTableOperation,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn handlers(&self) -> HandlerTable {
        use OperationKind as K;

        let mut table = HandlerTable::ansi();
        let origin = self.name();
        table
            .set(K::EnsureSchema, origin, handler!(EnsureSchema, ensure_schema))
            .set(K::RenameTable, origin, handler!(RenameTable, rename_table))
            .set(K::AlterTable, origin, handler!(AlterTable, alter_table))
            .set(K::AlterColumn, origin, handler!(AlterColumn, alter_column))
            .set(K::RenameColumn, origin, handler!(RenameColumn, rename_column))
            .set(K::CreateIndex, origin, handler!(CreateIndex, create_index, terminate))
            .set(K::DropIndex, origin, handler!(DropIndex, drop_index, terminate))
            .set(K::RenameIndex, origin, handler!(RenameIndex, rename_index))
            .set(K::RenameSequence, origin, handler!(RenameSequence, rename_sequence));
        table
    }

    fn store_type(&self, clr_type: PrimitiveType, column: &ColumnOperation) -> String {
        match clr_type {
            PrimitiveType::Bool => "boolean".to_string(),
            PrimitiveType::Int16 => "smallint".to_string(),
            PrimitiveType::Int32 => "integer".to_string(),
            PrimitiveType::Int64 => "bigint".to_string(),
            PrimitiveType::Float32 => "real".to_string(),
            PrimitiveType::Float64 => "double precision".to_string(),
            PrimitiveType::Decimal => match (column.precision, column.scale) {
                (Some(p), Some(s)) => format!("numeric({p},{s})"),
                (Some(p), None) => format!("numeric({p})"),
                _ => "numeric".to_string(),
            },
            PrimitiveType::String => match (column.max_length, column.fixed_length) {
                (Some(n), true) => format!("character({n})"),
                (Some(n), false) => format!("character varying({n})"),
                (None, _) => "text".to_string(),
            },
            PrimitiveType::Bytes => "bytea".to_string(),
            PrimitiveType::Guid => "uuid".to_string(),
            PrimitiveType::DateTime => "timestamp without time zone".to_string(),
            PrimitiveType::Date => "date".to_string(),
            PrimitiveType::Time => "time without time zone".to_string(),
        }
    }

    fn identity_clause(&self) -> Option<&'static str> {
        Some(" GENERATED BY DEFAULT AS IDENTITY")
    }
}

fn ensure_schema(g: &mut Generation<'_>, op: &EnsureSchemaOperation, b: &mut Builder) -> Result<()> {
    if op.name == "public" {
        return Ok(());
    }
    b.append(format!("CREATE SCHEMA IF NOT EXISTS {}", g.delimit(&op.name)));
    g.end_statement(b, false);
    Ok(())
}

fn rename_table(g: &mut Generation<'_>, op: &RenameTableOperation, b: &mut Builder) -> Result<()> {
    rename_object(
        g,
        b,
        "TABLE",
        &op.name,
        op.schema.as_deref(),
        op.new_name.as_deref(),
        op.new_schema.as_deref(),
    );
    b.end_command(false);
    Ok(())
}

fn rename_sequence(g: &mut Generation<'_>, op: &RenameSequenceOperation, b: &mut Builder) -> Result<()> {
    rename_object(
        g,
        b,
        "SEQUENCE",
        &op.name,
        op.schema.as_deref(),
        op.new_name.as_deref(),
        op.new_schema.as_deref(),
    );
    b.end_command(false);
    Ok(())
}

/// `RENAME TO`, then `SET SCHEMA` when the schema changes. Without a new
/// schema the object moves to `public`, unless the model predates
/// schema-aware renames.
fn rename_object(
    g: &Generation<'_>,
    b: &mut Builder,
    object: &str,
    name: &str,
    schema: Option<&str>,
    new_name: Option<&str>,
    new_schema: Option<&str>,
) {
    let mut current = name;
    if let Some(new_name) = new_name.filter(|n| *n != name) {
        b.append(format!(
            "ALTER {object} {} RENAME TO {}",
            g.qualified(name, schema),
            g.delimit(new_name)
        ));
        g.terminate(b);
        current = new_name;
    }

    let legacy = g.compatibility().legacy_rename;
    if new_schema != schema && (new_schema.is_some() || !legacy) {
        b.append(format!(
            "ALTER {object} {} SET SCHEMA {}",
            g.qualified(current, schema),
            g.delimit(new_schema.unwrap_or("public"))
        ));
        g.terminate(b);
    }
}

fn alter_table(g: &mut Generation<'_>, op: &AlterTableOperation, b: &mut Builder) -> Result<()> {
    if op.comment == op.old_comment {
        return Ok(());
    }
    let comment = op
        .comment
        .as_deref()
        .map_or_else(|| "NULL".to_string(), |c| g.dialect().string_literal(c));
    b.append(format!(
        "COMMENT ON TABLE {} IS {comment}",
        g.qualified(&op.name, op.schema.as_deref())
    ));
    g.end_statement(b, false);
    Ok(())
}

/// One `ALTER COLUMN` statement per changed facet.
fn alter_column(g: &mut Generation<'_>, op: &AlterColumnOperation, b: &mut Builder) -> Result<()> {
    let column = &op.column;
    let old = &op.old_column;
    if column.computed_sql.is_some() || old.computed_sql.is_some() {
        return Err(g.not_supported(
            OperationKind::AlterColumn,
            format!(
                "computed column '{}.{}' must be dropped and added again",
                column.table, column.name
            ),
        ));
    }

    let alter = format!(
        "ALTER TABLE {} ALTER COLUMN {}",
        g.qualified(&column.table, column.schema.as_deref()),
        g.delimit(&column.name)
    );
    let store_type = g.column_type(column)?;
    let compare = g.compatibility().old_column_supported;

    let old_type = old
        .column_type
        .clone()
        .or_else(|| old.clr_type.map(|t| g.dialect().store_type(t, old)));
    if !compare || old_type.as_deref() != Some(store_type.as_str()) {
        b.append(format!("{alter} TYPE {store_type}"));
        g.terminate(b);
    }

    if !compare || column.nullable != old.nullable {
        let change = if column.nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
        b.append(format!("{alter} {change}"));
        g.terminate(b);
    }

    if !compare || column.default_value != old.default_value || column.default_sql != old.default_sql {
        if let Some(sql) = &column.default_sql {
            b.append(format!("{alter} SET DEFAULT ({sql})"));
        } else if let Some(value) = &column.default_value {
            b.append(format!("{alter} SET DEFAULT {}", g.dialect().literal(value)));
        } else {
            b.append(format!("{alter} DROP DEFAULT"));
        }
        g.terminate(b);
    }

    if compare && column.identity != old.identity {
        if column.identity {
            b.append(format!("{alter} ADD GENERATED BY DEFAULT AS IDENTITY"));
        } else {
            b.append(format!("{alter} DROP IDENTITY"));
        }
        g.terminate(b);
    }

    b.end_command(false);
    Ok(())
}

fn rename_column(g: &mut Generation<'_>, op: &RenameColumnOperation, b: &mut Builder) -> Result<()> {
    b.append(format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {}",
        g.qualified(&op.table, op.schema.as_deref()),
        g.delimit(&op.name),
        g.delimit(&op.new_name)
    ));
    g.end_statement(b, false);
    Ok(())
}

fn create_index(
    g: &mut Generation<'_>,
    op: &CreateIndexOperation,
    b: &mut Builder,
    terminate: bool,
) -> Result<()> {
    b.append(format!(
        "CREATE {}INDEX {} ON {} ({})",
        if op.unique { "UNIQUE " } else { "" },
        g.delimit(&op.name),
        g.qualified(&op.table, op.schema.as_deref()),
        g.column_list(&op.columns)
    ));
    if !op.include.is_empty() {
        b.append(format!(" INCLUDE ({})", g.column_list(&op.include)));
    }
    if let Some(filter) = &op.filter {
        b.append(format!(" WHERE {filter}"));
    }
    if terminate {
        g.end_statement(b, false);
    }
    Ok(())
}

/// Indexes live in their table's schema, so the table itself is not needed.
fn drop_index(
    g: &mut Generation<'_>,
    op: &DropIndexOperation,
    b: &mut Builder,
    terminate: bool,
) -> Result<()> {
    b.append(format!(
        "DROP INDEX {}",
        g.qualified(&op.name, op.schema.as_deref())
    ));
    if terminate {
        g.end_statement(b, false);
    }
    Ok(())
}

fn rename_index(g: &mut Generation<'_>, op: &RenameIndexOperation, b: &mut Builder) -> Result<()> {
    b.append(format!(
        "ALTER INDEX {} RENAME TO {}",
        g.qualified(&op.name, op.schema.as_deref()),
        g.delimit(&op.new_name)
    ));
    g.end_statement(b, false);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_types() {
        let dialect = PostgresDialect::new();
        let column = ColumnOperation::new("t", "c").max_length(40);
        assert_eq!(
            dialect.store_type(PrimitiveType::String, &column),
            "character varying(40)"
        );
        assert_eq!(
            dialect.store_type(PrimitiveType::DateTime, &column),
            "timestamp without time zone"
        );
        assert_eq!(dialect.bool_literal(false), "FALSE");
    }
}
