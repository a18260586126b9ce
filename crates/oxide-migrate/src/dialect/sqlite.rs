//! SQLite.
//!
//! SQLite has no schemas and only a handful of `ALTER TABLE` forms, so most
//! constraint and sequence operations are rejected. Table rebuilds are left
//! to the caller.

use oxide_model::reflect::PrimitiveType;

use super::Dialect;
use crate::command::MigrationCommandListBuilder as Builder;
use crate::error::Result;
use crate::generator::{ansi, handler, Generation, HandlerTable};
use crate::operations::{
    ColumnOperation, CreateTableOperation, DropIndexOperation, MigrationOperation, OperationKind,
    RenameColumnOperation, RenameTableOperation,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

const UNSUPPORTED: &[OperationKind] = &[
    OperationKind::AlterColumn,
    OperationKind::RenameIndex,
    OperationKind::AddPrimaryKey,
    OperationKind::DropPrimaryKey,
    OperationKind::AddForeignKey,
    OperationKind::DropForeignKey,
    OperationKind::AddUniqueConstraint,
    OperationKind::DropUniqueConstraint,
    OperationKind::CreateCheckConstraint,
    OperationKind::DropCheckConstraint,
    OperationKind::CreateSequence,
    OperationKind::AlterSequence,
    OperationKind::DropSequence,
    OperationKind::RenameSequence,
    OperationKind::RestartSequence,
];

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn handlers(&self) -> HandlerTable {
        use OperationKind as K;

        let mut table = HandlerTable::ansi();
        let origin = self.name();
        table
            .set(K::EnsureSchema, origin, ignore_schema)
            .set(K::DropSchema, origin, ignore_schema)
            .set(K::CreateTable, origin, handler!(CreateTable, create_table, terminate))
            .set(K::RenameTable, origin, handler!(RenameTable, rename_table))
            .set(K::RenameColumn, origin, handler!(RenameColumn, rename_column))
            .set(K::DropIndex, origin, handler!(DropIndex, drop_index, terminate));
        for kind in UNSUPPORTED {
            table.set(*kind, origin, not_supported);
        }
        table
    }

    fn delimit_qualified(&self, name: &str, _schema: Option<&str>) -> String {
        self.delimit_identifier(name)
    }

    fn store_type(&self, clr_type: PrimitiveType, _column: &ColumnOperation) -> String {
        match clr_type {
            PrimitiveType::Bool
            | PrimitiveType::Int16
            | PrimitiveType::Int32
            | PrimitiveType::Int64 => "INTEGER",
            PrimitiveType::Float32 | PrimitiveType::Float64 => "REAL",
            PrimitiveType::Bytes => "BLOB",
            PrimitiveType::Decimal
            | PrimitiveType::String
            | PrimitiveType::Guid
            | PrimitiveType::DateTime
            | PrimitiveType::Date
            | PrimitiveType::Time => "TEXT",
        }
        .to_string()
    }

    fn bool_literal(&self, value: bool) -> String {
        u8::from(value).to_string()
    }
}

fn ignore_schema(
    _: &mut Generation<'_>,
    _: &MigrationOperation,
    _: &mut Builder,
) -> Result<()> {
    Ok(())
}

fn not_supported(g: &mut Generation<'_>, op: &MigrationOperation, _: &mut Builder) -> Result<()> {
    let reason = match op.kind() {
        OperationKind::CreateSequence
        | OperationKind::AlterSequence
        | OperationKind::DropSequence
        | OperationKind::RenameSequence
        | OperationKind::RestartSequence => "SQLite has no sequences",
        OperationKind::RenameIndex => "indexes must be dropped and created again",
        _ => "the table must be rebuilt",
    };
    Err(g.not_supported(op.kind(), reason))
}

/// A single identity column key becomes an inline `AUTOINCREMENT` key.
fn create_table(
    g: &mut Generation<'_>,
    op: &CreateTableOperation,
    b: &mut Builder,
    terminate: bool,
) -> Result<()> {
    let inline_key = op.primary_key.as_ref().filter(|pk| {
        matches!(pk.columns.as_slice(), [column] if op.find_column(column).is_some_and(|c| c.identity))
    });
    let Some(pk) = inline_key else {
        return ansi::create_table(g, op, b, terminate);
    };

    let key_column = pk.columns[0].clone();
    let suffix = format!(" CONSTRAINT {} PRIMARY KEY AUTOINCREMENT", g.delimit(&pk.name));
    let mut op = op.clone();
    op.primary_key = None;
    ansi::create_table_with(g, &op, b, terminate, |column| {
        (column.name == key_column).then(|| suffix.clone())
    })
}

fn rename_table(g: &mut Generation<'_>, op: &RenameTableOperation, b: &mut Builder) -> Result<()> {
    let Some(new_name) = op.new_name.as_deref().filter(|n| *n != op.name) else {
        return Ok(());
    };
    b.append(format!(
        "ALTER TABLE {} RENAME TO {}",
        g.delimit(&op.name),
        g.delimit(new_name)
    ));
    g.end_statement(b, false);
    Ok(())
}

fn rename_column(g: &mut Generation<'_>, op: &RenameColumnOperation, b: &mut Builder) -> Result<()> {
    b.append(format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {}",
        g.delimit(&op.table),
        g.delimit(&op.name),
        g.delimit(&op.new_name)
    ));
    g.end_statement(b, false);
    Ok(())
}

fn drop_index(
    g: &mut Generation<'_>,
    op: &DropIndexOperation,
    b: &mut Builder,
    terminate: bool,
) -> Result<()> {
    b.append(format!("DROP INDEX {}", g.delimit(&op.name)));
    if terminate {
        g.end_statement(b, false);
    }
    Ok(())
}
