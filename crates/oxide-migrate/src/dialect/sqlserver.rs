//! Microsoft SQL Server.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use oxide_model::reflect::PrimitiveType;
use regex::Regex;

use super::Dialect;
use crate::command::MigrationCommandListBuilder as Builder;
use crate::error::{MigrationError, Result};
use crate::generator::{ansi, handler, Generation, HandlerTable};
use crate::operations::{
    AlterColumnOperation, AlterTableOperation, ColumnOperation, CreateIndexOperation,
    CreateTableOperation, DropColumnOperation, DropIndexOperation, EnsureSchemaOperation,
    InsertDataOperation, MigrationOperation, OperationKind, RenameColumnOperation,
    RenameIndexOperation, RenameSequenceOperation, RenameTableOperation, SqlOperation,
};

/// A `GO` line, optionally with a repeat count.
static BATCH_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*GO(?:[ \t]+([0-9]+))?\s*$").expect("Invalid batch separator regex")
});

const DEFAULT_SCHEMA: &str = "dbo";

/// SQL Server: `[...]` identifiers, `GO` batches, identity columns and
/// memory-optimized tables.
#[derive(Debug, Clone, Copy)]
pub struct SqlServerDialect {
    /// Honor the count in `GO n` by repeating the preceding batch.
    pub batch_separator_repeat: bool,
}

impl Default for SqlServerDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlServerDialect {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            batch_separator_repeat: true,
        }
    }

    #[must_use]
    pub const fn batch_separator_repeat(mut self, repeat: bool) -> Self {
        self.batch_separator_repeat = repeat;
        self
    }
}

impl Dialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn handlers(&self) -> HandlerTable {
        use OperationKind as K;

        let mut table = HandlerTable::ansi();
        let origin = self.name();
        table
            .set(K::EnsureSchema, origin, handler!(EnsureSchema, ensure_schema))
            .set(K::CreateTable, origin, handler!(CreateTable, create_table, terminate))
            .set(K::RenameTable, origin, handler!(RenameTable, rename_table))
            .set(K::AlterTable, origin, handler!(AlterTable, alter_table))
            .set(K::DropColumn, origin, handler!(DropColumn, drop_column, terminate))
            .set(K::AlterColumn, origin, handler!(AlterColumn, alter_column))
            .set(K::RenameColumn, origin, handler!(RenameColumn, rename_column))
            .set(K::CreateIndex, origin, handler!(CreateIndex, create_index, terminate))
            .set(K::DropIndex, origin, handler!(DropIndex, drop_index, terminate))
            .set(K::RenameIndex, origin, handler!(RenameIndex, rename_index))
            .set(K::RenameSequence, origin, handler!(RenameSequence, rename_sequence))
            .set(K::InsertData, origin, handler!(InsertData, insert_data));
        if self.batch_separator_repeat {
            table.set(K::Sql, origin, handler!(Sql, sql_repeating));
        } else {
            table.set(K::Sql, origin, handler!(Sql, sql_once));
        }
        table
    }

    fn delimit_identifier(&self, identifier: &str) -> String {
        format!("[{}]", identifier.replace(']', "]]"))
    }

    fn batch_terminator(&self) -> Option<&'static str> {
        Some("GO")
    }

    fn store_type(&self, clr_type: PrimitiveType, column: &ColumnOperation) -> String {
        match clr_type {
            PrimitiveType::Bool => "bit".to_string(),
            PrimitiveType::Int16 => "smallint".to_string(),
            PrimitiveType::Int32 => "int".to_string(),
            PrimitiveType::Int64 => "bigint".to_string(),
            PrimitiveType::Float32 => "real".to_string(),
            PrimitiveType::Float64 => "float".to_string(),
            PrimitiveType::Decimal => format!(
                "decimal({}, {})",
                column.precision.unwrap_or(18),
                column.scale.unwrap_or(2)
            ),
            PrimitiveType::String => {
                let unicode = column.unicode.unwrap_or(true);
                let base = match (unicode, column.fixed_length) {
                    (true, true) => "nchar",
                    (true, false) => "nvarchar",
                    (false, true) => "char",
                    (false, false) => "varchar",
                };
                column
                    .max_length
                    .map_or_else(|| format!("{base}(max)"), |n| format!("{base}({n})"))
            }
            PrimitiveType::Bytes if column.row_version => "rowversion".to_string(),
            PrimitiveType::Bytes => column
                .max_length
                .map_or_else(|| "varbinary(max)".to_string(), |n| format!("varbinary({n})")),
            PrimitiveType::Guid => "uniqueidentifier".to_string(),
            PrimitiveType::DateTime => "datetime2".to_string(),
            PrimitiveType::Date => "date".to_string(),
            PrimitiveType::Time => "time".to_string(),
        }
    }

    fn string_literal(&self, value: &str) -> String {
        format!("N'{}'", value.replace('\'', "''"))
    }

    fn bool_literal(&self, value: bool) -> String {
        format!("CAST({} AS bit)", u8::from(value))
    }

    fn identity_clause(&self) -> Option<&'static str> {
        Some(" IDENTITY")
    }

    fn clustering(&self, clustered: Option<bool>) -> &'static str {
        match clustered {
            Some(true) => " CLUSTERED",
            Some(false) => " NONCLUSTERED",
            None => "",
        }
    }
}

fn ensure_schema(g: &mut Generation<'_>, op: &EnsureSchemaOperation, b: &mut Builder) -> Result<()> {
    if op.name == DEFAULT_SCHEMA {
        return Ok(());
    }
    let dialect = g.dialect();
    let create = format!("CREATE SCHEMA {};", g.delimit(&op.name));
    b.append(format!(
        "IF SCHEMA_ID({}) IS NULL EXEC({})",
        dialect.string_literal(&op.name),
        dialect.string_literal(&create)
    ));
    g.end_statement(b, false);
    Ok(())
}

fn create_table(
    g: &mut Generation<'_>,
    op: &CreateTableOperation,
    b: &mut Builder,
    terminate: bool,
) -> Result<()> {
    if !op.memory_optimized {
        return ansi::create_table(g, op, b, terminate);
    }

    // Memory-optimized tables cannot have a clustered primary key.
    let mut op = op.clone();
    if let Some(pk) = &mut op.primary_key {
        pk.clustered.get_or_insert(false);
    }
    ansi::create_table(g, &op, b, false)?;
    b.append_line("");
    b.append("WITH (MEMORY_OPTIMIZED = ON)");
    if terminate {
        g.end_statement(b, true);
        b.suppress_following_transactions();
    }
    Ok(())
}

fn rename_table(g: &mut Generation<'_>, op: &RenameTableOperation, b: &mut Builder) -> Result<()> {
    rename_object(
        g,
        b,
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
        &op.name,
        op.schema.as_deref(),
        op.new_name.as_deref(),
        op.new_schema.as_deref(),
    );
    b.end_command(false);
    Ok(())
}

/// `sp_rename` for a new name, then a schema transfer when the schema
/// changes. Models authored before schema-aware renames read a missing new
/// schema as "unchanged" instead of "the default schema".
fn rename_object(
    g: &Generation<'_>,
    b: &mut Builder,
    name: &str,
    schema: Option<&str>,
    new_name: Option<&str>,
    new_schema: Option<&str>,
) {
    let mut current = name;
    if let Some(new_name) = new_name.filter(|n| *n != name) {
        sp_rename(g, b, &g.qualified(name, schema), new_name, None);
        current = new_name;
    }

    let legacy = g.compatibility().legacy_rename;
    if new_schema != schema && (new_schema.is_some() || !legacy) {
        transfer(g, b, current, schema, new_schema);
    }
}

fn sp_rename(g: &Generation<'_>, b: &mut Builder, qualified: &str, new_name: &str, kind: Option<&str>) {
    let dialect = g.dialect();
    b.append(format!(
        "EXEC sp_rename {}, {}",
        dialect.string_literal(qualified),
        dialect.string_literal(new_name)
    ));
    if let Some(kind) = kind {
        b.append(format!(", {}", dialect.string_literal(kind)));
    }
    g.terminate(b);
}

fn transfer(g: &Generation<'_>, b: &mut Builder, name: &str, schema: Option<&str>, new_schema: Option<&str>) {
    let object = g.qualified(name, schema);
    if let Some(new_schema) = new_schema {
        b.append(format!(
            "ALTER SCHEMA {} TRANSFER {object}",
            g.delimit(new_schema)
        ));
        g.terminate(b);
        return;
    }

    b.append_line("DECLARE @defaultSchema sysname = SCHEMA_NAME();");
    b.append(format!(
        "EXEC(N'ALTER SCHEMA [' + @defaultSchema + N'] TRANSFER {};')",
        object.replace('\'', "''")
    ));
    g.terminate(b);
}

fn alter_table(g: &mut Generation<'_>, op: &AlterTableOperation, _: &mut Builder) -> Result<()> {
    if op.memory_optimized != op.old_memory_optimized {
        return Err(g.not_supported(
            OperationKind::AlterTable,
            format!(
                "table '{}' cannot be switched to or from memory-optimized; rebuild it instead",
                op.name
            ),
        ));
    }
    Ok(())
}

fn drop_column(
    g: &mut Generation<'_>,
    op: &DropColumnOperation,
    b: &mut Builder,
    terminate: bool,
) -> Result<()> {
    drop_default_constraint(g, &op.table, op.schema.as_deref(), &op.name, b);
    ansi::drop_column(g, op, b, terminate)
}

/// Drops the default constraint of a column, whose name is looked up in the
/// catalog since unnamed defaults get generated names.
fn drop_default_constraint(
    g: &mut Generation<'_>,
    table: &str,
    schema: Option<&str>,
    column: &str,
    b: &mut Builder,
) {
    let variable = g.next_variable();
    let dialect = g.dialect();
    let table = g.qualified(table, schema);
    b.append_line(format!("DECLARE {variable} sysname;"));
    b.append_line(format!("SELECT {variable} = [d].[name]"));
    b.append_line("FROM [sys].[default_constraints] [d]");
    b.append_line(
        "INNER JOIN [sys].[columns] [c] ON [d].[parent_column_id] = [c].[column_id] AND [d].[parent_object_id] = [c].[object_id]",
    );
    b.append_line(format!(
        "WHERE ([d].[parent_object_id] = OBJECT_ID({}) AND [c].[name] = {});",
        dialect.string_literal(&table),
        dialect.string_literal(column)
    ));
    b.append_line(format!(
        "IF {variable} IS NOT NULL EXEC(N'ALTER TABLE {} DROP CONSTRAINT [' + {variable} + '];');",
        table.replace('\'', "''")
    ));
}

fn alter_column(g: &mut Generation<'_>, op: &AlterColumnOperation, b: &mut Builder) -> Result<()> {
    let column = &op.column;
    let old = &op.old_column;
    let table = g.qualified(&column.table, column.schema.as_deref());

    if column.computed_sql.is_some() || old.computed_sql.is_some() {
        // A computed column cannot be altered in place: rebuild it.
        let indexes = indexes_to_rebuild(g, column);
        drop_indexes(g, column, &indexes, b)?;
        let drop = DropColumnOperation {
            name: column.name.clone(),
            table: column.table.clone(),
            schema: column.schema.clone(),
        };
        drop_column(g, &drop, b, false)?;
        g.terminate(b);
        ansi::add_column(g, column, b, false)?;
        g.terminate(b);
        create_indexes(g, &indexes, b)?;
        b.end_command(false);
        return Ok(());
    }

    let narrowed = if g.compatibility().old_column_supported {
        if column.identity != old.identity {
            return Err(g.not_supported(
                OperationKind::AlterColumn,
                format!(
                    "IDENTITY cannot be added to or removed from column '{}.{}'",
                    column.table, column.name
                ),
            ));
        }
        let new_type = g.column_type(column)?;
        let old_type = old
            .column_type
            .clone()
            .or_else(|| old.clr_type.map(|t| g.dialect().store_type(t, old)));
        old_type.as_deref() != Some(new_type.as_str()) || (old.nullable && !column.nullable)
    } else {
        false
    };

    let indexes = if narrowed {
        indexes_to_rebuild(g, column)
    } else {
        Vec::new()
    };
    drop_indexes(g, column, &indexes, b)?;

    drop_default_constraint(g, &column.table, column.schema.as_deref(), &column.name, b);

    let mut definition = column.clone();
    definition.default_value = None;
    definition.default_sql = None;
    definition.identity = false;
    b.append(format!("ALTER TABLE {table} ALTER COLUMN "));
    ansi::column_definition(g, &definition, b)?;
    g.terminate(b);

    if column.has_default() {
        b.append(format!("ALTER TABLE {table} ADD"));
        ansi::default_value(g, column, b);
        b.append(format!(" FOR {}", g.delimit(&column.name)));
        g.terminate(b);
    }

    create_indexes(g, &indexes, b)?;
    b.end_command(false);
    Ok(())
}

/// Model indexes over `column`, minus those a later operation of this call
/// creates again anyway.
fn indexes_to_rebuild(g: &Generation<'_>, column: &ColumnOperation) -> Vec<CreateIndexOperation> {
    let Some(model) = g.model() else {
        return Vec::new();
    };
    let recreated: BTreeSet<&str> = g
        .remaining()
        .iter()
        .filter_map(|op| match op {
            MigrationOperation::CreateIndex(index) => Some(index.name.as_str()),
            _ => None,
        })
        .collect();

    model
        .indexes_on(&column.table, &column.name)
        .filter(|index| !recreated.contains(index.name.as_str()))
        .map(|index| CreateIndexOperation {
            name: index.name.clone(),
            table: index.table.clone(),
            schema: column.schema.clone(),
            columns: index.columns.clone(),
            unique: index.unique,
            filter: None,
            include: index.include.clone(),
            clustered: None,
        })
        .collect()
}

fn drop_indexes(
    g: &mut Generation<'_>,
    column: &ColumnOperation,
    indexes: &[CreateIndexOperation],
    b: &mut Builder,
) -> Result<()> {
    for index in indexes {
        let drop = DropIndexOperation {
            name: index.name.clone(),
            table: Some(column.table.clone()),
            schema: column.schema.clone(),
        };
        drop_index(g, &drop, b, false)?;
        g.terminate(b);
    }
    Ok(())
}

fn create_indexes(g: &mut Generation<'_>, indexes: &[CreateIndexOperation], b: &mut Builder) -> Result<()> {
    for index in indexes {
        create_index(g, index, b, false)?;
        g.terminate(b);
    }
    Ok(())
}

fn rename_column(g: &mut Generation<'_>, op: &RenameColumnOperation, b: &mut Builder) -> Result<()> {
    let qualified = format!(
        "{}.{}",
        g.qualified(&op.table, op.schema.as_deref()),
        g.delimit(&op.name)
    );
    sp_rename(g, b, &qualified, &op.new_name, Some("COLUMN"));
    b.end_command(false);
    Ok(())
}

fn create_index(
    g: &mut Generation<'_>,
    op: &CreateIndexOperation,
    b: &mut Builder,
    terminate: bool,
) -> Result<()> {
    let filter = match (&op.filter, op.unique) {
        (Some(filter), _) => Some(filter.clone()),
        (None, true) => nullable_filter(g, op),
        (None, false) => None,
    };

    b.append(format!(
        "CREATE{}{} INDEX {} ON {} ({})",
        if op.unique { " UNIQUE" } else { "" },
        g.dialect().clustering(op.clustered),
        g.delimit(&op.name),
        g.qualified(&op.table, op.schema.as_deref()),
        g.column_list(&op.columns)
    ));
    if !op.include.is_empty() {
        b.append(format!(" INCLUDE ({})", g.column_list(&op.include)));
    }
    if let Some(filter) = filter {
        b.append(format!(" WHERE {filter}"));
    }
    if terminate {
        g.end_statement(b, false);
    }
    Ok(())
}

/// SQL Server treats NULL as a value in unique indexes, so a unique index
/// over nullable columns only covers the non-null rows.
fn nullable_filter(g: &Generation<'_>, op: &CreateIndexOperation) -> Option<String> {
    let model = g.model()?;
    let nullable: Vec<String> = op
        .columns
        .iter()
        .filter(|c| model.find_column(&op.table, c).is_some_and(|p| p.nullable))
        .map(|c| format!("{} IS NOT NULL", g.delimit(c)))
        .collect();
    (!nullable.is_empty()).then(|| nullable.join(" AND "))
}

fn drop_index(
    g: &mut Generation<'_>,
    op: &DropIndexOperation,
    b: &mut Builder,
    terminate: bool,
) -> Result<()> {
    let table = op.table.as_deref().ok_or_else(|| {
        MigrationError::precondition(
            OperationKind::DropIndex,
            format!("index '{}' needs its table to be dropped", op.name),
        )
    })?;
    b.append(format!(
        "DROP INDEX {} ON {}",
        g.delimit(&op.name),
        g.qualified(table, op.schema.as_deref())
    ));
    if terminate {
        g.end_statement(b, false);
    }
    Ok(())
}

fn rename_index(g: &mut Generation<'_>, op: &RenameIndexOperation, b: &mut Builder) -> Result<()> {
    let table = op.table.as_deref().ok_or_else(|| {
        MigrationError::precondition(
            OperationKind::RenameIndex,
            format!("index '{}' needs its table to be renamed", op.name),
        )
    })?;
    let qualified = format!(
        "{}.{}",
        g.qualified(table, op.schema.as_deref()),
        g.delimit(&op.name)
    );
    sp_rename(g, b, &qualified, &op.new_name, Some("INDEX"));
    b.end_command(false);
    Ok(())
}

fn insert_data(g: &mut Generation<'_>, op: &InsertDataOperation, b: &mut Builder) -> Result<()> {
    let dialect = g.dialect();
    let table = g.qualified(&op.table, op.schema.as_deref());
    let names = op
        .columns
        .iter()
        .map(|c| dialect.string_literal(c))
        .collect::<Vec<_>>()
        .join(", ");
    let guard = format!(
        "IF EXISTS (SELECT * FROM [sys].[identity_columns] WHERE [name] IN ({names}) AND [object_id] = OBJECT_ID({}))",
        dialect.string_literal(&table)
    );

    b.append_line(&guard);
    b.indented(|b| {
        b.append_line(format!("SET IDENTITY_INSERT {table} ON;"));
    });
    ansi::insert_rows(g, op, b);
    b.append_line(&guard);
    b.indented(|b| {
        b.append_line(format!("SET IDENTITY_INSERT {table} OFF;"));
    });
    b.end_command(false);
    Ok(())
}

fn sql_repeating(_: &mut Generation<'_>, op: &SqlOperation, b: &mut Builder) -> Result<()> {
    split_batches(op, b, true);
    Ok(())
}

fn sql_once(_: &mut Generation<'_>, op: &SqlOperation, b: &mut Builder) -> Result<()> {
    split_batches(op, b, false);
    Ok(())
}

/// Splits on `GO` lines, each batch becoming a command. `GO n` emits the
/// preceding batch `n` times when `repeat` is set.
fn split_batches(op: &SqlOperation, b: &mut Builder, repeat: bool) {
    let sql = op.sql.replace("\\\r\n", "").replace("\\\n", "");
    let mut batch = String::new();
    for line in sql.lines() {
        let Some(captures) = BATCH_SEPARATOR.captures(line) else {
            batch.push_str(line);
            batch.push('\n');
            continue;
        };
        let count = captures
            .get(1)
            .and_then(|c| c.as_str().parse::<usize>().ok())
            .filter(|_| repeat)
            .unwrap_or(1);
        for _ in 0..count {
            append_batch(&batch, op.suppress_transaction, b);
        }
        batch.clear();
    }
    append_batch(&batch, op.suppress_transaction, b);
}

fn append_batch(batch: &str, suppress_transaction: bool, b: &mut Builder) {
    if batch.trim().is_empty() {
        return;
    }
    b.append(batch);
    b.end_command(suppress_transaction);
}
