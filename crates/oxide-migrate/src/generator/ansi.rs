//! Base handlers producing standard SQL.
//!
//! Dialects register these for the operations they do not generate
//! differently, and call the building blocks (`column_definition`, the
//! constraint clauses) from their own handlers.

use crate::command::MigrationCommandListBuilder as Builder;
use crate::error::Result;
use crate::operations::{
    AddForeignKeyOperation, AddPrimaryKeyOperation, AddUniqueConstraintOperation,
    AlterColumnOperation, AlterSequenceOperation, AlterTableOperation, ColumnOperation,
    CreateCheckConstraintOperation, CreateIndexOperation, CreateSequenceOperation,
    CreateTableOperation, DeleteDataOperation, DropCheckConstraintOperation, DropColumnOperation,
    DropForeignKeyOperation, DropIndexOperation, DropPrimaryKeyOperation, DropSchemaOperation,
    DropSequenceOperation, DropTableOperation, DropUniqueConstraintOperation,
    EnsureSchemaOperation, InsertDataOperation, Literal, OperationKind, ReferentialAction,
    RenameColumnOperation, RenameIndexOperation, RenameSequenceOperation, RenameTableOperation,
    RestartSequenceOperation, SequenceOptions, SqlOperation, UpdateDataOperation,
};
use oxide_model::reflect::PrimitiveType;

use super::Generation;

pub fn ensure_schema(g: &mut Generation<'_>, _: &EnsureSchemaOperation, _: &mut Builder) -> Result<()> {
    Err(g.not_implemented(OperationKind::EnsureSchema))
}

pub fn drop_schema(g: &mut Generation<'_>, op: &DropSchemaOperation, b: &mut Builder) -> Result<()> {
    b.append(format!("DROP SCHEMA {}", g.delimit(&op.name)));
    g.end_statement(b, false);
    Ok(())
}

pub fn create_table(
    g: &mut Generation<'_>,
    op: &CreateTableOperation,
    b: &mut Builder,
    terminate: bool,
) -> Result<()> {
    create_table_with(g, op, b, terminate, |_| None)
}

/// `create_table` with `column_suffix` appended to the definition of each
/// column it returns text for.
pub fn create_table_with(
    g: &mut Generation<'_>,
    op: &CreateTableOperation,
    b: &mut Builder,
    terminate: bool,
    column_suffix: impl Fn(&ColumnOperation) -> Option<String>,
) -> Result<()> {
    b.append_line(format!("CREATE TABLE {} (", g.qualified(&op.name, op.schema.as_deref())));
    b.indented(|b| table_body(g, op, b, &column_suffix))?;
    b.append(")");
    if terminate {
        g.end_statement(b, false);
    }
    Ok(())
}

/// Column definitions and table constraints, one per line.
fn table_body(
    g: &Generation<'_>,
    op: &CreateTableOperation,
    b: &mut Builder,
    column_suffix: &impl Fn(&ColumnOperation) -> Option<String>,
) -> Result<()> {
    let mut constraints = Vec::new();
    if let Some(pk) = &op.primary_key {
        constraints.push(primary_key_constraint(g, pk));
    }
    constraints.extend(op.unique_constraints.iter().map(|u| unique_constraint(g, u)));
    constraints.extend(op.check_constraints.iter().map(|c| check_constraint(g, c)));
    constraints.extend(op.foreign_keys.iter().map(|fk| foreign_key_constraint(g, fk)));

    let mut remaining = op.columns.len() + constraints.len();
    let mut separate = |b: &mut Builder| {
        remaining -= 1;
        b.append_line(if remaining > 0 { "," } else { "" });
    };
    for column in &op.columns {
        column_definition(g, column, b)?;
        if let Some(suffix) = column_suffix(column) {
            b.append(suffix);
        }
        separate(b);
    }
    for constraint in &constraints {
        b.append(constraint);
        separate(b);
    }
    Ok(())
}

pub fn drop_table(g: &mut Generation<'_>, op: &DropTableOperation, b: &mut Builder) -> Result<()> {
    b.append(format!("DROP TABLE {}", g.qualified(&op.name, op.schema.as_deref())));
    g.end_statement(b, false);
    Ok(())
}

pub fn rename_table(g: &mut Generation<'_>, _: &RenameTableOperation, _: &mut Builder) -> Result<()> {
    Err(g.not_implemented(OperationKind::RenameTable))
}

/// Table options have no standard syntax; nothing is generated.
pub fn alter_table(_: &mut Generation<'_>, _: &AlterTableOperation, _: &mut Builder) -> Result<()> {
    Ok(())
}

pub fn add_column(
    g: &mut Generation<'_>,
    op: &ColumnOperation,
    b: &mut Builder,
    terminate: bool,
) -> Result<()> {
    b.append(format!(
        "ALTER TABLE {} ADD ",
        g.qualified(&op.table, op.schema.as_deref())
    ));
    column_definition(g, op, b)?;
    if terminate {
        g.end_statement(b, false);
    }
    Ok(())
}

pub fn drop_column(
    g: &mut Generation<'_>,
    op: &DropColumnOperation,
    b: &mut Builder,
    terminate: bool,
) -> Result<()> {
    b.append(format!(
        "ALTER TABLE {} DROP COLUMN {}",
        g.qualified(&op.table, op.schema.as_deref()),
        g.delimit(&op.name)
    ));
    if terminate {
        g.end_statement(b, false);
    }
    Ok(())
}

pub fn alter_column(g: &mut Generation<'_>, _: &AlterColumnOperation, _: &mut Builder) -> Result<()> {
    Err(g.not_implemented(OperationKind::AlterColumn))
}

pub fn rename_column(g: &mut Generation<'_>, _: &RenameColumnOperation, _: &mut Builder) -> Result<()> {
    Err(g.not_implemented(OperationKind::RenameColumn))
}

pub fn create_index(
    g: &mut Generation<'_>,
    op: &CreateIndexOperation,
    b: &mut Builder,
    terminate: bool,
) -> Result<()> {
    b.append("CREATE ");
    if op.unique {
        b.append("UNIQUE ");
    }
    b.append(format!(
        "INDEX {} ON {} ({})",
        g.delimit(&op.name),
        g.qualified(&op.table, op.schema.as_deref()),
        g.column_list(&op.columns)
    ));
    if let Some(filter) = &op.filter {
        b.append(format!(" WHERE {filter}"));
    }
    if terminate {
        g.end_statement(b, false);
    }
    Ok(())
}

pub fn drop_index(
    g: &mut Generation<'_>,
    _: &DropIndexOperation,
    _: &mut Builder,
    _terminate: bool,
) -> Result<()> {
    Err(g.not_implemented(OperationKind::DropIndex))
}

pub fn rename_index(g: &mut Generation<'_>, _: &RenameIndexOperation, _: &mut Builder) -> Result<()> {
    Err(g.not_implemented(OperationKind::RenameIndex))
}

pub fn add_primary_key(g: &mut Generation<'_>, op: &AddPrimaryKeyOperation, b: &mut Builder) -> Result<()> {
    b.append(format!(
        "ALTER TABLE {} ADD {}",
        g.qualified(&op.table, op.schema.as_deref()),
        primary_key_constraint(g, op)
    ));
    g.end_statement(b, false);
    Ok(())
}

pub fn drop_primary_key(g: &mut Generation<'_>, op: &DropPrimaryKeyOperation, b: &mut Builder) -> Result<()> {
    drop_constraint(g, &op.table, op.schema.as_deref(), &op.name, b);
    Ok(())
}

pub fn add_foreign_key(g: &mut Generation<'_>, op: &AddForeignKeyOperation, b: &mut Builder) -> Result<()> {
    b.append(format!(
        "ALTER TABLE {} ADD {}",
        g.qualified(&op.table, op.schema.as_deref()),
        foreign_key_constraint(g, op)
    ));
    g.end_statement(b, false);
    Ok(())
}

pub fn drop_foreign_key(g: &mut Generation<'_>, op: &DropForeignKeyOperation, b: &mut Builder) -> Result<()> {
    drop_constraint(g, &op.table, op.schema.as_deref(), &op.name, b);
    Ok(())
}

pub fn add_unique_constraint(
    g: &mut Generation<'_>,
    op: &AddUniqueConstraintOperation,
    b: &mut Builder,
) -> Result<()> {
    b.append(format!(
        "ALTER TABLE {} ADD {}",
        g.qualified(&op.table, op.schema.as_deref()),
        unique_constraint(g, op)
    ));
    g.end_statement(b, false);
    Ok(())
}

pub fn drop_unique_constraint(
    g: &mut Generation<'_>,
    op: &DropUniqueConstraintOperation,
    b: &mut Builder,
) -> Result<()> {
    drop_constraint(g, &op.table, op.schema.as_deref(), &op.name, b);
    Ok(())
}

pub fn create_check_constraint(
    g: &mut Generation<'_>,
    op: &CreateCheckConstraintOperation,
    b: &mut Builder,
) -> Result<()> {
    b.append(format!(
        "ALTER TABLE {} ADD {}",
        g.qualified(&op.table, op.schema.as_deref()),
        check_constraint(g, op)
    ));
    g.end_statement(b, false);
    Ok(())
}

pub fn drop_check_constraint(
    g: &mut Generation<'_>,
    op: &DropCheckConstraintOperation,
    b: &mut Builder,
) -> Result<()> {
    drop_constraint(g, &op.table, op.schema.as_deref(), &op.name, b);
    Ok(())
}

fn drop_constraint(g: &Generation<'_>, table: &str, schema: Option<&str>, name: &str, b: &mut Builder) {
    b.append(format!(
        "ALTER TABLE {} DROP CONSTRAINT {}",
        g.qualified(table, schema),
        g.delimit(name)
    ));
    g.end_statement(b, false);
}

pub fn create_sequence(g: &mut Generation<'_>, op: &CreateSequenceOperation, b: &mut Builder) -> Result<()> {
    b.append(format!("CREATE SEQUENCE {}", g.qualified(&op.name, op.schema.as_deref())));
    if op.clr_type != PrimitiveType::Int64 {
        let store_type = g.dialect().store_type(op.clr_type, &ColumnOperation::default());
        b.append(format!(" AS {store_type}"));
    }
    b.append(format!(" START WITH {}", op.start_value));
    sequence_options(&op.options, b);
    g.end_statement(b, false);
    Ok(())
}

pub fn alter_sequence(g: &mut Generation<'_>, op: &AlterSequenceOperation, b: &mut Builder) -> Result<()> {
    b.append(format!("ALTER SEQUENCE {}", g.qualified(&op.name, op.schema.as_deref())));
    sequence_options(&op.options, b);
    g.end_statement(b, false);
    Ok(())
}

pub fn drop_sequence(g: &mut Generation<'_>, op: &DropSequenceOperation, b: &mut Builder) -> Result<()> {
    b.append(format!("DROP SEQUENCE {}", g.qualified(&op.name, op.schema.as_deref())));
    g.end_statement(b, false);
    Ok(())
}

pub fn rename_sequence(g: &mut Generation<'_>, _: &RenameSequenceOperation, _: &mut Builder) -> Result<()> {
    Err(g.not_implemented(OperationKind::RenameSequence))
}

pub fn restart_sequence(g: &mut Generation<'_>, op: &RestartSequenceOperation, b: &mut Builder) -> Result<()> {
    b.append(format!(
        "ALTER SEQUENCE {} RESTART WITH {}",
        g.qualified(&op.name, op.schema.as_deref()),
        op.start_value
    ));
    g.end_statement(b, false);
    Ok(())
}

/// ` INCREMENT BY .. MINVALUE .. MAXVALUE .. CYCLE` with `NO` forms for
/// unset bounds.
pub fn sequence_options(options: &SequenceOptions, b: &mut Builder) {
    b.append(format!(" INCREMENT BY {}", options.increment_by));
    match options.min_value {
        Some(min) => b.append(format!(" MINVALUE {min}")),
        None => b.append(" NO MINVALUE"),
    };
    match options.max_value {
        Some(max) => b.append(format!(" MAXVALUE {max}")),
        None => b.append(" NO MAXVALUE"),
    };
    b.append(if options.cyclic { " CYCLE" } else { " NO CYCLE" });
}

pub fn insert_data(g: &mut Generation<'_>, op: &InsertDataOperation, b: &mut Builder) -> Result<()> {
    insert_rows(g, op, b);
    b.end_command(false);
    Ok(())
}

/// One terminated `INSERT` statement per row.
pub fn insert_rows(g: &Generation<'_>, op: &InsertDataOperation, b: &mut Builder) {
    let table = g.qualified(&op.table, op.schema.as_deref());
    let columns = g.column_list(&op.columns);
    for row in &op.values {
        b.append_line(format!("INSERT INTO {table} ({columns})"));
        b.append(format!("VALUES ({})", value_list(g, row)));
        g.terminate(b);
    }
}

pub fn update_data(g: &mut Generation<'_>, op: &UpdateDataOperation, b: &mut Builder) -> Result<()> {
    let table = g.qualified(&op.table, op.schema.as_deref());
    for (keys, values) in op.key_values.iter().zip(&op.values) {
        let assignments = op
            .columns
            .iter()
            .zip(values)
            .map(|(column, value)| format!("{} = {}", g.delimit(column), g.dialect().literal(value)))
            .collect::<Vec<_>>()
            .join(", ");
        b.append_line(format!("UPDATE {table} SET {assignments}"));
        b.append(format!("WHERE {}", key_predicate(g, &op.key_columns, keys)));
        g.terminate(b);
    }
    b.end_command(false);
    Ok(())
}

pub fn delete_data(g: &mut Generation<'_>, op: &DeleteDataOperation, b: &mut Builder) -> Result<()> {
    let table = g.qualified(&op.table, op.schema.as_deref());
    for keys in &op.key_values {
        b.append_line(format!("DELETE FROM {table}"));
        b.append(format!("WHERE {}", key_predicate(g, &op.key_columns, keys)));
        g.terminate(b);
    }
    b.end_command(false);
    Ok(())
}

pub fn sql(_: &mut Generation<'_>, op: &SqlOperation, b: &mut Builder) -> Result<()> {
    b.append(&op.sql);
    if !op.sql.ends_with('\n') {
        b.append_line("");
    }
    b.end_command(op.suppress_transaction);
    Ok(())
}

/// `name type [COLLATE c] [NULL | NOT NULL] [DEFAULT ..] [identity]`, or
/// `name AS (sql)` for a computed column.
pub fn column_definition(g: &Generation<'_>, column: &ColumnOperation, b: &mut Builder) -> Result<()> {
    b.append(g.delimit(&column.name));
    if let Some(computed) = &column.computed_sql {
        b.append(format!(" AS ({computed})"));
        if let Some(collation) = &column.collation {
            b.append(format!(" COLLATE {collation}"));
        }
        return Ok(());
    }

    b.append(format!(" {}", g.column_type(column)?));
    if let Some(collation) = &column.collation {
        b.append(format!(" COLLATE {collation}"));
    }
    b.append(if column.nullable { " NULL" } else { " NOT NULL" });
    default_value(g, column, b);
    if column.identity {
        if let Some(identity) = g.dialect().identity_clause() {
            b.append(identity);
        }
    }
    Ok(())
}

/// ` DEFAULT (sql)` or ` DEFAULT literal`, if the column has one.
pub fn default_value(g: &Generation<'_>, column: &ColumnOperation, b: &mut Builder) {
    if let Some(sql) = &column.default_sql {
        b.append(format!(" DEFAULT ({sql})"));
    } else if let Some(value) = &column.default_value {
        b.append(format!(" DEFAULT {}", g.dialect().literal(value)));
    }
}

pub fn primary_key_constraint(g: &Generation<'_>, op: &AddPrimaryKeyOperation) -> String {
    format!(
        "CONSTRAINT {} PRIMARY KEY{} ({})",
        g.delimit(&op.name),
        g.dialect().clustering(op.clustered),
        g.column_list(&op.columns)
    )
}

pub fn unique_constraint(g: &Generation<'_>, op: &AddUniqueConstraintOperation) -> String {
    format!(
        "CONSTRAINT {} UNIQUE ({})",
        g.delimit(&op.name),
        g.column_list(&op.columns)
    )
}

pub fn check_constraint(g: &Generation<'_>, op: &CreateCheckConstraintOperation) -> String {
    format!("CONSTRAINT {} CHECK ({})", g.delimit(&op.name), op.sql)
}

pub fn foreign_key_constraint(g: &Generation<'_>, op: &AddForeignKeyOperation) -> String {
    let mut clause = format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}",
        g.delimit(&op.name),
        g.column_list(&op.columns),
        g.qualified(&op.principal_table, op.principal_schema.as_deref())
    );
    if !op.principal_columns.is_empty() {
        clause.push_str(&format!(" ({})", g.column_list(&op.principal_columns)));
    }
    if op.on_update != ReferentialAction::NoAction {
        clause.push_str(&format!(" ON UPDATE {}", op.on_update.as_sql()));
    }
    if op.on_delete != ReferentialAction::NoAction {
        clause.push_str(&format!(" ON DELETE {}", op.on_delete.as_sql()));
    }
    clause
}

fn value_list(g: &Generation<'_>, row: &[Literal]) -> String {
    row.iter()
        .map(|value| g.dialect().literal(value))
        .collect::<Vec<_>>()
        .join(", ")
}

fn key_predicate(g: &Generation<'_>, columns: &[String], values: &[Literal]) -> String {
    columns
        .iter()
        .zip(values)
        .map(|(column, value)| match value {
            Literal::Null => format!("{} IS NULL", g.delimit(column)),
            value => format!("{} = {}", g.delimit(column), g.dialect().literal(value)),
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[cfg(test)]
mod tests {
    use crate::dialect::AnsiDialect;
    use crate::error::MigrationError;
    use crate::generator::MigrationsSqlGenerator;
    use crate::operations::*;

    fn generate(ops: Vec<MigrationOperation>) -> Vec<String> {
        MigrationsSqlGenerator::new(AnsiDialect::new())
            .generate(&ops, None)
            .unwrap()
            .iter()
            .map(|c| c.sql().to_string())
            .collect()
    }

    #[test]
    fn test_create_table_with_constraints() {
        let table = CreateTableOperation::new("Post")
            .column(ColumnOperation::new("", "Id").store_type("INTEGER"))
            .column(ColumnOperation::new("", "BlogId").store_type("INTEGER").nullable())
            .primary_key(&["Id"])
            .foreign_key(
                AddForeignKeyOperation::new("FK_Post_Blog", "Post", &["BlogId"], "Blog", &["Id"])
                    .on_delete(ReferentialAction::Cascade),
            );
        let sql = generate(vec![table.into()]);
        assert_eq!(
            sql,
            [concat!(
                "CREATE TABLE \"Post\" (\n",
                "    \"Id\" INTEGER NOT NULL,\n",
                "    \"BlogId\" INTEGER NULL,\n",
                "    CONSTRAINT \"PK_Post\" PRIMARY KEY (\"Id\"),\n",
                "    CONSTRAINT \"FK_Post_Blog\" FOREIGN KEY (\"BlogId\") REFERENCES \"Blog\" (\"Id\") ON DELETE CASCADE\n",
                ");\n"
            )]
        );
    }

    #[test]
    fn test_column_defaults() {
        let column = ColumnOperation::new("Widgets", "Active")
            .store_type("BOOLEAN")
            .default_value(true);
        let sql = generate(vec![column.into()]);
        assert_eq!(
            sql,
            ["ALTER TABLE \"Widgets\" ADD \"Active\" BOOLEAN NOT NULL DEFAULT TRUE;\n"]
        );
    }

    #[test]
    fn test_data_operations_share_one_command() {
        let insert = InsertDataOperation::new("Widgets", &["Id", "Name"])
            .row(vec![Literal::Int(1), "Gear".into()])
            .row(vec![Literal::Int(2), Literal::Null]);
        let delete = DeleteDataOperation {
            table: "Widgets".to_string(),
            key_columns: vec!["Name".to_string()],
            key_values: vec![vec![Literal::Null]],
            ..DeleteDataOperation::default()
        };
        let sql = generate(vec![insert.into(), delete.into()]);
        assert_eq!(sql.len(), 2);
        assert_eq!(
            sql[0],
            concat!(
                "INSERT INTO \"Widgets\" (\"Id\", \"Name\")\nVALUES (1, 'Gear');\n",
                "INSERT INTO \"Widgets\" (\"Id\", \"Name\")\nVALUES (2, NULL);\n"
            )
        );
        assert_eq!(sql[1], "DELETE FROM \"Widgets\"\nWHERE \"Name\" IS NULL;\n");
    }

    #[test]
    fn test_sequences() {
        let mut create = CreateSequenceOperation::new("Orders");
        create.start_value = 100;
        create.options.cyclic = true;
        let sql = generate(vec![create.into()]);
        assert_eq!(
            sql,
            ["CREATE SEQUENCE \"Orders\" START WITH 100 INCREMENT BY 1 NO MINVALUE NO MAXVALUE CYCLE;\n"]
        );
    }

    #[test]
    fn test_rename_has_no_generic_sql() {
        let op = MigrationOperation::from(RenameColumnOperation::new("Widgets", "Name", "Title"));
        match MigrationsSqlGenerator::new(AnsiDialect::new()).generate(&[op], None) {
            Err(MigrationError::NotImplemented { generator, operation }) => {
                assert_eq!(generator, "ansi");
                assert_eq!(operation, OperationKind::RenameColumn);
            }
            other => panic!("Expected NotImplemented, got {other:?}"),
        }
    }
}
