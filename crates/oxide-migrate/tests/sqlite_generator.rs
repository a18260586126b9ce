//! SQLite generation.

use oxide_migrate::prelude::*;
use oxide_model::reflect::PrimitiveType;

fn generator() -> MigrationsSqlGenerator {
    MigrationsSqlGenerator::new(SqliteDialect::new())
}

fn sql(commands: &[MigrationCommand]) -> Vec<&str> {
    commands.iter().map(MigrationCommand::sql).collect()
}

#[test]
fn test_identity_key_is_inlined() {
    let table = CreateTableOperation::new("Widgets")
        .column(ColumnOperation::new("", "Id").of_type(PrimitiveType::Int64).identity())
        .column(ColumnOperation::new("", "Price").of_type(PrimitiveType::Decimal).nullable())
        .primary_key(&["Id"]);

    let commands = generator().generate(&[table.into()], None).unwrap();
    assert_eq!(
        sql(&commands),
        [concat!(
            "CREATE TABLE \"Widgets\" (\n",
            "    \"Id\" INTEGER NOT NULL CONSTRAINT \"PK_Widgets\" PRIMARY KEY AUTOINCREMENT,\n",
            "    \"Price\" TEXT NULL\n",
            ");\n"
        )]
    );
}

#[test]
fn test_composite_key_stays_a_table_constraint() {
    let table = CreateTableOperation::new("OrderLines")
        .column(ColumnOperation::new("", "OrderId").of_type(PrimitiveType::Int32))
        .column(ColumnOperation::new("", "Line").of_type(PrimitiveType::Int32))
        .primary_key(&["OrderId", "Line"]);

    let commands = generator().generate(&[table.into()], None).unwrap();
    assert!(commands[0]
        .sql()
        .contains("    CONSTRAINT \"PK_OrderLines\" PRIMARY KEY (\"OrderId\", \"Line\")\n"));
    assert!(!commands[0].sql().contains("AUTOINCREMENT"));
}

#[test]
fn test_schemas_are_ignored() {
    let ops = [
        MigrationOperation::from(EnsureSchemaOperation {
            name: "sales".to_string(),
        }),
        MigrationOperation::from(DropTableOperation {
            name: "Widgets".to_string(),
            schema: Some("sales".to_string()),
        }),
    ];
    let commands = generator().generate(&ops, None).unwrap();
    assert_eq!(sql(&commands), ["DROP TABLE \"Widgets\";\n"]);
}

#[test]
fn test_renames() {
    let ops = [
        MigrationOperation::from(RenameTableOperation {
            name: "Widgets".to_string(),
            new_name: Some("Gadgets".to_string()),
            ..RenameTableOperation::default()
        }),
        MigrationOperation::from(RenameColumnOperation::new("Gadgets", "Name", "Title")),
    ];
    let commands = generator().generate(&ops, None).unwrap();
    assert_eq!(
        sql(&commands),
        [
            "ALTER TABLE \"Widgets\" RENAME TO \"Gadgets\";\n",
            "ALTER TABLE \"Gadgets\" RENAME COLUMN \"Name\" TO \"Title\";\n",
        ]
    );
}

#[test]
fn test_seed_data_uses_integer_booleans() {
    let insert = InsertDataOperation::new("Flags", &["Name", "Enabled"])
        .row(vec!["beta".into(), true.into()])
        .row(vec!["legacy".into(), Literal::Null]);
    let commands = generator().generate(&[insert.into()], None).unwrap();
    assert_eq!(
        sql(&commands),
        [concat!(
            "INSERT INTO \"Flags\" (\"Name\", \"Enabled\")\n",
            "VALUES ('beta', 1);\n",
            "INSERT INTO \"Flags\" (\"Name\", \"Enabled\")\n",
            "VALUES ('legacy', NULL);\n"
        )]
    );
}

#[test]
fn test_constraints_and_sequences_are_not_supported() {
    let ops = [
        MigrationOperation::from(AddPrimaryKeyOperation::new("PK_Widgets", "Widgets", &["Id"])),
        MigrationOperation::from(CreateSequenceOperation::new("OrderNumbers")),
    ];
    for op in ops {
        let kind = op.kind();
        match generator().generate(&[op], None) {
            Err(MigrationError::NotSupported { operation, reason, .. }) => {
                assert_eq!(operation, kind);
                assert!(!reason.is_empty());
            }
            other => panic!("Expected NotSupported, got {other:?}"),
        }
    }
}
