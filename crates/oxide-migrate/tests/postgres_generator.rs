//! PostgreSQL generation.

use oxide_migrate::prelude::*;
use oxide_model::reflect::PrimitiveType;

fn generator() -> MigrationsSqlGenerator {
    MigrationsSqlGenerator::new(PostgresDialect::new())
}

fn sql(commands: &[MigrationCommand]) -> Vec<&str> {
    commands.iter().map(MigrationCommand::sql).collect()
}

#[test]
fn test_create_table_uses_identity_columns() {
    let table = CreateTableOperation::new("Widgets")
        .column(ColumnOperation::new("", "Id").of_type(PrimitiveType::Int32).identity())
        .column(ColumnOperation::new("", "Name").of_type(PrimitiveType::String).max_length(50))
        .primary_key(&["Id"]);

    let commands = generator().generate(&[table.into()], None).unwrap();
    assert_eq!(
        sql(&commands),
        [concat!(
            "CREATE TABLE \"Widgets\" (\n",
            "    \"Id\" integer NOT NULL GENERATED BY DEFAULT AS IDENTITY,\n",
            "    \"Name\" character varying(50) NOT NULL,\n",
            "    CONSTRAINT \"PK_Widgets\" PRIMARY KEY (\"Id\")\n",
            ");\n"
        )]
    );
}

#[test]
fn test_public_schema_is_not_created() {
    let ops = [
        MigrationOperation::from(EnsureSchemaOperation {
            name: "public".to_string(),
        }),
        MigrationOperation::from(EnsureSchemaOperation {
            name: "sales".to_string(),
        }),
    ];
    let commands = generator().generate(&ops, None).unwrap();
    assert_eq!(sql(&commands), ["CREATE SCHEMA IF NOT EXISTS \"sales\";\n"]);
}

#[test]
fn test_rename_table_then_move_schema() {
    let rename = RenameTableOperation {
        name: "Widgets".to_string(),
        schema: None,
        new_name: Some("Gadgets".to_string()),
        new_schema: Some("sales".to_string()),
    };
    let commands = generator().generate(&[rename.into()], None).unwrap();
    assert_eq!(
        sql(&commands),
        [concat!(
            "ALTER TABLE \"Widgets\" RENAME TO \"Gadgets\";\n",
            "ALTER TABLE \"Gadgets\" SET SCHEMA \"sales\";\n"
        )]
    );
}

#[test]
fn test_rename_sequence_back_to_public() {
    let rename = RenameSequenceOperation {
        name: "OrderNumbers".to_string(),
        schema: Some("sales".to_string()),
        new_name: None,
        new_schema: None,
    };
    let commands = generator().generate(&[rename.clone().into()], None).unwrap();
    assert_eq!(
        sql(&commands),
        ["ALTER SEQUENCE \"sales\".\"OrderNumbers\" SET SCHEMA \"public\";\n"]
    );

    let commands = generator()
        .with_product_version("2.0.0")
        .generate(&[rename.into()], None)
        .unwrap();
    assert!(commands.is_empty());
}

#[test]
fn test_alter_column_changes_only_what_differs() {
    let alter = AlterColumnOperation::new(
        ColumnOperation::new("Widgets", "Name").store_type("character varying(50)"),
        ColumnOperation::new("Widgets", "Name").store_type("text").nullable(),
    );
    let commands = generator().generate(&[alter.clone().into()], None).unwrap();
    assert_eq!(
        sql(&commands),
        [concat!(
            "ALTER TABLE \"Widgets\" ALTER COLUMN \"Name\" TYPE character varying(50);\n",
            "ALTER TABLE \"Widgets\" ALTER COLUMN \"Name\" SET NOT NULL;\n"
        )]
    );

    // Without the old column every facet is restated.
    let commands = generator()
        .with_product_version("1.1.0")
        .generate(&[alter.into()], None)
        .unwrap();
    assert_eq!(
        sql(&commands),
        [concat!(
            "ALTER TABLE \"Widgets\" ALTER COLUMN \"Name\" TYPE character varying(50);\n",
            "ALTER TABLE \"Widgets\" ALTER COLUMN \"Name\" SET NOT NULL;\n",
            "ALTER TABLE \"Widgets\" ALTER COLUMN \"Name\" DROP DEFAULT;\n"
        )]
    );
}

#[test]
fn test_alter_column_default_and_identity() {
    let alter = AlterColumnOperation::new(
        ColumnOperation::new("Widgets", "Id")
            .of_type(PrimitiveType::Int64)
            .identity(),
        ColumnOperation::new("Widgets", "Id")
            .of_type(PrimitiveType::Int64)
            .default_sql("nextval('widget_ids')"),
    );
    let commands = generator().generate(&[alter.into()], None).unwrap();
    assert_eq!(
        sql(&commands),
        [concat!(
            "ALTER TABLE \"Widgets\" ALTER COLUMN \"Id\" DROP DEFAULT;\n",
            "ALTER TABLE \"Widgets\" ALTER COLUMN \"Id\" ADD GENERATED BY DEFAULT AS IDENTITY;\n"
        )]
    );
}

#[test]
fn test_computed_column_cannot_be_altered() {
    let alter = AlterColumnOperation::new(
        ColumnOperation::new("Widgets", "Total").computed("\"Price\" * \"Quantity\""),
        ColumnOperation::new("Widgets", "Total").store_type("numeric"),
    );
    match generator().generate(&[alter.into()], None) {
        Err(MigrationError::NotSupported { generator, operation, .. }) => {
            assert_eq!(generator, "postgresql");
            assert_eq!(operation, OperationKind::AlterColumn);
        }
        other => panic!("Expected NotSupported, got {other:?}"),
    }
}

#[test]
fn test_table_comment() {
    let alter = AlterTableOperation {
        name: "Widgets".to_string(),
        comment: Some("Things we sell".to_string()),
        ..AlterTableOperation::default()
    };
    let commands = generator().generate(&[alter.into()], None).unwrap();
    assert_eq!(
        sql(&commands),
        ["COMMENT ON TABLE \"Widgets\" IS 'Things we sell';\n"]
    );
}

#[test]
fn test_index_operations() {
    let ops = [
        MigrationOperation::from(
            CreateIndexOperation::new("IX_Widgets_Sku", "Widgets", &["Sku"])
                .unique()
                .include(&["Name"])
                .filter("\"Sku\" IS NOT NULL"),
        ),
        MigrationOperation::from(RenameIndexOperation {
            name: "IX_Widgets_Sku".to_string(),
            table: None,
            schema: Some("sales".to_string()),
            new_name: "IX_Widgets_Code".to_string(),
        }),
        MigrationOperation::from(DropIndexOperation {
            name: "IX_Widgets_Code".to_string(),
            table: None,
            schema: Some("sales".to_string()),
        }),
    ];
    let commands = generator().generate(&ops, None).unwrap();
    assert_eq!(
        sql(&commands),
        [
            "CREATE UNIQUE INDEX \"IX_Widgets_Sku\" ON \"Widgets\" (\"Sku\") INCLUDE (\"Name\") WHERE \"Sku\" IS NOT NULL;\n",
            "ALTER INDEX \"sales\".\"IX_Widgets_Sku\" RENAME TO \"IX_Widgets_Code\";\n",
            "DROP INDEX \"sales\".\"IX_Widgets_Code\";\n",
        ]
    );
}

#[test]
fn test_raw_sql_is_one_command() {
    let raw = SqlOperation::new("SELECT 1;\nGO\nSELECT 2;");
    let commands = generator().generate(&[raw.into()], None).unwrap();
    assert_eq!(sql(&commands), ["SELECT 1;\nGO\nSELECT 2;\n"]);

    let generator = generator();
    assert_eq!(generator.script(&commands), "SELECT 1;\nGO\nSELECT 2;\n\n");
}

#[test]
fn test_handler_origins() {
    let generator = generator();
    let entries: Vec<_> = generator.handlers().entries().collect();
    let origin = |name: &str| {
        entries
            .iter()
            .find(|(operation, _)| operation == name)
            .map(|(_, origin)| *origin)
    };
    assert_eq!(origin("AlterColumn"), Some("postgresql"));
    assert_eq!(origin("DropTable"), Some("ansi"));
}
