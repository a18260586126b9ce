//! SQL Server generation.

use oxide_migrate::prelude::*;
use oxide_model::reflect::{MemberInfo, PrimitiveType, TypeInfo};
use oxide_model::{FrozenModel, ModelBuilder};

fn generator() -> MigrationsSqlGenerator {
    MigrationsSqlGenerator::new(SqlServerDialect::new())
}

fn sql(commands: &[MigrationCommand]) -> Vec<&str> {
    commands.iter().map(MigrationCommand::sql).collect()
}

/// `Widgets { Id, Name?, Sku }` with an index over `Name` and a unique index
/// over `Sku` that includes `Name`.
fn widgets_model(version: Option<&str>) -> FrozenModel {
    let mut builder = ModelBuilder::new();
    builder.register_type(
        TypeInfo::new("Widgets")
            .member(MemberInfo::primitive("Id", PrimitiveType::Int32))
            .member(MemberInfo::primitive("Name", PrimitiveType::String).nullable())
            .member(MemberInfo::primitive("Sku", PrimitiveType::String)),
    );
    if let Some(version) = version {
        builder.product_version(version);
    }
    let widgets = builder.entity_type("Widgets").unwrap();
    let _ = builder.has_index(widgets, &["Name"], None, false).unwrap();
    let _ = builder.has_index(widgets, &["Sku"], None, true).unwrap();
    let _ = builder
        .has_index_include(widgets, &["Sku"], &["Name"])
        .unwrap();
    builder.finish().unwrap()
}

fn narrow_name() -> AlterColumnOperation {
    AlterColumnOperation::new(
        ColumnOperation::new("Widgets", "Name")
            .store_type("nvarchar(50)")
            .nullable(),
        ColumnOperation::new("Widgets", "Name")
            .store_type("nvarchar(max)")
            .nullable(),
    )
}

#[test]
fn test_create_table_is_one_terminated_command() {
    let table = CreateTableOperation::new("Widgets")
        .column(ColumnOperation::new("", "Id").store_type("int"))
        .column(ColumnOperation::new("", "Name").store_type("nvarchar(50)").nullable())
        .primary_key(&["Id"]);

    let commands = generator().generate(&[table.into()], None).unwrap();
    assert_eq!(
        sql(&commands),
        [concat!(
            "CREATE TABLE [Widgets] (\n",
            "    [Id] int NOT NULL,\n",
            "    [Name] nvarchar(50) NULL,\n",
            "    CONSTRAINT [PK_Widgets] PRIMARY KEY ([Id])\n",
            ");\n"
        )]
    );
    assert_eq!(commands[0].sql().matches(';').count(), 1);
    assert!(!commands[0].suppress_transaction());
}

#[test]
fn test_identity_and_defaults() {
    let table = CreateTableOperation::new("Widgets")
        .column(ColumnOperation::new("", "Id").of_type(PrimitiveType::Int64).identity())
        .column(
            ColumnOperation::new("", "Active")
                .of_type(PrimitiveType::Bool)
                .default_value(true),
        )
        .primary_key(&["Id"]);

    let commands = generator().generate(&[table.into()], None).unwrap();
    assert!(commands[0].sql().contains("    [Id] bigint NOT NULL IDENTITY,\n"));
    assert!(commands[0]
        .sql()
        .contains("    [Active] bit NOT NULL DEFAULT CAST(1 AS bit),\n"));
}

#[test]
fn test_drop_column_drops_default_constraint_first() {
    let ops = [MigrationOperation::from(DropColumnOperation::new("Widgets", "Name"))];
    let commands = generator().generate(&ops, None).unwrap();
    assert_eq!(
        sql(&commands),
        [concat!(
            "DECLARE @var0 sysname;\n",
            "SELECT @var0 = [d].[name]\n",
            "FROM [sys].[default_constraints] [d]\n",
            "INNER JOIN [sys].[columns] [c] ON [d].[parent_column_id] = [c].[column_id] AND [d].[parent_object_id] = [c].[object_id]\n",
            "WHERE ([d].[parent_object_id] = OBJECT_ID(N'[Widgets]') AND [c].[name] = N'Name');\n",
            "IF @var0 IS NOT NULL EXEC(N'ALTER TABLE [Widgets] DROP CONSTRAINT [' + @var0 + '];');\n",
            "ALTER TABLE [Widgets] DROP COLUMN [Name];\n"
        )]
    );
}

#[test]
fn test_lookup_variables_are_unique_within_a_call() {
    let ops = [
        MigrationOperation::from(DropColumnOperation::new("Widgets", "Name")),
        MigrationOperation::from(DropColumnOperation::new("Widgets", "Sku")),
    ];
    let commands = generator().generate(&ops, None).unwrap();
    assert!(commands[0].sql().contains("@var0"));
    assert!(commands[1].sql().contains("@var1"));
    assert!(!commands[1].sql().contains("@var0"));

    // A new call starts counting again.
    let commands = generator().generate(&ops[..1], None).unwrap();
    assert!(commands[0].sql().contains("@var0"));
}

#[test]
fn test_narrowing_rebuilds_indexes_around_alter() {
    let model = widgets_model(None);
    let ops = [MigrationOperation::from(narrow_name())];
    let commands = generator().generate(&ops, Some(&model)).unwrap();
    assert_eq!(commands.len(), 1);
    let text = commands[0].sql();

    let position = |needle: &str| {
        text.find(needle)
            .unwrap_or_else(|| panic!("Expected {needle:?} in {text}"))
    };
    let drop_name = position("DROP INDEX [IX_Widgets_Name] ON [Widgets];\n");
    let drop_sku = position("DROP INDEX [IX_Widgets_Sku] ON [Widgets];\n");
    let alter = position("ALTER TABLE [Widgets] ALTER COLUMN [Name] nvarchar(50) NULL;\n");
    let create_name = position("CREATE INDEX [IX_Widgets_Name] ON [Widgets] ([Name]);\n");
    let create_sku =
        position("CREATE UNIQUE INDEX [IX_Widgets_Sku] ON [Widgets] ([Sku]) INCLUDE ([Name]);\n");

    assert!(drop_name < alter && drop_sku < alter);
    assert!(alter < create_name && alter < create_sku);
    assert!(position("DECLARE @var0 sysname;") < alter);
}

#[test]
fn test_index_recreated_later_is_not_rebuilt() {
    let model = widgets_model(None);
    let ops = [
        MigrationOperation::from(narrow_name()),
        MigrationOperation::from(CreateIndexOperation::new(
            "IX_Widgets_Name",
            "Widgets",
            &["Name"],
        )),
    ];
    let commands = generator().generate(&ops, Some(&model)).unwrap();
    let script = generator().script(&commands);

    assert!(!commands[0].sql().contains("[IX_Widgets_Name]"));
    assert!(commands[0].sql().contains("DROP INDEX [IX_Widgets_Sku]"));
    assert_eq!(script.matches("CREATE INDEX [IX_Widgets_Name]").count(), 1);
}

#[test]
fn test_relaxing_nullability_alters_in_place() {
    let model = widgets_model(None);
    let relax = AlterColumnOperation::new(
        ColumnOperation::new("Widgets", "Name").store_type("nvarchar(max)").nullable(),
        ColumnOperation::new("Widgets", "Name").store_type("nvarchar(max)"),
    );
    let commands = generator().generate(&[relax.into()], Some(&model)).unwrap();
    assert!(!commands[0].sql().contains("INDEX"));
    assert!(commands[0]
        .sql()
        .ends_with("ALTER TABLE [Widgets] ALTER COLUMN [Name] nvarchar(max) NULL;\n"));
}

#[test]
fn test_old_models_alter_without_comparing() {
    let model = widgets_model(Some("1.1.0"));
    let commands = generator()
        .generate(&[narrow_name().into()], Some(&model))
        .unwrap();
    assert!(!commands[0].sql().contains("DROP INDEX"));
}

#[test]
fn test_alter_column_readds_default() {
    let alter = AlterColumnOperation::new(
        ColumnOperation::new("Widgets", "Count")
            .of_type(PrimitiveType::Int32)
            .default_value(0),
        ColumnOperation::new("Widgets", "Count").of_type(PrimitiveType::Int32),
    );
    let commands = generator().generate(&[alter.into()], None).unwrap();
    assert!(commands[0].sql().ends_with(concat!(
        "ALTER TABLE [Widgets] ALTER COLUMN [Count] int NOT NULL;\n",
        "ALTER TABLE [Widgets] ADD DEFAULT 0 FOR [Count];\n"
    )));
}

#[test]
fn test_identity_change_is_not_supported() {
    let alter = AlterColumnOperation::new(
        ColumnOperation::new("Widgets", "Id").store_type("int").identity(),
        ColumnOperation::new("Widgets", "Id").store_type("int"),
    );
    match generator().generate(&[alter.into()], None) {
        Err(MigrationError::NotSupported { operation, .. }) => {
            assert_eq!(operation, OperationKind::AlterColumn);
        }
        other => panic!("Expected NotSupported, got {other:?}"),
    }
}

#[test]
fn test_memory_optimized_table_suppresses_following_transactions() {
    let table = CreateTableOperation::new("Sessions")
        .column(ColumnOperation::new("", "Id").store_type("int"))
        .primary_key(&["Id"])
        .memory_optimized();
    let ops = [
        MigrationOperation::from(DropTableOperation {
            name: "Old".to_string(),
            schema: None,
        }),
        table.into(),
        MigrationOperation::from(DropColumnOperation::new("Widgets", "Name")),
    ];

    let commands = generator().generate(&ops, None).unwrap();
    let flags: Vec<_> = commands
        .iter()
        .map(MigrationCommand::suppress_transaction)
        .collect();
    assert_eq!(flags, [false, true, true]);
    assert!(commands[1]
        .sql()
        .contains("CONSTRAINT [PK_Sessions] PRIMARY KEY NONCLUSTERED ([Id])"));
    assert!(commands[1].sql().ends_with(")\nWITH (MEMORY_OPTIMIZED = ON);\n"));
}

#[test]
fn test_sql_is_split_on_go() {
    let raw = SqlOperation::new("SELECT 1\nGO 2\nSELECT 2\ngo\n\nGO\nSELECT \\\n3");
    let commands = generator().generate(&[raw.clone().into()], None).unwrap();
    assert_eq!(
        sql(&commands),
        ["SELECT 1\n", "SELECT 1\n", "SELECT 2\n", "SELECT 3\n"]
    );

    let once = MigrationsSqlGenerator::new(SqlServerDialect::new().batch_separator_repeat(false));
    let commands = once.generate(&[raw.into()], None).unwrap();
    assert_eq!(sql(&commands), ["SELECT 1\n", "SELECT 2\n", "SELECT 3\n"]);
}

#[test]
fn test_ensure_schema() {
    let ops = [
        MigrationOperation::from(EnsureSchemaOperation {
            name: "dbo".to_string(),
        }),
        MigrationOperation::from(EnsureSchemaOperation {
            name: "sales".to_string(),
        }),
    ];
    let commands = generator().generate(&ops, None).unwrap();
    assert_eq!(
        sql(&commands),
        ["IF SCHEMA_ID(N'sales') IS NULL EXEC(N'CREATE SCHEMA [sales];');\n"]
    );
}

fn rename_to_default_schema() -> MigrationOperation {
    RenameTableOperation {
        name: "Widgets".to_string(),
        schema: Some("sales".to_string()),
        new_name: Some("Gadgets".to_string()),
        new_schema: None,
    }
    .into()
}

#[test]
fn test_rename_without_schema_moves_to_default_schema() {
    let commands = generator()
        .generate(&[rename_to_default_schema()], None)
        .unwrap();
    assert_eq!(
        sql(&commands),
        [concat!(
            "EXEC sp_rename N'[sales].[Widgets]', N'Gadgets';\n",
            "DECLARE @defaultSchema sysname = SCHEMA_NAME();\n",
            "EXEC(N'ALTER SCHEMA [' + @defaultSchema + N'] TRANSFER [sales].[Gadgets];');\n"
        )]
    );
}

#[test]
fn test_legacy_rename_keeps_schema() {
    let commands = generator()
        .with_product_version("2.0.5")
        .generate(&[rename_to_default_schema()], None)
        .unwrap();
    assert_eq!(
        sql(&commands),
        ["EXEC sp_rename N'[sales].[Widgets]', N'Gadgets';\n"]
    );
}

#[test]
fn test_rename_column_and_index() {
    let ops = [
        MigrationOperation::from(RenameColumnOperation::new("Widgets", "Name", "Title")),
        MigrationOperation::from(RenameIndexOperation {
            name: "IX_Widgets_Name".to_string(),
            table: Some("Widgets".to_string()),
            schema: None,
            new_name: "IX_Widgets_Title".to_string(),
        }),
    ];
    let commands = generator().generate(&ops, None).unwrap();
    assert_eq!(
        sql(&commands),
        [
            "EXEC sp_rename N'[Widgets].[Name]', N'Title', N'COLUMN';\n",
            "EXEC sp_rename N'[Widgets].[IX_Widgets_Name]', N'IX_Widgets_Title', N'INDEX';\n",
        ]
    );
}

#[test]
fn test_unique_index_over_nullable_column_is_filtered() {
    let model = widgets_model(None);
    let index = CreateIndexOperation::new("IX_Widgets_Name_Unique", "Widgets", &["Name"]).unique();
    let commands = generator().generate(&[index.into()], Some(&model)).unwrap();
    assert_eq!(
        sql(&commands),
        ["CREATE UNIQUE INDEX [IX_Widgets_Name_Unique] ON [Widgets] ([Name]) WHERE [Name] IS NOT NULL;\n"]
    );
}

#[test]
fn test_column_type_comes_from_model() {
    let model = widgets_model(None);
    let column = ColumnOperation::new("Widgets", "Sku");
    let commands = generator()
        .generate(&[column.clone().into()], Some(&model))
        .unwrap();
    assert_eq!(
        sql(&commands),
        ["ALTER TABLE [Widgets] ADD [Sku] nvarchar(max) NOT NULL;\n"]
    );

    match generator().generate(&[column.into()], None) {
        Err(MigrationError::Precondition { operation, .. }) => {
            assert_eq!(operation, OperationKind::AddColumn);
        }
        other => panic!("Expected Precondition, got {other:?}"),
    }
}

#[test]
fn test_seed_data_toggles_identity_insert() {
    let insert = InsertDataOperation::new("Widgets", &["Id", "Name"]).row(vec![1.into(), "Gear".into()]);
    let commands = generator().generate(&[insert.into()], None).unwrap();
    let guard = "IF EXISTS (SELECT * FROM [sys].[identity_columns] WHERE [name] IN (N'Id', N'Name') AND [object_id] = OBJECT_ID(N'[Widgets]'))\n";
    assert_eq!(
        commands[0].sql(),
        format!(
            "{guard}    SET IDENTITY_INSERT [Widgets] ON;\nINSERT INTO [Widgets] ([Id], [Name])\nVALUES (1, N'Gear');\n{guard}    SET IDENTITY_INSERT [Widgets] OFF;\n"
        )
    );
}

#[test]
fn test_custom_operation_without_handler_is_unknown() {
    let custom = CustomOperation {
        name: "Rebuild".to_string(),
        payload: serde_json::Value::Null,
    };
    match generator().generate(&[custom.into()], None) {
        Err(MigrationError::UnknownOperation { generator, operation }) => {
            assert_eq!(generator, "sqlserver");
            assert_eq!(operation, "Custom(Rebuild)");
        }
        other => panic!("Expected UnknownOperation, got {other:?}"),
    }
}

#[test]
fn test_validation_runs_before_generation() {
    let ops = [
        MigrationOperation::from(DropColumnOperation::new("Widgets", "")),
        MigrationOperation::from(DropColumnOperation::new("", "Name")),
    ];
    match generator().generate(&ops, None) {
        Err(MigrationError::Multiple(errors)) => assert_eq!(errors.len(), 2),
        other => panic!("Expected Multiple, got {other:?}"),
    }

    let ops = [
        MigrationOperation::from(DropColumnOperation::new("Widgets", "Name")),
        MigrationOperation::from(SqlOperation::new(" ")),
    ];
    assert!(matches!(
        generator().generate(&ops, None),
        Err(MigrationError::Precondition {
            operation: OperationKind::Sql,
            ..
        })
    ));
}

#[test]
fn test_script_separates_batches_with_go() {
    let ops = [
        MigrationOperation::from(DropTableOperation {
            name: "A".to_string(),
            schema: None,
        }),
        MigrationOperation::from(DropTableOperation {
            name: "B".to_string(),
            schema: Some("sales".to_string()),
        }),
    ];
    let generator = generator();
    let commands = generator.generate(&ops, None).unwrap();
    assert_eq!(
        generator.script(&commands),
        "DROP TABLE [A];\nGO\n\nDROP TABLE [sales].[B];\nGO\n\n"
    );
}
