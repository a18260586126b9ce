//! The operation-kind to handler table.

use std::collections::BTreeMap;

use crate::command::MigrationCommandListBuilder;
use crate::error::Result;
use crate::operations::{MigrationOperation, OperationKind};

use super::{ansi, Generation};

/// Untyped entry point of a handler.
pub type HandlerFn = fn(
    &mut Generation<'_>,
    &MigrationOperation,
    &mut MigrationCommandListBuilder,
) -> Result<()>;

/// A registered handler and the dialect that registered it.
#[derive(Clone, Copy)]
pub struct Handler {
    pub origin: &'static str,
    pub func: HandlerFn,
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Wraps a typed handler into a [`HandlerFn`].
///
/// `handler!(CreateTable, create_table)` adapts
/// `fn(&mut Generation, &CreateTableOperation, &mut Builder) -> Result<()>`.
/// With a trailing `terminate` the typed handler takes a `terminate: bool`
/// argument and is called with `true`, as the outermost call of a compound
/// statement always is.
macro_rules! handler {
    ($variant:ident, $func:path) => {{
        fn adapter(
            generation: &mut $crate::generator::Generation<'_>,
            operation: &$crate::operations::MigrationOperation,
            builder: &mut $crate::command::MigrationCommandListBuilder,
        ) -> $crate::error::Result<()> {
            match operation {
                $crate::operations::MigrationOperation::$variant(op) => {
                    $func(generation, op, builder)
                }
                other => Err(generation.mismatch(other)),
            }
        }
        adapter as $crate::generator::HandlerFn
    }};
    ($variant:ident, $func:path, terminate) => {{
        fn adapter(
            generation: &mut $crate::generator::Generation<'_>,
            operation: &$crate::operations::MigrationOperation,
            builder: &mut $crate::command::MigrationCommandListBuilder,
        ) -> $crate::error::Result<()> {
            match operation {
                $crate::operations::MigrationOperation::$variant(op) => {
                    $func(generation, op, builder, true)
                }
                other => Err(generation.mismatch(other)),
            }
        }
        adapter as $crate::generator::HandlerFn
    }};
}

pub(crate) use handler;

/// Maps every operation kind to the handler that generates it.
///
/// A dialect starts from [`HandlerTable::ansi`] and replaces the entries it
/// generates differently. Named custom operations have their own map.
#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    handlers: BTreeMap<OperationKind, Handler>,
    custom: BTreeMap<String, Handler>,
}

impl HandlerTable {
    /// An empty table; every operation is unknown to it.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The base handlers, covering every operation kind except custom ones.
    #[must_use]
    pub fn ansi() -> Self {
        use OperationKind as K;

        let mut table = Self::new();
        let origin = "ansi";
        table
            .set(K::EnsureSchema, origin, handler!(EnsureSchema, ansi::ensure_schema))
            .set(K::DropSchema, origin, handler!(DropSchema, ansi::drop_schema))
            .set(K::CreateTable, origin, handler!(CreateTable, ansi::create_table, terminate))
            .set(K::DropTable, origin, handler!(DropTable, ansi::drop_table))
            .set(K::RenameTable, origin, handler!(RenameTable, ansi::rename_table))
            .set(K::AlterTable, origin, handler!(AlterTable, ansi::alter_table))
            .set(K::AddColumn, origin, handler!(AddColumn, ansi::add_column, terminate))
            .set(K::DropColumn, origin, handler!(DropColumn, ansi::drop_column, terminate))
            .set(K::AlterColumn, origin, handler!(AlterColumn, ansi::alter_column))
            .set(K::RenameColumn, origin, handler!(RenameColumn, ansi::rename_column))
            .set(K::CreateIndex, origin, handler!(CreateIndex, ansi::create_index, terminate))
            .set(K::DropIndex, origin, handler!(DropIndex, ansi::drop_index, terminate))
            .set(K::RenameIndex, origin, handler!(RenameIndex, ansi::rename_index))
            .set(K::AddPrimaryKey, origin, handler!(AddPrimaryKey, ansi::add_primary_key))
            .set(K::DropPrimaryKey, origin, handler!(DropPrimaryKey, ansi::drop_primary_key))
            .set(K::AddForeignKey, origin, handler!(AddForeignKey, ansi::add_foreign_key))
            .set(K::DropForeignKey, origin, handler!(DropForeignKey, ansi::drop_foreign_key))
            .set(
                K::AddUniqueConstraint,
                origin,
                handler!(AddUniqueConstraint, ansi::add_unique_constraint),
            )
            .set(
                K::DropUniqueConstraint,
                origin,
                handler!(DropUniqueConstraint, ansi::drop_unique_constraint),
            )
            .set(
                K::CreateCheckConstraint,
                origin,
                handler!(CreateCheckConstraint, ansi::create_check_constraint),
            )
            .set(
                K::DropCheckConstraint,
                origin,
                handler!(DropCheckConstraint, ansi::drop_check_constraint),
            )
            .set(K::CreateSequence, origin, handler!(CreateSequence, ansi::create_sequence))
            .set(K::AlterSequence, origin, handler!(AlterSequence, ansi::alter_sequence))
            .set(K::DropSequence, origin, handler!(DropSequence, ansi::drop_sequence))
            .set(K::RenameSequence, origin, handler!(RenameSequence, ansi::rename_sequence))
            .set(K::RestartSequence, origin, handler!(RestartSequence, ansi::restart_sequence))
            .set(K::InsertData, origin, handler!(InsertData, ansi::insert_data))
            .set(K::UpdateData, origin, handler!(UpdateData, ansi::update_data))
            .set(K::DeleteData, origin, handler!(DeleteData, ansi::delete_data))
            .set(K::Sql, origin, handler!(Sql, ansi::sql));
        table
    }

    /// Registers `func` for `kind`, replacing any previous handler.
    pub fn set(&mut self, kind: OperationKind, origin: &'static str, func: HandlerFn) -> &mut Self {
        self.handlers.insert(kind, Handler { origin, func });
        self
    }

    /// Registers a handler for the custom operation called `name`.
    pub fn set_custom(
        &mut self,
        name: impl Into<String>,
        origin: &'static str,
        func: HandlerFn,
    ) -> &mut Self {
        self.custom.insert(name.into(), Handler { origin, func });
        self
    }

    #[must_use]
    pub fn get(&self, kind: OperationKind) -> Option<&Handler> {
        self.handlers.get(&kind)
    }

    #[must_use]
    pub fn get_custom(&self, name: &str) -> Option<&Handler> {
        self.custom.get(name)
    }

    /// The handler `operation` dispatches to.
    #[must_use]
    pub fn resolve(&self, operation: &MigrationOperation) -> Option<&Handler> {
        match operation {
            MigrationOperation::Custom(custom) => self.get_custom(&custom.name),
            other => self.get(other.kind()),
        }
    }

    /// Every registered handler as `(operation name, origin)`, kinds first.
    pub fn entries(&self) -> impl Iterator<Item = (String, &'static str)> + '_ {
        self.handlers
            .iter()
            .map(|(kind, h)| (kind.name().to_string(), h.origin))
            .chain(
                self.custom
                    .iter()
                    .map(|(name, h)| (format!("Custom({name})"), h.origin)),
            )
    }
}
