//! Validation and the read-only model produced by [`crate::ModelBuilder::finish`].

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{ModelError, Result};
use crate::model::{DeleteBehavior, EntityTypeId, Model, ValueGenerated};
use crate::reflect::PrimitiveType;

/// A property as mapped to a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenProperty {
    pub name: String,
    pub column: String,
    pub primitive: PrimitiveType,
    pub nullable: bool,
    pub shadow: bool,
    pub value_generated: ValueGenerated,
    pub concurrency_token: bool,
}

/// An entity type and the table it is mapped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenEntityType {
    pub name: String,
    pub clr_type: Option<String>,
    pub base_type: Option<String>,
    pub owned: bool,
    pub table: String,
    /// Primary key properties first, in key order, then the rest by name.
    pub properties: Vec<FrozenProperty>,
    pub primary_key: Vec<String>,
}

impl FrozenEntityType {
    #[must_use]
    pub fn find_property(&self, name: &str) -> Option<&FrozenProperty> {
        self.properties.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenForeignKey {
    pub dependent: String,
    pub principal: String,
    pub properties: Vec<String>,
    pub principal_key: Vec<String>,
    pub unique: bool,
    pub required: bool,
    pub delete_behavior: DeleteBehavior,
    pub ownership: bool,
    pub dependent_to_principal: Option<String>,
    pub principal_to_dependent: Option<String>,
}

/// An index as mapped to columns of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenIndex {
    pub name: String,
    pub entity_type: String,
    pub table: String,
    pub columns: Vec<String>,
    pub include: Vec<String>,
    pub unique: bool,
}

/// The validated model. Its contents are ordered by name, so two builds of
/// the same input compare equal regardless of discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenModel {
    entity_types: Vec<FrozenEntityType>,
    foreign_keys: Vec<FrozenForeignKey>,
    indexes: Vec<FrozenIndex>,
    product_version: Option<String>,
}

impl FrozenModel {
    /// Validates `model` and takes a read-only snapshot of it.
    ///
    /// Every problem found is reported; more than one comes back as
    /// [`ModelError::Multiple`].
    pub fn freeze(model: &Model) -> Result<Self> {
        let mut errors = validate(model);
        match errors.len() {
            0 => {}
            1 => return Err(errors.remove(0)),
            _ => return Err(ModelError::Multiple(errors)),
        }

        let mut entity_types: Vec<_> = model
            .entity_types()
            .map(|et| freeze_entity_type(model, et.id()))
            .collect::<Result<_>>()?;
        entity_types.sort_by(|a, b| a.name.cmp(&b.name));

        let mut foreign_keys: Vec<_> = model
            .foreign_keys()
            .map(|fk| FrozenForeignKey {
                dependent: model.entity_type_name(fk.dependent()),
                principal: model.entity_type_name(fk.principal()),
                properties: fk.properties().to_vec(),
                principal_key: fk.principal_key().to_vec(),
                unique: fk.is_unique(),
                required: fk.is_required(),
                delete_behavior: fk.delete_behavior(),
                ownership: fk.is_ownership(),
                dependent_to_principal: fk.dependent_to_principal().map(str::to_string),
                principal_to_dependent: fk.principal_to_dependent().map(str::to_string),
            })
            .collect();
        foreign_keys.sort_by(|a, b| {
            (&a.dependent, &a.properties, &a.principal, &a.dependent_to_principal).cmp(&(
                &b.dependent,
                &b.properties,
                &b.principal,
                &b.dependent_to_principal,
            ))
        });

        let indexes = freeze_indexes(model)?;

        debug!(
            entity_types = entity_types.len(),
            foreign_keys = foreign_keys.len(),
            indexes = indexes.len(),
            "model frozen"
        );
        Ok(Self {
            entity_types,
            foreign_keys,
            indexes,
            product_version: model.product_version().map(str::to_string),
        })
    }

    pub fn entity_types(&self) -> &[FrozenEntityType] {
        &self.entity_types
    }

    #[must_use]
    pub fn find_entity_type(&self, name: &str) -> Option<&FrozenEntityType> {
        self.entity_types.iter().find(|et| et.name == name)
    }

    pub fn foreign_keys(&self) -> &[FrozenForeignKey] {
        &self.foreign_keys
    }

    /// Foreign keys declared by (dependent on) the named entity type.
    pub fn foreign_keys_of<'a>(
        &'a self,
        dependent: &'a str,
    ) -> impl Iterator<Item = &'a FrozenForeignKey> + 'a {
        self.foreign_keys
            .iter()
            .filter(move |fk| fk.dependent == dependent)
    }

    /// Entity types mapped to `table`.
    pub fn entity_types_in_table<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = &'a FrozenEntityType> + 'a {
        self.entity_types.iter().filter(move |et| et.table == table)
    }

    /// Every mapped table name.
    #[must_use]
    pub fn tables(&self) -> BTreeSet<&str> {
        self.entity_types.iter().map(|et| et.table.as_str()).collect()
    }

    /// The property mapped to `column` of `table`.
    #[must_use]
    pub fn find_column(&self, table: &str, column: &str) -> Option<&FrozenProperty> {
        self.entity_types
            .iter()
            .filter(|et| et.table == table)
            .flat_map(|et| et.properties.iter())
            .find(|p| p.column == column)
    }

    /// Declared indexes plus one per foreign key not already covered by the
    /// primary key or another index, ordered by table and name.
    #[must_use]
    pub fn indexes(&self) -> &[FrozenIndex] {
        &self.indexes
    }

    /// Indexes of `table` that contain `column` as a key or included column.
    pub fn indexes_on<'a>(
        &'a self,
        table: &'a str,
        column: &'a str,
    ) -> impl Iterator<Item = &'a FrozenIndex> + 'a {
        self.indexes
            .iter()
            .filter(move |i| {
                i.table == table && i.columns.iter().chain(&i.include).any(|c| c == column)
            })
    }

    /// The version of the tooling that authored the model, if recorded.
    pub fn product_version(&self) -> Option<&str> {
        self.product_version.as_deref()
    }
}

impl Model {
    fn entity_type_name(&self, id: EntityTypeId) -> String {
        self.get(id)
            .map_or_else(String::new, |et| et.name().to_string())
    }
}

fn validate(model: &Model) -> Vec<ModelError> {
    let mut errors = Vec::new();

    for et in model.entity_types() {
        let id = et.id();
        let name = et.display_name().to_string();
        if let Some(cycle) = ownership_cycle(model, id) {
            errors.push(cycle);
            continue;
        }
        let owned = model.is_owned(id);
        if owned && model.find_ownership(id).is_none() {
            errors.push(ModelError::OwnedTypeWithoutOwner(name));
            continue;
        }
        if et.base_type().is_none() && model.primary_key(id).is_none() {
            errors.push(ModelError::MissingPrimaryKey(name));
        }
    }

    for fk in model.foreign_keys() {
        let (Some(dependent), Some(principal)) = (model.get(fk.dependent()), model.get(fk.principal()))
        else {
            errors.push(ModelError::StaleForeignKey(fk.id().0));
            continue;
        };
        let invalid = |reason: String| ModelError::InvalidForeignKey {
            dependent: dependent.display_name().to_string(),
            principal: principal.display_name().to_string(),
            reason,
        };
        if fk.properties().is_empty() {
            errors.push(invalid("it has no properties".to_string()));
            continue;
        }
        if fk.properties().len() != fk.principal_key().len() {
            errors.push(invalid(format!(
                "{} properties do not match a principal key of {}",
                fk.properties().len(),
                fk.principal_key().len()
            )));
            continue;
        }
        for (property, key) in fk.properties().iter().zip(fk.principal_key()) {
            let Some(dependent_property) = model.find_property(fk.dependent(), property) else {
                errors.push(ModelError::ForeignKeyPropertyNotOnDependent {
                    dependent: dependent.display_name().to_string(),
                    property: property.clone(),
                });
                continue;
            };
            let Some(key_property) = model.find_property(fk.principal(), key) else {
                errors.push(invalid(format!("principal key property '{key}' does not exist")));
                continue;
            };
            if dependent_property.primitive() != key_property.primitive() {
                errors.push(invalid(format!(
                    "'{property}' is {:?} but '{key}' is {:?}",
                    dependent_property.primitive(),
                    key_property.primitive()
                )));
            }
        }
    }
    errors
}

fn ownership_cycle(model: &Model, id: EntityTypeId) -> Option<ModelError> {
    let mut seen = vec![id];
    let mut current = id;
    while let Some(fk) = model.find_ownership(current).and_then(|fk| model.foreign_key(fk)) {
        let owner = fk.principal();
        if seen.contains(&owner) {
            return Some(ModelError::OwnershipCycle {
                owner: model.entity_type_name(owner),
                owned: model.entity_type_name(id),
            });
        }
        seen.push(owner);
        current = owner;
    }
    None
}

/// Where an entity type's columns live, and the prefix its non-key columns
/// carry when it shares its owner's table.
struct TableMapping {
    table: String,
    prefix: String,
    /// Owned reference types store key columns in the owner's key columns.
    key_columns: Option<Vec<String>>,
}

fn table_mapping(model: &Model, id: EntityTypeId) -> Result<TableMapping> {
    let root = model.root(id);
    let et = model.entity_type(root)?;
    if let Some(table) = et.table_name() {
        return Ok(TableMapping {
            table: table.to_string(),
            prefix: String::new(),
            key_columns: None,
        });
    }

    let Some(ownership) = model.find_ownership(root).and_then(|fk| model.foreign_key(fk)) else {
        return Ok(TableMapping {
            table: et.name().to_string(),
            prefix: String::new(),
            key_columns: None,
        });
    };
    let navigation = ownership.principal_to_dependent().unwrap_or(et.display_name());
    let owner = ownership.principal();
    if !ownership.is_unique() {
        let table = if et.defining_navigation().is_some() {
            format!("{}_{navigation}", model.entity_type(model.root(owner))?.name())
        } else {
            et.name().to_string()
        };
        return Ok(TableMapping {
            table,
            prefix: String::new(),
            key_columns: None,
        });
    }

    let owner_mapping = table_mapping(model, owner)?;
    let key_columns = ownership
        .principal_key()
        .iter()
        .map(|key| column_of(model, owner, key, &owner_mapping))
        .collect();
    Ok(TableMapping {
        table: owner_mapping.table,
        prefix: format!("{}{navigation}_", owner_mapping.prefix),
        key_columns: Some(key_columns),
    })
}

fn column_of(model: &Model, id: EntityTypeId, property: &str, mapping: &TableMapping) -> String {
    if let (Some(key_columns), Some(key)) = (&mapping.key_columns, model.primary_key(id)) {
        if let Some(index) = key.properties().iter().position(|p| p == property) {
            if let Some(column) = key_columns.get(index) {
                return column.clone();
            }
        }
    }
    let column = model
        .find_property(id, property)
        .map_or(property, |p| p.column_name());
    format!("{}{column}", mapping.prefix)
}

fn freeze_entity_type(model: &Model, id: EntityTypeId) -> Result<FrozenEntityType> {
    let et = model.entity_type(id)?;
    let mapping = table_mapping(model, id)?;
    let primary_key: Vec<String> = model
        .primary_key(id)
        .map(|key| key.properties().to_vec())
        .unwrap_or_default();

    let mut properties: Vec<_> = model
        .properties(id)
        .into_iter()
        .map(|p| FrozenProperty {
            name: p.name().to_string(),
            column: column_of(model, id, p.name(), &mapping),
            primitive: p.primitive(),
            nullable: p.is_nullable(),
            shadow: p.is_shadow(),
            value_generated: p.value_generated(),
            concurrency_token: p.is_concurrency_token(),
        })
        .collect();
    properties.sort_by_key(|p| {
        (
            primary_key
                .iter()
                .position(|k| *k == p.name)
                .unwrap_or(usize::MAX),
            p.name.clone(),
        )
    });

    Ok(FrozenEntityType {
        name: et.name().to_string(),
        clr_type: et.clr_type().map(str::to_string),
        base_type: et
            .base_type()
            .map(|base| model.entity_type_name(base)),
        owned: model.is_owned(id),
        table: mapping.table,
        properties,
        primary_key,
    })
}

fn index_name(table: &str, columns: &[String]) -> String {
    format!("IX_{table}_{}", columns.join("_"))
}

fn freeze_indexes(model: &Model) -> Result<Vec<FrozenIndex>> {
    let mut indexes = Vec::new();
    for et in model.entity_types() {
        if et.indexes().is_empty() {
            continue;
        }
        let mapping = table_mapping(model, et.id())?;
        for index in et.indexes() {
            let columns: Vec<String> = index
                .properties()
                .iter()
                .map(|p| column_of(model, et.id(), p, &mapping))
                .collect();
            indexes.push(FrozenIndex {
                name: index
                    .name()
                    .map_or_else(|| index_name(&mapping.table, &columns), str::to_string),
                entity_type: et.name().to_string(),
                table: mapping.table.clone(),
                columns,
                include: index
                    .include()
                    .iter()
                    .map(|p| column_of(model, et.id(), p, &mapping))
                    .collect(),
                unique: index.is_unique(),
            });
        }
    }

    for fk in model.foreign_keys() {
        let dependent = fk.dependent();
        let mapping = table_mapping(model, dependent)?;
        let columns: Vec<String> = fk
            .properties()
            .iter()
            .map(|p| column_of(model, dependent, p, &mapping))
            .collect();
        let key_columns: Vec<String> = model
            .primary_key(model.root(dependent))
            .map(|key| {
                key.properties()
                    .iter()
                    .map(|p| column_of(model, dependent, p, &mapping))
                    .collect()
            })
            .unwrap_or_default();
        let covered = key_columns.starts_with(&columns)
            || indexes
                .iter()
                .any(|i| i.table == mapping.table && i.columns.starts_with(&columns));
        if covered {
            continue;
        }
        indexes.push(FrozenIndex {
            name: index_name(&mapping.table, &columns),
            entity_type: model.entity_type_name(dependent),
            table: mapping.table,
            columns,
            include: Vec::new(),
            unique: fk.is_unique(),
        });
    }

    indexes.sort_by(|a, b| (&a.table, &a.name).cmp(&(&b.table, &b.name)));
    Ok(indexes)
}
