//! Entity types and their scalar members.

use std::collections::BTreeMap;

use crate::reflect::{MemberId, PrimitiveType};
use crate::source::ConfigurationSource;

use super::EntityTypeId;

/// When the store generates a value for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueGenerated {
    #[default]
    Never,
    OnAdd,
    OnAddOrUpdate,
}

/// A scalar property mapped to a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub(crate) name: String,
    pub(crate) primitive: PrimitiveType,
    pub(crate) nullable: bool,
    pub(crate) shadow: bool,
    pub(crate) value_generated: ValueGenerated,
    pub(crate) concurrency_token: bool,
    pub(crate) column_name: Option<String>,
    pub(crate) source: ConfigurationSource,
}

impl Property {
    pub(crate) fn new(
        name: impl Into<String>,
        primitive: PrimitiveType,
        nullable: bool,
        shadow: bool,
        source: ConfigurationSource,
    ) -> Self {
        Self {
            name: name.into(),
            primitive,
            nullable,
            shadow,
            value_generated: ValueGenerated::Never,
            concurrency_token: false,
            column_name: None,
            source,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn primitive(&self) -> PrimitiveType {
        self.primitive
    }

    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Shadow properties exist in the model but not on the reflected type.
    pub const fn is_shadow(&self) -> bool {
        self.shadow
    }

    pub const fn value_generated(&self) -> ValueGenerated {
        self.value_generated
    }

    pub const fn is_concurrency_token(&self) -> bool {
        self.concurrency_token
    }

    /// The mapped column name; defaults to the property name.
    pub fn column_name(&self) -> &str {
        self.column_name.as_deref().unwrap_or(&self.name)
    }

    pub const fn source(&self) -> ConfigurationSource {
        self.source
    }
}

/// A primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub(crate) properties: Vec<String>,
    pub(crate) source: ConfigurationSource,
}

impl Key {
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    pub const fn source(&self) -> ConfigurationSource {
        self.source
    }
}

/// An index over one or more properties of an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub(crate) properties: Vec<String>,
    pub(crate) name: Option<String>,
    pub(crate) unique: bool,
    pub(crate) include: Vec<String>,
    pub(crate) source: ConfigurationSource,
}

impl Index {
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    /// Non-key properties stored with the index.
    pub fn include(&self) -> &[String] {
        &self.include
    }

    pub const fn source(&self) -> ConfigurationSource {
        self.source
    }
}

/// The navigation that scopes a weak entity type to a single owner member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefiningNavigation {
    pub name: String,
    pub entity_type: EntityTypeId,
}

/// A cached navigation candidate of an entity type's reflected type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NavigationCandidate {
    pub(crate) target: String,
    pub(crate) collection: bool,
}

/// An entity type in the metadata graph.
#[derive(Debug, Clone)]
pub struct EntityType {
    pub(crate) id: EntityTypeId,
    pub(crate) name: String,
    pub(crate) clr_type: Option<String>,
    pub(crate) source: ConfigurationSource,
    pub(crate) base_type: Option<EntityTypeId>,
    pub(crate) base_type_source: Option<ConfigurationSource>,
    pub(crate) owned: bool,
    pub(crate) defining_navigation: Option<DefiningNavigation>,
    pub(crate) properties: Vec<Property>,
    pub(crate) primary_key: Option<Key>,
    pub(crate) indexes: Vec<Index>,
    pub(crate) table_name: Option<(String, ConfigurationSource)>,
    pub(crate) ignored_members: BTreeMap<String, ConfigurationSource>,
    pub(crate) navigation_candidates: Option<BTreeMap<MemberId, NavigationCandidate>>,
    pub(crate) ambiguous_navigations: Option<BTreeMap<MemberId, String>>,
}

impl EntityType {
    pub(crate) fn new(
        id: EntityTypeId,
        name: String,
        clr_type: Option<String>,
        source: ConfigurationSource,
    ) -> Self {
        Self {
            id,
            name,
            clr_type,
            source,
            base_type: None,
            base_type_source: None,
            owned: false,
            defining_navigation: None,
            properties: Vec::new(),
            primary_key: None,
            indexes: Vec::new(),
            table_name: None,
            ignored_members: BTreeMap::new(),
            navigation_candidates: None,
            ambiguous_navigations: None,
        }
    }

    pub const fn id(&self) -> EntityTypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The reflected type backing this entity type, if any.
    pub fn clr_type(&self) -> Option<&str> {
        self.clr_type.as_deref()
    }

    pub const fn source(&self) -> ConfigurationSource {
        self.source
    }

    pub const fn base_type(&self) -> Option<EntityTypeId> {
        self.base_type
    }

    /// True when the entity type was created as an owned type.
    pub const fn is_owned(&self) -> bool {
        self.owned
    }

    pub const fn defining_navigation(&self) -> Option<&DefiningNavigation> {
        self.defining_navigation.as_ref()
    }

    /// Properties declared on this entity type (not inherited ones).
    pub fn declared_properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn find_declared_property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub(crate) fn find_declared_property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.name == name)
    }

    pub const fn primary_key(&self) -> Option<&Key> {
        self.primary_key.as_ref()
    }

    /// Indexes declared on this entity type.
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_ref().map(|(name, _)| name.as_str())
    }

    /// Source that ignored `member` on this entity type, if it is ignored.
    pub fn ignored_member_source(&self, member: &str) -> Option<ConfigurationSource> {
        self.ignored_members.get(member).copied()
    }

    /// Navigation candidates that could not be paired, keyed by member and
    /// mapped to the name of the target type.
    pub fn ambiguous_navigations(&self) -> Option<&BTreeMap<MemberId, String>> {
        self.ambiguous_navigations.as_ref()
    }

    /// Returns true if any ambiguous navigation of this type points at
    /// `target`.
    pub fn has_ambiguous_navigations_to(&self, target: &str) -> bool {
        self.ambiguous_navigations
            .as_ref()
            .is_some_and(|map| map.values().any(|t| t == target))
    }

    /// The name used in messages: the reflected type name when there is one.
    pub fn display_name(&self) -> &str {
        self.clr_type.as_deref().unwrap_or(&self.name)
    }
}
