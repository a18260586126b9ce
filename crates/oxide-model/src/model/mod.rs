//! The mutable metadata graph.
//!
//! Entity types and foreign keys live in arenas addressed by
//! [`EntityTypeId`] and [`ForeignKeyId`]. Removing an element empties its slot,
//! so a stale handle is detected instead of aliasing a newer element.
//!
//! Every mutation records a [`ModelEvent`]. Events are not handled here; the
//! [`crate::conventions::ConventionDispatcher`] drains them.

mod entity_type;
mod foreign_key;
mod mutation;
mod relationship;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

pub use entity_type::{DefiningNavigation, EntityType, Index, Key, Property, ValueGenerated};
pub(crate) use entity_type::NavigationCandidate;
pub use foreign_key::{DeleteBehavior, ForeignKey, NavigationEnd, NavigationSide};

use crate::error::{ModelError, Result};
use crate::reflect::TypeRegistry;
use crate::source::ConfigurationSource;

/// Handle of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityTypeId(pub(crate) usize);

/// Handle of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ForeignKeyId(pub(crate) usize);

/// A change to the model that conventions may react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    EntityTypeAdded(EntityTypeId),
    EntityTypeIgnored(String),
    BaseTypeChanged {
        entity_type: EntityTypeId,
        old_base: Option<EntityTypeId>,
    },
    PropertyAdded {
        entity_type: EntityTypeId,
        name: String,
    },
    PrimaryKeyChanged(EntityTypeId),
    MemberIgnored {
        entity_type: EntityTypeId,
        name: String,
    },
    NavigationAdded {
        foreign_key: ForeignKeyId,
        name: String,
    },
    NavigationRemoved {
        source: EntityTypeId,
        target: EntityTypeId,
        name: String,
    },
    ForeignKeyOwnershipChanged(ForeignKeyId),
}

/// A non-fatal finding reported while building the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelDiagnostic {
    /// Several navigations between two types could not be paired.
    MultipleNavigationProperties {
        entity_type: String,
        target: String,
        navigations: Vec<String>,
        inverses: Vec<String>,
    },
    /// A collection paired with a collection; no relationship was created.
    ManyToManySkipped {
        entity_type: String,
        navigation: String,
        target: String,
    },
}

impl fmt::Display for ModelDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultipleNavigationProperties {
                entity_type,
                target,
                navigations,
                inverses,
            } => write!(
                f,
                "Unable to determine the relationship between '{entity_type}' navigations [{}] and '{target}' navigations [{}]",
                navigations.join(", "),
                inverses.join(", ")
            ),
            Self::ManyToManySkipped {
                entity_type,
                navigation,
                target,
            } => write!(
                f,
                "'{entity_type}.{navigation}' and its inverse on '{target}' are both collections; no relationship was created"
            ),
        }
    }
}

/// The metadata graph under construction.
#[derive(Debug, Clone, Default)]
pub struct Model {
    types: TypeRegistry,
    entity_types: Vec<Option<EntityType>>,
    foreign_keys: Vec<Option<ForeignKey>>,
    ignored_types: BTreeMap<String, ConfigurationSource>,
    owned_types: BTreeSet<String>,
    product_version: Option<String>,
    events: VecDeque<ModelEvent>,
    diagnostics: Vec<ModelDiagnostic>,
}

impl Model {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reflected types available to conventions.
    pub const fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    pub fn product_version(&self) -> Option<&str> {
        self.product_version.as_deref()
    }

    pub fn set_product_version(&mut self, version: impl Into<String>) {
        self.product_version = Some(version.into());
    }

    /// Marks a reflected type as owned: references to it become ownerships.
    pub fn set_owned_type(&mut self, type_name: impl Into<String>) {
        self.owned_types.insert(type_name.into());
    }

    /// Returns true if the ownership predicate selects `type_name`.
    #[must_use]
    pub fn is_owned_type(&self, type_name: &str) -> bool {
        self.owned_types.contains(type_name)
    }

    /// Source that ignored the named type, if it is ignored.
    #[must_use]
    pub fn ignored_type_source(&self, name: &str) -> Option<ConfigurationSource> {
        self.ignored_types.get(name).copied()
    }

    pub fn diagnostics(&self) -> &[ModelDiagnostic] {
        &self.diagnostics
    }

    pub(crate) fn report(&mut self, diagnostic: ModelDiagnostic) {
        tracing::warn!(%diagnostic, "model diagnostic");
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn push_event(&mut self, event: ModelEvent) {
        self.events.push_back(event);
    }

    pub(crate) fn pop_event(&mut self) -> Option<ModelEvent> {
        self.events.pop_front()
    }

    // ------------------------------------------------------------------
    // Entity types
    // ------------------------------------------------------------------

    #[must_use]
    pub fn contains(&self, id: EntityTypeId) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn get(&self, id: EntityTypeId) -> Option<&EntityType> {
        self.entity_types.get(id.0).and_then(Option::as_ref)
    }

    /// Looks up a live entity type.
    pub fn entity_type(&self, id: EntityTypeId) -> Result<&EntityType> {
        self.get(id).ok_or(ModelError::StaleEntityType(id.0))
    }

    pub(crate) fn entity_type_mut(&mut self, id: EntityTypeId) -> Result<&mut EntityType> {
        self.entity_types
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(ModelError::StaleEntityType(id.0))
    }

    /// Live entity types in creation order.
    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.entity_types.iter().flatten()
    }

    #[must_use]
    pub fn find_entity_type(&self, name: &str) -> Option<EntityTypeId> {
        self.entity_types().find(|et| et.name == name).map(|et| et.id)
    }

    /// Entity types backed by the given reflected type.
    #[must_use]
    pub fn entity_types_with_clr(&self, clr: &str) -> Vec<EntityTypeId> {
        self.entity_types()
            .filter(|et| et.clr_type.as_deref() == Some(clr))
            .map(|et| et.id)
            .collect()
    }

    /// The weak entity type of `clr` scoped to `navigation` on `owner`.
    #[must_use]
    pub fn find_weak_entity_type(
        &self,
        clr: &str,
        owner: EntityTypeId,
        navigation: &str,
    ) -> Option<EntityTypeId> {
        self.entity_types()
            .find(|et| {
                et.clr_type.as_deref() == Some(clr)
                    && et
                        .defining_navigation
                        .as_ref()
                        .is_some_and(|d| d.entity_type == owner && d.name == navigation)
            })
            .map(|et| et.id)
    }

    pub(crate) fn display_name(&self, id: EntityTypeId) -> String {
        self.get(id)
            .map_or_else(|| format!("#{}", id.0), |et| et.display_name().to_string())
    }

    /// `id`, its base, the base of its base, and so on.
    #[must_use]
    pub fn base_chain(&self, id: EntityTypeId) -> Vec<EntityTypeId> {
        let mut chain = Vec::new();
        let mut current = self.get(id);
        while let Some(et) = current {
            if chain.contains(&et.id) {
                break;
            }
            chain.push(et.id);
            current = et.base_type.and_then(|base| self.get(base));
        }
        chain
    }

    #[must_use]
    pub fn root(&self, id: EntityTypeId) -> EntityTypeId {
        self.base_chain(id).last().copied().unwrap_or(id)
    }

    /// Returns true if `base` is `derived` or one of its bases.
    #[must_use]
    pub fn is_same_or_base_of(&self, base: EntityTypeId, derived: EntityTypeId) -> bool {
        self.base_chain(derived).contains(&base)
    }

    /// `id` followed by all types deriving from it, breadth first.
    #[must_use]
    pub fn derived_types_inclusive(&self, id: EntityTypeId) -> Vec<EntityTypeId> {
        if !self.contains(id) {
            return Vec::new();
        }
        let mut result = vec![id];
        let mut index = 0;
        while index < result.len() {
            let parent = result[index];
            for et in self.entity_types() {
                if et.base_type == Some(parent) && !result.contains(&et.id) {
                    result.push(et.id);
                }
            }
            index += 1;
        }
        result
    }

    /// The whole hierarchy `id` belongs to, root first.
    #[must_use]
    pub fn hierarchy(&self, id: EntityTypeId) -> Vec<EntityTypeId> {
        self.derived_types_inclusive(self.root(id))
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    /// Finds a property declared on `id` or one of its bases.
    #[must_use]
    pub fn find_property(&self, id: EntityTypeId, name: &str) -> Option<&Property> {
        self.base_chain(id)
            .into_iter()
            .filter_map(|et| self.get(et))
            .find_map(|et| et.find_declared_property(name))
    }

    /// Case-insensitive property lookup across the hierarchy chain.
    #[must_use]
    pub fn find_property_ignore_case(&self, id: EntityTypeId, name: &str) -> Option<&Property> {
        self.base_chain(id)
            .into_iter()
            .filter_map(|et| self.get(et))
            .flat_map(|et| et.properties.iter())
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// All properties visible on `id`, base properties first.
    #[must_use]
    pub fn properties(&self, id: EntityTypeId) -> Vec<&Property> {
        let mut chain = self.base_chain(id);
        chain.reverse();
        chain
            .into_iter()
            .filter_map(|et| self.get(et))
            .flat_map(|et| et.properties.iter())
            .collect()
    }

    /// The primary key, which lives on the root of the hierarchy.
    #[must_use]
    pub fn primary_key(&self, id: EntityTypeId) -> Option<&Key> {
        self.get(self.root(id)).and_then(|et| et.primary_key.as_ref())
    }

    /// Returns true if `name` is ignored on `id` or one of its bases.
    #[must_use]
    pub fn is_member_ignored(&self, id: EntityTypeId, name: &str) -> bool {
        self.base_chain(id)
            .into_iter()
            .filter_map(|et| self.get(et))
            .any(|et| et.ignored_members.contains_key(name))
    }

    // ------------------------------------------------------------------
    // Foreign keys and navigations
    // ------------------------------------------------------------------

    #[must_use]
    pub fn foreign_key(&self, id: ForeignKeyId) -> Option<&ForeignKey> {
        self.foreign_keys.get(id.0).and_then(Option::as_ref)
    }

    pub(crate) fn foreign_key_ref(&self, id: ForeignKeyId) -> Result<&ForeignKey> {
        self.foreign_key(id).ok_or(ModelError::StaleForeignKey(id.0))
    }

    pub(crate) fn foreign_key_mut(&mut self, id: ForeignKeyId) -> Result<&mut ForeignKey> {
        self.foreign_keys
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(ModelError::StaleForeignKey(id.0))
    }

    /// Live foreign keys in creation order.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &ForeignKey> {
        self.foreign_keys.iter().flatten()
    }

    /// Foreign keys whose dependent is `id`.
    #[must_use]
    pub fn declared_foreign_keys(&self, id: EntityTypeId) -> Vec<ForeignKeyId> {
        self.foreign_keys()
            .filter(|fk| fk.dependent == id)
            .map(|fk| fk.id)
            .collect()
    }

    /// Foreign keys whose principal is `id`.
    #[must_use]
    pub fn referencing_foreign_keys(&self, id: EntityTypeId) -> Vec<ForeignKeyId> {
        self.foreign_keys()
            .filter(|fk| fk.principal == id)
            .map(|fk| fk.id)
            .collect()
    }

    /// Navigations declared on `id` itself.
    #[must_use]
    pub fn declared_navigations(&self, id: EntityTypeId) -> Vec<(ForeignKeyId, NavigationSide)> {
        let mut navigations = Vec::new();
        for fk in self.foreign_keys() {
            for side in [
                NavigationSide::DependentToPrincipal,
                NavigationSide::PrincipalToDependent,
            ] {
                if fk.declaring_type(side) == id && fk.end(side).name.is_some() {
                    navigations.push((fk.id, side));
                }
            }
        }
        navigations
    }

    #[must_use]
    pub fn find_declared_navigation(
        &self,
        id: EntityTypeId,
        name: &str,
    ) -> Option<(ForeignKeyId, NavigationSide)> {
        self.foreign_keys()
            .find_map(|fk| fk.side_of(id, name).map(|side| (fk.id, side)))
    }

    /// Finds a navigation declared on `id` or one of its bases.
    #[must_use]
    pub fn find_navigation(
        &self,
        id: EntityTypeId,
        name: &str,
    ) -> Option<(ForeignKeyId, NavigationSide)> {
        self.base_chain(id)
            .into_iter()
            .find_map(|et| self.find_declared_navigation(et, name))
    }

    /// The ownership foreign key of `id` (or of one of its bases).
    #[must_use]
    pub fn find_ownership(&self, id: EntityTypeId) -> Option<ForeignKeyId> {
        self.base_chain(id).into_iter().find_map(|et| {
            self.foreign_keys()
                .find(|fk| fk.ownership && fk.dependent == et)
                .map(|fk| fk.id)
        })
    }

    /// Owners of `id`, nearest first.
    #[must_use]
    pub fn ownership_path(&self, id: EntityTypeId) -> Vec<EntityTypeId> {
        let mut path = Vec::new();
        let mut current = id;
        while let Some(fk) = self.find_ownership(current).and_then(|fk| self.foreign_key(fk)) {
            if fk.principal == id || path.contains(&fk.principal) {
                break;
            }
            path.push(fk.principal);
            current = fk.principal;
        }
        path
    }

    /// Returns true if `target` owns `id`, directly or transitively.
    #[must_use]
    pub fn is_in_ownership_path(&self, id: EntityTypeId, target: EntityTypeId) -> bool {
        self.ownership_path(id)
            .into_iter()
            .any(|owner| self.is_same_or_base_of(target, owner))
    }

    /// True when `id` is owned: created as owned, selected by the ownership
    /// predicate, or the dependent of an ownership.
    #[must_use]
    pub fn is_owned(&self, id: EntityTypeId) -> bool {
        self.get(id).is_some_and(|et| {
            et.owned
                || et
                    .clr_type
                    .as_deref()
                    .is_some_and(|clr| self.is_owned_type(clr))
        }) || self.find_ownership(id).is_some()
    }

    /// Returns true if an ambiguous navigation of `id` points at `target_clr`
    /// or at a type assignable to it.
    #[must_use]
    pub fn has_ambiguous_navigations_to(&self, id: EntityTypeId, target_clr: &str) -> bool {
        self.get(id)
            .and_then(|et| et.ambiguous_navigations.as_ref())
            .is_some_and(|map| {
                map.values()
                    .any(|target| self.types.is_assignable_from(target, target_clr))
            })
    }
}
