//! Foreign keys and the navigations that hang off them.

use crate::source::ConfigurationSource;

use super::{EntityTypeId, ForeignKeyId};

/// What happens to dependents when the principal is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteBehavior {
    /// Delete dependents.
    Cascade,
    /// Null out the foreign key of tracked dependents only.
    #[default]
    ClientSetNull,
    /// Null out the foreign key in the store.
    SetNull,
    /// Refuse the delete.
    Restrict,
}

impl DeleteBehavior {
    /// The `ON DELETE` action, if any, for this behavior.
    #[must_use]
    pub const fn referential_action(self) -> Option<&'static str> {
        match self {
            Self::Cascade => Some("CASCADE"),
            Self::SetNull => Some("SET NULL"),
            Self::Restrict => Some("RESTRICT"),
            Self::ClientSetNull => None,
        }
    }
}

/// Which end of a relationship a navigation sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NavigationSide {
    /// Declared on the dependent, pointing at the principal.
    DependentToPrincipal,
    /// Declared on the principal, pointing at the dependent(s).
    PrincipalToDependent,
}

impl NavigationSide {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::DependentToPrincipal => Self::PrincipalToDependent,
            Self::PrincipalToDependent => Self::DependentToPrincipal,
        }
    }
}

/// One end of a relationship. `source` records who decided the name,
/// including an explicit decision that there is no navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationEnd {
    pub name: Option<String>,
    pub source: Option<ConfigurationSource>,
}

impl NavigationEnd {
    pub(crate) fn new(name: Option<&str>, source: ConfigurationSource) -> Self {
        Self {
            name: name.map(str::to_string),
            source: Some(source),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// A relationship between a dependent and a principal entity type.
#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub(crate) id: ForeignKeyId,
    pub(crate) dependent: EntityTypeId,
    pub(crate) principal: EntityTypeId,
    pub(crate) properties: Vec<String>,
    pub(crate) principal_key: Vec<String>,
    pub(crate) properties_source: Option<ConfigurationSource>,
    pub(crate) unique: bool,
    pub(crate) required: bool,
    pub(crate) delete_behavior: DeleteBehavior,
    pub(crate) delete_behavior_source: Option<ConfigurationSource>,
    pub(crate) ownership: bool,
    pub(crate) dependent_to_principal: NavigationEnd,
    pub(crate) principal_to_dependent: NavigationEnd,
    pub(crate) source: ConfigurationSource,
}

impl ForeignKey {
    pub const fn id(&self) -> ForeignKeyId {
        self.id
    }

    /// The declaring (dependent) entity type.
    pub const fn dependent(&self) -> EntityTypeId {
        self.dependent
    }

    pub const fn principal(&self) -> EntityTypeId {
        self.principal
    }

    /// Foreign key properties, declared on the dependent.
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    /// The principal key the foreign key references.
    pub fn principal_key(&self) -> &[String] {
        &self.principal_key
    }

    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    pub const fn is_required(&self) -> bool {
        self.required
    }

    pub const fn delete_behavior(&self) -> DeleteBehavior {
        self.delete_behavior
    }

    pub const fn is_ownership(&self) -> bool {
        self.ownership
    }

    pub const fn source(&self) -> ConfigurationSource {
        self.source
    }

    pub const fn end(&self, side: NavigationSide) -> &NavigationEnd {
        match side {
            NavigationSide::DependentToPrincipal => &self.dependent_to_principal,
            NavigationSide::PrincipalToDependent => &self.principal_to_dependent,
        }
    }

    pub(crate) fn end_mut(&mut self, side: NavigationSide) -> &mut NavigationEnd {
        match side {
            NavigationSide::DependentToPrincipal => &mut self.dependent_to_principal,
            NavigationSide::PrincipalToDependent => &mut self.principal_to_dependent,
        }
    }

    pub fn dependent_to_principal(&self) -> Option<&str> {
        self.dependent_to_principal.name()
    }

    pub fn principal_to_dependent(&self) -> Option<&str> {
        self.principal_to_dependent.name()
    }

    /// The entity type a navigation on `side` is declared on.
    pub const fn declaring_type(&self, side: NavigationSide) -> EntityTypeId {
        match side {
            NavigationSide::DependentToPrincipal => self.dependent,
            NavigationSide::PrincipalToDependent => self.principal,
        }
    }

    /// The entity type a navigation on `side` points at.
    pub const fn target_type(&self, side: NavigationSide) -> EntityTypeId {
        self.declaring_type(side.opposite())
    }

    pub fn is_self_referencing(&self) -> bool {
        self.dependent == self.principal
    }

    /// Returns true if a navigation on `side` is a collection.
    pub const fn is_collection(&self, side: NavigationSide) -> bool {
        matches!(side, NavigationSide::PrincipalToDependent) && !self.unique
    }

    /// Side holding a navigation called `name` declared on `entity_type`.
    pub fn side_of(&self, entity_type: EntityTypeId, name: &str) -> Option<NavigationSide> {
        [
            NavigationSide::DependentToPrincipal,
            NavigationSide::PrincipalToDependent,
        ]
        .into_iter()
        .find(|side| {
            self.declaring_type(*side) == entity_type && self.end(*side).name() == Some(name)
        })
    }

    /// The strongest source among the key and both ends.
    pub fn strongest_source(&self) -> ConfigurationSource {
        self.source
            .strongest(self.dependent_to_principal.source)
            .strongest(self.principal_to_dependent.source)
    }
}
