//! Error types for model building.

use crate::source::ConfigurationSource;

/// Errors raised when a metadata mutation would break a structural invariant.
///
/// Precedence conflicts are not errors: a mutation that loses to stronger
/// configuration returns [`crate::Outcome::Rejected`] instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// A name was empty or otherwise unusable.
    #[error("Invalid name: '{0}'")]
    InvalidName(String),

    /// An entity type handle no longer refers to a live entity type.
    #[error("Entity type #{0} has been removed from the model")]
    StaleEntityType(usize),

    /// A foreign key handle no longer refers to a live foreign key.
    #[error("Foreign key #{0} has been removed from the model")]
    StaleForeignKey(usize),

    /// The named entity type does not exist.
    #[error("Entity type '{0}' does not exist")]
    UnknownEntityType(String),

    /// The named member is not declared by the reflected type.
    #[error("Type '{type_name}' has no member named '{member}'")]
    UnknownMember {
        /// The reflected type.
        type_name: String,
        /// The missing member.
        member: String,
    },

    /// The named property does not exist on the entity type or its bases.
    #[error("Entity type '{entity_type}' has no property named '{property}'")]
    UnknownProperty {
        /// The entity type.
        entity_type: String,
        /// The missing property.
        property: String,
    },

    /// No index is declared over the given properties.
    #[error("Entity type '{entity_type}' has no index over {properties:?}")]
    UnknownIndex {
        /// The entity type.
        entity_type: String,
        /// The properties that were looked up.
        properties: Vec<String>,
    },

    /// A member name is already used by a different kind of member.
    #[error("'{member}' on '{entity_type}' is already a {existing}")]
    MemberKindConflict {
        /// The entity type.
        entity_type: String,
        /// The member name.
        member: String,
        /// What the existing member is ("property" or "navigation").
        existing: &'static str,
    },

    /// Setting the base type would make the hierarchy cyclic.
    #[error("Setting '{base}' as base of '{entity_type}' would create an inheritance cycle")]
    InheritanceCycle {
        /// The derived entity type.
        entity_type: String,
        /// The proposed base type.
        base: String,
    },

    /// Ownership would make an entity type own itself through a chain.
    #[error("'{owned}' cannot be owned by '{owner}': ownership would form a cycle")]
    OwnershipCycle {
        /// The would-be owner.
        owner: String,
        /// The would-be owned type.
        owned: String,
    },

    /// An owned type already has an owner through a different principal.
    #[error("'{owned}' is already owned by '{existing}' and cannot also be owned by '{owner}'")]
    ConflictingOwner {
        /// The owned type.
        owned: String,
        /// The current owner.
        existing: String,
        /// The requested owner.
        owner: String,
    },

    /// The ownership navigation may only be renamed by explicit configuration.
    #[error(
        "The ownership navigation '{existing}' on '{owner}' cannot be replaced by '{requested}' from {held_by:?} configuration"
    )]
    OwnershipNavigationReassign {
        /// The owner entity type.
        owner: String,
        /// The navigation currently defining the ownership.
        existing: String,
        /// The requested navigation.
        requested: String,
        /// Source of the rejected request.
        held_by: ConfigurationSource,
    },

    /// A foreign key property is not declared on the dependent entity type.
    #[error("Foreign key property '{property}' is not declared on dependent '{dependent}'")]
    ForeignKeyPropertyNotOnDependent {
        /// The dependent entity type.
        dependent: String,
        /// The offending property.
        property: String,
    },

    /// Both ends of a relationship are collections.
    #[error("'{entity_type}.{navigation}' and its inverse are both collections; many-to-many is not supported")]
    ManyToManyNotSupported {
        /// The source entity type.
        entity_type: String,
        /// The navigation name.
        navigation: String,
    },

    /// A non-owned entity type reached validation without a primary key.
    #[error("Entity type '{0}' has no primary key")]
    MissingPrimaryKey(String),

    /// An owned entity type reached validation without an owner.
    #[error("Owned entity type '{0}' is not referenced by any ownership")]
    OwnedTypeWithoutOwner(String),

    /// A foreign key is structurally incomplete at validation.
    #[error("Foreign key from '{dependent}' to '{principal}' is invalid: {reason}")]
    InvalidForeignKey {
        /// The dependent entity type.
        dependent: String,
        /// The principal entity type.
        principal: String,
        /// What is wrong.
        reason: String,
    },

    /// Convention processing did not settle.
    #[error("Convention processing did not converge after {0} events")]
    ConventionLoop(usize),

    /// Multiple errors occurred.
    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<ModelError>),
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
