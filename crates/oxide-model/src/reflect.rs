//! Reflection input: the shape of user types as seen by conventions.
//!
//! A [`TypeRegistry`] holds one [`TypeInfo`] per reflected type. Types are
//! usually registered through `#[derive(Reflect)]`, which also registers every
//! type reachable through reference and collection members.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Scalar types that map to a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Bool,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    String,
    Bytes,
    Guid,
    DateTime,
    Date,
    Time,
}

impl PrimitiveType {
    /// Returns true for integral types, which get store-generated keys.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Int16 | Self::Int32 | Self::Int64)
    }
}

/// The shape of a reflected member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberType {
    /// A scalar value.
    Primitive(PrimitiveType),
    /// A single reference to another reflected type.
    Reference(String),
    /// A collection of another reflected type.
    Collection(String),
}

impl MemberType {
    /// The referenced type name, for navigation-shaped members.
    #[must_use]
    pub fn target_type(&self) -> Option<&str> {
        match self {
            Self::Primitive(_) => None,
            Self::Reference(target) | Self::Collection(target) => Some(target),
        }
    }

    /// Returns true for collection members.
    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(self, Self::Collection(_))
    }
}

/// A member (field or accessor) of a reflected type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub name: String,
    /// The type that declares the member; filled in by [`TypeInfo::member`].
    pub declaring_type: String,
    pub member_type: MemberType,
    pub nullable: bool,
    pub readable: bool,
    pub writable: bool,
    /// Marked `#[reflect(not_mapped)]`.
    pub not_mapped: bool,
}

impl MemberInfo {
    fn new(name: impl Into<String>, member_type: MemberType) -> Self {
        Self {
            name: name.into(),
            declaring_type: String::new(),
            member_type,
            nullable: false,
            readable: true,
            writable: true,
            not_mapped: false,
        }
    }

    /// A scalar member.
    #[must_use]
    pub fn primitive(name: impl Into<String>, ty: PrimitiveType) -> Self {
        Self::new(name, MemberType::Primitive(ty))
    }

    /// A reference to another type.
    #[must_use]
    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, MemberType::Reference(target.into()))
    }

    /// A collection of another type.
    #[must_use]
    pub fn collection(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, MemberType::Collection(target.into()))
    }

    /// Marks the member as nullable.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Marks the member as read-only.
    #[must_use]
    pub const fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Marks the member as excluded from mapping.
    #[must_use]
    pub const fn not_mapped(mut self) -> Self {
        self.not_mapped = true;
        self
    }

    /// Identity of this member.
    #[must_use]
    pub fn id(&self) -> MemberId {
        MemberId::new(&self.name, &self.declaring_type)
    }
}

/// Identity of a member. Orders by name first, then by declaring type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberId {
    pub name: String,
    pub declaring_type: String,
}

impl MemberId {
    #[must_use]
    pub fn new(name: impl Into<String>, declaring_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaring_type: declaring_type.into(),
        }
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.name)
    }
}

/// Reflected description of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: String,
    pub base: Option<String>,
    pub members: Vec<MemberInfo>,
}

impl TypeInfo {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            members: Vec::new(),
        }
    }

    /// Sets the reflected base type.
    #[must_use]
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Adds a declared member.
    #[must_use]
    pub fn member(mut self, mut member: MemberInfo) -> Self {
        member.declaring_type.clone_from(&self.name);
        self.members.push(member);
        self
    }
}

/// Types that describe themselves to the model builder.
pub trait Reflect {
    /// The reflected description of `Self`.
    fn type_info() -> TypeInfo;

    /// Registers `Self` (and, for derived impls, every type it reaches).
    fn register(registry: &mut TypeRegistry) {
        registry.insert(Self::type_info());
    }
}

/// All reflected types known to a model.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, TypeInfo>,
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a type. Returns false if a type with that name was already
    /// registered, in which case the registry is unchanged.
    pub fn insert(&mut self, info: TypeInfo) -> bool {
        if self.types.contains_key(&info.name) {
            return false;
        }
        self.types.insert(info.name.clone(), info);
        true
    }

    /// Registers a [`Reflect`] type and everything it reaches.
    pub fn register<T: Reflect>(&mut self) {
        T::register(self);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TypeInfo> {
        self.types.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// The chain `name, base, base of base, ...` as far as it is registered.
    #[must_use]
    pub fn base_chain(&self, name: &str) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();
        let mut current = self.types.get(name);
        while let Some(info) = current {
            if !seen.insert(info.name.as_str()) {
                break;
            }
            chain.push(info.name.as_str());
            current = info.base.as_deref().and_then(|base| self.types.get(base));
        }
        chain
    }

    /// Returns true if a value of `derived` can be used where `base` is
    /// expected.
    #[must_use]
    pub fn is_assignable_from(&self, base: &str, derived: &str) -> bool {
        base == derived || self.base_chain(derived).contains(&base)
    }

    /// All members visible on `name`, including inherited ones. A member
    /// redeclared on a derived type hides the base member of the same name.
    #[must_use]
    pub fn members(&self, name: &str) -> Vec<&MemberInfo> {
        let mut seen = BTreeSet::new();
        let mut members = Vec::new();
        for ty in self.base_chain(name) {
            let Some(info) = self.types.get(ty) else {
                continue;
            };
            for member in &info.members {
                if seen.insert(member.name.as_str()) {
                    members.push(member);
                }
            }
        }
        members
    }

    /// Finds a visible member by name.
    #[must_use]
    pub fn find_member(&self, type_name: &str, member: &str) -> Option<&MemberInfo> {
        self.members(type_name)
            .into_iter()
            .find(|candidate| candidate.name == member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.insert(
            TypeInfo::new("Animal")
                .member(MemberInfo::primitive("Id", PrimitiveType::Int32))
                .member(MemberInfo::primitive("Name", PrimitiveType::String)),
        );
        registry.insert(
            TypeInfo::new("Dog")
                .with_base("Animal")
                .member(MemberInfo::primitive("Name", PrimitiveType::String).nullable())
                .member(MemberInfo::reference("Owner", "Person").nullable()),
        );
        registry
    }

    #[test]
    fn test_insert_is_first_wins() {
        let mut registry = registry();
        assert!(!registry.insert(TypeInfo::new("Dog")));
        assert_eq!(registry.get("Dog").map(|t| t.members.len()), Some(2));
    }

    #[test]
    fn test_assignability() {
        let registry = registry();
        assert!(registry.is_assignable_from("Animal", "Dog"));
        assert!(registry.is_assignable_from("Dog", "Dog"));
        assert!(!registry.is_assignable_from("Dog", "Animal"));
        assert!(!registry.is_assignable_from("Person", "Dog"));
    }

    #[test]
    fn test_members_include_inherited_and_hide_redeclared() {
        let registry = registry();
        let members = registry.members("Dog");
        let names: Vec<_> = members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Name", "Owner", "Id"]);

        let name = registry.find_member("Dog", "Name").unwrap();
        assert_eq!(name.declaring_type, "Dog");
        assert!(name.nullable);

        let id = registry.find_member("Dog", "Id").unwrap();
        assert_eq!(id.declaring_type, "Animal");
    }

    #[test]
    fn test_member_id_orders_by_name_first() {
        let a = MemberId::new("Author", "Zebra");
        let b = MemberId::new("Blog", "Apple");
        assert!(a < b);
        assert_eq!(a.to_string(), "Zebra.Author");
    }

    #[test]
    fn test_member_type_target() {
        assert_eq!(
            MemberType::Collection("Post".into()).target_type(),
            Some("Post")
        );
        assert_eq!(
            MemberType::Primitive(PrimitiveType::Bool).target_type(),
            None
        );
        assert!(MemberType::Collection("Post".into()).is_collection());
    }
}
