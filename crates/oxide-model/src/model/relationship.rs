//! Foreign key, navigation and ownership mutations.

use tracing::debug;

use crate::error::{ModelError, Result};
use crate::reflect::PrimitiveType;
use crate::source::{ConfigurationSource, Outcome};

use super::{
    DeleteBehavior, EntityTypeId, ForeignKey, ForeignKeyId, Model, ModelEvent, NavigationEnd,
    NavigationSide, ValueGenerated,
};

/// Everything needed to add a foreign key.
#[derive(Debug, Clone)]
pub(crate) struct NewForeignKey {
    pub(crate) dependent: EntityTypeId,
    pub(crate) principal: EntityTypeId,
    pub(crate) properties: Vec<String>,
    pub(crate) principal_key: Vec<String>,
    pub(crate) unique: bool,
    pub(crate) ownership: bool,
    pub(crate) dependent_to_principal: NavigationEnd,
    pub(crate) principal_to_dependent: NavigationEnd,
    pub(crate) source: ConfigurationSource,
}

/// Resolved direction of a relationship about to be created.
struct Shape<'a> {
    dependent: EntityTypeId,
    principal: EntityTypeId,
    dependent_to_principal: Option<&'a str>,
    principal_to_dependent: Option<&'a str>,
    unique: bool,
}

impl Model {
    pub(crate) fn add_foreign_key(&mut self, new: NewForeignKey) -> Result<ForeignKeyId> {
        self.entity_type(new.dependent)?;
        self.entity_type(new.principal)?;
        for property in &new.properties {
            if self.find_property(new.dependent, property).is_none() {
                return Err(ModelError::ForeignKeyPropertyNotOnDependent {
                    dependent: self.display_name(new.dependent),
                    property: property.clone(),
                });
            }
        }
        for (declaring, end) in [
            (new.dependent, &new.dependent_to_principal),
            (new.principal, &new.principal_to_dependent),
        ] {
            if let Some(name) = end.name() {
                self.check_navigation_name(declaring, name)?;
            }
        }

        let required = new.ownership || self.all_non_nullable(new.dependent, &new.properties);
        let id = ForeignKeyId(self.foreign_keys.len());
        let key = ForeignKey {
            id,
            dependent: new.dependent,
            principal: new.principal,
            properties_source: (!new.properties.is_empty()).then_some(new.source),
            properties: new.properties,
            principal_key: new.principal_key,
            unique: new.unique,
            required,
            delete_behavior: if required {
                DeleteBehavior::Cascade
            } else {
                DeleteBehavior::ClientSetNull
            },
            delete_behavior_source: None,
            ownership: new.ownership,
            dependent_to_principal: new.dependent_to_principal,
            principal_to_dependent: new.principal_to_dependent,
            source: new.source,
        };
        debug!(
            dependent = %self.display_name(key.dependent),
            principal = %self.display_name(key.principal),
            properties = ?key.properties,
            dependent_to_principal = ?key.dependent_to_principal(),
            principal_to_dependent = ?key.principal_to_dependent(),
            unique = key.unique,
            ownership = key.ownership,
            "foreign key added"
        );
        let added: Vec<String> = [
            key.dependent_to_principal().map(str::to_string),
            key.principal_to_dependent().map(str::to_string),
        ]
        .into_iter()
        .flatten()
        .collect();
        let declarations = [
            (key.dependent, key.dependent_to_principal().map(str::to_string)),
            (key.principal, key.principal_to_dependent().map(str::to_string)),
        ];
        self.foreign_keys.push(Some(key));
        for (declaring, name) in declarations {
            if let Some(name) = name {
                self.remove_weaker_derived_navigations(declaring, &name, new.source)?;
            }
        }
        for name in added {
            self.push_event(ModelEvent::NavigationAdded {
                foreign_key: id,
                name,
            });
        }
        Ok(id)
    }

    fn check_navigation_name(&self, declaring: EntityTypeId, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(ModelError::InvalidName(name.to_string()));
        }
        if self.find_property(declaring, name).is_some() {
            return Err(ModelError::MemberKindConflict {
                entity_type: self.display_name(declaring),
                member: name.to_string(),
                existing: "property",
            });
        }
        Ok(())
    }

    fn all_non_nullable(&self, id: EntityTypeId, properties: &[String]) -> bool {
        !properties.is_empty()
            && properties.iter().all(|name| {
                self.find_property(id, name)
                    .is_some_and(|property| !property.nullable)
            })
    }

    /// Removes a foreign key unconditionally, along with the shadow
    /// properties only it used.
    pub(crate) fn detach_foreign_key(&mut self, id: ForeignKeyId) -> Result<()> {
        let Some(key) = self.foreign_keys.get_mut(id.0).and_then(Option::take) else {
            return Err(ModelError::StaleForeignKey(id.0));
        };
        debug!(
            dependent = %self.display_name(key.dependent),
            principal = %self.display_name(key.principal),
            "foreign key removed"
        );
        for side in [
            NavigationSide::DependentToPrincipal,
            NavigationSide::PrincipalToDependent,
        ] {
            if let Some(name) = key.end(side).name() {
                self.push_event(ModelEvent::NavigationRemoved {
                    source: key.declaring_type(side),
                    target: key.target_type(side),
                    name: name.to_string(),
                });
            }
        }
        self.remove_unused_shadow_properties(key.dependent, &key.properties)
    }

    fn remove_unused_shadow_properties(
        &mut self,
        dependent: EntityTypeId,
        properties: &[String],
    ) -> Result<()> {
        if !self.contains(dependent) {
            return Ok(());
        }
        for name in properties {
            let removable = self.find_property(dependent, name).is_some_and(|p| {
                p.shadow && p.source == ConfigurationSource::Convention
            }) && !self
                .foreign_keys()
                .any(|fk| fk.dependent == dependent && fk.properties.contains(name))
                && !self
                    .primary_key(dependent)
                    .is_some_and(|key| key.properties.contains(name));
            if removable {
                for et in self.base_chain(dependent) {
                    let _ = self.remove_property(et, name, ConfigurationSource::Convention)?;
                }
            }
        }
        Ok(())
    }

    /// Removes a foreign key unless a stronger source configured any part of
    /// it.
    pub fn remove_foreign_key(
        &mut self,
        id: ForeignKeyId,
        source: ConfigurationSource,
    ) -> Result<Outcome<()>> {
        let held = self.foreign_key_ref(id)?.strongest_source();
        if !source.overrides(Some(held)) {
            return Ok(Outcome::Rejected { held });
        }
        self.detach_foreign_key(id)?;
        Ok(Outcome::Applied(()))
    }

    /// Clears one navigation. A convention foreign key left without any
    /// navigation is removed.
    pub(crate) fn remove_navigation(
        &mut self,
        id: ForeignKeyId,
        side: NavigationSide,
        source: ConfigurationSource,
    ) -> Result<()> {
        let key = self.foreign_key_mut(id)?;
        let Some(name) = key.end_mut(side).name.take() else {
            return Ok(());
        };
        key.end_mut(side).source = (source > ConfigurationSource::Convention).then_some(source);
        let orphaned = key.dependent_to_principal.name.is_none()
            && key.principal_to_dependent.name.is_none()
            && key.source == ConfigurationSource::Convention;
        let (declaring, target) = (key.declaring_type(side), key.target_type(side));
        self.push_event(ModelEvent::NavigationRemoved {
            source: declaring,
            target,
            name,
        });
        if orphaned {
            self.detach_foreign_key(id)?;
        }
        Ok(())
    }

    /// Returns true if `source` may set the navigation on `side` to `name`.
    #[must_use]
    pub fn can_set_navigation(
        &self,
        id: ForeignKeyId,
        side: NavigationSide,
        name: Option<&str>,
        source: ConfigurationSource,
    ) -> bool {
        let Some(key) = self.foreign_key(id) else {
            return false;
        };
        let end = key.end(side);
        if end.name() == name {
            return true;
        }
        if !source.overrides(end.source) {
            return false;
        }
        !(key.ownership
            && side == NavigationSide::PrincipalToDependent
            && end.name.is_some()
            && source != ConfigurationSource::Explicit)
    }

    /// Names (or explicitly un-names) one end of a relationship.
    pub fn set_navigation(
        &mut self,
        id: ForeignKeyId,
        side: NavigationSide,
        name: Option<&str>,
        source: ConfigurationSource,
    ) -> Result<Outcome<()>> {
        let key = self.foreign_key_ref(id)?;
        let end = key.end(side);
        if end.name() == name {
            let key = self.foreign_key_mut(id)?;
            let end = key.end_mut(side);
            end.source = Some(source.strongest(end.source));
            return Ok(Outcome::Applied(()));
        }
        if !source.overrides(end.source) {
            return Ok(Outcome::Rejected {
                held: end.source.unwrap_or(source),
            });
        }
        if key.ownership
            && side == NavigationSide::PrincipalToDependent
            && source != ConfigurationSource::Explicit
        {
            if let Some(existing) = end.name() {
                return Err(ModelError::OwnershipNavigationReassign {
                    owner: self.display_name(key.principal),
                    existing: existing.to_string(),
                    requested: name.unwrap_or_default().to_string(),
                    held_by: source,
                });
            }
        }
        let declaring = key.declaring_type(side);
        let target = key.target_type(side);

        if let Some(name) = name {
            self.check_navigation_name(declaring, name)?;
            if let Some((other, other_side)) = self.find_navigation(declaring, name) {
                let held = self.foreign_key_ref(other)?.end(other_side).source;
                if !source.overrides(held) {
                    return Ok(Outcome::Rejected {
                        held: held.unwrap_or(source),
                    });
                }
                self.remove_navigation(other, other_side, source)?;
                if self.foreign_key(id).is_none() {
                    return Err(ModelError::StaleForeignKey(id.0));
                }
            }
        }

        let key = self.foreign_key_mut(id)?;
        let end = key.end_mut(side);
        let old = end.name.take();
        end.name = name.map(str::to_string);
        end.source = Some(source);
        if let Some(old) = old {
            self.push_event(ModelEvent::NavigationRemoved {
                source: declaring,
                target,
                name: old,
            });
        }
        if let Some(name) = name {
            self.remove_weaker_derived_navigations(declaring, name, source)?;
            self.push_event(ModelEvent::NavigationAdded {
                foreign_key: id,
                name: name.to_string(),
            });
        }
        Ok(Outcome::Applied(()))
    }

    /// A navigation declared on a type hides same-named navigations of its
    /// derived types that were configured from a weaker source.
    fn remove_weaker_derived_navigations(
        &mut self,
        declaring: EntityTypeId,
        name: &str,
        source: ConfigurationSource,
    ) -> Result<()> {
        for derived in self.derived_types_inclusive(declaring).into_iter().skip(1) {
            if let Some((fk, side)) = self.find_declared_navigation(derived, name) {
                let held = self.foreign_key_ref(fk)?.end(side).source;
                if source.overrides(held) {
                    self.remove_navigation(fk, side, source)?;
                }
            }
        }
        Ok(())
    }

    /// Overrides the delete behavior of a relationship.
    pub fn set_delete_behavior(
        &mut self,
        id: ForeignKeyId,
        behavior: DeleteBehavior,
        source: ConfigurationSource,
    ) -> Result<Outcome<()>> {
        let key = self.foreign_key_mut(id)?;
        if !source.overrides(key.delete_behavior_source) {
            return Ok(Outcome::Rejected {
                held: key.delete_behavior_source.unwrap_or(source),
            });
        }
        key.delete_behavior = behavior;
        key.delete_behavior_source = Some(source);
        Ok(Outcome::Applied(()))
    }

    /// Whether the reflected member `name` on `id` is a collection.
    fn navigation_shape(&self, id: EntityTypeId, name: &str) -> Result<bool> {
        let et = self.entity_type(id)?;
        let member = et
            .clr_type()
            .and_then(|clr| self.types().find_member(clr, name))
            .ok_or_else(|| ModelError::UnknownMember {
                type_name: et.display_name().to_string(),
                member: name.to_string(),
            })?;
        if member.member_type.target_type().is_none() {
            return Err(ModelError::MemberKindConflict {
                entity_type: et.display_name().to_string(),
                member: name.to_string(),
                existing: "scalar member",
            });
        }
        Ok(member.member_type.is_collection())
    }

    /// Creates or reconfigures the relationship in which `navigation` on
    /// `source_type` points at `target_type`, optionally paired with
    /// `inverse` on `target_type`.
    ///
    /// Existing foreign keys carrying either navigation are reused when they
    /// connect the same pair of types. Calling this again with the same
    /// arguments changes nothing.
    pub fn relationship(
        &mut self,
        source_type: EntityTypeId,
        target_type: EntityTypeId,
        navigation: &str,
        inverse: Option<&str>,
        source: ConfigurationSource,
    ) -> Result<Outcome<ForeignKeyId>> {
        let collection = self.navigation_shape(source_type, navigation)?;
        let inverse_collection = match inverse {
            Some(inverse) => Some(self.navigation_shape(target_type, inverse)?),
            None => None,
        };
        if collection && inverse_collection == Some(true) {
            return Err(ModelError::ManyToManyNotSupported {
                entity_type: self.display_name(source_type),
                navigation: navigation.to_string(),
            });
        }

        if let Some((fk, side)) = self.find_navigation(source_type, navigation) {
            let key = self.foreign_key_ref(fk)?;
            if key.target_type(side) == target_type {
                return self.complete_relationship(fk, side, inverse, source);
            }
            if !self.can_set_navigation(fk, side, None, source) {
                return Ok(Outcome::Rejected {
                    held: key.end(side).source.unwrap_or(source),
                });
            }
            self.remove_navigation(fk, side, source)?;
        }

        if let Some(inverse) = inverse {
            if let Some((fk, side)) = self.find_navigation(target_type, inverse) {
                let key = self.foreign_key_ref(fk)?;
                if key.target_type(side) == source_type {
                    return match self.set_navigation(fk, side.opposite(), Some(navigation), source)?
                    {
                        Outcome::Applied(()) => {
                            self.strengthen_foreign_key(fk, source)?;
                            Ok(Outcome::Applied(fk))
                        }
                        Outcome::Rejected { held } => Ok(Outcome::Rejected { held }),
                    };
                }
                if !self.can_set_navigation(fk, side, None, source) {
                    return Ok(Outcome::Rejected {
                        held: key.end(side).source.unwrap_or(source),
                    });
                }
                self.remove_navigation(fk, side, source)?;
            }
        }

        let shape = self.relationship_shape(
            source_type,
            target_type,
            navigation,
            collection,
            inverse,
            inverse_collection,
        );
        let principal_key = self
            .primary_key(shape.principal)
            .map(|key| key.properties.clone())
            .unwrap_or_default();
        let properties = self.discover_foreign_key_properties(
            shape.dependent,
            shape.principal,
            shape.dependent_to_principal,
            &principal_key,
            shape.unique,
            false,
        )?;

        let unnamed_end = NavigationEnd {
            name: None,
            source: (source == ConfigurationSource::Explicit).then_some(source),
        };
        let end = |name: Option<&str>| match name {
            Some(name) => NavigationEnd::new(Some(name), source),
            None => unnamed_end.clone(),
        };
        let fk = self.add_foreign_key(NewForeignKey {
            dependent: shape.dependent,
            principal: shape.principal,
            properties,
            principal_key,
            unique: shape.unique,
            ownership: false,
            dependent_to_principal: end(shape.dependent_to_principal),
            principal_to_dependent: end(shape.principal_to_dependent),
            source,
        })?;
        Ok(Outcome::Applied(fk))
    }

    /// `navigation` already lives on `fk`; attach (or keep) the inverse.
    fn complete_relationship(
        &mut self,
        fk: ForeignKeyId,
        side: NavigationSide,
        inverse: Option<&str>,
        source: ConfigurationSource,
    ) -> Result<Outcome<ForeignKeyId>> {
        let key = self.foreign_key_ref(fk)?;
        let target = key.target_type(side);
        let Some(inverse) = inverse else {
            // An explicit one-way relationship pins the opposite end to no
            // navigation; a weaker navigation held there is released.
            if source == ConfigurationSource::Explicit {
                if let Outcome::Rejected { held } = self.set_navigation(fk, side.opposite(), None, source)? {
                    return Ok(Outcome::Rejected { held });
                }
            }
            self.strengthen_foreign_key(fk, source)?;
            return Ok(Outcome::Applied(fk));
        };
        if key.end(side.opposite()).name() == Some(inverse) {
            self.strengthen_foreign_key(fk, source)?;
            let _ = self.set_navigation(fk, side.opposite(), Some(inverse), source)?;
            return Ok(Outcome::Applied(fk));
        }
        if let Some(held) = key.end(side.opposite()).source {
            if !source.overrides(Some(held)) {
                return Ok(Outcome::Rejected { held });
            }
        }
        if let Some((other, _)) = self.find_navigation(target, inverse) {
            if other != fk {
                let held = self.foreign_key_ref(other)?.strongest_source();
                if !source.overrides(Some(held)) {
                    return Ok(Outcome::Rejected { held });
                }
                self.detach_foreign_key(other)?;
            }
        }
        match self.set_navigation(fk, side.opposite(), Some(inverse), source)? {
            Outcome::Applied(()) => {
                let inverse_collection = self.navigation_shape(target, inverse)?;
                let key = self.foreign_key_mut(fk)?;
                if side == NavigationSide::DependentToPrincipal {
                    key.unique = !inverse_collection;
                }
                self.strengthen_foreign_key(fk, source)?;
                Ok(Outcome::Applied(fk))
            }
            Outcome::Rejected { held } => Ok(Outcome::Rejected { held }),
        }
    }

    fn strengthen_foreign_key(&mut self, fk: ForeignKeyId, source: ConfigurationSource) -> Result<()> {
        let key = self.foreign_key_mut(fk)?;
        key.source = key.source.strongest(Some(source));
        Ok(())
    }

    fn relationship_shape<'a>(
        &self,
        source_type: EntityTypeId,
        target_type: EntityTypeId,
        navigation: &'a str,
        collection: bool,
        inverse: Option<&'a str>,
        inverse_collection: Option<bool>,
    ) -> Shape<'a> {
        if collection {
            return Shape {
                dependent: target_type,
                principal: source_type,
                dependent_to_principal: inverse,
                principal_to_dependent: Some(navigation),
                unique: false,
            };
        }
        let Some(inverse_name) = inverse else {
            return Shape {
                dependent: source_type,
                principal: target_type,
                dependent_to_principal: Some(navigation),
                principal_to_dependent: None,
                unique: false,
            };
        };
        if inverse_collection == Some(true) {
            return Shape {
                dependent: source_type,
                principal: target_type,
                dependent_to_principal: Some(navigation),
                principal_to_dependent: Some(inverse_name),
                unique: false,
            };
        }

        let source_is_dependent = match (
            self.has_foreign_key_shaped_property(source_type, target_type, navigation),
            self.has_foreign_key_shaped_property(target_type, source_type, inverse_name),
        ) {
            (true, false) => true,
            (false, true) => false,
            _ => self.display_name(source_type) > self.display_name(target_type),
        };
        if source_is_dependent {
            Shape {
                dependent: source_type,
                principal: target_type,
                dependent_to_principal: Some(navigation),
                principal_to_dependent: Some(inverse_name),
                unique: true,
            }
        } else {
            Shape {
                dependent: target_type,
                principal: source_type,
                dependent_to_principal: Some(inverse_name),
                principal_to_dependent: Some(navigation),
                unique: true,
            }
        }
    }

    /// Returns true if `dependent` has a property named like a foreign key to
    /// `principal` reached through `navigation`.
    fn has_foreign_key_shaped_property(
        &self,
        dependent: EntityTypeId,
        principal: EntityTypeId,
        navigation: &str,
    ) -> bool {
        let principal_name = self.display_name(principal);
        let key: Vec<String> = self
            .primary_key(principal)
            .map_or_else(|| vec!["Id".to_string()], |key| key.properties.clone());
        [navigation, principal_name.as_str()].iter().any(|prefix| {
            key.iter().all(|k| {
                self.find_property_ignore_case(dependent, &format!("{prefix}{k}"))
                    .is_some()
            })
        })
    }

    /// Picks (or creates as shadow) the foreign key properties on
    /// `dependent` for a relationship to `principal`.
    ///
    /// Candidates are `<navigation><key>`, then `<principal><key>`, then the
    /// key name itself when it already starts with the principal name.
    pub(crate) fn discover_foreign_key_properties(
        &mut self,
        dependent: EntityTypeId,
        principal: EntityTypeId,
        dependent_to_principal: Option<&str>,
        principal_key: &[String],
        unique: bool,
        ownership: bool,
    ) -> Result<Vec<String>> {
        if principal_key.is_empty() {
            return Ok(Vec::new());
        }
        let principal_name = self.display_name(principal);
        let mut prefixes: Vec<String> = Vec::new();
        if let Some(navigation) = dependent_to_principal {
            prefixes.push(navigation.to_string());
        }
        if !prefixes.contains(&principal_name) {
            prefixes.push(principal_name.clone());
        }

        if !ownership {
            for prefix in &prefixes {
                let matched: Option<Vec<String>> = principal_key
                    .iter()
                    .map(|k| {
                        self.match_foreign_key_property(
                            dependent,
                            principal,
                            &format!("{prefix}{k}"),
                            k,
                            unique,
                        )
                    })
                    .collect();
                if let Some(matched) = matched {
                    return Ok(matched);
                }
            }
            if let [k] = principal_key {
                if k.to_ascii_lowercase()
                    .starts_with(&principal_name.to_ascii_lowercase())
                {
                    if let Some(matched) =
                        self.match_foreign_key_property(dependent, principal, k, k, unique)
                    {
                        return Ok(vec![matched]);
                    }
                }
            }
        }

        let prefix = if ownership {
            principal_name.as_str()
        } else {
            dependent_to_principal.unwrap_or(&principal_name)
        };
        let mut names = Vec::with_capacity(principal_key.len());
        for k in principal_key {
            let name = self.unique_property_name(dependent, &format!("{prefix}{k}"));
            let primitive = self
                .find_property(principal, k)
                .map_or(PrimitiveType::Int32, |p| p.primitive);
            let _ = self.add_property(
                dependent,
                &name,
                primitive,
                !ownership,
                true,
                ConfigurationSource::Convention,
            )?;
            names.push(name);
        }
        Ok(names)
    }

    fn match_foreign_key_property(
        &self,
        dependent: EntityTypeId,
        principal: EntityTypeId,
        name: &str,
        key_property: &str,
        unique: bool,
    ) -> Option<String> {
        let property = self.find_property_ignore_case(dependent, name)?;
        let key_type = self.find_property(principal, key_property)?.primitive;
        if property.primitive != key_type {
            return None;
        }
        if self
            .foreign_keys()
            .any(|fk| self.is_same_or_base_of(fk.dependent, dependent) && fk.properties.contains(&property.name))
        {
            return None;
        }
        if !unique
            && self
                .primary_key(dependent)
                .is_some_and(|key| key.properties.contains(&property.name))
        {
            return None;
        }
        Some(property.name.clone())
    }

    fn unique_property_name(&self, id: EntityTypeId, base: &str) -> String {
        let taken = |name: &str| {
            self.find_property_ignore_case(id, name).is_some()
                || self.find_navigation(id, name).is_some()
                || self.is_member_ignored(id, name)
        };
        if !taken(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base}{n}"))
            .find(|name| !taken(name))
            .unwrap_or_else(|| base.to_string())
    }

    /// Re-derives inferred foreign key properties, e.g. once the principal
    /// gains a primary key.
    pub(crate) fn rediscover_foreign_key_properties(&mut self, fk: ForeignKeyId) -> Result<()> {
        let key = self.foreign_key_ref(fk)?;
        if key
            .properties_source
            .is_some_and(|source| source > ConfigurationSource::Convention)
        {
            return Ok(());
        }
        let Some(principal_key) = self
            .primary_key(key.principal)
            .map(|k| k.properties.clone())
        else {
            return Ok(());
        };
        if key.principal_key == principal_key && !key.properties.is_empty() {
            return Ok(());
        }
        let (dependent, principal, unique, ownership) =
            (key.dependent, key.principal, key.unique, key.ownership);
        let navigation = key.dependent_to_principal().map(str::to_string);
        let old = std::mem::take(&mut self.foreign_key_mut(fk)?.properties);

        let properties = self.discover_foreign_key_properties(
            dependent,
            principal,
            navigation.as_deref(),
            &principal_key,
            unique,
            ownership,
        )?;
        let required = ownership || self.all_non_nullable(dependent, &properties);
        let key = self.foreign_key_mut(fk)?;
        key.properties = properties;
        key.principal_key = principal_key;
        key.properties_source = Some(ConfigurationSource::Convention);
        key.required = required;
        if key.delete_behavior_source.is_none() {
            key.delete_behavior = if required {
                DeleteBehavior::Cascade
            } else {
                DeleteBehavior::ClientSetNull
            };
        }
        let stale: Vec<String> = old
            .into_iter()
            .filter(|p| !key.properties.contains(p))
            .collect();
        self.remove_unused_shadow_properties(dependent, &stale)?;
        if ownership {
            self.sync_owned_key(fk)?;
        }
        Ok(())
    }

    /// Recomputes requiredness after a foreign key property changed shape.
    pub(crate) fn refresh_requiredness(&mut self, fk: ForeignKeyId) -> Result<()> {
        let key = self.foreign_key_ref(fk)?;
        let required = key.ownership || self.all_non_nullable(key.dependent, &key.properties);
        let key = self.foreign_key_mut(fk)?;
        if key.required != required {
            key.required = required;
            if key.delete_behavior_source.is_none() {
                key.delete_behavior = if required {
                    DeleteBehavior::Cascade
                } else {
                    DeleteBehavior::ClientSetNull
                };
            }
        }
        Ok(())
    }

    /// Makes `owner` own `owned` through `navigation`.
    ///
    /// The owned type's primary key becomes the ownership foreign key (plus a
    /// generated `Id` for collections), and deleting the owner cascades.
    pub fn owns(
        &mut self,
        owner: EntityTypeId,
        owned: EntityTypeId,
        navigation: &str,
        inverse: Option<&str>,
        source: ConfigurationSource,
    ) -> Result<Outcome<ForeignKeyId>> {
        self.entity_type(owner)?;
        self.entity_type(owned)?;
        if owner == owned || self.is_in_ownership_path(owner, owned) {
            return Err(ModelError::OwnershipCycle {
                owner: self.display_name(owner),
                owned: self.display_name(owned),
            });
        }
        let collection = self.navigation_shape(owner, navigation)?;

        if let Some(fk) = self.find_ownership(owned) {
            let key = self.foreign_key_ref(fk)?;
            if !self.is_same_or_base_of(key.principal, owner) {
                return Err(ModelError::ConflictingOwner {
                    owned: self.display_name(owned),
                    existing: self.display_name(key.principal),
                    owner: self.display_name(owner),
                });
            }
            if let Outcome::Rejected { held } = self.set_navigation(
                fk,
                NavigationSide::PrincipalToDependent,
                Some(navigation),
                source,
            )? {
                return Ok(Outcome::Rejected { held });
            }
            if inverse.is_some() {
                let _ = self.set_navigation(
                    fk,
                    NavigationSide::DependentToPrincipal,
                    inverse,
                    source,
                )?;
            }
            self.strengthen_foreign_key(fk, source)?;
            return Ok(Outcome::Applied(fk));
        }

        for (declaring, name) in [(owner, Some(navigation)), (owned, inverse)] {
            let Some(name) = name else { continue };
            if let Some((fk, _)) = self.find_navigation(declaring, name) {
                match self.remove_foreign_key(fk, source)? {
                    Outcome::Applied(()) => {}
                    Outcome::Rejected { held } => return Ok(Outcome::Rejected { held }),
                }
            }
        }

        let principal_key = self
            .primary_key(owner)
            .map(|key| key.properties.clone())
            .unwrap_or_default();
        let properties = self.discover_foreign_key_properties(
            owned,
            owner,
            inverse,
            &principal_key,
            !collection,
            true,
        )?;
        let fk = self.add_foreign_key(NewForeignKey {
            dependent: owned,
            principal: owner,
            properties,
            principal_key,
            unique: !collection,
            ownership: true,
            dependent_to_principal: NavigationEnd {
                name: inverse.map(str::to_string),
                source: inverse.map(|_| source),
            },
            principal_to_dependent: NavigationEnd::new(Some(navigation), source),
            source,
        })?;
        self.entity_type_mut(owned)?.owned = true;
        self.sync_owned_key(fk)?;
        self.push_event(ModelEvent::ForeignKeyOwnershipChanged(fk));
        Ok(Outcome::Applied(fk))
    }

    /// The owned type's key is the ownership foreign key, plus `Id` for
    /// owned collections.
    fn sync_owned_key(&mut self, fk: ForeignKeyId) -> Result<()> {
        let key = self.foreign_key_ref(fk)?;
        if key.properties.is_empty() {
            return Ok(());
        }
        let owned = key.dependent;
        let mut properties = key.properties.clone();
        if !key.unique {
            if self.find_property(owned, "Id").is_none() {
                let _ = self.add_property(
                    owned,
                    "Id",
                    PrimitiveType::Int32,
                    false,
                    true,
                    ConfigurationSource::Convention,
                )?;
                let _ = self.set_value_generated(
                    owned,
                    "Id",
                    ValueGenerated::OnAdd,
                    ConfigurationSource::Convention,
                )?;
            }
            properties.push("Id".to_string());
        }
        let names: Vec<&str> = properties.iter().map(String::as_str).collect();
        let _ = self.set_primary_key(owned, &names, ConfigurationSource::Convention)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{MemberInfo, TypeInfo};
    use ConfigurationSource::{Convention, Explicit};

    fn blog_model() -> (Model, EntityTypeId, EntityTypeId) {
        let mut model = Model::new();
        model.types_mut().insert(
            TypeInfo::new("Blog")
                .member(MemberInfo::primitive("Id", PrimitiveType::Int32))
                .member(MemberInfo::collection("Posts", "Post")),
        );
        model.types_mut().insert(
            TypeInfo::new("Post")
                .member(MemberInfo::primitive("Id", PrimitiveType::Int32))
                .member(MemberInfo::primitive("BlogId", PrimitiveType::Int32))
                .member(MemberInfo::reference("Blog", "Blog")),
        );
        let blog = model
            .add_entity_type("Blog", Some("Blog"), Explicit)
            .unwrap()
            .applied()
            .unwrap();
        let post = model
            .add_entity_type("Post", Some("Post"), Explicit)
            .unwrap()
            .applied()
            .unwrap();
        for (et, name, nullable) in [(blog, "Id", false), (post, "Id", false), (post, "BlogId", false)] {
            let _ = model
                .add_property(et, name, PrimitiveType::Int32, nullable, false, Convention)
                .unwrap();
        }
        let _ = model.set_primary_key(blog, &["Id"], Convention).unwrap();
        let _ = model.set_primary_key(post, &["Id"], Convention).unwrap();
        (model, blog, post)
    }

    #[test]
    fn test_relationship_uses_matching_property() {
        let (mut model, blog, post) = blog_model();
        let fk = model
            .relationship(post, blog, "Blog", Some("Posts"), Convention)
            .unwrap()
            .applied()
            .unwrap();
        let key = model.foreign_key(fk).unwrap();
        assert_eq!(key.dependent(), post);
        assert_eq!(key.principal(), blog);
        assert_eq!(key.properties(), ["BlogId"]);
        assert!(key.is_required());
        assert!(!key.is_unique());
        assert_eq!(key.delete_behavior(), DeleteBehavior::Cascade);
        assert_eq!(key.principal_to_dependent(), Some("Posts"));
    }

    #[test]
    fn test_relationship_is_idempotent() {
        let (mut model, blog, post) = blog_model();
        let first = model
            .relationship(post, blog, "Blog", Some("Posts"), Convention)
            .unwrap();
        while model.pop_event().is_some() {}
        let second = model
            .relationship(blog, post, "Posts", Some("Blog"), Convention)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(model.pop_event(), None);
        assert_eq!(model.foreign_keys().count(), 1);
    }

    #[test]
    fn test_explicit_unidirectional_is_not_paired_by_convention() {
        let (mut model, blog, post) = blog_model();
        let fk = model
            .relationship(post, blog, "Blog", None, Explicit)
            .unwrap()
            .applied()
            .unwrap();
        assert!(!model.can_set_navigation(
            fk,
            NavigationSide::PrincipalToDependent,
            Some("Posts"),
            Convention
        ));
        let outcome = model
            .set_navigation(fk, NavigationSide::PrincipalToDependent, Some("Posts"), Convention)
            .unwrap();
        assert_eq!(outcome, Outcome::Rejected { held: Explicit });
    }

    #[test]
    fn test_explicit_one_way_releases_convention_inverse() {
        let (mut model, blog, post) = blog_model();
        let fk = model
            .relationship(post, blog, "Blog", Some("Posts"), Convention)
            .unwrap()
            .applied()
            .unwrap();
        while model.pop_event().is_some() {}

        let same = model
            .relationship(blog, post, "Posts", None, Explicit)
            .unwrap()
            .applied()
            .unwrap();
        assert_eq!(same, fk);
        let key = model.foreign_key(fk).unwrap();
        assert_eq!(key.end(NavigationSide::PrincipalToDependent).name(), Some("Posts"));
        assert_eq!(key.end(NavigationSide::DependentToPrincipal).name(), None);
        assert!(model.find_navigation(post, "Blog").is_none());
        match model.pop_event() {
            Some(ModelEvent::NavigationRemoved { name, .. }) => assert_eq!(name, "Blog"),
            other => panic!("Expected NavigationRemoved, got {other:?}"),
        }
        assert!(!model.can_set_navigation(
            fk,
            NavigationSide::DependentToPrincipal,
            Some("Blog"),
            Convention
        ));
    }

    #[test]
    fn test_shadow_foreign_key_is_created_and_cleaned_up() {
        let (mut model, blog, post) = blog_model();
        let _ = model.ignore_member(post, "BlogId", Explicit).unwrap();
        let fk = model
            .relationship(blog, post, "Posts", None, Convention)
            .unwrap()
            .applied()
            .unwrap();
        let key = model.foreign_key(fk).unwrap();
        assert_eq!(key.properties(), ["BlogId1"]);
        assert!(model.find_property(post, "BlogId1").unwrap().is_shadow());
        assert!(!key.is_required());
        assert_eq!(key.delete_behavior(), DeleteBehavior::ClientSetNull);

        let _ = model.remove_foreign_key(fk, Convention).unwrap();
        assert!(model.find_property(post, "BlogId1").is_none());
    }

    #[test]
    fn test_navigation_conflicting_with_property() {
        let (mut model, blog, post) = blog_model();
        match model.relationship(post, blog, "BlogId", None, Explicit) {
            Err(ModelError::MemberKindConflict { .. }) => {}
            other => panic!("Expected MemberKindConflict, got {other:?}"),
        }
    }

    #[test]
    fn test_many_to_many_is_rejected() {
        let mut model = Model::new();
        model
            .types_mut()
            .insert(TypeInfo::new("Student").member(MemberInfo::collection("Courses", "Course")));
        model
            .types_mut()
            .insert(TypeInfo::new("Course").member(MemberInfo::collection("Students", "Student")));
        let student = model
            .add_entity_type("Student", Some("Student"), Explicit)
            .unwrap()
            .applied()
            .unwrap();
        let course = model
            .add_entity_type("Course", Some("Course"), Explicit)
            .unwrap()
            .applied()
            .unwrap();
        match model.relationship(student, course, "Courses", Some("Students"), Explicit) {
            Err(ModelError::ManyToManyNotSupported { navigation, .. }) => {
                assert_eq!(navigation, "Courses");
            }
            other => panic!("Expected ManyToManyNotSupported, got {other:?}"),
        }
    }

    #[test]
    fn test_ownership_navigation_reassign_requires_explicit() {
        let mut model = Model::new();
        model.types_mut().insert(
            TypeInfo::new("Customer")
                .member(MemberInfo::primitive("Id", PrimitiveType::Int32))
                .member(MemberInfo::reference("Home", "Address"))
                .member(MemberInfo::reference("Work", "Address")),
        );
        model
            .types_mut()
            .insert(TypeInfo::new("Address").member(MemberInfo::primitive("Street", PrimitiveType::String)));
        let customer = model
            .add_entity_type("Customer", Some("Customer"), Explicit)
            .unwrap()
            .applied()
            .unwrap();
        let _ = model
            .add_property(customer, "Id", PrimitiveType::Int32, false, false, Convention)
            .unwrap();
        let _ = model.set_primary_key(customer, &["Id"], Convention).unwrap();
        let address = model
            .add_owned_entity_type("Address", Some("Address"), None, Convention)
            .unwrap()
            .applied()
            .unwrap();
        let fk = model
            .owns(customer, address, "Home", None, Convention)
            .unwrap()
            .applied()
            .unwrap();
        let key = model.foreign_key(fk).unwrap();
        assert!(key.is_ownership());
        assert_eq!(key.properties(), ["CustomerId"]);
        assert_eq!(key.delete_behavior(), DeleteBehavior::Cascade);
        assert_eq!(
            model.primary_key(address).unwrap().properties(),
            ["CustomerId"]
        );

        match model.owns(customer, address, "Work", None, Convention) {
            Err(ModelError::OwnershipNavigationReassign { existing, requested, .. }) => {
                assert_eq!(existing, "Home");
                assert_eq!(requested, "Work");
            }
            other => panic!("Expected OwnershipNavigationReassign, got {other:?}"),
        }
        assert!(model
            .owns(customer, address, "Work", None, Explicit)
            .unwrap()
            .is_applied());
    }

    #[test]
    fn test_ownership_cycle() {
        let mut model = Model::new();
        model
            .types_mut()
            .insert(TypeInfo::new("A").member(MemberInfo::reference("B", "B")));
        model
            .types_mut()
            .insert(TypeInfo::new("B").member(MemberInfo::reference("A", "A")));
        let a = model
            .add_entity_type("A", Some("A"), Explicit)
            .unwrap()
            .applied()
            .unwrap();
        let b = model
            .add_owned_entity_type("B", Some("B"), None, Explicit)
            .unwrap()
            .applied()
            .unwrap();
        let _ = model.owns(a, b, "B", None, Explicit).unwrap();
        match model.owns(b, a, "A", None, Explicit) {
            Err(ModelError::OwnershipCycle { owner, owned }) => {
                assert_eq!(owner, "B");
                assert_eq!(owned, "A");
            }
            other => panic!("Expected OwnershipCycle, got {other:?}"),
        }
    }
}
