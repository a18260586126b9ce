//! Entity type, property and key mutations.

use tracing::debug;

use crate::error::{ModelError, Result};
use crate::reflect::PrimitiveType;
use crate::source::{ConfigurationSource, Outcome};

use super::{
    DefiningNavigation, EntityType, EntityTypeId, Index, Key, Model, ModelEvent, Property,
    ValueGenerated,
};

impl Model {
    /// Adds an entity type, or returns the existing one with the same name.
    ///
    /// Rejected when the name is ignored by a stronger source.
    pub fn add_entity_type(
        &mut self,
        name: &str,
        clr_type: Option<&str>,
        source: ConfigurationSource,
    ) -> Result<Outcome<EntityTypeId>> {
        self.add_entity_type_with(name, clr_type, source, false, None)
    }

    /// Adds an owned entity type. A `defining_navigation` scopes the type to
    /// one navigation of one owner, which allows several owned entity types
    /// to share a reflected type.
    pub fn add_owned_entity_type(
        &mut self,
        name: &str,
        clr_type: Option<&str>,
        defining_navigation: Option<DefiningNavigation>,
        source: ConfigurationSource,
    ) -> Result<Outcome<EntityTypeId>> {
        self.add_entity_type_with(name, clr_type, source, true, defining_navigation)
    }

    fn add_entity_type_with(
        &mut self,
        name: &str,
        clr_type: Option<&str>,
        source: ConfigurationSource,
        owned: bool,
        defining_navigation: Option<DefiningNavigation>,
    ) -> Result<Outcome<EntityTypeId>> {
        if name.trim().is_empty() {
            return Err(ModelError::InvalidName(name.to_string()));
        }
        if let Some(held) = self.ignored_type_source(name) {
            if !source.overrides(Some(held)) {
                return Ok(Outcome::Rejected { held });
            }
            self.ignored_types.remove(name);
        }
        if let Some(id) = self.find_entity_type(name) {
            let et = self.entity_type_mut(id)?;
            et.source = et.source.strongest(Some(source));
            et.owned |= owned;
            return Ok(Outcome::Applied(id));
        }

        let id = EntityTypeId(self.entity_types.len());
        let mut et = EntityType::new(id, name.to_string(), clr_type.map(str::to_string), source);
        et.owned = owned;
        et.defining_navigation = defining_navigation;
        self.entity_types.push(Some(et));
        debug!(entity_type = name, ?source, owned, "entity type added");
        self.push_event(ModelEvent::EntityTypeAdded(id));
        Ok(Outcome::Applied(id))
    }

    /// Removes an entity type together with every foreign key touching it.
    pub fn remove_entity_type(
        &mut self,
        id: EntityTypeId,
        source: ConfigurationSource,
    ) -> Result<Outcome<()>> {
        let held = self.entity_type(id)?.source;
        if !source.overrides(Some(held)) {
            return Ok(Outcome::Rejected { held });
        }

        let touching: Vec<_> = self
            .foreign_keys()
            .filter(|fk| fk.dependent == id || fk.principal == id)
            .map(|fk| fk.id)
            .collect();
        for fk in touching {
            self.detach_foreign_key(fk)?;
        }

        let weak: Vec<_> = self
            .entity_types()
            .filter(|et| {
                et.defining_navigation
                    .as_ref()
                    .is_some_and(|d| d.entity_type == id)
            })
            .map(|et| et.id)
            .collect();
        for weak_type in weak {
            let _ = self.remove_entity_type(weak_type, ConfigurationSource::Explicit)?;
        }

        let derived: Vec<_> = self
            .entity_types()
            .filter(|et| et.base_type == Some(id))
            .map(|et| et.id)
            .collect();
        for derived_type in derived {
            let et = self.entity_type_mut(derived_type)?;
            et.base_type = None;
            et.base_type_source = None;
            self.push_event(ModelEvent::BaseTypeChanged {
                entity_type: derived_type,
                old_base: Some(id),
            });
        }

        if let Some(slot) = self.entity_types.get_mut(id.0) {
            if let Some(et) = slot.take() {
                debug!(entity_type = %et.name, "entity type removed");
            }
        }
        Ok(Outcome::Applied(()))
    }

    /// Removes the named entity type (if present) and keeps it out of the
    /// model against weaker sources.
    pub fn ignore_entity_type(
        &mut self,
        name: &str,
        source: ConfigurationSource,
    ) -> Result<Outcome<()>> {
        let mut victims = self.entity_types_with_clr(name);
        if let Some(id) = self.find_entity_type(name) {
            if !victims.contains(&id) {
                victims.insert(0, id);
            }
        }
        for id in &victims {
            let held = self.entity_type(*id)?.source;
            if !source.overrides(Some(held)) {
                return Ok(Outcome::Rejected { held });
            }
        }
        for id in victims {
            if self.contains(id) {
                let _ = self.remove_entity_type(id, source)?;
            }
        }

        let held = self.ignored_types.get(name).copied();
        let already_ignored = held.is_some();
        self.ignored_types
            .insert(name.to_string(), source.strongest(held));
        if !already_ignored {
            debug!(entity_type = name, ?source, "entity type ignored");
            self.push_event(ModelEvent::EntityTypeIgnored(name.to_string()));
        }
        Ok(Outcome::Applied(()))
    }

    /// Sets or clears the base type.
    ///
    /// Members of `id` (and its derived types) that the new base chain already
    /// declares are dropped when they were only inferred.
    pub fn set_base_type(
        &mut self,
        id: EntityTypeId,
        base: Option<EntityTypeId>,
        source: ConfigurationSource,
    ) -> Result<Outcome<()>> {
        let et = self.entity_type(id)?;
        let old_base = et.base_type;
        if old_base == base {
            let et = self.entity_type_mut(id)?;
            et.base_type_source = Some(source.strongest(et.base_type_source));
            return Ok(Outcome::Applied(()));
        }
        if !source.overrides(et.base_type_source) {
            return Ok(Outcome::Rejected {
                held: et.base_type_source.unwrap_or(source),
            });
        }
        if let Some(base) = base {
            self.entity_type(base)?;
            if self.is_same_or_base_of(id, base) {
                return Err(ModelError::InheritanceCycle {
                    entity_type: self.display_name(id),
                    base: self.display_name(base),
                });
            }
        }

        {
            let et = self.entity_type_mut(id)?;
            et.base_type = base;
            et.base_type_source = Some(source);
            if base.is_some()
                && et
                    .primary_key
                    .as_ref()
                    .is_some_and(|key| key.source == ConfigurationSource::Convention)
            {
                et.primary_key = None;
            }
        }

        let affected = self.derived_types_inclusive(id);
        for derived in &affected {
            self.entity_type_mut(*derived)?.navigation_candidates = None;
        }
        if base.is_some() {
            for derived in affected {
                self.drop_inferred_duplicates(derived)?;
            }
        }

        debug!(
            entity_type = %self.display_name(id),
            base = ?base.map(|b| self.display_name(b)),
            "base type changed"
        );
        self.push_event(ModelEvent::BaseTypeChanged {
            entity_type: id,
            old_base,
        });
        Ok(Outcome::Applied(()))
    }

    fn drop_inferred_duplicates(&mut self, id: EntityTypeId) -> Result<()> {
        let Some(base) = self.entity_type(id)?.base_type else {
            return Ok(());
        };
        let duplicated: Vec<String> = self
            .entity_type(id)?
            .properties
            .iter()
            .filter(|p| p.source == ConfigurationSource::Convention)
            .filter(|p| self.find_property(base, &p.name).is_some())
            .map(|p| p.name.clone())
            .collect();
        let et = self.entity_type_mut(id)?;
        et.properties.retain(|p| !duplicated.contains(&p.name));

        let navigations: Vec<_> = self
            .declared_navigations(id)
            .into_iter()
            .filter_map(|(fk, side)| {
                let key = self.foreign_key(fk)?;
                let name = key.end(side).name()?;
                (self.find_navigation(base, name).is_some()
                    && key.strongest_source() == ConfigurationSource::Convention)
                    .then_some(fk)
            })
            .collect();
        for fk in navigations {
            let _ = self.remove_foreign_key(fk, ConfigurationSource::Convention)?;
        }
        Ok(())
    }

    /// Adds a property, or reconciles an existing one.
    ///
    /// A shadow property that later turns up on the reflected type becomes a
    /// regular property with the reflected nullability.
    pub fn add_property(
        &mut self,
        id: EntityTypeId,
        name: &str,
        primitive: PrimitiveType,
        nullable: bool,
        shadow: bool,
        source: ConfigurationSource,
    ) -> Result<Outcome<()>> {
        if name.trim().is_empty() {
            return Err(ModelError::InvalidName(name.to_string()));
        }
        self.entity_type(id)?;
        if self.find_navigation(id, name).is_some() {
            return Err(ModelError::MemberKindConflict {
                entity_type: self.display_name(id),
                member: name.to_string(),
                existing: "navigation",
            });
        }
        for et in self.base_chain(id) {
            if let Some(held) = self.entity_type(et)?.ignored_member_source(name) {
                if !source.overrides(Some(held)) {
                    return Ok(Outcome::Rejected { held });
                }
            }
        }
        self.entity_type_mut(id)?.ignored_members.remove(name);

        let declaring = self
            .base_chain(id)
            .into_iter()
            .find(|et| {
                self.get(*et)
                    .is_some_and(|et| et.find_declared_property(name).is_some())
            });
        if let Some(declaring) = declaring {
            let et = self.entity_type_mut(declaring)?;
            let Some(property) = et.find_declared_property_mut(name) else {
                return Ok(Outcome::Applied(()));
            };
            let materialized = property.shadow && !shadow;
            let mut changed = false;
            if materialized || source > property.source {
                changed = property.primitive != primitive
                    || property.nullable != nullable
                    || property.shadow != shadow;
                property.primitive = primitive;
                property.nullable = nullable;
                property.shadow = shadow;
            }
            property.source = property.source.strongest(Some(source));
            if changed {
                self.push_event(ModelEvent::PropertyAdded {
                    entity_type: declaring,
                    name: name.to_string(),
                });
            }
            return Ok(Outcome::Applied(()));
        }

        let et = self.entity_type_mut(id)?;
        et.properties
            .push(Property::new(name, primitive, nullable, shadow, source));
        debug!(entity_type = %et.name, property = name, shadow, "property added");
        self.push_event(ModelEvent::PropertyAdded {
            entity_type: id,
            name: name.to_string(),
        });
        Ok(Outcome::Applied(()))
    }

    /// Removes a declared property, and the primary key and indexes that
    /// contain it.
    pub(crate) fn remove_property(
        &mut self,
        id: EntityTypeId,
        name: &str,
        source: ConfigurationSource,
    ) -> Result<Outcome<()>> {
        let et = self.entity_type(id)?;
        let Some(property) = et.find_declared_property(name) else {
            return Ok(Outcome::Applied(()));
        };
        if !source.overrides(Some(property.source)) {
            return Ok(Outcome::Rejected {
                held: property.source,
            });
        }
        if let Some(key) = &et.primary_key {
            if key.properties.iter().any(|p| p == name) {
                if !source.overrides(Some(key.source)) {
                    return Ok(Outcome::Rejected { held: key.source });
                }
            }
        }
        let et = self.entity_type_mut(id)?;
        et.properties.retain(|p| p.name != name);
        et.indexes.retain(|i| !i.properties.iter().any(|p| p == name));
        let key_dropped = et
            .primary_key
            .take_if(|key| key.properties.iter().any(|p| p == name))
            .is_some();
        if key_dropped {
            self.push_event(ModelEvent::PrimaryKeyChanged(id));
        }
        Ok(Outcome::Applied(()))
    }

    /// Excludes a member from the model, removing any property or navigation
    /// it currently backs.
    pub fn ignore_member(
        &mut self,
        id: EntityTypeId,
        name: &str,
        source: ConfigurationSource,
    ) -> Result<Outcome<()>> {
        let et = self.entity_type(id)?;
        if let Some(held) = et.ignored_member_source(name) {
            let et = self.entity_type_mut(id)?;
            et.ignored_members
                .insert(name.to_string(), source.strongest(Some(held)));
            return Ok(Outcome::Applied(()));
        }
        if let Some(property) = et.find_declared_property(name) {
            if !source.overrides(Some(property.source)) {
                return Ok(Outcome::Rejected {
                    held: property.source,
                });
            }
        }
        let navigation = self.find_declared_navigation(id, name);
        if let Some((fk, side)) = navigation {
            let end_source = self.foreign_key_ref(fk)?.end(side).source;
            if !source.overrides(end_source) {
                return Ok(Outcome::Rejected {
                    held: end_source.unwrap_or(source),
                });
            }
        }

        if let Outcome::Rejected { held } = self.remove_property(id, name, source)? {
            return Ok(Outcome::Rejected { held });
        }
        if let Some((fk, side)) = navigation {
            self.remove_navigation(fk, side, source)?;
        }

        let et = self.entity_type_mut(id)?;
        et.ignored_members.insert(name.to_string(), source);
        debug!(entity_type = %et.name, member = name, ?source, "member ignored");
        self.push_event(ModelEvent::MemberIgnored {
            entity_type: id,
            name: name.to_string(),
        });
        Ok(Outcome::Applied(()))
    }

    /// Sets the primary key of a root entity type.
    pub fn set_primary_key(
        &mut self,
        id: EntityTypeId,
        properties: &[&str],
        source: ConfigurationSource,
    ) -> Result<Outcome<()>> {
        let et = self.entity_type(id)?;
        for property in properties {
            if self.find_property(id, property).is_none() {
                return Err(ModelError::UnknownProperty {
                    entity_type: et.display_name().to_string(),
                    property: (*property).to_string(),
                });
            }
        }
        let properties: Vec<String> = properties.iter().map(|p| (*p).to_string()).collect();
        if let Some(key) = &et.primary_key {
            if key.properties == properties {
                let et = self.entity_type_mut(id)?;
                if let Some(key) = et.primary_key.as_mut() {
                    key.source = key.source.strongest(Some(source));
                }
                return Ok(Outcome::Applied(()));
            }
            if !source.overrides(Some(key.source)) {
                return Ok(Outcome::Rejected { held: key.source });
            }
        }
        let et = self.entity_type_mut(id)?;
        debug!(entity_type = %et.name, key = ?properties, ?source, "primary key set");
        et.primary_key = Some(Key { properties, source });
        self.push_event(ModelEvent::PrimaryKeyChanged(id));
        Ok(Outcome::Applied(()))
    }

    /// Declares an index over `properties`.
    ///
    /// An index over the same properties is updated in place when `source`
    /// is at least as strong as the one that declared it.
    pub fn add_index(
        &mut self,
        id: EntityTypeId,
        properties: &[&str],
        name: Option<&str>,
        unique: bool,
        source: ConfigurationSource,
    ) -> Result<Outcome<()>> {
        if properties.is_empty() {
            return Err(ModelError::InvalidName(String::new()));
        }
        if let Some(name) = name {
            if name.trim().is_empty() {
                return Err(ModelError::InvalidName(name.to_string()));
            }
        }
        for property in properties {
            if self.find_property(id, property).is_none() {
                return Err(ModelError::UnknownProperty {
                    entity_type: self.display_name(id),
                    property: (*property).to_string(),
                });
            }
        }
        let index = Index {
            properties: properties.iter().map(|p| (*p).to_string()).collect(),
            name: name.map(str::to_string),
            unique,
            include: Vec::new(),
            source,
        };
        let et = self.entity_type_mut(id)?;
        if let Some(existing) = et
            .indexes
            .iter_mut()
            .find(|i| i.properties == index.properties)
        {
            if !source.overrides(Some(existing.source)) {
                return Ok(Outcome::Rejected {
                    held: existing.source,
                });
            }
            let include = std::mem::take(&mut existing.include);
            *existing = Index { include, ..index };
            return Ok(Outcome::Applied(()));
        }
        debug!(entity_type = %et.name, properties = ?index.properties, unique, "index added");
        et.indexes.push(index);
        Ok(Outcome::Applied(()))
    }

    /// Sets the non-key properties stored with the index over `properties`.
    pub fn set_index_include(
        &mut self,
        id: EntityTypeId,
        properties: &[&str],
        include: &[&str],
        source: ConfigurationSource,
    ) -> Result<Outcome<()>> {
        for property in include {
            if self.find_property(id, property).is_none() {
                return Err(ModelError::UnknownProperty {
                    entity_type: self.display_name(id),
                    property: (*property).to_string(),
                });
            }
        }
        let display = self.display_name(id);
        let et = self.entity_type_mut(id)?;
        let Some(index) = et
            .indexes
            .iter_mut()
            .find(|i| i.properties.iter().map(String::as_str).eq(properties.iter().copied()))
        else {
            return Err(ModelError::UnknownIndex {
                entity_type: display,
                properties: properties.iter().map(|p| (*p).to_string()).collect(),
            });
        };
        if !source.overrides(Some(index.source)) {
            return Ok(Outcome::Rejected { held: index.source });
        }
        index.include = include.iter().map(|p| (*p).to_string()).collect();
        Ok(Outcome::Applied(()))
    }

    /// Sets how the store generates values for a property.
    pub fn set_value_generated(
        &mut self,
        id: EntityTypeId,
        property: &str,
        value_generated: ValueGenerated,
        source: ConfigurationSource,
    ) -> Result<Outcome<()>> {
        self.configure_property(id, property, source, |p| {
            p.value_generated = value_generated;
        })
    }

    /// Overrides the column a property maps to.
    pub fn set_column_name(
        &mut self,
        id: EntityTypeId,
        property: &str,
        column: &str,
        source: ConfigurationSource,
    ) -> Result<Outcome<()>> {
        if column.trim().is_empty() {
            return Err(ModelError::InvalidName(column.to_string()));
        }
        self.configure_property(id, property, source, |p| {
            p.column_name = Some(column.to_string());
        })
    }

    /// Marks a property as an optimistic concurrency token.
    pub fn set_concurrency_token(
        &mut self,
        id: EntityTypeId,
        property: &str,
        source: ConfigurationSource,
    ) -> Result<Outcome<()>> {
        self.configure_property(id, property, source, |p| p.concurrency_token = true)
    }

    fn configure_property(
        &mut self,
        id: EntityTypeId,
        name: &str,
        source: ConfigurationSource,
        apply: impl FnOnce(&mut Property),
    ) -> Result<Outcome<()>> {
        let declaring = self.base_chain(id).into_iter().find(|et| {
            self.get(*et)
                .is_some_and(|et| et.find_declared_property(name).is_some())
        });
        let Some(declaring) = declaring else {
            return Err(ModelError::UnknownProperty {
                entity_type: self.display_name(id),
                property: name.to_string(),
            });
        };
        let et = self.entity_type_mut(declaring)?;
        let Some(property) = et.find_declared_property_mut(name) else {
            return Ok(Outcome::Applied(()));
        };
        if !source.overrides(Some(property.source)) {
            return Ok(Outcome::Rejected {
                held: property.source,
            });
        }
        apply(property);
        property.source = source;
        Ok(Outcome::Applied(()))
    }

    /// Maps an entity type to a table.
    pub fn set_table_name(
        &mut self,
        id: EntityTypeId,
        table: &str,
        source: ConfigurationSource,
    ) -> Result<Outcome<()>> {
        if table.trim().is_empty() {
            return Err(ModelError::InvalidName(table.to_string()));
        }
        let et = self.entity_type_mut(id)?;
        if let Some((_, held)) = &et.table_name {
            if !source.overrides(Some(*held)) {
                return Ok(Outcome::Rejected { held: *held });
            }
        }
        et.table_name = Some((table.to_string(), source));
        Ok(Outcome::Applied(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConfigurationSource::{Convention, DataAnnotation, Explicit};

    fn add(model: &mut Model, name: &str, source: ConfigurationSource) -> EntityTypeId {
        model
            .add_entity_type(name, Some(name), source)
            .unwrap()
            .applied()
            .unwrap()
    }

    #[test]
    fn test_add_entity_type_is_idempotent() {
        let mut model = Model::new();
        let first = add(&mut model, "Blog", Convention);
        let second = add(&mut model, "Blog", Explicit);
        assert_eq!(first, second);
        assert_eq!(model.entity_type(first).unwrap().source(), Explicit);
        assert_eq!(model.entity_types().count(), 1);
    }

    #[test]
    fn test_empty_name_is_invalid() {
        let mut model = Model::new();
        match model.add_entity_type(" ", None, Explicit) {
            Err(ModelError::InvalidName(_)) => {}
            other => panic!("Expected InvalidName, got {other:?}"),
        }
    }

    #[test]
    fn test_ignored_type_rejects_weaker_source() {
        let mut model = Model::new();
        let _ = model.ignore_entity_type("Audit", DataAnnotation).unwrap();
        match model.add_entity_type("Audit", Some("Audit"), Convention).unwrap() {
            Outcome::Rejected { held } => assert_eq!(held, DataAnnotation),
            Outcome::Applied(_) => panic!("Expected Rejected"),
        }
        assert!(model
            .add_entity_type("Audit", Some("Audit"), Explicit)
            .unwrap()
            .is_applied());
        assert_eq!(model.ignored_type_source("Audit"), None);
    }

    #[test]
    fn test_convention_cannot_remove_explicit_entity_type() {
        let mut model = Model::new();
        let blog = add(&mut model, "Blog", Explicit);
        let outcome = model.remove_entity_type(blog, Convention).unwrap();
        assert_eq!(outcome, Outcome::Rejected { held: Explicit });
        assert!(model.contains(blog));
    }

    #[test]
    fn test_inheritance_cycle_is_an_error() {
        let mut model = Model::new();
        let a = add(&mut model, "A", Explicit);
        let b = add(&mut model, "B", Explicit);
        let _ = model.set_base_type(b, Some(a), Explicit).unwrap();
        match model.set_base_type(a, Some(b), Explicit) {
            Err(ModelError::InheritanceCycle { entity_type, base }) => {
                assert_eq!(entity_type, "A");
                assert_eq!(base, "B");
            }
            other => panic!("Expected InheritanceCycle, got {other:?}"),
        }
    }

    #[test]
    fn test_base_type_precedence() {
        let mut model = Model::new();
        let a = add(&mut model, "A", Explicit);
        let b = add(&mut model, "B", Explicit);
        let c = add(&mut model, "C", Explicit);
        let _ = model.set_base_type(c, Some(a), Explicit).unwrap();
        let outcome = model.set_base_type(c, Some(b), Convention).unwrap();
        assert_eq!(outcome, Outcome::Rejected { held: Explicit });
        assert_eq!(model.entity_type(c).unwrap().base_type(), Some(a));
    }

    #[test]
    fn test_shadow_property_materializes() {
        let mut model = Model::new();
        let post = add(&mut model, "Post", Explicit);
        let _ = model
            .add_property(post, "BlogId", PrimitiveType::Int32, true, true, Convention)
            .unwrap();
        let _ = model
            .add_property(post, "BlogId", PrimitiveType::Int32, false, false, Convention)
            .unwrap();
        let property = model.find_property(post, "BlogId").unwrap();
        assert!(!property.is_shadow());
        assert!(!property.is_nullable());
        assert_eq!(model.entity_type(post).unwrap().declared_properties().len(), 1);
    }

    #[test]
    fn test_ignore_member_removes_property_and_key() {
        let mut model = Model::new();
        let blog = add(&mut model, "Blog", Explicit);
        let _ = model
            .add_property(blog, "Id", PrimitiveType::Int32, false, false, Convention)
            .unwrap();
        let _ = model.set_primary_key(blog, &["Id"], Convention).unwrap();
        let _ = model.ignore_member(blog, "Id", Explicit).unwrap();
        assert!(model.find_property(blog, "Id").is_none());
        assert!(model.primary_key(blog).is_none());

        let outcome = model
            .add_property(blog, "Id", PrimitiveType::Int32, false, false, Convention)
            .unwrap();
        assert_eq!(outcome, Outcome::Rejected { held: Explicit });
    }

    #[test]
    fn test_primary_key_requires_known_property() {
        let mut model = Model::new();
        let blog = add(&mut model, "Blog", Explicit);
        match model.set_primary_key(blog, &["Id"], Explicit) {
            Err(ModelError::UnknownProperty { property, .. }) => assert_eq!(property, "Id"),
            other => panic!("Expected UnknownProperty, got {other:?}"),
        }
    }
}
