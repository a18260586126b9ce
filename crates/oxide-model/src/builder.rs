//! The public entry point for building a model.

use tracing::info;

use crate::conventions::ConventionDispatcher;
use crate::error::{ModelError, Result};
use crate::frozen::FrozenModel;
use crate::model::{DeleteBehavior, EntityTypeId, ForeignKeyId, Model};
use crate::reflect::{PrimitiveType, Reflect, TypeInfo};
use crate::source::{ConfigurationSource, Outcome};

const EXPLICIT: ConfigurationSource = ConfigurationSource::Explicit;

/// Builds a [`Model`] from explicit configuration, letting conventions fill in
/// the rest.
///
/// Every call is its own batch: conventions run before the call returns.
/// Use [`ModelBuilder::batch`] to apply several calls before conventions
/// see any of them.
///
/// ```ignore
/// let mut builder = ModelBuilder::new();
/// builder.entity::<Blog>()?;
/// builder.entity::<Post>()?;
/// let model = builder.finish()?;
/// ```
#[derive(Debug, Default)]
pub struct ModelBuilder {
    model: Model,
    dispatcher: ConventionDispatcher,
}

impl ModelBuilder {
    /// A builder with the default conventions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder running a custom convention set.
    #[must_use]
    pub fn with_conventions(dispatcher: ConventionDispatcher) -> Self {
        Self {
            model: Model::new(),
            dispatcher,
        }
    }

    /// The model as built so far.
    pub const fn model(&self) -> &Model {
        &self.model
    }

    fn apply<R>(&mut self, f: impl FnOnce(&mut Model) -> Result<R>) -> Result<R> {
        self.dispatcher.start_batch();
        let result = f(&mut self.model);
        let drained = self.dispatcher.end_batch(&mut self.model);
        let value = result?;
        drained?;
        Ok(value)
    }

    /// Runs `f` as one batch; conventions see its changes only at the end.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.dispatcher.start_batch();
        let result = f(self);
        let drained = self.dispatcher.end_batch(&mut self.model);
        let value = result?;
        drained?;
        Ok(value)
    }

    /// Makes a reflected type (and the types it reaches) known without
    /// mapping it.
    pub fn register<T: Reflect>(&mut self) -> &mut Self {
        T::register(self.model.types_mut());
        self
    }

    /// Registers a hand-written type description.
    pub fn register_type(&mut self, info: TypeInfo) -> &mut Self {
        self.model.types_mut().insert(info);
        self
    }

    /// Maps a reflected type as an entity type.
    pub fn entity<T: Reflect>(&mut self) -> Result<EntityTypeId> {
        T::register(self.model.types_mut());
        self.entity_type(&T::type_info().name)
    }

    /// Maps a registered type (or a type without reflection) by name.
    pub fn entity_type(&mut self, name: &str) -> Result<EntityTypeId> {
        let clr = self.model.types().contains(name).then(|| name.to_string());
        self.apply(|model| {
            model
                .add_entity_type(name, clr.as_deref(), EXPLICIT)?
                .applied()
                .ok_or_else(|| ModelError::UnknownEntityType(name.to_string()))
        })
    }

    /// Marks a reflected type as owned wherever it is referenced.
    pub fn owned<T: Reflect>(&mut self) -> &mut Self {
        T::register(self.model.types_mut());
        self.owned_type(&T::type_info().name)
    }

    /// Marks a type name as owned wherever it is referenced.
    pub fn owned_type(&mut self, name: &str) -> &mut Self {
        self.model.set_owned_type(name);
        self
    }

    /// Keeps a type out of the model.
    pub fn ignore_type(&mut self, name: &str) -> Result<Outcome<()>> {
        self.apply(|model| model.ignore_entity_type(name, EXPLICIT))
    }

    /// Keeps a member of an entity type out of the model.
    pub fn ignore(&mut self, entity_type: EntityTypeId, member: &str) -> Result<Outcome<()>> {
        self.apply(|model| model.ignore_member(entity_type, member, EXPLICIT))
    }

    pub fn has_base(
        &mut self,
        entity_type: EntityTypeId,
        base: Option<EntityTypeId>,
    ) -> Result<Outcome<()>> {
        self.apply(|model| model.set_base_type(entity_type, base, EXPLICIT))
    }

    pub fn has_key(&mut self, entity_type: EntityTypeId, properties: &[&str]) -> Result<Outcome<()>> {
        self.apply(|model| model.set_primary_key(entity_type, properties, EXPLICIT))
    }

    /// Declares an index; its name defaults to `IX_<Table>_<Columns>`.
    pub fn has_index(
        &mut self,
        entity_type: EntityTypeId,
        properties: &[&str],
        name: Option<&str>,
        unique: bool,
    ) -> Result<Outcome<()>> {
        self.apply(|model| model.add_index(entity_type, properties, name, unique, EXPLICIT))
    }

    /// Stores `include` with the index over `properties`.
    pub fn has_index_include(
        &mut self,
        entity_type: EntityTypeId,
        properties: &[&str],
        include: &[&str],
    ) -> Result<Outcome<()>> {
        self.apply(|model| model.set_index_include(entity_type, properties, include, EXPLICIT))
    }

    /// Adds a property that has no reflected member.
    pub fn shadow_property(
        &mut self,
        entity_type: EntityTypeId,
        name: &str,
        primitive: PrimitiveType,
        nullable: bool,
    ) -> Result<Outcome<()>> {
        self.apply(|model| model.add_property(entity_type, name, primitive, nullable, true, EXPLICIT))
    }

    pub fn to_table(&mut self, entity_type: EntityTypeId, table: &str) -> Result<Outcome<()>> {
        self.apply(|model| model.set_table_name(entity_type, table, EXPLICIT))
    }

    pub fn has_column_name(
        &mut self,
        entity_type: EntityTypeId,
        property: &str,
        column: &str,
    ) -> Result<Outcome<()>> {
        self.apply(|model| model.set_column_name(entity_type, property, column, EXPLICIT))
    }

    pub fn is_concurrency_token(
        &mut self,
        entity_type: EntityTypeId,
        property: &str,
    ) -> Result<Outcome<()>> {
        self.apply(|model| model.set_concurrency_token(entity_type, property, EXPLICIT))
    }

    fn navigation_target(&self, entity_type: EntityTypeId, navigation: &str) -> Result<String> {
        let et = self.model.entity_type(entity_type)?;
        et.clr_type()
            .and_then(|clr| self.model.types().find_member(clr, navigation))
            .and_then(|member| member.member_type.target_type())
            .map(str::to_string)
            .ok_or_else(|| ModelError::UnknownMember {
                type_name: et.display_name().to_string(),
                member: navigation.to_string(),
            })
    }

    /// Configures the relationship behind `navigation`, optionally paired
    /// with `inverse` on the target. `None` explicitly leaves the other end
    /// without a navigation.
    pub fn has_relationship(
        &mut self,
        entity_type: EntityTypeId,
        navigation: &str,
        inverse: Option<&str>,
    ) -> Result<Outcome<ForeignKeyId>> {
        let target_clr = self.navigation_target(entity_type, navigation)?;
        self.apply(|model| {
            let Some(target) = model.add_entity_type(&target_clr, Some(&target_clr), EXPLICIT)?.applied()
            else {
                return Err(ModelError::UnknownEntityType(target_clr.clone()));
            };
            model.relationship(entity_type, target, navigation, inverse, EXPLICIT)
        })
    }

    /// Makes the type behind `navigation` owned by `owner`.
    pub fn owns(
        &mut self,
        owner: EntityTypeId,
        navigation: &str,
        inverse: Option<&str>,
    ) -> Result<Outcome<ForeignKeyId>> {
        let target_clr = self.navigation_target(owner, navigation)?;
        self.apply(|model| {
            let existing = model
                .find_weak_entity_type(&target_clr, owner, navigation)
                .or_else(|| model.find_entity_type(&target_clr));
            let owned = match existing {
                Some(owned) => owned,
                None => model
                    .add_owned_entity_type(&target_clr, Some(&target_clr), None, EXPLICIT)?
                    .applied()
                    .ok_or_else(|| ModelError::UnknownEntityType(target_clr.clone()))?,
            };
            model.owns(owner, owned, navigation, inverse, EXPLICIT)
        })
    }

    pub fn on_delete(
        &mut self,
        foreign_key: ForeignKeyId,
        behavior: DeleteBehavior,
    ) -> Result<Outcome<()>> {
        self.apply(|model| model.set_delete_behavior(foreign_key, behavior, EXPLICIT))
    }

    /// Records the product version the model targets.
    pub fn product_version(&mut self, version: &str) -> &mut Self {
        self.model.set_product_version(version);
        self
    }

    /// Drains pending conventions, validates, and freezes the model.
    pub fn finish(mut self) -> Result<FrozenModel> {
        self.dispatcher.run(&mut self.model)?;
        let frozen = FrozenModel::freeze(&self.model)?;
        info!(
            entity_types = frozen.entity_types().len(),
            foreign_keys = frozen.foreign_keys().len(),
            diagnostics = self.model.diagnostics().len(),
            "model finalized"
        );
        Ok(frozen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::MemberInfo;

    fn blog_types(builder: &mut ModelBuilder) {
        builder
            .register_type(
                TypeInfo::new("Blog")
                    .member(MemberInfo::primitive("Id", PrimitiveType::Int32))
                    .member(MemberInfo::primitive("Url", PrimitiveType::String).nullable())
                    .member(MemberInfo::collection("Posts", "Post")),
            )
            .register_type(
                TypeInfo::new("Post")
                    .member(MemberInfo::primitive("Id", PrimitiveType::Int32))
                    .member(MemberInfo::primitive("BlogId", PrimitiveType::Int32))
                    .member(MemberInfo::reference("Blog", "Blog")),
            );
    }

    #[test]
    fn test_batch_defers_conventions() {
        let mut builder = ModelBuilder::new();
        blog_types(&mut builder);
        builder
            .batch(|b| {
                let blog = b.entity_type("Blog")?;
                assert!(b.model().find_property(blog, "Id").is_none());
                Ok(())
            })
            .unwrap();
        let blog = builder.model().find_entity_type("Blog").unwrap();
        assert!(builder.model().find_property(blog, "Id").is_some());
    }

    #[test]
    fn test_explicit_ignore_removes_discovered_relationship() {
        let mut builder = ModelBuilder::new();
        blog_types(&mut builder);
        let blog = builder.entity_type("Blog").unwrap();
        builder.entity_type("Post").unwrap();
        assert_eq!(builder.model().foreign_keys().count(), 1);

        let _ = builder.ignore(blog, "Posts").unwrap();
        let fk = builder.model().foreign_keys().next().unwrap();
        assert_eq!(fk.principal_to_dependent(), None);
        assert_eq!(fk.dependent_to_principal(), Some("Blog"));
    }

    #[test]
    fn test_unknown_navigation() {
        let mut builder = ModelBuilder::new();
        blog_types(&mut builder);
        let blog = builder.entity_type("Blog").unwrap();
        match builder.has_relationship(blog, "Comments", None) {
            Err(ModelError::UnknownMember { member, .. }) => assert_eq!(member, "Comments"),
            other => panic!("Expected UnknownMember, got {other:?}"),
        }
    }

    #[test]
    fn test_on_delete_overrides_inferred_behavior() {
        let mut builder = ModelBuilder::new();
        blog_types(&mut builder);
        builder.entity_type("Blog").unwrap();
        let post = builder.entity_type("Post").unwrap();
        let fk = builder
            .has_relationship(post, "Blog", Some("Posts"))
            .unwrap()
            .applied()
            .unwrap();
        let _ = builder.on_delete(fk, DeleteBehavior::Restrict).unwrap();
        let model = builder.finish().unwrap();
        assert_eq!(
            model.foreign_keys()[0].delete_behavior,
            DeleteBehavior::Restrict
        );
    }
}
