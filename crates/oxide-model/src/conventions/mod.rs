//! Conventions and the dispatcher that feeds them model events.
//!
//! A convention reacts to [`ModelEvent`]s by mutating the model with
//! [`ConfigurationSource::Convention`](crate::ConfigurationSource). Mutations
//! made by a convention enqueue further events; the dispatcher keeps draining
//! until the queue is empty. While a batch is open nothing is dispatched.

mod foreign_key_property;
mod key_discovery;
mod not_mapped;
mod property_discovery;
mod relationship_discovery;

use tracing::trace;

pub use foreign_key_property::ForeignKeyPropertyDiscoveryConvention;
pub use key_discovery::KeyDiscoveryConvention;
pub use not_mapped::NotMappedMemberConvention;
pub use property_discovery::PropertyDiscoveryConvention;
pub use relationship_discovery::RelationshipDiscoveryConvention;

use crate::error::{ModelError, Result};
use crate::model::{EntityTypeId, ForeignKeyId, Model, ModelEvent};

/// Upper bound on events handled in one drain.
const MAX_EVENTS: usize = 100_000;

/// A reaction to model changes. Every hook defaults to doing nothing.
pub trait Convention: std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn entity_type_added(&self, _model: &mut Model, _entity_type: EntityTypeId) -> Result<()> {
        Ok(())
    }

    fn entity_type_ignored(&self, _model: &mut Model, _name: &str) -> Result<()> {
        Ok(())
    }

    fn base_type_changed(
        &self,
        _model: &mut Model,
        _entity_type: EntityTypeId,
        _old_base: Option<EntityTypeId>,
    ) -> Result<()> {
        Ok(())
    }

    fn property_added(
        &self,
        _model: &mut Model,
        _entity_type: EntityTypeId,
        _name: &str,
    ) -> Result<()> {
        Ok(())
    }

    fn primary_key_changed(&self, _model: &mut Model, _entity_type: EntityTypeId) -> Result<()> {
        Ok(())
    }

    fn member_ignored(
        &self,
        _model: &mut Model,
        _entity_type: EntityTypeId,
        _name: &str,
    ) -> Result<()> {
        Ok(())
    }

    fn navigation_added(
        &self,
        _model: &mut Model,
        _foreign_key: ForeignKeyId,
        _name: &str,
    ) -> Result<()> {
        Ok(())
    }

    fn navigation_removed(
        &self,
        _model: &mut Model,
        _source: EntityTypeId,
        _target: EntityTypeId,
        _name: &str,
    ) -> Result<()> {
        Ok(())
    }

    fn foreign_key_ownership_changed(
        &self,
        _model: &mut Model,
        _foreign_key: ForeignKeyId,
    ) -> Result<()> {
        Ok(())
    }
}

fn dispatch(convention: &dyn Convention, model: &mut Model, event: &ModelEvent) -> Result<()> {
    match event {
        ModelEvent::EntityTypeAdded(id) => convention.entity_type_added(model, *id),
        ModelEvent::EntityTypeIgnored(name) => convention.entity_type_ignored(model, name),
        ModelEvent::BaseTypeChanged {
            entity_type,
            old_base,
        } => convention.base_type_changed(model, *entity_type, *old_base),
        ModelEvent::PropertyAdded { entity_type, name } => {
            convention.property_added(model, *entity_type, name)
        }
        ModelEvent::PrimaryKeyChanged(id) => convention.primary_key_changed(model, *id),
        ModelEvent::MemberIgnored { entity_type, name } => {
            convention.member_ignored(model, *entity_type, name)
        }
        ModelEvent::NavigationAdded { foreign_key, name } => {
            convention.navigation_added(model, *foreign_key, name)
        }
        ModelEvent::NavigationRemoved {
            source,
            target,
            name,
        } => convention.navigation_removed(model, *source, *target, name),
        ModelEvent::ForeignKeyOwnershipChanged(fk) => {
            convention.foreign_key_ownership_changed(model, *fk)
        }
    }
}

/// Runs conventions over queued model events, honoring batch boundaries.
#[derive(Debug)]
pub struct ConventionDispatcher {
    conventions: Vec<Box<dyn Convention>>,
    batch_depth: usize,
}

impl Default for ConventionDispatcher {
    fn default() -> Self {
        Self::new(vec![
            Box::new(NotMappedMemberConvention),
            Box::new(PropertyDiscoveryConvention),
            Box::new(KeyDiscoveryConvention),
            Box::new(ForeignKeyPropertyDiscoveryConvention),
            Box::new(RelationshipDiscoveryConvention),
        ])
    }
}

impl ConventionDispatcher {
    /// A dispatcher running `conventions` in order for every event.
    #[must_use]
    pub fn new(conventions: Vec<Box<dyn Convention>>) -> Self {
        Self {
            conventions,
            batch_depth: 0,
        }
    }

    /// A dispatcher that runs nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn conventions(&self) -> impl Iterator<Item = &dyn Convention> {
        self.conventions.iter().map(AsRef::as_ref)
    }

    pub const fn is_batching(&self) -> bool {
        self.batch_depth > 0
    }

    /// Defers dispatch until the matching [`Self::end_batch`].
    pub fn start_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Closes a batch; the outermost close drains the event queue.
    pub fn end_batch(&mut self, model: &mut Model) -> Result<()> {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        if self.batch_depth == 0 {
            self.run(model)
        } else {
            Ok(())
        }
    }

    /// Drains the event queue unless a batch is open.
    pub fn run(&self, model: &mut Model) -> Result<()> {
        if self.is_batching() {
            return Ok(());
        }
        let mut handled = 0;
        while let Some(event) = model.pop_event() {
            handled += 1;
            if handled > MAX_EVENTS {
                return Err(ModelError::ConventionLoop(MAX_EVENTS));
            }
            trace!(?event, "dispatching model event");
            for convention in &self.conventions {
                dispatch(convention.as_ref(), model, &event)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{MemberInfo, PrimitiveType, TypeInfo};
    use crate::source::ConfigurationSource;

    #[test]
    fn test_batch_defers_dispatch() {
        let mut model = Model::new();
        model.types_mut().insert(
            TypeInfo::new("Blog").member(MemberInfo::primitive("Id", PrimitiveType::Int32)),
        );
        let mut dispatcher = ConventionDispatcher::default();
        dispatcher.start_batch();
        let blog = model
            .add_entity_type("Blog", Some("Blog"), ConfigurationSource::Explicit)
            .unwrap()
            .applied()
            .unwrap();
        dispatcher.run(&mut model).unwrap();
        assert!(model.find_property(blog, "Id").is_none());

        dispatcher.end_batch(&mut model).unwrap();
        assert!(model.find_property(blog, "Id").is_some());
        assert_eq!(model.primary_key(blog).unwrap().properties(), ["Id"]);
    }

    #[test]
    fn test_nested_batches_drain_once_at_the_outermost_end() {
        let mut model = Model::new();
        model.types_mut().insert(
            TypeInfo::new("Blog").member(MemberInfo::primitive("Id", PrimitiveType::Int32)),
        );
        let mut dispatcher = ConventionDispatcher::default();
        dispatcher.start_batch();
        dispatcher.start_batch();
        let blog = model
            .add_entity_type("Blog", Some("Blog"), ConfigurationSource::Explicit)
            .unwrap()
            .applied()
            .unwrap();
        dispatcher.end_batch(&mut model).unwrap();
        assert!(model.find_property(blog, "Id").is_none());
        dispatcher.end_batch(&mut model).unwrap();
        assert!(model.find_property(blog, "Id").is_some());
    }

    #[test]
    fn test_empty_dispatcher_discards_events() {
        let mut model = Model::new();
        let dispatcher = ConventionDispatcher::empty();
        let _ = model
            .add_entity_type("Blog", None, ConfigurationSource::Explicit)
            .unwrap();
        dispatcher.run(&mut model).unwrap();
        assert_eq!(model.pop_event(), None);
        assert_eq!(dispatcher.conventions().count(), 0);
    }
}
