use crate::error::Result;
use crate::model::{EntityTypeId, Model};
use crate::reflect::MemberType;
use crate::source::ConfigurationSource;

use super::Convention;

/// Maps readable and writable scalar members to properties.
#[derive(Debug, Default, Clone, Copy)]
pub struct PropertyDiscoveryConvention;

impl PropertyDiscoveryConvention {
    fn discover(model: &mut Model, entity_type: EntityTypeId) -> Result<()> {
        let Some(et) = model.get(entity_type) else {
            return Ok(());
        };
        let Some(clr) = et.clr_type() else {
            return Ok(());
        };
        let base = et.base_type();
        let mut members: Vec<_> = model
            .types()
            .members(clr)
            .into_iter()
            .filter(|m| m.readable && m.writable && !m.not_mapped)
            .filter_map(|m| match m.member_type {
                MemberType::Primitive(primitive) => Some((m.name.clone(), primitive, m.nullable)),
                MemberType::Reference(_) | MemberType::Collection(_) => None,
            })
            .collect();
        members.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, primitive, nullable) in members {
            if model.is_member_ignored(entity_type, &name)
                || base.is_some_and(|base| model.find_property(base, &name).is_some())
                || model.find_navigation(entity_type, &name).is_some()
            {
                continue;
            }
            let _ = model.add_property(
                entity_type,
                &name,
                primitive,
                nullable,
                false,
                ConfigurationSource::Convention,
            )?;
        }
        Ok(())
    }
}

impl Convention for PropertyDiscoveryConvention {
    fn name(&self) -> &'static str {
        "PropertyDiscovery"
    }

    fn entity_type_added(&self, model: &mut Model, entity_type: EntityTypeId) -> Result<()> {
        Self::discover(model, entity_type)
    }

    fn base_type_changed(
        &self,
        model: &mut Model,
        entity_type: EntityTypeId,
        _old_base: Option<EntityTypeId>,
    ) -> Result<()> {
        for et in model.derived_types_inclusive(entity_type) {
            Self::discover(model, et)?;
        }
        Ok(())
    }
}
