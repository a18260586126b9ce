use crate::error::Result;
use crate::model::{EntityTypeId, Model, ValueGenerated};
use crate::source::ConfigurationSource;

use super::Convention;

/// Picks `Id` or `<Type>Id` as the primary key of root, non-owned types.
/// Integer keys are store-generated.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyDiscoveryConvention;

impl KeyDiscoveryConvention {
    fn configure(model: &mut Model, entity_type: EntityTypeId) -> Result<()> {
        let Some(et) = model.get(entity_type) else {
            return Ok(());
        };
        if et.base_type().is_some() || model.is_owned(entity_type) {
            return Ok(());
        }
        if et
            .primary_key()
            .is_some_and(|key| key.source() > ConfigurationSource::Convention)
        {
            return Ok(());
        }
        let type_key = format!("{}Id", et.display_name());
        let mut matches: Vec<_> = et
            .declared_properties()
            .iter()
            .filter(|p| {
                p.name().eq_ignore_ascii_case("Id") || p.name().eq_ignore_ascii_case(&type_key)
            })
            .map(|p| (p.name().to_string(), p.primitive()))
            .collect();
        if matches.len() != 1 {
            return Ok(());
        }
        let Some((name, primitive)) = matches.pop() else {
            return Ok(());
        };
        if et
            .primary_key()
            .is_some_and(|key| key.properties() == [name.clone()])
        {
            return Ok(());
        }

        let _ = model.set_primary_key(entity_type, &[&name], ConfigurationSource::Convention)?;
        if primitive.is_integer() {
            let _ = model.set_value_generated(
                entity_type,
                &name,
                ValueGenerated::OnAdd,
                ConfigurationSource::Convention,
            )?;
        }
        Ok(())
    }
}

impl Convention for KeyDiscoveryConvention {
    fn name(&self) -> &'static str {
        "KeyDiscovery"
    }

    fn entity_type_added(&self, model: &mut Model, entity_type: EntityTypeId) -> Result<()> {
        Self::configure(model, entity_type)
    }

    fn property_added(&self, model: &mut Model, entity_type: EntityTypeId, _name: &str) -> Result<()> {
        if model.get(entity_type).is_some_and(|et| et.primary_key().is_none()) {
            Self::configure(model, entity_type)?;
        }
        Ok(())
    }

    fn base_type_changed(
        &self,
        model: &mut Model,
        entity_type: EntityTypeId,
        _old_base: Option<EntityTypeId>,
    ) -> Result<()> {
        Self::configure(model, entity_type)
    }
}
