use crate::error::Result;
use crate::model::{EntityTypeId, Model};

use super::Convention;

/// Keeps inferred foreign key properties in line with the principal key and
/// with the shape of the dependent's properties.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForeignKeyPropertyDiscoveryConvention;

impl Convention for ForeignKeyPropertyDiscoveryConvention {
    fn name(&self) -> &'static str {
        "ForeignKeyPropertyDiscovery"
    }

    fn primary_key_changed(&self, model: &mut Model, entity_type: EntityTypeId) -> Result<()> {
        for principal in model.derived_types_inclusive(entity_type) {
            for fk in model.referencing_foreign_keys(principal) {
                if model.foreign_key(fk).is_some() {
                    model.rediscover_foreign_key_properties(fk)?;
                }
            }
        }
        Ok(())
    }

    fn property_added(&self, model: &mut Model, entity_type: EntityTypeId, name: &str) -> Result<()> {
        let affected: Vec<_> = model
            .foreign_keys()
            .filter(|fk| {
                model.is_same_or_base_of(entity_type, fk.dependent())
                    && fk.properties().iter().any(|p| p == name)
            })
            .map(|fk| fk.id())
            .collect();
        for fk in affected {
            model.refresh_requiredness(fk)?;
        }
        Ok(())
    }
}
