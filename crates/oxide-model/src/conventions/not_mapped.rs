use crate::error::Result;
use crate::model::{EntityTypeId, Model};
use crate::source::ConfigurationSource;

use super::Convention;

/// Ignores members marked `#[reflect(not_mapped)]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotMappedMemberConvention;

impl Convention for NotMappedMemberConvention {
    fn name(&self) -> &'static str {
        "NotMappedMember"
    }

    fn entity_type_added(&self, model: &mut Model, entity_type: EntityTypeId) -> Result<()> {
        let Some(clr) = model.get(entity_type).and_then(|et| et.clr_type()) else {
            return Ok(());
        };
        let mut not_mapped: Vec<String> = model
            .types()
            .members(clr)
            .into_iter()
            .filter(|m| m.not_mapped)
            .map(|m| m.name.clone())
            .collect();
        not_mapped.sort();
        for name in not_mapped {
            let _ = model.ignore_member(entity_type, &name, ConfigurationSource::DataAnnotation)?;
        }
        Ok(())
    }
}
