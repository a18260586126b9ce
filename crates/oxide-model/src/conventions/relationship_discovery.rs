//! Relationship discovery.
//!
//! For an entity type with a reflected type, every reference or collection
//! member that is not already a property or ignored is a navigation
//! candidate. Candidates are grouped by target entity type, paired with
//! inverse candidates on the target, filtered through a fixed sequence of
//! passes, and finally turned into relationships or ownerships. Pairs that
//! cannot be decided are recorded as ambiguous and revisited when members are
//! ignored or navigations are configured.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::Result;
use crate::model::{
    DefiningNavigation, EntityTypeId, ForeignKeyId, Model, ModelDiagnostic, NavigationCandidate,
    NavigationSide,
};
use crate::reflect::{MemberId, MemberType};
use crate::source::{ConfigurationSource, Outcome};

use super::Convention;

const CONVENTION: ConfigurationSource = ConfigurationSource::Convention;

/// Discovers relationships from reference and collection members.
#[derive(Debug, Default, Clone, Copy)]
pub struct RelationshipDiscoveryConvention;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CandidateMember {
    id: MemberId,
    target: String,
    collection: bool,
}

impl CandidateMember {
    fn name(&self) -> &str {
        &self.id.name
    }
}

#[derive(Debug, Clone)]
struct RelationshipCandidate {
    target: EntityTypeId,
    navigations: Vec<CandidateMember>,
    inverses: Vec<CandidateMember>,
}

/// Navigation-shaped members of the entity type's reflected type, sorted by
/// member identity. Computed once per entity type.
fn navigation_candidates(model: &mut Model, id: EntityTypeId) -> Result<Vec<CandidateMember>> {
    let et = model.entity_type(id)?;
    if let Some(cached) = &et.navigation_candidates {
        return Ok(cached
            .iter()
            .map(|(member, candidate)| CandidateMember {
                id: member.clone(),
                target: candidate.target.clone(),
                collection: candidate.collection,
            })
            .collect());
    }
    let Some(clr) = et.clr_type() else {
        return Ok(Vec::new());
    };
    let types = model.types();
    let computed: BTreeMap<MemberId, NavigationCandidate> = types
        .members(clr)
        .into_iter()
        .filter(|m| m.readable && (m.writable || m.member_type.is_collection()))
        .filter_map(|m| {
            let target = match &m.member_type {
                MemberType::Reference(target) | MemberType::Collection(target) => target,
                MemberType::Primitive(_) => return None,
            };
            types.contains(target).then(|| {
                (
                    m.id(),
                    NavigationCandidate {
                        target: target.clone(),
                        collection: m.member_type.is_collection(),
                    },
                )
            })
        })
        .collect();
    let members = computed
        .iter()
        .map(|(member, candidate)| CandidateMember {
            id: member.clone(),
            target: candidate.target.clone(),
            collection: candidate.collection,
        })
        .collect();
    model.entity_type_mut(id)?.navigation_candidates = Some(computed);
    Ok(members)
}

fn is_candidate_navigation(model: &Model, id: EntityTypeId, name: &str) -> bool {
    !model.is_member_ignored(id, name) && model.find_property(id, name).is_none()
}

fn is_ambiguous_member(model: &Model, id: EntityTypeId, member: &MemberId) -> bool {
    model
        .get(id)
        .and_then(|et| et.ambiguous_navigations())
        .is_some_and(|map| map.contains_key(member))
}

fn clr_of(model: &Model, id: EntityTypeId) -> Option<String> {
    model.get(id).and_then(|et| et.clr_type()).map(str::to_string)
}

/// Returns true if values of `derived`'s reflected type can be used where
/// `base`'s are expected.
fn is_assignable(model: &Model, base: EntityTypeId, derived: EntityTypeId) -> bool {
    match (clr_of(model, base), clr_of(model, derived)) {
        (Some(base), Some(derived)) => model.types().is_assignable_from(&base, &derived),
        _ => model.is_same_or_base_of(base, derived),
    }
}

pub(crate) fn discover_relationships(model: &mut Model, id: EntityTypeId) -> Result<()> {
    let Some(clr) = clr_of(model, id) else {
        return Ok(());
    };
    let candidates = find_relationship_candidates(model, id, &clr)?;
    let candidates = remove_incompatible_with_existing_relationships(model, id, candidates)?;
    let candidates = remove_inherited_inverse_navigations(model, candidates);
    let candidates = remove_single_sided_base_navigations(model, id, candidates);
    create_relationships(model, id, &clr, candidates)
}

fn find_relationship_candidates(
    model: &mut Model,
    id: EntityTypeId,
    clr: &str,
) -> Result<Vec<RelationshipCandidate>> {
    let ownership = model.find_ownership(id);
    if ownership.is_none() && model.is_owned(id) {
        return Ok(Vec::new());
    }

    let mut candidates: Vec<RelationshipCandidate> = Vec::new();
    for member in navigation_candidates(model, id)? {
        if !is_candidate_navigation(model, id, member.name()) {
            continue;
        }
        let Some(target) = resolve_target(model, id, &member)? else {
            continue;
        };
        if !model.contains(id) {
            return Ok(Vec::new());
        }

        if let Some(existing) = candidates.iter_mut().find(|c| c.target == target) {
            if target != id || !existing.inverses.contains(&member) {
                existing.navigations.push(member);
            }
            continue;
        }

        let inverses = find_inverse_candidates(model, id, clr, target, &member, ownership)?;
        candidates.push(RelationshipCandidate {
            target,
            navigations: vec![member],
            inverses,
        });
    }

    Ok(candidates
        .into_iter()
        .filter(|c| model.contains(c.target))
        .collect())
}

fn find_inverse_candidates(
    model: &mut Model,
    id: EntityTypeId,
    clr: &str,
    target: EntityTypeId,
    navigation: &CandidateMember,
    ownership: Option<ForeignKeyId>,
) -> Result<Vec<CandidateMember>> {
    let mut inverses = Vec::new();
    if clr_of(model, target).is_none() {
        return Ok(inverses);
    }
    let ownership_navigation = ownership
        .and_then(|fk| model.foreign_key(fk))
        .filter(|fk| fk.principal() == target)
        .and_then(|fk| fk.principal_to_dependent().map(str::to_string));

    for inverse in navigation_candidates(model, target)? {
        let types = model.types();
        if !(types.is_assignable_from(&inverse.target, clr)
            || types.is_assignable_from(clr, &inverse.target))
        {
            continue;
        }
        if !is_candidate_navigation(model, target, inverse.name())
            || (target == id && inverse.id == navigation.id)
            || is_ambiguous_member(model, target, &inverse.id)
        {
            continue;
        }
        if ownership_navigation
            .as_deref()
            .is_some_and(|name| name != inverse.name())
        {
            continue;
        }
        if let Some(defining) = model.get(target).and_then(|et| et.defining_navigation()) {
            if defining.entity_type == id && defining.name != navigation.name() {
                continue;
            }
        }
        if let Some(defining) = model.get(id).and_then(|et| et.defining_navigation()) {
            if defining.entity_type == target && defining.name != inverse.name() {
                continue;
            }
        }
        inverses.push(inverse);
    }
    Ok(inverses)
}

/// The entity type a navigation candidate points at, created on demand.
fn resolve_target(
    model: &mut Model,
    id: EntityTypeId,
    member: &CandidateMember,
) -> Result<Option<EntityTypeId>> {
    let target_clr = member.target.as_str();
    if !model.types().contains(target_clr) {
        return Ok(None);
    }
    if let Some(owner) = model
        .ownership_path(id)
        .into_iter()
        .find(|owner| clr_of(model, *owner).as_deref() == Some(target_clr))
    {
        return Ok(Some(owner));
    }
    if let Some(weak) = model.find_weak_entity_type(target_clr, id, member.name()) {
        return Ok(Some(weak));
    }

    let existing = model.find_entity_type(target_clr);
    if model.is_owned_type(target_clr) {
        return resolve_owned_target(model, id, member, existing);
    }
    match existing {
        Some(target) => {
            let explicitly_owned = model.get(target).is_some_and(|et| et.is_owned());
            if explicitly_owned {
                if let Some(fk) = model.find_ownership(target).and_then(|fk| model.foreign_key(fk)) {
                    if !model.is_same_or_base_of(fk.principal(), id) {
                        debug!(
                            entity_type = %model.display_name(id),
                            navigation = member.name(),
                            target = target_clr,
                            "target is owned by another entity type"
                        );
                        return Ok(None);
                    }
                }
            }
            Ok(Some(target))
        }
        None => {
            if model.ignored_type_source(target_clr).is_some() {
                return Ok(None);
            }
            Ok(model
                .add_entity_type(target_clr, Some(target_clr), CONVENTION)?
                .applied())
        }
    }
}

fn resolve_owned_target(
    model: &mut Model,
    id: EntityTypeId,
    member: &CandidateMember,
    existing: Option<EntityTypeId>,
) -> Result<Option<EntityTypeId>> {
    let target_clr = member.target.as_str();
    let Some(target) = existing else {
        return Ok(model
            .add_owned_entity_type(target_clr, Some(target_clr), None, CONVENTION)?
            .applied());
    };
    let Some(fk) = model.find_ownership(target).and_then(|fk| model.foreign_key(fk)) else {
        return Ok(Some(target));
    };
    if !model.is_same_or_base_of(fk.principal(), id) {
        debug!(
            entity_type = %model.display_name(id),
            navigation = member.name(),
            target = target_clr,
            "owned target already belongs to another owner"
        );
        return Ok(None);
    }
    if fk.principal_to_dependent() == Some(member.name()) {
        return Ok(Some(target));
    }
    let weak_name = format!("{}.{}#{}", model.display_name(id), member.name(), target_clr);
    Ok(model
        .add_owned_entity_type(
            &weak_name,
            Some(target_clr),
            Some(DefiningNavigation {
                name: member.name().to_string(),
                entity_type: id,
            }),
            CONVENTION,
        )?
        .applied())
}

/// Returns true if a navigation on `side` of `fk` may be paired with an
/// inverse called `inverse_name` on `inverse_type`.
fn can_merge_with(
    model: &Model,
    fk: ForeignKeyId,
    side: NavigationSide,
    inverse_name: Option<&str>,
    inverse_type: EntityTypeId,
) -> bool {
    let Some(key) = model.foreign_key(fk) else {
        return false;
    };
    (key.is_self_referencing() || key.target_type(side) == inverse_type)
        && model.can_set_navigation(fk, side.opposite(), inverse_name, CONVENTION)
}

fn are_compatible(
    model: &Model,
    id: EntityTypeId,
    navigation: Option<&CandidateMember>,
    inverse: &CandidateMember,
    target: EntityTypeId,
) -> bool {
    if let Some(navigation) = navigation {
        if let Some((fk, side)) = model.find_navigation(id, navigation.name()) {
            if !can_merge_with(model, fk, side, Some(inverse.name()), target) {
                return false;
            }
        }
    }
    if let Some((fk, side)) = model.find_navigation(target, inverse.name()) {
        let Some(key) = model.foreign_key(fk) else {
            return false;
        };
        if key.declaring_type(side) != target
            || !can_merge_with(model, fk, side, navigation.map(CandidateMember::name), id)
        {
            return false;
        }
        if !is_assignable(model, id, key.target_type(side)) {
            return false;
        }
    }
    true
}

/// Pairs navigations with compatible inverses and splits off navigations that
/// have none, taking already configured relationships into account.
fn remove_incompatible_with_existing_relationships(
    model: &mut Model,
    id: EntityTypeId,
    candidates: Vec<RelationshipCandidate>,
) -> Result<Vec<RelationshipCandidate>> {
    let mut filtered: Vec<RelationshipCandidate> = Vec::new();
    let mut unused = Vec::new();

    for mut candidate in candidates {
        let target = candidate.target;
        while let Some(navigation) = candidate.navigations.first().cloned() {
            if let Some((fk, side)) = model.find_navigation(id, navigation.name()) {
                let key = model.foreign_key_ref(fk)?;
                if key.declaring_type(side) != id || key.target_type(side) != target {
                    candidate.navigations.remove(0);
                    continue;
                }
            }

            if candidate.navigations.len() == 1 && candidate.inverses.is_empty() {
                break;
            }

            let mut compatible: Option<CandidateMember> = None;
            let mut several = false;
            for inverse in &candidate.inverses {
                if are_compatible(model, id, Some(&navigation), inverse, target) {
                    if compatible.is_some() {
                        several = true;
                        break;
                    }
                    compatible = Some(inverse.clone());
                }
            }
            if several {
                break;
            }

            let Some(compatible) = compatible else {
                candidate.navigations.remove(0);
                filtered.push(RelationshipCandidate {
                    target,
                    navigations: vec![navigation],
                    inverses: Vec::new(),
                });
                if target == id && !candidate.inverses.is_empty() {
                    let next = candidate.inverses.remove(0);
                    if !candidate.navigations.contains(&next) {
                        candidate.navigations.push(next);
                    }
                }
                if candidate.navigations.is_empty() {
                    let inverses = std::mem::take(&mut candidate.inverses);
                    candidate.inverses = inverses
                        .into_iter()
                        .filter(|inverse| are_compatible(model, id, None, inverse, target))
                        .collect();
                }
                continue;
            };

            let other_compatible = candidate.navigations.iter().any(|other| {
                *other != navigation && are_compatible(model, id, Some(other), &compatible, target)
            });
            if other_compatible {
                break;
            }

            candidate.navigations.remove(0);
            candidate.inverses.retain(|inverse| *inverse != compatible);
            filtered.push(RelationshipCandidate {
                target,
                navigations: vec![navigation],
                inverses: vec![compatible],
            });
            if target == id && candidate.navigations.is_empty() && !candidate.inverses.is_empty() {
                let next = candidate.inverses.remove(0);
                if !candidate.navigations.contains(&next) {
                    candidate.navigations.push(next);
                }
            }
        }

        if !candidate.navigations.is_empty() || !candidate.inverses.is_empty() {
            filtered.push(candidate);
        } else if filtered.iter().all(|c| c.target != target) {
            unused.push(target);
        }
    }

    for target in unused {
        remove_if_unused_shared_type(model, target)?;
    }
    Ok(filtered)
}

/// When a navigation to a base type and one to a derived type share an
/// inverse name, the base pairing keeps the inverse.
fn remove_inherited_inverse_navigations(
    model: &Model,
    mut candidates: Vec<RelationshipCandidate>,
) -> Vec<RelationshipCandidate> {
    if candidates.is_empty() {
        return candidates;
    }
    let mut roots: Vec<EntityTypeId> = Vec::new();
    for candidate in &candidates {
        let root = model.root(candidate.target);
        if !roots.contains(&root) {
            roots.push(root);
        }
    }
    for root in roots {
        let hierarchy: Vec<usize> = (0..candidates.len())
            .filter(|&i| model.root(candidates[i].target) == root)
            .collect();
        let mut visited: Vec<usize> = Vec::new();
        for &index in &hierarchy {
            strip_inherited_inverses(model, &mut candidates, index, &hierarchy, &mut visited);
        }
    }
    candidates
}

fn strip_inherited_inverses(
    model: &Model,
    candidates: &mut [RelationshipCandidate],
    index: usize,
    hierarchy: &[usize],
    visited: &mut Vec<usize>,
) {
    let candidate = &candidates[index];
    if visited.contains(&index)
        || (candidate.navigations.len() > 1 && !candidate.inverses.is_empty())
        || candidate.inverses.len() > 1
    {
        return;
    }
    visited.push(index);
    let Some(inverse_name) = candidate.inverses.first().map(|i| i.name().to_string()) else {
        return;
    };
    let target = candidate.target;
    for &other in hierarchy {
        let other_target = candidates[other].target;
        if other_target == target || !model.is_same_or_base_of(target, other_target) {
            continue;
        }
        candidates[other]
            .inverses
            .retain(|inverse| inverse.name() != inverse_name);
        if !visited.contains(&other) {
            strip_inherited_inverses(model, candidates, other, hierarchy, visited);
        }
    }
}

/// Drops single-sided navigations that a derived type already declares as
/// part of a paired relationship.
fn remove_single_sided_base_navigations(
    model: &Model,
    id: EntityTypeId,
    candidates: Vec<RelationshipCandidate>,
) -> Vec<RelationshipCandidate> {
    let derived: Vec<EntityTypeId> = model
        .derived_types_inclusive(id)
        .into_iter()
        .skip(1)
        .collect();
    candidates
        .into_iter()
        .filter_map(|mut candidate| {
            if !candidate.inverses.is_empty() {
                return Some(candidate);
            }
            candidate.navigations.retain(|navigation| {
                !derived.iter().any(|d| {
                    model
                        .find_declared_navigation(*d, navigation.name())
                        .and_then(|(fk, side)| {
                            model.foreign_key(fk).map(|key| key.end(side.opposite()).name.is_some())
                        })
                        .unwrap_or(false)
                })
            });
            (!candidate.navigations.is_empty()).then_some(candidate)
        })
        .collect()
}

fn has_declared_ambiguous_navigations_to(model: &Model, id: EntityTypeId, target_clr: &str) -> bool {
    model
        .get(id)
        .is_some_and(|et| et.has_ambiguous_navigations_to(target_clr))
}

fn has_ambiguous_navigations_to(model: &Model, id: EntityTypeId, target_clr: &str) -> bool {
    model
        .base_chain(id)
        .into_iter()
        .any(|et| has_declared_ambiguous_navigations_to(model, et, target_clr))
}

fn add_ambiguous(
    model: &mut Model,
    id: EntityTypeId,
    members: &[CandidateMember],
    target_clr: &str,
) -> Result<()> {
    if members.is_empty() {
        return Ok(());
    }
    let et = model.entity_type_mut(id)?;
    let map = et.ambiguous_navigations.get_or_insert_with(BTreeMap::new);
    for member in members {
        map.insert(member.id.clone(), target_clr.to_string());
    }
    Ok(())
}

/// Forgets ambiguous navigations of `id` that point at `target_clr` or a
/// type derived from it.
fn remove_ambiguous(model: &mut Model, id: EntityTypeId, target_clr: &str) -> Result<bool> {
    let Some(map) = model.get(id).and_then(|et| et.ambiguous_navigations()) else {
        return Ok(false);
    };
    let stale: Vec<MemberId> = map
        .iter()
        .filter(|(_, target)| model.types().is_assignable_from(target_clr, target))
        .map(|(member, _)| member.clone())
        .collect();
    if stale.is_empty() {
        return Ok(false);
    }
    let et = model.entity_type_mut(id)?;
    if let Some(map) = et.ambiguous_navigations.as_mut() {
        for member in &stale {
            map.remove(member);
        }
        if map.is_empty() {
            et.ambiguous_navigations = None;
        }
    }
    Ok(true)
}

fn is_implicitly_created_unused_shared_type(model: &Model, id: EntityTypeId) -> bool {
    let Some(et) = model.get(id) else {
        return false;
    };
    let shared = et.is_owned()
        || et.defining_navigation().is_some()
        || et.clr_type().is_some_and(|clr| model.is_owned_type(clr));
    et.source() == CONVENTION
        && shared
        && model
            .foreign_keys()
            .all(|fk| fk.dependent() != id && fk.principal() != id)
}

fn log_rejected(model: &Model, id: EntityTypeId, navigation: &str, outcome: &Outcome<ForeignKeyId>) {
    if let Outcome::Rejected { held } = outcome {
        debug!(
            entity_type = %model.display_name(id),
            navigation,
            held = ?held,
            "relationship rejected by stronger configuration"
        );
    }
}

fn remove_if_unused_shared_type(model: &mut Model, id: EntityTypeId) -> Result<()> {
    if is_implicitly_created_unused_shared_type(model, id) {
        debug!(entity_type = %model.display_name(id), "removing unused owned entity type");
        let _ = model.remove_entity_type(id, CONVENTION)?;
    }
    Ok(())
}

fn create_relationships(
    model: &mut Model,
    id: EntityTypeId,
    clr: &str,
    candidates: Vec<RelationshipCandidate>,
) -> Result<()> {
    let mut unused = Vec::new();
    for mut candidate in candidates {
        let target = candidate.target;
        if !model.contains(id) {
            break;
        }
        let Some(target_clr) = clr_of(model, target) else {
            continue;
        };

        let source_base = model.get(id).and_then(|et| et.base_type());
        let target_base = model.get(target).and_then(|et| et.base_type());
        let ambiguous_on_base = source_base
            .is_some_and(|base| has_ambiguous_navigations_to(model, base, &target_clr))
            || target_base.is_some_and(|base| has_ambiguous_navigations_to(model, base, clr));

        let ambiguous = (candidate.navigations.len() > 1
            && !candidate.inverses.is_empty()
            && (!model.is_owned(target) || model.is_in_ownership_path(id, target)))
            || candidate.inverses.len() > 1
            || ambiguous_on_base
            || has_declared_ambiguous_navigations_to(model, id, &target_clr)
            || has_declared_ambiguous_navigations_to(model, target, clr);

        if ambiguous {
            if !ambiguous_on_base {
                model.report(ModelDiagnostic::MultipleNavigationProperties {
                    entity_type: model.display_name(id),
                    target: model.display_name(target),
                    navigations: candidate
                        .navigations
                        .iter()
                        .map(|n| n.name().to_string())
                        .collect(),
                    inverses: candidate
                        .inverses
                        .iter()
                        .map(|n| n.name().to_string())
                        .collect(),
                });
            }

            let mut kept = Vec::new();
            for navigation in std::mem::take(&mut candidate.navigations) {
                if release_navigation(model, id, navigation.name())? {
                    kept.push(navigation);
                }
            }
            candidate.navigations = kept;
            let mut kept = Vec::new();
            for inverse in std::mem::take(&mut candidate.inverses) {
                if release_navigation(model, target, inverse.name())? {
                    kept.push(inverse);
                }
            }
            candidate.inverses = kept;

            if !ambiguous_on_base {
                add_ambiguous(model, id, &candidate.navigations, &target_clr)?;
                add_ambiguous(model, target, &candidate.inverses, clr)?;
            }
            unused.push(target);
            continue;
        }

        for navigation in &candidate.navigations {
            if !model.contains(target) || !model.contains(id) {
                continue;
            }
            let inverse = candidate.inverses.first();
            if navigation.collection && inverse.is_some_and(|i| i.collection) {
                debug!(
                    entity_type = %model.display_name(id),
                    navigation = navigation.name(),
                    "skipping collection pair"
                );
                model.report(ModelDiagnostic::ManyToManySkipped {
                    entity_type: model.display_name(id),
                    navigation: navigation.name().to_string(),
                    target: model.display_name(target),
                });
                continue;
            }
            let target_owned = model.is_owned(target) && !model.is_in_ownership_path(id, target);
            let inverse_name = inverse.map(CandidateMember::name);
            if target_owned {
                // A second navigation to the same owned type gets its own weak type.
                let Some(owned) = resolve_owned_target(model, id, navigation, Some(target))? else {
                    continue;
                };
                let outcome = model.owns(id, owned, navigation.name(), inverse_name, CONVENTION)?;
                log_rejected(model, id, navigation.name(), &outcome);
            } else {
                let outcome = model.relationship(id, target, navigation.name(), inverse_name, CONVENTION)?;
                log_rejected(model, id, navigation.name(), &outcome);
            }
        }

        if candidate.navigations.is_empty() {
            if candidate.inverses.is_empty() || model.is_owned(target) {
                unused.push(target);
            } else {
                for inverse in &candidate.inverses {
                    if model.contains(target) && model.contains(id) {
                        let outcome = model.relationship(target, id, inverse.name(), None, CONVENTION)?;
                        log_rejected(model, target, inverse.name(), &outcome);
                    }
                }
            }
        }
    }

    for target in unused {
        remove_if_unused_shared_type(model, target)?;
    }
    Ok(())
}

/// Removes the convention relationship behind a navigation so it can be
/// marked ambiguous. Returns false if stronger configuration keeps it.
fn release_navigation(model: &mut Model, id: EntityTypeId, name: &str) -> Result<bool> {
    let Some((fk, _)) = model.find_declared_navigation(id, name) else {
        return Ok(true);
    };
    Ok(model.remove_foreign_key(fk, CONVENTION)?.is_applied())
}

impl RelationshipDiscoveryConvention {
    fn discover_all(model: &mut Model, entity_types: Vec<EntityTypeId>) -> Result<()> {
        for et in entity_types {
            if model.contains(et) {
                discover_relationships(model, et)?;
            }
        }
        Ok(())
    }
}

impl Convention for RelationshipDiscoveryConvention {
    fn name(&self) -> &'static str {
        "RelationshipDiscovery"
    }

    fn entity_type_added(&self, model: &mut Model, entity_type: EntityTypeId) -> Result<()> {
        if model.contains(entity_type) {
            discover_relationships(model, entity_type)?;
        }
        Ok(())
    }

    fn entity_type_ignored(&self, model: &mut Model, name: &str) -> Result<()> {
        let affected: Vec<EntityTypeId> = model.entity_types().map(|et| et.id()).collect();
        for et in affected {
            if model.contains(et) && remove_ambiguous(model, et, name)? {
                discover_relationships(model, et)?;
            }
        }
        Ok(())
    }

    fn base_type_changed(
        &self,
        model: &mut Model,
        entity_type: EntityTypeId,
        old_base: Option<EntityTypeId>,
    ) -> Result<()> {
        if !model.contains(entity_type) {
            return Ok(());
        }
        for et in model.hierarchy(entity_type) {
            if let Ok(et) = model.entity_type_mut(et) {
                et.navigation_candidates = None;
            }
        }
        if let Some(old_base) = old_base.filter(|b| model.contains(*b)) {
            let old_hierarchy = model.hierarchy(old_base);
            Self::discover_all(model, old_hierarchy)?;
        }
        let hierarchy = model.hierarchy(entity_type);
        Self::discover_all(model, hierarchy)
    }

    fn member_ignored(&self, model: &mut Model, entity_type: EntityTypeId, name: &str) -> Result<()> {
        let mut rediscover = Vec::new();
        for derived in model.derived_types_inclusive(entity_type) {
            let Some(target_clr) = model
                .get(derived)
                .and_then(|et| et.ambiguous_navigations())
                .and_then(|map| map.iter().find(|(member, _)| member.name == name))
                .map(|(_, target)| target.clone())
            else {
                continue;
            };
            remove_ambiguous(model, derived, &target_clr)?;
            if let Some(derived_clr) = clr_of(model, derived) {
                for target in model.entity_types_with_clr(&target_clr) {
                    if remove_ambiguous(model, target, &derived_clr)? {
                        rediscover.push(target);
                    }
                }
            }
            rediscover.insert(0, derived);
        }
        if !rediscover.is_empty() && !rediscover.contains(&entity_type) {
            rediscover.insert(0, entity_type);
        }
        Self::discover_all(model, rediscover)
    }

    fn navigation_added(&self, model: &mut Model, foreign_key: ForeignKeyId, name: &str) -> Result<()> {
        let Some(key) = model.foreign_key(foreign_key) else {
            return Ok(());
        };
        let Some(declaring) = [
            NavigationSide::DependentToPrincipal,
            NavigationSide::PrincipalToDependent,
        ]
        .into_iter()
        .find(|side| key.end(*side).name() == Some(name))
        else {
            return Ok(());
        };
        let source = key.declaring_type(declaring);
        let target = key.target_type(declaring);
        let Some(target_clr) = clr_of(model, target) else {
            return Ok(());
        };
        for derived in model.derived_types_inclusive(source) {
            let removed = remove_ambiguous(model, derived, &target_clr)?;
            let target_removed = match clr_of(model, derived) {
                Some(derived_clr) => remove_ambiguous(model, target, &derived_clr)?,
                None => false,
            };
            if removed && model.contains(derived) {
                discover_relationships(model, derived)?;
            }
            if target_removed && model.contains(target) {
                discover_relationships(model, target)?;
            }
        }
        Ok(())
    }

    fn navigation_removed(
        &self,
        model: &mut Model,
        source: EntityTypeId,
        target: EntityTypeId,
        name: &str,
    ) -> Result<()> {
        if !model.contains(source) || !is_candidate_navigation(model, source, name) {
            return Ok(());
        }
        if !model.contains(target) {
            let ignored = clr_of(model, source)
                .and_then(|clr| model.types().find_member(&clr, name).cloned())
                .and_then(|m| m.member_type.target_type().map(str::to_string))
                .is_some_and(|t| model.ignored_type_source(&t).is_some());
            if ignored {
                return Ok(());
            }
        }
        let hierarchy = model.hierarchy(source);
        Self::discover_all(model, hierarchy)
    }

    fn foreign_key_ownership_changed(
        &self,
        model: &mut Model,
        foreign_key: ForeignKeyId,
    ) -> Result<()> {
        let Some(dependent) = model.foreign_key(foreign_key).map(|fk| fk.dependent()) else {
            return Ok(());
        };
        if model.contains(dependent) {
            discover_relationships(model, dependent)?;
        }
        Ok(())
    }
}
