//! Built-in appliers.
//!
//! | trait                         | priority |
//! |-------------------------------|----------|
//! | `does.imposeDirectives`       | 1        |
//! | `does.removeDirectives`       | 2        |
//! | `does.referenceEntity`        | 4        |
//! | `does.referenceEntityVia`     | 4        |
//! | `does.explainArray`           | 6        |
//! | `does.addSupportingAttribute` | 8        |
//! | `does.disambiguateNames`      | 9        |
//! | `is.removed`                  | 10       |
//!
//! Name formats accept `{a}`/`{A}` (owner attribute), `{m}`/`{M}` (member
//! attribute, capitalized with the upper-case letter) and `{o}` (ordinal).

use std::rc::Rc;

use super::{ApplierServices, ApplyScope, AttributeAddition, AttributeApplier};
use crate::attribute_context::AttributeContextType;
use crate::attributes::{ApplierState, AttributeTarget, ResolvedAttribute};
use crate::object::ParameterValue;
use crate::options::{ResolveOptions, TraitDirectiveSet};
use crate::parameter::no_tables;
use crate::status::StatusLevel;
use crate::traits::{ResolvedTrait, ResolvedTraitSetBuilder};

pub const REFERENCE_ONLY: &str = "referenceOnly";
pub const STRUCTURED: &str = "structured";
pub const IS_ARRAY: &str = "isArray";
pub const NORMALIZED: &str = "normalized";

pub fn all() -> Vec<Rc<dyn AttributeApplier>> {
    vec![
        Rc::new(ImposeDirectives),
        Rc::new(RemoveDirectives),
        Rc::new(ReferenceEntity),
        Rc::new(ReferenceEntityVia),
        Rc::new(ExplainArray),
        Rc::new(AddSupportingAttribute),
        Rc::new(DisambiguateNames),
        Rc::new(IsRemoved),
    ]
}

/// Expand a name format.
pub fn format_name(format: &str, owner: &str, member: &str, ordinal: Option<u32>) -> String {
    let ordinal = ordinal.map(|o| o.to_string()).unwrap_or_default();
    format
        .replace("{a}", owner)
        .replace("{A}", &capitalize(owner))
        .replace("{m}", member)
        .replace("{M}", &capitalize(member))
        .replace("{o}", &ordinal)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn number_arg(rt: &ResolvedTrait, name: &str, default: u32) -> u32 {
    rt.parameter_values
        .text_by_name(name)
        .and_then(|t| t.trim().parse().ok())
        .unwrap_or(default)
}

fn directives_arg(rt: &ResolvedTrait) -> TraitDirectiveSet {
    rt.parameter_values
        .text_by_name("directives")
        .map(TraitDirectiveSet::parse)
        .unwrap_or_default()
}

fn added_state() -> Option<ApplierState> {
    Some(ApplierState {
        added: true,
        ..ApplierState::default()
    })
}

pub struct ImposeDirectives;

impl AttributeApplier for ImposeDirectives {
    fn trait_name(&self) -> &str {
        "does.imposeDirectives"
    }

    fn priority(&self) -> i32 {
        1
    }

    fn will_alter_directives(&self, rt: &ResolvedTrait, _opts: &ResolveOptions) -> bool {
        rt.parameter_values.value_by_name("directives").is_some()
    }

    fn alter_directives(&self, rt: &ResolvedTrait, opts: &mut ResolveOptions) {
        opts.directives.merge(&directives_arg(rt));
    }
}

pub struct RemoveDirectives;

impl AttributeApplier for RemoveDirectives {
    fn trait_name(&self) -> &str {
        "does.removeDirectives"
    }

    fn priority(&self) -> i32 {
        2
    }

    fn will_alter_directives(&self, rt: &ResolvedTrait, _opts: &ResolveOptions) -> bool {
        rt.parameter_values.value_by_name("directives").is_some()
    }

    fn alter_directives(&self, rt: &ResolvedTrait, opts: &mut ResolveOptions) {
        for d in directives_arg(rt).iter() {
            opts.directives.delete(d);
        }
    }
}

pub struct ReferenceEntity;

impl AttributeApplier for ReferenceEntity {
    fn trait_name(&self) -> &str {
        "does.referenceEntity"
    }

    fn priority(&self) -> i32 {
        4
    }

    fn will_alter_directives(&self, _rt: &ResolvedTrait, _opts: &ResolveOptions) -> bool {
        true
    }

    fn alter_directives(&self, _rt: &ResolvedTrait, opts: &mut ResolveOptions) {
        opts.directives.add(REFERENCE_ONLY);
    }
}

/// Replaces a reference-only entity attribute with a foreign key.
pub struct ReferenceEntityVia;

impl AttributeApplier for ReferenceEntityVia {
    fn trait_name(&self) -> &str {
        "does.referenceEntityVia"
    }

    fn priority(&self) -> i32 {
        4
    }

    fn will_add(&self, rt: &ResolvedTrait, source: &ResolvedAttribute, opts: &ResolveOptions) -> bool {
        let state = source.state();
        opts.directives.has(REFERENCE_ONLY)
            && !state.added
            && !state.foreign_key_added
            && rt.parameter_values.value_by_name("foreignKeyAttribute").is_some()
    }

    fn add(
        &self,
        services: &mut dyn ApplierServices,
        rt: &ResolvedTrait,
        source: &mut ResolvedAttribute,
        opts: &ResolveOptions,
        scope: &ApplyScope<'_>,
    ) -> Option<AttributeAddition> {
        let value = rt.parameter_values.value_by_name("foreignKeyAttribute")?;
        let seed = services.attribute_seed(value, opts)?;
        source.state_mut().foreign_key_added = true;

        let owner = scope.owner_name.unwrap_or(&source.resolved_name);
        let name = format_name(&seed.name, owner, &source.resolved_name, None);

        let mut traits = ResolvedTraitSetBuilder::new();
        traits.take_reference(seed.traits);
        match services.trait_named("is.linkedEntity.identifier", opts) {
            Some(mut linked) => {
                if let Some(entity) = scope.target_entity {
                    let _ = linked
                        .parameter_values
                        .set_by_name("entityReferences", ParameterValue::Object(entity));
                }
                traits.add_trait(linked, &mut no_tables);
            }
            None => services.report(
                StatusLevel::Warning,
                "trait 'is.linkedEntity.identifier' is not visible; foreign key left untagged",
            ),
        }

        let mut attribute = ResolvedAttribute::new(name, AttributeTarget::Attribute(seed.source))
            .with_traits(traits.finish());
        attribute.applier_state = added_state();
        Some(AttributeAddition {
            attribute,
            continue_applying: false,
            context: Some(AttributeContextType::AddedAttributeIdentity),
        })
    }

    fn will_remove(&self, _rt: &ResolvedTrait, ra: &ResolvedAttribute, opts: &ResolveOptions) -> bool {
        opts.directives.has(REFERENCE_ONLY) && !ra.state().added
    }
}

/// Expands an array template into ordinal copies, one per round.
pub struct ExplainArray;

impl ExplainArray {
    fn bounds(rt: &ResolvedTrait) -> (u32, u32) {
        let start = number_arg(rt, "startingOrdinal", 0);
        let count = number_arg(rt, "maximumExpansion", 3);
        (start, start.saturating_add(count))
    }
}

impl AttributeApplier for ExplainArray {
    fn trait_name(&self) -> &str {
        "does.explainArray"
    }

    fn priority(&self) -> i32 {
        6
    }

    fn will_add(&self, rt: &ResolvedTrait, source: &ResolvedAttribute, opts: &ResolveOptions) -> bool {
        let state = source.state();
        let (start, end) = Self::bounds(rt);
        opts.directives.has(IS_ARRAY)
            && !state.added
            && state.array_ordinal.is_none()
            && state.next_ordinal.unwrap_or(start) < end
    }

    fn add(
        &self,
        _services: &mut dyn ApplierServices,
        rt: &ResolvedTrait,
        source: &mut ResolvedAttribute,
        _opts: &ResolveOptions,
        _scope: &ApplyScope<'_>,
    ) -> Option<AttributeAddition> {
        let (start, end) = Self::bounds(rt);
        let ordinal = source.state().next_ordinal.unwrap_or(start);
        if ordinal >= end {
            return None;
        }
        let format = rt
            .parameter_values
            .text_by_name("renameFormat")
            .unwrap_or("{a}{o}");
        let name = format_name(format, &source.resolved_name, "", Some(ordinal));
        source.state_mut().next_ordinal = Some(ordinal + 1);

        let mut attribute = ResolvedAttribute::new(name, source.target.clone())
            .with_traits(Rc::clone(&source.traits));
        attribute.applier_state = Some(ApplierState {
            added: true,
            array_ordinal: Some(ordinal),
            ..ApplierState::default()
        });
        Some(AttributeAddition {
            attribute,
            continue_applying: ordinal + 1 < end,
            context: Some(AttributeContextType::GeneratedRound),
        })
    }

    fn will_remove(&self, _rt: &ResolvedTrait, ra: &ResolvedAttribute, opts: &ResolveOptions) -> bool {
        let state = ra.state();
        opts.directives.has(IS_ARRAY) && !state.added && state.array_ordinal.is_none()
    }
}

pub struct AddSupportingAttribute;

impl AttributeApplier for AddSupportingAttribute {
    fn trait_name(&self) -> &str {
        "does.addSupportingAttribute"
    }

    fn priority(&self) -> i32 {
        8
    }

    fn will_add(&self, rt: &ResolvedTrait, source: &ResolvedAttribute, _opts: &ResolveOptions) -> bool {
        let state = source.state();
        !state.added
            && !state.supporting_added
            && rt.parameter_values.value_by_name("addedAttribute").is_some()
    }

    fn add(
        &self,
        services: &mut dyn ApplierServices,
        rt: &ResolvedTrait,
        source: &mut ResolvedAttribute,
        opts: &ResolveOptions,
        scope: &ApplyScope<'_>,
    ) -> Option<AttributeAddition> {
        let value = rt.parameter_values.value_by_name("addedAttribute")?;
        let seed = services.attribute_seed(value, opts)?;
        source.state_mut().supporting_added = true;

        let owner = scope.owner_name.unwrap_or(&source.resolved_name);
        let name = format_name(&seed.name, owner, &source.resolved_name, None);

        let mut traits = ResolvedTraitSetBuilder::new();
        traits.take_reference(seed.traits);
        if let Some(mut support) = services.trait_named("is.addedInSupportOf", opts) {
            let _ = support.parameter_values.set_by_name(
                "inSupportOf",
                ParameterValue::text(source.resolved_name.clone()),
            );
            traits.add_trait(support, &mut no_tables);
        }

        let mut attribute = ResolvedAttribute::new(name, AttributeTarget::Attribute(seed.source))
            .with_traits(traits.finish());
        attribute.applier_state = added_state();
        Some(AttributeAddition {
            attribute,
            continue_applying: false,
            context: Some(AttributeContextType::AddedAttributeSupporting),
        })
    }
}

/// Prefixes attributes brought in through an entity attribute.
pub struct DisambiguateNames;

impl AttributeApplier for DisambiguateNames {
    fn trait_name(&self) -> &str {
        "does.disambiguateNames"
    }

    fn priority(&self) -> i32 {
        9
    }

    fn will_apply(
        &self,
        _rt: &ResolvedTrait,
        _ra: &ResolvedAttribute,
        opts: &ResolveOptions,
        scope: &ApplyScope<'_>,
    ) -> bool {
        scope.owner_name.is_some()
            && !opts.directives.has(STRUCTURED)
            && !opts.directives.has(REFERENCE_ONLY)
    }

    fn apply(
        &self,
        rt: &ResolvedTrait,
        ra: &mut ResolvedAttribute,
        _opts: &ResolveOptions,
        scope: &ApplyScope<'_>,
    ) {
        let Some(owner) = scope.owner_name else {
            return;
        };
        let format = rt
            .parameter_values
            .text_by_name("renameFormat")
            .unwrap_or("{a}{M}");
        ra.resolved_name = format_name(format, owner, &ra.resolved_name, ra.state().array_ordinal);
    }
}

pub struct IsRemoved;

impl AttributeApplier for IsRemoved {
    fn trait_name(&self) -> &str {
        "is.removed"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn will_remove(&self, _rt: &ResolvedTrait, _ra: &ResolvedAttribute, _opts: &ResolveOptions) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_tokens_expand() {
        assert_eq!(format_name("{a}{M}", "owner", "name", None), "ownerName");
        assert_eq!(format_name("{A}_{m}{o}", "owner", "name", Some(2)), "Owner_name2");
        assert_eq!(format_name("{a}{o}", "tag", "", None), "tag");
    }

    #[test]
    fn priorities_match_the_table() {
        let got: Vec<(String, i32)> = all()
            .iter()
            .map(|a| (a.trait_name().to_string(), a.priority()))
            .collect();
        assert_eq!(got[0], ("does.imposeDirectives".to_string(), 1));
        assert_eq!(got[7], ("is.removed".to_string(), 10));
    }
}
