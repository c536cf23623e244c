//! Trait appliers: priority-ordered rules that alter, add or remove
//! attributes, or change the active directives, when a trait is present.
//!
//! Appliers are looked up by trait name (a trait derived from the named one
//! matches too). Every capability is optional; the default implementations
//! decline.

pub mod primitives;

use std::fmt;
use std::rc::Rc;

use crate::arena::ObjectId;
use crate::attribute_context::AttributeContextType;
use crate::attributes::ResolvedAttribute;
use crate::object::ParameterValue;
use crate::options::ResolveOptions;
use crate::status::StatusLevel;
use crate::traits::{ResolvedTrait, ResolvedTraitSet};

/// Where a set of traits is being applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyScope<'s> {
    /// Name of the entity attribute whose traits are applied to the
    /// attributes it brought in.
    pub owner_name: Option<&'s str>,
    /// The entity reference of that entity attribute.
    pub target_entity: Option<ObjectId>,
}

/// A brand-new attribute produced by [`AttributeApplier::add`].
#[derive(Debug, Clone)]
pub struct AttributeAddition {
    pub attribute: ResolvedAttribute,
    /// Ask to be offered the same source again next round.
    pub continue_applying: bool,
    /// Provenance node to create for the new attribute.
    pub context: Option<AttributeContextType>,
}

/// An attribute definition handed to an applier through a parameter value.
#[derive(Debug, Clone)]
pub struct AttributeSeed {
    pub name: String,
    pub source: ObjectId,
    pub traits: Rc<ResolvedTraitSet>,
}

/// Corpus services appliers may call while adding attributes.
pub trait ApplierServices {
    /// Materialize an attribute definition (inline or referenced).
    fn attribute_seed(&mut self, value: &ParameterValue, opts: &ResolveOptions) -> Option<AttributeSeed>;

    /// Resolve a trait visible from the point of reference, unbound.
    fn trait_named(&mut self, name: &str, opts: &ResolveOptions) -> Option<ResolvedTrait>;

    fn report(&mut self, level: StatusLevel, message: &str);
}

pub trait AttributeApplier {
    fn trait_name(&self) -> &str;

    fn priority(&self) -> i32;

    fn will_alter_directives(&self, _rt: &ResolvedTrait, _opts: &ResolveOptions) -> bool {
        false
    }

    fn alter_directives(&self, _rt: &ResolvedTrait, _opts: &mut ResolveOptions) {}

    fn will_apply(
        &self,
        _rt: &ResolvedTrait,
        _ra: &ResolvedAttribute,
        _opts: &ResolveOptions,
        _scope: &ApplyScope<'_>,
    ) -> bool {
        false
    }

    fn apply(
        &self,
        _rt: &ResolvedTrait,
        _ra: &mut ResolvedAttribute,
        _opts: &ResolveOptions,
        _scope: &ApplyScope<'_>,
    ) {
    }

    fn will_add(&self, _rt: &ResolvedTrait, _source: &ResolvedAttribute, _opts: &ResolveOptions) -> bool {
        false
    }

    fn add(
        &self,
        _services: &mut dyn ApplierServices,
        _rt: &ResolvedTrait,
        _source: &mut ResolvedAttribute,
        _opts: &ResolveOptions,
        _scope: &ApplyScope<'_>,
    ) -> Option<AttributeAddition> {
        None
    }

    fn will_remove(&self, _rt: &ResolvedTrait, _ra: &ResolvedAttribute, _opts: &ResolveOptions) -> bool {
        false
    }
}

/// Registered appliers, kept stable-sorted by ascending priority so equal
/// priorities run in registration order.
#[derive(Clone, Default)]
pub struct ApplierRegistry {
    appliers: Vec<Rc<dyn AttributeApplier>>,
}

impl fmt::Debug for ApplierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.appliers.iter().map(|a| (a.trait_name(), a.priority())))
            .finish()
    }
}

impl ApplierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every primitive applier.
    pub fn with_primitives() -> Self {
        let mut registry = Self::new();
        for applier in primitives::all() {
            registry.register(applier);
        }
        registry
    }

    pub fn register(&mut self, applier: Rc<dyn AttributeApplier>) {
        self.appliers.push(applier);
        self.appliers.sort_by_key(|a| a.priority());
    }

    pub fn len(&self) -> usize {
        self.appliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appliers.is_empty()
    }

    pub fn for_trait<'r>(&'r self, name: &'r str) -> impl Iterator<Item = &'r Rc<dyn AttributeApplier>> {
        self.appliers.iter().filter(move |a| a.trait_name() == name)
    }

    /// Whether any applier is registered for one of `lineage`'s names.
    pub fn handles_any(&self, lineage: &[String]) -> bool {
        self.appliers
            .iter()
            .any(|a| lineage.iter().any(|n| n == a.trait_name()))
    }

    /// Every (applier, trait) pair active for `traits`, in priority order.
    /// Ties keep trait order, then registration order.
    pub fn for_traits(&self, traits: &ResolvedTraitSet) -> Vec<(Rc<dyn AttributeApplier>, ResolvedTrait)> {
        let mut out: Vec<(Rc<dyn AttributeApplier>, ResolvedTrait)> = Vec::new();
        for rt in traits.iter() {
            for applier in &self.appliers {
                if rt.is_derived_from(applier.trait_name()) {
                    out.push((Rc::clone(applier), rt.clone()));
                }
            }
        }
        out.sort_by_key(|(a, _)| a.priority());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, i32);

    impl AttributeApplier for Named {
        fn trait_name(&self) -> &str {
            self.0
        }

        fn priority(&self) -> i32 {
            self.1
        }
    }

    #[test]
    fn equal_priorities_keep_registration_order() {
        let mut registry = ApplierRegistry::new();
        registry.register(Rc::new(Named("late", 5)));
        registry.register(Rc::new(Named("first", 5)));
        registry.register(Rc::new(Named("early", 1)));

        let order: Vec<&str> = registry.appliers.iter().map(|a| a.trait_name()).collect();
        assert_eq!(order, vec!["early", "late", "first"]);
    }

    #[test]
    fn primitives_are_registered() {
        let registry = ApplierRegistry::with_primitives();
        assert_eq!(registry.len(), 8);
        assert_eq!(registry.for_trait("is.removed").count(), 1);
        assert!(registry.handles_any(&["my.fk".to_string(), "does.referenceEntityVia".to_string()]));
    }
}
