//! Resolved traits, trait sets and trait resolution.
//!
//! A [`ResolvedTraitSet`] is shared through `Rc` and copied on first write
//! (`Rc::make_mut`), so a cached set handed to several attributes stays
//! untouched when one of them merges more traits in.

use std::rc::Rc;

use ahash::AHashMap;

use crate::arena::ObjectId;
use crate::context::{CacheKey, CacheKind};
use crate::object::{DefinitionVariant, ObjectBody, ObjectKind, ObjectReference, TraitDef};
use crate::options::ResolveOptions;
use crate::parameter::{replacement_value, ParameterCollection, ParameterValueSet, TableLookup};
use crate::resolver::Resolver;
use crate::status::StatusLevel;

/// Which slice of an object's traits to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraitSet {
    All,
    InheritedOnly,
    AppliedOnly,
    ElevatedOnly,
}

/// A trait definition with its parameters bound.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrait {
    pub trait_id: ObjectId,
    pub trait_name: String,
    /// The trait's own name followed by the names of its bases.
    pub lineage: Rc<[String]>,
    pub elevated: bool,
    pub modifies_attributes: bool,
    pub ugly: bool,
    pub parameter_values: ParameterValueSet,
}

impl ResolvedTrait {
    pub fn is_derived_from(&self, name: &str) -> bool {
        self.lineage.iter().any(|n| n == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedTraitSet {
    set: Vec<ResolvedTrait>,
    lookup: AHashMap<ObjectId, usize>,
    has_elevated: bool,
    modifies_attributes: bool,
}

impl PartialEq for ResolvedTraitSet {
    fn eq(&self, other: &Self) -> bool {
        self.set == other.set
    }
}

impl ResolvedTraitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedTrait> {
        self.set.iter()
    }

    pub fn get(&self, trait_id: ObjectId) -> Option<&ResolvedTrait> {
        self.lookup.get(&trait_id).map(|&i| &self.set[i])
    }

    /// First trait named `name`, else first trait derived from it.
    pub fn find(&self, name: &str) -> Option<&ResolvedTrait> {
        self.set
            .iter()
            .find(|rt| rt.trait_name == name)
            .or_else(|| self.set.iter().find(|rt| rt.is_derived_from(name)))
    }

    pub fn has_elevated(&self) -> bool {
        self.has_elevated
    }

    pub fn modifies_attributes(&self) -> bool {
        self.modifies_attributes
    }

    pub fn names(&self) -> Vec<&str> {
        self.set.iter().map(|rt| rt.trait_name.as_str()).collect()
    }

    /// Add `incoming`, or fold its explicitly set values into the copy
    /// already present.
    pub fn merge(&mut self, incoming: ResolvedTrait, table_of: &mut TableLookup<'_>) {
        self.has_elevated |= incoming.elevated;
        self.modifies_attributes |= incoming.modifies_attributes;

        let Some(&index) = self.lookup.get(&incoming.trait_id) else {
            self.lookup.insert(incoming.trait_id, self.set.len());
            self.set.push(incoming);
            return;
        };
        let existing = &mut self.set[index];
        for i in 0..incoming.parameter_values.len() {
            if !incoming.parameter_values.was_set(i) {
                continue;
            }
            let Some(new) = incoming.parameter_values.value(i) else {
                continue;
            };
            let old = existing.parameter_values.value(i);
            if old == Some(new) {
                continue;
            }
            let value = replacement_value(old, new, true, table_of);
            existing.parameter_values.set(i, value, true);
        }
    }

    pub fn merge_set(
        &mut self,
        other: &ResolvedTraitSet,
        elevated_only: bool,
        table_of: &mut TableLookup<'_>,
    ) {
        for rt in other.iter() {
            if !elevated_only || rt.elevated {
                self.merge(rt.clone(), table_of);
            }
        }
    }

    pub fn elevated_subset(&self) -> ResolvedTraitSet {
        let mut out = ResolvedTraitSet::new();
        for rt in self.set.iter().filter(|rt| rt.elevated) {
            out.merge(rt.clone(), &mut crate::parameter::no_tables);
        }
        out
    }

    /// Drop every trait named (or derived from) `name`.
    pub fn remove(&mut self, name: &str) {
        self.set.retain(|rt| !rt.is_derived_from(name));
        self.lookup = self
            .set
            .iter()
            .enumerate()
            .map(|(i, rt)| (rt.trait_id, i))
            .collect();
        self.has_elevated = self.set.iter().any(|rt| rt.elevated);
        self.modifies_attributes = self.set.iter().any(|rt| rt.modifies_attributes);
    }
}

/// Holds one reference to a trait set and copies it only when a shared set
/// is about to change.
#[derive(Debug, Clone, Default)]
pub struct ResolvedTraitSetBuilder {
    rts: Option<Rc<ResolvedTraitSet>>,
}

impl ResolvedTraitSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_reference(&mut self, rts: Rc<ResolvedTraitSet>) {
        self.rts = Some(rts);
    }

    pub fn is_empty(&self) -> bool {
        self.rts.as_ref().map_or(true, |rts| rts.is_empty())
    }

    pub fn merge_set(
        &mut self,
        other: &Rc<ResolvedTraitSet>,
        elevated_only: bool,
        table_of: &mut TableLookup<'_>,
    ) {
        if other.is_empty() {
            return;
        }
        match &mut self.rts {
            None if !elevated_only => self.rts = Some(Rc::clone(other)),
            None => {
                let subset = other.elevated_subset();
                if !subset.is_empty() {
                    self.rts = Some(Rc::new(subset));
                }
            }
            Some(rts) => Rc::make_mut(rts).merge_set(other, elevated_only, table_of),
        }
    }

    pub fn add_trait(&mut self, rt: ResolvedTrait, table_of: &mut TableLookup<'_>) {
        let rts = self.rts.get_or_insert_with(Default::default);
        Rc::make_mut(rts).merge(rt, table_of);
    }

    pub fn finish(self) -> Rc<ResolvedTraitSet> {
        self.rts.unwrap_or_default()
    }
}

/// The three independently built slices of an object's traits.
#[derive(Default)]
struct TraitParts {
    inherited: Rc<ResolvedTraitSet>,
    /// Only entity attributes carry an elevated slice of their own.
    elevated: Option<Rc<ResolvedTraitSet>>,
    applied: Rc<ResolvedTraitSet>,
}

impl<'a> Resolver<'a> {
    /// Resolved traits of any object, cached per directive tag.
    pub fn resolved_traits(
        &mut self,
        object: ObjectId,
        which: TraitSet,
        opts: &ResolveOptions,
    ) -> Rc<ResolvedTraitSet> {
        let tag = opts.directives.tag();
        let key = CacheKey::new(object, opts.wrt_doc, CacheKind::Traits(which));
        if let Some(hit) = self.ctx.traits.get(&key, &tag) {
            return hit;
        }
        if !self.ctx.traits_in_progress.insert(object) {
            return Rc::default();
        }
        let parts = self.construct_trait_parts(object, opts);
        self.ctx.traits_in_progress.remove(&object);

        let mut all = ResolvedTraitSetBuilder::new();
        all.merge_set(&parts.inherited, false, &mut |v| self.table_of(v));
        if let Some(elevated) = &parts.elevated {
            all.merge_set(elevated, false, &mut |v| self.table_of(v));
        }
        all.merge_set(&parts.applied, false, &mut |v| self.table_of(v));
        let all = all.finish();
        let elevated = match parts.elevated {
            Some(elevated) => elevated,
            None if all.has_elevated() => Rc::new(all.elevated_subset()),
            None => Rc::default(),
        };

        let entries = [
            (TraitSet::All, Rc::clone(&all)),
            (TraitSet::InheritedOnly, parts.inherited),
            (TraitSet::AppliedOnly, parts.applied),
            (TraitSet::ElevatedOnly, elevated),
        ];
        let mut wanted = Rc::default();
        for (kind, set) in entries {
            if kind == which {
                wanted = Rc::clone(&set);
            }
            let key = CacheKey::new(object, opts.wrt_doc, CacheKind::Traits(kind));
            self.ctx.traits.insert(key, tag.clone(), set);
        }
        wanted
    }

    fn construct_trait_parts(&mut self, object: ObjectId, opts: &ResolveOptions) -> TraitParts {
        let graph = self.graph;
        let Some(obj) = graph.objects.get(object) else {
            return TraitParts::default();
        };
        match &obj.body {
            ObjectBody::Reference(r) if r.kind == ObjectKind::TraitRef => TraitParts {
                inherited: self.trait_reference_set(object, r, opts),
                ..TraitParts::default()
            },
            ObjectBody::Reference(r) => {
                let inherited = match self.resolve_reference(object, opts.wrt_doc) {
                    Some(def) => self.resolved_traits(def, TraitSet::All, opts),
                    None => Rc::default(),
                };
                TraitParts {
                    inherited,
                    elevated: None,
                    applied: self.trait_refs_set(&r.applied_traits, opts),
                }
            }
            ObjectBody::Definition(def) => {
                let applied = self.trait_refs_set(&def.exhibits_traits, opts);
                match &def.variant {
                    DefinitionVariant::Trait(t) => TraitParts {
                        inherited: Rc::new(self.trait_definition_set(object, t, opts)),
                        ..TraitParts::default()
                    },
                    DefinitionVariant::DataType(_)
                    | DefinitionVariant::Relationship(_)
                    | DefinitionVariant::Entity(_) => TraitParts {
                        inherited: self.trait_refs_set(def.extends().as_slice(), opts),
                        elevated: None,
                        applied,
                    },
                    DefinitionVariant::TypeAttribute(att) => {
                        let bases: Vec<ObjectId> =
                            att.relationship.into_iter().chain(att.data_type).collect();
                        TraitParts {
                            inherited: self.trait_refs_set(&bases, opts),
                            elevated: None,
                            applied,
                        }
                    }
                    DefinitionVariant::EntityAttribute(att) => {
                        let elevated = match att.entity {
                            Some(entity) => self.resolved_traits(entity, TraitSet::ElevatedOnly, opts),
                            None => Rc::default(),
                        };
                        TraitParts {
                            inherited: self.trait_refs_set(att.relationship.as_slice(), opts),
                            elevated: Some(elevated),
                            applied,
                        }
                    }
                    _ => TraitParts {
                        applied,
                        ..TraitParts::default()
                    },
                }
            }
        }
    }

    /// Union of the full trait sets of `refs`, in order.
    fn trait_refs_set(&mut self, refs: &[ObjectId], opts: &ResolveOptions) -> Rc<ResolvedTraitSet> {
        let mut builder = ResolvedTraitSetBuilder::new();
        for &r in refs {
            let rts = self.resolved_traits(r, TraitSet::All, opts);
            builder.merge_set(&rts, false, &mut |v| self.table_of(v));
        }
        builder.finish()
    }

    /// A trait definition resolves to a set holding just itself, with its
    /// base's parameters, bound values and flags folded in.
    fn trait_definition_set(
        &mut self,
        id: ObjectId,
        def: &TraitDef,
        opts: &ResolveOptions,
    ) -> ResolvedTraitSet {
        let base = def.extends.and_then(|ext| {
            self.resolved_traits(ext, TraitSet::All, opts)
                .iter()
                .next()
                .cloned()
        });

        let mut params = base
            .as_ref()
            .map(|b| ParameterCollection::extending(b.parameter_values.parameters()))
            .unwrap_or_default();
        for p in &def.parameters {
            if let Err(err) = params.add(id, p.clone()) {
                let message = format!("trait '{}': {err}", def.name);
                self.report_object(StatusLevel::Error, &message, id);
            }
        }
        let params = Rc::new(params);
        let values = (0..params.len())
            .map(|i| {
                base.as_ref()
                    .and_then(|b| b.parameter_values.value(i).cloned())
                    .or_else(|| params.get(i).and_then(|p| p.default_value.clone()))
            })
            .collect();

        let mut lineage = vec![def.name.clone()];
        if let Some(b) = &base {
            lineage.extend(b.lineage.iter().cloned());
        }
        let modifies_attributes = def.modifies_attributes.unwrap_or_else(|| {
            base.as_ref().map_or(false, |b| b.modifies_attributes)
                || self.appliers.handles_any(&lineage)
        });

        let rt = ResolvedTrait {
            trait_id: id,
            trait_name: def.name.clone(),
            lineage: lineage.into(),
            elevated: def
                .elevated
                .or(base.as_ref().map(|b| b.elevated))
                .unwrap_or(false),
            modifies_attributes,
            ugly: def.ugly.or(base.as_ref().map(|b| b.ugly)).unwrap_or(false),
            parameter_values: ParameterValueSet::new(params, values),
        };
        let mut set = ResolvedTraitSet::new();
        set.merge(rt, &mut crate::parameter::no_tables);
        set
    }

    /// The referenced trait with the reference's arguments bound. A bad
    /// argument is reported and skipped.
    fn trait_reference_set(
        &mut self,
        id: ObjectId,
        reference: &ObjectReference,
        opts: &ResolveOptions,
    ) -> Rc<ResolvedTraitSet> {
        let Some(def) = self.resolve_reference(id, opts.wrt_doc) else {
            return Rc::default();
        };
        let def_set = self.resolved_traits(def, TraitSet::All, opts);
        if reference.arguments.is_empty() {
            return def_set;
        }
        let Some(mut rt) = def_set.iter().next().cloned() else {
            return def_set;
        };

        let params = Rc::clone(rt.parameter_values.parameters());
        for (ordinal, arg) in reference.arguments.iter().enumerate() {
            match params.resolve_parameter(ordinal, arg.name.as_deref()) {
                Ok(index) => {
                    let old = rt.parameter_values.value(index).cloned();
                    let value =
                        replacement_value(old.as_ref(), &arg.value, true, &mut |v| self.table_of(v));
                    rt.parameter_values.set(index, value, true);
                }
                Err(err) => {
                    let message = format!("trait '{}': {err}", rt.trait_name);
                    self.report_object(StatusLevel::Error, &message, id);
                }
            }
        }

        let mut set = ResolvedTraitSet::new();
        set.merge(rt, &mut crate::parameter::no_tables);
        Rc::new(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::object::{Parameter, ParameterValue};
    use crate::parameter::no_tables;
    use proptest::prelude::*;

    fn trait_with(id: ObjectId, value: &str, was_set: bool) -> ResolvedTrait {
        let mut params = ParameterCollection::new();
        params.add(id, Parameter::new("p")).unwrap();
        let mut pv = ParameterValueSet::new(Rc::new(params), vec![]);
        pv.set(0, Some(ParameterValue::text(value)), was_set);
        ResolvedTrait {
            trait_id: id,
            trait_name: "t".into(),
            lineage: vec!["t".to_string()].into(),
            elevated: false,
            modifies_attributes: false,
            ugly: false,
            parameter_values: pv,
        }
    }

    fn some_id() -> ObjectId {
        Arena::new().insert(())
    }

    #[test]
    fn shared_sets_are_copied_before_mutation() {
        let id = some_id();
        let mut first = ResolvedTraitSetBuilder::new();
        first.add_trait(trait_with(id, "a", true), &mut no_tables);
        let shared = first.finish();

        let mut second = ResolvedTraitSetBuilder::new();
        second.take_reference(Rc::clone(&shared));
        second.add_trait(trait_with(id, "b", true), &mut no_tables);
        let changed = second.finish();

        assert_eq!(
            shared.iter().next().unwrap().parameter_values.text_by_name("p"),
            Some("a")
        );
        assert_eq!(
            changed.iter().next().unwrap().parameter_values.text_by_name("p"),
            Some("b")
        );
    }

    #[test]
    fn elevated_only_merge_filters() {
        let mut arena = Arena::new();
        let (a, b) = (arena.insert(()), arena.insert(()));
        let mut source = ResolvedTraitSet::new();
        let mut up = trait_with(a, "x", false);
        up.elevated = true;
        source.merge(up, &mut no_tables);
        source.merge(trait_with(b, "y", false), &mut no_tables);
        let source = Rc::new(source);

        let mut builder = ResolvedTraitSetBuilder::new();
        builder.merge_set(&source, true, &mut no_tables);
        let got = builder.finish();
        assert_eq!(got.len(), 1);
        assert!(got.has_elevated());
    }

    proptest! {
        #[test]
        fn merge_override_law(first in "[a-z]{1,6}", second in "[a-z]{1,6}", explicit in any::<bool>()) {
            let id = some_id();
            let mut set = ResolvedTraitSet::new();
            set.merge(trait_with(id, &first, true), &mut no_tables);
            set.merge(trait_with(id, &second, explicit), &mut no_tables);
            let expected = if explicit { &second } else { &first };
            let got = set.get(id).unwrap().parameter_values.text_by_name("p").map(str::to_string);
            prop_assert_eq!(got.as_deref(), Some(expected.as_str()));
        }

        #[test]
        fn copy_on_write_isolates_holders(values in proptest::collection::vec("[a-z]{1,4}", 1..5)) {
            let id = some_id();
            let mut base = ResolvedTraitSet::new();
            base.merge(trait_with(id, "base", true), &mut no_tables);
            let shared = Rc::new(base);
            let snapshot = (*shared).clone();

            for v in values {
                let mut builder = ResolvedTraitSetBuilder::new();
                builder.take_reference(Rc::clone(&shared));
                builder.add_trait(trait_with(id, &v, true), &mut no_tables);
                let _ = builder.finish();
            }
            prop_assert_eq!(&*shared, &snapshot);
        }
    }
}
