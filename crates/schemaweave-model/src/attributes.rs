//! Resolved attributes, resolved attribute sets and their builder.

use std::rc::Rc;

use ahash::AHashMap;

use crate::arena::ObjectId;
use crate::attribute_context::ContextNodeId;
use crate::parameter::TableLookup;
use crate::traits::{ResolvedTraitSet, ResolvedTraitSetBuilder};

/// What a resolved attribute stands for.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeTarget {
    /// A declared (or applier-supplied) attribute definition.
    Attribute(ObjectId),
    /// A structured group of attributes.
    Set(Rc<ResolvedAttributeSet>),
}

/// Scratch data appliers thread through generation rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplierState {
    /// Flagged for the removal pass.
    pub flex_remove: bool,
    /// Produced by an applier rather than declared.
    pub added: bool,
    pub supporting_added: bool,
    pub foreign_key_added: bool,
    /// Next ordinal an array expansion will emit from this template.
    pub next_ordinal: Option<u32>,
    /// Ordinal of an expanded array copy.
    pub array_ordinal: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAttribute {
    pub resolved_name: String,
    pub traits: Rc<ResolvedTraitSet>,
    pub target: AttributeTarget,
    pub context: Option<ContextNodeId>,
    pub insert_order: u32,
    pub applier_state: Option<ApplierState>,
}

impl ResolvedAttribute {
    pub fn new(name: impl Into<String>, target: AttributeTarget) -> Self {
        Self {
            resolved_name: name.into(),
            traits: Rc::default(),
            target,
            context: None,
            insert_order: 0,
            applier_state: None,
        }
    }

    pub fn with_traits(mut self, traits: Rc<ResolvedTraitSet>) -> Self {
        self.traits = traits;
        self
    }

    pub fn source_attribute(&self) -> Option<ObjectId> {
        match &self.target {
            AttributeTarget::Attribute(id) => Some(*id),
            AttributeTarget::Set(_) => None,
        }
    }

    pub fn nested(&self) -> Option<&Rc<ResolvedAttributeSet>> {
        match &self.target {
            AttributeTarget::Set(set) => Some(set),
            AttributeTarget::Attribute(_) => None,
        }
    }

    pub fn state(&self) -> ApplierState {
        self.applier_state.unwrap_or_default()
    }

    pub fn state_mut(&mut self) -> &mut ApplierState {
        self.applier_state.get_or_insert_with(ApplierState::default)
    }

    pub fn should_delete(&self) -> bool {
        self.state().flex_remove
    }

    /// Merge `traits` into this attribute's set, copying it first if shared.
    pub fn merge_traits(&mut self, traits: &Rc<ResolvedTraitSet>, table_of: &mut TableLookup<'_>) {
        if Rc::ptr_eq(&self.traits, traits) {
            return;
        }
        let mut builder = ResolvedTraitSetBuilder::new();
        builder.take_reference(Rc::clone(&self.traits));
        builder.merge_set(traits, false, table_of);
        self.traits = builder.finish();
    }
}

/// Attributes deduplicated by resolved name, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ResolvedAttributeSet {
    set: Vec<ResolvedAttribute>,
    by_name: AHashMap<String, usize>,
    by_source: AHashMap<ObjectId, usize>,
    inherited: usize,
}

impl PartialEq for ResolvedAttributeSet {
    fn eq(&self, other: &Self) -> bool {
        self.set == other.set
    }
}

impl ResolvedAttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedAttribute> {
        self.set.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ResolvedAttribute> {
        self.set.iter_mut()
    }

    pub fn at(&self, index: usize) -> Option<&ResolvedAttribute> {
        self.set.get(index)
    }

    pub(crate) fn at_mut(&mut self, index: usize) -> Option<&mut ResolvedAttribute> {
        self.set.get_mut(index)
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedAttribute> {
        self.by_name.get(name).map(|&i| &self.set[i])
    }

    pub fn get_by_source(&self, source: ObjectId) -> Option<&ResolvedAttribute> {
        self.by_source.get(&source).map(|&i| &self.set[i])
    }

    pub fn names(&self) -> Vec<&str> {
        self.set.iter().map(|ra| ra.resolved_name.as_str()).collect()
    }

    /// Number of leading attributes that came from an extended entity.
    pub fn inherited_count(&self) -> usize {
        self.inherited.min(self.set.len())
    }

    pub fn is_inherited(&self, name: &str) -> bool {
        self.by_name.get(name).map_or(false, |&i| i < self.inherited_count())
    }

    /// Add `ra`, or fold it into the attribute already holding its name:
    /// traits merge, target and provenance are replaced. Returns the index.
    pub fn merge(&mut self, ra: ResolvedAttribute, table_of: &mut TableLookup<'_>) -> usize {
        if let Some(&index) = self.by_name.get(&ra.resolved_name) {
            let existing = &mut self.set[index];
            existing.merge_traits(&ra.traits, table_of);
            existing.target = ra.target;
            if ra.context.is_some() {
                existing.context = ra.context;
            }
            if let Some(source) = existing.source_attribute() {
                self.by_source.insert(source, index);
            }
            return index;
        }
        let index = self.set.len();
        self.by_name.insert(ra.resolved_name.clone(), index);
        if let Some(source) = ra.source_attribute() {
            self.by_source.entry(source).or_insert(index);
        }
        self.set.push(ra);
        index
    }

    /// Rebuild the indexes after renames, folding name collisions into the
    /// first holder of the name.
    pub(crate) fn reindex(&mut self, table_of: &mut TableLookup<'_>) {
        let attributes = std::mem::take(&mut self.set);
        self.by_name.clear();
        self.by_source.clear();
        for ra in attributes {
            self.merge(ra, table_of);
        }
    }

    /// Remove flagged attributes. Returns the original indexes removed.
    pub(crate) fn remove_flagged(&mut self) -> Vec<usize> {
        let removed: Vec<usize> = self
            .set
            .iter()
            .enumerate()
            .filter(|(_, ra)| ra.should_delete())
            .map(|(i, _)| i)
            .collect();
        if removed.is_empty() {
            return removed;
        }
        self.set.retain(|ra| !ra.should_delete());
        self.by_name = self
            .set
            .iter()
            .enumerate()
            .map(|(i, ra)| (ra.resolved_name.clone(), i))
            .collect();
        self.by_source.clear();
        for (i, ra) in self.set.iter().enumerate() {
            if let Some(source) = ra.source_attribute() {
                self.by_source.entry(source).or_insert(i);
            }
        }
        removed
    }
}

/// Wraps one shared attribute set; copies it on first write.
///
/// `inherited_mark` counts the leading attributes that came from a base;
/// it is only set for entities and is carried into the finished set.
#[derive(Debug, Clone, Default)]
pub struct ResolvedAttributeSetBuilder {
    ras: Option<Rc<ResolvedAttributeSet>>,
    inherited_mark: Option<usize>,
}

impl ResolvedAttributeSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_reference(&mut self, ras: Rc<ResolvedAttributeSet>) {
        self.ras = Some(ras);
    }

    pub fn current(&self) -> Option<&Rc<ResolvedAttributeSet>> {
        self.ras.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.ras.as_ref().map_or(true, |ras| ras.is_empty())
    }

    pub fn len(&self) -> usize {
        self.ras.as_ref().map_or(0, |ras| ras.len())
    }

    pub(crate) fn make_mut(&mut self) -> &mut ResolvedAttributeSet {
        Rc::make_mut(self.ras.get_or_insert_with(Default::default))
    }

    /// Merge another set in; an empty builder just shares it.
    pub fn merge_attributes(&mut self, other: &Rc<ResolvedAttributeSet>, table_of: &mut TableLookup<'_>) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            self.ras = Some(Rc::clone(other));
            return;
        }
        let ras = self.make_mut();
        for ra in other.iter() {
            ras.merge(ra.clone(), table_of);
        }
    }

    pub fn own_one(&mut self, ra: ResolvedAttribute, table_of: &mut TableLookup<'_>) -> usize {
        self.make_mut().merge(ra, table_of)
    }

    pub fn mark_inherited(&mut self) {
        self.inherited_mark = Some(self.len());
    }

    pub fn mark_order(&mut self) {
        if self.is_empty() {
            return;
        }
        for (i, ra) in self.make_mut().iter_mut().enumerate() {
            ra.insert_order = i as u32;
        }
    }

    /// Strip attributes flagged for deletion, keeping the inherited mark
    /// pointing past the surviving inherited attributes.
    pub fn remove_requested_atts(&mut self) {
        let flagged = self
            .ras
            .as_ref()
            .map_or(false, |ras| ras.iter().any(ResolvedAttribute::should_delete));
        if !flagged {
            return;
        }
        let removed = self.make_mut().remove_flagged();
        if let Some(mark) = self.inherited_mark {
            let below = removed.iter().filter(|&&i| i < mark).count();
            self.inherited_mark = Some(mark - below);
        }
    }

    pub fn finish(mut self) -> Rc<ResolvedAttributeSet> {
        if let Some(mark) = self.inherited_mark {
            if self.ras.as_ref().map_or(mark != 0, |ras| ras.inherited != mark) {
                self.make_mut().inherited = mark;
            }
        }
        self.ras.unwrap_or_default()
    }
}
