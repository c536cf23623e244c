//! Attribute resolution: per-kind construction rules and the applier
//! pipeline.
//!
//! Each attribute-bearing object contributes a [`ResolvedAttributeSetBuilder`].
//! Traits that transform attributes then run in three passes over it:
//! in-place edits, the priority-banded add loop, and removal.
//!
//! Results are cached per options tag when no provenance is being recorded.
//! A full entity resolution ([`Resolver::resolve_entity`]) always constructs
//! fresh so every attribute gets a context node in the same tree.

use std::rc::Rc;

use crate::applier::primitives::{REFERENCE_ONLY, STRUCTURED};
use crate::applier::{ApplierServices, ApplyScope, AttributeApplier, AttributeSeed};
use crate::arena::ObjectId;
use crate::attribute_context::{AttributeContextTree, AttributeContextType, ContextNodeId};
use crate::attributes::{
    AttributeTarget, ResolvedAttribute, ResolvedAttributeSet, ResolvedAttributeSetBuilder,
};
use crate::context::{CacheKey, CacheKind};
use crate::entity_refs::ResolvedEntityReferenceSet;
use crate::object::{DefinitionVariant, ObjectBody, ObjectKind, ParameterValue};
use crate::options::ResolveOptions;
use crate::resolver::Resolver;
use crate::status::StatusLevel;
use crate::traits::{ResolvedTrait, ResolvedTraitSet, TraitSet};

/// A fully resolved entity.
#[derive(Debug, Clone)]
pub struct ResolvedEntity {
    pub entity: ObjectId,
    pub name: String,
    pub traits: Rc<ResolvedTraitSet>,
    pub attributes: Rc<ResolvedAttributeSet>,
    pub context: AttributeContextTree,
    pub context_root: ContextNodeId,
    pub entity_references: Rc<ResolvedEntityReferenceSet>,
    /// Name of the identifying attribute, when the entity declares one.
    pub primary_key: Option<String>,
}

impl ResolvedEntity {
    /// Attribute names in emission order.
    pub fn attribute_names(&self) -> Vec<String> {
        self.context.leaves_in_order(self.context_root)
    }
}

type ApplierPair = (Rc<dyn AttributeApplier>, ResolvedTrait);

impl<'a> Resolver<'a> {
    /// Resolved attributes of an attribute-bearing object.
    pub fn resolved_attributes(&mut self, object: ObjectId, opts: &ResolveOptions) -> Rc<ResolvedAttributeSet> {
        self.attributes_for(object, opts, None)
    }

    /// Resolve an entity's attributes, traits, provenance tree and entity
    /// references together.
    pub fn resolve_entity(&mut self, entity: ObjectId, opts: &ResolveOptions) -> Option<ResolvedEntity> {
        let graph = self.graph;
        let def = graph.objects.get(entity)?.as_definition()?;
        let name = def.as_entity()?.name.clone();

        let outer = self.take_tree();
        let root = self.tree.create(
            AttributeContextType::Entity,
            name.as_str(),
            None,
            Some(entity),
            def.exhibits_traits.clone(),
        );
        let attributes = self.attributes_for(entity, opts, Some(root));
        let mut context = std::mem::replace(&mut self.tree, outer);
        context.finalize(root, &attributes);

        let traits = self.resolved_traits(entity, TraitSet::All, opts);
        let entity_references = self.entity_references(entity, opts);
        let primary_key = self.primary_key(entity, opts);
        Some(ResolvedEntity {
            entity,
            name,
            traits,
            attributes,
            context,
            context_root: root,
            entity_references,
            primary_key,
        })
    }

    pub(crate) fn attributes_for(
        &mut self,
        object: ObjectId,
        opts: &ResolveOptions,
        under: Option<ContextNodeId>,
    ) -> Rc<ResolvedAttributeSet> {
        let cacheable = under.is_none();
        let tag = opts.attribute_tag();
        let key = CacheKey::new(object, opts.wrt_doc, CacheKind::Attributes);
        if cacheable {
            if let Some(hit) = self.ctx.attributes.get(&key, &tag) {
                return hit;
            }
        }
        if !self.ctx.attributes_in_progress.insert(object) {
            tracing::debug!(object = %object, "attribute resolution cycle, returning empty set");
            return Rc::default();
        }
        let ras = self.construct_resolved_attributes(object, opts, under).finish();
        self.ctx.attributes_in_progress.remove(&object);
        if cacheable {
            self.ctx.attributes.insert(key, tag, Rc::clone(&ras));
        }
        ras
    }

    pub(crate) fn construct_resolved_attributes(
        &mut self,
        object: ObjectId,
        opts: &ResolveOptions,
        under: Option<ContextNodeId>,
    ) -> ResolvedAttributeSetBuilder {
        let graph = self.graph;
        let Some(obj) = graph.objects.get(object) else {
            return ResolvedAttributeSetBuilder::new();
        };
        let def = match &obj.body {
            ObjectBody::Reference(r) => {
                return self.reference_attributes(object, r.kind, !r.applied_traits.is_empty(), opts, under)
            }
            ObjectBody::Definition(def) => def,
        };

        match &def.variant {
            DefinitionVariant::TypeAttribute(att) => self.type_attribute(object, &att.name, opts, under),
            DefinitionVariant::EntityAttribute(att) => self.entity_attribute(
                object,
                &att.name,
                att.entity,
                &def.exhibits_traits,
                opts,
                under,
            ),
            DefinitionVariant::AttributeGroup(group) => {
                let node = self.context_node(
                    under,
                    AttributeContextType::AttributeGroup,
                    &group.name,
                    Some(object),
                    Vec::new(),
                );
                let mut builder = ResolvedAttributeSetBuilder::new();
                for &member in &group.members {
                    let inner = self.attributes_for(member, opts, node);
                    builder.merge_attributes(&inner, &mut |v| self.table_of(v));
                }
                builder.remove_requested_atts();
                builder
            }
            DefinitionVariant::Entity(entity) => {
                let mut builder = ResolvedAttributeSetBuilder::new();
                if let Some(base_ref) = entity.extends {
                    let extends_node = self.context_node(
                        under,
                        AttributeContextType::EntityReferenceExtends,
                        "extends",
                        None,
                        Vec::new(),
                    );
                    let base = self.resolve_reference(base_ref, opts.wrt_doc);
                    let applied = self.applied_trait_refs(base_ref);
                    let base_name = self.name_of(base_ref);
                    let base_node = self.context_node(
                        extends_node,
                        AttributeContextType::Entity,
                        &base_name,
                        base,
                        applied,
                    );
                    let inherited = self.attributes_for(base_ref, opts, base_node);
                    builder.merge_attributes(&inherited, &mut |v| self.table_of(v));
                }
                builder.mark_inherited();
                for &member in &entity.attributes {
                    let own = self.attributes_for(member, opts, under);
                    builder.merge_attributes(&own, &mut |v| self.table_of(v));
                }
                builder.remove_requested_atts();
                builder.mark_order();
                builder
            }
            _ => ResolvedAttributeSetBuilder::new(),
        }
    }

    fn type_attribute(
        &mut self,
        object: ObjectId,
        name: &str,
        opts: &ResolveOptions,
        under: Option<ContextNodeId>,
    ) -> ResolvedAttributeSetBuilder {
        let node = self.context_node(
            under,
            AttributeContextType::AttributeDefinition,
            name,
            Some(object),
            Vec::new(),
        );
        let traits = self.resolved_traits(object, TraitSet::All, opts);
        let mut ra = ResolvedAttribute::new(name, AttributeTarget::Attribute(object))
            .with_traits(Rc::clone(&traits));
        ra.context = node;

        let mut builder = ResolvedAttributeSetBuilder::new();
        builder.own_one(ra, &mut |v| self.table_of(v));
        let opts = self.alter_directives(&traits, opts);
        self.apply_traits(&mut builder, &traits, &opts, ApplyScope::default(), node);
        builder
    }

    /// Inline the target entity, or stand in a single placeholder when the
    /// relationship is reference-only, legacy or past the depth limit.
    fn entity_attribute(
        &mut self,
        object: ObjectId,
        name: &str,
        target: Option<ObjectId>,
        exhibits: &[ObjectId],
        opts: &ResolveOptions,
        under: Option<ContextNodeId>,
    ) -> ResolvedAttributeSetBuilder {
        let traits = self.resolved_traits(object, TraitSet::All, opts);
        let mut inner_opts = self.alter_directives(&traits, opts);

        let max_depth = traits
            .find("does.setMaxDepth")
            .and_then(|rt| rt.parameter_values.text_by_name("maxDepth"))
            .and_then(|t| t.trim().parse::<u32>().ok())
            .map_or(opts.max_depth, |m| m.max(opts.max_depth));
        let by_reference = inner_opts.directives.has(REFERENCE_ONLY)
            || traits.find("is.legacyReference").is_some()
            || opts.relationship_depth >= max_depth;
        if by_reference {
            inner_opts.directives.add(REFERENCE_ONLY);
        }

        let attribute_node = self.context_node(
            under,
            AttributeContextType::EntityReferenceAsAttribute,
            name,
            Some(object),
            exhibits.to_vec(),
        );
        let entity_def = target.and_then(|t| self.resolve_reference(t, opts.wrt_doc));
        let entity_node = match target {
            Some(t) => {
                let entity_name = self.name_of(t);
                let applied = self.applied_trait_refs(t);
                self.context_node(
                    attribute_node,
                    AttributeContextType::Entity,
                    &entity_name,
                    entity_def,
                    applied,
                )
            }
            None => None,
        };

        let mut builder = ResolvedAttributeSetBuilder::new();
        match target {
            Some(entity) if !by_reference => {
                let mut nested = inner_opts.clone();
                nested.relationship_depth += 1;
                nested.max_depth = max_depth;
                let inner = self.attributes_for(entity, &nested, entity_node);
                if inner_opts.directives.has(STRUCTURED) {
                    let mut group = ResolvedAttribute::new(name, AttributeTarget::Set(inner));
                    group.context = attribute_node;
                    builder.own_one(group, &mut |v| self.table_of(v));
                } else {
                    builder.merge_attributes(&inner, &mut |v| self.table_of(v));
                }
            }
            _ => {
                let mut placeholder = ResolvedAttribute::new(name, AttributeTarget::Attribute(object))
                    .with_traits(Rc::clone(&traits));
                placeholder.context = entity_node.or(attribute_node);
                builder.own_one(placeholder, &mut |v| self.table_of(v));
            }
        }

        let scope = ApplyScope {
            owner_name: Some(name),
            target_entity: target,
        };
        self.apply_traits(&mut builder, &traits, &inner_opts, scope, attribute_node);
        builder
    }

    /// References contribute the definition's set with their own applied
    /// traits layered on top. Structured group references nest.
    fn reference_attributes(
        &mut self,
        object: ObjectId,
        kind: ObjectKind,
        has_applied: bool,
        opts: &ResolveOptions,
        under: Option<ContextNodeId>,
    ) -> ResolvedAttributeSetBuilder {
        let mut builder = ResolvedAttributeSetBuilder::new();
        let Some(def) = self.resolve_reference(object, opts.wrt_doc) else {
            return builder;
        };
        let inner = self.attributes_for(def, opts, under);
        if kind == ObjectKind::AttributeGroupRef && opts.directives.has(STRUCTURED) {
            let name = self.name_of(def);
            builder.own_one(
                ResolvedAttribute::new(name, AttributeTarget::Set(inner)),
                &mut |v| self.table_of(v),
            );
        } else {
            builder.merge_attributes(&inner, &mut |v| self.table_of(v));
        }
        if has_applied {
            let applied = self.resolved_traits(object, TraitSet::AppliedOnly, opts);
            let opts = self.alter_directives(&applied, opts);
            self.apply_traits(&mut builder, &applied, &opts, ApplyScope::default(), under);
        }
        builder
    }

    fn applied_trait_refs(&self, reference: ObjectId) -> Vec<ObjectId> {
        self.object(reference)
            .and_then(|o| o.as_reference())
            .map(|r| r.applied_traits.clone())
            .unwrap_or_default()
    }

    fn context_node(
        &mut self,
        under: Option<ContextNodeId>,
        context_type: AttributeContextType,
        name: &str,
        definition: Option<ObjectId>,
        exhibits: Vec<ObjectId>,
    ) -> Option<ContextNodeId> {
        let parent = under?;
        Some(self.tree.create(context_type, name, Some(parent), definition, exhibits))
    }

    /// Options with every directive-altering applier of `traits` applied.
    pub(crate) fn alter_directives(&self, traits: &ResolvedTraitSet, opts: &ResolveOptions) -> ResolveOptions {
        let mut out = opts.clone();
        if !traits.modifies_attributes() {
            return out;
        }
        for (applier, rt) in self.appliers.for_traits(traits) {
            if applier.will_alter_directives(&rt, &out) {
                applier.alter_directives(&rt, &mut out);
            }
        }
        out
    }

    /// Merge `traits` into every attribute, then run the transforming
    /// appliers: edits, additions, removals.
    fn apply_traits(
        &mut self,
        builder: &mut ResolvedAttributeSetBuilder,
        traits: &Rc<ResolvedTraitSet>,
        opts: &ResolveOptions,
        scope: ApplyScope<'_>,
        under: Option<ContextNodeId>,
    ) {
        if builder.is_empty() || traits.is_empty() {
            return;
        }
        {
            let ras = builder.make_mut();
            for ra in ras.iter_mut() {
                ra.merge_traits(traits, &mut |v| self.table_of(v));
            }
        }
        if !traits.modifies_attributes() {
            return;
        }

        let pairs = self.appliers.for_traits(traits);
        let mut renamed = false;
        {
            let ras = builder.make_mut();
            for ra in ras.iter_mut() {
                for (applier, rt) in &pairs {
                    if applier.will_apply(rt, ra, opts, &scope) {
                        applier.apply(rt, ra, opts, &scope);
                        renamed = true;
                    }
                }
            }
            if renamed {
                ras.reindex(&mut |v| self.table_of(v));
            }
        }

        self.generate_applier_attributes(builder, &pairs, opts, scope, under);
        self.mark_removals(builder, opts);
    }

    /// The add loop. Within a pass, appliers run in priority order; an
    /// attribute added at priority `p` is offered only to appliers above `p`.
    /// Sources that asked to continue are offered to the same applier again
    /// next pass, until a pass produces no continuation.
    fn generate_applier_attributes(
        &mut self,
        builder: &mut ResolvedAttributeSetBuilder,
        pairs: &[ApplierPair],
        opts: &ResolveOptions,
        scope: ApplyScope<'_>,
        under: Option<ContextNodeId>,
    ) {
        if pairs.is_empty() || builder.is_empty() {
            return;
        }
        // (attribute index, priority band it was produced in)
        let mut candidates: Vec<(usize, Option<i32>)> = (0..builder.len()).map(|i| (i, None)).collect();
        let mut pending: Vec<(usize, usize)> = Vec::new();
        let mut round = 0u32;

        loop {
            let mut next_pending = Vec::new();
            for (j, (applier, rt)) in pairs.iter().enumerate() {
                let priority = applier.priority();
                let mut offers: Vec<usize> = pending
                    .iter()
                    .filter(|(_, pj)| *pj == j)
                    .map(|(i, _)| *i)
                    .collect();
                offers.extend(
                    candidates
                        .iter()
                        .filter(|(_, band)| band.map_or(true, |b| b < priority))
                        .map(|(i, _)| *i),
                );

                for source in offers {
                    let Some(source_ra) = builder.current().and_then(|ras| ras.at(source)) else {
                        continue;
                    };
                    if !applier.will_add(rt, source_ra, opts) {
                        continue;
                    }
                    let mut source_ra = source_ra.clone();
                    let addition = applier.add(self, rt, &mut source_ra, opts, &scope);
                    if let Some(slot) = builder.make_mut().at_mut(source) {
                        slot.applier_state = source_ra.applier_state;
                    }
                    let Some(addition) = addition else {
                        continue;
                    };

                    let mut attribute = addition.attribute;
                    if let Some(context_type) = addition.context {
                        let node = self.context_node(
                            under,
                            context_type,
                            &attribute.resolved_name,
                            attribute.source_attribute(),
                            Vec::new(),
                        );
                        if node.is_some() {
                            attribute.context = node;
                        }
                    }
                    let before = builder.len();
                    let index = builder.own_one(attribute, &mut |v| self.table_of(v));
                    if index == before {
                        candidates.push((index, Some(priority)));
                    }
                    if addition.continue_applying {
                        next_pending.push((source, j));
                    }
                }
            }
            if next_pending.is_empty() {
                break;
            }
            round += 1;
            tracing::trace!(round, continuations = next_pending.len(), "applier generation round");
            pending = next_pending;
            candidates.clear();
        }
    }

    /// Flag and strip attributes an applier of their own traits vetoes.
    fn mark_removals(&mut self, builder: &mut ResolvedAttributeSetBuilder, opts: &ResolveOptions) {
        let appliers = self.appliers;
        let flagged: Vec<usize> = match builder.current() {
            Some(ras) => ras
                .iter()
                .enumerate()
                .filter(|(_, ra)| {
                    ra.traits.modifies_attributes()
                        && appliers
                            .for_traits(&ra.traits)
                            .iter()
                            .any(|(applier, rt)| applier.will_remove(rt, ra, opts))
                })
                .map(|(i, _)| i)
                .collect(),
            None => return,
        };
        if flagged.is_empty() {
            return;
        }
        let ras = builder.make_mut();
        for i in flagged {
            if let Some(ra) = ras.at_mut(i) {
                ra.state_mut().flex_remove = true;
            }
        }
        builder.remove_requested_atts();
    }
}

impl ApplierServices for Resolver<'_> {
    fn attribute_seed(&mut self, value: &ParameterValue, opts: &ResolveOptions) -> Option<AttributeSeed> {
        let id = value.as_object()?;
        let source = self.resolve_reference(id, opts.wrt_doc)?;
        if !self.kind_of(source)?.is_attribute() {
            let message = format!("'{}' is not an attribute definition", self.name_of(source));
            self.report_object(StatusLevel::Error, &message, id);
            return None;
        }
        let name = self.object(source)?.as_definition()?.name()?.to_string();
        let traits = self.resolved_traits(id, TraitSet::All, opts);
        Some(AttributeSeed { name, source, traits })
    }

    fn trait_named(&mut self, name: &str, opts: &ResolveOptions) -> Option<ResolvedTrait> {
        let from = self.ctx.cursor.document;
        let id = self.find_symbol(name, from, opts.wrt_doc)?;
        if self.kind_of(id)? != ObjectKind::TraitDef {
            return None;
        }
        self.resolved_traits(id, TraitSet::All, opts).iter().next().cloned()
    }

    fn report(&mut self, level: StatusLevel, message: &str) {
        self.ctx.report(level, message, None);
    }
}
