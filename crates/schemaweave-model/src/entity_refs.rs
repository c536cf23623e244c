//! Entity references: foreign-key style links between entities, discovered
//! from resolved attributes tagged `is.linkedEntity.identifier`.

use std::rc::Rc;

use ahash::AHashMap;
use serde::Serialize;

use crate::arena::ObjectId;
use crate::attributes::ResolvedAttributeSet;
use crate::context::{CacheKey, CacheKind};
use crate::object::{ObjectKind, ParameterValue};
use crate::options::ResolveOptions;
use crate::resolver::Resolver;
use crate::traits::TraitSet;

pub const LINKED_ENTITY_TRAIT: &str = "is.linkedEntity.identifier";
pub const IDENTIFIED_BY_TRAIT: &str = "is.identifiedBy";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntityReference {
    pub referencing_entity: ObjectId,
    /// Resolved name of the foreign-key attribute.
    pub referencing_attribute: String,
    pub referenced_entity: Option<ObjectId>,
    /// Primary-key attribute of the referenced entity.
    pub referenced_attribute: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedEntityReferenceSet {
    references: Vec<ResolvedEntityReference>,
}

impl ResolvedEntityReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedEntityReference> {
        self.references.iter()
    }

    fn push(&mut self, reference: ResolvedEntityReference) {
        if !self.references.contains(&reference) {
            self.references.push(reference);
        }
    }
}

/// One edge of the corpus-wide entity graph, by corpus path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRelationship {
    pub from_entity: String,
    pub from_attribute: String,
    pub to_entity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_attribute: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    outgoing: AHashMap<ObjectId, Vec<EntityRelationship>>,
    incoming: AHashMap<ObjectId, Vec<EntityRelationship>>,
}

impl EntityGraph {
    pub fn clear(&mut self) {
        self.outgoing.clear();
        self.incoming.clear();
    }

    pub fn record(&mut self, from: ObjectId, to: ObjectId, relationship: EntityRelationship) {
        self.incoming.entry(to).or_default().push(relationship.clone());
        self.outgoing.entry(from).or_default().push(relationship);
    }

    pub fn outgoing(&self, entity: ObjectId) -> &[EntityRelationship] {
        self.outgoing.get(&entity).map_or(&[], Vec::as_slice)
    }

    pub fn incoming(&self, entity: ObjectId) -> &[EntityRelationship] {
        self.incoming.get(&entity).map_or(&[], Vec::as_slice)
    }

    /// Every edge, grouped by referencing entity.
    pub fn all(&self) -> impl Iterator<Item = &EntityRelationship> {
        self.outgoing.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.outgoing.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> Resolver<'a> {
    /// The entity's outgoing references, cached per options tag.
    pub fn entity_references(&mut self, entity: ObjectId, opts: &ResolveOptions) -> Rc<ResolvedEntityReferenceSet> {
        let tag = opts.attribute_tag();
        let key = CacheKey::new(entity, opts.wrt_doc, CacheKind::EntityReferences);
        if let Some(hit) = self.ctx.entity_references.get(&key, &tag) {
            return hit;
        }
        let attributes = self.resolved_attributes(entity, opts);
        let mut set = ResolvedEntityReferenceSet::new();
        self.collect_references(entity, &attributes, opts, &mut set);
        let set = Rc::new(set);
        self.ctx.entity_references.insert(key, tag, Rc::clone(&set));
        set
    }

    fn collect_references(
        &mut self,
        entity: ObjectId,
        attributes: &ResolvedAttributeSet,
        opts: &ResolveOptions,
        out: &mut ResolvedEntityReferenceSet,
    ) {
        for ra in attributes.iter() {
            if let Some(nested) = ra.nested() {
                self.collect_references(entity, nested, opts, out);
                continue;
            }
            let Some(linked) = ra.traits.find(LINKED_ENTITY_TRAIT) else {
                continue;
            };
            let Some(value) = linked.parameter_values.value_by_name("entityReferences").cloned() else {
                continue;
            };
            for (target, attribute) in self.reference_targets(&value, opts) {
                let referenced_attribute = match (attribute, target) {
                    (Some(attribute), _) => Some(attribute),
                    (None, Some(target)) => self.primary_key(target, opts),
                    (None, None) => None,
                };
                out.push(ResolvedEntityReference {
                    referencing_entity: entity,
                    referencing_attribute: ra.resolved_name.clone(),
                    referenced_entity: target,
                    referenced_attribute,
                });
            }
        }
    }

    /// Entity (and optional attribute) pairs named by an `entityReferences`
    /// value: one entity reference, or a table of `[entity, attribute]` rows.
    fn reference_targets(
        &mut self,
        value: &ParameterValue,
        opts: &ResolveOptions,
    ) -> Vec<(Option<ObjectId>, Option<String>)> {
        let (rows, from_doc) = match value {
            ParameterValue::Object(id) => {
                let Some(def) = self.resolve_reference(*id, opts.wrt_doc) else {
                    return vec![(None, None)];
                };
                if self.kind_of(def) == Some(ObjectKind::EntityDef) {
                    return vec![(Some(def), None)];
                }
                let from_doc = self.object(def).and_then(|o| o.in_document);
                match self.table_of(value) {
                    Some(table) => (table.rows.clone(), from_doc),
                    None => return Vec::new(),
                }
            }
            ParameterValue::Table(table) => (table.rows.clone(), opts.wrt_doc),
            ParameterValue::Text(name) => {
                let found = self.find_symbol(name, opts.wrt_doc, None);
                return vec![(found, None)];
            }
        };
        rows.into_iter()
            .filter_map(|row| {
                let entity = row.first()?;
                let target = self
                    .find_symbol(entity, from_doc, opts.wrt_doc)
                    .filter(|&id| self.kind_of(id) == Some(ObjectKind::EntityDef));
                Some((target, row.get(1).cloned()))
            })
            .collect()
    }

    /// First attribute carrying `is.identifiedBy`, else the attribute the
    /// entity's own `is.identifiedBy` names.
    pub(crate) fn primary_key(&mut self, entity: ObjectId, opts: &ResolveOptions) -> Option<String> {
        let attributes = self.resolved_attributes(entity, opts);
        if let Some(ra) = attributes
            .iter()
            .find(|ra| ra.traits.find(IDENTIFIED_BY_TRAIT).is_some())
        {
            return Some(ra.resolved_name.clone());
        }
        let traits = self.resolved_traits(entity, TraitSet::All, opts);
        let named = match traits.find(IDENTIFIED_BY_TRAIT)?.parameter_values.value_by_name("attribute")? {
            ParameterValue::Text(text) => text.clone(),
            ParameterValue::Object(id) => self.name_of(*id),
            ParameterValue::Table(_) => return None,
        };
        Some(named.rsplit('/').next().unwrap_or(&named).to_string())
    }

    /// Add the entity's references to the corpus-wide graph.
    pub(crate) fn record_relationships(&mut self, entity: ObjectId, references: &ResolvedEntityReferenceSet) {
        let from_entity = self.path_of(entity);
        for r in references.iter() {
            let Some(target) = r.referenced_entity else {
                continue;
            };
            let relationship = EntityRelationship {
                from_entity: from_entity.clone(),
                from_attribute: r.referencing_attribute.clone(),
                to_entity: self.path_of(target),
                to_attribute: r.referenced_attribute.clone(),
            };
            self.ctx.relationships.record(entity, target, relationship);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;

    fn relationship(from: &str, to: &str) -> EntityRelationship {
        EntityRelationship {
            from_entity: from.into(),
            from_attribute: "fk".into(),
            to_entity: to.into(),
            to_attribute: Some("id".into()),
        }
    }

    #[test]
    fn graph_indexes_both_directions() {
        let mut arena = Arena::new();
        let (a, b) = (arena.insert(()), arena.insert(()));
        let mut graph = EntityGraph::default();
        graph.record(a, b, relationship("/a", "/b"));

        assert_eq!(graph.outgoing(a).len(), 1);
        assert_eq!(graph.incoming(b)[0].from_entity, "/a");
        assert!(graph.outgoing(b).is_empty());
        assert_eq!(graph.len(), 1);

        graph.clear();
        assert!(graph.is_empty());
    }

    #[test]
    fn duplicate_references_collapse() {
        let mut arena = Arena::new();
        let a = arena.insert(());
        let reference = ResolvedEntityReference {
            referencing_entity: a,
            referencing_attribute: "ownerId".into(),
            referenced_entity: None,
            referenced_attribute: None,
        };
        let mut set = ResolvedEntityReferenceSet::new();
        set.push(reference.clone());
        set.push(reference);
        assert_eq!(set.len(), 1);
    }
}
