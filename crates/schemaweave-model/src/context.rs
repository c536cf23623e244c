//! Per-corpus mutable resolution state.
//!
//! Caches are keyed by (object, point-of-reference document, kind) and each
//! entry remembers the directive tag it was built with; a lookup only hits
//! when the caller's tag matches. Nothing here is thread-safe: a corpus is
//! resolved from one thread.

use std::rc::Rc;

use ahash::{AHashMap, AHashSet};

use crate::arena::ObjectId;
use crate::attributes::ResolvedAttributeSet;
use crate::document::DocId;
use crate::entity_refs::{EntityGraph, ResolvedEntityReferenceSet};
use crate::status::{StatusLevel, StatusReporter};
use crate::traits::{ResolvedTraitSet, TraitSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum CacheKind {
    Traits(TraitSet),
    Attributes,
    EntityReferences,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    object: ObjectId,
    wrt_doc: Option<DocId>,
    kind: CacheKind,
}

impl CacheKey {
    pub(crate) fn new(object: ObjectId, wrt_doc: Option<DocId>, kind: CacheKind) -> Self {
        Self {
            object,
            wrt_doc,
            kind,
        }
    }
}

#[derive(Debug)]
pub(crate) struct ResolutionCache<T> {
    entries: AHashMap<CacheKey, (String, T)>,
}

impl<T> Default for ResolutionCache<T> {
    fn default() -> Self {
        Self {
            entries: AHashMap::new(),
        }
    }
}

impl<T: Clone> ResolutionCache<T> {
    pub(crate) fn get(&self, key: &CacheKey, tag: &str) -> Option<T> {
        self.entries
            .get(key)
            .filter(|(cached_tag, _)| cached_tag == tag)
            .map(|(_, value)| value.clone())
    }

    pub(crate) fn insert(&mut self, key: CacheKey, tag: String, value: T) {
        self.entries.insert(key, (tag, value));
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Where the current operation is, for error reporting.
#[derive(Debug, Clone, Default)]
pub(crate) struct Cursor {
    pub(crate) document: Option<DocId>,
    pub(crate) path: String,
}

#[derive(Debug, Default)]
pub struct ResolveContext {
    pub status: StatusReporter,
    pub(crate) cursor: Cursor,
    pub(crate) traits: ResolutionCache<Rc<ResolvedTraitSet>>,
    pub(crate) attributes: ResolutionCache<Rc<ResolvedAttributeSet>>,
    pub(crate) entity_references: ResolutionCache<Rc<ResolvedEntityReferenceSet>>,
    /// Named reference -> bound definition.
    pub(crate) bindings: AHashMap<ObjectId, ObjectId>,
    /// Per document: symbol -> result of the import scan.
    pub(crate) external_declarations: AHashMap<DocId, AHashMap<String, Option<ObjectId>>>,
    pub(crate) traits_in_progress: AHashSet<ObjectId>,
    pub(crate) attributes_in_progress: AHashSet<ObjectId>,
    pub(crate) relationships: EntityGraph,
}

impl ResolveContext {
    pub(crate) fn new(status: StatusReporter) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub(crate) fn set_cursor(&mut self, document: Option<DocId>, path: impl Into<String>) {
        self.cursor.document = document;
        self.cursor.path = path.into();
    }

    /// Report against an explicit path, falling back to the cursor.
    pub(crate) fn report(&mut self, level: StatusLevel, message: &str, path: Option<&str>) {
        let path = match path {
            Some(p) => p.to_string(),
            None => self.cursor.path.clone(),
        };
        self.status.report(level, message, &path);
    }

    /// Drop everything derived from object content.
    pub(crate) fn clear_caches(&mut self) {
        self.traits.clear();
        self.attributes.clear();
        self.entity_references.clear();
        self.external_declarations.clear();
    }

    pub(crate) fn clear_transient(&mut self) {
        self.traits.clear();
        self.traits_in_progress.clear();
        self.attributes_in_progress.clear();
    }

    pub fn cached_trait_sets(&self) -> usize {
        self.traits.len()
    }

    pub fn cached_attribute_sets(&self) -> usize {
        self.attributes.len()
    }
}
