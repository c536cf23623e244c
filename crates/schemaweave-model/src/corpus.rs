//! The corpus: arena, documents, folders, the path index and the resolve
//! context, plus the mutation API the persistence layer builds on.
//!
//! Mutations that can change resolved traits clear the resolution caches.

use std::rc::Rc;

use ahash::AHashMap;

use crate::applier::{ApplierRegistry, AttributeApplier};
use crate::arena::{Arena, ObjectId};
use crate::attributes::ResolvedAttributeSet;
use crate::builtins;
use crate::config::CorpusConfig;
use crate::construct::ResolvedEntity;
use crate::context::ResolveContext;
use crate::document::{make_absolute, DocId, Document, Folder, FolderId, Import};
use crate::entity_refs::{EntityGraph, EntityRelationship, ResolvedEntityReferenceSet};
use crate::error::{ModelError, ModelResult};
use crate::object::{
    Argument, CdmObject, Definition, ObjectBody, ObjectKind, ObjectReference,
};
use crate::options::ResolveOptions;
use crate::resolver::Resolver;
use crate::status::{StatusCallback, StatusReporter};
use crate::traits::{ResolvedTraitSet, TraitSet};

/// The object graph proper. Frozen while a [`Resolver`] runs.
#[derive(Debug, Default)]
pub struct CorpusGraph {
    pub(crate) objects: Arena<CdmObject>,
    pub(crate) documents: Vec<Document>,
    pub(crate) folders: Vec<Folder>,
    /// Absolute document path -> document.
    pub(crate) path_index: AHashMap<String, DocId>,
    pub(crate) builtins: Option<DocId>,
}

impl CorpusGraph {
    pub fn objects(&self) -> &Arena<CdmObject> {
        &self.objects
    }

    pub fn document(&self, doc: DocId) -> Option<&Document> {
        self.documents.get(doc.index())
    }

    pub fn documents(&self) -> impl Iterator<Item = (DocId, &Document)> {
        self.documents
            .iter()
            .enumerate()
            .map(|(i, d)| (DocId(i as u32), d))
    }

    pub fn document_by_path(&self, path: &str) -> Option<DocId> {
        self.path_index.get(path).copied()
    }

    /// `/folder/doc.cdm.json/Some/Path`: the longest document-path prefix
    /// wins, the remainder is looked up in that document's declarations.
    pub(crate) fn resolve_absolute(&self, path: &str) -> Option<ObjectId> {
        let mut cuts: Vec<usize> = path.match_indices('/').map(|(i, _)| i).collect();
        cuts.reverse();
        for cut in cuts {
            let (doc_path, rest) = (&path[..cut], &path[cut + 1..]);
            if let Some(&doc) = self.path_index.get(doc_path) {
                return self.documents.get(doc.index())?.declaration(rest);
            }
        }
        None
    }
}

#[derive(Debug)]
pub struct Corpus {
    pub(crate) graph: CorpusGraph,
    pub(crate) ctx: ResolveContext,
    pub(crate) appliers: ApplierRegistry,
    config: CorpusConfig,
}

impl Default for Corpus {
    fn default() -> Self {
        Self::new(CorpusConfig::default())
    }
}

impl Corpus {
    /// An empty corpus holding the root folder and the built-in primitives
    /// document.
    pub fn new(config: CorpusConfig) -> Self {
        let status = StatusReporter::new(config.report_threshold, config.error_threshold);
        let root = Folder {
            name: String::new(),
            parent: None,
            corpus_path: "/".to_string(),
            children: Vec::new(),
            documents: Vec::new(),
        };
        let mut corpus = Self {
            graph: CorpusGraph {
                folders: vec![root],
                ..CorpusGraph::default()
            },
            ctx: ResolveContext::new(status),
            appliers: ApplierRegistry::with_primitives(),
            config,
        };
        builtins::install(&mut corpus);
        corpus
    }

    pub fn config(&self) -> &CorpusConfig {
        &self.config
    }

    pub fn graph(&self) -> &CorpusGraph {
        &self.graph
    }

    pub fn status(&self) -> &StatusReporter {
        &self.ctx.status
    }

    pub fn status_mut(&mut self) -> &mut StatusReporter {
        &mut self.ctx.status
    }

    pub fn set_status_callback(&mut self, callback: StatusCallback) {
        self.ctx.status.set_callback(callback);
    }

    pub fn context(&self) -> &ResolveContext {
        &self.ctx
    }

    /// Register an extra applier. Trait definitions resolved earlier may
    /// have missed it, so caches are dropped.
    pub fn register_applier(&mut self, applier: Rc<dyn AttributeApplier>) {
        self.appliers.register(applier);
        self.ctx.clear_caches();
    }

    // ------------------------------------------------------------------
    // Folders and documents
    // ------------------------------------------------------------------

    pub fn root_folder(&self) -> FolderId {
        FolderId(0)
    }

    pub fn folder(&self, folder: FolderId) -> Option<&Folder> {
        self.graph.folders.get(folder.index())
    }

    /// The child folder `name`, created if missing.
    pub fn add_folder(&mut self, parent: FolderId, name: &str) -> ModelResult<FolderId> {
        let parent_folder = self
            .graph
            .folders
            .get(parent.index())
            .ok_or_else(|| ModelError::InvalidCorpusPath(name.to_string()))?;
        if name.is_empty() || name.contains('/') {
            return Err(ModelError::InvalidCorpusPath(name.to_string()));
        }
        let existing = parent_folder
            .children
            .iter()
            .copied()
            .find(|c| self.graph.folders.get(c.index()).map_or(false, |f| f.name == name));
        if let Some(existing) = existing {
            return Ok(existing);
        }
        let corpus_path = format!("{}{name}/", parent_folder.corpus_path);
        let id = FolderId(self.graph.folders.len() as u32);
        self.graph.folders.push(Folder {
            name: name.to_string(),
            parent: Some(parent),
            corpus_path,
            children: Vec::new(),
            documents: Vec::new(),
        });
        self.graph.folders[parent.index()].children.push(id);
        Ok(id)
    }

    /// The folder at an absolute folder path, creating every missing level.
    pub fn folder_for_path(&mut self, path: &str) -> ModelResult<FolderId> {
        if !path.starts_with('/') {
            return Err(ModelError::InvalidCorpusPath(path.to_string()));
        }
        let mut folder = self.root_folder();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            folder = self.add_folder(folder, segment)?;
        }
        Ok(folder)
    }

    pub fn add_document(&mut self, folder: FolderId, name: &str) -> ModelResult<DocId> {
        let folder_path = self
            .folder(folder)
            .map(|f| f.corpus_path.clone())
            .ok_or_else(|| ModelError::InvalidCorpusPath(name.to_string()))?;
        if name.is_empty() || name.contains('/') {
            return Err(ModelError::InvalidCorpusPath(name.to_string()));
        }
        let corpus_path = format!("{folder_path}{name}");
        if self.graph.path_index.contains_key(&corpus_path) {
            return Err(ModelError::DuplicateDocument(corpus_path));
        }
        let id = DocId(self.graph.documents.len() as u32);
        self.graph
            .documents
            .push(Document::new(name, Some(folder), corpus_path.clone()));
        self.graph.path_index.insert(corpus_path, id);
        self.graph.folders[folder.index()].documents.push(id);
        tracing::debug!(document = %id, "document added");
        Ok(id)
    }

    /// Add a document at an absolute path, creating its folders.
    pub fn add_document_at(&mut self, path: &str) -> ModelResult<DocId> {
        let (folder_path, name) = path
            .rsplit_once('/')
            .ok_or_else(|| ModelError::InvalidCorpusPath(path.to_string()))?;
        let folder = self.folder_for_path(&format!("{folder_path}/"))?;
        self.add_document(folder, name)
    }

    pub fn document(&self, doc: DocId) -> Option<&Document> {
        self.graph.document(doc)
    }

    pub fn document_mut(&mut self, doc: DocId) -> Option<&mut Document> {
        self.graph.documents.get_mut(doc.index())
    }

    pub fn document_by_path(&self, path: &str) -> Option<DocId> {
        self.graph.document_by_path(path)
    }

    pub fn documents(&self) -> impl Iterator<Item = (DocId, &Document)> {
        self.graph.documents()
    }

    pub fn builtins_document(&self) -> Option<DocId> {
        self.graph.builtins
    }

    pub fn add_import(&mut self, doc: DocId, corpus_path: &str, moniker: Option<&str>) -> ModelResult<()> {
        let document = self
            .document_mut(doc)
            .ok_or_else(|| ModelError::UnknownDocument(doc.to_string()))?;
        document.imports.push(Import {
            corpus_path: corpus_path.to_string(),
            moniker: moniker.map(str::to_string),
            document: None,
        });
        document.needs_indexing = true;
        Ok(())
    }

    /// Absolute paths of imports not present in the corpus, deduplicated in
    /// discovery order.
    pub fn missing_imports(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for document in &self.graph.documents {
            let folder_path = self.folder_path_of(document);
            for import in &document.imports {
                let absolute = make_absolute(&import.corpus_path, &folder_path);
                if !self.graph.path_index.contains_key(&absolute) && !out.contains(&absolute) {
                    out.push(absolute);
                }
            }
        }
        out
    }

    pub(crate) fn folder_path_of(&self, document: &Document) -> String {
        document
            .folder
            .and_then(|f| self.folder(f))
            .map_or_else(|| "/".to_string(), |f| f.corpus_path.clone())
    }

    // ------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------

    /// Allocate an object owned by `doc` without listing it as a top-level
    /// definition.
    pub fn alloc(&mut self, doc: Option<DocId>, body: ObjectBody) -> ObjectId {
        self.graph.objects.insert(CdmObject::new(body, doc))
    }

    /// Allocate a top-level definition of `doc`.
    pub fn add_definition(&mut self, doc: DocId, definition: Definition) -> ModelResult<ObjectId> {
        if self.document(doc).is_none() {
            return Err(ModelError::UnknownDocument(doc.to_string()));
        }
        let id = self.alloc(Some(doc), ObjectBody::Definition(definition));
        if let Some(document) = self.document_mut(doc) {
            document.definitions.push(id);
            document.needs_indexing = true;
        }
        Ok(id)
    }

    pub fn define(&mut self, doc: DocId, definition: Definition) -> ObjectId {
        self.alloc(Some(doc), ObjectBody::Definition(definition))
    }

    pub fn make_ref(&mut self, doc: DocId, kind: ObjectKind, name: &str) -> ObjectId {
        self.alloc(
            Some(doc),
            ObjectBody::Reference(ObjectReference::named(kind, name, true)),
        )
    }

    pub fn make_explicit_ref(&mut self, doc: DocId, kind: ObjectKind, definition: ObjectId) -> ObjectId {
        self.alloc(
            Some(doc),
            ObjectBody::Reference(ObjectReference::explicit(kind, definition)),
        )
    }

    pub fn make_trait_ref(&mut self, doc: DocId, name: &str, arguments: Vec<Argument>) -> ObjectId {
        let mut reference = ObjectReference::named(ObjectKind::TraitRef, name, arguments.is_empty());
        reference.arguments = arguments;
        self.alloc(Some(doc), ObjectBody::Reference(reference))
    }

    pub fn object(&self, id: ObjectId) -> Option<&CdmObject> {
        self.graph.objects.get(id)
    }

    pub(crate) fn object_mut(&mut self, id: ObjectId) -> Option<&mut CdmObject> {
        self.graph.objects.get_mut(id)
    }

    /// Object at an absolute corpus path.
    pub fn fetch_object(&self, path: &str) -> Option<ObjectId> {
        self.graph.resolve_absolute(path)
    }

    /// Append a trait reference to a definition's exhibited traits.
    pub fn add_exhibited_trait(&mut self, object: ObjectId, trait_ref: ObjectId) -> ModelResult<()> {
        let obj = self.object_mut(object).ok_or(ModelError::UnknownObject(object))?;
        let (kind, name) = (obj.kind(), obj.display_name());
        match &mut obj.body {
            ObjectBody::Definition(def) => def.exhibits_traits.push(trait_ref),
            ObjectBody::Reference(_) => {
                return Err(ModelError::KindMismatch {
                    name,
                    expected: ObjectKind::EntityDef,
                    found: kind,
                })
            }
        }
        self.ctx.clear_caches();
        Ok(())
    }

    /// Append a trait reference to a reference's applied traits.
    pub fn add_applied_trait(&mut self, reference: ObjectId, trait_ref: ObjectId) -> ModelResult<()> {
        let obj = self.object_mut(reference).ok_or(ModelError::UnknownObject(reference))?;
        let (kind, name) = (obj.kind(), obj.display_name());
        match &mut obj.body {
            ObjectBody::Reference(r) => r.applied_traits.push(trait_ref),
            ObjectBody::Definition(_) => {
                return Err(ModelError::KindMismatch {
                    name,
                    expected: kind.reference_kind(),
                    found: kind,
                })
            }
        }
        self.ctx.clear_caches();
        Ok(())
    }

    /// Drop a document's content: free its objects, its declarations and
    /// every cache that could mention them. The document stays in the
    /// corpus, marked for re-indexing.
    pub fn refresh_document(&mut self, doc: DocId) -> ModelResult<()> {
        let definitions = self
            .document(doc)
            .map(|d| d.definitions.clone())
            .ok_or_else(|| ModelError::UnknownDocument(doc.to_string()))?;

        let mut stack = definitions;
        let mut freed = 0usize;
        while let Some(id) = stack.pop() {
            if let Some(obj) = self.graph.objects.remove(id) {
                stack.extend(obj.children());
                freed += 1;
            }
        }
        if let Some(document) = self.document_mut(doc) {
            document.definitions.clear();
            document.clear_caches();
        }
        let objects = &self.graph.objects;
        self.ctx
            .bindings
            .retain(|reference, bound| objects.contains(*reference) && objects.contains(*bound));
        self.ctx.clear_caches();
        self.ctx.relationships.clear();
        tracing::debug!(document = %doc, freed, "document refreshed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    pub fn resolver(&mut self) -> Resolver<'_> {
        Resolver::new(&self.graph, &self.appliers, &mut self.ctx)
    }

    /// Options for a request made from `doc`, using the configured
    /// directives and depth.
    pub fn default_options(&self, doc: Option<DocId>) -> ResolveOptions {
        ResolveOptions::new(doc, self.config.directives()).with_max_depth(self.config.max_relationship_depth)
    }

    pub fn resolve_reference(&mut self, reference: ObjectId, wrt: Option<DocId>) -> Option<ObjectId> {
        self.resolver().resolve_reference(reference, wrt)
    }

    pub fn resolve_symbol(&mut self, name: &str, expected: ObjectKind, from_doc: Option<DocId>) -> Option<ObjectId> {
        self.resolver().resolve_symbol(name, expected, from_doc)
    }

    pub fn resolved_traits(&mut self, object: ObjectId, which: TraitSet, opts: &ResolveOptions) -> Rc<ResolvedTraitSet> {
        self.resolver().resolved_traits(object, which, opts)
    }

    pub fn resolved_attributes(&mut self, object: ObjectId, opts: &ResolveOptions) -> Rc<ResolvedAttributeSet> {
        self.resolver().resolved_attributes(object, opts)
    }

    pub fn resolve_entity(&mut self, entity: ObjectId, opts: &ResolveOptions) -> Option<ResolvedEntity> {
        self.resolver().resolve_entity(entity, opts)
    }

    pub fn entity_references(&mut self, entity: ObjectId, opts: &ResolveOptions) -> Rc<ResolvedEntityReferenceSet> {
        self.resolver().entity_references(entity, opts)
    }

    pub fn relationships(&self) -> &EntityGraph {
        &self.ctx.relationships
    }

    pub fn outgoing_relationships(&self, entity: ObjectId) -> &[EntityRelationship] {
        self.ctx.relationships.outgoing(entity)
    }

    pub fn incoming_relationships(&self, entity: ObjectId) -> &[EntityRelationship] {
        self.ctx.relationships.incoming(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{DataTypeDef, DefinitionVariant};

    #[test]
    fn documents_are_indexed_by_absolute_path() {
        let mut corpus = Corpus::default();
        let doc = corpus.add_document_at("/core/base.cdm.json").unwrap();
        assert_eq!(corpus.document_by_path("/core/base.cdm.json"), Some(doc));
        assert_eq!(
            corpus.add_document_at("/core/base.cdm.json"),
            Err(ModelError::DuplicateDocument("/core/base.cdm.json".into()))
        );
        let folder = corpus.folder_for_path("/core/").unwrap();
        assert_eq!(corpus.folder(folder).unwrap().documents, vec![doc]);
    }

    #[test]
    fn refresh_frees_objects_and_bumps_generation() {
        let mut corpus = Corpus::default();
        let doc = corpus.add_document_at("/a.cdm.json").unwrap();
        let dt = corpus
            .add_definition(
                doc,
                Definition::new(DefinitionVariant::DataType(DataTypeDef {
                    name: "money".into(),
                    extends: None,
                })),
            )
            .unwrap();
        corpus.refresh_document(doc).unwrap();

        assert!(corpus.object(dt).is_none());
        assert!(corpus.document(doc).unwrap().definitions.is_empty());
        assert!(corpus.document(doc).unwrap().needs_indexing());
        let reused = corpus.define(doc, Definition::new(DefinitionVariant::DataType(DataTypeDef::default())));
        assert_ne!(reused, dt);
    }
}
