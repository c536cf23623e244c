//! The resolver and named-reference resolution.
//!
//! A [`Resolver`] borrows the object graph immutably and the resolve context
//! mutably, so resolution can run while the graph stays frozen. Trait,
//! attribute and entity-reference resolution live in their own modules as
//! further `impl Resolver` blocks.
//!
//! Symbol search from a document, in order:
//!
//! 1. the document's own declarations;
//! 2. `moniker/rest` where `moniker` names an import of the document;
//! 3. the flattened un-monikered imports, newest first (memoized per
//!    document once it has more than one transitive import);
//! 4. the point-of-reference document, when it differs;
//! 5. the built-in primitives document.

use std::rc::Rc;

use ahash::AHashSet;

use crate::applier::ApplierRegistry;
use crate::arena::ObjectId;
use crate::attribute_context::AttributeContextTree;
use crate::context::ResolveContext;
use crate::corpus::CorpusGraph;
use crate::document::DocId;
use crate::object::{CdmObject, ConstantTable, ObjectBody, ObjectKind, ParameterValue};
use crate::status::StatusLevel;

/// Marks an attribute reference that only exists after attribute resolution.
pub const RESOLVED_ATTRIBUTES_SEGMENT: &str = "/(resolvedAttributes)/";

pub struct Resolver<'a> {
    pub(crate) graph: &'a CorpusGraph,
    pub(crate) appliers: &'a ApplierRegistry,
    pub(crate) ctx: &'a mut ResolveContext,
    pub(crate) tree: AttributeContextTree,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(
        graph: &'a CorpusGraph,
        appliers: &'a ApplierRegistry,
        ctx: &'a mut ResolveContext,
    ) -> Self {
        Self {
            graph,
            appliers,
            ctx,
            tree: AttributeContextTree::new(),
        }
    }

    pub fn object(&self, id: ObjectId) -> Option<&'a CdmObject> {
        self.graph.objects.get(id)
    }

    pub fn kind_of(&self, id: ObjectId) -> Option<ObjectKind> {
        self.object(id).map(CdmObject::kind)
    }

    /// Definition name, or the named string of a reference.
    pub fn name_of(&self, id: ObjectId) -> String {
        self.object(id)
            .map(CdmObject::display_name)
            .unwrap_or_default()
    }

    pub(crate) fn path_of(&self, id: ObjectId) -> String {
        self.object(id)
            .and_then(|o| o.corpus_path.clone().or_else(|| o.declared_path.clone()))
            .unwrap_or_else(|| self.ctx.cursor.path.clone())
    }

    pub(crate) fn report_object(&mut self, level: StatusLevel, message: &str, id: ObjectId) {
        let path = self.path_of(id);
        self.ctx.report(level, message, Some(&path));
    }

    /// Bind a reference object to its definition.
    ///
    /// Explicit references return their inline definition. Named ones are
    /// looked up from their own document (or moniker document) and memoized.
    /// Failures are reported; unresolved entity references only warn.
    pub fn resolve_reference(&mut self, reference: ObjectId, wrt: Option<DocId>) -> Option<ObjectId> {
        let graph = self.graph;
        let obj = graph.objects.get(reference)?;
        let r = match &obj.body {
            ObjectBody::Reference(r) => r,
            ObjectBody::Definition(_) => return Some(reference),
        };
        if let Some(explicit) = r.explicit {
            return Some(explicit);
        }
        if let Some(&bound) = self.ctx.bindings.get(&reference) {
            return Some(bound);
        }
        let name = r.named.as_deref()?;
        let from_doc = r.moniker_document.or(obj.in_document);

        let found = match self.find_symbol(name, from_doc, None) {
            Some(found) => {
                self.ctx.bindings.insert(reference, found);
                Some(found)
            }
            None => self.find_symbol(name, wrt, None),
        };
        let soft = r.kind == ObjectKind::EntityRef;
        let Some(found) = found else {
            let level = if soft { StatusLevel::Warning } else { StatusLevel::Error };
            let message = format!("unable to resolve the reference '{name}' to a known object");
            self.report_object(level, &message, reference);
            return None;
        };

        let found_kind = self.kind_of(found)?;
        if !r.kind.accepts(found_kind) {
            self.ctx.bindings.remove(&reference);
            let level = if soft { StatusLevel::Warning } else { StatusLevel::Error };
            let message = format!(
                "expected type {} but '{name}' resolves to a {found_kind}",
                r.kind
            );
            self.report_object(level, &message, reference);
            return None;
        }
        Some(found)
    }

    /// Look up a symbol and check its kind. Mismatches are reported.
    pub fn resolve_symbol(
        &mut self,
        name: &str,
        expected: ObjectKind,
        from_doc: Option<DocId>,
    ) -> Option<ObjectId> {
        let found = self.find_symbol(name, from_doc, None)?;
        let found_kind = self.kind_of(found)?;
        let expected = expected.reference_kind();
        if expected.accepts(found_kind) {
            return Some(found);
        }
        let level = if expected == ObjectKind::EntityRef {
            StatusLevel::Warning
        } else {
            StatusLevel::Error
        };
        let message = format!("expected type {expected} but '{name}' resolves to a {found_kind}");
        self.ctx.report(level, &message, None);
        None
    }

    /// Raw symbol lookup without kind checks or reporting.
    pub fn find_symbol(
        &mut self,
        name: &str,
        from_doc: Option<DocId>,
        wrt: Option<DocId>,
    ) -> Option<ObjectId> {
        if name.starts_with('/') {
            return self.graph.resolve_absolute(name);
        }
        if let Some(doc) = from_doc {
            if let Some(found) = self.lookup(doc, name) {
                return Some(found);
            }
        }
        if let Some(doc) = wrt.filter(|w| Some(*w) != from_doc) {
            if let Some(found) = self.lookup(doc, name) {
                return Some(found);
            }
        }
        let builtins = self.graph.builtins?;
        self.graph.documents.get(builtins.index())?.declaration(name)
    }

    fn lookup(&mut self, doc: DocId, name: &str) -> Option<ObjectId> {
        let graph = self.graph;
        let document = graph.documents.get(doc.index())?;
        if let Some(found) = document.declaration(name) {
            return Some(found);
        }
        if let Some(found) = self.lookup_monikered(doc, name) {
            return Some(found);
        }

        let memoize = document.flat_imports().len() > 1;
        if memoize {
            let hit = self
                .ctx
                .external_declarations
                .get(&doc)
                .and_then(|names| names.get(name))
                .copied();
            if let Some(hit) = hit {
                return hit;
            }
        }

        let mut visited: AHashSet<DocId> = AHashSet::new();
        visited.insert(doc);
        let mut found = None;
        for &imported in document.flat_imports().iter().rev() {
            if !visited.insert(imported) {
                continue;
            }
            let Some(imported_doc) = graph.documents.get(imported.index()) else {
                continue;
            };
            found = imported_doc
                .declaration(name)
                .or_else(|| self.lookup_monikered(imported, name));
            if found.is_some() {
                break;
            }
        }

        if memoize {
            self.ctx
                .external_declarations
                .entry(doc)
                .or_default()
                .insert(name.to_string(), found);
        }
        found
    }

    /// `moniker/rest`: search `rest` in the document imported as `moniker`.
    fn lookup_monikered(&mut self, doc: DocId, name: &str) -> Option<ObjectId> {
        let (prefix, rest) = name.split_once('/')?;
        let target = self.graph.documents.get(doc.index())?.moniker(prefix)?;
        self.lookup(target, rest)
    }

    /// The rows of a constant entity, if `value` denotes one.
    pub(crate) fn table_of(&mut self, value: &ParameterValue) -> Option<Rc<ConstantTable>> {
        let id = match value {
            ParameterValue::Table(table) => return Some(Rc::clone(table)),
            ParameterValue::Text(_) => return None,
            ParameterValue::Object(id) => *id,
        };
        let graph = self.graph;
        let def_id = match graph.objects.get(id)?.body {
            ObjectBody::Reference(ref r) if r.kind == ObjectKind::EntityRef => {
                self.resolve_reference(id, None)?
            }
            ObjectBody::Reference(_) => return None,
            ObjectBody::Definition(_) => id,
        };
        let constant = graph.objects.get(def_id)?.as_definition()?.as_constant_entity()?;
        let shape = match constant.shape {
            Some(shape_ref) => self.resolve_reference(shape_ref, None)?,
            None => return None,
        };
        Some(Rc::new(ConstantTable {
            shape,
            rows: constant.values.clone(),
        }))
    }

    /// Names of a data type and its bases, nearest first.
    pub(crate) fn data_type_lineage(&mut self, data_type: ObjectId) -> Vec<String> {
        let graph = self.graph;
        let mut names = Vec::new();
        let mut seen = AHashSet::new();
        let mut next = self.resolve_reference(data_type, None);
        while let Some(id) = next {
            if !seen.insert(id) {
                break;
            }
            let Some(def) = graph.objects.get(id).and_then(CdmObject::as_definition) else {
                break;
            };
            let Some(dt) = def.as_data_type() else {
                break;
            };
            names.push(dt.name.clone());
            next = dt.extends.and_then(|ext| self.resolve_reference(ext, None));
        }
        names
    }

    /// Take the attribute context tree built so far.
    pub(crate) fn take_tree(&mut self) -> AttributeContextTree {
        std::mem::take(&mut self.tree)
    }
}
