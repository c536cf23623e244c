//! The validation pipeline.
//!
//! ```text
//! start -> imports -> integrity -> declarations -> references -> parameters
//!       -> traits -> attributes -> entityReferences -> finished
//! ```
//!
//! Every stage visits every document, each document in pre-order over its
//! definitions. A stage that leaves the error counter above zero ends the
//! run in `error`. `finished` always drops transient traversal state.

use std::fmt;
use std::str::FromStr;

use ahash::{AHashMap, AHashSet};
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::arena::ObjectId;
use crate::builtins::OBJECT_FAMILIES;
use crate::corpus::Corpus;
use crate::document::{make_absolute, DocId};
use crate::object::{
    DefinitionVariant, ObjectBody, ObjectKind, ObjectReference, Parameter, ParameterValue,
};
use crate::options::ResolveOptions;
use crate::resolver::{Resolver, RESOLVED_ATTRIBUTES_SEGMENT};
use crate::status::StatusLevel;
use crate::traits::TraitSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationStep {
    Start,
    Imports,
    Integrity,
    Declarations,
    References,
    Parameters,
    Traits,
    Attributes,
    EntityReferences,
    Finished,
    Error,
}

impl ValidationStep {
    pub fn next(self) -> Self {
        match self {
            ValidationStep::Start => ValidationStep::Imports,
            ValidationStep::Imports => ValidationStep::Integrity,
            ValidationStep::Integrity => ValidationStep::Declarations,
            ValidationStep::Declarations => ValidationStep::References,
            ValidationStep::References => ValidationStep::Parameters,
            ValidationStep::Parameters => ValidationStep::Traits,
            ValidationStep::Traits => ValidationStep::Attributes,
            ValidationStep::Attributes => ValidationStep::EntityReferences,
            ValidationStep::EntityReferences | ValidationStep::Finished => ValidationStep::Finished,
            ValidationStep::Error => ValidationStep::Error,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ValidationStep::Start => "start",
            ValidationStep::Imports => "imports",
            ValidationStep::Integrity => "integrity",
            ValidationStep::Declarations => "declarations",
            ValidationStep::References => "references",
            ValidationStep::Parameters => "parameters",
            ValidationStep::Traits => "traits",
            ValidationStep::Attributes => "attributes",
            ValidationStep::EntityReferences => "entityReferences",
            ValidationStep::Finished => "finished",
            ValidationStep::Error => "error",
        }
    }
}

impl fmt::Display for ValidationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ValidationStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut step = ValidationStep::Start;
        loop {
            if step.label().eq_ignore_ascii_case(s) {
                return Ok(step);
            }
            if step == ValidationStep::Finished {
                return Err(format!("unknown validation step `{s}`"));
            }
            step = step.next();
        }
    }
}

/// Fetches and builds documents named by unresolved imports.
#[async_trait(?Send)]
pub trait ImportLoader {
    /// Raw text of the document at an absolute corpus path.
    async fn fetch(&self, corpus_path: &str) -> anyhow::Result<String>;

    /// Add the fetched document to the corpus at `corpus_path`.
    fn materialize(&self, corpus: &mut Corpus, corpus_path: &str, text: &str) -> anyhow::Result<DocId>;
}

/// One object reached by the pre-order document walk.
#[derive(Debug, Clone)]
struct Visit {
    id: ObjectId,
    /// Path relative to the document.
    path: String,
    /// Named definitions register their path as a declaration.
    declare: bool,
    /// Nearest enclosing definition.
    owner: Option<ObjectId>,
}

#[derive(Debug, Clone, Copy)]
enum ValueSlot {
    Argument { reference: ObjectId, index: usize },
    Default { definition: ObjectId, index: usize },
}

/// A string value to be replaced by a reference of `kind`.
#[derive(Debug, Clone)]
struct Replacement {
    slot: ValueSlot,
    kind: ObjectKind,
    name: String,
    bound: Option<ObjectId>,
}

impl Corpus {
    /// Run the pipeline, loading missing imports through `loader` first.
    pub async fn validate(
        &mut self,
        loader: Option<&dyn ImportLoader>,
        stop_after: ValidationStep,
    ) -> anyhow::Result<ValidationStep> {
        if let Some(loader) = loader {
            self.resolve_imports(loader).await?;
        }
        Ok(self.resolve_loaded(stop_after))
    }

    /// Fetch missing imports round by round until a round finds nothing new.
    /// A failed fetch is a warning; a fetched document that cannot be built
    /// is an error. Returns the number of documents added.
    pub async fn resolve_imports(&mut self, loader: &dyn ImportLoader) -> anyhow::Result<usize> {
        let mut attempted: AHashSet<String> = AHashSet::new();
        let mut loaded = 0;
        let mut round = 0u32;
        loop {
            let missing: Vec<String> = self
                .missing_imports()
                .into_iter()
                .filter(|path| !attempted.contains(path))
                .collect();
            if missing.is_empty() {
                break;
            }
            round += 1;
            tracing::debug!(round, missing = missing.len(), "import round");
            for path in missing {
                attempted.insert(path.clone());
                match loader.fetch(&path).await {
                    Ok(text) => {
                        loader
                            .materialize(self, &path, &text)
                            .with_context(|| format!("failed to build imported document {path}"))?;
                        loaded += 1;
                    }
                    Err(err) => {
                        let message = format!("unable to load import '{path}': {err:#}");
                        self.ctx.report(StatusLevel::Warning, &message, Some(&path));
                    }
                }
            }
        }
        Ok(loaded)
    }

    /// Run the pipeline over the documents already in the corpus.
    pub fn resolve_loaded(&mut self, stop_after: ValidationStep) -> ValidationStep {
        self.ctx.status.reset_error_count();
        let mut step = ValidationStep::Start;
        if stop_after == ValidationStep::Start {
            return self.finish();
        }
        loop {
            step = step.next();
            if step == ValidationStep::Finished {
                return self.finish();
            }
            let span = tracing::info_span!("stage", stage = step.label());
            let _entered = span.enter();
            self.run_stage(step);

            let errors = self.ctx.status.error_count();
            if errors > 0 {
                tracing::warn!(errors, "stage reported errors");
                return ValidationStep::Error;
            }
            if step == stop_after {
                return self.finish();
            }
        }
    }

    fn finish(&mut self) -> ValidationStep {
        self.ctx.clear_transient();
        self.ctx.report(StatusLevel::Progress, "validation finished", Some("/"));
        ValidationStep::Finished
    }

    fn all_documents(&self) -> Vec<DocId> {
        self.documents().map(|(id, _)| id).collect()
    }

    fn pipeline_options(&self, doc: DocId) -> ResolveOptions {
        self.default_options(Some(doc))
    }

    fn run_stage(&mut self, step: ValidationStep) {
        match step {
            ValidationStep::Imports => self.stage_imports(),
            ValidationStep::EntityReferences => {
                self.ctx.relationships.clear();
                for doc in self.all_documents() {
                    self.stage_entity_references(doc);
                }
            }
            _ => {
                for doc in self.all_documents() {
                    tracing::debug!(document = %doc, "visiting document");
                    match step {
                        ValidationStep::Integrity => self.stage_integrity(doc),
                        ValidationStep::Declarations => self.index_document(doc),
                        ValidationStep::References => self.stage_references(doc),
                        ValidationStep::Parameters => self.stage_parameters(doc),
                        ValidationStep::Traits => self.stage_traits(doc),
                        ValidationStep::Attributes => self.stage_attributes(doc),
                        _ => {}
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // imports
    // ------------------------------------------------------------------

    fn stage_imports(&mut self) {
        for doc in self.all_documents() {
            let Some(document) = self.document(doc) else {
                continue;
            };
            let folder_path = self.folder_path_of(document);
            let doc_path = document.corpus_path.clone();
            let targets: Vec<(String, Option<DocId>)> = document
                .imports
                .iter()
                .map(|import| {
                    let absolute = make_absolute(&import.corpus_path, &folder_path);
                    let target = self.document_by_path(&absolute);
                    (absolute, target)
                })
                .collect();

            for (absolute, target) in &targets {
                if target.is_none() {
                    let message = format!("unable to resolve the import '{absolute}'");
                    self.ctx.report(StatusLevel::Warning, &message, Some(&doc_path));
                }
            }
            if let Some(document) = self.document_mut(doc) {
                for (import, (_, target)) in document.imports.iter_mut().zip(targets) {
                    import.document = target;
                }
            }
        }

        for doc in self.all_documents() {
            let (monikers, flat) = self.flatten_imports(doc);
            if let Some(document) = self.document_mut(doc) {
                document.monikers = monikers;
                document.flat_imports = flat;
            }
        }
        self.ctx.external_declarations.clear();
    }

    /// Moniker table plus the transitive un-monikered imports, stored with
    /// the most recently imported document last.
    fn flatten_imports(&self, doc: DocId) -> (AHashMap<String, DocId>, Vec<DocId>) {
        let mut monikers = AHashMap::new();
        if let Some(document) = self.document(doc) {
            for import in &document.imports {
                if let (Some(moniker), Some(target)) = (&import.moniker, import.document) {
                    monikers.insert(moniker.clone(), target);
                }
            }
        }

        let mut priority = Vec::new();
        let mut visited = AHashSet::new();
        visited.insert(doc);
        let mut stack = vec![doc];
        // Depth-first, newest import first, each document once.
        while let Some(current) = stack.pop() {
            let Some(document) = self.document(current) else {
                continue;
            };
            let mut children = Vec::new();
            for import in document.imports.iter().rev() {
                if import.moniker.is_some() {
                    continue;
                }
                if let Some(target) = import.document {
                    if visited.insert(target) {
                        priority.push(target);
                        children.push(target);
                    }
                }
            }
            stack.extend(children.into_iter().rev());
        }
        priority.reverse();
        (monikers, priority)
    }

    // ------------------------------------------------------------------
    // walk
    // ------------------------------------------------------------------

    fn walk_document(&self, doc: DocId) -> Vec<Visit> {
        let mut out = Vec::new();
        let Some(document) = self.document(doc) else {
            return out;
        };
        for &id in &document.definitions {
            let name = self.object(id).map(|o| o.display_name()).unwrap_or_default();
            self.walk(id, name, true, None, &mut out);
        }
        out
    }

    fn walk_member(&self, id: ObjectId, prefix: &str, owner: Option<ObjectId>, out: &mut Vec<Visit>) {
        let Some(obj) = self.object(id) else {
            return;
        };
        let name = match &obj.body {
            ObjectBody::Reference(ObjectReference {
                explicit: Some(def), ..
            }) => self.object(*def).map(|d| d.display_name()).unwrap_or_default(),
            _ => obj.display_name(),
        };
        let declare = obj.as_definition().is_some();
        self.walk(id, format!("{prefix}/{name}"), declare, owner, out);
    }

    fn walk(&self, id: ObjectId, path: String, declare: bool, owner: Option<ObjectId>, out: &mut Vec<Visit>) {
        let Some(obj) = self.object(id) else {
            return;
        };
        out.push(Visit {
            id,
            path: path.clone(),
            declare,
            owner,
        });

        match &obj.body {
            ObjectBody::Definition(def) => {
                let me = Some(id);
                let child = |child: Option<ObjectId>, segment: &str, out: &mut Vec<Visit>| {
                    if let Some(c) = child {
                        self.walk(c, format!("{path}/{segment}"), false, me, out);
                    }
                };
                match &def.variant {
                    DefinitionVariant::Trait(t) => {
                        child(t.extends, "extendsTrait", out);
                        for p in &t.parameters {
                            child(p.data_type, &format!("hasParameters/{}/dataType", p.name), out);
                            if let Some(ParameterValue::Object(value)) = &p.default_value {
                                child(Some(*value), &format!("hasParameters/{}/default", p.name), out);
                            }
                        }
                    }
                    DefinitionVariant::DataType(d) => child(d.extends, "extendsDataType", out),
                    DefinitionVariant::Relationship(r) => child(r.extends, "extendsRelationship", out),
                    DefinitionVariant::Entity(e) => {
                        child(e.extends, "extendsEntity", out);
                        for &a in &e.attributes {
                            self.walk_member(a, &format!("{path}/hasAttributes"), me, out);
                        }
                        child(e.attribute_context, "attributeContext", out);
                    }
                    DefinitionVariant::AttributeGroup(g) => {
                        for &m in &g.members {
                            self.walk_member(m, &format!("{path}/members"), me, out);
                        }
                    }
                    DefinitionVariant::ConstantEntity(c) => child(c.shape, "entityShape", out),
                    DefinitionVariant::TypeAttribute(a) => {
                        child(a.relationship, "relationship", out);
                        child(a.data_type, "dataType", out);
                    }
                    DefinitionVariant::EntityAttribute(a) => {
                        child(a.relationship, "relationship", out);
                        child(a.entity, "entity", out);
                    }
                    DefinitionVariant::AttributeContext(c) => {
                        child(c.parent, "parent", out);
                        child(c.definition, "definition", out);
                        for &content in &c.contents {
                            self.walk_member(content, &format!("{path}/contents"), me, out);
                        }
                    }
                }
                for (i, &t) in def.exhibits_traits.iter().enumerate() {
                    child(Some(t), &format!("exhibitsTraits/{i}"), out);
                }
            }
            ObjectBody::Reference(r) => {
                if let Some(def) = r.explicit {
                    let name = self.object(def).map(|d| d.display_name()).unwrap_or_default();
                    self.walk(def, format!("{path}/{name}"), true, owner, out);
                }
                for (i, &t) in r.applied_traits.iter().enumerate() {
                    self.walk(t, format!("{path}/appliedTraits/{i}"), false, owner, out);
                }
                for (i, arg) in r.arguments.iter().enumerate() {
                    if let ParameterValue::Object(value) = &arg.value {
                        self.walk(*value, format!("{path}/arguments/{i}"), false, owner, out);
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // integrity and declarations
    // ------------------------------------------------------------------

    fn stage_integrity(&mut self, doc: DocId) {
        let doc_path = self.document(doc).map(|d| d.corpus_path.clone()).unwrap_or_default();
        for visit in self.walk_document(doc) {
            let Some(obj) = self.object(visit.id) else {
                continue;
            };
            let missing = match &obj.body {
                ObjectBody::Definition(def) => match &def.variant {
                    DefinitionVariant::ConstantEntity(_) => None,
                    DefinitionVariant::EntityAttribute(a) if a.entity.is_none() => Some("an entity"),
                    _ if def.name().map_or(true, str::is_empty) => Some("a name"),
                    _ => None,
                },
                ObjectBody::Reference(r) => {
                    let named = r.named.as_deref().map_or(false, |n| !n.is_empty());
                    (!named && r.explicit.is_none()).then_some("a target")
                }
            };
            if let Some(what) = missing {
                let message = format!("integrity check failed: {} is missing {what}", obj.kind());
                let path = format!("{doc_path}/{}", visit.path);
                self.ctx.report(StatusLevel::Error, &message, Some(&path));
            }
        }
    }

    /// Assign paths to every object of `doc` and rebuild its declaration
    /// table. Two objects declaring the same path is an error.
    pub fn index_document(&mut self, doc: DocId) {
        let Some(doc_path) = self.document(doc).map(|d| d.corpus_path.clone()) else {
            return;
        };
        let mut declarations: AHashMap<String, ObjectId> = AHashMap::new();
        for visit in self.walk_document(doc) {
            if let Some(obj) = self.object_mut(visit.id) {
                obj.declared_path = Some(visit.path.clone());
                obj.corpus_path = Some(format!("{doc_path}/{}", visit.path));
            }
            if !visit.declare {
                continue;
            }
            if declarations.contains_key(&visit.path) {
                let message = format!("duplicate declaration for item '{}'", visit.path);
                let path = format!("{doc_path}/{}", visit.path);
                self.ctx.report(StatusLevel::Error, &message, Some(&path));
                continue;
            }
            declarations.insert(visit.path, visit.id);
        }
        if let Some(document) = self.document_mut(doc) {
            document.declarations = declarations;
            document.needs_indexing = false;
        }
        self.ctx.external_declarations.clear();
    }

    // ------------------------------------------------------------------
    // references and parameters
    // ------------------------------------------------------------------

    fn stage_references(&mut self, doc: DocId) {
        let visits = self.walk_document(doc);
        let opts = self.pipeline_options(doc);
        let mut replacements = Vec::new();
        {
            let graph = &self.graph;
            let mut resolver = Resolver::new(graph, &self.appliers, &mut self.ctx);
            for visit in &visits {
                let Some(obj) = graph.objects.get(visit.id) else {
                    continue;
                };
                resolver.ctx.set_cursor(Some(doc), visit.path.clone());
                match &obj.body {
                    ObjectBody::Reference(r) => {
                        let promised = r
                            .named
                            .as_deref()
                            .map_or(false, |n| n.contains(RESOLVED_ATTRIBUTES_SEGMENT));
                        if r.explicit.is_none() && !promised {
                            resolver.resolve_reference(visit.id, Some(doc));
                        }
                    }
                    ObjectBody::Definition(def) => {
                        let Some(t) = def.as_trait() else {
                            continue;
                        };
                        for (index, p) in t.parameters.iter().enumerate() {
                            let Some(value) = &p.default_value else {
                                continue;
                            };
                            let slot = ValueSlot::Default {
                                definition: visit.id,
                                index,
                            };
                            replacements.extend(const_type_check(
                                &mut resolver, doc, &t.name, &t.name, p, value, slot, &opts,
                            ));
                        }
                    }
                }
            }
        }
        self.apply_replacements(doc, replacements);
    }

    fn stage_parameters(&mut self, doc: DocId) {
        let visits = self.walk_document(doc);
        let opts = self.pipeline_options(doc);
        let mut replacements = Vec::new();
        {
            let graph = &self.graph;
            let mut resolver = Resolver::new(graph, &self.appliers, &mut self.ctx);
            for visit in &visits {
                let Some(reference) = graph.objects.get(visit.id).and_then(|o| o.as_reference()) else {
                    continue;
                };
                if reference.kind != ObjectKind::TraitRef || reference.arguments.is_empty() {
                    continue;
                }
                resolver.ctx.set_cursor(Some(doc), visit.path.clone());
                let Some(def) = resolver.resolve_reference(visit.id, Some(doc)) else {
                    continue;
                };
                let Some(rt) = resolver.resolved_traits(def, TraitSet::All, &opts).iter().next().cloned() else {
                    continue;
                };
                let owner = visit.owner.map(|o| resolver.name_of(o)).unwrap_or_default();
                let params = rt.parameter_values.parameters();
                for (ordinal, arg) in reference.arguments.iter().enumerate() {
                    match params.resolve_parameter(ordinal, arg.name.as_deref()) {
                        Ok(index) => {
                            let Some(p) = params.get(index) else {
                                continue;
                            };
                            let slot = ValueSlot::Argument {
                                reference: visit.id,
                                index: ordinal,
                            };
                            replacements.extend(const_type_check(
                                &mut resolver,
                                doc,
                                &owner,
                                &rt.trait_name,
                                p,
                                &arg.value,
                                slot,
                                &opts,
                            ));
                        }
                        Err(err) => {
                            let message = format!("trait '{}' on '{owner}': {err}", rt.trait_name);
                            resolver.report_object(StatusLevel::Error, &message, visit.id);
                        }
                    }
                }
            }
        }
        self.apply_replacements(doc, replacements);
    }

    fn apply_replacements(&mut self, doc: DocId, replacements: Vec<Replacement>) {
        if replacements.is_empty() {
            return;
        }
        for r in replacements {
            let new_ref = self.alloc(
                Some(doc),
                ObjectBody::Reference(ObjectReference::named(r.kind, r.name.as_str(), true)),
            );
            if let Some(bound) = r.bound {
                self.ctx.bindings.insert(new_ref, bound);
            }
            let value = ParameterValue::Object(new_ref);
            match r.slot {
                ValueSlot::Argument { reference, index } => {
                    if let Some(ObjectBody::Reference(reference)) =
                        self.object_mut(reference).map(|o| &mut o.body)
                    {
                        if let Some(arg) = reference.arguments.get_mut(index) {
                            arg.value = value;
                        }
                    }
                }
                ValueSlot::Default { definition, index } => {
                    if let Some(ObjectBody::Definition(def)) = self.object_mut(definition).map(|o| &mut o.body) {
                        if let DefinitionVariant::Trait(t) = &mut def.variant {
                            if let Some(p) = t.parameters.get_mut(index) {
                                p.default_value = Some(value);
                            }
                        }
                    }
                }
            }
        }
        self.ctx.clear_caches();
    }

    // ------------------------------------------------------------------
    // traits, attributes, entity references
    // ------------------------------------------------------------------

    fn stage_traits(&mut self, doc: DocId) {
        let visits = self.walk_document(doc);
        let opts = self.pipeline_options(doc);
        let graph = &self.graph;
        let mut resolver = Resolver::new(graph, &self.appliers, &mut self.ctx);
        for visit in &visits {
            let Some(obj) = graph.objects.get(visit.id) else {
                continue;
            };
            // Promises are bound in the attributes stage.
            if obj
                .as_reference()
                .and_then(|r| r.named.as_deref())
                .map_or(false, |n| n.contains(RESOLVED_ATTRIBUTES_SEGMENT))
            {
                continue;
            }
            resolver.ctx.set_cursor(Some(doc), visit.path.clone());
            let traits = resolver.resolved_traits(visit.id, TraitSet::All, &opts);
            let is_trait_ref = obj.kind() == ObjectKind::TraitRef;
            if !is_trait_ref {
                continue;
            }
            for rt in traits.iter() {
                for (p, value, _) in rt.parameter_values.iter() {
                    if p.required && value.is_none() {
                        let owner = visit.owner.map(|o| resolver.name_of(o)).unwrap_or_default();
                        let message = format!(
                            "no argument supplied for required parameter '{}' of trait '{}' on '{owner}'",
                            p.name, rt.trait_name
                        );
                        resolver.report_object(StatusLevel::Error, &message, visit.id);
                    }
                }
            }
        }
    }

    fn stage_attributes(&mut self, doc: DocId) {
        let visits = self.walk_document(doc);
        let definitions = self.document(doc).map(|d| d.definitions.clone()).unwrap_or_default();
        let opts = self.pipeline_options(doc);
        let graph = &self.graph;
        let mut resolver = Resolver::new(graph, &self.appliers, &mut self.ctx);

        for id in definitions {
            let kind = graph.objects.get(id).map(|o| o.kind());
            if matches!(kind, Some(ObjectKind::EntityDef | ObjectKind::AttributeGroupDef)) {
                let path = graph.objects.get(id).and_then(|o| o.declared_path.clone()).unwrap_or_default();
                resolver.ctx.set_cursor(Some(doc), path);
                resolver.resolved_attributes(id, &opts);
            }
        }

        // Promised references: `Entity/(resolvedAttributes)/name`.
        for visit in &visits {
            let Some(name) = graph
                .objects
                .get(visit.id)
                .and_then(|o| o.as_reference())
                .and_then(|r| r.named.as_deref())
            else {
                continue;
            };
            let Some((entity_path, attribute)) = name.split_once(RESOLVED_ATTRIBUTES_SEGMENT) else {
                continue;
            };
            resolver.ctx.set_cursor(Some(doc), visit.path.clone());
            let bound = resolver
                .find_symbol(entity_path, Some(doc), None)
                .filter(|&e| resolver.kind_of(e) == Some(ObjectKind::EntityDef))
                .and_then(|entity| {
                    resolver
                        .resolved_attributes(entity, &opts)
                        .get(attribute)
                        .and_then(|ra| ra.source_attribute())
                });
            match bound {
                Some(source) => {
                    resolver.ctx.bindings.insert(visit.id, source);
                }
                None => {
                    let message = format!("unable to resolve the reference '{name}' to a known object");
                    resolver.report_object(StatusLevel::Error, &message, visit.id);
                }
            }
        }
    }

    fn stage_entity_references(&mut self, doc: DocId) {
        let definitions = self.document(doc).map(|d| d.definitions.clone()).unwrap_or_default();
        let opts = self.pipeline_options(doc);
        let graph = &self.graph;
        let mut resolver = Resolver::new(graph, &self.appliers, &mut self.ctx);
        for id in definitions {
            if graph.objects.get(id).map(|o| o.kind()) != Some(ObjectKind::EntityDef) {
                continue;
            }
            let references = resolver.entity_references(id, &opts);
            resolver.record_relationships(id, &references);
        }
    }
}

/// Check a value against its parameter's object family. A string naming an
/// object of the right family becomes a reference to it; attribute strings
/// always become attribute references (they may be promises).
#[allow(clippy::too_many_arguments)]
fn const_type_check(
    resolver: &mut Resolver<'_>,
    doc: DocId,
    owner: &str,
    trait_name: &str,
    parameter: &Parameter,
    value: &ParameterValue,
    slot: ValueSlot,
    opts: &ResolveOptions,
) -> Option<Replacement> {
    let data_type = parameter.data_type?;
    let lineage = resolver.data_type_lineage(data_type);
    if !lineage.iter().any(|n| n == "cdmObject") {
        return None;
    }
    let family = lineage
        .iter()
        .find_map(|n| OBJECT_FAMILIES.iter().copied().find(|f| f == n))?;
    let expected = match family {
        "entity" => ObjectKind::EntityRef,
        "attribute" => ObjectKind::AttributeRef,
        "dataType" => ObjectKind::DataTypeRef,
        "trait" => ObjectKind::TraitRef,
        _ => ObjectKind::AttributeGroupRef,
    };

    match value {
        ParameterValue::Text(text) => {
            if expected == ObjectKind::AttributeRef {
                if text == "this.attribute" {
                    return None;
                }
                return Some(Replacement {
                    slot,
                    kind: expected,
                    name: text.clone(),
                    bound: None,
                });
            }
            match resolver.find_symbol(text, Some(doc), opts.wrt_doc) {
                Some(found) => {
                    let found_kind = resolver.kind_of(found)?;
                    if expected.accepts(found_kind) {
                        return Some(Replacement {
                            slot,
                            kind: expected,
                            name: text.clone(),
                            bound: Some(found),
                        });
                    }
                    let message = format!(
                        "parameter '{}' of trait '{trait_name}' on '{owner}' expects a {family} but '{text}' resolves to a {found_kind}",
                        parameter.name
                    );
                    resolver.ctx.report(StatusLevel::Error, &message, None);
                    None
                }
                None => {
                    let level = if expected == ObjectKind::EntityRef {
                        StatusLevel::Warning
                    } else {
                        StatusLevel::Error
                    };
                    let message = format!(
                        "parameter '{}' of trait '{trait_name}' on '{owner}': unable to resolve '{text}' as a {family}",
                        parameter.name
                    );
                    resolver.ctx.report(level, &message, None);
                    None
                }
            }
        }
        ParameterValue::Object(id) => {
            let def = resolver.resolve_reference(*id, Some(doc))?;
            let found_kind = resolver.kind_of(def)?;
            if !expected.accepts(found_kind) {
                let message = format!(
                    "parameter '{}' of trait '{trait_name}' on '{owner}' expects a {family} but got a {found_kind}",
                    parameter.name
                );
                resolver.ctx.report(StatusLevel::Error, &message, None);
            }
            None
        }
        ParameterValue::Table(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_advance_in_order_and_parse() {
        let mut step = ValidationStep::Start;
        let mut seen = Vec::new();
        while step != ValidationStep::Finished {
            step = step.next();
            seen.push(step.label());
        }
        assert_eq!(seen.first(), Some(&"imports"));
        assert_eq!(seen.len(), 9);
        assert_eq!("entityReferences".parse::<ValidationStep>(), Ok(ValidationStep::EntityReferences));
        assert!("bogus".parse::<ValidationStep>().is_err());
    }
}
