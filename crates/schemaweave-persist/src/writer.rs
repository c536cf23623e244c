//! Object graph → JSON, for single documents and whole corpora.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::{json, Map, Value};

use schemaweave_model::{
    Argument, Corpus, Definition, DefinitionVariant, DocId, FolderId, ObjectBody, ObjectId, ObjectReference,
    Parameter, ParameterValue,
};

use crate::data::{
    AttributeGroupData, ConstantEntityData, DataTypeData, DocumentData, EntityAttributeData, EntityData, ImportData,
    ParameterData, RelationshipData, TraitData, TypeAttributeData,
};
use crate::reader::reference_key;

/// Serialize one document of the corpus back to its on-disk shape.
pub fn document_to_data(corpus: &Corpus, doc: DocId) -> Result<DocumentData> {
    let document = corpus
        .document(doc)
        .ok_or_else(|| anyhow!("document {doc} is not in the corpus"))?;
    let writer = ObjectWriter { corpus };
    let definitions = document
        .definitions
        .iter()
        .map(|id| writer.object(*id))
        .collect::<Result<Vec<_>>>()?;
    Ok(DocumentData {
        schema: document.schema.clone(),
        schema_version: document.schema_version.clone(),
        imports: document
            .imports
            .iter()
            .map(|i| ImportData {
                corpus_path: i.corpus_path.clone(),
                moniker: i.moniker.clone(),
            })
            .collect(),
        definitions,
    })
}

pub fn document_to_string(corpus: &Corpus, doc: DocId) -> Result<String> {
    let data = document_to_data(corpus, doc)?;
    Ok(serde_json::to_string_pretty(&data)?)
}

// ============================================================================
// Corpus output
// ============================================================================

/// Filesystem location of a corpus path below `out_dir`.
fn output_path(out_dir: &Path, corpus_path: &str) -> PathBuf {
    corpus_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(out_dir.to_path_buf(), |path, segment| path.join(segment))
}

/// Write one document to its corpus path below `out_dir`.
pub fn persist_document(corpus: &Corpus, doc: DocId, out_dir: &Path) -> Result<PathBuf> {
    let document = corpus
        .document(doc)
        .ok_or_else(|| anyhow!("document {doc} is not in the corpus"))?;
    let path = output_path(out_dir, &document.corpus_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let text = document_to_string(corpus, doc)?;
    fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::debug!(document = %document.corpus_path, path = %path.display(), "document written");
    Ok(path)
}

/// Write a folder's documents and every subfolder below `out_dir`. The
/// built-in primitives document is never written, and its folder is only
/// created when it holds something else. Returns the number of documents
/// written.
pub fn persist_folder(corpus: &Corpus, folder: FolderId, out_dir: &Path) -> Result<usize> {
    let entry = corpus
        .folder(folder)
        .ok_or_else(|| anyhow!("folder {} is not in the corpus", folder.index()))?;
    let builtins = corpus.builtins_document();
    let documents: Vec<DocId> = entry
        .documents
        .iter()
        .copied()
        .filter(|&doc| Some(doc) != builtins)
        .collect();

    let holds_builtins = entry.documents.len() != documents.len();
    if !holds_builtins || !documents.is_empty() || !entry.children.is_empty() {
        let dir = output_path(out_dir, &entry.corpus_path);
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let mut written = 0;
    for doc in documents {
        persist_document(corpus, doc, out_dir)?;
        written += 1;
    }
    for &child in &entry.children {
        written += persist_folder(corpus, child, out_dir)?;
    }
    Ok(written)
}

/// Write the whole corpus below `out_dir`, mirroring its folder tree.
pub fn persist_corpus(corpus: &Corpus, out_dir: &Path) -> Result<usize> {
    let written = persist_folder(corpus, corpus.root_folder(), out_dir)?;
    tracing::info!(out = %out_dir.display(), documents = written, "corpus written");
    Ok(written)
}

fn to_value<T: Serialize>(data: T) -> Result<Value> {
    Ok(serde_json::to_value(data)?)
}

pub(crate) struct ObjectWriter<'c> {
    pub(crate) corpus: &'c Corpus,
}

impl ObjectWriter<'_> {
    pub(crate) fn object(&self, id: ObjectId) -> Result<Value> {
        let object = self
            .corpus
            .object(id)
            .ok_or_else(|| anyhow!("object {id} is not in the corpus"))?;
        match &object.body {
            ObjectBody::Definition(def) => self.definition(def),
            ObjectBody::Reference(reference) => self.reference(reference),
        }
    }

    fn optional(&self, id: Option<ObjectId>) -> Result<Option<Value>> {
        id.map(|id| self.object(id)).transpose()
    }

    fn list(&self, ids: &[ObjectId]) -> Result<Vec<Value>> {
        ids.iter().map(|id| self.object(*id)).collect()
    }

    fn definition(&self, def: &Definition) -> Result<Value> {
        let traits = self.list(&def.exhibits_traits)?;
        let explanation = def.explanation.clone();
        match &def.variant {
            DefinitionVariant::Trait(d) => to_value(TraitData {
                trait_name: d.name.clone(),
                extends_trait: self.optional(d.extends)?,
                has_parameters: d
                    .parameters
                    .iter()
                    .map(|p| self.parameter(p))
                    .collect::<Result<Vec<_>>>()?,
                elevated: d.elevated,
                modifies_attributes: d.modifies_attributes,
                ugly: d.ugly,
                associated_properties: d.associated_properties.clone(),
                exhibits_traits: traits,
                explanation,
            }),
            DefinitionVariant::DataType(d) => to_value(DataTypeData {
                data_type_name: d.name.clone(),
                extends_data_type: self.optional(d.extends)?,
                exhibits_traits: traits,
                explanation,
            }),
            DefinitionVariant::Relationship(d) => to_value(RelationshipData {
                relationship_name: d.name.clone(),
                extends_relationship: self.optional(d.extends)?,
                exhibits_traits: traits,
                explanation,
            }),
            DefinitionVariant::Entity(d) => to_value(EntityData {
                entity_name: d.name.clone(),
                extends_entity: self.optional(d.extends)?,
                exhibits_traits: traits,
                has_attributes: self.list(&d.attributes)?,
                source_name: d.source_name.clone(),
                display_name: d.display_name.clone(),
                description: d.description.clone(),
                version: d.version.clone(),
                explanation,
            }),
            DefinitionVariant::AttributeGroup(d) => to_value(AttributeGroupData {
                attribute_group_name: d.name.clone(),
                members: self.list(&d.members)?,
                exhibits_traits: traits,
                explanation,
            }),
            DefinitionVariant::ConstantEntity(d) => to_value(ConstantEntityData {
                constant_entity_name: d.name.clone(),
                entity_shape: self.optional(d.shape)?.unwrap_or(Value::Null),
                constant_values: d.values.clone(),
                explanation,
            }),
            DefinitionVariant::TypeAttribute(d) => to_value(TypeAttributeData {
                name: d.name.clone(),
                relationship: self.optional(d.relationship)?,
                data_type: self.optional(d.data_type)?,
                applied_traits: traits,
                description: d.description.clone(),
                display_name: d.display_name.clone(),
                explanation,
            }),
            DefinitionVariant::EntityAttribute(d) => to_value(EntityAttributeData {
                name: d.name.clone(),
                relationship: self.optional(d.relationship)?,
                entity: self.optional(d.entity)?.unwrap_or(Value::Null),
                applied_traits: traits,
                description: d.description.clone(),
                explanation,
            }),
            // Contexts are rebuilt by resolution and never written.
            DefinitionVariant::AttributeContext(d) => Ok(json!({ "name": d.name })),
        }
    }

    fn parameter(&self, parameter: &Parameter) -> Result<ParameterData> {
        Ok(ParameterData {
            name: parameter.name.clone(),
            explanation: parameter.explanation.clone(),
            default_value: parameter
                .default_value
                .as_ref()
                .map(|v| self.value(v))
                .transpose()?,
            required: parameter.required,
            direction: parameter.direction.clone(),
            data_type: self.optional(parameter.data_type)?,
        })
    }

    pub(crate) fn reference(&self, reference: &ObjectReference) -> Result<Value> {
        let target = match (&reference.named, reference.explicit) {
            (Some(name), _) if reference.simple => return Ok(Value::String(name.clone())),
            (Some(name), _) => Value::String(name.clone()),
            (None, Some(def)) => self.object(def)?,
            (None, None) => return Err(anyhow!("reference has neither a name nor a definition")),
        };
        let mut object = Map::new();
        object.insert(reference_key(reference.kind).to_string(), target);
        if !reference.applied_traits.is_empty() {
            object.insert("appliedTraits".to_string(), Value::Array(self.list(&reference.applied_traits)?));
        }
        if !reference.arguments.is_empty() {
            let arguments = reference
                .arguments
                .iter()
                .map(|a| self.argument(a))
                .collect::<Result<Vec<_>>>()?;
            object.insert("arguments".to_string(), Value::Array(arguments));
        }
        Ok(Value::Object(object))
    }

    fn argument(&self, argument: &Argument) -> Result<Value> {
        let value = self.value(&argument.value)?;
        match &argument.name {
            None => Ok(value),
            Some(name) => {
                let mut object = Map::new();
                object.insert("name".to_string(), Value::String(name.clone()));
                object.insert("value".to_string(), value);
                if let Some(explanation) = &argument.explanation {
                    object.insert("explanation".to_string(), Value::String(explanation.clone()));
                }
                Ok(Value::Object(object))
            }
        }
    }

    pub(crate) fn value(&self, value: &ParameterValue) -> Result<Value> {
        match value {
            ParameterValue::Text(text) => Ok(Value::String(text.clone())),
            ParameterValue::Object(id) => self.object(*id),
            ParameterValue::Table(table) => {
                let shape = self
                    .corpus
                    .object(table.shape)
                    .map(|o| o.display_name())
                    .ok_or_else(|| anyhow!("table shape {} is not in the corpus", table.shape))?;
                Ok(json!({ "entityShape": shape, "constantValues": table.rows }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::load_document;

    const SOURCE: &str = r#"{
        "schema": "schema.json",
        "imports": [{"corpusPath": "lib/base.cdm.json", "moniker": "b"}],
        "definitions": [
            {"dataTypeName": "code", "extendsDataType": "string"},
            {
                "traitName": "my.tag",
                "hasParameters": [{"name": "label", "required": true, "dataType": "string"}]
            },
            {
                "entityName": "Thing",
                "extendsEntity": "b/Base",
                "hasAttributes": [
                    {"name": "code", "dataType": "code", "appliedTraits": ["is.nullable"]},
                    {"name": "owner", "entity": {"entityReference": "Person", "appliedTraits": ["is.readOnly"]}}
                ],
                "exhibitsTraits": [{"traitReference": "my.tag", "arguments": [{"name": "label", "value": "x"}]}]
            }
        ]
    }"#;

    #[test]
    fn written_documents_read_back_identically() {
        let mut corpus = Corpus::default();
        let doc = load_document(&mut corpus, "/thing.cdm.json", SOURCE).unwrap();
        let first = document_to_data(&corpus, doc).unwrap();
        assert_eq!(first.imports[0].moniker.as_deref(), Some("b"));

        let text = serde_json::to_string(&first).unwrap();
        let mut again = Corpus::default();
        let copy = load_document(&mut again, "/copy.cdm.json", &text).unwrap();
        assert_eq!(document_to_data(&again, copy).unwrap(), first);
    }

    #[test]
    fn simple_references_stay_strings() {
        let mut corpus = Corpus::default();
        let doc = load_document(&mut corpus, "/thing.cdm.json", SOURCE).unwrap();
        let data = document_to_data(&corpus, doc).unwrap();
        assert_eq!(data.definitions[0]["extendsDataType"], json!("string"));
        let owner = &data.definitions[2]["hasAttributes"][1];
        assert_eq!(owner["entity"]["entityReference"], json!("Person"));
        assert_eq!(owner["entity"]["appliedTraits"], json!(["is.readOnly"]));
    }
}
