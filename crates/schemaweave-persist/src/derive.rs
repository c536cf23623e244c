//! Documents derived from resolved entities.
//!
//! The derived entity lists every resolved attribute as a plain type
//! attribute, so resolving it again needs no appliers and produces the same
//! attribute names in the same order.

use anyhow::{anyhow, Result};
use serde_json::{Map, Value};

use schemaweave_model::{
    AttributeTarget, Corpus, ResolvedAttribute, ResolvedAttributeSet, ResolvedEntity, ResolvedTrait, ResolvedTraitSet,
};

use crate::data::{DocumentData, EntityData, ImportData, TypeAttributeData};
use crate::writer::ObjectWriter;

/// Build a single-entity document that imports the entity's own document.
pub fn derive_resolved_document(corpus: &Corpus, resolved: &ResolvedEntity) -> Result<DocumentData> {
    let source = corpus
        .object(resolved.entity)
        .and_then(|o| o.in_document)
        .and_then(|doc| corpus.document(doc))
        .ok_or_else(|| anyhow!("entity '{}' is not owned by a document", resolved.name))?;

    let writer = ObjectWriter { corpus };
    let mut attributes = Vec::new();
    flatten(&writer, &resolved.attributes, &mut attributes)?;

    let entity = EntityData {
        entity_name: resolved.name.clone(),
        exhibits_traits: trait_references(&writer, &resolved.traits)?,
        has_attributes: attributes,
        ..EntityData::default()
    };
    Ok(DocumentData {
        schema: source.schema.clone(),
        schema_version: source.schema_version.clone(),
        imports: vec![ImportData {
            corpus_path: source.corpus_path.clone(),
            moniker: None,
        }],
        definitions: vec![serde_json::to_value(entity)?],
    })
}

/// Nested sets contribute their leaves in order.
fn flatten(writer: &ObjectWriter<'_>, set: &ResolvedAttributeSet, out: &mut Vec<Value>) -> Result<()> {
    for ra in set.iter() {
        match &ra.target {
            AttributeTarget::Set(nested) => flatten(writer, nested, out)?,
            AttributeTarget::Attribute(_) => out.push(type_attribute(writer, ra)?),
        }
    }
    Ok(())
}

fn type_attribute(writer: &ObjectWriter<'_>, ra: &ResolvedAttribute) -> Result<Value> {
    let data_type = ra
        .source_attribute()
        .and_then(|id| writer.corpus.object(id))
        .and_then(|o| o.as_definition())
        .and_then(|def| def.as_type_attribute())
        .and_then(|attribute| attribute.data_type)
        .map(|dt| writer.object(dt))
        .transpose()?;
    let data = TypeAttributeData {
        name: ra.resolved_name.clone(),
        data_type,
        applied_traits: trait_references(writer, &ra.traits)?,
        ..TypeAttributeData::default()
    };
    Ok(serde_json::to_value(data)?)
}

fn trait_references(writer: &ObjectWriter<'_>, traits: &ResolvedTraitSet) -> Result<Vec<Value>> {
    traits
        .iter()
        .filter(|rt| !rt.ugly && !rt.modifies_attributes)
        .map(|rt| trait_reference(writer, rt))
        .collect()
}

/// Only explicitly set arguments are written; defaults come back from the
/// trait definition.
fn trait_reference(writer: &ObjectWriter<'_>, rt: &ResolvedTrait) -> Result<Value> {
    let mut arguments = Vec::new();
    for (parameter, value, was_set) in rt.parameter_values.iter() {
        let Some(value) = value.filter(|_| was_set) else {
            continue;
        };
        let mut argument = Map::new();
        argument.insert("name".to_string(), Value::String(parameter.name.clone()));
        argument.insert("value".to_string(), writer.value(value)?);
        arguments.push(Value::Object(argument));
    }
    if arguments.is_empty() {
        return Ok(Value::String(rt.trait_name.clone()));
    }
    let mut reference = Map::new();
    reference.insert("traitReference".to_string(), Value::String(rt.trait_name.clone()));
    reference.insert("arguments".to_string(), Value::Array(arguments));
    Ok(Value::Object(reference))
}
