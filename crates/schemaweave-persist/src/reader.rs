//! JSON text → object graph.

use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

use schemaweave_model::{
    Argument, AttributeGroupDef, ConstantEntityDef, Corpus, DataTypeDef, Definition, DefinitionVariant, DocId,
    EntityAttributeDef, EntityDef, ObjectBody, ObjectId, ObjectKind, ObjectReference, Parameter, ParameterValue,
    RelationshipDef, TraitDef, TypeAttributeDef,
};

use crate::data::{
    sniff_attribute, sniff_definition, AttributeGroupData, AttributeShape, ConstantEntityData, DataTypeData,
    DefinitionShape, DocumentData, EntityAttributeData, EntityData, ParameterData, RelationshipData, TraitData,
    TypeAttributeData,
};

/// The key a reference object uses for its target, per reference kind.
pub(crate) fn reference_key(kind: ObjectKind) -> &'static str {
    match kind.reference_kind() {
        ObjectKind::TraitRef => "traitReference",
        ObjectKind::DataTypeRef => "dataTypeReference",
        ObjectKind::RelationshipRef => "relationshipReference",
        ObjectKind::EntityRef => "entityReference",
        ObjectKind::AttributeGroupRef => "attributeGroupReference",
        ObjectKind::AttributeContextRef => "attributeContextReference",
        _ => "attributeReference",
    }
}

/// Parse `text` and add it to the corpus as a new document at `corpus_path`.
///
/// A leading byte-order mark is ignored.
pub fn load_document(corpus: &mut Corpus, corpus_path: &str, text: &str) -> Result<DocId> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let data: DocumentData =
        serde_json::from_str(text).with_context(|| format!("{corpus_path} is not a valid document"))?;
    let doc = corpus.add_document_at(corpus_path)?;
    populate_document(corpus, doc, &data).with_context(|| format!("failed to read {corpus_path}"))?;
    tracing::debug!(document = %corpus_path, definitions = data.definitions.len(), "document loaded");
    Ok(doc)
}

/// Fill an existing (empty) document from parsed data.
pub fn populate_document(corpus: &mut Corpus, doc: DocId, data: &DocumentData) -> Result<()> {
    let document = corpus
        .document_mut(doc)
        .ok_or_else(|| anyhow!("document {doc} is not in the corpus"))?;
    document.schema = data.schema.clone();
    document.schema_version = data.schema_version.clone();

    for import in &data.imports {
        corpus.add_import(doc, &import.corpus_path, import.moniker.as_deref())?;
    }

    let mut reader = DocumentReader { corpus, doc };
    for (index, value) in data.definitions.iter().enumerate() {
        let definition = reader
            .definition(value)
            .with_context(|| format!("definition #{index}"))?;
        reader.corpus.add_definition(doc, definition)?;
    }
    Ok(())
}

fn parse<T: DeserializeOwned>(value: &Value) -> Result<T> {
    Ok(serde_json::from_value(value.clone())?)
}

struct DocumentReader<'c> {
    corpus: &'c mut Corpus,
    doc: DocId,
}

impl DocumentReader<'_> {
    fn definition(&mut self, value: &Value) -> Result<Definition> {
        let shape = sniff_definition(value).ok_or_else(|| anyhow!("unrecognized definition shape"))?;
        match shape {
            DefinitionShape::Trait => self.trait_def(parse(value)?),
            DefinitionShape::DataType => {
                let data: DataTypeData = parse(value)?;
                let extends = self.optional_reference(ObjectKind::DataTypeRef, data.extends_data_type.as_ref())?;
                let def = Definition::new(DefinitionVariant::DataType(DataTypeDef {
                    name: data.data_type_name,
                    extends,
                }));
                self.finish(def, &data.exhibits_traits, data.explanation)
            }
            DefinitionShape::Relationship => {
                let data: RelationshipData = parse(value)?;
                let extends =
                    self.optional_reference(ObjectKind::RelationshipRef, data.extends_relationship.as_ref())?;
                let def = Definition::new(DefinitionVariant::Relationship(RelationshipDef {
                    name: data.relationship_name,
                    extends,
                }));
                self.finish(def, &data.exhibits_traits, data.explanation)
            }
            DefinitionShape::Entity => {
                let data: EntityData = parse(value)?;
                let extends = self.optional_reference(ObjectKind::EntityRef, data.extends_entity.as_ref())?;
                let attributes = data
                    .has_attributes
                    .iter()
                    .map(|a| self.attribute(a))
                    .collect::<Result<Vec<_>>>()?;
                let def = Definition::new(DefinitionVariant::Entity(EntityDef {
                    name: data.entity_name,
                    extends,
                    attributes,
                    attribute_context: None,
                    source_name: data.source_name,
                    display_name: data.display_name,
                    description: data.description,
                    version: data.version,
                }));
                self.finish(def, &data.exhibits_traits, data.explanation)
            }
            DefinitionShape::AttributeGroup => {
                let data: AttributeGroupData = parse(value)?;
                let members = data
                    .members
                    .iter()
                    .map(|a| self.attribute(a))
                    .collect::<Result<Vec<_>>>()?;
                let def = Definition::new(DefinitionVariant::AttributeGroup(AttributeGroupDef {
                    name: data.attribute_group_name,
                    members,
                }));
                self.finish(def, &data.exhibits_traits, data.explanation)
            }
            DefinitionShape::ConstantEntity => {
                let data: ConstantEntityData = parse(value)?;
                let shape = self.reference(ObjectKind::EntityRef, &data.entity_shape)?;
                let def = Definition::new(DefinitionVariant::ConstantEntity(ConstantEntityDef {
                    name: data.constant_entity_name,
                    shape: Some(shape),
                    values: data.constant_values,
                }));
                self.finish(def, &[], data.explanation)
            }
        }
    }

    fn trait_def(&mut self, data: TraitData) -> Result<Definition> {
        let extends = self.optional_reference(ObjectKind::TraitRef, data.extends_trait.as_ref())?;
        let parameters = data
            .has_parameters
            .iter()
            .map(|p| self.parameter(p))
            .collect::<Result<Vec<_>>>()?;
        let def = Definition::new(DefinitionVariant::Trait(TraitDef {
            name: data.trait_name,
            extends,
            parameters,
            elevated: data.elevated,
            modifies_attributes: data.modifies_attributes,
            ugly: data.ugly,
            associated_properties: data.associated_properties,
        }));
        self.finish(def, &data.exhibits_traits, data.explanation)
    }

    fn parameter(&mut self, data: &ParameterData) -> Result<Parameter> {
        let data_type = self.optional_reference(ObjectKind::DataTypeRef, data.data_type.as_ref())?;
        let default_value = data
            .default_value
            .as_ref()
            .map(|v| self.value(v))
            .transpose()
            .with_context(|| format!("default of parameter '{}'", data.name))?;
        Ok(Parameter {
            name: data.name.clone(),
            default_value,
            required: data.required,
            direction: data.direction.clone(),
            data_type,
            explanation: data.explanation.clone(),
        })
    }

    fn finish(&mut self, mut def: Definition, traits: &[Value], explanation: Option<String>) -> Result<Definition> {
        def.exhibits_traits = self.trait_references(traits)?;
        def.explanation = explanation;
        Ok(def)
    }

    fn attribute(&mut self, value: &Value) -> Result<ObjectId> {
        let shape = sniff_attribute(value).ok_or_else(|| anyhow!("attribute entries must be objects"))?;
        let def = match shape {
            AttributeShape::GroupReference => return self.reference(ObjectKind::AttributeGroupRef, value),
            AttributeShape::EntityAttribute => {
                let data: EntityAttributeData = parse(value)?;
                let relationship = self.optional_reference(ObjectKind::RelationshipRef, data.relationship.as_ref())?;
                let entity = self.reference(ObjectKind::EntityRef, &data.entity)?;
                let def = Definition::new(DefinitionVariant::EntityAttribute(EntityAttributeDef {
                    name: data.name,
                    relationship,
                    entity: Some(entity),
                    description: data.description,
                }));
                self.finish(def, &data.applied_traits, data.explanation)?
            }
            AttributeShape::TypeAttribute => {
                let data: TypeAttributeData = parse(value)?;
                let relationship = self.optional_reference(ObjectKind::RelationshipRef, data.relationship.as_ref())?;
                let data_type = self.optional_reference(ObjectKind::DataTypeRef, data.data_type.as_ref())?;
                let def = Definition::new(DefinitionVariant::TypeAttribute(TypeAttributeDef {
                    name: data.name,
                    relationship,
                    data_type,
                    description: data.description,
                    display_name: data.display_name,
                }));
                self.finish(def, &data.applied_traits, data.explanation)?
            }
        };
        Ok(self.corpus.define(self.doc, def))
    }

    // ------------------------------------------------------------------
    // References
    // ------------------------------------------------------------------

    fn optional_reference(&mut self, kind: ObjectKind, value: Option<&Value>) -> Result<Option<ObjectId>> {
        value.map(|v| self.reference(kind, v)).transpose()
    }

    fn trait_references(&mut self, values: &[Value]) -> Result<Vec<ObjectId>> {
        values.iter().map(|v| self.reference(ObjectKind::TraitRef, v)).collect()
    }

    /// A bare name, or an object holding the name (or an inline definition)
    /// under the kind's reference key plus optional applied traits and
    /// arguments.
    fn reference(&mut self, kind: ObjectKind, value: &Value) -> Result<ObjectId> {
        let object = match value {
            Value::String(name) => return Ok(self.corpus.make_ref(self.doc, kind, name)),
            Value::Object(object) => object,
            other => bail!("expected a {kind} but found {other}"),
        };
        let key = reference_key(kind);
        let target = object
            .get(key)
            .ok_or_else(|| anyhow!("reference object is missing '{key}'"))?;

        let applied_traits = match object.get("appliedTraits") {
            Some(Value::Array(traits)) => self.trait_references(traits)?,
            _ => Vec::new(),
        };
        let arguments = match object.get("arguments") {
            Some(Value::Array(args)) => args.iter().map(|a| self.argument(a)).collect::<Result<Vec<_>>>()?,
            _ => Vec::new(),
        };

        let mut reference = match target {
            Value::String(name) => {
                ObjectReference::named(kind, name.as_str(), applied_traits.is_empty() && arguments.is_empty())
            }
            Value::Object(_) => {
                let definition = if kind.reference_kind() == ObjectKind::AttributeRef {
                    self.attribute(target)?
                } else {
                    let def = self.definition(target)?;
                    self.corpus.define(self.doc, def)
                };
                ObjectReference::explicit(kind, definition)
            }
            other => bail!("'{key}' must be a name or a definition, found {other}"),
        };
        reference.applied_traits = applied_traits;
        reference.arguments = arguments;
        Ok(self.corpus.alloc(Some(self.doc), ObjectBody::Reference(reference)))
    }

    /// `{"name": n, "value": v}` is a named argument; anything else is a
    /// positional value.
    fn argument(&mut self, value: &Value) -> Result<Argument> {
        if let Value::Object(object) = value {
            if let Some(inner) = object.get("value") {
                let mut argument = Argument::positional(self.value(inner)?);
                argument.name = object.get("name").and_then(Value::as_str).map(str::to_string);
                argument.explanation = object.get("explanation").and_then(Value::as_str).map(str::to_string);
                return Ok(argument);
            }
        }
        Ok(Argument::positional(self.value(value)?))
    }

    fn value(&mut self, value: &Value) -> Result<ParameterValue> {
        match value {
            Value::String(text) => Ok(ParameterValue::Text(text.clone())),
            Value::Bool(_) | Value::Number(_) => Ok(ParameterValue::Text(value.to_string())),
            Value::Object(object) => {
                const REFERENCE_KINDS: [ObjectKind; 6] = [
                    ObjectKind::EntityRef,
                    ObjectKind::TraitRef,
                    ObjectKind::DataTypeRef,
                    ObjectKind::AttributeGroupRef,
                    ObjectKind::RelationshipRef,
                    ObjectKind::AttributeRef,
                ];
                if let Some(kind) = REFERENCE_KINDS
                    .into_iter()
                    .find(|k| object.contains_key(reference_key(*k)))
                {
                    return Ok(ParameterValue::Object(self.reference(kind, value)?));
                }
                let id = if sniff_definition(value).is_some() {
                    let def = self.definition(value)?;
                    self.corpus.define(self.doc, def)
                } else if object.contains_key("name") {
                    self.attribute(value)?
                } else {
                    bail!("unrecognized object value");
                };
                Ok(ParameterValue::Object(id))
            }
            Value::Null | Value::Array(_) => bail!("unsupported argument value {value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_order_mark_is_ignored() {
        let mut corpus = Corpus::default();
        let doc = load_document(&mut corpus, "/bom.cdm.json", "\u{feff}{\"definitions\": []}").unwrap();
        assert_eq!(corpus.document(doc).unwrap().corpus_path, "/bom.cdm.json");
    }

    #[test]
    fn named_and_positional_arguments() {
        let mut corpus = Corpus::default();
        let doc = load_document(
            &mut corpus,
            "/args.cdm.json",
            r#"{"definitions": [{
                "entityName": "E",
                "exhibitsTraits": [{
                    "traitReference": "is.constrained",
                    "arguments": ["10", {"name": "maximumLength", "value": 32}]
                }]
            }]}"#,
        )
        .unwrap();
        let entity = corpus.document(doc).unwrap().definitions[0];
        let def = corpus.object(entity).unwrap().as_definition().unwrap();
        let reference = corpus
            .object(def.exhibits_traits[0])
            .and_then(|o| o.as_reference())
            .unwrap();
        assert_eq!(reference.named.as_deref(), Some("is.constrained"));
        assert!(!reference.simple);
        assert_eq!(reference.arguments.len(), 2);
        assert_eq!(reference.arguments[0].name, None);
        assert_eq!(reference.arguments[1].name.as_deref(), Some("maximumLength"));
        assert_eq!(reference.arguments[1].value, ParameterValue::text("32"));
    }

    #[test]
    fn inline_definitions_become_explicit_references() {
        let mut corpus = Corpus::default();
        let doc = load_document(
            &mut corpus,
            "/inline.cdm.json",
            r#"{"definitions": [{
                "entityName": "Holder",
                "hasAttributes": [{
                    "name": "inner",
                    "entity": {"entityReference": {"entityName": "Inner"}}
                }]
            }]}"#,
        )
        .unwrap();
        let holder = corpus.document(doc).unwrap().definitions[0];
        let attribute = corpus.object(holder).unwrap().as_definition().unwrap().children()[0];
        let entity_attribute = corpus.object(attribute).unwrap();
        assert_eq!(entity_attribute.kind(), ObjectKind::EntityAttributeDef);
        let target = entity_attribute.children()[0];
        let reference = corpus.object(target).unwrap().as_reference().unwrap();
        assert!(reference.named.is_none());
        let inline = reference.explicit.unwrap();
        assert_eq!(corpus.object(inline).unwrap().display_name(), "Inner");
    }

    #[test]
    fn unknown_definition_shapes_are_rejected() {
        let mut corpus = Corpus::default();
        let err = load_document(&mut corpus, "/bad.cdm.json", r#"{"definitions": [{"what": 1}]}"#).unwrap_err();
        assert!(format!("{err:#}").contains("unrecognized definition shape"));
    }
}
