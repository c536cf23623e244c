//! On-disk document shapes.
//!
//! Definitions and attributes are untagged in the file format; their kind is
//! recovered by looking at which name field is present (see [`sniff_definition`]
//! and [`sniff_attribute`]). References and argument values stay as raw JSON
//! here because each of them can be a bare string or an inline object.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A whole `.cdm.json` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentData {
    #[serde(default, alias = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, alias = "jsonSchemaSemanticVersion", skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<ImportData>,
    #[serde(default)]
    pub definitions: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportData {
    pub corpus_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moniker: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitData {
    pub trait_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends_trait: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub has_parameters: Vec<ParameterData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifies_attributes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ugly: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associated_properties: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exhibits_traits: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterData {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTypeData {
    pub data_type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends_data_type: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exhibits_traits: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipData {
    pub relationship_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends_relationship: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exhibits_traits: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityData {
    pub entity_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends_entity: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exhibits_traits: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub has_attributes: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeGroupData {
    pub attribute_group_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exhibits_traits: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstantEntityData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant_entity_name: Option<String>,
    pub entity_shape: Value,
    #[serde(default)]
    pub constant_values: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeAttributeData {
    pub name: String,
    #[serde(default, alias = "purpose", skip_serializing_if = "Option::is_none")]
    pub relationship: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_traits: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityAttributeData {
    pub name: String,
    #[serde(default, alias = "purpose", skip_serializing_if = "Option::is_none")]
    pub relationship: Option<Value>,
    pub entity: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_traits: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

// ============================================================================
// Shape sniffing
// ============================================================================

/// Top-level definition kinds distinguishable by their name field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionShape {
    DataType,
    Relationship,
    AttributeGroup,
    Trait,
    ConstantEntity,
    Entity,
}

/// Field checked for each shape, in precedence order.
const DEFINITION_KEYS: [(&str, DefinitionShape); 6] = [
    ("dataTypeName", DefinitionShape::DataType),
    ("relationshipName", DefinitionShape::Relationship),
    ("attributeGroupName", DefinitionShape::AttributeGroup),
    ("traitName", DefinitionShape::Trait),
    ("entityShape", DefinitionShape::ConstantEntity),
    ("entityName", DefinitionShape::Entity),
];

pub fn sniff_definition(value: &Value) -> Option<DefinitionShape> {
    let object = value.as_object()?;
    DEFINITION_KEYS
        .iter()
        .find(|(key, _)| object.contains_key(*key))
        .map(|(_, shape)| *shape)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeShape {
    GroupReference,
    EntityAttribute,
    TypeAttribute,
}

/// Attribute list entries: group references, entity attributes, and
/// everything else as a type attribute.
pub fn sniff_attribute(value: &Value) -> Option<AttributeShape> {
    let object = value.as_object()?;
    if object.contains_key("attributeGroupReference") {
        Some(AttributeShape::GroupReference)
    } else if object.contains_key("entity") {
        Some(AttributeShape::EntityAttribute)
    } else {
        Some(AttributeShape::TypeAttribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn definition_shapes_follow_name_fields() {
        assert_eq!(sniff_definition(&json!({"traitName": "t"})), Some(DefinitionShape::Trait));
        assert_eq!(
            sniff_definition(&json!({"entityShape": "E", "constantValues": []})),
            Some(DefinitionShape::ConstantEntity)
        );
        assert_eq!(
            sniff_definition(&json!({"entityName": "E"})),
            Some(DefinitionShape::Entity)
        );
        assert_eq!(sniff_definition(&json!({"name": "x"})), None);
        assert_eq!(sniff_definition(&json!("E")), None);
    }

    #[test]
    fn attribute_shapes() {
        assert_eq!(
            sniff_attribute(&json!({"attributeGroupReference": "G"})),
            Some(AttributeShape::GroupReference)
        );
        assert_eq!(
            sniff_attribute(&json!({"name": "owner", "entity": "Person"})),
            Some(AttributeShape::EntityAttribute)
        );
        assert_eq!(
            sniff_attribute(&json!({"name": "id", "dataType": "string"})),
            Some(AttributeShape::TypeAttribute)
        );
    }

    #[test]
    fn documents_accept_dollar_schema() {
        let doc: DocumentData = serde_json::from_value(json!({
            "$schema": "schema.json",
            "jsonSchemaSemanticVersion": "1.0.0",
            "imports": [{"corpusPath": "base.cdm.json", "moniker": "b"}],
            "definitions": []
        }))
        .unwrap();
        assert_eq!(doc.schema.as_deref(), Some("schema.json"));
        assert_eq!(doc.schema_version.as_deref(), Some("1.0.0"));
        assert_eq!(doc.imports[0].moniker.as_deref(), Some("b"));
    }
}
