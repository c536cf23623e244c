//! The declared object graph: definitions, references, parameters, arguments.
//!
//! Objects are pure data plus identity. Nothing in here resolves anything;
//! resolution lives in [`crate::resolver`] and friends.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::arena::ObjectId;
use crate::attribute_context::AttributeContextType;
use crate::document::DocId;

/// Closed set of schema-object kinds (definitions and the references to them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    TraitDef,
    DataTypeDef,
    RelationshipDef,
    EntityDef,
    AttributeGroupDef,
    ConstantEntityDef,
    TypeAttributeDef,
    EntityAttributeDef,
    AttributeContextDef,
    TraitRef,
    DataTypeRef,
    RelationshipRef,
    EntityRef,
    AttributeGroupRef,
    AttributeRef,
    AttributeContextRef,
}

impl ObjectKind {
    pub fn is_reference(self) -> bool {
        matches!(
            self,
            ObjectKind::TraitRef
                | ObjectKind::DataTypeRef
                | ObjectKind::RelationshipRef
                | ObjectKind::EntityRef
                | ObjectKind::AttributeGroupRef
                | ObjectKind::AttributeRef
                | ObjectKind::AttributeContextRef
        )
    }

    pub fn is_attribute(self) -> bool {
        matches!(
            self,
            ObjectKind::TypeAttributeDef | ObjectKind::EntityAttributeDef
        )
    }

    /// The reference kind used to point at a definition of this kind.
    pub fn reference_kind(self) -> ObjectKind {
        match self {
            ObjectKind::TraitDef | ObjectKind::TraitRef => ObjectKind::TraitRef,
            ObjectKind::DataTypeDef | ObjectKind::DataTypeRef => ObjectKind::DataTypeRef,
            ObjectKind::RelationshipDef | ObjectKind::RelationshipRef => {
                ObjectKind::RelationshipRef
            }
            ObjectKind::EntityDef | ObjectKind::ConstantEntityDef | ObjectKind::EntityRef => {
                ObjectKind::EntityRef
            }
            ObjectKind::AttributeGroupDef | ObjectKind::AttributeGroupRef => {
                ObjectKind::AttributeGroupRef
            }
            ObjectKind::TypeAttributeDef
            | ObjectKind::EntityAttributeDef
            | ObjectKind::AttributeRef => ObjectKind::AttributeRef,
            ObjectKind::AttributeContextDef | ObjectKind::AttributeContextRef => {
                ObjectKind::AttributeContextRef
            }
        }
    }

    /// Whether a definition of kind `found` satisfies a reference of this kind.
    pub fn accepts(self, found: ObjectKind) -> bool {
        match self {
            ObjectKind::TraitRef => found == ObjectKind::TraitDef,
            ObjectKind::DataTypeRef => found == ObjectKind::DataTypeDef,
            ObjectKind::RelationshipRef => found == ObjectKind::RelationshipDef,
            ObjectKind::EntityRef => {
                matches!(found, ObjectKind::EntityDef | ObjectKind::ConstantEntityDef)
            }
            ObjectKind::AttributeGroupRef => found == ObjectKind::AttributeGroupDef,
            ObjectKind::AttributeRef => found.is_attribute(),
            ObjectKind::AttributeContextRef => found == ObjectKind::AttributeContextDef,
            definition => definition == found,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ObjectKind::TraitDef => "trait",
            ObjectKind::DataTypeDef => "dataType",
            ObjectKind::RelationshipDef => "relationship",
            ObjectKind::EntityDef => "entity",
            ObjectKind::AttributeGroupDef => "attributeGroup",
            ObjectKind::ConstantEntityDef => "constantEntity",
            ObjectKind::TypeAttributeDef => "typeAttribute",
            ObjectKind::EntityAttributeDef => "entityAttribute",
            ObjectKind::AttributeContextDef => "attributeContext",
            ObjectKind::TraitRef => "traitReference",
            ObjectKind::DataTypeRef => "dataTypeReference",
            ObjectKind::RelationshipRef => "relationshipReference",
            ObjectKind::EntityRef => "entityReference",
            ObjectKind::AttributeGroupRef => "attributeGroupReference",
            ObjectKind::AttributeRef => "attributeReference",
            ObjectKind::AttributeContextRef => "attributeContextReference",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Values, parameters, arguments
// ============================================================================

/// Rows of a constant entity, materialized when two lookup tables are unioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantTable {
    /// The entity definition describing the row shape.
    pub shape: ObjectId,
    pub rows: Vec<Vec<String>>,
}

/// A parameter or argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterValue {
    Text(String),
    /// A definition or reference living in the arena.
    Object(ObjectId),
    /// A lookup table produced by row union (never declared directly).
    Table(Rc<ConstantTable>),
}

impl ParameterValue {
    pub fn text(value: impl Into<String>) -> Self {
        ParameterValue::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParameterValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            ParameterValue::Object(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub default_value: Option<ParameterValue>,
    pub required: bool,
    pub direction: Option<String>,
    /// A data type reference.
    pub data_type: Option<ObjectId>,
    pub explanation: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: None,
            required: false,
            direction: None,
            data_type: None,
            explanation: None,
        }
    }

    pub fn with_default(mut self, value: ParameterValue) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_data_type(mut self, data_type: ObjectId) -> Self {
        self.data_type = Some(data_type);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Option<String>,
    pub value: ParameterValue,
    pub explanation: Option<String>,
}

impl Argument {
    pub fn positional(value: ParameterValue) -> Self {
        Self {
            name: None,
            value,
            explanation: None,
        }
    }

    pub fn named(name: impl Into<String>, value: ParameterValue) -> Self {
        Self {
            name: Some(name.into()),
            value,
            explanation: None,
        }
    }
}

// ============================================================================
// Definitions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TraitDef {
    pub name: String,
    pub extends: Option<ObjectId>,
    pub parameters: Vec<Parameter>,
    pub elevated: Option<bool>,
    pub modifies_attributes: Option<bool>,
    pub ugly: Option<bool>,
    pub associated_properties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataTypeDef {
    pub name: String,
    pub extends: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelationshipDef {
    pub name: String,
    pub extends: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityDef {
    pub name: String,
    pub extends: Option<ObjectId>,
    /// Type attributes, entity attributes and attribute group references, in
    /// declared order.
    pub attributes: Vec<ObjectId>,
    pub attribute_context: Option<ObjectId>,
    pub source_name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeGroupDef {
    pub name: String,
    pub members: Vec<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstantEntityDef {
    pub name: Option<String>,
    /// Entity reference describing the row shape.
    pub shape: Option<ObjectId>,
    pub values: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypeAttributeDef {
    pub name: String,
    pub relationship: Option<ObjectId>,
    pub data_type: Option<ObjectId>,
    pub description: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityAttributeDef {
    pub name: String,
    pub relationship: Option<ObjectId>,
    pub entity: Option<ObjectId>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeContextDef {
    pub name: String,
    pub context_type: AttributeContextType,
    /// Attribute context reference to the enclosing node.
    pub parent: Option<ObjectId>,
    pub definition: Option<ObjectId>,
    /// Nested context definitions and attribute references.
    pub contents: Vec<ObjectId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionVariant {
    Trait(TraitDef),
    DataType(DataTypeDef),
    Relationship(RelationshipDef),
    Entity(EntityDef),
    AttributeGroup(AttributeGroupDef),
    ConstantEntity(ConstantEntityDef),
    TypeAttribute(TypeAttributeDef),
    EntityAttribute(EntityAttributeDef),
    AttributeContext(AttributeContextDef),
}

/// A schema-object definition. For attributes, `exhibits_traits` holds the
/// applied traits.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub explanation: Option<String>,
    pub exhibits_traits: Vec<ObjectId>,
    pub variant: DefinitionVariant,
}

impl Definition {
    pub fn new(variant: DefinitionVariant) -> Self {
        Self {
            explanation: None,
            exhibits_traits: Vec::new(),
            variant,
        }
    }

    pub fn with_traits(mut self, traits: Vec<ObjectId>) -> Self {
        self.exhibits_traits = traits;
        self
    }

    pub fn kind(&self) -> ObjectKind {
        match &self.variant {
            DefinitionVariant::Trait(_) => ObjectKind::TraitDef,
            DefinitionVariant::DataType(_) => ObjectKind::DataTypeDef,
            DefinitionVariant::Relationship(_) => ObjectKind::RelationshipDef,
            DefinitionVariant::Entity(_) => ObjectKind::EntityDef,
            DefinitionVariant::AttributeGroup(_) => ObjectKind::AttributeGroupDef,
            DefinitionVariant::ConstantEntity(_) => ObjectKind::ConstantEntityDef,
            DefinitionVariant::TypeAttribute(_) => ObjectKind::TypeAttributeDef,
            DefinitionVariant::EntityAttribute(_) => ObjectKind::EntityAttributeDef,
            DefinitionVariant::AttributeContext(_) => ObjectKind::AttributeContextDef,
        }
    }

    pub fn name(&self) -> Option<&str> {
        let name = match &self.variant {
            DefinitionVariant::Trait(d) => d.name.as_str(),
            DefinitionVariant::DataType(d) => d.name.as_str(),
            DefinitionVariant::Relationship(d) => d.name.as_str(),
            DefinitionVariant::Entity(d) => d.name.as_str(),
            DefinitionVariant::AttributeGroup(d) => d.name.as_str(),
            DefinitionVariant::ConstantEntity(d) => return d.name.as_deref(),
            DefinitionVariant::TypeAttribute(d) => d.name.as_str(),
            DefinitionVariant::EntityAttribute(d) => d.name.as_str(),
            DefinitionVariant::AttributeContext(d) => d.name.as_str(),
        };
        Some(name)
    }

    /// The reference naming this definition's base, if the kind has one.
    pub fn extends(&self) -> Option<ObjectId> {
        match &self.variant {
            DefinitionVariant::Trait(d) => d.extends,
            DefinitionVariant::DataType(d) => d.extends,
            DefinitionVariant::Relationship(d) => d.extends,
            DefinitionVariant::Entity(d) => d.extends,
            _ => None,
        }
    }

    /// Owned children in declaration order (pre-order visit order).
    pub fn children(&self) -> Vec<ObjectId> {
        let mut out = Vec::new();
        match &self.variant {
            DefinitionVariant::Trait(d) => {
                out.extend(d.extends);
                for p in &d.parameters {
                    out.extend(p.data_type);
                    if let Some(ParameterValue::Object(id)) = &p.default_value {
                        out.push(*id);
                    }
                }
            }
            DefinitionVariant::DataType(d) => out.extend(d.extends),
            DefinitionVariant::Relationship(d) => out.extend(d.extends),
            DefinitionVariant::Entity(d) => {
                out.extend(d.extends);
                out.extend(d.attributes.iter().copied());
                out.extend(d.attribute_context);
            }
            DefinitionVariant::AttributeGroup(d) => out.extend(d.members.iter().copied()),
            DefinitionVariant::ConstantEntity(d) => out.extend(d.shape),
            DefinitionVariant::TypeAttribute(d) => {
                out.extend(d.relationship);
                out.extend(d.data_type);
            }
            DefinitionVariant::EntityAttribute(d) => {
                out.extend(d.relationship);
                out.extend(d.entity);
            }
            DefinitionVariant::AttributeContext(d) => {
                out.extend(d.parent);
                out.extend(d.definition);
                out.extend(d.contents.iter().copied());
            }
        }
        out.extend(self.exhibits_traits.iter().copied());
        out
    }

    pub fn as_trait(&self) -> Option<&TraitDef> {
        match &self.variant {
            DefinitionVariant::Trait(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&EntityDef> {
        match &self.variant {
            DefinitionVariant::Entity(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_constant_entity(&self) -> Option<&ConstantEntityDef> {
        match &self.variant {
            DefinitionVariant::ConstantEntity(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_type_attribute(&self) -> Option<&TypeAttributeDef> {
        match &self.variant {
            DefinitionVariant::TypeAttribute(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_data_type(&self) -> Option<&DataTypeDef> {
        match &self.variant {
            DefinitionVariant::DataType(d) => Some(d),
            _ => None,
        }
    }
}

// ============================================================================
// References
// ============================================================================

/// A reference to a definition: named (resolved through the document graph)
/// or explicit (owning an inline definition).
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectReference {
    pub kind: ObjectKind,
    pub named: Option<String>,
    /// Written as a bare string rather than a reference object.
    pub simple: bool,
    pub explicit: Option<ObjectId>,
    pub applied_traits: Vec<ObjectId>,
    /// Only meaningful on trait references.
    pub arguments: Vec<Argument>,
    /// Resolve against this document regardless of the point of reference.
    pub moniker_document: Option<DocId>,
}

impl ObjectReference {
    pub fn named(kind: ObjectKind, name: impl Into<String>, simple: bool) -> Self {
        Self {
            kind: kind.reference_kind(),
            named: Some(name.into()),
            simple,
            explicit: None,
            applied_traits: Vec::new(),
            arguments: Vec::new(),
            moniker_document: None,
        }
    }

    pub fn explicit(kind: ObjectKind, definition: ObjectId) -> Self {
        Self {
            kind: kind.reference_kind(),
            named: None,
            simple: false,
            explicit: Some(definition),
            applied_traits: Vec::new(),
            arguments: Vec::new(),
            moniker_document: None,
        }
    }

    pub fn children(&self) -> Vec<ObjectId> {
        let mut out = Vec::new();
        out.extend(self.explicit);
        out.extend(self.applied_traits.iter().copied());
        for arg in &self.arguments {
            if let ParameterValue::Object(id) = &arg.value {
                out.push(*id);
            }
        }
        out
    }
}

// ============================================================================
// Arena payload
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectBody {
    Definition(Definition),
    Reference(ObjectReference),
}

/// One arena entry: the object plus the bookkeeping assigned at declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct CdmObject {
    pub body: ObjectBody,
    pub in_document: Option<DocId>,
    /// Path relative to the owning document, assigned by the declarations stage.
    pub declared_path: Option<String>,
    pub corpus_path: Option<String>,
}

impl CdmObject {
    pub fn new(body: ObjectBody, in_document: Option<DocId>) -> Self {
        Self {
            body,
            in_document,
            declared_path: None,
            corpus_path: None,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match &self.body {
            ObjectBody::Definition(def) => def.kind(),
            ObjectBody::Reference(r) => r.kind,
        }
    }

    pub fn as_definition(&self) -> Option<&Definition> {
        match &self.body {
            ObjectBody::Definition(def) => Some(def),
            ObjectBody::Reference(_) => None,
        }
    }

    pub fn as_reference(&self) -> Option<&ObjectReference> {
        match &self.body {
            ObjectBody::Reference(r) => Some(r),
            ObjectBody::Definition(_) => None,
        }
    }

    pub fn children(&self) -> Vec<ObjectId> {
        match &self.body {
            ObjectBody::Definition(def) => def.children(),
            ObjectBody::Reference(r) => r.children(),
        }
    }

    /// Display name: the definition name or the named reference string.
    pub fn display_name(&self) -> String {
        match &self.body {
            ObjectBody::Definition(def) => def.name().unwrap_or("(unnamed)").to_string(),
            ObjectBody::Reference(r) => r
                .named
                .clone()
                .unwrap_or_else(|| "(explicit)".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_references_accept_constant_entities() {
        assert!(ObjectKind::EntityRef.accepts(ObjectKind::EntityDef));
        assert!(ObjectKind::EntityRef.accepts(ObjectKind::ConstantEntityDef));
        assert!(!ObjectKind::EntityRef.accepts(ObjectKind::TraitDef));
        assert!(ObjectKind::AttributeRef.accepts(ObjectKind::EntityAttributeDef));
    }

    #[test]
    fn reference_kind_maps_definitions() {
        assert_eq!(ObjectKind::TraitDef.reference_kind(), ObjectKind::TraitRef);
        assert_eq!(
            ObjectKind::TypeAttributeDef.reference_kind(),
            ObjectKind::AttributeRef
        );
        assert_eq!(ObjectKind::EntityRef.reference_kind(), ObjectKind::EntityRef);
    }
}
