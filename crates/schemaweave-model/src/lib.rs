//! Schemaweave: a semantic-schema object model and resolver.
//!
//! A corpus holds documents of named definitions (data types, traits,
//! entities, attributes, attribute groups, constant tables) that refer to
//! each other by name across imports. Resolution turns that graph into
//! flat, trait-annotated attribute lists per entity:
//!
//! ```text
//!   documents ──► imports/monikers ──► declarations ──► references
//!        │                                                 │
//!        ▼                                                 ▼
//!   trait sets (inherited, argument-bound) ──► appliers ──► resolved attributes
//!                                                           │
//!                                                           ▼
//!                                                 entity references + graph
//! ```
//!
//! ## Module Organization
//!
//! - `corpus`: the object arena, documents, folders and the mutation API
//! - `resolver`: symbol and reference lookup
//! - `traits` / `parameter`: resolved trait sets and argument binding
//! - `applier`: priority-ordered attribute rewriting rules
//! - `construct` / `attributes`: resolved attribute construction
//! - `entity_refs`: foreign-key discovery and the relationship graph
//! - `pipeline`: the staged validation run

pub mod applier;
pub mod arena;
pub mod attribute_context;
pub mod attributes;
pub mod builtins;
pub mod config;
pub mod construct;
pub mod context;
pub mod corpus;
pub mod document;
pub mod entity_refs;
pub mod error;
pub mod object;
pub mod options;
pub mod parameter;
pub mod pipeline;
pub mod properties;
pub mod resolver;
pub mod status;
pub mod traits;

// Re-export key types
pub use applier::{ApplierRegistry, ApplierServices, ApplyScope, AttributeAddition, AttributeApplier, AttributeSeed};
pub use arena::ObjectId;
pub use attribute_context::{AttributeContextTree, AttributeContextType, ContextNodeId};
pub use attributes::{AttributeTarget, ResolvedAttribute, ResolvedAttributeSet};
pub use config::CorpusConfig;
pub use construct::ResolvedEntity;
pub use corpus::{Corpus, CorpusGraph};
pub use document::{DocId, Document, FolderId, Import};
pub use entity_refs::{EntityGraph, EntityRelationship, ResolvedEntityReference, ResolvedEntityReferenceSet};
pub use error::{ModelError, ModelResult};
pub use object::{
    Argument, AttributeContextDef, AttributeGroupDef, CdmObject, ConstantEntityDef, ConstantTable, DataTypeDef,
    Definition, DefinitionVariant, EntityAttributeDef, EntityDef, ObjectBody, ObjectKind, ObjectReference, Parameter,
    ParameterValue, RelationshipDef, TraitDef, TypeAttributeDef,
};
pub use options::{ResolveOptions, TraitDirectiveSet};
pub use pipeline::{ImportLoader, ValidationStep};
pub use properties::AttributeProperties;
pub use resolver::Resolver;
pub use status::{StatusCallback, StatusEvent, StatusLevel, StatusReporter};
pub use traits::{ResolvedTrait, ResolvedTraitSet, TraitSet};
