#![allow(dead_code)]

use schemaweave_model::{
    Argument, Corpus, Definition, DefinitionVariant, DocId, EntityAttributeDef, EntityDef, ObjectId, ObjectKind,
    ParameterValue, ResolveOptions, TraitDirectiveSet, TypeAttributeDef,
};

pub fn options(doc: DocId, directives: &str) -> ResolveOptions {
    ResolveOptions::new(Some(doc), TraitDirectiveSet::parse(directives))
}

pub fn trait_ref(corpus: &mut Corpus, doc: DocId, name: &str, args: &[(&str, ParameterValue)]) -> ObjectId {
    let arguments = args
        .iter()
        .map(|(n, v)| Argument::named(*n, v.clone()))
        .collect();
    corpus.make_trait_ref(doc, name, arguments)
}

pub fn type_attribute(corpus: &mut Corpus, doc: DocId, name: &str, data_type: &str, traits: Vec<ObjectId>) -> ObjectId {
    let dt = corpus.make_ref(doc, ObjectKind::DataTypeRef, data_type);
    let def = Definition::new(DefinitionVariant::TypeAttribute(TypeAttributeDef {
        name: name.to_string(),
        data_type: Some(dt),
        ..TypeAttributeDef::default()
    }))
    .with_traits(traits);
    corpus.define(doc, def)
}

pub fn entity_attribute(corpus: &mut Corpus, doc: DocId, name: &str, entity: &str, traits: Vec<ObjectId>) -> ObjectId {
    let target = corpus.make_ref(doc, ObjectKind::EntityRef, entity);
    let def = Definition::new(DefinitionVariant::EntityAttribute(EntityAttributeDef {
        name: name.to_string(),
        entity: Some(target),
        ..EntityAttributeDef::default()
    }))
    .with_traits(traits);
    corpus.define(doc, def)
}

pub fn entity(
    corpus: &mut Corpus,
    doc: DocId,
    name: &str,
    extends: Option<&str>,
    attributes: Vec<ObjectId>,
    traits: Vec<ObjectId>,
) -> ObjectId {
    let extends = extends.map(|base| corpus.make_ref(doc, ObjectKind::EntityRef, base));
    let def = Definition::new(DefinitionVariant::Entity(EntityDef {
        name: name.to_string(),
        extends,
        attributes,
        ..EntityDef::default()
    }))
    .with_traits(traits);
    corpus
        .add_definition(doc, def)
        .expect("document exists")
}

/// `Base { id, name }` identified by `id`, and `A extends Base { title }`.
pub fn base_and_derived(corpus: &mut Corpus, doc: DocId) -> (ObjectId, ObjectId) {
    let id = type_attribute(corpus, doc, "id", "string", Vec::new());
    let name = type_attribute(corpus, doc, "name", "string", Vec::new());
    let identified = trait_ref(
        corpus,
        doc,
        "is.identifiedBy",
        &[("attribute", ParameterValue::text("Base/(resolvedAttributes)/id"))],
    );
    let base = entity(corpus, doc, "Base", None, vec![id, name], vec![identified]);
    let title = type_attribute(corpus, doc, "title", "string", Vec::new());
    let derived = entity(corpus, doc, "A", Some("Base"), vec![title], Vec::new());
    (base, derived)
}

/// `Person { personId, name }` identified by `personId`, and
/// `Order { orderId, owner -> Person }` where `owner` becomes a foreign key
/// named `{a}Id` under reference-only resolution.
pub fn person_and_order(corpus: &mut Corpus, doc: DocId) -> (ObjectId, ObjectId) {
    let person_id = type_attribute(corpus, doc, "personId", "string", Vec::new());
    let person_name = type_attribute(corpus, doc, "name", "string", Vec::new());
    let identified = trait_ref(
        corpus,
        doc,
        "is.identifiedBy",
        &[("attribute", ParameterValue::text("Person/(resolvedAttributes)/personId"))],
    );
    let person = entity(corpus, doc, "Person", None, vec![person_id, person_name], vec![identified]);

    let order_id = type_attribute(corpus, doc, "orderId", "string", Vec::new());
    let fk_seed = type_attribute(corpus, doc, "{a}Id", "string", Vec::new());
    let via = trait_ref(
        corpus,
        doc,
        "does.referenceEntityVia",
        &[("foreignKeyAttribute", ParameterValue::Object(fk_seed))],
    );
    let owner = entity_attribute(corpus, doc, "owner", "Person", vec![via]);
    let order = entity(corpus, doc, "Order", None, vec![order_id, owner], Vec::new());
    (person, order)
}
