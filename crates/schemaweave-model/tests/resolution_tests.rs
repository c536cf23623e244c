mod common;

use std::rc::Rc;

use common::*;
use schemaweave_model::{Corpus, DocId, ObjectKind, ParameterValue, TraitSet, ValidationStep};

fn indexed_corpus() -> (Corpus, DocId) {
    let mut corpus = Corpus::default();
    let doc = corpus.add_document_at("/model.cdm.json").unwrap();
    (corpus, doc)
}

#[test]
fn inherited_attributes_precede_own_ones() {
    let (mut corpus, doc) = indexed_corpus();
    let (_, derived) = base_and_derived(&mut corpus, doc);
    assert_eq!(corpus.resolve_loaded(ValidationStep::Declarations), ValidationStep::Finished);

    let opts = options(doc, "");
    let attributes = corpus.resolved_attributes(derived, &opts);
    assert_eq!(attributes.names(), vec!["id", "name", "title"]);

    let resolved = corpus.resolve_entity(derived, &opts).unwrap();
    assert_eq!(resolved.name, "A");
    assert_eq!(resolved.attribute_names(), vec!["id", "name", "title"]);
    assert!(resolved.traits.find("is.identifiedBy").is_some());
}

#[test]
fn identifying_trait_marks_only_the_key_attribute() {
    let (mut corpus, doc) = indexed_corpus();
    let identified = trait_ref(
        &mut corpus,
        doc,
        "is.identifiedBy",
        &[("attribute", ParameterValue::text("Base/(resolvedAttributes)/id"))],
    );
    let id = type_attribute(&mut corpus, doc, "id", "string", vec![identified]);
    let base = entity(&mut corpus, doc, "Base", None, vec![id], Vec::new());
    let name = type_attribute(&mut corpus, doc, "name", "string", Vec::new());
    let derived = entity(&mut corpus, doc, "A", Some("Base"), vec![name], Vec::new());
    corpus.resolve_loaded(ValidationStep::Declarations);

    let opts = options(doc, "");
    let attributes = corpus.resolved_attributes(derived, &opts);
    assert_eq!(attributes.names(), vec!["id", "name"]);
    assert!(attributes.get("id").unwrap().properties().is_primary_key);
    assert!(!attributes.get("name").unwrap().properties().is_primary_key);
    assert_eq!(attributes.inherited_count(), 1);
    assert!(attributes.is_inherited("id"));
    assert!(!attributes.is_inherited("name"));

    let base_attributes = corpus.resolved_attributes(base, &opts);
    assert_eq!(base_attributes.inherited_count(), 0);

    let resolved = corpus.resolve_entity(derived, &opts).unwrap();
    assert_eq!(resolved.primary_key.as_deref(), Some("id"));
}

#[test]
fn data_type_traits_flow_into_attributes() {
    let (mut corpus, doc) = indexed_corpus();
    let (base, _) = base_and_derived(&mut corpus, doc);
    corpus.resolve_loaded(ValidationStep::Declarations);

    let attributes = corpus.resolved_attributes(base, &options(doc, ""));
    let id = attributes.get("id").unwrap();
    assert!(id.traits.find("is.dataFormat.character").is_some());
    assert_eq!(id.properties().data_format.as_deref(), Some("character"));
}

#[test]
fn attribute_sets_are_cached_until_the_corpus_changes() {
    let (mut corpus, doc) = indexed_corpus();
    let (base, _) = base_and_derived(&mut corpus, doc);
    corpus.resolve_loaded(ValidationStep::Declarations);
    let opts = options(doc, "");

    let first = corpus.resolved_attributes(base, &opts);
    let second = corpus.resolved_attributes(base, &opts);
    assert!(Rc::ptr_eq(&first, &second));

    let nullable = trait_ref(&mut corpus, doc, "is.nullable", &[]);
    corpus.add_exhibited_trait(base, nullable).unwrap();
    let third = corpus.resolved_attributes(base, &opts);
    assert!(!Rc::ptr_eq(&first, &third));
    assert_eq!(third.names(), first.names());
}

#[test]
fn extends_cycle_terminates() {
    let (mut corpus, doc) = indexed_corpus();
    let a_attr = type_attribute(&mut corpus, doc, "a", "string", Vec::new());
    let b_attr = type_attribute(&mut corpus, doc, "b", "string", Vec::new());
    let a = entity(&mut corpus, doc, "CycleA", Some("CycleB"), vec![a_attr], Vec::new());
    entity(&mut corpus, doc, "CycleB", Some("CycleA"), vec![b_attr], Vec::new());
    corpus.resolve_loaded(ValidationStep::Declarations);

    let opts = options(doc, "");
    let attributes = corpus.resolved_attributes(a, &opts);
    assert_eq!(attributes.names(), vec!["b", "a"]);
    // Trait resolution over the same cycle also terminates.
    let traits = corpus.resolved_traits(a, TraitSet::All, &opts);
    assert!(traits.find("is.identifiedBy").is_none());
}

#[test]
fn entity_attributes_inline_their_target_by_default() {
    let (mut corpus, doc) = indexed_corpus();
    let (_, order) = person_and_order(&mut corpus, doc);
    corpus.resolve_loaded(ValidationStep::Declarations);

    let resolved = corpus.resolve_entity(order, &options(doc, "")).unwrap();
    assert_eq!(resolved.attributes.names(), vec!["orderId", "personId", "name"]);
    assert_eq!(resolved.attribute_names(), vec!["orderId", "personId", "name"]);
}

#[test]
fn structured_entity_attributes_nest() {
    let (mut corpus, doc) = indexed_corpus();
    let (_, order) = person_and_order(&mut corpus, doc);
    corpus.resolve_loaded(ValidationStep::Declarations);

    let resolved = corpus.resolve_entity(order, &options(doc, "structured")).unwrap();
    assert_eq!(resolved.attributes.names(), vec!["orderId", "owner"]);
    let nested = resolved.attributes.get("owner").and_then(|ra| ra.nested()).unwrap();
    assert_eq!(nested.names(), vec!["personId", "name"]);
    assert_eq!(resolved.attribute_names(), vec!["orderId", "owner/personId", "owner/name"]);
}

#[test]
fn reference_only_swaps_entity_for_foreign_key() {
    let (mut corpus, doc) = indexed_corpus();
    let (_, order) = person_and_order(&mut corpus, doc);
    corpus.resolve_loaded(ValidationStep::Declarations);

    let opts = options(doc, "referenceOnly");
    let attributes = corpus.resolved_attributes(order, &opts);
    assert_eq!(attributes.names(), vec!["orderId", "ownerId"]);

    let fk = attributes.get("ownerId").unwrap();
    let linked = fk.traits.find("is.linkedEntity.identifier").unwrap();
    assert!(matches!(
        linked.parameter_values.value_by_name("entityReferences"),
        Some(ParameterValue::Object(_))
    ));
}

#[test]
fn max_depth_turns_deep_entity_attributes_into_references() {
    let (mut corpus, doc) = indexed_corpus();
    let (_, order) = person_and_order(&mut corpus, doc);
    corpus.resolve_loaded(ValidationStep::Declarations);

    // At depth zero no nesting is allowed, so `owner` stays a reference.
    let opts = options(doc, "").with_max_depth(0);
    let attributes = corpus.resolved_attributes(order, &opts);
    assert_eq!(attributes.names(), vec!["orderId", "ownerId"]);
}

#[test]
fn explain_array_expands_ordinal_copies() {
    let (mut corpus, doc) = indexed_corpus();
    let impose = trait_ref(
        &mut corpus,
        doc,
        "does.imposeDirectives",
        &[("directives", ParameterValue::text("isArray"))],
    );
    let explain = trait_ref(
        &mut corpus,
        doc,
        "does.explainArray",
        &[("maximumExpansion", ParameterValue::text("2"))],
    );
    let phone = type_attribute(&mut corpus, doc, "phone", "string", vec![impose, explain]);
    let contact = entity(&mut corpus, doc, "Contact", None, vec![phone], Vec::new());
    corpus.resolve_loaded(ValidationStep::Declarations);

    let attributes = corpus.resolved_attributes(contact, &options(doc, ""));
    assert_eq!(attributes.names(), vec!["phone0", "phone1"]);
    assert_eq!(attributes.get("phone1").unwrap().state().array_ordinal, Some(1));
}

#[test]
fn removed_attributes_are_dropped() {
    let (mut corpus, doc) = indexed_corpus();
    let removed = trait_ref(&mut corpus, doc, "is.removed", &[]);
    let keep = type_attribute(&mut corpus, doc, "keep", "string", Vec::new());
    let dropped = type_attribute(&mut corpus, doc, "drop", "string", vec![removed]);
    let e = entity(&mut corpus, doc, "Trimmed", None, vec![keep, dropped], Vec::new());
    corpus.resolve_loaded(ValidationStep::Declarations);

    let attributes = corpus.resolved_attributes(e, &options(doc, ""));
    assert_eq!(attributes.names(), vec!["keep"]);
}

#[test]
fn symbols_resolve_through_monikers_only_when_prefixed() {
    let mut corpus = Corpus::default();
    let lib = corpus.add_document_at("/lib/widgets.cdm.json").unwrap();
    let widget = entity(&mut corpus, lib, "Widget", None, Vec::new(), Vec::new());
    let main = corpus.add_document_at("/main.cdm.json").unwrap();
    corpus.add_import(main, "lib/widgets.cdm.json", Some("b")).unwrap();
    assert_eq!(corpus.resolve_loaded(ValidationStep::Declarations), ValidationStep::Finished);

    assert_eq!(corpus.resolve_symbol("b/Widget", ObjectKind::EntityRef, Some(main)), Some(widget));
    assert_eq!(corpus.resolve_symbol("Widget", ObjectKind::EntityRef, Some(main)), None);
    assert_eq!(
        corpus.fetch_object("/lib/widgets.cdm.json/Widget"),
        Some(widget)
    );
}

#[test]
fn newest_import_wins_for_unmonikered_lookups() {
    let mut corpus = Corpus::default();
    let first = corpus.add_document_at("/first.cdm.json").unwrap();
    entity(&mut corpus, first, "Shared", None, Vec::new(), Vec::new());
    let second = corpus.add_document_at("/second.cdm.json").unwrap();
    let from_second = entity(&mut corpus, second, "Shared", None, Vec::new(), Vec::new());
    let main = corpus.add_document_at("/main.cdm.json").unwrap();
    corpus.add_import(main, "first.cdm.json", None).unwrap();
    corpus.add_import(main, "second.cdm.json", None).unwrap();
    corpus.resolve_loaded(ValidationStep::Declarations);

    assert_eq!(
        corpus.resolve_symbol("Shared", ObjectKind::EntityRef, Some(main)),
        Some(from_second)
    );
}
