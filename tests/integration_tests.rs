//! Integration tests for the complete Schemaweave pipeline
//!
//! These tests go from JSON documents on disk through loading, validation and
//! resolution:
//! - Folder loading → pipeline → resolved attributes
//! - Moniker-qualified lookups across imports
//! - Resolved entity → derived document → re-resolution
//!
//! Run with: cargo test --test integration_tests

use std::fs;
use std::path::Path;
use std::rc::Rc;

use schemaweave_model::{
    Corpus, CorpusConfig, ObjectId, ResolveOptions, StatusLevel, TraitDirectiveSet, ValidationStep,
};
use schemaweave_persist::{derive_resolved_document, load_corpus, load_document};
use tempfile::tempdir;

fn write(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn errors(corpus: &Corpus) -> Vec<String> {
    corpus
        .status()
        .events_at(StatusLevel::Error)
        .map(|e| e.message.clone())
        .collect()
}

fn validated(root: &Path) -> Corpus {
    let mut corpus = load_corpus(root, CorpusConfig::default()).expect("load corpus");
    assert_eq!(corpus.resolve_loaded(ValidationStep::Finished), ValidationStep::Finished);
    assert!(errors(&corpus).is_empty(), "{:?}", errors(&corpus));
    corpus
}

fn entity(corpus: &Corpus, path: &str) -> ObjectId {
    corpus.fetch_object(path).unwrap_or_else(|| panic!("no entity at {path}"))
}

fn options(corpus: &Corpus, document: &str, directives: &str) -> ResolveOptions {
    ResolveOptions::new(corpus.document_by_path(document), TraitDirectiveSet::parse(directives))
}

const PEOPLE_AND_ORDERS: &str = r#"{
    "definitions": [
        {
            "entityName": "Person",
            "hasAttributes": [
                {"name": "personId", "dataType": "string"},
                {"name": "name", "dataType": "string"}
            ],
            "exhibitsTraits": [{
                "traitReference": "is.identifiedBy",
                "arguments": ["Person/(resolvedAttributes)/personId"]
            }]
        },
        {
            "entityName": "Order",
            "hasAttributes": [
                {"name": "orderId", "dataType": "string"},
                {
                    "name": "owner",
                    "entity": "Person",
                    "appliedTraits": [{
                        "traitReference": "does.referenceEntityVia",
                        "arguments": [{"name": "foreignKeyAttribute", "value": {"name": "{a}Id", "dataType": "string"}}]
                    }]
                }
            ]
        }
    ]
}"#;

// ============================================================================
// Inheritance and primary keys
// ============================================================================

#[test]
fn test_inherited_attributes_come_first_and_keep_their_keys() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "base.cdm.json",
        r#"{"definitions": [
            {
                "entityName": "Base",
                "hasAttributes": [{"name": "id", "dataType": "string"}],
                "exhibitsTraits": [{"traitReference": "is.identifiedBy", "arguments": ["Base/(resolvedAttributes)/id"]}]
            },
            {
                "entityName": "A",
                "extendsEntity": "Base",
                "hasAttributes": [{"name": "name", "dataType": "string"}]
            }
        ]}"#,
    );
    let mut corpus = validated(dir.path());

    let a = entity(&corpus, "/base.cdm.json/A");
    let opts = options(&corpus, "/base.cdm.json", "");
    let attributes = corpus.resolved_attributes(a, &opts);
    assert_eq!(attributes.names(), vec!["id", "name"]);

    // The key is read from the entity's identifying trait.
    let resolved = corpus.resolve_entity(a, &opts).unwrap();
    let key = resolved
        .traits
        .find("is.identifiedBy")
        .and_then(|rt| rt.parameter_values.value_by_name("attribute"))
        .and_then(|v| v.as_object())
        .and_then(|id| corpus.object(id))
        .map(|o| o.display_name());
    assert_eq!(key.as_deref(), Some("Base/(resolvedAttributes)/id"));
    assert_eq!(resolved.primary_key.as_deref(), Some("id"));
}

#[test]
fn test_resolution_is_cached_per_directive_tag() {
    let dir = tempdir().unwrap();
    write(dir.path(), "model.cdm.json", PEOPLE_AND_ORDERS);
    let mut corpus = validated(dir.path());

    let order = entity(&corpus, "/model.cdm.json/Order");
    let plain = options(&corpus, "/model.cdm.json", "");
    let first = corpus.resolved_attributes(order, &plain);
    let second = corpus.resolved_attributes(order, &plain);
    assert!(Rc::ptr_eq(&first, &second));

    let reference_only = options(&corpus, "/model.cdm.json", "referenceOnly");
    let third = corpus.resolved_attributes(order, &reference_only);
    assert_eq!(first.names(), vec!["orderId", "personId", "name"]);
    assert_eq!(third.names(), vec!["orderId", "ownerId"]);
}

// ============================================================================
// Imports and monikers
// ============================================================================

#[test]
fn test_moniker_prefix_picks_the_named_import() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "base.cdm.json",
        r#"{"definitions": [{"entityName": "Widget", "hasAttributes": [{"name": "right", "dataType": "string"}]}]}"#,
    );
    write(
        dir.path(),
        "other.cdm.json",
        r#"{"definitions": [{"entityName": "Widget", "hasAttributes": [{"name": "wrong", "dataType": "string"}]}]}"#,
    );
    write(
        dir.path(),
        "main.cdm.json",
        r#"{
            "imports": [
                {"corpusPath": "other.cdm.json"},
                {"corpusPath": "base.cdm.json", "moniker": "b"}
            ],
            "definitions": [{"entityName": "Gadget", "extendsEntity": "b/Widget"}]
        }"#,
    );
    let mut corpus = validated(dir.path());

    let gadget = entity(&corpus, "/main.cdm.json/Gadget");
    let opts = options(&corpus, "/main.cdm.json", "");
    assert_eq!(corpus.resolved_attributes(gadget, &opts).names(), vec!["right"]);
}

// ============================================================================
// Cycles
// ============================================================================

#[test]
fn test_mutually_referencing_entities_resolve_finitely() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "cycle.cdm.json",
        r#"{"definitions": [
            {
                "entityName": "Left",
                "hasAttributes": [{"name": "leftId", "dataType": "string"}, {"name": "right", "entity": "Right"}]
            },
            {
                "entityName": "Right",
                "hasAttributes": [{"name": "rightId", "dataType": "string"}, {"name": "left", "entity": "Left"}]
            }
        ]}"#,
    );
    let mut corpus = validated(dir.path());

    let left = entity(&corpus, "/cycle.cdm.json/Left");
    let opts = options(&corpus, "/cycle.cdm.json", "");
    let attributes = corpus.resolved_attributes(left, &opts);
    let names = attributes.names();
    assert_eq!(names.first(), Some(&"leftId"));
    assert!(names.contains(&"rightId"));
}

// ============================================================================
// Derived documents
// ============================================================================

#[test]
fn test_derived_document_round_trip() {
    let dir = tempdir().unwrap();
    write(dir.path(), "model.cdm.json", PEOPLE_AND_ORDERS);
    let mut corpus = validated(dir.path());

    let order = entity(&corpus, "/model.cdm.json/Order");
    let opts = options(&corpus, "/model.cdm.json", "");
    let resolved = corpus.resolve_entity(order, &opts).unwrap();
    let original = resolved.attribute_names();
    assert_eq!(original, vec!["orderId", "personId", "name"]);

    let derived = derive_resolved_document(&corpus, &resolved).unwrap();
    let text = serde_json::to_string_pretty(&derived).unwrap();
    let out = dir.path().join("derived");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("Order.cdm.json"), &text).unwrap();

    let doc = load_document(&mut corpus, "/derived/Order.cdm.json", &fs::read_to_string(out.join("Order.cdm.json")).unwrap())
        .unwrap();
    assert_eq!(corpus.resolve_loaded(ValidationStep::Finished), ValidationStep::Finished);
    assert!(errors(&corpus).is_empty(), "{:?}", errors(&corpus));

    let copy = corpus.document(doc).unwrap().definitions[0];
    let opts = options(&corpus, "/derived/Order.cdm.json", "");
    let again = corpus.resolve_entity(copy, &opts).unwrap();
    assert_eq!(again.attribute_names(), original);
}
