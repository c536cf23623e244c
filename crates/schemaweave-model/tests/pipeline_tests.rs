mod common;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use common::*;
use schemaweave_model::{
    Corpus, Definition, DefinitionVariant, DocId, ImportLoader, ObjectKind, Parameter, ParameterValue, StatusLevel,
    TraitDef, ValidationStep,
};

fn errors(corpus: &Corpus) -> Vec<String> {
    corpus
        .status()
        .events_at(StatusLevel::Error)
        .map(|e| e.message.clone())
        .collect()
}

fn user_trait(corpus: &mut Corpus, doc: DocId, name: &str, parameters: Vec<Parameter>) {
    let def = Definition::new(DefinitionVariant::Trait(TraitDef {
        name: name.to_string(),
        parameters,
        ..TraitDef::default()
    }));
    corpus.add_definition(doc, def).unwrap();
}

#[test]
fn full_run_records_foreign_key_relationships() {
    let mut corpus = Corpus::default();
    let doc = corpus.add_document_at("/model.cdm.json").unwrap();
    let (person, order) = person_and_order(&mut corpus, doc);

    assert_eq!(corpus.resolve_loaded(ValidationStep::Finished), ValidationStep::Finished);
    assert!(errors(&corpus).is_empty(), "{:?}", errors(&corpus));

    let opts = corpus.default_options(Some(doc));
    let attributes = corpus.resolved_attributes(order, &opts);
    assert_eq!(attributes.names(), vec!["orderId", "ownerId"]);

    let references = corpus.entity_references(order, &opts);
    assert_eq!(references.len(), 1);
    let reference = references.iter().next().unwrap();
    assert_eq!(reference.referencing_attribute, "ownerId");
    assert_eq!(reference.referenced_entity, Some(person));
    assert_eq!(reference.referenced_attribute.as_deref(), Some("personId"));

    let outgoing = corpus.outgoing_relationships(order);
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].from_entity, "/model.cdm.json/Order");
    assert_eq!(outgoing[0].to_entity, "/model.cdm.json/Person");
    assert_eq!(corpus.incoming_relationships(person).len(), 1);
}

#[test]
fn rerunning_the_pipeline_is_stable() {
    let mut corpus = Corpus::default();
    let doc = corpus.add_document_at("/model.cdm.json").unwrap();
    person_and_order(&mut corpus, doc);

    assert_eq!(corpus.resolve_loaded(ValidationStep::Finished), ValidationStep::Finished);
    assert_eq!(corpus.resolve_loaded(ValidationStep::Finished), ValidationStep::Finished);
    assert_eq!(corpus.relationships().len(), 1);
}

#[test]
fn stopping_early_leaves_later_stages_undone() {
    let mut corpus = Corpus::default();
    let doc = corpus.add_document_at("/model.cdm.json").unwrap();
    base_and_derived(&mut corpus, doc);

    assert_eq!(corpus.resolve_loaded(ValidationStep::Imports), ValidationStep::Finished);
    assert!(corpus.document(doc).unwrap().needs_indexing());

    assert_eq!(corpus.resolve_loaded(ValidationStep::Declarations), ValidationStep::Finished);
    let document = corpus.document(doc).unwrap();
    assert!(!document.needs_indexing());
    assert!(document.declaration("Base/hasAttributes/id").is_some());
}

#[test]
fn duplicate_declarations_stop_the_run() {
    let mut corpus = Corpus::default();
    let doc = corpus.add_document_at("/dup.cdm.json").unwrap();
    entity(&mut corpus, doc, "Dup", None, Vec::new(), Vec::new());
    entity(&mut corpus, doc, "Dup", None, Vec::new(), Vec::new());

    assert_eq!(corpus.resolve_loaded(ValidationStep::Finished), ValidationStep::Error);
    assert!(errors(&corpus)
        .iter()
        .any(|m| m == "duplicate declaration for item 'Dup'"));
}

#[test]
fn unknown_trait_is_an_error() {
    let mut corpus = Corpus::default();
    let doc = corpus.add_document_at("/model.cdm.json").unwrap();
    let bogus = trait_ref(&mut corpus, doc, "no.such.trait", &[]);
    entity(&mut corpus, doc, "Broken", None, Vec::new(), vec![bogus]);

    assert_eq!(corpus.resolve_loaded(ValidationStep::Finished), ValidationStep::Error);
    assert!(errors(&corpus)
        .iter()
        .any(|m| m.contains("'no.such.trait'")));
}

#[test]
fn unknown_entity_is_only_a_warning() {
    let mut corpus = Corpus::default();
    let doc = corpus.add_document_at("/model.cdm.json").unwrap();
    let dangling = entity_attribute(&mut corpus, doc, "ghost", "Nowhere", Vec::new());
    entity(&mut corpus, doc, "Haunted", None, vec![dangling], Vec::new());

    assert_eq!(corpus.resolve_loaded(ValidationStep::References), ValidationStep::Finished);
    assert!(corpus
        .status()
        .events_at(StatusLevel::Warning)
        .any(|e| e.message.contains("'Nowhere'")));
}

#[test]
fn missing_required_argument_is_reported() {
    let mut corpus = Corpus::default();
    let doc = corpus.add_document_at("/model.cdm.json").unwrap();
    user_trait(&mut corpus, doc, "my.tagged", vec![Parameter::new("value").required()]);
    let tagged = trait_ref(&mut corpus, doc, "my.tagged", &[]);
    entity(&mut corpus, doc, "Tagged", None, Vec::new(), vec![tagged]);

    assert_eq!(corpus.resolve_loaded(ValidationStep::Finished), ValidationStep::Error);
    assert!(errors(&corpus).iter().any(|m| m
        == "no argument supplied for required parameter 'value' of trait 'my.tagged' on 'Tagged'"));
}

#[test]
fn argument_of_the_wrong_family_is_rejected() {
    let mut corpus = Corpus::default();
    let doc = corpus.add_document_at("/model.cdm.json").unwrap();
    let entity_type = corpus.make_ref(doc, ObjectKind::DataTypeRef, "entity");
    user_trait(
        &mut corpus,
        doc,
        "my.points",
        vec![Parameter::new("target").with_data_type(entity_type)],
    );
    let points = trait_ref(&mut corpus, doc, "my.points", &[("target", ParameterValue::text("string"))]);
    entity(&mut corpus, doc, "Pointer", None, Vec::new(), vec![points]);

    assert_eq!(corpus.resolve_loaded(ValidationStep::Finished), ValidationStep::Error);
    assert!(errors(&corpus).iter().any(|m| m.contains("'string' resolves to a dataType")));
}

#[test]
fn unresolved_imports_warn_and_the_run_continues() {
    let mut corpus = Corpus::default();
    let doc = corpus.add_document_at("/model.cdm.json").unwrap();
    corpus.add_import(doc, "missing.cdm.json", None).unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    corpus.set_status_callback(Box::new(move |level: StatusLevel, message: &str, _path: &str| {
        sink.borrow_mut().push((level, message.to_string()));
    }));

    assert_eq!(corpus.resolve_loaded(ValidationStep::Finished), ValidationStep::Finished);
    assert_eq!(corpus.missing_imports(), vec!["/missing.cdm.json".to_string()]);
    assert!(seen
        .borrow()
        .iter()
        .any(|(level, m)| *level == StatusLevel::Warning && m == "unable to resolve the import '/missing.cdm.json'"));
}

/// Serves documents whose text is the name of the single entity they hold.
struct MapLoader {
    files: HashMap<String, String>,
}

#[async_trait(?Send)]
impl ImportLoader for MapLoader {
    async fn fetch(&self, corpus_path: &str) -> anyhow::Result<String> {
        self.files
            .get(corpus_path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no document at {corpus_path}"))
    }

    fn materialize(&self, corpus: &mut Corpus, corpus_path: &str, text: &str) -> anyhow::Result<DocId> {
        let doc = corpus.add_document_at(corpus_path)?;
        entity(corpus, doc, text, None, Vec::new(), Vec::new());
        if text == "Middle" {
            corpus.add_import(doc, "leaf.cdm.json", None)?;
        }
        Ok(doc)
    }
}

#[tokio::test]
async fn loader_fetches_imports_transitively() {
    let mut corpus = Corpus::default();
    let main = corpus.add_document_at("/main.cdm.json").unwrap();
    corpus.add_import(main, "deps/middle.cdm.json", None).unwrap();
    corpus.add_import(main, "absent.cdm.json", None).unwrap();

    let loader = MapLoader {
        files: HashMap::from([
            ("/deps/middle.cdm.json".to_string(), "Middle".to_string()),
            ("/deps/leaf.cdm.json".to_string(), "Leaf".to_string()),
        ]),
    };

    let loaded = corpus.resolve_imports(&loader).await.unwrap();
    assert_eq!(loaded, 2);

    let step = corpus
        .validate(Some(&loader as &dyn ImportLoader), ValidationStep::Finished).await.unwrap();
    assert_eq!(step, ValidationStep::Finished);
    assert!(corpus.resolve_symbol("Middle", ObjectKind::EntityRef, Some(main)).is_some());
    // Imports are transitive for un-monikered lookups.
    assert!(corpus.resolve_symbol("Leaf", ObjectKind::EntityRef, Some(main)).is_some());
    assert!(corpus
        .status()
        .events_at(StatusLevel::Warning)
        .any(|e| e.message.starts_with("unable to load import '/absent.cdm.json'")));
}
