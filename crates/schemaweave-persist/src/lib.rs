//! Schemaweave persistence
//!
//! Moves documents between their JSON form and a [`schemaweave_model::Corpus`]:
//! - `data`: the on-disk shapes and the field sniffing that picks a kind
//! - `reader` / `writer`: JSON ↔ object graph, and whole corpora back to disk
//! - `loader`: whole-folder loading and on-demand import fetching
//! - `derive`: single-entity documents built from resolved entities

pub mod data;
pub mod derive;
pub mod loader;
pub mod reader;
pub mod writer;

pub use data::{sniff_attribute, sniff_definition, AttributeShape, DefinitionShape, DocumentData, ImportData};
pub use derive::derive_resolved_document;
pub use loader::{is_document_file, load_corpus, FolderLoader, FsImportLoader};
pub use reader::{load_document, populate_document};
pub use writer::{document_to_data, document_to_string, persist_corpus, persist_document, persist_folder};
