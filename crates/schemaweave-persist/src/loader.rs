//! Reading corpora from disk.
//!
//! [`FolderLoader`] maps a directory tree onto corpus folders and documents
//! in one synchronous pass. [`FsImportLoader`] fetches individual imports on
//! demand for [`Corpus::resolve_imports`].

use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use walkdir::WalkDir;

use schemaweave_model::{Corpus, CorpusConfig, DocId, ImportLoader, ModelError, StatusLevel};

use crate::reader::load_document;

/// Whether `file_name` is a document: everything from its first `.` must
/// equal `postfix` (see [`CorpusConfig::document_postfix`]).
pub fn is_document_file(file_name: &str, postfix: &str) -> bool {
    match file_name.find('.') {
        Some(dot) => dot > 0 && &file_name[dot..] == postfix,
        None => false,
    }
}

/// Corpus path for a file path relative to the corpus root.
fn corpus_path_of(relative: &Path) -> Option<String> {
    let mut path = String::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                path.push('/');
                path.push_str(part.to_str()?);
            }
            _ => return None,
        }
    }
    Some(path)
}

/// Loads every document below a root directory.
#[derive(Debug, Clone)]
pub struct FolderLoader {
    root: PathBuf,
    postfix: String,
    ignore_folders: Vec<String>,
}

impl FolderLoader {
    pub fn new(root: impl Into<PathBuf>, config: &CorpusConfig) -> Self {
        Self {
            root: root.into(),
            postfix: config.document_postfix(),
            ignore_folders: config.ignore_folders.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_ignored(&self, entry: &walkdir::DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && self
                .ignore_folders
                .iter()
                .any(|name| entry.file_name().to_str() == Some(name.as_str()))
    }

    /// Add the tree to `corpus`, returning the number of documents read.
    /// Unreadable files are reported to the corpus status and skipped.
    pub fn load_into(&self, corpus: &mut Corpus) -> Result<usize> {
        if !self.root.is_dir() {
            return Err(anyhow!("expected directory: {}", self.root.display()));
        }

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_ignored(e));

        let mut loaded = 0;
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            if relative.as_os_str().is_empty() {
                continue;
            }
            let Some(corpus_path) = corpus_path_of(relative) else {
                tracing::warn!(path = %entry.path().display(), "skipping non-UTF-8 path");
                continue;
            };

            if entry.file_type().is_dir() {
                corpus.folder_for_path(&format!("{corpus_path}/"))?;
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !entry.file_type().is_file() || !is_document_file(&name, &self.postfix) {
                continue;
            }

            let text = match std::fs::read_to_string(entry.path()) {
                Ok(text) => text,
                Err(err) => {
                    let message = format!("unable to read document: {err}");
                    corpus.status_mut().report(StatusLevel::Error, &message, &corpus_path);
                    continue;
                }
            };
            load_document(corpus, &corpus_path, &text)?;
            loaded += 1;
        }

        tracing::info!(root = %self.root.display(), documents = loaded, "corpus folder loaded");
        Ok(loaded)
    }
}

/// Build a corpus from a folder with the given configuration.
pub fn load_corpus(root: impl Into<PathBuf>, config: CorpusConfig) -> Result<Corpus> {
    let loader = FolderLoader::new(root, &config);
    let mut corpus = Corpus::new(config);
    loader.load_into(&mut corpus)?;
    Ok(corpus)
}

/// Fetches imports from the filesystem, resolving corpus paths against a
/// root directory.
#[derive(Debug, Clone)]
pub struct FsImportLoader {
    root: PathBuf,
}

impl FsImportLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file_for(&self, corpus_path: &str) -> Result<PathBuf> {
        let relative = Path::new(corpus_path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(ModelError::ImportFailed {
                path: corpus_path.to_string(),
                reason: "path escapes the corpus root".to_string(),
            }
            .into());
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait(?Send)]
impl ImportLoader for FsImportLoader {
    async fn fetch(&self, corpus_path: &str) -> Result<String> {
        let file = self.file_for(corpus_path)?;
        match tokio::fs::read_to_string(&file).await {
            Ok(text) => Ok(text),
            Err(err) => Err(ModelError::ImportFailed {
                path: corpus_path.to_string(),
                reason: err.to_string(),
            }
            .into()),
        }
    }

    fn materialize(&self, corpus: &mut Corpus, corpus_path: &str, text: &str) -> Result<DocId> {
        load_document(corpus, corpus_path, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_file_names() {
        assert!(is_document_file("person.cdm.json", ".cdm.json"));
        assert!(!is_document_file("person.1.2.cdm.json", ".cdm.json"));
        assert!(is_document_file("person.1.2.cdm.json", ".1.2.cdm.json"));
        assert!(!is_document_file("person.cdm.json", ".1.2.cdm.json"));
        assert!(!is_document_file(".cdm.json", ".cdm.json"));
        assert!(!is_document_file("person.json", ".cdm.json"));
        assert!(!is_document_file("person", ".cdm.json"));
    }

    #[test]
    fn corpus_paths_use_forward_slashes() {
        let relative: PathBuf = ["core", "person.cdm.json"].iter().collect();
        assert_eq!(corpus_path_of(&relative).as_deref(), Some("/core/person.cdm.json"));
        assert_eq!(corpus_path_of(Path::new("../up.cdm.json")), None);
    }

    #[test]
    fn import_paths_cannot_escape_the_root() {
        let loader = FsImportLoader::new("/tmp/corpus");
        assert!(loader.file_for("/../secret.cdm.json").is_err());
        assert_eq!(
            loader.file_for("/lib/base.cdm.json").unwrap(),
            Path::new("/tmp/corpus/lib/base.cdm.json")
        );
    }
}
