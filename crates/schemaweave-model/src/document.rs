//! Documents and folders.
//!
//! A document owns an ordered list of top-level definitions and an ordered
//! list of imports. The per-document lookup tables (`declarations`,
//! `monikers`, `flat_imports`) are caches: they are rebuilt by the pipeline's
//! `imports` and `declarations` stages and dropped by `Corpus::refresh_document`.

use std::fmt;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::arena::ObjectId;

/// Index of a document in the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocId(pub(crate) u32);

impl DocId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// Index of a folder in the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderId(pub(crate) u32);

impl FolderId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// As written: relative to the importing document's folder, or absolute.
    pub corpus_path: String,
    pub moniker: Option<String>,
    /// Bound by the `imports` stage.
    pub document: Option<DocId>,
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    pub name: String,
    pub folder: Option<FolderId>,
    /// Absolute corpus path, e.g. `/core/base.cdm.json`.
    pub corpus_path: String,
    pub schema: Option<String>,
    pub schema_version: Option<String>,
    pub definitions: Vec<ObjectId>,
    pub imports: Vec<Import>,

    pub(crate) declarations: AHashMap<String, ObjectId>,
    pub(crate) monikers: AHashMap<String, DocId>,
    pub(crate) flat_imports: Vec<DocId>,
    pub(crate) needs_indexing: bool,
}

impl Document {
    pub(crate) fn new(name: impl Into<String>, folder: Option<FolderId>, corpus_path: String) -> Self {
        Self {
            name: name.into(),
            folder,
            corpus_path,
            needs_indexing: true,
            ..Self::default()
        }
    }

    /// Local declaration lookup (`Name`, `Entity/hasAttributes/att`, ...).
    pub fn declaration(&self, path: &str) -> Option<ObjectId> {
        self.declarations.get(path).copied()
    }

    pub fn declarations(&self) -> impl Iterator<Item = (&str, ObjectId)> {
        self.declarations.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Transitively flattened un-monikered imports, dependencies first.
    pub fn flat_imports(&self) -> &[DocId] {
        &self.flat_imports
    }

    pub fn moniker(&self, moniker: &str) -> Option<DocId> {
        self.monikers.get(moniker).copied()
    }

    pub fn needs_indexing(&self) -> bool {
        self.needs_indexing
    }

    pub(crate) fn clear_caches(&mut self) {
        self.declarations.clear();
        self.monikers.clear();
        self.flat_imports.clear();
        self.needs_indexing = true;
    }
}

#[derive(Debug, Clone, Default)]
pub struct Folder {
    pub name: String,
    pub parent: Option<FolderId>,
    /// Absolute path ending in `/`.
    pub corpus_path: String,
    pub children: Vec<FolderId>,
    pub documents: Vec<DocId>,
}

/// Join `path` onto `folder_path`, folding `.` and `..` segments.
///
/// Absolute inputs (leading `/`) ignore the folder.
pub fn make_absolute(path: &str, folder_path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", folder_path.trim_end_matches('/'), path)
    };
    let mut parts: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_absolute_handles_relative_and_parent_segments() {
        assert_eq!(make_absolute("base.cdm.json", "/core/"), "/core/base.cdm.json");
        assert_eq!(make_absolute("../x.cdm.json", "/core/sub/"), "/core/x.cdm.json");
        assert_eq!(make_absolute("/abs/y.cdm.json", "/core/"), "/abs/y.cdm.json");
        assert_eq!(make_absolute("./z.cdm.json", "/"), "/z.cdm.json");
    }
}
