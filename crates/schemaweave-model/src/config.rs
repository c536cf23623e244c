use serde::{Deserialize, Serialize};

use crate::options::TraitDirectiveSet;
use crate::status::StatusLevel;

pub const DEFAULT_MAX_DEPTH: u32 = 2;

/// Corpus-wide settings. Missing fields in a config file take the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CorpusConfig {
    pub report_threshold: StatusLevel,
    pub error_threshold: StatusLevel,
    pub max_relationship_depth: u32,
    /// Directives used by pipeline runs.
    pub default_directives: Vec<String>,
    /// Suffix identifying document files.
    pub document_suffix: String,
    /// When set, only `<name>.<version><suffix>` files are documents.
    pub version: Option<String>,
    /// Folder names skipped while loading, at any depth.
    pub ignore_folders: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            report_threshold: StatusLevel::Info,
            error_threshold: StatusLevel::Error,
            max_relationship_depth: DEFAULT_MAX_DEPTH,
            default_directives: vec!["normalized".to_string(), "referenceOnly".to_string()],
            document_suffix: ".cdm.json".to_string(),
            version: None,
            ignore_folders: Vec::new(),
        }
    }
}

impl CorpusConfig {
    pub fn directives(&self) -> TraitDirectiveSet {
        self.default_directives.iter().cloned().collect()
    }

    /// Everything after the first `.` of a document file name.
    pub fn document_postfix(&self) -> String {
        match &self.version {
            Some(version) => format!(".{version}{}", self.document_suffix),
            None => self.document_suffix.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: CorpusConfig = serde_json::from_str(r#"{"maxRelationshipDepth": 4}"#).unwrap();
        assert_eq!(cfg.max_relationship_depth, 4);
        assert_eq!(cfg.document_suffix, ".cdm.json");
        assert_eq!(cfg.directives().tag(), "normalized-referenceOnly");
        assert_eq!(cfg.document_postfix(), ".cdm.json");
        assert!(cfg.ignore_folders.is_empty());
    }

    #[test]
    fn versions_extend_the_document_postfix() {
        let cfg: CorpusConfig =
            serde_json::from_str(r#"{"version": "0.7", "ignoreFolders": ["staging"]}"#).unwrap();
        assert_eq!(cfg.document_postfix(), ".0.7.cdm.json");
        assert_eq!(cfg.ignore_folders, vec!["staging"]);
    }
}
