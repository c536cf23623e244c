//! Corpus configuration: an optional JSON file plus flag overrides.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use schemaweave_model::{CorpusConfig, StatusLevel};

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// JSON file with corpus settings (missing fields take defaults).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Maximum entity-attribute nesting before references are forced.
    #[arg(long, global = true)]
    pub max_depth: Option<u32>,

    /// Lowest status level shown: info, progress, warning or error.
    #[arg(long, global = true, value_parser = parse_level)]
    pub report_threshold: Option<StatusLevel>,
}

pub fn parse_level(value: &str) -> Result<StatusLevel> {
    serde_json::from_value(serde_json::Value::String(value.to_ascii_lowercase()))
        .map_err(|_| anyhow!("unknown status level `{value}` (expected info, progress, warning or error)"))
}

impl ConfigArgs {
    pub fn load(&self) -> Result<CorpusConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))?
            }
            None => CorpusConfig::default(),
        };
        if let Some(depth) = self.max_depth {
            config.max_relationship_depth = depth;
        }
        if let Some(level) = self.report_threshold {
            config.report_threshold = level;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.json");
        fs::write(&path, r#"{"maxRelationshipDepth": 5, "reportThreshold": "warning"}"#).unwrap();

        let args = ConfigArgs {
            config: Some(path),
            max_depth: Some(1),
            report_threshold: None,
        };
        let config = args.load().unwrap();
        assert_eq!(config.max_relationship_depth, 1);
        assert_eq!(config.report_threshold, StatusLevel::Warning);
    }

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(parse_level("Error").unwrap(), StatusLevel::Error);
        assert!(parse_level("loud").is_err());
    }
}
