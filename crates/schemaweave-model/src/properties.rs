//! Properties read off resolved traits.

use serde::Serialize;

use crate::attributes::ResolvedAttribute;
use crate::traits::ResolvedTraitSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeProperties {
    pub is_primary_key: bool,
    pub is_nullable: bool,
    pub is_read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Most specific `is.dataFormat.*` trait, without the prefix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_format: Option<String>,
}

const DATA_FORMAT_PREFIX: &str = "is.dataFormat.";

impl AttributeProperties {
    pub fn from_traits(traits: &ResolvedTraitSet) -> Self {
        let text = |trait_name: &str, parameter: &str| {
            traits
                .find(trait_name)
                .and_then(|rt| rt.parameter_values.text_by_name(parameter))
                .map(str::to_string)
        };

        // The most specific format is the one with the longest lineage.
        let data_format = traits
            .iter()
            .filter(|rt| rt.trait_name.starts_with(DATA_FORMAT_PREFIX))
            .max_by_key(|rt| rt.lineage.len())
            .map(|rt| rt.trait_name[DATA_FORMAT_PREFIX.len()..].to_string());

        Self {
            is_primary_key: traits.find("is.identifiedBy").is_some(),
            is_nullable: traits.find("is.nullable").is_some(),
            is_read_only: traits.find("is.readOnly").is_some(),
            maximum_length: text("is.constrained", "maximumLength").and_then(|t| t.trim().parse().ok()),
            default_value: text("does.haveDefault", "default"),
            data_format,
        }
    }
}

impl ResolvedAttribute {
    pub fn properties(&self) -> AttributeProperties {
        AttributeProperties::from_traits(&self.traits)
    }
}
