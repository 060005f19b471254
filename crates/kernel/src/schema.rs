//! Schema files: entity metadata plus filter declarations.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::filter::FilterDeclaration;
use crate::metadata::{EntityMetadata, MetadataRegistry};

/// Everything the pipeline needs to know about a set of resources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub entities: Vec<EntityMetadata>,

    #[serde(default)]
    pub filters: Vec<FilterDeclaration>,
}

impl Schema {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn registry(&self) -> MetadataRegistry {
        self.entities.iter().cloned().collect()
    }
}
