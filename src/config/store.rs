use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where the session tokens live. We differentiate backends via a "type" tag in the YAML.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq, JsonSchema)]
#[serde(tag = "type")]
pub enum StoreConfig {
    /// Tokens are lost when the process exits.
    #[default]
    #[serde(rename = "memory")]
    Memory,
    /// Tokens are kept in a JSON file and survive restarts.
    #[serde(rename = "file")]
    File(FileStoreConfig),
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct FileStoreConfig {
    pub path: PathBuf,
}
