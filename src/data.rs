//! Collection Data
//!
//! Raw shapes of scripts and shared functions as they appear in collection
//! YAML files. Nothing here is validated beyond field names; parsing into the
//! compiler's own types happens in `function`, `call` and `script`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScriptData {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call: Option<CallData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs: Option<DocumentationData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommend: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FunctionData {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<ParameterDefinitionData>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call: Option<CallData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterDefinitionData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionCallData {
    #[serde(default)]
    pub function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<IndexMap<String, String>>,
}

/// `call:` holds either one call or a list of calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallData {
    Single(FunctionCallData),
    Sequence(Vec<FunctionCallData>),
}

/// `docs:` holds either one string or a list of strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentationData {
    Single(String),
    Multiple(Vec<String>),
}

impl DocumentationData {
    /// Non-empty entries in declaration order.
    pub fn entries(&self) -> Vec<String> {
        let raw: Vec<&String> = match self {
            DocumentationData::Single(doc) => vec![doc],
            DocumentationData::Multiple(docs) => docs.iter().collect(),
        };
        raw.into_iter()
            .filter(|doc| !doc.trim().is_empty())
            .cloned()
            .collect()
    }
}

/// Shared functions and scripts of one collection file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionData {
    #[serde(default)]
    pub functions: Vec<FunctionData>,
    #[serde(default)]
    pub scripts: Vec<ScriptData>,
}

impl CollectionData {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}
