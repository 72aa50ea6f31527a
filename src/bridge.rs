//! Node Bridge
//!
//! JSON in, JSON out: compiles a whole collection for the desktop shell. Only
//! the `#[napi]` export is feature-gated; the conversion itself is plain Rust.

#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};

use crate::data::CollectionData;
use crate::error::Result;
use crate::language::ScriptLanguage;
use crate::options::CompileOptions;
use crate::script::{CategoryCollectionContext, Script};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInput {
    #[serde(default)]
    pub language: Option<ScriptLanguage>,
    /// Raw options, so that rule ids are reported by `CompileOptions::from_value`.
    #[serde(default)]
    pub options: Option<serde_json::Value>,
    #[serde(flatten)]
    pub data: CollectionData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledScriptOutput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<Script>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

/// Fails only when the shared functions themselves are invalid; per-script
/// failures are reported in their own output entry.
pub fn compile_collection(input: CollectionInput) -> Result<Vec<CompiledScriptOutput>> {
    let mut options = input
        .options
        .as_ref()
        .map(CompileOptions::from_value)
        .transpose()?
        .unwrap_or_default();
    if let Some(language) = input.language {
        options.language = language;
    }
    let context = CategoryCollectionContext::new(&input.data.functions, options)?;
    let results = context.parse_scripts(&input.data.scripts);
    Ok(input
        .data
        .scripts
        .iter()
        .zip(results)
        .map(|(data, result)| match result {
            Ok(script) => CompiledScriptOutput {
                name: data.name.clone(),
                script: Some(script),
                error: None,
                error_code: None,
            },
            Err(error) => CompiledScriptOutput {
                name: data.name.clone(),
                script: None,
                error_code: Some(error.code()),
                error: Some(error.to_string()),
            },
        })
        .collect())
}

pub fn compile_collection_json(collection: serde_json::Value) -> Result<serde_json::Value> {
    let input: CollectionInput = serde_json::from_value(collection)?;
    let outputs = compile_collection(input)?;
    Ok(serde_json::to_value(outputs)?)
}

#[cfg(feature = "napi")]
#[napi]
pub fn compile_collection_native(collection_json: serde_json::Value) -> napi::Result<serde_json::Value> {
    compile_collection_json(collection_json).map_err(|e| napi::Error::from_reason(e.to_string()))
}
