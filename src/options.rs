use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};
use crate::language::ScriptLanguage;
use crate::validate::{CodeValidationRule, CodeValidator};

/// Compilation settings for one category collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    pub language: ScriptLanguage,
    /// Overrides the language's own line length limit.
    pub max_line_length: Option<usize>,
    /// Rules for literal `code`/`revertCode` of scripts.
    pub inline_code_rules: Vec<CodeValidationRule>,
    /// Rules for code produced by compiling calls. Duplicates are allowed so that
    /// one function can be called several times.
    pub compiled_code_rules: Vec<CodeValidationRule>,
    /// Rules for the code templates of shared functions.
    pub function_code_rules: Vec<CodeValidationRule>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            language: ScriptLanguage::default(),
            max_line_length: None,
            inline_code_rules: CodeValidationRule::ALL.to_vec(),
            compiled_code_rules: vec![
                CodeValidationRule::NoEmptyLines,
                CodeValidationRule::NoTooLongLines,
            ],
            function_code_rules: vec![
                CodeValidationRule::NoEmptyLines,
                CodeValidationRule::NoDuplicatedLines,
            ],
        }
    }
}

impl CompileOptions {
    pub fn for_language(language: ScriptLanguage) -> Self {
        Self {
            language,
            ..Self::default()
        }
    }

    /// An unknown rule id fails as `UnknownValidationRule`, any other
    /// malformed input as a data error.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|error| {
            unknown_rule_or(serde_json::from_str(json).ok(), CompileError::Json(error))
        })
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|error| {
            unknown_rule_or(serde_yaml::from_str(yaml).ok(), CompileError::Yaml(error))
        })
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        Self::deserialize(value).map_err(|error| {
            unknown_rule_or(ConfiguredRuleIds::deserialize(value).ok(), CompileError::Json(error))
        })
    }

    pub fn code_validator(&self) -> CodeValidator {
        let validator = CodeValidator::new(self.language);
        match self.max_line_length {
            Some(max) => validator.with_max_line_length(max),
            None => validator,
        }
    }
}

/// Rule ids exactly as configured.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConfiguredRuleIds {
    inline_code_rules: Vec<String>,
    compiled_code_rules: Vec<String>,
    function_code_rules: Vec<String>,
}

fn unknown_rule_or(ids: Option<ConfiguredRuleIds>, fallback: CompileError) -> CompileError {
    let unknown = ids.and_then(|ids| {
        ids.inline_code_rules
            .iter()
            .chain(&ids.compiled_code_rules)
            .chain(&ids.function_code_rules)
            .find_map(|id| id.parse::<CodeValidationRule>().err())
    });
    unknown.unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileError;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let options = CompileOptions::from_yaml("language: shellscript").unwrap();
        assert_eq!(options.language, ScriptLanguage::Shellscript);
        assert_eq!(options.inline_code_rules.len(), 4);
        assert!(!options
            .compiled_code_rules
            .contains(&CodeValidationRule::NoDuplicatedLines));
    }

    #[test]
    fn test_rule_ids_in_config() {
        let options = CompileOptions::from_json(
            r#"{ "maxLineLength": 80, "inlineCodeRules": ["noEmptyLines"] }"#,
        )
        .unwrap();
        assert_eq!(options.max_line_length, Some(80));
        assert_eq!(options.inline_code_rules, vec![CodeValidationRule::NoEmptyLines]);
    }

    #[test]
    fn test_unknown_rule_id_fails_at_setup() {
        let error = CompileOptions::from_json(r#"{ "inlineCodeRules": ["noTabs"] }"#).unwrap_err();
        assert!(matches!(error, CompileError::UnknownValidationRule(ref id) if id == "noTabs"));
        assert_eq!(error.code(), crate::error::ERR_UNKNOWN_VALIDATION_RULE);

        let error = CompileOptions::from_yaml("compiledCodeRules: [noEmptyLines, noTabs]").unwrap_err();
        assert!(matches!(error, CompileError::UnknownValidationRule(ref id) if id == "noTabs"));

        let error = CompileOptions::from_value(&serde_json::json!({ "functionCodeRules": ["noTabs"] }))
            .unwrap_err();
        assert!(matches!(error, CompileError::UnknownValidationRule(ref id) if id == "noTabs"));
    }

    #[test]
    fn test_other_malformed_options_are_data_errors() {
        let error = CompileOptions::from_json(r#"{ "maxLineLength": "long" }"#).unwrap_err();
        assert!(matches!(error, CompileError::Json(_)));
        let error = CompileOptions::from_yaml("language: cobol").unwrap_err();
        assert!(matches!(error, CompileError::Yaml(_)));
    }
}
