//! Scripts
//!
//! A script is either literal code or a call to shared functions. Literal code is
//! validated as written; calls are compiled through the function call compiler and
//! the produced code is validated afterwards.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::call::parse_function_calls;
use crate::call_compiler::{FunctionCallCompiler, FunctionCallSequenceCompiler};
use crate::data::{FunctionData, ScriptData};
use crate::error::{CompileError, Result, ResultExt};
use crate::function::{parse_shared_functions, SharedFunctionCollection};
use crate::language::ScriptLanguage;
use crate::options::CompileOptions;
use crate::validate::CodeValidator;

// ═══════════════════════════════════════════════════════════════════════════════
// SCRIPT MODEL
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptCode {
    pub execute: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revert: Option<String>,
}

impl ScriptCode {
    pub fn new(execute: impl Into<String>, revert: Option<String>) -> Result<Self> {
        let execute = execute.into();
        if execute.is_empty() {
            return Err(CompileError::MissingCode);
        }
        Ok(Self {
            execute,
            revert: revert.filter(|code| !code.is_empty()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationLevel {
    Standard,
    Strict,
}

impl RecommendationLevel {
    pub const ALL: [RecommendationLevel; 2] = [RecommendationLevel::Standard, RecommendationLevel::Strict];

    pub fn name(&self) -> &'static str {
        match self {
            RecommendationLevel::Standard => "standard",
            RecommendationLevel::Strict => "strict",
        }
    }
}

impl fmt::Display for RecommendationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RecommendationLevel {
    type Err = CompileError;

    fn from_str(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(value))
            .ok_or_else(|| CompileError::UnknownRecommendationLevel(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub name: String,
    pub code: ScriptCode,
    pub docs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<RecommendationLevel>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCRIPT COMPILER
// ═══════════════════════════════════════════════════════════════════════════════

/// Compiles scripts that call shared functions.
pub struct ScriptCompiler {
    functions: SharedFunctionCollection,
    call_compiler: Box<dyn FunctionCallCompiler>,
    validator: CodeValidator,
    options: CompileOptions,
}

impl ScriptCompiler {
    pub fn new(
        functions: SharedFunctionCollection,
        call_compiler: Box<dyn FunctionCallCompiler>,
        options: CompileOptions,
    ) -> Self {
        Self {
            functions,
            call_compiler,
            validator: options.code_validator(),
            options,
        }
    }

    pub fn all_functions(&self) -> &SharedFunctionCollection {
        &self.functions
    }

    pub fn can_compile(&self, script: &ScriptData) -> bool {
        script.call.is_some()
    }

    pub fn compile(&self, script: &ScriptData) -> Result<ScriptCode> {
        self.compile_call(script)
            .with_context(|| format!("Failed to compile script: {}", script.name))
    }

    fn compile_call(&self, script: &ScriptData) -> Result<ScriptCode> {
        let call = script
            .call
            .as_ref()
            .ok_or_else(|| CompileError::MissingValue("script call".to_string()))?;
        tracing::debug!(script = %script.name, "compiling script call");
        let calls = parse_function_calls(call)?;
        let compiled = self.call_compiler.compile_function_calls(&calls, &self.functions)?;
        self.validator
            .throw_if_invalid(&compiled.code, &self.options.compiled_code_rules)?;
        if let Some(revert) = compiled.revert_code.as_deref() {
            self.validator
                .throw_if_invalid(revert, &self.options.compiled_code_rules)?;
        }
        ScriptCode::new(compiled.code, compiled.revert_code)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLECTION CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything scripts of one collection are parsed against.
pub struct CategoryCollectionContext {
    compiler: ScriptCompiler,
    validator: CodeValidator,
    options: CompileOptions,
}

impl CategoryCollectionContext {
    pub fn new(functions: &[FunctionData], options: CompileOptions) -> Result<Self> {
        let all_functions = parse_shared_functions(functions, &options)?;
        let compiler = ScriptCompiler::new(
            all_functions,
            Box::new(FunctionCallSequenceCompiler::default()),
            options.clone(),
        );
        Ok(Self::with_compiler(compiler, options))
    }

    pub fn with_compiler(compiler: ScriptCompiler, options: CompileOptions) -> Self {
        Self {
            compiler,
            validator: options.code_validator(),
            options,
        }
    }

    pub fn language(&self) -> ScriptLanguage {
        self.options.language
    }

    pub fn compiler(&self) -> &ScriptCompiler {
        &self.compiler
    }

    pub fn get_required_parameter_names(&self, function_name: &str) -> Result<Vec<String>> {
        self.compiler
            .all_functions()
            .get_required_parameter_names(function_name)
    }

    pub fn parse_script(&self, data: &ScriptData) -> Result<Script> {
        self.parse_script_data(data)
            .with_context(|| format!("Failed to parse script: {}", data.name))
    }

    /// Parses scripts in parallel; results keep the input order.
    pub fn parse_scripts(&self, scripts: &[ScriptData]) -> Vec<Result<Script>> {
        let results: Vec<Result<Script>> = scripts
            .par_iter()
            .map(|script| self.parse_script(script))
            .collect();
        let failed = results.iter().filter(|result| result.is_err()).count();
        if failed > 0 {
            tracing::warn!(failed, total = scripts.len(), "some scripts failed to parse");
        }
        results
    }

    fn parse_script_data(&self, data: &ScriptData) -> Result<Script> {
        ensure_valid_script_data(data)?;
        let code = self.parse_code(data)?;
        let docs = data
            .docs
            .as_ref()
            .map(|docs| docs.entries())
            .unwrap_or_default();
        let level = data
            .recommend
            .as_deref()
            .map(RecommendationLevel::from_str)
            .transpose()?;
        Ok(Script {
            name: data.name.clone(),
            code,
            docs,
            level,
        })
    }

    fn parse_code(&self, data: &ScriptData) -> Result<ScriptCode> {
        if self.compiler.can_compile(data) {
            return self.compiler.compile(data);
        }
        let code = ScriptCode::new(
            data.code.clone().unwrap_or_default(),
            data.revert_code.clone(),
        )?;
        let rules = &self.options.inline_code_rules;
        self.validator.throw_if_invalid(&code.execute, rules)?;
        if let Some(revert) = code.revert.as_deref() {
            self.validator.throw_if_invalid(revert, rules)?;
        }
        Ok(code)
    }
}

fn ensure_valid_script_data(data: &ScriptData) -> Result<()> {
    if data.name.trim().is_empty() {
        return Err(CompileError::InvalidScriptDefinition(
            "missing script name".to_string(),
        ));
    }
    let has_code = data.code.as_deref().is_some_and(|code| !code.is_empty());
    let has_call = data.call.is_some();
    if has_code && has_call {
        return Err(CompileError::InvalidScriptDefinition(
            "both \"call\" and \"code\" are defined".to_string(),
        ));
    }
    if !has_code && !has_call {
        return Err(CompileError::InvalidScriptDefinition(
            "neither \"call\" or \"code\" is defined".to_string(),
        ));
    }
    if has_call && data.revert_code.is_some() {
        return Err(CompileError::InvalidScriptDefinition(
            "cannot define \"revertCode\" if \"call\" is defined".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn context(functions_yaml: &str) -> CategoryCollectionContext {
        let functions: Vec<FunctionData> = serde_yaml::from_str(functions_yaml).unwrap();
        CategoryCollectionContext::new(&functions, CompileOptions::default()).unwrap()
    }

    fn script(yaml: &str) -> ScriptData {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_script_code_normalizes_revert() {
        let code = ScriptCode::new("run", Some(String::new())).unwrap();
        assert_eq!(code.revert, None);
        assert!(matches!(
            ScriptCode::new("", None).unwrap_err(),
            CompileError::MissingCode
        ));
    }

    #[test]
    fn test_recommendation_level_is_case_insensitive() {
        assert_eq!("STRICT".parse::<RecommendationLevel>().unwrap(), RecommendationLevel::Strict);
        assert_eq!("Standard".parse::<RecommendationLevel>().unwrap(), RecommendationLevel::Standard);
        assert!(matches!(
            "extreme".parse::<RecommendationLevel>().unwrap_err(),
            CompileError::UnknownRecommendationLevel(_)
        ));
    }

    #[test]
    fn test_inline_script() {
        let context = context("[]");
        let parsed = context
            .parse_script(&script(
                "name: Clear cache\ncode: del cache\nrevertCode: echo nothing\ndocs: https://example.org\nrecommend: standard\n",
            ))
            .unwrap();
        assert_eq!(parsed.code.execute, "del cache");
        assert_eq!(parsed.code.revert.as_deref(), Some("echo nothing"));
        assert_eq!(parsed.docs, vec!["https://example.org".to_string()]);
        assert_eq!(parsed.level, Some(RecommendationLevel::Standard));
    }

    #[test]
    fn test_inline_script_is_validated() {
        let context = context("[]");
        let error = context
            .parse_script(&script("name: Dup\ncode: \"echo a\\necho a\"\n"))
            .unwrap_err();
        assert_eq!(error.contexts(), vec!["Failed to parse script: Dup"]);
        assert!(matches!(error.root_cause(), CompileError::CodeValidationFailure(_)));
    }

    #[test]
    fn test_called_script() {
        let context = context(
            "- name: greet\n  parameters:\n    - name: name\n  code: echo Hello {{ $name }}\n",
        );
        let parsed = context
            .parse_script(&script(
                "name: Greet\ncall:\n  function: greet\n  parameters:\n    name: World\n",
            ))
            .unwrap();
        assert_eq!(
            parsed.code,
            ScriptCode {
                execute: "echo Hello World".to_string(),
                revert: None,
            }
        );
        assert_eq!(parsed.level, None);
        assert!(parsed.docs.is_empty());
    }

    #[test]
    fn test_compile_failures_name_the_script() {
        let context = context("- name: f\n  code: x\n");
        let error = context
            .parse_script(&script("name: Broken\ncall:\n  function: missing\n"))
            .unwrap_err();
        assert_eq!(
            error.contexts(),
            vec!["Failed to parse script: Broken", "Failed to compile script: Broken"]
        );
        assert!(matches!(error.root_cause(), CompileError::FunctionNotFound(_)));
    }

    #[test]
    fn test_invalid_script_definitions() {
        let context = context("- name: f\n  code: x\n");
        let cases = [
            ("name: ''\ncode: x\n", "missing script name"),
            ("name: a\ncode: x\ncall:\n  function: f\n", "both"),
            ("name: a\n", "neither"),
            ("name: a\ncall:\n  function: f\nrevertCode: y\n", "revertCode"),
        ];
        for (yaml, expected) in cases {
            let error = context.parse_script(&script(yaml)).unwrap_err();
            assert!(
                matches!(error.root_cause(), CompileError::InvalidScriptDefinition(m) if m.contains(expected)),
                "{yaml}"
            );
        }
    }

    #[test]
    fn test_unknown_recommendation_level_fails() {
        let context = context("[]");
        let error = context
            .parse_script(&script("name: a\ncode: x\nrecommend: always\n"))
            .unwrap_err();
        assert!(matches!(
            error.root_cause(),
            CompileError::UnknownRecommendationLevel(_)
        ));
    }

    #[test]
    fn test_compiled_code_allows_repeated_lines() {
        let context = context(
            r#"
- name: pause
  parameters:
    - name: reason
  code: "timeout 1{{ with $reason }}{{ end }}"
- name: twice
  call:
    - function: pause
      parameters:
        reason: first
    - function: pause
      parameters:
        reason: second
"#,
        );
        let parsed = context
            .parse_script(&script("name: a\ncall:\n  function: twice\n"))
            .unwrap();
        assert_eq!(parsed.code.execute, "timeout 1\ntimeout 1");
    }

    #[test]
    fn test_parse_scripts_keeps_order() {
        let context = context("[]");
        let scripts: Vec<ScriptData> = (0..20)
            .map(|i| script(&format!("name: s{i}\ncode: echo {i}\n")))
            .chain(std::iter::once(script("name: bad\n")))
            .collect();
        let results = context.parse_scripts(&scripts);
        assert_eq!(results.len(), 21);
        for (i, result) in results.iter().take(20).enumerate() {
            assert_eq!(result.as_ref().unwrap().name, format!("s{i}"));
        }
        assert!(results[20].is_err());
    }

    #[test]
    fn test_required_parameter_names() {
        let context = context(
            "- name: f\n  parameters:\n    - name: a\n    - name: b\n      optional: true\n  code: x\n",
        );
        assert_eq!(
            context.get_required_parameter_names("f").unwrap(),
            vec!["a".to_string()]
        );
        assert_eq!(context.language(), ScriptLanguage::Batchfile);
    }
}
