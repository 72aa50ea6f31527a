//! Shared Functions
//!
//! Reusable, parameterized units of code that scripts and other functions call
//! by name. A function body is either literal code templates or a sequence of
//! calls to further shared functions.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

use crate::call::{parse_function_calls, FunctionCall};
use crate::data::{FunctionData, ParameterDefinitionData};
use crate::error::{CompileError, Result, ResultExt};
use crate::options::CompileOptions;

lazy_static! {
    static ref PARAMETER_NAME_RE: Regex = Regex::new(r"^[0-9a-zA-Z]+$").unwrap();
}

pub(crate) fn ensure_valid_parameter_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CompileError::MissingParameterName);
    }
    if !PARAMETER_NAME_RE.is_match(name) {
        return Err(CompileError::InvalidParameterName(name.to_string()));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionParameter {
    pub name: String,
    pub is_optional: bool,
}

impl FunctionParameter {
    pub fn new(name: impl Into<String>, is_optional: bool) -> Result<Self> {
        let name = name.into();
        ensure_valid_parameter_name(&name)?;
        Ok(Self { name, is_optional })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionParameterCollection {
    parameters: IndexMap<String, FunctionParameter>,
}

impl FunctionParameterCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_parameter(&mut self, parameter: FunctionParameter) -> Result<()> {
        if self.parameters.contains_key(&parameter.name) {
            return Err(CompileError::DuplicateParameter(parameter.name));
        }
        self.parameters.insert(parameter.name.clone(), parameter);
        Ok(())
    }

    pub fn all(&self) -> impl Iterator<Item = &FunctionParameter> {
        self.parameters.values()
    }

    pub fn get(&self, name: &str) -> Option<&FunctionParameter> {
        self.parameters.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.parameters.keys().map(|name| name.as_str()).collect()
    }

    pub fn required_names(&self) -> Vec<&str> {
        self.all()
            .filter(|parameter| !parameter.is_optional)
            .map(|parameter| parameter.name.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCode {
    pub execute: String,
    pub revert: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionBody {
    /// Literal code templates, compiled inline.
    Code(FunctionCode),
    /// Calls to other shared functions, compiled recursively.
    Calls(Vec<FunctionCall>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFunction {
    pub name: String,
    pub parameters: FunctionParameterCollection,
    pub body: FunctionBody,
}

impl SharedFunction {
    pub fn with_code(
        name: impl Into<String>,
        parameters: FunctionParameterCollection,
        execute: impl Into<String>,
        revert: Option<String>,
    ) -> Result<Self> {
        let execute = execute.into();
        if execute.is_empty() {
            return Err(CompileError::MissingCode);
        }
        Self::new(
            name,
            parameters,
            FunctionBody::Code(FunctionCode {
                execute,
                revert: revert.filter(|code| !code.is_empty()),
            }),
        )
    }

    pub fn with_calls(
        name: impl Into<String>,
        parameters: FunctionParameterCollection,
        calls: Vec<FunctionCall>,
    ) -> Result<Self> {
        if calls.is_empty() {
            return Err(CompileError::MissingValue("function calls".to_string()));
        }
        Self::new(name, parameters, FunctionBody::Calls(calls))
    }

    fn new(
        name: impl Into<String>,
        parameters: FunctionParameterCollection,
        body: FunctionBody,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CompileError::MissingFunctionName);
        }
        Ok(Self {
            name,
            parameters,
            body,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SharedFunctionCollection {
    functions: IndexMap<String, SharedFunction>,
}

impl SharedFunctionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(&mut self, function: SharedFunction) -> Result<()> {
        if self.functions.contains_key(&function.name) {
            return Err(CompileError::DuplicateFunction(format!("\"{}\"", function.name)));
        }
        self.functions.insert(function.name.clone(), function);
        Ok(())
    }

    pub fn get_function_by_name(&self, name: &str) -> Result<&SharedFunction> {
        if name.is_empty() {
            return Err(CompileError::MissingFunctionName);
        }
        self.functions
            .get(name)
            .ok_or_else(|| CompileError::FunctionNotFound(name.to_string()))
    }

    pub fn get_required_parameter_names(&self, function_name: &str) -> Result<Vec<String>> {
        let function = self.get_function_by_name(function_name)?;
        Ok(function
            .parameters
            .required_names()
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

pub fn parse_shared_functions(
    functions: &[FunctionData],
    options: &CompileOptions,
) -> Result<SharedFunctionCollection> {
    let mut collection = SharedFunctionCollection::new();
    if functions.is_empty() {
        return Ok(collection);
    }
    ensure_valid_functions(functions)?;
    for data in functions {
        collection.add_function(parse_function(data, options)?)?;
    }
    tracing::debug!(count = collection.len(), "parsed shared functions");
    Ok(collection)
}

fn parse_function(data: &FunctionData, options: &CompileOptions) -> Result<SharedFunction> {
    let parameters = parse_parameters(data)?;
    if let Some(code) = non_empty(&data.code) {
        let revert = non_empty(&data.revert_code);
        let validator = options.code_validator();
        for template in std::iter::once(code).chain(revert) {
            validator
                .throw_if_invalid(template, &options.function_code_rules)
                .with_context(|| format!("Invalid code in function \"{}\"", data.name))?;
        }
        return SharedFunction::with_code(&data.name, parameters, code, revert.map(str::to_string));
    }
    let calls = data
        .call
        .as_ref()
        .map(parse_function_calls)
        .transpose()
        .with_context(|| format!("Failed to parse calls of function \"{}\"", data.name))?
        .unwrap_or_default();
    SharedFunction::with_calls(&data.name, parameters, calls)
}

fn parse_parameters(data: &FunctionData) -> Result<FunctionParameterCollection> {
    let mut parameters = FunctionParameterCollection::new();
    for parameter in data.parameters.iter().flatten() {
        parse_parameter(parameter)
            .and_then(|parsed| parameters.add_parameter(parsed))
            .with_context(|| {
                format!(
                    "Failed to create parameter: {} for function \"{}\"",
                    parameter.name, data.name
                )
            })?;
    }
    Ok(parameters)
}

fn parse_parameter(data: &ParameterDefinitionData) -> Result<FunctionParameter> {
    FunctionParameter::new(data.name.as_str(), data.optional)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn has_code(data: &FunctionData) -> bool {
    non_empty(&data.code).is_some()
}

fn has_call(data: &FunctionData) -> bool {
    data.call.is_some()
}

fn ensure_valid_functions(functions: &[FunctionData]) -> Result<()> {
    ensure_no_unnamed_functions(functions)?;
    ensure_no_duplicate_function_names(functions)?;
    ensure_either_call_or_code(functions)?;
    ensure_no_duplicate_code(functions)
}

fn print_names<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let names: Vec<&str> = names.into_iter().collect();
    format!("\"{}\"", names.join("\",\""))
}

fn ensure_no_unnamed_functions(functions: &[FunctionData]) -> Result<()> {
    if functions.iter().any(|f| f.name.trim().is_empty()) {
        return Err(CompileError::MissingFunctionName);
    }
    Ok(())
}

fn ensure_no_duplicate_function_names(functions: &[FunctionData]) -> Result<()> {
    let duplicates = find_duplicates(functions.iter().map(|f| f.name.to_lowercase()));
    if duplicates.is_empty() {
        return Ok(());
    }
    Err(CompileError::DuplicateFunction(print_names(
        duplicates.iter().map(String::as_str),
    )))
}

fn ensure_either_call_or_code(functions: &[FunctionData]) -> Result<()> {
    let with_both: Vec<&str> = functions
        .iter()
        .filter(|f| has_code(f) && has_call(f))
        .map(|f| f.name.as_str())
        .collect();
    if !with_both.is_empty() {
        return Err(CompileError::InvalidFunctionDefinition(format!(
            "both \"code\" and \"call\" are defined in {}",
            print_names(with_both)
        )));
    }
    let with_neither: Vec<&str> = functions
        .iter()
        .filter(|f| !has_code(f) && !has_call(f))
        .map(|f| f.name.as_str())
        .collect();
    if !with_neither.is_empty() {
        return Err(CompileError::InvalidFunctionDefinition(format!(
            "neither \"code\" or \"call\" is defined in {}",
            print_names(with_neither)
        )));
    }
    Ok(())
}

fn ensure_no_duplicate_code(functions: &[FunctionData]) -> Result<()> {
    let duplicate_codes =
        find_duplicates(functions.iter().filter_map(|f| non_empty(&f.code)).map(str::to_string));
    if !duplicate_codes.is_empty() {
        return Err(CompileError::InvalidFunctionDefinition(format!(
            "duplicate \"code\" in functions: {}",
            print_names(duplicate_codes.iter().map(String::as_str))
        )));
    }
    let duplicate_reverts = find_duplicates(
        functions
            .iter()
            .filter(|f| has_code(f))
            .filter_map(|f| non_empty(&f.revert_code))
            .map(str::to_string),
    );
    if !duplicate_reverts.is_empty() {
        return Err(CompileError::InvalidFunctionDefinition(format!(
            "duplicate \"revertCode\" in functions: {}",
            print_names(duplicate_reverts.iter().map(String::as_str))
        )));
    }
    Ok(())
}

fn find_duplicates(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values.filter(|value| !seen.insert(value.clone())).collect()
}
