use indexmap::IndexMap;

use crate::data::{CallData, FunctionCallData};
use crate::error::{CompileError, Result, ResultExt};
use crate::function::ensure_valid_parameter_name;

// ═══════════════════════════════════════════════════════════════════════════════
// ARGUMENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionCallArgument {
    parameter_name: String,
    argument_value: String,
}

impl FunctionCallArgument {
    pub fn new(parameter_name: impl Into<String>, argument_value: impl Into<String>) -> Result<Self> {
        let parameter_name = parameter_name.into();
        let argument_value = argument_value.into();
        ensure_valid_parameter_name(&parameter_name)?;
        if argument_value.is_empty() {
            return Err(CompileError::MissingValue(format!(
                "argument value for parameter \"{}\"",
                parameter_name
            )));
        }
        Ok(Self {
            parameter_name,
            argument_value,
        })
    }

    pub fn parameter_name(&self) -> &str {
        &self.parameter_name
    }

    pub fn argument_value(&self) -> &str {
        &self.argument_value
    }
}

/// Arguments of one call keyed by parameter name, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionCallArgumentCollection {
    arguments: IndexMap<String, FunctionCallArgument>,
}

impl FunctionCallArgumentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_arguments(arguments: impl IntoIterator<Item = FunctionCallArgument>) -> Result<Self> {
        let mut collection = Self::new();
        for argument in arguments {
            collection.add_argument(argument)?;
        }
        Ok(collection)
    }

    pub fn add_argument(&mut self, argument: FunctionCallArgument) -> Result<()> {
        if self.arguments.contains_key(argument.parameter_name()) {
            return Err(CompileError::DuplicateParameter(
                argument.parameter_name().to_string(),
            ));
        }
        self.arguments
            .insert(argument.parameter_name().to_string(), argument);
        Ok(())
    }

    pub fn has_argument(&self, parameter_name: &str) -> bool {
        self.arguments.contains_key(parameter_name)
    }

    pub fn get_argument(&self, parameter_name: &str) -> Result<&FunctionCallArgument> {
        if parameter_name.is_empty() {
            return Err(CompileError::MissingParameterName);
        }
        self.arguments
            .get(parameter_name)
            .ok_or_else(|| CompileError::ParameterNotFound(parameter_name.to_string()))
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.arguments.keys().map(|name| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionCallArgument> {
        self.arguments.values()
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CALLS
// ═══════════════════════════════════════════════════════════════════════════════

/// One invocation of a shared function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub function_name: String,
    pub args: FunctionCallArgumentCollection,
}

impl FunctionCall {
    pub fn new(function_name: impl Into<String>, args: FunctionCallArgumentCollection) -> Result<Self> {
        let function_name = function_name.into();
        if function_name.trim().is_empty() {
            return Err(CompileError::MissingFunctionName);
        }
        Ok(Self {
            function_name,
            args,
        })
    }

    /// Display form for error messages, e.g. `greet(name="World")`.
    fn signature(&self) -> String {
        let args = self
            .args
            .iter()
            .map(|a| format!("{}={:?}", a.parameter_name(), a.argument_value()))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.function_name, args)
    }
}

pub fn parse_function_calls(call: &CallData) -> Result<Vec<FunctionCall>> {
    let data: Vec<&FunctionCallData> = match call {
        CallData::Single(single) => vec![single],
        CallData::Sequence(sequence) => sequence.iter().collect(),
    };
    if data.is_empty() {
        return Err(CompileError::MissingValue("function calls".to_string()));
    }
    let calls = data
        .into_iter()
        .map(parse_function_call)
        .collect::<Result<Vec<_>>>()?;
    ensure_no_duplicate_calls(&calls)?;
    Ok(calls)
}

fn parse_function_call(data: &FunctionCallData) -> Result<FunctionCall> {
    let args = data
        .parameters
        .iter()
        .flatten()
        .map(|(name, value)| FunctionCallArgument::new(name.as_str(), value.as_str()))
        .collect::<Result<Vec<_>>>()
        .and_then(FunctionCallArgumentCollection::from_arguments)
        .with_context(|| format!("Failed to parse call to function \"{}\"", data.function))?;
    FunctionCall::new(data.function.as_str(), args)
}

/// Calls are equal when they name the same function with the same arguments,
/// in any order.
fn ensure_no_duplicate_calls(calls: &[FunctionCall]) -> Result<()> {
    let duplicates: Vec<String> = calls
        .iter()
        .enumerate()
        .filter(|(index, call)| calls[..*index].contains(call))
        .map(|(_, call)| call.signature())
        .collect();
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(CompileError::DuplicateCall(duplicates.join(", ")))
    }
}
