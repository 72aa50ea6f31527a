//! Function Call Compiler
//!
//! Turns calls to shared functions into code. Functions with literal code are
//! compiled inline; functions made of calls recurse into each nested call with
//! arguments re-derived from the caller's arguments. All produced segments are
//! merged into one `CompiledCode`.

use std::sync::Arc;

use crate::call::{FunctionCall, FunctionCallArgument, FunctionCallArgumentCollection};
use crate::error::{CompileError, Result, ResultExt};
use crate::expressions_compiler::{DefaultExpressionsCompiler, ExpressionsCompiler};
use crate::function::{FunctionBody, SharedFunction, SharedFunctionCollection};

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILED CODE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledCode {
    pub code: String,
    pub revert_code: Option<String>,
}

impl CompiledCode {
    pub fn new(code: impl Into<String>, revert_code: Option<String>) -> Self {
        Self {
            code: code.into(),
            revert_code,
        }
    }
}

/// Joins non-empty `code` and non-empty `revert_code` values with newlines.
/// The merged revert is `Some("")`, never `None`, when no segment has one.
pub fn merge_code_parts(segments: &[CompiledCode]) -> Result<CompiledCode> {
    if segments.is_empty() {
        return Err(CompileError::MissingSegments);
    }
    let code = segments
        .iter()
        .map(|segment| segment.code.as_str())
        .filter(|code| !code.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let revert_code = segments
        .iter()
        .filter_map(|segment| segment.revert_code.as_deref())
        .filter(|code| !code.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    Ok(CompiledCode {
        code,
        revert_code: Some(revert_code),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILATION CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Shared state of one compilation: the function catalog, the compiler used for
/// nested calls, and the functions currently being compiled.
pub struct FunctionCallCompilationContext<'a> {
    pub all_functions: &'a SharedFunctionCollection,
    pub single_call_compiler: &'a dyn SingleCallCompiler,
    call_stack: Vec<String>,
}

impl<'a> FunctionCallCompilationContext<'a> {
    pub fn new(
        all_functions: &'a SharedFunctionCollection,
        single_call_compiler: &'a dyn SingleCallCompiler,
    ) -> Self {
        Self {
            all_functions,
            single_call_compiler,
            call_stack: Vec::new(),
        }
    }

    pub fn call_stack(&self) -> &[String] {
        &self.call_stack
    }

    /// Context for compiling the body of `function_name`.
    pub fn enter(&self, function_name: &str) -> Result<FunctionCallCompilationContext<'a>> {
        if self.call_stack.iter().any(|name| name == function_name) {
            let mut cycle = self.call_stack.clone();
            cycle.push(function_name.to_string());
            return Err(CompileError::CircularFunctionReference(cycle.join(" -> ")));
        }
        let mut call_stack = self.call_stack.clone();
        call_stack.push(function_name.to_string());
        Ok(FunctionCallCompilationContext {
            all_functions: self.all_functions,
            single_call_compiler: self.single_call_compiler,
            call_stack,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SINGLE CALL
// ═══════════════════════════════════════════════════════════════════════════════

pub trait SingleCallCompiler: Send + Sync {
    fn compile_single_call(
        &self,
        call: &FunctionCall,
        context: &FunctionCallCompilationContext<'_>,
    ) -> Result<Vec<CompiledCode>>;
}

pub trait SingleCallCompilerStrategy: Send + Sync {
    fn can_compile(&self, function: &SharedFunction) -> bool;

    fn compile_function(
        &self,
        function: &SharedFunction,
        call: &FunctionCall,
        context: &FunctionCallCompilationContext<'_>,
    ) -> Result<Vec<CompiledCode>>;
}

/// Picks the strategy matching the called function's body.
pub struct AdaptiveFunctionCallCompiler {
    strategies: Vec<Box<dyn SingleCallCompilerStrategy>>,
}

impl AdaptiveFunctionCallCompiler {
    pub fn new(strategies: Vec<Box<dyn SingleCallCompilerStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn with_expressions_compiler(expressions: Arc<dyn ExpressionsCompiler>) -> Self {
        let arguments = NestedFunctionArgumentCompiler::new(Arc::clone(&expressions));
        Self::new(vec![
            Box::new(InlineFunctionCallCompiler::new(expressions)),
            Box::new(NestedFunctionCallCompiler::new(Box::new(arguments))),
        ])
    }
}

impl Default for AdaptiveFunctionCallCompiler {
    fn default() -> Self {
        Self::with_expressions_compiler(Arc::new(DefaultExpressionsCompiler::default()))
    }
}

impl SingleCallCompiler for AdaptiveFunctionCallCompiler {
    fn compile_single_call(
        &self,
        call: &FunctionCall,
        context: &FunctionCallCompilationContext<'_>,
    ) -> Result<Vec<CompiledCode>> {
        let function = context.all_functions.get_function_by_name(&call.function_name)?;
        ensure_no_unexpected_parameters(function, &call.args)?;
        ensure_required_parameters_provided(function, &call.args)?;
        let context = context.enter(&function.name)?;
        tracing::trace!(
            function = %function.name,
            depth = context.call_stack().len(),
            "compiling function call"
        );
        let strategy = self
            .strategies
            .iter()
            .find(|strategy| strategy.can_compile(function))
            .ok_or_else(|| {
                CompileError::InvalidFunctionDefinition(format!(
                    "no compiler can compile function \"{}\"",
                    function.name
                ))
            })?;
        strategy.compile_function(function, call, &context)
    }
}

fn quoted_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = names.into_iter().map(|name| format!("\"{name}\"")).collect();
    if quoted.is_empty() {
        "none".to_string()
    } else {
        quoted.join(", ")
    }
}

fn ensure_no_unexpected_parameters(
    function: &SharedFunction,
    args: &FunctionCallArgumentCollection,
) -> Result<()> {
    let unexpected: Vec<&str> = args
        .parameter_names()
        .filter(|name| function.parameters.get(name).is_none())
        .collect();
    if unexpected.is_empty() {
        return Ok(());
    }
    Err(CompileError::UnexpectedParameters {
        function: function.name.clone(),
        unexpected: quoted_list(unexpected),
        expected: quoted_list(function.parameters.names()),
    })
}

fn ensure_required_parameters_provided(
    function: &SharedFunction,
    args: &FunctionCallArgumentCollection,
) -> Result<()> {
    match function
        .parameters
        .required_names()
        .into_iter()
        .find(|name| !args.has_argument(name))
    {
        Some(missing) => Err(CompileError::MissingRequiredParameterValue(missing.to_string())),
        None => Ok(()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INLINE STRATEGY
// ═══════════════════════════════════════════════════════════════════════════════

pub struct InlineFunctionCallCompiler {
    expressions: Arc<dyn ExpressionsCompiler>,
}

impl InlineFunctionCallCompiler {
    pub fn new(expressions: Arc<dyn ExpressionsCompiler>) -> Self {
        Self { expressions }
    }
}

impl SingleCallCompilerStrategy for InlineFunctionCallCompiler {
    fn can_compile(&self, function: &SharedFunction) -> bool {
        matches!(function.body, FunctionBody::Code(_))
    }

    fn compile_function(
        &self,
        function: &SharedFunction,
        call: &FunctionCall,
        _context: &FunctionCallCompilationContext<'_>,
    ) -> Result<Vec<CompiledCode>> {
        let FunctionBody::Code(code) = &function.body else {
            return Err(CompileError::InvalidFunctionDefinition(format!(
                "function \"{}\" has no code to inline",
                function.name
            )));
        };
        let execute = self.expressions.compile_expressions(&code.execute, &call.args)?;
        let revert = code
            .revert
            .as_deref()
            .map(|revert| self.expressions.compile_expressions(revert, &call.args))
            .transpose()?;
        Ok(vec![CompiledCode::new(execute, revert)])
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NESTED STRATEGY
// ═══════════════════════════════════════════════════════════════════════════════

pub trait FunctionCallArgumentCompiler: Send + Sync {
    /// Resolves the arguments of `nested` against the arguments of `parent`.
    fn create_compiled_nested_call(
        &self,
        nested: &FunctionCall,
        parent: &FunctionCall,
        context: &FunctionCallCompilationContext<'_>,
    ) -> Result<FunctionCall>;
}

pub struct NestedFunctionArgumentCompiler {
    expressions: Arc<dyn ExpressionsCompiler>,
}

impl NestedFunctionArgumentCompiler {
    pub fn new(expressions: Arc<dyn ExpressionsCompiler>) -> Self {
        Self { expressions }
    }
}

impl FunctionCallArgumentCompiler for NestedFunctionArgumentCompiler {
    fn create_compiled_nested_call(
        &self,
        nested: &FunctionCall,
        parent: &FunctionCall,
        context: &FunctionCallCompilationContext<'_>,
    ) -> Result<FunctionCall> {
        let target = context.all_functions.get_function_by_name(&nested.function_name)?;
        ensure_no_unexpected_parameters(target, &nested.args)?;
        let mut args = FunctionCallArgumentCollection::new();
        for parameter in target.parameters.all() {
            let value = if nested.args.has_argument(&parameter.name) {
                let expression = nested.args.get_argument(&parameter.name)?.argument_value();
                self.expressions
                    .compile_expressions(expression, &parent.args)
                    .with_context(|| {
                        format!("Error when compiling argument for \"{}\"", parameter.name)
                    })?
            } else {
                String::new()
            };
            if value.is_empty() {
                if parameter.is_optional {
                    continue;
                }
                return Err(CompileError::MissingRequiredParameterValue(parameter.name.clone()));
            }
            args.add_argument(FunctionCallArgument::new(parameter.name.as_str(), value)?)?;
        }
        FunctionCall::new(nested.function_name.as_str(), args)
    }
}

pub struct NestedFunctionCallCompiler {
    arguments: Box<dyn FunctionCallArgumentCompiler>,
}

impl NestedFunctionCallCompiler {
    pub fn new(arguments: Box<dyn FunctionCallArgumentCompiler>) -> Self {
        Self { arguments }
    }
}

impl SingleCallCompilerStrategy for NestedFunctionCallCompiler {
    fn can_compile(&self, function: &SharedFunction) -> bool {
        matches!(function.body, FunctionBody::Calls(_))
    }

    fn compile_function(
        &self,
        function: &SharedFunction,
        call: &FunctionCall,
        context: &FunctionCallCompilationContext<'_>,
    ) -> Result<Vec<CompiledCode>> {
        let FunctionBody::Calls(nested_calls) = &function.body else {
            return Err(CompileError::InvalidFunctionDefinition(format!(
                "function \"{}\" has no calls to compile",
                function.name
            )));
        };
        let mut segments = Vec::new();
        for nested in nested_calls {
            let compiled = self
                .arguments
                .create_compiled_nested_call(nested, call, context)
                .and_then(|compiled_call| {
                    context
                        .single_call_compiler
                        .compile_single_call(&compiled_call, context)
                })
                .with_context(|| {
                    format!(
                        "Error with call to \"{}\" function from \"{}\" function",
                        nested.function_name, call.function_name
                    )
                })?;
            segments.extend(compiled);
        }
        Ok(segments)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CALL SEQUENCE
// ═══════════════════════════════════════════════════════════════════════════════

pub trait FunctionCallCompiler: Send + Sync {
    fn compile_function_calls(
        &self,
        calls: &[FunctionCall],
        functions: &SharedFunctionCollection,
    ) -> Result<CompiledCode>;
}

pub struct FunctionCallSequenceCompiler {
    single_call_compiler: Box<dyn SingleCallCompiler>,
}

impl FunctionCallSequenceCompiler {
    pub fn new(single_call_compiler: Box<dyn SingleCallCompiler>) -> Self {
        Self {
            single_call_compiler,
        }
    }
}

impl Default for FunctionCallSequenceCompiler {
    fn default() -> Self {
        Self::new(Box::new(AdaptiveFunctionCallCompiler::default()))
    }
}

impl FunctionCallCompiler for FunctionCallSequenceCompiler {
    fn compile_function_calls(
        &self,
        calls: &[FunctionCall],
        functions: &SharedFunctionCollection,
    ) -> Result<CompiledCode> {
        if calls.is_empty() {
            return Err(CompileError::MissingValue("function calls".to_string()));
        }
        let context = FunctionCallCompilationContext::new(functions, self.single_call_compiler.as_ref());
        let mut segments = Vec::new();
        for call in calls {
            segments.extend(self.single_call_compiler.compile_single_call(call, &context)?);
        }
        merge_code_parts(&segments)
    }
}
