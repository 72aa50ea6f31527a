//! Template Expressions
//!
//! An expression is one matched `{{ ... }}` occurrence: where it sits in the
//! code, which parameters it reads, and how to evaluate it. Parsers find
//! expressions; the expressions compiler evaluates and splices them.

use regex::{Captures, Regex};

use crate::call::FunctionCallArgumentCollection;
use crate::error::{CompileError, Result, ResultExt};
use crate::expressions_compiler::ExpressionsCompiler;
use crate::function::{FunctionParameter, FunctionParameterCollection};
use crate::parsers::{ParameterSubstitutionParser, WithParser};
use crate::pipes::PipelineCompiler;

// ═══════════════════════════════════════════════════════════════════════════════
// POSITION
// ═══════════════════════════════════════════════════════════════════════════════

/// Byte offsets `[start, end)` of an expression within its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExpressionPosition {
    pub start: usize,
    pub end: usize,
}

impl ExpressionPosition {
    pub fn new(start: usize, end: usize) -> Result<Self> {
        if start >= end {
            return Err(CompileError::InvalidExpression(format!(
                "expression position has no length: [{start}, {end}]"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn is_same(&self, other: &ExpressionPosition) -> bool {
        self == other
    }

    pub fn is_intersecting(&self, other: &ExpressionPosition) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn is_inside_of(&self, parent: &ExpressionPosition) -> bool {
        !self.is_same(parent) && self.start >= parent.start && self.end <= parent.end
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVALUATION
// ═══════════════════════════════════════════════════════════════════════════════

pub struct ExpressionEvaluationContext<'a> {
    pub args: &'a FunctionCallArgumentCollection,
    pub pipeline_compiler: &'a dyn PipelineCompiler,
    scope_compiler: Option<ScopeCompiler<'a>>,
}

/// Compiles block bodies against the arguments of the code they sit in.
#[derive(Clone, Copy)]
struct ScopeCompiler<'a> {
    compiler: &'a dyn ExpressionsCompiler,
    args: &'a FunctionCallArgumentCollection,
}

impl<'a> ExpressionEvaluationContext<'a> {
    pub fn new(
        args: &'a FunctionCallArgumentCollection,
        pipeline_compiler: &'a dyn PipelineCompiler,
    ) -> Self {
        Self {
            args,
            pipeline_compiler,
            scope_compiler: None,
        }
    }

    /// Block bodies evaluated in this context are compiled by `compiler`
    /// with the current, unfiltered arguments.
    pub fn with_scope_compiler(mut self, compiler: &'a dyn ExpressionsCompiler) -> Self {
        self.scope_compiler = Some(ScopeCompiler {
            compiler,
            args: self.args,
        });
        self
    }

    /// Runs `value` through `pipeline` when one is given.
    pub fn apply_pipeline(&self, value: &str, pipeline: Option<&str>) -> Result<String> {
        match pipeline {
            Some(pipeline) => self.pipeline_compiler.compile(value, pipeline),
            None => Ok(value.to_string()),
        }
    }

    /// Compiles the expressions inside a block body. Without a scope compiler
    /// the body is returned as written.
    pub fn compile_scope(&self, code: &str) -> Result<String> {
        match self.scope_compiler {
            Some(scope) if !code.is_empty() => scope.compiler.compile_expressions(code, scope.args),
            _ => Ok(code.to_string()),
        }
    }
}

pub type ExpressionEvaluator =
    Box<dyn Fn(&ExpressionEvaluationContext<'_>) -> Result<String> + Send + Sync>;

pub struct Expression {
    pub position: ExpressionPosition,
    pub parameters: FunctionParameterCollection,
    evaluator: ExpressionEvaluator,
}

impl std::fmt::Debug for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Expression")
            .field("position", &self.position)
            .field("parameters", &self.parameters.names())
            .finish()
    }
}

impl Expression {
    pub fn new(
        position: ExpressionPosition,
        evaluator: ExpressionEvaluator,
        parameters: FunctionParameterCollection,
    ) -> Self {
        Self {
            position,
            parameters,
            evaluator,
        }
    }

    /// Evaluates with only the arguments this expression declares.
    pub fn evaluate(&self, context: &ExpressionEvaluationContext<'_>) -> Result<String> {
        self.ensure_required_arguments(context.args)?;
        let args = self.filter_declared_arguments(context.args)?;
        let scoped = ExpressionEvaluationContext {
            args: &args,
            pipeline_compiler: context.pipeline_compiler,
            scope_compiler: context.scope_compiler,
        };
        (self.evaluator)(&scoped)
    }

    fn ensure_required_arguments(&self, args: &FunctionCallArgumentCollection) -> Result<()> {
        let missing: Vec<&str> = self
            .parameters
            .required_names()
            .into_iter()
            .filter(|name| !args.has_argument(name))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(CompileError::InvalidExpression(format!(
            "parameters missing values: \"{}\"",
            missing.join("\", \"")
        )))
    }

    fn filter_declared_arguments(
        &self,
        args: &FunctionCallArgumentCollection,
    ) -> Result<FunctionCallArgumentCollection> {
        FunctionCallArgumentCollection::from_arguments(
            args.iter()
                .filter(|arg| self.parameters.get(arg.parameter_name()).is_some())
                .cloned(),
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSERS
// ═══════════════════════════════════════════════════════════════════════════════

pub trait ExpressionParser: Send + Sync {
    /// Scans `code` from the start; every call is independent.
    fn find_expressions(&self, code: &str) -> Result<Vec<Expression>>;
}

/// Evaluator and declared parameters built from one regex match.
pub struct PrimitiveExpression {
    pub evaluator: ExpressionEvaluator,
    pub parameters: Vec<FunctionParameter>,
}

/// Builds one expression per non-overlapping match of `regex` in `code`.
pub(crate) fn find_regex_expressions<F>(
    parser_name: &str,
    regex: &Regex,
    code: &str,
    build: F,
) -> Result<Vec<Expression>>
where
    F: Fn(&Captures) -> Result<PrimitiveExpression>,
{
    if code.is_empty() {
        return Err(CompileError::MissingCode);
    }
    let error_context = |message: &str| {
        format!(
            "{message}\nParser: {parser_name}\nRegex pattern used: {}\nCode: {code}",
            regex.as_str()
        )
    };
    regex
        .captures_iter(code)
        .map(|captures| {
            let full = captures.get(0).ok_or_else(|| {
                CompileError::InvalidExpression("regex match without a full match".to_string())
            })?;
            let primitive =
                build(&captures).with_context(|| error_context("Failed to build expression."))?;
            let position = ExpressionPosition::new(full.start(), full.end())
                .with_context(|| error_context("Failed to create position."))?;
            let mut parameters = FunctionParameterCollection::new();
            for parameter in primitive.parameters {
                parameters
                    .add_parameter(parameter)
                    .with_context(|| error_context("Failed to create parameters."))?;
            }
            Ok(Expression::new(position, primitive.evaluator, parameters))
        })
        .collect()
}

/// Runs every parser over the code and concatenates their findings.
pub struct CompositeExpressionParser {
    parsers: Vec<Box<dyn ExpressionParser>>,
}

impl CompositeExpressionParser {
    pub fn new(parsers: Vec<Box<dyn ExpressionParser>>) -> Result<Self> {
        if parsers.is_empty() {
            return Err(CompileError::MissingValue("expression parsers".to_string()));
        }
        Ok(Self { parsers })
    }
}

impl Default for CompositeExpressionParser {
    fn default() -> Self {
        Self {
            parsers: vec![
                Box::new(ParameterSubstitutionParser),
                Box::new(WithParser),
            ],
        }
    }
}

impl ExpressionParser for CompositeExpressionParser {
    fn find_expressions(&self, code: &str) -> Result<Vec<Expression>> {
        if code.is_empty() {
            return Err(CompileError::MissingCode);
        }
        let mut expressions = Vec::new();
        for parser in &self.parsers {
            expressions.extend(parser.find_expressions(code)?);
        }
        Ok(expressions)
    }
}
