//! Expression Parsers
//!
//! `{{ $name | pipes }}` substitutes an argument. `{{ with $name }} ... {{ end }}`
//! renders its body only when `name` has a value, with `{{ . | pipes }}` inside
//! the body standing for that value. The rest of the body is compiled in place
//! when the evaluation context carries a scope compiler.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::error::{CompileError, Result};
use crate::expression::{
    find_regex_expressions, Expression, ExpressionEvaluationContext, ExpressionParser,
    ExpressionPosition, PrimitiveExpression,
};
use crate::function::{FunctionParameter, FunctionParameterCollection};
use crate::regex_builder::ExpressionRegexBuilder;

lazy_static! {
    // {{ $parameterName | pipeName }}
    static ref PARAMETER_SUBSTITUTION_RE: Regex = ExpressionRegexBuilder::new()
        .expect_expression_start()
        .expect_characters("$")
        .capture_until_whitespace_or_pipe()
        .expect_optional_whitespaces()
        .capture_optional_pipeline()
        .expect_expression_end()
        .build_regex()
        .unwrap();

    // {{ . | pipeName }}
    static ref CONTEXT_VARIABLE_RE: Regex = ExpressionRegexBuilder::new()
        .expect_expression_start()
        .expect_characters(".")
        .expect_optional_whitespaces()
        .capture_optional_pipeline()
        .expect_expression_end()
        .build_regex()
        .unwrap();

    // {{ with $parameterName }}
    static ref WITH_START_RE: Regex = ExpressionRegexBuilder::new()
        .expect_expression_start()
        .expect_characters("with")
        .expect_one_or_more_whitespaces()
        .expect_characters("$")
        .capture_until_whitespace_or_pipe()
        .expect_expression_end()
        .build_regex()
        .unwrap();

    // {{ end }}
    static ref WITH_END_RE: Regex = ExpressionRegexBuilder::new()
        .expect_expression_start()
        .expect_characters("end")
        .expect_expression_end()
        .build_regex()
        .unwrap();
}

fn optional_pipeline(captures: &Captures, group: usize) -> Option<String> {
    captures
        .get(group)
        .map(|m| m.as_str())
        .filter(|pipeline| !pipeline.trim().is_empty())
        .map(str::to_string)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETER SUBSTITUTION
// ═══════════════════════════════════════════════════════════════════════════════

pub struct ParameterSubstitutionParser;

impl ExpressionParser for ParameterSubstitutionParser {
    fn find_expressions(&self, code: &str) -> Result<Vec<Expression>> {
        find_regex_expressions(
            "ParameterSubstitutionParser",
            &PARAMETER_SUBSTITUTION_RE,
            code,
            build_parameter_substitution,
        )
    }
}

fn build_parameter_substitution(captures: &Captures) -> Result<PrimitiveExpression> {
    let parameter_name = captures[1].to_string();
    let pipeline = optional_pipeline(captures, 2);
    let parameter = FunctionParameter::new(parameter_name.as_str(), false)?;
    Ok(PrimitiveExpression {
        evaluator: Box::new(move |context: &ExpressionEvaluationContext<'_>| {
            let argument = context.args.get_argument(&parameter_name)?;
            context.apply_pipeline(argument.argument_value(), pipeline.as_deref())
        }),
        parameters: vec![parameter],
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// WITH BLOCKS
// ═══════════════════════════════════════════════════════════════════════════════

pub struct WithParser;

impl ExpressionParser for WithParser {
    fn find_expressions(&self, code: &str) -> Result<Vec<Expression>> {
        if code.is_empty() {
            return Err(CompileError::MissingCode);
        }
        parse_with_expressions(code)
    }
}

#[derive(Debug)]
enum WithStatement {
    Start {
        parameter_name: String,
        position: ExpressionPosition,
    },
    End {
        position: ExpressionPosition,
    },
    ContextVariable {
        position: ExpressionPosition,
        pipeline: Option<String>,
    },
}

impl WithStatement {
    fn position(&self) -> ExpressionPosition {
        match self {
            WithStatement::Start { position, .. }
            | WithStatement::End { position }
            | WithStatement::ContextVariable { position, .. } => *position,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            WithStatement::Start { .. } => "Start",
            WithStatement::End { .. } => "End",
            WithStatement::ContextVariable { .. } => "ContextVariable",
        }
    }
}

fn full_match_position(captures: &Captures) -> Result<ExpressionPosition> {
    let full = captures.get(0).ok_or_else(|| {
        CompileError::InvalidExpression("regex match without a full match".to_string())
    })?;
    ExpressionPosition::new(full.start(), full.end())
}

fn find_all_statements(code: &str) -> Result<Vec<WithStatement>> {
    let mut statements = Vec::new();
    for captures in WITH_START_RE.captures_iter(code) {
        statements.push(WithStatement::Start {
            parameter_name: captures[1].to_string(),
            position: full_match_position(&captures)?,
        });
    }
    for captures in WITH_END_RE.captures_iter(code) {
        statements.push(WithStatement::End {
            position: full_match_position(&captures)?,
        });
    }
    for captures in CONTEXT_VARIABLE_RE.captures_iter(code) {
        statements.push(WithStatement::ContextVariable {
            position: full_match_position(&captures)?,
            pipeline: optional_pipeline(&captures, 1),
        });
    }
    statements.sort_by_key(|statement| statement.position().start);
    Ok(statements)
}

/// `{{ . }}` occurrence, relative to the start of its block body.
struct ScopedContextVariable {
    start: usize,
    end: usize,
    pipeline: Option<String>,
}

struct WithStatementBuilder {
    start_position: ExpressionPosition,
    parameter_name: String,
    context_variables: Vec<ScopedContextVariable>,
}

impl WithStatementBuilder {
    fn new(start_position: ExpressionPosition, parameter_name: String) -> Self {
        Self {
            start_position,
            parameter_name,
            context_variables: Vec::new(),
        }
    }

    fn add_context_variable(&mut self, position: ExpressionPosition, pipeline: Option<String>) {
        self.context_variables.push(ScopedContextVariable {
            start: position.start - self.start_position.end,
            end: position.end - self.start_position.end,
            pipeline,
        });
    }

    fn build_expression(self, end_position: ExpressionPosition, code: &str) -> Result<Expression> {
        let mut parameters = FunctionParameterCollection::new();
        parameters.add_parameter(FunctionParameter::new(self.parameter_name.as_str(), true)?)?;
        let position = ExpressionPosition::new(self.start_position.start, end_position.end)?;
        let scope = code[self.start_position.end..end_position.start].to_string();
        let parameter_name = self.parameter_name;
        let context_variables = self.context_variables;
        let evaluator = move |context: &ExpressionEvaluationContext<'_>| -> Result<String> {
            if !context.args.has_argument(&parameter_name) {
                return Ok(String::new());
            }
            let value = context.args.get_argument(&parameter_name)?.argument_value();
            let mut substituted = String::with_capacity(scope.len());
            let mut index = 0;
            // the value itself is never compiled, only the text around it
            for variable in &context_variables {
                substituted.push_str(&context.compile_scope(&scope[index..variable.start])?);
                substituted.push_str(&context.apply_pipeline(value, variable.pipeline.as_deref())?);
                index = variable.end;
            }
            substituted.push_str(&context.compile_scope(&scope[index..])?);
            Ok(substituted)
        };
        Ok(Expression::new(position, Box::new(evaluator), parameters))
    }
}

fn parse_with_expressions(code: &str) -> Result<Vec<Expression>> {
    let statements = find_all_statements(code)?;
    let fail = |message: &str| {
        let listed = statements
            .iter()
            .map(|s| format!("- [{}, {}] {}", s.position().start, s.position().end, s.kind()))
            .collect::<Vec<_>>()
            .join("\n");
        CompileError::InvalidExpression(format!(
            "{message}\nCode:\n---\n{code}\n---\nStatements:\n---\n{listed}\n---"
        ))
    };
    let mut expressions = Vec::new();
    let mut builders: Vec<WithStatementBuilder> = Vec::new();
    for statement in &statements {
        match statement {
            WithStatement::Start {
                parameter_name,
                position,
            } => builders.push(WithStatementBuilder::new(*position, parameter_name.clone())),
            WithStatement::ContextVariable { position, pipeline } => match builders.last_mut() {
                Some(builder) => builder.add_context_variable(*position, pipeline.clone()),
                None => return Err(fail("Context variable before `with` statement.")),
            },
            WithStatement::End { position } => match builders.pop() {
                Some(builder) => expressions.push(builder.build_expression(*position, code)?),
                None => return Err(fail("Redundant `end` statement, missing `with`?")),
            },
        }
    }
    if !builders.is_empty() {
        return Err(fail("Missing `end` statement, forgot `{{ end }}`?"));
    }
    Ok(expressions)
}
