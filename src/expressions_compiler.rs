//! Expressions Compiler
//!
//! Replaces every template expression in a code string with its evaluated value.
//! Code is scanned once and only outer-most expressions are evaluated; `with`
//! blocks compile their own bodies. Substituted values are never scanned again,
//! so argument values may contain template syntax verbatim.

use crate::call::FunctionCallArgumentCollection;
use crate::error::{CompileError, Result, ResultExt};
use crate::expression::{
    CompositeExpressionParser, Expression, ExpressionEvaluationContext, ExpressionParser,
};
use crate::pipes::{DefaultPipelineCompiler, PipelineCompiler};

pub trait ExpressionsCompiler: Send + Sync {
    fn compile_expressions(&self, code: &str, args: &FunctionCallArgumentCollection) -> Result<String>;
}

pub struct DefaultExpressionsCompiler {
    parser: Box<dyn ExpressionParser>,
    pipeline_compiler: Box<dyn PipelineCompiler>,
}

impl DefaultExpressionsCompiler {
    pub fn new(
        parser: Box<dyn ExpressionParser>,
        pipeline_compiler: Box<dyn PipelineCompiler>,
    ) -> Self {
        Self {
            parser,
            pipeline_compiler,
        }
    }
}

impl Default for DefaultExpressionsCompiler {
    fn default() -> Self {
        Self::new(
            Box::new(CompositeExpressionParser::default()),
            Box::new(DefaultPipelineCompiler::default()),
        )
    }
}

impl ExpressionsCompiler for DefaultExpressionsCompiler {
    fn compile_expressions(&self, code: &str, args: &FunctionCallArgumentCollection) -> Result<String> {
        if code.is_empty() {
            return Ok(String::new());
        }
        let expressions = self.parser.find_expressions(code)?;
        if expressions.is_empty() {
            return Ok(code.to_string());
        }
        let context = ExpressionEvaluationContext::new(args, self.pipeline_compiler.as_ref())
            .with_scope_compiler(self);
        compile_outer_expressions(&expressions, code, &context)
    }
}

fn compile_outer_expressions(
    expressions: &[Expression],
    code: &str,
    context: &ExpressionEvaluationContext<'_>,
) -> Result<String> {
    ensure_valid_expressions(expressions, code)?;
    let mut outer: Vec<&Expression> = expressions
        .iter()
        .filter(|expression| {
            !expressions
                .iter()
                .any(|other| expression.position.is_inside_of(&other.position))
        })
        .collect();
    outer.sort_by_key(|expression| expression.position.start);

    let mut compiled = String::with_capacity(code.len());
    let mut index = 0;
    for expression in outer {
        let position = expression.position;
        compiled.push_str(&code[index..position.start]);
        let source = &code[position.start..position.end];
        tracing::trace!(expression = source, "evaluating expression");
        let value = expression
            .evaluate(context)
            .with_context(|| format!("Failed to evaluate expression: {source}"))?;
        compiled.push_str(&value);
        index = position.end;
    }
    compiled.push_str(&code[index..]);
    Ok(compiled)
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

fn ensure_valid_expressions(expressions: &[Expression], code: &str) -> Result<()> {
    ensure_within_code_length(expressions, code)?;
    ensure_no_expressions_at_same_position(expressions)?;
    ensure_no_invalid_intersections(expressions)
}

fn describe(expressions: &[&Expression]) -> String {
    expressions
        .iter()
        .map(|e| format!("- [{}, {}]", e.position.start, e.position.end))
        .collect::<Vec<_>>()
        .join("\n")
}

fn ensure_within_code_length(expressions: &[Expression], code: &str) -> Result<()> {
    let out_of_range: Vec<&Expression> = expressions
        .iter()
        .filter(|expression| expression.position.end > code.len())
        .collect();
    if out_of_range.is_empty() {
        return Ok(());
    }
    Err(CompileError::InvalidExpression(format!(
        "Expressions out of range:\n{}",
        describe(&out_of_range)
    )))
}

fn ensure_no_expressions_at_same_position(expressions: &[Expression]) -> Result<()> {
    let at_same_position: Vec<&Expression> = expressions
        .iter()
        .filter(|expression| {
            expressions
                .iter()
                .filter(|other| expression.position.is_same(&other.position))
                .count()
                > 1
        })
        .collect();
    if at_same_position.is_empty() {
        return Ok(());
    }
    Err(CompileError::InvalidExpression(format!(
        "Instructions at same position:\n{}",
        describe(&at_same_position)
    )))
}

fn ensure_no_invalid_intersections(expressions: &[Expression]) -> Result<()> {
    let intersecting: Vec<&Expression> = expressions
        .iter()
        .filter(|expression| {
            let position = &expression.position;
            expressions.iter().any(|other| {
                let other = &other.position;
                position.is_intersecting(other)
                    && !position.is_same(other)
                    && !position.is_inside_of(other)
                    && !other.is_inside_of(position)
            })
        })
        .collect();
    if intersecting.is_empty() {
        return Ok(());
    }
    Err(CompileError::InvalidExpression(format!(
        "Instructions intersecting unexpectedly:\n{}",
        describe(&intersecting)
    )))
}
