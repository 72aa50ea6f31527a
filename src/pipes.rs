//! Pipes and Pipelines
//!
//! A pipe is a named `string -> string` transformer. A pipeline such as
//! `| escapeDoubleQuotes | inlinePowerShell` applies pipes left to right.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::error::{CompileError, Result};

lazy_static! {
    static ref PIPE_NAME_RE: Regex = Regex::new(r"^[a-z][A-Za-z]*$").unwrap();
    static ref LINE_BREAK_RE: Regex = Regex::new(r"\r\n|\r|\n").unwrap();
    // comments end at any line break, bare `\r` included
    static ref COMMENT_RE: Regex = Regex::new(r"<#[^\r\n]*?#>|#([^\r\n]*)").unwrap();
    static ref BACKTICK_CONTINUATION_RE: Regex = Regex::new(r" +`\s*(?:\r\n|\r|\n)\s*").unwrap();
    static ref SINGLE_QUOTED_HERE_STRING_RE: Regex =
        Regex::new(r"@'\s*(?:\r\n|\r|\n)([\s\S]+?)(?:\r\n|\r|\n)'@").unwrap();
    static ref DOUBLE_QUOTED_HERE_STRING_RE: Regex =
        Regex::new(r#"@"\s*(?:\r\n|\r|\n)([\s\S]+?)(?:\r\n|\r|\n)"@"#).unwrap();
}

pub trait Pipe: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, value: &str) -> String;
}

/// Pipe backed by a closure.
pub struct FnPipe {
    name: String,
    transform: Box<dyn Fn(&str) -> String + Send + Sync>,
}

impl FnPipe {
    pub fn new(
        name: impl Into<String>,
        transform: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            transform: Box::new(transform),
        }
    }
}

impl Pipe for FnPipe {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, value: &str) -> String {
        (self.transform)(value)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILT-IN PIPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Escapes `"` for use inside a double-quoted batch file argument.
pub struct EscapeDoubleQuotes;

impl Pipe for EscapeDoubleQuotes {
    fn name(&self) -> &str {
        "escapeDoubleQuotes"
    }

    fn apply(&self, value: &str) -> String {
        value.replace('"', "\"^\"\"")
    }
}

/// Rewrites multi-line PowerShell into a single line.
pub struct InlinePowerShell;

impl Pipe for InlinePowerShell {
    fn name(&self) -> &str {
        "inlinePowerShell"
    }

    fn apply(&self, value: &str) -> String {
        if !value.contains('\n') && !value.contains('\r') {
            return value.to_string();
        }
        let code = inline_comments(value);
        let code = merge_lines_with_backtick(&code);
        let code = merge_here_strings(&code);
        merge_new_lines(&code)
    }
}

fn inline_comments(code: &str) -> String {
    COMMENT_RE
        .replace_all(code, |captures: &Captures| match captures.get(1) {
            None => captures[0].to_string(),
            Some(comment) => {
                let comment = comment.as_str().trim();
                if comment.is_empty() {
                    "<##>".to_string()
                } else {
                    format!("<# {} #>", comment)
                }
            }
        })
        .into_owned()
}

fn merge_lines_with_backtick(code: &str) -> String {
    BACKTICK_CONTINUATION_RE.replace_all(code, " ").into_owned()
}

fn merge_here_strings(code: &str) -> String {
    const EXPANDABLE_NEW_LINE: &str = "`r`n";
    let code = SINGLE_QUOTED_HERE_STRING_RE.replace_all(code, |captures: &Captures| {
        inline_here_string(&captures[1], '\'', "''", &format!("'+\"{}\"+'", EXPANDABLE_NEW_LINE))
    });
    DOUBLE_QUOTED_HERE_STRING_RE
        .replace_all(&code, |captures: &Captures| {
            inline_here_string(&captures[1], '"', "`\"", EXPANDABLE_NEW_LINE)
        })
        .into_owned()
}

fn inline_here_string(scope: &str, quotes: char, escaped_quotes: &str, separator: &str) -> String {
    let escaped = scope.replace(quotes, escaped_quotes);
    let inlined = LINE_BREAK_RE.split(&escaped).collect::<Vec<_>>().join(separator);
    format!("{quotes}{inlined}{quotes}")
}

fn merge_new_lines(code: &str) -> String {
    LINE_BREAK_RE
        .split(code)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

// ═══════════════════════════════════════════════════════════════════════════════
// PIPE FACTORY
// ═══════════════════════════════════════════════════════════════════════════════

pub struct PipeFactory {
    pipes: IndexMap<String, Box<dyn Pipe>>,
}

impl PipeFactory {
    /// Factory holding exactly the given pipes.
    pub fn new(pipes: Vec<Box<dyn Pipe>>) -> Result<Self> {
        let mut factory = Self {
            pipes: IndexMap::new(),
        };
        for pipe in pipes {
            factory.register(pipe)?;
        }
        Ok(factory)
    }

    pub fn register(&mut self, pipe: Box<dyn Pipe>) -> Result<()> {
        let name = pipe.name().to_string();
        ensure_valid_pipe_name(&name)?;
        if self.pipes.contains_key(&name) {
            return Err(CompileError::DuplicatePipe(name));
        }
        self.pipes.insert(name, pipe);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&dyn Pipe> {
        ensure_valid_pipe_name(name)?;
        self.pipes
            .get(name)
            .map(|pipe| pipe.as_ref())
            .ok_or_else(|| CompileError::UnknownPipe(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pipes.keys().map(|name| name.as_str())
    }
}

impl Default for PipeFactory {
    fn default() -> Self {
        let builtins: Vec<Box<dyn Pipe>> = vec![Box::new(EscapeDoubleQuotes), Box::new(InlinePowerShell)];
        Self {
            pipes: builtins
                .into_iter()
                .map(|pipe| (pipe.name().to_string(), pipe))
                .collect(),
        }
    }
}

fn ensure_valid_pipe_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CompileError::MissingValue("pipe name".to_string()));
    }
    if !PIPE_NAME_RE.is_match(name) {
        return Err(CompileError::InvalidPipeName(name.to_string()));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// PIPELINE COMPILER
// ═══════════════════════════════════════════════════════════════════════════════

pub trait PipelineCompiler: Send + Sync {
    fn compile(&self, value: &str, pipeline: &str) -> Result<String>;
}

#[derive(Default)]
pub struct DefaultPipelineCompiler {
    factory: PipeFactory,
}

impl DefaultPipelineCompiler {
    pub fn new(factory: PipeFactory) -> Self {
        Self { factory }
    }
}

impl PipelineCompiler for DefaultPipelineCompiler {
    fn compile(&self, value: &str, pipeline: &str) -> Result<String> {
        if value.is_empty() {
            return Err(CompileError::MissingValue("value to pipe".to_string()));
        }
        if pipeline.is_empty() {
            return Err(CompileError::MissingPipeline);
        }
        if !pipeline.trim_start().starts_with('|') {
            return Err(CompileError::InvalidPipelineFormat(pipeline.to_string()));
        }
        let mut current = value.to_string();
        for name in extract_pipe_names(pipeline) {
            let pipe = self.factory.get(name)?;
            tracing::trace!(pipe = name, "applying pipe");
            current = pipe.apply(&current);
        }
        Ok(current)
    }
}

fn extract_pipe_names(pipeline: &str) -> impl Iterator<Item = &str> {
    pipeline
        .split('|')
        .map(str::trim)
        .filter(|name| !name.is_empty())
}
