//! Code Validation
//!
//! Static line checks for script code: empty lines, duplicated lines, lines
//! longer than the interpreter accepts and code made only of comments.
//! All analyzers run over the full line set and every violation is reported
//! together in one `CodeValidationFailure`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{CompileError, Result};
use crate::language::ScriptLanguage;

lazy_static! {
    static ref LINE_BREAK_RE: Regex = Regex::new(r"\r\n|\r|\n").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// LINES
// ═══════════════════════════════════════════════════════════════════════════════

/// One line of code with its 1-based index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLine {
    pub index: usize,
    pub text: String,
}

/// A violation reported by an analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidCodeLine {
    pub line_index: usize,
    pub error_message: String,
}

impl InvalidCodeLine {
    pub fn new(line_index: usize, error_message: impl Into<String>) -> Self {
        Self {
            line_index,
            error_message: error_message.into(),
        }
    }
}

/// Splits code on `\n`, `\r\n` and bare `\r` alike.
pub fn split_lines(code: &str) -> Vec<CodeLine> {
    LINE_BREAK_RE
        .split(code)
        .enumerate()
        .map(|(i, text)| CodeLine {
            index: i + 1,
            text: text.to_string(),
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// ANALYZERS
// ═══════════════════════════════════════════════════════════════════════════════

pub trait CodeAnalyzer: Send + Sync {
    fn analyze(&self, lines: &[CodeLine], context: &AnalyzerContext) -> Vec<InvalidCodeLine>;
}

#[derive(Debug, Clone, Copy)]
pub struct AnalyzerContext {
    pub language: ScriptLanguage,
    pub max_line_length: usize,
}

impl AnalyzerContext {
    pub fn new(language: ScriptLanguage) -> Self {
        Self {
            language,
            max_line_length: language.max_line_length(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CodeValidationRule {
    NoEmptyLines,
    NoDuplicatedLines,
    NoTooLongLines,
    NoCommentOnlyLines,
}

impl CodeValidationRule {
    pub const ALL: [CodeValidationRule; 4] = [
        CodeValidationRule::NoEmptyLines,
        CodeValidationRule::NoDuplicatedLines,
        CodeValidationRule::NoTooLongLines,
        CodeValidationRule::NoCommentOnlyLines,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            CodeValidationRule::NoEmptyLines => "noEmptyLines",
            CodeValidationRule::NoDuplicatedLines => "noDuplicatedLines",
            CodeValidationRule::NoTooLongLines => "noTooLongLines",
            CodeValidationRule::NoCommentOnlyLines => "noCommentOnlyLines",
        }
    }
}

impl fmt::Display for CodeValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for CodeValidationRule {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|rule| rule.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| CompileError::UnknownValidationRule(s.to_string()))
    }
}

impl CodeAnalyzer for CodeValidationRule {
    fn analyze(&self, lines: &[CodeLine], context: &AnalyzerContext) -> Vec<InvalidCodeLine> {
        match self {
            CodeValidationRule::NoEmptyLines => analyze_empty_lines(lines),
            CodeValidationRule::NoDuplicatedLines => analyze_duplicated_lines(lines, context),
            CodeValidationRule::NoTooLongLines => analyze_too_long_lines(lines, context),
            CodeValidationRule::NoCommentOnlyLines => analyze_comment_only_code(lines, context),
        }
    }
}

fn analyze_empty_lines(lines: &[CodeLine]) -> Vec<InvalidCodeLine> {
    lines
        .iter()
        .filter(|line| line.text.trim().is_empty())
        .map(|line| {
            if line.text.is_empty() {
                InvalidCodeLine::new(line.index, "Empty line")
            } else {
                InvalidCodeLine::new(line.index, "Empty line with whitespace only")
            }
        })
        .collect()
}

fn analyze_duplicated_lines(lines: &[CodeLine], context: &AnalyzerContext) -> Vec<InvalidCodeLine> {
    let syntax = context.language.syntax();
    let mut occurrences: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for line in lines {
        let text = line.text.trim();
        if text.is_empty() || syntax.is_comment(text) || syntax.is_common_code_part(text) {
            continue;
        }
        occurrences.entry(text).or_default().push(line.index);
    }

    let mut invalid: Vec<InvalidCodeLine> = occurrences
        .values()
        .filter(|indexes| indexes.len() > 1)
        .flat_map(|indexes| {
            let joined = indexes
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(",");
            indexes.iter().map(move |&index| {
                InvalidCodeLine::new(index, format!("Line is duplicated at line numbers {}.", joined))
            })
        })
        .collect();
    invalid.sort_by_key(|line| line.line_index);
    invalid
}

fn analyze_too_long_lines(lines: &[CodeLine], context: &AnalyzerContext) -> Vec<InvalidCodeLine> {
    lines
        .iter()
        .filter_map(|line| {
            let length = line.text.chars().count();
            (length > context.max_line_length).then(|| {
                InvalidCodeLine::new(
                    line.index,
                    format!(
                        "Line is too long ({}), max allowed is {} characters.",
                        length, context.max_line_length
                    ),
                )
            })
        })
        .collect()
}

/// Reports only when every non-blank line is a comment: such code does nothing.
fn analyze_comment_only_code(
    lines: &[CodeLine],
    context: &AnalyzerContext,
) -> Vec<InvalidCodeLine> {
    let syntax = context.language.syntax();
    let code_lines: Vec<&CodeLine> = lines
        .iter()
        .filter(|line| !line.text.trim().is_empty())
        .collect();
    if code_lines.is_empty() || !code_lines.iter().all(|line| syntax.is_comment(&line.text)) {
        return vec![];
    }
    code_lines
        .into_iter()
        .map(|line| InvalidCodeLine::new(line.index, "Code consists of comments only."))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALIDATOR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
pub struct CodeValidator {
    context: AnalyzerContext,
}

impl CodeValidator {
    pub fn new(language: ScriptLanguage) -> Self {
        Self {
            context: AnalyzerContext::new(language),
        }
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.context.max_line_length = max_line_length;
        self
    }

    pub fn throw_if_invalid(&self, code: &str, rules: &[CodeValidationRule]) -> Result<()> {
        let analyzers: Vec<&dyn CodeAnalyzer> =
            rules.iter().map(|rule| rule as &dyn CodeAnalyzer).collect();
        self.throw_if_invalid_with(code, &analyzers)
    }

    /// Empty code has nothing to validate.
    pub fn throw_if_invalid_with(&self, code: &str, analyzers: &[&dyn CodeAnalyzer]) -> Result<()> {
        if code.is_empty() {
            return Ok(());
        }
        if analyzers.is_empty() {
            return Err(CompileError::MissingRules);
        }
        let lines = split_lines(code);
        let mut violations: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for analyzer in analyzers {
            for invalid in analyzer.analyze(&lines, &self.context) {
                violations
                    .entry(invalid.line_index)
                    .or_default()
                    .push(invalid.error_message);
            }
        }
        if violations.is_empty() {
            return Ok(());
        }
        tracing::debug!(invalid_lines = violations.len(), "code validation failed");
        Err(CompileError::CodeValidationFailure(render_lines(
            &lines,
            &violations,
        )))
    }
}

fn render_lines(lines: &[CodeLine], violations: &BTreeMap<usize, Vec<String>>) -> String {
    lines
        .iter()
        .map(|line| match violations.get(&line.index) {
            None => format!("[{}] ✅ {}", line.index, line.text),
            Some(errors) => {
                let reasons: String = errors.iter().map(|e| format!("\n\t⟶ {}", e)).collect();
                format!("[{}] ❌ {}{}", line.index, line.text, reasons)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlagLine {
        index: usize,
        reason: &'static str,
    }

    impl CodeAnalyzer for FlagLine {
        fn analyze(&self, _lines: &[CodeLine], _context: &AnalyzerContext) -> Vec<InvalidCodeLine> {
            vec![InvalidCodeLine::new(self.index, self.reason)]
        }
    }

    fn batch() -> CodeValidator {
        CodeValidator::new(ScriptLanguage::Batchfile)
    }

    #[test]
    fn test_mixed_line_endings_split_uniformly() {
        let lines = split_lines("line1\r\nline2\rline3\nline4");
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        let indexes: Vec<usize> = lines.iter().map(|l| l.index).collect();
        assert_eq!(texts, vec!["line1", "line2", "line3", "line4"]);
        assert_eq!(indexes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_aggregates_violations_from_all_analyzers() {
        let rule_a = FlagLine { index: 2, reason: "rule A" };
        let rule_b = FlagLine { index: 4, reason: "rule B" };
        let error = batch()
            .throw_if_invalid_with("one\ntwo\nthree\nfour", &[&rule_a, &rule_b])
            .unwrap_err();
        let message = error.to_string();
        assert!(message.starts_with("Errors with the code."));
        assert!(message.contains("[2] ❌ two\n\t⟶ rule A"));
        assert!(message.contains("[4] ❌ four\n\t⟶ rule B"));
        assert!(message.contains("[1] ✅ one"));
        assert!(message.contains("[3] ✅ three"));
    }

    #[test]
    fn test_lists_every_violation_on_same_line() {
        let first = FlagLine { index: 1, reason: "first" };
        let second = FlagLine { index: 1, reason: "second" };
        let message = batch()
            .throw_if_invalid_with("only", &[&first, &second])
            .unwrap_err()
            .to_string();
        assert!(message.contains("[1] ❌ only\n\t⟶ first\n\t⟶ second"));
    }

    #[test]
    fn test_empty_code_is_not_validated() {
        assert!(batch().throw_if_invalid("", &[]).is_ok());
    }

    #[test]
    fn test_missing_rules() {
        let error = batch().throw_if_invalid("echo", &[]).unwrap_err();
        assert!(matches!(error, CompileError::MissingRules));
    }

    #[test]
    fn test_empty_lines() {
        let error = batch()
            .throw_if_invalid("echo a\n\necho b\n  ", &[CodeValidationRule::NoEmptyLines])
            .unwrap_err()
            .to_string();
        assert!(error.contains("[2] ❌ \n\t⟶ Empty line"));
        assert!(error.contains("[4] ❌   \n\t⟶ Empty line with whitespace only"));
    }

    #[test]
    fn test_duplicated_lines_ignore_comments_and_common_parts() {
        let code = "if x (\necho a\n)\nREM note\nif y (\necho a\n)\nREM note";
        let error = batch()
            .throw_if_invalid(code, &[CodeValidationRule::NoDuplicatedLines])
            .unwrap_err()
            .to_string();
        assert!(error.contains("[2] ❌ echo a\n\t⟶ Line is duplicated at line numbers 2,6."));
        assert!(error.contains("[6] ❌ echo a"));
        assert!(error.contains("[3] ✅ )"));
        assert!(error.contains("[8] ✅ REM note"));
    }

    #[test]
    fn test_too_long_lines_respect_configured_limit() {
        let validator = batch().with_max_line_length(5);
        assert!(validator
            .throw_if_invalid("short", &[CodeValidationRule::NoTooLongLines])
            .is_ok());
        let error = validator
            .throw_if_invalid("toolong", &[CodeValidationRule::NoTooLongLines])
            .unwrap_err()
            .to_string();
        assert!(error.contains("Line is too long (7), max allowed is 5 characters."));
    }

    #[test]
    fn test_comment_only_code() {
        let shell = CodeValidator::new(ScriptLanguage::Shellscript);
        let rules = [CodeValidationRule::NoCommentOnlyLines];
        assert!(shell.throw_if_invalid("# note\necho hi", &rules).is_ok());
        let error = shell.throw_if_invalid("# one\n# two", &rules).unwrap_err();
        assert!(error.to_string().contains("Code consists of comments only."));
    }

    #[test]
    fn test_rule_ids_parse_and_fail_fast() {
        assert_eq!(
            "noTooLongLines".parse::<CodeValidationRule>().unwrap(),
            CodeValidationRule::NoTooLongLines
        );
        let error = "noTabs".parse::<CodeValidationRule>().unwrap_err();
        assert!(matches!(error, CompileError::UnknownValidationRule(id) if id == "noTabs"));
    }
}
