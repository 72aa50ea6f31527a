//! Composable patterns for the `{{ ... }}` template syntax.

use regex::Regex;

#[derive(Debug, Clone, Default)]
pub struct ExpressionRegexBuilder {
    parts: Vec<String>,
}

impl ExpressionRegexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_characters(self, characters: &str) -> Self {
        let escaped = regex::escape(characters);
        self.add_raw(&escaped)
    }

    pub fn expect_one_or_more_whitespaces(self) -> Self {
        self.add_raw(r"\s+")
    }

    pub fn expect_optional_whitespaces(self) -> Self {
        self.add_raw(r"\s*")
    }

    /// `| pipeA | pipeB`, possibly empty.
    pub fn capture_optional_pipeline(self) -> Self {
        self.add_raw(r"((?:\|\s*\b[a-zA-Z]+\b\s*)*)")
    }

    /// Parameter name token.
    pub fn capture_until_whitespace_or_pipe(self) -> Self {
        self.add_raw(r"([^|\s]+)")
    }

    pub fn capture_multiline_anything_except_surrounding_whitespaces(self) -> Self {
        self.add_raw(r"\s*([\S\s]+?)\s*")
    }

    pub fn expect_expression_start(self) -> Self {
        self.expect_characters("{{").expect_optional_whitespaces()
    }

    pub fn expect_expression_end(self) -> Self {
        self.expect_optional_whitespaces().expect_characters("}}")
    }

    pub fn build_pattern(&self) -> String {
        self.parts.concat()
    }

    pub fn build_regex(&self) -> std::result::Result<Regex, regex::Error> {
        Regex::new(&self.build_pattern())
    }

    fn add_raw(mut self, pattern: &str) -> Self {
        self.parts.push(pattern.to_string());
        self
    }
}
