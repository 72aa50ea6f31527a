use serde::{Deserialize, Serialize};

/// Shell dialect the compiled code targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLanguage {
    #[default]
    Batchfile,
    Shellscript,
}

/// Lexical facts about a dialect that line validation relies on.
#[derive(Debug, Clone, Copy)]
pub struct LanguageSyntax {
    pub comment_delimiters: &'static [&'static str],
    /// Lines that legitimately repeat (block delimiters, `else`, ...).
    pub common_code_parts: &'static [&'static str],
}

const BATCH_FILE_SYNTAX: LanguageSyntax = LanguageSyntax {
    comment_delimiters: &["REM", "::"],
    common_code_parts: &["(", ")", "else", "||"],
};

const SHELL_SCRIPT_SYNTAX: LanguageSyntax = LanguageSyntax {
    comment_delimiters: &["#"],
    common_code_parts: &["(", ")", "else", "fi", "done"],
};

impl ScriptLanguage {
    pub fn syntax(&self) -> &'static LanguageSyntax {
        match self {
            ScriptLanguage::Batchfile => &BATCH_FILE_SYNTAX,
            ScriptLanguage::Shellscript => &SHELL_SCRIPT_SYNTAX,
        }
    }

    /// Longest line the interpreter accepts.
    pub fn max_line_length(&self) -> usize {
        match self {
            // cmd.exe command line limit
            ScriptLanguage::Batchfile => 8191,
            ScriptLanguage::Shellscript => 1_048_576,
        }
    }
}

impl LanguageSyntax {
    /// Comment delimiters are matched case-insensitively so `rem` and `REM` both count.
    pub fn is_comment(&self, line: &str) -> bool {
        let trimmed = line.trim_start();
        self.comment_delimiters.iter().any(|delimiter| {
            let Some(head) = trimmed.get(..delimiter.len()) else {
                return false;
            };
            if !head.eq_ignore_ascii_case(delimiter) {
                return false;
            }
            // `REM` must stand alone as a word, `REMOVE` is not a comment
            let is_word = delimiter.chars().all(|c| c.is_ascii_alphabetic());
            !is_word
                || trimmed[delimiter.len()..]
                    .chars()
                    .next()
                    .map_or(true, |next| !next.is_ascii_alphanumeric())
        })
    }

    pub fn is_common_code_part(&self, line: &str) -> bool {
        let trimmed = line.trim();
        self.common_code_parts
            .iter()
            .any(|part| trimmed.eq_ignore_ascii_case(part))
    }
}
