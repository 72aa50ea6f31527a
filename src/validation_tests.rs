//! Code Validation Tests
//!
//! Validation as scripts see it, driven by `CompileOptions`:
//! - literal code and revert code against the inline rules
//! - compiled code against the relaxed compiled rules
//! - dialect comments and common code parts
//! - line length overrides and missing rule sets

#[cfg(test)]
mod tests {
    use crate::data::CollectionData;
    use crate::error::{CompileError, ERR_CODE_VALIDATION_FAILURE};
    use crate::options::CompileOptions;
    use crate::script::{CategoryCollectionContext, Script};
    use crate::validate::CodeValidationRule;
    use crate::{Result, ScriptLanguage};

    fn parse_first(yaml: &str, options: CompileOptions) -> Result<Script> {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let collection = CollectionData::from_yaml(yaml).unwrap();
        let context = CategoryCollectionContext::new(&collection.functions, options).unwrap();
        context.parse_script(&collection.scripts[0])
    }

    fn literal_script(code: &str) -> String {
        format!("scripts:\n  - name: Literal\n    code: {:?}\n", code)
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // INLINE CODE
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_duplicated_lines_reported_across_mixed_line_endings() {
        let error = parse_first(
            &literal_script("echo a\r\necho b\recho a"),
            CompileOptions::default(),
        )
        .unwrap_err();
        assert_eq!(error.code(), ERR_CODE_VALIDATION_FAILURE);
        let message = error.to_string();
        assert!(message.contains("[1] ❌ echo a\n\t⟶ Line is duplicated at line numbers 1,3."));
        assert!(message.contains("[2] ✅ echo b"));
        assert!(message.contains("[3] ❌ echo a\n\t⟶ Line is duplicated at line numbers 1,3."));
    }

    #[test]
    fn test_common_code_parts_may_repeat() {
        let script = parse_first(
            &literal_script("(\necho one\n)\n(\necho two\n)"),
            CompileOptions::default(),
        )
        .unwrap();
        assert_eq!(script.code.execute, "(\necho one\n)\n(\necho two\n)");
    }

    #[test]
    fn test_revert_code_is_validated_too() {
        let yaml = r#"
scripts:
  - name: Broken revert
    code: echo on
    revertCode: "echo off\n\necho done"
"#;
        let error = parse_first(yaml, CompileOptions::default()).unwrap_err();
        let message = error.to_string();
        assert!(message.contains("[2] ❌ \n\t⟶ Empty line"));
        assert!(message.contains("[1] ✅ echo off"));
    }

    #[test]
    fn test_missing_rules_fail_instead_of_passing_silently() {
        let options = CompileOptions {
            inline_code_rules: vec![],
            ..CompileOptions::default()
        };
        let error = parse_first(&literal_script("echo hi"), options).unwrap_err();
        assert!(matches!(error.root_cause(), CompileError::MissingRules));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // DIALECTS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_batchfile_comment_only_code_is_rejected() {
        let error = parse_first(
            &literal_script("REM first\n:: second\nrem third"),
            CompileOptions::for_language(ScriptLanguage::Batchfile),
        )
        .unwrap_err();
        let message = error.to_string();
        assert!(message.contains("[1] ❌ REM first\n\t⟶ Code consists of comments only."));
        assert!(message.contains("[3] ❌ rem third\n\t⟶ Code consists of comments only."));
    }

    #[test]
    fn test_batchfile_command_starting_with_rem_is_code() {
        let script = parse_first(
            &literal_script("REM cleanup\nREMOVE-ITEM temp"),
            CompileOptions::for_language(ScriptLanguage::Batchfile),
        )
        .unwrap();
        assert_eq!(script.code.execute, "REM cleanup\nREMOVE-ITEM temp");
    }

    #[test]
    fn test_hash_is_not_a_comment_in_batchfile() {
        assert!(parse_first(
            &literal_script("# not a comment here"),
            CompileOptions::for_language(ScriptLanguage::Batchfile),
        )
        .is_ok());
        assert!(parse_first(
            &literal_script("# but it is here"),
            CompileOptions::for_language(ScriptLanguage::Shellscript),
        )
        .is_err());
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // COMPILED CODE
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_compiled_code_may_repeat_lines_from_different_functions() {
        let yaml = r#"
functions:
  - name: restartService
    code: "net stop svc\nnet start svc"
  - name: stopService
    code: net stop svc
scripts:
  - name: Bounce then stop
    call:
      - function: restartService
      - function: stopService
"#;
        let script = parse_first(yaml, CompileOptions::default()).unwrap();
        assert_eq!(
            script.code.execute,
            "net stop svc\nnet start svc\nnet stop svc"
        );
    }

    #[test]
    fn test_max_line_length_override_applies_to_compiled_code() {
        let yaml = r#"
functions:
  - name: say
    parameters:
      - name: text
    code: echo {{ $text }}
scripts:
  - name: Chatty
    call:
      function: say
      parameters:
        text: a rather long sentence
"#;
        let options = CompileOptions {
            max_line_length: Some(20),
            ..CompileOptions::default()
        };
        let error = parse_first(yaml, options).unwrap_err();
        assert_eq!(error.contexts()[0], "Failed to parse script: Chatty");
        assert!(error
            .to_string()
            .contains("Line is too long (27), max allowed is 20 characters."));

        assert!(parse_first(yaml, CompileOptions::default()).is_ok());
    }

    #[test]
    fn test_compiled_rules_configurable_per_collection() {
        let yaml = r#"
functions:
  - name: twice
    parameters:
      - name: line
    code: "{{ $line }}\nsecond"
scripts:
  - name: Repeats
    call:
      function: twice
      parameters:
        line: second
"#;
        assert!(parse_first(yaml, CompileOptions::default()).is_ok());

        let strict = CompileOptions {
            compiled_code_rules: vec![CodeValidationRule::NoDuplicatedLines],
            ..CompileOptions::default()
        };
        let error = parse_first(yaml, strict).unwrap_err();
        assert!(error
            .to_string()
            .contains("Line is duplicated at line numbers 1,2."));
    }
}
