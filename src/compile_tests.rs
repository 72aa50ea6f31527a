//! End-to-end Compilation Tests
//!
//! Whole collections, from YAML to compiled `ScriptCode`:
//! - inline and nested function calls
//! - argument propagation and required parameters
//! - `with` blocks and pipes inside called functions
//! - error chains from script name down to the cause

#[cfg(test)]
mod tests {
    use crate::data::CollectionData;
    use crate::error::CompileError;
    use crate::options::CompileOptions;
    use crate::script::{CategoryCollectionContext, Script, ScriptCode};
    use crate::{Result, ScriptLanguage};
    use pretty_assertions::assert_eq;

    fn compile_collection(yaml: &str, options: CompileOptions) -> Vec<Result<Script>> {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let collection = CollectionData::from_yaml(yaml).unwrap();
        let context = CategoryCollectionContext::new(&collection.functions, options).unwrap();
        context.parse_scripts(&collection.scripts)
    }

    fn compile_single(yaml: &str) -> Result<Script> {
        compile_collection(yaml, CompileOptions::default())
            .into_iter()
            .next()
            .unwrap()
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // CALLS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_greet_end_to_end() {
        let script = compile_single(
            r#"
functions:
  - name: greet
    parameters:
      - name: name
    code: echo Hello {{ $name }}
scripts:
  - name: Say hello
    call:
      function: greet
      parameters:
        name: World
"#,
        )
        .unwrap();
        assert_eq!(
            script.code,
            ScriptCode {
                execute: "echo Hello World".to_string(),
                revert: None,
            }
        );
    }

    #[test]
    fn test_call_sequence_merges_execute_and_revert() {
        let script = compile_single(
            r#"
functions:
  - name: setValue
    parameters:
      - name: key
      - name: value
    code: reg add {{ $key }} /d {{ $value }}
    revertCode: reg delete {{ $key }}
  - name: note
    parameters:
      - name: text
    code: echo {{ $text }}
scripts:
  - name: Tweak
    call:
      - function: note
        parameters:
          text: starting
      - function: setValue
        parameters:
          key: HKCU\Tweak
          value: "1"
"#,
        )
        .unwrap();
        assert_eq!(script.code.execute, "echo starting\nreg add HKCU\\Tweak /d 1");
        assert_eq!(script.code.revert.as_deref(), Some("reg delete HKCU\\Tweak"));
    }

    #[test]
    fn test_deeply_nested_calls_propagate_arguments() {
        let results = compile_collection(
            r#"
functions:
  - name: runCommand
    parameters:
      - name: command
    code: cmd /c "{{ $command | escapeDoubleQuotes }}"
  - name: writeLine
    parameters:
      - name: message
    call:
      function: runCommand
      parameters:
        command: echo "{{ $message }}"
  - name: announce
    parameters:
      - name: who
      - name: greeting
        optional: true
    call:
      function: writeLine
      parameters:
        message: "{{ with $greeting }}{{ . }}, {{ end }}{{ $who }}"
scripts:
  - name: Plain
    call:
      function: announce
      parameters:
        who: Alice
  - name: Greeted
    call:
      function: announce
      parameters:
        who: Bob
        greeting: Hi
"#,
            CompileOptions::default(),
        );
        let plain = results[0].as_ref().unwrap();
        let greeted = results[1].as_ref().unwrap();
        assert_eq!(plain.code.execute, r#"cmd /c "echo "^""Alice"^""""#);
        assert_eq!(greeted.code.execute, r#"cmd /c "echo "^""Hi, Bob"^""""#);
    }

    #[test]
    fn test_required_parameter_enforced_but_optional_dropped() {
        let yaml = |optional: bool| {
            format!(
                r#"
functions:
  - name: inner
    parameters:
      - name: target
        optional: {optional}
    code: "run{{{{ with $target }}}} {{{{ . }}}}{{{{ end }}}}"
  - name: outer
    parameters:
      - name: maybe
        optional: true
    call:
      function: inner
      parameters:
        target: "{{{{ with $maybe }}}}{{{{ . }}}}{{{{ end }}}}"
scripts:
  - name: Script
    call:
      function: outer
"#
            )
        };
        let error = compile_single(&yaml(false)).unwrap_err();
        assert!(error.to_string().contains("\"target\""));
        assert!(matches!(
            error.root_cause(),
            CompileError::MissingRequiredParameterValue(_)
        ));

        let script = compile_single(&yaml(true)).unwrap();
        assert_eq!(script.code.execute, "run");
    }

    #[test]
    fn test_error_chain_reads_from_script_to_cause() {
        let error = compile_single(
            r#"
functions:
  - name: inner
    parameters:
      - name: value
    code: echo {{ $value | shout }}
  - name: outer
    parameters:
      - name: value
    call:
      function: inner
      parameters:
        value: "{{ $value }}"
scripts:
  - name: Loud
    call:
      function: outer
      parameters:
        value: hey
"#,
        )
        .unwrap_err();
        let contexts = error.contexts();
        assert_eq!(contexts[0], "Failed to parse script: Loud");
        assert_eq!(contexts[1], "Failed to compile script: Loud");
        assert_eq!(
            contexts[2],
            "Error with call to \"inner\" function from \"outer\" function"
        );
        assert!(matches!(error.root_cause(), CompileError::UnknownPipe(ref p) if p == "shout"));
    }

    #[test]
    fn test_circular_functions_fail_instead_of_overflowing() {
        let error = compile_single(
            r#"
functions:
  - name: first
    call:
      function: second
  - name: second
    call:
      function: third
  - name: third
    call:
      function: first
scripts:
  - name: Loop
    call:
      function: first
"#,
        )
        .unwrap_err();
        assert!(matches!(
            error.root_cause(),
            CompileError::CircularFunctionReference(ref path) if path == "first -> second -> third -> first"
        ));
    }

    #[test]
    fn test_template_syntax_in_arguments_is_emitted_literally() {
        let results = compile_collection(
            r#"
functions:
  - name: say
    parameters:
      - name: text
    code: echo {{ $text }}
  - name: relay
    parameters:
      - name: text
    call:
      function: say
      parameters:
        text: "[{{ $text }}]"
scripts:
  - name: Self reference
    call:
      function: say
      parameters:
        text: "{{ $text }}"
  - name: Stray end
    call:
      function: relay
      parameters:
        text: "see {{ end }} docs"
"#,
            CompileOptions::default(),
        );
        assert_eq!(results[0].as_ref().unwrap().code.execute, "echo {{ $text }}");
        assert_eq!(
            results[1].as_ref().unwrap().code.execute,
            "echo [see {{ end }} docs]"
        );
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // PIPES
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_inline_powershell_in_function() {
        let script = compile_single(
            r#"
functions:
  - name: runPowerShell
    parameters:
      - name: code
    code: PowerShell -Command "{{ $code | inlinePowerShell | escapeDoubleQuotes }}"
scripts:
  - name: Services
    call:
      function: runPowerShell
      parameters:
        code: |-
          # list services
          Get-Service `
            | Where-Object { $_.Status -eq "Running" }
"#,
        )
        .unwrap();
        assert_eq!(
            script.code.execute,
            r#"PowerShell -Command "<# list services #>; Get-Service | Where-Object { $_.Status -eq "^""Running"^"" }""#
        );
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // LANGUAGES
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_shellscript_comment_only_script_is_rejected() {
        let results = compile_collection(
            r#"
scripts:
  - name: Only comments
    code: |-
      # nothing to do
      # still nothing
"#,
            CompileOptions::for_language(ScriptLanguage::Shellscript),
        );
        let error = results[0].as_ref().unwrap_err();
        assert!(error.to_string().contains("Code consists of comments only."));
    }
}
