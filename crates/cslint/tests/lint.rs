//! End-to-end pipeline tests: preprocess → lex → parse → collated
//! messages in original-source coordinates.

use cslint::{lint_orchestra, LintOptions, Position, Range, Severity};
use std::path::PathBuf;

fn lint(source: &str) -> Vec<cslint::Diagnostic> {
    lint_orchestra(source, &LintOptions::default())
}

fn range(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Range {
    Range::new(
        Position::new(start_line, start_column),
        Position::new(end_line, end_column),
    )
}

#[test]
fn clean_macro_expansion_lints_clean() {
    let messages = lint("#define MACRO #prints \"hi\"#$MACRO");
    assert!(messages.is_empty(), "got {messages:?}");
}

#[test]
fn instrument_number_zero() {
    let messages = lint("instr 0\nendin\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].excerpt, "Instrument number must be greater than 0");
    assert_eq!(messages[0].range, range(0, 6, 0, 7));
}

#[test]
fn redefinition_with_different_type_has_trace() {
    let messages = lint("instr 1\n  kVariable[] init 1\n  kVariable = 1\nendin\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].excerpt,
        "Redefinition of ‘kVariable’ with a different type"
    );
    assert_eq!(messages[0].trace.len(), 1);
    assert_eq!(messages[0].trace[0].range, range(1, 2, 1, 11));
}

#[test]
fn expected_newline_after_then() {
    let messages = lint("if 1 == 1 then + -\nendif\n");
    assert_eq!(messages[0].excerpt, "Invalid if-statement");
    assert_eq!(messages[0].range, range(0, 0, 0, 0));
    assert_eq!(messages[1].excerpt, "Expected newline");
    assert_eq!(messages[1].range, range(0, 14, 0, 14));
    assert_eq!(messages.len(), 2);
}

#[test]
fn unterminated_conditional_skips_parsing() {
    let messages = lint("#ifdef MACRO");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].excerpt, "Unterminated conditional directive");
    assert_eq!(messages[0].range, range(0, 0, 0, 6));
}

#[test]
fn duplicate_label_warns_with_trace() {
    let messages = lint("label:\nlabel:\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].severity, Severity::Warning);
    assert_eq!(messages[0].excerpt, "Duplicate label ‘label’ ignored");
    assert_eq!(messages[0].trace.len(), 1);
    assert_eq!(messages[0].trace[0].excerpt, "Label ‘label’ is here");
    assert_eq!(messages[0].trace[0].range, range(0, 0, 0, 5));
}

#[test]
fn preprocessor_errors_short_circuit_parsing() {
    // The unterminated string is a preprocessor error; the bad
    // orchestra statement after it must not be parsed.
    let messages = lint("\"\nnot_an_opcode(0)\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].excerpt, "Missing terminating ‘\"’");
}

#[test]
fn preprocessor_fatal_becomes_single_message() {
    let messages = lint("$MACRO");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].excerpt, "‘MACRO’ macro is not defined");
}

#[test]
fn positions_survive_macro_expansion() {
    let messages = lint(
        "#define MACRO(string) #prints $string#\ninstr 1\n  $MACRO(\"hello, world\")\n  aOut = aMissing\nendin\n",
    );
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].excerpt, "Use of undefined variable ‘aMissing’");
    // Source coordinates, not preprocessor-output coordinates.
    assert_eq!(messages[0].range, range(3, 9, 3, 17));
}

#[test]
fn messages_carry_the_document_path() {
    let options = LintOptions {
        file_path: Some(PathBuf::from("example.orc")),
        ..LintOptions::default()
    };
    let messages = lint_orchestra("instr 0\nendin\n", &options);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].file.as_deref(), Some(std::path::Path::new("example.orc")));
}

#[test]
fn messages_sort_by_position() {
    let messages = lint("instr 0\nendin\ninstr 1\n  xVariable = 1\nendin\n");
    assert_eq!(messages.len(), 2);
    assert!(messages[0].range.start < messages[1].range.start);
    assert_eq!(messages[0].excerpt, "Instrument number must be greater than 0");
    assert_eq!(
        messages[1].excerpt,
        "Variable name ‘xVariable’ does not begin with type characters"
    );
}

#[test]
fn score_preprocessing_expands_loops() {
    let result = cslint::preprocess_score("{ 3 I\n$I\n}", &LintOptions::default())
        .expect("score preprocessing should succeed");
    assert_eq!(result.output, "1\n2\n3\n");
    assert!(result.messages.is_empty());
}
