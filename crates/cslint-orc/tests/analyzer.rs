//! Semantic-analysis tests: instrument checks, variable typing and
//! redefinition, opcode input matching, and control-construct
//! conditions.

use cslint_foundation::{Diagnostic, Position, Range, Severity};
use cslint_orc::{opcodes, parser, OrchestraLexer, SymbolTable};

/// Lex and parse, combining lexer and parser messages in stage order.
fn analyze(source: &str) -> Vec<Diagnostic> {
    let mut symbols = SymbolTable::new(opcodes::builtin().clone());
    let lexed = OrchestraLexer::new(&mut symbols)
        .tokenize(source)
        .expect("lexing should not abort");
    let (_, parse_messages) = parser::parse(&lexed.tokens, &mut symbols);
    let mut messages = lexed.messages;
    messages.extend(parse_messages);
    messages
}

fn range(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Range {
    Range::new(
        Position::new(start_line, start_column),
        Position::new(end_line, end_column),
    )
}

#[test]
fn instrument_number_zero() {
    let messages = analyze("instr 0\nendin\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].severity, Severity::Error);
    assert_eq!(messages[0].excerpt, "Instrument number must be greater than 0");
    assert_eq!(messages[0].range, range(0, 6, 0, 7));
}

#[test]
fn redefined_instrument_number() {
    let messages = analyze("instr 1\nendin\ninstr 1\nendin\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].excerpt, "Instrument 1 redefined");
    assert_eq!(messages[0].range, range(2, 6, 2, 7));
    assert_eq!(messages[0].trace.len(), 1);
    assert_eq!(messages[0].trace[0].excerpt, "Previous definition is here");
    assert_eq!(messages[0].trace[0].range, range(0, 6, 0, 7));
}

#[test]
fn redefined_instrument_name() {
    let messages = analyze("instr name\nendin\ninstr name\nendin\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].excerpt, "Instrument name redefined");
    assert_eq!(messages[0].trace[0].range, range(0, 6, 0, 10));
}

#[test]
fn merge_named_instrument_is_not_a_redefinition() {
    let messages = analyze("instr name\nendin\ninstr +name\nendin\n");
    assert!(messages.is_empty(), "got {messages:?}");
}

#[test]
fn global_variable_assignment() {
    let messages = analyze("giVariable = 0\n");
    assert!(messages.is_empty(), "got {messages:?}");
}

#[test]
fn global_value_assignment() {
    let messages = analyze("0dbfs = 1\n");
    assert!(messages.is_empty(), "got {messages:?}");
}

#[test]
fn variable_without_type_characters() {
    let messages = analyze("instr 1\n  xVariable = 1\nendin\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].excerpt,
        "Variable name ‘xVariable’ does not begin with type characters"
    );
    assert_eq!(messages[0].range, range(1, 2, 1, 11));
}

#[test]
fn array_output_without_type_characters() {
    let messages = analyze("instr 1\n  g_peak[] init 2\nendin\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].excerpt,
        "Variable name ‘g_peak’ does not begin with type characters"
    );
    assert_eq!(messages[0].range, range(1, 2, 1, 8));
}

#[test]
fn redefinition_with_different_type() {
    let messages = analyze("instr 1\n  kVariable[] init 1\n  kVariable = 1\nendin\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].excerpt,
        "Redefinition of ‘kVariable’ with a different type"
    );
    assert_eq!(messages[0].range, range(2, 2, 2, 11));
    assert_eq!(messages[0].trace.len(), 1);
    assert_eq!(messages[0].trace[0].excerpt, "Previous definition is here");
    assert_eq!(messages[0].trace[0].range, range(1, 2, 1, 11));
}

#[test]
fn redeclaration_with_same_type_is_silent() {
    let messages = analyze("instr 1\n  kValue = 1\n  kValue = 2\nendin\n");
    assert!(messages.is_empty(), "got {messages:?}");
}

#[test]
fn undefined_variable_use() {
    let messages = analyze("instr 1\n  out aUndefined\nendin\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].excerpt, "Use of undefined variable ‘aUndefined’");
    assert_eq!(messages[0].range, range(1, 6, 1, 16));
}

#[test]
fn p_field_warnings() {
    let messages = analyze(
        "prints \"%d\\n\", p4\ninstr 1\n  prints \"%d\\n\", p0\n  prints \"%d\\n\", p1\nendin\n",
    );
    // p4 outside an instrument, and p0 anywhere, are always 0; p1
    // inside the instrument is fine.
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].severity, Severity::Warning);
    assert_eq!(messages[0].excerpt, "Value of p-field is always 0");
    assert_eq!(messages[0].range, range(0, 15, 0, 17));
    assert_eq!(messages[1].excerpt, "Value of p-field is always 0");
    assert_eq!(messages[1].range, range(2, 17, 2, 19));
}

#[test]
fn array_declarations_and_member_assignments() {
    let messages = analyze(
        "iArray1[] init 1\niArray1[0] = 0\niArray2[][] init 1, 1\niArray2[0][0 == 1 ? 0 : 0] = 0\n",
    );
    assert!(messages.is_empty(), "got {messages:?}");
}

#[test]
fn array_assignment_from_global() {
    let messages = analyze("giArray[] fillarray 1, 2\niArray[] = giArray\n");
    assert!(messages.is_empty(), "got {messages:?}");
}

#[test]
fn void_opcode_with_no_inputs() {
    let messages = analyze("opcode anOpcode, 0, 0\nendop\nanOpcode\n");
    assert!(messages.is_empty(), "got {messages:?}");
}

#[test]
fn full_orchestra_is_clean() {
    let messages = analyze(
        "0dbfs = 1\ngiFunctionTableID ftgen 0, 0, 16384, 10, 1\ninstr A440\n  outc oscili(0.5 * 0dbfs, 440, giFunctionTableID)\nendin\n",
    );
    assert!(messages.is_empty(), "got {messages:?}");
}

#[test]
fn if_goto_is_clean() {
    let messages = analyze("if 1 == 1 goto label\nlabel:\n");
    assert!(messages.is_empty(), "got {messages:?}");
}

#[test]
fn if_then_elseif_else_is_clean() {
    let messages = analyze(
        "if 1 == 1 then\nelseif 2 == 2 then\nelseif 3 != 3 then\nelse\nendif\n",
    );
    assert!(messages.is_empty(), "got {messages:?}");
}

#[test]
fn while_loop_is_clean() {
    let messages = analyze("iIndex = 0\nwhile iIndex < 5 do\n  iIndex += 1\nod\n");
    assert!(messages.is_empty(), "got {messages:?}");
}

#[test]
fn until_loop_is_clean() {
    let messages = analyze("until 1 == 1 do\nod\n");
    assert!(messages.is_empty(), "got {messages:?}");
}

// ----------------------------------------------------------------------
// Syntax-error recovery
// ----------------------------------------------------------------------

#[test]
fn if_then_with_trailing_tokens() {
    let messages = analyze("if 1 == 1 then + -\nendif\n");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].excerpt, "Expected newline");
    assert_eq!(messages[0].range, range(0, 14, 0, 14));
    assert_eq!(messages[1].excerpt, "Invalid if-statement");
    assert_eq!(messages[1].range, range(0, 0, 0, 0));
}

#[test]
fn statement_starting_with_string() {
    let messages = analyze("prints\n\"hello, world\"\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].excerpt, "Invalid statement");
    assert_eq!(messages[0].range, range(1, 0, 1, 0));
}

#[test]
fn call_of_non_opcode_identifier() {
    let messages = analyze("not_an_opcode(0)\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].excerpt, "Invalid statement");
    assert_eq!(messages[0].range, range(0, 13, 0, 13));
}

#[test]
fn while_loop_with_missing_operand() {
    let messages = analyze("iIndex = 0\nwhile iIndex < do\n  iIndex += 1\nod\n");
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].excerpt, "Expected expression");
    assert_eq!(messages[0].range, range(1, 15, 1, 15));
    assert_eq!(
        messages[1].excerpt,
        "Types of operands do not match type signatures of operator <"
    );
    assert_eq!(messages[1].range, range(1, 6, 1, 15));
    assert_eq!(
        messages[2].excerpt,
        "Condition of while-loop is not a Boolean expression"
    );
    assert_eq!(messages[2].range, range(1, 6, 1, 15));
}

#[test]
fn non_boolean_if_condition() {
    let messages = analyze("if 1 then\nendif\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].excerpt,
        "Condition of if-statement is not a Boolean expression"
    );
}

// ----------------------------------------------------------------------
// Opcode input matching
// ----------------------------------------------------------------------

#[test]
fn optional_o_default_warns() {
    let messages = analyze("instr 1\n  aSignal oscili 0dbfs, 440, -1, 0\nendin\n");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].severity, Severity::Warning);
    assert_eq!(messages[0].excerpt, "Passing default value of 0 is unnecessary");
    assert_eq!(messages[0].range, range(1, 33, 1, 34));
    assert_eq!(messages[1].excerpt, "Passing default value of -1 is unnecessary");
    assert_eq!(messages[1].range, range(1, 29, 1, 31));
}

#[test]
fn optional_o_other_value_is_silent() {
    let messages = analyze("instr 1\n  aSignal oscili 0dbfs, 440, -1, 1\nendin\n");
    assert_eq!(messages.len(), 1, "got {messages:?}");
    assert_eq!(messages[0].excerpt, "Passing default value of -1 is unnecessary");
}

#[test]
fn optional_j_default_warns() {
    let messages = analyze("instr 1\n  aSignal oscili 0dbfs, 440, -1\nendin\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].excerpt, "Passing default value of -1 is unnecessary");
    assert_eq!(messages[0].range, range(1, 29, 1, 31));
}

#[test]
fn optional_j_omitted_is_silent() {
    let messages = analyze("instr 1\n  aSignal oscili 0dbfs, 440\nendin\n");
    assert!(messages.is_empty(), "got {messages:?}");
}

#[test]
fn optional_v_default_warns() {
    let messages = analyze("instr 1\n  aSignal rand 0dbfs, 0.50\nendin\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].excerpt, "Passing default value of 0.5 is unnecessary");
    assert_eq!(messages[0].range, range(1, 22, 1, 26));
}

#[test]
fn optional_p_default_warns() {
    let messages = analyze("instr 1\n  iResult pow 1, 2, 1.0\nendin\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].excerpt, "Passing default value of 1 is unnecessary");
    assert_eq!(messages[0].range, range(1, 20, 1, 23));
}

#[test]
fn optional_q_default_warns_for_hex() {
    let messages = analyze("instr 1\n  kRMS rms rand(0dbfs), 0xA\nendin\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].excerpt, "Passing default value of 10 is unnecessary");
    assert_eq!(messages[0].range, range(1, 24, 1, 27));
}

#[test]
fn optional_h_defaults_warn_in_reverse_order() {
    let messages = analyze("instr 1\n  iResult veloc 0, 127\nendin\n");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].excerpt, "Passing default value of 127 is unnecessary");
    assert_eq!(messages[0].range, range(1, 19, 1, 22));
    assert_eq!(messages[1].excerpt, "Passing default value of 0 is unnecessary");
    assert_eq!(messages[1].range, range(1, 16, 1, 17));
}

#[test]
fn optional_all_omitted_is_silent() {
    let messages = analyze("instr 1\n  iResult veloc\nendin\n");
    assert!(messages.is_empty(), "got {messages:?}");
}

#[test]
fn variable_arity_m_accepts_any_count() {
    for args in ["", " 1", " 1, 2, 3, 4, 5, 6, 7, 8"] {
        let messages = analyze(&format!("instr 1\n  iResult[] fillarray{args}\nendin\n"));
        assert!(messages.is_empty(), "fillarray{args}: got {messages:?}");
    }
}

#[test]
fn variable_arity_z_accepts_k_rate_tail() {
    let messages =
        analyze("kValue init 1\ninstr 1\n  event \"i\", 1, 0, kValue\nendin\n");
    assert!(messages.is_empty(), "got {messages:?}");
}

#[test]
fn variable_arity_n_requires_odd_count() {
    let messages = analyze("instr 1\n  tablexseg 1, 0.5\nendin\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].excerpt,
        "Types of input arguments do not match type signatures of opcode ‘tablexseg’"
    );
    assert_eq!(messages[0].range, range(1, 2, 1, 11));

    for args in ["1, 0.5, 2", "1, 0.5, 2, 0.5, 3"] {
        let messages = analyze(&format!("instr 1\n  tablexseg {args}\nendin\n"));
        assert!(messages.is_empty(), "tablexseg {args}: got {messages:?}");
    }
}

#[test]
fn variable_arity_paired_requires_pairs() {
    let messages = analyze("instr 1\n  outch 1\nendin\n");
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].excerpt,
        "Types of input arguments do not match type signatures of opcode ‘outch’"
    );
    assert_eq!(messages[0].range, range(1, 2, 1, 7));

    let messages = analyze(
        "instr 1\n  outch 1, oscili(0dbfs, 440), 2, oscili(0dbfs, 440)\nendin\n",
    );
    assert!(messages.is_empty(), "got {messages:?}");
}

#[test]
fn wildcard_array_input() {
    let messages = analyze("iArray[][][] init 10, 9, 8\niCount lenarray iArray\n");
    assert!(messages.is_empty(), "got {messages:?}");
}

#[test]
fn arguments_matching_multiple_signatures_warn() {
    let messages = analyze(
        "instr 1\n  aSignal oscili oscili(0dbfs, 1), oscili(440, 1000)\nendin\n",
    );
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].severity, Severity::Warning);
    assert_eq!(
        messages[0].excerpt,
        "Types of input arguments match multiple type signatures of opcode ‘oscili’"
    );
    assert_eq!(messages[0].range, range(1, 10, 1, 16));
}
