//! Structural tests for the parser: expression shapes, precedence, and
//! statement forms.

use cslint_foundation::{Position, Range};
use cslint_orc::ast::{
    BinaryOperator, ExprKind, InstrumentId, Orchestra, StmtKind, UnaryOperator,
};
use cslint_orc::{opcodes, parser, OrchestraLexer, SymbolTable};

fn parse(source: &str) -> Orchestra {
    let mut symbols = SymbolTable::new(opcodes::builtin().clone());
    let lexed = OrchestraLexer::new(&mut symbols)
        .tokenize(source)
        .expect("lexing should not abort");
    let (orchestra, _) = parser::parse(&lexed.tokens, &mut symbols);
    orchestra
}

fn range(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Range {
    Range::new(
        Position::new(start_line, start_column),
        Position::new(end_line, end_column),
    )
}

#[test]
fn parses_number_assignment() {
    let orchestra = parse("iValue = 1\n");
    assert_eq!(orchestra.statements.len(), 1);
    let StmtKind::Assignment { target, value, .. } = &orchestra.statements[0].kind else {
        panic!("expected an assignment, got {:?}", orchestra.statements[0]);
    };
    assert!(matches!(&target.kind, ExprKind::Identifier { name } if &**name == "iValue"));
    let ExprKind::NumberLiteral { text } = &value.kind else {
        panic!("expected a number literal, got {value:?}");
    };
    assert_eq!(&**text, "1");
    assert_eq!(value.range, range(0, 9, 0, 10));
}

#[test]
fn parses_additive_expression() {
    let orchestra = parse("iValue = 1 + 1\n");
    let StmtKind::Assignment { value, .. } = &orchestra.statements[0].kind else {
        panic!("expected an assignment");
    };
    let ExprKind::BinaryOperation { operator, left, right } = &value.kind else {
        panic!("expected a binary operation, got {value:?}");
    };
    assert_eq!(*operator, BinaryOperator::Plus);
    assert!(matches!(&left.kind, ExprKind::NumberLiteral { text } if &**text == "1"));
    assert!(matches!(&right.kind, ExprKind::NumberLiteral { text } if &**text == "1"));
    assert_eq!(value.range, range(0, 9, 0, 14));
}

#[test]
fn bitwise_and_binds_tighter_than_or() {
    let orchestra = parse("iValue = 0xFF & 0x15 | 1234\n");
    let StmtKind::Assignment { value, .. } = &orchestra.statements[0].kind else {
        panic!("expected an assignment");
    };
    let ExprKind::BinaryOperation { operator, left, right } = &value.kind else {
        panic!("expected a binary operation");
    };
    assert_eq!(*operator, BinaryOperator::BitwiseOr);
    assert!(matches!(
        &left.kind,
        ExprKind::BinaryOperation { operator: BinaryOperator::BitwiseAnd, .. }
    ));
    assert!(matches!(&right.kind, ExprKind::NumberLiteral { text } if &**text == "1234"));
}

#[test]
fn comparison_with_complement_operand() {
    let orchestra = parse("if 1234567 > ~0x15 then\nendif\n");
    let StmtKind::If { condition, .. } = &orchestra.statements[0].kind else {
        panic!("expected an if statement");
    };
    let ExprKind::BinaryOperation { operator, right, .. } = &condition.kind else {
        panic!("expected a comparison");
    };
    assert_eq!(*operator, BinaryOperator::GreaterThan);
    assert!(matches!(
        &right.kind,
        ExprKind::UnaryOperation { operator: UnaryOperator::BitwiseComplement, .. }
    ));
}

#[test]
fn negation_groups_before_subtraction() {
    let orchestra = parse("iValue = (-124561-1) & 200000000\n");
    let StmtKind::Assignment { value, .. } = &orchestra.statements[0].kind else {
        panic!("expected an assignment");
    };
    let ExprKind::BinaryOperation { operator, left, .. } = &value.kind else {
        panic!("expected a binary operation");
    };
    assert_eq!(*operator, BinaryOperator::BitwiseAnd);
    let ExprKind::BinaryOperation { operator, left, .. } = &left.kind else {
        panic!("expected a nested subtraction");
    };
    assert_eq!(*operator, BinaryOperator::Minus);
    assert!(matches!(
        &left.kind,
        ExprKind::UnaryOperation { operator: UnaryOperator::Minus, .. }
    ));
}

#[test]
fn parses_logical_or_of_comparisons() {
    let orchestra = parse("if 1 == 1 || 2 == 2 then\nendif\n");
    let StmtKind::If { condition, .. } = &orchestra.statements[0].kind else {
        panic!("expected an if statement");
    };
    let ExprKind::BinaryOperation { operator, left, right } = &condition.kind else {
        panic!("expected a binary operation");
    };
    assert_eq!(*operator, BinaryOperator::Or);
    assert!(matches!(
        &left.kind,
        ExprKind::BinaryOperation { operator: BinaryOperator::Equal, .. }
    ));
    assert!(matches!(
        &right.kind,
        ExprKind::BinaryOperation { operator: BinaryOperator::Equal, .. }
    ));
}

#[test]
fn parses_void_opcode_statements() {
    let orchestra = parse("scoreline_i \"e\"\nprintf_i(\"\\n==> %d\\n\\n\", 1, 42)\n");
    assert_eq!(orchestra.statements.len(), 2);
    let StmtKind::VoidOpcodeStatement { call } = &orchestra.statements[0].kind else {
        panic!("expected a void opcode statement");
    };
    assert_eq!(&*call.name, "scoreline_i");
    assert_eq!(call.args.len(), 1);
    let StmtKind::VoidOpcodeStatement { call } = &orchestra.statements[1].kind else {
        panic!("expected a void opcode statement");
    };
    assert_eq!(&*call.name, "printf_i");
    assert_eq!(call.args.len(), 3);
}

#[test]
fn parses_opcode_statement_with_outputs() {
    let orchestra = parse("giFunctionTableID ftgen 0, 0, 16384, 10, 1\n");
    let StmtKind::OpcodeStatement { outputs, call } = &orchestra.statements[0].kind else {
        panic!("expected an opcode statement");
    };
    assert_eq!(outputs.len(), 1);
    assert_eq!(&*call.name, "ftgen");
    assert_eq!(call.args.len(), 5);
    assert_eq!(call.name_range, range(0, 18, 0, 23));
}

#[test]
fn parses_instrument_ids() {
    let orchestra = parse("instr 1, N_a_M_e_1, +N_a_M_e_2\nendin\n");
    let StmtKind::Instrument { ids, body } = &orchestra.statements[0].kind else {
        panic!("expected an instrument");
    };
    assert!(body.is_empty());
    assert_eq!(ids.len(), 3);
    assert!(matches!(&ids[0], InstrumentId::Number { text, .. } if &**text == "1"));
    assert!(
        matches!(&ids[1], InstrumentId::Name { name, merge: false, .. } if &**name == "N_a_M_e_1")
    );
    assert!(
        matches!(&ids[2], InstrumentId::Name { name, merge: true, .. } if &**name == "N_a_M_e_2")
    );
}

#[test]
fn parses_opcode_definition() {
    let orchestra = parse("opcode anOpcode, a, k\nendop\n");
    let StmtKind::OpcodeDefinition {
        name,
        output_types,
        input_types,
        body,
        ..
    } = &orchestra.statements[0].kind
    else {
        panic!("expected an opcode definition");
    };
    assert_eq!(&**name, "anOpcode");
    assert_eq!(&**output_types, "a");
    assert_eq!(&**input_types, "k");
    assert!(body.is_empty());
}

#[test]
fn parses_if_goto() {
    let orchestra = parse("if 1 == 1 goto label\nlabel:\n");
    assert_eq!(orchestra.statements.len(), 2);
    let StmtKind::IfGoto { label, .. } = &orchestra.statements[0].kind else {
        panic!("expected if-goto");
    };
    assert_eq!(&**label, "label");
    let StmtKind::LabeledStatement { name, statement } = &orchestra.statements[1].kind else {
        panic!("expected a labeled statement");
    };
    assert_eq!(&**name, "label");
    assert!(statement.is_none());
}

#[test]
fn desugars_elseif_to_nested_if() {
    let orchestra = parse("if 1 == 1 then\nelseif 2 == 2 then\nelse\nendif\n");
    let StmtKind::If { else_branch, .. } = &orchestra.statements[0].kind else {
        panic!("expected an if statement");
    };
    let nested = else_branch.as_ref().expect("elseif should become an else");
    assert_eq!(nested.len(), 1);
    let StmtKind::If { else_branch, .. } = &nested[0].kind else {
        panic!("elseif should desugar to a nested if");
    };
    assert!(else_branch.is_some());
}

#[test]
fn parses_while_and_until() {
    let orchestra = parse("while 0 == 1 do\nod\nuntil 1 == 1 do\nod\n");
    assert!(matches!(
        &orchestra.statements[0].kind,
        StmtKind::While { body, .. } if body.is_empty()
    ));
    assert!(matches!(
        &orchestra.statements[1].kind,
        StmtKind::Until { body, .. } if body.is_empty()
    ));
}

#[test]
fn resolves_identifier_types() {
    let orchestra = parse("0dbfs = 1\ninstr 1\n  aSignal oscili 0.5 * 0dbfs, 440\nendin\n");
    let StmtKind::Instrument { body, .. } = &orchestra.statements[1].kind else {
        panic!("expected an instrument");
    };
    let StmtKind::OpcodeStatement { call, .. } = &body[0].kind else {
        panic!("expected an opcode statement");
    };
    // 0.5 * 0dbfs is i-rate arithmetic.
    assert_eq!(call.args[0].resolved_type, "i");
}

#[test]
fn nested_opcode_expression() {
    let orchestra = parse("instr 1\n  outc oscili(0.5, 440)\nendin\n");
    let StmtKind::Instrument { body, .. } = &orchestra.statements[0].kind else {
        panic!("expected an instrument");
    };
    let StmtKind::VoidOpcodeStatement { call } = &body[0].kind else {
        panic!("expected a void opcode statement");
    };
    let ExprKind::OpcodeExpression(inner) = &call.args[0].kind else {
        panic!("expected a nested opcode expression");
    };
    assert_eq!(&*inner.name, "oscili");
    assert_eq!(call.args[0].resolved_type, "a");
}
