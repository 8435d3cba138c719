//! Statement and block parsers.
//!
//! Statements are keyword-dispatched. A statement that cannot be
//! completed records "Invalid statement" (or "Invalid if-statement")
//! and resynchronizes at the next statement boundary.

use super::expr::parse_expr;
use super::Parser;
use crate::ast::{
    AssignOperator, Expr, ExprKind, InstrumentId, OpcodeCall, Orchestra, Stmt, StmtKind,
};
use crate::lexer::Token;
use cslint_foundation::{Position, Range};
use std::rc::Rc;

pub(crate) fn parse_orchestra(p: &mut Parser) -> Orchestra {
    let mut statements = Vec::new();
    while !p.stream.at_end() {
        match p.stream.peek() {
            Some(Token::Newline) => {
                p.stream.advance();
            }
            Some(Token::Instr) => {
                if let Some(statement) = parse_instrument(p) {
                    statements.push(statement);
                }
            }
            Some(Token::OpcodeKeyword) => {
                if let Some(statement) = parse_opcode_definition(p) {
                    statements.push(statement);
                }
            }
            _ => {
                if let Some(statement) = parse_statement(p) {
                    statements.push(statement);
                }
            }
        }
    }
    let end = p.stream.current_range().end;
    Orchestra {
        statements,
        range: Range::new(Position::default(), end),
    }
}

/// Parse one statement inside any block. Returns `None` after error
/// recovery or for blank lines.
fn parse_statement(p: &mut Parser) -> Option<Stmt> {
    match p.stream.peek() {
        Some(Token::Newline) => {
            p.stream.advance();
            None
        }
        Some(Token::Label(_)) => parse_labeled(p),
        Some(Token::If) => parse_if(p),
        Some(Token::While) => parse_loop(p, false),
        Some(Token::Until) => parse_loop(p, true),
        Some(Token::Goto) => parse_goto(p),
        Some(Token::VoidOpcode(_)) | Some(Token::Opcode(_)) => {
            parse_opcode_statement(p, Vec::new())
        }
        Some(Token::Identifier(_)) | Some(Token::GlobalValue(_)) => parse_assignment_or_opcode(p),
        _ => invalid_statement(p),
    }
}

/// Record "Invalid statement" at the offending token and skip to the
/// next line.
fn invalid_statement(p: &mut Parser) -> Option<Stmt> {
    let range = p.stream.current_range();
    p.error(Range::at(range.start), "Invalid statement");
    p.stream.skip_past_newline();
    None
}

fn parse_labeled(p: &mut Parser) -> Option<Stmt> {
    let start = p.stream.current_range();
    let Some((Token::Label(name), _)) = p.stream.advance() else {
        return None;
    };
    let name = name.clone();
    let statement = match p.stream.peek() {
        Some(Token::Newline) | None => {
            p.stream.advance();
            None
        }
        _ => parse_statement(p).map(Box::new),
    };
    let end = statement
        .as_ref()
        .map(|stmt| stmt.range)
        .unwrap_or(start)
        .end;
    Some(Stmt::new(
        StmtKind::LabeledStatement { name, statement },
        Range::new(start.start, end),
    ))
}

fn parse_goto(p: &mut Parser) -> Option<Stmt> {
    let start = p.stream.current_range();
    p.stream.advance();
    let label_range = p.stream.current_range();
    let label = match p.stream.peek() {
        Some(Token::Identifier(name)) => {
            let name = name.clone();
            p.stream.advance();
            name
        }
        _ => {
            return invalid_statement(p);
        }
    };
    p.expect_newline();
    Some(Stmt::new(
        StmtKind::Goto {
            label,
            label_range,
        },
        Range::new(start.start, label_range.end),
    ))
}

// ----------------------------------------------------------------------
// Assignments and opcode statements
// ----------------------------------------------------------------------

/// Parse `name`, `name[]`, `name[expr]` in an output position.
fn parse_lvalue(p: &mut Parser) -> Option<Expr> {
    let range = p.stream.current_range();
    let name = match p.stream.peek() {
        Some(Token::Identifier(name)) | Some(Token::GlobalValue(name)) => name.clone(),
        _ => return None,
    };
    p.stream.advance();
    let mut expr = Expr::new(ExprKind::Identifier { name }, range, "");
    while p.stream.check(&Token::LBracket) {
        p.stream.advance();
        if p.stream.check(&Token::RBracket) {
            let close = p.stream.current_range();
            p.stream.advance();
            let range = expr.range.merge(&close);
            expr = Expr::new(
                ExprKind::ArrayDeclarator {
                    base: Box::new(expr),
                },
                range,
                "",
            );
        } else {
            let index = parse_expr(p);
            let close = p.stream.current_range();
            if !p.stream.eat(&Token::RBracket) {
                p.error(Range::at(close.start), "Expected ‘]’");
                break;
            }
            let range = expr.range.merge(&close);
            expr = Expr::new(
                ExprKind::ArrayMember {
                    base: Box::new(expr),
                    index: Box::new(index),
                },
                range,
                "",
            );
        }
    }
    Some(expr)
}

fn assign_operator(token: &Token) -> Option<AssignOperator> {
    Some(match token {
        Token::Assign => AssignOperator::Assign,
        Token::PlusAssign => AssignOperator::AddAssign,
        Token::MinusAssign => AssignOperator::SubtractAssign,
        Token::StarAssign => AssignOperator::MultiplyAssign,
        Token::SlashAssign => AssignOperator::DivideAssign,
        _ => return None,
    })
}

fn parse_assignment_or_opcode(p: &mut Parser) -> Option<Stmt> {
    let target = parse_lvalue(p)?;
    if let Some(operator) = p.stream.peek().and_then(assign_operator) {
        p.stream.advance();
        return parse_assignment(p, target, operator);
    }
    let mut outputs = vec![target];
    while p.stream.eat(&Token::Comma) {
        match parse_lvalue(p) {
            Some(output) => outputs.push(output),
            None => return invalid_statement(p),
        }
    }
    match p.stream.peek() {
        Some(Token::Opcode(_)) | Some(Token::VoidOpcode(_)) => parse_opcode_statement(p, outputs),
        _ => invalid_statement(p),
    }
}

fn parse_assignment(p: &mut Parser, target: Expr, operator: AssignOperator) -> Option<Stmt> {
    let value = parse_expr(p);
    if !p.expect_newline() {
        p.stream.skip_past_newline();
    }
    // Compound assignments read the target before writing it.
    if operator != AssignOperator::Assign {
        if let ExprKind::Identifier { name } = &target.kind {
            let name = name.clone();
            p.resolve_use(&name, target.range);
        }
    }
    p.declare_target(&target);
    let range = target.range.merge(&value.range);
    Some(Stmt::new(
        StmtKind::Assignment {
            target,
            operator,
            value,
        },
        range,
    ))
}

/// Parse `opcode args...` after any outputs, covering both the plain
/// comma-separated form and the adjacent-parenthesis wrapper form
/// (`printf_i("...", 1, 42)`).
fn parse_opcode_statement(p: &mut Parser, outputs: Vec<Expr>) -> Option<Stmt> {
    let name_range = p.stream.current_range();
    let name: Rc<str> = match p.stream.peek() {
        Some(Token::Opcode(name)) | Some(Token::VoidOpcode(name)) => name.clone(),
        _ => return invalid_statement(p),
    };
    p.stream.advance();
    let mut args = Vec::new();
    match p.stream.peek() {
        Some(Token::Newline) | None => {}
        Some(Token::LParen) if p.stream.current_range().start == name_range.end => {
            // No whitespace before `(`: the parentheses wrap the whole
            // argument list.
            p.stream.advance();
            if !p.stream.check(&Token::RParen) {
                loop {
                    args.push(parse_expr(p));
                    if !p.stream.eat(&Token::Comma) {
                        break;
                    }
                }
            }
            let close = p.stream.current_range();
            if !p.stream.eat(&Token::RParen) {
                p.error(Range::at(close.start), "Expected ‘)’");
            }
        }
        _ => loop {
            args.push(parse_expr(p));
            if !p.stream.eat(&Token::Comma) {
                break;
            }
        },
    }
    if !p.expect_newline() {
        p.stream.skip_past_newline();
    }
    let call = OpcodeCall {
        name,
        name_range,
        args,
    };
    p.check_opcode_call(&call);
    for output in &outputs {
        p.declare_target(output);
    }
    let end = call
        .args
        .last()
        .map(|arg| arg.range.end)
        .unwrap_or(name_range.end);
    let start = outputs
        .first()
        .map(|output| output.range.start)
        .unwrap_or(name_range.start);
    let range = Range::new(start, end);
    let kind = if outputs.is_empty() {
        StmtKind::VoidOpcodeStatement { call }
    } else {
        StmtKind::OpcodeStatement { outputs, call }
    };
    Some(Stmt::new(kind, range))
}

// ----------------------------------------------------------------------
// Instruments and opcode definitions
// ----------------------------------------------------------------------

fn parse_instrument(p: &mut Parser) -> Option<Stmt> {
    let start = p.stream.current_range();
    p.stream.advance();
    let mut ids = Vec::new();
    loop {
        let range = p.stream.current_range();
        match p.stream.peek() {
            Some(Token::DecimalInteger(text)) => {
                let text = text.clone();
                p.stream.advance();
                if text.parse::<i64>().map(|n| n <= 0).unwrap_or(true) {
                    p.error(range, "Instrument number must be greater than 0");
                } else {
                    p.register_instrument(&text, range);
                }
                ids.push(InstrumentId::Number { text, range });
            }
            Some(Token::Identifier(name)) => {
                let name = name.clone();
                p.stream.advance();
                p.register_instrument(&name, range);
                ids.push(InstrumentId::Name {
                    name,
                    range,
                    merge: false,
                });
            }
            Some(Token::Plus) => {
                p.stream.advance();
                let name_range = p.stream.current_range();
                match p.stream.peek() {
                    Some(Token::Identifier(name)) => {
                        let name = name.clone();
                        p.stream.advance();
                        // `+name` merges into an existing instrument and
                        // is not a redefinition.
                        ids.push(InstrumentId::Name {
                            name,
                            range: Range::new(range.start, name_range.end),
                            merge: true,
                        });
                    }
                    _ => {
                        p.error(
                            Range::at(name_range.start),
                            "Expected instrument number or identifier",
                        );
                        break;
                    }
                }
            }
            _ => {
                p.error(
                    Range::at(range.start),
                    "Expected instrument number or identifier",
                );
                break;
            }
        }
        if !p.stream.eat(&Token::Comma) {
            break;
        }
    }
    if !p.expect_newline() {
        p.stream.skip_past_newline();
    }
    p.symbols.enter_scope();
    let mut body = Vec::new();
    let mut end = p.stream.current_range().end;
    loop {
        match p.stream.peek() {
            None => {
                let at = p.stream.current_range();
                p.error(Range::at(at.start), "Expected ‘endin’");
                break;
            }
            Some(Token::Endin) => {
                end = p.stream.current_range().end;
                p.stream.advance();
                p.stream.eat(&Token::Newline);
                break;
            }
            _ => {
                if let Some(statement) = parse_statement(p) {
                    end = statement.range.end;
                    body.push(statement);
                }
            }
        }
    }
    p.symbols.exit_scope();
    Some(Stmt::new(
        StmtKind::Instrument { ids, body },
        Range::new(start.start, end),
    ))
}

fn parse_opcode_definition(p: &mut Parser) -> Option<Stmt> {
    let start = p.stream.current_range();
    p.stream.advance();
    let name_range = p.stream.current_range();
    let name = match p.stream.peek() {
        Some(Token::Identifier(name)) => name.clone(),
        _ => return invalid_statement(p),
    };
    p.stream.advance();
    if !p.stream.eat(&Token::Comma) {
        return invalid_statement(p);
    }
    let output_types = match p.stream.peek() {
        Some(Token::OutputTypeSignature(signature)) => {
            let signature = signature.clone();
            p.stream.advance();
            signature
        }
        _ => return invalid_statement(p),
    };
    if !p.stream.eat(&Token::Comma) {
        return invalid_statement(p);
    }
    let input_types = match p.stream.peek() {
        Some(Token::InputTypeSignature(signature)) => {
            let signature = signature.clone();
            p.stream.advance();
            signature
        }
        _ => return invalid_statement(p),
    };
    if !p.expect_newline() {
        p.stream.skip_past_newline();
    }
    p.symbols.enter_scope();
    let mut body = Vec::new();
    let mut end = name_range.end;
    loop {
        match p.stream.peek() {
            None => {
                let at = p.stream.current_range();
                p.error(Range::at(at.start), "Expected ‘endop’");
                break;
            }
            Some(Token::Endop) => {
                end = p.stream.current_range().end;
                p.stream.advance();
                p.stream.eat(&Token::Newline);
                break;
            }
            _ => {
                if let Some(statement) = parse_statement(p) {
                    end = statement.range.end;
                    body.push(statement);
                }
            }
        }
    }
    p.symbols.exit_scope();
    Some(Stmt::new(
        StmtKind::OpcodeDefinition {
            name,
            name_range,
            output_types,
            input_types,
            body,
        },
        Range::new(start.start, end),
    ))
}

// ----------------------------------------------------------------------
// Control constructs
// ----------------------------------------------------------------------

fn parse_if(p: &mut Parser) -> Option<Stmt> {
    let start = p.stream.current_range();
    parse_if_from(p, start, true)
}

/// Parse an if-statement (or the continuation of an `elseif` chain,
/// which desugars to a nested if). On structural failure the whole
/// construct is skipped through its `endif` and "Invalid if-statement"
/// anchors at `start`.
fn parse_if_from(p: &mut Parser, start: Range, consume_keyword: bool) -> Option<Stmt> {
    if consume_keyword {
        p.stream.advance();
    }
    let condition = parse_expr(p);
    p.check_condition(&condition, "if-statement");
    match p.stream.peek() {
        Some(Token::Goto) => {
            p.stream.advance();
            let label_range = p.stream.current_range();
            let label = match p.stream.peek() {
                Some(Token::Identifier(name)) => {
                    let name = name.clone();
                    p.stream.advance();
                    name
                }
                _ => return recover_if(p, start),
            };
            if !p.expect_newline() {
                return recover_if(p, start);
            }
            Some(Stmt::new(
                StmtKind::IfGoto {
                    condition,
                    label,
                    label_range,
                },
                Range::new(start.start, label_range.end),
            ))
        }
        Some(Token::Then) => {
            p.stream.advance();
            if !p.expect_newline() {
                return recover_if(p, start);
            }
            let mut then_branch = Vec::new();
            loop {
                match p.stream.peek() {
                    None => {
                        let at = p.stream.current_range();
                        p.error(Range::at(at.start), "Expected ‘endif’");
                        break;
                    }
                    Some(Token::Endif) => {
                        p.stream.advance();
                        p.stream.eat(&Token::Newline);
                        break;
                    }
                    Some(Token::ElseIf) => {
                        let elseif_range = p.stream.current_range();
                        p.stream.advance();
                        let nested = parse_if_from(p, elseif_range, false)?;
                        let end = nested.range.end;
                        return Some(Stmt::new(
                            StmtKind::If {
                                condition,
                                then_branch,
                                else_branch: Some(vec![nested]),
                            },
                            Range::new(start.start, end),
                        ));
                    }
                    Some(Token::Else) => {
                        p.stream.advance();
                        if !p.expect_newline() {
                            return recover_if(p, start);
                        }
                        let mut else_branch = Vec::new();
                        loop {
                            match p.stream.peek() {
                                None => {
                                    let at = p.stream.current_range();
                                    p.error(Range::at(at.start), "Expected ‘endif’");
                                    break;
                                }
                                Some(Token::Endif) => {
                                    p.stream.advance();
                                    p.stream.eat(&Token::Newline);
                                    break;
                                }
                                _ => {
                                    if let Some(statement) = parse_statement(p) {
                                        else_branch.push(statement);
                                    }
                                }
                            }
                        }
                        let end = p.stream.previous_end().end;
                        return Some(Stmt::new(
                            StmtKind::If {
                                condition,
                                then_branch,
                                else_branch: Some(else_branch),
                            },
                            Range::new(start.start, end),
                        ));
                    }
                    _ => {
                        if let Some(statement) = parse_statement(p) {
                            then_branch.push(statement);
                        }
                    }
                }
            }
            let end = p.stream.previous_end().end;
            Some(Stmt::new(
                StmtKind::If {
                    condition,
                    then_branch,
                    else_branch: None,
                },
                Range::new(start.start, end),
            ))
        }
        _ => recover_if(p, start),
    }
}

/// Skip through the matching `endif` and report the whole statement.
fn recover_if(p: &mut Parser, start: Range) -> Option<Stmt> {
    p.stream.skip_past_endif();
    p.error(Range::at(start.start), "Invalid if-statement");
    None
}

fn parse_loop(p: &mut Parser, until: bool) -> Option<Stmt> {
    let start = p.stream.current_range();
    p.stream.advance();
    let condition = parse_expr(p);
    p.check_condition(
        &condition,
        if until { "until-loop" } else { "while-loop" },
    );
    if !p.stream.eat(&Token::Do) {
        return invalid_statement(p);
    }
    if !p.expect_newline() {
        p.stream.skip_past_newline();
    }
    let mut body = Vec::new();
    let end;
    loop {
        match p.stream.peek() {
            None => {
                let at = p.stream.current_range();
                p.error(Range::at(at.start), "Expected ‘od’");
                end = at.end;
                break;
            }
            Some(Token::Od) => {
                end = p.stream.current_range().end;
                p.stream.advance();
                p.stream.eat(&Token::Newline);
                break;
            }
            _ => {
                if let Some(statement) = parse_statement(p) {
                    body.push(statement);
                }
            }
        }
    }
    let kind = if until {
        StmtKind::Until { condition, body }
    } else {
        StmtKind::While { condition, body }
    };
    Some(Stmt::new(kind, Range::new(start.start, end)))
}
