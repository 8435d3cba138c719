//! Expression parsing: precedence climbing with types computed as
//! nodes are built.
//!
//! Precedence follows the historical orchestra grammar (lowest to
//! highest): conditional `?:`, `&&`/`||`, comparisons, `|`, `&`, `#`,
//! shifts, additive, multiplicative, `^`, unary. Errors produce an
//! `Empty` node and leave the offending token for the caller, so
//! statements can resynchronize.

use super::Parser;
use crate::ast::{BinaryOperator, Expr, ExprKind, OpcodeCall, UnaryOperator};
use crate::lexer::Token;
use cslint_foundation::Range;

fn binary_op_info(token: &Token) -> Option<(u8, BinaryOperator)> {
    Some(match token {
        Token::OrOr => (10, BinaryOperator::Or),
        Token::AndAnd => (10, BinaryOperator::And),
        Token::Equal => (20, BinaryOperator::Equal),
        Token::NotEqual => (20, BinaryOperator::NotEqual),
        Token::Less => (20, BinaryOperator::LessThan),
        Token::Greater => (20, BinaryOperator::GreaterThan),
        Token::LessEqual => (20, BinaryOperator::LessThanOrEqual),
        Token::GreaterEqual => (20, BinaryOperator::GreaterThanOrEqual),
        Token::Pipe => (30, BinaryOperator::BitwiseOr),
        Token::Ampersand => (40, BinaryOperator::BitwiseAnd),
        Token::Hash => (50, BinaryOperator::BitwiseXor),
        Token::ShiftLeft => (60, BinaryOperator::ShiftLeft),
        Token::ShiftRight => (60, BinaryOperator::ShiftRight),
        Token::Plus => (70, BinaryOperator::Plus),
        Token::Minus => (70, BinaryOperator::Minus),
        Token::Star => (80, BinaryOperator::Times),
        Token::Slash => (80, BinaryOperator::Divide),
        Token::Percent => (80, BinaryOperator::Modulus),
        Token::Caret => (90, BinaryOperator::Power),
        _ => return None,
    })
}

/// Parse a full expression, including the conditional operator.
pub(crate) fn parse_expr(p: &mut Parser) -> Expr {
    let condition = parse_binary(p, 0);
    if !p.stream.eat(&Token::Question) {
        return condition;
    }
    let then_value = parse_expr(p);
    if !p.stream.eat(&Token::Colon) {
        let range = p.stream.current_range();
        p.error(Range::at(range.start), "Expected ‘:’");
    }
    let else_value = parse_expr(p);
    let range = condition.range.merge(&else_value.range);
    let resolved_type = then_value.resolved_type.clone();
    Expr::new(
        ExprKind::ConditionalExpression {
            condition: Box::new(condition),
            then_value: Box::new(then_value),
            else_value: Box::new(else_value),
        },
        range,
        resolved_type,
    )
}

fn parse_binary(p: &mut Parser, min_prec: u8) -> Expr {
    let mut left = parse_prefix(p);
    while let Some((prec, operator)) = p.stream.peek().and_then(binary_op_info) {
        if prec < min_prec {
            break;
        }
        p.stream.advance();
        let right = parse_binary(p, prec + 1);
        let range = left.range.merge(&right.range);
        let resolved_type = p.check_binary(operator, &left, &right, range);
        left = Expr::new(
            ExprKind::BinaryOperation {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            },
            range,
            resolved_type,
        );
    }
    left
}

fn parse_prefix(p: &mut Parser) -> Expr {
    let operator = match p.stream.peek() {
        Some(Token::Plus) => Some(UnaryOperator::Plus),
        Some(Token::Minus) => Some(UnaryOperator::Minus),
        Some(Token::Bang) => Some(UnaryOperator::Not),
        Some(Token::Tilde) => Some(UnaryOperator::BitwiseComplement),
        _ => None,
    };
    let Some(operator) = operator else {
        return parse_atom(p);
    };
    let op_range = p.stream.current_range();
    p.stream.advance();
    let operand = parse_prefix(p);
    let range = op_range.merge(&operand.range);
    let resolved_type = p.check_unary(operator, &operand, range);
    Expr::new(
        ExprKind::UnaryOperation {
            operator,
            operand: Box::new(operand),
        },
        range,
        resolved_type,
    )
}

fn parse_atom(p: &mut Parser) -> Expr {
    let range = p.stream.current_range();
    match p.stream.peek() {
        Some(Token::DecimalInteger(text)) | Some(Token::Number(text)) => {
            let text = text.clone();
            p.stream.advance();
            Expr::new(ExprKind::NumberLiteral { text }, range, "i")
        }
        Some(Token::String(text)) | Some(Token::BracedString(text)) => {
            let text = text.clone();
            p.stream.advance();
            Expr::new(ExprKind::StringLiteral { text }, range, "S")
        }
        Some(Token::GlobalValue(name)) => {
            let name = name.clone();
            p.stream.advance();
            let resolved_type = p.resolve_use(&name, range);
            Expr::new(ExprKind::Identifier { name }, range, resolved_type)
        }
        Some(Token::Identifier(name)) => {
            let name = name.clone();
            p.stream.advance();
            let resolved_type = p.resolve_use(&name, range);
            let expr = Expr::new(ExprKind::Identifier { name }, range, resolved_type);
            parse_array_members(p, expr)
        }
        Some(Token::Opcode(name)) | Some(Token::VoidOpcode(name)) => {
            let name = name.clone();
            p.stream.advance();
            if !p.stream.check(&Token::LParen) {
                let at = p.stream.current_range();
                p.error(Range::at(at.start), "Expected expression");
                return Expr::empty(Range::at(at.start));
            }
            p.stream.advance();
            let mut args = Vec::new();
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
            let call = OpcodeCall {
                name,
                name_range: range,
                args,
            };
            let resolved_type = p.check_opcode_call(&call);
            let full = range.merge(&close);
            Expr::new(ExprKind::OpcodeExpression(call), full, resolved_type)
        }
        Some(Token::LParen) => {
            p.stream.advance();
            let inner = parse_expr(p);
            let close = p.stream.current_range();
            if !p.stream.eat(&Token::RParen) {
                p.error(Range::at(close.start), "Expected ‘)’");
            }
            inner
        }
        _ => {
            p.error(Range::at(range.start), "Expected expression");
            Expr::empty(Range::at(range.start))
        }
    }
}

/// Postfix `[index]` accesses on an identifier use.
fn parse_array_members(p: &mut Parser, mut expr: Expr) -> Expr {
    while p.stream.check(&Token::LBracket) {
        p.stream.advance();
        let index = parse_expr(p);
        let close = p.stream.current_range();
        if !p.stream.eat(&Token::RBracket) {
            p.error(Range::at(close.start), "Expected ‘]’");
            break;
        }
        let range = expr.range.merge(&close);
        let element_type = expr
            .resolved_type
            .strip_suffix("[]")
            .map(str::to_string)
            .unwrap_or_default();
        expr = Expr::new(
            ExprKind::ArrayMember {
                base: Box::new(expr),
                index: Box::new(index),
            },
            range,
            element_type,
        );
    }
    expr
}
