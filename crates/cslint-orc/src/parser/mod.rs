//! Grammar-driven parser with embedded semantic analysis.
//!
//! A single pass builds the AST and runs the semantic checks as each
//! construct completes, so diagnostics come out in roughly textual
//! order. Recoverable problems are recorded and parsing resynchronizes
//! at statement boundaries; nothing here aborts the parse.
//!
//! ## Architecture
//!
//! - `stream`: token stream with lookahead and recovery skips
//! - `expr`: precedence-climbing expression parser; operand types are
//!   computed bottom-up as nodes are built
//! - `stmt`: keyword-dispatched statement and block parsers
//! - this module: the `Parser` state and the semantic checks themselves

mod expr;
mod stmt;
mod stream;

use crate::ast::{BinaryOperator, Expr, ExprKind, OpcodeCall, Orchestra, UnaryOperator};
use crate::lexer::Token;
use crate::opcodes;
use crate::symbols::{Declared, SymbolTable};
use cslint_foundation::{Diagnostic, Range};
use indexmap::IndexMap;
use stream::TokenStream;

/// Parse a lexed orchestra, returning the tree and every recorded
/// diagnostic.
pub fn parse(tokens: &[(Token, Range)], symbols: &mut SymbolTable) -> (Orchestra, Vec<Diagnostic>) {
    tracing::debug!(tokens = tokens.len(), "parsing orchestra");
    let mut parser = Parser {
        stream: TokenStream::new(tokens),
        symbols,
        messages: Vec::new(),
        instruments: IndexMap::new(),
    };
    let orchestra = stmt::parse_orchestra(&mut parser);
    tracing::debug!(
        statements = orchestra.statements.len(),
        messages = parser.messages.len(),
        "parsed orchestra"
    );
    (orchestra, parser.messages)
}

/// Parser state: the token stream, the live symbol table, and the
/// accumulated diagnostics.
pub struct Parser<'a> {
    pub(crate) stream: TokenStream<'a>,
    pub(crate) symbols: &'a mut SymbolTable,
    pub(crate) messages: Vec<Diagnostic>,
    /// Instrument number/name → range of the first definition.
    pub(crate) instruments: IndexMap<String, Range>,
}

/// Names that always resolve at i-rate without declaration.
fn is_global_value_name(name: &str) -> bool {
    matches!(
        name,
        "sr" | "kr" | "ksmps" | "nchnls" | "nchnls_i" | "0dbfs" | "A4"
    ) || is_p_field(name)
}

fn is_p_field(name: &str) -> bool {
    name.len() > 1
        && name.starts_with('p')
        && name[1..].bytes().all(|b| b.is_ascii_digit())
}

/// Infer a variable's type from its leading characters: an optional
/// `g`, then one of `i k a S f w`. `p`-fields are i-rate.
fn type_from_name(name: &str) -> Option<String> {
    if is_p_field(name) {
        return Some("i".to_string());
    }
    let rest = match name.strip_prefix('g') {
        Some(rest) if !rest.is_empty() => rest,
        _ => name,
    };
    match rest.chars().next() {
        Some(c @ ('i' | 'k' | 'a' | 'S' | 'f' | 'w')) => Some(c.to_string()),
        _ => None,
    }
}

/// Can an operand of type `arg` feed an operator input of type `code`?
/// k-rate operator inputs accept i-rate operands.
fn operand_compatible(code: &str, arg: &str) -> bool {
    match code {
        "i" => arg == "i",
        "k" => matches!(arg, "i" | "k"),
        "a" => arg == "a",
        "b" => arg == "b",
        _ => false,
    }
}

/// Evaluate a constant expression (number literals and sign-prefixed
/// number literals) for default-value comparison.
fn constant_value(expr: &Expr) -> Option<f64> {
    match &expr.kind {
        ExprKind::NumberLiteral { text } => {
            if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                i64::from_str_radix(hex, 16).ok().map(|value| value as f64)
            } else {
                text.parse().ok()
            }
        }
        ExprKind::UnaryOperation { operator, operand } => {
            let value = constant_value(operand)?;
            match operator {
                UnaryOperator::Minus => Some(-value),
                UnaryOperator::Plus => Some(value),
                _ => None,
            }
        }
        _ => None,
    }
}

/// First output of an output type signature, with array suffixes.
fn first_output_type(signature: &str) -> String {
    let mut chars = signature.chars().peekable();
    let Some(base) = chars.next() else {
        return String::new();
    };
    let mut result = base.to_string();
    while chars.peek() == Some(&'[') {
        chars.next();
        if chars.next() == Some(']') {
            result.push_str("[]");
        }
    }
    result
}

impl Parser<'_> {
    pub(crate) fn error(&mut self, range: Range, excerpt: impl Into<String>) {
        self.messages.push(Diagnostic::error(range, excerpt));
    }

    pub(crate) fn warning(&mut self, range: Range, excerpt: impl Into<String>) {
        self.messages.push(Diagnostic::warning(range, excerpt));
    }

    pub(crate) fn record(&mut self, diagnostic: Diagnostic) {
        self.messages.push(diagnostic);
    }

    /// Expect a statement-terminating newline. Records "Expected
    /// newline" anchored at the end of the previous token and returns
    /// false when something else is there.
    pub(crate) fn expect_newline(&mut self) -> bool {
        match self.stream.peek() {
            Some(Token::Newline) => {
                self.stream.advance();
                true
            }
            None => true,
            Some(_) => {
                let range = self.stream.previous_end();
                self.error(range, "Expected newline");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Semantic checks
    // ------------------------------------------------------------------

    /// Type a binary operation as it is reduced, reporting an operand
    /// mismatch against the operator's signature table.
    pub(crate) fn check_binary(
        &mut self,
        operator: BinaryOperator,
        left: &Expr,
        right: &Expr,
        range: Range,
    ) -> String {
        for (lhs, rhs, out) in operator.overloads() {
            if operand_compatible(lhs, &left.resolved_type)
                && operand_compatible(rhs, &right.resolved_type)
            {
                return out.to_string();
            }
        }
        self.error(
            range,
            format!(
                "Types of operands do not match type signatures of operator {}",
                operator.symbol()
            ),
        );
        String::new()
    }

    /// Type a unary operation as it is reduced.
    pub(crate) fn check_unary(
        &mut self,
        operator: UnaryOperator,
        operand: &Expr,
        range: Range,
    ) -> String {
        for (input, out) in operator.overloads() {
            if operand_compatible(input, &operand.resolved_type) {
                return out.to_string();
            }
        }
        self.error(
            range,
            format!(
                "Types of operands do not match type signatures of operator {}",
                operator.symbol()
            ),
        );
        String::new()
    }

    /// Resolve an identifier use, reporting undefined variables. The
    /// name's own type characters still type the expression so one
    /// undefined variable does not cascade into operand errors.
    pub(crate) fn resolve_use(&mut self, name: &str, range: Range) -> String {
        if is_global_value_name(name) {
            // p0 is always 0, and every p-field evaluates to 0 outside
            // an instrument.
            if is_p_field(name) && (name == "p0" || !self.symbols.in_local_scope()) {
                self.warning(range, "Value of p-field is always 0");
            }
            return "i".to_string();
        }
        if let Some(variable) = self.symbols.variable(name) {
            return variable.var_type.clone();
        }
        self.error(range, format!("Use of undefined variable ‘{name}’"));
        type_from_name(name).unwrap_or_default()
    }

    /// Match an opcode use against its overloads: no match is an error,
    /// more than one a warning, and a unique match reports arguments
    /// that just restate an optional input's default. Returns the type
    /// of the first output.
    pub(crate) fn check_opcode_call(&mut self, call: &OpcodeCall) -> String {
        let Some(entry) = self.symbols.opcode(&call.name) else {
            return String::new();
        };
        let entry = entry.clone();
        let arg_types: Vec<String> = call
            .args
            .iter()
            .map(|arg| arg.resolved_type.clone())
            .collect();
        let matches = opcodes::match_overloads(&entry, &arg_types);
        if matches.is_empty() {
            // A bare statement with no arguments is not matched; the
            // engine fills every default.
            if !call.args.is_empty() {
                self.error(
                    call.name_range,
                    format!(
                        "Types of input arguments do not match type signatures of opcode ‘{}’",
                        call.name
                    ),
                );
            }
            return String::new();
        }
        if matches.len() > 1 {
            self.warning(
                call.name_range,
                format!(
                    "Types of input arguments match multiple type signatures of opcode ‘{}’",
                    call.name
                ),
            );
        } else {
            let matched = &matches[0];
            for (index, code) in matched.optional_uses.iter().rev() {
                let Some(arg) = call.args.get(*index) else {
                    continue;
                };
                let Some(default) = opcodes::optional_default(*code) else {
                    continue;
                };
                let default_value: f64 = default.parse().unwrap_or_default();
                if constant_value(arg) == Some(default_value) {
                    self.warning(
                        arg.range,
                        format!("Passing default value of {default} is unnecessary"),
                    );
                }
            }
        }
        matches[0]
            .outputs
            .first()
            .map(|signature| first_output_type(signature))
            .unwrap_or_default()
    }

    /// Declare an assignment target or opcode output argument.
    pub(crate) fn declare_target(&mut self, target: &Expr) {
        let (name, name_range, dims) = match Self::target_identifier(target) {
            Some(parts) => parts,
            None => return,
        };
        if is_global_value_name(&name) {
            return;
        }
        let Some(base_type) = type_from_name(&name) else {
            self.error(
                name_range,
                format!("Variable name ‘{name}’ does not begin with type characters"),
            );
            return;
        };
        let mut var_type = base_type;
        for _ in 0..dims {
            var_type.push_str("[]");
        }
        let global = name.starts_with('g');
        match self
            .symbols
            .declare_variable(&name, &var_type, name_range, global)
        {
            Declared::Ok => {}
            Declared::TypeConflict(existing) => {
                self.record(
                    Diagnostic::error(
                        name_range,
                        format!("Redefinition of ‘{name}’ with a different type"),
                    )
                    .with_trace(Diagnostic::info(
                        existing.range,
                        "Previous definition is here",
                    )),
                );
            }
        }
    }

    /// Unwrap `name`, `name[]...` targets down to the identifier; array
    /// member targets do not declare anything.
    fn target_identifier(target: &Expr) -> Option<(String, Range, usize)> {
        match &target.kind {
            ExprKind::Identifier { name } => Some((name.to_string(), target.range, 0)),
            ExprKind::ArrayDeclarator { base } => {
                let (name, range, dims) = Self::target_identifier(base)?;
                Some((name, range, dims + 1))
            }
            _ => None,
        }
    }

    /// Check an instrument id against earlier definitions.
    pub(crate) fn register_instrument(&mut self, key: &str, range: Range) {
        if let Some(previous) = self.instruments.get(key) {
            let previous = *previous;
            self.record(
                Diagnostic::error(range, format!("Instrument {key} redefined")).with_trace(
                    Diagnostic::info(previous, "Previous definition is here"),
                ),
            );
            return;
        }
        self.instruments.insert(key.to_string(), range);
    }

    /// `if`/`while`/`until` conditions must be Boolean-producing. The
    /// message is distinct from any operand error on the comparison
    /// itself, so a broken condition reports both.
    pub(crate) fn check_condition(&mut self, condition: &Expr, construct: &str) {
        if condition.resolved_type != "b" {
            self.error(
                condition.range,
                format!("Condition of {construct} is not a Boolean expression"),
            );
        }
    }
}
