//! Syntax tree for the orchestra language.
//!
//! Closed tagged-variant types per node kind; every node owns its range
//! and its children. Identifier expressions carry the type the analyzer
//! resolved for them (`""` when resolution failed).

use cslint_foundation::Range;
use std::fmt;
use std::rc::Rc;

/// A parsed orchestra: the root node.
#[derive(Debug, Clone, PartialEq)]
pub struct Orchestra {
    pub statements: Vec<Stmt>,
    pub range: Range,
}

/// An expression with its resolved type.
///
/// `resolved_type` is a type code string (`"i"`, `"k"`, `"a"`, `"S"`,
/// `"b"` for Booleans, `"i[]"`-style for arrays); empty when a semantic
/// error left the type unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub range: Range,
    pub resolved_type: String,
}

impl Expr {
    pub fn new(kind: ExprKind, range: Range, resolved_type: impl Into<String>) -> Self {
        Expr {
            kind,
            range,
            resolved_type: resolved_type.into(),
        }
    }

    /// Placeholder produced by error recovery.
    pub fn empty(range: Range) -> Self {
        Expr::new(ExprKind::Empty, range, "")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Numeric literal, original text preserved.
    NumberLiteral { text: Rc<str> },
    /// Quoted or braced string literal, verbatim.
    StringLiteral { text: Rc<str> },
    /// Variable, global value, or p-field reference.
    Identifier { name: Rc<str> },
    BinaryOperation {
        operator: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOperation {
        operator: UnaryOperator,
        operand: Box<Expr>,
    },
    /// `condition ? then : else`.
    ConditionalExpression {
        condition: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
    },
    /// `oscili(...)` function-call form.
    OpcodeExpression(OpcodeCall),
    /// `name[index]`.
    ArrayMember { base: Box<Expr>, index: Box<Expr> },
    /// `name[]` in an output position.
    ArrayDeclarator { base: Box<Expr> },
    /// Placeholder from error recovery.
    Empty,
}

/// An opcode use: name plus input arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct OpcodeCall {
    pub name: Rc<str>,
    pub name_range: Range,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Plus,
    Minus,
    Times,
    Divide,
    Modulus,
    Power,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    And,
    Or,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    ShiftLeft,
    ShiftRight,
}

impl BinaryOperator {
    /// Operator spelling, as shown in diagnostics.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Times => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulus => "%",
            BinaryOperator::Power => "^",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
            BinaryOperator::BitwiseAnd => "&",
            BinaryOperator::BitwiseOr => "|",
            BinaryOperator::BitwiseXor => "#",
            BinaryOperator::ShiftLeft => "<<",
            BinaryOperator::ShiftRight => ">>",
        }
    }

    /// Accepted (left, right) → result type signatures.
    pub fn overloads(self) -> &'static [(&'static str, &'static str, &'static str)] {
        match self {
            BinaryOperator::Plus
            | BinaryOperator::Minus
            | BinaryOperator::Times
            | BinaryOperator::Divide
            | BinaryOperator::Modulus
            | BinaryOperator::Power => &[
                ("i", "i", "i"),
                ("k", "k", "k"),
                ("a", "a", "a"),
                ("a", "k", "a"),
                ("k", "a", "a"),
            ],
            BinaryOperator::BitwiseAnd
            | BinaryOperator::BitwiseOr
            | BinaryOperator::BitwiseXor
            | BinaryOperator::ShiftLeft
            | BinaryOperator::ShiftRight => &[("i", "i", "i"), ("k", "k", "k")],
            BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::LessThan
            | BinaryOperator::GreaterThan
            | BinaryOperator::LessThanOrEqual
            | BinaryOperator::GreaterThanOrEqual => &[("i", "i", "b"), ("k", "k", "b")],
            BinaryOperator::And | BinaryOperator::Or => &[("b", "b", "b")],
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Minus,
    Not,
    BitwiseComplement,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Plus => "+",
            UnaryOperator::Minus => "-",
            UnaryOperator::Not => "!",
            UnaryOperator::BitwiseComplement => "~",
        }
    }

    /// Accepted operand → result type signatures.
    pub fn overloads(self) -> &'static [(&'static str, &'static str)] {
        match self {
            UnaryOperator::Plus | UnaryOperator::Minus => {
                &[("i", "i"), ("k", "k"), ("a", "a")]
            }
            UnaryOperator::Not => &[("b", "b")],
            UnaryOperator::BitwiseComplement => &[("i", "i"), ("k", "k")],
        }
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Assignment statement operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOperator {
    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
}

/// One entry of an `instr` number-and-name list.
#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentId {
    Number { text: Rc<str>, range: Range },
    Name { name: Rc<str>, range: Range, merge: bool },
}

/// A statement with its range.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub range: Range,
}

impl Stmt {
    pub fn new(kind: StmtKind, range: Range) -> Self {
        Stmt { kind, range }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Assignment {
        target: Expr,
        operator: AssignOperator,
        value: Expr,
    },
    /// `out1[, out2...] opcode args`.
    OpcodeStatement {
        outputs: Vec<Expr>,
        call: OpcodeCall,
    },
    /// Opcode statement with no outputs.
    VoidOpcodeStatement { call: OpcodeCall },
    Instrument {
        ids: Vec<InstrumentId>,
        body: Vec<Stmt>,
    },
    OpcodeDefinition {
        name: Rc<str>,
        name_range: Range,
        output_types: Rc<str>,
        input_types: Rc<str>,
        body: Vec<Stmt>,
    },
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    /// `if condition goto label`.
    IfGoto {
        condition: Expr,
        label: Rc<str>,
        label_range: Range,
    },
    While { condition: Expr, body: Vec<Stmt> },
    Until { condition: Expr, body: Vec<Stmt> },
    Goto { label: Rc<str>, label_range: Range },
    LabeledStatement {
        name: Rc<str>,
        statement: Option<Box<Stmt>>,
    },
    Empty,
}
