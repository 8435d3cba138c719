//! Tokenizer for the orchestra language.
//!
//! Raw lexing uses a logos-derived token set; [`OrchestraLexer`] wraps
//! it with the context the raw rules cannot express:
//!
//! - identifiers are classified against the live symbol table (opcode,
//!   void opcode, global value, plain identifier) at the point of lexing
//! - labels register themselves (duplicates warn with a trace)
//! - `opcode name, outtypes, intypes` switches into a signature mode
//!   that lexes the two type signatures as single tokens and registers
//!   the user-defined opcode
//! - deprecated spellings lex as their canonical token with a warning
//! - unrecognized bytes produce an error and scanning resumes after the
//!   offending character
//!
//! When constructed with a [`SourceMap`], every token range is
//! translated back to original-source coordinates as it is produced, so
//! the parser and analyzer report positions in the user's file.

use crate::symbols::SymbolTable;
use cslint_foundation::{Diagnostic, Fatal, Position, Range, SourceMap};
use logos::Logos;
use std::fmt;
use std::rc::Rc;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
enum RawToken {
    #[token("\n")]
    Newline,

    // Keywords
    #[token("instr")]
    Instr,
    #[token("endin")]
    Endin,
    #[token("opcode")]
    Opcode,
    #[token("endop")]
    Endop,
    #[token("if")]
    If,
    #[token("then")]
    Then,
    #[token("ithen")]
    IThen,
    #[token("kthen")]
    KThen,
    #[token("elseif")]
    ElseIf,
    #[token("else")]
    Else,
    #[token("endif")]
    Endif,
    #[token("fi")]
    Fi,
    #[token("while")]
    While,
    #[token("until")]
    Until,
    #[token("do")]
    Do,
    #[token("od")]
    Od,
    #[token("enduntil")]
    EndUntil,
    #[token("goto")]
    Goto,
    #[token("igoto")]
    IGoto,
    #[token("kgoto")]
    KGoto,

    // `0dbfs` cannot be an identifier (it starts with a digit).
    #[token("0dbfs")]
    ZeroDbfs,
    #[regex(r"p[0-9]+", |lex| Rc::from(lex.slice()), priority = 10)]
    PField(Rc<str>),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*:", |lex| {
        let s = lex.slice();
        Rc::from(&s[..s.len() - 1])
    })]
    Label(Rc<str>),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| Rc::from(lex.slice()))]
    Identifier(Rc<str>),

    // Numeric literals keep their text; `3e14159` must not go through
    // f64 and back.
    #[regex(r"[0-9]+", |lex| Rc::from(lex.slice()))]
    DecimalInteger(Rc<str>),
    #[regex(r"0[xX][0-9a-fA-F]+", |lex| Rc::from(lex.slice()))]
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", |lex| Rc::from(lex.slice()))]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| Rc::from(lex.slice()))]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| Rc::from(lex.slice()))]
    Number(Rc<str>),

    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| Rc::from(lex.slice()))]
    String(Rc<str>),
    #[regex(r"\{\{([^}]|\}[^}])*\}\}", |lex| Rc::from(lex.slice()))]
    BracedString(Rc<str>),

    // Operators
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("==")]
    Equal,
    #[token("!=")]
    NotEqual,
    #[token("<=")]
    LessEqual,
    #[token(">=")]
    GreaterEqual,
    #[token("<<")]
    ShiftLeft,
    #[token(">>")]
    ShiftRight,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("^")]
    Caret,
    #[token("=")]
    Assign,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("&")]
    Ampersand,
    #[token("|")]
    Pipe,
    #[token("#")]
    Hash,
    #[token("~")]
    Tilde,
    #[token("¬")]
    NotSign,
    #[token("!")]
    Bang,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
}

/// A classified orchestra token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Newline,
    Instr,
    Endin,
    OpcodeKeyword,
    Endop,
    If,
    Then,
    ElseIf,
    Else,
    Endif,
    While,
    Until,
    Do,
    Od,
    Goto,
    DecimalInteger(Rc<str>),
    Number(Rc<str>),
    String(Rc<str>),
    BracedString(Rc<str>),
    Label(Rc<str>),
    Identifier(Rc<str>),
    /// `sr`, `kr`, `ksmps`, `nchnls`, `nchnls_i`, `0dbfs`, `A4`, and
    /// `p`-field references.
    GlobalValue(Rc<str>),
    Opcode(Rc<str>),
    VoidOpcode(Rc<str>),
    OutputTypeSignature(Rc<str>),
    InputTypeSignature(Rc<str>),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    AndAnd,
    OrOr,
    Ampersand,
    Pipe,
    Hash,
    Tilde,
    Bang,
    ShiftLeft,
    ShiftRight,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Question,
    Colon,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Newline => write!(f, "newline"),
            Token::Instr => write!(f, "instr"),
            Token::Endin => write!(f, "endin"),
            Token::OpcodeKeyword => write!(f, "opcode"),
            Token::Endop => write!(f, "endop"),
            Token::If => write!(f, "if"),
            Token::Then => write!(f, "then"),
            Token::ElseIf => write!(f, "elseif"),
            Token::Else => write!(f, "else"),
            Token::Endif => write!(f, "endif"),
            Token::While => write!(f, "while"),
            Token::Until => write!(f, "until"),
            Token::Do => write!(f, "do"),
            Token::Od => write!(f, "od"),
            Token::Goto => write!(f, "goto"),
            Token::DecimalInteger(s)
            | Token::Number(s)
            | Token::String(s)
            | Token::BracedString(s)
            | Token::Identifier(s)
            | Token::GlobalValue(s)
            | Token::Opcode(s)
            | Token::VoidOpcode(s)
            | Token::OutputTypeSignature(s)
            | Token::InputTypeSignature(s) => write!(f, "{s}"),
            Token::Label(s) => write!(f, "{s}:"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Caret => write!(f, "^"),
            Token::Assign => write!(f, "="),
            Token::PlusAssign => write!(f, "+="),
            Token::MinusAssign => write!(f, "-="),
            Token::StarAssign => write!(f, "*="),
            Token::SlashAssign => write!(f, "/="),
            Token::Equal => write!(f, "=="),
            Token::NotEqual => write!(f, "!="),
            Token::Less => write!(f, "<"),
            Token::Greater => write!(f, ">"),
            Token::LessEqual => write!(f, "<="),
            Token::GreaterEqual => write!(f, ">="),
            Token::AndAnd => write!(f, "&&"),
            Token::OrOr => write!(f, "||"),
            Token::Ampersand => write!(f, "&"),
            Token::Pipe => write!(f, "|"),
            Token::Hash => write!(f, "#"),
            Token::Tilde => write!(f, "~"),
            Token::Bang => write!(f, "!"),
            Token::ShiftLeft => write!(f, "<<"),
            Token::ShiftRight => write!(f, ">>"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Question => write!(f, "?"),
            Token::Colon => write!(f, ":"),
            Token::Comma => write!(f, ","),
        }
    }
}

/// Global-rate value names that always resolve.
const GLOBAL_VALUE_NAMES: [&str; 6] = ["sr", "kr", "ksmps", "nchnls", "nchnls_i", "A4"];

/// Everything one lexing pass produces.
#[derive(Debug)]
pub struct LexOutput {
    pub tokens: Vec<(Token, Range)>,
    pub messages: Vec<Diagnostic>,
}

/// Where the signature-mode state machine stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    /// Next identifier names the opcode being defined.
    AfterOpcodeKeyword,
    /// Comma, then the output type signature.
    AfterOpcodeName,
    /// Comma, then the input type signature.
    AfterOutputSignature,
    /// The token after `instr` must start a number-and-name list.
    AfterInstr,
}

pub struct OrchestraLexer<'a> {
    symbols: &'a mut SymbolTable,
    source_map: Option<&'a SourceMap>,
}

impl<'a> OrchestraLexer<'a> {
    pub fn new(symbols: &'a mut SymbolTable) -> Self {
        OrchestraLexer {
            symbols,
            source_map: None,
        }
    }

    /// Translate token ranges through the preprocessor's source map.
    pub fn with_source_map(mut self, source_map: &'a SourceMap) -> Self {
        self.source_map = Some(source_map);
        self
    }

    /// Tokenize preprocessed orchestra text.
    pub fn tokenize(mut self, text: &str) -> Result<LexOutput, Fatal> {
        tracing::debug!(len = text.len(), "lexing orchestra");
        let line_starts = line_starts(text);
        let mut lexer = RawToken::lexer(text);
        let mut tokens: Vec<(Token, Range)> = Vec::new();
        let mut messages: Vec<Diagnostic> = Vec::new();
        let mut mode = Mode::Normal;
        let mut pending_name: Option<Rc<str>> = None;
        let mut pending_output: Option<Rc<str>> = None;

        while let Some(result) = lexer.next() {
            let span = lexer.span();
            let range = self.range_for(text, &line_starts, span.start, span.end);
            let raw = match result {
                Ok(raw) => raw,
                Err(()) => {
                    let c = lexer.slice().chars().next().unwrap_or('\u{fffd}');
                    messages.push(Diagnostic::error(
                        range,
                        format!("Unexpected character ‘{c}’"),
                    ));
                    continue;
                }
            };
            let token = self.classify(raw, range, mode, &mut messages);
            if mode == Mode::AfterInstr
                && !matches!(
                    token,
                    Token::DecimalInteger(_)
                        | Token::Number(_)
                        | Token::Identifier(_)
                        | Token::Plus
                        | Token::Comma
                        | Token::Newline
                )
            {
                return Err(Fatal(Diagnostic::error(
                    Range::at(range.start),
                    "Expected instrument number or identifier",
                )));
            }
            let mut pushed = false;
            mode = match (mode, &token) {
                (_, Token::OpcodeKeyword) => Mode::AfterOpcodeKeyword,
                (_, Token::Instr) => Mode::AfterInstr,
                (Mode::AfterInstr, _) => Mode::Normal,
                (Mode::AfterOpcodeKeyword, Token::Identifier(name)) => {
                    pending_name = Some(name.clone());
                    Mode::AfterOpcodeName
                }
                (Mode::AfterOpcodeKeyword, _) => Mode::Normal,
                (Mode::AfterOpcodeName, Token::Comma) => {
                    tokens.push((token.clone(), range));
                    pushed = true;
                    match self.take_signature(text, &line_starts, &mut lexer) {
                        Some((signature, sig_range)) => {
                            pending_output = Some(signature.clone());
                            tokens.push((Token::OutputTypeSignature(signature), sig_range));
                            Mode::AfterOutputSignature
                        }
                        None => Mode::Normal,
                    }
                }
                (Mode::AfterOutputSignature, Token::Comma) => {
                    tokens.push((token.clone(), range));
                    pushed = true;
                    if let Some((signature, sig_range)) =
                        self.take_signature(text, &line_starts, &mut lexer)
                    {
                        if let (Some(name), Some(output)) = (&pending_name, &pending_output) {
                            self.symbols.add_user_opcode(name, &signature, output);
                        }
                        tokens.push((Token::InputTypeSignature(signature), sig_range));
                    }
                    pending_name = None;
                    pending_output = None;
                    Mode::Normal
                }
                (Mode::AfterOpcodeName, _) | (Mode::AfterOutputSignature, _) => Mode::Normal,
                (current, _) => current,
            };
            if !pushed {
                tokens.push((token, range));
            }
        }
        tracing::debug!(tokens = tokens.len(), messages = messages.len(), "lexed");
        Ok(LexOutput { tokens, messages })
    }

    /// Classify one raw token, registering labels and rewriting
    /// deprecated spellings.
    fn classify(
        &mut self,
        raw: RawToken,
        range: Range,
        mode: Mode,
        messages: &mut Vec<Diagnostic>,
    ) -> Token {
        match raw {
            RawToken::Newline => Token::Newline,
            RawToken::Instr => Token::Instr,
            RawToken::Endin => Token::Endin,
            RawToken::Opcode => Token::OpcodeKeyword,
            RawToken::Endop => Token::Endop,
            RawToken::If => Token::If,
            RawToken::Then => Token::Then,
            RawToken::ElseIf => Token::ElseIf,
            RawToken::Else => Token::Else,
            RawToken::Endif => Token::Endif,
            RawToken::While => Token::While,
            RawToken::Until => Token::Until,
            RawToken::Do => Token::Do,
            RawToken::Od => Token::Od,
            RawToken::Goto => Token::Goto,
            RawToken::Fi => {
                messages.push(Diagnostic::warning(
                    range,
                    "‘fi’ instead of ‘endif’ used to end if statement",
                ));
                Token::Endif
            }
            RawToken::EndUntil => {
                messages.push(Diagnostic::warning(
                    range,
                    "‘enduntil’ instead of ‘od’ used to end loop",
                ));
                Token::Od
            }
            RawToken::IThen => {
                messages.push(Diagnostic::warning(
                    range,
                    "‘ithen’ instead of ‘then’ used in if statement",
                ));
                Token::Then
            }
            RawToken::KThen => {
                messages.push(Diagnostic::warning(
                    range,
                    "‘kthen’ instead of ‘then’ used in if statement",
                ));
                Token::Then
            }
            RawToken::IGoto => {
                messages.push(Diagnostic::warning(
                    range,
                    "‘igoto’ instead of ‘goto’ used in goto statement",
                ));
                Token::Goto
            }
            RawToken::KGoto => {
                messages.push(Diagnostic::warning(
                    range,
                    "‘kgoto’ instead of ‘goto’ used in goto statement",
                ));
                Token::Goto
            }
            RawToken::ZeroDbfs => Token::GlobalValue(Rc::from("0dbfs")),
            RawToken::PField(name) => Token::GlobalValue(name),
            RawToken::Label(name) => {
                if let Some(existing) = self.symbols.add_label(&name, range) {
                    messages.push(
                        Diagnostic::warning(
                            range,
                            format!("Duplicate label ‘{name}’ ignored"),
                        )
                        .with_trace(Diagnostic::info(
                            existing.range,
                            format!("Label ‘{name}’ is here"),
                        )),
                    );
                }
                Token::Label(name)
            }
            RawToken::Identifier(name) => {
                let classified = match self.symbols.opcode(&name) {
                    Some(entry) if entry.is_void => Token::VoidOpcode(name.clone()),
                    Some(_) => Token::Opcode(name.clone()),
                    None if GLOBAL_VALUE_NAMES.contains(&&*name) => {
                        Token::GlobalValue(name.clone())
                    }
                    None => Token::Identifier(name.clone()),
                };
                // A definition's name is always an identifier, even when
                // it redefines a known opcode.
                if mode == Mode::AfterOpcodeKeyword {
                    Token::Identifier(name)
                } else {
                    classified
                }
            }
            RawToken::DecimalInteger(text) => Token::DecimalInteger(text),
            RawToken::Number(text) => Token::Number(text),
            RawToken::String(text) => Token::String(text),
            RawToken::BracedString(text) => Token::BracedString(text),
            RawToken::PlusAssign => Token::PlusAssign,
            RawToken::MinusAssign => Token::MinusAssign,
            RawToken::StarAssign => Token::StarAssign,
            RawToken::SlashAssign => Token::SlashAssign,
            RawToken::Equal => Token::Equal,
            RawToken::NotEqual => Token::NotEqual,
            RawToken::LessEqual => Token::LessEqual,
            RawToken::GreaterEqual => Token::GreaterEqual,
            RawToken::ShiftLeft => Token::ShiftLeft,
            RawToken::ShiftRight => Token::ShiftRight,
            RawToken::AndAnd => Token::AndAnd,
            RawToken::OrOr => Token::OrOr,
            RawToken::Plus => Token::Plus,
            RawToken::Minus => Token::Minus,
            RawToken::Star => Token::Star,
            RawToken::Slash => Token::Slash,
            RawToken::Percent => Token::Percent,
            RawToken::Caret => Token::Caret,
            RawToken::Assign => Token::Assign,
            RawToken::Less => Token::Less,
            RawToken::Greater => Token::Greater,
            RawToken::Ampersand => Token::Ampersand,
            RawToken::Pipe => Token::Pipe,
            RawToken::Hash => Token::Hash,
            RawToken::Tilde | RawToken::NotSign => Token::Tilde,
            RawToken::Bang => Token::Bang,
            RawToken::LParen => Token::LParen,
            RawToken::RParen => Token::RParen,
            RawToken::LBracket => Token::LBracket,
            RawToken::RBracket => Token::RBracket,
            RawToken::Question => Token::Question,
            RawToken::Colon => Token::Colon,
            RawToken::Comma => Token::Comma,
        }
    }

    /// Lex an opcode type signature directly from the raw remainder.
    ///
    /// Signatures like `ai[]k[]` or `0` would otherwise shatter into
    /// identifier and bracket tokens.
    fn take_signature(
        &self,
        text: &str,
        line_starts: &[u32],
        lexer: &mut logos::Lexer<'_, RawToken>,
    ) -> Option<(Rc<str>, Range)> {
        let remainder = lexer.remainder();
        let ws = remainder
            .bytes()
            .take_while(|b| *b == b' ' || *b == b'\t')
            .count();
        let signature: String = remainder[ws..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '[' || *c == ']')
            .collect();
        if signature.is_empty() {
            return None;
        }
        let start = lexer.span().end + ws;
        let end = start + signature.len();
        lexer.bump(ws + signature.len());
        let range = self.range_for(text, line_starts, start, end);
        Some((Rc::from(signature.as_str()), range))
    }

    fn range_for(&self, text: &str, line_starts: &[u32], start: usize, end: usize) -> Range {
        let range = Range::new(
            position_at(text, line_starts, start),
            position_at(text, line_starts, end),
        );
        match self.source_map {
            Some(map) => map.source_range(range),
            None => range,
        }
    }
}

/// Byte offsets of each line start, with an EOF sentinel.
fn line_starts(text: &str) -> Vec<u32> {
    let mut starts = vec![0u32];
    for (idx, b) in text.bytes().enumerate() {
        if b == b'\n' {
            starts.push((idx + 1) as u32);
        }
    }
    starts
}

/// Convert a byte offset to a zero-based line/column position, columns
/// counted in code points.
fn position_at(text: &str, line_starts: &[u32], offset: usize) -> Position {
    let line = line_starts.partition_point(|start| *start as usize <= offset) - 1;
    let line_start = line_starts[line] as usize;
    let column = text[line_start..offset].chars().count();
    Position::new(line as u32, column as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes;
    use crate::symbols::SymbolTable;

    fn lex(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut symbols = SymbolTable::new(opcodes::builtin().clone());
        let output = OrchestraLexer::new(&mut symbols).tokenize(source).unwrap();
        (
            output.tokens.into_iter().map(|(token, _)| token).collect(),
            output.messages,
        )
    }

    fn kinds(source: &str) -> Vec<Token> {
        lex(source).0
    }

    #[test]
    fn lexes_numbers() {
        for source in ["3.14159", "314159.", ".314159", "3e14159", "3e-1415", "3.14e15", "0x12"] {
            let tokens = kinds(source);
            assert!(
                matches!(tokens.as_slice(), [Token::Number(_)]),
                "{source} lexed as {tokens:?}"
            );
        }
        assert!(matches!(
            kinds("314159").as_slice(),
            [Token::DecimalInteger(_)]
        ));
    }

    #[test]
    fn lexes_strings() {
        assert!(matches!(
            kinds("\"\" {{}}").as_slice(),
            [Token::String(_), Token::BracedString(_)]
        ));
        assert!(matches!(kinds("\"x\\\\\"").as_slice(), [Token::String(_)]));
        assert!(matches!(kinds("{{\n}}").as_slice(), [Token::BracedString(_)]));
    }

    #[test]
    fn lexes_global_values() {
        for source in ["0dbfs", "A4", "kr", "ksmps", "nchnls", "nchnls_i", "sr", "p4"] {
            let tokens = kinds(source);
            assert!(
                matches!(tokens.as_slice(), [Token::GlobalValue(_)]),
                "{source} lexed as {tokens:?}"
            );
        }
    }

    #[test]
    fn classifies_opcodes_by_voidness() {
        let tokens = kinds("prints oscili");
        assert!(matches!(
            tokens.as_slice(),
            [Token::VoidOpcode(_), Token::Opcode(_)]
        ));
    }

    #[test]
    fn deprecated_spellings_warn_and_canonicalize() {
        let (tokens, messages) = lex("if 1 == 1 then\nfi");
        assert_eq!(tokens.last(), Some(&Token::Endif));
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].excerpt,
            "‘fi’ instead of ‘endif’ used to end if statement"
        );

        let (tokens, messages) = lex("while 1 == 1 do\nenduntil");
        assert_eq!(tokens.last(), Some(&Token::Od));
        assert_eq!(
            messages[0].excerpt,
            "‘enduntil’ instead of ‘od’ used to end loop"
        );
        assert_eq!(messages[0].range, Range::on_line(1, 0, 8));
    }

    #[test]
    fn duplicate_label_warns_with_trace() {
        let (tokens, messages) = lex("label:\nlabel:");
        assert!(matches!(
            tokens.as_slice(),
            [Token::Label(_), Token::Newline, Token::Label(_)]
        ));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].excerpt, "Duplicate label ‘label’ ignored");
        assert_eq!(messages[0].range, Range::on_line(1, 0, 5));
        assert_eq!(messages[0].trace.len(), 1);
        assert_eq!(messages[0].trace[0].excerpt, "Label ‘label’ is here");
        assert_eq!(messages[0].trace[0].range, Range::on_line(0, 0, 5));
    }

    #[test]
    fn label_before_statement_on_same_line() {
        let tokens = kinds("label: 0dbfs = 1");
        assert!(matches!(
            tokens.as_slice(),
            [
                Token::Label(_),
                Token::GlobalValue(_),
                Token::Assign,
                Token::DecimalInteger(_)
            ]
        ));
    }

    #[test]
    fn opcode_definition_lexes_signatures_and_registers() {
        let mut symbols = SymbolTable::new(opcodes::builtin().clone());
        let output = OrchestraLexer::new(&mut symbols)
            .tokenize("opcode name_0 , ai[]k[] , 0\nendop\nname_0")
            .unwrap();
        let tokens: Vec<Token> = output.tokens.into_iter().map(|(t, _)| t).collect();
        assert!(output.messages.is_empty());
        assert!(tokens.iter().any(
            |t| matches!(t, Token::OutputTypeSignature(s) if &**s == "ai[]k[]")
        ));
        assert!(tokens
            .iter()
            .any(|t| matches!(t, Token::InputTypeSignature(s) if &**s == "0")));
        // The later use classifies against the fresh registration.
        assert!(matches!(tokens.last(), Some(Token::Opcode(name)) if &**name == "name_0"));
        assert!(symbols.opcode("name_0").is_some());
    }

    #[test]
    fn unexpected_characters_recover() {
        let (tokens, messages) = lex("instr 1\n` @ $\nendin");
        assert!(tokens.contains(&Token::Endin));
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].excerpt, "Unexpected character ‘`’");
        assert_eq!(messages[0].range, Range::on_line(1, 0, 1));
    }

    #[test]
    fn unexpected_token_after_instr_is_fatal() {
        let mut symbols = SymbolTable::new(opcodes::builtin().clone());
        let error = OrchestraLexer::new(&mut symbols)
            .tokenize("instr ?\nendin")
            .unwrap_err();
        assert_eq!(error.0.excerpt, "Expected instrument number or identifier");
        assert_eq!(error.0.range, Range::at(Position::new(0, 6)));
    }

    #[test]
    fn conditional_expression_tokens() {
        let tokens = kinds("label: 0 == 1 ? 0 : 1");
        assert!(tokens.contains(&Token::Question));
        assert!(tokens.contains(&Token::Colon));
        assert!(matches!(tokens.first(), Some(Token::Label(_))));
    }
}
