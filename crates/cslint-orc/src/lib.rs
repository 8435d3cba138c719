// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Orchestra front end: lexer, parser, and semantic analyzer for the
//! Csound orchestra dialect.
//!
//! The input is expected to be preprocessor output, macro-expanded and
//! directive-free. The [`lexer::OrchestraLexer`] classifies identifiers
//! against a live [`symbols::SymbolTable`] (seeded with an
//! [`opcodes::OpcodeCatalog`]), the hand-written recursive descent
//! parser builds the AST, and semantic checks run as each construct
//! completes so diagnostics come out in roughly textual order.

pub mod ast;
pub mod lexer;
pub mod opcodes;
pub mod parser;
pub mod symbols;

pub use lexer::{LexOutput, OrchestraLexer, Token};
pub use opcodes::OpcodeCatalog;
pub use parser::Parser;
pub use symbols::SymbolTable;
