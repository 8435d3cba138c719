// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Diagnostics front end for the Csound orchestra and score dialects.
//!
//! One call runs the full pipeline: preprocess (macro expansion,
//! directives, inclusion), lex, parse, and semantic analysis, producing
//! one ordered list of located [`Diagnostic`] messages in original-file
//! coordinates.
//!
//! Each lint call builds its own pipeline instances; nothing is shared
//! across calls except the read-only opcode catalog, so concurrent
//! lints of different documents just use separate calls.
//!
//! # Examples
//!
//! ```
//! # use cslint::{lint_orchestra, LintOptions};
//! let messages = lint_orchestra("instr 0\nendin\n", &LintOptions::default());
//! assert_eq!(messages.len(), 1);
//! assert_eq!(messages[0].excerpt, "Instrument number must be greater than 0");
//! ```

pub use cslint_foundation::{Diagnostic, Position, Range, Severity};
pub use cslint_orc::OpcodeCatalog;
pub use cslint_preproc::{Preprocessed, PreprocessorOptions};

use cslint_orc::{opcodes, parser, OrchestraLexer, SymbolTable};
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one lint call.
#[derive(Debug, Clone, Default)]
pub struct LintOptions {
    /// Path of the document, reported on messages and used for relative
    /// `#include` resolution.
    pub file_path: Option<PathBuf>,
    /// Directories searched for `#include`d files.
    pub include_directories: Vec<PathBuf>,
    /// Workspace roots searched before the include directories.
    pub current_directories: Vec<PathBuf>,
    /// Opcode signatures from the host engine; the built-in subset is
    /// used when absent.
    pub catalog: Option<Arc<OpcodeCatalog>>,
}

impl LintOptions {
    fn preprocessor_options(&self, is_score: bool) -> PreprocessorOptions {
        PreprocessorOptions {
            file_path: self.file_path.clone(),
            include_directories: self.include_directories.clone(),
            current_directories: self.current_directories.clone(),
            is_score,
        }
    }
}

/// Lint orchestra text: preprocess, lex, parse, analyze.
///
/// If the preprocessor reports any error, its messages are returned
/// without parsing, since the parser assumes macro-expanded,
/// directive-free input.
pub fn lint_orchestra(text: &str, options: &LintOptions) -> Vec<Diagnostic> {
    let preprocessed =
        match cslint_preproc::process(text, &options.preprocessor_options(false)) {
            Ok(preprocessed) => preprocessed,
            Err(fatal) => {
                return collate(vec![fatal.into_diagnostic()], options);
            }
        };
    let mut messages = preprocessed.messages.clone();
    if preprocessed.has_errors() {
        return collate(messages, options);
    }

    let catalog = options
        .catalog
        .clone()
        .unwrap_or_else(|| opcodes::builtin().clone());
    let mut symbols = SymbolTable::new(catalog);
    let lexed = match OrchestraLexer::new(&mut symbols)
        .with_source_map(&preprocessed.source_map)
        .tokenize(&preprocessed.output)
    {
        Ok(lexed) => lexed,
        Err(fatal) => {
            messages.push(fatal.into_diagnostic());
            return collate(messages, options);
        }
    };
    messages.extend(lexed.messages.iter().cloned());

    let (_orchestra, parse_messages) = parser::parse(&lexed.tokens, &mut symbols);
    messages.extend(parse_messages);
    collate(messages, options)
}

/// Preprocess score text (score-loop expansion enabled). The score has
/// no parser here; callers lint the preprocessor's findings.
pub fn preprocess_score(text: &str, options: &LintOptions) -> Result<Preprocessed, Diagnostic> {
    cslint_preproc::process(text, &options.preprocessor_options(true))
        .map_err(|fatal| fatal.into_diagnostic())
}

/// Sort messages by position (stable, so traces stay attached) and fill
/// in the document path on messages that have no file of their own.
fn collate(mut messages: Vec<Diagnostic>, options: &LintOptions) -> Vec<Diagnostic> {
    if let Some(path) = &options.file_path {
        for message in &mut messages {
            if message.file.is_none() {
                message.file = Some(path.clone());
            }
            for trace in &mut message.trace {
                if trace.file.is_none() {
                    trace.file = Some(path.clone());
                }
            }
        }
    }
    messages.sort_by_key(|message| message.range);
    tracing::debug!(messages = messages.len(), "lint finished");
    messages
}
