// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Macro preprocessor for the Csound orchestra and score dialects.
//!
//! One left-to-right scan over the input interprets directives
//! (`#define`, `#undef`, `#ifdef`/`#ifndef`/`#else`/`#endif`,
//! `#include`, `#includestr`), expands `$NAME` macro uses and `@N`/`@@N`
//! power-of-two expanders, strips comments, joins continued lines, and
//! in score mode unrolls `{ N VAR ... }` repetition loops. Every
//! emitted character is mirrored into a [`SourceMap`] so diagnostics on
//! the output can be traced back to original file positions.
//!
//! # Design
//!
//! - expansion and inclusion run on an explicit frame stack with checked
//!   depth ceilings, never on the host call stack
//! - recoverable problems are recorded into [`Preprocessed::messages`];
//!   conditions that would desynchronize position tracking return
//!   [`Fatal`]
//!
//! # Examples
//!
//! ```
//! # use cslint_preproc::{process, PreprocessorOptions};
//! let options = PreprocessorOptions::default();
//! let result = process("#define MACRO #440#$MACRO", &options).unwrap();
//! assert_eq!(result.output, " 440");
//! assert!(result.messages.is_empty());
//! ```

mod directives;
mod frame;
mod invoke;
mod macros;
mod scanner;

pub use macros::Macro;

use cslint_foundation::{Diagnostic, Fatal, SourceMap};
use indexmap::IndexMap;
use std::path::PathBuf;

/// Macro uses may expand macros recursively up to this many frames.
pub const MACRO_EXPANSION_LIMIT: usize = 100;

/// `#include`/`#includestr` may nest up to this many files.
pub const INCLUDE_DEPTH_LIMIT: usize = 100;

/// Preprocessor configuration.
#[derive(Debug, Clone, Default)]
pub struct PreprocessorOptions {
    /// Path of the text being processed, used to resolve relative
    /// includes and reported on diagnostics by the host.
    pub file_path: Option<PathBuf>,
    /// Directories searched for included files, after the current
    /// directories.
    pub include_directories: Vec<PathBuf>,
    /// Workspace roots searched for included files before the include
    /// directories.
    pub current_directories: Vec<PathBuf>,
    /// Score mode: `{ N VAR ... }` loops are expanded.
    pub is_score: bool,
}

/// Everything the preprocessor produces in one pass.
#[derive(Debug)]
pub struct Preprocessed {
    /// The directive-free, macro-expanded text.
    pub output: String,
    /// Mapping from output positions back to original source positions.
    pub source_map: SourceMap,
    /// Macros still defined when the input ended, in definition order.
    pub macros: IndexMap<String, Macro>,
    /// Recorded (non-fatal) diagnostics.
    pub messages: Vec<Diagnostic>,
}

impl Preprocessed {
    /// True if any recorded message is an error.
    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(Diagnostic::is_error)
    }
}

/// Preprocess `text` under `options`.
///
/// Recoverable problems are recorded in the returned
/// [`Preprocessed::messages`]; a [`Fatal`] is returned only where
/// continuing would desynchronize position tracking (§ error handling in
/// the crate docs).
pub fn process(text: &str, options: &PreprocessorOptions) -> Result<Preprocessed, Fatal> {
    tracing::debug!(
        len = text.len(),
        is_score = options.is_score,
        file = ?options.file_path,
        "preprocessing"
    );
    let mut preprocessor = scanner::Preprocessor::new(text, options);
    preprocessor.run()?;
    let result = preprocessor.finish();
    tracing::debug!(
        output_len = result.output.len(),
        messages = result.messages.len(),
        macros = result.macros.len(),
        "preprocessing finished"
    );
    Ok(result)
}
