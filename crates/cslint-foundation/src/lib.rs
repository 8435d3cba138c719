// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Foundation types for the cslint front end.
//!
//! This crate contains the types shared by every pipeline stage:
//! source positions, diagnostic messages, and the output→source map
//! produced by the preprocessor.

pub mod diagnostic;
pub mod position;
pub mod source_map;

pub use diagnostic::{Diagnostic, Fatal, Severity, Solution};
pub use position::{Position, Range};
pub use source_map::{FileId, SourceMap};
