//! Diagnostic messages.
//!
//! # Design
//!
//! - `Diagnostic` — single message with severity, location, and excerpt
//! - `trace` — nested informational diagnostics pointing at causally
//!   related locations ("Previous definition is here"); rendered
//!   immediately after their parent, never reordered independently
//! - `solutions` — suggested textual replacements
//! - `Fatal` — the thrown form, reserved for conditions where continuing
//!   would desynchronize position tracking
//!
//! # Examples
//!
//! ```
//! # use cslint_foundation::{Diagnostic, Range, Position};
//! let range = Range::on_line(2, 0, 5);
//! let message = Diagnostic::warning(range, "‘MACRO’ macro redefined")
//!     .with_trace(Diagnostic::info(
//!         Range::on_line(0, 8, 13),
//!         "Previous definition is here",
//!     ));
//! assert_eq!(message.trace.len(), 1);
//! ```

use crate::position::Range;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Diagnostic severity.
///
/// `Info` is trace-only: it never appears as a standalone message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Suggested replacement for a range of source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub range: Range,
    pub replacement: String,
}

/// A located diagnostic message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Originating file; `None` for the unsaved root text. The host fills
    /// this in when collating messages.
    pub file: Option<PathBuf>,
    pub range: Range,
    /// Human-readable message text.
    pub excerpt: String,
    /// Nested informational diagnostics.
    pub trace: Vec<Diagnostic>,
    /// Suggested fixes.
    pub solutions: Vec<Solution>,
}

impl Diagnostic {
    fn with_severity(severity: Severity, range: Range, excerpt: impl Into<String>) -> Self {
        Self {
            severity,
            file: None,
            range,
            excerpt: excerpt.into(),
            trace: Vec::new(),
            solutions: Vec::new(),
        }
    }

    /// Create an error diagnostic.
    pub fn error(range: Range, excerpt: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, range, excerpt)
    }

    /// Create a warning diagnostic.
    pub fn warning(range: Range, excerpt: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, range, excerpt)
    }

    /// Create an informational diagnostic for use in a `trace`.
    pub fn info(range: Range, excerpt: impl Into<String>) -> Self {
        Self::with_severity(Severity::Info, range, excerpt)
    }

    /// Attach the originating file.
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Append a trace diagnostic.
    pub fn with_trace(mut self, trace: Diagnostic) -> Self {
        self.trace.push(trace);
        self
    }

    /// Append a suggested replacement.
    pub fn with_solution(mut self, range: Range, replacement: impl Into<String>) -> Self {
        self.solutions.push(Solution {
            range,
            replacement: replacement.into(),
        });
        self
    }

    /// True for `Error` severity.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.range, self.excerpt)
    }
}

/// A diagnostic severe enough to abort the current pipeline stage.
///
/// Thrown (returned as `Err`) rather than recorded when continuing would
/// desynchronize position tracking: unterminated macro definitions,
/// malformed invocations, missing include targets, lexical dead ends.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", .0.excerpt)]
pub struct Fatal(pub Diagnostic);

impl Fatal {
    /// The wrapped diagnostic.
    pub fn into_diagnostic(self) -> Diagnostic {
        self.0
    }
}
