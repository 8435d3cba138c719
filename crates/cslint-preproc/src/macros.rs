//! Macro table entries.

use cslint_foundation::Range;
use std::path::PathBuf;

/// One `#define`d macro.
///
/// Owned by the preprocessor's macro table from definition until `#undef`
/// or end of input. Redefinition replaces the entry (with a warning
/// tracing to the previous definition's range).
#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    pub name: String,
    /// `None` for object-like macros; parameter names in declaration
    /// order for function-like macros.
    pub parameter_names: Option<Vec<String>>,
    /// Body text with `\#` already unescaped.
    pub body: String,
    /// Range of the name in the definition.
    pub range: Range,
    /// File containing the definition, `None` for the root text.
    pub file: Option<PathBuf>,
}

impl Macro {
    /// True when the macro takes parameters.
    pub fn is_function_like(&self) -> bool {
        self.parameter_names.is_some()
    }
}

/// Valid first character of a macro name.
pub(crate) fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Valid non-first character of a macro name.
pub(crate) fn is_name_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
