//! Directive interpretation: `#define`, `#undef`, conditionals, and
//! inclusion.

use crate::frame::{Frame, FrameKind};
use crate::macros::Macro;
use crate::scanner::{Conditional, Preprocessor};
use crate::INCLUDE_DEPTH_LIMIT;
use cslint_foundation::{Diagnostic, Fatal, Position, Range};
use std::path::PathBuf;
use std::rc::Rc;

/// Known directives, longest first so `includestr` wins over `include`.
const DIRECTIVES: [&str; 8] = [
    "includestr",
    "include",
    "ifndef",
    "ifdef",
    "define",
    "undef",
    "endif",
    "else",
];

impl Preprocessor<'_> {
    /// Match a directive at the current `#`, allowing whitespace between
    /// the `#` and the keyword. Consumes and returns the directive with
    /// its range, or leaves the stream untouched: a `#` that opens no
    /// directive is ordinary text (the orchestra's bitwise-xor
    /// operator, a macro body character).
    fn match_directive(&mut self) -> Option<(&'static str, Range)> {
        debug_assert_eq!(self.peek(), Some('#'));
        let mut n = 1;
        while matches!(self.peek_at(n), Some(' ') | Some('\t')) {
            n += 1;
        }
        for name in DIRECTIVES {
            if name
                .chars()
                .enumerate()
                .all(|(i, c)| self.peek_at(n + i) == Some(c))
            {
                let start = self.cur_pos();
                let total = n + name.len();
                for _ in 0..total {
                    self.bump();
                }
                let end = Position::new(start.line, start.column + total as u32);
                return Some((name, Range::new(start, end)));
            }
        }
        None
    }

    /// Dispatch a `#` while taking.
    pub(crate) fn hash(&mut self) -> Result<(), Fatal> {
        let Some((directive, range)) = self.match_directive() else {
            self.emit_next();
            return Ok(());
        };
        match directive {
            "define" => self.define(range),
            "undef" => self.undef(range),
            "ifdef" => self.conditional(false, range),
            "ifndef" => self.conditional(true, range),
            "else" => {
                self.conditional_else(range);
                Ok(())
            }
            "endif" => {
                self.conditional_endif(range);
                Ok(())
            }
            "include" => self.include(range, false),
            "includestr" => self.include(range, true),
            _ => unreachable!("directive table covered"),
        }
    }

    /// Dispatch a `#` inside a skipped branch. Only conditional
    /// bookkeeping runs; everything else is inert text. Returns false
    /// when no directive matched.
    pub(crate) fn hash_skipped(&mut self) -> bool {
        let Some((directive, range)) = self.match_directive() else {
            return false;
        };
        match directive {
            "ifdef" | "ifndef" => {
                // The whole nested block is inside a skipped branch; its
                // condition is not evaluated, it only has to find its
                // own #endif.
                let file = self.diag_path();
                self.conditionals.push(Conditional {
                    range,
                    file,
                    taking: true,
                    seen_else: false,
                });
            }
            "else" => self.conditional_else(range),
            "endif" => self.conditional_endif(range),
            _ => {}
        }
        true
    }

    // ------------------------------------------------------------------
    // #define / #undef
    // ------------------------------------------------------------------

    fn define(&mut self, directive_range: Range) -> Result<(), Fatal> {
        let define_start = directive_range.start;
        let file = self.cur_file();
        self.skip_blank();
        if self.peek().is_none() {
            self.record_error(directive_range, "Macro name missing");
            return Ok(());
        }
        let Some((name, name_range)) = self.read_name() else {
            return Err(self.fatal(
                Range::at(self.cur_pos()),
                "Macro name must be an identifier",
            ));
        };
        let parameter_names = if self.peek() == Some('(') {
            match self.parameter_list()? {
                Some(names) => Some(names),
                // Unterminated list already recorded; drop the directive.
                None => return Ok(()),
            }
        } else {
            None
        };
        self.skip_blank();
        match self.peek() {
            Some('#') => {}
            Some(_) => {
                return Err(self.fatal(
                    Range::at(self.cur_pos()),
                    "Expected ‘#’ after macro name",
                ));
            }
            None => {
                self.record_error(Range::at(self.cur_pos()), "Expected ‘#’ after macro name");
                return Ok(());
            }
        }
        let body_open = self.cur_pos();
        self.bump();
        let mut body = String::new();
        loop {
            match self.peek() {
                None => {
                    let range = self.char_range(body_open);
                    self.record_error(range, "Missing terminating ‘#’");
                    return Ok(());
                }
                Some('\\') if self.peek_at(1) == Some('#') => {
                    self.bump();
                    self.bump();
                    body.push('#');
                }
                Some('#') => {
                    self.bump();
                    break;
                }
                Some(c) => {
                    self.bump();
                    body.push(c);
                }
            }
        }
        if let Some(previous) = self.macros.get(&name) {
            let mut trace = Diagnostic::info(previous.range, "Previous definition is here");
            if let Some(path) = &previous.file {
                trace = trace.with_file(path);
            }
            let warning = Diagnostic::warning(name_range, format!("‘{name}’ macro redefined"))
                .with_trace(trace);
            self.record(warning);
        }
        let definition = Macro {
            name: name.clone(),
            parameter_names,
            body,
            range: name_range,
            file: self.diag_path(),
        };
        self.macros.insert(name, definition);
        self.emit(' ', define_start, file);
        Ok(())
    }

    /// Parse `(NAME'NAME'...)` after a function-like macro's name.
    ///
    /// `Ok(None)` means the list was unterminated at end of input; the
    /// error is already recorded.
    fn parameter_list(&mut self) -> Result<Option<Vec<String>>, Fatal> {
        let lparen = self.cur_pos();
        self.bump();
        let mut names: Vec<String> = Vec::new();
        loop {
            self.skip_spaces();
            if self.peek().is_none() {
                let range = self.char_range(lparen);
                self.record_error(range, "Missing terminating ‘)’");
                return Ok(None);
            }
            let Some((name, name_range)) = self.read_name() else {
                return Err(self.fatal(
                    Range::at(self.cur_pos()),
                    "Expected macro parameter name",
                ));
            };
            if names.contains(&name) {
                return Err(self.fatal(
                    name_range,
                    format!("Duplicate macro parameter name ‘{name}’"),
                ));
            }
            names.push(name);
            self.skip_spaces();
            match self.peek() {
                Some(')') => {
                    self.bump();
                    return Ok(Some(names));
                }
                Some('\'') => {
                    self.bump();
                }
                Some('#') => {
                    let range = self.char_range(self.cur_pos());
                    self.record_warning(
                        range,
                        "‘#’ instead of single quote used to separate macro parameters",
                    );
                    self.bump();
                }
                Some(_) => {
                    return Err(self.fatal(
                        Range::at(self.cur_pos()),
                        "Expected single quote in macro parameter list",
                    ));
                }
                None => {
                    let range = self.char_range(lparen);
                    self.record_error(range, "Missing terminating ‘)’");
                    return Ok(None);
                }
            }
        }
    }

    pub(crate) fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.bump();
        }
    }

    fn undef(&mut self, directive_range: Range) -> Result<(), Fatal> {
        self.skip_blank();
        if self.peek().is_none() {
            self.record_error(directive_range, "Macro name missing");
            return Ok(());
        }
        let Some((name, name_range)) = self.read_name() else {
            return Err(self.fatal(
                Range::at(self.cur_pos()),
                "Macro name must be an identifier",
            ));
        };
        if self.macros.shift_remove(&name).is_none() {
            self.record_error(name_range, format!("‘{name}’ macro is not defined"));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Conditional compilation
    // ------------------------------------------------------------------

    fn conditional(&mut self, negated: bool, directive_range: Range) -> Result<(), Fatal> {
        self.skip_blank();
        if self.peek().is_none() {
            self.record_error(directive_range, "Macro name missing");
            return Ok(());
        }
        let Some((name, _)) = self.read_name() else {
            return Err(self.fatal(
                Range::at(self.cur_pos()),
                "Macro name must be an identifier",
            ));
        };
        // Membership is evaluated at encounter time, not deferred.
        let taking = self.is_defined(&name) != negated;
        let file = self.diag_path();
        self.conditionals.push(Conditional {
            range: directive_range,
            file,
            taking,
            seen_else: false,
        });
        Ok(())
    }

    pub(crate) fn conditional_else(&mut self, range: Range) {
        match self.conditionals.last().map(|c| c.seen_else) {
            None => self.record_error(range, "#else without #ifdef or #ifndef"),
            Some(true) => self.record_error(range, "#else after #else"),
            Some(false) => {
                let conditional = self
                    .conditionals
                    .last_mut()
                    .expect("BUG: conditional checked above");
                conditional.seen_else = true;
                conditional.taking = !conditional.taking;
            }
        }
    }

    pub(crate) fn conditional_endif(&mut self, range: Range) {
        if self.conditionals.pop().is_none() {
            self.record_error(range, "#endif without #ifdef or #ifndef");
        }
    }

    // ------------------------------------------------------------------
    // #include / #includestr
    // ------------------------------------------------------------------

    fn include(&mut self, directive_range: Range, raw: bool) -> Result<(), Fatal> {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('*') => self.block_comment(),
                _ => break,
            }
        }
        let delimiter = match self.peek() {
            None | Some('\n') => {
                return Err(self.fatal(directive_range, "File path missing"));
            }
            Some(c) => c,
        };
        let delimiter_pos = self.cur_pos();
        if delimiter != '"' {
            self.record_warning(
                Range::at(delimiter_pos),
                format!("‘{delimiter}’ instead of ‘\"’ used to enclose file path"),
            );
        }
        self.bump();
        let mut path_text = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    if raw {
                        let range = self.char_range(delimiter_pos);
                        self.record_error(range, format!("Missing terminating ‘{delimiter}’"));
                        return Ok(());
                    }
                    return Err(self.fatal(
                        Range::at(delimiter_pos),
                        format!("Missing terminating ‘{delimiter}’"),
                    ));
                }
                Some(c) if c == delimiter => {
                    self.bump();
                    break;
                }
                Some(c) => {
                    path_text.push(c);
                    self.bump();
                }
            }
        }
        let path_text = self.expand_in_path(path_text);
        let Some(resolved) = self.resolve_include(&path_text) else {
            return Err(self.fatal(
                Range::at(delimiter_pos),
                format!("‘{path_text}’ file not found"),
            ));
        };
        let depth = self.frames.iter().filter(|frame| frame.is_include()).count();
        if depth >= INCLUDE_DEPTH_LIMIT {
            return Err(self.fatal(
                Range::at(delimiter_pos),
                "#include or #includestr nested too deeply",
            ));
        }
        let Ok(text) = std::fs::read_to_string(&resolved) else {
            return Err(self.fatal(
                Range::at(delimiter_pos),
                format!("‘{path_text}’ file not found"),
            ));
        };
        tracing::debug!(path = %resolved.display(), raw, "including file");
        let file_id = self.source_map.add_file(resolved.clone());
        if raw {
            // Spliced without preprocessing; the source map still
            // advances through the file.
            let mut pos = Position::default();
            for c in text.chars() {
                self.emit(c, pos, Some(file_id));
                pos.advance(c);
            }
        } else {
            self.frame_dirs.push(
                resolved
                    .parent()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(".")),
            );
            self.frames.push(Frame {
                chars: Rc::new(text.chars().collect()),
                idx: 0,
                pos: Position::default(),
                fixed: false,
                file: Some(file_id),
                diag_path: Some(resolved),
                kind: FrameKind::Include,
            });
        }
        Ok(())
    }

    /// Substitute `$NAME` object-like macro uses inside an include path.
    fn expand_in_path(&self, text: String) -> String {
        if !text.contains('$') {
            return text;
        }
        let chars: Vec<char> = text.chars().collect();
        let mut result = String::new();
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == '$' {
                let mut j = i + 1;
                let mut name = String::new();
                if j < chars.len() && crate::macros::is_name_start(chars[j]) {
                    while j < chars.len() && crate::macros::is_name_continue(chars[j]) {
                        name.push(chars[j]);
                        j += 1;
                    }
                }
                match self.lookup(&name) {
                    Some(mac) if !mac.is_function_like() => {
                        result.push_str(&mac.body);
                        i = j;
                        continue;
                    }
                    _ => {}
                }
            }
            result.push(chars[i]);
            i += 1;
        }
        result
    }

    /// Search order: as given, then directories of active include
    /// frames (innermost first), then current directories, then
    /// include directories. A path naming a directory does not count.
    fn resolve_include(&self, path_text: &str) -> Option<PathBuf> {
        let given = PathBuf::from(path_text);
        let mut candidates = vec![given.clone()];
        if given.is_relative() {
            for dir in self.frame_dirs.iter().rev() {
                candidates.push(dir.join(&given));
            }
            for dir in &self.options.current_directories {
                candidates.push(dir.join(&given));
            }
            for dir in &self.options.include_directories {
                candidates.push(dir.join(&given));
            }
        }
        candidates.into_iter().find(|candidate| candidate.is_file())
    }
}
