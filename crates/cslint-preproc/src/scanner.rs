//! The preprocessor scanning loop.
//!
//! Directive handling lives in `directives`, macro invocation and score
//! loops in `invoke`; this module owns the state, the character-level
//! lexical rules (comments, strings, line continuations, `@` expanders),
//! and conditional-branch skipping.

use crate::frame::{Frame, FrameKind};
use crate::macros::{self, Macro};
use crate::{Preprocessed, PreprocessorOptions};
use cslint_foundation::{Diagnostic, Fatal, FileId, Position, Range, SourceMap};
use indexmap::IndexMap;
use std::path::PathBuf;

/// One open `#ifdef`/`#ifndef`.
#[derive(Debug)]
pub(crate) struct Conditional {
    /// Range of the opening directive, for the unterminated error.
    pub range: Range,
    pub file: Option<PathBuf>,
    pub taking: bool,
    pub seen_else: bool,
}

pub(crate) struct Preprocessor<'a> {
    pub options: &'a PreprocessorOptions,
    pub frames: Vec<Frame>,
    pub output: String,
    pub out_pos: Position,
    pub source_map: SourceMap,
    /// `#define`d macros, in definition order.
    pub macros: IndexMap<String, Macro>,
    /// Parameter and loop-variable bindings; consulted before `macros`
    /// and saved/restored as expansion frames push and pop.
    pub bindings: IndexMap<String, Macro>,
    pub messages: Vec<Diagnostic>,
    pub conditionals: Vec<Conditional>,
    /// Directories of active include frames (innermost last), searched
    /// for nested includes before the configured directories.
    pub frame_dirs: Vec<PathBuf>,
}

impl<'a> Preprocessor<'a> {
    pub fn new(text: &'a str, options: &'a PreprocessorOptions) -> Self {
        let mut frame_dirs = Vec::new();
        if let Some(parent) = options
            .file_path
            .as_ref()
            .and_then(|path| path.parent())
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            frame_dirs.push(parent.to_path_buf());
        }
        Preprocessor {
            options,
            frames: vec![Frame::root(text)],
            output: String::new(),
            out_pos: Position::default(),
            source_map: SourceMap::new(),
            macros: IndexMap::new(),
            bindings: IndexMap::new(),
            messages: Vec::new(),
            conditionals: Vec::new(),
            frame_dirs,
        }
    }

    pub fn finish(self) -> Preprocessed {
        Preprocessed {
            output: self.output,
            source_map: self.source_map,
            macros: self.macros,
            messages: self.messages,
        }
    }

    // ------------------------------------------------------------------
    // Frame and position helpers
    // ------------------------------------------------------------------

    pub fn frame(&self) -> &Frame {
        self.frames.last().expect("BUG: frame stack empty")
    }

    pub fn frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("BUG: frame stack empty")
    }

    pub fn peek(&self) -> Option<char> {
        self.frame().peek_at(0)
    }

    pub fn peek_at(&self, n: usize) -> Option<char> {
        self.frame().peek_at(n)
    }

    pub fn bump(&mut self) -> Option<char> {
        self.frame_mut().bump()
    }

    /// Source position of the next character in the current frame. At
    /// frame end this is the position one past the last character.
    pub fn cur_pos(&self) -> Position {
        self.frame().pos
    }

    pub fn cur_file(&self) -> Option<FileId> {
        self.frame().file
    }

    pub fn diag_path(&self) -> Option<PathBuf> {
        self.frame().diag_path.clone()
    }

    /// Width-1 range at `pos`. Directive positions never span newlines.
    pub fn char_range(&self, pos: Position) -> Range {
        Range::new(pos, Position::new(pos.line, pos.column + 1))
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    pub fn emit(&mut self, c: char, source: Position, file: Option<FileId>) {
        self.source_map.record(self.out_pos, source, file);
        self.output.push(c);
        self.out_pos.advance(c);
    }

    /// Emit the next character of the current frame verbatim.
    pub fn emit_next(&mut self) {
        let source = self.cur_pos();
        let file = self.cur_file();
        if let Some(c) = self.bump() {
            self.emit(c, source, file);
        }
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    fn located(&self, mut diagnostic: Diagnostic) -> Diagnostic {
        if let Some(path) = self.diag_path() {
            diagnostic = diagnostic.with_file(path);
        }
        diagnostic
    }

    pub fn record_error(&mut self, range: Range, excerpt: impl Into<String>) {
        let diagnostic = self.located(Diagnostic::error(range, excerpt));
        self.messages.push(diagnostic);
    }

    pub fn record_warning(&mut self, range: Range, excerpt: impl Into<String>) {
        let diagnostic = self.located(Diagnostic::warning(range, excerpt));
        self.messages.push(diagnostic);
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        let diagnostic = self.located(diagnostic);
        self.messages.push(diagnostic);
    }

    pub fn fatal(&self, range: Range, excerpt: impl Into<String>) -> Fatal {
        Fatal(self.located(Diagnostic::error(range, excerpt)))
    }

    // ------------------------------------------------------------------
    // Main loop
    // ------------------------------------------------------------------

    pub fn run(&mut self) -> Result<(), Fatal> {
        loop {
            if self.frame().at_end() {
                if self.pop_frame() {
                    continue;
                }
                break;
            }
            if self.skipping() {
                self.scan_skipped();
                continue;
            }
            let c = self.peek().expect("BUG: frame checked non-empty");
            match c {
                '\\' => self.backslash(),
                ';' => self.line_comment(),
                '/' if self.peek_at(1) == Some('/') => self.line_comment(),
                '/' if self.peek_at(1) == Some('*') => self.block_comment(),
                '"' => self.quoted_string(),
                '{' if self.peek_at(1) == Some('{') => self.braced_string(),
                '{' if self.options.is_score => self.score_loop()?,
                '#' => self.hash()?,
                '@' => self.power_of_two()?,
                '$' => self.macro_use()?,
                _ => self.emit_next(),
            }
        }
        // Conditionals left open at end of input.
        let unterminated: Vec<Conditional> = self.conditionals.drain(..).collect();
        for conditional in unterminated {
            let mut diagnostic =
                Diagnostic::error(conditional.range, "Unterminated conditional directive");
            if let Some(path) = conditional.file {
                diagnostic = diagnostic.with_file(path);
            }
            self.messages.push(diagnostic);
        }
        Ok(())
    }

    /// Handle the end of the current frame. Returns false when the root
    /// frame is done.
    fn pop_frame(&mut self) -> bool {
        // Loop frames rewind for their next iteration instead of popping.
        let rebind = {
            let frame = self.frame_mut();
            match &mut frame.kind {
                FrameKind::Root => return false,
                FrameKind::Loop {
                    variable,
                    iteration,
                    count,
                    start,
                    ..
                } if *iteration < *count => {
                    *iteration += 1;
                    frame.idx = 0;
                    frame.pos = *start;
                    Some((
                        variable.clone(),
                        iteration.to_string(),
                        *start,
                        frame.diag_path.clone(),
                    ))
                }
                _ => None,
            }
        };
        if let Some((name, body, start, file)) = rebind {
            self.bindings.insert(
                name.clone(),
                Macro {
                    name,
                    parameter_names: None,
                    body,
                    range: Range::at(start),
                    file,
                },
            );
            return true;
        }
        let frame = self.frames.pop().expect("BUG: frame stack empty");
        match frame.kind {
            FrameKind::Expansion { saved } | FrameKind::Loop { saved, .. } => {
                self.restore_bindings(saved);
            }
            FrameKind::Include => {
                self.frame_dirs.pop();
            }
            FrameKind::Root => unreachable!("root handled above"),
        }
        true
    }

    pub fn restore_bindings(&mut self, saved: Vec<(String, Option<Macro>)>) {
        for (name, previous) in saved.into_iter().rev() {
            match previous {
                Some(binding) => {
                    self.bindings.insert(name, binding);
                }
                None => {
                    self.bindings.shift_remove(&name);
                }
            }
        }
    }

    /// Look up a macro use: bindings (parameters, loop variables) shadow
    /// the macro table.
    pub fn lookup(&self, name: &str) -> Option<&Macro> {
        self.bindings.get(name).or_else(|| self.macros.get(name))
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    // ------------------------------------------------------------------
    // Conditional skipping
    // ------------------------------------------------------------------

    pub fn skipping(&self) -> bool {
        self.conditionals.iter().any(|c| !c.taking)
    }

    /// Scan one construct while inside a skipped branch: nothing is
    /// emitted and only conditional directives are interpreted.
    fn scan_skipped(&mut self) {
        match self.peek() {
            Some(';') => self.skip_line_comment(),
            Some('/') if self.peek_at(1) == Some('/') => self.skip_line_comment(),
            Some('/') if self.peek_at(1) == Some('*') => self.skip_block_comment(),
            Some('#') => {
                if !self.hash_skipped() {
                    self.bump();
                }
            }
            _ => {
                self.bump();
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_block_comment(&mut self) {
        self.bump();
        self.bump();
        while let Some(c) = self.peek() {
            if c == '*' && self.peek_at(1) == Some('/') {
                self.bump();
                self.bump();
                return;
            }
            self.bump();
        }
    }

    // ------------------------------------------------------------------
    // Lexical handling
    // ------------------------------------------------------------------

    /// Try to consume a line continuation at the current backslash.
    ///
    /// A backslash directly followed by a newline joins the lines; with
    /// only whitespace or a `;` comment in between it still joins but
    /// warns, anchored at the backslash. Returns false when the
    /// backslash is not a continuation.
    pub fn try_line_continuation(&mut self) -> bool {
        debug_assert_eq!(self.peek(), Some('\\'));
        let mut n = 1;
        while matches!(self.peek_at(n), Some(' ') | Some('\t') | Some('\r')) {
            n += 1;
        }
        if self.peek_at(n) == Some(';') {
            while !matches!(self.peek_at(n), Some('\n') | None) {
                n += 1;
            }
        }
        match self.peek_at(n) {
            Some('\n') => {
                if n > 1 {
                    let range = self.char_range(self.cur_pos());
                    self.record_warning(
                        range,
                        "Line continuation is not followed immediately by newline",
                    );
                }
                for _ in 0..=n {
                    self.bump();
                }
                true
            }
            None if n == 1 => {
                // Trailing backslash at end of input continues nothing.
                self.bump();
                true
            }
            _ => false,
        }
    }

    fn backslash(&mut self) {
        if !self.try_line_continuation() {
            self.emit_next();
        }
    }

    fn line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    /// Consume a `/* ... */` comment, emitting a single space.
    ///
    /// Also used inside directives, where comments may separate the
    /// directive's parts.
    pub fn block_comment(&mut self) {
        let start = self.cur_pos();
        let file = self.cur_file();
        self.bump();
        self.bump();
        let mut terminated = false;
        while let Some(c) = self.peek() {
            if c == '*' && self.peek_at(1) == Some('/') {
                self.bump();
                self.bump();
                terminated = true;
                break;
            }
            if c == '/' && self.peek_at(1) == Some('*') {
                let inner = self.cur_pos();
                let range = Range::new(inner, Position::new(inner.line, inner.column + 2));
                self.record_warning(range, "‘/*’ in block comment");
                self.bump();
                self.bump();
                continue;
            }
            self.bump();
        }
        if !terminated {
            let range = Range::new(start, self.cur_pos());
            self.record_error(range, "Unterminated block comment");
        }
        self.emit(' ', start, file);
    }

    /// Recognized string escape sequences; anything else warns and
    /// passes through unchanged.
    fn is_known_escape(c: char) -> bool {
        matches!(
            c,
            'a' | 'b' | 'f' | 'n' | 'r' | 't' | 'v' | '"' | '\\' | '\'' | '0'..='7'
        )
    }

    /// Emit a backslash escape from inside a string, warning on unknown
    /// sequences. The backslash has not been consumed yet.
    fn string_escape(&mut self) {
        let start = self.cur_pos();
        self.emit_next();
        match self.peek() {
            Some(c) => {
                if !Self::is_known_escape(c) {
                    let range = Range::new(start, Position::new(start.line, start.column + 2));
                    self.record_warning(range, format!("Unknown escape sequence ‘\\{c}’"));
                }
                self.emit_next();
            }
            None => {}
        }
    }

    fn quoted_string(&mut self) {
        let open = self.cur_pos();
        self.emit_next();
        loop {
            match self.peek() {
                None => {
                    let range = self.char_range(open);
                    self.record_error(range, "Missing terminating ‘\"’");
                    return;
                }
                Some('\n') => {
                    // The newline is dropped from the output so the
                    // string does not leak onto the next line.
                    let range = self.char_range(open);
                    self.record_error(range, "Missing terminating ‘\"’");
                    self.bump();
                    return;
                }
                Some('"') => {
                    self.emit_next();
                    return;
                }
                Some('\\') => {
                    if !self.try_line_continuation() {
                        self.string_escape();
                    }
                }
                Some('$') => self.expand_in_string(),
                Some(_) => self.emit_next(),
            }
        }
    }

    /// `$NAME` inside a quoted string: expanded with a warning. Only
    /// defined object-like macros and bindings substitute; anything else
    /// passes through verbatim.
    fn expand_in_string(&mut self) {
        let start = self.cur_pos();
        let file = self.cur_file();
        let mut n = 1;
        let mut name = String::new();
        if let Some(c) = self.peek_at(n) {
            if macros::is_name_start(c) {
                name.push(c);
                n += 1;
                while let Some(c) = self.peek_at(n) {
                    if !macros::is_name_continue(c) {
                        break;
                    }
                    name.push(c);
                    n += 1;
                }
            }
        }
        let is_binding = self.bindings.contains_key(&name);
        let body = match self.lookup(&name) {
            Some(mac) if !mac.is_function_like() => Some(mac.body.clone()),
            _ => None,
        };
        let Some(body) = body else {
            self.emit_next();
            return;
        };
        let end = Position::new(start.line, start.column + n as u32);
        if !is_binding {
            self.record_warning(
                Range::new(start, end),
                format!("‘{name}’ macro expanded in string"),
            );
        }
        for _ in 0..n {
            self.bump();
        }
        for c in body.chars() {
            self.emit(c, start, file);
        }
    }

    fn braced_string(&mut self) {
        let open = self.cur_pos();
        self.emit_next();
        self.emit_next();
        loop {
            match self.peek() {
                None => {
                    let range = Range::new(open, Position::new(open.line, open.column + 2));
                    self.record_error(range, "Missing terminating ‘}}’");
                    return;
                }
                Some('}') if self.peek_at(1) == Some('}') => {
                    self.emit_next();
                    self.emit_next();
                    return;
                }
                Some('\\') => self.string_escape(),
                Some(_) => self.emit_next(),
            }
        }
    }

    /// `@N` and `@@N` next-power-of-2 expanders.
    fn power_of_two(&mut self) -> Result<(), Fatal> {
        let start = self.cur_pos();
        let file = self.cur_file();
        self.bump();
        let exponent_form = self.peek() == Some('@');
        if exponent_form {
            self.bump();
        }
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            digits.push(c);
            self.bump();
        }
        if digits.is_empty() {
            return Err(self.fatal(Range::at(self.cur_pos()), "Expected integer"));
        }
        let n: u64 = digits.parse().unwrap_or(u64::MAX >> 1);
        let mut value = (n + 1).next_power_of_two();
        if exponent_form {
            value += 1;
        }
        for c in value.to_string().chars() {
            self.emit(c, start, file);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Shared directive plumbing
    // ------------------------------------------------------------------

    /// Skip whitespace, newlines, and block comments between the parts
    /// of a directive. Block comments still contribute their space.
    pub fn skip_blank(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') | Some('\n') => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('*') => self.block_comment(),
                _ => return,
            }
        }
    }

    /// Read a macro-name-shaped identifier, returning its text and range.
    pub fn read_name(&mut self) -> Option<(String, Range)> {
        let start = self.cur_pos();
        let first = self.peek()?;
        if !macros::is_name_start(first) {
            return None;
        }
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if !macros::is_name_continue(c) {
                break;
            }
            name.push(c);
            self.bump();
        }
        // Width computed textually so ranges stay meaningful inside
        // position-fixed expansion frames.
        let end = Position::new(start.line, start.column + name.chars().count() as u32);
        Some((name, Range::new(start, end)))
    }
}
