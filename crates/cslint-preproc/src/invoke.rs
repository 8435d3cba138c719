//! Macro invocation and score-loop expansion.

use crate::frame::{Frame, FrameKind};
use crate::macros::Macro;
use crate::scanner::Preprocessor;
use crate::MACRO_EXPANSION_LIMIT;
use cslint_foundation::{Diagnostic, Fatal, FileId, Position, Range};
use std::rc::Rc;

/// One scanned invocation argument.
struct ScannedArg {
    text: String,
    range: Range,
}

impl Preprocessor<'_> {
    /// Expand a `$NAME` or `$NAME(args...)` use.
    pub(crate) fn macro_use(&mut self) -> Result<(), Fatal> {
        let start = self.cur_pos();
        let file = self.cur_file();
        self.bump();
        let Some((name, _)) = self.read_name() else {
            return Err(self.fatal(Range::at(start), "Macro name missing"));
        };
        let invocation_range = Range::new(
            start,
            Position::new(start.line, start.column + 1 + name.chars().count() as u32),
        );
        let Some(mac) = self.lookup(&name).cloned() else {
            return Err(self.fatal(invocation_range, format!("‘{name}’ macro is not defined")));
        };
        let depth = self
            .frames
            .iter()
            .filter(|frame| frame.is_expansion())
            .count();
        if depth >= MACRO_EXPANSION_LIMIT {
            return Err(self.fatal(invocation_range, "Macro expanded too deeply"));
        }
        let Some(parameters) = mac.parameter_names.clone() else {
            self.push_expansion(mac.body.clone(), start, file, Vec::new());
            return Ok(());
        };
        if self.peek() != Some('(') {
            return Err(self.fatal_with_definition(
                Range::at(self.cur_pos()),
                "Too few arguments provided to function-like macro",
                &mac,
            ));
        }
        self.bump();
        let Some((args, close_pos)) = self.scan_arguments()? else {
            // Input ended inside the argument list; the string scanners
            // already recorded what went wrong.
            return Ok(());
        };
        if args.len() > parameters.len() {
            let extra = &args[parameters.len()];
            return Err(self.fatal_with_definition(
                extra.range,
                "Too many arguments provided to function-like macro",
                &mac,
            ));
        }
        if args.len() < parameters.len() {
            return Err(self.fatal_with_definition(
                Range::at(close_pos),
                "Too few arguments provided to function-like macro",
                &mac,
            ));
        }
        let bindings = parameters
            .iter()
            .zip(args)
            .map(|(parameter, arg)| {
                (
                    parameter.clone(),
                    Macro {
                        name: parameter.clone(),
                        parameter_names: None,
                        body: arg.text,
                        range: arg.range,
                        file: self.diag_path(),
                    },
                )
            })
            .collect();
        self.push_expansion(mac.body.clone(), start, file, bindings);
        Ok(())
    }

    fn fatal_with_definition(
        &self,
        range: Range,
        excerpt: impl Into<String>,
        mac: &Macro,
    ) -> Fatal {
        let mut trace = Diagnostic::info(mac.range, format!("Macro ‘{}’ defined here", mac.name));
        if let Some(path) = &mac.file {
            trace = trace.with_file(path);
        }
        let Fatal(diagnostic) = self.fatal(range, excerpt);
        Fatal(diagnostic.with_trace(trace))
    }

    fn push_expansion(
        &mut self,
        body: String,
        at: Position,
        file: Option<FileId>,
        bindings: Vec<(String, Macro)>,
    ) {
        let mut saved = Vec::new();
        for (name, binding) in bindings {
            saved.push((name.clone(), self.bindings.insert(name, binding)));
        }
        let diag_path = self.diag_path();
        self.frames.push(Frame {
            chars: Rc::new(body.chars().collect()),
            idx: 0,
            pos: at,
            fixed: true,
            file,
            diag_path,
            kind: FrameKind::Expansion { saved },
        });
    }

    /// Scan `...)` after the opening parenthesis of an invocation.
    ///
    /// Arguments are separated by `'` (or the deprecated `#`); `,` is
    /// ordinary argument text. Parentheses balance, `\)` escapes a
    /// literal `)`, and quoted/braced strings are scanned so their
    /// delimiters do not confuse the balance. `Ok(None)` means the input
    /// ended mid-list with the problem already recorded.
    fn scan_arguments(&mut self) -> Result<Option<(Vec<ScannedArg>, Position)>, Fatal> {
        let mut args = Vec::new();
        let mut text = String::new();
        let mut start = self.cur_pos();
        let mut balance = 0usize;
        loop {
            match self.peek() {
                None => return Ok(None),
                Some('"') => {
                    if !self.scan_quoted_argument(&mut text) {
                        return Ok(None);
                    }
                }
                Some('{') if self.peek_at(1) == Some('{') => {
                    if !self.scan_braced_argument(&mut text) {
                        return Ok(None);
                    }
                }
                Some('\\') if self.peek_at(1) == Some(')') => {
                    self.bump();
                    self.bump();
                    text.push(')');
                }
                Some('(') => {
                    self.bump();
                    text.push('(');
                    balance += 1;
                }
                Some(')') if balance > 0 => {
                    self.bump();
                    text.push(')');
                    balance -= 1;
                }
                Some(')') => {
                    let close = self.cur_pos();
                    self.bump();
                    args.push(ScannedArg {
                        text,
                        range: Range::new(start, close),
                    });
                    return Ok(Some((args, close)));
                }
                Some('\'') if balance == 0 => {
                    let end = self.cur_pos();
                    self.bump();
                    args.push(ScannedArg {
                        text: std::mem::take(&mut text),
                        range: Range::new(start, end),
                    });
                    start = self.cur_pos();
                }
                Some('#') if balance == 0 => {
                    let range = self.char_range(self.cur_pos());
                    self.record_warning(
                        range,
                        "‘#’ instead of single quote used to separate macro parameters",
                    );
                    self.bump();
                    args.push(ScannedArg {
                        text: std::mem::take(&mut text),
                        range: Range::new(start, range.start),
                    });
                    start = self.cur_pos();
                }
                Some(c) => {
                    self.bump();
                    text.push(c);
                }
            }
        }
    }

    /// Copy a quoted string into an argument, flagging unescaped `)`.
    fn scan_quoted_argument(&mut self, text: &mut String) -> bool {
        let open = self.cur_pos();
        self.bump();
        text.push('"');
        loop {
            match self.peek() {
                None | Some('\n') => {
                    let range = self.char_range(open);
                    self.record_error(range, "Missing terminating ‘\"’");
                    return false;
                }
                Some('"') => {
                    self.bump();
                    text.push('"');
                    return true;
                }
                Some(')') => {
                    self.unescaped_paren();
                    text.push(')');
                }
                Some('\\') if self.peek_at(1) == Some(')') => {
                    self.bump();
                    self.bump();
                    text.push(')');
                }
                Some('\\') => {
                    self.bump();
                    text.push('\\');
                    if let Some(c) = self.peek() {
                        self.bump();
                        text.push(c);
                    }
                }
                Some(c) => {
                    self.bump();
                    text.push(c);
                }
            }
        }
    }

    /// Copy a braced string into an argument, flagging unescaped `)`.
    fn scan_braced_argument(&mut self, text: &mut String) -> bool {
        let open = self.cur_pos();
        self.bump();
        self.bump();
        text.push_str("{{");
        loop {
            match self.peek() {
                None => {
                    let range = Range::new(open, Position::new(open.line, open.column + 2));
                    self.record_error(range, "Missing terminating ‘}}’");
                    return false;
                }
                Some('}') if self.peek_at(1) == Some('}') => {
                    self.bump();
                    self.bump();
                    text.push_str("}}");
                    return true;
                }
                Some(')') => {
                    self.unescaped_paren();
                    text.push(')');
                }
                Some('\\') if self.peek_at(1) == Some(')') => {
                    self.bump();
                    self.bump();
                    text.push(')');
                }
                Some(c) => {
                    self.bump();
                    text.push(c);
                }
            }
        }
    }

    /// Record the escape-me error for a `)` inside a string argument,
    /// with the replacement solution.
    fn unescaped_paren(&mut self) {
        let range = self.char_range(self.cur_pos());
        let diagnostic =
            Diagnostic::error(range, "‘)’ must be replaced with ‘\\)’").with_solution(range, "\\)");
        self.record(diagnostic);
        self.bump();
    }

    // ------------------------------------------------------------------
    // Score loops
    // ------------------------------------------------------------------

    /// Expand `{ N VAR ... }`: the body repeats N times with `$VAR`
    /// bound to the 1-based iteration index.
    pub(crate) fn score_loop(&mut self) -> Result<(), Fatal> {
        let brace = self.cur_pos();
        self.bump();
        self.skip_spaces();
        let digit_start = self.cur_pos();
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            digits.push(c);
            self.bump();
        }
        if digits.is_empty() {
            return Err(self.fatal(
                Range::at(self.cur_pos()),
                "Expected integer greater than 0",
            ));
        }
        let count: u32 = digits.parse().unwrap_or(0);
        if count == 0 {
            return Err(self.fatal(Range::at(digit_start), "Expected integer greater than 0"));
        }
        self.skip_spaces();
        let Some((variable, _)) = self.read_name() else {
            return Err(self.fatal(Range::at(self.cur_pos()), "Expected macro name"));
        };
        self.skip_spaces();
        match self.peek() {
            Some('\n') => {
                self.bump();
            }
            None => {
                let range = self.char_range(brace);
                self.record_error(range, "Missing terminating ‘}’");
                return Ok(());
            }
            Some(_) => {
                return Err(self.fatal(Range::at(self.cur_pos()), "Expected newline"));
            }
        }
        let body_start = self.cur_pos();
        let file = self.cur_file();
        let Some(body) = self.scan_loop_body(brace) else {
            return Ok(());
        };
        let diag_path = self.diag_path();
        let binding = Macro {
            name: variable.clone(),
            parameter_names: None,
            body: "1".into(),
            range: Range::at(body_start),
            file: diag_path.clone(),
        };
        let saved = vec![(variable.clone(), self.bindings.insert(variable.clone(), binding))];
        let fixed = self.frame().fixed;
        self.frames.push(Frame {
            chars: Rc::new(body),
            idx: 0,
            pos: body_start,
            fixed,
            file,
            diag_path,
            kind: FrameKind::Loop {
                variable,
                iteration: 1,
                count,
                start: body_start,
                saved,
            },
        });
        Ok(())
    }

    /// Collect the loop body up to the matching `}`. Nested loops and
    /// braced strings are carried along verbatim; they are interpreted
    /// when the body frames are scanned.
    fn scan_loop_body(&mut self, brace: Position) -> Option<Vec<char>> {
        let mut body = Vec::new();
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => {
                    let range = self.char_range(brace);
                    self.record_error(range, "Missing terminating ‘}’");
                    return None;
                }
                Some('{') if self.peek_at(1) == Some('{') => {
                    body.push('{');
                    body.push('{');
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            None => {
                                let range = self.char_range(brace);
                                self.record_error(range, "Missing terminating ‘}’");
                                return None;
                            }
                            Some('}') if self.peek_at(1) == Some('}') => {
                                body.push('}');
                                body.push('}');
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(c) => {
                                body.push(c);
                                self.bump();
                            }
                        }
                    }
                }
                Some('{') => {
                    body.push('{');
                    self.bump();
                    depth += 1;
                }
                Some('}') if depth == 0 => {
                    self.bump();
                    return Some(body);
                }
                Some('}') => {
                    body.push('}');
                    self.bump();
                    depth -= 1;
                }
                Some(c) => {
                    body.push(c);
                    self.bump();
                }
            }
        }
    }
}
