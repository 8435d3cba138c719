//! Scanning frames.
//!
//! The preprocessor never recurses on the host stack: macro expansion,
//! file inclusion, and score-loop iteration each push a frame onto an
//! explicit stack with checked depth ceilings.

use crate::macros::Macro;
use cslint_foundation::{FileId, Position};
use std::path::PathBuf;
use std::rc::Rc;

/// What pushed a frame, and what to do when it runs out.
#[derive(Debug)]
pub(crate) enum FrameKind {
    /// The text handed to `process`.
    Root,
    /// An `#include`d file.
    Include,
    /// A macro body or argument. `saved` holds bindings shadowed in the
    /// macro table, restored when the frame pops.
    Expansion { saved: Vec<(String, Option<Macro>)> },
    /// One score loop; re-runs its body `count` times.
    Loop {
        variable: String,
        iteration: u32,
        count: u32,
        start: Position,
        saved: Vec<(String, Option<Macro>)>,
    },
}

/// One entry of the scanning stack.
#[derive(Debug)]
pub(crate) struct Frame {
    pub chars: Rc<Vec<char>>,
    pub idx: usize,
    /// Source position of `chars[idx]`.
    pub pos: Position,
    /// Expansion frames report every character at the invocation site.
    pub fixed: bool,
    /// Source-map file of this frame's text.
    pub file: Option<FileId>,
    /// Path reported on diagnostics raised in this frame.
    pub diag_path: Option<PathBuf>,
    pub kind: FrameKind,
}

impl Frame {
    pub fn root(text: &str) -> Self {
        Frame {
            chars: Rc::new(text.chars().collect()),
            idx: 0,
            pos: Position::default(),
            fixed: false,
            file: None,
            diag_path: None,
            kind: FrameKind::Root,
        }
    }

    pub fn at_end(&self) -> bool {
        self.idx >= self.chars.len()
    }

    pub fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.idx + n).copied()
    }

    /// Consume one character, tracking the source position unless the
    /// frame is position-fixed.
    pub fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.idx).copied()?;
        self.idx += 1;
        if !self.fixed {
            self.pos.advance(c);
        }
        Some(c)
    }

    pub fn is_expansion(&self) -> bool {
        matches!(self.kind, FrameKind::Expansion { .. })
    }

    pub fn is_include(&self) -> bool {
        matches!(self.kind, FrameKind::Include)
    }
}
