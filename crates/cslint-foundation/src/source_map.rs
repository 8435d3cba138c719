//! Output→source position mapping.
//!
//! The preprocessor rewrites text (macro expansion, inclusion, comment
//! stripping), so positions in its output no longer line up with the
//! original files. As it emits characters it records breakpoints here;
//! later stages translate any output position back to an original
//! `(file, position)` pair, including the position one past the last
//! character.
//!
//! # Design
//!
//! - `Breakpoint` — `(output, source, file)` triple, monotonically
//!   increasing in output position; appended only where the mapping stops
//!   being a straight same-line copy
//! - lookup is a binary search by output position followed by a column
//!   delta, so interior positions and end-of-line/end-of-input positions
//!   resolve without their own breakpoints

use crate::position::{Position, Range};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Index into the source map's interned file table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Breakpoint {
    output: Position,
    source: Position,
    file: Option<FileId>,
}

/// Bidirectional mapping between preprocessor output and original source.
///
/// Breakpoints are appended during preprocessing (monotonic in output
/// position); lookups never mutate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMap {
    breakpoints: Vec<Breakpoint>,
    files: Vec<PathBuf>,
}

impl SourceMap {
    /// Create an empty source map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern an included file's path and return its id.
    pub fn add_file(&mut self, path: PathBuf) -> FileId {
        debug_assert!(self.files.len() < u16::MAX as usize, "too many source files");
        let id = FileId(self.files.len() as u16);
        self.files.push(path);
        id
    }

    /// Path for an interned file id.
    pub fn file_path(&self, id: FileId) -> &Path {
        &self.files[id.0 as usize]
    }

    /// Record that the character at `output` came from `source` in `file`.
    ///
    /// Appends a breakpoint only when the pair does not linearly extend
    /// the previous one on the same line, so lockstep copying costs one
    /// breakpoint per output line.
    pub fn record(&mut self, output: Position, source: Position, file: Option<FileId>) {
        if let Some(last) = self.breakpoints.last() {
            debug_assert!(last.output <= output, "output positions must be monotonic");
            if last.file == file
                && last.output.line == output.line
                && last.source.line == source.line
                && output.column >= last.output.column
                && output.column - last.output.column == source.column - last.source.column
            {
                return;
            }
        }
        self.breakpoints.push(Breakpoint {
            output,
            source,
            file,
        });
    }

    /// Translate an output position to `(file, source position)`.
    ///
    /// Positions before the first breakpoint (or in an empty map) are
    /// returned unchanged, which makes an identity map the natural
    /// default when no preprocessing happened.
    pub fn source_location(&self, output: Position) -> (Option<FileId>, Position) {
        let idx = self
            .breakpoints
            .partition_point(|breakpoint| breakpoint.output <= output);
        if idx == 0 {
            return (None, output);
        }
        let breakpoint = &self.breakpoints[idx - 1];
        let source = if output.line == breakpoint.output.line {
            Position::new(
                breakpoint.source.line,
                breakpoint.source.column + (output.column - breakpoint.output.column),
            )
        } else {
            // No breakpoint on the queried line; the mapping past the
            // last known line keeps the line offset.
            Position::new(
                breakpoint.source.line + (output.line - breakpoint.output.line),
                output.column,
            )
        };
        (breakpoint.file, source)
    }

    /// Translate an output position, dropping the file.
    pub fn source_position(&self, output: Position) -> Position {
        self.source_location(output).1
    }

    /// Translate an output range to a source range.
    ///
    /// Start and end translate independently; for a range spliced from an
    /// include boundary the start's file wins.
    pub fn source_range(&self, output: Range) -> Range {
        Range {
            start: self.source_position(output.start),
            end: self.source_position(output.end),
        }
    }

    /// File owning an output position, if it came from an include.
    pub fn source_file(&self, output: Position) -> Option<&Path> {
        let (file, _) = self.source_location(output);
        file.map(|id| self.file_path(id))
    }

    /// True when no breakpoints were recorded.
    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }
}
