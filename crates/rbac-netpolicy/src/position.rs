//! Source positions attached to every diagnostic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A file name and line number in the policy being compiled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePos {
    pub file: PathBuf,
    pub line: u64,
}

impl SourcePos {
    pub fn new(file: impl Into<PathBuf>, line: u64) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} of {}", self.line, self.file.display())
    }
}

/// Answers "where is the parser right now".
pub trait PositionOracle {
    fn position(&self) -> SourcePos;
}

/// Position oracle driven by the directive parser as it advances.
#[derive(Debug, Clone, Default)]
pub struct SourceCursor {
    file: PathBuf,
    line: u64,
}

impl SourceCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches to a new policy file, resetting the line to zero.
    pub fn enter_file(&mut self, file: impl AsRef<Path>) {
        self.file = file.as_ref().to_path_buf();
        self.line = 0;
    }

    pub fn set_line(&mut self, line: u64) {
        self.line = line;
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn line(&self) -> u64 {
        self.line
    }
}

impl PositionOracle for SourceCursor {
    fn position(&self) -> SourcePos {
        SourcePos::new(self.file.clone(), self.line)
    }
}
