//! Compilation error type.
//!
//! Every failure in the pipeline is fatal; the first error terminates
//! compilation. Errors carry the source position they were detected at so
//! the driver can point diagnostics at the right line and column.

use crate::token::Pos;
use std::fmt;

/// A fatal compilation error.
///
/// `pos` is `None` for system-level failures (I/O, subprocess) that have no
/// meaningful source position.
#[derive(Debug)]
pub struct CompileError {
    pub pos: Option<Pos>,
    pub message: String,
}

impl CompileError {
    /// An error pinned to a source position.
    pub fn at(pos: Pos, message: impl Into<String>) -> Self {
        CompileError {
            pos: Some(pos),
            message: message.into(),
        }
    }

    /// A positionless system error.
    pub fn system(message: impl Into<String>) -> Self {
        CompileError {
            pos: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pos {
            Some(pos) => write!(f, "{}: {}", pos, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<std::fmt::Error> for CompileError {
    fn from(e: std::fmt::Error) -> Self {
        CompileError::system(format!("listing generation error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_position() {
        let err = CompileError::at(Pos::new(3, 7), "number too large");
        assert_eq!(err.to_string(), "3:7: number too large");
    }

    #[test]
    fn test_display_without_position() {
        let err = CompileError::system("JASMIN_JAR is not set");
        assert_eq!(err.to_string(), "JASMIN_JAR is not set");
    }
}
