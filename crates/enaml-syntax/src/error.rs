use std::fmt;

use thiserror::Error;

/// The two flavours of source-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    /// Malformed tokens, unterminated literals, grammar violations.
    Syntax,
    /// Inconsistent block structure.
    Indentation,
}

impl fmt::Display for SyntaxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxErrorKind::Syntax => f.write_str("syntax error"),
            SyntaxErrorKind::Indentation => f.write_str("indentation error"),
        }
    }
}

/// An error raised while lexing or parsing `.enaml` source.
///
/// Always fatal to the current parse. Carries the 1-based line at which the
/// problem was detected so tooling can point back into the source.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at line {line}: {message}")]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub message: String,
    /// 1-based source line number where the error occurred.
    pub line: usize,
}

impl SyntaxError {
    pub(crate) fn syntax(msg: impl Into<String>, line: usize) -> Self {
        Self { kind: SyntaxErrorKind::Syntax, message: msg.into(), line }
    }

    pub(crate) fn indentation(msg: impl Into<String>, line: usize) -> Self {
        Self { kind: SyntaxErrorKind::Indentation, message: msg.into(), line }
    }

    pub fn is_indentation(&self) -> bool {
        self.kind == SyntaxErrorKind::Indentation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_kind_and_line() {
        let e = SyntaxError::indentation("Unexpected indent.", 4);
        assert_eq!(e.to_string(), "indentation error at line 4: Unexpected indent.");
        assert!(e.is_indentation());
    }

    #[test]
    fn syntax_kind_is_not_indentation() {
        let e = SyntaxError::syntax("invalid syntax", 1);
        assert!(!e.is_indentation());
        assert_eq!(e.to_string(), "syntax error at line 1: invalid syntax");
    }
}
