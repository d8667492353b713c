use std::fmt;

use enaml_syntax::SyntaxError;
use thiserror::Error;

/// Every failure the runtime can report.
///
/// The variant names follow the categories an `.enaml` author already knows
/// from the host language (`NameError`, `AttributeError`, ...). Evaluation
/// failures raised inside a bound expression are wrapped in
/// [`Error::Located`] so the source line survives propagation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("NameError: {0}")]
    Name(String),

    #[error("AttributeError: {0}")]
    Attribute(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("ValueError: {0}")]
    Value(String),

    #[error("ImportError: {0}")]
    Import(String),

    #[error("IndexError: {0}")]
    Index(String),

    #[error("KeyError: {0}")]
    Key(String),

    #[error("ZeroDivisionError: {0}")]
    ZeroDivision(String),

    #[error("ValidationError: {0}")]
    Validation(String),

    #[error("OperatorLookupError: {0}")]
    OperatorLookup(String),

    #[error("ToolkitError: {0}")]
    Toolkit(String),

    #[error("VMError: {0}")]
    Vm(String),

    #[error("RecursionError: {0}")]
    Recursion(String),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("line {line}: {error}")]
    Located { line: usize, error: Box<Error> },

    /// Failures raised by embedder callbacks.
    #[error(transparent)]
    Host(#[from] anyhow::Error),
}

/// The category of an [`Error`], looking through [`Error::Located`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Name,
    Attribute,
    Type,
    Value,
    Import,
    Index,
    Key,
    ZeroDivision,
    Validation,
    OperatorLookup,
    Toolkit,
    Vm,
    Recursion,
    Syntax,
    Host,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Name(_) => ErrorKind::Name,
            Error::Attribute(_) => ErrorKind::Attribute,
            Error::Type(_) => ErrorKind::Type,
            Error::Value(_) => ErrorKind::Value,
            Error::Import(_) => ErrorKind::Import,
            Error::Index(_) => ErrorKind::Index,
            Error::Key(_) => ErrorKind::Key,
            Error::ZeroDivision(_) => ErrorKind::ZeroDivision,
            Error::Validation(_) => ErrorKind::Validation,
            Error::OperatorLookup(_) => ErrorKind::OperatorLookup,
            Error::Toolkit(_) => ErrorKind::Toolkit,
            Error::Vm(_) => ErrorKind::Vm,
            Error::Recursion(_) => ErrorKind::Recursion,
            Error::Syntax(_) => ErrorKind::Syntax,
            Error::Located { error, .. } => error.kind(),
            Error::Host(_) => ErrorKind::Host,
        }
    }

    /// The innermost source line attached to this error, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::Located { line, error } => error.line().or(Some(*line)),
            Error::Syntax(e) => Some(e.line),
            _ => None,
        }
    }

    /// Attaches `line` unless the error already carries one.
    pub fn at_line(self, line: usize) -> Error {
        match self {
            located @ (Error::Located { .. } | Error::Syntax(_)) => located,
            error => Error::Located { line, error: Box::new(error) },
        }
    }

    /// The error with every location wrapper removed.
    pub fn root(&self) -> &Error {
        match self {
            Error::Located { error, .. } => error.root(),
            other => other,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_looks_through_location() {
        let err = Error::Name("x".into()).at_line(4);
        assert_eq!(err.kind(), ErrorKind::Name);
        assert_eq!(err.line(), Some(4));
    }

    #[test]
    fn at_line_keeps_the_first_location() {
        let err = Error::Type("bad".into()).at_line(2).at_line(9);
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn display_uses_python_style_prefix() {
        let err = Error::Attribute("`x` is not an attribute on the Field object".into());
        assert_eq!(err.to_string(), "AttributeError: `x` is not an attribute on the Field object");
        assert_eq!(Error::Value("v".into()).at_line(3).to_string(), "line 3: ValueError: v");
    }
}
