use crate::{
    token::{Position, Spanned},
    translator::SyntaxError,
};

pub use crate::lexer::Error as LexError;

/// A fatal translation error, located in the unit it was found in.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{unit}:{position}: {kind}")]
pub struct Error {
    unit: Box<str>,
    position: Position,
    kind: ErrorKind,
}

impl Error {
    /// Resolves the span of `error` against the unit source.
    pub fn new(unit: &str, src: &str, error: Spanned<ErrorKind>) -> Error {
        Error {
            unit: unit.into(),
            position: error.span.position(src),
            kind: error.inner,
        }
    }

    /// Name of the unit (usually its file name).
    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error(transparent)]
    Lexical(#[from] LexError),
    #[error("{0} is not defined")]
    UnresolvedSymbol(Box<str>),
    /// More than 65535 items where the target counts them in a 16-bit word.
    #[error("too many {0}, the limit is 65535")]
    LimitExceeded(&'static str),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}
