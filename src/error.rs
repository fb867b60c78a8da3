//! Error types for every stage of template compilation and execution.
//!
//! Each stage fails with its own enum so callers can tell "the template is
//! malformed" apart from "the process could not be started". [`Error`]
//! unifies them for `?` in code that drives the whole pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::exec::ExecutionResult;
use crate::parse::{Operator, QuoteState};

/// The static template text is not well-formed shell.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    /// End of input reached with a quote or substitution still open.
    #[error("unterminated {state} (opened at position {offset})")]
    Unterminated { state: QuoteState, offset: usize },

    /// A backslash with nothing left to escape.
    #[error("trailing backslash at end of input")]
    TrailingEscape,
}

/// A hole value cannot be rendered safely at its position.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A multi-word list was placed where only one word can exist.
    #[error("list value in {state} context is ambiguous; join it with an explicit separator")]
    AmbiguousMultiWordInQuotedContext { state: QuoteState },

    /// A raw hole outside plain unquoted context.
    #[error("raw value is only allowed unquoted, found in {state} context")]
    RawInQuotedContext { state: QuoteState },

    /// A hole in a construct whose quoting cannot be expressed safely.
    #[error("a value cannot be placed inside {context}")]
    UnsupportedContext { context: &'static str },

    /// The token stream refers to a hole the template does not have.
    #[error("template has no value for hole {0}")]
    MissingValue(usize),
}

/// The rendered token stream does not describe a single pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unexpected `{op}` where a command word is required")]
    UnexpectedOperator { op: Operator },

    #[error("`{op}` is missing its target")]
    MissingRedirectTarget { op: Operator },

    #[error("`{op}` expects a file descriptor number, found `{target}`")]
    InvalidDuplication { op: Operator, target: String },

    #[error("pipeline stage {stage} is empty")]
    EmptyCommand { stage: usize },

    #[error("template describes more than one pipeline")]
    MultiplePipelines,

    #[error("background commands (`&`) are not supported")]
    Background,

    #[error("`{op}` is not supported")]
    UnsupportedOperator { op: Operator },

    #[error("hole {0} was not rendered before parsing")]
    UnrenderedHole(usize),
}

/// tree-sitter-bash rejected a command line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("bash grammar unavailable: {0}")]
    Grammar(String),

    #[error("command line could not be parsed")]
    Unparsable,

    #[error("invalid shell syntax at {line}:{column} near `{near}`")]
    Invalid {
        line: usize,
        column: usize,
        near: String,
    },
}

/// A pipeline stage could not be started.
#[derive(Error, Debug)]
#[error("failed to spawn stage {stage} (`{program}`): {source}")]
pub struct SpawnError {
    pub stage: usize,
    pub program: String,
    #[source]
    pub source: io::Error,
}

/// Captured stdout is not valid in the requested encoding.
///
/// The undecoded result is kept so no output is lost.
#[derive(Error, Debug)]
#[error("captured stdout is not valid {encoding}")]
pub struct DecodeError {
    pub encoding: &'static str,
    result: Box<ExecutionResult>,
}

impl DecodeError {
    pub(crate) fn new(encoding: &'static str, result: ExecutionResult) -> Self {
        Self {
            encoding,
            result: Box::new(result),
        }
    }

    /// The execution result with raw captured bytes.
    pub fn raw(&self) -> &ExecutionResult {
        &self.result
    }

    pub fn into_raw(self) -> ExecutionResult {
        *self.result
    }
}

/// Running a parsed pipeline failed.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("unknown text encoding `{0}`")]
    UnknownEncoding(String),

    #[error("cannot open redirection target `{}`: {source}", path.display())]
    Redirect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Any failure from template to result.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl From<SpawnError> for Error {
    fn from(err: SpawnError) -> Self {
        Error::Exec(err.into())
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        Error::Exec(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
