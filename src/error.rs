//! Error types for the motion engine.
//!
//! Parsing is mostly infallible: malformed arrays and calls become
//! [`Diagnostic`](crate::parser::Diagnostic)s, and only input that cannot be
//! read as a motion script at all yields a [`ParseError`]. The remaining
//! errors guard editor operations and the single-writer protocol on
//! [`JointState`](crate::state::JointState).

use crate::sequence::BlockId;
use crate::state::Controller;
use std::path::PathBuf;
use thiserror::Error;

/// The input could not be read as a motion script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The bytes are not UTF-8 text.
    #[error("input is not UTF-8 text (invalid byte at offset {offset})")]
    NotText { offset: usize },

    /// No pose-update call appears anywhere in the text.
    #[error("no call to any of [{}] found", expected.join(", "))]
    NoPoseCalls { expected: Vec<String> },
}

/// A single array element that could not be evaluated. The parser records it
/// as a diagnostic and uses `0.0` for the cell.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("empty expression")]
    Empty,

    #[error("unknown constant `{0}`")]
    UnknownConstant(String),

    #[error("unexpected `{0}`")]
    Unexpected(String),

    #[error("unbalanced parenthesis")]
    UnbalancedParen,

    #[error("division by zero")]
    DivisionByZero,

    #[error("parentheses nested deeper than {0}")]
    TooDeep(usize),
}

/// A rejected editor operation on a [`MotionSequence`](crate::sequence::MotionSequence).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("no block with id `{0}`")]
    UnknownBlock(BlockId),

    /// Sentinel blocks cannot be removed, duplicated, moved, or have their
    /// pose, name or nonlinearity edited.
    #[error("block `{0}` is a system block")]
    SystemBlock(BlockId),

    /// A block list that does not start with `init` and end with `shutdown`,
    /// or carries a sentinel anywhere else.
    #[error("sequence must start with `init`, end with `shutdown`, and hold each exactly once")]
    SentinelsMisplaced,

    /// The destination index would displace a sentinel.
    #[error("index {index} is outside the editable range 1..={last}")]
    OutOfRange { index: usize, last: usize },

    /// A stored user id is `u32::MAX`, leaving no id to allocate after it.
    #[error("block ids are exhausted")]
    IdsExhausted,
}

/// Violation of the single-writer protocol on the shared joint state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OwnershipError {
    #[error("{requested:?} cannot take the joint state while {holder:?} holds it")]
    Contended {
        holder: Controller,
        requested: Controller,
    },

    #[error("{0:?} wrote the joint state without holding it")]
    NotHolder(Controller),
}

/// A custom generator template is missing a required placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template is missing the `{0}` placeholder")]
    MissingPlaceholder(&'static str),
}

/// Failure to load an [`EditorConfig`](crate::config::EditorConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}
