use thiserror::Error;

/// Everything that can go wrong building a [`crate::Document`] or feeding
/// it a change/patch.
#[derive(Debug, Error, PartialEq)]
pub enum FrontendError {
    #[error("invalid initial state: {0}")]
    InvalidInitialState(#[from] InvalidInitialState),

    #[error("invalid change request: {0}")]
    InvalidChangeRequest(#[from] InvalidChangeRequest),

    #[error("invalid patch: {0}")]
    InvalidPatch(#[from] InvalidPatch),
}

/// The value handed to [`crate::Document::from`] was not a map, or one of
/// its nested values could not be represented as CRDT operations.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum InvalidInitialState {
    #[error("initial state must be a map, got {0}")]
    NotAMap(&'static str),
}

/// The closure passed to [`crate::Document::change`] tried to do something
/// the change context cannot express.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum InvalidChangeRequest {
    #[error("path {0} does not resolve to an object")]
    PathNotFound(String),

    #[error("path {0} does not resolve to a list")]
    NotAList(String),

    #[error("path {0} does not resolve to a map")]
    NotAMap(String),

    #[error("increment applied to a non-counter value at {0}")]
    NotACounter(String),

    #[error("index {index} out of bounds for list of length {len} at {path}")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },
}

/// A patch arrived that this document cannot apply: either it targets an
/// object the document has never seen, or (for a local patch from the
/// in-flight request queue) its sequence number does not match what the
/// queue expected next.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum InvalidPatch {
    #[error("patch diff referenced unknown object {0}")]
    UnknownObject(String),

    #[error("expected local patch for seq {expected}, got {actual}")]
    UnexpectedSeq { expected: u64, actual: u64 },
}
