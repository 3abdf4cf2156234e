//! A JSON-shaped CRDT document frontend: change capture, patch
//! interpretation and document lifecycle management, independent of any
//! particular backend/merge implementation. An application builds a
//! [`Document`], mutates it through the [`MutableDocument`] view handed to
//! [`Document::change`], and folds whatever authoritative
//! [`crdt_protocol::Patch`]es arrive back through [`Document::apply_patch`].

mod backend;
mod change_context;
mod document;
mod error;
mod interpreter;
mod mutation;
mod object;
mod options;
mod path;
mod snapshot;
mod value;

pub use backend::{Backend, NullBackend};
#[cfg(any(test, feature = "test-support"))]
pub use backend::{TestBackend, TestBackendState};
pub use document::Document;
pub use error::{FrontendError, InvalidChangeRequest, InvalidInitialState, InvalidPatch};
pub use mutation::MutableDocument;
pub use options::{ActorChoice, Options, PatchObserver};
pub use path::Path;
pub use value::{Conflicts, Primitive, Value};

pub use crdt_protocol::{ActorId, ObjectId, OpId, Patch};
