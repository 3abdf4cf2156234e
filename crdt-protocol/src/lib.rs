//! Wire types for a JSON-shaped CRDT: the identifiers, scalar values, and
//! operation/patch shapes that a frontend emits to, and receives from, a
//! backend. This crate carries no logic beyond parsing, formatting, and
//! Lamport ordering; the frontend interprets these types.

mod actor_id;
mod change;
mod diff;
mod error;
mod key;
mod object_id;
mod op;
mod value;

pub use actor_id::ActorId;
pub use change::{Change, ChangeHash};
pub use diff::{Diff, DiffEdit, DiffValue, Patch};
pub use error::{InvalidActorId, InvalidElementId, InvalidObjectId, InvalidOpId};
pub use key::{ElementId, Key};
pub use object_id::ObjectId;
pub use op::{Op, OpId, OpType, SortedVec};
pub use value::{DataType, ObjType, ScalarValue};
