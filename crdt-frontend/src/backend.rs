//! The narrow interface a CRDT backend must satisfy to drive a
//! [`crate::Document`] in "online" mode, plus two minimal implementations
//! used when no real backend is wired up: `NullBackend` (optimistic-queue
//! mode) and, under `test-support`, a deterministic `TestBackend` that
//! exercises the trait boundary without implementing real CRDT merge.
//! Grounded on the teacher's dependency on the sibling `automerge-backend`
//! crate, which this crate does not implement.

use std::collections::HashMap;

use crdt_protocol::{ActorId, Change, ChangeHash, Diff, ObjType, Patch};

/// Opaque backend state, threaded through every call so a real backend
/// can be purely functional.
pub trait Backend: Send + 'static {
    type State: Clone + Send;

    fn init() -> Self::State;

    /// Applies one local change, returning the backend's updated state,
    /// the patch the frontend should fold into its snapshot, and the
    /// bytes that would be sent over the wire (opaque to the frontend).
    fn apply_local_change(state: Self::State, change: &Change) -> (Self::State, Patch, Vec<u8>);

    /// Whether a document should call `apply_local_change` synchronously
    /// inside `change()` (true), or simply enqueue the change and wait for
    /// an authoritative patch to arrive out of band via `Document::apply_patch`
    /// (false). `NullBackend` is the only backend that overrides this.
    fn is_online() -> bool {
        true
    }
}

/// The backend-less mode: there is no adapter, so every local change is
/// simply enqueued by the document and never receives an authoritative
/// patch. Present so `Options` always has a concrete default backend type
/// even when the application drives reconciliation itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl Backend for NullBackend {
    type State = ();

    fn init() -> Self::State {}

    fn apply_local_change(_state: Self::State, _change: &Change) -> (Self::State, Patch, Vec<u8>) {
        unreachable!("NullBackend::apply_local_change must never be called; use Options without a backend")
    }

    fn is_online() -> bool {
        false
    }
}

/// A minimal in-memory stand-in for a real backend, sufficient to
/// exercise the "with backend adapter" branch of the document lifecycle
/// in tests and doc examples: it assigns sequential op ids per actor and
/// loops the submitted ops straight back as a patch, without doing any
/// real multi-actor merge.
#[derive(Debug, Clone, Default)]
pub struct TestBackend;

#[derive(Debug, Clone, Default)]
pub struct TestBackendState {
    clock: HashMap<ActorId, u64>,
    max_op: u64,
}

impl Backend for TestBackend {
    type State = TestBackendState;

    fn init() -> Self::State {
        TestBackendState::default()
    }

    fn apply_local_change(mut state: Self::State, change: &Change) -> (Self::State, Patch, Vec<u8>) {
        let seq = state.clock.get(&change.actor).copied().unwrap_or(0) + 1;
        state.clock.insert(change.actor.clone(), seq);
        state.max_op = state.max_op.max(change.start_op + change.operations.len() as u64 - 1);

        let diffs = ops_to_diff(change);
        let patch = Patch {
            actor: Some(change.actor.clone()),
            seq: Some(change.seq),
            clock: state.clock.clone(),
            deps: vec![ChangeHash::zero()],
            max_op: state.max_op,
            diffs,
        };
        (state, patch, Vec::new())
    }
}

/// Turns a change's flat op list back into a single-level root diff: good
/// enough for the test backend's purposes, not a general-purpose
/// op-to-diff compiler (that logic lives in `change_context`, on the
/// frontend side that actually emits the ops in the first place). Each
/// op's own id is derived the same way a real backend derives it: the
/// change's `start_op` plus the op's position within it.
fn ops_to_diff(change: &Change) -> Diff {
    use crdt_protocol::{DiffEdit, DiffValue, ElementId, Key, OpId, OpType};

    let mut by_object: HashMap<_, Diff> = HashMap::new();
    for (i, op) in change.operations.iter().enumerate() {
        let op_id = OpId::new(change.start_op + i as u64, &change.actor);
        let diff = by_object
            .entry(op.obj.clone())
            .or_insert_with(|| Diff::new(op.obj.clone(), op.obj_type().unwrap_or(ObjType::Map)));
        match (&op.key, &op.action) {
            (Key::Map(k), OpType::Set(v)) => {
                diff.prop_entry(k.clone()).insert(op_id, DiffValue::Value(v.clone(), v.datatype()));
            }
            (Key::Map(k), OpType::Make(kind)) => {
                let child = Diff::new(crdt_protocol::ObjectId::Id(op_id.clone()), *kind);
                diff.prop_entry(k.clone()).insert(op_id, DiffValue::Object(child));
            }
            (Key::Map(k), OpType::Del) => {
                diff.prop_entry(k.clone());
            }
            (Key::Seq(_), OpType::Set(v)) if op.insert => {
                let index = diff.edits.as_ref().map(|e| e.len()).unwrap_or(0);
                diff.push_edit(DiffEdit::Insert {
                    index,
                    elem_id: ElementId::Id(op_id.clone()),
                    op_id,
                    value: DiffValue::Value(v.clone(), v.datatype()),
                });
            }
            _ => {}
        }
    }
    by_object
        .remove(&crdt_protocol::ObjectId::Root)
        .unwrap_or_else(|| Diff::new(crdt_protocol::ObjectId::Root, ObjType::Map))
}
