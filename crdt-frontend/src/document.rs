//! The top-level handle an application holds: a root snapshot plus the
//! bookkeeping needed to mint local changes and reconcile them against
//! whatever authority (a wired `Backend`, or nothing at all) confirms
//! them. Grounded on the teacher's `Frontend<T>` in
//! `automerge-frontend/src/frontend.rs` and its request-queue
//! reconciliation in `automerge-frontend/src/state.rs`, simplified to
//! fold requests as plain root-rooted diffs on top of a confirmed
//! snapshot rather than the teacher's rollback-capable state tree - see
//! `DESIGN.md` for why.

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::time::{SystemTime, UNIX_EPOCH};

use crdt_protocol::{ActorId, Change, Diff, ElementId, ObjectId, Patch};
use tracing::{debug, instrument, trace, warn};
use uuid::Uuid;

use crate::backend::{Backend, NullBackend};
use crate::change_context::Context;
use crate::error::{FrontendError, InvalidChangeRequest, InvalidPatch};
use crate::mutation::{ChangeBuilder, MutableDocument};
use crate::options::{ActorChoice, Options};
use crate::path::Path;
use crate::snapshot::Snapshot;
use crate::value::{Conflicts, Value};

/// A change this document has sent off for confirmation but has not yet
/// seen an authoritative patch for. Kept only in the backend-less,
/// optimistic-queue mode - an online backend confirms synchronously, so
/// nothing ever sits in the queue.
struct PendingRequest {
    seq: u64,
    change: Change,
    patch: Diff,
}

/// A CRDT document: the confirmed state plus whatever local changes are
/// still in flight, and the actor id / backend wiring needed to mint and
/// reconcile them.
pub struct Document<B: Backend = NullBackend> {
    options: Options<B>,
    actor: Option<ActorId>,
    seq: u64,
    /// Last state any backend (or remote patch) has confirmed.
    confirmed: Snapshot,
    /// `confirmed` with every still-pending request's patch folded on
    /// top, in order - what the application actually observes.
    optimistic: Snapshot,
    requests: VecDeque<PendingRequest>,
    backend_state: B::State,
    last_local_change: Option<Change>,
}

impl<B: Backend> Document<B> {
    /// An empty document with default options.
    pub fn init() -> Self {
        Self::init_with_options(Options::default())
    }

    pub fn init_with_options(options: Options<B>) -> Self {
        let actor = match &options.actor {
            ActorChoice::Assigned(id) => Some(id.clone()),
            ActorChoice::Generate => None,
        };
        Document {
            options,
            actor,
            seq: 0,
            confirmed: Snapshot::empty(),
            optimistic: Snapshot::empty(),
            requests: VecDeque::new(),
            backend_state: B::init(),
            last_local_change: None,
        }
    }

    /// An empty document whose root map is populated from `initial_state`
    /// by a single local change, the way a fresh document is usually
    /// seeded in tests and examples.
    pub fn from(initial_state: Value, options: Options<B>) -> Result<Self, FrontendError> {
        let entries = match initial_state {
            Value::Map(m) => m,
            other => {
                return Err(FrontendError::InvalidInitialState(
                    crate::error::InvalidInitialState::NotAMap(other.type_name()),
                ))
            }
        };
        let mut doc = Self::init_with_options(options);
        doc.change(
            Some("initialization".to_string()),
            |d: &mut dyn MutableDocument| -> Result<(), InvalidChangeRequest> {
                for (k, v) in entries {
                    d.set_map_key(&Path::root(), &k, v)?;
                }
                Ok(())
            },
        )?;
        Ok(doc)
    }

    /// Assigns this document's actor id. Only meaningful before the first
    /// change if the document was constructed with `ActorChoice::Generate`
    /// and the application wants to pick a specific id instead of having
    /// one minted lazily on first use.
    pub fn set_actor_id(&mut self, actor: ActorId) {
        self.actor = Some(actor);
    }

    fn actor_id(&mut self) -> ActorId {
        if self.actor.is_none() {
            self.actor = Some(random_actor_id());
        }
        self.actor.clone().unwrap()
    }

    /// The actor id this document will use for its next change, if one has
    /// already been assigned or generated. `None` until the first `change`
    /// (or an explicit `set_actor_id`) mints one lazily.
    pub fn get_actor_id(&self) -> Option<&ActorId> {
        self.actor.as_ref()
    }

    /// The backend's own state, opaque to the frontend. Meaningful only
    /// when a real `Backend` is wired; `NullBackend`'s state is `()`.
    pub fn get_backend_state(&self) -> &B::State {
        &self.backend_state
    }

    /// The stable element ids, in order, of the list or text at `path` -
    /// the same ids a patch's `edits` reference for position-relative ops.
    /// `None` if the path doesn't resolve to a sequence object.
    pub fn get_element_ids(&self, path: &Path) -> Option<Vec<ElementId>> {
        let mut current = ObjectId::Root;
        for step in path.steps() {
            current = self.optimistic.step_into(&current, step)?;
        }
        match self.optimistic.get(&current)?.as_ref() {
            crate::object::Object::Sequence { elements, .. } => Some(elements.iter().map(|e| e.elem_id.clone()).collect()),
            crate::object::Object::Map { .. } => None,
        }
    }

    /// The document's current value, reflecting every confirmed change
    /// plus every change still in flight.
    pub fn value(&self) -> Value {
        self.optimistic.root_value()
    }

    pub fn get_object_by_id(&self, id: &ObjectId) -> Option<Value> {
        self.optimistic.resolve(id)
    }

    /// The id of the object living at `path`, or `None` if the path names a
    /// primitive (or doesn't resolve at all). The inverse of
    /// `get_object_by_id`.
    pub fn get_object_id(&self, path: &Path) -> Option<ObjectId> {
        let mut current = ObjectId::Root;
        for step in path.steps() {
            current = self.optimistic.step_into(&current, step)?;
        }
        Some(current)
    }

    pub fn get_conflicts(&self, path: &Path) -> Option<Conflicts> {
        let steps = path.steps();
        if steps.is_empty() {
            return None;
        }
        let mut current = ObjectId::Root;
        for step in &steps[..steps.len() - 1] {
            current = self.optimistic.step_into(&current, step)?;
        }
        let last = steps.last().unwrap();
        let object = self.optimistic.get(&current)?;
        let register = match (last, object.as_ref()) {
            (crate::path::PathElement::Key(k), crate::object::Object::Map { props, .. }) => props.get(k)?,
            (crate::path::PathElement::Index(i), crate::object::Object::Sequence { elements, .. }) => {
                &elements.get(*i as usize)?.register
            }
            _ => return None,
        };
        if !register.has_conflicts() {
            return None;
        }
        let values = register
            .0
            .iter()
            .map(|(op_id, cell)| (op_id.clone(), crate::object::cell_to_value(cell, &self.optimistic.cache)))
            .collect();
        Some(Conflicts(values))
    }

    pub fn get_last_local_change(&self) -> Option<&Change> {
        self.last_local_change.as_ref()
    }

    /// Indices of requests still awaiting an authoritative patch.
    pub fn in_flight_requests(&self) -> Vec<u64> {
        self.requests.iter().map(|r| r.seq).collect()
    }

    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    /// Runs `f` against a mutable view of the document, producing zero or
    /// more ops. If `f` performed at least one change, the resulting
    /// `Change` is either applied synchronously through the wired backend
    /// (when `B::is_online()`) or enqueued to await a matching
    /// authoritative patch, and is returned; if `f` performed no change at
    /// all (every write was a no-op, or there were none), returns `Ok(None)`.
    #[instrument(level = "debug", skip(self, f), fields(seq = self.seq + 1))]
    pub fn change<F, E>(&mut self, message: Option<String>, f: F) -> Result<Option<Change>, E>
    where
        E: StdError + From<InvalidChangeRequest>,
        F: FnOnce(&mut dyn MutableDocument) -> Result<(), E>,
    {
        let actor = self.actor_id();
        let start_op = self.optimistic.max_op + 1;
        let mut context = Context::new(self.optimistic.clone(), actor.clone());
        {
            let mut builder = ChangeBuilder::new(&mut context);
            f(&mut builder)?;
        }
        let (ops, patch, working) = context.finish();

        if ops.is_empty() {
            trace!("change produced no ops, skipping");
            return Ok(None);
        }

        self.seq += 1;
        let change = Change {
            actor: actor.clone(),
            seq: self.seq,
            start_op,
            time: self.now(),
            message,
            deps: self.confirmed.deps.clone(),
            operations: ops,
        };

        if B::is_online() {
            debug!(seq = self.seq, "applying local change through backend");
            let (new_state, authoritative, _encoded) = B::apply_local_change(self.backend_state.clone(), &change);
            self.backend_state = new_state;
            self.confirmed = crate::interpreter::apply_patch(&self.confirmed, &authoritative);
            self.optimistic = self.confirmed.clone();
            self.maybe_observe(&authoritative);
        } else {
            debug!(seq = self.seq, "enqueuing local change, no backend wired");
            self.requests.push_back(PendingRequest {
                seq: self.seq,
                change: change.clone(),
                patch,
            });
            self.optimistic = working;
        }
        self.last_local_change = Some(change.clone());
        Ok(Some(change))
    }

    /// A change that carries a message but performs no edits - used to
    /// record an annotation in the change history without touching any
    /// value. Grounded on the teacher's support for `Some(message)` with
    /// an empty closure; kept as its own entry point since `change`'s
    /// `Ok(None)` return for no-ops would otherwise silently drop the
    /// message too.
    pub fn empty_change(&mut self, message: String) -> Change {
        let actor = self.actor_id();
        self.seq += 1;
        let change = Change {
            actor,
            seq: self.seq,
            start_op: self.optimistic.max_op + 1,
            time: self.now(),
            message: Some(message),
            deps: self.confirmed.deps.clone(),
            operations: Vec::new(),
        };
        self.last_local_change = Some(change.clone());
        change
    }

    /// Folds an authoritative patch (from a wired backend delivered out of
    /// band, or from a remote peer) into the confirmed snapshot, then
    /// reconciles the request queue: if the patch is this document's own
    /// echo of a locally submitted change, the matching request is popped
    /// and the optimistic view is rebuilt from the remaining ones.
    #[instrument(level = "debug", skip(self, patch), fields(actor = ?patch.actor, seq = ?patch.seq))]
    pub fn apply_patch(&mut self, patch: Patch) -> Result<(), FrontendError> {
        let is_own_echo = matches!((&patch.actor, self.actor.as_ref()), (Some(a), Some(me)) if a == me);
        if is_own_echo {
            let seq = patch.seq.unwrap_or(0);
            if let Some(front) = self.requests.front() {
                if front.seq != seq {
                    warn!(expected = front.seq, actual = seq, "patch seq does not match head of request queue");
                    return Err(InvalidPatch::UnexpectedSeq {
                        expected: front.seq,
                        actual: seq,
                    }
                    .into());
                }
            } else {
                trace!("own patch arrived with no requests in flight, already reflected");
            }
        }

        self.confirmed = crate::interpreter::apply_patch(&self.confirmed, &patch);
        if is_own_echo {
            self.requests.pop_front();
        }

        let mut view = self.confirmed.clone();
        for request in &self.requests {
            view = crate::interpreter::apply_diff(view, &request.patch);
        }
        self.optimistic = view;
        self.maybe_observe(&patch);
        Ok(())
    }

    /// Reports every key the patch left with more than one candidate to
    /// the configured observer, if any - diagnostics only, never consulted
    /// for conflict resolution itself (that's always `Register::winning_cell`).
    fn maybe_observe(&self, patch: &Patch) {
        let observer = match &self.options.on_patch {
            Some(observer) => observer,
            None => return,
        };
        let mut conflicts = std::collections::HashMap::new();
        if let Some(props) = &patch.diffs.props {
            for candidates in props.values() {
                if candidates.len() <= 1 {
                    continue;
                }
                for (op_id, value) in candidates {
                    let resolved = match value {
                        crdt_protocol::DiffValue::Value(scalar, datatype) => {
                            Value::Primitive(crate::interpreter::scalar_to_primitive(scalar, *datatype))
                        }
                        crdt_protocol::DiffValue::Object(d) => self
                            .confirmed
                            .resolve(&d.object_id)
                            .unwrap_or_else(|| Value::Map(Default::default())),
                    };
                    conflicts.insert(op_id.clone(), resolved);
                }
            }
        }
        observer(&Conflicts(conflicts));
    }
}

impl<B: Backend> Default for Document<B> {
    fn default() -> Self {
        Self::init()
    }
}

fn random_actor_id() -> ActorId {
    ActorId::from_bytes(Uuid::new_v4().as_bytes().to_vec())
}
