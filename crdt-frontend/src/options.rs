//! Construction-time configuration for a [`crate::Document`], bundled
//! into one immutable object the way the teacher's `frontend::Options<T>`
//! bundles actor-id assignment and timestamp behavior.

use crdt_protocol::ActorId;

use crate::backend::{Backend, NullBackend};
use crate::value::Conflicts;

/// How a document's actor id is chosen at `Document::init` time.
#[derive(Debug, Clone)]
pub enum ActorChoice {
    /// Use this id for the lifetime of the document.
    Assigned(ActorId),
    /// Mint a fresh random id (16 random bytes, hex-encoded) the first
    /// time one is needed.
    Generate,
}

impl Default for ActorChoice {
    fn default() -> Self {
        ActorChoice::Generate
    }
}

/// Called after every patch (local or remote) is folded into the
/// snapshot, with the full set of conflicts the patch left behind keyed
/// by object id's owning path; used for diagnostics/telemetry, never for
/// correctness.
pub type PatchObserver = Box<dyn Fn(&Conflicts) + Send + Sync>;

/// Immutable configuration for a [`crate::Document`]. `B` names the
/// backend type driving "online" reconciliation; defaults to
/// [`NullBackend`] for the backend-less, optimistic-queue-only mode.
pub struct Options<B: Backend = NullBackend> {
    pub(crate) actor: ActorChoice,
    pub(crate) freeze: bool,
    pub(crate) on_patch: Option<PatchObserver>,
    _backend: std::marker::PhantomData<B>,
}

impl<B: Backend> Default for Options<B> {
    fn default() -> Self {
        Options {
            actor: ActorChoice::default(),
            freeze: false,
            on_patch: None,
            _backend: std::marker::PhantomData,
        }
    }
}

impl<B: Backend> Options<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actor(mut self, actor: ActorId) -> Self {
        self.actor = ActorChoice::Assigned(actor);
        self
    }

    /// When set, a document's snapshot values are never observed to
    /// change by identity once the application has taken a reference to
    /// them - equivalent to always cloning before handing out a nested
    /// `Value`. Off by default since the snapshot's structural sharing
    /// already gives this for free in the common case.
    pub fn frozen(mut self) -> Self {
        self.freeze = true;
        self
    }

    pub fn with_patch_observer(mut self, observer: PatchObserver) -> Self {
        self.on_patch = Some(observer);
        self
    }
}
