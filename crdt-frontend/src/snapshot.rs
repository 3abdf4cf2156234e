use std::collections::HashMap;
use std::rc::Rc;

use crdt_protocol::{ActorId, ChangeHash, ObjectId};

use crate::object::{Cell, Object};
use crate::path::PathElement;
use crate::value::Value;

/// An immutable view of the document tree at some point in its history.
///
/// Objects are kept behind `Rc` so that applying a patch which only
/// touches a handful of objects can produce a new `Snapshot` that shares
/// every untouched object with the snapshot it was built from: a clone of
/// the cache map is cheap (it only clones `Rc` pointers), and any object a
/// patch doesn't rewrite keeps its identity, which is what lets a caller
/// holding an old root/child object notice that nothing beneath it
/// changed.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub(crate) cache: HashMap<ObjectId, Rc<Object>>,
    pub(crate) clock: HashMap<ActorId, u64>,
    pub(crate) deps: Vec<ChangeHash>,
    pub(crate) max_op: u64,
}

impl Snapshot {
    pub(crate) fn empty() -> Self {
        let mut cache = HashMap::new();
        cache.insert(ObjectId::Root, Rc::new(Object::new_map(ObjectId::Root)));
        Snapshot {
            cache,
            clock: HashMap::new(),
            deps: Vec::new(),
            max_op: 0,
        }
    }

    pub(crate) fn get(&self, id: &ObjectId) -> Option<&Rc<Object>> {
        self.cache.get(id)
    }

    /// Replace (or insert) one object in the cache, returning a new
    /// snapshot. The returned snapshot's cache shares an `Rc` with `self`
    /// for every object id other than `id`.
    pub(crate) fn with_object(&self, id: ObjectId, object: Object) -> Snapshot {
        let mut cache = self.cache.clone();
        cache.insert(id, Rc::new(object));
        Snapshot {
            cache,
            clock: self.clock.clone(),
            deps: self.deps.clone(),
            max_op: self.max_op,
        }
    }

    pub(crate) fn with_clock(&self, actor: ActorId, seq: u64) -> Snapshot {
        let mut clock = self.clock.clone();
        let entry = clock.entry(actor).or_insert(0);
        if seq > *entry {
            *entry = seq;
        }
        Snapshot {
            cache: self.cache.clone(),
            clock,
            deps: self.deps.clone(),
            max_op: self.max_op,
        }
    }

    pub(crate) fn with_deps(&self, deps: Vec<ChangeHash>, max_op: u64) -> Snapshot {
        Snapshot {
            cache: self.cache.clone(),
            clock: self.clock.clone(),
            deps,
            max_op,
        }
    }

    /// Resolve the full document (the root object) into a user-visible
    /// [`Value`].
    pub(crate) fn root_value(&self) -> Value {
        self.resolve(&ObjectId::Root).unwrap_or(Value::Map(HashMap::new()))
    }

    pub(crate) fn resolve(&self, id: &ObjectId) -> Option<Value> {
        self.cache.get(id).map(|o| o.resolve(&self.cache))
    }

    /// Follows one path step from `current`, returning the child object id
    /// it names, or `None` if the step doesn't resolve to an object (either
    /// the key/index is absent, or it names a primitive).
    pub(crate) fn step_into(&self, current: &ObjectId, step: &PathElement) -> Option<ObjectId> {
        let object = self.cache.get(current)?;
        match (step, object.as_ref()) {
            (PathElement::Key(k), Object::Map { props, .. }) => match props.get(k)?.winning_cell()? {
                Cell::Object(id) => Some(id.clone()),
                Cell::Primitive(_) => None,
            },
            (PathElement::Index(i), Object::Sequence { elements, .. }) => {
                match elements.get(*i as usize)?.register.winning_cell()? {
                    Cell::Object(id) => Some(id.clone()),
                    Cell::Primitive(_) => None,
                }
            }
            _ => None,
        }
    }

    /// True if `id` names an object in this snapshot and that object is
    /// the exact same allocation (not merely an equal value) as the one
    /// named `id` in `other`. Used by structural-sharing tests to confirm
    /// that a patch which didn't touch an object left it untouched.
    #[cfg(test)]
    pub(crate) fn is_same_allocation(&self, other: &Snapshot, id: &ObjectId) -> bool {
        match (self.cache.get(id), other.cache.get(id)) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}
