//! The mutable view an application interacts with inside
//! `Document::change`: ordinary-looking map/list/counter operations that
//! resolve a [`Path`] against the change's working snapshot and forward
//! to [`Context`]. Grounded on the teacher's `MutableDocument` trait and
//! `MutationTracker` in `automerge-frontend/src/mutation.rs`, adapted to
//! resolve against an immutable `Snapshot` rather than mutate a live
//! state tree in place.

use crdt_protocol::ObjectId;

use crate::change_context::{Context, Link};
use crate::error::InvalidChangeRequest;
use crate::object::{cell_to_value, Cell, Object};
use crate::path::{Path, PathElement};
use crate::value::Value;

/// The operations an application may perform on a document from inside a
/// `Document::change` closure.
pub trait MutableDocument {
    fn value_at(&self, path: &Path) -> Option<Value>;
    fn set_map_key(&mut self, path: &Path, key: &str, value: Value) -> Result<(), InvalidChangeRequest>;
    fn delete_map_key(&mut self, path: &Path, key: &str) -> Result<(), InvalidChangeRequest>;
    fn set_list_index(&mut self, path: &Path, index: usize, value: Value) -> Result<(), InvalidChangeRequest>;
    fn splice(
        &mut self,
        path: &Path,
        index: usize,
        delete_count: usize,
        insertions: Vec<Value>,
    ) -> Result<(), InvalidChangeRequest>;
    fn insert(&mut self, path: &Path, index: usize, value: Value) -> Result<(), InvalidChangeRequest>;
    fn push(&mut self, path: &Path, value: Value) -> Result<(), InvalidChangeRequest>;
    fn increment(&mut self, path: &Path, key: &str, delta: i64) -> Result<(), InvalidChangeRequest>;
    fn add_table_row(&mut self, path: &Path, row: Value) -> Result<ObjectId, InvalidChangeRequest>;
    fn delete_table_row(&mut self, path: &Path, row_id: &ObjectId) -> Result<(), InvalidChangeRequest>;
}

/// The concrete `MutableDocument` handed to a change closure: a thin
/// wrapper resolving `Path`s against `Context`'s working snapshot.
pub(crate) struct ChangeBuilder<'a> {
    context: &'a mut Context,
}

impl<'a> ChangeBuilder<'a> {
    pub(crate) fn new(context: &'a mut Context) -> Self {
        ChangeBuilder { context }
    }

    fn resolve_value(&self, path: &Path) -> Option<Value> {
        let steps = path.steps();
        if steps.is_empty() {
            return self.context.working().resolve(&ObjectId::Root);
        }
        let mut current = ObjectId::Root;
        for step in &steps[..steps.len() - 1] {
            current = self.context.working().step_into(&current, step)?;
        }
        let last = steps.last().unwrap();
        let object = self.context.working().get(&current)?;
        let cell = match (last, object.as_ref()) {
            (PathElement::Key(k), Object::Map { props, .. }) => props.get(k)?.winning_cell()?,
            (PathElement::Index(i), Object::Sequence { elements, .. }) => {
                elements.get(*i as usize)?.register.winning_cell()?
            }
            _ => return None,
        };
        Some(cell_to_value(cell, &self.context.working().cache))
    }

    /// Resolves `path` to the container object it names, recording the
    /// `(object, link-to-next)` chain from the root so the caller's edit
    /// can be stitched into a root-rooted synthesized patch.
    fn resolve_container(
        &self,
        path: &Path,
    ) -> Result<(Vec<(ObjectId, Link)>, ObjectId), InvalidChangeRequest> {
        let mut current = ObjectId::Root;
        let mut ancestors = Vec::new();
        for step in path.steps() {
            let object = self
                .context
                .working()
                .get(&current)
                .ok_or_else(|| InvalidChangeRequest::PathNotFound(format!("{}", current)))?;
            let (next, link) = match (step, object.as_ref()) {
                (PathElement::Key(k), Object::Map { props, .. }) => {
                    let register = props
                        .get(k)
                        .ok_or_else(|| InvalidChangeRequest::PathNotFound(k.clone()))?;
                    match register.winning_cell() {
                        Some(Cell::Object(id)) => (id.clone(), Link::MapKey(k.clone())),
                        _ => return Err(InvalidChangeRequest::NotAMap(k.clone())),
                    }
                }
                (PathElement::Index(i), Object::Sequence { elements, .. }) => {
                    let idx = *i as usize;
                    let elem = elements.get(idx).ok_or_else(|| InvalidChangeRequest::IndexOutOfBounds {
                        path: format!("{}", current),
                        index: idx,
                        len: elements.len(),
                    })?;
                    match elem.register.winning_cell() {
                        Some(Cell::Object(id)) => (id.clone(), Link::SeqIndex(idx, elem.elem_id.clone())),
                        _ => return Err(InvalidChangeRequest::NotAList(format!("{}", current))),
                    }
                }
                (PathElement::Key(k), Object::Sequence { .. }) => {
                    return Err(InvalidChangeRequest::NotAMap(k.clone()))
                }
                (PathElement::Index(_), Object::Map { .. }) => {
                    return Err(InvalidChangeRequest::NotAList(format!("{}", current)))
                }
            };
            ancestors.push((current, link));
            current = next;
        }
        Ok((ancestors, current))
    }
}

impl<'a> MutableDocument for ChangeBuilder<'a> {
    fn value_at(&self, path: &Path) -> Option<Value> {
        self.resolve_value(path)
    }

    fn set_map_key(&mut self, path: &Path, key: &str, value: Value) -> Result<(), InvalidChangeRequest> {
        let (ancestors, obj) = self.resolve_container(path)?;
        self.context.set_map_key(&ancestors, &obj, key, value)
    }

    fn delete_map_key(&mut self, path: &Path, key: &str) -> Result<(), InvalidChangeRequest> {
        let (ancestors, obj) = self.resolve_container(path)?;
        self.context.delete_map_key(&ancestors, &obj, key)
    }

    fn set_list_index(&mut self, path: &Path, index: usize, value: Value) -> Result<(), InvalidChangeRequest> {
        let (ancestors, obj) = self.resolve_container(path)?;
        self.context.set_list_index(&ancestors, &obj, index, value)
    }

    fn splice(
        &mut self,
        path: &Path,
        index: usize,
        delete_count: usize,
        insertions: Vec<Value>,
    ) -> Result<(), InvalidChangeRequest> {
        let (ancestors, obj) = self.resolve_container(path)?;
        self.context.splice(&ancestors, &obj, index, delete_count, insertions)
    }

    fn insert(&mut self, path: &Path, index: usize, value: Value) -> Result<(), InvalidChangeRequest> {
        self.splice(path, index, 0, vec![value])
    }

    fn push(&mut self, path: &Path, value: Value) -> Result<(), InvalidChangeRequest> {
        let (ancestors, obj) = self.resolve_container(path)?;
        let len = match self.context.working().get(&obj).map(|rc| rc.as_ref()) {
            Some(Object::Sequence { elements, .. }) => elements.len(),
            _ => return Err(InvalidChangeRequest::NotAList(format!("{}", obj))),
        };
        self.context.splice(&ancestors, &obj, len, 0, vec![value])
    }

    fn increment(&mut self, path: &Path, key: &str, delta: i64) -> Result<(), InvalidChangeRequest> {
        let (ancestors, obj) = self.resolve_container(path)?;
        self.context.increment(&ancestors, &obj, key, delta)
    }

    fn add_table_row(&mut self, path: &Path, row: Value) -> Result<ObjectId, InvalidChangeRequest> {
        let (ancestors, obj) = self.resolve_container(path)?;
        self.context.add_table_row(&ancestors, &obj, row)
    }

    fn delete_table_row(&mut self, path: &Path, row_id: &ObjectId) -> Result<(), InvalidChangeRequest> {
        let (ancestors, obj) = self.resolve_container(path)?;
        self.context.delete_table_row(&ancestors, &obj, row_id)
    }
}
