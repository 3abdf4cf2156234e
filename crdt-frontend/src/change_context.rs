//! Turns high-level edits into typed operations and an optimistic,
//! root-rooted synthesized patch, while keeping a running "working"
//! snapshot so that a read inside a change sees the effect of every
//! earlier write in the same change. Grounded on the op-emission half of
//! the teacher's `automerge-frontend/src/value.rs`
//! (`value_to_op_requests`) and `mutation.rs` (`MutationTracker`), with
//! patch synthesis built on top of [`crate::interpreter::apply_diff`]
//! rather than the teacher's in-place rollback tree.

use std::collections::HashMap;

use crdt_protocol::{
    ActorId, DataType, Diff, DiffEdit, DiffValue, ElementId, Key, ObjType, Op, OpId, OpType,
    ScalarValue, SortedVec,
};

use crate::error::InvalidChangeRequest;
use crate::object::{Cell, Object, Register};
use crate::snapshot::Snapshot;
use crate::value::{Primitive, Value};

/// How a mutated object is reached from its immediate parent, recorded by
/// the caller (the mutable view in `mutation.rs`) as it resolves a `Path`.
#[derive(Debug, Clone)]
pub(crate) enum Link {
    MapKey(String),
    SeqIndex(usize, ElementId),
}

/// Where a freshly minted op attaches to its parent: a map/table key with
/// its predecessor set, or a list/text position (inserts never have
/// predecessors).
enum OpLocation {
    MapKey(String, SortedVec<OpId>),
    SeqElem(ElementId),
    SeqUpdate(ElementId, SortedVec<OpId>),
}

pub(crate) struct Context {
    actor: ActorId,
    next_counter: u64,
    ops: Vec<Op>,
    working: Snapshot,
    patch: Diff,
    last_increment: Option<IncrementSite>,
}

/// The most recent `increment` call's target and the op it landed on, kept
/// only so the next call can tell whether it is adjacent (nothing else was
/// emitted in between) and, if so, fold into the same op instead of minting
/// a new one.
struct IncrementSite {
    obj: crdt_protocol::ObjectId,
    key: String,
    op_id: OpId,
    ops_len: usize,
}

impl Context {
    pub(crate) fn new(base: Snapshot, actor: ActorId) -> Self {
        Context {
            actor,
            next_counter: base.max_op + 1,
            ops: Vec::new(),
            working: base,
            patch: Diff::new(crdt_protocol::ObjectId::Root, ObjType::Map),
            last_increment: None,
        }
    }

    pub(crate) fn working(&self) -> &Snapshot {
        &self.working
    }

    /// Consumes the context, returning the ops it minted, the root-rooted
    /// synthesized patch, and the working snapshot with its `max_op`
    /// advanced past every op minted in this change (even if the last
    /// write happened to be a no-op and left the cache itself untouched).
    pub(crate) fn finish(self) -> (Vec<Op>, Diff, Snapshot) {
        let max_op = self.next_counter.saturating_sub(1).max(self.working.max_op);
        let working = self.working.with_deps(self.working.deps.clone(), max_op);
        (self.ops, self.patch, working)
    }

    fn next_op_id(&mut self) -> OpId {
        let id = OpId::new(self.next_counter, &self.actor);
        self.next_counter += 1;
        id
    }

    fn obj_type_of(&self, id: &crdt_protocol::ObjectId) -> ObjType {
        match self.working.get(id).map(|rc| rc.as_ref()) {
            Some(Object::Map { kind, .. }) => match kind {
                crate::object::MapKind::Map => ObjType::Map,
                crate::object::MapKind::Table => ObjType::Table,
            },
            Some(Object::Sequence { kind, .. }) => match kind {
                crate::object::SeqKind::List => ObjType::List,
                crate::object::SeqKind::Text => ObjType::Text,
            },
            None => ObjType::Map,
        }
    }

    fn apply_local(&mut self, diff: Diff) {
        self.working = crate::interpreter::apply_diff(self.working.clone(), &diff);
        merge_diff(&mut self.patch, diff);
    }

    /// Emits the `Op` that installs `action` at `loc` under `parent`.
    fn push_op(&mut self, parent: crdt_protocol::ObjectId, loc: &OpLocation, action: OpType) {
        let (key, insert, pred) = match loc {
            OpLocation::MapKey(k, pred) => (Key::Map(k.clone()), false, pred.clone()),
            OpLocation::SeqElem(elem) => (Key::Seq(elem.clone()), true, SortedVec::new()),
            OpLocation::SeqUpdate(elem, pred) => (Key::Seq(elem.clone()), false, pred.clone()),
        };
        self.ops.push(Op {
            action,
            obj: parent,
            key,
            insert,
            pred,
        });
    }

    fn wrapped(
        &self,
        ancestors: &[(crdt_protocol::ObjectId, Link)],
        leaf_id: crdt_protocol::ObjectId,
        leaf_diff: Diff,
    ) -> Diff {
        let mut current_id = leaf_id;
        let mut current_diff = leaf_diff;
        for (parent_id, link) in ancestors.iter().rev() {
            let mut parent_diff = Diff::new(parent_id.clone(), self.obj_type_of(parent_id));
            match link {
                Link::MapKey(k) => {
                    let op_id = current_id
                        .as_opid()
                        .cloned()
                        .expect("non-root object must have an op id");
                    parent_diff.prop_entry(k.clone()).insert(op_id, DiffValue::Object(current_diff));
                }
                Link::SeqIndex(index, elem_id) => {
                    let op_id = elem_id
                        .as_opid()
                        .cloned()
                        .unwrap_or_else(|| current_id.as_opid().cloned().expect("non-head element"));
                    parent_diff.push_edit(DiffEdit::Update {
                        index: *index,
                        op_id,
                        value: DiffValue::Object(current_diff),
                    });
                }
            }
            current_diff = parent_diff;
            current_id = parent_id.clone();
        }
        current_diff
    }

    fn register_at_key(&self, obj: &crdt_protocol::ObjectId, key: &str) -> Register {
        match self.working.get(obj).map(|rc| rc.as_ref()) {
            Some(Object::Map { props, .. }) => props.get(key).cloned().unwrap_or_default(),
            _ => Register::new(),
        }
    }

    fn predecessors(register: &Register) -> SortedVec<OpId> {
        register.0.keys().cloned().collect()
    }

    pub(crate) fn set_map_key(
        &mut self,
        ancestors: &[(crdt_protocol::ObjectId, Link)],
        obj: &crdt_protocol::ObjectId,
        key: &str,
        value: Value,
    ) -> Result<(), InvalidChangeRequest> {
        if key.is_empty() {
            return Err(InvalidChangeRequest::NotAMap(key.to_string()));
        }
        match self.working.get(obj).map(|rc| rc.as_ref()) {
            Some(Object::Map { .. }) => {}
            _ => return Err(InvalidChangeRequest::NotAMap(format!("{}", obj))),
        }

        let register = self.register_at_key(obj, key);
        if register.0.len() <= 1 {
            if let Some(Cell::Primitive(existing)) = register.winning_cell() {
                if let Value::Primitive(new_val) = &value {
                    if existing == new_val {
                        return Ok(());
                    }
                }
            }
        }
        let pred = Self::predecessors(&register);

        let op_id = self.next_op_id();
        let loc = OpLocation::MapKey(key.to_string(), pred);
        let diff_value = self.value_to_diff_value(&value, &op_id, obj, loc);
        let mut leaf = Diff::new(obj.clone(), ObjType::Map);
        leaf.prop_entry(key).insert(op_id, diff_value);
        let wrapped = self.wrapped(ancestors, obj.clone(), leaf);
        self.apply_local(wrapped);
        Ok(())
    }

    pub(crate) fn delete_map_key(
        &mut self,
        ancestors: &[(crdt_protocol::ObjectId, Link)],
        obj: &crdt_protocol::ObjectId,
        key: &str,
    ) -> Result<(), InvalidChangeRequest> {
        match self.working.get(obj).map(|rc| rc.as_ref()) {
            Some(Object::Map { .. }) => {}
            _ => return Err(InvalidChangeRequest::NotAMap(format!("{}", obj))),
        }
        let register = self.register_at_key(obj, key);
        if register.is_empty() {
            return Ok(());
        }
        let pred = Self::predecessors(&register);
        self.push_op(obj.clone(), &OpLocation::MapKey(key.to_string(), pred), OpType::Del);
        let mut leaf = Diff::new(obj.clone(), ObjType::Map);
        leaf.props = Some(HashMap::from([(key.to_string(), HashMap::new())]));
        let wrapped = self.wrapped(ancestors, obj.clone(), leaf);
        self.apply_local(wrapped);
        Ok(())
    }

    pub(crate) fn set_list_index(
        &mut self,
        ancestors: &[(crdt_protocol::ObjectId, Link)],
        obj: &crdt_protocol::ObjectId,
        index: usize,
        value: Value,
    ) -> Result<(), InvalidChangeRequest> {
        let len = match self.working.get(obj).map(|rc| rc.as_ref()) {
            Some(Object::Sequence { elements, .. }) => elements.len(),
            _ => return Err(InvalidChangeRequest::NotAList(format!("{}", obj))),
        };

        // Setting at the end of the list is an insert, not an overwrite.
        if index == len {
            return self.splice(ancestors, obj, index, 0, vec![value]);
        }
        if index > len {
            return Err(InvalidChangeRequest::IndexOutOfBounds {
                path: format!("{}", obj),
                index,
                len,
            });
        }
        let (elem_id, register) = match self.working.get(obj).map(|rc| rc.as_ref()) {
            Some(Object::Sequence { elements, .. }) => {
                let e = &elements[index];
                (e.elem_id.clone(), e.register.clone())
            }
            _ => return Err(InvalidChangeRequest::NotAList(format!("{}", obj))),
        };

        if register.0.len() <= 1 {
            if let (Some(Cell::Primitive(existing)), Value::Primitive(new_val)) = (register.winning_cell(), &value) {
                if existing == new_val {
                    return Ok(());
                }
            }
        }

        let pred = Self::predecessors(&register);
        let op_id = self.next_op_id();
        let loc = OpLocation::SeqUpdate(elem_id, pred);
        let diff_value = self.value_to_diff_value(&value, &op_id, obj, loc);
        let mut leaf = Diff::new(obj.clone(), ObjType::List);
        leaf.push_edit(DiffEdit::Update {
            index,
            op_id,
            value: diff_value,
        });
        let wrapped = self.wrapped(ancestors, obj.clone(), leaf);
        self.apply_local(wrapped);
        Ok(())
    }

    pub(crate) fn increment(
        &mut self,
        ancestors: &[(crdt_protocol::ObjectId, Link)],
        obj: &crdt_protocol::ObjectId,
        key: &str,
        delta: i64,
    ) -> Result<(), InvalidChangeRequest> {
        let register = self.register_at_key(obj, key);
        let current = match register.winning_cell() {
            Some(Cell::Primitive(Primitive::Counter(c))) => *c,
            _ => return Err(InvalidChangeRequest::NotACounter(format!("{}/{}", obj, key))),
        };

        // Adjacent incs on the same counter (nothing emitted in between)
        // fold into the one op already sitting at the end of `self.ops`
        // rather than minting a new one.
        let adjacent = matches!(
            &self.last_increment,
            Some(site) if site.obj == *obj && site.key == key && site.ops_len == self.ops.len()
        );
        let coalesced = adjacent
            && match self.ops.last_mut() {
                Some(Op { action: OpType::Inc(prev_delta), .. }) => {
                    *prev_delta += delta;
                    true
                }
                _ => false,
            };
        let op_id = if coalesced {
            self.last_increment.as_ref().unwrap().op_id.clone()
        } else {
            let pred = Self::predecessors(&register);
            let id = self.next_op_id();
            self.push_op(obj.clone(), &OpLocation::MapKey(key.to_string(), pred), OpType::Inc(delta));
            id
        };
        self.last_increment = Some(IncrementSite {
            obj: obj.clone(),
            key: key.to_string(),
            op_id: op_id.clone(),
            ops_len: self.ops.len(),
        });

        let mut leaf = Diff::new(obj.clone(), ObjType::Map);
        leaf.prop_entry(key)
            .insert(op_id, DiffValue::Value(ScalarValue::Counter(current + delta), Some(DataType::Counter)));
        let wrapped = self.wrapped(ancestors, obj.clone(), leaf);
        self.apply_local(wrapped);
        Ok(())
    }

    pub(crate) fn splice(
        &mut self,
        ancestors: &[(crdt_protocol::ObjectId, Link)],
        obj: &crdt_protocol::ObjectId,
        index: usize,
        delete_count: usize,
        insertions: Vec<Value>,
    ) -> Result<(), InvalidChangeRequest> {
        let (len, elem_before) = match self.working.get(obj).map(|rc| rc.as_ref()) {
            Some(Object::Sequence { elements, .. }) => (
                elements.len(),
                if index == 0 {
                    ElementId::Head
                } else {
                    elements
                        .get(index - 1)
                        .map(|e| e.elem_id.clone())
                        .unwrap_or(ElementId::Head)
                },
            ),
            _ => return Err(InvalidChangeRequest::NotAList(format!("{}", obj))),
        };
        if index > len {
            return Err(InvalidChangeRequest::IndexOutOfBounds {
                path: format!("{}", obj),
                index,
                len,
            });
        }
        let end = (index + delete_count).min(len);

        let mut leaf = Diff::new(obj.clone(), ObjType::List);
        if end > index {
            let removed: Vec<(ElementId, SortedVec<OpId>)> = match self.working.get(obj).map(|rc| rc.as_ref()) {
                Some(Object::Sequence { elements, .. }) => elements[index..end]
                    .iter()
                    .map(|e| (e.elem_id.clone(), Self::predecessors(&e.register)))
                    .collect(),
                _ => Vec::new(),
            };
            for (elem_id, pred) in removed {
                self.push_op(obj.clone(), &OpLocation::SeqUpdate(elem_id, pred), OpType::Del);
            }
            leaf.push_edit(DiffEdit::Remove {
                index,
                count: end - index,
            });
        }

        if insertions.is_empty() {
            let wrapped = self.wrapped(ancestors, obj.clone(), leaf);
            self.apply_local(wrapped);
            return Ok(());
        }

        let simple = |v: &Value| matches!(v, Value::Primitive(p) if !matches!(p, Primitive::Counter(_) | Primitive::Timestamp(_)));
        let all_simple = insertions.len() > 1 && insertions.iter().all(simple);

        if all_simple {
            let scalars: Vec<ScalarValue> = insertions
                .iter()
                .map(|v| match v {
                    Value::Primitive(p) => primitive_to_scalar(p),
                    _ => unreachable!(),
                })
                .collect();
            let base_op = self.next_op_id();
            for _ in 1..scalars.len() {
                self.next_op_id();
            }
            let run = base_op.run(scalars.len() as u64);
            let mut prev = elem_before;
            for (value, new_op) in scalars.iter().zip(run.iter()) {
                self.push_op(
                    obj.clone(),
                    &OpLocation::SeqElem(prev.clone()),
                    OpType::Set(value.clone()),
                );
                prev = ElementId::Id(new_op.clone());
            }
            leaf.push_edit(DiffEdit::MultiInsert {
                index,
                elem_id: ElementId::Id(run[0].clone()),
                values: scalars,
                datatype: None,
            });
        } else {
            let mut elem = elem_before;
            for (offset, value) in insertions.into_iter().enumerate() {
                let op_id = self.next_op_id();
                let loc = OpLocation::SeqElem(elem.clone());
                let diff_value = self.value_to_diff_value(&value, &op_id, obj, loc);
                leaf.push_edit(DiffEdit::Insert {
                    index: index + offset,
                    elem_id: ElementId::Id(op_id.clone()),
                    op_id: op_id.clone(),
                    value: diff_value,
                });
                elem = ElementId::Id(op_id);
            }
        }

        let wrapped = self.wrapped(ancestors, obj.clone(), leaf);
        self.apply_local(wrapped);
        Ok(())
    }

    pub(crate) fn add_table_row(
        &mut self,
        ancestors: &[(crdt_protocol::ObjectId, Link)],
        obj: &crdt_protocol::ObjectId,
        row: Value,
    ) -> Result<crdt_protocol::ObjectId, InvalidChangeRequest> {
        match self.working.get(obj).map(|rc| rc.as_ref()) {
            Some(Object::Map {
                kind: crate::object::MapKind::Table,
                ..
            }) => {}
            _ => return Err(InvalidChangeRequest::NotAMap(format!("{}", obj))),
        }
        let op_id = self.next_op_id();
        let row_id = crdt_protocol::ObjectId::Id(op_id.clone());
        let loc = OpLocation::MapKey(row_id.to_string(), SortedVec::new());
        let diff_value = self.value_to_diff_value(&row, &op_id, obj, loc);
        let mut leaf = Diff::new(obj.clone(), ObjType::Table);
        leaf.prop_entry(row_id.to_string()).insert(op_id, diff_value);
        let wrapped = self.wrapped(ancestors, obj.clone(), leaf);
        self.apply_local(wrapped);
        Ok(row_id)
    }

    pub(crate) fn delete_table_row(
        &mut self,
        ancestors: &[(crdt_protocol::ObjectId, Link)],
        obj: &crdt_protocol::ObjectId,
        row_id: &crdt_protocol::ObjectId,
    ) -> Result<(), InvalidChangeRequest> {
        let key = row_id.to_string();
        let register = self.register_at_key(obj, &key);
        if register.is_empty() {
            return Err(InvalidChangeRequest::PathNotFound(key));
        }
        let pred = Self::predecessors(&register);
        self.push_op(obj.clone(), &OpLocation::MapKey(key.clone(), pred), OpType::Del);
        let mut leaf = Diff::new(obj.clone(), ObjType::Table);
        leaf.props = Some(HashMap::from([(key, HashMap::new())]));
        let wrapped = self.wrapped(ancestors, obj.clone(), leaf);
        self.apply_local(wrapped);
        Ok(())
    }

    /// Turns a [`Value`] being installed at `loc` under `parent` into a
    /// [`DiffValue`], minting whatever ops the value requires: a single
    /// `Set`/`Del`-style op for a primitive, or a `Make` op followed by
    /// one op per nested entry for a composite value. `op_id` is the op
    /// id that names this value's slot (already minted by the caller);
    /// nested contents mint their own further op ids.
    fn value_to_diff_value(
        &mut self,
        value: &Value,
        op_id: &OpId,
        parent: &crdt_protocol::ObjectId,
        loc: OpLocation,
    ) -> DiffValue {
        match value {
            Value::Primitive(p) => {
                let scalar = primitive_to_scalar(p);
                self.push_op(parent.clone(), &loc, OpType::Set(scalar.clone()));
                let datatype = scalar.datatype();
                DiffValue::Value(scalar, datatype)
            }
            Value::Map(m) => self.make_object(op_id.clone(), parent, loc, ObjType::Map, map_entries(m)),
            Value::Table(m) => self.make_object(op_id.clone(), parent, loc, ObjType::Table, map_entries(m)),
            Value::List(items) => {
                self.make_object(op_id.clone(), parent, loc, ObjType::List, EntryList::Positional(items.to_vec()))
            }
            Value::Text(chars) => {
                let items: Vec<Value> = chars.iter().map(|c| Value::from(c.to_string())).collect();
                self.make_object(op_id.clone(), parent, loc, ObjType::Text, EntryList::Positional(items))
            }
        }
    }

    /// Shared implementation for creating a new map/table (entries keyed
    /// by name) or list/text (entries positional) object: emits the
    /// `make*` op at `loc`, then recursively emits the new object's
    /// contents.
    fn make_object(
        &mut self,
        op_id: OpId,
        parent: &crdt_protocol::ObjectId,
        loc: OpLocation,
        kind: ObjType,
        entries: EntryList,
    ) -> DiffValue {
        self.push_op(parent.clone(), &loc, OpType::Make(kind));
        let new_id = crdt_protocol::ObjectId::Id(op_id);
        let mut child_diff = Diff::new(new_id.clone(), kind);

        match entries {
            EntryList::Keyed(pairs) => {
                for (k, v) in pairs {
                    let child_op = self.next_op_id();
                    let child_loc = OpLocation::MapKey(k.to_string(), SortedVec::new());
                    let dv = self.value_to_diff_value(&v, &child_op, &new_id, child_loc);
                    child_diff.prop_entry(k.to_string()).insert(child_op, dv);
                }
            }
            EntryList::Positional(items) => {
                let mut elem = ElementId::Head;
                for (i, v) in items.into_iter().enumerate() {
                    let child_op = self.next_op_id();
                    let child_loc = OpLocation::SeqElem(elem.clone());
                    let dv = self.value_to_diff_value(&v, &child_op, &new_id, child_loc);
                    child_diff.push_edit(DiffEdit::Insert {
                        index: i,
                        elem_id: ElementId::Id(child_op.clone()),
                        op_id: child_op.clone(),
                        value: dv,
                    });
                    elem = ElementId::Id(child_op);
                }
            }
        }

        DiffValue::Object(child_diff)
    }
}

enum EntryList {
    Keyed(Vec<(smol_str::SmolStr, Value)>),
    Positional(Vec<Value>),
}

impl From<Vec<(smol_str::SmolStr, Value)>> for EntryList {
    fn from(v: Vec<(smol_str::SmolStr, Value)>) -> Self {
        EntryList::Keyed(v)
    }
}

impl From<Vec<Value>> for EntryList {
    fn from(v: Vec<Value>) -> Self {
        EntryList::Positional(v)
    }
}

fn map_entries(m: &HashMap<smol_str::SmolStr, Value>) -> EntryList {
    EntryList::Keyed(m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

fn primitive_to_scalar(p: &Primitive) -> ScalarValue {
    match p {
        Primitive::Null => ScalarValue::Null,
        Primitive::Boolean(b) => ScalarValue::Boolean(*b),
        Primitive::Int(i) => ScalarValue::Int(*i),
        Primitive::Uint(u) => ScalarValue::Uint(*u),
        Primitive::F64(f) => ScalarValue::F64(*f),
        Primitive::Str(s) => ScalarValue::Str(s.clone()),
        Primitive::Counter(c) => ScalarValue::Counter(*c),
        Primitive::Timestamp(t) => ScalarValue::Timestamp(*t),
    }
}

/// Unions `src` into `dst`, recursing into a shared nested object when
/// both sides reference it by the same op id (a pass-through routing
/// link), and otherwise letting the later write simply replace the
/// earlier one at that key - the two writes happened in the same change,
/// so "later" already reflects the current state of `working`.
fn merge_diff(dst: &mut Diff, src: Diff) {
    if let Some(src_props) = src.props {
        let dst_props = dst.props.get_or_insert_with(HashMap::new);
        for (key, candidates) in src_props {
            let merged = match dst_props.remove(&key) {
                Some(mut existing) if existing.len() == 1 && candidates.len() == 1 => {
                    let (eop, eval) = existing.drain().next().unwrap();
                    let (iop, ival) = candidates.into_iter().next().unwrap();
                    if eop == iop {
                        match (eval, ival) {
                            (DiffValue::Object(mut ed), DiffValue::Object(id)) => {
                                merge_diff(&mut ed, id);
                                HashMap::from([(eop, DiffValue::Object(ed))])
                            }
                            (_, ival) => HashMap::from([(iop, ival)]),
                        }
                    } else {
                        HashMap::from([(iop, ival)])
                    }
                }
                _ => candidates,
            };
            dst_props.insert(key, merged);
        }
    }
    if let Some(src_edits) = src.edits {
        dst.edits.get_or_insert_with(Vec::new).extend(src_edits);
    }
}
