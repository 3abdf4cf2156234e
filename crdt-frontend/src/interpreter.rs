//! Folds a `Patch` (or a single `Diff` sub-tree) into a `Snapshot`.
//!
//! This is a pure function: no field of `Snapshot` is mutated in place,
//! every touched object is replaced wholesale and every untouched object
//! keeps the `Rc` it already had. Grounded on the teacher's
//! `ChangeContext::apply_diff`/`apply_diff_helper` (despite living in a
//! file named `change_context.rs` there, that code is patch
//! interpretation, not change capture).

use crdt_protocol::{DataType, Diff, DiffEdit, DiffValue, ElementId, ObjType, OpId, Patch, ScalarValue};

use crate::object::{Cell, Object, Register, SeqElement};
use crate::snapshot::Snapshot;
use crate::value::Primitive;

pub(crate) fn apply_patch(snapshot: &Snapshot, patch: &Patch) -> Snapshot {
    let mut next = apply_diff(snapshot.clone(), &patch.diffs);
    for (actor, seq) in &patch.clock {
        next = next.with_clock(actor.clone(), *seq);
    }
    let max_op = patch.max_op.max(next.max_op);
    next.with_deps(patch.deps.clone(), max_op)
}

pub(crate) fn apply_diff(snapshot: Snapshot, diff: &Diff) -> Snapshot {
    let mut object = snapshot
        .get(&diff.object_id)
        .map(|rc| (**rc).clone())
        .unwrap_or_else(|| blank_object(diff.object_id.clone(), diff.obj_type));

    let mut snapshot = snapshot;

    if let Some(props) = &diff.props {
        for (key, candidates) in props {
            let (new_snapshot, register) = build_register(snapshot, candidates);
            snapshot = new_snapshot;
            set_prop(&mut object, key, register);
        }
    }

    if let Some(edits) = &diff.edits {
        for edit in edits {
            let (new_snapshot, new_object) = apply_edit(snapshot, object, edit);
            snapshot = new_snapshot;
            object = new_object;
        }
    }

    snapshot.with_object(diff.object_id.clone(), object)
}

fn blank_object(id: crdt_protocol::ObjectId, obj_type: ObjType) -> Object {
    match obj_type {
        ObjType::Map => Object::new_map(id),
        ObjType::Table => Object::new_table(id),
        ObjType::List => Object::new_list(id),
        ObjType::Text => Object::new_text(id),
    }
}

fn set_prop(object: &mut Object, key: &str, register: Register) {
    if let Object::Map { props, .. } = object {
        if register.is_empty() {
            props.remove(key);
        } else {
            props.insert(key.to_string(), register);
        }
    }
}

fn build_register(
    mut snapshot: Snapshot,
    candidates: &std::collections::HashMap<OpId, DiffValue>,
) -> (Snapshot, Register) {
    let mut register = Register::new();
    for (op_id, value) in candidates {
        let cell = match value {
            DiffValue::Value(scalar, datatype) => Cell::Primitive(scalar_to_primitive(scalar, *datatype)),
            DiffValue::Object(child_diff) => {
                snapshot = apply_diff(snapshot, child_diff);
                Cell::Object(child_diff.object_id.clone())
            }
        };
        register.0.insert(op_id.clone(), cell);
    }
    (snapshot, register)
}

fn apply_edit(mut snapshot: Snapshot, mut object: Object, edit: &DiffEdit) -> (Snapshot, Object) {
    let elements = match &mut object {
        Object::Sequence { elements, .. } => elements,
        Object::Map { .. } => return (snapshot, object),
    };

    match edit {
        DiffEdit::Insert {
            index,
            elem_id,
            op_id,
            value,
        } => {
            let cell = match value {
                DiffValue::Value(scalar, datatype) => Cell::Primitive(scalar_to_primitive(scalar, *datatype)),
                DiffValue::Object(child) => {
                    snapshot = apply_diff(snapshot, child);
                    Cell::Object(child.object_id.clone())
                }
            };
            let mut register = Register::new();
            register.0.insert(op_id.clone(), cell);
            let idx = (*index).min(elements.len());
            elements.insert(
                idx,
                SeqElement {
                    elem_id: elem_id.clone(),
                    register,
                },
            );
        }
        DiffEdit::MultiInsert {
            index,
            elem_id,
            values,
            datatype,
        } => {
            let base = elem_id.as_opid().cloned();
            for (i, v) in values.iter().enumerate() {
                let this_elem_id = match &base {
                    Some(op) => ElementId::Id(op.increment_by(i as u64)),
                    None => elem_id.clone(),
                };
                let op_id = match this_elem_id.as_opid() {
                    Some(id) => id.clone(),
                    None => continue,
                };
                let cell = Cell::Primitive(scalar_to_primitive(v, *datatype));
                let mut register = Register::new();
                register.0.insert(op_id, cell);
                let idx = (*index + i).min(elements.len());
                elements.insert(
                    idx,
                    SeqElement {
                        elem_id: this_elem_id,
                        register,
                    },
                );
            }
        }
        DiffEdit::Update { index, op_id, value } => {
            if let Some(seq_elem) = elements.get_mut(*index) {
                let cell = match value {
                    DiffValue::Value(scalar, datatype) => Cell::Primitive(scalar_to_primitive(scalar, *datatype)),
                    DiffValue::Object(child) => {
                        snapshot = apply_diff(snapshot, child);
                        Cell::Object(child.object_id.clone())
                    }
                };
                seq_elem.register.0.insert(op_id.clone(), cell);
            }
        }
        DiffEdit::Remove { index, count } => {
            let end = (*index + *count).min(elements.len());
            if *index < end {
                elements.drain(*index..end);
            }
        }
    }

    (snapshot, object)
}

pub(crate) fn scalar_to_primitive(scalar: &ScalarValue, datatype: Option<DataType>) -> Primitive {
    if let Some(DataType::Counter) = datatype {
        return Primitive::Counter(scalar.to_i64().unwrap_or_default());
    }
    if let Some(DataType::Timestamp) = datatype {
        return Primitive::Timestamp(scalar.to_i64().unwrap_or_default());
    }
    match scalar {
        ScalarValue::Str(s) => Primitive::Str(s.clone()),
        ScalarValue::Int(i) => Primitive::Int(*i),
        ScalarValue::Uint(u) => Primitive::Uint(*u),
        ScalarValue::F64(f) => Primitive::F64(*f),
        ScalarValue::Counter(c) => Primitive::Counter(*c),
        ScalarValue::Timestamp(t) => Primitive::Timestamp(*t),
        ScalarValue::Boolean(b) => Primitive::Boolean(*b),
        ScalarValue::Null => Primitive::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crdt_protocol::{ActorId, ObjectId};
    use std::collections::HashMap;

    fn actor(s: &str) -> ActorId {
        s.parse().unwrap()
    }

    fn set_diff(key: &str, op_id: OpId, value: ScalarValue) -> Diff {
        let mut diff = Diff::new(ObjectId::Root, ObjType::Map);
        let mut candidates = HashMap::new();
        candidates.insert(op_id, DiffValue::Value(value, None));
        diff.props = Some(HashMap::from([(key.to_string(), candidates)]));
        diff
    }

    #[test]
    fn single_assignment_is_visible_at_root() {
        let snapshot = Snapshot::empty();
        let a = actor("aa");
        let diff = set_diff("title", OpId::new(1, &a), ScalarValue::Str("hello".into()));
        let next = apply_diff(snapshot, &diff);
        let value = next.root_value();
        assert_eq!(value.map().unwrap().get("title").unwrap().primitive().unwrap(), &Primitive::Str("hello".into()));
    }

    #[test]
    fn nested_map_creation_resolves_through_child() {
        let snapshot = Snapshot::empty();
        let a = actor("aa");
        let child_id = ObjectId::Id(OpId::new(1, &a));
        let mut child_diff = Diff::new(child_id.clone(), ObjType::Map);
        let mut inner_candidates = HashMap::new();
        inner_candidates.insert(OpId::new(2, &a), DiffValue::Value(ScalarValue::Int(42), None));
        child_diff.props = Some(HashMap::from([("count".to_string(), inner_candidates)]));

        let mut root_diff = Diff::new(ObjectId::Root, ObjType::Map);
        let mut root_candidates = HashMap::new();
        root_candidates.insert(OpId::new(1, &a), DiffValue::Object(child_diff));
        root_diff.props = Some(HashMap::from([("child".to_string(), root_candidates)]));

        let next = apply_diff(snapshot, &root_diff);
        let root = next.root_value();
        let child = root.map().unwrap().get("child").unwrap();
        assert_eq!(
            child.map().unwrap().get("count").unwrap().primitive().unwrap(),
            &Primitive::Int(42)
        );
    }

    #[test]
    fn concurrent_assignment_resolves_to_highest_opid() {
        let snapshot = Snapshot::empty();
        let a = actor("aa");
        let b = actor("bb");
        let mut diff = Diff::new(ObjectId::Root, ObjType::Map);
        let mut candidates = HashMap::new();
        candidates.insert(OpId::new(1, &a), DiffValue::Value(ScalarValue::Str("from-a".into()), None));
        candidates.insert(OpId::new(1, &b), DiffValue::Value(ScalarValue::Str("from-b".into()), None));
        diff.props = Some(HashMap::from([("key".to_string(), candidates)]));

        let next = apply_diff(snapshot, &diff);
        let value = next.root_value();
        // 1@bb > 1@aa: actor breaks the counter tie.
        assert_eq!(
            value.map().unwrap().get("key").unwrap().primitive().unwrap(),
            &Primitive::Str("from-b".into())
        );
    }

    #[test]
    fn list_insert_then_remove() {
        let a = actor("aa");
        let list_id = ObjectId::Id(OpId::new(1, &a));
        let mut root_diff = Diff::new(ObjectId::Root, ObjType::Map);
        let mut list_diff = Diff::new(list_id.clone(), ObjType::List);
        list_diff.push_edit(DiffEdit::Insert {
            index: 0,
            elem_id: ElementId::Id(OpId::new(2, &a)),
            op_id: OpId::new(2, &a),
            value: DiffValue::Value(ScalarValue::Int(1), None),
        });
        list_diff.push_edit(DiffEdit::Insert {
            index: 1,
            elem_id: ElementId::Id(OpId::new(3, &a)),
            op_id: OpId::new(3, &a),
            value: DiffValue::Value(ScalarValue::Int(2), None),
        });
        let mut candidates = HashMap::new();
        candidates.insert(OpId::new(1, &a), DiffValue::Object(list_diff));
        root_diff.props = Some(HashMap::from([("items".to_string(), candidates)]));

        let snapshot = apply_diff(Snapshot::empty(), &root_diff);
        let items = snapshot.root_value();
        let items = items.map().unwrap().get("items").unwrap().list().unwrap();
        assert_eq!(items.len(), 2);

        let mut remove_diff = Diff::new(list_id, ObjType::List);
        remove_diff.push_edit(DiffEdit::Remove { index: 0, count: 1 });
        let snapshot = apply_diff(snapshot, &remove_diff);
        let items = snapshot.root_value();
        let items = items.map().unwrap().get("items").unwrap().list().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].primitive().unwrap(), &Primitive::Int(2));
    }

    #[test]
    fn untouched_sibling_object_keeps_its_allocation() {
        let a = actor("aa");
        let sibling_id = ObjectId::Id(OpId::new(1, &a));
        let mut root_diff = Diff::new(ObjectId::Root, ObjType::Map);
        let mut sibling_diff = Diff::new(sibling_id.clone(), ObjType::Map);
        let mut candidates = HashMap::new();
        candidates.insert(OpId::new(2, &a), DiffValue::Value(ScalarValue::Int(1), None));
        sibling_diff.props = Some(HashMap::from([("x".to_string(), candidates)]));
        let mut wrapper = HashMap::new();
        wrapper.insert(OpId::new(1, &a), DiffValue::Object(sibling_diff));
        root_diff.props = Some(HashMap::from([("sibling".to_string(), wrapper)]));

        let before = apply_diff(Snapshot::empty(), &root_diff);

        let mut second_diff = Diff::new(ObjectId::Root, ObjType::Map);
        let mut second_candidates = HashMap::new();
        second_candidates.insert(OpId::new(3, &a), DiffValue::Value(ScalarValue::Int(9), None));
        second_diff.props = Some(HashMap::from([("unrelated".to_string(), second_candidates)]));
        let after = apply_diff(before.clone(), &second_diff);

        assert!(before.is_same_allocation(&after, &sibling_id));
    }
}
