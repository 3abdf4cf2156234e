use std::collections::HashMap;

use crdt_frontend::{Document, Value};
use crdt_protocol::{ActorId, Diff, DiffEdit, DiffValue, ElementId, ObjType, ObjectId, OpId, Patch, ScalarValue};
use pretty_assertions::assert_eq;

fn apply(doc: &mut Document, diffs: Diff) {
    doc.apply_patch(Patch {
        actor: None,
        seq: None,
        clock: HashMap::new(),
        deps: Vec::new(),
        max_op: 100,
        diffs,
    })
    .unwrap();
}

#[test]
fn a_patch_creating_a_nested_map_is_visible_through_the_root() {
    let mut doc: Document = Document::init();
    let actor: ActorId = "aa".parse().unwrap();

    let child_id = ObjectId::Id(OpId::new(1, &actor));
    let mut child = Diff::new(child_id.clone(), ObjType::Map);
    child
        .prop_entry("name")
        .insert(OpId::new(2, &actor), DiffValue::Value(ScalarValue::Str("ada".into()), None));

    let mut root = Diff::new(ObjectId::Root, ObjType::Map);
    root.prop_entry("profile")
        .insert(OpId::new(1, &actor), DiffValue::Object(child));

    apply(&mut doc, root);

    let value = doc.value();
    let profile = value.map().unwrap().get("profile").unwrap();
    assert_eq!(profile.map().unwrap().get("name").unwrap(), &Value::from("ada"));
}

#[test]
fn a_patch_inserting_list_elements_then_removing_one_lands_on_the_remaining_values() {
    let mut doc: Document = Document::init();
    let actor: ActorId = "aa".parse().unwrap();

    let list_id = ObjectId::Id(OpId::new(1, &actor));
    let mut list = Diff::new(list_id.clone(), ObjType::List);
    list.push_edit(DiffEdit::MultiInsert {
        index: 0,
        elem_id: ElementId::Id(OpId::new(2, &actor)),
        values: vec![ScalarValue::Int(1), ScalarValue::Int(2), ScalarValue::Int(3)],
        datatype: None,
    });

    let mut root = Diff::new(ObjectId::Root, ObjType::Map);
    root.prop_entry("items")
        .insert(OpId::new(1, &actor), DiffValue::Object(list));
    apply(&mut doc, root);

    // The snapshot's object cache is keyed globally by object id, so a
    // patch naming the list's own id updates it in place without needing
    // to be re-wrapped under the root - the root's reference to this
    // object id is unaffected.
    let mut remove = Diff::new(list_id, ObjType::List);
    remove.push_edit(DiffEdit::Remove { index: 1, count: 1 });
    apply(&mut doc, remove);

    let value = doc.value();
    let items = value.map().unwrap().get("items").unwrap().list().unwrap();
    assert_eq!(items, &[Value::from(1_i64), Value::from(3_i64)]);
}

#[test]
fn concurrent_writers_to_the_same_key_resolve_to_the_higher_op_id() {
    let mut doc: Document = Document::init();
    let low: ActorId = "aa".parse().unwrap();
    let high: ActorId = "bb".parse().unwrap();

    let mut root = Diff::new(ObjectId::Root, ObjType::Map);
    let entry = root.prop_entry("key");
    entry.insert(OpId::new(1, &low), DiffValue::Value(ScalarValue::Str("low".into()), None));
    entry.insert(OpId::new(1, &high), DiffValue::Value(ScalarValue::Str("high".into()), None));
    apply(&mut doc, root);

    assert_eq!(doc.value().map().unwrap().get("key").unwrap(), &Value::from("high"));
}
