use std::collections::HashMap;

use crdt_frontend::{Document, InvalidChangeRequest, MutableDocument, Path, Value};
use crdt_protocol::{ActorId, Diff, DiffValue, ObjType, ObjectId, OpId, Patch, ScalarValue};
use maplit::hashmap;
use pretty_assertions::assert_eq;

#[test]
fn a_fresh_document_is_an_empty_map() {
    let doc: Document = Document::init();
    assert_eq!(doc.value(), Value::Map(HashMap::new()));
}

#[test]
fn from_seeds_the_root_map_in_one_change() {
    let initial = hashmap! {
        "wrens".into() => Value::from(3_i64),
        "magpies".into() => Value::from(4_i64),
    };

    let doc: Document = Document::from(Value::Map(initial), Default::default()).unwrap();
    let map = doc.value();
    let map = map.map().unwrap();
    assert_eq!(map.get("wrens").unwrap(), &Value::from(3_i64));
    assert_eq!(map.get("magpies").unwrap(), &Value::from(4_i64));
}

#[test]
fn from_rejects_a_non_map_initial_state() {
    let result: Result<Document, _> = Document::from(Value::from(1_i64), Default::default());
    assert!(result.is_err());
}

#[test]
fn change_bumps_seq_and_records_the_last_local_change() {
    let mut doc: Document = Document::init();
    assert!(doc.get_last_local_change().is_none());

    let change = doc
        .change::<_, InvalidChangeRequest>(Some("first".into()), |d| {
            d.set_map_key(&Path::root(), "k", Value::from(1_i64))?;
            Ok(())
        })
        .unwrap()
        .unwrap();

    assert_eq!(change.seq, 1);
    assert_eq!(change.message.as_deref(), Some("first"));
    assert_eq!(doc.get_last_local_change().unwrap().seq, 1);
}

#[test]
fn empty_change_records_a_message_with_no_ops() {
    let mut doc: Document = Document::init();
    let change = doc.empty_change("checkpoint".to_string());
    assert_eq!(change.seq, 1);
    assert!(change.operations.is_empty());
    assert_eq!(change.message.as_deref(), Some("checkpoint"));
}

#[test]
fn set_actor_id_is_used_for_subsequent_changes() {
    let mut doc: Document = Document::init();
    let actor: ActorId = "aabbccdd".parse().unwrap();
    doc.set_actor_id(actor.clone());

    let change = doc
        .change::<_, InvalidChangeRequest>(None, |d| {
            d.set_map_key(&Path::root(), "k", Value::from(1_i64))?;
            Ok(())
        })
        .unwrap()
        .unwrap();
    assert_eq!(change.actor, actor);
}

#[test]
fn get_conflicts_surfaces_every_candidate_an_applied_patch_left_at_a_key() {
    let mut doc: Document = Document::init();

    let actor_a: ActorId = "aa".parse().unwrap();
    let actor_b: ActorId = "bb".parse().unwrap();
    let mut root = Diff::new(ObjectId::Root, ObjType::Map);
    let entry = root.prop_entry("color");
    entry.insert(
        OpId::new(1, &actor_a),
        DiffValue::Value(ScalarValue::Str("red".into()), None),
    );
    entry.insert(
        OpId::new(1, &actor_b),
        DiffValue::Value(ScalarValue::Str("blue".into()), None),
    );

    doc.apply_patch(Patch {
        actor: None,
        seq: None,
        clock: HashMap::new(),
        deps: Vec::new(),
        max_op: 1,
        diffs: root,
    })
    .unwrap();

    let conflicts = doc.get_conflicts(&Path::root().key("color")).unwrap();
    assert_eq!(conflicts.0.len(), 2);
    assert!(conflicts.0.values().any(|v| v == &Value::from("red")));
    assert!(conflicts.0.values().any(|v| v == &Value::from("blue")));
}

#[test]
fn get_conflicts_is_none_for_an_uncontested_key() {
    let mut doc: Document = Document::init();
    doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.set_map_key(&Path::root(), "k", Value::from(1_i64))?;
        Ok(())
    })
    .unwrap();
    assert!(doc.get_conflicts(&Path::root().key("k")).is_none());
}

#[test]
fn get_actor_id_is_none_until_the_first_change_mints_one() {
    let mut doc: Document = Document::init();
    assert!(doc.get_actor_id().is_none());
    doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.set_map_key(&Path::root(), "k", Value::from(1_i64))?;
        Ok(())
    })
    .unwrap();
    assert!(doc.get_actor_id().is_some());
}

#[test]
fn get_element_ids_tracks_stable_positions_across_a_splice() {
    let mut doc: Document = Document::init();
    doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.set_map_key(&Path::root(), "birds", Value::List(vec![Value::from("wren"), Value::from("magpie")]))?;
        Ok(())
    })
    .unwrap();

    let before = doc.get_element_ids(&Path::root().key("birds")).unwrap();
    assert_eq!(before.len(), 2);

    doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.splice(&Path::root().key("birds"), 0, 0, vec![Value::from("chaffinch")])?;
        Ok(())
    })
    .unwrap();

    let after = doc.get_element_ids(&Path::root().key("birds")).unwrap();
    assert_eq!(after.len(), 3);
    // The two original elements keep their ids; only the new one is unfamiliar.
    assert!(after.contains(&before[0]));
    assert!(after.contains(&before[1]));
}

#[test]
fn get_element_ids_is_none_for_a_map_path() {
    let doc: Document = Document::init();
    assert!(doc.get_element_ids(&Path::root()).is_none());
}
