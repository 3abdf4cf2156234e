use std::collections::HashMap;

use crdt_frontend::{Document, InvalidChangeRequest, MutableDocument, Path, Primitive, Value};
use crdt_protocol::{ObjectId, OpId, OpType};
use pretty_assertions::assert_eq;

#[test]
fn set_and_read_a_map_key() {
    let mut doc: Document = Document::init();
    doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.set_map_key(&Path::root(), "title", Value::from("hello"))?;
        Ok(())
    })
    .unwrap();

    let value = doc.value();
    let map = value.map().unwrap();
    assert_eq!(map.get("title").unwrap(), &Value::from("hello"));
}

#[test]
fn nested_map_creation_is_visible_through_the_parent() {
    let mut doc: Document = Document::init();
    doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.set_map_key(&Path::root(), "profile", Value::Map(HashMap::new()))?;
        d.set_map_key(&Path::root().key("profile"), "name", Value::from("ada"))?;
        Ok(())
    })
    .unwrap();

    let profile = doc.value_at_for_test("profile");
    assert_eq!(profile.map().unwrap().get("name").unwrap(), &Value::from("ada"));
}

#[test]
fn get_object_id_names_a_freshly_created_nested_map() {
    let mut doc: Document = Document::init();
    doc.set_actor_id("aa".parse().unwrap());
    doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.set_map_key(&Path::root(), "birds", Value::Map(HashMap::new()))?;
        d.set_map_key(&Path::root().key("birds"), "wrens", Value::from(3_i64))?;
        Ok(())
    })
    .unwrap();

    let id = doc.get_object_id(&Path::root().key("birds")).unwrap();
    assert_eq!(id, ObjectId::Id(OpId::new(1, &"aa".parse().unwrap())));
    assert_eq!(doc.get_object_id(&Path::root()).unwrap(), ObjectId::Root);
}

#[test]
fn delete_map_key_removes_it() {
    let mut doc: Document = Document::init();
    doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.set_map_key(&Path::root(), "temp", Value::from(1_i64))?;
        Ok(())
    })
    .unwrap();
    doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.delete_map_key(&Path::root(), "temp")?;
        Ok(())
    })
    .unwrap();

    assert!(doc.value().map().unwrap().get("temp").is_none());
}

#[test]
fn push_and_splice_a_list() {
    let mut doc: Document = Document::init();
    doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.set_map_key(&Path::root(), "items", Value::List(Vec::new()))?;
        d.push(&Path::root().key("items"), Value::from(1_i64))?;
        d.push(&Path::root().key("items"), Value::from(2_i64))?;
        d.push(&Path::root().key("items"), Value::from(3_i64))?;
        Ok(())
    })
    .unwrap();

    doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.splice(&Path::root().key("items"), 1, 1, vec![Value::from(9_i64)])?;
        Ok(())
    })
    .unwrap();

    let items = doc.value_at_for_test("items");
    assert_eq!(
        items.list().unwrap(),
        &[Value::from(1_i64), Value::from(9_i64), Value::from(3_i64)]
    );
}

#[test]
fn increment_requires_an_existing_counter() {
    let mut doc: Document = Document::init();
    doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.set_map_key(&Path::root(), "count", Value::from(1_i64))?;
        Ok(())
    })
    .unwrap();

    let result = doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.increment(&Path::root(), "count", 1)?;
        Ok(())
    });
    assert!(matches!(result, Err(InvalidChangeRequest::NotACounter(_))));
}

#[test]
fn adjacent_increments_on_the_same_counter_coalesce_into_one_op() {
    let mut doc: Document = Document::init();
    doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.set_map_key(&Path::root(), "count", Value::Primitive(Primitive::Counter(1)))?;
        Ok(())
    })
    .unwrap();

    let change = doc
        .change::<_, InvalidChangeRequest>(None, |d| {
            d.increment(&Path::root(), "count", 2)?;
            d.increment(&Path::root(), "count", -1)?;
            Ok(())
        })
        .unwrap()
        .unwrap();

    let map = doc.value();
    assert_eq!(
        map.map().unwrap().get("count").unwrap(),
        &Value::Primitive(Primitive::Counter(2))
    );

    let incs: Vec<_> = change
        .operations
        .iter()
        .filter(|op| matches!(op.action, OpType::Inc(_)))
        .collect();
    assert_eq!(incs.len(), 1, "adjacent increments must coalesce into a single op");
    assert!(matches!(incs[0].action, OpType::Inc(1)));
}

#[test]
fn an_increment_separated_by_another_op_does_not_coalesce() {
    let mut doc: Document = Document::init();
    doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.set_map_key(&Path::root(), "count", Value::Primitive(Primitive::Counter(1)))?;
        d.set_map_key(&Path::root(), "other", Value::from(1_i64))?;
        Ok(())
    })
    .unwrap();

    let change = doc
        .change::<_, InvalidChangeRequest>(None, |d| {
            d.increment(&Path::root(), "count", 1)?;
            d.set_map_key(&Path::root(), "other", Value::from(2_i64))?;
            d.increment(&Path::root(), "count", 1)?;
            Ok(())
        })
        .unwrap()
        .unwrap();

    let incs = change
        .operations
        .iter()
        .filter(|op| matches!(op.action, OpType::Inc(_)))
        .count();
    assert_eq!(incs, 2, "an intervening op on another key must break coalescing");
}

#[test]
fn set_list_index_at_len_behaves_as_an_insert() {
    let mut doc: Document = Document::init();
    doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.set_map_key(&Path::root(), "items", Value::List(Vec::new()))?;
        d.push(&Path::root().key("items"), Value::from(1_i64))?;
        Ok(())
    })
    .unwrap();

    doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.set_list_index(&Path::root().key("items"), 1, Value::from(2_i64))?;
        Ok(())
    })
    .unwrap();

    let items = doc.value_at_for_test("items");
    assert_eq!(items.list().unwrap(), &[Value::from(1_i64), Value::from(2_i64)]);
}

#[test]
fn set_list_index_past_the_end_is_out_of_bounds() {
    let mut doc: Document = Document::init();
    doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.set_map_key(&Path::root(), "items", Value::List(Vec::new()))?;
        d.push(&Path::root().key("items"), Value::from(1_i64))?;
        Ok(())
    })
    .unwrap();

    let result = doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.set_list_index(&Path::root().key("items"), 5, Value::from(2_i64))?;
        Ok(())
    });
    assert!(matches!(result, Err(InvalidChangeRequest::IndexOutOfBounds { .. })));
}

#[test]
fn setting_the_same_primitive_value_is_a_no_op_change() {
    let mut doc: Document = Document::init();
    doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.set_map_key(&Path::root(), "title", Value::from("hello"))?;
        Ok(())
    })
    .unwrap();

    let change = doc
        .change::<_, InvalidChangeRequest>(None, |d| {
            d.set_map_key(&Path::root(), "title", Value::from("hello"))?;
            Ok(())
        })
        .unwrap();
    assert!(change.is_none());
}

#[test]
fn writing_through_a_missing_path_is_an_error() {
    let mut doc: Document = Document::init();
    let result = doc.change::<_, InvalidChangeRequest>(None, |d| {
        d.set_map_key(&Path::root().key("missing"), "k", Value::from(1_i64))?;
        Ok(())
    });
    assert!(matches!(result, Err(InvalidChangeRequest::PathNotFound(_))));
}

/// Small helper since the public API only exposes the whole document's
/// value and `get_object_by_id`; tests that want a single key's value walk
/// the map themselves.
trait ValueAtForTest {
    fn value_at_for_test(&self, key: &str) -> Value;
}

impl<B: crdt_frontend::Backend> ValueAtForTest for Document<B> {
    fn value_at_for_test(&self, key: &str) -> Value {
        self.value().map().unwrap().get(key).cloned().unwrap()
    }
}
