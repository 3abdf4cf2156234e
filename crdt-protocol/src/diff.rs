use std::collections::HashMap;

use crate::{
    actor_id::ActorId, change::ChangeHash, key::ElementId, object_id::ObjectId, op::OpId,
    value::{DataType, ObjType, ScalarValue},
};

/// One candidate value inside a `props` entry: either a leaf scalar (with
/// its optional datatype tag) or a nested object diff.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffValue {
    Value(ScalarValue, Option<DataType>),
    Object(Diff),
}

/// One edit against a list/text's sequence of positions. `edits` within a
/// single `Diff` are applied in order, each acting on the position space
/// left by the previous ones.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffEdit {
    Insert {
        index: usize,
        elem_id: ElementId,
        op_id: OpId,
        value: DiffValue,
    },
    MultiInsert {
        index: usize,
        elem_id: ElementId,
        values: Vec<ScalarValue>,
        datatype: Option<DataType>,
    },
    Update {
        index: usize,
        op_id: OpId,
        value: DiffValue,
    },
    Remove {
        index: usize,
        count: usize,
    },
}

/// A node in the patch tree: identifies the object it describes and either
/// its map/table properties (key -> candidate OpId -> value) or its
/// sequence edits. An empty candidate map for a key signals removal of
/// that key.
#[derive(Debug, Clone, PartialEq)]
pub struct Diff {
    pub object_id: ObjectId,
    pub obj_type: ObjType,
    pub props: Option<HashMap<String, HashMap<OpId, DiffValue>>>,
    pub edits: Option<Vec<DiffEdit>>,
}

impl Diff {
    pub fn new(object_id: ObjectId, obj_type: ObjType) -> Self {
        Diff {
            object_id,
            obj_type,
            props: None,
            edits: None,
        }
    }

    pub fn is_sequence(&self) -> bool {
        self.obj_type.is_sequence()
    }

    pub fn prop_entry(&mut self, key: impl Into<String>) -> &mut HashMap<OpId, DiffValue> {
        self.props
            .get_or_insert_with(HashMap::new)
            .entry(key.into())
            .or_insert_with(HashMap::new)
    }

    pub fn push_edit(&mut self, edit: DiffEdit) {
        self.edits.get_or_insert_with(Vec::new).push(edit);
    }
}

/// What the backend hands back to the frontend: the state vector the
/// frontend should now consider authoritative, plus the diff tree to fold
/// into the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub actor: Option<ActorId>,
    pub seq: Option<u64>,
    pub clock: HashMap<ActorId, u64>,
    pub deps: Vec<ChangeHash>,
    pub max_op: u64,
    pub diffs: Diff,
}
