use std::collections::HashMap;
use std::rc::Rc;

use crdt_protocol::{ElementId, ObjectId, OpId};
use smol_str::SmolStr;

use crate::value::{Primitive, Value};

pub(crate) type ObjectCache = HashMap<ObjectId, Rc<Object>>;

/// A leaf value as stored in the snapshot: either a primitive or a
/// reference to a child object living in the same cache. Keeping object
/// references indirect (by id) rather than embedding the child inline is
/// what lets the patch interpreter update a single object in the cache and
/// leave every other `Rc` in the arena untouched.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Primitive(Primitive),
    Object(ObjectId),
}

/// The candidate set at a key/index: every OpId that currently targets
/// this slot, each with the value it wrote. Empty means absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Register(pub(crate) HashMap<OpId, Cell>);

impl Register {
    pub(crate) fn new() -> Self {
        Register(HashMap::new())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The OpId of the resolved (highest-Lamport-order) candidate.
    pub(crate) fn winning_opid(&self) -> Option<&OpId> {
        self.0.keys().max()
    }

    pub(crate) fn winning_cell(&self) -> Option<&Cell> {
        self.winning_opid().and_then(|id| self.0.get(id))
    }

    pub(crate) fn has_conflicts(&self) -> bool {
        self.0.len() > 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MapKind {
    Map,
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SeqKind {
    List,
    Text,
}

/// One position in a list/text: the ElemId that named this position when
/// it was inserted (stable for the position's life) and the register of
/// candidate values currently occupying it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SeqElement {
    pub(crate) elem_id: ElementId,
    pub(crate) register: Register,
}

/// An object as stored in the snapshot's cache. Every variant carries its
/// own `ObjectId` so that callers holding only a `&Object` can still answer
/// `get_object_id`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Object {
    Map {
        object_id: ObjectId,
        kind: MapKind,
        props: HashMap<String, Register>,
    },
    Sequence {
        object_id: ObjectId,
        kind: SeqKind,
        elements: Vec<SeqElement>,
    },
}

impl Object {
    pub(crate) fn new_map(object_id: ObjectId) -> Self {
        Object::Map {
            object_id,
            kind: MapKind::Map,
            props: HashMap::new(),
        }
    }

    pub(crate) fn new_table(object_id: ObjectId) -> Self {
        Object::Map {
            object_id,
            kind: MapKind::Table,
            props: HashMap::new(),
        }
    }

    pub(crate) fn new_list(object_id: ObjectId) -> Self {
        Object::Sequence {
            object_id,
            kind: SeqKind::List,
            elements: Vec::new(),
        }
    }

    pub(crate) fn new_text(object_id: ObjectId) -> Self {
        Object::Sequence {
            object_id,
            kind: SeqKind::Text,
            elements: Vec::new(),
        }
    }

    pub(crate) fn object_id(&self) -> &ObjectId {
        match self {
            Object::Map { object_id, .. } => object_id,
            Object::Sequence { object_id, .. } => object_id,
        }
    }

    pub(crate) fn is_sequence(&self) -> bool {
        matches!(self, Object::Sequence { .. })
    }

    /// Resolve this object's user-visible [`Value`], recursing into the
    /// supplied cache for any object-valued cells.
    pub(crate) fn resolve(&self, cache: &ObjectCache) -> Value {
        match self {
            Object::Map { kind, props, .. } => {
                let entries = props.iter().filter_map(|(k, reg)| {
                    reg.winning_cell()
                        .map(|cell| (SmolStr::new(k), cell_to_value(cell, cache)))
                });
                match kind {
                    MapKind::Map | MapKind::Table => {
                        let map = entries.collect();
                        if *kind == MapKind::Table {
                            Value::Table(map)
                        } else {
                            Value::Map(map)
                        }
                    }
                }
            }
            Object::Sequence { kind, elements, .. } => match kind {
                SeqKind::List => Value::List(
                    elements
                        .iter()
                        .filter_map(|e| e.register.winning_cell().map(|c| cell_to_value(c, cache)))
                        .collect(),
                ),
                SeqKind::Text => Value::Text(
                    elements
                        .iter()
                        .filter_map(|e| match e.register.winning_cell() {
                            Some(Cell::Primitive(Primitive::Str(s))) => s.chars().next(),
                            _ => None,
                        })
                        .collect(),
                ),
            },
        }
    }
}

pub(crate) fn cell_to_value(cell: &Cell, cache: &ObjectCache) -> Value {
    match cell {
        Cell::Primitive(p) => Value::Primitive(p.clone()),
        Cell::Object(id) => cache
            .get(id)
            .map(|o| o.resolve(cache))
            .unwrap_or(Value::Primitive(Primitive::Null)),
    }
}
