use std::convert::TryFrom;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// The datatype tag carried alongside a scalar value, used to distinguish
/// numeric representations and CRDT-specific scalars that a bare JSON
/// number cannot express on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    Counter,
    Timestamp,
    Undefined,
}

/// A leaf value: either a JSON-ish primitive or a CRDT-specific scalar
/// (counter, timestamp). Strings are `SmolStr` to match the teacher's
/// preference for cheap small-string storage in map keys and text runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Str(SmolStr),
    Int(i64),
    Uint(u64),
    F64(f64),
    Counter(i64),
    Timestamp(i64),
    Boolean(bool),
    Null,
}

impl ScalarValue {
    pub fn datatype(&self) -> Option<DataType> {
        match self {
            ScalarValue::Counter(_) => Some(DataType::Counter),
            ScalarValue::Timestamp(_) => Some(DataType::Timestamp),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ScalarValue::Int(_) | ScalarValue::Uint(_) | ScalarValue::F64(_)
        )
    }

    pub fn to_i64(&self) -> Option<i64> {
        match self {
            ScalarValue::Int(n) => Some(*n),
            ScalarValue::Uint(n) => i64::try_from(*n).ok(),
            ScalarValue::Counter(n) => Some(*n),
            ScalarValue::Timestamp(n) => Some(*n),
            _ => None,
        }
    }
}

/// The kind of a composite object, as carried on `make*` operations and on
/// `Diff` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjType {
    Map,
    Table,
    List,
    Text,
}

impl ObjType {
    pub fn is_sequence(&self) -> bool {
        matches!(self, ObjType::List | ObjType::Text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_has_counter_datatype() {
        assert_eq!(ScalarValue::Counter(4).datatype(), Some(DataType::Counter));
    }

    #[test]
    fn plain_int_has_no_datatype_tag() {
        assert_eq!(ScalarValue::Int(4).datatype(), None);
    }
}
