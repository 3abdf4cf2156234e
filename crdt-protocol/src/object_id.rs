use std::{cmp::Ordering, fmt, str::FromStr};

use crate::{error::InvalidObjectId, op::OpId};

/// The identity of an object in the document tree: either the fixed root
/// sentinel, or the op id of the operation that created the object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectId {
    Root,
    Id(OpId),
}

impl ObjectId {
    pub fn is_root(&self) -> bool {
        matches!(self, ObjectId::Root)
    }

    pub fn as_opid(&self) -> Option<&OpId> {
        match self {
            ObjectId::Root => None,
            ObjectId::Id(id) => Some(id),
        }
    }
}

impl Ord for ObjectId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ObjectId::Root, ObjectId::Root) => Ordering::Equal,
            (ObjectId::Root, _) => Ordering::Less,
            (_, ObjectId::Root) => Ordering::Greater,
            (ObjectId::Id(a), ObjectId::Id(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for ObjectId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<OpId> for ObjectId {
    fn from(id: OpId) -> Self {
        ObjectId::Id(id)
    }
}

impl From<&OpId> for ObjectId {
    fn from(id: &OpId) -> Self {
        ObjectId::Id(id.clone())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Root => write!(f, "_root"),
            ObjectId::Id(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for ObjectId {
    type Err = InvalidObjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "_root" {
            Ok(ObjectId::Root)
        } else {
            s.parse::<OpId>()
                .map(ObjectId::Id)
                .map_err(|_| InvalidObjectId(s.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_less_than_any_id() {
        let other: ObjectId = "1@aa".parse().unwrap();
        assert!(ObjectId::Root < other);
    }

    #[test]
    fn round_trips_root() {
        assert_eq!("_root".parse::<ObjectId>().unwrap(), ObjectId::Root);
        assert_eq!(ObjectId::Root.to_string(), "_root");
    }
}
