use std::{cmp::Ordering, str::FromStr};

use crate::{error::InvalidElementId, op::OpId};

/// A position in a list/text: either the head sentinel (insert at the
/// front) or the op id of the insertion that created that position. Stable
/// for the lifetime of the position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementId {
    Head,
    Id(OpId),
}

impl ElementId {
    pub fn as_opid(&self) -> Option<&OpId> {
        match self {
            ElementId::Head => None,
            ElementId::Id(id) => Some(id),
        }
    }

    pub fn not_head(&self) -> bool {
        !matches!(self, ElementId::Head)
    }

    pub fn increment_by(&self, by: u64) -> Option<Self> {
        match self {
            ElementId::Head => None,
            ElementId::Id(id) => Some(ElementId::Id(id.increment_by(by))),
        }
    }
}

impl Ord for ElementId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ElementId::Head, ElementId::Head) => Ordering::Equal,
            (ElementId::Head, _) => Ordering::Less,
            (_, ElementId::Head) => Ordering::Greater,
            (ElementId::Id(a), ElementId::Id(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for ElementId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<OpId> for ElementId {
    fn from(id: OpId) -> Self {
        ElementId::Id(id)
    }
}

impl FromStr for ElementId {
    type Err = InvalidElementId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "_head" {
            Ok(ElementId::Head)
        } else {
            s.parse::<OpId>()
                .map(ElementId::Id)
                .map_err(|_| InvalidElementId(s.to_string()))
        }
    }
}

/// A key into a map/table (a string) or into a list/text (an `ElementId`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Map(String),
    Seq(ElementId),
}

impl Key {
    pub fn head() -> Key {
        Key::Seq(ElementId::Head)
    }

    pub fn is_map_key(&self) -> bool {
        matches!(self, Key::Map(_))
    }

    pub fn as_element_id(&self) -> Option<ElementId> {
        match self {
            Key::Map(_) => None,
            Key::Seq(id) => Some(id.clone()),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Map(s.to_string())
    }
}

impl From<ElementId> for Key {
    fn from(id: ElementId) -> Self {
        Key::Seq(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor_id::ActorId;

    #[test]
    fn head_orders_before_any_opid() {
        let a: ActorId = "aa".parse().unwrap();
        assert!(ElementId::Head < ElementId::Id(OpId::new(1, &a)));
    }

    #[test]
    fn parses_head_sentinel() {
        assert_eq!("_head".parse::<ElementId>().unwrap(), ElementId::Head);
    }
}
