use std::{
    cmp::Ordering,
    convert::TryFrom,
    fmt,
    iter::FromIterator,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{actor_id::ActorId, error::InvalidOpId, key::Key, object_id::ObjectId, value::{ObjType, ScalarValue}};

/// `(counter, actor)`, Lamport-ordered: counter ascending, then actor
/// ascending. Rendered as `"counter@actor"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct OpId(pub u64, pub ActorId);

impl OpId {
    pub fn new(counter: u64, actor: &ActorId) -> OpId {
        OpId(counter, actor.clone())
    }

    pub fn actor(&self) -> &ActorId {
        &self.1
    }

    pub fn counter(&self) -> u64 {
        self.0
    }

    pub fn increment_by(&self, by: u64) -> OpId {
        OpId(self.0 + by, self.1.clone())
    }

    /// A contiguous run of `n` op ids starting at this one, sharing this
    /// op id's actor: `(counter+0..n, actor)`. Used to mint the element
    /// ids for a `multi-insert`.
    pub fn run(&self, n: u64) -> Vec<OpId> {
        (0..n).map(|i| self.increment_by(i)).collect()
    }

    /// True if `other` shares this op id's actor and is exactly `delta`
    /// counters ahead of it.
    pub fn delta(&self, other: &Self, delta: u64) -> bool {
        self.1 == other.1 && self.0 + delta == other.0
    }
}

impl Ord for OpId {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.0.cmp(&other.0) {
            Ordering::Equal => self.1.cmp(&other.1),
            ord => ord,
        }
    }
}

impl PartialOrd for OpId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.0, self.1)
    }
}

impl FromStr for OpId {
    type Err = InvalidOpId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('@');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(counter_str), Some(actor_str), None) => {
                let counter: u64 = counter_str
                    .parse()
                    .map_err(|_| InvalidOpId(s.to_string()))?;
                if counter == 0 {
                    return Err(InvalidOpId(s.to_string()));
                }
                let actor = actor_str
                    .parse::<ActorId>()
                    .map_err(|_| InvalidOpId(s.to_string()))?;
                Ok(OpId(counter, actor))
            }
            _ => Err(InvalidOpId(s.to_string())),
        }
    }
}

impl TryFrom<String> for OpId {
    type Error = InvalidOpId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        OpId::from_str(&s)
    }
}

impl From<OpId> for String {
    fn from(id: OpId) -> Self {
        id.to_string()
    }
}

/// The discriminated action of an `Op`.
#[derive(Debug, Clone, PartialEq)]
pub enum OpType {
    Make(ObjType),
    Set(ScalarValue),
    Inc(i64),
    Del,
}

/// A `Vec` that is always kept sorted; used for predecessor sets, where
/// duplicate-free deterministic ordering matters for equality comparisons
/// but a full set type would be overkill for the handful of elements a
/// predecessor list ever holds.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SortedVec<T>(Vec<T>);

impl<T> SortedVec<T> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }
}

impl<T: Ord> From<Vec<T>> for SortedVec<T> {
    fn from(mut v: Vec<T>) -> Self {
        v.sort_unstable();
        Self(v)
    }
}

impl<T: Ord> FromIterator<T> for SortedVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut v: Vec<T> = iter.into_iter().collect();
        v.sort_unstable();
        Self(v)
    }
}

impl<T> IntoIterator for SortedVec<T> {
    type Item = T;
    type IntoIter = <Vec<T> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'de, T> Deserialize<'de> for SortedVec<T>
where
    T: Deserialize<'de> + Ord,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let mut v = Vec::deserialize(deserializer)?;
        v.sort_unstable();
        Ok(Self(v))
    }
}

/// A single CRDT operation as sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    pub action: OpType,
    pub obj: ObjectId,
    pub key: Key,
    pub insert: bool,
    pub pred: SortedVec<OpId>,
}

impl Op {
    pub fn obj_type(&self) -> Option<ObjType> {
        match self.action {
            OpType::Make(o) => Some(o),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_and_parses() {
        let a: ActorId = "ab".parse().unwrap();
        let id = OpId::new(3, &a);
        assert_eq!(id.to_string(), "3@ab");
        assert_eq!("3@ab".parse::<OpId>().unwrap(), id);
    }

    #[test]
    fn lamport_order_by_counter_then_actor() {
        let a: ActorId = "aa".parse().unwrap();
        let b: ActorId = "bb".parse().unwrap();
        assert!(OpId::new(1, &a) < OpId::new(2, &a));
        assert!(OpId::new(1, &a) < OpId::new(1, &b));
    }

    #[test]
    fn run_mints_contiguous_ids() {
        let a: ActorId = "aa".parse().unwrap();
        let base = OpId::new(5, &a);
        let run = base.run(3);
        assert_eq!(run, vec![OpId::new(5, &a), OpId::new(6, &a), OpId::new(7, &a)]);
    }

    #[test]
    fn rejects_zero_counter() {
        assert!("0@aa".parse::<OpId>().is_err());
    }
}
