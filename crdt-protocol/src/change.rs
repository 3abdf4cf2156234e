use crate::{actor_id::ActorId, op::Op};

/// Opaque hash of a change, used purely as an equality-comparable causal
/// dependency marker; the frontend never inspects its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangeHash(pub [u8; 32]);

impl ChangeHash {
    pub fn zero() -> Self {
        ChangeHash([0; 32])
    }
}

impl From<&[u8]> for ChangeHash {
    fn from(bytes: &[u8]) -> Self {
        let mut array = [0; 32];
        array.copy_from_slice(bytes);
        ChangeHash(array)
    }
}

/// The atomic unit sent to the backend: a batch of ops with metadata. The
/// `Eq` impl deliberately ignores nothing — unlike the teacher's
/// `automerge::legacy::Change`, there is no optional content hash field to
/// exclude, since hashing a change is the backend's job, not this crate's.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub actor: ActorId,
    pub seq: u64,
    pub start_op: u64,
    pub time: i64,
    pub message: Option<String>,
    pub deps: Vec<ChangeHash>,
    pub operations: Vec<Op>,
}
