use std::{convert::TryFrom, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::InvalidActorId;

/// An opaque actor identity: lowercase hex, even length, constant for the
/// lifetime of a document instance.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ActorId(Vec<u8>);

impl ActorId {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        ActorId(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex_string(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex_string())
    }
}

impl FromStr for ActorId {
    type Err = InvalidActorId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() % 2 != 0 || s.is_empty() || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InvalidActorId(s.to_string()));
        }
        if s.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(InvalidActorId(s.to_string()));
        }
        hex::decode(s)
            .map(ActorId)
            .map_err(|_| InvalidActorId(s.to_string()))
    }
}

impl TryFrom<String> for ActorId {
    type Error = InvalidActorId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ActorId::from_str(&s)
    }
}

impl From<ActorId> for String {
    fn from(a: ActorId) -> Self {
        a.to_hex_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_hex() {
        let a: ActorId = "abcdef12".parse().unwrap();
        assert_eq!(a.to_hex_string(), "abcdef12");
    }

    #[test]
    fn rejects_odd_length() {
        assert!("abc".parse::<ActorId>().is_err());
    }

    #[test]
    fn rejects_uppercase() {
        assert!("ABCD".parse::<ActorId>().is_err());
    }

    #[test]
    fn rejects_non_hex() {
        assert!("zz11".parse::<ActorId>().is_err());
    }
}
