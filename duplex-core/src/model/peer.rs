use serde::{Deserialize, Serialize};
use std::fmt;

/// Joins the two sorted peer ids of a pair key.
pub const PAIR_SEPARATOR: char = '_';

/// Identifier of a chat participant, as issued by the user directory.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A peer as presented to the other side of a chat.
#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
pub struct PeerProfile {
    pub id: PeerId,
    pub name: String,
}

impl PeerProfile {
    pub fn new(id: impl Into<PeerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Order-independent key for a pair of peers: the lexicographically
/// smaller id first, joined with [`PAIR_SEPARATOR`].
pub fn pair_key(a: &PeerId, b: &PeerId) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{}{}{}", low, PAIR_SEPARATOR, high)
}
