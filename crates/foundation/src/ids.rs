use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const REGISTRATION_PREFIX: &str = "layertree-";

/// Multiplier used when deriving a child id from its parent id.
pub const CHILD_ID_STRIDE: i64 = 1000;

/// Identifies one registration (a caller-declared layer or layer group).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationId(pub u64);

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{REGISTRATION_PREFIX}{}", self.0)
    }
}

/// Sub-layer id as reported by a remote map service.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubLayerId(pub i64);

impl SubLayerId {
    /// Services report `-1` as the parent of top-level sub-layers.
    pub const NONE: SubLayerId = SubLayerId(-1);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl fmt::Display for SubLayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one item in a normalized tree.
///
/// The root of every tree is keyed by its registration, so a registration can
/// never collide with a numeric sub-layer or synthesized child id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeId {
    Registration(RegistrationId),
    Item(i64),
}

impl NodeId {
    pub fn item(id: i64) -> Self {
        NodeId::Item(id)
    }

    pub fn sublayer(id: SubLayerId) -> Self {
        NodeId::Item(id.0)
    }

    /// Numeric value used as the base of derived child ids. `None` when a
    /// registration id does not fit in an `i64`.
    pub fn ordinal(self) -> Option<i64> {
        match self {
            NodeId::Registration(r) => i64::try_from(r.0).ok(),
            NodeId::Item(n) => Some(n),
        }
    }

    pub fn as_sublayer(self) -> Option<SubLayerId> {
        match self {
            NodeId::Registration(_) => None,
            NodeId::Item(n) => Some(SubLayerId(n)),
        }
    }

    /// Deterministic id for the `index`-th child of `parent`.
    ///
    /// Ids are `parent * 1000 + index`. Distinct positions can map to the same
    /// id once a parent has 1000 or more children, and the id space runs out
    /// after a handful of nesting levels; callers must validate the result.
    pub fn child(parent: NodeId, index: usize) -> Option<NodeId> {
        let index = i64::try_from(index).ok()?;
        parent
            .ordinal()?
            .checked_mul(CHILD_ID_STRIDE)?
            .checked_add(index)
            .map(NodeId::Item)
    }
}

impl From<RegistrationId> for NodeId {
    fn from(value: RegistrationId) -> Self {
        NodeId::Registration(value)
    }
}

impl From<SubLayerId> for NodeId {
    fn from(value: SubLayerId) -> Self {
        NodeId::sublayer(value)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Registration(r) => r.fmt(f),
            NodeId::Item(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNodeIdError(String);

impl fmt::Display for ParseNodeIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid node id: {:?}", self.0)
    }
}

impl std::error::Error for ParseNodeIdError {}

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix(REGISTRATION_PREFIX) {
            return rest
                .parse::<u64>()
                .map(|n| NodeId::Registration(RegistrationId(n)))
                .map_err(|_| ParseNodeIdError(s.to_string()));
        }
        s.parse::<i64>()
            .map(NodeId::Item)
            .map_err(|_| ParseNodeIdError(s.to_string()))
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            NodeId::Registration(r) => serializer.collect_str(r),
            NodeId::Item(n) => serializer.serialize_i64(*n),
        }
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(NodeId::Item(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
