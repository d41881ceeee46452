//! Routing results produced by vindex lookups.
//!
//! A destination tells the planner where rows for one input value live: no
//! shard, exactly one keyspace id, a set of keyspace ids, or a key range. The
//! full key range (both bounds empty) means "every shard".

use std::fmt;

use serde::{Deserialize, Serialize};

/// Keyspace-id range `[start, end)`; empty bounds are open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyRange {
    /// Inclusive start bound (empty means unbounded).
    pub start: Vec<u8>,
    /// Exclusive end bound (empty means unbounded).
    pub end: Vec<u8>,
}

impl KeyRange {
    /// Returns the range covering every keyspace id.
    pub fn full() -> Self {
        Self::default()
    }

    /// Returns `true` when both bounds are open.
    pub fn is_full(&self) -> bool {
        self.start.is_empty() && self.end.is_empty()
    }

    /// Checks whether `ksid` falls inside the range.
    pub fn contains(&self, ksid: &[u8]) -> bool {
        let in_start = self.start.is_empty() || ksid >= self.start.as_slice();
        let in_end = self.end.is_empty() || ksid < self.end.as_slice();
        in_start && in_end
    }
}

/// Shard routing result for one input value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardDestination {
    /// The value has no mapping.
    None,
    /// The value maps to exactly one keyspace id.
    KeyspaceId(Vec<u8>),
    /// The value maps to zero or more keyspace ids.
    KeyspaceIds(Vec<Vec<u8>>),
    /// The value's shard is only known to be inside this range.
    KeyRange(KeyRange),
}

impl ShardDestination {
    /// Destination that sends the query to every shard.
    pub fn full_scatter() -> Self {
        Self::KeyRange(KeyRange::full())
    }

    pub fn is_full_scatter(&self) -> bool {
        matches!(self, Self::KeyRange(range) if range.is_full())
    }

    /// Returns `true` when no shard can own the value. An empty id set counts.
    pub fn is_none(&self) -> bool {
        match self {
            Self::None => true,
            Self::KeyspaceIds(ids) => ids.is_empty(),
            Self::KeyspaceId(_) | Self::KeyRange(_) => false,
        }
    }

    /// Returns `true` when `ksid` is a possible owner under this destination.
    pub fn contains_keyspace_id(&self, ksid: &[u8]) -> bool {
        match self {
            Self::None => false,
            Self::KeyspaceId(id) => id.as_slice() == ksid,
            Self::KeyspaceIds(ids) => ids.iter().any(|id| id.as_slice() == ksid),
            Self::KeyRange(range) => range.contains(ksid),
        }
    }

    /// Returns the explicit keyspace ids carried by this destination.
    pub fn keyspace_ids(&self) -> Vec<&[u8]> {
        match self {
            Self::KeyspaceId(id) => vec![id.as_slice()],
            Self::KeyspaceIds(ids) => ids.iter().map(Vec::as_slice).collect(),
            Self::None | Self::KeyRange(_) => Vec::new(),
        }
    }
}

impl fmt::Display for ShardDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "DestinationNone()"),
            Self::KeyspaceId(id) => write!(f, "DestinationKeyspaceID({})", hex(id)),
            Self::KeyspaceIds(ids) => {
                write!(f, "DestinationKeyspaceIDs(")?;
                for (idx, id) in ids.iter().enumerate() {
                    if idx != 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", hex(id))?;
                }
                write!(f, ")")
            }
            Self::KeyRange(range) => {
                write!(f, "DestinationKeyRange({}-{})", hex(&range.start), hex(&range.end))
            }
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
