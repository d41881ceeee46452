//! SQL scalar values exchanged with the lookup table.
//!
//! The lookup subsystem never interprets column types beyond what routing
//! needs: null detection, integral detection (used to decide whether a batched
//! IN-list can be regrouped exactly) and conversion of the `to` column into
//! keyspace-id bytes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::VindexError;

/// One SQL scalar value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Null,
    Int64(i64),
    Uint64(u64),
    Text(String),
    VarBinary(Vec<u8>),
}

impl Value {
    /// Returns `true` for SQL `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for signed or unsigned integer values.
    pub fn is_integral(&self) -> bool {
        matches!(self, Self::Int64(_) | Self::Uint64(_))
    }

    /// Converts the value into raw bytes, as stored in a keyspace-id column.
    ///
    /// Integers convert to their decimal text, matching how the storage layer
    /// returns them over the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, VindexError> {
        match self {
            Self::Null => Err(VindexError::NullKeyspaceId),
            Self::Int64(v) => Ok(v.to_string().into_bytes()),
            Self::Uint64(v) => Ok(v.to_string().into_bytes()),
            Self::Text(v) => Ok(v.as_bytes().to_vec()),
            Self::VarBinary(v) => Ok(v.clone()),
        }
    }

    /// Identity used to match a lookup row's echoed id back to the queried id.
    ///
    /// Signed and unsigned integers share one numeric key. Text and binary
    /// compare by their exact bytes. `NULL` has no key: it matches nothing.
    pub fn match_key(&self) -> Option<MatchKey> {
        match self {
            Self::Null => None,
            Self::Int64(v) => Some(MatchKey::Integer(i128::from(*v))),
            Self::Uint64(v) => Some(MatchKey::Integer(i128::from(*v))),
            Self::Text(v) => Some(MatchKey::Bytes(v.as_bytes().to_vec())),
            Self::VarBinary(v) => Some(MatchKey::Bytes(v.clone())),
        }
    }

    /// SQL equality: `NULL` never equals anything, itself included.
    pub fn sql_eq(&self, other: &Value) -> bool {
        match (self.match_key(), other.match_key()) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        }
    }

    /// Human-readable text, as printed in duplicate-key messages.
    pub fn to_sql_string(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Int64(v) => v.to_string(),
            Self::Uint64(v) => v.to_string(),
            Self::Text(v) => v.clone(),
            Self::VarBinary(v) => String::from_utf8_lossy(v).into_owned(),
        }
    }
}

/// See [`Value::match_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchKey {
    Integer(i128),
    Bytes(Vec<u8>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Uint64(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "'{v}'"),
            Self::VarBinary(v) => {
                write!(f, "x'")?;
                for byte in v {
                    write!(f, "{byte:02x}")?;
                }
                write!(f, "'")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Uint64(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::VarBinary(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::VarBinary(value.to_vec())
    }
}

/// Rows returned by one executed statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn new(rows: Vec<Vec<Value>>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Wraps keyspace ids as `VarBinary` values for binding into statements.
pub fn ksids_to_values(ksids: &[Vec<u8>]) -> Vec<Value> {
    ksids
        .iter()
        .map(|ksid| Value::VarBinary(ksid.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_detection() {
        assert!(Value::Int64(-3).is_integral());
        assert!(Value::Uint64(3).is_integral());
        assert!(!Value::from("3").is_integral());
        assert!(!Value::Null.is_integral());
    }

    #[test]
    fn null_cannot_become_keyspace_id() {
        let err = Value::Null.to_bytes().unwrap_err();
        assert!(matches!(err, VindexError::NullKeyspaceId));
        assert_eq!(Value::Int64(42).to_bytes().unwrap(), b"42".to_vec());
        assert_eq!(
            Value::VarBinary(vec![0x16, 0x6b]).to_bytes().unwrap(),
            vec![0x16, 0x6b]
        );
    }

    #[test]
    fn match_keys_are_lossless_and_null_matches_nothing() {
        assert!(!Value::VarBinary(vec![0xff]).sql_eq(&Value::VarBinary(vec![0xfe])));
        assert_eq!(
            Value::VarBinary(vec![0xff]).to_sql_string(),
            Value::VarBinary(vec![0xfe]).to_sql_string()
        );
        assert!(!Value::Null.sql_eq(&Value::Null));
        assert!(!Value::Null.sql_eq(&Value::from("NULL")));
        assert!(Value::Int64(7).sql_eq(&Value::Uint64(7)));
        assert!(!Value::Int64(-1).sql_eq(&Value::Uint64(u64::MAX)));
        assert!(Value::from("ab").sql_eq(&Value::VarBinary(b"ab".to_vec())));
        assert_eq!(Value::Null.match_key(), None);
    }

    #[test]
    fn display_quotes_text_and_hexes_binary() {
        assert_eq!(Value::from("abc").to_string(), "'abc'");
        assert_eq!(Value::VarBinary(vec![0x01, 0xff]).to_string(), "x'01ff'");
        assert_eq!(Value::Null.to_string(), "NULL");
    }
}
