//! Flat option-map parsing for vindex definitions.
//!
//! Vindexes are declared with a string-keyed map of options. Required keys are
//! validated when the vindex is built; keys nobody recognizes are collected so
//! operators can spot typos without the definition failing to load.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::VindexError;

/// Option map attached to a vindex definition.
pub type VindexParams = BTreeMap<String, String>;

pub const PARAM_TABLE: &str = "table";
pub const PARAM_FROM: &str = "from";
pub const PARAM_TO: &str = "to";
pub const PARAM_AUTOCOMMIT: &str = "autocommit";
pub const PARAM_MULTI_SHARD_AUTOCOMMIT: &str = "multi_shard_autocommit";
pub const PARAM_IGNORE_NULLS: &str = "ignore_nulls";
pub const PARAM_BATCH_LOOKUP: &str = "batch_lookup";
pub const PARAM_READ_LOCK: &str = "read_lock";
pub const PARAM_WRITE_ONLY: &str = "write_only";
pub const PARAM_NO_VERIFY: &str = "no_verify";

/// Keys understood by the shared lookup engine.
pub const LOOKUP_COMMON_PARAMS: &[&str] = &[
    PARAM_AUTOCOMMIT,
    PARAM_IGNORE_NULLS,
    PARAM_MULTI_SHARD_AUTOCOMMIT,
    PARAM_READ_LOCK,
    PARAM_TABLE,
    PARAM_FROM,
    PARAM_TO,
    PARAM_BATCH_LOOKUP,
];

/// Keys the `lookup` and `lookup_unique` types add on top of the engine's.
pub const LOOKUP_VINDEX_PARAMS: &[&str] = &[PARAM_NO_VERIFY, PARAM_WRITE_ONLY];

const LOOKUP_PARAM_COUNT: usize = LOOKUP_COMMON_PARAMS.len() + LOOKUP_VINDEX_PARAMS.len();

/// Keys understood by the `lookup` and `lookup_unique` vindex types.
pub const LOOKUP_PARAMS: &[&str] =
    &concat_params::<LOOKUP_PARAM_COUNT>(LOOKUP_COMMON_PARAMS, LOOKUP_VINDEX_PARAMS);

const fn concat_params<const N: usize>(
    head: &[&'static str],
    tail: &[&'static str],
) -> [&'static str; N] {
    let mut out = [""; N];
    let mut i = 0;
    while i < head.len() {
        out[i] = head[i];
        i += 1;
    }
    let mut j = 0;
    while j < tail.len() {
        out[i + j] = tail[j];
        j += 1;
    }
    out
}

/// Lock clause appended to the lookup select inside DML transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadLock {
    #[default]
    Exclusive,
    Shared,
    None,
}

impl ReadLock {
    pub fn parse(raw: &str) -> Result<Self, VindexError> {
        match raw {
            "exclusive" => Ok(Self::Exclusive),
            "shared" => Ok(Self::Shared),
            "none" => Ok(Self::None),
            other => Err(VindexError::InvalidParam {
                param: PARAM_READ_LOCK.to_string(),
                reason: format!("'{other}' is not one of exclusive, shared, none"),
            }),
        }
    }

    /// SQL suffix for this lock mode, `None` when no lock is taken.
    pub fn sql_suffix(self) -> Option<&'static str> {
        match self {
            Self::Exclusive => Some("for update"),
            Self::Shared => Some("lock in share mode"),
            Self::None => None,
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::Exclusive
    }
}

/// Options shared by every lookup vindex type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommonConfig {
    pub autocommit: bool,
    pub multi_shard_autocommit: bool,
}

impl CommonConfig {
    pub fn parse(params: &VindexParams) -> Result<Self, VindexError> {
        Ok(Self {
            autocommit: bool_from_map(params, PARAM_AUTOCOMMIT)?,
            multi_shard_autocommit: bool_from_map(params, PARAM_MULTI_SHARD_AUTOCOMMIT)?,
        })
    }
}

/// Reads an optional boolean option. Absent keys read as `false`.
pub fn bool_from_map(params: &VindexParams, key: &str) -> Result<bool, VindexError> {
    match params.get(key).map(String::as_str) {
        None => Ok(false),
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(VindexError::InvalidBool {
            param: key.to_string(),
            value: other.to_string(),
        }),
    }
}

/// Reads a required, non-blank option.
pub fn required_param<'a>(
    params: &'a VindexParams,
    key: &'static str,
) -> Result<&'a str, VindexError> {
    params
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .ok_or(VindexError::MissingParam { param: key })
}

/// Splits the comma-separated `from` option into column names.
pub fn parse_from_columns(raw: &str) -> Result<Vec<String>, VindexError> {
    let mut columns = Vec::new();
    let mut seen = BTreeSet::new();
    for column in raw.split(',').map(str::trim) {
        if column.is_empty() {
            return Err(VindexError::InvalidParam {
                param: PARAM_FROM.to_string(),
                reason: format!("empty column name in '{raw}'"),
            });
        }
        if !seen.insert(column.to_ascii_lowercase()) {
            return Err(VindexError::InvalidParam {
                param: PARAM_FROM.to_string(),
                reason: format!("duplicate column '{column}'"),
            });
        }
        columns.push(column.to_string());
    }
    Ok(columns)
}

/// Returns the keys of `params` that are not in `known`, sorted.
pub fn find_unknown_params(params: &VindexParams, known: &[&str]) -> Vec<String> {
    params
        .keys()
        .filter(|key| !known.contains(&key.as_str()))
        .cloned()
        .collect()
}
