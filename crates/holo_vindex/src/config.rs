//! Immutable lookup-table configuration.

use serde::{Deserialize, Serialize};

use crate::error::VindexError;
use crate::params::{
    bool_from_map, parse_from_columns, required_param, CommonConfig, ReadLock, VindexParams,
    PARAM_BATCH_LOOKUP, PARAM_FROM, PARAM_IGNORE_NULLS, PARAM_READ_LOCK, PARAM_TABLE, PARAM_TO,
};

/// Backing table layout and behavior flags of one lookup vindex.
///
/// This is also the document exported to schema tooling, so the serialized
/// field names are part of the external surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Backing table, optionally `keyspace.table`.
    pub table: String,
    /// Value-side columns, in declaration order.
    pub from_columns: Vec<String>,
    /// Keyspace-id column.
    pub to: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub autocommit: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub multi_shard_autocommit: bool,
    /// Inserts carry `on duplicate key update`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub upsert: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore_nulls: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub batch_lookup: bool,
    #[serde(default, skip_serializing_if = "ReadLock::is_default")]
    pub read_lock: ReadLock,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl LookupConfig {
    /// Builds the configuration from a vindex option map.
    ///
    /// `upsert` is decided by the vindex type, not by the options: unique
    /// lookups never upsert.
    pub fn from_params(
        params: &VindexParams,
        common: CommonConfig,
        upsert: bool,
    ) -> Result<Self, VindexError> {
        let table = required_param(params, PARAM_TABLE)?.to_string();
        let from_columns = parse_from_columns(required_param(params, PARAM_FROM)?)?;
        let to = required_param(params, PARAM_TO)?.to_string();
        if from_columns
            .iter()
            .any(|column| column.eq_ignore_ascii_case(to.as_str()))
        {
            return Err(VindexError::InvalidParam {
                param: PARAM_TO.to_string(),
                reason: format!("column '{to}' is also listed in 'from'"),
            });
        }

        let read_lock = match params.get(PARAM_READ_LOCK) {
            Some(raw) => ReadLock::parse(raw.trim())?,
            None => ReadLock::default(),
        };

        Ok(Self {
            table,
            from_columns,
            to,
            autocommit: common.autocommit,
            multi_shard_autocommit: common.multi_shard_autocommit,
            upsert,
            ignore_nulls: bool_from_map(params, PARAM_IGNORE_NULLS)?,
            batch_lookup: bool_from_map(params, PARAM_BATCH_LOOKUP)?,
            read_lock,
        })
    }

    /// Keyspace qualifier of the backing table, if any.
    pub fn keyspace(&self) -> Option<&str> {
        self.table.split_once('.').map(|(keyspace, _)| keyspace)
    }

    /// Backing table name without its keyspace qualifier.
    pub fn table_name(&self) -> &str {
        self.table
            .split_once('.')
            .map(|(_, table)| table)
            .unwrap_or(self.table.as_str())
    }

    /// Column used for lookups and verification.
    ///
    /// Multi-column lookups are keyed by their first column on the read path;
    /// writes use every column. Empty when no `from` column is configured.
    pub fn lookup_column(&self) -> &str {
        self.from_columns.first().map(String::as_str).unwrap_or_default()
    }
}
