//! Statement construction for the lookup table.
//!
//! Read and delete statements are fixed per vindex and built once. Inserts
//! depend on the number of rows and are built per call. Nothing here touches
//! an executor, so planners can inspect the SQL ahead of time.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::config::LookupConfig;
use crate::error::VindexError;
use crate::executor::{BindValue, LookupStatement, StatementKind};
use crate::value::Value;

pub const METHOD_LOOKUP: &str = "VindexLookup";
pub const METHOD_VERIFY: &str = "VindexVerify";
pub const METHOD_CREATE: &str = "VindexCreate";
pub const METHOD_DELETE: &str = "VindexDelete";

const MULTI_SHARD_AUTOCOMMIT_HINT: &str = "/*vt+ MULTI_SHARD_AUTOCOMMIT=1 */";

/// Pre-built SQL for one lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQueries {
    /// `select from0, to from table where from0 in ::from0`.
    pub select: String,
    /// `select` plus the configured lock clause, used inside DML transactions.
    pub select_for_dml: String,
    /// `select from0 from table where from0 = :from0 and to = :to`.
    pub verify: String,
    /// `delete from table where c1 = :c1 and ... and to = :to`.
    pub delete: String,
}

impl LookupQueries {
    /// Builds the fixed statements. Fails when `config` names no `from` column.
    pub fn new(config: &LookupConfig) -> Result<Self, VindexError> {
        let Some(column) = config.from_columns.first() else {
            return Err(VindexError::MissingParam { param: "from" });
        };
        let select = format!(
            "select {column}, {to} from {table} where {column} in ::{column}",
            to = config.to,
            table = config.table,
        );
        let select_for_dml = match config.read_lock.sql_suffix() {
            Some(suffix) => format!("{select} {suffix}"),
            None => select.clone(),
        };
        let verify = format!(
            "select {column} from {table} where {column} = :{column} and {to} = :{to}",
            table = config.table,
            to = config.to,
        );

        let mut delete = format!("delete from {} where ", config.table);
        for (idx, column) in config.from_columns.iter().enumerate() {
            if idx != 0 {
                delete.push_str(" and ");
            }
            let _ = write!(delete, "{column} = :{column}");
        }
        let _ = write!(delete, " and {to} = :{to}", to = config.to);

        Ok(Self {
            select,
            select_for_dml,
            verify,
            delete,
        })
    }

    /// Lookup select for `ids`, bound as one IN-list.
    pub fn select_statement(
        &self,
        config: &LookupConfig,
        for_dml: bool,
        ids: Vec<Value>,
    ) -> LookupStatement {
        let sql = if for_dml {
            self.select_for_dml.clone()
        } else {
            self.select.clone()
        };
        let mut bind_vars = BTreeMap::new();
        bind_vars.insert(config.lookup_column().to_string(), BindValue::List(ids));
        LookupStatement {
            method: METHOD_LOOKUP,
            sql,
            bind_vars,
            kind: StatementKind::Select,
        }
    }

    pub fn verify_statement(&self, config: &LookupConfig, id: &Value, to: &Value) -> LookupStatement {
        let mut bind_vars = BTreeMap::new();
        bind_vars.insert(
            config.lookup_column().to_string(),
            BindValue::Scalar(id.clone()),
        );
        bind_vars.insert(config.to.clone(), BindValue::Scalar(to.clone()));
        LookupStatement {
            method: METHOD_VERIFY,
            sql: self.verify.clone(),
            bind_vars,
            kind: StatementKind::Verify,
        }
    }

    /// Delete for one row. `row` must hold one value per from column.
    pub fn delete_statement(&self, config: &LookupConfig, row: &[Value], to: &Value) -> LookupStatement {
        let mut bind_vars = BTreeMap::new();
        for (column, value) in config.from_columns.iter().zip(row) {
            bind_vars.insert(column.clone(), BindValue::Scalar(value.clone()));
        }
        bind_vars.insert(config.to.clone(), BindValue::Scalar(to.clone()));
        LookupStatement {
            method: METHOD_DELETE,
            sql: self.delete.clone(),
            bind_vars,
            kind: StatementKind::Delete,
        }
    }
}

/// Name of the bind variable holding `column` for insert row `row`.
pub fn insert_bind_name(column: &str, row: usize) -> String {
    format!("{column}_{row}")
}

/// Builds one multi-row insert.
///
/// Rows must already be validated: no NULLs, one value per from column, and
/// `rows.len() == to_values.len()`.
pub fn insert_statement(
    config: &LookupConfig,
    rows: &[Vec<Value>],
    to_values: &[Value],
    ignore: bool,
) -> LookupStatement {
    let verb = if config.multi_shard_autocommit {
        format!("insert {MULTI_SHARD_AUTOCOMMIT_HINT}")
    } else {
        "insert".to_string()
    };
    let mut sql = if ignore {
        format!("{verb} ignore into {}(", config.table)
    } else {
        format!("{verb} into {}(", config.table)
    };
    for column in &config.from_columns {
        let _ = write!(sql, "{column}, ");
    }
    let _ = write!(sql, "{}) values(", config.to);

    let mut bind_vars = BTreeMap::new();
    for (row_idx, (row, to_value)) in rows.iter().zip(to_values).enumerate() {
        if row_idx != 0 {
            sql.push_str(", (");
        }
        for (column, value) in config.from_columns.iter().zip(row) {
            let name = insert_bind_name(column, row_idx);
            let _ = write!(sql, ":{name}, ");
            bind_vars.insert(name, BindValue::Scalar(value.clone()));
        }
        let name = insert_bind_name(&config.to, row_idx);
        let _ = write!(sql, ":{name})");
        bind_vars.insert(name, BindValue::Scalar(to_value.clone()));
    }

    if config.upsert {
        sql.push_str(" on duplicate key update ");
        for column in &config.from_columns {
            let _ = write!(sql, "{column}=values({column}), ");
        }
        let _ = write!(sql, "{to}=values({to})", to = config.to);
    }

    LookupStatement {
        method: METHOD_CREATE,
        sql,
        bind_vars,
        kind: StatementKind::Insert {
            rows: rows.len(),
            ignore,
            upsert: config.upsert,
        },
    }
}
