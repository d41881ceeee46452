//! In-process lookup table implementing [`LookupExecutor`].
//!
//! The store interprets statements by their [`StatementKind`] and bind
//! variables rather than by parsing SQL. It backs the CLI's dry runs and the
//! integration tests, and is small enough to serve as a reference for what a
//! real executor must do with each statement.
//!
//! Uniqueness follows the table layout a lookup vindex expects: the from
//! columns are the primary key of a unique lookup table, and from columns
//! plus the keyspace id column are the key of a non-unique one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::config::LookupConfig;
use crate::error::VindexError;
use crate::executor::{
    BindValue, CommitOrder, LookupContext, LookupExecutor, LookupStatement, StatementKind,
};
use crate::query::insert_bind_name;
use crate::value::{QueryResult, Value};
use crate::vindex::LookupVindex;

/// One stored association.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LookupRow {
    pub from: Vec<Value>,
    pub to: Value,
}

/// Statement as the store received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedStatement {
    pub method: &'static str,
    pub sql: String,
    pub kind: StatementKind,
    pub commit_order: CommitOrder,
    pub rollback_on_error: bool,
}

#[derive(Debug)]
pub struct MemoryLookupStore {
    table: String,
    from_columns: Vec<String>,
    to: String,
    unique: bool,
    in_dml_transaction: AtomicBool,
    rows: Mutex<Vec<LookupRow>>,
    log: Mutex<Vec<ExecutedStatement>>,
}

impl MemoryLookupStore {
    /// Empty table laid out for `config`. `unique` selects the key.
    pub fn new(config: &LookupConfig, unique: bool) -> Self {
        Self {
            table: config.table.clone(),
            from_columns: config.from_columns.clone(),
            to: config.to.clone(),
            unique,
            in_dml_transaction: AtomicBool::new(false),
            rows: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Empty table laid out for `vindex`.
    pub fn for_vindex(vindex: &dyn LookupVindex) -> Self {
        Self::new(vindex.config(), vindex.is_unique())
    }

    /// Marks the bound session as inside a DML transaction, which makes lookups
    /// take the configured read lock.
    pub fn set_in_dml_transaction(&self, in_dml: bool) {
        self.in_dml_transaction.store(in_dml, Ordering::Release);
    }

    /// Stored rows, sorted.
    pub fn rows(&self) -> Vec<LookupRow> {
        let mut rows = lock(&self.rows).map(|rows| rows.clone()).unwrap_or_default();
        rows.sort();
        rows
    }

    pub fn len(&self) -> usize {
        lock(&self.rows).map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Statements received so far, in order.
    pub fn statements(&self) -> Vec<ExecutedStatement> {
        lock(&self.log).map(|log| log.clone()).unwrap_or_default()
    }

    pub fn clear_statements(&self) {
        if let Ok(mut log) = lock(&self.log) {
            log.clear();
        }
    }

    fn key_matches(&self, stored: &LookupRow, candidate: &LookupRow) -> bool {
        stored.from == candidate.from && (self.unique || stored.to == candidate.to)
    }

    fn select(&self, statement: &LookupStatement) -> Result<QueryResult> {
        let ids = bind(statement, self.lookup_column())?.values().to_vec();
        let rows = lock(&self.rows)?;
        let out = rows
            .iter()
            .filter_map(|row| {
                let first = row.from.first()?;
                ids.iter()
                    .any(|id| id.sql_eq(first))
                    .then(|| vec![first.clone(), row.to.clone()])
            })
            .collect();
        Ok(QueryResult::new(out))
    }

    fn verify(&self, statement: &LookupStatement) -> Result<QueryResult> {
        let id = scalar(statement, self.lookup_column())?;
        let to = scalar(statement, &self.to)?;
        let rows = lock(&self.rows)?;
        let out = rows
            .iter()
            .filter(|row| row.from.first().is_some_and(|first| first.sql_eq(&id)) && row.to == to)
            .map(|_| vec![id.clone()])
            .collect();
        Ok(QueryResult::new(out))
    }

    fn insert(&self, statement: &LookupStatement, count: usize, ignore: bool, upsert: bool) -> Result<QueryResult> {
        let mut incoming = Vec::with_capacity(count);
        for row_idx in 0..count {
            let from = self
                .from_columns
                .iter()
                .map(|column| scalar(statement, &insert_bind_name(column, row_idx)))
                .collect::<Result<Vec<_>>>()?;
            let to = scalar(statement, &insert_bind_name(&self.to, row_idx))?;
            incoming.push(LookupRow { from, to });
        }

        let mut rows = lock(&self.rows)?;
        // Applied to a copy so a failed statement leaves the table unchanged.
        let mut next = rows.clone();
        for row in incoming {
            match next.iter().position(|stored| self.key_matches(stored, &row)) {
                None => next.push(row),
                Some(_) if ignore => {}
                Some(idx) if upsert => next[idx] = row,
                Some(_) => {
                    return Err(VindexError::DuplicateKey {
                        table: self.table.clone(),
                        key: self.duplicate_key(&row),
                    }
                    .into())
                }
            }
        }
        *rows = next;
        Ok(QueryResult::default())
    }

    fn delete(&self, statement: &LookupStatement) -> Result<QueryResult> {
        let from = self
            .from_columns
            .iter()
            .map(|column| scalar(statement, column))
            .collect::<Result<Vec<_>>>()?;
        let to = scalar(statement, &self.to)?;
        let mut rows = lock(&self.rows)?;
        rows.retain(|row| !(row.from == from && row.to == to));
        Ok(QueryResult::default())
    }

    fn lookup_column(&self) -> &str {
        self.from_columns.first().map(String::as_str).unwrap_or_default()
    }

    fn duplicate_key(&self, row: &LookupRow) -> String {
        let mut parts: Vec<String> = row.from.iter().map(Value::to_sql_string).collect();
        if !self.unique {
            parts.push(row.to.to_sql_string());
        }
        parts.join("-")
    }
}

#[async_trait]
impl LookupExecutor for MemoryLookupStore {
    async fn execute(
        &self,
        ctx: &LookupContext,
        statement: &LookupStatement,
        commit_order: CommitOrder,
        rollback_on_error: bool,
    ) -> Result<QueryResult> {
        if ctx.is_cancelled() {
            return Err(VindexError::Cancelled.into());
        }
        if ctx.deadline_exceeded() {
            return Err(VindexError::DeadlineExceeded.into());
        }
        lock(&self.log)?.push(ExecutedStatement {
            method: statement.method,
            sql: statement.sql.clone(),
            kind: statement.kind,
            commit_order,
            rollback_on_error,
        });

        match statement.kind {
            StatementKind::Select => self.select(statement),
            StatementKind::Verify => self.verify(statement),
            StatementKind::Insert {
                rows,
                ignore,
                upsert,
            } => self.insert(statement, rows, ignore, upsert),
            StatementKind::Delete => self.delete(statement),
        }
    }

    fn in_transaction_and_is_dml(&self) -> bool {
        self.in_dml_transaction.load(Ordering::Acquire)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| anyhow!("memory lookup store lock poisoned"))
}

fn bind<'a>(statement: &'a LookupStatement, name: &str) -> Result<&'a BindValue> {
    statement
        .bind_var(name)
        .ok_or_else(|| anyhow!("statement {} has no bind variable '{name}'", statement.method))
}

fn scalar(statement: &LookupStatement, name: &str) -> Result<Value> {
    match bind(statement, name)? {
        BindValue::Scalar(value) => Ok(value.clone()),
        BindValue::List(_) => Err(anyhow!(
            "statement {} binds a list to scalar '{name}'",
            statement.method
        )),
    }
}
