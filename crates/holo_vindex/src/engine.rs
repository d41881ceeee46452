//! Lookup engine shared by every lookup vindex type.
//!
//! The engine turns ids into statements against the backing lookup table and
//! runs them through the caller's executor. It owns the batching decision, the
//! regrouping of batched rows back into input order, the null policy on
//! writes and the autocommit rules. It performs no retries: executor errors
//! come back to the caller exactly as the executor produced them.

use std::collections::HashMap;
use std::time::Instant;

use anyhow::{anyhow, Result};
use tracing::debug;

use crate::config::LookupConfig;
use crate::error::VindexError;
use crate::executor::{CommitOrder, LookupContext, LookupExecutor, LookupStatement};
use crate::params::{CommonConfig, VindexParams};
use crate::query::{insert_statement, LookupQueries};
use crate::querylog::LookupEvent;
use crate::value::{MatchKey, QueryResult, Value};

/// Executes lookup-table reads and writes for one vindex.
#[derive(Debug, Clone)]
pub struct LookupEngine {
    config: LookupConfig,
    queries: LookupQueries,
}

impl LookupEngine {
    /// Builds an engine from vindex options. `upsert` comes from the vindex type.
    pub fn new(
        params: &VindexParams,
        common: CommonConfig,
        upsert: bool,
    ) -> Result<Self, VindexError> {
        Self::from_config(LookupConfig::from_params(params, common, upsert)?)
    }

    /// Builds an engine from an already decoded configuration.
    pub fn from_config(config: LookupConfig) -> Result<Self, VindexError> {
        if config.table.trim().is_empty() {
            return Err(VindexError::MissingParam { param: "table" });
        }
        if config.from_columns.is_empty() {
            return Err(VindexError::MissingParam { param: "from" });
        }
        if config.to.trim().is_empty() {
            return Err(VindexError::MissingParam { param: "to" });
        }
        let queries = LookupQueries::new(&config)?;
        Ok(Self { config, queries })
    }

    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    pub fn queries(&self) -> &LookupQueries {
        &self.queries
    }

    /// Lookup select and the names of its bind arguments.
    pub fn query(&self) -> (String, Vec<String>) {
        (self.queries.select.clone(), self.config.from_columns.clone())
    }

    /// Commit order used for statements issued on behalf of `requested`.
    pub fn effective_commit_order(&self, requested: CommitOrder) -> CommitOrder {
        if self.config.autocommit {
            CommitOrder::Autocommit
        } else {
            requested
        }
    }

    /// Returns `true` when `ids` go out as one IN-list query.
    ///
    /// Integral ids compare exactly in storage, so batched rows can always be
    /// matched back to their id. Other types batch only when configured.
    pub fn batches(&self, ids: &[Value]) -> bool {
        self.config.batch_lookup || ids.first().map(Value::is_integral).unwrap_or(false)
    }

    /// Looks up `ids` and returns one result per id, in input order.
    ///
    /// Each returned row holds a single value: the `to` column.
    pub async fn lookup(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        ids: &[Value],
        commit_order: CommitOrder,
    ) -> Result<Vec<QueryResult>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let commit_order = self.effective_commit_order(commit_order);
        let for_dml = executor.in_transaction_and_is_dml();

        if self.batches(ids) {
            let statement = self
                .queries
                .select_statement(&self.config, for_dml, ids.to_vec());
            let result = self
                .run(ctx, executor, &statement, commit_order, false)
                .await?;

            // Storage returns IN-list rows in its own order; regroup by the
            // echoed id column. Rows echoing NULL belong to no id.
            let mut rows_by_id: HashMap<MatchKey, Vec<Vec<Value>>> = HashMap::new();
            for row in result.rows {
                let (id, to) = self.split_lookup_row(row)?;
                if let Some(key) = id.match_key() {
                    rows_by_id.entry(key).or_default().push(vec![to]);
                }
            }
            return Ok(ids
                .iter()
                .map(|id| {
                    let rows = id
                        .match_key()
                        .and_then(|key| rows_by_id.get(&key))
                        .cloned()
                        .unwrap_or_default();
                    QueryResult::new(rows)
                })
                .collect());
        }

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let statement = self
                .queries
                .select_statement(&self.config, for_dml, vec![id.clone()]);
            let result = self
                .run(ctx, executor, &statement, commit_order, false)
                .await?;
            let mut rows = Vec::with_capacity(result.rows.len());
            for row in result.rows {
                let (_, to) = self.split_lookup_row(row)?;
                rows.push(vec![to]);
            }
            results.push(QueryResult::new(rows));
        }
        Ok(results)
    }

    /// Checks that each `ids[i] -> to_values[i]` row exists.
    pub async fn verify(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        ids: &[Value],
        to_values: &[Value],
    ) -> Result<Vec<bool>> {
        if ids.len() != to_values.len() {
            return Err(VindexError::LengthMismatch {
                op: "Verify",
                left: ids.len(),
                right: to_values.len(),
            }
            .into());
        }
        let commit_order = self.effective_commit_order(CommitOrder::Normal);
        let mut out = Vec::with_capacity(ids.len());
        for (id, to) in ids.iter().zip(to_values) {
            let statement = self.queries.verify_statement(&self.config, id, to);
            let result = self
                .run(ctx, executor, &statement, commit_order, false)
                .await?;
            out.push(!result.is_empty());
        }
        Ok(out)
    }

    /// Inserts `rows[i] -> to_values[i]` associations.
    ///
    /// With `ignore_mode` duplicates are skipped by the statement itself
    /// (`insert ignore`). With upsert configured they overwrite. Otherwise the
    /// executor's duplicate-key error is returned.
    pub async fn create(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        rows: &[Vec<Value>],
        to_values: &[Value],
        ignore_mode: bool,
    ) -> Result<()> {
        let commit_order = self.effective_commit_order(CommitOrder::Normal);
        self.create_with_order(ctx, executor, rows, to_values, ignore_mode, commit_order)
            .await
    }

    async fn create_with_order(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        rows: &[Vec<Value>],
        to_values: &[Value],
        ignore_mode: bool,
        commit_order: CommitOrder,
    ) -> Result<()> {
        if rows.len() != to_values.len() {
            return Err(VindexError::LengthMismatch {
                op: "Create",
                left: rows.len(),
                right: to_values.len(),
            }
            .into());
        }

        let mut pending = Vec::with_capacity(rows.len());
        'rows: for (row_idx, (row, to)) in rows.iter().zip(to_values).enumerate() {
            for (col_idx, value) in row.iter().enumerate() {
                if value.is_null() {
                    if !self.config.ignore_nulls {
                        return Err(VindexError::NullValue {
                            row: row_idx,
                            col: col_idx,
                            columns: self.config.from_columns.join(","),
                        }
                        .into());
                    }
                    continue 'rows;
                }
            }
            self.check_column_count("Create", row)?;
            pending.push((row.clone(), to.clone()));
        }
        if pending.is_empty() {
            return Ok(());
        }

        // Sorted rows give every writer the same lock acquisition order.
        pending.sort();
        let (sorted_rows, sorted_to): (Vec<_>, Vec<_>) = pending.into_iter().unzip();

        self.admit_write(ctx, "Create").await?;
        let statement = insert_statement(&self.config, &sorted_rows, &sorted_to, ignore_mode);
        self.run(ctx, executor, &statement, commit_order, true)
            .await?;
        Ok(())
    }

    /// Removes `rows[i] -> to_value` associations.
    ///
    /// Under autocommit the delete is skipped: the lookup row may belong to a
    /// transaction that has not committed yet, and a stale row only yields an
    /// extra candidate shard.
    pub async fn delete(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        rows: &[Vec<Value>],
        to_value: &Value,
        commit_order: CommitOrder,
    ) -> Result<()> {
        if self.config.autocommit {
            debug!(table = %self.config.table, rows = rows.len(), "autocommit lookup: delete skipped");
            return Ok(());
        }
        if rows.is_empty() {
            return Ok(());
        }
        for row in rows {
            self.check_column_count("Delete", row)?;
        }

        self.admit_write(ctx, "Delete").await?;
        for row in rows {
            let statement = self.queries.delete_statement(&self.config, row, to_value);
            self.run(ctx, executor, &statement, commit_order, true)
                .await?;
        }
        Ok(())
    }

    /// Moves one row's mapping from `old_values` to `new_values`.
    ///
    /// Issued as a delete followed by an insert on the same executor, so both
    /// land in the caller's commit scope.
    pub async fn update(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        old_values: &[Value],
        to_value: &Value,
        new_values: &[Value],
    ) -> Result<()> {
        self.delete(
            ctx,
            executor,
            &[old_values.to_vec()],
            to_value,
            CommitOrder::Normal,
        )
        .await?;
        self.create(
            ctx,
            executor,
            &[new_values.to_vec()],
            std::slice::from_ref(to_value),
            false,
        )
        .await
    }

    fn check_column_count(&self, op: &'static str, row: &[Value]) -> Result<(), VindexError> {
        if row.len() != self.config.from_columns.len() {
            return Err(VindexError::ColumnCountMismatch {
                op,
                got: row.len(),
                expected: self.config.from_columns.clone(),
            });
        }
        Ok(())
    }

    fn split_lookup_row(&self, row: Vec<Value>) -> Result<(Value, Value)> {
        let width = row.len();
        let mut cells = row.into_iter();
        match (cells.next(), cells.next()) {
            (Some(id), Some(to)) => Ok((id, to)),
            _ => Err(anyhow!(
                "lookup.Map: table {} returned a row with {} columns, expected 2",
                self.config.table,
                width
            )),
        }
    }

    async fn admit_write(&self, ctx: &LookupContext, op: &'static str) -> Result<()> {
        let Some(gate) = ctx.write_gate() else {
            return Ok(());
        };
        let check = gate.check_write(ctx, self.config.table.as_str()).await;
        if check.is_ok() {
            return Ok(());
        }
        Err(VindexError::WriteThrottled {
            op,
            table: self.config.table.clone(),
            status_code: check.status_code,
            message: check.message,
        }
        .into())
    }

    async fn run(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        statement: &LookupStatement,
        commit_order: CommitOrder,
        rollback_on_error: bool,
    ) -> Result<QueryResult> {
        let started = Instant::now();
        let outcome = executor
            .execute(ctx, statement, commit_order, rollback_on_error)
            .await;
        let elapsed = started.elapsed();

        let (rows, error) = match &outcome {
            Ok(result) => (result.len(), None),
            Err(err) => (0, Some(err.to_string())),
        };
        debug!(
            method = statement.method,
            table = %self.config.table,
            commit_order = %commit_order,
            rows,
            elapsed_us = elapsed.as_micros() as u64,
            failed = error.is_some(),
            "executed lookup statement"
        );
        if let Some(observer) = ctx.observer() {
            observer.observe(&LookupEvent {
                method: statement.method,
                table: self.config.table.as_str(),
                sql: statement.sql.as_str(),
                bind_var_names: statement.bind_vars.keys().map(String::as_str).collect(),
                commit_order,
                rows,
                elapsed,
                error,
            });
        }
        outcome
    }
}
