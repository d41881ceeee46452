//! Shared helpers for lookup vindex integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use holo_vindex::{
    CommitOrder, LookupContext, LookupExecutor, LookupStatement, QueryResult, StatementKind,
    Value, VindexParams,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Builds a vindex option map.
pub fn params(pairs: &[(&str, &str)]) -> VindexParams {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Option map for a single-column lookup table `t(fromc, toc)`.
pub fn lookup_params(extra: &[(&str, &str)]) -> VindexParams {
    let mut out = params(&[("table", "t"), ("from", "fromc"), ("to", "toc")]);
    out.extend(params(extra));
    out
}

/// One-byte keyspace id.
pub fn ksid(byte: u8) -> Vec<u8> {
    vec![byte]
}

/// Single-column create rows for `ids`.
pub fn rows(ids: &[Value]) -> Vec<Vec<Value>> {
    ids.iter().map(|id| vec![id.clone()]).collect()
}

pub fn ints(ids: &[i64]) -> Vec<Value> {
    ids.iter().copied().map(Value::Int64).collect()
}

/// Executor that fails every call and counts how often it was called.
#[derive(Debug, Default)]
pub struct FailingExecutor {
    calls: AtomicUsize,
}

impl FailingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LookupExecutor for FailingExecutor {
    async fn execute(
        &self,
        _ctx: &LookupContext,
        statement: &LookupStatement,
        _commit_order: CommitOrder,
        _rollback_on_error: bool,
    ) -> Result<QueryResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("execute failed: {}", statement.method))
    }
}

/// Wraps an executor and counts calls per statement kind.
pub struct CountingExecutor<E> {
    inner: E,
    calls: Mutex<Vec<StatementKind>>,
}

impl<E> CountingExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn writes(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|kind| kind.is_write())
            .count()
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

#[async_trait]
impl<E: LookupExecutor> LookupExecutor for CountingExecutor<E> {
    async fn execute(
        &self,
        ctx: &LookupContext,
        statement: &LookupStatement,
        commit_order: CommitOrder,
        rollback_on_error: bool,
    ) -> Result<QueryResult> {
        self.calls.lock().unwrap().push(statement.kind);
        self.inner
            .execute(ctx, statement, commit_order, rollback_on_error)
            .await
    }

    fn in_transaction_and_is_dml(&self) -> bool {
        self.inner.in_transaction_and_is_dml()
    }
}

/// Wraps an executor and returns its rows in reverse order.
pub struct ReversingExecutor<E> {
    inner: E,
}

impl<E> ReversingExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<E: LookupExecutor> LookupExecutor for ReversingExecutor<E> {
    async fn execute(
        &self,
        ctx: &LookupContext,
        statement: &LookupStatement,
        commit_order: CommitOrder,
        rollback_on_error: bool,
    ) -> Result<QueryResult> {
        let mut result = self
            .inner
            .execute(ctx, statement, commit_order, rollback_on_error)
            .await?;
        result.rows.reverse();
        Ok(result)
    }

    fn in_transaction_and_is_dml(&self) -> bool {
        self.inner.in_transaction_and_is_dml()
    }
}

/// Wraps an executor and returns its rows in a seeded random order.
pub struct ShufflingExecutor<E> {
    inner: E,
    rng: Mutex<StdRng>,
}

impl<E> ShufflingExecutor<E> {
    pub fn new(inner: E, seed: u64) -> Self {
        Self {
            inner,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl<E: LookupExecutor> LookupExecutor for ShufflingExecutor<E> {
    async fn execute(
        &self,
        ctx: &LookupContext,
        statement: &LookupStatement,
        commit_order: CommitOrder,
        rollback_on_error: bool,
    ) -> Result<QueryResult> {
        let mut result = self
            .inner
            .execute(ctx, statement, commit_order, rollback_on_error)
            .await?;
        result.rows.shuffle(&mut *self.rng.lock().unwrap());
        Ok(result)
    }

    fn in_transaction_and_is_dml(&self) -> bool {
        self.inner.in_transaction_and_is_dml()
    }
}

/// Wraps an executor and echoes non-negative signed ids back as unsigned,
/// the way storage reports an unsigned `from` column.
pub struct UnsignedEchoExecutor<E> {
    inner: E,
}

impl<E> UnsignedEchoExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<E: LookupExecutor> LookupExecutor for UnsignedEchoExecutor<E> {
    async fn execute(
        &self,
        ctx: &LookupContext,
        statement: &LookupStatement,
        commit_order: CommitOrder,
        rollback_on_error: bool,
    ) -> Result<QueryResult> {
        let mut result = self
            .inner
            .execute(ctx, statement, commit_order, rollback_on_error)
            .await?;
        for row in &mut result.rows {
            if let Some(Value::Int64(v)) = row.first() {
                if let Ok(unsigned) = u64::try_from(*v) {
                    row[0] = Value::Uint64(unsigned);
                }
            }
        }
        Ok(result)
    }

    fn in_transaction_and_is_dml(&self) -> bool {
        self.inner.in_transaction_and_is_dml()
    }
}
