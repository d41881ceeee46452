//! Lookup vindex types.
//!
//! Both types embed a [`LookupCore`] (engine, backfill flag, verification
//! policy) and differ only where cardinality matters: how lookup rows become
//! destinations, and whether inserts upsert.

mod backfill;
mod non_unique;
mod unique;

use std::fmt;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::info;

use crate::config::LookupConfig;
use crate::destination::ShardDestination;
use crate::engine::LookupEngine;
use crate::error::VindexError;
use crate::executor::{CommitOrder, LookupContext, LookupExecutor};
use crate::params::{
    bool_from_map, find_unknown_params, CommonConfig, VindexParams, LOOKUP_PARAMS,
    PARAM_NO_VERIFY, PARAM_WRITE_ONLY,
};
use crate::value::{ksids_to_values, QueryResult, Value};

pub use backfill::{BackfillFlag, BackfillState};
pub use non_unique::{LookupNonUnique, LOOKUP_NON_UNIQUE_TYPE};
pub use unique::{LookupUnique, LOOKUP_UNIQUE_TYPE};

/// Value-to-shard mapping used by the planner.
#[async_trait]
pub trait Vindex: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Registry type name (`lookup`, `lookup_unique`).
    fn type_name(&self) -> &'static str;

    /// Planner cost; lower is more selective.
    fn cost(&self) -> u32;

    fn is_unique(&self) -> bool;

    fn needs_executor(&self) -> bool {
        true
    }

    /// Definition options this vindex did not recognize, sorted.
    fn unknown_params(&self) -> &[String];

    /// Maps each id to its destination, in input order.
    async fn map(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        ids: &[Value],
    ) -> Result<Vec<ShardDestination>>;

    /// Reports whether each `ids[i]` maps to `ksids[i]`.
    async fn verify(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        ids: &[Value],
        ksids: &[Vec<u8>],
    ) -> Result<Vec<bool>>;

    /// Records `rows[i] -> ksids[i]`; each row holds one value per from column.
    async fn create(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        rows: &[Vec<Value>],
        ksids: &[Vec<u8>],
        ignore_mode: bool,
    ) -> Result<()>;

    async fn update(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        old_values: &[Value],
        ksid: &[u8],
        new_values: &[Value],
    ) -> Result<()>;

    async fn delete(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        rows: &[Vec<Value>],
        ksid: &[u8],
    ) -> Result<()>;
}

/// Lookup-table specific surface shared by both lookup types.
pub trait LookupVindex: Vindex {
    fn core(&self) -> &LookupCore;

    /// Converts rows fetched with [`LookupVindex::query`] into destinations.
    fn map_result(&self, ids: &[Value], results: &[QueryResult]) -> Result<Vec<ShardDestination>>;

    /// Lookup writes share the commit of the triggering primary write.
    fn commit_order(&self) -> CommitOrder {
        CommitOrder::Normal
    }

    fn allow_batch(&self) -> bool {
        self.core().engine().config().batch_lookup
    }

    fn autocommit_enabled(&self) -> bool {
        self.core().engine().config().autocommit
    }

    fn is_backfilling(&self) -> bool {
        self.core().is_backfilling()
    }

    fn backfill_state(&self) -> BackfillState {
        self.core().backfill_state()
    }

    /// Promotes the vindex out of write-only mode; see [`LookupCore::complete_backfill`].
    fn complete_backfill(&self) -> bool {
        self.core().complete_backfill()
    }

    /// Lookup select and its bind argument names.
    fn query(&self) -> (String, Vec<String>) {
        self.core().engine().query()
    }

    fn config(&self) -> &LookupConfig {
        self.core().engine().config()
    }

    /// Configuration document for schema tooling.
    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.config())?)
    }
}

/// State and behavior common to every lookup vindex.
#[derive(Debug)]
pub struct LookupCore {
    name: String,
    engine: LookupEngine,
    backfill: BackfillFlag,
    no_verify: bool,
    unknown_params: Vec<String>,
}

impl LookupCore {
    /// Parses shared options. `upsert` decides insert idempotence from the
    /// parsed autocommit options.
    pub(crate) fn new(
        name: &str,
        params: &VindexParams,
        upsert: impl FnOnce(&CommonConfig) -> bool,
    ) -> Result<Self, VindexError> {
        let unknown_params = find_unknown_params(params, LOOKUP_PARAMS);
        let common = CommonConfig::parse(params)?;
        let write_only = bool_from_map(params, PARAM_WRITE_ONLY)?;
        let no_verify = bool_from_map(params, PARAM_NO_VERIFY)?;
        let upsert = upsert(&common);
        let engine = LookupEngine::new(params, common, upsert)?;
        Ok(Self {
            name: name.to_string(),
            engine,
            backfill: BackfillFlag::new(write_only),
            no_verify,
            unknown_params,
        })
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn engine(&self) -> &LookupEngine {
        &self.engine
    }

    pub fn no_verify(&self) -> bool {
        self.no_verify
    }

    pub fn unknown_params(&self) -> &[String] {
        &self.unknown_params
    }

    pub fn is_backfilling(&self) -> bool {
        self.backfill.is_backfilling()
    }

    pub fn backfill_state(&self) -> BackfillState {
        self.backfill.state()
    }

    /// Marks backfill complete. Returns `true` if this call made the vindex live.
    pub fn complete_backfill(&self) -> bool {
        let transitioned = self.backfill.complete();
        if transitioned {
            info!(
                vindex = %self.name,
                table = %self.engine.config().table,
                "lookup vindex backfill complete; serving reads from lookup table"
            );
        }
        transitioned
    }

    /// One full-range destination per id.
    pub(crate) fn scatter(len: usize) -> Vec<ShardDestination> {
        (0..len).map(|_| ShardDestination::full_scatter()).collect()
    }

    pub(crate) async fn verify(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        ids: &[Value],
        ksids: &[Vec<u8>],
    ) -> Result<Vec<bool>> {
        if self.is_backfilling() || self.no_verify {
            return Ok(vec![true; ids.len()]);
        }
        self.engine
            .verify(ctx, executor, ids, &ksids_to_values(ksids))
            .await
    }

    pub(crate) async fn create(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        rows: &[Vec<Value>],
        ksids: &[Vec<u8>],
        ignore_mode: bool,
    ) -> Result<()> {
        self.engine
            .create(ctx, executor, rows, &ksids_to_values(ksids), ignore_mode)
            .await
    }

    pub(crate) async fn update(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        old_values: &[Value],
        ksid: &[u8],
        new_values: &[Value],
    ) -> Result<()> {
        self.engine
            .update(
                ctx,
                executor,
                old_values,
                &Value::VarBinary(ksid.to_vec()),
                new_values,
            )
            .await
    }

    pub(crate) async fn delete(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        rows: &[Vec<Value>],
        ksid: &[u8],
    ) -> Result<()> {
        self.engine
            .delete(
                ctx,
                executor,
                rows,
                &Value::VarBinary(ksid.to_vec()),
                CommitOrder::Normal,
            )
            .await
    }

    pub(crate) fn check_result_count(&self, ids: &[Value], results: &[QueryResult]) -> Result<()> {
        if ids.len() != results.len() {
            return Err(VindexError::LengthMismatch {
                op: "MapResult",
                left: ids.len(),
                right: results.len(),
            }
            .into());
        }
        Ok(())
    }
}

/// Keyspace id held in the first column of an engine result row.
pub(crate) fn keyspace_id_from_row(row: &[Value]) -> Result<Vec<u8>> {
    let cell = row
        .first()
        .ok_or_else(|| anyhow!("lookup result row has no columns"))?;
    Ok(cell.to_bytes()?)
}
