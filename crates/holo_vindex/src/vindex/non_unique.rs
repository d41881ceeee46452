use anyhow::Result;
use async_trait::async_trait;

use crate::destination::ShardDestination;
use crate::error::VindexError;
use crate::executor::{CommitOrder, LookupContext, LookupExecutor};
use crate::params::VindexParams;
use crate::value::{QueryResult, Value};
use crate::vindex::{keyspace_id_from_row, LookupCore, LookupVindex, Vindex};

pub const LOOKUP_NON_UNIQUE_TYPE: &str = "lookup";

/// Lookup vindex whose table may hold several rows per value.
///
/// Options: `table`, `from`, `to` (required); `autocommit`,
/// `multi_shard_autocommit`, `write_only`, `no_verify`, `ignore_nulls`,
/// `batch_lookup`, `read_lock`.
///
/// With `autocommit` or `multi_shard_autocommit` inserts upsert, since
/// repeated writes of the same mapping are expected. With `ignore_nulls` a
/// lookup of a single NULL value scatters instead of returning no shard.
#[derive(Debug)]
pub struct LookupNonUnique {
    core: LookupCore,
}

impl LookupNonUnique {
    pub fn new(name: &str, params: &VindexParams) -> Result<Self, VindexError> {
        Ok(Self {
            core: LookupCore::new(name, params, |common| {
                common.autocommit || common.multi_shard_autocommit
            })?,
        })
    }
}

#[async_trait]
impl Vindex for LookupNonUnique {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn type_name(&self) -> &'static str {
        LOOKUP_NON_UNIQUE_TYPE
    }

    fn cost(&self) -> u32 {
        20
    }

    fn is_unique(&self) -> bool {
        false
    }

    fn unknown_params(&self) -> &[String] {
        self.core.unknown_params()
    }

    async fn map(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        ids: &[Value],
    ) -> Result<Vec<ShardDestination>> {
        if self.core.is_backfilling() {
            return Ok(LookupCore::scatter(ids.len()));
        }

        // Only the single-id path: batched NULLs resolve normally.
        if ids.len() == 1 && ids[0].is_null() && self.core.engine().config().ignore_nulls {
            return Ok(LookupCore::scatter(1));
        }

        let results = self
            .core
            .engine()
            .lookup(ctx, executor, ids, CommitOrder::Normal)
            .await?;
        self.map_result(ids, &results)
    }

    async fn verify(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        ids: &[Value],
        ksids: &[Vec<u8>],
    ) -> Result<Vec<bool>> {
        self.core.verify(ctx, executor, ids, ksids).await
    }

    async fn create(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        rows: &[Vec<Value>],
        ksids: &[Vec<u8>],
        ignore_mode: bool,
    ) -> Result<()> {
        self.core
            .create(ctx, executor, rows, ksids, ignore_mode)
            .await
    }

    async fn update(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        old_values: &[Value],
        ksid: &[u8],
        new_values: &[Value],
    ) -> Result<()> {
        self.core
            .update(ctx, executor, old_values, ksid, new_values)
            .await
    }

    async fn delete(
        &self,
        ctx: &LookupContext,
        executor: &dyn LookupExecutor,
        rows: &[Vec<Value>],
        ksid: &[u8],
    ) -> Result<()> {
        self.core.delete(ctx, executor, rows, ksid).await
    }
}

impl LookupVindex for LookupNonUnique {
    fn core(&self) -> &LookupCore {
        &self.core
    }

    fn map_result(&self, ids: &[Value], results: &[QueryResult]) -> Result<Vec<ShardDestination>> {
        if self.core.is_backfilling() {
            return Ok(LookupCore::scatter(ids.len()));
        }
        self.core.check_result_count(ids, results)?;

        let mut out = Vec::with_capacity(results.len());
        for result in results {
            if result.is_empty() {
                out.push(ShardDestination::None);
                continue;
            }
            let ksids = result
                .rows
                .iter()
                .map(|row| keyspace_id_from_row(row))
                .collect::<Result<Vec<_>>>()?;
            out.push(ShardDestination::KeyspaceIds(ksids));
        }
        Ok(out)
    }
}
