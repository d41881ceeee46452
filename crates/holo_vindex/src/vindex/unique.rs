use anyhow::Result;
use async_trait::async_trait;

use crate::destination::ShardDestination;
use crate::error::VindexError;
use crate::executor::{CommitOrder, LookupContext, LookupExecutor};
use crate::params::VindexParams;
use crate::value::{QueryResult, Value};
use crate::vindex::{keyspace_id_from_row, LookupCore, LookupVindex, Vindex};

pub const LOOKUP_UNIQUE_TYPE: &str = "lookup_unique";

/// Lookup vindex whose table holds at most one row per value.
///
/// Options: `table`, `from`, `to` (required); `autocommit`,
/// `multi_shard_autocommit`, `write_only`, `no_verify`, `ignore_nulls`,
/// `batch_lookup`, `read_lock`. Inserts never upsert, whatever the autocommit
/// options say: a duplicate create is an error.
#[derive(Debug)]
pub struct LookupUnique {
    core: LookupCore,
}

impl LookupUnique {
    pub fn new(name: &str, params: &VindexParams) -> Result<Self, VindexError> {
        Ok(Self {
            core: LookupCore::new(name, params, |_| false)?,
        })
    }
}

#[async_trait]
impl Vindex for LookupUnique {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn type_name(&self) -> &'static str {
        LOOKUP_UNIQUE_TYPE
    }

    fn cost(&self) -> u32 {
        10
    }

    fn is_unique(&self) -> bool {
        true
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

impl LookupVindex for LookupUnique {
    fn core(&self) -> &LookupCore {
        &self.core
    }

    fn map_result(&self, ids: &[Value], results: &[QueryResult]) -> Result<Vec<ShardDestination>> {
        if self.core.is_backfilling() {
            return Ok(LookupCore::scatter(ids.len()));
        }
        self.core.check_result_count(ids, results)?;

        let mut out = Vec::with_capacity(ids.len());
        for (id, result) in ids.iter().zip(results) {
            match result.rows.as_slice() {
                [] => out.push(ShardDestination::None),
                [row] => out.push(ShardDestination::KeyspaceId(keyspace_id_from_row(row)?)),
                _ => {
                    return Err(VindexError::MultipleResults {
                        vindex: self.core.name().to_string(),
                        table: self.core.engine().config().table.clone(),
                        id: id.to_string(),
                    }
                    .into())
                }
            }
        }
        Ok(out)
    }
}
