//! Write-only (backfill) mode and the transition to live reads.

mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{ints, ksid, lookup_params, rows, FailingExecutor};
use holo_vindex::{
    BackfillState, LookupContext, LookupNonUnique, LookupUnique, LookupVindex,
    MemoryLookupStore, QueryResult, ShardDestination, Value, Vindex,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn write_only_maps_to_full_scatter_without_io() -> Result<()> {
    let ctx = LookupContext::background();
    let executor = FailingExecutor::new();
    let unique = LookupUnique::new("u", &lookup_params(&[("write_only", "true")]))?;
    let non_unique = LookupNonUnique::new("n", &lookup_params(&[("write_only", "true")]))?;

    let ids = ints(&[1, 2, 3]);
    for vindex in [&unique as &dyn LookupVindex, &non_unique] {
        assert!(vindex.is_backfilling());
        let out = vindex.map(&ctx, &executor, &ids).await?;
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(ShardDestination::is_full_scatter));

        // Prefetched rows are ignored while backfilling.
        let out = vindex.map_result(&ids, &[QueryResult::default()])?;
        assert!(out.iter().all(ShardDestination::is_full_scatter));
    }
    assert_eq!(executor.calls(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn verify_trusts_caller_when_write_only_or_no_verify() -> Result<()> {
    let ctx = LookupContext::background();
    let executor = FailingExecutor::new();
    let ids = ints(&[1, 2]);
    let ksids = [ksid(1), ksid(2)];

    for extra in [("write_only", "true"), ("no_verify", "true")] {
        let vindex = LookupUnique::new("u", &lookup_params(&[extra]))?;
        assert_eq!(vindex.verify(&ctx, &executor, &ids, &ksids).await?, vec![true, true]);
    }
    assert_eq!(executor.calls(), 0);

    let vindex = LookupUnique::new("u", &lookup_params(&[]))?;
    let err = vindex
        .verify(&ctx, &executor, &ids, &ksids)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "execute failed: VindexVerify");
    assert_eq!(executor.calls(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn writes_flow_during_backfill_and_reads_resume_after() -> Result<()> {
    let ctx = LookupContext::background();
    let vindex = LookupUnique::new("u", &lookup_params(&[("write_only", "true")]))?;
    let store = MemoryLookupStore::for_vindex(&vindex);

    vindex
        .create(&ctx, &store, &rows(&ints(&[7])), &[ksid(7)], false)
        .await?;
    assert_eq!(store.len(), 1);
    assert_eq!(
        vindex.map(&ctx, &store, &ints(&[7])).await?,
        vec![ShardDestination::full_scatter()]
    );

    assert_eq!(vindex.backfill_state(), BackfillState::Backfilling);
    assert!(vindex.complete_backfill());
    assert!(!vindex.complete_backfill());
    assert_eq!(vindex.backfill_state(), BackfillState::Live);

    assert_eq!(
        vindex.map(&ctx, &store, &ints(&[7])).await?,
        vec![ShardDestination::KeyspaceId(ksid(7))]
    );
    assert_eq!(
        vindex.verify(&ctx, &store, &ints(&[7]), &[ksid(8)]).await?,
        vec![false]
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_maps_see_either_mode_never_a_mix() -> Result<()> {
    let vindex = Arc::new(LookupNonUnique::new(
        "n",
        &lookup_params(&[("write_only", "true")]),
    )?);
    let store = Arc::new(MemoryLookupStore::for_vindex(&*vindex));
    let ctx = LookupContext::background();
    let ids: Vec<Value> = ints(&[1, 2, 3, 4]);
    let ksids: Vec<Vec<u8>> = (1..=4).map(ksid).collect();
    vindex.create(&ctx, &*store, &rows(&ids), &ksids, false).await?;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let vindex = vindex.clone();
        let store = store.clone();
        let ids = ids.clone();
        tasks.push(tokio::spawn(async move {
            let ctx = LookupContext::background();
            let mut live_seen = false;
            for _ in 0..200 {
                let out = vindex.map(&ctx, &*store, &ids).await?;
                let scattered = out.iter().filter(|d| d.is_full_scatter()).count();
                assert!(scattered == 0 || scattered == out.len(), "torn result {out:?}");
                if scattered == 0 {
                    for (idx, dest) in out.iter().enumerate() {
                        assert_eq!(dest, &ShardDestination::KeyspaceIds(vec![ksid(idx as u8 + 1)]));
                    }
                    live_seen = true;
                } else {
                    // Once live, a vindex never goes back to scattering.
                    assert!(!live_seen, "vindex returned to write-only mode");
                }
                tokio::task::yield_now().await;
            }
            anyhow::Ok(())
        }));
    }

    tokio::task::yield_now().await;
    vindex.complete_backfill();
    for task in tasks {
        task.await??;
    }
    assert!(!vindex.is_backfilling());
    Ok(())
}
