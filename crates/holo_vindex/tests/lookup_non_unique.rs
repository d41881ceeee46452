//! Behavior of the `lookup` (non-unique) vindex.

mod common;

use anyhow::Result;
use common::{ints, ksid, lookup_params, params, rows, CountingExecutor};
use holo_vindex::{
    CommitOrder, LookupContext, LookupNonUnique, LookupVindex, MemoryLookupStore,
    ShardDestination, StatementKind, Value, Vindex, VindexError,
};

fn non_unique(extra: &[(&str, &str)]) -> LookupNonUnique {
    LookupNonUnique::new("lookup", &lookup_params(extra)).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn map_returns_every_keyspace_id() -> Result<()> {
    let vindex = non_unique(&[]);
    let store = MemoryLookupStore::for_vindex(&vindex);
    let ctx = LookupContext::background();

    vindex
        .create(
            &ctx,
            &store,
            &rows(&ints(&[1, 1, 2])),
            &[ksid(1), ksid(2), ksid(3)],
            false,
        )
        .await?;

    let out = vindex.map(&ctx, &store, &ints(&[1, 2, 3])).await?;
    assert_eq!(out.len(), 3);
    match &out[0] {
        ShardDestination::KeyspaceIds(ids) => {
            let mut ids = ids.clone();
            ids.sort();
            assert_eq!(ids, vec![ksid(1), ksid(2)]);
        }
        other => panic!("unexpected destination {other:?}"),
    }
    assert_eq!(out[1], ShardDestination::KeyspaceIds(vec![ksid(3)]));
    assert_eq!(out[2], ShardDestination::None);
    assert!(out[2].is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_null_scatters_only_with_ignore_nulls() -> Result<()> {
    let ctx = LookupContext::background();

    let vindex = non_unique(&[("ignore_nulls", "true")]);
    let store = CountingExecutor::new(MemoryLookupStore::for_vindex(&vindex));
    let out = vindex.map(&ctx, &store, &[Value::Null]).await?;
    assert_eq!(out, vec![ShardDestination::full_scatter()]);
    assert_eq!(store.calls(), 0);

    // Batched NULLs resolve through the table like any other id.
    let out = vindex
        .map(&ctx, &store, &[Value::Null, Value::from("a")])
        .await?;
    assert_eq!(out, vec![ShardDestination::None, ShardDestination::None]);
    assert_eq!(store.calls(), 2);

    let out = vindex
        .map(&ctx, &store, &[Value::Null, Value::Null])
        .await?;
    assert_eq!(out, vec![ShardDestination::None, ShardDestination::None]);
    assert_eq!(store.calls(), 4);

    let vindex = non_unique(&[]);
    let store = MemoryLookupStore::for_vindex(&vindex);
    let out = vindex.map(&ctx, &store, &[Value::Null]).await?;
    assert_eq!(out, vec![ShardDestination::None]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn autocommit_upserts_and_skips_deletes() -> Result<()> {
    let vindex = non_unique(&[("autocommit", "true")]);
    assert!(vindex.config().upsert);
    assert!(vindex.autocommit_enabled());
    let store = MemoryLookupStore::for_vindex(&vindex);
    let ctx = LookupContext::background();

    for _ in 0..2 {
        vindex
            .create(&ctx, &store, &rows(&ints(&[1])), &[ksid(1)], false)
            .await?;
    }
    let statements = store.statements();
    assert_eq!(statements.len(), 2);
    assert_eq!(
        statements[0].sql,
        "insert into t(fromc, toc) values(:fromc_0, :toc_0) on duplicate key update fromc=values(fromc), toc=values(toc)"
    );
    assert_eq!(statements[0].commit_order, CommitOrder::Autocommit);
    assert!(statements[0].rollback_on_error);

    vindex
        .delete(&ctx, &store, &rows(&ints(&[1])), &ksid(1))
        .await?;
    assert_eq!(store.statements().len(), 2);
    assert_eq!(store.len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn multi_shard_autocommit_hints_the_insert() -> Result<()> {
    let vindex = non_unique(&[("multi_shard_autocommit", "true")]);
    assert!(vindex.config().upsert);
    assert!(!vindex.autocommit_enabled());
    let store = MemoryLookupStore::for_vindex(&vindex);
    let ctx = LookupContext::background();

    vindex
        .create(&ctx, &store, &rows(&ints(&[1, 2])), &[ksid(1), ksid(2)], true)
        .await?;
    let statements = store.statements();
    let statement = &statements[0];
    assert!(statement
        .sql
        .starts_with("insert /*vt+ MULTI_SHARD_AUTOCOMMIT=1 */ ignore into t(fromc, toc) values(:fromc_0, :toc_0), (:fromc_1, :toc_1)"));
    assert_eq!(statement.commit_order, CommitOrder::Normal);
    assert_eq!(
        statement.kind,
        StatementKind::Insert {
            rows: 2,
            ignore: true,
            upsert: true
        }
    );

    // Without autocommit deletes go through.
    vindex
        .delete(&ctx, &store, &rows(&ints(&[1])), &ksid(1))
        .await?;
    assert_eq!(store.len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn plain_lookup_rejects_duplicates() -> Result<()> {
    let vindex = non_unique(&[]);
    assert!(!vindex.config().upsert);
    let store = MemoryLookupStore::for_vindex(&vindex);
    let ctx = LookupContext::background();

    vindex
        .create(&ctx, &store, &rows(&ints(&[1])), &[ksid(1)], false)
        .await?;
    let err = vindex
        .create(&ctx, &store, &rows(&ints(&[1])), &[ksid(1)], false)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Duplicate entry '1-\u{1}' for key 't.PRIMARY'");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn null_rows_are_rejected_or_skipped() -> Result<()> {
    let ctx = LookupContext::background();
    let input = vec![vec![Value::Int64(1)], vec![Value::Null]];

    let strict = non_unique(&[]);
    let store = CountingExecutor::new(MemoryLookupStore::for_vindex(&strict));
    let err = strict
        .create(&ctx, &store, &input, &[ksid(1), ksid(2)], false)
        .await
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<VindexError>(),
        Some(&VindexError::NullValue {
            row: 1,
            col: 0,
            columns: "fromc".to_string()
        })
    );
    assert_eq!(store.calls(), 0);

    let lenient = non_unique(&[("ignore_nulls", "true")]);
    let store = MemoryLookupStore::for_vindex(&lenient);
    lenient
        .create(&ctx, &store, &input, &[ksid(1), ksid(2)], false)
        .await?;
    assert_eq!(store.len(), 1);

    // Nothing left to write after trimming: no statement at all.
    lenient
        .create(&ctx, &store, &[vec![Value::Null]], &[ksid(3)], false)
        .await?;
    assert_eq!(store.statements().len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn multi_column_rows_are_checked_and_keyed_by_first_column() -> Result<()> {
    let vindex = LookupNonUnique::new(
        "lookup",
        &params(&[("table", "ks.t"), ("from", "c1, c2"), ("to", "toc")]),
    )?;
    let store = MemoryLookupStore::for_vindex(&vindex);
    let ctx = LookupContext::background();

    let err = vindex
        .create(&ctx, &store, &rows(&ints(&[1])), &[ksid(1)], false)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<VindexError>(),
        Some(VindexError::ColumnCountMismatch { op: "Create", got: 1, .. })
    ));

    vindex
        .create(
            &ctx,
            &store,
            &[vec![Value::Int64(1), Value::from("x")]],
            &[ksid(1)],
            false,
        )
        .await?;
    assert_eq!(
        store.statements()[0].sql,
        "insert into ks.t(c1, c2, toc) values(:c1_0, :c2_0, :toc_0)"
    );
    let out = vindex.map(&ctx, &store, &ints(&[1])).await?;
    assert_eq!(out, vec![ShardDestination::KeyspaceIds(vec![ksid(1)])]);

    vindex
        .delete(&ctx, &store, &[vec![Value::Int64(1), Value::from("x")]], &ksid(1))
        .await?;
    assert_eq!(
        store.statements().last().map(|s| s.sql.clone()),
        Some("delete from ks.t where c1 = :c1 and c2 = :c2 and toc = :toc".to_string())
    );
    assert!(store.is_empty());
    Ok(())
}

#[test]
fn describes_itself() {
    let vindex = non_unique(&[]);
    assert_eq!(vindex.type_name(), "lookup");
    assert_eq!(vindex.cost(), 20);
    assert!(!vindex.is_unique());
    assert!(!vindex.allow_batch());
    assert!(vindex.unknown_params().is_empty());
}
