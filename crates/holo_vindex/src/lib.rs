//! Lookup vindexes for HoloStore's sharded SQL routing.
//!
//! A lookup vindex resolves a column value to the keyspace ids of the shards
//! holding matching rows, by consulting a separate lookup table. This crate
//! provides:
//! - the lookup engine that turns ids into lookup-table statements and runs
//!   them through a caller-supplied [`LookupExecutor`],
//! - the `lookup_unique` and `lookup` vindex types, including the write-only
//!   (backfill) mode used while a new lookup table is populated,
//! - a [`VindexRegistry`] that builds vindexes from JSON definitions,
//! - an in-process [`MemoryLookupStore`] executor.
//!
//! The crate owns no connections and no transactions. Every call borrows the
//! executor bound to the caller's session and forwards the caller's
//! [`LookupContext`] unchanged.

pub mod config;
pub mod destination;
pub mod engine;
pub mod error;
pub mod executor;
pub mod memory;
pub mod params;
pub mod query;
pub mod querylog;
pub mod registry;
pub mod schema;
pub mod throttle;
pub mod value;
pub mod vindex;

pub use config::LookupConfig;
pub use destination::{KeyRange, ShardDestination};
pub use engine::LookupEngine;
pub use error::{vindex_error, VindexError};
pub use executor::{
    BindValue, CommitOrder, LookupContext, LookupExecutor, LookupStatement, StatementKind,
};
pub use memory::MemoryLookupStore;
pub use params::{ReadLock, VindexParams};
pub use querylog::{LookupEvent, LookupObserver, RecordingObserver};
pub use registry::{VindexDefinition, VindexRegistry, VindexSet};
pub use schema::{DeclarativeSchema, SchemaFacts};
pub use throttle::{CheckResult, WriteGate};
pub use value::{MatchKey, QueryResult, Value};
pub use vindex::{BackfillState, LookupNonUnique, LookupUnique, LookupVindex, Vindex};
