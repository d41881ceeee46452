//! Executor contract between lookup vindexes and the SQL transport.
//!
//! The vindex layer never owns connections. Each call borrows a
//! [`LookupExecutor`] bound to the caller's session/transaction and forwards the
//! caller's [`LookupContext`] unchanged, so cancellation, deadlines and any
//! request-scoped hooks stay under the caller's control.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::querylog::LookupObserver;
use crate::throttle::WriteGate;
use crate::value::{QueryResult, Value};

/// When a lookup-table statement commits relative to the primary write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitOrder {
    /// Same transaction/commit epoch as the triggering primary-row write.
    #[default]
    Normal,
    /// Committed before the primary transaction.
    Pre,
    /// Committed after the primary transaction.
    Post,
    /// Committed immediately in its own transaction.
    Autocommit,
}

impl fmt::Display for CommitOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Normal => "NORMAL",
            Self::Pre => "PRE",
            Self::Post => "POST",
            Self::Autocommit => "AUTOCOMMIT",
        };
        f.write_str(label)
    }
}

/// Request-scoped context forwarded on every executor call.
#[derive(Clone, Default)]
pub struct LookupContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    observer: Option<Arc<dyn LookupObserver>>,
    write_gate: Option<Arc<dyn WriteGate>>,
}

impl LookupContext {
    /// Context with no deadline and no hooks.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn LookupObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_write_gate(mut self, gate: Arc<dyn WriteGate>) -> Self {
        self.write_gate = Some(gate);
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` once the deadline, if any, has passed.
    pub fn deadline_exceeded(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    pub fn observer(&self) -> Option<&Arc<dyn LookupObserver>> {
        self.observer.as_ref()
    }

    pub fn write_gate(&self) -> Option<&Arc<dyn WriteGate>> {
        self.write_gate.as_ref()
    }
}

impl fmt::Debug for LookupContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupContext")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("deadline", &self.deadline)
            .field("observer", &self.observer.is_some())
            .field("write_gate", &self.write_gate.is_some())
            .finish()
    }
}

/// Value bound to a named statement parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindValue {
    Scalar(Value),
    /// Tuple bound to an `in ::name` list parameter.
    List(Vec<Value>),
}

impl BindValue {
    /// Values carried by this binding; a scalar yields one element.
    pub fn values(&self) -> &[Value] {
        match self {
            Self::Scalar(value) => std::slice::from_ref(value),
            Self::List(values) => values.as_slice(),
        }
    }
}

/// Statement shape, so executors can classify statements without parsing SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// `select from, to ... where from in ::from`.
    Select,
    /// `select from ... where from = :from and to = :to`.
    Verify,
    /// Multi-row insert with `rows` value tuples.
    Insert {
        rows: usize,
        ignore: bool,
        upsert: bool,
    },
    /// Single-row delete keyed by every from column and the to column.
    Delete,
}

impl StatementKind {
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Insert { .. } | Self::Delete)
    }
}

/// Fully built statement against the lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupStatement {
    /// Operation label (`VindexLookup`, `VindexVerify`, `VindexCreate`, `VindexDelete`).
    pub method: &'static str,
    pub sql: String,
    pub bind_vars: BTreeMap<String, BindValue>,
    pub kind: StatementKind,
}

impl LookupStatement {
    pub fn bind_var(&self, name: &str) -> Option<&BindValue> {
        self.bind_vars.get(name)
    }
}

/// Shard-aware SQL transport for the lookup table.
///
/// Implementations own retries, connection management and timeouts. Errors
/// are surfaced to vindex callers exactly as returned.
#[async_trait]
pub trait LookupExecutor: Send + Sync {
    async fn execute(
        &self,
        ctx: &LookupContext,
        statement: &LookupStatement,
        commit_order: CommitOrder,
        rollback_on_error: bool,
    ) -> anyhow::Result<QueryResult>;

    /// Returns `true` when the bound session is inside a transaction running DML.
    fn in_transaction_and_is_dml(&self) -> bool {
        false
    }
}

#[async_trait]
impl<T: LookupExecutor + ?Sized> LookupExecutor for Arc<T> {
    async fn execute(
        &self,
        ctx: &LookupContext,
        statement: &LookupStatement,
        commit_order: CommitOrder,
        rollback_on_error: bool,
    ) -> anyhow::Result<QueryResult> {
        (**self)
            .execute(ctx, statement, commit_order, rollback_on_error)
            .await
    }

    fn in_transaction_and_is_dml(&self) -> bool {
        (**self).in_transaction_and_is_dml()
    }
}
