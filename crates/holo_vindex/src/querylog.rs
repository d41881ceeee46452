//! Passive observation of executed lookup statements.
//!
//! Query logging lives outside this crate. The engine reports every statement
//! it sends to the executor through an optional [`LookupObserver`] carried on
//! the [`LookupContext`](crate::executor::LookupContext). Bind values are not
//! reported, only their names, so no redaction is needed downstream.

use std::sync::Mutex;
use std::time::Duration;

use crate::executor::CommitOrder;

/// One executed lookup-table statement.
#[derive(Debug, Clone)]
pub struct LookupEvent<'a> {
    pub method: &'static str,
    pub table: &'a str,
    pub sql: &'a str,
    pub bind_var_names: Vec<&'a str>,
    pub commit_order: CommitOrder,
    /// Rows returned by the executor; zero on error.
    pub rows: usize,
    pub elapsed: Duration,
    pub error: Option<String>,
}

pub trait LookupObserver: Send + Sync {
    fn observe(&self, event: &LookupEvent<'_>);
}

/// Owned copy of a [`LookupEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedLookup {
    pub method: &'static str,
    pub table: String,
    pub sql: String,
    pub bind_var_names: Vec<String>,
    pub commit_order: CommitOrder,
    pub rows: usize,
    pub error: Option<String>,
}

/// Observer that keeps every event in memory, in execution order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<RecordedLookup>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedLookup> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn methods(&self) -> Vec<&'static str> {
        self.events().into_iter().map(|event| event.method).collect()
    }
}

impl LookupObserver for RecordingObserver {
    fn observe(&self, event: &LookupEvent<'_>) {
        let recorded = RecordedLookup {
            method: event.method,
            table: event.table.to_string(),
            sql: event.sql.to_string(),
            bind_var_names: event
                .bind_var_names
                .iter()
                .map(|name| name.to_string())
                .collect(),
            commit_order: event.commit_order,
            rows: event.rows,
            error: event.error.clone(),
        };
        if let Ok(mut guard) = self.events.lock() {
            guard.push(recorded);
        }
    }
}
