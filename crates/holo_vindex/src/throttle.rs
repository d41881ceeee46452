//! Write gating for lookup-table writes.
//!
//! A throttler outside this crate decides whether the lookup table's backend
//! can take more writes. The engine asks the gate carried on the context
//! before each create/delete. A gate may await (delay) before answering; a
//! non-OK answer rejects the write.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::executor::LookupContext;

pub const STATUS_OK: u16 = 200;
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_INTERNAL_SERVER_ERROR: u16 = 500;

/// Result for one metric inside a multi-metric check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricResult {
    pub status_code: u16,
    pub scope: String,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
}

/// Answer from a throttle check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CheckResult {
    pub status_code: u16,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
    pub recently_checked: bool,
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricResult>,
}

impl CheckResult {
    pub fn new(status_code: u16, value: f64, threshold: f64, message: impl Into<String>) -> Self {
        Self {
            status_code,
            value,
            threshold,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn ok() -> Self {
        Self::new(STATUS_OK, 0.0, 0.0, "")
    }

    pub fn error(status_code: u16, message: impl Into<String>) -> Self {
        Self::new(status_code, 0.0, 0.0, message)
    }

    /// Result used when the requested metric is unknown to the throttler.
    pub fn no_such_metric() -> Self {
        Self::error(STATUS_NOT_FOUND, "no such metric")
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == STATUS_OK
    }
}

#[async_trait]
pub trait WriteGate: Send + Sync {
    async fn check_write(&self, ctx: &LookupContext, table: &str) -> CheckResult;
}

/// Gate that always answers with the same result.
#[derive(Debug, Clone)]
pub struct FixedWriteGate {
    result: CheckResult,
}

impl FixedWriteGate {
    pub fn new(result: CheckResult) -> Self {
        Self { result }
    }

    pub fn open() -> Self {
        Self::new(CheckResult::ok())
    }

    /// Gate reporting lag above threshold.
    pub fn throttled(value: f64, threshold: f64) -> Self {
        Self::new(CheckResult::new(
            STATUS_TOO_MANY_REQUESTS,
            value,
            threshold,
            format!("metric value {value} exceeds threshold {threshold}"),
        ))
    }
}

#[async_trait]
impl WriteGate for FixedWriteGate {
    async fn check_write(&self, _ctx: &LookupContext, _table: &str) -> CheckResult {
        self.result.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_status_200_is_ok() {
        assert!(CheckResult::ok().is_ok());
        assert!(!CheckResult::no_such_metric().is_ok());
        assert!(!CheckResult::error(STATUS_INTERNAL_SERVER_ERROR, "boom").is_ok());
    }

    #[test]
    fn check_result_json_uses_throttler_field_names() {
        let json = serde_json::to_value(CheckResult::new(429, 3.5, 1.0, "lagging")).unwrap();
        assert_eq!(json["StatusCode"], 429);
        assert_eq!(json["Threshold"], 1.0);
        assert_eq!(json["Message"], "lagging");
        assert_eq!(json["RecentlyChecked"], false);
    }
}
