//! Error taxonomy for lookup vindexes.
//!
//! Public operations return `anyhow::Result`. Errors raised by this crate are
//! [`VindexError`] values inside the `anyhow::Error`, so callers that need to
//! branch on the kind (for example to map an integrity violation to an
//! operator alert) use `err.downcast_ref::<VindexError>()`. Executor errors are
//! passed through untouched and never converted into this type.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VindexError {
    /// A required construction parameter is absent or empty.
    #[error("lookup vindex: missing required param '{param}'")]
    MissingParam { param: &'static str },

    /// A boolean parameter holds something other than `true`/`false`.
    #[error("{param} value must be 'true' or 'false': '{value}'")]
    InvalidBool { param: String, value: String },

    /// A parameter is present but malformed.
    #[error("lookup vindex: invalid value for '{param}': {reason}")]
    InvalidParam { param: String, reason: String },

    /// The registry has no constructor for the requested vindex type.
    #[error("vindex type '{type_name}' not found")]
    UnknownVindexType { type_name: String },

    /// A constructor was registered twice under the same type name.
    #[error("vindex type '{type_name}' is already registered")]
    DuplicateVindexType { type_name: String },

    /// A unique lookup returned more than one row for a single id.
    #[error("Lookup.Map: unexpected multiple results from vindex {vindex} (table {table}): {id}")]
    MultipleResults {
        vindex: String,
        table: String,
        id: String,
    },

    /// A create request contained a NULL column value while nulls are not ignored.
    #[error("lookup.Create: input has null values: row: {row}, col: {col}, cols: {columns}")]
    NullValue {
        row: usize,
        col: usize,
        columns: String,
    },

    /// Input rows do not carry one value per `from` column.
    #[error("lookup.{op}: column vindex count does not match the columns in the lookup: {got} vs {expected:?}")]
    ColumnCountMismatch {
        op: &'static str,
        got: usize,
        expected: Vec<String>,
    },

    /// Parallel input slices have different lengths.
    #[error("lookup.{op}: got {left} ids but {right} paired values")]
    LengthMismatch {
        op: &'static str,
        left: usize,
        right: usize,
    },

    /// A lookup row carried NULL where a keyspace id was expected.
    #[error("lookup row has NULL keyspace id")]
    NullKeyspaceId,

    /// Insert collided with an existing lookup row.
    #[error("Duplicate entry '{key}' for key '{table}.PRIMARY'")]
    DuplicateKey { table: String, key: String },

    /// The write gate rejected a lookup-table write.
    #[error("lookup.{op}: write to '{table}' throttled (status {status_code}): {message}")]
    WriteThrottled {
        op: &'static str,
        table: String,
        status_code: u16,
        message: String,
    },

    /// The caller's context was cancelled before the statement ran.
    #[error("context canceled")]
    Cancelled,

    /// The caller's deadline passed before the statement ran.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

impl VindexError {
    /// Returns `true` for errors that indicate corrupt lookup data rather
    /// than a bad request or an unavailable backend.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, Self::MultipleResults { .. })
    }

    /// Returns `true` for configuration errors raised at construction time.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::MissingParam { .. }
                | Self::InvalidBool { .. }
                | Self::InvalidParam { .. }
                | Self::UnknownVindexType { .. }
                | Self::DuplicateVindexType { .. }
        )
    }
}

/// Extracts the [`VindexError`] carried by an `anyhow::Error`, if any.
pub fn vindex_error(err: &anyhow::Error) -> Option<&VindexError> {
    err.downcast_ref::<VindexError>()
}
