//! Error classification for the catalog.
//!
//! An `ErrorMetadata` is attached to an `anyhow::Error` chain via
//! `.context(...)`, and callers classify the error by downcasting rather than
//! matching on a library-specific enum. This lets the catalog stay a plain
//! `anyhow::Result` API while still giving callers a closed, stable taxonomy
//! to branch on (retry `Unresolved`, escalate everything else).
use std::borrow::Cow;

#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("{msg}")]
pub struct ErrorMetadata {
    pub code: ErrorCode,
    /// Short CamelCase tag, stable across copy changes. Used in tests and
    /// logs.
    pub short_msg: Cow<'static, str>,
    /// Human readable, developer facing description.
    pub msg: Cow<'static, str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The requested timestamp is below the GC watermark; unrecoverable.
    SchemaStorageGCed,
    /// The requested timestamp is above the resolved watermark; retryable.
    SchemaStorageUnresolved,
    /// No snapshot exists at or before the requested timestamp.
    SnapshotNotFound,
    SchemaNotFound,
    SchemaExists,
    TableNotFound,
    TableExists,
    InvalidDDLJob,
    /// Wraps an error from the bootstrap catalog loader's `list_databases`.
    MetaListDatabases,
    /// The caller's cancellation token fired while `get_snapshot` was
    /// retrying.
    Cancelled,
}

impl ErrorMetadata {
    fn new(
        code: ErrorCode,
        short_msg: impl Into<Cow<'static, str>>,
        msg: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            code,
            short_msg: short_msg.into(),
            msg: msg.into(),
        }
    }

    pub fn schema_storage_gced(ts: crate::ids::Timestamp, gc_ts: crate::ids::Timestamp) -> Self {
        Self::new(
            ErrorCode::SchemaStorageGCed,
            "SchemaStorageGCed",
            format!("requested timestamp {ts} is below the gc watermark {gc_ts}"),
        )
    }

    pub fn schema_storage_unresolved(
        ts: crate::ids::Timestamp,
        resolved_ts: crate::ids::Timestamp,
    ) -> Self {
        Self::new(
            ErrorCode::SchemaStorageUnresolved,
            "SchemaStorageUnresolved",
            format!("requested timestamp {ts} is above the resolved watermark {resolved_ts}"),
        )
    }

    pub fn snapshot_not_found(ts: crate::ids::Timestamp) -> Self {
        Self::new(
            ErrorCode::SnapshotNotFound,
            "SnapshotNotFound",
            format!("no snapshot exists at or before timestamp {ts}"),
        )
    }

    pub fn schema_not_found(schema_id: crate::ids::SchemaId) -> Self {
        Self::new(
            ErrorCode::SchemaNotFound,
            "SchemaNotFound",
            format!("schema {schema_id} not found"),
        )
    }

    pub fn schema_exists(schema_id: crate::ids::SchemaId) -> Self {
        Self::new(
            ErrorCode::SchemaExists,
            "SchemaExists",
            format!("schema {schema_id} already exists"),
        )
    }

    pub fn table_not_found(table_id: crate::ids::TableId) -> Self {
        Self::new(
            ErrorCode::TableNotFound,
            "TableNotFound",
            format!("table {table_id} not found"),
        )
    }

    pub fn table_exists(table_id: crate::ids::TableId) -> Self {
        Self::new(
            ErrorCode::TableExists,
            "TableExists",
            format!("table {table_id} already exists"),
        )
    }

    pub fn invalid_ddl_job(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::InvalidDDLJob, "InvalidDDLJob", msg)
    }

    pub fn meta_list_databases(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::MetaListDatabases, "MetaListDatabases", msg)
    }

    pub fn cancelled() -> Self {
        Self::new(
            ErrorCode::Cancelled,
            "Cancelled",
            "get_snapshot was cancelled while retrying",
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.code, ErrorCode::SchemaStorageUnresolved)
    }
}

/// Convenience extension for classifying an `anyhow::Error` chain without
/// requiring callers to downcast by hand.
pub trait ErrorMetadataAnyhowExt {
    fn is_retryable(&self) -> bool;
    fn error_code(&self) -> Option<ErrorCode>;
}

impl ErrorMetadataAnyhowExt for anyhow::Error {
    fn is_retryable(&self) -> bool {
        self.downcast_ref::<ErrorMetadata>()
            .is_some_and(ErrorMetadata::is_retryable)
    }

    fn error_code(&self) -> Option<ErrorCode> {
        self.downcast_ref::<ErrorMetadata>().map(|e| e.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Timestamp;

    #[test]
    fn unresolved_is_retryable_gced_is_not() {
        let unresolved: anyhow::Error =
            ErrorMetadata::schema_storage_unresolved(Timestamp(5), Timestamp(3)).into();
        assert!(unresolved.is_retryable());

        let gced: anyhow::Error =
            ErrorMetadata::schema_storage_gced(Timestamp(1), Timestamp(3)).into();
        assert!(!gced.is_retryable());
    }
}
