//! A multi-version schema catalog for change-data-capture pipelines.
//!
//! Tracks every DDL-visible schema change as an ordered sequence of
//! [`Snapshot`](snapshot::Snapshot)s keyed by commit timestamp, so that
//! multiple downstream consumers processing row-change events at different
//! points in time can each resolve the schema that was live when their event
//! committed — without blocking on, or racing, the single DDL ingestion
//! stream that keeps the catalog current.
//!
//! [`storage::Storage`] is the entry point: bootstrap it from a
//! [`bootstrap::BootstrapCatalog`], feed it DDL jobs serially through
//! [`storage::Storage::handle_ddl_job`], and look up point-in-time snapshots
//! through [`storage::Storage::get_snapshot`].

pub mod backoff;
pub mod bootstrap;
pub mod error;
pub mod filter;
pub mod history;
pub mod ids;
pub mod job;
pub mod knobs;
pub mod schema;
pub mod snapshot;
pub mod storage;
pub mod table;

pub use crate::{
    bootstrap::BootstrapCatalog,
    error::{
        ErrorCode,
        ErrorMetadata,
        ErrorMetadataAnyhowExt,
    },
    filter::{
        AllowAllFilter,
        DdlFilter,
        DenyListFilter,
    },
    ids::{
        JobId,
        ObjectId,
        PartitionId,
        QualifiedTableName,
        SchemaId,
        SchemaName,
        TableId,
        TableName,
        Timestamp,
    },
    job::{
        DbInfo,
        DdlJob,
        DdlKind,
        DdlPayload,
        JobState,
        MultiRenamePayload,
        PartitionInfo,
        TableInfo,
    },
    schema::Schema,
    snapshot::Snapshot,
    storage::Storage,
    table::Table,
};
