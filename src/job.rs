//! The wire-level shape of a DDL job, as delivered by the external puller.
//!
//! Everything here is a plain data holder; the core's only job is to
//! interpret it in [`crate::snapshot::Snapshot::apply`]. `query` (the
//! original SQL text) is carried but never parsed — it exists purely so a
//! caller can log the DDL that produced a given snapshot.
use std::collections::BTreeSet;

use crate::ids::{
    JobId,
    PartitionId,
    SchemaId,
    SchemaName,
    TableId,
    TableName,
    Timestamp,
};

/// Only `Done` and `Synced` jobs are actionable; every other state is a
/// duplicate produced by the upstream's own state-machine transitions and
/// must be silently ignored (see [`JobState::is_actionable`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Done,
    Synced,
    /// Catch-all for any other upstream state (queued, running, rollback
    /// done, cancelled, ...). Carried verbatim for logging.
    Other(String),
}

impl JobState {
    pub fn is_actionable(&self) -> bool {
        matches!(self, JobState::Done | JobState::Synced)
    }
}

/// The schema-level metadata carried by `CreateSchema` and
/// `ModifySchemaCharsetAndCollate` jobs. `collation` is opaque to the core —
/// carried verbatim so a replayed snapshot matches the source byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbInfo {
    pub schema_id: SchemaId,
    pub schema_name: SchemaName,
    pub collation: String,
}

/// An ordered set of partition ids belonging to one partitioned table.
/// Partition ids share an id space with table ids (see [`crate::ids`]) and
/// are independently addressable for event routing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartitionInfo {
    ids: Vec<PartitionId>,
}

impl PartitionInfo {
    pub fn new(ids: Vec<PartitionId>) -> Self {
        Self { ids }
    }

    pub fn ids(&self) -> &[PartitionId] {
        &self.ids
    }

    pub fn ids_set(&self) -> BTreeSet<PartitionId> {
        self.ids.iter().copied().collect()
    }
}

/// Table-level metadata carried by every job that creates or replaces a
/// table. The column/index structure proper is opaque to the core; only the
/// fields that feed the eligibility predicate are modeled explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub table_id: TableId,
    pub table_name: TableName,
    /// Sequences are never eligible for replication, force_replicate or not.
    pub is_sequence: bool,
    pub has_primary_key: bool,
    pub has_unique_index: bool,
    pub partition_info: Option<PartitionInfo>,
}

/// Parallel-array payload for `RenameTables`, the multi-entity rename used
/// (among other things) to swap two table names atomically. See
/// [`crate::snapshot::Snapshot::apply`] for the two-phase drop-then-create
/// protocol this payload drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiRenamePayload {
    pub old_schema_ids: Vec<SchemaId>,
    pub new_schema_ids: Vec<SchemaId>,
    pub new_table_names: Vec<TableName>,
    pub old_table_ids: Vec<TableId>,
    pub old_schema_names: Vec<SchemaName>,
    pub new_table_infos: Vec<TableInfo>,
}

/// The kind-specific payload of a job. `None` is valid for any kind — it
/// models a job whose payload failed to decode upstream, which the core
/// logs and skips rather than erroring on (forward compatibility with
/// unknown DDL kinds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlPayload {
    Schema(DbInfo),
    Table(TableInfo),
    MultiRename(MultiRenamePayload),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlKind {
    CreateSchema,
    ModifySchemaCharsetAndCollate,
    DropSchema,
    CreateTable,
    CreateView,
    RecoverTable,
    DropTable,
    DropView,
    RenameTable,
    RenameTables,
    TruncateTable,
    AddTablePartition,
    DropTablePartition,
    TruncateTablePartition,
    /// Column changes, index changes, and anything else that replaces a
    /// table's `TableInfo` in place without changing its id or name.
    Other,
}

/// A single DDL job as delivered by the external puller. `schema_name` may
/// arrive unset (the core fills it via
/// [`crate::snapshot::Snapshot::fill_schema_name`]) and `table_id` is only
/// meaningful for kinds that target one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlJob {
    pub job_id: JobId,
    pub kind: DdlKind,
    pub schema_id: SchemaId,
    pub schema_name: Option<SchemaName>,
    pub table_id: Option<TableId>,
    pub query: String,
    pub finished_ts: Timestamp,
    pub state: JobState,
    pub payload: DdlPayload,
}

impl DdlJob {
    pub fn is_actionable(&self) -> bool {
        self.state.is_actionable()
    }
}
