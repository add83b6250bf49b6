//! The `Table` record stored in a [`crate::snapshot::Snapshot`].
use crate::{
    ids::{
        SchemaId,
        SchemaName,
        TableId,
        Timestamp,
    },
    job::{
        PartitionInfo,
        TableInfo,
    },
};

/// A named relation: a table, view, or sequence. Like [`crate::schema::Schema`],
/// `Table` values are treated as immutable once constructed; every DDL that
/// changes a table's shape produces a new `Table` rather than mutating the
/// old one in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub table_id: TableId,
    pub schema_id: SchemaId,
    /// Denormalized for reverse lookup (`schema_by_table_id`) without a
    /// second index hop.
    pub schema_name: SchemaName,
    pub table_name: crate::ids::TableName,
    /// The commit-ts of the DDL that produced this version of the table.
    pub finished_ts: Timestamp,
    pub is_sequence: bool,
    pub has_primary_key: bool,
    pub has_unique_index: bool,
    pub partition_info: Option<PartitionInfo>,
}

impl Table {
    pub fn new(
        schema_id: SchemaId,
        schema_name: SchemaName,
        finished_ts: Timestamp,
        info: &TableInfo,
    ) -> Self {
        Self {
            table_id: info.table_id,
            schema_id,
            schema_name,
            table_name: info.table_name.clone(),
            finished_ts,
            is_sequence: info.is_sequence,
            has_primary_key: info.has_primary_key,
            has_unique_index: info.has_unique_index,
            partition_info: info.partition_info.clone(),
        }
    }

    /// Whether downstream replication can handle this table: it has a usable
    /// row identity (a primary key or a unique index) and isn't a sequence,
    /// unless `force_replicate` overrides the identity requirement.
    /// Sequences are never eligible regardless of `force_replicate`.
    pub fn is_eligible(&self, force_replicate: bool) -> bool {
        if self.is_sequence {
            return false;
        }
        force_replicate || self.has_primary_key || self.has_unique_index
    }

    pub fn is_partitioned(&self) -> bool {
        self.partition_info.is_some()
    }
}
