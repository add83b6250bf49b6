//! The `Schema` record stored in a [`crate::snapshot::Snapshot`].
use crate::{
    ids::{
        SchemaId,
        SchemaName,
    },
    job::DbInfo,
};

/// A named namespace containing tables. Schemas are treated as immutable
/// once constructed — a `ModifySchemaCharsetAndCollate` produces a brand new
/// `Schema` value rather than mutating one in place, which is what lets
/// [`crate::snapshot::Snapshot`] share them by reference across clones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub schema_id: SchemaId,
    pub schema_name: SchemaName,
    /// Opaque collation/charset metadata, carried verbatim.
    pub collation: String,
}

impl Schema {
    /// Defensively copies out of `info` so that later mutation of a
    /// caller-owned `DbInfo` (e.g. one still referenced by the DDL job that
    /// produced it) can never reach back into the snapshot.
    pub fn from_db_info(info: &DbInfo) -> Self {
        Self {
            schema_id: info.schema_id,
            schema_name: info.schema_name.clone(),
            collation: info.collation.clone(),
        }
    }
}
