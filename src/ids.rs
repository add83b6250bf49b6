//! Small newtype wrappers for the identifiers the catalog deals in.
//!
//! Table ids and partition ids intentionally share a representation
//! (`ObjectId`) because they share an id space at the source: a partition id
//! is never reused as the id of an unrelated logical table. Keeping them as
//! distinct type aliases rather than a shared supertype mirrors how the
//! source models them as "just integers" while still giving call sites a
//! name to read.

use std::fmt;

use derive_more::{
    Display,
    From,
};

/// The commit timestamp a DDL job became visible at the source. Snapshots are
/// filed under this value and the whole core treats it as a totally ordered,
/// monotonically advancing clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From)]
#[cfg_attr(
    any(test, feature = "testing"),
    derive(proptest_derive::Arbitrary)
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const MIN: Timestamp = Timestamp(0);

    pub fn succ(self) -> Timestamp {
        Timestamp(self.0 + 1)
    }
}

/// An object id: a table id, or a partition id, or (before it is known which)
/// a raw integer straight off the wire. See the module doc for why these
/// share a representation.
pub type ObjectId = u64;

pub type SchemaId = ObjectId;
pub type TableId = ObjectId;
pub type PartitionId = ObjectId;
pub type JobId = u64;

/// The name of a schema (database), scoped only by equality/hashing — the
/// core never parses or validates these, it just carries them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From)]
pub struct SchemaName(pub String);

impl SchemaName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SchemaName {
    fn from(s: &str) -> Self {
        SchemaName(s.to_owned())
    }
}

/// The name of a table, view, or sequence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From)]
pub struct TableName(pub String);

impl TableName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TableName {
    fn from(s: &str) -> Self {
        TableName(s.to_owned())
    }
}

/// A fully qualified table name, used as a key for the `(schema, table) ->
/// table_id` index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedTableName {
    pub schema_name: SchemaName,
    pub table_name: TableName,
}

impl fmt::Display for QualifiedTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema_name.0, self.table_name.0)
    }
}
