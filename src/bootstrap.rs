//! The contract used once, at construction, to load the catalog's initial
//! state from whatever upstream metadata store the embedding system talks
//! to. Modeled as an `async_trait` seam since the methods are expected to do
//! network I/O against a meta service.
use async_trait::async_trait;

use crate::{
    ids::SchemaId,
    job::{
        DbInfo,
        TableInfo,
    },
};

/// Loads every schema and the tables it owns at the catalog's starting
/// timestamp. Implemented by the embedder; the catalog itself never talks to
/// a meta store directly.
#[async_trait]
pub trait BootstrapCatalog: Send + Sync {
    /// Every schema known at the bootstrap timestamp.
    async fn list_databases(&self) -> anyhow::Result<Vec<DbInfo>>;

    /// Every table owned by `schema_id` at the bootstrap timestamp. Errors
    /// from a single schema fail the whole bootstrap; there is no partial
    /// catalog.
    async fn list_tables(&self, schema_id: SchemaId) -> anyhow::Result<Vec<TableInfo>>;
}

#[cfg(test)]
pub(crate) struct StaticCatalog {
    pub databases: Vec<DbInfo>,
    pub tables: std::collections::HashMap<SchemaId, Vec<TableInfo>>,
}

#[cfg(test)]
#[async_trait]
impl BootstrapCatalog for StaticCatalog {
    async fn list_databases(&self) -> anyhow::Result<Vec<DbInfo>> {
        Ok(self.databases.clone())
    }

    async fn list_tables(&self, schema_id: SchemaId) -> anyhow::Result<Vec<TableInfo>> {
        Ok(self.tables.get(&schema_id).cloned().unwrap_or_default())
    }
}
