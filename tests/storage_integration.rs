//! End-to-end coverage through the public `Storage` API only: bootstrap,
//! ingest a few DDL jobs, GC, and check what a consumer can and can't still
//! see. Complements the scenario-focused unit tests colocated with
//! `Snapshot::apply` and `History::truncate_below`.
use std::{
    collections::HashMap,
    sync::Arc,
};

use async_trait::async_trait;
use schema_catalog::{
    AllowAllFilter,
    BootstrapCatalog,
    DbInfo,
    DdlJob,
    DdlKind,
    DdlPayload,
    ErrorCode,
    ErrorMetadataAnyhowExt,
    JobState,
    SchemaId,
    SchemaName,
    Storage,
    TableInfo,
    TableName,
    Timestamp,
};

struct FixtureCatalog {
    databases: Vec<DbInfo>,
    tables: HashMap<SchemaId, Vec<TableInfo>>,
}

#[async_trait]
impl BootstrapCatalog for FixtureCatalog {
    async fn list_databases(&self) -> anyhow::Result<Vec<DbInfo>> {
        Ok(self.databases.clone())
    }

    async fn list_tables(&self, schema_id: SchemaId) -> anyhow::Result<Vec<TableInfo>> {
        Ok(self.tables.get(&schema_id).cloned().unwrap_or_default())
    }
}

fn one_table_info(id: u64, name: &str) -> TableInfo {
    TableInfo {
        table_id: id,
        table_name: TableName::from(name),
        is_sequence: false,
        has_primary_key: true,
        has_unique_index: false,
        partition_info: None,
    }
}

async fn bootstrap() -> Storage {
    let catalog = FixtureCatalog {
        databases: vec![DbInfo {
            schema_id: 1,
            schema_name: SchemaName::from("db1"),
            collation: "utf8".into(),
        }],
        tables: HashMap::from([(1, vec![one_table_info(100, "orders")])]),
    };
    Storage::bootstrap("fixture", Timestamp(1), false, Arc::new(AllowAllFilter), &catalog)
        .await
        .unwrap()
}

fn drop_job(id: u64, ts: u64) -> DdlJob {
    DdlJob {
        job_id: ts,
        kind: DdlKind::DropTable,
        schema_id: 1,
        schema_name: None,
        table_id: Some(id),
        query: String::new(),
        finished_ts: Timestamp(ts),
        state: JobState::Done,
        payload: DdlPayload::None,
    }
}

#[tokio::test]
async fn gc_below_a_retained_timestamp_answers_lookups_unaffected() {
    let storage = bootstrap().await;
    storage.handle_ddl_job(&drop_job(100, 5)).unwrap();

    // do_gc(Timestamp(6)) against snapshots at {1, 5} retains the newest
    // snapshot at or before 6, which is the one at ts=5.
    let retained = storage.do_gc(Timestamp(6));
    assert_eq!(retained, Timestamp(5));
    assert_eq!(storage.gc_ts(), Timestamp(5));

    let snapshot = storage.get_last_snapshot();
    assert!(snapshot.table_by_id(100).is_none());
}

#[tokio::test]
async fn lookup_below_gc_watermark_is_not_retryable() {
    let storage = bootstrap().await;
    storage.handle_ddl_job(&drop_job(100, 5)).unwrap();
    storage.do_gc(Timestamp(5));

    let cancel = tokio_util::sync::CancellationToken::new();
    let err = storage.get_snapshot(Timestamp(1), &cancel).await.unwrap_err();
    assert_eq!(err.error_code(), Some(ErrorCode::SchemaStorageGCed));
}

#[tokio::test]
async fn non_actionable_job_state_is_skipped() {
    let storage = bootstrap().await;
    let mut job = drop_job(100, 5);
    job.state = JobState::Other("queueing".to_string());
    storage.handle_ddl_job(&job).unwrap();

    assert_eq!(storage.resolved_ts(), Timestamp(5));
    assert!(storage.get_last_snapshot().table_by_id(100).is_some());
}
