//! One producer serially ingesting DDL jobs, many concurrent consumers
//! blocking on `get_snapshot` at arbitrary timestamps. Checks the ordering
//! law (`get_snapshot(ts)` never returns a snapshot whose own timestamp
//! exceeds `ts`) and that every consumer eventually makes progress once the
//! producer catches up.
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
    JobState,
    SchemaId,
    SchemaName,
    Storage,
    TableInfo,
    Timestamp,
};
use tokio_util::sync::CancellationToken;

struct EmptyCatalog;

#[async_trait]
impl BootstrapCatalog for EmptyCatalog {
    async fn list_databases(&self) -> anyhow::Result<Vec<DbInfo>> {
        Ok(vec![DbInfo {
            schema_id: 1,
            schema_name: SchemaName::from("db1"),
            collation: "utf8".into(),
        }])
    }

    async fn list_tables(&self, _schema_id: SchemaId) -> anyhow::Result<Vec<TableInfo>> {
        Ok(vec![])
    }
}

const NUM_JOBS: u64 = 20;
const NUM_CONSUMERS: u64 = 8;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_observe_a_snapshot_past_their_requested_timestamp() {
    let storage = Arc::new(
        Storage::bootstrap("concurrency", Timestamp(0), false, Arc::new(AllowAllFilter), &EmptyCatalog)
            .await
            .unwrap(),
    );
    let cancel = CancellationToken::new();

    let mut consumers = Vec::new();
    for i in 0..NUM_CONSUMERS {
        let storage = storage.clone();
        let cancel = cancel.clone();
        // Spread requested timestamps across the whole range the producer
        // will eventually resolve.
        let ts = Timestamp((i * NUM_JOBS / NUM_CONSUMERS) + 1);
        consumers.push(tokio::spawn(async move {
            let snapshot = storage.get_snapshot(ts, &cancel).await.unwrap();
            assert!(snapshot.current_ts() <= ts, "ordering law violated: got {:?} for request {:?}", snapshot.current_ts(), ts);
        }));
    }

    let producer = {
        let storage = storage.clone();
        tokio::spawn(async move {
            for ts in 1..=NUM_JOBS {
                tokio::task::yield_now().await;
                let job = DdlJob {
                    job_id: ts,
                    kind: DdlKind::Other,
                    schema_id: 1,
                    schema_name: None,
                    table_id: None,
                    query: String::new(),
                    finished_ts: Timestamp(ts),
                    state: JobState::Done,
                    payload: DdlPayload::None,
                };
                storage.handle_ddl_job(&job).unwrap();
            }
        })
    };

    producer.await.unwrap();
    for consumer in consumers {
        consumer.await.unwrap();
    }

    assert_eq!(storage.resolved_ts(), Timestamp(NUM_JOBS));
    cancel.cancel();
}
