//! [`Storage`]: the concurrency-safe front door onto the catalog.
//!
//! One writer (the DDL ingestion task) calls [`Storage::handle_ddl_job`]
//! serially; any number of readers call [`Storage::get_snapshot`]
//! concurrently. A plain `parking_lot::RwLock` guards the history rather
//! than a split reader/writer lock, since this catalog has exactly one
//! writer and no need for finer-grained commit coordination.
use std::sync::{
    atomic::{
        AtomicU64,
        Ordering,
    },
    Arc,
};

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{
    info,
    warn,
};

use crate::{
    backoff::Backoff,
    bootstrap::BootstrapCatalog,
    error::{
        ErrorCode,
        ErrorMetadata,
        ErrorMetadataAnyhowExt,
    },
    filter::DdlFilter,
    history::History,
    ids::Timestamp,
    job::DdlJob,
    knobs,
    snapshot::Snapshot,
};

pub struct Storage {
    /// Opaque label used only in logs, e.g. the upstream changefeed id.
    id: String,
    history: parking_lot::RwLock<History>,
    resolved_ts: AtomicU64,
    gc_ts: AtomicU64,
    filter: Arc<dyn DdlFilter>,
    force_replicate: bool,
}

impl Storage {
    /// Loads every schema and table from `catalog` and builds the initial
    /// snapshot at `start_ts`. `start_ts` becomes both the first resolved
    /// timestamp and the first gc timestamp.
    pub async fn bootstrap(
        id: impl Into<String>,
        start_ts: Timestamp,
        force_replicate: bool,
        filter: Arc<dyn DdlFilter>,
        catalog: &dyn BootstrapCatalog,
    ) -> anyhow::Result<Self> {
        let databases = catalog
            .list_databases()
            .await
            .map_err(|e| anyhow::anyhow!(ErrorMetadata::meta_list_databases(e.to_string())))?;
        let mut schemas = Vec::with_capacity(databases.len());
        for db in databases {
            let tables = catalog
                .list_tables(db.schema_id)
                .await
                .with_context(|| format!("listing tables for schema {}", db.schema_id))?;
            schemas.push((crate::schema::Schema::from_db_info(&db), tables));
        }
        let snapshot = Snapshot::bootstrap(start_ts, force_replicate, schemas)?;
        Ok(Self {
            id: id.into(),
            history: parking_lot::RwLock::new(History::new(snapshot)),
            resolved_ts: AtomicU64::new(start_ts.0),
            gc_ts: AtomicU64::new(start_ts.0),
            filter,
            force_replicate,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn resolved_ts(&self) -> Timestamp {
        Timestamp(self.resolved_ts.load(Ordering::Acquire))
    }

    pub fn gc_ts(&self) -> Timestamp {
        Timestamp(self.gc_ts.load(Ordering::Acquire))
    }

    /// Non-blocking lookup: returns immediately with `SchemaStorageUnresolved`
    /// if `ts` hasn't resolved yet, or `SchemaStorageGCed` if it's been
    /// garbage collected.
    fn get_snapshot_once(&self, ts: Timestamp) -> anyhow::Result<Arc<Snapshot>> {
        let resolved = self.resolved_ts();
        if ts > resolved {
            anyhow::bail!(ErrorMetadata::schema_storage_unresolved(ts, resolved));
        }
        let gc_ts = self.gc_ts();
        if ts < gc_ts {
            anyhow::bail!(ErrorMetadata::schema_storage_gced(ts, gc_ts));
        }
        self.history
            .read()
            .lookup(ts)
            .ok_or_else(|| anyhow::anyhow!(ErrorMetadata::snapshot_not_found(ts)))
    }

    /// Blocking lookup: retries with jittered exponential backoff while `ts`
    /// remains unresolved, up to `cancel` firing. A retry that has been
    /// running for longer than [`knobs::SNAPSHOT_RETRY_WARN_THRESHOLD`] logs
    /// one warning, the first time it crosses the threshold.
    pub async fn get_snapshot(
        &self,
        ts: Timestamp,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Arc<Snapshot>> {
        let mut backoff = Backoff::new(
            knobs::SNAPSHOT_RETRY_INITIAL_BACKOFF,
            knobs::SNAPSHOT_RETRY_MAX_BACKOFF,
        );
        let mut rng = rand::rng();
        let started = tokio::time::Instant::now();
        let mut warned = false;
        loop {
            match self.get_snapshot_once(ts) {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) if e.error_code() == Some(ErrorCode::SchemaStorageUnresolved) => {
                    if cancel.is_cancelled() {
                        anyhow::bail!(ErrorMetadata::cancelled());
                    }
                    if !warned && started.elapsed() >= knobs::SNAPSHOT_RETRY_WARN_THRESHOLD {
                        warned = true;
                        warn!(
                            storage_id = %self.id,
                            ts = %ts,
                            elapsed_secs = started.elapsed().as_secs(),
                            "get_snapshot has been retrying for a long time"
                        );
                    }
                    let delay = backoff.fail(&mut rng);
                    tokio::select! {
                        _ = cancel.cancelled() => anyhow::bail!(ErrorMetadata::cancelled()),
                        _ = tokio::time::sleep(delay) => {},
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }

    pub fn get_last_snapshot(&self) -> Arc<Snapshot> {
        self.history.read().latest()
    }

    /// Ingests one DDL job. Not reentrant: callers must serialize calls to
    /// this method themselves (a single ingestion task, never a pool).
    ///
    /// A job is skipped — logged, not an error — when the configured filter
    /// discards its kind, when its upstream state isn't actionable yet, or
    /// when it has already been applied (its `finished_ts` is at or before
    /// the current latest snapshot), which makes replaying the same job
    /// twice from an upstream resumption point safe.
    pub fn handle_ddl_job(&self, job: &DdlJob) -> anyhow::Result<()> {
        if self.filter.should_discard_ddl(job.kind) {
            info!(job_id = job.job_id, kind = ?job.kind, "discarding DDL job: filtered");
            self.advance_resolved_ts(job.finished_ts);
            return Ok(());
        }
        if !job.is_actionable() {
            info!(job_id = job.job_id, kind = ?job.kind, state = ?job.state, "skipping DDL job: not actionable");
            self.advance_resolved_ts(job.finished_ts);
            return Ok(());
        }

        let mut job = job.clone();
        let latest = self.history.read().latest();
        if job.finished_ts <= latest.current_ts() {
            info!(
                job_id = job.job_id,
                finished_ts = %job.finished_ts,
                current_ts = %latest.current_ts(),
                "skipping DDL job: already applied"
            );
            return Ok(());
        }
        if job.schema_name.is_none() {
            latest.fill_schema_name(&mut job)?;
        }

        let next = latest
            .apply(&job)
            .with_context(|| format!("applying DDL job {}", job.job_id))?;
        let finished_ts = next.current_ts();
        self.history.write().append(next);
        self.advance_resolved_ts(finished_ts);
        Ok(())
    }

    /// Monotonically advances `resolved_ts` to `ts`, a no-op if `ts` is not
    /// past the current value. Safe to call concurrently with itself (e.g.
    /// from a separate watermark-advance signal racing a DDL apply), though
    /// in practice only the single ingestion task calls this.
    pub fn advance_resolved_ts(&self, ts: Timestamp) {
        let mut current = self.resolved_ts.load(Ordering::Relaxed);
        while ts.0 > current {
            match self.resolved_ts.compare_exchange_weak(
                current,
                ts.0,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// Discards every snapshot needed only to answer lookups below `ts`.
    /// Returns the timestamp of the oldest snapshot retained, which becomes
    /// the new `gc_ts` watermark.
    pub fn do_gc(&self, ts: Timestamp) -> Timestamp {
        let retained = self.history.write().truncate_below(ts);
        self.gc_ts.store(retained.0, Ordering::Release);
        retained
    }

    pub fn force_replicate(&self) -> bool {
        self.force_replicate
    }

    pub fn status_dump(&self) {
        info!(storage_id = %self.id, resolved_ts = %self.resolved_ts(), gc_ts = %self.gc_ts(), "storage status");
        self.history.read().latest().status_dump();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{
        bootstrap::StaticCatalog,
        filter::AllowAllFilter,
        job::{
            DbInfo,
            DdlKind,
            DdlPayload,
            JobState,
            TableInfo,
        },
        schema::Schema,
    };

    fn catalog() -> StaticCatalog {
        StaticCatalog {
            databases: vec![DbInfo {
                schema_id: 1,
                schema_name: crate::ids::SchemaName::from("db1"),
                collation: "utf8".into(),
            }],
            tables: HashMap::from([(
                1,
                vec![TableInfo {
                    table_id: 100,
                    table_name: crate::ids::TableName::from("t"),
                    is_sequence: false,
                    has_primary_key: true,
                    has_unique_index: false,
                    partition_info: None,
                }],
            )]),
        }
    }

    async fn bootstrap() -> Storage {
        Storage::bootstrap(
            "test",
            Timestamp(1),
            false,
            Arc::new(AllowAllFilter),
            &catalog(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn unresolved_lookup_is_retryable_and_gced_is_not() {
        let storage = bootstrap().await;
        let err = storage.get_snapshot_once(Timestamp(5)).unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::SchemaStorageUnresolved));
        assert!(err.is_retryable());

        storage.do_gc(Timestamp(1));
        let err = storage.get_snapshot_once(Timestamp(0)).unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::SchemaStorageGCed));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn handle_ddl_job_advances_resolved_ts_and_is_idempotent() {
        let storage = bootstrap().await;
        let job = DdlJob {
            job_id: 1,
            kind: DdlKind::DropTable,
            schema_id: 1,
            schema_name: None,
            table_id: Some(100),
            query: String::new(),
            finished_ts: Timestamp(5),
            state: JobState::Done,
            payload: DdlPayload::None,
        };
        storage.handle_ddl_job(&job).unwrap();
        assert_eq!(storage.resolved_ts(), Timestamp(5));
        assert!(storage.get_last_snapshot().table_by_id(100).is_none());

        // Replaying the same job (e.g. after an upstream resumption) is a
        // silent no-op, not a TableNotFound error.
        storage.handle_ddl_job(&job).unwrap();
        assert_eq!(storage.resolved_ts(), Timestamp(5));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn get_snapshot_blocks_until_resolved_then_returns() {
        let storage = Arc::new(bootstrap().await);
        let cancel = CancellationToken::new();

        let reader = {
            let storage = storage.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { storage.get_snapshot(Timestamp(5), &cancel).await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let job = DdlJob {
            job_id: 1,
            kind: DdlKind::DropTable,
            schema_id: 1,
            schema_name: None,
            table_id: Some(100),
            query: String::new(),
            finished_ts: Timestamp(5),
            state: JobState::Done,
            payload: DdlPayload::None,
        };
        storage.handle_ddl_job(&job).unwrap();

        let snapshot = reader.await.unwrap().unwrap();
        assert_eq!(snapshot.current_ts(), Timestamp(5));
    }

    #[tokio::test]
    async fn get_snapshot_respects_cancellation() {
        let storage = bootstrap().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = storage.get_snapshot(Timestamp(5), &cancel).await.unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::Cancelled));
    }

    #[test]
    fn filter_discards_but_still_advances_resolved_ts() {
        let filter: Arc<dyn DdlFilter> = Arc::new(crate::filter::DenyListFilter::new([DdlKind::CreateView]));
        let storage = Storage {
            id: "test".into(),
            history: parking_lot::RwLock::new(History::new(bootstrap_empty_snapshot())),
            resolved_ts: AtomicU64::new(1),
            gc_ts: AtomicU64::new(1),
            filter,
            force_replicate: false,
        };
        let job = DdlJob {
            job_id: 1,
            kind: DdlKind::CreateView,
            schema_id: 1,
            schema_name: None,
            table_id: None,
            query: String::new(),
            finished_ts: Timestamp(5),
            state: JobState::Done,
            payload: DdlPayload::None,
        };
        storage.handle_ddl_job(&job).unwrap();
        assert_eq!(storage.resolved_ts(), Timestamp(5));
    }

    fn bootstrap_empty_snapshot() -> Snapshot {
        Snapshot::bootstrap(Timestamp(1), false, vec![]).unwrap()
    }
}
