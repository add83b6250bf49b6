//! [`Snapshot`]: a complete, immutable-by-convention schema image at one
//! timestamp, and the private DDL-application routine that turns one
//! snapshot into the next.
//!
//! Every index here is an `imbl` persistent collection, so `Snapshot::clone`
//! (the hot path: "clone latest, apply, append") is O(1) plus O(log n) per
//! subsequent mutation rather than a deep copy. `Schema` and `Table` records
//! are wrapped in `Arc` and shared by reference across snapshots, since both
//! are treated as immutable once constructed.
use std::{
    collections::BTreeSet,
    sync::Arc,
};

use anyhow::Context;
use imbl::{
    HashMap,
    HashSet,
    Vector,
};
use itertools::Itertools;
use tracing::debug;

use crate::{
    error::ErrorMetadata,
    ids::{
        ObjectId,
        QualifiedTableName,
        SchemaId,
        SchemaName,
        TableId,
        TableName,
        Timestamp,
    },
    job::{
        DdlJob,
        DdlKind,
        DdlPayload,
        TableInfo,
    },
    schema::Schema,
    table::Table,
};

#[derive(Debug, Clone)]
pub struct Snapshot {
    current_ts: Timestamp,
    force_replicate: bool,

    schemas: HashMap<SchemaId, Arc<Schema>>,
    schema_name_index: HashMap<SchemaName, SchemaId>,

    tables: HashMap<TableId, Arc<Table>>,
    partition_index: HashMap<ObjectId, Arc<Table>>,
    table_name_index: HashMap<QualifiedTableName, TableId>,
    /// Ordered membership lists, one per schema. Copied by value on clone
    /// (via `imbl::Vector`'s structural sharing) because DDLs mutate the
    /// membership of a specific schema without touching anyone else's.
    schema_tables: HashMap<SchemaId, Vector<TableId>>,

    truncated_ids: HashSet<ObjectId>,
    ineligible_ids: HashSet<ObjectId>,
}

impl Snapshot {
    /// Builds the initial snapshot from the bootstrap catalog loader's
    /// output. `schemas` pairs each schema with the tables it owns at
    /// `start_ts`.
    pub fn bootstrap(
        start_ts: Timestamp,
        force_replicate: bool,
        schemas: Vec<(Schema, Vec<TableInfo>)>,
    ) -> anyhow::Result<Self> {
        let mut snapshot = Self {
            current_ts: start_ts,
            force_replicate,
            schemas: HashMap::new(),
            schema_name_index: HashMap::new(),
            tables: HashMap::new(),
            partition_index: HashMap::new(),
            table_name_index: HashMap::new(),
            schema_tables: HashMap::new(),
            truncated_ids: HashSet::new(),
            ineligible_ids: HashSet::new(),
        };
        for (schema, table_infos) in schemas {
            let schema_id = schema.schema_id;
            let schema_name = schema.schema_name.clone();
            if snapshot.schemas.contains_key(&schema_id) {
                anyhow::bail!(ErrorMetadata::schema_exists(schema_id));
            }
            snapshot.schema_name_index.insert(schema_name.clone(), schema_id);
            snapshot.schemas.insert(schema_id, Arc::new(schema));
            snapshot.schema_tables.insert(schema_id, Vector::new());
            for info in &table_infos {
                snapshot.insert_table(schema_id, schema_name.clone(), start_ts, info)?;
            }
        }
        Ok(snapshot)
    }

    pub fn current_ts(&self) -> Timestamp {
        self.current_ts
    }

    pub fn force_replicate(&self) -> bool {
        self.force_replicate
    }

    /// Direct lookup only; does not resolve partition ids. See
    /// [`Self::physical_table_by_id`] for the union lookup.
    pub fn table_by_id(&self, id: TableId) -> Option<&Arc<Table>> {
        self.tables.get(&id)
    }

    /// Resolves partition ids to the owning logical table. Must consult
    /// `tables` first, `partition_index` second, since a partition id and a
    /// table id never collide within one snapshot but a caller may pass
    /// either.
    pub fn physical_table_by_id(&self, id: ObjectId) -> Option<&Arc<Table>> {
        self.tables.get(&id).or_else(|| self.partition_index.get(&id))
    }

    pub fn table_name_by_id(&self, id: ObjectId) -> Option<&TableName> {
        self.physical_table_by_id(id).map(|t| &t.table_name)
    }

    pub fn table_id_by_name(&self, schema: &SchemaName, table: &TableName) -> Option<TableId> {
        self.table_name_index
            .get(&QualifiedTableName {
                schema_name: schema.clone(),
                table_name: table.clone(),
            })
            .copied()
    }

    pub fn table_by_name(&self, schema: &SchemaName, table: &TableName) -> Option<&Arc<Table>> {
        let id = self.table_id_by_name(schema, table)?;
        self.tables.get(&id)
    }

    pub fn schema_by_id(&self, id: SchemaId) -> Option<&Arc<Schema>> {
        self.schemas.get(&id)
    }

    pub fn schema_by_table_id(&self, id: ObjectId) -> Option<&Arc<Schema>> {
        let table = self.physical_table_by_id(id)?;
        self.schemas.get(&table.schema_id)
    }

    pub fn is_truncated(&self, id: ObjectId) -> bool {
        self.truncated_ids.contains(&id)
    }

    pub fn is_ineligible(&self, id: ObjectId) -> bool {
        self.ineligible_ids.contains(&id)
    }

    /// Deep copy for external use: callers get an owned map they can hold
    /// onto past the lifetime of this snapshot.
    pub fn clone_table_names(&self) -> std::collections::HashMap<TableId, TableName> {
        self.tables
            .iter()
            .map(|(id, table)| (*id, table.table_name.clone()))
            .collect()
    }

    /// Borrowed, read-only view over every table in the snapshot. The
    /// `imbl` map only exposes shared references through this accessor;
    /// mutation is confined to `apply`, which always operates on a private
    /// clone.
    pub fn tables(&self) -> &HashMap<TableId, Arc<Table>> {
        &self.tables
    }

    /// Populates `job.schema_name` from internal state.
    pub fn fill_schema_name(&self, job: &mut DdlJob) -> anyhow::Result<()> {
        let schema = self
            .schemas
            .get(&job.schema_id)
            .ok_or_else(|| anyhow::anyhow!(ErrorMetadata::schema_not_found(job.schema_id)))?;
        job.schema_name = Some(schema.schema_name.clone());
        Ok(())
    }

    /// Emits one `tracing` event per schema, per table, per partition, and
    /// summary events for the truncated/ineligible id sets. The only
    /// observable side effect besides the events logged at DDL-apply time.
    pub fn status_dump(&self) {
        debug!(current_ts = %self.current_ts, "schema storage snapshot status dump");
        // Sorted so consecutive dumps diff cleanly in logs.
        for schema in self.schemas.values().sorted_by_key(|s| s.schema_id) {
            debug!(schema_id = schema.schema_id, schema_name = %schema.schema_name, "schema");
        }
        for table in self.tables.values().sorted_by_key(|t| t.table_id) {
            debug!(
                table_id = table.table_id,
                schema_id = table.schema_id,
                table_name = %table.table_name,
                eligible = table.is_eligible(self.force_replicate),
                "table"
            );
            if let Some(pi) = &table.partition_info {
                for pid in pi.ids() {
                    debug!(partition_id = pid, owning_table_id = table.table_id, "partition");
                }
            }
        }
        debug!(
            truncated_count = self.truncated_ids.len(),
            ineligible_count = self.ineligible_ids.len(),
            "snapshot summary"
        );
    }

    /// Clones `self`, applies `job` to the clone, and returns the result.
    /// `self` is never mutated; on error the partially mutated clone is
    /// simply dropped, so a caller that discards the error (as
    /// `Storage::handle_ddl_job` does) never observes a partially-applied
    /// snapshot.
    pub(crate) fn apply(&self, job: &DdlJob) -> anyhow::Result<Snapshot> {
        let mut next = self.clone();
        next.apply_in_place(job)?;
        next.current_ts = job.finished_ts;
        Ok(next)
    }

    fn apply_in_place(&mut self, job: &DdlJob) -> anyhow::Result<()> {
        match job.kind {
            DdlKind::CreateSchema => {
                let info = self.require_schema_payload(job)?;
                self.create_schema(info)
            },
            DdlKind::ModifySchemaCharsetAndCollate => {
                let info = self.require_schema_payload(job)?;
                self.modify_schema(info)
            },
            DdlKind::DropSchema => self.drop_schema(job.schema_id),
            DdlKind::CreateTable | DdlKind::CreateView | DdlKind::RecoverTable => {
                let info = self.require_table_payload(job)?;
                let schema_name = self.require_schema_name(job.schema_id)?;
                self.insert_table(job.schema_id, schema_name, job.finished_ts, info)
            },
            DdlKind::DropTable | DdlKind::DropView => {
                let table_id = self.require_table_id(job)?;
                self.drop_table(table_id)
            },
            DdlKind::RenameTable => self.rename_table(job),
            DdlKind::RenameTables => self.rename_tables(job),
            DdlKind::TruncateTable => self.truncate_table(job),
            DdlKind::AddTablePartition
            | DdlKind::DropTablePartition
            | DdlKind::TruncateTablePartition => self.reconcile_table_partitions(job),
            DdlKind::Other => self.replace_table(job),
        }
    }

    fn require_schema_payload<'a>(&self, job: &'a DdlJob) -> anyhow::Result<&'a crate::job::DbInfo> {
        match &job.payload {
            DdlPayload::Schema(info) => Ok(info),
            _ => anyhow::bail!(ErrorMetadata::invalid_ddl_job(
                "expected a schema payload for this DDL kind"
            )),
        }
    }

    fn require_table_payload<'a>(&self, job: &'a DdlJob) -> anyhow::Result<&'a TableInfo> {
        match &job.payload {
            DdlPayload::Table(info) => Ok(info),
            _ => anyhow::bail!(ErrorMetadata::invalid_ddl_job(
                "expected a table payload for this DDL kind"
            )),
        }
    }

    fn require_table_id(&self, job: &DdlJob) -> anyhow::Result<TableId> {
        job.table_id
            .ok_or_else(|| anyhow::anyhow!(ErrorMetadata::invalid_ddl_job("job is missing table_id")))
    }

    fn require_schema_name(&self, schema_id: SchemaId) -> anyhow::Result<SchemaName> {
        self.schemas
            .get(&schema_id)
            .map(|s| s.schema_name.clone())
            .ok_or_else(|| anyhow::anyhow!(ErrorMetadata::schema_not_found(schema_id)))
    }

    fn create_schema(&mut self, info: &crate::job::DbInfo) -> anyhow::Result<()> {
        if self.schemas.contains_key(&info.schema_id) {
            anyhow::bail!(ErrorMetadata::schema_exists(info.schema_id));
        }
        let schema = Schema::from_db_info(info);
        self.schema_name_index.insert(schema.schema_name.clone(), schema.schema_id);
        self.schemas.insert(schema.schema_id, Arc::new(schema));
        self.schema_tables.insert(info.schema_id, Vector::new());
        Ok(())
    }

    fn modify_schema(&mut self, info: &crate::job::DbInfo) -> anyhow::Result<()> {
        let old = self
            .schemas
            .get(&info.schema_id)
            .ok_or_else(|| anyhow::anyhow!(ErrorMetadata::schema_not_found(info.schema_id)))?
            .clone();
        let new_schema = Schema::from_db_info(info);
        if old.schema_name != new_schema.schema_name {
            self.schema_name_index.remove(&old.schema_name);
            self.schema_name_index
                .insert(new_schema.schema_name.clone(), new_schema.schema_id);
        }
        self.schemas.insert(new_schema.schema_id, Arc::new(new_schema));
        Ok(())
    }

    fn drop_schema(&mut self, schema_id: SchemaId) -> anyhow::Result<()> {
        let schema = self
            .schemas
            .remove(&schema_id)
            .ok_or_else(|| anyhow::anyhow!(ErrorMetadata::schema_not_found(schema_id)))?;
        self.schema_name_index.remove(&schema.schema_name);
        let owned_tables = self.schema_tables.remove(&schema_id).unwrap_or_default();
        for table_id in owned_tables {
            // Cascades Table's own drop rules (name/partition/eligibility
            // index cleanup); membership bookkeeping for this schema was
            // just removed wholesale above, so don't redo it per-table.
            self.remove_table_record(table_id, false)?;
        }
        Ok(())
    }

    fn insert_table(
        &mut self,
        schema_id: SchemaId,
        schema_name: SchemaName,
        finished_ts: Timestamp,
        info: &TableInfo,
    ) -> anyhow::Result<()> {
        if self.tables.contains_key(&info.table_id) {
            anyhow::bail!(ErrorMetadata::table_exists(info.table_id));
        }
        if !self.schemas.contains_key(&schema_id) {
            anyhow::bail!(ErrorMetadata::schema_not_found(schema_id));
        }
        let table = Table::new(schema_id, schema_name, finished_ts, info);
        let table_id = table.table_id;
        let qualified = QualifiedTableName {
            schema_name: table.schema_name.clone(),
            table_name: table.table_name.clone(),
        };
        let eligible = table.is_eligible(self.force_replicate);
        let table = Arc::new(table);

        self.tables.insert(table_id, table.clone());
        self.table_name_index.insert(qualified, table_id);
        self.schema_tables
            .entry(schema_id)
            .or_insert_with(Vector::new)
            .push_back(table_id);

        self.reconcile_partition_ids(table_id, &table, &BTreeSet::new(), eligible);
        if !eligible {
            self.ineligible_ids.insert(table_id);
        }
        Ok(())
    }

    /// Removes a table and all of its index footprint. `unlink_membership`
    /// is false when the caller (a schema drop) has already cleared the
    /// whole membership list in one shot.
    fn remove_table_record(&mut self, table_id: TableId, unlink_membership: bool) -> anyhow::Result<Arc<Table>> {
        let table = self
            .tables
            .remove(&table_id)
            .ok_or_else(|| anyhow::anyhow!(ErrorMetadata::table_not_found(table_id)))?;
        let qualified = QualifiedTableName {
            schema_name: table.schema_name.clone(),
            table_name: table.table_name.clone(),
        };
        self.table_name_index.remove(&qualified);
        self.ineligible_ids.remove(&table_id);
        if let Some(pi) = &table.partition_info {
            for pid in pi.ids() {
                self.partition_index.remove(pid);
                self.ineligible_ids.remove(pid);
            }
        }
        if unlink_membership {
            if let Some(list) = self.schema_tables.get_mut(&table.schema_id) {
                if let Some(pos) = list.iter().position(|id| *id == table_id) {
                    list.remove(pos);
                }
            }
        }
        Ok(table)
    }

    fn drop_table(&mut self, table_id: TableId) -> anyhow::Result<()> {
        self.remove_table_record(table_id, true)?;
        Ok(())
    }

    fn rename_table(&mut self, job: &DdlJob) -> anyhow::Result<()> {
        let old_table_id = self.require_table_id(job)?;
        let info = self.require_table_payload(job)?.clone();
        let old = self.remove_table_record(old_table_id, true)?;
        self.insert_table(old.schema_id, old.schema_name.clone(), job.finished_ts, &info)
    }

    fn truncate_table(&mut self, job: &DdlJob) -> anyhow::Result<()> {
        let old_table_id = self.require_table_id(job)?;
        let info = self.require_table_payload(job)?.clone();
        let old = self.remove_table_record(old_table_id, true)?;
        self.truncated_ids.insert(old_table_id);
        self.insert_table(old.schema_id, old.schema_name.clone(), job.finished_ts, &info)
    }

    /// The two-phase drop-then-create protocol required for `RenameTables`:
    /// every table in `old_table_ids` is dropped first, in input order,
    /// *before* any new table is created. This is mandatory to avoid a
    /// spurious `TableExists` when two tables swap names.
    ///
    /// Not rolled back on partial failure: if a later step fails, the
    /// already-applied drops/creates remain on this clone. That clone is
    /// only ever appended to the history on success (see
    /// `Storage::handle_ddl_job`), so a partial failure here can never
    /// corrupt the committed history — but it does mean a caller who
    /// inspects the returned error can't assume the rename was all-or-
    /// nothing from the Snapshot's point of view.
    fn rename_tables(&mut self, job: &DdlJob) -> anyhow::Result<()> {
        let payload = match &job.payload {
            DdlPayload::MultiRename(payload) => payload,
            _ => anyhow::bail!(ErrorMetadata::invalid_ddl_job(
                "RenameTables requires a multi-rename payload"
            )),
        };
        anyhow::ensure!(
            payload.new_table_infos.len() >= payload.new_table_names.len(),
            ErrorMetadata::invalid_ddl_job(
                "RenameTables: fewer table infos than new table names"
            )
        );

        for old_id in &payload.old_table_ids {
            self.remove_table_record(*old_id, true)
                .with_context(|| format!("RenameTables: dropping old table {old_id}"))?;
        }

        for i in 0..payload.new_table_names.len() {
            let schema_id = payload.new_schema_ids[i];
            let schema_name = self.require_schema_name(schema_id)?;
            let mut info = payload.new_table_infos[i].clone();
            info.table_name = payload.new_table_names[i].clone();
            self.insert_table(schema_id, schema_name, job.finished_ts, &info)
                .with_context(|| format!("RenameTables: creating table {}", info.table_id))?;
        }
        Ok(())
    }

    fn reconcile_table_partitions(&mut self, job: &DdlJob) -> anyhow::Result<()> {
        let table_id = self.require_table_id(job)?;
        let existing = self
            .tables
            .get(&table_id)
            .ok_or_else(|| anyhow::anyhow!(ErrorMetadata::table_not_found(table_id)))?
            .clone();
        if !existing.is_partitioned() {
            anyhow::bail!(
                anyhow::anyhow!(ErrorMetadata::table_not_found(table_id))
                    .context(format!("table {table_id} is not a partitioned table"))
            );
        }
        let info = self.require_table_payload(job)?;
        anyhow::ensure!(
            info.partition_info.is_some(),
            ErrorMetadata::invalid_ddl_job("partition DDL payload is missing partition_info")
        );
        self.replace_table_record(&existing, job, info)
    }

    /// Handles column/index/etc changes that replace a table's `TableInfo`
    /// without changing its id. A missing `TableInfo` is forward-compatible
    /// noise from an unrecognized DDL kind and is logged and skipped rather
    /// than treated as an error.
    fn replace_table(&mut self, job: &DdlJob) -> anyhow::Result<()> {
        let table_id = match job.table_id {
            Some(id) => id,
            None => {
                debug!(job_id = job.job_id, "DDL job has no table_id, skipping");
                return Ok(());
            },
        };
        let info = match &job.payload {
            DdlPayload::Table(info) => info,
            _ => {
                debug!(job_id = job.job_id, table_id, "DDL job has no TableInfo, skipping");
                return Ok(());
            },
        };
        let existing = self
            .tables
            .get(&table_id)
            .ok_or_else(|| anyhow::anyhow!(ErrorMetadata::table_not_found(table_id)))?
            .clone();
        self.replace_table_record(&existing, job, info)
    }

    /// Shared core of every "replace this table's `TableInfo` in place"
    /// path (partition reconciliation and the generic column/index
    /// replace). Re-derives the partition index and the eligibility id set
    /// from scratch off of `old_ids`/`new_ids`, per the partition
    /// reconciliation algorithm.
    fn replace_table_record(
        &mut self,
        existing: &Table,
        job: &DdlJob,
        info: &TableInfo,
    ) -> anyhow::Result<()> {
        let table_id = existing.table_id;
        let new_table = Table::new(existing.schema_id, existing.schema_name.clone(), job.finished_ts, info);
        let old_ids = existing
            .partition_info
            .as_ref()
            .map(crate::job::PartitionInfo::ids_set)
            .unwrap_or_default();
        let eligible = new_table.is_eligible(self.force_replicate);

        if new_table.table_name != existing.table_name {
            self.table_name_index.remove(&QualifiedTableName {
                schema_name: existing.schema_name.clone(),
                table_name: existing.table_name.clone(),
            });
            self.table_name_index.insert(
                QualifiedTableName {
                    schema_name: new_table.schema_name.clone(),
                    table_name: new_table.table_name.clone(),
                },
                table_id,
            );
        }

        let new_table = Arc::new(new_table);
        self.tables.insert(table_id, new_table.clone());

        self.reconcile_partition_ids(table_id, &new_table, &old_ids, eligible);

        // Open question (see DESIGN.md): preserved verbatim from the source
        // — a replace inserts the id into `ineligible_ids` when newly
        // ineligible, but does not remove it when newly eligible.
        if !eligible {
            self.ineligible_ids.insert(table_id);
        }
        Ok(())
    }

    /// Applies the partition-set reconciliation algorithm: every id in
    /// `new_table`'s partition set is (re-)pointed at `new_table`, inheriting
    /// `eligible`; every id left over in `old_ids` is retired as truncated.
    fn reconcile_partition_ids(
        &mut self,
        _table_id: TableId,
        new_table: &Arc<Table>,
        old_ids: &BTreeSet<ObjectId>,
        eligible: bool,
    ) {
        let mut remaining_old = old_ids.clone();
        if let Some(pi) = &new_table.partition_info {
            for pid in pi.ids() {
                self.partition_index.insert(*pid, new_table.clone());
                if !eligible {
                    self.ineligible_ids.insert(*pid);
                }
                remaining_old.remove(pid);
            }
        }
        for pid in remaining_old {
            self.truncated_ids.insert(pid);
            self.partition_index.remove(&pid);
            self.ineligible_ids.remove(&pid);
        }
    }
}
