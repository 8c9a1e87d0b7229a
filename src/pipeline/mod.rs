//! The ingestion driver.
//!
//! One [`Loader::run`] is one invocation: snapshot the registry, list the landing zone, then
//! visit every listed file in order:
//!
//! 1. resolve the table name from the file name, else skip
//! 2. check the name against the registry snapshot, else skip
//! 3. detect the format and build read options
//! 4. read, stamp `source_file` and `load_timestamp`, append with schema merge
//! 5. record the file's column types for later reads of the same table
//! 6. move the file to the archive
//!
//! Per-file failures are recorded and the loop moves on; only an unreachable registry or
//! landing zone fails the invocation. A file is moved only after its rows are committed, and
//! a failed move does not undo the commit.

pub mod observability;

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::{Namespace, TableRegistry, Warehouse, WriteMode};
use crate::config::LoaderConfig;
use crate::engine::{IngestionEngine, LocalEngine, ReadRequest, WriteRequest};
use crate::error::{LoaderError, LoaderResult};
use crate::ingestion::{build_read_options, detect_format, observed_schema, FileFormat};
use crate::naming::resolve_table_name;
use crate::types::{DataSet, DataType, Value};
use crate::zone::{archive_path, FileStore, LocalFileStore, SourceFile};

pub use observability::{
    severity_for, CompositeObserver, FailureStage, FileContext, FileObserver, LoadObserver, Severity,
    TracingObserver,
};

/// Provenance column holding the source file path.
pub const SOURCE_FILE_COLUMN: &str = "source_file";
/// Provenance column holding the time the file was processed.
pub const LOAD_TIMESTAMP_COLUMN: &str = "load_timestamp";

/// Stamp every row with the file it came from and the processing time.
///
/// Existing columns with either name are replaced.
pub fn stamp_provenance(ds: DataSet, source_file: &str, loaded_at: DateTime<Utc>) -> DataSet {
    ds.with_constant_column(
        SOURCE_FILE_COLUMN,
        DataType::Utf8,
        Value::Utf8(source_file.to_string()),
    )
    .with_constant_column(LOAD_TIMESTAMP_COLUMN, DataType::Timestamp, Value::Timestamp(loaded_at))
}

/// What happened to one listed file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    /// Written and archived.
    Ingested {
        table: String,
        format: FileFormat,
        rows: usize,
        version: u64,
        archived_to: PathBuf,
    },
    /// Dry run: would be read and written.
    Planned { table: String, format: FileFormat },
    /// No table name in the file name.
    SkippedUnresolved,
    /// The table name is not registered.
    SkippedUnregistered { table: String },
    /// Left in place; nothing written.
    ReadFailed { table: String, error: String },
    /// Left in place; nothing written.
    WriteFailed { table: String, error: String },
    /// Rows committed but the file is still in the landing zone.
    ArchiveFailed {
        table: String,
        rows: usize,
        version: u64,
        error: String,
    },
}

impl FileStatus {
    /// Whether the file is still in the landing zone after the run.
    pub fn left_in_place(&self) -> bool {
        !matches!(self, FileStatus::Ingested { .. })
    }
}

/// One listed file and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: FileStatus,
}

/// Per-invocation counts and outcomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingSummary {
    pub namespace: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub listed: usize,
    pub ingested: usize,
    pub planned: usize,
    pub skipped_unresolved: usize,
    pub skipped_unregistered: usize,
    /// Read and write failures.
    pub failed: usize,
    pub archive_failures: usize,
    pub rows_written: usize,
    pub outcomes: Vec<FileOutcome>,
}

impl ProcessingSummary {
    fn new(namespace: &Namespace, dry_run: bool) -> Self {
        Self {
            namespace: namespace.to_string(),
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            listed: 0,
            ingested: 0,
            planned: 0,
            skipped_unresolved: 0,
            skipped_unregistered: 0,
            failed: 0,
            archive_failures: 0,
            rows_written: 0,
            outcomes: Vec::new(),
        }
    }

    fn record(&mut self, outcome: FileOutcome) {
        self.listed += 1;
        match &outcome.status {
            FileStatus::Ingested { rows, .. } => {
                self.ingested += 1;
                self.rows_written += rows;
            }
            FileStatus::Planned { .. } => self.planned += 1,
            FileStatus::SkippedUnresolved => self.skipped_unresolved += 1,
            FileStatus::SkippedUnregistered { .. } => self.skipped_unregistered += 1,
            FileStatus::ReadFailed { .. } | FileStatus::WriteFailed { .. } => self.failed += 1,
            FileStatus::ArchiveFailed { rows, .. } => {
                self.archive_failures += 1;
                self.rows_written += rows;
            }
        }
        self.outcomes.push(outcome);
    }

    /// Whether any file failed to read, write or archive.
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.archive_failures > 0
    }
}

impl fmt::Display for ProcessingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "namespace={}, listed={}, ingested={}, planned={}, skipped={}/{} (unresolved/unregistered), failed={}, archive_failures={}, rows={}",
            self.namespace,
            self.listed,
            self.ingested,
            self.planned,
            self.skipped_unresolved,
            self.skipped_unregistered,
            self.failed,
            self.archive_failures,
            self.rows_written
        )
    }
}

/// The ingestion driver.
pub struct Loader {
    config: LoaderConfig,
    registry: Arc<dyn TableRegistry>,
    engine: Arc<dyn IngestionEngine>,
    store: Arc<dyn FileStore>,
    observer: Arc<dyn LoadObserver>,
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Loader {
    /// Create a driver over explicit collaborators. Events go to a [`TracingObserver`] until
    /// [`Self::with_observer`] replaces it.
    pub fn new(
        config: LoaderConfig,
        registry: Arc<dyn TableRegistry>,
        engine: Arc<dyn IngestionEngine>,
        store: Arc<dyn FileStore>,
    ) -> Self {
        Self {
            config,
            registry,
            engine,
            store,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Create a driver over the local warehouse, readers and filesystem named by `config`.
    pub fn local(config: LoaderConfig) -> Self {
        let warehouse = Warehouse::new(&config.warehouse);
        let store = LocalFileStore::new(config.recursive);
        Self::new(
            config,
            Arc::new(warehouse.clone()),
            Arc::new(LocalEngine::new(warehouse)),
            Arc::new(store),
        )
    }

    /// Replace the observer for loader events.
    pub fn with_observer(mut self, observer: Arc<dyn LoadObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Process every file currently in the landing zone.
    pub fn run(&self) -> LoaderResult<ProcessingSummary> {
        self.execute(false)
    }

    /// Route every file without reading, writing or moving anything.
    pub fn plan(&self) -> LoaderResult<ProcessingSummary> {
        self.execute(true)
    }

    fn execute(&self, dry_run: bool) -> LoaderResult<ProcessingSummary> {
        let namespace = self.config.namespace();
        let tables = self.registry.list_tables(&namespace)?;
        let files = self.store.list(&self.config.landing_zone)?;
        self.observer.on_run_start(&namespace, &tables, files.len());

        let mut summary = ProcessingSummary::new(&namespace, dry_run);
        for file in &files {
            let status = self.process_file(file, &namespace, &tables, dry_run);
            summary.record(FileOutcome {
                path: file.path.clone(),
                status,
            });
        }
        summary.finished_at = Some(Utc::now());

        self.observer.on_complete(&summary);
        Ok(summary)
    }

    fn process_file(
        &self,
        file: &SourceFile,
        namespace: &Namespace,
        tables: &BTreeSet<String>,
        dry_run: bool,
    ) -> FileStatus {
        let path_str = file.path_str();

        let Some(table_name) = resolve_table_name(&path_str) else {
            self.observer.on_skip_unresolved(&file.path);
            return FileStatus::SkippedUnresolved;
        };
        let table = namespace.table(table_name);
        if !tables.contains(&table.name) {
            self.observer.on_skip_unregistered(&file.path, &table);
            return FileStatus::SkippedUnregistered { table: table.name };
        }

        let format = detect_format(&path_str);
        let ctx = FileContext {
            path: file.path.clone(),
            table,
            format,
        };
        if dry_run {
            self.observer.on_planned(&ctx);
            return FileStatus::Planned {
                table: ctx.table.name,
                format,
            };
        }
        self.observer.on_start(&ctx);

        let options = build_read_options(format, &ctx.table.name, &self.config.checkpoint_root);
        let read = ReadRequest {
            path: &file.path,
            format,
            options: &options,
        };
        let batch = match self.engine.read(&read) {
            Ok(ds) => ds,
            Err(e) => {
                self.report_failure(&ctx, FailureStage::Read, &e);
                return FileStatus::ReadFailed {
                    table: ctx.table.name,
                    error: e.to_string(),
                };
            }
        };

        let observed = observed_schema(&batch);
        let batch = stamp_provenance(batch, &path_str, Utc::now());
        let write = WriteRequest {
            table: &ctx.table,
            mode: WriteMode::Append,
            merge_schema: true,
        };
        let written = match self.engine.write(&batch, &write) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.report_failure(&ctx, FailureStage::Write, &e);
                return FileStatus::WriteFailed {
                    table: ctx.table.name,
                    error: e.to_string(),
                };
            }
        };
        self.observer.on_written(&ctx, written);
        if let Err(e) = self.engine.record_schema(&read, &observed) {
            // The rows are committed; the next read just widens from the older schema.
            tracing::warn!(table = %ctx.table, error = %e, "could not record tracked schema");
        }

        let moved = archive_path(&self.config.landing_zone, &self.config.archive_zone, &file.path)
            .and_then(|dest| self.store.move_file(&file.path, &dest).map(|()| dest));
        match moved {
            Ok(dest) => {
                self.observer.on_archived(&ctx, &dest);
                FileStatus::Ingested {
                    table: ctx.table.name,
                    format,
                    rows: written.rows,
                    version: written.version,
                    archived_to: dest,
                }
            }
            Err(e) => {
                self.report_failure(&ctx, FailureStage::Archive, &e);
                FileStatus::ArchiveFailed {
                    table: ctx.table.name,
                    rows: written.rows,
                    version: written.version,
                    error: e.to_string(),
                }
            }
        }
    }

    fn report_failure(&self, ctx: &FileContext, stage: FailureStage, error: &LoaderError) {
        let severity = severity_for(stage, error);
        self.observer.on_failure(ctx, stage, severity, error);
        if severity >= self.config.alert_at_or_above {
            self.observer.on_alert(ctx, stage, severity, error);
        }
    }
}
