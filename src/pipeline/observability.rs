use std::collections::BTreeSet;
use std::error::Error as StdError;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Namespace, TableIdent, WriteOutcome};
use crate::error::LoaderError;
use crate::ingestion::FileFormat;

use super::ProcessingSummary;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (a file failed).
    Error,
    /// Critical error (I/O failures, or a committed file that could not be archived).
    Critical,
}

/// The per-file step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Read,
    Write,
    Archive,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureStage::Read => "read",
            FailureStage::Write => "write",
            FailureStage::Archive => "archive",
        };
        f.write_str(s)
    }
}

/// Context about one routed file.
#[derive(Debug, Clone)]
pub struct FileContext {
    /// The source path in the landing zone.
    pub path: PathBuf,
    /// Destination table.
    pub table: TableIdent,
    /// Detected format.
    pub format: FileFormat,
}

/// Observer interface for loader events.
///
/// Every callback defaults to a no-op. Implementors can record metrics, logs, or trigger
/// alerts.
pub trait LoadObserver: Send + Sync {
    /// Called once the registry snapshot and landing listing are taken.
    fn on_run_start(&self, _namespace: &Namespace, _tables: &BTreeSet<String>, _files: usize) {}

    /// Called when no table name can be derived from a file name.
    fn on_skip_unresolved(&self, _path: &Path) {}

    /// Called when the derived table is not in the registry snapshot.
    fn on_skip_unregistered(&self, _path: &Path, _table: &TableIdent) {}

    /// Called in a dry run for a file that would be processed.
    fn on_planned(&self, _ctx: &FileContext) {}

    /// Called before a routed file is read.
    fn on_start(&self, _ctx: &FileContext) {}

    /// Called after the destination write committed.
    fn on_written(&self, _ctx: &FileContext, _outcome: WriteOutcome) {}

    /// Called after the file was moved to the archive.
    fn on_archived(&self, _ctx: &FileContext, _archive_path: &Path) {}

    /// Called when a read, write or archive step fails.
    fn on_failure(
        &self,
        _ctx: &FileContext,
        _stage: FailureStage,
        _severity: Severity,
        _error: &LoaderError,
    ) {
    }

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &FileContext, stage: FailureStage, severity: Severity, error: &LoaderError) {
        self.on_failure(ctx, stage, severity, error)
    }

    /// Called once after every listed file was visited.
    fn on_complete(&self, _summary: &ProcessingSummary) {}
}

/// Classify a per-file failure.
///
/// Archive failures are critical because the rows are already committed and the file will be
/// offered again on the next run. Otherwise I/O anywhere in the error chain is critical and
/// everything else is an error.
pub fn severity_for(stage: FailureStage, e: &LoaderError) -> Severity {
    if stage == FailureStage::Archive {
        return Severity::Critical;
    }
    match e {
        LoaderError::Io(_) => Severity::Critical,
        LoaderError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => Severity::Critical,
            _ => Severity::Error,
        },
        // Parquet errors often wrap IO, but not always in a structured way.
        LoaderError::Parquet(err) if error_chain_contains_io(err) => Severity::Critical,
        _ => Severity::Error,
    }
}

fn error_chain_contains_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if err.is::<std::io::Error>() {
            return true;
        }
        cur = err.source();
    }
    false
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn LoadObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn LoadObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl LoadObserver for CompositeObserver {
    fn on_run_start(&self, namespace: &Namespace, tables: &BTreeSet<String>, files: usize) {
        for o in &self.observers {
            o.on_run_start(namespace, tables, files);
        }
    }

    fn on_skip_unresolved(&self, path: &Path) {
        for o in &self.observers {
            o.on_skip_unresolved(path);
        }
    }

    fn on_skip_unregistered(&self, path: &Path, table: &TableIdent) {
        for o in &self.observers {
            o.on_skip_unregistered(path, table);
        }
    }

    fn on_planned(&self, ctx: &FileContext) {
        for o in &self.observers {
            o.on_planned(ctx);
        }
    }

    fn on_start(&self, ctx: &FileContext) {
        for o in &self.observers {
            o.on_start(ctx);
        }
    }

    fn on_written(&self, ctx: &FileContext, outcome: WriteOutcome) {
        for o in &self.observers {
            o.on_written(ctx, outcome);
        }
    }

    fn on_archived(&self, ctx: &FileContext, archive_path: &Path) {
        for o in &self.observers {
            o.on_archived(ctx, archive_path);
        }
    }

    fn on_failure(&self, ctx: &FileContext, stage: FailureStage, severity: Severity, error: &LoaderError) {
        for o in &self.observers {
            o.on_failure(ctx, stage, severity, error);
        }
    }

    fn on_alert(&self, ctx: &FileContext, stage: FailureStage, severity: Severity, error: &LoaderError) {
        for o in &self.observers {
            o.on_alert(ctx, stage, severity, error);
        }
    }

    fn on_complete(&self, summary: &ProcessingSummary) {
        for o in &self.observers {
            o.on_complete(summary);
        }
    }
}

/// Emits one `tracing` event per loader event. This is the default observer.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl LoadObserver for TracingObserver {
    fn on_run_start(&self, namespace: &Namespace, tables: &BTreeSet<String>, files: usize) {
        tracing::info!(%namespace, ?tables, files, "available tables");
    }

    fn on_skip_unresolved(&self, path: &Path) {
        tracing::warn!(
            path = %path.display(),
            "could not extract table name, skipping"
        );
    }

    fn on_skip_unregistered(&self, path: &Path, table: &TableIdent) {
        tracing::warn!(
            path = %path.display(),
            table = %table.name,
            namespace = %table.namespace,
            "table does not exist, skipping"
        );
    }

    fn on_planned(&self, ctx: &FileContext) {
        tracing::info!(
            path = %ctx.path.display(),
            format = %ctx.format,
            table = %ctx.table,
            "would process"
        );
    }

    fn on_start(&self, ctx: &FileContext) {
        tracing::info!(
            path = %ctx.path.display(),
            format = %ctx.format,
            table = %ctx.table,
            "processing"
        );
    }

    fn on_written(&self, ctx: &FileContext, outcome: WriteOutcome) {
        tracing::debug!(
            table = %ctx.table,
            rows = outcome.rows,
            version = outcome.version,
            "rows committed"
        );
    }

    fn on_archived(&self, ctx: &FileContext, archive_path: &Path) {
        tracing::info!(
            path = %ctx.path.display(),
            archive_path = %archive_path.display(),
            "moved to archive"
        );
    }

    fn on_failure(&self, ctx: &FileContext, stage: FailureStage, severity: Severity, error: &LoaderError) {
        tracing::error!(
            path = %ctx.path.display(),
            table = %ctx.table,
            %stage,
            ?severity,
            %error,
            "file failed"
        );
    }

    fn on_alert(&self, ctx: &FileContext, stage: FailureStage, severity: Severity, error: &LoaderError) {
        tracing::error!(
            alert = true,
            path = %ctx.path.display(),
            table = %ctx.table,
            %stage,
            ?severity,
            %error,
            "file failed"
        );
    }

    fn on_complete(&self, summary: &ProcessingSummary) {
        tracing::info!(
            listed = summary.listed,
            ingested = summary.ingested,
            skipped = summary.skipped_unresolved + summary.skipped_unregistered,
            failed = summary.failed,
            archive_failures = summary.archive_failures,
            rows = summary.rows_written,
            "load complete"
        );
    }
}

/// Appends loader events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{} {line}", now_rfc3339());
        }
    }
}

impl LoadObserver for FileObserver {
    fn on_skip_unresolved(&self, path: &Path) {
        self.append_line(&format!("skip reason=unresolved path={}", path.display()));
    }

    fn on_skip_unregistered(&self, path: &Path, table: &TableIdent) {
        self.append_line(&format!(
            "skip reason=unregistered table={table} path={}",
            path.display()
        ));
    }

    fn on_start(&self, ctx: &FileContext) {
        self.append_line(&format!(
            "start format={} table={} path={}",
            ctx.format,
            ctx.table,
            ctx.path.display()
        ));
    }

    fn on_archived(&self, ctx: &FileContext, archive_path: &Path) {
        self.append_line(&format!(
            "archived path={} to={}",
            ctx.path.display(),
            archive_path.display()
        ));
    }

    fn on_failure(&self, ctx: &FileContext, stage: FailureStage, severity: Severity, error: &LoaderError) {
        self.append_line(&format!(
            "fail stage={stage} severity={severity:?} table={} path={} err={error}",
            ctx.table,
            ctx.path.display()
        ));
    }

    fn on_alert(&self, ctx: &FileContext, stage: FailureStage, severity: Severity, error: &LoaderError) {
        self.append_line(&format!(
            "ALERT stage={stage} severity={severity:?} table={} path={} err={error}",
            ctx.table,
            ctx.path.display()
        ));
    }

    fn on_complete(&self, summary: &ProcessingSummary) {
        self.append_line(&format!(
            "complete listed={} ingested={} failed={} rows={}",
            summary.listed, summary.ingested, summary.failed, summary.rows_written
        ));
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
