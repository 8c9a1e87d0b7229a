//! Local warehouse: a directory tree of tables, each a manifest plus Parquet part files.
//!
//! Layout:
//!
//! ```text
//! <root>/<catalog>/<schema>/<table>/
//! ├── _table.json                 manifest (version, schema, live data files)
//! └── part-<version>-<uuid>.parquet
//! ```
//!
//! A write lands its part file first and then replaces the manifest with a write-to-temp and
//! rename, so readers see either the old table or the new one. Concurrent writers to the same
//! table are not coordinated.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LoaderError, LoaderResult};
use crate::ingestion::parquet::{read_parquet_from_path, write_parquet_to_path};
use crate::types::{DataSet, Schema};

use super::evolution::{align, reconcile};
use super::{Namespace, TableIdent, TableRegistry};

/// Manifest file name inside a table directory. Its presence is what registers a table.
pub const MANIFEST_FILE: &str = "_table.json";

/// How a write combines with the table's existing rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Keep existing rows and add the batch.
    Append,
    /// Replace existing rows with the batch. The schema is still reconciled, never dropped.
    Overwrite,
}

/// One committed data file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFileEntry {
    /// File name relative to the table directory.
    pub path: String,
    pub rows: usize,
    pub committed_at: DateTime<Utc>,
}

/// Committed state of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableManifest {
    /// Incremented by every commit; 0 for a freshly created table.
    pub version: u64,
    pub schema: Schema,
    pub files: Vec<DataFileEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TableManifest {
    fn empty() -> Self {
        let now = Utc::now();
        Self {
            version: 0,
            schema: Schema::default(),
            files: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Total committed rows.
    pub fn row_count(&self) -> usize {
        self.files.iter().map(|f| f.rows).sum()
    }
}

/// Result of a committed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    /// Table version created by the write.
    pub version: u64,
    /// Rows added by the write.
    pub rows: usize,
}

/// A warehouse rooted at a local directory.
#[derive(Debug, Clone)]
pub struct Warehouse {
    root: PathBuf,
}

impl Warehouse {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn namespace_dir(&self, namespace: &Namespace) -> PathBuf {
        self.root.join(&namespace.catalog).join(&namespace.schema)
    }

    pub fn table_dir(&self, table: &TableIdent) -> PathBuf {
        self.namespace_dir(&table.namespace).join(&table.name)
    }

    pub fn table_exists(&self, table: &TableIdent) -> bool {
        self.table_dir(table).join(MANIFEST_FILE).is_file()
    }

    /// Create the namespace directory (idempotent).
    pub fn create_namespace(&self, namespace: &Namespace) -> LoaderResult<()> {
        fs::create_dir_all(self.namespace_dir(namespace))?;
        Ok(())
    }

    /// Register an empty table. Its schema is defined by the first write.
    pub fn create_table(&self, table: &TableIdent) -> LoaderResult<TableManifest> {
        if self.table_exists(table) {
            return Err(LoaderError::TableExists {
                table: table.to_string(),
            });
        }
        let dir = self.table_dir(table);
        fs::create_dir_all(&dir)?;
        let manifest = TableManifest::empty();
        commit_manifest(&dir, &manifest)?;
        tracing::info!(table = %table, "table created");
        Ok(manifest)
    }

    /// The table's committed manifest.
    pub fn manifest(&self, table: &TableIdent) -> LoaderResult<TableManifest> {
        let path = self.table_dir(table).join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(LoaderError::TableNotFound {
                table: table.to_string(),
            });
        }
        let text = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Commit `batch` to `table`.
    ///
    /// The batch is reconciled with the table schema first (see [`super::evolution`]); a
    /// rejected batch leaves the table untouched. A batch with no rows still commits its
    /// schema changes but adds no data file.
    pub fn write(
        &self,
        table: &TableIdent,
        batch: &DataSet,
        mode: WriteMode,
        merge_schema: bool,
    ) -> LoaderResult<WriteOutcome> {
        let current = self.manifest(table)?;
        let (schema, aligned) = reconcile(table, &current.schema, batch, merge_schema)?;

        let dir = self.table_dir(table);
        let version = current.version + 1;
        let now = Utc::now();

        // Rows with no typed column carry nothing worth a data file.
        let new_file = if aligned.row_count() > 0 && !aligned.schema.is_empty() {
            let name = format!("part-{version:05}-{}.parquet", uuid::Uuid::new_v4());
            let path = dir.join(&name);
            if let Err(e) = write_parquet_to_path(&path, &aligned) {
                remove_orphan(&path);
                return Err(e);
            }
            Some(DataFileEntry {
                path: name,
                rows: aligned.row_count(),
                committed_at: now,
            })
        } else {
            None
        };

        let mut files = match mode {
            WriteMode::Append => current.files,
            WriteMode::Overwrite => Vec::new(),
        };
        files.extend(new_file.clone());

        let manifest = TableManifest {
            version,
            schema,
            files,
            created_at: current.created_at,
            updated_at: now,
        };
        if let Err(e) = commit_manifest(&dir, &manifest) {
            if let Some(f) = &new_file {
                remove_orphan(&dir.join(&f.path));
            }
            return Err(e);
        }

        let rows = new_file.as_ref().map_or(0, |f| f.rows);
        tracing::debug!(
            table = %table,
            version,
            rows,
            mode = ?mode,
            "table commit"
        );
        Ok(WriteOutcome { version, rows })
    }

    /// Read every committed row of `table`, laid out in the current table schema.
    pub fn scan(&self, table: &TableIdent) -> LoaderResult<DataSet> {
        let manifest = self.manifest(table)?;
        let dir = self.table_dir(table);

        let mut rows = Vec::with_capacity(manifest.row_count());
        for file in &manifest.files {
            let part = read_parquet_from_path(dir.join(&file.path))?;
            rows.extend(align(&part, &manifest.schema).rows);
        }
        Ok(DataSet::new(manifest.schema, rows))
    }
}

impl TableRegistry for Warehouse {
    fn list_tables(&self, namespace: &Namespace) -> LoaderResult<BTreeSet<String>> {
        let unavailable = |message: String| LoaderError::RegistryUnavailable {
            namespace: namespace.to_string(),
            message,
        };

        let dir = self.namespace_dir(namespace);
        let entries = fs::read_dir(&dir)
            .map_err(|e| unavailable(format!("{}: {e}", dir.display())))?;

        let mut tables = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|e| unavailable(e.to_string()))?;
            let path = entry.path();
            if path.join(MANIFEST_FILE).is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    tables.insert(name.to_string());
                }
            }
        }
        Ok(tables)
    }
}

fn commit_manifest(dir: &Path, manifest: &TableManifest) -> LoaderResult<()> {
    let tmp = dir.join(format!("{MANIFEST_FILE}.{}.tmp", uuid::Uuid::new_v4()));
    let bytes = serde_json::to_vec_pretty(manifest)?;
    if let Err(e) = fs::write(&tmp, bytes).and_then(|_| fs::rename(&tmp, dir.join(MANIFEST_FILE))) {
        remove_orphan(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn remove_orphan(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "could not remove orphan file");
        }
    }
}
