//! The read/write engine seam used by the driver.
//!
//! [`IngestionEngine`] is what the driver sees: read one file by format, write one batch to
//! one table. [`LocalEngine`] reads with [`crate::ingestion::read_file`] and writes to a
//! [`Warehouse`].

use std::path::Path;

use crate::catalog::{TableIdent, Warehouse, WriteMode, WriteOutcome};
use crate::error::LoaderResult;
use crate::ingestion::{self, read_file, FileFormat, ReadOptions};
use crate::types::{DataSet, Schema};

/// One file to read.
#[derive(Debug, Clone, Copy)]
pub struct ReadRequest<'a> {
    pub path: &'a Path,
    pub format: FileFormat,
    pub options: &'a ReadOptions,
}

/// Where and how to write one batch.
#[derive(Debug, Clone, Copy)]
pub struct WriteRequest<'a> {
    pub table: &'a TableIdent,
    pub mode: WriteMode,
    /// Extend the table's columns to fit the batch instead of failing.
    pub merge_schema: bool,
}

/// Tabular read/write capability.
///
/// `read` owns schema inference and coerces to any tracked schema; `write` either commits the
/// whole batch or leaves the table unchanged. The driver calls `record_schema` only after a
/// successful write, with the columns the read batch had values for.
pub trait IngestionEngine: Send + Sync {
    fn read(&self, request: &ReadRequest<'_>) -> LoaderResult<DataSet>;

    fn write(&self, batch: &DataSet, request: &WriteRequest<'_>) -> LoaderResult<WriteOutcome>;

    /// Remember `observed` for later reads of the same table. Engines without schema tracking
    /// keep the default no-op.
    fn record_schema(&self, _request: &ReadRequest<'_>, _observed: &Schema) -> LoaderResult<()> {
        Ok(())
    }
}

/// Engine over the local readers and a local [`Warehouse`].
#[derive(Debug, Clone)]
pub struct LocalEngine {
    warehouse: Warehouse,
}

impl LocalEngine {
    pub fn new(warehouse: Warehouse) -> Self {
        Self { warehouse }
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }
}

impl IngestionEngine for LocalEngine {
    fn read(&self, request: &ReadRequest<'_>) -> LoaderResult<DataSet> {
        read_file(request.path, request.format, request.options)
    }

    fn write(&self, batch: &DataSet, request: &WriteRequest<'_>) -> LoaderResult<WriteOutcome> {
        self.warehouse
            .write(request.table, batch, request.mode, request.merge_schema)
    }

    fn record_schema(&self, request: &ReadRequest<'_>, observed: &Schema) -> LoaderResult<()> {
        match request.options.schema_location() {
            Some(location) => ingestion::record_schema(&location, observed),
            None => Ok(()),
        }
    }
}
