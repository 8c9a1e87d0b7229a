//! Unified read entrypoint.
//!
//! [`read_file`] reads one source file into a [`DataSet`] according to its [`FileFormat`] and
//! [`ReadOptions`]:
//!
//! - CSV and TXT honor `header`, `delimiter` and `cloudFiles.inferColumnTypes`.
//! - JSON honors `cloudFiles.inferColumnTypes`; Parquet always keeps its native types.
//! - When `cloudFiles.schemaLocation` is set, the batch is coerced to the schema tracked at
//!   that location widened with this file's types, so a column that was once a float does not
//!   come back as an integer from a later file.
//!
//! Reading never changes the tracked schema. [`record_schema`] stores a batch's types once the
//! batch has been committed, so a rejected file leaves no trace in later reads.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::LoaderResult;
use crate::types::{DataSet, Schema};

use super::csv::{read_csv_from_path, CsvReadOptions};
use super::format::FileFormat;
use super::infer::{conform, merge_tracked, observed_schema};
use super::json::read_json_from_path;
use super::options::ReadOptions;
use super::parquet::read_parquet_from_path;

/// File name of the tracked schema under a schema location.
pub const TRACKED_SCHEMA_FILE: &str = "schema.json";

/// Read `path` as `format` with `options`.
///
/// # Examples
///
/// ```no_run
/// use landing_loader::ingestion::{build_read_options, read_file, FileFormat};
///
/// # fn main() -> Result<(), landing_loader::LoaderError> {
/// let opts = build_read_options(FileFormat::Text, "edm_entity", "/tmp/autoloader/checkpoints");
/// let ds = read_file("landing-zone/edm_entity_2024-06-01.txt", FileFormat::Text, &opts)?;
/// println!("rows={}", ds.row_count());
/// # Ok(())
/// # }
/// ```
pub fn read_file(
    path: impl AsRef<Path>,
    format: FileFormat,
    options: &ReadOptions,
) -> LoaderResult<DataSet> {
    let path = path.as_ref();
    let ds = match format {
        FileFormat::Csv | FileFormat::Text => {
            read_csv_from_path(path, &CsvReadOptions::from(options))?
        }
        FileFormat::Json => read_json_from_path(path, options.infer_column_types())?,
        FileFormat::Parquet => read_parquet_from_path(path)?,
    };

    match options.schema_location() {
        Some(location) => conform_to_tracked(ds, &location),
        None => Ok(ds),
    }
}

/// Coerce `ds` to the schema tracked under `location`, widened with the columns `ds` actually
/// has values for. Nothing is written.
pub fn conform_to_tracked(ds: DataSet, location: &Path) -> LoaderResult<DataSet> {
    let tracked = load_tracked_schema(location)?.unwrap_or_default();
    let merged = merge_tracked(&tracked, &observed_schema(&ds));
    Ok(conform(ds, &merged))
}

/// Widen the schema tracked under `location` with `observed` and persist it when it changed.
///
/// `observed` should hold only columns that carried values (see [`observed_schema`]); a column
/// seen only as nulls would otherwise be tracked as text.
pub fn record_schema(location: &Path, observed: &Schema) -> LoaderResult<()> {
    let tracked = load_tracked_schema(location)?.unwrap_or_default();
    let merged = merge_tracked(&tracked, observed);
    if merged != tracked {
        store_tracked_schema(location, &merged)?;
        tracing::debug!(
            location = %location.display(),
            columns = merged.fields.len(),
            "tracked schema updated"
        );
    }
    Ok(())
}

/// The schema tracked under `location`, if one has been recorded.
pub fn load_tracked_schema(location: &Path) -> LoaderResult<Option<Schema>> {
    let file = tracked_schema_path(location);
    if !file.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(&file)?;
    Ok(Some(serde_json::from_str(&text)?))
}

fn store_tracked_schema(location: &Path, schema: &Schema) -> LoaderResult<()> {
    fs::create_dir_all(location)?;
    let file = tracked_schema_path(location);
    let tmp = file.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(schema)?)?;
    fs::rename(&tmp, &file)?;
    Ok(())
}

fn tracked_schema_path(location: &Path) -> PathBuf {
    location.join(TRACKED_SCHEMA_FILE)
}
