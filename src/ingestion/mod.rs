//! Source-file reading.
//!
//! Most callers go through [`read_file`] (from [`unified`]), which:
//!
//! - dispatches on a [`FileFormat`] (see [`detect_format`] for the extension rules)
//! - honors the [`ReadOptions`] built by [`build_read_options`]
//! - coerces to the schema tracked per destination table ([`record_schema`] updates it)
//!
//! Format-specific functions are also available under:
//! - [`csv`]
//! - [`json`]
//! - [`parquet`]

pub mod csv;
pub mod format;
pub mod infer;
pub mod json;
pub mod options;
pub mod parquet;
pub mod unified;

pub use format::{detect_format, FileFormat};
pub use options::{build_read_options, ReadOptions};
pub use infer::observed_schema;
pub use unified::{load_tracked_schema, read_file, record_schema};
