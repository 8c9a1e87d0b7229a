//! `landing-loader` moves files that arrive in a landing zone into registered warehouse tables.
//!
//! One invocation of [`Loader::run`] takes a snapshot of the tables registered in the target
//! namespace, lists the landing zone, and for every file:
//!
//! - derives the table name from the file name ([`naming::resolve_table_name`])
//! - skips the file unless that table is registered
//! - detects the format from the extension ([`ingestion::detect_format`]) and builds read
//!   options ([`ingestion::build_read_options`])
//! - reads it, adds `source_file` and `load_timestamp` columns and appends the rows with schema
//!   merge enabled
//! - moves the file to the archive zone at the same relative path
//!
//! A failure on one file is reported and the run continues with the next. Failing to reach the
//! registry or the landing zone fails the run before any file is touched.
//!
//! ## Formats
//!
//! - **CSV**: `.csv`, and any unrecognized extension
//! - **Text**: `.txt`, tab-delimited with a header row
//! - **JSON**: `.json` (array of objects, single object or newline-delimited objects)
//! - **Parquet**: `.parquet`
//!
//! ## Quick example
//!
//! ```no_run
//! use landing_loader::{Loader, LoaderConfig};
//!
//! # fn main() -> Result<(), landing_loader::LoaderError> {
//! let config = LoaderConfig {
//!     landing_zone: "/data/landing".into(),
//!     archive_zone: "/data/archive".into(),
//!     ..Default::default()
//! };
//! config.validate()?;
//!
//! let summary = Loader::local(config).run()?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```
//!
//! Reading a single file without the driver:
//!
//! ```no_run
//! use landing_loader::ingestion::{build_read_options, detect_format, read_file};
//!
//! # fn main() -> Result<(), landing_loader::LoaderError> {
//! let path = "landing/edm_entity_2024-06-01.csv";
//! let format = detect_format(path);
//! let options = build_read_options(format, "edm_entity", "/tmp/checkpoints");
//! let ds = read_file(path, format, &options)?;
//! println!("rows={}", ds.row_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Observability
//!
//! The driver reports per-file events to a [`pipeline::LoadObserver`]. The default
//! [`pipeline::TracingObserver`] emits `tracing` events; [`pipeline::FileObserver`] appends to a
//! log file and [`pipeline::CompositeObserver`] fans out to several observers.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod naming;
pub mod pipeline;
pub mod types;
pub mod zone;

pub use config::LoaderConfig;
pub use error::{LoaderError, LoaderResult};
pub use pipeline::{Loader, ProcessingSummary};
