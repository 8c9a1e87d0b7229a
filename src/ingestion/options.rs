//! Per-format read options.
//!
//! [`ReadOptions`] is a flat string map, the shape an incremental file reader accepts. It is
//! fully determined by the format, the destination table and the checkpoint root.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::format::FileFormat;

/// Reader format tag.
pub const FORMAT: &str = "cloudFiles.format";
/// Directory where the reader tracks the inferred schema for one table.
pub const SCHEMA_LOCATION: &str = "cloudFiles.schemaLocation";
/// Infer column types for text-based formats instead of reading every column as a string.
pub const INFER_COLUMN_TYPES: &str = "cloudFiles.inferColumnTypes";
/// Whether the first row holds column names.
pub const HEADER: &str = "header";
/// Single-character field delimiter.
pub const DELIMITER: &str = "delimiter";

/// Option map handed to the reader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    entries: BTreeMap<String, String>,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn format_tag(&self) -> Option<&str> {
        self.get(FORMAT)
    }

    pub fn schema_location(&self) -> Option<PathBuf> {
        self.get(SCHEMA_LOCATION).map(PathBuf::from)
    }

    /// `false` unless the option is present and truthy.
    pub fn infer_column_types(&self) -> bool {
        self.get(INFER_COLUMN_TYPES).is_some_and(is_truthy)
    }

    /// `false` unless the option is present and truthy.
    pub fn has_header(&self) -> bool {
        self.get(HEADER).is_some_and(is_truthy)
    }

    /// The field delimiter as a byte; `,` when absent.
    ///
    /// Multi-byte values use their first byte; the escaped spelling `\t` is accepted for tab.
    pub fn delimiter(&self) -> u8 {
        match self.get(DELIMITER) {
            Some("\\t") => b'\t',
            Some(d) => d.as_bytes().first().copied().unwrap_or(b','),
            None => b',',
        }
    }
}

fn is_truthy(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Build the read options for one file.
///
/// Every format gets the format tag, a schema-tracking location at
/// `<checkpoint_root>/<table_name>/schema`, and column type inference. CSV adds a header row
/// and `,` delimiter; TXT adds a header row and a tab delimiter. JSON and Parquet describe
/// their own structure, so neither `header` nor `delimiter` is set for them.
pub fn build_read_options(
    format: FileFormat,
    table_name: &str,
    checkpoint_root: impl AsRef<Path>,
) -> ReadOptions {
    let schema_location = checkpoint_root.as_ref().join(table_name).join("schema");

    let mut opts = ReadOptions::new();
    opts.set(FORMAT, format.as_str())
        .set(SCHEMA_LOCATION, schema_location.to_string_lossy())
        .set(INFER_COLUMN_TYPES, "true");

    match format {
        FileFormat::Csv => {
            opts.set(HEADER, "true").set(DELIMITER, ",");
        }
        FileFormat::Text => {
            opts.set(HEADER, "true").set(DELIMITER, "\t");
        }
        FileFormat::Json | FileFormat::Parquet => {}
    }
    opts
}
