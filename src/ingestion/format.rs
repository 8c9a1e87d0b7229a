//! File format detection by extension.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Supported source encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Comma-separated values with a header row.
    Csv,
    /// JSON array-of-objects, single object, or NDJSON.
    Json,
    /// Apache Parquet.
    Parquet,
    /// Tab-separated text with a header row (`.txt`).
    #[serde(rename = "txt")]
    Text,
}

impl FileFormat {
    /// Parse a format from a file extension (case-insensitive).
    ///
    /// This is the strict lookup; [`detect_format`] applies the CSV fallback.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "parquet" => Some(Self::Parquet),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }

    /// The tag passed to the reader as `cloudFiles.format`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Parquet => "parquet",
            Self::Text => "txt",
        }
    }

    /// Whether the encoding carries its own column names and types.
    pub fn is_self_describing(&self) -> bool {
        matches!(self, Self::Json | Self::Parquet)
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the format of `path` from the text after its last dot.
///
/// Unrecognized extensions, and paths with no dot at all, fall back to [`FileFormat::Csv`].
/// A file is never refused because of its extension.
pub fn detect_format(path: &str) -> FileFormat {
    let ext = path.rsplit('.').next().unwrap_or(path);
    FileFormat::from_extension(ext).unwrap_or(FileFormat::Csv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_are_case_insensitive() {
        assert_eq!(detect_format("a/b/file.CSV"), FileFormat::Csv);
        assert_eq!(detect_format("a/b/file.Json"), FileFormat::Json);
        assert_eq!(detect_format("a/b/file.PARQUET"), FileFormat::Parquet);
        assert_eq!(detect_format("a/b/file.txt"), FileFormat::Text);
    }

    #[test]
    fn unknown_extension_falls_back_to_csv() {
        assert_eq!(detect_format("a/b/file.unknownext"), FileFormat::Csv);
        assert_eq!(detect_format("a/b/file.json.gz"), FileFormat::Csv);
    }

    #[test]
    fn path_without_dot_falls_back_to_csv() {
        assert_eq!(detect_format("noext"), FileFormat::Csv);
        assert_eq!(detect_format("s3://bucket/landingzone/noext"), FileFormat::Csv);
    }

    #[test]
    fn last_dot_wins() {
        assert_eq!(detect_format("/in/edm_entity.2024.parquet"), FileFormat::Parquet);
    }

    #[test]
    fn strict_lookup_rejects_unknown() {
        assert_eq!(FileFormat::from_extension("xlsx"), None);
        assert_eq!(FileFormat::from_extension("TXT"), Some(FileFormat::Text));
    }

    #[test]
    fn tags_round_trip_through_display() {
        for f in [FileFormat::Csv, FileFormat::Json, FileFormat::Parquet, FileFormat::Text] {
            assert_eq!(FileFormat::from_extension(&f.to_string()), Some(f));
        }
    }
}
