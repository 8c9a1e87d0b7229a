//! Delimited-text ingestion (`.csv` and tab-separated `.txt`).

use std::collections::HashSet;
use std::path::Path;

use crate::error::LoaderResult;
use crate::types::{DataSet, DataType, Field, Schema};

use super::infer::{parse_text, text_type, widen_opt};
use super::options::ReadOptions;

/// Parsing knobs for delimited text, derived from [`ReadOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvReadOptions {
    pub delimiter: u8,
    pub has_header: bool,
    pub infer_types: bool,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            infer_types: true,
        }
    }
}

impl From<&ReadOptions> for CsvReadOptions {
    fn from(opts: &ReadOptions) -> Self {
        Self {
            delimiter: opts.delimiter(),
            has_header: opts.has_header(),
            infer_types: opts.infer_column_types(),
        }
    }
}

/// Read a delimited text file into an in-memory [`DataSet`].
///
/// Rules:
///
/// - With a header row, column names come from it; otherwise columns are `_c0`, `_c1`, ...
/// - Short rows are padded with nulls; cells beyond the header width are dropped.
/// - Blank cells are null.
/// - With type inference each column takes the narrowest of Int64, Float64, Bool, Utf8 that
///   fits every non-blank cell; without it every column is Utf8.
pub fn read_csv_from_path(path: impl AsRef<Path>, opts: &CsvReadOptions) -> LoaderResult<DataSet> {
    let mut rdr = reader_builder(opts).from_path(path)?;
    read_csv_from_reader(&mut rdr, opts)
}

/// Build a `csv` reader configured for `opts`.
pub fn reader_builder(opts: &CsvReadOptions) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(opts.delimiter)
        .has_headers(opts.has_header)
        .flexible(true);
    builder
}

/// Read delimited data from an existing CSV reader.
pub fn read_csv_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    opts: &CsvReadOptions,
) -> LoaderResult<DataSet> {
    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        raw_rows.push(record.iter().map(str::to_owned).collect());
    }

    let columns = if opts.has_header {
        column_names(rdr.headers()?.iter())
    } else {
        let width = raw_rows.iter().map(Vec::len).max().unwrap_or(0);
        (0..width).map(|i| format!("_c{i}")).collect()
    };

    let mut types: Vec<Option<DataType>> = vec![None; columns.len()];
    if opts.infer_types {
        for row in &raw_rows {
            for (idx, cell) in row.iter().take(columns.len()).enumerate() {
                let cell = cell.trim();
                if !cell.is_empty() {
                    types[idx] = Some(widen_opt(types[idx], text_type(cell)));
                }
            }
        }
    }
    let fields: Vec<Field> = columns
        .into_iter()
        .zip(types)
        .map(|(name, t)| Field::new(name, t.unwrap_or(DataType::Utf8)))
        .collect();

    let first_data_row = if opts.has_header { 2 } else { 1 };
    let mut rows = Vec::with_capacity(raw_rows.len());
    for (idx0, raw) in raw_rows.iter().enumerate() {
        // 1-based row number for users, counting the header line.
        let user_row = idx0 + first_data_row;
        let mut row = Vec::with_capacity(fields.len());
        for (col, field) in fields.iter().enumerate() {
            let cell = raw.get(col).map(String::as_str).unwrap_or("");
            row.push(parse_text(user_row, &field.name, field.data_type, cell)?);
        }
        rows.push(row);
    }

    Ok(DataSet::new(Schema::new(fields), rows))
}

/// Header names with blanks replaced by `_c<i>` and duplicates suffixed with `_<i>` (then
/// `_<i+1>`, ...) until every name is unique.
fn column_names<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .enumerate()
        .map(|(i, h)| {
            let h = h.trim();
            let base = if h.is_empty() { format!("_c{i}") } else { h.to_string() };
            let mut name = base.clone();
            let mut n = i;
            while seen.contains(&name) {
                name = format!("{base}_{n}");
                n += 1;
            }
            seen.insert(name.clone());
            name
        })
        .collect()
}
