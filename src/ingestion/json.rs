//! JSON ingestion implementation.
//!
//! Supported inputs:
//! - A JSON array of objects: `[{"a":1}, {"a":2}]`
//! - A single JSON object: `{"a":1}`
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n`
//!
//! Columns are the union of top-level keys in first-seen order. Nested objects and arrays are
//! kept as their JSON text.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{LoaderError, LoaderResult};
use crate::types::{DataSet, Value};

use super::infer::assemble;

/// Read a JSON file into an in-memory [`DataSet`].
///
/// With `infer_types == false` every non-null value is kept as text.
pub fn read_json_from_path(path: impl AsRef<Path>, infer_types: bool) -> LoaderResult<DataSet> {
    let text = fs::read_to_string(path)?;
    read_json_from_str(&text, infer_types)
}

/// Read JSON from an in-memory string into a [`DataSet`].
pub fn read_json_from_str(input: &str, infer_types: bool) -> LoaderResult<DataSet> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(LoaderError::SchemaMismatch {
            message: "json input is empty".to_string(),
        });
    }

    // First try parsing as a single JSON value (array or object).
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        match v {
            serde_json::Value::Array(items) => json_values_to_dataset(&items, infer_types),
            serde_json::Value::Object(_) => json_values_to_dataset(&[v], infer_types),
            _ => Err(LoaderError::SchemaMismatch {
                message: "json must be an object, an array of objects, or NDJSON".to_string(),
            }),
        }
    } else {
        // Fall back to NDJSON.
        let mut values = Vec::new();
        for (i, line) in trimmed.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let v = serde_json::from_str::<serde_json::Value>(line).map_err(|e| {
                LoaderError::SchemaMismatch {
                    message: format!("invalid ndjson at line {}: {}", i + 1, e),
                }
            })?;
            values.push(v);
        }
        json_values_to_dataset(&values, infer_types)
    }
}

fn json_values_to_dataset(values: &[serde_json::Value], infer_types: bool) -> LoaderResult<DataSet> {
    let mut columns: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(values.len());

    for (idx0, v) in values.iter().enumerate() {
        let row_num = idx0 + 1;
        let obj = v.as_object().ok_or_else(|| LoaderError::SchemaMismatch {
            message: format!("row {row_num} is not a json object"),
        })?;

        let mut row = vec![Value::Null; columns.len()];
        for (key, jv) in obj {
            let pos = *positions.entry(key.clone()).or_insert_with(|| {
                columns.push(key.clone());
                columns.len() - 1
            });
            if pos >= row.len() {
                row.resize(pos + 1, Value::Null);
            }
            row[pos] = convert_json_value(jv, infer_types);
        }
        rows.push(row);
    }

    Ok(assemble(columns, rows))
}

fn convert_json_value(v: &serde_json::Value, infer_types: bool) -> Value {
    use serde_json::Value as J;

    match v {
        J::Null => Value::Null,
        J::String(s) => Value::Utf8(s.clone()),
        _ if !infer_types => Value::Utf8(v.to_string()),
        J::Bool(b) => Value::Bool(*b),
        J::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int64(i)
            } else if let Some(f) = n.as_f64().filter(|_| n.is_f64()) {
                Value::Float64(f)
            } else {
                // u64 beyond i64::MAX
                Value::Utf8(n.to_string())
            }
        }
        J::Array(_) | J::Object(_) => Value::Utf8(v.to_string()),
    }
}
