//! Column type inference and coercion shared by the readers.

use crate::error::{LoaderError, LoaderResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

/// The narrowest type that holds values of both `a` and `b`.
///
/// `Int64` and `Float64` widen to `Float64`; every other mix widens to `Utf8`.
pub fn widen(a: DataType, b: DataType) -> DataType {
    use DataType::*;
    match (a, b) {
        (x, y) if x == y => x,
        (Int64, Float64) | (Float64, Int64) => Float64,
        _ => Utf8,
    }
}

/// Fold `next` into an optional running type.
pub fn widen_opt(acc: Option<DataType>, next: DataType) -> DataType {
    match acc {
        Some(a) => widen(a, next),
        None => next,
    }
}

/// The narrowest type a non-empty text cell parses as: Int64, Float64, Bool, then Utf8.
pub fn text_type(raw: &str) -> DataType {
    if raw.parse::<i64>().is_ok() {
        DataType::Int64
    } else if raw.parse::<f64>().is_ok() && raw.bytes().any(|b| b.is_ascii_digit()) {
        // f64 also accepts "inf" and "NaN"; those stay text.
        DataType::Float64
    } else if parse_bool(raw).is_some() {
        DataType::Bool
    } else {
        DataType::Utf8
    }
}

/// Parse a text cell into `data_type`. Blank cells are [`Value::Null`].
pub fn parse_text(row: usize, column: &str, data_type: DataType, raw: &str) -> LoaderResult<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }

    let parse_err = |message: String| LoaderError::ParseError {
        row,
        column: column.to_owned(),
        raw: raw.to_owned(),
        message,
    };

    match data_type {
        DataType::Utf8 => Ok(Value::Utf8(trimmed.to_owned())),
        DataType::Int64 => trimmed
            .parse::<i64>()
            .map(Value::Int64)
            .map_err(|e| parse_err(e.to_string())),
        DataType::Float64 => trimmed
            .parse::<f64>()
            .map(Value::Float64)
            .map_err(|e| parse_err(e.to_string())),
        DataType::Bool => parse_bool(trimmed)
            .map(Value::Bool)
            .ok_or_else(|| parse_err("expected bool (true/false)".to_string())),
        DataType::Timestamp => chrono::DateTime::parse_from_rfc3339(trimmed)
            .map(|ts| Value::Timestamp(ts.with_timezone(&chrono::Utc)))
            .map_err(|e| parse_err(e.to_string())),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Convert `value` to `target` when that loses nothing a reader would care about.
///
/// Nulls pass through; `Int64` widens to `Float64`; anything renders to `Utf8`. Returns `None`
/// for every other pairing.
pub fn coerce(value: Value, target: DataType) -> Option<Value> {
    match (value, target) {
        (Value::Null, _) => Some(Value::Null),
        (Value::Int64(v), DataType::Float64) => Some(Value::Float64(v as f64)),
        (Value::Utf8(s), DataType::Utf8) => Some(Value::Utf8(s)),
        (v, DataType::Utf8) => Some(Value::Utf8(v.to_string())),
        (v, t) if v.data_type() == Some(t) => Some(v),
        _ => None,
    }
}

/// Build a dataset from named columns and raw values, inferring each column's type by
/// widening over its non-null values. Columns with only nulls become `Utf8`.
///
/// Rows shorter than `columns` are padded with nulls.
pub fn assemble(columns: Vec<String>, mut rows: Vec<Vec<Value>>) -> DataSet {
    let width = columns.len();
    let mut types: Vec<Option<DataType>> = vec![None; width];
    for row in &mut rows {
        row.resize(width, Value::Null);
        for (idx, v) in row.iter().enumerate() {
            if let Some(t) = v.data_type() {
                types[idx] = Some(widen_opt(types[idx], t));
            }
        }
    }

    let fields: Vec<Field> = columns
        .into_iter()
        .zip(types)
        .map(|(name, t)| Field::new(name, t.unwrap_or(DataType::Utf8)))
        .collect();
    let schema = Schema::new(fields);
    conform(DataSet::new(schema.clone(), rows), &schema)
}

/// Widen `tracked` with the columns of `incoming`.
///
/// Existing columns keep their position and widen their type; new columns are appended.
pub fn merge_tracked(tracked: &Schema, incoming: &Schema) -> Schema {
    let mut merged = tracked.clone();
    for field in &incoming.fields {
        match merged.index_of(&field.name) {
            Some(idx) => {
                let cur = merged.fields[idx].data_type;
                merged.fields[idx].data_type = widen(cur, field.data_type);
            }
            None => merged.fields.push(field.clone()),
        }
    }
    merged
}

/// The columns of `ds` that hold at least one value.
///
/// A column with only nulls (a blank cell, a header-only file) carries no type information, so
/// it must not take part in schema tracking.
pub fn observed_schema(ds: &DataSet) -> Schema {
    let fields = ds
        .schema
        .fields
        .iter()
        .enumerate()
        .filter(|(idx, _)| ds.rows.iter().any(|r| !r[*idx].is_null()))
        .map(|(_, f)| f.clone())
        .collect();
    Schema::new(fields)
}

/// Coerce every column of `ds` to the type `target` assigns it. Columns unknown to `target`
/// keep their type.
///
/// Only valid when each target type is a widening of the dataset's type (as produced by
/// [`widen`]), which always coerces.
pub fn conform(ds: DataSet, target: &Schema) -> DataSet {
    let types: Vec<DataType> = ds
        .schema
        .fields
        .iter()
        .map(|f| target.field(&f.name).map(|t| t.data_type).unwrap_or(f.data_type))
        .collect();

    let rows = ds
        .rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&types)
                .map(|(v, &t)| coerce(v, t).unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    let fields = ds
        .schema
        .fields
        .into_iter()
        .zip(types)
        .map(|(f, t)| Field::new(f.name, t))
        .collect();
    DataSet::new(Schema::new(fields), rows)
}
