//! Parquet ingestion, plus the part-file writer used by the warehouse.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use chrono::DateTime;
use parquet::basic::{ConvertedType, Repetition, Type as PhysicalType};
use parquet::column::writer::ColumnWriter;
use parquet::data_type::ByteArray;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::FileReader;
use parquet::file::serialized_reader::SerializedFileReader;
use parquet::file::writer::SerializedFileWriter;
use parquet::record::Field as ParquetField;
use parquet::schema::types::Type;

use crate::error::{LoaderError, LoaderResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

use super::infer::assemble;

/// Read a Parquet file into an in-memory [`DataSet`].
///
/// Notes:
/// - Columns are the file's top-level fields, in file order
/// - Uses the Parquet record API (`RowIter`)
/// - Column types come from the values; a column with only nulls takes its declared type
///   when that maps directly (boolean, int, double, string, timestamp), else Utf8
pub fn read_parquet_from_path(path: impl AsRef<Path>) -> LoaderResult<DataSet> {
    let reader = SerializedFileReader::try_from(path.as_ref())?;

    let top_level = reader.metadata().file_metadata().schema().get_fields();
    let columns: Vec<String> = top_level.iter().map(|t| t.name().to_string()).collect();
    let declared: Vec<Option<DataType>> = top_level.iter().map(|t| declared_type(t)).collect();
    let positions: HashMap<String, usize> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect();

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for row_res in reader.into_iter() {
        let row = row_res?;
        let mut out_row = vec![Value::Null; columns.len()];
        for (name, field) in row.get_column_iter() {
            if let Some(&pos) = positions.get(name.as_str()) {
                out_row[pos] = convert_parquet_field(field);
            }
        }
        rows.push(out_row);
    }

    let mut ds = assemble(columns, rows);
    for (idx, declared) in declared.into_iter().enumerate() {
        let Some(dt) = declared else { continue };
        if ds.rows.iter().all(|r| r[idx].is_null()) {
            ds.schema.fields[idx].data_type = dt;
        }
    }
    Ok(ds)
}

fn declared_type(t: &Type) -> Option<DataType> {
    if !t.is_primitive() {
        return None;
    }
    let converted = t.get_basic_info().converted_type();
    match (t.get_physical_type(), converted) {
        (PhysicalType::BOOLEAN, _) => Some(DataType::Bool),
        (PhysicalType::INT32 | PhysicalType::INT64, ConvertedType::NONE) => Some(DataType::Int64),
        (PhysicalType::INT64, ConvertedType::TIMESTAMP_MICROS | ConvertedType::TIMESTAMP_MILLIS) => {
            Some(DataType::Timestamp)
        }
        (PhysicalType::FLOAT | PhysicalType::DOUBLE, _) => Some(DataType::Float64),
        (PhysicalType::BYTE_ARRAY, ConvertedType::UTF8) => Some(DataType::Utf8),
        _ => None,
    }
}

fn convert_parquet_field(f: &ParquetField) -> Value {
    match f {
        ParquetField::Null => Value::Null,
        ParquetField::Bool(b) => Value::Bool(*b),
        ParquetField::Byte(v) => Value::Int64(i64::from(*v)),
        ParquetField::Short(v) => Value::Int64(i64::from(*v)),
        ParquetField::Int(v) => Value::Int64(i64::from(*v)),
        ParquetField::Long(v) => Value::Int64(*v),
        ParquetField::UByte(v) => Value::Int64(i64::from(*v)),
        ParquetField::UShort(v) => Value::Int64(i64::from(*v)),
        ParquetField::UInt(v) => Value::Int64(i64::from(*v)),
        ParquetField::ULong(v) => i64::try_from(*v)
            .map(Value::Int64)
            .unwrap_or_else(|_| Value::Utf8(v.to_string())),
        ParquetField::Float(v) => Value::Float64(f64::from(*v)),
        ParquetField::Double(v) => Value::Float64(*v),
        ParquetField::Str(s) => Value::Utf8(s.clone()),
        ParquetField::TimestampMillis(ms) => DateTime::from_timestamp_millis(*ms)
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),
        ParquetField::TimestampMicros(us) => DateTime::from_timestamp_micros(*us)
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),
        other => Value::Utf8(other.to_string()),
    }
}

/// Write `ds` as a single-row-group Parquet file with every column OPTIONAL.
///
/// Column values must match their field type (nulls allowed); the warehouse conforms batches
/// before calling this.
pub fn write_parquet_to_path(path: impl AsRef<Path>, ds: &DataSet) -> LoaderResult<()> {
    if ds.schema.is_empty() {
        return Err(LoaderError::SchemaMismatch {
            message: "cannot write a parquet file with no columns".to_string(),
        });
    }

    let schema = Arc::new(parquet_schema(&ds.schema)?);
    let props = Arc::new(WriterProperties::builder().build());
    let file = File::create(path)?;
    let mut writer = SerializedFileWriter::new(file, schema, props)?;

    let mut rg = writer.next_row_group()?;
    let mut col_idx: usize = 0;
    while let Some(mut col) = rg.next_column()? {
        let field = &ds.schema.fields[col_idx];
        write_column(col.untyped(), ds, col_idx, field)?;
        col.close()?;
        col_idx += 1;
    }
    rg.close()?;
    writer.close()?;
    Ok(())
}

/// Parquet message type for a [`Schema`].
pub fn parquet_schema(schema: &Schema) -> LoaderResult<Type> {
    let mut fields = Vec::with_capacity(schema.fields.len());
    for f in &schema.fields {
        let (physical, converted) = match f.data_type {
            DataType::Int64 => (PhysicalType::INT64, ConvertedType::NONE),
            DataType::Float64 => (PhysicalType::DOUBLE, ConvertedType::NONE),
            DataType::Bool => (PhysicalType::BOOLEAN, ConvertedType::NONE),
            DataType::Utf8 => (PhysicalType::BYTE_ARRAY, ConvertedType::UTF8),
            DataType::Timestamp => (PhysicalType::INT64, ConvertedType::TIMESTAMP_MICROS),
        };
        let t = Type::primitive_type_builder(&f.name, physical)
            .with_repetition(Repetition::OPTIONAL)
            .with_converted_type(converted)
            .build()?;
        fields.push(Arc::new(t));
    }
    Ok(Type::group_type_builder("schema").with_fields(fields).build()?)
}

fn write_column(
    writer: &mut ColumnWriter<'_>,
    ds: &DataSet,
    idx: usize,
    field: &Field,
) -> LoaderResult<()> {
    match writer {
        ColumnWriter::Int64ColumnWriter(w) => {
            let (values, defs) = collect_column(ds, idx, field, |v| match v {
                Value::Int64(n) => Some(*n),
                Value::Timestamp(ts) => Some(ts.timestamp_micros()),
                _ => None,
            })?;
            w.write_batch(&values, Some(&defs), None)?;
        }
        ColumnWriter::DoubleColumnWriter(w) => {
            let (values, defs) = collect_column(ds, idx, field, |v| match v {
                Value::Float64(n) => Some(*n),
                _ => None,
            })?;
            w.write_batch(&values, Some(&defs), None)?;
        }
        ColumnWriter::BoolColumnWriter(w) => {
            let (values, defs) = collect_column(ds, idx, field, |v| match v {
                Value::Bool(b) => Some(*b),
                _ => None,
            })?;
            w.write_batch(&values, Some(&defs), None)?;
        }
        ColumnWriter::ByteArrayColumnWriter(w) => {
            let (values, defs) = collect_column(ds, idx, field, |v| match v {
                Value::Utf8(s) => Some(ByteArray::from(s.as_str())),
                _ => None,
            })?;
            w.write_batch(&values, Some(&defs), None)?;
        }
        _ => {
            return Err(LoaderError::SchemaMismatch {
                message: format!("unsupported parquet column writer for '{}'", field.name),
            });
        }
    }
    Ok(())
}

/// Non-null values of one column plus its definition levels (0 = null, 1 = present).
fn collect_column<T>(
    ds: &DataSet,
    idx: usize,
    field: &Field,
    extract: impl Fn(&Value) -> Option<T>,
) -> LoaderResult<(Vec<T>, Vec<i16>)> {
    let mut values = Vec::with_capacity(ds.row_count());
    let mut defs = Vec::with_capacity(ds.row_count());
    for (row_idx, row) in ds.rows.iter().enumerate() {
        let v = &row[idx];
        if v.is_null() {
            defs.push(0);
            continue;
        }
        let typed_ok = v.data_type() == Some(field.data_type);
        match extract(v).filter(|_| typed_ok) {
            Some(x) => {
                values.push(x);
                defs.push(1);
            }
            None => {
                return Err(LoaderError::ParseError {
                    row: row_idx + 1,
                    column: field.name.clone(),
                    raw: v.to_string(),
                    message: format!("expected {}", field.data_type),
                });
            }
        }
    }
    Ok((values, defs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn written_part_files_read_back_with_types_and_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.parquet");
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let ds = DataSet::new(
            Schema::new(vec![
                Field::new("id", DataType::Int64),
                Field::new("name", DataType::Utf8),
                Field::new("score", DataType::Float64),
                Field::new("active", DataType::Bool),
                Field::new("loaded", DataType::Timestamp),
                Field::new("empty", DataType::Int64),
            ]),
            vec![
                vec![
                    Value::Int64(1),
                    Value::Utf8("Ada".into()),
                    Value::Float64(98.5),
                    Value::Bool(true),
                    Value::Timestamp(ts),
                    Value::Null,
                ],
                vec![
                    Value::Int64(2),
                    Value::Null,
                    Value::Null,
                    Value::Bool(false),
                    Value::Timestamp(ts),
                    Value::Null,
                ],
            ],
        );

        write_parquet_to_path(&path, &ds).unwrap();
        let back = read_parquet_from_path(&path).unwrap();
        assert_eq!(back, ds);
    }

    #[test]
    fn mistyped_value_is_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let ds = DataSet::new(
            Schema::new(vec![Field::new("id", DataType::Int64)]),
            vec![vec![Value::Utf8("x".into())]],
        );
        let err = write_parquet_to_path(dir.path().join("bad.parquet"), &ds).unwrap_err();
        assert!(err.to_string().contains("column 'id'"));
    }
}
