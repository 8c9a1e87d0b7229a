//! Reconciling an incoming batch with a table's schema.
//!
//! Rules, per batch column:
//!
//! - same type as the table column: accepted
//! - only nulls in the batch: accepted whatever the table type
//! - `int64` into a `float64` table column: values are widened
//! - `float64` into an `int64` table column: the table column widens to `float64`, but only
//!   with schema merge enabled
//! - a column the table does not have: skipped when the batch holds only nulls for it, since
//!   nothing in it fixes a type; otherwise appended with schema merge enabled (or when the
//!   table has no columns yet), a [`LoaderError::SchemaMismatch`] otherwise
//! - anything else: [`LoaderError::SchemaConflict`]
//!
//! Table columns missing from the batch are filled with nulls.

use crate::error::{LoaderError, LoaderResult};
use crate::ingestion::infer::coerce;
use crate::types::{DataSet, DataType, Schema, Value};

use super::TableIdent;

/// Compute the table schema after writing `batch`, and `batch` laid out in that schema.
pub fn reconcile(
    table: &TableIdent,
    table_schema: &Schema,
    batch: &DataSet,
    merge_schema: bool,
) -> LoaderResult<(Schema, DataSet)> {
    let mut target = table_schema.clone();
    let accepts_new_columns = merge_schema || table_schema.is_empty();

    for (col, field) in batch.schema.fields.iter().enumerate() {
        let all_null = batch.rows.iter().all(|r| r[col].is_null());
        match target.index_of(&field.name) {
            Some(idx) => {
                let existing = target.fields[idx].data_type;
                match (existing, field.data_type) {
                    (a, b) if a == b => {}
                    _ if all_null => {}
                    (DataType::Float64, DataType::Int64) => {}
                    (DataType::Int64, DataType::Float64) if merge_schema => {
                        target.fields[idx].data_type = DataType::Float64;
                    }
                    (existing, incoming) => {
                        return Err(LoaderError::SchemaConflict {
                            table: table.to_string(),
                            column: field.name.clone(),
                            existing: existing.to_string(),
                            incoming: incoming.to_string(),
                        });
                    }
                }
            }
            None if all_null => {}
            None if accepts_new_columns => target.fields.push(field.clone()),
            None => {
                return Err(LoaderError::SchemaMismatch {
                    message: format!(
                        "column '{}' is not in {table} and schema merge is disabled",
                        field.name
                    ),
                });
            }
        }
    }

    let aligned = align(batch, &target);
    Ok((target, aligned))
}

/// Lay `ds` out in `target`'s column order and types.
///
/// Missing columns become nulls; values that do not coerce to the target type become nulls.
pub fn align(ds: &DataSet, target: &Schema) -> DataSet {
    let sources: Vec<Option<usize>> = target
        .fields
        .iter()
        .map(|f| ds.schema.index_of(&f.name))
        .collect();

    let rows = ds
        .rows
        .iter()
        .map(|row| {
            target
                .fields
                .iter()
                .zip(&sources)
                .map(|(field, src)| match src {
                    Some(i) => coerce(row[*i].clone(), field.data_type).unwrap_or(Value::Null),
                    None => Value::Null,
                })
                .collect()
        })
        .collect();

    DataSet::new(target.clone(), rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Namespace;
    use crate::types::Field;

    fn ident() -> TableIdent {
        Namespace::new("c", "s").table("t")
    }

    fn table_schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::new("score", DataType::Float64),
        ])
    }

    #[test]
    fn new_column_is_appended_with_merge() {
        let batch = DataSet::new(
            Schema::new(vec![
                Field::new("extra", DataType::Utf8),
                Field::new("id", DataType::Int64),
            ]),
            vec![vec![Value::Utf8("x".into()), Value::Int64(7)]],
        );
        let (schema, aligned) = reconcile(&ident(), &table_schema(), &batch, true).unwrap();
        assert_eq!(schema.field_names().collect::<Vec<_>>(), vec!["id", "score", "extra"]);
        assert_eq!(
            aligned.rows[0],
            vec![Value::Int64(7), Value::Null, Value::Utf8("x".into())]
        );
    }

    #[test]
    fn new_column_without_merge_is_rejected() {
        let batch = DataSet::new(
            Schema::new(vec![Field::new("extra", DataType::Utf8)]),
            vec![vec![Value::Utf8("x".into())]],
        );
        let err = reconcile(&ident(), &table_schema(), &batch, false).unwrap_err();
        assert!(matches!(err, LoaderError::SchemaMismatch { .. }));
    }

    #[test]
    fn first_write_defines_schema_even_without_merge() {
        let batch = DataSet::new(
            Schema::new(vec![Field::new("a", DataType::Bool)]),
            vec![vec![Value::Bool(true)]],
        );
        let (schema, _) = reconcile(&ident(), &Schema::default(), &batch, false).unwrap();
        assert_eq!(schema, batch.schema);
    }

    #[test]
    fn int_into_float_column_is_widened() {
        let batch = DataSet::new(
            Schema::new(vec![Field::new("score", DataType::Int64)]),
            vec![vec![Value::Int64(3)]],
        );
        let (schema, aligned) = reconcile(&ident(), &table_schema(), &batch, false).unwrap();
        assert_eq!(schema, table_schema());
        assert_eq!(aligned.rows[0], vec![Value::Null, Value::Float64(3.0)]);
    }

    #[test]
    fn float_into_int_column_widens_table_only_with_merge() {
        let batch = DataSet::new(
            Schema::new(vec![Field::new("id", DataType::Float64)]),
            vec![vec![Value::Float64(1.5)]],
        );
        let err = reconcile(&ident(), &table_schema(), &batch, false).unwrap_err();
        assert!(matches!(err, LoaderError::SchemaConflict { .. }));

        let (schema, aligned) = reconcile(&ident(), &table_schema(), &batch, true).unwrap();
        assert_eq!(schema.field("id").unwrap().data_type, DataType::Float64);
        assert_eq!(aligned.rows[0][0], Value::Float64(1.5));
    }

    #[test]
    fn incompatible_type_is_a_conflict() {
        let batch = DataSet::new(
            Schema::new(vec![Field::new("id", DataType::Utf8)]),
            vec![vec![Value::Utf8("abc".into())]],
        );
        let err = reconcile(&ident(), &table_schema(), &batch, true).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("c.s.t.id"));
        assert!(msg.contains("table has int64, batch has utf8"));
    }

    #[test]
    fn all_null_column_fits_any_type() {
        let batch = DataSet::new(
            Schema::new(vec![Field::new("id", DataType::Utf8)]),
            vec![vec![Value::Null]],
        );
        let (schema, aligned) = reconcile(&ident(), &table_schema(), &batch, false).unwrap();
        assert_eq!(schema, table_schema());
        assert_eq!(aligned.rows[0], vec![Value::Null, Value::Null]);
    }

    #[test]
    fn all_null_new_column_does_not_fix_a_type() {
        let batch = DataSet::new(
            Schema::new(vec![
                Field::new("id", DataType::Int64),
                Field::new("note", DataType::Utf8),
            ]),
            vec![vec![Value::Int64(1), Value::Null]],
        );
        let (schema, aligned) = reconcile(&ident(), &Schema::default(), &batch, true).unwrap();
        assert_eq!(schema.field_names().collect::<Vec<_>>(), vec!["id"]);
        assert_eq!(aligned.rows[0], vec![Value::Int64(1)]);

        // Without merge the column is not an error either; there is nothing to store.
        let (schema, _) = reconcile(&ident(), &table_schema(), &batch, false).unwrap();
        assert_eq!(schema, table_schema());

        // A later batch with real values decides the type.
        let typed = DataSet::new(
            Schema::new(vec![Field::new("note", DataType::Int64)]),
            vec![vec![Value::Int64(5)]],
        );
        let (schema, _) = reconcile(&ident(), &schema, &typed, true).unwrap();
        assert_eq!(schema.field("note").unwrap().data_type, DataType::Int64);
    }
}
