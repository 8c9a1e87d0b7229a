use landing_loader::catalog::{Namespace, TableIdent, TableRegistry, Warehouse, WriteMode};
use landing_loader::types::{DataSet, DataType, Field, Schema, Value};
use landing_loader::LoaderError;

fn namespace() -> Namespace {
    Namespace::new("entity_resolution_dev", "bronze")
}

fn setup(tables: &[&str]) -> (tempfile::TempDir, Warehouse) {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = Warehouse::new(dir.path().join("warehouse"));
    warehouse.create_namespace(&namespace()).unwrap();
    for t in tables {
        warehouse.create_table(&namespace().table(*t)).unwrap();
    }
    (dir, warehouse)
}

fn batch(fields: &[(&str, DataType)], rows: Vec<Vec<Value>>) -> DataSet {
    DataSet::new(
        Schema::new(fields.iter().map(|(n, t)| Field::new(*n, *t)).collect()),
        rows,
    )
}

fn entity() -> TableIdent {
    namespace().table("edm_entity")
}

#[test]
fn registry_lists_only_tables_with_manifests() {
    let (_dir, warehouse) = setup(&["edm_entity", "edm_address"]);
    std::fs::create_dir_all(warehouse.namespace_dir(&namespace()).join("scratch")).unwrap();

    let tables = warehouse.list_tables(&namespace()).unwrap();
    assert_eq!(
        tables.into_iter().collect::<Vec<_>>(),
        vec!["edm_address".to_string(), "edm_entity".to_string()]
    );
}

#[test]
fn registry_for_missing_namespace_is_unavailable() {
    let (_dir, warehouse) = setup(&[]);
    let err = warehouse
        .list_tables(&Namespace::new("entity_resolution_dev", "silver"))
        .unwrap_err();
    assert!(matches!(err, LoaderError::RegistryUnavailable { .. }));
}

#[test]
fn creating_an_existing_table_fails() {
    let (_dir, warehouse) = setup(&["edm_entity"]);
    let err = warehouse.create_table(&entity()).unwrap_err();
    assert!(matches!(err, LoaderError::TableExists { .. }));
}

#[test]
fn writing_to_an_unknown_table_fails() {
    let (_dir, warehouse) = setup(&[]);
    let b = batch(&[("id", DataType::Int64)], vec![vec![Value::Int64(1)]]);
    let err = warehouse.write(&entity(), &b, WriteMode::Append, true).unwrap_err();
    assert!(matches!(err, LoaderError::TableNotFound { .. }));
}

#[test]
fn appends_accumulate_and_merge_new_columns() {
    let (_dir, warehouse) = setup(&["edm_entity"]);

    let first = batch(
        &[("id", DataType::Int64), ("name", DataType::Utf8)],
        vec![
            vec![Value::Int64(1), Value::Utf8("Acme".into())],
            vec![Value::Int64(2), Value::Utf8("Globex".into())],
        ],
    );
    let out = warehouse.write(&entity(), &first, WriteMode::Append, true).unwrap();
    assert_eq!((out.version, out.rows), (1, 2));

    let second = batch(
        &[("id", DataType::Int64), ("region", DataType::Utf8)],
        vec![vec![Value::Int64(3), Value::Utf8("EU".into())]],
    );
    let out = warehouse.write(&entity(), &second, WriteMode::Append, true).unwrap();
    assert_eq!((out.version, out.rows), (2, 1));

    let manifest = warehouse.manifest(&entity()).unwrap();
    assert_eq!(manifest.files.len(), 2);
    assert_eq!(manifest.row_count(), 3);
    assert_eq!(
        manifest.schema.field_names().collect::<Vec<_>>(),
        vec!["id", "name", "region"]
    );

    let all = warehouse.scan(&entity()).unwrap();
    assert_eq!(all.row_count(), 3);
    assert_eq!(
        all.rows[0],
        vec![Value::Int64(1), Value::Utf8("Acme".into()), Value::Null]
    );
    assert_eq!(
        all.rows[2],
        vec![Value::Int64(3), Value::Null, Value::Utf8("EU".into())]
    );
}

#[test]
fn float_batch_widens_integer_column_for_older_rows() {
    let (_dir, warehouse) = setup(&["edm_entity"]);
    let ints = batch(&[("score", DataType::Int64)], vec![vec![Value::Int64(5)]]);
    let floats = batch(&[("score", DataType::Float64)], vec![vec![Value::Float64(7.5)]]);

    warehouse.write(&entity(), &ints, WriteMode::Append, true).unwrap();
    warehouse.write(&entity(), &floats, WriteMode::Append, true).unwrap();

    let all = warehouse.scan(&entity()).unwrap();
    assert_eq!(all.schema.fields[0].data_type, DataType::Float64);
    assert_eq!(all.rows, vec![vec![Value::Float64(5.0)], vec![Value::Float64(7.5)]]);
}

#[test]
fn conflicting_batch_leaves_table_unchanged() {
    let (_dir, warehouse) = setup(&["edm_entity"]);
    let ints = batch(&[("id", DataType::Int64)], vec![vec![Value::Int64(1)]]);
    warehouse.write(&entity(), &ints, WriteMode::Append, true).unwrap();
    let before = warehouse.manifest(&entity()).unwrap();

    let bools = batch(&[("id", DataType::Bool)], vec![vec![Value::Bool(true)]]);
    let err = warehouse.write(&entity(), &bools, WriteMode::Append, true).unwrap_err();
    assert!(matches!(err, LoaderError::SchemaConflict { .. }));
    assert!(err.to_string().contains("edm_entity.id"), "{err}");

    assert_eq!(warehouse.manifest(&entity()).unwrap(), before);
    let parts = std::fs::read_dir(warehouse.table_dir(&entity()))
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .ends_with(".parquet")
        })
        .count();
    assert_eq!(parts, 1);
}

#[test]
fn new_column_without_merge_is_a_mismatch() {
    let (_dir, warehouse) = setup(&["edm_entity"]);
    let first = batch(&[("id", DataType::Int64)], vec![vec![Value::Int64(1)]]);
    warehouse.write(&entity(), &first, WriteMode::Append, false).unwrap();

    let extra = batch(
        &[("id", DataType::Int64), ("name", DataType::Utf8)],
        vec![vec![Value::Int64(2), Value::Utf8("x".into())]],
    );
    let err = warehouse.write(&entity(), &extra, WriteMode::Append, false).unwrap_err();
    assert!(matches!(err, LoaderError::SchemaMismatch { .. }));
}

#[test]
fn overwrite_replaces_rows_but_keeps_columns() {
    let (_dir, warehouse) = setup(&["edm_entity"]);
    let first = batch(
        &[("id", DataType::Int64), ("name", DataType::Utf8)],
        vec![vec![Value::Int64(1), Value::Utf8("Acme".into())]],
    );
    warehouse.write(&entity(), &first, WriteMode::Append, true).unwrap();

    let replacement = batch(&[("id", DataType::Int64)], vec![vec![Value::Int64(9)]]);
    let out = warehouse
        .write(&entity(), &replacement, WriteMode::Overwrite, true)
        .unwrap();
    assert_eq!(out.version, 2);

    let all = warehouse.scan(&entity()).unwrap();
    assert_eq!(all.schema.field_names().collect::<Vec<_>>(), vec!["id", "name"]);
    assert_eq!(all.rows, vec![vec![Value::Int64(9), Value::Null]]);
}

#[test]
fn empty_batch_commits_without_data_file_or_column_types() {
    let (_dir, warehouse) = setup(&["edm_entity"]);
    let empty = DataSet::empty(Schema::new(vec![Field::new("id", DataType::Utf8)]));

    let out = warehouse.write(&entity(), &empty, WriteMode::Append, true).unwrap();
    assert_eq!((out.version, out.rows), (1, 0));

    let manifest = warehouse.manifest(&entity()).unwrap();
    assert!(manifest.files.is_empty());
    assert!(manifest.schema.is_empty());

    // The next batch with values still sets the column type.
    let ids = DataSet::new(
        Schema::new(vec![Field::new("id", DataType::Int64)]),
        vec![vec![Value::Int64(1)]],
    );
    warehouse.write(&entity(), &ids, WriteMode::Append, true).unwrap();
    let manifest = warehouse.manifest(&entity()).unwrap();
    assert_eq!(manifest.schema.field("id").unwrap().data_type, DataType::Int64);
}
