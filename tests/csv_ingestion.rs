use landing_loader::ingestion::csv::{read_csv_from_path, read_csv_from_reader, reader_builder, CsvReadOptions};
use landing_loader::types::{DataType, Value};
use landing_loader::LoaderError;

fn read_str(input: &str, opts: &CsvReadOptions) -> landing_loader::LoaderResult<landing_loader::types::DataSet> {
    let mut rdr = reader_builder(opts).from_reader(input.as_bytes());
    read_csv_from_reader(&mut rdr, opts)
}

#[test]
fn read_csv_infers_column_types() {
    let input = "id,name,score,active\n1,Ada,98.5,true\n2,Grace,87,false\n";
    let ds = read_str(input, &CsvReadOptions::default()).unwrap();

    let types: Vec<DataType> = ds.schema.fields.iter().map(|f| f.data_type).collect();
    assert_eq!(
        types,
        vec![DataType::Int64, DataType::Utf8, DataType::Float64, DataType::Bool]
    );
    assert_eq!(ds.row_count(), 2);
    assert_eq!(
        ds.rows[0],
        vec![
            Value::Int64(1),
            Value::Utf8("Ada".to_string()),
            Value::Float64(98.5),
            Value::Bool(true),
        ]
    );
    // An integer cell in a float column is widened.
    assert_eq!(ds.rows[1][2], Value::Float64(87.0));
}

#[test]
fn read_csv_without_inference_keeps_text() {
    let opts = CsvReadOptions {
        infer_types: false,
        ..Default::default()
    };
    let ds = read_str("id,flag\n1,true\n", &opts).unwrap();
    assert!(ds.schema.fields.iter().all(|f| f.data_type == DataType::Utf8));
    assert_eq!(ds.rows[0][0], Value::Utf8("1".to_string()));
}

#[test]
fn read_csv_blank_cells_and_short_rows_are_null() {
    let ds = read_str("a,b,c\n1,,x\n2\n", &CsvReadOptions::default()).unwrap();
    assert_eq!(ds.schema.fields[1].data_type, DataType::Utf8);
    assert_eq!(ds.rows[0][1], Value::Null);
    assert_eq!(ds.rows[1], vec![Value::Int64(2), Value::Null, Value::Null]);
}

#[test]
fn read_csv_headerless_uses_positional_names() {
    let opts = CsvReadOptions {
        has_header: false,
        ..Default::default()
    };
    let ds = read_str("1,a\n2,b,extra\n", &opts).unwrap();
    let names: Vec<&str> = ds.schema.field_names().collect();
    assert_eq!(names, vec!["_c0", "_c1", "_c2"]);
    assert_eq!(ds.rows[0][2], Value::Null);
    assert_eq!(ds.rows[1][2], Value::Utf8("extra".to_string()));
}

#[test]
fn read_csv_repairs_blank_and_duplicate_headers() {
    let ds = read_str("id,,id\n1,2,3\n", &CsvReadOptions::default()).unwrap();
    let names: Vec<&str> = ds.schema.field_names().collect();
    assert_eq!(names, vec!["id", "_c1", "id_2"]);
}

#[test]
fn read_csv_generated_names_never_collide_with_real_headers() {
    let ds = read_str("_c1,,x\n1,2,3\n", &CsvReadOptions::default()).unwrap();
    let names: Vec<&str> = ds.schema.field_names().collect();
    assert_eq!(names, vec!["_c1", "_c1_1", "x"]);
    assert_eq!(ds.rows[0], vec![Value::Int64(1), Value::Int64(2), Value::Int64(3)]);

    let ds = read_str("a,a,a_1\n1,2,3\n", &CsvReadOptions::default()).unwrap();
    let names: Vec<&str> = ds.schema.field_names().collect();
    assert_eq!(names, vec!["a", "a_1", "a_1_2"]);
    assert_eq!(ds.rows[0][2], Value::Int64(3));
}

#[test]
fn read_tab_delimited_text() {
    let opts = CsvReadOptions {
        delimiter: b'\t',
        ..Default::default()
    };
    let ds = read_str("entity_id\tname\n7\tAcme, Inc.\n", &opts).unwrap();
    assert_eq!(ds.rows[0][0], Value::Int64(7));
    assert_eq!(ds.rows[0][1], Value::Utf8("Acme, Inc.".to_string()));
}

#[test]
fn read_csv_from_missing_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_csv_from_path(dir.path().join("missing.csv"), &CsvReadOptions::default()).unwrap_err();
    assert!(matches!(err, LoaderError::Csv(_) | LoaderError::Io(_)));
}
