//! Parquet fixtures for unit tests

use arrow::array::{ArrayRef, Float64Array, Int64Array, ListBuilder, StringArray, StringBuilder, StructArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::sync::Arc;

/// Write batches to an in-memory Parquet file
pub fn parquet_bytes(batches: &[RecordBatch], max_row_group_size: Option<usize>) -> Vec<u8> {
    let schema = batches[0].schema();
    let props = max_row_group_size.map(|size| {
        WriterProperties::builder()
            .set_max_row_group_size(size)
            .build()
    });

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, schema, props).unwrap();
    for batch in batches {
        writer.write(batch).unwrap();
    }
    writer.close().unwrap();
    buf
}

/// `id:int64, name:utf8, score:float64`, 5 rows
pub fn simple_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("score", DataType::Float64, false),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5])),
            Arc::new(StringArray::from(vec!["Alice", "Bob", "Charlie", "Diana", "Eve"])),
            Arc::new(Float64Array::from(vec![95.5, 87.3, 92.1, 88.9, 94.7])),
        ],
    )
    .unwrap()
}

/// Batch with a single-typed set of columns, for schema unification tests
pub fn batch_of(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect();
    let arrays = columns.into_iter().map(|(_, array)| array).collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
}

/// `id, name, tags:list<utf8>, metadata:struct<city, age>`, 3 rows
pub fn complex_batch() -> RecordBatch {
    let mut tags = ListBuilder::new(StringBuilder::new());
    for row in [vec!["python", "data"], vec!["java"], vec!["rust", "go", "python"]] {
        for tag in row {
            tags.values().append_value(tag);
        }
        tags.append(true);
    }
    let tags: ArrayRef = Arc::new(tags.finish());

    let metadata: ArrayRef = Arc::new(StructArray::from(vec![
        (
            Arc::new(Field::new("city", DataType::Utf8, false)),
            Arc::new(StringArray::from(vec!["Paris", "London", "Berlin"])) as ArrayRef,
        ),
        (
            Arc::new(Field::new("age", DataType::Int64, false)),
            Arc::new(Int64Array::from(vec![30, 25, 35])) as ArrayRef,
        ),
    ]));

    batch_of(vec![
        ("id", Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
        (
            "name",
            Arc::new(StringArray::from(vec!["Alice", "Bob", "Charlie"])) as ArrayRef,
        ),
        ("tags", tags),
        ("metadata", metadata),
    ])
}
