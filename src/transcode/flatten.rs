//! Complex-type flattening
//!
//! List, struct and map columns cannot be written as CSV directly. Each value
//! is walked into a [`CellValue`] and serialized as JSON text, turning the
//! column into a plain string column.

use arrow::array::{Array, ArrayRef, AsArray, RecordBatch, StringBuilder};
use arrow::datatypes::{
    DataType, Field, Float16Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, Schema, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::error::ArrowError;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::ser::Formatter;
use std::fmt;
use std::io;
use std::sync::Arc;
use tracing::debug;

/// A dynamically typed cell value extracted from an Arrow array
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<CellValue>),
    /// Struct fields or map entries, in order
    Map(Vec<(String, CellValue)>),
}

impl CellValue {
    /// Serialize as JSON with `", "` and `": "` separators, falling back to
    /// the display text when the value has no strict JSON form
    pub fn to_json(&self) -> String {
        let mut out = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, SpacedFormatter);
        match self.serialize(&mut serializer) {
            Ok(()) => String::from_utf8(out).unwrap_or_else(|_| self.to_string()),
            Err(_) => self.to_string(),
        }
    }

    fn into_key(self) -> String {
        match self {
            CellValue::Text(s) => s,
            other => other.to_string(),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Null => serializer.serialize_unit(),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
            CellValue::Int(i) => serializer.serialize_i64(*i),
            CellValue::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            CellValue::Float(f) => Err(S::Error::custom(format!("{} is not valid JSON", f))),
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            CellValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Single-line JSON layout with a space after every separator
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

fn write_json_str(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    let quoted = serde_json::to_string(s).map_err(|_| fmt::Error)?;
    f.write_str(&quoted)
}

/// Same layout as [`CellValue::to_json`]; non-finite floats are written as
/// `NaN`, `Infinity` and `-Infinity`
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => f.write_str("null"),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(v) if v.is_nan() => f.write_str("NaN"),
            CellValue::Float(v) if v.is_infinite() => {
                f.write_str(if *v > 0.0 { "Infinity" } else { "-Infinity" })
            }
            CellValue::Float(v) => write!(f, "{:?}", v),
            CellValue::Text(s) => write_json_str(f, s),
            CellValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            CellValue::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_json_str(f, key)?;
                    write!(f, ": {}", value)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Whether a column type needs flattening before CSV output
pub fn is_complex(data_type: &DataType) -> bool {
    match data_type {
        DataType::Dictionary(_, value) => is_complex(value),
        other => other.is_nested(),
    }
}

/// Extract one value from an array
pub fn cell_value(array: &dyn Array, row: usize) -> CellValue {
    if array.is_null(row) {
        return CellValue::Null;
    }

    match array.data_type() {
        DataType::Null => CellValue::Null,
        DataType::Boolean => CellValue::Bool(array.as_boolean().value(row)),
        DataType::Int8 => CellValue::Int(array.as_primitive::<Int8Type>().value(row).into()),
        DataType::Int16 => CellValue::Int(array.as_primitive::<Int16Type>().value(row).into()),
        DataType::Int32 => CellValue::Int(array.as_primitive::<Int32Type>().value(row).into()),
        DataType::Int64 => CellValue::Int(array.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => CellValue::Int(array.as_primitive::<UInt8Type>().value(row).into()),
        DataType::UInt16 => CellValue::Int(array.as_primitive::<UInt16Type>().value(row).into()),
        DataType::UInt32 => CellValue::Int(array.as_primitive::<UInt32Type>().value(row).into()),
        DataType::UInt64 => {
            let v = array.as_primitive::<UInt64Type>().value(row);
            i64::try_from(v)
                .map(CellValue::Int)
                .unwrap_or_else(|_| CellValue::Text(v.to_string()))
        }
        DataType::Float16 => {
            CellValue::Float(array.as_primitive::<Float16Type>().value(row).to_f64())
        }
        DataType::Float32 => {
            CellValue::Float(array.as_primitive::<Float32Type>().value(row).into())
        }
        DataType::Float64 => CellValue::Float(array.as_primitive::<Float64Type>().value(row)),
        DataType::Utf8 => CellValue::Text(array.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => CellValue::Text(array.as_string::<i64>().value(row).to_string()),
        DataType::List(_) => list_value(array.as_list::<i32>().value(row)),
        DataType::LargeList(_) => list_value(array.as_list::<i64>().value(row)),
        DataType::FixedSizeList(_, _) => list_value(array.as_fixed_size_list().value(row)),
        DataType::Struct(fields) => {
            let strukt = array.as_struct();
            let entries = fields
                .iter()
                .zip(strukt.columns())
                .map(|(field, column)| (field.name().clone(), cell_value(column.as_ref(), row)))
                .collect();
            CellValue::Map(entries)
        }
        DataType::Map(_, _) => {
            let entries = array.as_map().value(row);
            let keys = entries.column(0);
            let values = entries.column(1);
            let pairs = (0..entries.len())
                .map(|i| {
                    (
                        cell_value(keys.as_ref(), i).into_key(),
                        cell_value(values.as_ref(), i),
                    )
                })
                .collect();
            CellValue::Map(pairs)
        }
        _ => display_value(array, row),
    }
}

fn list_value(values: ArrayRef) -> CellValue {
    CellValue::List(
        (0..values.len())
            .map(|i| cell_value(values.as_ref(), i))
            .collect(),
    )
}

/// Leaf types without a JSON counterpart (timestamps, decimals, binary...)
/// use Arrow's display formatting
fn display_value(array: &dyn Array, row: usize) -> CellValue {
    let options = FormatOptions::default();
    ArrayFormatter::try_new(array, &options)
        .and_then(|formatter| formatter.value(row).try_to_string())
        .map(CellValue::Text)
        .unwrap_or(CellValue::Null)
}

/// Serialize every value of a column as JSON text; nulls become empty strings
pub fn flatten_column(array: &dyn Array) -> ArrayRef {
    let mut builder = StringBuilder::with_capacity(array.len(), array.len() * 16);
    for row in 0..array.len() {
        if array.is_null(row) {
            builder.append_value("");
        } else {
            builder.append_value(cell_value(array, row).to_json());
        }
    }
    Arc::new(builder.finish())
}

/// Replace every complex column of a batch with its JSON text form
///
/// Returns the batch unchanged when no column is complex, so flattening an
/// already flattened batch is a no-op.
pub fn flatten_batch(batch: &RecordBatch) -> Result<RecordBatch, ArrowError> {
    let schema = batch.schema();
    if !schema.fields().iter().any(|f| is_complex(f.data_type())) {
        return Ok(batch.clone());
    }

    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut columns = Vec::with_capacity(batch.num_columns());

    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        if is_complex(field.data_type()) {
            debug!(column = %field.name(), "Converting complex column to JSON text");
            fields.push(Arc::new(Field::new(field.name(), DataType::Utf8, true)));
            columns.push(flatten_column(column.as_ref()));
        } else {
            fields.push(field.clone());
            columns.push(column.clone());
        }
    }

    let flat_schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    RecordBatch::try_new(flat_schema, columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{
        Float64Array, Int32Builder, Int64Array, ListBuilder, MapBuilder, StringArray,
        StringBuilder as SB, StructArray,
    };

    fn tags_column() -> ArrayRef {
        let mut builder = ListBuilder::new(SB::new());
        builder.values().append_value("python");
        builder.values().append_value("data");
        builder.append(true);
        builder.append(false);
        builder.values().append_value("rust");
        builder.append(true);
        Arc::new(builder.finish())
    }

    fn metadata_column() -> ArrayRef {
        Arc::new(StructArray::from(vec![
            (
                Arc::new(Field::new("city", DataType::Utf8, false)),
                Arc::new(StringArray::from(vec!["Paris", "London", "Berlin"])) as ArrayRef,
            ),
            (
                Arc::new(Field::new("age", DataType::Int64, false)),
                Arc::new(Int64Array::from(vec![30, 25, 35])) as ArrayRef,
            ),
        ]))
    }

    #[test]
    fn test_is_complex() {
        let list = DataType::List(Arc::new(Field::new("item", DataType::Utf8, true)));
        assert!(is_complex(&list));
        assert!(is_complex(&metadata_column().data_type().clone()));
        assert!(!is_complex(&DataType::Int64));
        assert!(!is_complex(&DataType::Utf8));
        assert!(!is_complex(&DataType::Float64));
    }

    #[test]
    fn test_serialize_values() {
        let list = CellValue::List(vec![
            CellValue::Text("a".into()),
            CellValue::Text("b".into()),
        ]);
        assert_eq!(list.to_json(), r#"["a", "b"]"#);

        let map = CellValue::Map(vec![("key".into(), CellValue::Text("value".into()))]);
        assert_eq!(map.to_json(), r#"{"key": "value"}"#);

        assert_eq!(CellValue::Null.to_json(), "null");
        assert_eq!(CellValue::Text("Café".into()).to_json(), "\"Café\"");
    }

    #[test]
    fn test_non_finite_float_falls_back_to_display() {
        let list = CellValue::List(vec![CellValue::Float(1.5), CellValue::Float(f64::NAN)]);
        assert_eq!(list.to_json(), "[1.5, NaN]");

        let map = CellValue::Map(vec![
            ("name".into(), CellValue::Text("say \"hi\"".into())),
            ("max".into(), CellValue::Float(f64::INFINITY)),
            ("whole".into(), CellValue::Float(2.0)),
        ]);
        assert_eq!(
            map.to_json(),
            r#"{"name": "say \"hi\"", "max": Infinity, "whole": 2.0}"#
        );
    }

    #[test]
    fn test_nested_values_use_spaced_separators() {
        let nested = CellValue::Map(vec![
            (
                "tags".into(),
                CellValue::List(vec![CellValue::Int(1), CellValue::Null]),
            ),
            ("ok".into(), CellValue::Bool(true)),
        ]);
        assert_eq!(nested.to_json(), r#"{"tags": [1, null], "ok": true}"#);
        assert_eq!(CellValue::List(vec![]).to_json(), "[]");
        assert_eq!(CellValue::Map(vec![]).to_json(), "{}");
        assert_eq!(CellValue::Float(2.0).to_json(), "2.0");
        assert_eq!(CellValue::Text("日本".into()).to_json(), "\"日本\"");
    }

    #[test]
    fn test_flatten_list_column() {
        let flat = flatten_column(tags_column().as_ref());
        let flat = flat.as_string::<i32>();
        assert_eq!(flat.value(0), r#"["python", "data"]"#);
        assert_eq!(flat.value(1), "");
        assert!(!flat.is_null(1));
        assert_eq!(flat.value(2), r#"["rust"]"#);
    }

    #[test]
    fn test_flatten_struct_column() {
        let flat = flatten_column(metadata_column().as_ref());
        let flat = flat.as_string::<i32>();
        assert_eq!(flat.value(0), r#"{"city": "Paris", "age": 30}"#);
        assert_eq!(flat.value(2), r#"{"city": "Berlin", "age": 35}"#);
    }

    #[test]
    fn test_flatten_map_column() {
        let mut builder = MapBuilder::new(None, SB::new(), Int32Builder::new());
        builder.keys().append_value("a");
        builder.values().append_value(1);
        builder.keys().append_value("b");
        builder.values().append_null();
        builder.append(true).unwrap();
        let map: ArrayRef = Arc::new(builder.finish());

        let flat = flatten_column(map.as_ref());
        assert_eq!(flat.as_string::<i32>().value(0), r#"{"a": 1, "b": null}"#);
    }

    #[test]
    fn test_flatten_batch_is_idempotent() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("score", DataType::Float64, false),
            Field::new("tags", tags_column().data_type().clone(), true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0])),
                tags_column(),
            ],
        )
        .unwrap();

        let once = flatten_batch(&batch).unwrap();
        assert_eq!(once.schema().field(0).data_type(), &DataType::Float64);
        assert_eq!(once.schema().field(1).data_type(), &DataType::Utf8);

        let twice = flatten_batch(&once).unwrap();
        assert_eq!(once, twice);
    }
}
