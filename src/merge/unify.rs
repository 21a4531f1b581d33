//! Schema unification across multiple sources
//!
//! Rules:
//! - every field name from every readable schema appears exactly once,
//!   in first-seen order
//! - same type everywhere: kept
//! - conflicting types: widened to `Utf8`
//! - missing from some sources: nullable
//!
//! Unreadable schemas are skipped with a warning. Only a set with no readable
//! schema at all is an error.

use crate::error::{ConvertError, Result};
use crate::inspect::read_schema;
use crate::source::Source;
use arrow::datatypes::{DataType, Field, FieldRef, Schema, SchemaRef};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Default name of the column recording each row's source file
pub const SOURCE_COLUMN: &str = "source_file";

/// Something the caller should know about the unified schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaWarning {
    /// The schema of a file could not be read; the file was skipped
    Unreadable { file: String, reason: String },

    /// A field has different types across files and was widened to text
    Promoted {
        field: String,
        /// (file, type) for every file containing the field
        types: Vec<(String, String)>,
    },

    /// A field is missing from some files and is nullable in the result
    PartiallyPresent {
        field: String,
        present_in: Vec<String>,
        missing_from: Vec<String>,
    },
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaWarning::Unreadable { file, reason } => {
                write!(f, "Skipping '{}': cannot read schema ({})", file, reason)
            }
            SchemaWarning::Promoted { field, types } => {
                let listed = types
                    .iter()
                    .map(|(file, ty)| format!("{} in {}", ty, file))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "Column '{}' has conflicting types ({}); converted to text", field, listed)
            }
            SchemaWarning::PartiallyPresent {
                field, missing_from, ..
            } => write!(
                f,
                "Column '{}' is missing from {}; filled with nulls",
                field,
                missing_from.join(", ")
            ),
        }
    }
}

/// Per-field unification details
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedField {
    pub field: FieldRef,
    /// Indices (into the input list) of the sources containing the field
    pub present_in: Vec<usize>,
    /// Type conflict resolved by widening to text
    pub promoted: bool,
}

/// Merged column definition for a union
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedSchema {
    schema: SchemaRef,
    fields: Vec<UnifiedField>,
    source_column: Option<String>,
}

impl UnifiedSchema {
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn fields(&self) -> &[UnifiedField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&UnifiedField> {
        self.fields.iter().find(|f| f.field.name() == name)
    }

    /// Name of the appended source-file column, if any
    pub fn source_column(&self) -> Option<&str> {
        self.source_column.as_deref()
    }

    /// Append a text column recording each row's source file
    ///
    /// The column is named `source_file`, suffixed `_1`, `_2`... if a data
    /// column already uses that name.
    pub fn with_source_column(mut self) -> Self {
        if self.source_column.is_some() {
            return self;
        }

        let mut name = SOURCE_COLUMN.to_string();
        let mut n = 1;
        while self.schema.field_with_name(&name).is_ok() {
            name = format!("{}_{}", SOURCE_COLUMN, n);
            n += 1;
        }

        let mut fields: Vec<FieldRef> = self.schema.fields().iter().cloned().collect();
        fields.push(Arc::new(Field::new(&name, DataType::Utf8, false)));
        self.schema = Arc::new(Schema::new(fields));
        self.source_column = Some(name);
        self
    }
}

struct Occurrence {
    source: usize,
    field: FieldRef,
}

/// Compute the unified schema of a set of sources
pub fn unify_schemas(sources: &[Source]) -> Result<(UnifiedSchema, Vec<SchemaWarning>)> {
    let mut warnings = Vec::new();
    let mut readable = Vec::new();
    let mut order: Vec<String> = Vec::new();
    let mut seen: HashMap<String, Vec<Occurrence>> = HashMap::new();

    for (index, source) in sources.iter().enumerate() {
        let schema = match read_schema(source) {
            Ok(schema) => schema,
            Err(e) => {
                let reason = match e {
                    ConvertError::SourceUnreadable { reason, .. } => reason,
                    other => other.to_string(),
                };
                warn!("Skipping {}: cannot read schema ({})", source.name(), reason);
                warnings.push(SchemaWarning::Unreadable {
                    file: source.name().to_string(),
                    reason,
                });
                continue;
            }
        };
        readable.push(index);

        for field in schema.fields() {
            let occurrences = seen.entry(field.name().clone()).or_insert_with(|| {
                order.push(field.name().clone());
                Vec::new()
            });
            occurrences.push(Occurrence {
                source: index,
                field: field.clone(),
            });
        }
    }

    if readable.is_empty() {
        return Err(ConvertError::NoReadableSchema {
            count: sources.len(),
        });
    }

    let mut fields = Vec::with_capacity(order.len());
    for name in &order {
        let occurrences = &seen[name];
        let first = &occurrences[0].field;
        let promoted = occurrences
            .iter()
            .any(|o| o.field.data_type() != first.data_type());
        let partial = occurrences.len() < readable.len();

        if promoted {
            warnings.push(SchemaWarning::Promoted {
                field: name.clone(),
                types: occurrences
                    .iter()
                    .map(|o| {
                        (
                            sources[o.source].name().to_string(),
                            o.field.data_type().to_string(),
                        )
                    })
                    .collect(),
            });
        }

        let present_in: Vec<usize> = occurrences.iter().map(|o| o.source).collect();
        if partial {
            warnings.push(SchemaWarning::PartiallyPresent {
                field: name.clone(),
                present_in: present_in
                    .iter()
                    .map(|&i| sources[i].name().to_string())
                    .collect(),
                missing_from: readable
                    .iter()
                    .filter(|i| !present_in.contains(*i))
                    .map(|&i| sources[i].name().to_string())
                    .collect(),
            });
        }

        let data_type = if promoted {
            DataType::Utf8
        } else {
            first.data_type().clone()
        };
        let nullable = promoted || partial || occurrences.iter().any(|o| o.field.is_nullable());

        fields.push(UnifiedField {
            field: Arc::new(Field::new(name, data_type, nullable)),
            present_in,
            promoted,
        });
    }

    let schema = Arc::new(Schema::new(
        fields.iter().map(|f| f.field.clone()).collect::<Vec<_>>(),
    ));

    info!(
        "Unified {} of {} schemas into {} columns ({} warnings)",
        readable.len(),
        sources.len(),
        fields.len(),
        warnings.len()
    );

    Ok((
        UnifiedSchema {
            schema,
            fields,
            source_column: None,
        },
        warnings,
    ))
}
