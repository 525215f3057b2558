use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

pub const VECTOR_COLUMN: &str = "vector";

/// One row per passage. `seq` records the insertion slot of a `paragraph_id`
/// and survives overwrites; `meta` is the passage metadata as JSON text.
pub fn build_passage_schema(dimension: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("paragraph_id", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("knowledge_id", DataType::Utf8, false),
        Field::new("document_id", DataType::Utf8, false),
        Field::new("source_id", DataType::Utf8, false),
        Field::new("source_type", DataType::Utf8, false),
        Field::new("is_active", DataType::Boolean, false),
        Field::new("meta", DataType::Utf8, false),
        Field::new("seq", DataType::Int64, false),
        Field::new("created_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dimension),
            true,
        ),
    ]))
}

/// Vector length declared by an existing table schema.
pub fn vector_dimension(schema: &Schema) -> Option<usize> {
    match schema.field_with_name(VECTOR_COLUMN).ok()?.data_type() {
        DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
        _ => None,
    }
}
