use arrow_schema::{DataType, Field, Schema};
use std::collections::HashMap;
use std::sync::Arc;

pub const VECTOR_COLUMN: &str = "vector";

/// Schema-level metadata keys stored in `vectors.arrow`.
pub const META_ROWS: &str = "docrag.rows";
pub const META_DIM: &str = "docrag.dim";
pub const META_METADATA_DIGEST: &str = "docrag.metadata_blake3";
pub const META_BUILT_AT: &str = "docrag.built_at";

pub fn vector_field(dim: i32) -> Field {
	Field::new(
		VECTOR_COLUMN,
		DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim),
		false,
	)
}

pub fn build_vector_schema(dim: i32, metadata: HashMap<String, String>) -> Arc<Schema> {
	Arc::new(Schema::new(vec![vector_field(dim)]).with_metadata(metadata))
}
