//! Multi-source merges
//!
//! # Module Structure
//!
//! - `unify`: merged column definition across schemas
//! - `union`: row concatenation under the unified schema
//! - `join`: equi-join on a shared key (feature `join`)

pub mod unify;
pub mod union;

#[cfg(feature = "join")]
pub mod join;

pub use unify::{unify_schemas, SchemaWarning, UnifiedField, UnifiedSchema, SOURCE_COLUMN};
pub use union::{cast_to_unified, merge_union, merge_union_to_writer, UnionOptions, UnionStats};

#[cfg(feature = "join")]
pub use join::{merge_join, plan_projection, ProjectedColumn};
