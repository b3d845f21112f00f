//! Schema Descriptors
//!
//! Each configuration type declares its fields once:
//! - `field`: declared types, zero values
//! - `naming`: identifier → external key conventions
//! - `descriptor`: field bindings per source kind, the validated field table
//! - `registry`: the [`Configuration`] trait and the per-type schema cache

mod descriptor;
mod field;
mod naming;
mod registry;

pub use descriptor::{Binding, FieldDescriptor, Schema, SchemaBuilder, SourceKind};
pub use field::{FieldType, IntKind};
pub use naming::KeyTransform;
pub use registry::{Configuration, schema_of};
