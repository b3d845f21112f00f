//! Configuration types and the per-type schema registry

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::TypeId;
use std::fmt::Debug;
use std::sync::{Arc, LazyLock};
use tracing::debug;

use super::descriptor::{Schema, SchemaBuilder};
use crate::types::{Result, SmartConfError, to_record};

/// A strongly-typed configuration object.
///
/// Field access goes through the serde representation, so field identifiers
/// are the serialized field names. `describe` declares which fields take part
/// in merging and how each one binds to external keys.
///
/// ```ignore
/// impl Configuration for Settings {
///     fn describe(schema: SchemaBuilder) -> SchemaBuilder {
///         schema
///             .field(FieldDescriptor::new("name", FieldType::Text).env().option())
///             .field(FieldDescriptor::new("age", FieldType::Integer(IntKind::U32)).env())
///     }
/// }
/// ```
pub trait Configuration:
    Serialize + DeserializeOwned + Default + Clone + Debug + Send + Sync + 'static
{
    fn describe(schema: SchemaBuilder) -> SchemaBuilder;
}

static SCHEMAS: LazyLock<DashMap<TypeId, Arc<Schema>>> = LazyLock::new(DashMap::new);

/// Schema for `T`, built and validated on first use and cached for the
/// lifetime of the process.
pub fn schema_of<T: Configuration>() -> Result<Arc<Schema>> {
    let id = TypeId::of::<T>();
    if let Some(schema) = SCHEMAS.get(&id) {
        return Ok(Arc::clone(schema.value()));
    }

    let schema = Arc::new(build_schema::<T>()?);
    Ok(Arc::clone(SCHEMAS.entry(id).or_insert(schema).value()))
}

fn build_schema<T: Configuration>() -> Result<Schema> {
    let type_name = std::any::type_name::<T>();
    let record = to_record(&T::default())?;
    let schema = T::describe(SchemaBuilder::new(type_name))
        .build()?
        .adopt_default_zeros(&record);

    for field in schema.fields() {
        if !record.contains_key(field.name()) {
            return Err(SmartConfError::schema(
                type_name,
                format!("field '{}' is not a serialized field", field.name()),
            ));
        }
    }

    debug!(config_type = type_name, fields = schema.len(), "Built schema");
    Ok(schema)
}
