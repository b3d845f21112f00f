//! Converter Registry
//!
//! Maps type tags to [`TypeConverter`]s. Compound types (`Optional`, `List`,
//! `Choice`) are handled structurally and recurse into their element type.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::builtin::{
    BoolConverter, CharConverter, FloatConverter, IntegerConverter, TextConverter,
};
use super::{TypeConverter, ValueConverter, join_list, render_scalar, split_list};
use crate::schema::{FieldDescriptor, FieldType, IntKind};
use crate::types::ConversionError;

/// Type-tag keyed converter table
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: HashMap<String, Arc<dyn TypeConverter>>,
}

impl ConverterRegistry {
    /// Registry with no converters at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every built-in scalar type
    pub fn invariant() -> Self {
        let mut registry = Self::empty()
            .register("bool", BoolConverter)
            .register("float", FloatConverter)
            .register("char", CharConverter)
            .register("text", TextConverter)
            .register("path", TextConverter);
        for kind in [
            IntKind::I8,
            IntKind::I16,
            IntKind::I32,
            IntKind::I64,
            IntKind::U8,
            IntKind::U16,
            IntKind::U32,
            IntKind::U64,
        ] {
            registry = registry.register(kind.name(), IntegerConverter(kind));
        }
        registry
    }

    /// Add or replace the converter for `tag`
    pub fn register(mut self, tag: impl Into<String>, converter: impl TypeConverter + 'static) -> Self {
        self.converters.insert(tag.into(), Arc::new(converter));
        self
    }

    /// Whether every tag reachable from `ty` has a converter
    pub fn supports(&self, ty: &FieldType) -> bool {
        match ty {
            FieldType::Optional(inner) | FieldType::List(inner) => self.supports(inner),
            FieldType::Choice(_) => true,
            other => self.converters.contains_key(other.tag()),
        }
    }

    /// Parse a non-empty raw string as `ty`
    pub fn parse(&self, raw: &str, ty: &FieldType) -> Result<Value, String> {
        match ty {
            FieldType::Optional(inner) => self.parse(raw, inner),
            FieldType::List(inner) => split_list(raw)?
                .iter()
                .map(|item| {
                    self.parse(item, inner)
                        .map_err(|e| format!("item '{}': {}", item, e))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            FieldType::Choice(variants) => {
                let wanted = raw.trim();
                variants
                    .iter()
                    .find(|v| v.eq_ignore_ascii_case(wanted))
                    .map(|v| Value::String(v.clone()))
                    .ok_or_else(|| format!("expected one of: {}", variants.join(", ")))
            }
            other => self
                .converters
                .get(other.tag())
                .ok_or_else(|| format!("no converter registered for type tag '{}'", other.tag()))?
                .parse(raw),
        }
    }

    /// Flat string form of `value`; `None` for null
    pub fn render_value(&self, value: &Value, ty: &FieldType) -> Option<String> {
        // The NUL character stands for an unset char and has no flat form
        if value.is_null() || (*ty == FieldType::Char && ty.is_zero(value)) {
            return None;
        }
        match ty {
            FieldType::Optional(inner) => self.render_value(value, inner),
            FieldType::List(inner) => {
                let items = value.as_array()?;
                Some(join_list(
                    items
                        .iter()
                        .filter_map(|item| self.render_value(item, inner)),
                ))
            }
            FieldType::Choice(_) => render_scalar(value),
            other => match self.converters.get(other.tag()) {
                Some(converter) => converter.render(value),
                None => render_scalar(value),
            },
        }
    }
}

impl ValueConverter for ConverterRegistry {
    fn convert(&self, raw: Option<&str>, field: &FieldDescriptor) -> Result<Value, ConversionError> {
        match raw {
            None | Some("") => Ok(field.zero_value()),
            Some(raw) => self.parse(raw, field.ty()).map_err(|message| {
                ConversionError::new(field.name(), raw, field.ty().to_string(), message)
            }),
        }
    }

    fn render(&self, value: &Value, field: &FieldDescriptor) -> Option<String> {
        self.render_value(value, field.ty())
    }
}
