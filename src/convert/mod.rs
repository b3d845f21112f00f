//! Value Conversion
//!
//! Turns raw external strings into typed field values and back.
//!
//! ## Modules
//!
//! - `builtin`: invariant parsers for the scalar field types
//! - `registry`: type-tag keyed converter table, the default [`ValueConverter`]

mod builtin;
mod registry;

pub use registry::ConverterRegistry;

use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tracing::warn;

use crate::constants::convert::{LIST_QUOTE, LIST_SEPARATOR};
use crate::schema::FieldDescriptor;
use crate::types::ConversionError;

/// Parser for one type tag
pub trait TypeConverter: Send + Sync {
    /// Parse a non-empty raw string
    fn parse(&self, raw: &str) -> Result<Value, String>;

    /// Flat string form used when persisting to key/value stores
    fn render(&self, value: &Value) -> Option<String> {
        render_scalar(value)
    }
}

/// The conversion service every source uses
pub trait ValueConverter: Send + Sync {
    /// Convert a raw value for `field`; absent or empty yields the zero value
    fn convert(&self, raw: Option<&str>, field: &FieldDescriptor) -> Result<Value, ConversionError>;

    /// Inverse of `convert`; `None` means the key should be removed
    fn render(&self, value: &Value, field: &FieldDescriptor) -> Option<String>;
}

/// What a source does with a field that fails conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversionMode {
    /// Fail the whole snapshot
    #[default]
    Strict,
    /// Keep the field's zero value and continue
    Lenient,
}

static INVARIANT: LazyLock<Arc<ConverterRegistry>> =
    LazyLock::new(|| Arc::new(ConverterRegistry::invariant()));

/// Shared invariant converter
pub fn default_converter() -> Arc<dyn ValueConverter> {
    INVARIANT.clone()
}

/// Convert under `mode`. `Ok(None)` means the failure was ignored and the
/// field keeps its zero value.
pub fn convert_field(
    converter: &dyn ValueConverter,
    raw: Option<&str>,
    field: &FieldDescriptor,
    mode: ConversionMode,
) -> Result<Option<Value>, ConversionError> {
    settle(converter.convert(raw, field), field, mode)
}

/// Apply `mode` to a finished conversion
pub fn settle(
    result: Result<Value, ConversionError>,
    field: &FieldDescriptor,
    mode: ConversionMode,
) -> Result<Option<Value>, ConversionError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if mode == ConversionMode::Lenient => {
            warn!(field = field.name(), error = %err, "Ignoring conversion error");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Default flat rendering: strings verbatim, scalars via `Display`
pub fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// =============================================================================
// Flat Lists
// =============================================================================

/// Join list items for a flat store. Items that would not survive
/// [`split_list`] unchanged are written as quoted strings.
pub fn join_list<I>(items: I) -> String
where
    I: IntoIterator<Item = String>,
{
    items
        .into_iter()
        .map(|item| {
            let needs_quotes = item.is_empty()
                || item.trim() != item
                || item.contains([LIST_SEPARATOR, LIST_QUOTE]);
            if needs_quotes {
                serde_json::to_string(&item).unwrap_or(item)
            } else {
                item
            }
        })
        .collect::<Vec<_>>()
        .join(&LIST_SEPARATOR.to_string())
}

/// Split a flat list on separators outside quotes. Unquoted items are
/// trimmed and empty ones dropped; quoted items are taken verbatim.
pub fn split_list(raw: &str) -> Result<Vec<String>, String> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in raw.char_indices() {
        if escaped {
            escaped = false;
        } else if quoted && c == '\\' {
            escaped = true;
        } else if c == LIST_QUOTE {
            quoted = !quoted;
        } else if c == LIST_SEPARATOR && !quoted {
            pieces.push(&raw[start..i]);
            start = i + c.len_utf8();
        }
    }
    if quoted {
        return Err(format!("unterminated quote in '{}'", raw));
    }
    pieces.push(&raw[start..]);

    let mut items = Vec::with_capacity(pieces.len());
    for piece in pieces.into_iter().map(str::trim) {
        if piece.starts_with(LIST_QUOTE) {
            let item: String = serde_json::from_str(piece)
                .map_err(|e| format!("item {}: {}", piece, e))?;
            items.push(item);
        } else if !piece.is_empty() {
            items.push(piece.to_string());
        }
    }
    Ok(items)
}
