//! Field Types
//!
//! The declared type of a schema field. Drives string-to-value conversion and
//! defines the zero value the merge engine treats as "no opinion".

use serde_json::Value;
use std::fmt;

/// Integer widths with their accepted ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntKind {
    /// Inclusive range accepted by this width
    pub fn range(&self) -> (i128, i128) {
        match self {
            Self::I8 => (i8::MIN as i128, i8::MAX as i128),
            Self::I16 => (i16::MIN as i128, i16::MAX as i128),
            Self::I32 => (i32::MIN as i128, i32::MAX as i128),
            Self::I64 => (i64::MIN as i128, i64::MAX as i128),
            Self::U8 => (0, u8::MAX as i128),
            Self::U16 => (0, u16::MAX as i128),
            Self::U32 => (0, u32::MAX as i128),
            Self::U64 => (0, u64::MAX as i128),
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
        }
    }
}

/// Declared type of a configuration field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Bool,
    Integer(IntKind),
    Float,
    Char,
    Text,
    Path,
    /// Enum serialized as one of the listed strings; the first is the zero value
    Choice(Vec<String>),
    /// Comma-separated in flat stores
    List(Box<FieldType>),
    /// `Option<_>`; zero value is null
    Optional(Box<FieldType>),
    /// Converted by a converter registered under this tag; zero value is null
    Custom(String),
}

impl FieldType {
    pub fn choice<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Choice(variants.into_iter().map(Into::into).collect())
    }

    pub fn list(inner: FieldType) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn optional(inner: FieldType) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn custom(tag: impl Into<String>) -> Self {
        Self::Custom(tag.into())
    }

    /// Converter registry key for this type
    pub fn tag(&self) -> &str {
        match self {
            Self::Bool => "bool",
            Self::Integer(kind) => kind.name(),
            Self::Float => "float",
            Self::Char => "char",
            Self::Text => "text",
            Self::Path => "path",
            Self::Choice(_) => "choice",
            Self::List(_) => "list",
            Self::Optional(_) => "optional",
            Self::Custom(tag) => tag,
        }
    }

    /// Values of this type are kept verbatim when they arrive as strings
    pub fn is_textual(&self) -> bool {
        match self {
            Self::Text | Self::Path | Self::Char => true,
            Self::Optional(inner) => inner.is_textual(),
            _ => false,
        }
    }

    /// The value this type takes when nothing asserts it
    pub fn zero_value(&self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Integer(_) => Value::from(0u64),
            Self::Float => Value::from(0.0f64),
            Self::Char => Value::String('\0'.to_string()),
            Self::Text | Self::Path => Value::String(String::new()),
            Self::Choice(variants) => variants
                .first()
                .map(|v| Value::String(v.clone()))
                .unwrap_or(Value::Null),
            Self::List(_) => Value::Array(Vec::new()),
            Self::Optional(_) | Self::Custom(_) => Value::Null,
        }
    }

    /// Check a value a structured document already typed.
    ///
    /// `Custom` types accept anything here; their converter decides.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        let fits = match self {
            Self::Bool => value.is_boolean(),
            Self::Integer(kind) => {
                let (min, max) = kind.range();
                let n = value
                    .as_i64()
                    .map(i128::from)
                    .or_else(|| value.as_u64().map(i128::from));
                match n {
                    Some(n) if n < min || n > max => {
                        return Err(format!("{} is out of range for {}", n, kind.name()));
                    }
                    Some(_) => true,
                    None => false,
                }
            }
            Self::Float => value.is_number(),
            Self::Char => value.as_str().is_some_and(|s| s.chars().count() == 1),
            Self::Text | Self::Path => value.is_string(),
            Self::Choice(variants) => value
                .as_str()
                .is_some_and(|s| variants.iter().any(|v| v == s)),
            Self::List(inner) => match value.as_array() {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        inner.check(item).map_err(|e| format!("item {}: {}", i, e))?;
                    }
                    true
                }
                None => false,
            },
            Self::Optional(_) if value.is_null() => true,
            Self::Optional(inner) => return inner.check(value),
            Self::Custom(_) => true,
        };
        if fits {
            Ok(())
        } else {
            Err(format!("expected {}, found {}", self, value))
        }
    }

    /// Whether `value` is this type's zero value
    pub fn is_zero(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            Self::Bool => value.as_bool() == Some(false),
            Self::Integer(_) => value.as_i64() == Some(0) || value.as_u64() == Some(0),
            Self::Float => value.as_f64() == Some(0.0),
            Self::Char => matches!(value.as_str(), Some("\0") | Some("")),
            Self::Text | Self::Path => value.as_str() == Some(""),
            Self::Choice(variants) => match (value.as_str(), variants.first()) {
                (Some(s), Some(first)) => s.is_empty() || s == first,
                (Some(s), None) => s.is_empty(),
                _ => false,
            },
            Self::List(_) => value.as_array().is_some_and(|items| items.is_empty()),
            Self::Optional(_) | Self::Custom(_) => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Choice(variants) => write!(f, "one of [{}]", variants.join(", ")),
            Self::List(inner) => write!(f, "list<{}>", inner),
            Self::Optional(inner) => write!(f, "optional<{}>", inner),
            other => write!(f, "{}", other.tag()),
        }
    }
}
