//! Unified Error Type System
//!
//! Centralized error types for the whole crate.
//!
//! ## Error Kinds
//!
//! - **Source**: a source could not produce a snapshot (store unavailable, parse failure)
//! - **Conversion**: a single raw value could not be converted to its field type
//! - **Unsupported**: a save was requested from a source that cannot persist
//! - **Write**: persisting to a writable backing store failed
//! - **Schema**: a configuration type declared an unusable schema
//! - **Usage**: the caller asked for something the current setup cannot do
//!
//! Errors from non-required sources never leave the merge engine; everything
//! else surfaces through [`SmartConfError`].

use std::fmt;
use thiserror::Error;

// =============================================================================
// Error Kinds
// =============================================================================

/// Coarse classification used by callers deciding how to react to a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Snapshot computation failed
    Source,
    /// Raw string did not parse as the declared type
    Conversion,
    /// Save requested from a read-only or transient source
    Unsupported,
    /// Backing store rejected a write
    Write,
    /// Invalid schema declaration
    Schema,
    /// Misuse of the API (unknown field, missing primary source)
    Usage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "SOURCE"),
            Self::Conversion => write!(f, "CONVERSION"),
            Self::Unsupported => write!(f, "UNSUPPORTED_OPERATION"),
            Self::Write => write!(f, "WRITE"),
            Self::Schema => write!(f, "SCHEMA"),
            Self::Usage => write!(f, "USAGE"),
        }
    }
}

// =============================================================================
// Conversion Error
// =============================================================================

/// A raw external value that could not be converted to its field type
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionError {
    /// Field identifier the value was destined for
    pub field: String,
    /// Offending raw string
    pub raw: String,
    /// Declared field type
    pub expected: String,
    /// Parser detail
    pub message: String,
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot convert '{}' for field '{}' to {}: {}",
            self.raw, self.field, self.expected, self.message
        )
    }
}

impl std::error::Error for ConversionError {}

impl ConversionError {
    pub fn new(
        field: impl Into<String>,
        raw: impl Into<String>,
        expected: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            raw: raw.into(),
            expected: expected.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Source Error
// =============================================================================

/// Why a source failed to produce its snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFailure {
    /// Backing store missing or unreadable
    Unavailable,
    /// Backing store content could not be parsed
    Parse,
    /// One field's value failed conversion
    Conversion,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "unavailable"),
            Self::Parse => write!(f, "parse"),
            Self::Conversion => write!(f, "conversion"),
        }
    }
}

/// Snapshot failure with the originating source and field attached
#[derive(Debug, Clone, PartialEq)]
pub struct SourceError {
    /// Name of the source that failed
    pub source_name: String,
    /// Failure class
    pub failure: SourceFailure,
    /// Detailed message
    pub message: String,
    /// Field being processed when the failure happened
    pub field: Option<String>,
    /// Underlying conversion failure, if any
    pub conversion: Option<ConversionError>,
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(
                f,
                "[{}:{}] {} ({})",
                self.source_name, field, self.message, self.failure
            ),
            None => write!(f, "[{}] {} ({})", self.source_name, self.message, self.failure),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.conversion
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl SourceError {
    pub fn new(
        source_name: impl Into<String>,
        failure: SourceFailure,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            failure,
            message: message.into(),
            field: None,
            conversion: None,
        }
    }

    /// Backing store could not be reached
    pub fn unavailable(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(source_name, SourceFailure::Unavailable, message)
    }

    /// Backing store content was malformed
    pub fn parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(source_name, SourceFailure::Parse, message)
    }

    /// Wrap a field conversion failure
    pub fn conversion(source_name: impl Into<String>, err: ConversionError) -> Self {
        Self {
            source_name: source_name.into(),
            failure: SourceFailure::Conversion,
            message: err.to_string(),
            field: Some(err.field.clone()),
            conversion: Some(err),
        }
    }

    /// Add field context
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

// =============================================================================
// Crate Error
// =============================================================================

#[derive(Debug, Error)]
pub enum SmartConfError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Source Errors
    // -------------------------------------------------------------------------
    #[error("Source error: {0}")]
    Source(SourceError),

    #[error("Backing store '{store}' failed: {message}")]
    Store { store: String, message: String },

    // -------------------------------------------------------------------------
    // Persistence Errors
    // -------------------------------------------------------------------------
    #[error("Source '{source_name}' does not support {operation}")]
    Unsupported {
        source_name: String,
        operation: String,
    },

    #[error("Write to '{source_name}' failed: {message}")]
    Write {
        source_name: String,
        message: String,
    },

    // -------------------------------------------------------------------------
    // Schema & Usage Errors
    // -------------------------------------------------------------------------
    #[error("Schema error in {type_name}: {message}")]
    Schema { type_name: String, message: String },

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("No source is marked primary")]
    NoPrimarySource,
}

impl From<SourceError> for SmartConfError {
    fn from(err: SourceError) -> Self {
        SmartConfError::Source(err)
    }
}

pub type Result<T> = std::result::Result<T, SmartConfError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl SmartConfError {
    /// Reject a save on a source that cannot persist
    pub fn unsupported(source_name: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Unsupported {
            source_name: source_name.into(),
            operation: operation.into(),
        }
    }

    /// Create a write error
    pub fn write(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a schema error
    pub fn schema(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Create a backing store error
    pub fn store(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Source(err) if err.failure == SourceFailure::Conversion => {
                ErrorKind::Conversion
            }
            Self::Source(_) | Self::Store { .. } => ErrorKind::Source,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::Write { .. } | Self::Io(_) => ErrorKind::Write,
            Self::Schema { .. } | Self::Json(_) => ErrorKind::Schema,
            Self::UnknownField(_) | Self::NoPrimarySource => ErrorKind::Usage,
        }
    }

    /// Source error details, if this is a snapshot failure
    pub fn as_source_error(&self) -> Option<&SourceError> {
        match self {
            Self::Source(err) => Some(err),
            _ => None,
        }
    }
}

/// Context extension trait for turning I/O style failures into write errors
pub trait ResultExt<T> {
    /// Map the error into [`SmartConfError::Write`] for the named source
    fn write_context(self, source_name: &str) -> Result<T>;

    /// Same as `write_context`, with a lazily built message prefix
    fn write_context_fn<F, C>(self, source_name: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn write_context(self, source_name: &str) -> Result<T> {
        self.map_err(|e| SmartConfError::write(source_name, e.to_string()))
    }

    fn write_context_fn<F, C>(self, source_name: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| SmartConfError::write(source_name, format!("{}: {}", f().into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================
