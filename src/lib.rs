//! SmartConf - Multi-Source Configuration Merging
//!
//! Binds one strongly-typed configuration object from several heterogeneous
//! sources (command line, environment, application settings, structured
//! files) with explicit precedence, lazy cached snapshots, and change
//! tracking against a designated primary source.
//!
//! ## Core Features
//!
//! - **Ordered Merge**: later sources win; zero values mean "no opinion"
//! - **Policy Flags**: primary, read-only and required per source
//! - **Change Tracking**: field diff against the primary source's own snapshot
//! - **Write-back**: partial saves of exactly the changed fields
//! - **Invariant Conversion**: locale-free parsing through a swappable registry
//!
//! ## Quick Start
//!
//! ```ignore
//! use smartconf::{CommandLineSource, ConfigurationManager, FileSource, KeyedSource};
//!
//! let manager = ConfigurationManager::<Settings>::builder()
//!     .source(FileSource::new("settings.toml").primary(true).required(true))
//!     .source(KeyedSource::process_environment().with_prefix("APP_"))
//!     .source(CommandLineSource::from_env())
//!     .build();
//!
//! let settings = manager.merged()?;
//! for (field, change) in &manager.changes()? {
//!     println!("{field}: {change}");
//! }
//! manager.save_changes()?;
//! ```
//!
//! ## Modules
//!
//! - [`schema`]: configuration trait, field descriptors, key naming
//! - [`convert`]: raw string to typed value conversion
//! - [`source`]: configuration sources and backing stores
//! - [`engine`]: merging, change tracking, the configuration manager

pub mod constants;
pub mod convert;
pub mod engine;
pub mod schema;
pub mod source;
pub mod types;

#[cfg(test)]
mod testing;

// =============================================================================
// Core Re-exports
// =============================================================================

// Error Types
pub use types::error::{
    ConversionError, ErrorKind, Result, ResultExt, SmartConfError, SourceError, SourceFailure,
};

// Schema
pub use schema::{
    Binding, Configuration, FieldDescriptor, FieldType, IntKind, KeyTransform, Schema,
    SchemaBuilder, SourceKind, schema_of,
};

// Conversion
pub use convert::{ConversionMode, ConverterRegistry, TypeConverter, ValueConverter};

// =============================================================================
// Source Re-exports
// =============================================================================

pub use source::{
    CommandLineSource, ConfigurationSource, DefaultsSource, FileFormat, FileSource,
    KeyValueStore, KeyedSource, MemoryStore, ProcessEnvironment, SettingsFile, SourceOptions,
    SourcePolicy,
};

// =============================================================================
// Engine Re-exports
// =============================================================================

pub use engine::{
    ChangeSet, ConfigurationManager, ConfigurationManagerBuilder, FieldChange, changes, merge,
    primary_snapshot,
};
