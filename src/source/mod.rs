//! Configuration Sources
//!
//! Every backing store is wrapped in a [`ConfigurationSource`]: a lazily
//! computed, cached, typed snapshot plus save operations and policy flags.
//!
//! ## Adapters
//!
//! - [`KeyedSource`]: flat key/value stores (process environment, app settings)
//! - [`CommandLineSource`]: argument vectors parsed with clap
//! - [`FileSource`]: structured TOML/JSON documents read through figment
//! - [`DefaultsSource`]: a fixed value, the lowest precedence layer

mod cache;
mod command_line;
mod defaults;
mod file;
mod keyed;
mod store;

pub use cache::SnapshotCache;
pub use command_line::CommandLineSource;
pub use defaults::DefaultsSource;
pub use file::{FileFormat, FileSource};
pub use keyed::KeyedSource;
pub use store::{KeyValueStore, MemoryStore, ProcessEnvironment, SettingsFile};

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::convert::ConversionMode;
use crate::schema::{Configuration, FieldDescriptor, KeyTransform, SourceKind};
use crate::types::Result;

// =============================================================================
// Source Contract
// =============================================================================

/// Policy flags declared by every source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourcePolicy {
    /// Canonical baseline for change tracking
    pub primary: bool,
    /// Fixed per source kind; saves fail with an unsupported-operation error
    pub read_only: bool,
    /// Snapshot failures abort the merge instead of being ignored
    pub required: bool,
}

impl SourcePolicy {
    pub fn writable() -> Self {
        Self::default()
    }

    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }
}

/// One backing store producing typed snapshots of `T`
pub trait ConfigurationSource<T: Configuration>: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    fn policy(&self) -> SourcePolicy;

    /// Cached snapshot, computed from the backing store on first use
    fn snapshot(&self) -> Result<Arc<T>>;

    /// Discard the cached snapshot; safe to call at any time
    fn invalidate(&self);

    /// Persist every field this source binds
    fn save(&self, config: &T) -> Result<()>;

    /// Persist exactly the named fields
    fn partial_save(&self, config: &T, fields: &BTreeSet<String>) -> Result<()>;

    fn is_primary(&self) -> bool {
        self.policy().primary
    }

    fn is_read_only(&self) -> bool {
        self.policy().read_only
    }

    fn is_required(&self) -> bool {
        self.policy().required
    }
}

// =============================================================================
// Source Options
// =============================================================================

/// Key resolution and conversion knobs shared by the adapters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceOptions {
    /// Naming convention; the source kind's default when unset
    pub key_transform: Option<KeyTransform>,
    /// Prepended to derived keys, never to explicit ones
    pub prefix: String,
    /// Location used when a binding declares none
    pub location: Option<String>,
    pub conversion_mode: ConversionMode,
}

impl SourceOptions {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_transform(mut self, transform: KeyTransform) -> Self {
        self.key_transform = Some(transform);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn lenient(mut self) -> Self {
        self.conversion_mode = ConversionMode::Lenient;
        self
    }

    /// External key for `field` in a source of `kind`
    pub fn key_for(&self, field: &FieldDescriptor, kind: SourceKind) -> Option<String> {
        let transform = self
            .key_transform
            .unwrap_or_else(|| kind.default_transform());
        field.external_key(kind, transform, &self.prefix)
    }

    /// Binding location, falling back to the source-wide one
    pub fn location_for<'a>(&'a self, field: &'a FieldDescriptor, kind: SourceKind) -> Option<&'a str> {
        field.location(kind).or(self.location.as_deref())
    }
}
