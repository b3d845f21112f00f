//! Defaults Source
//!
//! A fixed value used as the lowest precedence layer. Its snapshot is the
//! value itself, so fields it sets to a non-zero value act as fallbacks.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::{ConfigurationSource, SourcePolicy};
use crate::constants::names;
use crate::schema::{Configuration, SourceKind};
use crate::types::{Result, SmartConfError};

pub struct DefaultsSource<T> {
    name: String,
    value: Arc<T>,
    policy: SourcePolicy,
}

impl<T: Configuration> DefaultsSource<T> {
    pub fn new(value: T) -> Self {
        Self {
            name: names::DEFAULTS.to_string(),
            value: Arc::new(value),
            policy: SourcePolicy::read_only(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn primary(mut self, primary: bool) -> Self {
        self.policy.primary = primary;
        self
    }
}

impl<T: Configuration> Default for DefaultsSource<T> {
    /// Wraps `T::default()`
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Configuration> ConfigurationSource<T> for DefaultsSource<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Defaults
    }

    fn policy(&self) -> SourcePolicy {
        self.policy
    }

    fn snapshot(&self) -> Result<Arc<T>> {
        Ok(Arc::clone(&self.value))
    }

    fn invalidate(&self) {}

    fn save(&self, _config: &T) -> Result<()> {
        Err(SmartConfError::unsupported(&self.name, "save"))
    }

    fn partial_save(&self, _config: &T, _fields: &BTreeSet<String>) -> Result<()> {
        Err(SmartConfError::unsupported(&self.name, "partial save"))
    }
}
