//! Backing Stores
//!
//! Key/value capability objects handed to sources at construction, so sources
//! never reach for ambient process state on their own.

use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use tracing::debug;

use crate::convert::join_list;
use crate::constants::env::PROCESS_LOCATION;
use crate::types::{Result, ResultExt, SmartConfError};

/// Flat string key/value store with optional location scoping
pub trait KeyValueStore: Send + Sync {
    /// Store name used in diagnostics
    fn name(&self) -> &str;

    /// Raw value for `key`; `None` when the key is absent
    fn get(&self, key: &str, location: Option<&str>) -> Result<Option<String>>;

    /// Write a value; `None` removes the key
    fn set(&self, key: &str, value: Option<&str>, location: Option<&str>) -> Result<()>;

    /// Drop anything the store cached from its medium
    fn reload(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Memory Store
// =============================================================================

/// Concurrent in-memory store, scoped by location
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<(String, String), String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert at the default location
    pub fn with(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(None, key, value);
        self
    }

    pub fn insert(&self, location: Option<&str>, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(
            (location.unwrap_or_default().to_string(), key.into()),
            value.into(),
        );
    }

    pub fn remove(&self, location: Option<&str>, key: &str) -> Option<String> {
        self.entries
            .remove(&(location.unwrap_or_default().to_string(), key.to_string()))
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &str, location: Option<&str>) -> Result<Option<String>> {
        Ok(self
            .entries
            .get(&(location.unwrap_or_default().to_string(), key.to_string()))
            .map(|entry| entry.value().clone()))
    }

    fn set(&self, key: &str, value: Option<&str>, location: Option<&str>) -> Result<()> {
        match value {
            Some(value) => self.insert(location, key, value),
            None => {
                self.remove(location, key);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Process Environment
// =============================================================================

/// Serializes every environment write made through [`ProcessEnvironment`]
static ENV_WRITES: Mutex<()> = Mutex::new(());

/// The real process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl ProcessEnvironment {
    fn check_location(location: Option<&str>) -> Result<()> {
        match location {
            None => Ok(()),
            Some(target) if target.eq_ignore_ascii_case(PROCESS_LOCATION) => Ok(()),
            Some(target) => Err(SmartConfError::store(
                PROCESS_LOCATION,
                format!("unsupported environment target '{}'", target),
            )),
        }
    }
}

impl KeyValueStore for ProcessEnvironment {
    fn name(&self) -> &str {
        PROCESS_LOCATION
    }

    fn get(&self, key: &str, location: Option<&str>) -> Result<Option<String>> {
        Self::check_location(location)?;
        match std::env::var(key) {
            Ok(value) if value.is_empty() => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e @ std::env::VarError::NotUnicode(_)) => Err(SmartConfError::store(
                PROCESS_LOCATION,
                format!("{}: {}", key, e),
            )),
        }
    }

    fn set(&self, key: &str, value: Option<&str>, location: Option<&str>) -> Result<()> {
        Self::check_location(location)?;
        if key.is_empty() || key.contains(['=', '\0']) {
            return Err(SmartConfError::store(
                PROCESS_LOCATION,
                format!("invalid variable name '{}'", key),
            ));
        }
        // Empty values are indistinguishable from absent ones
        let value = value.filter(|v| !v.is_empty());
        if value.is_some_and(|v| v.contains('\0')) {
            return Err(SmartConfError::store(
                PROCESS_LOCATION,
                format!("value for '{}' contains a NUL byte", key),
            ));
        }
        let _guard = ENV_WRITES.lock().unwrap_or_else(PoisonError::into_inner);
        match value {
            // SAFETY: writes from this crate hold ENV_WRITES, and std guards its
            // own readers; the process must not read the environment through
            // foreign code while a save is running
            Some(value) => unsafe { std::env::set_var(key, value) },
            None => unsafe { std::env::remove_var(key) },
        }
        Ok(())
    }
}

// =============================================================================
// Settings File
// =============================================================================

/// TOML application settings document.
///
/// Keys live at the top level, or inside `[section]` tables when a location
/// names a section. A missing file reads as empty.
#[derive(Debug)]
pub struct SettingsFile {
    path: PathBuf,
    name: String,
    document: RwLock<Option<toml::Table>>,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            path,
            document: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<toml::Table> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "Settings file not found, reading as empty");
            return Ok(toml::Table::new());
        }
        let text = fs::read_to_string(&self.path)?;
        toml::from_str::<toml::Table>(&text)
            .map_err(|e| SmartConfError::store(&self.name, e.to_string()))
    }

    fn with_document<R>(&self, read: impl FnOnce(&toml::Table) -> R) -> Result<R> {
        if let Some(document) = self
            .document
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(read(document));
        }

        let mut slot = self.document.write().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(self.load()?);
        }
        Ok(read(slot.get_or_insert_with(toml::Table::new)))
    }
}

/// Flatten a TOML scalar or array into the store's string form
fn flatten(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Array(items) => join_list(items.iter().map(flatten)),
        other => other.to_string(),
    }
}

impl KeyValueStore for SettingsFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str, location: Option<&str>) -> Result<Option<String>> {
        self.with_document(|document| {
            let table = match location {
                Some(section) => document.get(section).and_then(toml::Value::as_table),
                None => Some(document),
            };
            table.and_then(|t| t.get(key)).map(flatten)
        })
    }

    fn set(&self, key: &str, value: Option<&str>, location: Option<&str>) -> Result<()> {
        let mut slot = self.document.write().unwrap_or_else(PoisonError::into_inner);
        let mut document = match slot.take() {
            Some(document) => document,
            None => self.load()?,
        };

        let table = match location {
            Some(section) => {
                let entry = document
                    .entry(section.to_string())
                    .or_insert_with(|| toml::Value::Table(toml::Table::new()));
                match entry.as_table_mut() {
                    Some(table) => table,
                    None => {
                        return Err(SmartConfError::write(
                            &self.name,
                            format!("'{}' is not a section", section),
                        ));
                    }
                }
            }
            None => &mut document,
        };
        match value {
            Some(value) => {
                table.insert(key.to_string(), toml::Value::String(value.to_string()));
            }
            None => {
                table.remove(key);
            }
        }

        let text = toml::to_string_pretty(&document).write_context(&self.name)?;
        fs::write(&self.path, text).write_context_fn(&self.name, || "writing settings")?;
        *slot = Some(document);
        Ok(())
    }

    fn reload(&self) -> Result<()> {
        *self.document.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
