//! Configuration Manager
//!
//! Owns an ordered source list and ties merging, change tracking and
//! write-back to the primary source together.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::changes::{ChangeSet, changes, primary_snapshot};
use super::merge::merge;
use crate::schema::Configuration;
use crate::source::ConfigurationSource;
use crate::types::{Result, SmartConfError};

type SharedSource<T> = Arc<dyn ConfigurationSource<T>>;

pub struct ConfigurationManager<T: Configuration> {
    sources: Vec<SharedSource<T>>,
}

impl<T: Configuration> ConfigurationManager<T> {
    pub fn builder() -> ConfigurationManagerBuilder<T> {
        ConfigurationManagerBuilder::new()
    }

    /// Manager over `sources`, given in ascending precedence
    pub fn new(sources: Vec<SharedSource<T>>) -> Self {
        let primaries = sources.iter().filter(|s| s.is_primary()).count();
        if primaries > 1 {
            warn!(count = primaries, "More than one primary source; the first one is used");
        }
        Self { sources }
    }

    pub fn sources(&self) -> &[SharedSource<T>] {
        &self.sources
    }

    fn views(&self) -> impl Iterator<Item = &dyn ConfigurationSource<T>> {
        self.sources
            .iter()
            .map(|s| s.as_ref() as &dyn ConfigurationSource<T>)
    }

    /// First source flagged primary
    pub fn primary(&self) -> Option<&SharedSource<T>> {
        self.sources.iter().find(|s| s.is_primary())
    }

    /// Merged configuration across all sources
    pub fn merged(&self) -> Result<T> {
        merge(self.views())
    }

    /// Baseline the change set is computed against
    pub fn primary_snapshot(&self) -> Result<Arc<T>> {
        primary_snapshot(self.views())
    }

    /// Fields where the merged configuration differs from the primary source
    pub fn changes(&self) -> Result<ChangeSet> {
        let merged = self.merged()?;
        let primary = self.primary_snapshot()?;
        changes(&merged, &primary)
    }

    /// Write the current change set back to the primary source.
    ///
    /// Returns the change set that was persisted. The primary source is
    /// invalidated afterwards so its next snapshot reflects the write.
    pub fn save_changes(&self) -> Result<ChangeSet> {
        let primary = self.primary().ok_or(SmartConfError::NoPrimarySource)?;
        let merged = self.merged()?;
        let baseline = self.primary_snapshot()?;
        let set = changes(&merged, &baseline)?;

        if set.is_empty() {
            debug!(source = primary.name(), "No changes to save");
            return Ok(set);
        }

        primary.partial_save(&merged, &set.field_names())?;
        primary.invalidate();
        info!(source = primary.name(), fields = set.len(), "Saved changes to primary source");
        Ok(set)
    }

    /// Persist `config` in full to the primary source
    pub fn save(&self, config: &T) -> Result<()> {
        let primary = self.primary().ok_or(SmartConfError::NoPrimarySource)?;
        primary.save(config)?;
        primary.invalidate();
        Ok(())
    }

    /// Invalidate every source
    pub fn invalidate(&self) {
        for source in &self.sources {
            source.invalidate();
        }
    }
}

/// Collects sources in ascending precedence
pub struct ConfigurationManagerBuilder<T: Configuration> {
    sources: Vec<SharedSource<T>>,
}

impl<T: Configuration> Default for ConfigurationManagerBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Configuration> ConfigurationManagerBuilder<T> {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Append a source above everything added so far
    pub fn source<S>(mut self, source: S) -> Self
    where
        S: ConfigurationSource<T> + 'static,
    {
        self.sources.push(Arc::new(source));
        self
    }

    /// Append a source that is also held elsewhere
    pub fn shared_source(mut self, source: SharedSource<T>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn build(self) -> ConfigurationManager<T> {
        ConfigurationManager::new(self.sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{
        CommandLineSource, DefaultsSource, FileSource, KeyValueStore, KeyedSource, MemoryStore,
    };
    use crate::testing::{BrokenStore, Person};
    use crate::types::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_merged_and_changes() {
        let env_store = Arc::new(MemoryStore::new().with("NAME", "Frank").with("AGE", "43"));
        let manager = ConfigurationManager::<Person>::builder()
            .source(KeyedSource::environment(env_store).primary(true))
            .source(CommandLineSource::new(["--name", "Richard"]))
            .build();

        assert_eq!(manager.merged().unwrap(), Person::new("Richard", 43));
        let set = manager.changes().unwrap();
        assert_eq!(set.to_string(), "name: Frank -> Richard");
        assert_eq!(manager.sources().len(), 2);
    }

    #[test]
    fn test_save_changes_writes_only_changed_fields() {
        let env_store = Arc::new(MemoryStore::new().with("NAME", "Frank").with("AGE", "43"));
        let manager = ConfigurationManager::<Person>::builder()
            .source(KeyedSource::environment(env_store.clone()).primary(true))
            .source(CommandLineSource::new(["--name", "Richard"]))
            .build();

        let saved = manager.save_changes().unwrap();
        assert_eq!(saved.field_names().len(), 1);
        assert_eq!(env_store.get("NAME", None).unwrap().as_deref(), Some("Richard"));
        assert_eq!(env_store.get("AGE", None).unwrap().as_deref(), Some("43"));
        // Everything untouched stays absent
        assert_eq!(env_store.get("TAGS", None).unwrap(), None);

        // The primary was refreshed, so nothing is left to save
        assert!(manager.changes().unwrap().is_empty());
    }

    #[test]
    fn test_save_changes_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "name = \"Frank\"\nage = 43\n").unwrap();

        let manager = ConfigurationManager::<Person>::builder()
            .source(DefaultsSource::new(Person {
                occupation: "Unknown".into(),
                ..Person::default()
            }))
            .source(FileSource::new(&path).primary(true).required(true))
            .source(CommandLineSource::new(["--age", "50"]))
            .build();

        let set = manager.changes().unwrap();
        assert_eq!(set.field_names().len(), 2);
        assert!(set.contains("age"));
        assert!(set.contains("occupation"));

        manager.save_changes().unwrap();
        let document: toml::Table = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(document["name"].as_str(), Some("Frank"));
        assert_eq!(document["age"].as_integer(), Some(50));
        assert_eq!(document["occupation"].as_str(), Some("Unknown"));
    }

    #[test]
    fn test_required_primary_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigurationManager::<Person>::builder()
            .source(FileSource::new(dir.path().join("absent.toml")).primary(true).required(true))
            .build();

        assert_eq!(manager.merged().unwrap_err().kind(), ErrorKind::Source);
        assert_eq!(manager.changes().unwrap_err().kind(), ErrorKind::Source);
    }

    #[test]
    fn test_optional_failure_is_contained() {
        let manager = ConfigurationManager::<Person>::builder()
            .source(DefaultsSource::new(Person::new("Frank", 43)))
            .source(KeyedSource::environment(Arc::new(BrokenStore::default())))
            .build();

        assert_eq!(manager.merged().unwrap(), Person::new("Frank", 43));
    }

    #[test]
    fn test_no_primary() {
        let manager = ConfigurationManager::<Person>::builder()
            .source(DefaultsSource::new(Person::new("Frank", 43)))
            .build();

        assert!(manager.primary().is_none());
        // Everything the merge sets counts as changed
        assert_eq!(manager.changes().unwrap().len(), 2);
        assert!(matches!(
            manager.save_changes().unwrap_err(),
            SmartConfError::NoPrimarySource
        ));
        assert!(matches!(
            manager.save(&Person::default()).unwrap_err(),
            SmartConfError::NoPrimarySource
        ));
    }

    #[test]
    fn test_read_only_primary() {
        let manager = ConfigurationManager::<Person>::builder()
            .source(DefaultsSource::new(Person::new("Frank", 43)).primary(true))
            .source(CommandLineSource::new(["--age", "50"]))
            .build();

        let err = manager.save_changes().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_save_and_invalidate() {
        let env_store = Arc::new(MemoryStore::new());
        let shared: SharedSource<Person> =
            Arc::new(KeyedSource::environment(env_store.clone()).primary(true));
        let manager = ConfigurationManager::builder()
            .shared_source(shared.clone())
            .build();

        manager.save(&Person::new("Frank", 43)).unwrap();
        assert_eq!(shared.snapshot().unwrap().name, "Frank");

        env_store.insert(None, "NAME", "Richard");
        assert_eq!(manager.merged().unwrap().name, "Frank");
        manager.invalidate();
        assert_eq!(manager.merged().unwrap().name, "Richard");
    }
}
