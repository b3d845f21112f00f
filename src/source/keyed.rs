//! Key/Value Store Sources
//!
//! Environment variables and application settings share one adapter: each
//! bound field is looked up under its external key, converted, and written
//! back as a flat string.

use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::cache::SnapshotCache;
use super::store::{KeyValueStore, ProcessEnvironment, SettingsFile};
use super::{ConfigurationSource, SourceOptions, SourcePolicy};
use crate::constants::names;
use crate::convert::{ValueConverter, convert_field, default_converter};
use crate::schema::{Configuration, FieldDescriptor, SourceKind, schema_of};
use crate::types::{Result, SmartConfError, SourceError, from_record, to_record};

/// Source over a [`KeyValueStore`]
pub struct KeyedSource<T> {
    name: String,
    kind: SourceKind,
    store: Arc<dyn KeyValueStore>,
    options: SourceOptions,
    converter: Arc<dyn ValueConverter>,
    policy: SourcePolicy,
    cache: SnapshotCache<T>,
}

impl<T: Configuration> KeyedSource<T> {
    fn with_kind(
        name: &str,
        kind: SourceKind,
        store: Arc<dyn KeyValueStore>,
        policy: SourcePolicy,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            store,
            options: SourceOptions::default(),
            converter: default_converter(),
            policy,
            cache: SnapshotCache::new(),
        }
    }

    // =========================================================================
    // Constructors
    // =========================================================================

    /// Writable environment source over any store
    pub fn environment(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_kind(
            names::ENVIRONMENT,
            SourceKind::Environment,
            store,
            SourcePolicy::writable(),
        )
    }

    /// Environment source over the real process environment
    pub fn process_environment() -> Self {
        Self::environment(Arc::new(ProcessEnvironment))
    }

    /// Read-only application settings source over any store
    pub fn app_settings(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_kind(
            names::APP_SETTINGS,
            SourceKind::AppSettings,
            store,
            SourcePolicy::read_only(),
        )
    }

    /// Application settings read from a TOML document
    pub fn settings_file(path: impl Into<PathBuf>) -> Self {
        Self::app_settings(Arc::new(SettingsFile::new(path)))
    }

    // =========================================================================
    // Builder Methods
    // =========================================================================

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_options(mut self, options: SourceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.prefix = prefix.into();
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn ValueConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn primary(mut self, primary: bool) -> Self {
        self.policy.primary = primary;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.policy.required = required;
        self
    }

    pub fn options(&self) -> &SourceOptions {
        &self.options
    }

    // =========================================================================
    // Reading & Writing
    // =========================================================================

    fn compute(&self) -> Result<T> {
        debug!(source = %self.name, kind = %self.kind, "Computing snapshot");
        let schema = schema_of::<T>()?;
        let mut record = schema.zero_record::<T>()?;

        for field in schema.bound_fields(self.kind) {
            let Some(key) = self.options.key_for(field, self.kind) else {
                continue;
            };
            let location = self.options.location_for(field, self.kind);
            let raw = self.store.get(&key, location).map_err(|e| {
                SourceError::unavailable(&self.name, e.to_string()).with_field(field.name())
            })?;

            match convert_field(
                self.converter.as_ref(),
                raw.as_deref(),
                field,
                self.options.conversion_mode,
            ) {
                Ok(Some(value)) => {
                    record.insert(field.name().to_string(), value);
                }
                Ok(None) => {}
                Err(err) => return Err(SourceError::conversion(&self.name, err).into()),
            }
        }

        from_record(record).map_err(|e| SourceError::parse(&self.name, e.to_string()).into())
    }

    fn ensure_writable(&self, operation: &str) -> Result<()> {
        if self.policy.read_only {
            return Err(SmartConfError::unsupported(&self.name, operation));
        }
        Ok(())
    }

    fn write(&self, config: &T, fields: Vec<&FieldDescriptor>) -> Result<()> {
        let record = to_record(config)?;
        let mut written = 0usize;

        for field in fields {
            let Some(key) = self.options.key_for(field, self.kind) else {
                debug!(source = %self.name, field = field.name(), "Field not bound here, skipping");
                continue;
            };
            let value = record.get(field.name()).unwrap_or(&Value::Null);
            let rendered = self.converter.render(value, field);
            self.store
                .set(&key, rendered.as_deref(), self.options.location_for(field, self.kind))
                .map_err(|e| SmartConfError::write(&self.name, e.to_string()))?;
            written += 1;
        }

        info!(source = %self.name, fields = written, "Saved configuration");
        Ok(())
    }
}

impl<T: Configuration> ConfigurationSource<T> for KeyedSource<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn policy(&self) -> SourcePolicy {
        self.policy
    }

    fn snapshot(&self) -> Result<Arc<T>> {
        self.cache.get_or_try_init(|| self.compute())
    }

    fn invalidate(&self) {
        self.cache.invalidate();
        if let Err(e) = self.store.reload() {
            warn!(source = %self.name, error = %e, "Backing store reload failed");
        }
    }

    fn save(&self, config: &T) -> Result<()> {
        self.ensure_writable("save")?;
        let schema = schema_of::<T>()?;
        self.write(config, schema.bound_fields(self.kind).collect())
    }

    fn partial_save(&self, config: &T, fields: &BTreeSet<String>) -> Result<()> {
        self.ensure_writable("partial save")?;
        let schema = schema_of::<T>()?;
        let targets = schema.resolve(fields)?;
        self.write(config, targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{ConverterRegistry, TypeConverter};
    use crate::schema::KeyTransform;
    use crate::source::MemoryStore;
    use crate::testing::{BrokenStore, Person};
    use crate::types::{ErrorKind, SourceFailure};
    use std::sync::atomic::Ordering;

    fn person_env(store: &Arc<MemoryStore>) -> KeyedSource<Person> {
        KeyedSource::environment(store.clone())
    }

    #[test]
    fn test_reads_bound_fields_only() {
        let store = Arc::new(
            MemoryStore::new()
                .with("NAME", "Frank")
                .with("AGE", "43")
                .with("JOB", "Programmer")
                .with("VERBOSE", "true"),
        );
        let snapshot = person_env(&store).snapshot().unwrap();

        assert_eq!(snapshot.name, "Frank");
        assert_eq!(snapshot.age, 43);
        assert_eq!(snapshot.occupation, "Programmer");
        // `verbose` is bound to the command line only
        assert!(!snapshot.verbose);
    }

    #[test]
    fn test_prefix_applies_to_derived_keys() {
        let store = Arc::new(
            MemoryStore::new()
                .with("APP_NAME", "Frank")
                .with("NAME", "ignored")
                .with("JOB", "Tester"),
        );
        let snapshot = person_env(&store).with_prefix("APP_").snapshot().unwrap();

        assert_eq!(snapshot.name, "Frank");
        assert_eq!(snapshot.occupation, "Tester");
    }

    #[test]
    fn test_absent_keys_keep_zero() {
        let store = Arc::new(MemoryStore::new());
        let snapshot = person_env(&store).snapshot().unwrap();
        assert_eq!(*snapshot, Person::default());
    }

    #[test]
    fn test_conversion_failure_strict_and_lenient() {
        let store = Arc::new(
            MemoryStore::new()
                .with("NAME", "Frank")
                .with("AGE", "NOT_INTEGER"),
        );

        let err = person_env(&store).snapshot().unwrap_err();
        let source_err = err.as_source_error().unwrap();
        assert_eq!(source_err.failure, SourceFailure::Conversion);
        assert_eq!(source_err.field.as_deref(), Some("age"));
        assert_eq!(source_err.conversion.as_ref().unwrap().raw, "NOT_INTEGER");

        let lenient = person_env(&store).with_options(SourceOptions::default().lenient());
        let snapshot = lenient.snapshot().unwrap();
        assert_eq!(snapshot.name, "Frank");
        assert_eq!(snapshot.age, 0);
    }

    #[test]
    fn test_store_failure_is_source_error() {
        let store = Arc::new(BrokenStore::default());
        let source: KeyedSource<Person> = KeyedSource::environment(store.clone());

        let err = source.snapshot().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Source);
        assert_eq!(
            err.as_source_error().unwrap().failure,
            SourceFailure::Unavailable
        );
        // Failures are not cached; the store is consulted again
        let _ = source.snapshot();
        assert_eq!(store.reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalidate_round_trip() {
        let store = Arc::new(MemoryStore::new().with("NAME", "Frank"));
        let source = person_env(&store);

        assert_eq!(source.snapshot().unwrap().name, "Frank");
        store.insert(None, "NAME", "Richard");
        // Still the cached snapshot
        assert_eq!(source.snapshot().unwrap().name, "Frank");

        source.invalidate();
        assert_eq!(source.snapshot().unwrap().name, "Richard");
    }

    #[test]
    fn test_save_and_partial_save() {
        let store = Arc::new(MemoryStore::new());
        let source = person_env(&store);
        let mut person = Person::new("Frank", 43);
        person.occupation = "Programmer".into();
        person.tags = vec!["a".into(), "b".into()];

        source.save(&person).unwrap();
        assert_eq!(store.get("NAME", None).unwrap().as_deref(), Some("Frank"));
        assert_eq!(store.get("AGE", None).unwrap().as_deref(), Some("43"));
        assert_eq!(store.get("JOB", None).unwrap().as_deref(), Some("Programmer"));
        assert_eq!(store.get("TAGS", None).unwrap().as_deref(), Some("a,b"));

        let changed = Person::new("Richard", 50);
        let fields = BTreeSet::from(["name".to_string()]);
        source.partial_save(&changed, &fields).unwrap();
        assert_eq!(store.get("NAME", None).unwrap().as_deref(), Some("Richard"));
        // Not named, not written
        assert_eq!(store.get("AGE", None).unwrap().as_deref(), Some("43"));
    }

    #[test]
    fn test_list_items_with_separator_survive_save() {
        let store = Arc::new(MemoryStore::new());
        let source = person_env(&store);
        let person = Person {
            tags: vec!["a,b".into(), " c".into()],
            ..Person::new("Frank", 43)
        };

        source.save(&person).unwrap();
        source.invalidate();
        assert_eq!(source.snapshot().unwrap().tags, person.tags);
    }

    #[test]
    fn test_partial_save_skips_unbound_and_rejects_unknown() {
        let store = Arc::new(MemoryStore::new());
        let source = person_env(&store);
        let person = Person::new("Frank", 43);

        // `verbose` has no environment binding
        let unbound = BTreeSet::from(["verbose".to_string()]);
        source.partial_save(&person, &unbound).unwrap();
        assert!(store.is_empty());

        let unknown = BTreeSet::from(["name".to_string(), "salary".to_string()]);
        let err = source.partial_save(&person, &unknown).unwrap_err();
        assert!(matches!(err, SmartConfError::UnknownField(ref f) if f == "salary"));
        // Validation happens before anything is written
        assert!(store.is_empty());
    }

    #[test]
    fn test_app_settings_read_every_field_and_are_read_only() {
        let store = Arc::new(
            MemoryStore::new()
                .with("name", "Frank")
                .with("Occupation", "Programmer")
                .with("verbose", "yes")
                .with("nickname", "Frankie"),
        );
        let source: KeyedSource<Person> = KeyedSource::app_settings(store.clone());
        let snapshot = source.snapshot().unwrap();

        assert_eq!(snapshot.name, "Frank");
        assert_eq!(snapshot.occupation, "Programmer");
        assert!(snapshot.verbose);
        assert_eq!(snapshot.nickname.as_deref(), Some("Frankie"));

        assert!(source.is_read_only());
        let err = source.save(&Person::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        let err = source
            .partial_save(&Person::default(), &BTreeSet::from(["name".to_string()]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_app_settings_section_and_transform() {
        let store = Arc::new(MemoryStore::new());
        store.insert(Some("person"), "NAME", "Frank");
        let source: KeyedSource<Person> = KeyedSource::app_settings(store).with_options(
            SourceOptions::default()
                .with_transform(KeyTransform::UpperSnakeCase)
                .with_location("person"),
        );

        assert_eq!(source.snapshot().unwrap().name, "Frank");
    }

    struct Shouting;

    impl TypeConverter for Shouting {
        fn parse(&self, raw: &str) -> std::result::Result<Value, String> {
            Ok(Value::String(raw.to_uppercase()))
        }
    }

    #[test]
    fn test_swapped_converter() {
        let store = Arc::new(MemoryStore::new().with("NAME", "frank"));
        let converter = Arc::new(ConverterRegistry::invariant().register("text", Shouting));
        let source = person_env(&store).with_converter(converter);

        assert_eq!(source.snapshot().unwrap().name, "FRANK");
    }

    #[test]
    fn test_policy_flags() {
        let store = Arc::new(MemoryStore::new());
        let source = person_env(&store).primary(true).required(true).named("env");

        assert!(source.is_primary());
        assert!(source.is_required());
        assert!(!source.is_read_only());
        assert_eq!(ConfigurationSource::<Person>::name(&source), "env");
        assert_eq!(source.kind(), SourceKind::Environment);
    }
}
