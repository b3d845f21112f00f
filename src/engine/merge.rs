//! Merge Engine
//!
//! Folds source snapshots into one configuration. Sources are given in
//! ascending precedence; a field's zero value means the source is silent
//! about it, so only non-zero values overwrite what earlier sources set.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::schema::{Configuration, Schema, schema_of};
use crate::source::ConfigurationSource;
use crate::types::{Record, Result, from_record, to_record};

/// Snapshot of `source` under its required policy.
///
/// `Ok(None)` means a non-required source failed and contributes nothing.
pub fn resolve_snapshot<T: Configuration>(
    source: &dyn ConfigurationSource<T>,
) -> Result<Option<Arc<T>>> {
    match source.snapshot() {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(err) if source.is_required() => Err(err),
        Err(err) => {
            warn!(source = source.name(), error = %err, "Ignoring failed optional source");
            Ok(None)
        }
    }
}

/// Copy every non-zero schema field of `snapshot` onto `target`.
///
/// Returns the number of fields written.
pub fn overlay(schema: &Schema, target: &mut Record, snapshot: &Record) -> usize {
    let mut applied = 0;
    for field in schema.fields() {
        if let Some(value) = snapshot.get(field.name())
            && !field.is_zero(value)
        {
            target.insert(field.name().to_string(), value.clone());
            applied += 1;
        }
    }
    applied
}

/// Merge `sources`, later ones taking precedence.
///
/// Fails only when a required source fails; the error is the source's own.
pub fn merge<'a, T, I>(sources: I) -> Result<T>
where
    T: Configuration,
    I: IntoIterator<Item = &'a dyn ConfigurationSource<T>>,
{
    let schema = schema_of::<T>()?;
    let mut merged = schema.zero_record::<T>()?;

    for source in sources {
        let Some(snapshot) = resolve_snapshot(source)? else {
            continue;
        };
        let record = to_record(snapshot.as_ref())?;
        let applied = overlay(&schema, &mut merged, &record);
        debug!(source = source.name(), fields = applied, "Merged snapshot");
    }

    from_record(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{ConverterRegistry, TypeConverter};
    use crate::schema::{FieldDescriptor, FieldType, SchemaBuilder};
    use crate::source::{DefaultsSource, KeyedSource, MemoryStore};
    use crate::testing::{BrokenStore, Person};
    use crate::types::SourceFailure;
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    fn fixed(name: &str, age: u32) -> DefaultsSource<Person> {
        DefaultsSource::new(Person::new(name, age))
    }

    fn broken(required: bool) -> KeyedSource<Person> {
        KeyedSource::environment(Arc::new(BrokenStore::default())).required(required)
    }

    #[test]
    fn test_silent_source_changes_nothing() {
        let primary = fixed("Frank", 43).primary(true);
        let silent = fixed("", 0);

        let merged: Person = merge([
            &primary as &dyn ConfigurationSource<Person>,
            &silent as &dyn ConfigurationSource<Person>,
        ])
        .unwrap();
        assert_eq!(merged, Person::new("Frank", 43));
    }

    #[test]
    fn test_later_non_zero_field_wins() {
        let primary = fixed("Frank", 43).primary(true);
        let override_name = fixed("Richard", 0);

        let merged: Person = merge([
            &primary as &dyn ConfigurationSource<Person>,
            &override_name as &dyn ConfigurationSource<Person>,
        ])
        .unwrap();
        assert_eq!(merged, Person::new("Richard", 43));
    }

    #[test]
    fn test_required_failure_aborts() {
        let base = fixed("Frank", 43);
        let failing = broken(true);

        let err = merge([
            &base as &dyn ConfigurationSource<Person>,
            &failing as &dyn ConfigurationSource<Person>,
        ])
        .unwrap_err();
        assert_eq!(
            err.as_source_error().unwrap().failure,
            SourceFailure::Unavailable
        );
    }

    #[test]
    fn test_optional_failure_is_silent() {
        let base = fixed("Frank", 43);
        let failing = broken(false);

        let merged: Person = merge([
            &base as &dyn ConfigurationSource<Person>,
            &failing as &dyn ConfigurationSource<Person>,
        ])
        .unwrap();
        assert_eq!(merged, Person::new("Frank", 43));
    }

    #[test]
    fn test_empty_source_list_is_zeroed() {
        let merged: Person = merge(std::iter::empty()).unwrap();
        assert_eq!(merged, Person::default());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let store = Arc::new(MemoryStore::new().with("NAME", "Frank").with("AGE", "43"));
        let env: KeyedSource<Person> = KeyedSource::environment(store);
        let cli = fixed("", 50);
        let sources = [
            &env as &dyn ConfigurationSource<Person>,
            &cli as &dyn ConfigurationSource<Person>,
        ];

        let first: Person = merge(sources).unwrap();
        let second: Person = merge(sources).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, Person::new("Frank", 50));
    }

    #[test]
    fn test_list_and_optional_fields() {
        let mut base = Person::new("Frank", 43);
        base.tags = vec!["a".into()];
        base.nickname = Some("Frankie".into());
        let base = DefaultsSource::new(base);

        let top = DefaultsSource::new(Person {
            tags: vec!["b".into()],
            ..Person::default()
        });

        let merged: Person = merge([
            &base as &dyn ConfigurationSource<Person>,
            &top as &dyn ConfigurationSource<Person>,
        ])
        .unwrap();
        assert_eq!(merged.tags, vec!["b"]);
        assert_eq!(merged.nickname.as_deref(), Some("Frankie"));
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Timeouts {
        timeout: u64,
        label: String,
    }

    impl Configuration for Timeouts {
        fn describe(schema: SchemaBuilder) -> SchemaBuilder {
            schema
                .field(FieldDescriptor::new("timeout", FieldType::custom("seconds")).env())
                .field(FieldDescriptor::new("label", FieldType::Text).env())
        }
    }

    struct Seconds;

    impl TypeConverter for Seconds {
        fn parse(&self, raw: &str) -> std::result::Result<Value, String> {
            raw.trim()
                .trim_end_matches('s')
                .parse::<u64>()
                .map(Value::from)
                .map_err(|e| e.to_string())
        }
    }

    fn timeouts_env(store: MemoryStore) -> KeyedSource<Timeouts> {
        let registry = ConverterRegistry::invariant().register("seconds", Seconds);
        KeyedSource::environment(Arc::new(store)).with_converter(Arc::new(registry))
    }

    #[test]
    fn test_custom_field_zero_comes_from_default() {
        let base = DefaultsSource::new(Timeouts {
            timeout: 30,
            label: String::new(),
        });

        // Absent key reads as the default value, not null
        let env = timeouts_env(MemoryStore::new().with("LABEL", "api"));
        assert_eq!(env.snapshot().unwrap().timeout, 0);

        let merged: Timeouts = merge([
            &base as &dyn ConfigurationSource<Timeouts>,
            &env as &dyn ConfigurationSource<Timeouts>,
        ])
        .unwrap();
        assert_eq!(merged.timeout, 30);
        assert_eq!(merged.label, "api");

        let silent = DefaultsSource::<Timeouts>::default();
        let merged: Timeouts = merge([
            &base as &dyn ConfigurationSource<Timeouts>,
            &silent as &dyn ConfigurationSource<Timeouts>,
        ])
        .unwrap();
        assert_eq!(merged.timeout, 30);

        let set = timeouts_env(MemoryStore::new().with("TIMEOUT", "45s"));
        let merged: Timeouts = merge([
            &base as &dyn ConfigurationSource<Timeouts>,
            &set as &dyn ConfigurationSource<Timeouts>,
        ])
        .unwrap();
        assert_eq!(merged.timeout, 45);

        let empty: Timeouts = merge(std::iter::empty()).unwrap();
        assert_eq!(empty, Timeouts::default());
    }

    mod properties {
        use super::*;

        fn person_strategy() -> impl Strategy<Value = Person> {
            ("[a-z]{0,3}", 0u32..4, any::<bool>())
                .prop_map(|(name, age, verbose)| Person {
                    verbose,
                    ..Person::new(&name, age)
                })
        }

        proptest! {
            /// Later non-zero fields win; zero fields fall through
            #[test]
            fn precedence_and_passthrough(a in person_strategy(), b in person_strategy()) {
                let first = DefaultsSource::new(a.clone());
                let second = DefaultsSource::new(b.clone());

                let merged: Person = merge([
                    &first as &dyn ConfigurationSource<Person>,
                    &second as &dyn ConfigurationSource<Person>,
                ])
                .unwrap();

                let name = if b.name.is_empty() { &a.name } else { &b.name };
                let age = if b.age == 0 { a.age } else { b.age };
                prop_assert_eq!(&merged.name, name);
                prop_assert_eq!(merged.age, age);
                prop_assert_eq!(merged.verbose, a.verbose || b.verbose);
            }

            /// An optional failing source never changes the result
            #[test]
            fn optional_failure_is_neutral(a in person_strategy()) {
                let only = DefaultsSource::new(a.clone());
                let failing = broken(false);

                let merged: Person = merge([
                    &only as &dyn ConfigurationSource<Person>,
                    &failing as &dyn ConfigurationSource<Person>,
                ])
                .unwrap();
                prop_assert_eq!(merged, a);
            }
        }
    }
}
