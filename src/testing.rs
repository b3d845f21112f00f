//! Shared test fixtures

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::schema::{Configuration, FieldDescriptor, FieldType, IntKind, SchemaBuilder};
use crate::source::KeyValueStore;
use crate::types::{Result, SmartConfError};

/// Configuration used across module tests
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub age: u32,
    pub occupation: String,
    pub verbose: bool,
    pub tags: Vec<String>,
    pub nickname: Option<String>,
}

impl Configuration for Person {
    fn describe(schema: SchemaBuilder) -> SchemaBuilder {
        schema
            .field(
                FieldDescriptor::new("name", FieldType::Text)
                    .env()
                    .option()
                    .short('n'),
            )
            .field(
                FieldDescriptor::new("age", FieldType::Integer(IntKind::U32))
                    .env()
                    .option(),
            )
            .field(
                FieldDescriptor::new("occupation", FieldType::Text)
                    .setting("Occupation")
                    .env_var("JOB"),
            )
            .field(FieldDescriptor::new("verbose", FieldType::Bool).option().short('v'))
            .field(
                FieldDescriptor::new("tags", FieldType::list(FieldType::Text))
                    .env()
                    .option(),
            )
            .field(FieldDescriptor::new(
                "nickname",
                FieldType::optional(FieldType::Text),
            ))
    }
}

impl Person {
    pub fn new(name: &str, age: u32) -> Self {
        Self {
            name: name.to_string(),
            age,
            ..Self::default()
        }
    }
}

/// Store whose reads always fail; counts attempts
#[derive(Default)]
pub struct BrokenStore {
    pub reads: AtomicUsize,
}

impl KeyValueStore for BrokenStore {
    fn name(&self) -> &str {
        "broken"
    }

    fn get(&self, _key: &str, _location: Option<&str>) -> Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Err(SmartConfError::store("broken", "backing store offline"))
    }

    fn set(&self, _key: &str, _value: Option<&str>, _location: Option<&str>) -> Result<()> {
        Err(SmartConfError::store("broken", "backing store offline"))
    }
}
