//! Schema Descriptor
//!
//! Immutable table of (field identifier, external key binding, field type)
//! built once per configuration type.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::field::FieldType;
use super::naming::KeyTransform;
use crate::types::{Record, Result, SmartConfError, from_record, to_record};

// =============================================================================
// Source Kinds
// =============================================================================

/// Backing store family a binding applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    Defaults,
    File,
    AppSettings,
    Environment,
    CommandLine,
}

impl SourceKind {
    /// Kinds that read every field, not only explicitly bound ones
    pub fn reads_unbound_fields(&self) -> bool {
        matches!(self, Self::Defaults | Self::File | Self::AppSettings)
    }

    /// Naming convention used when a binding has no explicit key
    pub fn default_transform(&self) -> KeyTransform {
        match self {
            Self::Environment => KeyTransform::UpperSnakeCase,
            Self::AppSettings => KeyTransform::CamelCase,
            Self::CommandLine => KeyTransform::KebabCase,
            Self::File | Self::Defaults => KeyTransform::Identity,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defaults => write!(f, "defaults"),
            Self::File => write!(f, "file"),
            Self::AppSettings => write!(f, "app-settings"),
            Self::Environment => write!(f, "environment"),
            Self::CommandLine => write!(f, "command-line"),
        }
    }
}

// =============================================================================
// Field Descriptor
// =============================================================================

/// How a field maps onto one kind of backing store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding {
    /// Explicit external key; derived from the identifier when absent
    pub key: Option<String>,
    /// Location hint (environment target, settings section)
    pub location: Option<String>,
    /// Command line short flag
    pub short: Option<char>,
    /// Command line default value
    pub default_value: Option<String>,
}

/// One schema entry
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    ty: FieldType,
    zero: Option<Value>,
    bindings: BTreeMap<SourceKind, Binding>,
    help: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            zero: None,
            bindings: BTreeMap::new(),
            help: None,
        }
    }

    fn bind(mut self, kind: SourceKind, update: impl FnOnce(&mut Binding)) -> Self {
        update(self.bindings.entry(kind).or_default());
        self
    }

    // -------------------------------------------------------------------------
    // Environment
    // -------------------------------------------------------------------------

    /// Read from the environment under the derived variable name
    pub fn env(self) -> Self {
        self.bind(SourceKind::Environment, |_| {})
    }

    /// Read from the environment under an explicit variable name
    pub fn env_var(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.bind(SourceKind::Environment, |b| b.key = Some(name))
    }

    /// Environment target for this variable
    pub fn env_location(self, location: impl Into<String>) -> Self {
        let location = location.into();
        self.bind(SourceKind::Environment, |b| b.location = Some(location))
    }

    // -------------------------------------------------------------------------
    // App settings
    // -------------------------------------------------------------------------

    /// Explicit app settings key
    pub fn setting(self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.bind(SourceKind::AppSettings, |b| b.key = Some(key))
    }

    /// App settings section holding this key
    pub fn setting_section(self, section: impl Into<String>) -> Self {
        let section = section.into();
        self.bind(SourceKind::AppSettings, |b| b.location = Some(section))
    }

    // -------------------------------------------------------------------------
    // Command line
    // -------------------------------------------------------------------------

    /// Accept `--derived-name` on the command line
    pub fn option(self) -> Self {
        self.bind(SourceKind::CommandLine, |_| {})
    }

    /// Accept `--name` on the command line
    pub fn long(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.bind(SourceKind::CommandLine, |b| b.key = Some(name))
    }

    /// Accept `-c` on the command line
    pub fn short(self, flag: char) -> Self {
        self.bind(SourceKind::CommandLine, |b| b.short = Some(flag))
    }

    /// Value used when the option is not given
    pub fn default_value(self, value: impl Into<String>) -> Self {
        let value = value.into();
        self.bind(SourceKind::CommandLine, |b| b.default_value = Some(value))
    }

    // -------------------------------------------------------------------------
    // Structured file
    // -------------------------------------------------------------------------

    /// Explicit document key in structured files
    pub fn file_key(self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.bind(SourceKind::File, |b| b.key = Some(key))
    }

    /// Value meaning "no opinion" for this field, overriding the type's own
    pub fn zero(mut self, value: impl Into<Value>) -> Self {
        self.zero = Some(value.into());
        self
    }

    /// Help text, shown by command line parsing errors
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    /// Declared zero value, else the field type's
    pub fn zero_value(&self) -> Value {
        match &self.zero {
            Some(zero) => zero.clone(),
            None => self.ty.zero_value(),
        }
    }

    /// Whether `value` says nothing about this field
    pub fn is_zero(&self, value: &Value) -> bool {
        match &self.zero {
            Some(zero) => value.is_null() || value == zero,
            None => self.ty.is_zero(value),
        }
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn binding(&self, kind: SourceKind) -> Option<&Binding> {
        self.bindings.get(&kind)
    }

    /// Whether a source of `kind` reads this field at all
    pub fn is_bound(&self, kind: SourceKind) -> bool {
        self.bindings.contains_key(&kind) || kind.reads_unbound_fields()
    }

    /// Resolve the external key for `kind`.
    ///
    /// An explicit binding name wins verbatim; otherwise `prefix` followed by
    /// the transformed identifier. `None` when the field is not bound.
    pub fn external_key(
        &self,
        kind: SourceKind,
        transform: KeyTransform,
        prefix: &str,
    ) -> Option<String> {
        if !self.is_bound(kind) {
            return None;
        }
        match self.binding(kind).and_then(|b| b.key.as_ref()) {
            Some(explicit) => Some(explicit.clone()),
            None => Some(format!("{}{}", prefix, transform.apply(&self.name))),
        }
    }

    /// Location hint declared on the binding
    pub fn location(&self, kind: SourceKind) -> Option<&str> {
        self.binding(kind).and_then(|b| b.location.as_deref())
    }
}

// =============================================================================
// Schema
// =============================================================================

/// Field table for one configuration type
#[derive(Debug, Clone)]
pub struct Schema {
    type_name: String,
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn builder(type_name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(type_name)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields a source of `kind` reads
    pub fn bound_fields(&self, kind: SourceKind) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(move |f| f.is_bound(kind))
    }

    /// Look up every name, failing on the first unknown one.
    pub fn resolve<'a, I>(&self, names: I) -> Result<Vec<&FieldDescriptor>>
    where
        I: IntoIterator<Item = &'a String>,
    {
        names
            .into_iter()
            .map(|name| {
                self.field(name)
                    .ok_or_else(|| SmartConfError::UnknownField(name.clone()))
            })
            .collect()
    }

    /// Record of `T::default()` with every schema field set to its zero value
    pub fn zero_record<T: Serialize + Default>(&self) -> Result<Record> {
        let mut record = to_record(&T::default())?;
        for field in &self.fields {
            record.insert(field.name.clone(), field.zero_value());
        }
        Ok(record)
    }

    /// Custom types have no intrinsic zero; take it from the type's default
    /// record unless the field declares one.
    pub(super) fn adopt_default_zeros(mut self, defaults: &Record) -> Self {
        for field in &mut self.fields {
            if field.zero.is_none()
                && matches!(field.ty, FieldType::Custom(_))
                && let Some(value) = defaults.get(&field.name)
            {
                field.zero = Some(value.clone());
            }
        }
        self
    }

    /// The zero-valued configuration
    pub fn zeroed<T: Serialize + DeserializeOwned + Default>(&self) -> Result<T> {
        from_record(self.zero_record::<T>()?)
    }
}

/// Collects field descriptors and validates them into a [`Schema`]
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    type_name: String,
    fields: Vec<FieldDescriptor>,
}

impl SchemaBuilder {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Validate identifiers are unique and non-empty
    pub fn build(self) -> Result<Schema> {
        let mut index = HashMap::with_capacity(self.fields.len());
        for (i, field) in self.fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(SmartConfError::schema(
                    &self.type_name,
                    format!("field #{} has an empty identifier", i),
                ));
            }
            if index.insert(field.name.clone(), i).is_some() {
                return Err(SmartConfError::schema(
                    &self.type_name,
                    format!("field '{}' is declared twice", field.name),
                ));
            }
        }
        Ok(Schema {
            type_name: self.type_name,
            fields: self.fields,
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::IntKind;
    use serde::Deserialize;
    use serde_json::json;

    fn person_schema() -> Schema {
        Schema::builder("Person")
            .field(FieldDescriptor::new("name", FieldType::Text).env().option().short('n'))
            .field(FieldDescriptor::new("age", FieldType::Integer(IntKind::U32)).env())
            .field(
                FieldDescriptor::new("occupation", FieldType::Text)
                    .setting("Occupation")
                    .env_var("JOB")
                    .env_location("user"),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = Schema::builder("Dup")
            .field(FieldDescriptor::new("a", FieldType::Text))
            .field(FieldDescriptor::new("a", FieldType::Bool))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_empty_identifier_rejected() {
        let result = Schema::builder("Empty")
            .field(FieldDescriptor::new("", FieldType::Text))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_external_key_derivation() {
        let schema = person_schema();
        let name = schema.field("name").unwrap();
        let occupation = schema.field("occupation").unwrap();

        assert_eq!(
            name.external_key(SourceKind::Environment, KeyTransform::UpperSnakeCase, ""),
            Some("NAME".to_string())
        );
        assert_eq!(
            name.external_key(SourceKind::Environment, KeyTransform::UpperSnakeCase, "APP_"),
            Some("APP_NAME".to_string())
        );
        // Explicit names ignore transform and prefix
        assert_eq!(
            occupation.external_key(SourceKind::Environment, KeyTransform::CamelCase, "APP_"),
            Some("JOB".to_string())
        );
        assert_eq!(
            occupation.external_key(SourceKind::AppSettings, KeyTransform::CamelCase, ""),
            Some("Occupation".to_string())
        );
        assert_eq!(occupation.location(SourceKind::Environment), Some("user"));
    }

    #[test]
    fn test_unbound_fields() {
        let schema = person_schema();
        let age = schema.field("age").unwrap();

        // Command line only reads explicitly bound fields
        assert_eq!(
            age.external_key(SourceKind::CommandLine, KeyTransform::KebabCase, ""),
            None
        );
        // App settings read every field
        assert_eq!(
            age.external_key(SourceKind::AppSettings, KeyTransform::CamelCase, ""),
            Some("age".to_string())
        );

        let cli: Vec<_> = schema
            .bound_fields(SourceKind::CommandLine)
            .map(|f| f.name())
            .collect();
        assert_eq!(cli, vec!["name"]);
        assert_eq!(schema.bound_fields(SourceKind::File).count(), 3);
    }

    #[test]
    fn test_cli_binding_details() {
        let field = FieldDescriptor::new("config_file", FieldType::Path)
            .long("config")
            .short('c')
            .default_value("settings1.toml")
            .describe("Settings file");
        let binding = field.binding(SourceKind::CommandLine).unwrap();

        assert_eq!(binding.key.as_deref(), Some("config"));
        assert_eq!(binding.short, Some('c'));
        assert_eq!(binding.default_value.as_deref(), Some("settings1.toml"));
        assert_eq!(field.help(), Some("Settings file"));
    }

    #[test]
    fn test_resolve_unknown_field() {
        let schema = person_schema();
        let names = vec!["name".to_string(), "salary".to_string()];
        let err = schema.resolve(&names).unwrap_err();
        assert!(matches!(err, SmartConfError::UnknownField(ref f) if f == "salary"));
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Person {
        name: String,
        age: u32,
        occupation: String,
        unmanaged: u8,
    }

    impl Default for Person {
        fn default() -> Self {
            Self {
                name: "nobody".into(),
                age: 99,
                occupation: "none".into(),
                unmanaged: 7,
            }
        }
    }

    #[test]
    fn test_zeroed_overrides_schema_fields_only() {
        let schema = person_schema();
        let record = schema.zero_record::<Person>().unwrap();
        assert_eq!(record["name"], json!(""));
        assert_eq!(record["age"], json!(0));
        assert_eq!(record["unmanaged"], json!(7));

        let zeroed: Person = schema.zeroed().unwrap();
        assert_eq!(zeroed.age, 0);
        assert_eq!(zeroed.unmanaged, 7);
    }

    #[test]
    fn test_custom_zero_values() {
        let defaults = to_record(&json!({ "timeout": 30, "retries": 3 })).unwrap();
        let schema = Schema::builder("Timeouts")
            .field(FieldDescriptor::new("timeout", FieldType::custom("seconds")))
            .field(FieldDescriptor::new("retries", FieldType::custom("count")).zero(-1))
            .build()
            .unwrap()
            .adopt_default_zeros(&defaults);

        let timeout = schema.field("timeout").unwrap();
        assert_eq!(timeout.zero_value(), json!(30));
        assert!(timeout.is_zero(&json!(30)));
        assert!(timeout.is_zero(&Value::Null));
        assert!(!timeout.is_zero(&json!(45)));

        // Declared zeros are kept
        let retries = schema.field("retries").unwrap();
        assert_eq!(retries.zero_value(), json!(-1));
        assert!(!retries.is_zero(&json!(3)));
    }
}
