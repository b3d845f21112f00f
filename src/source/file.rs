//! Structured File Source
//!
//! TOML or JSON documents, read through figment and written back with the
//! format's own serializer. Keys the schema does not manage are preserved.

use figment::{
    Figment,
    providers::{Format, Json, Toml},
};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use super::cache::SnapshotCache;
use super::{ConfigurationSource, SourceOptions, SourcePolicy};
use crate::constants::files::{JSON_EXTENSIONS, TOML_EXTENSIONS};
use crate::convert::{
    ValueConverter, convert_field, default_converter, render_scalar, settle,
};
use crate::schema::{Configuration, FieldDescriptor, FieldType, SourceKind, schema_of};
use crate::types::{
    ConversionError, Record, Result, ResultExt, SmartConfError, SourceError, from_record,
    to_record,
};

// =============================================================================
// File Format
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Toml,
    Json,
}

impl FileFormat {
    /// Infer the format from the file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        if TOML_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Toml)
        } else if JSON_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Json)
        } else {
            None
        }
    }

    fn read(&self, path: &Path) -> std::result::Result<Record, figment::Error> {
        let figment = match self {
            Self::Toml => Figment::from(Toml::file(path)),
            Self::Json => Figment::from(Json::file(path)),
        };
        figment.extract()
    }

    fn render(&self, document: &Record) -> std::result::Result<String, String> {
        match self {
            Self::Toml => toml::to_string_pretty(document).map_err(|e| e.to_string()),
            Self::Json => serde_json::to_string_pretty(document)
                .map(|mut text| {
                    text.push('\n');
                    text
                })
                .map_err(|e| e.to_string()),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Toml => write!(f, "toml"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown file format: {}. Valid values: toml, json", s)),
        }
    }
}

// =============================================================================
// File Source
// =============================================================================

type PathResolver = Arc<dyn Fn() -> Result<PathBuf> + Send + Sync>;

pub struct FileSource<T> {
    name: String,
    path: PathResolver,
    format: Option<FileFormat>,
    options: SourceOptions,
    converter: Arc<dyn ValueConverter>,
    policy: SourcePolicy,
    cache: SnapshotCache<T>,
}

impl<T: Configuration> FileSource<T> {
    /// Source over a fixed path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self::with_resolver(name, Arc::new(move || -> Result<PathBuf> { Ok(path.clone()) }))
    }

    /// Source whose path is resolved on every snapshot computation and save
    pub fn lazy<F>(resolve: F) -> Self
    where
        F: Fn() -> Result<PathBuf> + Send + Sync + 'static,
    {
        Self::with_resolver("file".to_string(), Arc::new(resolve))
    }

    fn with_resolver(name: String, path: PathResolver) -> Self {
        Self {
            name,
            path,
            format: None,
            options: SourceOptions::default(),
            converter: default_converter(),
            policy: SourcePolicy::writable(),
            cache: SnapshotCache::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Fix the format instead of inferring it from the extension
    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_options(mut self, options: SourceOptions) -> Self {
        self.options = options;
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

    /// Current path and format
    pub fn resolve(&self) -> Result<(PathBuf, FileFormat)> {
        let path = (self.path)()?;
        let format = match self.format.or_else(|| FileFormat::from_path(&path)) {
            Some(format) => format,
            None => {
                return Err(SourceError::unavailable(
                    &self.name,
                    format!("cannot infer a file format for '{}'", path.display()),
                )
                .into());
            }
        };
        Ok((path, format))
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Typed value for one document entry. Strings and custom types go
    /// through the converter; other values must already fit the field type.
    fn field_value(
        &self,
        field: &FieldDescriptor,
        raw: &Value,
    ) -> std::result::Result<Option<Value>, ConversionError> {
        let mode = self.options.conversion_mode;
        match (raw, field.ty()) {
            (Value::Null, _) => Ok(Some(field.zero_value())),
            (Value::String(s), _) => convert_field(self.converter.as_ref(), Some(s), field, mode),
            (other, FieldType::Custom(_)) => convert_field(
                self.converter.as_ref(),
                render_scalar(other).as_deref(),
                field,
                mode,
            ),
            (other, ty) => {
                let checked = ty.check(other).map(|()| other.clone()).map_err(|message| {
                    ConversionError::new(field.name(), other.to_string(), ty.to_string(), message)
                });
                settle(checked, field, mode)
            }
        }
    }

    fn compute(&self) -> Result<T> {
        let (path, format) = self.resolve()?;
        debug!(source = %self.name, path = %path.display(), %format, "Reading configuration file");

        if !path.exists() {
            return Err(SourceError::unavailable(
                &self.name,
                format!("file not found: {}", path.display()),
            )
            .into());
        }
        let document = format
            .read(&path)
            .map_err(|e| SourceError::parse(&self.name, e.to_string()))?;

        let schema = schema_of::<T>()?;
        let mut record = schema.zero_record::<T>()?;
        for field in schema.bound_fields(SourceKind::File) {
            let Some(key) = self.options.key_for(field, SourceKind::File) else {
                continue;
            };
            let Some(raw) = document.get(&key) else {
                continue;
            };
            match self.field_value(field, raw) {
                Ok(Some(value)) => {
                    record.insert(field.name().to_string(), value);
                }
                Ok(None) => {}
                Err(err) => return Err(SourceError::conversion(&self.name, err).into()),
            }
        }

        from_record(record).map_err(|e| SourceError::parse(&self.name, e.to_string()).into())
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Existing document, or an empty one when the file does not exist yet
    fn load_document(&self, path: &Path, format: FileFormat) -> Result<Record> {
        if !path.exists() {
            return Ok(Record::new());
        }
        let text = fs::read_to_string(path)
            .write_context_fn(&self.name, || format!("reading {}", path.display()))?;
        match format {
            FileFormat::Toml => {
                let table: toml::Table = toml::from_str(&text)
                    .write_context_fn(&self.name, || "existing document is not valid TOML")?;
                to_record(&table)
            }
            FileFormat::Json => serde_json::from_str(&text)
                .write_context_fn(&self.name, || "existing document is not valid JSON"),
        }
    }

    fn write(&self, config: &T, fields: Vec<&FieldDescriptor>) -> Result<()> {
        let (path, format) = self.resolve()?;
        let values = to_record(config)?;
        let mut document = self.load_document(&path, format)?;

        for field in &fields {
            let Some(key) = self.options.key_for(field, SourceKind::File) else {
                debug!(source = %self.name, field = field.name(), "Field not bound here, skipping");
                continue;
            };
            match values.get(field.name()) {
                // TOML has no null; an unset optional is an absent key
                None | Some(Value::Null) => {
                    document.remove(&key);
                }
                Some(value) => {
                    document.insert(key, value.clone());
                }
            }
        }

        let text = format
            .render(&document)
            .map_err(|e| SmartConfError::write(&self.name, e))?;
        fs::write(&path, text)
            .write_context_fn(&self.name, || format!("writing {}", path.display()))?;

        info!(source = %self.name, path = %path.display(), fields = fields.len(), "Saved configuration");
        Ok(())
    }
}

impl<T: Configuration> ConfigurationSource<T> for FileSource<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    fn policy(&self) -> SourcePolicy {
        self.policy
    }

    fn snapshot(&self) -> Result<Arc<T>> {
        self.cache.get_or_try_init(|| self.compute())
    }

    fn invalidate(&self) {
        self.cache.invalidate();
    }

    fn save(&self, config: &T) -> Result<()> {
        let schema = schema_of::<T>()?;
        self.write(config, schema.bound_fields(SourceKind::File).collect())
    }

    fn partial_save(&self, config: &T, fields: &BTreeSet<String>) -> Result<()> {
        let schema = schema_of::<T>()?;
        let targets = schema.resolve(fields)?;
        self.write(config, targets)
    }
}
