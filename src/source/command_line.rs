//! Command Line Source
//!
//! Builds a clap command from the schema's command line bindings and parses a
//! fixed argument vector. Arguments are transient, so the source is read-only.

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use super::cache::SnapshotCache;
use super::{ConfigurationSource, SourceOptions, SourcePolicy};
use crate::constants::convert::LIST_SEPARATOR;
use crate::constants::names;
use crate::convert::{ValueConverter, convert_field, default_converter};
use crate::schema::{Configuration, FieldDescriptor, FieldType, Schema, SourceKind, schema_of};
use crate::types::{Result, SmartConfError, SourceError, from_record};

pub struct CommandLineSource<T> {
    name: String,
    args: Vec<String>,
    options: SourceOptions,
    converter: Arc<dyn ValueConverter>,
    policy: SourcePolicy,
    cache: SnapshotCache<T>,
}

impl<T: Configuration> CommandLineSource<T> {
    /// Parse `args`, which must not include the program name
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: names::COMMAND_LINE.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            options: SourceOptions::default(),
            converter: default_converter(),
            policy: SourcePolicy::read_only(),
            cache: SnapshotCache::new(),
        }
    }

    /// Arguments of the running process
    pub fn from_env() -> Self {
        Self::new(std::env::args().skip(1))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
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

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Rendered help for the generated command
    pub fn help(&self) -> Result<String> {
        let schema = schema_of::<T>()?;
        Ok(self.command(&schema).render_help().to_string())
    }

    fn command(&self, schema: &Schema) -> Command {
        let mut command = Command::new(self.name.clone())
            .no_binary_name(true)
            .disable_help_flag(true)
            .disable_version_flag(true);

        for field in schema.bound_fields(SourceKind::CommandLine) {
            if let Some(arg) = self.arg_for(field) {
                command = command.arg(arg);
            }
        }
        command
    }

    fn arg_for(&self, field: &FieldDescriptor) -> Option<Arg> {
        let long = self.options.key_for(field, SourceKind::CommandLine)?;
        let binding = field.binding(SourceKind::CommandLine);

        let mut arg = Arg::new(field.name().to_string()).long(long);
        arg = match field.ty() {
            FieldType::Bool => arg.action(ArgAction::SetTrue),
            FieldType::List(_) => arg
                .action(ArgAction::Append)
                .value_parser(value_parser!(String)),
            _ => arg.action(ArgAction::Set).value_parser(value_parser!(String)),
        };
        if let Some(short) = binding.and_then(|b| b.short) {
            arg = arg.short(short);
        }
        if let Some(default) = binding.and_then(|b| b.default_value.clone()) {
            arg = arg.default_value(default);
        }
        if let Some(help) = field.help() {
            arg = arg.help(help.to_string());
        }
        Some(arg)
    }

    /// Raw string for `field`; repeated list options are joined
    fn raw_value(matches: &ArgMatches, field: &FieldDescriptor) -> Option<String> {
        let id = field.name();
        match field.ty() {
            FieldType::Bool => matches
                .try_get_one::<bool>(id)
                .ok()
                .flatten()
                .is_some_and(|set| *set)
                .then(|| "true".to_string()),
            FieldType::List(_) => matches.try_get_many::<String>(id).ok().flatten().map(|values| {
                values
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(&LIST_SEPARATOR.to_string())
            }),
            _ => matches.try_get_one::<String>(id).ok().flatten().cloned(),
        }
    }

    fn compute(&self) -> Result<T> {
        debug!(source = %self.name, args = self.args.len(), "Parsing command line");
        let schema = schema_of::<T>()?;
        let matches = self
            .command(&schema)
            .try_get_matches_from(&self.args)
            .map_err(|e| SourceError::parse(&self.name, e.to_string().trim_end()))?;

        let mut record = schema.zero_record::<T>()?;
        for field in schema.bound_fields(SourceKind::CommandLine) {
            let raw = Self::raw_value(&matches, field);
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
}

impl<T: Configuration> ConfigurationSource<T> for CommandLineSource<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::CommandLine
    }

    fn policy(&self) -> SourcePolicy {
        self.policy
    }

    fn snapshot(&self) -> Result<Arc<T>> {
        self.cache.get_or_try_init(|| self.compute())
    }

    /// The next snapshot re-parses the same arguments
    fn invalidate(&self) {
        self.cache.invalidate();
    }

    fn save(&self, _config: &T) -> Result<()> {
        Err(SmartConfError::unsupported(&self.name, "save"))
    }

    fn partial_save(&self, _config: &T, _fields: &BTreeSet<String>) -> Result<()> {
        Err(SmartConfError::unsupported(&self.name, "partial save"))
    }
}
