//! Key Naming
//!
//! Derives an external key from a field identifier when the field declares no
//! explicit name for a source.

use heck::{ToKebabCase, ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Naming convention applied to field identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyTransform {
    /// Field identifier as-is
    #[default]
    Identity,
    /// `CONFIG_FILE` (environment default)
    UpperSnakeCase,
    /// `configFile` (app settings default)
    CamelCase,
    /// `ConfigFile`
    PascalCase,
    /// `config-file` (command line default)
    KebabCase,
    /// `config_file`
    SnakeCase,
    /// `config.file`
    DottedCase,
}

impl KeyTransform {
    pub fn apply(&self, name: &str) -> String {
        match self {
            Self::Identity => name.to_string(),
            Self::UpperSnakeCase => name.to_shouty_snake_case(),
            Self::CamelCase => name.to_lower_camel_case(),
            Self::PascalCase => name.to_upper_camel_case(),
            Self::KebabCase => name.to_kebab_case(),
            Self::SnakeCase => name.to_snake_case(),
            Self::DottedCase => name.to_snake_case().replace('_', "."),
        }
    }
}

impl fmt::Display for KeyTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => write!(f, "identity"),
            Self::UpperSnakeCase => write!(f, "upper_snake_case"),
            Self::CamelCase => write!(f, "camel_case"),
            Self::PascalCase => write!(f, "pascal_case"),
            Self::KebabCase => write!(f, "kebab_case"),
            Self::SnakeCase => write!(f, "snake_case"),
            Self::DottedCase => write!(f, "dotted_case"),
        }
    }
}

impl FromStr for KeyTransform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "identity" => Ok(Self::Identity),
            "upper_snake_case" | "upper" => Ok(Self::UpperSnakeCase),
            "camel_case" | "camel" => Ok(Self::CamelCase),
            "pascal_case" | "pascal" => Ok(Self::PascalCase),
            "kebab_case" | "kebab" => Ok(Self::KebabCase),
            "snake_case" | "snake" => Ok(Self::SnakeCase),
            "dotted_case" | "dotted" => Ok(Self::DottedCase),
            _ => Err(format!(
                "Unknown key transform: {}. Valid values: identity, upper, camel, pascal, kebab, snake, dotted",
                s
            )),
        }
    }
}
