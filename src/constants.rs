//! Global Constants
//!
//! Centralized constants for key naming, conversion and file handling.

/// Value conversion constants
pub mod convert {
    /// Separator for list-typed values in flat stores
    pub const LIST_SEPARATOR: char = ',';

    /// Quote for list items holding the separator or edge whitespace
    pub const LIST_QUOTE: char = '"';

    /// Accepted spellings for `true` (compared case-insensitively)
    pub const TRUE_WORDS: &[&str] = &["true", "1", "yes", "on"];

    /// Accepted spellings for `false` (compared case-insensitively)
    pub const FALSE_WORDS: &[&str] = &["false", "0", "no", "off"];

    /// Prefix for hexadecimal integers
    pub const HEX_PREFIX: &str = "0x";
}

/// Environment store constants
pub mod env {
    /// The only location hint the process environment understands
    pub const PROCESS_LOCATION: &str = "process";
}

/// Default source names used in logs and errors
pub mod names {
    pub const ENVIRONMENT: &str = "environment";
    pub const APP_SETTINGS: &str = "app-settings";
    pub const COMMAND_LINE: &str = "command-line";
    pub const DEFAULTS: &str = "defaults";
}

/// Structured file constants
pub mod files {
    /// Extensions read as TOML
    pub const TOML_EXTENSIONS: &[&str] = &["toml"];

    /// Extensions read as JSON
    pub const JSON_EXTENSIONS: &[&str] = &["json"];
}

/// Demo binary defaults
pub mod demo {
    /// Environment prefix for the demo configuration
    pub const ENV_PREFIX: &str = "SMARTCONF_";

    /// Primary settings file when none is given
    pub const CONFIG_FILE: &str = "settings.toml";

    /// Optional read-only app settings
    pub const APP_SETTINGS_FILE: &str = "appsettings.toml";
}
