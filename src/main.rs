use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use smartconf::constants::demo::{APP_SETTINGS_FILE, CONFIG_FILE, ENV_PREFIX};
use smartconf::{
    CommandLineSource, Configuration, ConfigurationManager, ConfigurationSource, DefaultsSource,
    FieldDescriptor, FieldType, FileSource, IntKind, KeyedSource, SchemaBuilder,
};

// =============================================================================
// Sample Configuration
// =============================================================================

/// Configuration assembled by the demo
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct SampleConfig {
    config_file: PathBuf,
    name: String,
    age: u32,
    occupation: String,
}

impl Configuration for SampleConfig {
    fn describe(schema: SchemaBuilder) -> SchemaBuilder {
        schema
            .field(
                FieldDescriptor::new("config_file", FieldType::Path)
                    .long("config")
                    .short('c')
                    .default_value(CONFIG_FILE)
                    .describe("Primary settings file"),
            )
            .field(
                FieldDescriptor::new("name", FieldType::Text)
                    .env()
                    .option()
                    .short('n')
                    .describe("Display name"),
            )
            .field(
                FieldDescriptor::new("age", FieldType::Integer(IntKind::U32))
                    .env()
                    .option(),
            )
            .field(
                FieldDescriptor::new("occupation", FieldType::Text)
                    .env()
                    .setting("Occupation"),
            )
    }
}

impl fmt::Display for SampleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Name: {}, Age: {}, Occupation: {}",
            self.name, self.age, self.occupation
        )
    }
}

// =============================================================================
// CLI
// =============================================================================

#[derive(Parser)]
#[command(name = "smartconf")]
#[command(
    version,
    about = "Merge layered configuration and track changes against the primary settings file"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the merged configuration
    Show {
        #[command(flatten)]
        layers: LayerArgs,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List properties the merged configuration overrides in the primary file
    Changes {
        #[command(flatten)]
        layers: LayerArgs,
    },

    /// Write overridden properties back to the primary file
    Save {
        #[command(flatten)]
        layers: LayerArgs,
    },
}

#[derive(Args)]
struct LayerArgs {
    /// Primary settings file (default: the application's --config option)
    #[arg(long, env = "SMARTCONF_FILE")]
    file: Option<PathBuf>,

    /// Prefix for environment variables
    #[arg(long, default_value = ENV_PREFIX)]
    env_prefix: String,

    /// Read-only application settings
    #[arg(long, default_value = APP_SETTINGS_FILE)]
    app_settings: PathBuf,

    /// Fail instead of ignoring a missing or malformed primary file
    #[arg(long)]
    require_file: bool,

    /// Application arguments, parsed by the command line source
    #[arg(last = true)]
    args: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Toml,
}

// =============================================================================
// Layers
// =============================================================================

struct Layers {
    manager: ConfigurationManager<SampleConfig>,
    file: Arc<FileSource<SampleConfig>>,
}

impl LayerArgs {
    /// Defaults → app settings → primary file → environment → command line
    fn build(&self) -> Layers {
        let command_line = Arc::new(CommandLineSource::<SampleConfig>::new(self.args.clone()));

        // Without --file, the path is the application's own --config option
        let explicit = self.file.clone();
        let resolver = Arc::clone(&command_line);
        let file = Arc::new(
            FileSource::lazy(move || -> smartconf::Result<PathBuf> {
                match &explicit {
                    Some(path) => Ok(path.clone()),
                    None => Ok(resolver.snapshot()?.config_file.clone()),
                }
            })
            .named("settings")
            .primary(true)
            .required(self.require_file),
        );

        let defaults = SampleConfig {
            name: "Anonymous".to_string(),
            ..SampleConfig::default()
        };

        let manager = ConfigurationManager::builder()
            .source(DefaultsSource::new(defaults))
            .source(KeyedSource::settings_file(&self.app_settings))
            .shared_source(file.clone())
            .source(KeyedSource::process_environment().with_prefix(&self.env_prefix))
            .shared_source(command_line)
            .build();

        Layers { manager, file }
    }
}

impl Layers {
    fn announce(&self) {
        match self.file.resolve() {
            Ok((path, format)) => {
                println!("Loading config file from {} ({})", path.display(), format)
            }
            Err(e) => println!("Config file unavailable: {}", e),
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

fn show(layers: &LayerArgs, format: OutputFormat) -> anyhow::Result<()> {
    let layers = layers.build();
    let merged = layers
        .manager
        .merged()
        .context("Failed to merge configuration")?;

    match format {
        OutputFormat::Text => {
            layers.announce();
            println!("{}", merged);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&merged)?),
        OutputFormat::Toml => print!("{}", toml::to_string_pretty(&merged)?),
    }
    Ok(())
}

fn changes(layers: &LayerArgs) -> anyhow::Result<()> {
    let layers = layers.build();
    layers.announce();
    let set = layers
        .manager
        .changes()
        .context("Failed to compute changes")?;

    println!("Properties changed:");
    if set.is_empty() {
        println!("  (none)");
    }
    for (field, change) in &set {
        println!("  {}: {}", field, change);
    }
    Ok(())
}

fn save(layers: &LayerArgs) -> anyhow::Result<()> {
    let layers = layers.build();
    layers.announce();
    let saved = layers
        .manager
        .save_changes()
        .context("Failed to save changes")?;

    if saved.is_empty() {
        println!("Nothing to save");
    } else {
        println!("Saved {} properties:", saved.len());
        for (field, change) in &saved {
            println!("  {}: {}", field, change);
        }
    }
    Ok(())
}

// =============================================================================
// Entry Point
// =============================================================================

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Show { layers, format } => show(&layers, format),
        Commands::Changes { layers } => changes(&layers),
        Commands::Save { layers } => save(&layers),
    }
}
