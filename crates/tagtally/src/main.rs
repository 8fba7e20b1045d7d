//! Tagtally CLI - tag post-processing and caption aggregation for image
//! classifier output.
//!
//! Tagtally turns per-label classifier confidences into clean captions, and
//! lets repeated batch runs over the same targets accumulate evidence.
//!
//! # Usage
//!
//! ```bash
//! # Tag a single image
//! tagtally interrogate cat.png --interrogator dumps
//!
//! # Tag a directory, averaging into existing weighted captions
//! tagtally batch ./images --on-conflict append --annotate-weight
//!
//! # View configuration
//! tagtally config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// Tagtally - tag post-processing and caption aggregation.
#[derive(Parser, Debug)]
#[command(name = "tagtally")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "TAGTALLY_CONFIG")]
    config: Option<PathBuf>,

    /// Stored preset to apply before command-line options
    #[arg(long, global = true)]
    preset: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Interrogate a single image and print its tags
    Interrogate(cli::interrogate::InterrogateArgs),

    /// Tag every image in a directory, writing one caption file per image
    Batch(cli::batch::BatchArgs),

    /// List or unload interrogators
    Interrogators(cli::interrogators::InterrogatorsArgs),

    /// Manage stored presets
    Preset(cli::preset::PresetArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let globals = cli::Globals {
        config: cli.config,
        preset: cli.preset,
    };

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match globals.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `tagtally config path`."
            );
            tagtally_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Tagtally v{}", tagtally_core::VERSION);

    match cli.command {
        Commands::Interrogate(args) => cli::interrogate::execute(args, &globals).await,
        Commands::Batch(args) => cli::batch::execute(args, &globals).await,
        Commands::Interrogators(args) => cli::interrogators::execute(args, &globals).await,
        Commands::Preset(args) => cli::preset::execute(args, &globals).await,
        Commands::Config(args) => cli::config::execute(args, &globals).await,
    }
}
