//! The `tagtally interrogators` command.

use clap::{Args, Subcommand};
use tagtally_core::Tagger;

use super::Globals;

/// Arguments for the `interrogators` command.
#[derive(Args, Debug)]
pub struct InterrogatorsArgs {
    #[command(subcommand)]
    pub command: Option<InterrogatorsCommand>,
}

#[derive(Subcommand, Debug, Default)]
pub enum InterrogatorsCommand {
    /// List configured interrogators (default)
    #[default]
    List,

    /// Unload every loaded interrogator
    Unload,
}

/// Execute the interrogators command.
pub async fn execute(args: InterrogatorsArgs, globals: &Globals) -> anyhow::Result<()> {
    let tagger = Tagger::new(globals.settings()?.config);

    match args.command.unwrap_or_default() {
        InterrogatorsCommand::List => {
            if tagger.registry().is_empty() {
                println!("No interrogators configured.");
                println!("  Add one under [interrogators] in {}", globals.config_path().display());
                return Ok(());
            }
            for (name, dir) in tagger.config().interrogator_dirs() {
                println!("  {name:<20} {}", dir.display());
            }
        }

        InterrogatorsCommand::Unload => {
            let unloaded = tagger.unload_all();
            tracing::debug!("Unloaded {unloaded} interrogator(s)");
            println!("{unloaded}");
        }
    }

    Ok(())
}
