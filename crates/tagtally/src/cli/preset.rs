//! The `tagtally preset` command: named snapshots of tagging settings.

use clap::{Args, Subcommand};
use tagtally_core::{JsonPresetStore, Preset, PresetStore};

use super::options::{BatchFlags, PostprocessFlags};
use super::Globals;

/// Arguments for the `preset` command.
#[derive(Args, Debug)]
pub struct PresetArgs {
    #[command(subcommand)]
    pub command: PresetCommand,
}

#[derive(Subcommand, Debug)]
pub enum PresetCommand {
    /// List saved presets
    List,

    /// Print a preset as JSON
    Show {
        /// Preset name
        name: String,
    },

    /// Save the effective settings, plus any flags given, as a preset
    Save {
        /// Preset name
        name: String,

        /// Interrogator to remember with the preset
        #[arg(short, long)]
        interrogator: Option<String>,

        #[command(flatten)]
        batch: BatchFlags,

        #[command(flatten)]
        postprocess: PostprocessFlags,
    },
}

/// Execute the preset command.
pub async fn execute(args: PresetArgs, globals: &Globals) -> anyhow::Result<()> {
    let settings = globals.settings()?;
    let store = JsonPresetStore::new(settings.config.preset_dir());

    match args.command {
        PresetCommand::List => {
            for name in store.list()? {
                println!("{name}");
            }
        }

        PresetCommand::Show { name } => {
            let preset = store.load(&name)?;
            println!("{}", serde_json::to_string_pretty(&preset)?);
        }

        PresetCommand::Save {
            name,
            interrogator,
            batch,
            postprocess,
        } => {
            postprocess.validate()?;
            let mut config = settings.config;
            postprocess.apply(&mut config.postprocess);
            batch.apply(&mut config.batch);

            let preset = Preset::from_config(&config, interrogator.or(settings.interrogator));
            let path = store.save(&name, &preset)?;
            tracing::info!("Preset saved to {}", path.display());
            println!("{}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagtally_core::ConflictPolicy;

    #[tokio::test]
    async fn test_save_snapshots_flags() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        let preset_dir = dir.path().join("presets");
        std::fs::write(
            &config_path,
            format!("[general]\npreset_dir = {:?}\n", preset_dir.display().to_string()),
        )
        .unwrap();
        let globals = Globals {
            config: Some(config_path),
            preset: None,
        };

        let args = PresetArgs {
            command: PresetCommand::Save {
                name: "weighted".into(),
                interrogator: Some("dumps".into()),
                batch: BatchFlags {
                    on_conflict: Some(ConflictPolicy::Append),
                    ..Default::default()
                },
                postprocess: PostprocessFlags {
                    annotate_weight: true,
                    ..Default::default()
                },
            },
        };
        execute(args, &globals).await.unwrap();

        let preset = JsonPresetStore::new(&preset_dir).load("weighted").unwrap();
        assert_eq!(preset.interrogator.as_deref(), Some("dumps"));
        assert_eq!(preset.batch.conflict_policy, ConflictPolicy::Append);
        assert!(preset.postprocess.annotate_weight);
    }
}
