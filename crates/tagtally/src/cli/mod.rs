//! Command implementations and the settings they share.

pub mod batch;
pub mod config;
pub mod interrogate;
pub mod interrogators;
pub mod options;
pub mod preset;

use std::path::{Path, PathBuf};

use tagtally_core::{Config, JsonPresetStore, PresetStore, Tagger};

/// Global options that affect how settings are assembled.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    /// Explicit config file
    pub config: Option<PathBuf>,
    /// Preset applied on top of the config file
    pub preset: Option<String>,
}

/// Effective settings: config file, then preset.
pub struct Settings {
    pub config: Config,
    /// Interrogator named by the preset, if any
    pub interrogator: Option<String>,
}

impl Globals {
    /// Path of the config file in use.
    pub fn config_path(&self) -> PathBuf {
        match &self.config {
            Some(path) => expand(path),
            None => Config::default_path(),
        }
    }

    /// Load the config file. A missing default file means defaults; a
    /// missing explicit file is an error.
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let config = match &self.config {
            Some(path) => Config::load_from(&expand(path))?,
            None => Config::load()?,
        };
        Ok(config)
    }

    /// Load the config and apply the selected preset.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut config = self.load_config()?;
        let mut interrogator = None;
        if let Some(name) = &self.preset {
            let store = JsonPresetStore::new(config.preset_dir());
            let preset = store.load(name)?;
            tracing::debug!("Applying preset '{name}'");
            preset.apply_to(&mut config);
            interrogator = preset.interrogator;
        }
        Ok(Settings {
            config,
            interrogator,
        })
    }

    /// Pick the interrogator for a run: the command line, then the preset,
    /// then the only registered one.
    pub fn pick_interrogator(
        &self,
        tagger: &Tagger,
        requested: Option<&str>,
        from_preset: Option<&str>,
    ) -> anyhow::Result<String> {
        if let Some(name) = requested.or(from_preset) {
            return Ok(name.to_string());
        }

        let names: Vec<&str> = tagger.registry().names().collect();
        match names.as_slice() {
            [only] => Ok(only.to_string()),
            [] => anyhow::bail!(
                "No interrogators configured.\n\n  \
                 Hint: Add one under [interrogators] in {}",
                self.config_path().display()
            ),
            many => anyhow::bail!(
                "Several interrogators are configured ({}); choose one with --interrogator",
                many.join(", ")
            ),
        }
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}
