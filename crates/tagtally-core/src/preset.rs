//! Named presets: stored post-processing and batch settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{BatchOptions, Config, PostprocessConfig};
use crate::error::Result;

/// Preset used when none is named.
pub const DEFAULT_PRESET: &str = "default.json";

/// A stored set of options applied on top of the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    /// Interrogator to use when the command line names none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrogator: Option<String>,

    pub postprocess: PostprocessConfig,

    pub batch: BatchOptions,
}

impl Preset {
    /// Snapshot the preset-able parts of a config.
    pub fn from_config(config: &Config, interrogator: Option<String>) -> Self {
        Self {
            interrogator,
            postprocess: config.postprocess.clone(),
            batch: config.batch.clone(),
        }
    }

    /// Overwrite the preset-able parts of a config.
    pub fn apply_to(&self, config: &mut Config) {
        config.postprocess = self.postprocess.clone();
        config.batch = self.batch.clone();
    }
}

/// Storage for presets.
pub trait PresetStore {
    /// Stored preset file names. Never empty.
    fn list(&self) -> Result<Vec<String>>;

    /// Load a preset. A preset that does not exist yields defaults.
    fn load(&self, name: &str) -> Result<Preset>;

    /// Store a preset, returning where it went.
    fn save(&self, name: &str, preset: &Preset) -> Result<PathBuf>;
}

/// Presets as pretty JSON files in one directory.
#[derive(Debug, Clone)]
pub struct JsonPresetStore {
    dir: PathBuf,
}

impl JsonPresetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a preset after name sanitization.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(sanitize(name))
    }
}

impl PresetStore for JsonPresetStore {
    fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| name.ends_with(".json"))
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => vec![],
            Err(e) => return Err(e.into()),
        };
        if names.is_empty() {
            names.push(DEFAULT_PRESET.to_string());
        }
        names.sort();
        Ok(names)
    }

    fn load(&self, name: &str) -> Result<Preset> {
        let path = self.path_for(name);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Preset {path:?} not found, using defaults");
                Ok(Preset::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, name: &str, preset: &Preset) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(name);
        std::fs::write(&path, serde_json::to_string_pretty(preset)?)?;
        tracing::info!("Saved preset to {path:?}");
        Ok(path)
    }
}

/// Strip path separators and reserved characters, append `.json`.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') && !c.is_control())
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');
    if cleaned.is_empty() {
        return DEFAULT_PRESET.to_string();
    }
    if cleaned.ends_with(".json") {
        cleaned.to_string()
    } else {
        format!("{cleaned}.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConflictPolicy;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("portraits"), "portraits.json");
        assert_eq!(sanitize("../../etc/passwd"), "etcpasswd.json");
        assert_eq!(sanitize("a:b?.json"), "ab.json");
        assert_eq!(sanitize("  "), DEFAULT_PRESET);
    }

    #[test]
    fn test_list_empty_dir_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonPresetStore::new(dir.path().join("missing"));
        assert_eq!(store.list().unwrap(), vec![DEFAULT_PRESET.to_string()]);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonPresetStore::new(dir.path());
        let mut preset = Preset {
            interrogator: Some("dumps".into()),
            ..Default::default()
        };
        preset.batch.conflict_policy = ConflictPolicy::Append;
        preset.postprocess.threshold = 0.5;

        let path = store.save("anime", &preset).unwrap();
        assert!(path.ends_with("anime.json"));
        assert_eq!(store.load("anime").unwrap(), preset);
        assert_eq!(store.list().unwrap(), vec!["anime.json".to_string()]);
    }

    #[test]
    fn test_missing_preset_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonPresetStore::new(dir.path());
        assert_eq!(store.load("nope").unwrap(), Preset::default());
    }

    #[test]
    fn test_apply_to_config() {
        let mut config = Config::default();
        let mut preset = Preset::default();
        preset.batch.remove_duplicates = true;
        preset.apply_to(&mut config);
        assert!(config.batch.remove_duplicates);
    }
}
