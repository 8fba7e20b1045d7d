//! Sub-configuration structs and their defaults.

use crate::types::ConflictPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kaomoji whose underscores are part of the face, not word separators.
const DEFAULT_UNDERSCORE_EXCEPTIONS: &[&str] = &[
    "0_0", "(o)_(o)", "+_+", "+_-", "._.", "<o>_<o>", "<|>_<|>", "=_=", ">_<", "3_3", "6_9",
    ">_o", "@_@", "^_^", "o_o", "u_u", "x_x", "|_|", "||_||",
];

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where named presets are stored
    pub preset_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            preset_dir: PathBuf::from("~/.tagtally/presets"),
        }
    }
}

/// Worker pool and input format settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Images processed concurrently (file I/O, merging, writing)
    pub parallel_workers: usize,

    /// Concurrent classifier calls. Keep at or below the number of
    /// accelerator slots the backend can serve.
    pub classifier_slots: usize,

    /// Supported input formats
    pub supported_formats: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_workers: 4,
            classifier_slots: 1,
            supported_formats: ["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Rules applied to a single interrogation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostprocessConfig {
    /// Minimum confidence to keep a tag (inclusive)
    pub threshold: f32,

    /// Tags always added, at confidence 1.0 unless the classifier scored them
    pub additional_tags: Vec<String>,

    /// Tags always removed. A first element of the form `/pattern/` is a
    /// case-insensitive exclusion regex.
    pub exclude_tags: Vec<String>,

    /// Sort by tag name instead of confidence
    pub sort_alphabetically: bool,

    /// Render tags as `(tag:confidence)` and accumulate weights across runs
    pub annotate_weight: bool,

    /// Replace `_` with a space
    pub replace_underscore: bool,

    /// Tags left untouched by `replace_underscore`
    pub underscore_exceptions: Vec<String>,

    /// Escape `(` and `)` with a backslash
    pub escape_brackets: bool,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            threshold: 0.35,
            additional_tags: vec![],
            exclude_tags: vec![],
            sort_alphabetically: false,
            annotate_weight: false,
            replace_underscore: true,
            underscore_exceptions: DEFAULT_UNDERSCORE_EXCEPTIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            escape_brackets: false,
        }
    }
}

/// Options that only matter when processing a directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// What to do with an existing target
    pub conflict_policy: ConflictPolicy,

    /// Output filename template, see [`crate::template`]
    pub filename_template: String,

    /// Output directory; the input directory when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Descend into sub-directories of the input
    pub recursive: bool,

    /// Keep at most this many tags per target (0 disables the cap)
    pub tag_count_threshold: usize,

    /// Drop repeated tags (ignored when weights are annotated)
    pub remove_duplicates: bool,

    /// Also write the raw `[ratings, tags]` scores as JSON next to the target
    pub save_sidecar: bool,

    /// Log every image at info level
    pub verbose: bool,

    /// Rename patterns applied by the `filter` policy, paired with `replace_tags`
    pub search_tags: Vec<String>,

    /// Replacements for `search_tags`
    pub replace_tags: Vec<String>,

    /// Unload the interrogator when the run finishes
    pub unload_after_run: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::Ignore,
            filename_template: "[name].[output_extension]".to_string(),
            output_dir: None,
            recursive: false,
            tag_count_threshold: 0,
            remove_duplicates: false,
            save_sidecar: false,
            verbose: false,
            search_tags: vec![],
            replace_tags: vec![],
            unload_after_run: false,
        }
    }
}

impl BatchOptions {
    /// The top-N cap, if enabled.
    pub fn tag_cap(&self) -> Option<usize> {
        (self.tag_count_threshold > 0).then_some(self.tag_count_threshold)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
