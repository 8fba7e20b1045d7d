//! Command-line overrides for post-processing and batch settings.

use clap::{Args, ValueEnum};
use std::path::PathBuf;

use tagtally_core::{BatchOptions, ConflictPolicy, OutputFormat as CoreOutputFormat, PostprocessConfig};

/// Post-processing flags. Unset flags keep the configured value.
#[derive(Args, Debug, Default, Clone)]
pub struct PostprocessFlags {
    /// Minimum confidence a tag needs (0.0 to 1.0)
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Tags always added at full weight (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub additional_tags: Vec<String>,

    /// Tag to drop (repeatable); a first entry of /regex/ drops every matching tag
    #[arg(long = "exclude-tag")]
    pub exclude_tags: Vec<String>,

    /// Sort tags by name instead of confidence
    #[arg(long)]
    pub sort_alphabetically: bool,

    /// Write tags as (tag:weight) and accumulate weights across runs
    #[arg(long)]
    pub annotate_weight: bool,

    /// Keep underscores in tag names
    #[arg(long)]
    pub keep_underscore: bool,

    /// Tags whose underscores are never replaced (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub underscore_exceptions: Vec<String>,

    /// Escape ( and ) in tag names
    #[arg(long)]
    pub escape_brackets: bool,
}

impl PostprocessFlags {
    pub fn apply(&self, config: &mut PostprocessConfig) {
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if !self.additional_tags.is_empty() {
            config.additional_tags = self.additional_tags.clone();
        }
        if !self.exclude_tags.is_empty() {
            config.exclude_tags = self.exclude_tags.clone();
        }
        if !self.underscore_exceptions.is_empty() {
            config.underscore_exceptions = self.underscore_exceptions.clone();
        }
        config.sort_alphabetically |= self.sort_alphabetically;
        config.annotate_weight |= self.annotate_weight;
        config.escape_brackets |= self.escape_brackets;
        if self.keep_underscore {
            config.replace_underscore = false;
        }
    }

    /// Reject values the config validator would reject.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(t) = self.threshold {
            if !(0.0..=1.0).contains(&t) {
                anyhow::bail!("--threshold must be between 0.0 and 1.0, got {t}");
            }
        }
        Ok(())
    }
}

/// Batch flags. Unset flags keep the configured value.
#[derive(Args, Debug, Default, Clone)]
pub struct BatchFlags {
    /// Directory for caption files (defaults to next to each image)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Descend into sub-directories
    #[arg(short, long)]
    pub recursive: bool,

    /// Output filename template, e.g. "[name].[output_extension]" or "[hash:sha256].txt"
    #[arg(long)]
    pub template: Option<String>,

    /// What to do with an existing caption file (ignore, replace, append, prepend, filter)
    #[arg(long)]
    pub on_conflict: Option<ConflictPolicy>,

    /// Keep only the N highest-weight tags (0 disables)
    #[arg(long)]
    pub tag_count_threshold: Option<usize>,

    /// Drop repeated tags (ignored with --annotate-weight)
    #[arg(long)]
    pub remove_duplicates: bool,

    /// Also write raw scores as a JSON sidecar
    #[arg(long)]
    pub sidecar: bool,

    /// Log every caption as it is written
    #[arg(long)]
    pub log_tags: bool,

    /// Rename pattern for the filter policy (repeatable regex)
    #[arg(long)]
    pub search: Vec<String>,

    /// Replacement paired with the --search at the same position (repeatable)
    #[arg(long)]
    pub replace: Vec<String>,

    /// Unload the interrogator when the run is done
    #[arg(long)]
    pub unload_after_run: bool,
}

impl BatchFlags {
    pub fn apply(&self, options: &mut BatchOptions) {
        if let Some(dir) = &self.output_dir {
            options.output_dir = Some(dir.clone());
        }
        if let Some(template) = &self.template {
            options.filename_template = template.clone();
        }
        if let Some(policy) = self.on_conflict {
            options.conflict_policy = policy;
        }
        if let Some(n) = self.tag_count_threshold {
            options.tag_count_threshold = n;
        }
        if !self.search.is_empty() || !self.replace.is_empty() {
            options.search_tags = self.search.clone();
            options.replace_tags = self.replace.clone();
        }
        options.recursive |= self.recursive;
        options.remove_duplicates |= self.remove_duplicates;
        options.save_sidecar |= self.sidecar;
        options.verbose |= self.log_tags;
        options.unload_after_run |= self.unload_after_run;
    }
}

/// Supported output formats.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty JSON document
    #[default]
    Json,
    /// One JSON object per line (newline-delimited)
    Jsonl,
}

impl From<OutputFormat> for CoreOutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => CoreOutputFormat::Json,
            OutputFormat::Jsonl => CoreOutputFormat::JsonLines,
        }
    }
}
