//! Tagtally Core - tag post-processing and incremental caption aggregation.
//!
//! Tagtally turns raw per-label confidences from an image classifier into
//! clean captions, for one image or for a whole directory. Batch runs over
//! the same targets accumulate evidence: weighted targets store a running
//! average plus the number of interrogations behind it.
//!
//! # Architecture
//!
//! ```text
//! Image → Interrogator → Filter → Merge with existing target → Render → Atomic write → Summary
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use tagtally_core::{Config, Tagger};
//!
//! #[tokio::main]
//! async fn main() -> tagtally_core::Result<()> {
//!     let tagger = Tagger::new(Config::load()?);
//!     let report = tagger.run_batch("./images".as_ref(), "dumps").await?;
//!     println!("Tags: {}", report.tags);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod aggregate;
pub mod config;
pub mod error;
pub mod interrogator;
pub mod output;
pub mod pipeline;
pub mod postprocess;
pub mod preset;
pub mod template;
pub mod types;

// Re-exports for convenient access
pub use config::{BatchOptions, Config, PostprocessConfig};
pub use error::{ConfigError, PipelineError, PipelineResult, Result, TagtallyError, TemplateError};
pub use interrogator::{Interrogator, InterrogatorRegistry, ScoreDumpInterrogator};
pub use output::{ImageRecord, OutputFormat, OutputWriter};
pub use pipeline::{BatchCoordinator, BatchJob, DecodedImage, ImageOutcome, ImageStatus};
pub use postprocess::{postprocess_tags, Postprocessor};
pub use preset::{JsonPresetStore, Preset, PresetStore};
pub use types::{
    AggregatedEntry, BatchReport, ConfidenceMap, ConflictPolicy, InterrogateResponse,
    InterrogationResult,
};

use std::path::Path;
use std::sync::Arc;

use pipeline::FileDiscovery;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tagtally context: configuration plus the interrogators it can use.
pub struct Tagger {
    config: Config,
    registry: InterrogatorRegistry,
}

impl Tagger {
    /// Create a tagger with one score dump interrogator per configured
    /// `[interrogators]` entry.
    pub fn new(config: Config) -> Self {
        let mut registry = InterrogatorRegistry::new();
        for (name, dir) in config.interrogator_dirs() {
            registry.register(Arc::new(ScoreDumpInterrogator::new(name, dir)));
        }
        tracing::debug!("Initializing tagtally v{VERSION} with {registry:?}");
        Self::with_registry(config, registry)
    }

    /// Create a tagger over an explicit registry.
    pub fn with_registry(config: Config, registry: InterrogatorRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &InterrogatorRegistry {
        &self.registry
    }

    /// Interrogate a single image and post-process the tags.
    ///
    /// `tags` in the response is the rendered caption; `ratings` and
    /// `tag_confidences` are the raw classifier output.
    pub async fn interrogate(&self, image: &Path, interrogator: &str) -> Result<InterrogateResponse> {
        let backend = self.registry.load(interrogator)?;
        if !image.is_file() {
            return Err(PipelineError::FileNotFound(image.to_path_buf()).into());
        }

        let decoded = DecodedImage::open(image).await?;
        let worker = backend.clone();
        let result = tokio::task::spawn_blocking(move || worker.interrogate(&decoded))
            .await
            .map_err(|e| PipelineError::Interrogation {
                path: image.to_path_buf(),
                message: format!("Task join error: {e}"),
            })??;

        let caption = Postprocessor::new(self.config.postprocess.clone()).caption(&result.tags);
        if self.config.batch.unload_after_run {
            backend.unload();
        }

        Ok(InterrogateResponse {
            tags: caption,
            ratings: result.ratings,
            tag_confidences: result.tags,
            error: String::new(),
        })
    }

    /// Like [`interrogate`](Self::interrogate), with failures carried in the
    /// response's `error` field.
    pub async fn interrogate_response(&self, image: &Path, interrogator: &str) -> InterrogateResponse {
        self.interrogate(image, interrogator)
            .await
            .unwrap_or_else(InterrogateResponse::from_error)
    }

    /// Jobs for every supported image under `input`.
    ///
    /// With an output directory, targets mirror the input's sub-directories
    /// below it. Otherwise each target sits next to its image.
    pub fn batch_jobs(&self, input: &Path) -> Vec<BatchJob> {
        let batch = &self.config.batch;
        let discovery = FileDiscovery::new(&self.config.processing.supported_formats, batch.recursive);
        discovery
            .discover(input)
            .into_iter()
            .map(|file| {
                let output_dir = match &batch.output_dir {
                    Some(root) => root.join(&file.relative_dir),
                    None => file.path.parent().map(Path::to_path_buf).unwrap_or_default(),
                };
                BatchJob::new(file.path, output_dir)
            })
            .collect()
    }

    /// Run a batch over a directory with the configured options.
    pub async fn run_batch(&self, input: &Path, interrogator: &str) -> Result<BatchReport> {
        self.run_batch_with(input, interrogator, |_| {}).await
    }

    /// Like [`run_batch`](Self::run_batch), calling `on_outcome` per image.
    pub async fn run_batch_with<F>(&self, input: &Path, interrogator: &str, on_outcome: F) -> Result<BatchReport>
    where
        F: Fn(&ImageOutcome) + Send + Sync + 'static,
    {
        let backend = self.registry.get(interrogator)?;
        if !input.exists() {
            return Err(PipelineError::FileNotFound(input.to_path_buf()).into());
        }

        let batch = self.config.batch.clone();
        if batch.conflict_policy.interrogates() {
            backend.load()?;
        }
        let coordinator = BatchCoordinator::new(
            backend.clone(),
            self.config.postprocess.clone(),
            batch,
            &self.config.processing,
        )?;

        let jobs = self.batch_jobs(input);
        tracing::info!(
            "Processing {} image(s) from {input:?} with '{interrogator}' ({})",
            jobs.len(),
            coordinator.options().conflict_policy
        );
        let report = coordinator.run_with(&jobs, on_outcome).await;

        if self.config.batch.unload_after_run && backend.unload() {
            tracing::info!("Unloaded interrogator '{interrogator}'");
        }
        report
    }

    /// Unload every interrogator, returning how many were loaded.
    pub fn unload_all(&self) -> usize {
        self.registry.unload_all()
    }
}
