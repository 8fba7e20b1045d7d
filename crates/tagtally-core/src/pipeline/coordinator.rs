//! Batch orchestration.
//!
//! Each image resolves to a target file. Under the target's lock the existing
//! content is read, the conflict policy decides whether and how fresh
//! classifier output is combined with it, and the result is written back
//! atomically. Every finished image is folded into a [`BatchSummary`].
//!
//! Images run as tokio tasks bounded by `parallel_workers`. Classifier calls
//! additionally go through `classifier_slots` permits on blocking threads.
//! A template error stops scheduling; images already in flight finish.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;

use super::decode::DecodedImage;
use super::locks::TargetLocks;
use super::writer::{write_atomic, write_sidecar};
use crate::aggregate::{
    cap_top_n, dedup, merge, parse_target, plain_entries, serialize_target, BatchSummary, ParsedTarget,
};
use crate::config::{BatchOptions, PostprocessConfig, ProcessingConfig};
use crate::error::{PipelineError, PipelineResult, Result, TemplateError};
use crate::interrogator::Interrogator;
use crate::postprocess::{transform_name, Postprocessor, RenameRules};
use crate::template::{FilenameTemplate, FormatContext};
use crate::types::{AggregatedEntry, BatchReport, ConfidenceMap, ConflictPolicy, InterrogationResult};

/// Extension of written caption targets.
pub const OUTPUT_EXTENSION: &str = "txt";

/// One source image and the directory its target goes to.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchJob {
    pub source: PathBuf,
    pub output_dir: PathBuf,
}

impl BatchJob {
    pub fn new(source: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output_dir: output_dir.into(),
        }
    }
}

/// Terminal state of one image.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageStatus {
    Written,
    Skipped,
    Errored(String),
}

/// What happened to one image.
#[derive(Debug, Clone)]
pub struct ImageOutcome {
    pub source: PathBuf,
    pub target: PathBuf,
    pub status: ImageStatus,
    /// Per-tag weights the image contributes to the summary
    pub weights: Option<ConfidenceMap>,
    /// Rating confidences, present when the classifier ran
    pub ratings: Option<ConfidenceMap>,
}

impl ImageOutcome {
    fn skipped(source: &Path, target: &Path, weights: Option<ConfidenceMap>) -> Self {
        Self {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            status: ImageStatus::Skipped,
            weights,
            ratings: None,
        }
    }

    fn errored(source: PathBuf, target: PathBuf, error: &PipelineError) -> Self {
        Self {
            source,
            target,
            status: ImageStatus::Errored(error.to_string()),
            weights: None,
            ratings: None,
        }
    }
}

/// State shared by every image task of a batch.
struct Shared {
    interrogator: Arc<dyn Interrogator>,
    postprocess: Postprocessor,
    options: BatchOptions,
    rename: Option<RenameRules>,
    locks: TargetLocks,
    classifier_slots: Semaphore,
}

/// Runs batches for one interrogator and one set of options.
pub struct BatchCoordinator {
    shared: Arc<Shared>,
    template: FilenameTemplate,
    parallel_workers: usize,
}

impl BatchCoordinator {
    /// Validate the filename template and compile the rules of a batch.
    ///
    /// A bad template is fatal. Bad rename rules only disable renaming.
    pub fn new(
        interrogator: Arc<dyn Interrogator>,
        postprocess: PostprocessConfig,
        options: BatchOptions,
        processing: &ProcessingConfig,
    ) -> std::result::Result<Self, TemplateError> {
        let template = FilenameTemplate::parse(&options.filename_template)?;
        let rename = compile_rename(&options);

        Ok(Self {
            shared: Arc::new(Shared {
                interrogator,
                postprocess: Postprocessor::new(postprocess),
                options,
                rename,
                locks: TargetLocks::new(),
                classifier_slots: Semaphore::new(processing.classifier_slots.max(1)),
            }),
            template,
            parallel_workers: processing.parallel_workers.max(1),
        })
    }

    pub fn options(&self) -> &BatchOptions {
        &self.shared.options
    }

    /// Process every job and summarize.
    pub async fn run(&self, jobs: &[BatchJob]) -> Result<BatchReport> {
        self.run_with(jobs, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `on_outcome` as each image finishes.
    pub async fn run_with<F>(&self, jobs: &[BatchJob], on_outcome: F) -> Result<BatchReport>
    where
        F: Fn(&ImageOutcome) + Send + Sync + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.parallel_workers));
        let on_outcome = Arc::new(on_outcome);
        let mut handles = Vec::with_capacity(jobs.len());
        let mut abort: Option<TemplateError> = None;

        for job in jobs {
            let target = match self.resolve_target(job).await {
                Ok(target) => target,
                Err(e) => {
                    tracing::error!("Stopping batch at {:?}: {e}", job.source);
                    abort = Some(e);
                    break;
                }
            };

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                tracing::warn!("Worker semaphore closed unexpectedly, stopping batch");
                break;
            };

            let shared = self.shared.clone();
            let on_outcome = on_outcome.clone();
            let source = job.source.clone();
            handles.push(tokio::spawn(async move {
                let outcome = process_image(&shared, source, target).await;
                drop(permit);
                on_outcome(&outcome);
                outcome
            }));
        }

        let mut summary = BatchSummary::new();
        let (mut written, mut skipped, mut errored) = (0, 0, 0);
        for handle in handles {
            match handle.await {
                Ok(outcome) => {
                    match outcome.status {
                        ImageStatus::Written => written += 1,
                        ImageStatus::Skipped => skipped += 1,
                        ImageStatus::Errored(_) => errored += 1,
                    }
                    if let Some(weights) = &outcome.weights {
                        summary.fold(weights, outcome.ratings.as_ref());
                    }
                }
                Err(e) => {
                    tracing::error!("Image task panicked: {e}");
                    errored += 1;
                }
            }
        }

        if let Some(e) = abort {
            return Err(e.into());
        }

        tracing::info!(
            "Batch done: {written} written, {skipped} skipped, {errored} failed ({} in summary)",
            summary.images()
        );
        let threshold = self.shared.postprocess.config().threshold;
        Ok(summary.into_report(threshold, written, skipped, errored))
    }

    async fn resolve_target(&self, job: &BatchJob) -> std::result::Result<PathBuf, TemplateError> {
        let ctx = FormatContext::new(&job.source, OUTPUT_EXTENSION);
        let name = if self.template.needs_content() {
            let template = self.template.clone();
            let source = job.source.clone();
            tokio::task::spawn_blocking(move || template.resolve(&ctx))
                .await
                .map_err(|e| TemplateError::SourceUnreadable {
                    path: source,
                    message: format!("Task join error: {e}"),
                })??
        } else {
            self.template.resolve(&ctx)?
        };
        Ok(job.output_dir.join(name))
    }
}

fn compile_rename(options: &BatchOptions) -> Option<RenameRules> {
    if options.search_tags.is_empty() && options.replace_tags.is_empty() {
        return None;
    }
    if options.conflict_policy != ConflictPolicy::Filter {
        tracing::debug!("Search/replace only applies to the filter policy, ignoring");
        return None;
    }
    match RenameRules::compile(&options.search_tags, &options.replace_tags) {
        Ok(rules) => Some(rules),
        Err(e) => {
            tracing::warn!("Renaming disabled for this run: {e}");
            None
        }
    }
}

async fn process_image(shared: &Shared, source: PathBuf, target: PathBuf) -> ImageOutcome {
    match handle_image(shared, &source, &target).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Failed to process {source:?}: {e}");
            ImageOutcome::errored(source, target, &e)
        }
    }
}

async fn handle_image(shared: &Shared, source: &Path, target: &Path) -> PipelineResult<ImageOutcome> {
    let _guard = shared.locks.acquire(target).await;
    let existing = read_existing(target).await?;
    let annotate = shared.postprocess.config().annotate_weight;

    let (entries, ict, raw) = match (shared.options.conflict_policy, existing) {
        (ConflictPolicy::Ignore, Some(content)) => {
            tracing::debug!("Keeping existing {target:?}");
            let weights = parse_target(&content).weights();
            return Ok(ImageOutcome::skipped(source, target, Some(weights)));
        }
        (ConflictPolicy::Filter, None) => {
            tracing::debug!("Nothing to filter for {source:?}");
            return Ok(ImageOutcome::skipped(source, target, None));
        }
        (ConflictPolicy::Filter, Some(content)) => {
            let parsed = parse_target(&content);
            let ict = parsed.ict;
            (shared.filter_existing(parsed), ict, None)
        }
        (policy, existing) => {
            let raw = shared.interrogate(source).await?;
            let fresh = shared.postprocess.names(&raw.tags);
            let (entries, ict) = combine(policy, existing.as_deref(), &fresh, annotate);
            (entries, ict, Some(raw))
        }
    };

    let mut entries = entries;
    if let Some(cap) = shared.options.tag_cap() {
        entries = cap_top_n(entries, cap);
    }
    if shared.options.remove_duplicates && !annotate {
        entries = dedup(entries);
    }

    let text = serialize_target(&entries, annotate.then_some(ict), annotate);
    write_atomic(target, text.as_bytes())?;
    if shared.options.verbose {
        tracing::info!("{source:?} -> {target:?}: {text}");
    } else {
        tracing::debug!("Wrote {target:?}");
    }

    if let (true, Some(raw)) = (shared.options.save_sidecar, &raw) {
        if let Err(e) = write_sidecar(target, raw) {
            tracing::warn!("Sidecar for {target:?} not written: {e}");
        }
    }

    let mut weights = ConfidenceMap::with_capacity(entries.len());
    for entry in &entries {
        weights.insert_if_absent(entry.tag.as_str(), entry.weight);
    }

    Ok(ImageOutcome {
        source: source.to_path_buf(),
        target: target.to_path_buf(),
        status: ImageStatus::Written,
        weights: Some(weights),
        ratings: raw.map(|r| r.ratings),
    })
}

async fn read_existing(target: &Path) -> PipelineResult<Option<String>> {
    match tokio::fs::read_to_string(target).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PipelineError::Read {
            path: target.to_path_buf(),
            message: e.to_string(),
        }),
    }
}

/// Combine fresh tag names with an existing target according to `policy`.
///
/// Weighted targets are merged as a running average. Plain targets are
/// concatenated token for token: `append` puts the new tags last, `prepend`
/// first. Plain targets carry no count.
fn combine(
    policy: ConflictPolicy,
    existing: Option<&str>,
    fresh: &ConfidenceMap,
    annotate: bool,
) -> (Vec<AggregatedEntry>, f32) {
    let fresh_entries = || -> Vec<AggregatedEntry> {
        fresh
            .iter()
            .map(|(tag, weight)| AggregatedEntry::new(tag, weight))
            .collect()
    };

    match (policy, existing) {
        (ConflictPolicy::Append | ConflictPolicy::Prepend, Some(content)) if annotate => {
            let old = parse_target(content);
            merge(&old.entries, fresh, old.ict)
        }
        (ConflictPolicy::Append, Some(content)) => {
            let mut entries = plain_entries(content);
            entries.extend(fresh_entries());
            (entries, 1.0)
        }
        (ConflictPolicy::Prepend, Some(content)) => {
            let mut entries = fresh_entries();
            entries.extend(plain_entries(content));
            (entries, 1.0)
        }
        _ => (fresh_entries(), 1.0),
    }
}

impl Shared {
    async fn interrogate(&self, source: &Path) -> PipelineResult<InterrogationResult> {
        let decoded = DecodedImage::open(source).await?;
        let _slot = self
            .classifier_slots
            .acquire()
            .await
            .map_err(|e| PipelineError::Interrogation {
                path: source.to_path_buf(),
                message: e.to_string(),
            })?;

        let interrogator = self.interrogator.clone();
        tokio::task::spawn_blocking(move || interrogator.interrogate(&decoded))
            .await
            .map_err(|e| PipelineError::Interrogation {
                path: source.to_path_buf(),
                message: format!("Task join error: {e}"),
            })?
    }

    /// Rewrite existing weights without fresh classifier output.
    fn filter_existing(&self, parsed: ParsedTarget) -> Vec<AggregatedEntry> {
        let config = self.postprocess.config();
        let mut weights = parsed.weights();
        for tag in config.additional_tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            weights.insert_if_absent(transform_name(tag, config), 1.0);
        }

        let kept: Vec<AggregatedEntry> = weights
            .into_iter()
            .filter(|(tag, _)| !self.postprocess.exclude().excludes(tag))
            .map(|(tag, weight)| AggregatedEntry::new(tag, weight))
            .collect();

        match &self.rename {
            Some(rules) => rules.apply(kept),
            None => kept,
        }
    }
}
