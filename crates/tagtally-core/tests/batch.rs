//! End-to-end batch behavior over temporary directories.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tagtally_core::aggregate::parse_target;
use tagtally_core::config::ProcessingConfig;
use tagtally_core::{
    BatchCoordinator, BatchJob, BatchOptions, BatchReport, ConfidenceMap, Config, ConflictPolicy,
    DecodedImage, InterrogationResult, Interrogator, InterrogatorRegistry, PipelineResult,
    PostprocessConfig, TagtallyError, Tagger, TemplateError,
};

type Responder = Box<dyn Fn(usize) -> InterrogationResult + Send + Sync>;

/// Interrogator returning scripted results and counting its calls.
struct Scripted {
    calls: Arc<AtomicUsize>,
    respond: Responder,
}

impl Scripted {
    fn new(respond: impl Fn(usize) -> InterrogationResult + Send + Sync + 'static) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            respond: Box::new(respond),
        }
    }

    fn fixed(tags: &[(&str, f32)]) -> Self {
        let result = scores(&[("general", 0.5)], tags);
        Self::new(move |_| result.clone())
    }

    fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl Interrogator for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn load(&self) -> PipelineResult<()> {
        Ok(())
    }

    fn interrogate(&self, _image: &DecodedImage) -> PipelineResult<InterrogationResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((self.respond)(call))
    }

    fn unload(&self) -> bool {
        false
    }
}

fn map(pairs: &[(&str, f32)]) -> ConfidenceMap {
    pairs.iter().map(|(t, c)| (t.to_string(), *c)).collect()
}

fn scores(ratings: &[(&str, f32)], tags: &[(&str, f32)]) -> InterrogationResult {
    InterrogationResult {
        ratings: map(ratings),
        tags: map(tags),
    }
}

/// PNG content regardless of extension; decoding sniffs the format.
fn write_png(path: &Path) {
    image::RgbImage::new(2, 2)
        .save_with_format(path, image::ImageFormat::Png)
        .unwrap();
}

fn processing(workers: usize) -> ProcessingConfig {
    ProcessingConfig {
        parallel_workers: workers,
        ..Default::default()
    }
}

fn weighted() -> PostprocessConfig {
    PostprocessConfig {
        threshold: 0.0,
        annotate_weight: true,
        ..Default::default()
    }
}

fn options(policy: ConflictPolicy) -> BatchOptions {
    BatchOptions {
        conflict_policy: policy,
        ..Default::default()
    }
}

/// One image `cat.png` in a fresh directory, its job, and its target path.
fn single_image() -> (tempfile::TempDir, Vec<BatchJob>, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("cat.png");
    write_png(&source);
    let jobs = vec![BatchJob::new(&source, dir.path())];
    let target = dir.path().join("cat.txt");
    (dir, jobs, target)
}

async fn run(
    interrogator: Scripted,
    post: PostprocessConfig,
    options: BatchOptions,
    jobs: &[BatchJob],
) -> tagtally_core::Result<BatchReport> {
    BatchCoordinator::new(Arc::new(interrogator), post, options, &processing(4))?
        .run(jobs)
        .await
}

#[tokio::test]
async fn replace_is_idempotent() {
    let (_dir, jobs, target) = single_image();
    let tags = [("solo", 0.9), ("long_hair", 0.6)];

    run(Scripted::fixed(&tags), weighted(), options(ConflictPolicy::Replace), &jobs)
        .await
        .unwrap();
    let first = std::fs::read(&target).unwrap();
    run(Scripted::fixed(&tags), weighted(), options(ConflictPolicy::Replace), &jobs)
        .await
        .unwrap();
    let second = std::fs::read(&target).unwrap();

    assert_eq!(first, second);
    assert_eq!(String::from_utf8(first).unwrap(), "(solo:0.9), (long hair:0.6), 1.0");
}

#[tokio::test]
async fn append_converges_to_mean() {
    let (_dir, jobs, target) = single_image();
    let runs = [0.2_f32, 0.4, 0.9];

    for _ in 0..runs.len() {
        let before = std::fs::read_to_string(&target)
            .map(|c| parse_target(&c).ict as usize)
            .unwrap_or(0);
        let confidence = runs[before];
        let interrogator = Scripted::new(move |_| scores(&[], &[("solo", confidence)]));
        run(interrogator, weighted(), options(ConflictPolicy::Append), &jobs)
            .await
            .unwrap();
    }

    let parsed = parse_target(&std::fs::read_to_string(&target).unwrap());
    assert_eq!(parsed.ict, 3.0);
    assert!((parsed.entries[0].weight - 0.5).abs() < 1e-5);
}

#[tokio::test]
async fn constant_scores_stay_put() {
    let (_dir, jobs, target) = single_image();
    for _ in 0..3 {
        let interrogator = Scripted::fixed(&[("solo", 0.75), ("smile", 0.5)]);
        run(interrogator, weighted(), options(ConflictPolicy::Prepend), &jobs)
            .await
            .unwrap();
    }
    assert_eq!(
        std::fs::read_to_string(&target).unwrap(),
        "(solo:0.75), (smile:0.5), 3.0"
    );
}

#[tokio::test]
async fn filter_never_calls_classifier() {
    let (_dir, jobs, target) = single_image();
    std::fs::write(&target, "(solo:0.75), (smile:0.5), 2.0").unwrap();

    let interrogator = Scripted::fixed(&[("other", 1.0)]);
    let calls = interrogator.calls();
    let report = run(interrogator, weighted(), options(ConflictPolicy::Filter), &jobs)
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.written, 1);
    assert_eq!(
        std::fs::read_to_string(&target).unwrap(),
        "(solo:0.75), (smile:0.5), 2.0"
    );
}

#[tokio::test]
async fn filter_rewrites_existing_weights() {
    let (_dir, jobs, target) = single_image();
    std::fs::write(&target, "(cat ears:0.5), (solo:0.75), (animal ears:0.25), (lowres:0.5), 4.0").unwrap();

    let post = PostprocessConfig {
        additional_tags: vec!["masterpiece".into(), "solo".into()],
        exclude_tags: vec!["lowres".into()],
        ..weighted()
    };
    let options = BatchOptions {
        search_tags: vec!["^(cat|animal) ears$".into()],
        replace_tags: vec!["ears".into()],
        ..options(ConflictPolicy::Filter)
    };
    run(Scripted::fixed(&[]), post, options, &jobs).await.unwrap();

    assert_eq!(
        std::fs::read_to_string(&target).unwrap(),
        "(ears:0.75), (solo:0.75), (masterpiece:1), 4.0"
    );
}

#[tokio::test]
async fn filter_drops_pattern_exclusions() {
    let (_dir, jobs, target) = single_image();
    std::fs::write(
        &target,
        "(lowres:0.5), (LOW quality:0.4), (solo:0.75), (below:0.3), (jpeg artifacts:0.6), 2.0",
    )
    .unwrap();

    let post = PostprocessConfig {
        exclude_tags: vec!["/^low/".into(), "jpeg artifacts".into()],
        ..weighted()
    };
    let interrogator = Scripted::fixed(&[]);
    let calls = interrogator.calls();
    run(interrogator, post, options(ConflictPolicy::Filter), &jobs)
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        std::fs::read_to_string(&target).unwrap(),
        "(solo:0.75), (below:0.3), 2.0"
    );
}

#[tokio::test]
async fn filter_without_target_is_skipped() {
    let (_dir, jobs, target) = single_image();
    let report = run(Scripted::fixed(&[]), weighted(), options(ConflictPolicy::Filter), &jobs)
        .await
        .unwrap();
    assert_eq!((report.written, report.skipped), (0, 1));
    assert!(!target.exists());
}

#[tokio::test]
async fn remove_duplicates_after_append() {
    let (_dir, jobs, target) = single_image();
    std::fs::write(&target, "a, b").unwrap();

    let options = BatchOptions {
        remove_duplicates: true,
        ..options(ConflictPolicy::Append)
    };
    run(
        Scripted::fixed(&[("a", 0.9), ("c", 0.8)]),
        PostprocessConfig::default(),
        options,
        &jobs,
    )
    .await
    .unwrap();

    assert_eq!(std::fs::read_to_string(&target).unwrap(), "a, b, c");
}

#[tokio::test]
async fn plain_append_keeps_existing_text() {
    for (existing, expected) in [("a, b, a, c", "a, b, a, c, d"), ("a, b, 2", "a, b, 2, d")] {
        let (_dir, jobs, target) = single_image();
        std::fs::write(&target, existing).unwrap();

        run(
            Scripted::fixed(&[("d", 0.9)]),
            PostprocessConfig::default(),
            options(ConflictPolicy::Append),
            &jobs,
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), expected);
    }
}

#[tokio::test]
async fn plain_prepend_keeps_existing_text() {
    let (_dir, jobs, target) = single_image();
    std::fs::write(&target, "a, (b:0.5), a").unwrap();

    run(
        Scripted::fixed(&[("d", 0.9)]),
        PostprocessConfig::default(),
        options(ConflictPolicy::Prepend),
        &jobs,
    )
    .await
    .unwrap();

    assert_eq!(std::fs::read_to_string(&target).unwrap(), "d, a, (b:0.5), a");
}

#[tokio::test]
async fn tag_count_threshold_keeps_top_entries() {
    let (_dir, jobs, target) = single_image();
    let tags: Vec<(String, f32)> = [0.4, 0.95, 0.5, 0.7, 0.85, 0.45, 0.9, 0.6, 0.55, 0.65]
        .iter()
        .enumerate()
        .map(|(i, c)| (format!("t{i}"), *c))
        .collect();
    let interrogator = Scripted::new(move |_| InterrogationResult {
        ratings: ConfidenceMap::new(),
        tags: tags.iter().cloned().collect(),
    });

    let options = BatchOptions {
        tag_count_threshold: 3,
        ..options(ConflictPolicy::Replace)
    };
    run(interrogator, PostprocessConfig::default(), options, &jobs)
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&target).unwrap(), "t1, t6, t4");
}

#[tokio::test]
async fn ignore_keeps_existing_and_fills_missing() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.png", "b.png"] {
        write_png(&dir.path().join(name));
    }
    std::fs::write(dir.path().join("a.txt"), "x, y").unwrap();
    let jobs = vec![
        BatchJob::new(dir.path().join("a.png"), dir.path()),
        BatchJob::new(dir.path().join("b.png"), dir.path()),
    ];

    let interrogator = Scripted::fixed(&[("x", 0.8)]);
    let calls = interrogator.calls();
    let report = run(interrogator, PostprocessConfig::default(), options(ConflictPolicy::Ignore), &jobs)
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!((report.written, report.skipped), (1, 1));
    assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "x, y");
    assert_eq!(std::fs::read_to_string(dir.path().join("b.txt")).unwrap(), "x");

    // x: (1.0 + 0.8) / 2, y: 0.5 / 2
    assert_eq!(report.tags, "x");
    assert!((report.tag_confidences.get("x").unwrap() - 0.9).abs() < 1e-6);
    assert_eq!(report.tag_confidences.get("y"), Some(0.25));
    assert_eq!(report.ratings.get("general"), Some(0.25));
}

#[tokio::test]
async fn unreadable_image_does_not_stop_batch() {
    let dir = tempfile::tempdir().unwrap();
    write_png(&dir.path().join("good.png"));
    std::fs::write(dir.path().join("broken.png"), b"definitely not a png").unwrap();
    let jobs = vec![
        BatchJob::new(dir.path().join("broken.png"), dir.path()),
        BatchJob::new(dir.path().join("good.png"), dir.path()),
    ];

    let report = run(
        Scripted::fixed(&[("solo", 0.9)]),
        PostprocessConfig::default(),
        options(ConflictPolicy::Replace),
        &jobs,
    )
    .await
    .unwrap();

    assert_eq!((report.written, report.errored), (1, 1));
    assert!(dir.path().join("good.txt").exists());
    assert!(!dir.path().join("broken.txt").exists());
}

#[tokio::test]
async fn template_error_aborts_remaining_images() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    write_png(&dir.path().join("first.png"));
    write_png(&dir.path().join("third.png"));
    let jobs = vec![
        BatchJob::new(dir.path().join("first.png"), &out),
        BatchJob::new(dir.path().join("missing.png"), &out),
        BatchJob::new(dir.path().join("third.png"), &out),
    ];

    let options = BatchOptions {
        filename_template: "[hash:md5].[output_extension]".into(),
        ..options(ConflictPolicy::Replace)
    };
    let coordinator = BatchCoordinator::new(
        Arc::new(Scripted::fixed(&[("solo", 0.9)])),
        PostprocessConfig::default(),
        options,
        &processing(1),
    )
    .unwrap();
    let err = coordinator.run(&jobs).await.unwrap_err();

    assert!(matches!(
        err,
        TagtallyError::Template(TemplateError::SourceUnreadable { .. })
    ));
    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 1);
}

#[tokio::test]
async fn unsupported_hash_fails_before_any_image() {
    let options = BatchOptions {
        filename_template: "[hash:crc32].txt".into(),
        ..Default::default()
    };
    let result = BatchCoordinator::new(
        Arc::new(Scripted::fixed(&[])),
        PostprocessConfig::default(),
        options,
        &processing(1),
    );
    assert!(matches!(result, Err(TemplateError::UnsupportedHash { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shared_target_merges_every_image() {
    let dir = tempfile::tempdir().unwrap();
    let names = ["cat.png", "cat.jpg", "cat.bmp", "cat.gif"];
    for name in names {
        write_png(&dir.path().join(name));
    }
    let jobs: Vec<BatchJob> = names
        .iter()
        .map(|n| BatchJob::new(dir.path().join(n), dir.path()))
        .collect();

    run(
        Scripted::fixed(&[("solo", 0.5)]),
        weighted(),
        options(ConflictPolicy::Append),
        &jobs,
    )
    .await
    .unwrap();

    let parsed = parse_target(&std::fs::read_to_string(dir.path().join("cat.txt")).unwrap());
    assert_eq!(parsed.ict, 4.0);
}

#[tokio::test]
async fn tagger_runs_score_dumps_with_sidecar() {
    let input = tempfile::tempdir().unwrap();
    let dumps = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_png(&input.path().join("cat.png"));
    std::fs::write(
        dumps.path().join("cat.json"),
        r#"[{"general":0.75},{"cat_ears":0.8,"lowres":0.1}]"#,
    )
    .unwrap();

    let mut config = Config::default();
    config.interrogators.insert("dumps".into(), dumps.path().to_path_buf());
    config.batch.conflict_policy = ConflictPolicy::Replace;
    config.batch.output_dir = Some(output.path().to_path_buf());
    config.batch.save_sidecar = true;

    let tagger = Tagger::new(config);
    let report = tagger.run_batch(input.path(), "dumps").await.unwrap();

    assert_eq!(report.written, 1);
    assert_eq!(report.tags, "cat ears");
    assert_eq!(
        std::fs::read_to_string(output.path().join("cat.txt")).unwrap(),
        "cat ears"
    );
    assert_eq!(
        std::fs::read_to_string(output.path().join("cat.json")).unwrap(),
        r#"[{"general":0.75},{"cat_ears":0.8,"lowres":0.1}]"#
    );

    let response = tagger.interrogate(&input.path().join("cat.png"), "dumps").await.unwrap();
    assert_eq!(response.tags, "cat ears");
    assert_eq!(response.tag_confidences.get("lowres"), Some(0.1));
    assert_eq!(tagger.unload_all(), 1);
}

#[tokio::test]
async fn invalid_interrogator_fails_batch() {
    let dir = tempfile::tempdir().unwrap();
    let tagger = Tagger::with_registry(Config::default(), InterrogatorRegistry::new());
    let err = tagger.run_batch(dir.path(), "wd14").await.unwrap_err();
    assert_eq!(err.to_string(), "Pipeline error: 'wd14' is not a valid interrogator");
}
