//! The `tagtally batch` command: caption every image in a directory.

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::stdout;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tagtally_core::{BatchReport, ImageOutcome, ImageRecord, OutputWriter, Tagger};

use super::options::{BatchFlags, OutputFormat, PostprocessFlags};
use super::Globals;

/// Arguments for the `batch` command.
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Directory of images (or a single image)
    #[arg(required = true)]
    pub input: PathBuf,

    /// Interrogator to use
    #[arg(short, long)]
    pub interrogator: Option<String>,

    /// Output format; jsonl also streams one record per image
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Number of images processed concurrently
    #[arg(short, long)]
    pub parallel: Option<usize>,

    #[command(flatten)]
    pub batch: BatchFlags,

    #[command(flatten)]
    pub postprocess: PostprocessFlags,
}

/// Execute the batch command.
pub async fn execute(args: BatchArgs, globals: &Globals) -> anyhow::Result<()> {
    let input = PathBuf::from(shellexpand::tilde(&args.input.to_string_lossy()).into_owned());
    if !input.exists() {
        anyhow::bail!(
            "Input path does not exist: {:?}\n\n  Hint: Check the path and try again.",
            input
        );
    }
    args.postprocess.validate()?;

    let mut settings = globals.settings()?;
    args.postprocess.apply(&mut settings.config.postprocess);
    args.batch.apply(&mut settings.config.batch);
    if let Some(parallel) = args.parallel {
        settings.config.processing.parallel_workers = parallel.max(1);
    }

    let tagger = Tagger::new(settings.config);
    let interrogator = globals.pick_interrogator(
        &tagger,
        args.interrogator.as_deref(),
        settings.interrogator.as_deref(),
    )?;

    let total = tagger.batch_jobs(&input).len();
    if total == 0 {
        tracing::warn!("No supported image files found at {:?}", input);
        return Ok(());
    }

    let progress = create_progress_bar(total as u64);
    let stream = matches!(args.format, OutputFormat::Jsonl);
    let writer = Arc::new(Mutex::new(OutputWriter::new(stdout(), args.format.into())));
    let start = Instant::now();

    let on_outcome = {
        let progress = progress.clone();
        let writer = writer.clone();
        move |outcome: &ImageOutcome| {
            if stream {
                let mut writer = writer.lock().unwrap_or_else(|e| e.into_inner());
                if let Err(e) = writer.write(&ImageRecord::from(outcome)) {
                    tracing::warn!("Failed to write record: {e}");
                }
            }
            progress.inc(1);
        }
    };

    let report = tagger.run_batch_with(&input, &interrogator, on_outcome).await;
    progress.finish_and_clear();
    let report = report?;

    print_summary(&report, start.elapsed());
    let mut writer = writer.lock().unwrap_or_else(|e| e.into_inner());
    writer.write(&report)?;
    writer.flush()?;
    tracing::debug!("Wrote {} JSON record(s)", writer.items_written());
    Ok(())
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("##-"));
    }
    pb.set_message("tagging...");
    pb
}

/// Print a formatted summary table after the batch.
fn print_summary(report: &BatchReport, elapsed: std::time::Duration) {
    let total = report.written + report.skipped + report.errored;
    let rate = if elapsed.as_secs_f64() > 0.0 {
        total as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Written:      {:>8}", report.written);
    if report.skipped > 0 {
        eprintln!("    Skipped:      {:>8}", report.skipped);
    }
    if report.errored > 0 {
        eprintln!("    Failed:       {:>8}", report.errored);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", total);
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} img/sec", rate);
    eprintln!("  ====================================");
    for (rating, confidence) in report.ratings.sorted_by_confidence().iter() {
        eprintln!("    {rating:<14}{confidence:>8.3}");
    }
}
