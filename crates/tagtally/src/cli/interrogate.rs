//! The `tagtally interrogate` command for a single image.

use clap::Args;
use std::io::stdout;
use std::path::PathBuf;

use tagtally_core::{OutputWriter, Tagger};

use super::options::{OutputFormat, PostprocessFlags};
use super::Globals;

/// Arguments for the `interrogate` command.
#[derive(Args, Debug)]
pub struct InterrogateArgs {
    /// Image file to interrogate
    #[arg(required = true)]
    pub image: PathBuf,

    /// Interrogator to use
    #[arg(short, long)]
    pub interrogator: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Unload the interrogator afterwards
    #[arg(long)]
    pub unload_after_run: bool,

    #[command(flatten)]
    pub postprocess: PostprocessFlags,
}

/// Execute the interrogate command.
pub async fn execute(args: InterrogateArgs, globals: &Globals) -> anyhow::Result<()> {
    args.postprocess.validate()?;
    let mut settings = globals.settings()?;
    args.postprocess.apply(&mut settings.config.postprocess);
    settings.config.batch.unload_after_run |= args.unload_after_run;

    let tagger = Tagger::new(settings.config);
    let interrogator = globals.pick_interrogator(
        &tagger,
        args.interrogator.as_deref(),
        settings.interrogator.as_deref(),
    )?;

    let image = PathBuf::from(shellexpand::tilde(&args.image.to_string_lossy()).into_owned());
    let response = tagger.interrogate_response(&image, &interrogator).await;

    let mut writer = OutputWriter::new(stdout().lock(), args.format.into());
    writer.write(&response)?;
    writer.flush()?;

    if !response.error.is_empty() {
        anyhow::bail!("{}", response.error);
    }
    Ok(())
}
