//! Output filename templates.
//!
//! A template is plain text with `[placeholder]` or `[placeholder:argument]`
//! tokens, resolved per source image:
//!
//! | placeholder          | value                                         |
//! |----------------------|-----------------------------------------------|
//! | `[name]`             | source file stem                              |
//! | `[extension]`        | source extension, no dot                      |
//! | `[hash]`             | sha1 of the source content                    |
//! | `[hash:<algo>]`      | digest with `<algo>` (md5, sha1, sha256, ...) |
//! | `[output_extension]` | sidecar extension, no dot                     |
//!
//! Unknown placeholders are kept verbatim. Templates are validated when
//! parsed, so a bad algorithm fails before any image is touched.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::TemplateError;
use crate::pipeline::hash::{digest_file, HashAlgorithm};

/// Template used when none is configured.
pub const DEFAULT_TEMPLATE: &str = "[name].[output_extension]";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([\w:]+)\]").expect("placeholder pattern is valid"));

/// Per-image values placeholders resolve against.
#[derive(Debug, Clone)]
pub struct FormatContext {
    pub source_path: PathBuf,
    pub output_extension: String,
}

impl FormatContext {
    pub fn new(source_path: impl Into<PathBuf>, output_extension: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            output_extension: output_extension.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Name,
    Extension,
    OutputExtension,
    Hash(HashAlgorithm),
}

/// A parsed output filename template.
#[derive(Debug, Clone, PartialEq)]
pub struct FilenameTemplate {
    segments: Vec<Segment>,
}

impl FilenameTemplate {
    /// Parse and validate a template. A blank template means
    /// [`DEFAULT_TEMPLATE`].
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let template = match template.trim() {
            "" => DEFAULT_TEMPLATE,
            t => t,
        };

        let mut segments = Vec::new();
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(template) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                segments.push(Segment::Literal(template[last..whole.start()].to_string()));
            }
            segments.push(parse_placeholder(whole.as_str(), inner.as_str())?);
            last = whole.end();
        }
        if last < template.len() {
            segments.push(Segment::Literal(template[last..].to_string()));
        }

        Ok(Self { segments })
    }

    /// Whether resolving reads the source file.
    pub fn needs_content(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Hash(_)))
    }

    /// Substitute every placeholder for one source image.
    pub fn resolve(&self, ctx: &FormatContext) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Name => out.push_str(&os_part(ctx.source_path.file_stem())),
                Segment::Extension => out.push_str(&os_part(ctx.source_path.extension())),
                Segment::OutputExtension => out.push_str(&ctx.output_extension),
                Segment::Hash(algorithm) => {
                    let digest = digest_file(&ctx.source_path, *algorithm).map_err(|e| {
                        TemplateError::SourceUnreadable {
                            path: ctx.source_path.clone(),
                            message: e.to_string(),
                        }
                    })?;
                    out.push_str(&digest);
                }
            }
        }
        Ok(out)
    }
}

/// Parse and resolve in one step.
pub fn resolve(template: &str, ctx: &FormatContext) -> Result<String, TemplateError> {
    FilenameTemplate::parse(template)?.resolve(ctx)
}

fn parse_placeholder(whole: &str, inner: &str) -> Result<Segment, TemplateError> {
    let mut parts = inner.split(':');
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    let no_args = |segment: Segment| match args.first() {
        Some(arg) => Err(TemplateError::UnexpectedArgument {
            placeholder: name.to_string(),
            argument: arg.to_string(),
        }),
        None => Ok(segment),
    };

    match name {
        "name" => no_args(Segment::Name),
        "extension" => no_args(Segment::Extension),
        "output_extension" => no_args(Segment::OutputExtension),
        "hash" => match args.as_slice() {
            [] => Ok(Segment::Hash(HashAlgorithm::Sha1)),
            [algorithm] => algorithm
                .parse()
                .map(Segment::Hash)
                .map_err(|_| TemplateError::UnsupportedHash {
                    algorithm: algorithm.to_string(),
                    available: HashAlgorithm::available(),
                }),
            [_, extra, ..] => Err(TemplateError::UnexpectedArgument {
                placeholder: name.to_string(),
                argument: extra.to_string(),
            }),
        },
        _ => Ok(Segment::Literal(whole.to_string())),
    }
}

fn os_part(part: Option<&std::ffi::OsStr>) -> String {
    part.map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}
