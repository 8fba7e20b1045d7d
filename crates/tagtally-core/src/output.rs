//! JSON and JSON Lines output of responses, reports and per-image records.

use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::pipeline::{ImageOutcome, ImageStatus};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One pretty JSON document
    #[default]
    Json,
    /// One compact JSON object per line
    JsonLines,
}

/// Serializes items to a writer in one [`OutputFormat`].
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    items_written: usize,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer,
            format,
            items_written: 0,
        }
    }

    /// Write one item followed by a newline.
    pub fn write<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => serde_json::to_writer_pretty(&mut self.writer, item),
            OutputFormat::JsonLines => serde_json::to_writer(&mut self.writer, item),
        }
        .map_err(io::Error::other)?;
        writeln!(self.writer)?;
        self.items_written += 1;
        Ok(())
    }

    pub fn items_written(&self) -> usize {
        self.items_written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Serializable view of an [`ImageOutcome`].
#[derive(Debug, Clone, Serialize)]
pub struct ImageRecord {
    pub source: PathBuf,
    pub target: PathBuf,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ImageOutcome> for ImageRecord {
    fn from(outcome: &ImageOutcome) -> Self {
        let (status, error) = match &outcome.status {
            ImageStatus::Written => ("written", None),
            ImageStatus::Skipped => ("skipped", None),
            ImageStatus::Errored(e) => ("errored", Some(e.clone())),
        };
        Self {
            source: outcome.source.clone(),
            target: outcome.target.clone(),
            status,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InterrogateResponse;

    #[test]
    fn test_jsonl_is_one_line_per_item() {
        let mut buffer = Vec::new();
        let mut writer = OutputWriter::new(&mut buffer, OutputFormat::JsonLines);
        writer.write(&InterrogateResponse::default()).unwrap();
        writer.write(&InterrogateResponse::from_error("boom")).unwrap();
        assert_eq!(writer.items_written(), 2);

        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = output.trim().split('\n').collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"error\":\"boom\""));
    }

    #[test]
    fn test_record_from_errored_outcome() {
        let outcome = ImageOutcome {
            source: PathBuf::from("a.png"),
            target: PathBuf::from("a.txt"),
            status: ImageStatus::Errored("bad".into()),
            weights: None,
            ratings: None,
        };
        let json = serde_json::to_string(&ImageRecord::from(&outcome)).unwrap();
        assert_eq!(
            json,
            r#"{"source":"a.png","target":"a.txt","status":"errored","error":"bad"}"#
        );
    }
}
