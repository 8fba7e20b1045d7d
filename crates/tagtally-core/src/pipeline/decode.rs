//! Image decoding with content-based format detection.

use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// A decoded source image handed to an interrogator.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// Source file the image was read from
    pub path: PathBuf,
    /// The decoded image data
    pub image: DynamicImage,
    /// Detected image format
    pub format: ImageFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl DecodedImage {
    /// Decode an image file on a blocking thread.
    pub async fn open(path: &Path) -> Result<Self, PipelineError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| unreadable(path, e))?;
        let path_owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::from_bytes(bytes, &path_owned))
            .await
            .map_err(|e| PipelineError::UnreadableImage {
                path: path.to_path_buf(),
                message: format!("Task join error: {e}"),
            })?
    }

    /// Decode in-memory bytes. The format is sniffed from content first and
    /// falls back to the file extension.
    pub fn from_bytes(bytes: Vec<u8>, path: &Path) -> Result<Self, PipelineError> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| unreadable(path, e))?;
        let format = match reader.format() {
            Some(f) => f,
            None => ImageFormat::from_path(path).map_err(|e| unreadable(path, e))?,
        };
        let image = reader.decode().map_err(|e| unreadable(path, e))?;

        let (width, height) = image.dimensions();
        Ok(Self {
            path: path.to_path_buf(),
            image,
            format,
            width,
            height,
        })
    }

    /// File stem of the source, used to look up per-image data.
    pub fn stem(&self) -> Option<&str> {
        self.path.file_stem().and_then(|s| s.to_str())
    }
}

fn unreadable(path: &Path, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::UnreadableImage {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
