//! Interrogator that replays pre-computed classifier scores from disk.
//!
//! Scores for `cat.png` live in `<dir>/cat.json`, in the sidecar form
//! `[ratings, tags]` or as `{"ratings": ..., "tags": ...}`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use super::Interrogator;
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::DecodedImage;
use crate::types::InterrogationResult;

/// Reads per-image score dumps from a directory.
#[derive(Debug)]
pub struct ScoreDumpInterrogator {
    name: String,
    dir: PathBuf,
    loaded: AtomicBool,
}

impl ScoreDumpInterrogator {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            loaded: AtomicBool::new(false),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn dump_path(&self, image: &DecodedImage) -> PipelineResult<PathBuf> {
        let stem = image.stem().ok_or_else(|| PipelineError::Interrogation {
            path: image.path.clone(),
            message: "source has no usable file name".to_string(),
        })?;
        Ok(self.dir.join(format!("{stem}.json")))
    }
}

impl Interrogator for ScoreDumpInterrogator {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> PipelineResult<()> {
        if self.loaded.load(Ordering::SeqCst) {
            return Ok(());
        }
        if !self.dir.is_dir() {
            return Err(PipelineError::Load {
                name: self.name.clone(),
                message: format!("score directory {:?} does not exist", self.dir),
            });
        }
        tracing::info!("Loaded interrogator '{}' from {:?}", self.name, self.dir);
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn interrogate(&self, image: &DecodedImage) -> PipelineResult<InterrogationResult> {
        let path = self.dump_path(image)?;
        let content = std::fs::read_to_string(&path).map_err(|e| PipelineError::Interrogation {
            path: image.path.clone(),
            message: format!("cannot read scores {path:?}: {e}"),
        })?;
        serde_json::from_str(&content).map_err(|e| PipelineError::Interrogation {
            path: image.path.clone(),
            message: format!("invalid scores {path:?}: {e}"),
        })
    }

    fn unload(&self) -> bool {
        self.loaded.swap(false, Ordering::SeqCst)
    }
}
