//! Atomic target and sidecar writes.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::PipelineError;
use crate::types::InterrogationResult;

/// Replace `path` with `content` in one step.
///
/// The content goes to a temp file in the same directory, which is then
/// renamed over the target, so readers see the old or the new file, never a
/// partial one.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), PipelineError> {
    let write_err = |message: String| PipelineError::Write {
        path: path.to_path_buf(),
        message,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| write_err(e.to_string()))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| write_err(e.to_string()))?;
    tmp.write_all(content).map_err(|e| write_err(e.to_string()))?;
    tmp.flush().map_err(|e| write_err(e.to_string()))?;
    tmp.persist(path).map_err(|e| write_err(e.error.to_string()))?;
    Ok(())
}

/// Sidecar path for a target: same location, `.json` extension.
pub fn sidecar_path(target: &Path) -> PathBuf {
    target.with_extension("json")
}

/// Write the raw classifier output as `[ratings, tags]` next to `target`.
pub fn write_sidecar(target: &Path, result: &InterrogationResult) -> Result<PathBuf, PipelineError> {
    let path = sidecar_path(target);
    let json = serde_json::to_vec(result).map_err(|e| PipelineError::Write {
        path: path.clone(),
        message: e.to_string(),
    })?;
    write_atomic(&path, &json)?;
    Ok(path)
}
