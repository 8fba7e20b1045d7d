//! Finding source images in a batch input directory.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Discovers supported image files.
pub struct FileDiscovery {
    supported_formats: Vec<String>,
    recursive: bool,
}

/// An image found under a batch input directory.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredFile {
    /// Full path to the file
    pub path: PathBuf,
    /// Directory of the file relative to the input root (empty at the top)
    pub relative_dir: PathBuf,
}

impl FileDiscovery {
    pub fn new(supported_formats: &[String], recursive: bool) -> Self {
        Self {
            supported_formats: supported_formats.iter().map(|f| f.to_lowercase()).collect(),
            recursive,
        }
    }

    /// Discover supported images at a path.
    ///
    /// A file is returned on its own if supported. A directory is scanned
    /// one level deep, or fully when `recursive` is set. Results are sorted
    /// by path.
    pub fn discover(&self, path: &Path) -> Vec<DiscoveredFile> {
        if path.is_file() {
            if self.is_supported(path) {
                return vec![DiscoveredFile {
                    path: path.to_path_buf(),
                    relative_dir: PathBuf::new(),
                }];
            }
            return vec![];
        }

        let mut walker = WalkDir::new(path).follow_links(true);
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        let mut files: Vec<DiscoveredFile> = walker
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && self.is_supported(e.path()))
            .map(|e| {
                let relative_dir = e
                    .path()
                    .parent()
                    .and_then(|p| p.strip_prefix(path).ok())
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                DiscoveredFile {
                    path: e.into_path(),
                    relative_dir,
                }
            })
            .collect();

        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    /// Check if a file has a supported extension.
    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.supported_formats.iter().any(|fmt| *fmt == ext)
            })
            .unwrap_or(false)
    }
}
