//! Batch pipeline components.
//!
//! - **decode**: Load and decode source images
//! - **discovery**: Find image files in directories
//! - **hash**: Content digests for filename templates
//! - **locks**: Per-target serialization
//! - **writer**: Atomic target and sidecar writes
//! - **coordinator**: Orchestrates a batch and its summary

pub mod coordinator;
pub mod decode;
pub mod discovery;
pub mod hash;
pub mod locks;
pub mod writer;

pub use coordinator::{BatchCoordinator, BatchJob, ImageOutcome, ImageStatus, OUTPUT_EXTENSION};
pub use decode::DecodedImage;
pub use discovery::{DiscoveredFile, FileDiscovery};
pub use hash::HashAlgorithm;
pub use locks::TargetLocks;
pub use writer::{sidecar_path, write_atomic, write_sidecar};
