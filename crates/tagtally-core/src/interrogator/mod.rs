//! Classifier backends.
//!
//! An [`Interrogator`] turns a decoded image into raw `(ratings, tags)`
//! confidences. Backends are registered by name in an
//! [`InterrogatorRegistry`] owned by the caller; there is no global state.

pub(crate) mod score_dump;

pub use score_dump::ScoreDumpInterrogator;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::DecodedImage;
use crate::types::InterrogationResult;

/// An image classifier.
///
/// `interrogate` is synchronous and may be slow; callers run it on a
/// blocking thread.
pub trait Interrogator: Send + Sync {
    /// Registry name.
    fn name(&self) -> &str;

    /// Prepare the backend. Called before the first interrogation of a run;
    /// must be cheap when already loaded.
    fn load(&self) -> PipelineResult<()>;

    /// Score one image.
    fn interrogate(&self, image: &DecodedImage) -> PipelineResult<InterrogationResult>;

    /// Release resources. Returns whether anything was loaded.
    fn unload(&self) -> bool;
}

/// Named interrogators available to a [`crate::Tagger`].
#[derive(Default, Clone)]
pub struct InterrogatorRegistry {
    backends: BTreeMap<String, Arc<dyn Interrogator>>,
}

impl InterrogatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under its own name, replacing any previous one.
    pub fn register(&mut self, interrogator: Arc<dyn Interrogator>) {
        let name = interrogator.name().to_string();
        if self.backends.insert(name.clone(), interrogator).is_some() {
            tracing::warn!("Interrogator '{name}' registered twice, keeping the latest");
        }
    }

    /// Look up a backend by name.
    pub fn get(&self, name: &str) -> PipelineResult<Arc<dyn Interrogator>> {
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::InvalidInterrogator(name.to_string()))
    }

    /// Look up and load a backend.
    pub fn load(&self, name: &str) -> PipelineResult<Arc<dyn Interrogator>> {
        let interrogator = self.get(name)?;
        interrogator.load()?;
        Ok(interrogator)
    }

    /// Unload one backend. Returns whether it had been loaded.
    pub fn unload(&self, name: &str) -> PipelineResult<bool> {
        Ok(self.get(name)?.unload())
    }

    /// Unload every backend and return how many were loaded.
    pub fn unload_all(&self) -> usize {
        let unloaded = self.backends.values().filter(|i| i.unload()).count();
        tracing::debug!("Unloaded {unloaded} interrogator(s)");
        unloaded
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.backends.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl std::fmt::Debug for InterrogatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.backends.keys()).finish()
    }
}
