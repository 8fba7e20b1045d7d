//! Tag post-processing: filtering, renaming and rendering classifier output.
//!
//! - **filter**: threshold, exclusions and additional tags
//! - **transform**: underscore replacement, bracket escaping, weight annotation
//! - **rename**: ordered regex search/replace for the `filter` policy

pub mod filter;
pub mod rename;
pub mod transform;

pub use filter::{filter_tags, ExcludeRules};
pub use rename::RenameRules;
pub use transform::{annotate, render, transform_name};

use crate::config::PostprocessConfig;
use crate::types::ConfidenceMap;

/// A [`PostprocessConfig`] with its exclusion rules compiled once.
#[derive(Debug, Clone)]
pub struct Postprocessor {
    config: PostprocessConfig,
    exclude: ExcludeRules,
}

impl Postprocessor {
    pub fn new(config: PostprocessConfig) -> Self {
        let exclude = ExcludeRules::compile(&config.exclude_tags);
        Self { config, exclude }
    }

    pub fn config(&self) -> &PostprocessConfig {
        &self.config
    }

    pub fn exclude(&self) -> &ExcludeRules {
        &self.exclude
    }

    /// Filter classifier tags, keeping the raw tag names.
    pub fn filter(&self, tags: &ConfidenceMap) -> ConfidenceMap {
        filter_tags(tags, &self.config, &self.exclude)
    }

    /// Filter and transform names, without weight annotation.
    ///
    /// This is the form accumulated into persisted targets. Names that
    /// collide after transformation keep the later confidence.
    pub fn names(&self, tags: &ConfidenceMap) -> ConfidenceMap {
        self.filter(tags)
            .into_iter()
            .map(|(tag, confidence)| (transform_name(&tag, &self.config), confidence))
            .collect()
    }

    /// Filter and fully render tags. Rendered strings are the keys.
    pub fn process(&self, tags: &ConfidenceMap) -> ConfidenceMap {
        self.filter(tags)
            .into_iter()
            .map(|(tag, confidence)| (render(&tag, confidence, &self.config), confidence))
            .collect()
    }

    /// `process` joined into a caption string.
    pub fn caption(&self, tags: &ConfidenceMap) -> String {
        self.process(tags).labels().collect::<Vec<_>>().join(", ")
    }
}

/// Filter and render in one step, compiling the rules for this call only.
pub fn postprocess_tags(tags: &ConfidenceMap, config: &PostprocessConfig) -> ConfidenceMap {
    Postprocessor::new(config.clone()).process(tags)
}
