//! Threshold, exclusion and additional-tag rules for one interrogation result.

use std::collections::HashSet;

use regex::{Regex, RegexBuilder};

use crate::config::PostprocessConfig;
use crate::types::ConfidenceMap;

/// Compiled form of `exclude_tags`.
///
/// A leading `/pattern/` element becomes a case-insensitive regex; every
/// other element is an exact tag name.
#[derive(Debug, Clone, Default)]
pub struct ExcludeRules {
    tags: HashSet<String>,
    pattern: Option<Regex>,
}

impl ExcludeRules {
    /// Compile exclusion rules. An invalid regex is logged and dropped.
    pub fn compile(exclude_tags: &[String]) -> Self {
        let mut items = exclude_tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty());
        let mut tags = HashSet::new();
        let mut pattern = None;

        let mut first = items.next();
        if let Some(source) = first.and_then(regex_body) {
            match RegexBuilder::new(source).case_insensitive(true).build() {
                Ok(re) => pattern = Some(re),
                Err(e) => tracing::warn!("Ignoring invalid exclude pattern /{source}/: {e}"),
            }
            first = None;
        }

        tags.extend(first.into_iter().chain(items).map(str::to_string));
        Self { tags, pattern }
    }

    /// Whether `tag` must be dropped.
    pub fn excludes(&self, tag: &str) -> bool {
        self.tags.contains(tag) || self.pattern.as_ref().is_some_and(|re| re.is_match(tag))
    }

    pub fn has_pattern(&self) -> bool {
        self.pattern.is_some()
    }
}

/// The inside of a `/…/` delimited pattern.
fn regex_body(item: &str) -> Option<&str> {
    (item.len() > 2 && item.starts_with('/') && item.ends_with('/')).then(|| &item[1..item.len() - 1])
}

/// Narrow and augment classifier tags.
///
/// Additional tags are seeded at 1.0, classifier scores overlay them, the
/// result is stably sorted (by name, or by confidence descending), and only
/// entries at or above the threshold that are not excluded are kept.
pub fn filter_tags(
    tags: &ConfidenceMap,
    config: &PostprocessConfig,
    exclude: &ExcludeRules,
) -> ConfidenceMap {
    let mut working = ConfidenceMap::with_capacity(config.additional_tags.len() + tags.len());
    for tag in &config.additional_tags {
        let tag = tag.trim();
        if !tag.is_empty() {
            working.insert(tag, 1.0);
        }
    }
    for (tag, confidence) in tags.iter() {
        working.insert(tag, confidence);
    }

    let sorted = if config.sort_alphabetically {
        working.sorted_by(|a, b| a.0.cmp(&b.0))
    } else {
        working.sorted_by_confidence()
    };

    sorted
        .into_iter()
        .filter(|(tag, confidence)| *confidence >= config.threshold && !exclude.excludes(tag))
        .collect()
}
