//! Ordered regex search/replace renaming used by the `filter` policy.

use regex::Regex;

use crate::error::ConfigError;
use crate::types::{AggregatedEntry, ConfidenceMap};

/// Paired search patterns and replacements. The first matching pattern wins.
#[derive(Debug, Clone, Default)]
pub struct RenameRules {
    rules: Vec<(Regex, String)>,
}

impl RenameRules {
    /// Pair `search` with `replace` one to one.
    ///
    /// Lists of unequal length or an invalid pattern are rejected; callers
    /// log the error and run without renaming.
    pub fn compile(search: &[String], replace: &[String]) -> Result<Self, ConfigError> {
        if search.len() != replace.len() {
            return Err(ConfigError::Mismatch {
                search: search.len(),
                replace: replace.len(),
            });
        }

        let rules = search
            .iter()
            .zip(replace)
            .map(|(pattern, replacement)| {
                Regex::new(pattern)
                    .map(|re| (re, replacement.clone()))
                    .map_err(|e| ConfigError::InvalidPattern {
                        pattern: pattern.clone(),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rename a single tag, or return it unchanged when no pattern matches.
    pub fn rename(&self, tag: &str) -> String {
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(tag))
            .map(|(re, replacement)| re.replace_all(tag, replacement.as_str()).into_owned())
            .unwrap_or_else(|| tag.to_string())
    }

    /// Rename every entry. Entries that end up with the same name are merged
    /// at the first one's position with their weights summed.
    pub fn apply(&self, entries: Vec<AggregatedEntry>) -> Vec<AggregatedEntry> {
        if self.rules.is_empty() {
            return entries;
        }

        let mut merged = ConfidenceMap::with_capacity(entries.len());
        for entry in entries {
            merged.accumulate(&self.rename(&entry.tag), entry.weight);
        }
        merged
            .into_iter()
            .map(|(tag, weight)| AggregatedEntry::new(tag, weight))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unequal_lists_rejected() {
        let err = RenameRules::compile(&strings(&["a", "b"]), &strings(&["c"])).unwrap_err();
        assert!(matches!(err, ConfigError::Mismatch { search: 2, replace: 1 }));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = RenameRules::compile(&strings(&["(oops"]), &strings(&["x"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_first_matching_pattern_wins() {
        let rules =
            RenameRules::compile(&strings(&["hair$", "long"]), &strings(&["locks", "short"]))
                .unwrap();
        assert_eq!(rules.rename("long hair"), "long locks");
        assert_eq!(rules.rename("long legs"), "short legs");
        assert_eq!(rules.rename("smile"), "smile");
    }

    #[test]
    fn test_capture_groups_in_replacement() {
        let rules = RenameRules::compile(&strings(&[r"^(\w+) eyes$"]), &strings(&["eyes: $1"]))
            .unwrap();
        assert_eq!(rules.rename("blue eyes"), "eyes: blue");
    }

    #[test]
    fn test_collisions_sum_weights() {
        let rules = RenameRules::compile(&strings(&["^grin$"]), &strings(&["smile"])).unwrap();
        let entries = vec![
            AggregatedEntry::new("smile", 0.5),
            AggregatedEntry::new("solo", 0.4),
            AggregatedEntry::new("grin", 0.25),
        ];
        let out = rules.apply(entries);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], AggregatedEntry::new("smile", 0.75));
        assert_eq!(out[1].tag, "solo");
    }
}
