//! Core data types shared by the post-processing and aggregation stages.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// An insertion-ordered mapping from label to confidence.
///
/// Keys are unique. Inserting an existing key overwrites its confidence but
/// keeps the position of the first insertion, so iteration order is always
/// the order in which labels were first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfidenceMap {
    entries: Vec<(String, f32)>,
    index: HashMap<String, usize>,
}

impl ConfidenceMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty map with room for `capacity` labels.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Insert or overwrite a label. Returns the previous confidence, if any.
    pub fn insert(&mut self, label: impl Into<String>, confidence: f32) -> Option<f32> {
        let label = label.into();
        match self.index.get(&label) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, confidence)),
            None => {
                self.index.insert(label.clone(), self.entries.len());
                self.entries.push((label, confidence));
                None
            }
        }
    }

    /// Insert a label only if it is not present yet. Returns whether it was inserted.
    pub fn insert_if_absent(&mut self, label: impl Into<String>, confidence: f32) -> bool {
        let label = label.into();
        if self.index.contains_key(&label) {
            return false;
        }
        self.index.insert(label.clone(), self.entries.len());
        self.entries.push((label, confidence));
        true
    }

    /// Add `confidence` to a label's value, inserting it at zero first if absent.
    pub fn accumulate(&mut self, label: &str, confidence: f32) {
        match self.index.get(label) {
            Some(&i) => self.entries[i].1 += confidence,
            None => {
                self.insert(label, confidence);
            }
        }
    }

    pub fn get(&self, label: &str) -> Option<f32> {
        self.index.get(label).map(|&i| self.entries[i].1)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(label, confidence)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> + '_ {
        self.entries.iter().map(|(l, c)| (l.as_str(), *c))
    }

    /// Iterate labels in insertion order.
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    /// Return a copy with entries re-ordered by `compare` (stable).
    pub fn sorted_by<F>(&self, mut compare: F) -> Self
    where
        F: FnMut(&(String, f32), &(String, f32)) -> std::cmp::Ordering,
    {
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| compare(a, b));
        entries.into_iter().collect()
    }

    /// Return a copy sorted by confidence descending, ties kept in insertion order.
    pub fn sorted_by_confidence(&self) -> Self {
        self.sorted_by(|a, b| b.1.total_cmp(&a.1))
    }
}

impl FromIterator<(String, f32)> for ConfidenceMap {
    fn from_iter<I: IntoIterator<Item = (String, f32)>>(iter: I) -> Self {
        let mut map = ConfidenceMap::new();
        map.extend(iter);
        map
    }
}

impl Extend<(String, f32)> for ConfidenceMap {
    fn extend<I: IntoIterator<Item = (String, f32)>>(&mut self, iter: I) {
        for (label, confidence) in iter {
            self.insert(label, confidence);
        }
    }
}

impl IntoIterator for ConfidenceMap {
    type Item = (String, f32);
    type IntoIter = std::vec::IntoIter<(String, f32)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for ConfidenceMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, confidence) in &self.entries {
            map.serialize_entry(label, confidence)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ConfidenceMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MapVisitor;

        impl<'de> Visitor<'de> for MapVisitor {
            type Value = ConfidenceMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of label to confidence")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = ConfidenceMap::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((label, confidence)) = access.next_entry::<String, f32>()? {
                    map.insert(label, confidence);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(MapVisitor)
    }
}

/// The raw output of one classifier call for one image.
///
/// Serialises as the two-element array `[ratings, tags]`, which is also the
/// structured sidecar format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawScores", into = "(ConfidenceMap, ConfidenceMap)")]
pub struct InterrogationResult {
    /// Mutually exclusive rating categories (general, sensitive, ...)
    pub ratings: ConfidenceMap,

    /// Open vocabulary of descriptive tags
    pub tags: ConfidenceMap,
}

impl From<InterrogationResult> for (ConfidenceMap, ConfidenceMap) {
    fn from(result: InterrogationResult) -> Self {
        (result.ratings, result.tags)
    }
}

/// Accepted on-disk shapes for raw scores.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawScores {
    Pair(ConfidenceMap, ConfidenceMap),
    Named {
        #[serde(default)]
        ratings: ConfidenceMap,
        #[serde(default)]
        tags: ConfidenceMap,
    },
}

impl From<RawScores> for InterrogationResult {
    fn from(raw: RawScores) -> Self {
        match raw {
            RawScores::Pair(ratings, tags) | RawScores::Named { ratings, tags } => {
                Self { ratings, tags }
            }
        }
    }
}

/// One tag of an accumulated caption together with its weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedEntry {
    pub tag: String,
    pub weight: f32,
}

impl AggregatedEntry {
    pub fn new(tag: impl Into<String>, weight: f32) -> Self {
        Self {
            tag: tag.into(),
            weight,
        }
    }
}

/// What to do when a batch target already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Keep the existing target untouched
    #[default]
    Ignore,
    /// Overwrite the existing target with a fresh result
    #[serde(alias = "copy")]
    Replace,
    /// Merge new tags after (or into) the existing ones
    Append,
    /// Merge new tags before (or into) the existing ones
    Prepend,
    /// Rewrite the existing target without interrogating
    Filter,
}

impl ConflictPolicy {
    /// Whether this policy needs fresh classifier output.
    pub fn interrogates(self) -> bool {
        !matches!(self, Self::Filter)
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ignore => "ignore",
            Self::Replace => "replace",
            Self::Append => "append",
            Self::Prepend => "prepend",
            Self::Filter => "filter",
        };
        f.write_str(name)
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "replace" | "copy" => Ok(Self::Replace),
            "append" => Ok(Self::Append),
            "prepend" => Ok(Self::Prepend),
            "filter" => Ok(Self::Filter),
            other => Err(format!("unknown conflict policy '{other}'")),
        }
    }
}

/// Result of interrogating a single image, shaped for UI callers.
///
/// Failures are carried in `error` next to empty result fields instead of
/// being raised.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterrogateResponse {
    /// Post-processed tags joined with `", "`
    pub tags: String,

    /// Raw rating confidences
    pub ratings: ConfidenceMap,

    /// Raw tag confidences
    pub tag_confidences: ConfidenceMap,

    /// Empty on success
    pub error: String,
}

impl InterrogateResponse {
    pub fn from_error(error: impl fmt::Display) -> Self {
        Self {
            error: error.to_string(),
            ..Default::default()
        }
    }
}

/// Aggregate result of a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// Tags whose averaged weight clears the threshold, joined with `", "`
    pub tags: String,

    /// Averaged rating confidences
    pub ratings: ConfidenceMap,

    /// Averaged tag weights clearing half the threshold
    pub tag_confidences: ConfidenceMap,

    /// Targets written
    pub written: usize,

    /// Images skipped (existing target under `ignore`, nothing to filter)
    pub skipped: usize,

    /// Images that failed
    pub errored: usize,
}
