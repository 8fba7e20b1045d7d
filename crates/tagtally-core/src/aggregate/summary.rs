//! Batch-wide accumulation of per-image weights.

use crate::types::{BatchReport, ConfidenceMap};

/// Namespace prefix for rating categories inside a [`BatchSummary`].
pub const RATING_PREFIX: &str = "rating:";

/// Running sums of per-image weights over a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    totals: ConfidenceMap,
    images: usize,
}

/// A finalized summary split into rating and tag buckets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryView {
    /// Averaged rating confidences
    pub ratings: ConfidenceMap,

    /// Averaged tag weights at or above half the threshold
    pub tag_confidences: ConfidenceMap,

    /// Tags at or above the threshold, highest weight first
    pub tags: Vec<String>,
}

impl BatchSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one image's tag weights and, if the classifier ran, its ratings.
    pub fn fold(&mut self, tags: &ConfidenceMap, ratings: Option<&ConfidenceMap>) {
        for (tag, weight) in tags.iter() {
            self.totals.accumulate(tag, weight);
        }
        for (rating, confidence) in ratings.into_iter().flat_map(|r| r.iter()) {
            self.totals
                .accumulate(&format!("{RATING_PREFIX}{rating}"), confidence);
        }
        self.images += 1;
    }

    /// Number of images folded so far.
    pub fn images(&self) -> usize {
        self.images
    }

    /// Average by image count and split into buckets.
    pub fn finalize(&self, threshold: f32) -> SummaryView {
        let mut view = SummaryView::default();
        if self.images == 0 {
            return view;
        }

        let count = self.images as f32;
        let averaged = self.totals.sorted_by_confidence();
        for (key, total) in averaged.iter() {
            let weight = total / count;
            if let Some(rating) = key.strip_prefix(RATING_PREFIX) {
                view.ratings.insert(rating, weight);
                continue;
            }
            if weight >= threshold {
                view.tags.push(key.to_string());
            }
            if weight >= threshold / 2.0 {
                view.tag_confidences.insert(key, weight);
            }
        }
        view
    }

    /// Fill the aggregate fields of a batch report.
    pub fn into_report(self, threshold: f32, written: usize, skipped: usize, errored: usize) -> BatchReport {
        let view = self.finalize(threshold);
        BatchReport {
            tags: view.tags.join(", "),
            ratings: view.ratings,
            tag_confidences: view.tag_confidences,
            written,
            skipped,
            errored,
        }
    }
}
