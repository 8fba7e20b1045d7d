//! Persisted caption targets: parsing, weighted merging and serialization.
//!
//! A target is a single line of comma-separated tokens. A token is either a
//! bare tag or `(tag:weight)`. When weights are annotated, a trailing bare
//! float records how many interrogations the weights average over (`ict`).
//!
//! ```text
//! (solo:0.93), (long hair:0.71), (smile:0.4), 3.0
//! ```

use crate::postprocess::annotate;
use crate::types::{AggregatedEntry, ConfidenceMap};

/// The contents of an existing target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTarget {
    /// Tags in file order, first occurrence wins
    pub entries: Vec<AggregatedEntry>,

    /// Interrogation count the weights stand for; 0 when there is no
    /// accumulated state
    pub ict: f32,

    /// Parenthesised tokens whose weight did not parse; kept as bare tags
    pub malformed: usize,
}

impl ParsedTarget {
    /// Weights keyed by tag, in file order.
    pub fn weights(&self) -> ConfidenceMap {
        self.entries
            .iter()
            .map(|e| (e.tag.clone(), e.weight))
            .collect()
    }
}

enum Token<'a> {
    Weighted(&'a str, f32),
    Bare(&'a str),
}

/// Parse the text of an existing target. Never fails.
///
/// Bare tokens in a file without any annotated token are legacy output of an
/// unweighted run. They get a linear-decay weight `(n - i) / n` by position
/// and the file counts as one prior interrogation. This is an approximation
/// of the unknown original confidences. Bare tokens mixed with annotated ones
/// are user-added tags and weigh 1.0.
pub fn parse_target(content: &str) -> ParsedTarget {
    let mut raw = split_tokens(content);

    let mut ict = 0.0;
    if let Some(count) = raw.last().and_then(|t| parse_count(t)) {
        ict = count;
        raw.pop();
    }

    let mut malformed = 0;
    let tokens: Vec<Token> = raw
        .iter()
        .map(|t| match split_weighted(t) {
            Some(Ok((tag, weight))) => Token::Weighted(tag, weight),
            Some(Err(())) => {
                malformed += 1;
                Token::Bare(t)
            }
            None => Token::Bare(t),
        })
        .collect();

    let annotated = tokens.iter().any(|t| matches!(t, Token::Weighted(..)));
    let n = tokens.len();
    let mut weights = ConfidenceMap::with_capacity(n);
    for (i, token) in tokens.iter().enumerate() {
        let (tag, weight) = match *token {
            Token::Weighted(tag, weight) => (tag, weight),
            Token::Bare(tag) if annotated => (tag, 1.0),
            Token::Bare(tag) => (tag, (n - i) as f32 / n as f32),
        };
        weights.insert_if_absent(tag, weight);
    }

    if !annotated && n > 0 {
        ict = 1.0;
    }
    if malformed > 0 {
        tracing::debug!("Recovered {malformed} malformed token(s) as bare tags");
    }

    ParsedTarget {
        entries: weights
            .into_iter()
            .map(|(tag, weight)| AggregatedEntry::new(tag, weight))
            .collect(),
        ict,
        malformed,
    }
}

/// The non-empty, trimmed comma-separated tokens of a target, verbatim.
pub fn split_tokens(content: &str) -> Vec<&str> {
    content
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Every token of a target as written, for concatenating unweighted runs.
///
/// Repeats, trailing numbers and `(tag:weight)` wrappers are kept as they
/// are. Weights only order the tokens for a tag cap: annotated tokens keep
/// their weight, bare tokens get `(n - i) / n` when nothing is annotated and
/// 1.0 otherwise.
pub fn plain_entries(content: &str) -> Vec<AggregatedEntry> {
    let tokens = split_tokens(content);
    let weights: Vec<Option<f32>> = tokens
        .iter()
        .map(|t| split_weighted(t).and_then(Result::ok).map(|(_, w)| w))
        .collect();
    let annotated = weights.iter().any(Option::is_some);
    let n = tokens.len();

    tokens
        .iter()
        .zip(weights)
        .enumerate()
        .map(|(i, (token, weight))| {
            let weight = match weight {
                Some(w) => w,
                None if annotated => 1.0,
                None => (n - i) as f32 / n as f32,
            };
            AggregatedEntry::new(*token, weight)
        })
        .collect()
}

fn parse_count(token: &str) -> Option<f32> {
    token
        .parse::<f32>()
        .ok()
        .filter(|c| c.is_finite() && *c >= 0.0)
}

/// `Some(Ok(..))` for `(tag:weight)`, `Some(Err(()))` for a parenthesised
/// token with a colon but no usable weight, `None` for anything else.
fn split_weighted(token: &str) -> Option<Result<(&str, f32), ()>> {
    let inner = token.strip_prefix('(')?.strip_suffix(')')?;
    let (tag, weight) = inner.rsplit_once(':')?;
    if tag.is_empty() {
        return None;
    }
    Some(
        weight
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|w| w.is_finite())
            .map(|w| (tag, w))
            .ok_or(()),
    )
}

/// Fold a fresh result into accumulated weights (online average).
///
/// With `n = old_ict`: tags in both become `(new + old * n) / (n + 1)`, old-only
/// tags `old * n / (n + 1)` and new-only tags `new / (n + 1)`. Returns the
/// merged entries sorted by weight descending and the new count `n + 1`.
pub fn merge(
    old: &[AggregatedEntry],
    new: &ConfidenceMap,
    old_ict: f32,
) -> (Vec<AggregatedEntry>, f32) {
    let denominator = old_ict + 1.0;
    let mut merged = ConfidenceMap::with_capacity(old.len() + new.len());

    for entry in old {
        let fresh = new.get(&entry.tag).unwrap_or(0.0);
        merged.insert_if_absent(
            entry.tag.as_str(),
            (fresh + entry.weight * old_ict) / denominator,
        );
    }
    for (tag, confidence) in new.iter() {
        merged.insert_if_absent(tag, confidence / denominator);
    }

    let entries = merged
        .sorted_by_confidence()
        .into_iter()
        .map(|(tag, weight)| AggregatedEntry::new(tag, weight))
        .collect();
    (entries, denominator)
}

/// Render entries as target text.
///
/// Annotated tokens are `(tag:weight)`. The `ict` trailer, when given, is
/// written with one decimal so it reads back as a count.
pub fn serialize_target(entries: &[AggregatedEntry], ict: Option<f32>, annotate_weight: bool) -> String {
    let mut tokens: Vec<String> = entries
        .iter()
        .map(|e| {
            if annotate_weight {
                annotate(&e.tag, e.weight)
            } else {
                e.tag.clone()
            }
        })
        .collect();
    if let Some(ict) = ict {
        tokens.push(format!("{ict:.1}"));
    }
    tokens.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tag: &str, weight: f32) -> AggregatedEntry {
        AggregatedEntry::new(tag, weight)
    }

    fn map(pairs: &[(&str, f32)]) -> ConfidenceMap {
        pairs.iter().map(|(t, c)| (t.to_string(), *c)).collect()
    }

    #[test]
    fn test_parse_annotated_with_count() {
        let parsed = parse_target("(solo:0.9), (long hair:0.5), 3.0\n");
        assert_eq!(parsed.entries, vec![entry("solo", 0.9), entry("long hair", 0.5)]);
        assert_eq!(parsed.ict, 3.0);
        assert_eq!(parsed.malformed, 0);
    }

    #[test]
    fn test_parse_annotated_without_count() {
        let parsed = parse_target("(solo:0.9)");
        assert_eq!(parsed.ict, 0.0);
        assert_eq!(parsed.entries.len(), 1);
    }

    #[test]
    fn test_parse_empty() {
        let parsed = parse_target("   ");
        assert!(parsed.entries.is_empty());
        assert_eq!(parsed.ict, 0.0);
    }

    #[test]
    fn test_parse_escaped_brackets_in_tag() {
        let parsed = parse_target(r"(ganyu \(genshin impact\):0.75), 1.0");
        assert_eq!(parsed.entries, vec![entry(r"ganyu \(genshin impact\)", 0.75)]);
    }

    // Approximate legacy compatibility: un-annotated files get position-based
    // weights and count as one prior run.
    #[test]
    fn test_parse_legacy_plain_tags_approximate() {
        let parsed = parse_target("a, b, c, d");
        let weights: Vec<f32> = parsed.entries.iter().map(|e| e.weight).collect();
        assert_eq!(weights, vec![1.0, 0.75, 0.5, 0.25]);
        assert_eq!(parsed.ict, 1.0);
    }

    #[test]
    fn test_parse_mixed_bare_tags_weigh_one() {
        let parsed = parse_target("(solo:0.5), masterpiece, 2.0");
        assert_eq!(parsed.entries[1], entry("masterpiece", 1.0));
        assert_eq!(parsed.ict, 2.0);
    }

    #[test]
    fn test_parse_malformed_weight_recovered() {
        let parsed = parse_target("(solo:high), (smile:0.5), 1.0");
        assert_eq!(parsed.malformed, 1);
        assert_eq!(parsed.entries[0], entry("(solo:high)", 1.0));
    }

    #[test]
    fn test_parse_kaomoji_is_bare() {
        let parsed = parse_target("(o)_(o)");
        assert_eq!(parsed.entries[0].tag, "(o)_(o)");
        assert_eq!(parsed.malformed, 0);
    }

    #[test]
    fn test_parse_duplicates_first_wins() {
        let parsed = parse_target("(a:0.9), (a:0.1)");
        assert_eq!(parsed.entries, vec![entry("a", 0.9)]);
    }

    #[test]
    fn test_merge_formulas() {
        let old = vec![entry("both", 0.5), entry("old_only", 0.8)];
        let new = map(&[("both", 0.9), ("new_only", 0.6)]);
        let (merged, ict) = merge(&old, &new, 1.0);
        assert_eq!(ict, 2.0);

        let get = |tag: &str| merged.iter().find(|e| e.tag == tag).unwrap().weight;
        assert!((get("both") - 0.7).abs() < 1e-6);
        assert!((get("old_only") - 0.4).abs() < 1e-6);
        assert!((get("new_only") - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_merge_sorted_descending() {
        let old = vec![entry("a", 0.1)];
        let new = map(&[("b", 0.9)]);
        let (merged, _) = merge(&old, &new, 0.0);
        assert_eq!(merged[0].tag, "b");
        assert_eq!(merged[1].weight, 0.0);
    }

    #[test]
    fn test_merge_from_nothing_is_identity() {
        let new = map(&[("a", 0.9), ("b", 0.4)]);
        let (merged, ict) = merge(&[], &new, 0.0);
        assert_eq!(merged, vec![entry("a", 0.9), entry("b", 0.4)]);
        assert_eq!(ict, 1.0);
    }

    #[test]
    fn test_serialize_annotated_reads_back() {
        let entries = vec![entry("solo", 0.93), entry("long hair", 0.5)];
        let text = serialize_target(&entries, Some(2.0), true);
        assert_eq!(text, "(solo:0.93), (long hair:0.5), 2.0");

        let parsed = parse_target(&text);
        assert_eq!(parsed.entries, entries);
        assert_eq!(parsed.ict, 2.0);
    }

    #[test]
    fn test_serialize_plain() {
        let entries = vec![entry("a", 1.0), entry("b", 0.5)];
        assert_eq!(serialize_target(&entries, None, false), "a, b");
    }

    #[test]
    fn test_plain_entries_keep_every_token() {
        let entries = plain_entries("a, b, a, c, 2");
        let tokens: Vec<&str> = entries.iter().map(|e| e.tag.as_str()).collect();
        assert_eq!(tokens, vec!["a", "b", "a", "c", "2"]);
        assert_eq!(entries[0].weight, 1.0);
        assert!((entries[4].weight - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_plain_entries_keep_annotation_text() {
        let entries = plain_entries("(solo:0.5), extra");
        assert_eq!(entries, vec![entry("(solo:0.5)", 0.5), entry("extra", 1.0)]);
    }
}
