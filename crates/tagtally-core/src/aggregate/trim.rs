//! Final shaping of a target's tag list: top-N cap and duplicate removal.

use std::collections::HashSet;

use crate::types::AggregatedEntry;

/// Keep the `limit` highest-weight entries. Ties go to the earlier entry.
/// Survivors keep their relative order.
pub fn cap_top_n(entries: Vec<AggregatedEntry>, limit: usize) -> Vec<AggregatedEntry> {
    if entries.len() <= limit {
        return entries;
    }

    let mut ranked: Vec<usize> = (0..entries.len()).collect();
    ranked.sort_by(|&a, &b| entries[b].weight.total_cmp(&entries[a].weight));
    let keep: HashSet<usize> = ranked.into_iter().take(limit).collect();

    entries
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep.contains(i))
        .map(|(_, e)| e)
        .collect()
}

/// Drop repeated tags, keeping the first occurrence.
pub fn dedup(entries: Vec<AggregatedEntry>) -> Vec<AggregatedEntry> {
    let mut seen = HashSet::with_capacity(entries.len());
    entries
        .into_iter()
        .filter(|e| seen.insert(e.tag.clone()))
        .collect()
}
