//! Incremental aggregation of tag weights across interrogations.
//!
//! - **store**: parse and serialize persisted targets, weighted merge
//! - **trim**: top-N cap and duplicate removal
//! - **summary**: batch-wide averages

pub mod store;
pub mod summary;
pub mod trim;

pub use store::{merge, parse_target, plain_entries, serialize_target, ParsedTarget};
pub use summary::{BatchSummary, SummaryView, RATING_PREFIX};
pub use trim::{cap_top_n, dedup};
