/// Grouping trait and key selection.
pub mod grouping;
/// Incremental per-group recompute tracker.
pub mod tracker;
