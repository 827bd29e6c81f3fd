use std::hash::Hash;

use crate::model::contest::ContestInfo;
use crate::model::run::RunInfo;

/// A grouped-run computation: key selection plus per-group derivation.
///
/// `key_of` returning `None` leaves a run untracked; it passes through the
/// owning stage untouched. `transform` receives the group's runs ordered by
/// `(time, id)` and must return the same runs in the same order with derived
/// fields rewritten; returning value-identical runs means no downstream work.
pub trait RunGrouping: Send + 'static {
    /// Group key type.
    type Key: Clone + Eq + Hash + Send;

    /// Key of the group a run belongs to, or `None` to leave it untracked.
    fn key_of(&self, run: &RunInfo, info: Option<&ContestInfo>) -> Option<Self::Key>;

    /// Re-derives the group's runs. Must preserve membership and order.
    fn transform(
        &self,
        key: &Self::Key,
        runs: Vec<RunInfo>,
        info_before: Option<&ContestInfo>,
        info_after: Option<&ContestInfo>,
    ) -> Vec<RunInfo>;

    /// Whether a contest-info change requires recomputing this group even
    /// without a new run.
    fn needs_recompute(
        &self,
        _new_info: &ContestInfo,
        _old_info: Option<&ContestInfo>,
        _key: &Self::Key,
    ) -> bool {
        false
    }

    /// Strips this grouping's derived marks from a run leaving tracking.
    fn clear_marks(&self, run: RunInfo) -> RunInfo {
        run
    }
}
