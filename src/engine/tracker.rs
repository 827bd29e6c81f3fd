use std::sync::Arc;

use hashbrown::HashMap;

use crate::engine::grouping::RunGrouping;
use crate::model::contest::ContestInfo;
use crate::model::run::RunInfo;
use crate::types::RunId;

/// Incremental grouped-run recompute engine.
///
/// Maintains, per group key, the transformed runs ordered by `(time, id)`,
/// plus a run-id reverse map. Emits exactly the runs whose derived value
/// changed, and always the triggering run.
pub struct GroupedRunTracker<G: RunGrouping> {
    grouping: G,
    groups: HashMap<G::Key, Vec<RunInfo>>,
    run_keys: HashMap<RunId, G::Key>,
    info: Option<Arc<ContestInfo>>,
}

impl<G: RunGrouping> GroupedRunTracker<G> {
    /// Empty tracker for the given grouping.
    pub fn new(grouping: G) -> Self {
        Self {
            grouping,
            groups: HashMap::new(),
            run_keys: HashMap::new(),
            info: None,
        }
    }

    /// Latest contest info seen by the tracker.
    pub fn info(&self) -> Option<&Arc<ContestInfo>> {
        self.info.as_ref()
    }

    /// Current transformed runs of one group.
    pub fn group(&self, key: &G::Key) -> Option<&[RunInfo]> {
        self.groups.get(key).map(|list| list.as_slice())
    }

    /// Number of tracked runs.
    pub fn tracked_len(&self) -> usize {
        self.run_keys.len()
    }

    /// Applies the latest value of a run. The run mutation is applied first,
    /// then the affected groups are recomputed.
    pub fn process_run(&mut self, run: RunInfo) -> Vec<RunInfo> {
        let info = self.info.clone();
        let info_ref = info.as_deref();
        let new_key = self.grouping.key_of(&run, info_ref);
        let old_key = self.run_keys.get(&run.id).cloned();
        let mut emitted = Vec::new();

        if let Some(old) = old_key {
            if Some(&old) != new_key.as_ref() {
                if let Some(list) = self.groups.get_mut(&old) {
                    if let Some(pos) = list.iter().position(|r| r.id == run.id) {
                        list.remove(pos);
                    }
                }
                self.run_keys.remove(&run.id);
                emitted.extend(self.retransform(&old, info_ref, info_ref, None));
            }
        }

        let Some(key) = new_key else {
            emitted.push(self.grouping.clear_marks(run));
            return emitted;
        };

        let list = self.groups.entry(key.clone()).or_default();
        if let Some(pos) = list.iter().position(|r| r.id == run.id) {
            list[pos] = run.clone();
            resort_at(list, pos);
        } else {
            let pos = list.partition_point(|r| r.order_key() < run.order_key());
            list.insert(pos, run.clone());
        }
        self.run_keys.insert(run.id.clone(), key.clone());

        emitted.extend(self.retransform(&key, info_ref, info_ref, Some(run.id.as_str())));
        emitted
    }

    /// Applies a new contest info, recomputing every group for which the
    /// grouping's `needs_recompute` predicate holds.
    pub fn process_info(&mut self, info: Arc<ContestInfo>) -> Vec<RunInfo> {
        let old_info = self.info.clone();
        let mut keys: Vec<G::Key> = self.groups.keys().cloned().collect();
        keys.retain(|key| {
            self.grouping
                .needs_recompute(&info, old_info.as_deref(), key)
        });

        let mut emitted = Vec::new();
        for key in keys {
            emitted.extend(self.retransform(&key, old_info.as_deref(), Some(&info), None));
        }
        self.info = Some(info);
        emitted
    }

    /// Recomputes one group and returns the value-changed positions, plus the
    /// forced id when given. A transform that returns value-identical runs
    /// emits nothing.
    fn retransform(
        &mut self,
        key: &G::Key,
        info_before: Option<&ContestInfo>,
        info_after: Option<&ContestInfo>,
        force_id: Option<&str>,
    ) -> Vec<RunInfo> {
        let old = match self.groups.get(key) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => {
                self.groups.remove(key);
                return Vec::new();
            }
        };

        let new = self
            .grouping
            .transform(key, old.clone(), info_before, info_after);
        debug_assert_eq!(old.len(), new.len(), "group transform changed membership");

        let mut emitted = Vec::new();
        for (prev, next) in old.iter().zip(new.iter()) {
            if prev != next || force_id == Some(next.id.as_str()) {
                emitted.push(next.clone());
            }
        }
        self.groups.insert(key.clone(), new);
        emitted
    }
}

/// Restores sort order around one mutated position with adjacent swaps.
fn resort_at(list: &mut [RunInfo], mut pos: usize) {
    while pos > 0 && is_less(&list[pos], &list[pos - 1]) {
        list.swap(pos, pos - 1);
        pos -= 1;
    }
    while pos + 1 < list.len() && is_less(&list[pos + 1], &list[pos]) {
        list.swap(pos, pos + 1);
        pos += 1;
    }
}

fn is_less(a: &RunInfo, b: &RunInfo) -> bool {
    a.order_key() < b.order_key()
}
