//! IdleTracker - クラスタごとの idle tick と状態機械
//!
//! # 不変条件
//! - record は「DELETING 以外の状態で一度観測され、まだ削除・消失を観測していない」
//!   クラスタにだけ存在する
//! - active な job を検出したか、UPDATING に入ったら idle tick は 0 に戻る
//! - idle tick は RUNNING かつ job なしの観測1回につき 1 だけ増える
//! - DELETING を観測したか、reaper 自身が削除を出したら record を消す
//!
//! mapping を変更するのは IdleTracker だけです（reconciler が唯一の所有者）。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{Action, ClusterId, ClusterState, EvictReason, JobActivity, Observation};
use crate::ports::Clock;

use super::status::TrackerCounts;

/// Per-cluster idle bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdleRecord {
    pub idle_ticks: u64,
    pub last_state: ClusterState,
    pub first_seen_at: DateTime<Utc>,
    /// Last time work was seen (or the record was reset).
    pub last_active_at: DateTime<Utc>,
}

impl IdleRecord {
    fn new(state: ClusterState, now: DateTime<Utc>) -> Self {
        Self {
            idle_ticks: 0,
            last_state: state,
            first_seen_at: now,
            last_active_at: now,
        }
    }

    fn reset(&mut self, state: ClusterState, now: DateTime<Utc>) {
        self.idle_ticks = 0;
        self.last_state = state;
        self.last_active_at = now;
    }
}

/// In-memory map from cluster identity to idle bookkeeping.
pub struct IdleTracker {
    records: HashMap<ClusterId, IdleRecord>,
    clock: Arc<dyn Clock>,
}

impl IdleTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: HashMap::new(),
            clock,
        }
    }

    /// Apply one observation to the state machine.
    ///
    /// The tick being accounted counts toward the budget: a RUNNING cluster
    /// with no job and `max_ticks - 1` ticks is evicted, not incremented.
    pub fn update(&mut self, observation: &Observation) -> Action {
        let now = self.clock.now();
        let id = &observation.id;

        match &observation.state {
            ClusterState::Deleting => match self.records.remove(id) {
                Some(_) => Action::Forget,
                None => Action::None,
            },
            ClusterState::Creating => match self.records.get_mut(id) {
                Some(record) => {
                    record.last_state = ClusterState::Creating;
                    Action::None
                }
                None => {
                    self.track(id, ClusterState::Creating, now);
                    Action::Track
                }
            },
            ClusterState::Updating => match self.records.get_mut(id) {
                Some(record) => {
                    record.reset(ClusterState::Updating, now);
                    Action::Reset
                }
                None => Action::None,
            },
            ClusterState::Error => {
                self.records.remove(id);
                Action::Evict(EvictReason::Error)
            }
            ClusterState::Running => {
                let Some(record) = self.records.get_mut(id) else {
                    self.track(id, ClusterState::Running, now);
                    return Action::Track;
                };
                record.last_state = ClusterState::Running;

                match observation.activity {
                    JobActivity::NotProbed => Action::None,
                    JobActivity::Active => {
                        record.reset(ClusterState::Running, now);
                        Action::Reset
                    }
                    JobActivity::Idle => {
                        let next = record.idle_ticks.saturating_add(1);
                        let exhausted = matches!(observation.max_ticks, Some(max) if next >= max);
                        if exhausted {
                            self.records.remove(id);
                            return Action::Evict(EvictReason::Idle);
                        }
                        record.idle_ticks = next;
                        Action::Increment { idle_ticks: next }
                    }
                }
            }
            ClusterState::Unrecognized(_) => Action::None,
        }
    }

    fn track(&mut self, id: &ClusterId, state: ClusterState, now: DateTime<Utc>) {
        self.records.insert(id.clone(), IdleRecord::new(state, now));
    }

    pub fn is_tracked(&self, id: &ClusterId) -> bool {
        self.records.contains_key(id)
    }

    /// Idle ticks of a tracked cluster.
    pub fn record_for(&self, id: &ClusterId) -> Option<u64> {
        self.records.get(id).map(|record| record.idle_ticks)
    }

    pub fn get(&self, id: &ClusterId) -> Option<&IdleRecord> {
        self.records.get(id)
    }

    /// Drop a record. Returns whether one existed.
    pub fn forget(&mut self, id: &ClusterId) -> bool {
        self.records.remove(id).is_some()
    }

    /// Drop records of clusters missing from a complete fleet snapshot.
    /// Returns the dropped identities.
    pub fn retain_observed<'a>(
        &mut self,
        observed: impl IntoIterator<Item = &'a ClusterId>,
    ) -> Vec<ClusterId> {
        let observed: HashSet<&ClusterId> = observed.into_iter().collect();
        let vanished: Vec<ClusterId> = self
            .records
            .keys()
            .filter(|id| !observed.contains(id))
            .cloned()
            .collect();
        for id in &vanished {
            self.records.remove(id);
        }
        vanished
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn counts(&self) -> TrackerCounts {
        let mut counts = TrackerCounts {
            tracked: self.records.len(),
            ..TrackerCounts::default()
        };
        for record in self.records.values() {
            if record.idle_ticks > 0 {
                counts.idle += 1;
                counts.idle_since = earliest(counts.idle_since, record.last_active_at);
            }
            counts.max_idle_ticks = counts.max_idle_ticks.max(record.idle_ticks);
            counts.oldest_first_seen_at =
                earliest(counts.oldest_first_seen_at, record.first_seen_at);
        }
        counts
    }
}

fn earliest(current: Option<DateTime<Utc>>, candidate: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Some(current.map_or(candidate, |current| current.min(candidate)))
}
