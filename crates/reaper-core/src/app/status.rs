//! Status - サイクルの結果と tracker の集計
//!
//! ログと `--once` 出力のためのビューです。状態は持ちません。

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{CycleId, EvictReason};

/// Aggregate view over the idle tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackerCounts {
    pub tracked: usize,
    /// Records with at least one idle tick.
    pub idle: usize,
    pub max_idle_ticks: u64,
    /// When the longest-tracked cluster was first seen.
    pub oldest_first_seen_at: Option<DateTime<Utc>>,
    /// Earliest last-activity time among idle records.
    pub idle_since: Option<DateTime<Utc>>,
}

/// A delete request issued by the reaper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Eviction {
    pub cluster: String,
    pub reason: EvictReason,
}

/// What one poll cycle did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle_id: CycleId,
    pub observed: usize,
    pub tracked_new: usize,
    pub reset: usize,
    pub incremented: usize,
    /// Records dropped because the cluster is deleting or left the fleet.
    pub forgotten: usize,
    pub unrecognized: usize,
    pub evicted: Vec<Eviction>,
    pub failed_deletes: usize,
    /// Whether this cycle emitted the damped "no clusters" line.
    pub quiet_logged: bool,
    pub tracker: TrackerCounts,
}

impl CycleReport {
    pub fn new(cycle_id: CycleId, observed: usize) -> Self {
        Self {
            cycle_id,
            observed,
            tracked_new: 0,
            reset: 0,
            incremented: 0,
            forgotten: 0,
            unrecognized: 0,
            evicted: Vec::new(),
            failed_deletes: 0,
            quiet_logged: false,
            tracker: TrackerCounts::default(),
        }
    }

    /// Delete requests sent this cycle, successful or not.
    pub fn deletes_issued(&self) -> usize {
        self.evicted.len() + self.failed_deletes
    }
}
