//! Action model: what the tracker decided for one observed cluster.
//!
//! The tracker returns an `Action` for every observation; the reconciler turns
//! it into side effects (log lines, delete requests). The tracker itself never
//! talks to the management service.

use serde::Serialize;

use super::ids::ClusterId;
use super::state::ClusterState;

/// Result of probing a cluster for active jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobActivity {
    /// At least one job is active.
    Active,

    /// No job is active.
    Idle,

    /// The cluster was not probed this cycle (not RUNNING, or not tracked yet).
    NotProbed,
}

impl From<bool> for JobActivity {
    fn from(active: bool) -> Self {
        if active { Self::Active } else { Self::Idle }
    }
}

/// Everything the tracker needs to know about one cluster in one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub id: ClusterId,
    pub state: ClusterState,
    pub activity: JobActivity,
    /// Allowed idle ticks; `None` disables eviction for this cluster.
    pub max_ticks: Option<u64>,
}

/// Why a cluster is being deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictReason {
    /// The idle budget is exhausted.
    Idle,

    /// The cluster reported ERROR.
    Error,
}

/// The tracker's decision for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing changed.
    None,

    /// First sighting: a record with zero idle ticks was created.
    Track,

    /// Idle ticks were set back to zero.
    Reset,

    /// One idle tick was added; carries the new count.
    Increment { idle_ticks: u64 },

    /// The cluster is being deleted by someone else; the record was dropped.
    Forget,

    /// The record was dropped and the cluster must be deleted.
    Evict(EvictReason),
}

impl Action {
    pub fn is_evict(&self) -> bool {
        matches!(self, Self::Evict(_))
    }
}
