//! Cluster observation: one cluster as seen in one fleet snapshot.

use serde::{Deserialize, Serialize};

use super::budget::{BudgetError, IdleBudget};
use super::ids::ClusterId;
use super::state::ClusterState;

/// Label carrying the idle-timeout token.
pub const TIMEOUT_LABEL: &str = "timeout";

/// A cluster as reported by the management service in a single poll.
///
/// Observations are ephemeral: a new set is produced every cycle and nothing
/// keeps them after the cycle ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterObservation {
    pub id: ClusterId,
    /// Display name, used for job queries and delete requests.
    pub name: String,
    pub state: ClusterState,
    /// Raw value of the `timeout` label, if any.
    pub timeout_label: Option<String>,
}

impl ClusterObservation {
    pub fn new(id: impl Into<ClusterId>, name: impl Into<String>, state: ClusterState) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state,
            timeout_label: None,
        }
    }

    pub fn with_timeout(mut self, token: impl Into<String>) -> Self {
        self.timeout_label = Some(token.into());
        self
    }

    /// Resolve the idle budget of this cluster.
    ///
    /// An absent label yields `default`; a present but malformed label is an error.
    pub fn idle_budget(&self, default: IdleBudget) -> Result<IdleBudget, BudgetError> {
        match &self.timeout_label {
            None => Ok(default),
            Some(token) => IdleBudget::parse(token),
        }
    }
}
